//! 22-bit two's-complement position fields (ABS_POS, MARK).

/// Width mask of a position field.
pub const POSITION_MASK: u32 = 0x3F_FFFF;
/// Sign bit of a position field.
pub const POSITION_SIGN: u32 = 1 << 21;
/// Smallest representable position.
pub const POSITION_MIN: i32 = -(1 << 21);
/// Largest representable position.
pub const POSITION_MAX: i32 = (1 << 21) - 1;

/// Decode a raw position register value.
#[inline]
pub const fn decode(raw: u32) -> i32 {
    let raw = raw & POSITION_MASK;
    if raw & POSITION_SIGN != 0 {
        -((((!raw).wrapping_add(1)) & POSITION_MASK) as i32)
    } else {
        raw as i32
    }
}

/// Encode a position as the masked two's-complement pattern.
#[inline]
pub const fn encode(position: i32) -> u32 {
    (position as u32) & POSITION_MASK
}

/// True if the position fits the 22-bit field.
#[inline]
pub const fn in_range(position: i32) -> bool {
    position >= POSITION_MIN && position <= POSITION_MAX
}
