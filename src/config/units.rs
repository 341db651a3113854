//! Unit types for electrical quantities and register codes.
//!
//! Currents are configured in milliamps and converted to the chip's register
//! units here, so the rest of the crate only handles raw codes.

use serde::Deserialize;

use crate::error::ConfigError;

/// TVAL resolution in milliamps per code.
pub const TVAL_STEP_MA: f32 = 31.25;

/// Largest TVAL code.
pub const TVAL_MAX: u8 = 0x7F;

/// Phase current at and above which TVAL saturates.
pub const PHASE_CURRENT_MAX_MA: f32 = 4000.0;

/// Current in milliamps.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Deserialize)]
#[serde(transparent)]
pub struct Milliamps(pub f32);

impl Milliamps {
    /// Create a new Milliamps value.
    #[inline]
    pub const fn new(value: f32) -> Self {
        Self(value)
    }

    /// Get the raw value.
    #[inline]
    pub const fn value(self) -> f32 {
        self.0
    }

    /// Convert to a TVAL register code, see [`encode_phase_current`].
    #[inline]
    pub fn to_torque_code(self) -> u8 {
        encode_phase_current(self.0)
    }
}

/// Encode a target phase current in milliamps as a TVAL code.
///
/// Saturates at both ends: at or above 4000 mA the result is `0x7F`, at or
/// below one step (31.25 mA) it is `0`. In between the value is rounded to
/// the nearest 31.25 mA step and capped at `0x7F`.
///
/// ```rust
/// use l6474::encode_phase_current;
///
/// assert_eq!(encode_phase_current(4000.0), 0x7F);
/// assert_eq!(encode_phase_current(0.0), 0x00);
/// assert_eq!(encode_phase_current(1500.0), 48);
/// ```
pub fn encode_phase_current(milliamps: f32) -> u8 {
    if milliamps >= PHASE_CURRENT_MAX_MA {
        TVAL_MAX
    } else if milliamps <= TVAL_STEP_MA || milliamps.is_nan() {
        0
    } else {
        let code = libm::floorf((milliamps + TVAL_STEP_MA / 2.0) / TVAL_STEP_MA);
        if code >= f32::from(TVAL_MAX) {
            TVAL_MAX
        } else {
            code as u8
        }
    }
}

/// Overcurrent detection threshold, 375 mA to 6000 mA in 375 mA steps.
///
/// Stored as the 4-bit OCD_TH code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OcdThreshold(u8);

impl OcdThreshold {
    /// Threshold resolution in milliamps.
    pub const STEP_MA: u16 = 375;
    /// Lowest threshold.
    pub const MA_375: Self = Self(0x00);
    /// 1500 mA, the base parameter default.
    pub const MA_1500: Self = Self(0x03);
    /// 3000 mA.
    pub const MA_3000: Self = Self(0x07);
    /// Highest threshold.
    pub const MA_6000: Self = Self(0x0F);

    /// Create from a threshold in milliamps.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidOcdThreshold` unless the value is a
    /// multiple of 375 between 375 and 6000.
    pub fn from_milliamps(milliamps: u16) -> Result<Self, ConfigError> {
        if milliamps >= Self::STEP_MA
            && milliamps <= 16 * Self::STEP_MA
            && milliamps % Self::STEP_MA == 0
        {
            Ok(Self((milliamps / Self::STEP_MA - 1) as u8))
        } else {
            Err(ConfigError::InvalidOcdThreshold(milliamps))
        }
    }

    /// Create from a register code; bits above the 4-bit field are ignored.
    #[inline]
    pub const fn from_code(code: u8) -> Self {
        Self(code & 0x0F)
    }

    /// OCD_TH register code.
    #[inline]
    pub const fn code(self) -> u8 {
        self.0
    }

    /// Threshold in milliamps.
    #[inline]
    pub const fn milliamps(self) -> u16 {
        (self.0 as u16 + 1) * Self::STEP_MA
    }
}

impl Default for OcdThreshold {
    fn default() -> Self {
        Self::MA_1500
    }
}

impl TryFrom<u16> for OcdThreshold {
    type Error = ConfigError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Self::from_milliamps(value)
    }
}

impl<'de> Deserialize<'de> for OcdThreshold {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use core::fmt::Write;
        let value = u16::deserialize(deserializer)?;
        OcdThreshold::from_milliamps(value).map_err(|e| {
            let mut buf = heapless::String::<128>::new();
            let _ = write!(buf, "{}", e);
            serde::de::Error::custom(buf.as_str())
        })
    }
}
