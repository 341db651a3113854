//! L6474 register map.
//!
//! Every register the driver touches has a static [`Descriptor`] giving its
//! wire length, value mask and access rights. Addresses without a descriptor
//! are undefined and rejected before anything is sent to the chip.

/// Number of 5-bit register addresses.
pub const ADDRESS_SPACE: usize = 32;

/// Register addresses used by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Register {
    /// Absolute position, 22-bit two's complement.
    AbsPos = 0x01,
    /// Electrical position (step and microstep).
    ElPos = 0x02,
    /// Position mark, 22-bit two's complement.
    Mark = 0x03,
    /// Phase current reference.
    TVal = 0x09,
    /// Fast decay and fall step times.
    TFast = 0x0E,
    /// Minimum on-time.
    TonMin = 0x0F,
    /// Minimum off-time.
    ToffMin = 0x10,
    /// ADC output.
    AdcOut = 0x12,
    /// Overcurrent detection threshold.
    OcdTh = 0x13,
    /// Step resolution and sync selection.
    StepMode = 0x16,
    /// Alarm enables.
    AlarmEn = 0x17,
    /// IC configuration.
    Config = 0x18,
    /// Status word.
    Status = 0x19,
}

impl Register {
    /// All registers in address order.
    pub const ALL: [Register; 13] = [
        Register::AbsPos,
        Register::ElPos,
        Register::Mark,
        Register::TVal,
        Register::TFast,
        Register::TonMin,
        Register::ToffMin,
        Register::AdcOut,
        Register::OcdTh,
        Register::StepMode,
        Register::AlarmEn,
        Register::Config,
        Register::Status,
    ];

    /// 5-bit register address.
    #[inline]
    pub const fn address(self) -> u8 {
        self as u8
    }

    /// Static descriptor of this register.
    pub const fn descriptor(self) -> &'static Descriptor {
        match self {
            Register::AbsPos => &ABS_POS,
            Register::ElPos => &EL_POS,
            Register::Mark => &MARK,
            Register::TVal => &TVAL,
            Register::TFast => &T_FAST,
            Register::TonMin => &TON_MIN,
            Register::ToffMin => &TOFF_MIN,
            Register::AdcOut => &ADC_OUT,
            Register::OcdTh => &OCD_TH,
            Register::StepMode => &STEP_MODE,
            Register::AlarmEn => &ALARM_EN,
            Register::Config => &CONFIG,
            Register::Status => &STATUS,
        }
    }

    /// Datasheet power-on value.
    pub const fn power_on_value(self) -> u32 {
        match self {
            Register::TFast => 0x19,
            Register::TonMin | Register::ToffMin | Register::TVal => 0x29,
            Register::OcdTh => 0x08,
            Register::StepMode => 0x07,
            Register::AlarmEn => 0xFF,
            Register::Config => 0x2E88,
            _ => 0,
        }
    }
}

bitflags::bitflags! {
    /// Register access rights.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Access: u8 {
        /// Register can be read.
        const READABLE                    = 0x01;
        /// Register can be written in any non-reset state.
        const WRITABLE                    = 0x02;
        /// Register can only be written while the power stage is disabled.
        const WRITABLE_ONLY_WHEN_INACTIVE = 0x04;
    }
}

impl Access {
    /// True if the register is readable.
    #[inline]
    pub const fn is_readable(self) -> bool {
        self.contains(Self::READABLE)
    }

    /// True if the register can be written in some state.
    #[inline]
    pub const fn is_writable(self) -> bool {
        self.intersects(Self::WRITABLE.union(Self::WRITABLE_ONLY_WHEN_INACTIVE))
    }

    /// True if writes require the power stage to be disabled.
    #[inline]
    pub const fn requires_inactive(self) -> bool {
        self.contains(Self::WRITABLE_ONLY_WHEN_INACTIVE)
    }
}

/// Static description of one register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Descriptor {
    /// Storage slot in a [`RegisterImage`].
    pub register: Register,
    /// Payload length on the wire, 1 to 3 bytes.
    pub length: u8,
    /// Valid value bits.
    pub mask: u32,
    /// Access rights.
    pub access: Access,
    /// Datasheet name.
    pub name: &'static str,
}

impl Descriptor {
    /// 5-bit address of this register.
    #[inline]
    pub const fn address(&self) -> u8 {
        self.register.address()
    }

    /// Mask a value to the register width.
    #[inline]
    pub const fn clamp(&self, value: u32) -> u32 {
        value & self.mask
    }
}

const R: Access = Access::READABLE;
const RW: Access = Access::READABLE.union(Access::WRITABLE);
const RW_INACTIVE: Access = Access::READABLE.union(Access::WRITABLE_ONLY_WHEN_INACTIVE);

const fn entry(
    register: Register,
    length: u8,
    mask: u32,
    access: Access,
    name: &'static str,
) -> Descriptor {
    Descriptor {
        register,
        length,
        mask,
        access,
        name,
    }
}

const ABS_POS: Descriptor = entry(Register::AbsPos, 3, 0x3F_FFFF, RW, "ABS_POS");
const EL_POS: Descriptor = entry(Register::ElPos, 2, 0x1FF, RW, "EL_POS");
const MARK: Descriptor = entry(Register::Mark, 3, 0x3F_FFFF, RW, "MARK");
const TVAL: Descriptor = entry(Register::TVal, 1, 0x7F, RW, "TVAL");
const T_FAST: Descriptor = entry(Register::TFast, 1, 0xFF, RW_INACTIVE, "T_FAST");
const TON_MIN: Descriptor = entry(Register::TonMin, 1, 0x7F, RW_INACTIVE, "TON_MIN");
const TOFF_MIN: Descriptor = entry(Register::ToffMin, 1, 0x7F, RW_INACTIVE, "TOFF_MIN");
const ADC_OUT: Descriptor = entry(Register::AdcOut, 1, 0x1F, R, "ADC_OUT");
const OCD_TH: Descriptor = entry(Register::OcdTh, 1, 0x0F, RW, "OCD_TH");
const STEP_MODE: Descriptor = entry(Register::StepMode, 1, 0xFF, RW_INACTIVE, "STEP_MODE");
const ALARM_EN: Descriptor = entry(Register::AlarmEn, 1, 0xFF, RW, "ALARM_EN");
const CONFIG: Descriptor = entry(Register::Config, 2, 0xFFFF, RW_INACTIVE, "CONFIG");
const STATUS: Descriptor = entry(Register::Status, 2, 0xFFFF, R, "STATUS");

// Each register sits at its own address, masks never exceed the wire length
// and payloads fit a 4-byte frame.
const TABLE: [Option<Descriptor>; ADDRESS_SPACE] = {
    let mut table: [Option<Descriptor>; ADDRESS_SPACE] = [None; ADDRESS_SPACE];
    let mut i = 0;
    while i < Register::ALL.len() {
        let register = Register::ALL[i];
        let d = *register.descriptor();
        assert!(d.register as u8 == register as u8);
        assert!(d.length >= 1 && d.length <= 3);
        assert!((d.mask as u64) < (1u64 << (8 * d.length as u32)));

        let address = register as usize;
        assert!(address != 0 && address < ADDRESS_SPACE);
        assert!(table[address].is_none());
        table[address] = Some(d);
        i += 1;
    }
    table
};

static DESCRIPTORS: [Option<Descriptor>; ADDRESS_SPACE] = TABLE;

/// Look up the descriptor of a register address.
///
/// Returns `None` for NOP (address 0), unused addresses and anything above
/// the 5-bit address space.
pub fn lookup(address: u8) -> Option<&'static Descriptor> {
    DESCRIPTORS.get(usize::from(address))?.as_ref()
}

/// In-memory copy of the register file, one slot per address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterImage {
    values: [u32; ADDRESS_SPACE],
}

impl RegisterImage {
    /// Image holding the datasheet power-on values.
    pub fn power_on() -> Self {
        let mut image = Self {
            values: [0; ADDRESS_SPACE],
        };
        image.reset();
        image
    }

    /// Restore power-on values.
    pub fn reset(&mut self) {
        self.values = [0; ADDRESS_SPACE];
        for register in Register::ALL {
            self.values[register as usize] = register.power_on_value();
        }
    }

    /// Read a slot.
    #[inline]
    pub fn get(&self, register: Register) -> u32 {
        self.values[register as usize]
    }

    /// Write a slot, masked to the register width.
    #[inline]
    pub fn set(&mut self, register: Register, value: u32) {
        self.values[register as usize] = register.descriptor().clamp(value);
    }
}

impl Default for RegisterImage {
    fn default() -> Self {
        Self::power_on()
    }
}

/// Registers reachable through the property accessors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Property {
    /// TVAL.
    Torque = 0x09,
    /// T_FAST.
    TFast = 0x0E,
    /// TON_MIN.
    TimeOnMin = 0x0F,
    /// TOFF_MIN.
    TimeOffMin = 0x10,
    /// ADC_OUT, read only.
    AdcOut = 0x12,
    /// OCD_TH.
    OcdThreshold = 0x13,
}

impl Property {
    /// Backing register.
    pub const fn register(self) -> Register {
        match self {
            Property::Torque => Register::TVal,
            Property::TFast => Register::TFast,
            Property::TimeOnMin => Register::TonMin,
            Property::TimeOffMin => Register::ToffMin,
            Property::AdcOut => Register::AdcOut,
            Property::OcdThreshold => Register::OcdTh,
        }
    }
}

bitflags::bitflags! {
    /// ALARM_EN bit set.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AlarmEnables: u8 {
        /// Overcurrent.
        const OVERCURRENT      = 0x01;
        /// Thermal shutdown.
        const THERMAL_SHUTDOWN = 0x02;
        /// Thermal warning.
        const THERMAL_WARNING  = 0x04;
        /// Undervoltage.
        const UNDERVOLTAGE     = 0x08;
        /// Wrong or non-performable command.
        const BAD_COMMAND      = 0x80;
        /// Every bit set, as written by `initialize`.
        const ALL              = 0xFF;
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for AlarmEnables {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "AlarmEnables({=u8:#x})", self.bits())
    }
}
