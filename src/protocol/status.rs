//! STATUS register decoding.

bitflags::bitflags! {
    /// Raw STATUS register bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Status: u16 {
        /// HiZ: power bridges in high impedance.
        const HIGH_Z             = 1 << 0;
        /// DIR: direction of the last step.
        const DIRECTION          = 1 << 4;
        /// NOTPERF_CMD: last command could not be performed.
        const NOT_PERFORMED      = 1 << 7;
        /// WRONG_CMD: last command does not exist.
        const WRONG_COMMAND      = 1 << 8;
        /// UVLO: undervoltage lockout, active low.
        const UNDERVOLTAGE_N     = 1 << 9;
        /// TH_WRN: thermal warning, active low.
        const THERMAL_WARNING_N  = 1 << 10;
        /// TH_SD: thermal shutdown, active low.
        const THERMAL_SHUTDOWN_N = 1 << 11;
        /// OCD: overcurrent, active low.
        const OVERCURRENT_N      = 1 << 12;
    }
}

/// True if the chip rejected the previous command.
#[inline]
pub const fn command_rejected(raw: u16) -> bool {
    Status::from_bits_retain(raw).intersects(Status::NOT_PERFORMED.union(Status::WRONG_COMMAND))
}

/// True if the power bridges are in high impedance.
#[inline]
pub const fn is_high_z(raw: u16) -> bool {
    Status::from_bits_retain(raw).contains(Status::HIGH_Z)
}

/// Decoded status snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StatusFlags {
    /// Power bridges are in high impedance.
    pub high_z: bool,
    /// Direction bit; true is forward.
    pub direction: bool,
    /// Last command was not performed.
    pub not_performed: bool,
    /// Last command was not recognized.
    pub wrong_command: bool,
    /// Undervoltage lockout is active.
    pub undervoltage: bool,
    /// Thermal warning.
    pub thermal_warning: bool,
    /// Thermal shutdown.
    pub thermal_shutdown: bool,
    /// Overcurrent detected.
    pub overcurrent: bool,
    /// A motion request is outstanding.
    pub ongoing: bool,
}

impl StatusFlags {
    /// Decode a raw STATUS value together with the local motion flag.
    pub const fn from_raw(raw: u16, ongoing: bool) -> Self {
        let bits = Status::from_bits_retain(raw);
        Self {
            high_z: bits.contains(Status::HIGH_Z),
            direction: bits.contains(Status::DIRECTION),
            not_performed: bits.contains(Status::NOT_PERFORMED),
            wrong_command: bits.contains(Status::WRONG_COMMAND),
            undervoltage: !bits.contains(Status::UNDERVOLTAGE_N),
            thermal_warning: !bits.contains(Status::THERMAL_WARNING_N),
            thermal_shutdown: !bits.contains(Status::THERMAL_SHUTDOWN_N),
            overcurrent: !bits.contains(Status::OVERCURRENT_N),
            ongoing,
        }
    }

    /// True if any fault condition is reported.
    pub const fn has_fault(&self) -> bool {
        self.undervoltage || self.thermal_warning || self.thermal_shutdown || self.overcurrent
    }
}
