//! Base parameters written during initialization, and their TOML form.

use serde::Deserialize;

use crate::error::ConfigError;

use super::units::{encode_phase_current, Milliamps, OcdThreshold};

/// Step resolution (STEP_SEL field of STEP_MODE).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum StepMode {
    /// Full step.
    Full = 0,
    /// Half step.
    Half = 1,
    /// 1/4 microstep.
    Micro4 = 2,
    /// 1/8 microstep.
    Micro8 = 3,
    /// 1/16 microstep.
    #[default]
    Micro16 = 4,
}

impl StepMode {
    /// SYNC_SEL bit that must be set whenever STEP_MODE is written.
    pub const SYNC_BIT: u8 = 0x08;

    /// STEP_SEL code.
    #[inline]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Value to write to STEP_MODE.
    #[inline]
    pub const fn register_value(self) -> u8 {
        self.code() | Self::SYNC_BIT
    }

    /// Decode a STEP_MODE value. Codes 4 to 7 all select 1/16 on the chip.
    pub const fn from_register(raw: u8) -> Self {
        match raw & 0x07 {
            0 => StepMode::Full,
            1 => StepMode::Half,
            2 => StepMode::Micro4,
            3 => StepMode::Micro8,
            _ => StepMode::Micro16,
        }
    }

    /// Microsteps per full step.
    #[inline]
    pub const fn microsteps(self) -> u16 {
        1 << self.code()
    }

    /// Create from a microstep divisor.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidStepMode` unless the divisor is 1, 2, 4,
    /// 8 or 16.
    pub fn from_microsteps(microsteps: u16) -> Result<Self, ConfigError> {
        match microsteps {
            1 => Ok(StepMode::Full),
            2 => Ok(StepMode::Half),
            4 => Ok(StepMode::Micro4),
            8 => Ok(StepMode::Micro8),
            16 => Ok(StepMode::Micro16),
            other => Err(ConfigError::InvalidStepMode(other)),
        }
    }
}

impl TryFrom<u16> for StepMode {
    type Error = ConfigError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Self::from_microsteps(value)
    }
}

impl<'de> Deserialize<'de> for StepMode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use core::fmt::Write;
        let value = u16::deserialize(deserializer)?;
        StepMode::from_microsteps(value).map_err(|e| {
            let mut buf = heapless::String::<128>::new();
            let _ = write!(buf, "{}", e);
            serde::de::Error::custom(buf.as_str())
        })
    }
}

/// Register values written by `initialize`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BaseParameters {
    /// Step resolution.
    pub step_mode: StepMode,
    /// Overcurrent detection threshold.
    pub ocd_threshold: OcdThreshold,
    /// TON_MIN code.
    pub ton_min: u8,
    /// TOFF_MIN code.
    pub toff_min: u8,
    /// TVAL code (phase current reference).
    pub torque: u8,
    /// T_FAST code.
    pub t_fast: u8,
}

impl BaseParameters {
    /// Documented defaults: 1500 mA OCD, torque 0x26 (about 1.2 A), 1/16
    /// microstepping, TON_MIN and TOFF_MIN 0x29, T_FAST 0x14.
    pub const DEFAULT: Self = Self {
        step_mode: StepMode::Micro16,
        ocd_threshold: OcdThreshold::MA_1500,
        ton_min: 0x29,
        toff_min: 0x29,
        torque: 0x26,
        t_fast: 0x14,
    };

    /// Set the torque from a phase current in milliamps.
    pub fn set_phase_current(&mut self, current: Milliamps) {
        self.torque = encode_phase_current(current.value());
    }
}

impl Default for BaseParameters {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Construction-time driver options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct DriverOptions {
    /// Keep the bridges on after an overcurrent event (clears OC_SD in CONFIG).
    pub disable_ocd: bool,
}

/// `[parameters]` table of a configuration file.
///
/// Every key is optional and falls back to [`BaseParameters::DEFAULT`].
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct ParameterConfig {
    /// Microsteps per full step.
    pub step_mode: StepMode,
    /// Overcurrent threshold in milliamps.
    #[serde(rename = "ocd_threshold_ma")]
    pub ocd_threshold: OcdThreshold,
    /// TVAL code.
    pub torque: u8,
    /// Phase current; replaces `torque` when present.
    #[serde(rename = "phase_current_ma")]
    pub phase_current: Option<Milliamps>,
    /// TON_MIN code.
    pub ton_min: u8,
    /// TOFF_MIN code.
    pub toff_min: u8,
    /// T_FAST code.
    pub t_fast: u8,
}

impl Default for ParameterConfig {
    fn default() -> Self {
        let base = BaseParameters::DEFAULT;
        Self {
            step_mode: base.step_mode,
            ocd_threshold: base.ocd_threshold,
            torque: base.torque,
            phase_current: None,
            ton_min: base.ton_min,
            toff_min: base.toff_min,
            t_fast: base.t_fast,
        }
    }
}

impl ParameterConfig {
    /// Resolve into the parameters passed to `initialize`.
    pub fn base_parameters(&self) -> BaseParameters {
        let mut base = BaseParameters {
            step_mode: self.step_mode,
            ocd_threshold: self.ocd_threshold,
            ton_min: self.ton_min,
            toff_min: self.toff_min,
            torque: self.torque,
            t_fast: self.t_fast,
        };
        if let Some(current) = self.phase_current {
            base.set_phase_current(current);
        }
        base
    }
}

/// Root configuration structure from TOML.
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
pub struct DriverConfig {
    /// Initialization parameters.
    #[serde(default)]
    pub parameters: ParameterConfig,

    /// Driver options.
    #[serde(default)]
    pub options: DriverOptions,
}

impl DriverConfig {
    /// Parameters to pass to `initialize`.
    pub fn base_parameters(&self) -> BaseParameters {
        self.parameters.base_parameters()
    }
}
