//! Error types for the l6474 driver library.
//!
//! Driver errors follow the chip protocol taxonomy: caller misuse, lock
//! contention, violations reported by the device and transport failures.
//! Configuration problems are grouped under [`ConfigError`].

use core::fmt;

use crate::driver::State;

/// Result type alias using the library's Error type.
pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for all driver operations.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// A required argument is missing or empty (for example a zero-step move).
    NullArgument,
    /// Value out of range or register address without a descriptor.
    InvalidArgument,
    /// Operation not allowed in the current operating state.
    InvalidState(State),
    /// A transport primitive (SPI, pulse generator) reported a failure.
    Internal,
    /// The lock could not be acquired.
    Locking,
    /// The device flagged the last command as not performed or wrong.
    DeviceState {
        /// Raw STATUS register value that carried the flag.
        status: u16,
    },
    /// Another motion request is still outstanding.
    Pending,
    /// The register does not grant the requested access.
    Forbidden,
    /// Configuration parsing, validation or driver construction error.
    Config(ConfigError),
}

/// Configuration-related errors.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Failed to parse TOML configuration
    ParseError(heapless::String<128>),
    /// Invalid step mode (microsteps must be 1, 2, 4, 8 or 16)
    InvalidStepMode(u16),
    /// Invalid overcurrent threshold (375 mA to 6000 mA in 375 mA steps)
    InvalidOcdThreshold(u16),
    /// Torque register code exceeds 0x7F
    InvalidTorque(u8),
    /// Minimum on-time register code exceeds 0x7F
    InvalidTimeOn(u8),
    /// Minimum off-time register code exceeds 0x7F
    InvalidTimeOff(u8),
    /// Phase current must be finite and not negative
    InvalidPhaseCurrent(f32),
    /// A capability required to build the driver was not supplied
    MissingCapability(&'static str),
    /// File I/O error (std only)
    #[cfg(feature = "std")]
    IoError(heapless::String<128>),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NullArgument => write!(f, "Required argument missing"),
            Error::InvalidArgument => write!(f, "Invalid argument"),
            Error::InvalidState(state) => {
                write!(f, "Operation not allowed in state {}", state.name())
            }
            Error::Internal => write!(f, "Transport primitive failed"),
            Error::Locking => write!(f, "Lock acquisition failed"),
            Error::DeviceState { status } => {
                write!(f, "Device rejected command (STATUS = {:#06x})", status)
            }
            Error::Pending => write!(f, "Motion already pending"),
            Error::Forbidden => write!(f, "Register access forbidden"),
            Error::Config(e) => write!(f, "Configuration error: {}", e),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            ConfigError::InvalidStepMode(v) => {
                write!(f, "Invalid step mode: {}. Valid values: 1, 2, 4, 8, 16", v)
            }
            ConfigError::InvalidOcdThreshold(v) => write!(
                f,
                "Invalid overcurrent threshold: {} mA. Must be a multiple of 375 in 375-6000",
                v
            ),
            ConfigError::InvalidTorque(v) => write!(f, "Invalid torque code: {:#04x}. Max 0x7f", v),
            ConfigError::InvalidTimeOn(v) => write!(f, "Invalid TON_MIN code: {:#04x}. Max 0x7f", v),
            ConfigError::InvalidTimeOff(v) => {
                write!(f, "Invalid TOFF_MIN code: {:#04x}. Max 0x7f", v)
            }
            ConfigError::InvalidPhaseCurrent(v) => {
                write!(f, "Invalid phase current: {} mA. Must be finite and >= 0", v)
            }
            ConfigError::MissingCapability(name) => write!(f, "{} is required", name),
            #[cfg(feature = "std")]
            ConfigError::IoError(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

#[cfg(feature = "std")]
impl std::error::Error for ConfigError {}
