//! Configuration validation.

use crate::error::{ConfigError, Error, Result};

use super::{BaseParameters, DriverConfig, ParameterConfig};

/// Largest code accepted by the 7-bit TVAL, TON_MIN and TOFF_MIN fields.
const CODE7_MAX: u8 = 0x7F;

/// Validate a driver configuration.
///
/// Checks:
/// - TVAL, TON_MIN and TOFF_MIN codes fit their 7-bit fields
/// - The phase current, when given, is finite and not negative
///
/// Step mode and overcurrent threshold are checked while deserializing.
pub fn validate_config(config: &DriverConfig) -> Result<()> {
    validate_parameter_config(&config.parameters)
}

fn validate_parameter_config(config: &ParameterConfig) -> Result<()> {
    if let Some(current) = config.phase_current {
        if !current.value().is_finite() || current.value() < 0.0 {
            return Err(Error::Config(ConfigError::InvalidPhaseCurrent(
                current.value(),
            )));
        }
    }

    validate_parameters(&config.base_parameters())
}

/// Validate parameters before handing them to `initialize`.
///
/// `initialize` itself masks every value to its register width; this check
/// catches codes that would be silently truncated.
pub fn validate_parameters(parameters: &BaseParameters) -> Result<()> {
    if parameters.torque > CODE7_MAX {
        return Err(Error::Config(ConfigError::InvalidTorque(parameters.torque)));
    }

    if parameters.ton_min > CODE7_MAX {
        return Err(Error::Config(ConfigError::InvalidTimeOn(parameters.ton_min)));
    }

    if parameters.toff_min > CODE7_MAX {
        return Err(Error::Config(ConfigError::InvalidTimeOff(parameters.toff_min)));
    }

    Ok(())
}
