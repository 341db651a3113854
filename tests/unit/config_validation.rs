//! Unit tests for configuration validation.

use l6474::config::{parse_config, validate_config, validate_parameters, BaseParameters};
use l6474::error::{ConfigError, Error};

/// Test validation of a valid configuration.
#[test]
fn test_valid_config_passes_validation() {
    let toml_str = r#"
[parameters]
step_mode = 16
torque = 0x7F
ton_min = 0x7F
toff_min = 0
"#;

    let config: l6474::DriverConfig = toml::from_str(toml_str).expect("Failed to parse TOML");
    assert!(validate_config(&config).is_ok());
}

/// Torque codes wider than 7 bits are rejected.
#[test]
fn test_torque_out_of_range() {
    let result = parse_config("[parameters]\ntorque = 200\n");
    assert_eq!(result, Err(Error::Config(ConfigError::InvalidTorque(200))));
}

#[test]
fn test_time_on_out_of_range() {
    let result = parse_config("[parameters]\nton_min = 0x80\n");
    assert_eq!(result, Err(Error::Config(ConfigError::InvalidTimeOn(0x80))));
}

#[test]
fn test_time_off_out_of_range() {
    let result = parse_config("[parameters]\ntoff_min = 0x90\n");
    assert_eq!(result, Err(Error::Config(ConfigError::InvalidTimeOff(0x90))));
}

/// Negative currents are refused before conversion.
#[test]
fn test_negative_phase_current() {
    let result = parse_config("[parameters]\nphase_current_ma = -5.0\n");
    assert_eq!(
        result,
        Err(Error::Config(ConfigError::InvalidPhaseCurrent(-5.0)))
    );
}

#[test]
fn test_parameters_built_in_code() {
    assert!(validate_parameters(&BaseParameters::default()).is_ok());

    let parameters = BaseParameters {
        toff_min: 0xFF,
        ..BaseParameters::default()
    };
    assert_eq!(
        validate_parameters(&parameters),
        Err(Error::Config(ConfigError::InvalidTimeOff(0xFF)))
    );
}
