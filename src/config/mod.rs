//! Configuration module for l6474.
//!
//! Provides the base parameters written by `initialize`, the driver options,
//! unit conversions for currents, and loading of both from TOML files (with
//! the `std` feature).

mod parameters;
pub mod units;
#[cfg(feature = "std")]
mod loader;
mod validation;

pub use parameters::{BaseParameters, DriverConfig, DriverOptions, ParameterConfig, StepMode};
pub use validation::{validate_config, validate_parameters};

#[cfg(feature = "std")]
pub use loader::{load_config, parse_config};

// Re-export unit types at config level
pub use units::{encode_phase_current, Milliamps, OcdThreshold};
