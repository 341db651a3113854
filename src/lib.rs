//! # l6474
//!
//! Protocol driver for the ST L6474 stepper motor driver with embedded-hal 1.0 support.
//!
//! ## Features
//!
//! - **Byte-exact SPI protocol**: SET/GET/ENABLE/DISABLE/STATUS framing with
//!   masked, big-endian register fields of 1 to 3 bytes
//! - **Register access rules**: writes to timing and configuration registers
//!   are refused while the power bridges are on
//! - **State machine**: Reset / Disabled / Enabled, re-derived from the HiZ
//!   status bit on every call
//! - **Sync or async motion**: blocking pulse generation, or interrupt-driven
//!   pulse generation with completion tokens and cancellation
//! - **no_std compatible**: Core library works without standard library
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use l6474::{BaseParameters, L6474, MotionCell, Synchronous};
//!
//! static MOTION: MotionCell = MotionCell::new();
//!
//! let mut driver = L6474::builder()
//!     .spi(spi)
//!     .reset_pin(stby)
//!     .delay(delay)
//!     .motion(Synchronous(pulses))
//!     .motion_cell(&MOTION)
//!     .build()?;
//!
//! driver.initialize(&BaseParameters::default())?;
//! driver.set_power_outputs(true)?;
//! driver.step_incremental(1000)?;
//! ```
//!
//! ## Feature Flags
//!
//! - `std` (default): Enables file I/O and TOML parsing
//! - `defmt`: Enables defmt logging for embedded targets

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

// Must come first so the logging macros are visible to every module.
#[macro_use]
mod fmt;

// Core modules
pub mod config;
pub mod driver;
pub mod error;
pub mod protocol;

// Re-exports for ergonomic API
pub use config::{
    encode_phase_current, validate_config, BaseParameters, DriverConfig, DriverOptions,
    Milliamps, OcdThreshold, StepMode,
};
pub use driver::{
    AsyncStepPulses, Asynchronous, Completion, Direction, L6474Builder, Lock, MotionCell,
    NoFlag, NoLock, Parts, State, StepPulses, Synchronous, L6474,
};
pub use error::{ConfigError, Error, Result};
pub use protocol::{AlarmEnables, Property, Register, StatusFlags};

// Configuration loading (std only)
#[cfg(feature = "std")]
pub use config::{load_config, parse_config};
