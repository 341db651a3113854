//! Builder pattern for L6474.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal::spi::SpiDevice;

use crate::config::{DriverConfig, DriverOptions};
use crate::error::{ConfigError, Error, Result};

use super::device::L6474;
use super::motion::{Lock, MotionCell, MotionMode, NoLock};
use super::transport::NoFlag;

/// Builder for creating L6474 instances.
///
/// SPI device, reset pin, delay, motion mode and motion cell are required;
/// the FLAG pin and options are optional.
///
/// ```rust,ignore
/// use l6474::{L6474, MotionCell, Synchronous};
///
/// static MOTION: MotionCell = MotionCell::new();
///
/// let mut driver = L6474::builder()
///     .spi(spi)
///     .reset_pin(stby)
///     .delay(delay)
///     .motion(Synchronous(pulses))
///     .motion_cell(&MOTION)
///     .build()?;
/// ```
pub struct L6474Builder<'a, SPI, RST, DELAY, M, F = NoFlag, L = NoLock>
where
    SPI: SpiDevice,
    RST: OutputPin,
    DELAY: DelayNs,
    M: MotionMode<'a, L>,
    F: InputPin,
    L: Lock,
{
    spi: Option<SPI>,
    reset: Option<RST>,
    delay: Option<DELAY>,
    motion: Option<M>,
    flag: Option<F>,
    cell: Option<&'a MotionCell<L>>,
    options: DriverOptions,
}

impl<'a, SPI, RST, DELAY, M, L> L6474<'a, SPI, RST, DELAY, M, NoFlag, L>
where
    SPI: SpiDevice,
    RST: OutputPin,
    DELAY: DelayNs,
    M: MotionMode<'a, L>,
    L: Lock,
{
    /// Create a builder.
    pub fn builder() -> L6474Builder<'a, SPI, RST, DELAY, M, NoFlag, L> {
        L6474Builder::new()
    }
}

impl<'a, SPI, RST, DELAY, M, L> Default for L6474Builder<'a, SPI, RST, DELAY, M, NoFlag, L>
where
    SPI: SpiDevice,
    RST: OutputPin,
    DELAY: DelayNs,
    M: MotionMode<'a, L>,
    L: Lock,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, SPI, RST, DELAY, M, L> L6474Builder<'a, SPI, RST, DELAY, M, NoFlag, L>
where
    SPI: SpiDevice,
    RST: OutputPin,
    DELAY: DelayNs,
    M: MotionMode<'a, L>,
    L: Lock,
{
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            spi: None,
            reset: None,
            delay: None,
            motion: None,
            flag: None,
            cell: None,
            options: DriverOptions::default(),
        }
    }

    /// Set the FLAG input.
    pub fn flag_pin<P: InputPin>(self, pin: P) -> L6474Builder<'a, SPI, RST, DELAY, M, P, L> {
        L6474Builder {
            spi: self.spi,
            reset: self.reset,
            delay: self.delay,
            motion: self.motion,
            flag: Some(pin),
            cell: self.cell,
            options: self.options,
        }
    }
}

impl<'a, SPI, RST, DELAY, M, F, L> L6474Builder<'a, SPI, RST, DELAY, M, F, L>
where
    SPI: SpiDevice,
    RST: OutputPin,
    DELAY: DelayNs,
    M: MotionMode<'a, L>,
    F: InputPin,
    L: Lock,
{
    /// Set the SPI device.
    pub fn spi(mut self, spi: SPI) -> Self {
        self.spi = Some(spi);
        self
    }

    /// Set the STBY/RESET pin.
    pub fn reset_pin(mut self, pin: RST) -> Self {
        self.reset = Some(pin);
        self
    }

    /// Set the delay provider.
    pub fn delay(mut self, delay: DELAY) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Set the motion mode, [`Synchronous`](super::Synchronous) or
    /// [`Asynchronous`](super::Asynchronous).
    pub fn motion(mut self, mode: M) -> Self {
        self.motion = Some(mode);
        self
    }

    /// Set the cell shared with completion tokens.
    pub fn motion_cell(mut self, cell: &'a MotionCell<L>) -> Self {
        self.cell = Some(cell);
        self
    }

    /// Set driver options.
    pub fn options(mut self, options: DriverOptions) -> Self {
        self.options = options;
        self
    }

    /// Configure from a DriverConfig.
    ///
    /// Only the options are taken; pass
    /// [`DriverConfig::base_parameters`] to `initialize`.
    pub fn from_config(mut self, config: &DriverConfig) -> Self {
        self.options = config.options;
        self
    }

    /// Build the driver. The reset line is asserted and the state is
    /// [`State::Reset`](super::State::Reset).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingCapability` if a required part is
    /// missing, `Error::Internal` if the reset line cannot be driven.
    pub fn build(self) -> Result<L6474<'a, SPI, RST, DELAY, M, F, L>> {
        let spi = self
            .spi
            .ok_or(Error::Config(ConfigError::MissingCapability("spi")))?;

        let reset = self
            .reset
            .ok_or(Error::Config(ConfigError::MissingCapability("reset_pin")))?;

        let delay = self
            .delay
            .ok_or(Error::Config(ConfigError::MissingCapability("delay")))?;

        let motion = self
            .motion
            .ok_or(Error::Config(ConfigError::MissingCapability("motion")))?;

        let cell = self
            .cell
            .ok_or(Error::Config(ConfigError::MissingCapability("motion_cell")))?;

        L6474::new(spi, reset, delay, motion, self.flag, cell, self.options)
    }
}
