//! Byte exchange with the chip and the optional FLAG input.

use core::convert::Infallible;

use embedded_hal::digital::{ErrorType, InputPin};
use embedded_hal::spi::SpiDevice;

use crate::error::{Error, Result};
use crate::protocol::Frame;

/// Exchange a frame in place, one byte per chip-select frame.
///
/// The L6474 shifts a single byte per CS cycle, so a multi-byte command is a
/// sequence of independent one-byte transfers. Any bus error is reported as
/// [`Error::Internal`].
pub(crate) fn exchange<SPI: SpiDevice>(spi: &mut SPI, frame: &mut Frame) -> Result<()> {
    for byte in frame.as_mut_slice() {
        spi.transfer_in_place(core::slice::from_mut(byte))
            .map_err(|_e| {
                warn!("spi transfer failed");
                Error::Internal
            })?;
    }
    Ok(())
}

/// Placeholder used when no FLAG pin is wired.
///
/// Reads as released (high). The driver never reads it: without a real
/// pin, [`L6474::flag_asserted`](crate::L6474::flag_asserted) fails with
/// `InvalidState`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFlag;

impl ErrorType for NoFlag {
    type Error = Infallible;
}

impl InputPin for NoFlag {
    fn is_high(&mut self) -> core::result::Result<bool, Self::Error> {
        Ok(true)
    }

    fn is_low(&mut self) -> core::result::Result<bool, Self::Error> {
        Ok(false)
    }
}
