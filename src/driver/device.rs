//! L6474 driver.
//!
//! Generic over embedded-hal 1.0 bus, pin and delay types.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal::spi::SpiDevice;

use crate::config::{BaseParameters, DriverOptions, StepMode};
use crate::error::{Error, Result};
use crate::protocol::command::{decode_param, decode_status};
use crate::protocol::{
    lookup, position, status, AlarmEnables, Command, Property, Register, RegisterImage,
    StatusFlags,
};

use super::motion::{Direction, Lock, LockGuard, MotionCell, MotionMode, NoLock};
use super::state::State;
use super::transport::{exchange, NoFlag};

/// CONFIG power-on value.
const CONFIG_DEFAULT: u32 = 0x2E88;
/// OSC_SEL and EXT_CLK: internal oscillator, no clock output.
const CONFIG_CLOCK_BITS: u32 = 0x000F;
/// OC_SD: bridges shut down on overcurrent.
const CONFIG_OC_SD: u32 = 1 << 7;
/// Largest EL_POS value.
const EL_POS_MAX: u16 = 0x1FF;

/// Delay after releasing the reset line before the chip accepts commands.
const POWER_UP_DELAY_MS: u32 = 10;
/// Settle time after asserting reset or cancelling a move.
const SETTLE_DELAY_MS: u32 = 1;

/// L6474 stepper driver.
///
/// Generic over:
/// - `SPI`: SPI device with its own chip select (must implement `SpiDevice`)
/// - `RST`: STBY/RESET pin, active low (must implement `OutputPin`)
/// - `DELAY`: Delay provider (must implement `DelayNs`)
/// - `M`: Motion mode, [`Synchronous`](super::Synchronous) or
///   [`Asynchronous`](super::Asynchronous)
/// - `F`: FLAG pin (defaults to [`NoFlag`])
/// - `L`: Lock type of the shared [`MotionCell`] (defaults to [`NoLock`])
///
/// Every operation except [`state`](Self::state) takes the cell lock for its
/// whole duration and refreshes the cached state from STATUS first.
pub struct L6474<'a, SPI, RST, DELAY, M, F = NoFlag, L = NoLock>
where
    SPI: SpiDevice,
    RST: OutputPin,
    DELAY: DelayNs,
    M: MotionMode<'a, L>,
    F: InputPin,
    L: Lock,
{
    /// SPI device.
    spi: SPI,

    /// STBY/RESET line.
    reset: RST,

    /// Delay provider for reset and power-up timing.
    delay: DELAY,

    /// Pulse generator.
    motion: M,

    /// FLAG input, if wired.
    flag: Option<F>,

    /// Outstanding-move flag and lock, shared with completion tokens.
    cell: &'a MotionCell<L>,

    /// Options applied by `initialize`.
    options: DriverOptions,

    /// Cached operating state.
    state: State,

    /// Last known register values.
    image: RegisterImage,
}

/// Capabilities handed back by [`L6474::release`].
#[derive(Debug)]
pub struct Parts<SPI, RST, DELAY, M, F> {
    /// SPI device.
    pub spi: SPI,
    /// STBY/RESET line, left asserted.
    pub reset: RST,
    /// Delay provider.
    pub delay: DELAY,
    /// Pulse generator.
    pub motion: M,
    /// FLAG input, if one was supplied.
    pub flag: Option<F>,
}

impl<'a, SPI, RST, DELAY, M, F, L> L6474<'a, SPI, RST, DELAY, M, F, L>
where
    SPI: SpiDevice,
    RST: OutputPin,
    DELAY: DelayNs,
    M: MotionMode<'a, L>,
    F: InputPin,
    L: Lock,
{
    /// Create a driver with the reset line asserted.
    pub(crate) fn new(
        spi: SPI,
        mut reset: RST,
        delay: DELAY,
        motion: M,
        flag: Option<F>,
        cell: &'a MotionCell<L>,
        options: DriverOptions,
    ) -> Result<Self> {
        reset.set_low().map_err(|_e| Error::Internal)?;
        cell.set_pending(false);

        Ok(Self {
            spi,
            reset,
            delay,
            motion,
            flag,
            cell,
            options,
            state: State::Reset,
            image: RegisterImage::power_on(),
        })
    }

    /// Tear the driver down: assert the reset line and return the parts.
    ///
    /// On failure the driver is handed back unchanged together with the error.
    pub fn release(
        mut self,
    ) -> core::result::Result<Parts<SPI, RST, DELAY, M, F>, (Self, Error)> {
        let cell = self.cell;
        let guard = match LockGuard::acquire(cell.lock()) {
            Ok(guard) => guard,
            Err(e) => return Err((self, e)),
        };

        if self.reset.set_low().is_err() {
            drop(guard);
            return Err((self, Error::Internal));
        }
        self.state = State::Reset;
        drop(guard);

        info!("driver released");
        Ok(Parts {
            spi: self.spi,
            reset: self.reset,
            delay: self.delay,
            motion: self.motion,
            flag: self.flag,
        })
    }

    /// Cached operating state, without talking to the chip.
    #[inline]
    pub fn state(&self) -> State {
        self.state
    }

    /// Options applied by `initialize`.
    #[inline]
    pub fn options(&self) -> DriverOptions {
        self.options
    }

    /// Register values from the last successful reads and writes.
    #[inline]
    pub fn register_image(&self) -> &RegisterImage {
        &self.image
    }

    // ---- Lifecycle ----

    /// Put the chip into standby.
    ///
    /// Cancels an outstanding asynchronous move, disables the bridges if
    /// they are on and asserts the reset line. Valid from any state.
    pub fn reset_standby(&mut self) -> Result<()> {
        self.locked(|dev| dev.enter_standby())
    }

    /// Reset the chip and write the base parameters.
    ///
    /// Ends in [`State::Disabled`]. On failure the reset line is asserted,
    /// the state is [`State::Reset`] and the first error is returned.
    pub fn initialize(&mut self, parameters: &BaseParameters) -> Result<()> {
        self.locked(|dev| {
            let _ = dev.status_command();
            let standby = if dev.state != State::Reset {
                dev.enter_standby()
            } else {
                Ok(())
            };

            match standby.and_then(|()| dev.configure(parameters)) {
                Ok(()) => {
                    info!("initialized, step mode {}", parameters.step_mode);
                    Ok(())
                }
                Err(e) => {
                    warn!("initialization failed: {}", e);
                    let _ = dev.reset.set_low();
                    dev.set_state(State::Reset);
                    Err(e)
                }
            }
        })
    }

    /// Switch the power bridges on or off.
    pub fn set_power_outputs(&mut self, enable: bool) -> Result<()> {
        self.operational(|dev| {
            if enable {
                dev.enable_command()
            } else {
                dev.disable_command()
            }
        })
    }

    /// Read and decode STATUS. Reading clears the latched fault bits.
    pub fn status(&mut self) -> Result<StatusFlags> {
        self.locked(|dev| {
            let _ = dev.status_command();
            let raw = dev.status_command()?;
            Ok(StatusFlags::from_raw(raw, dev.cell.is_pending()))
        })
    }

    // ---- Registers ----

    /// Current step resolution.
    pub fn step_mode(&mut self) -> Result<StepMode> {
        self.read_operational(Register::StepMode)
            .map(|raw| StepMode::from_register(raw as u8))
    }

    /// Change the step resolution. Only allowed while disabled.
    pub fn set_step_mode(&mut self, mode: StepMode) -> Result<()> {
        self.write_operational(Register::StepMode, u32::from(mode.register_value()))
    }

    /// Absolute position in microsteps.
    pub fn absolute_position(&mut self) -> Result<i32> {
        self.read_operational(Register::AbsPos).map(position::decode)
    }

    /// Overwrite the absolute position.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if the position does not fit 22 bits.
    pub fn set_absolute_position(&mut self, position: i32) -> Result<()> {
        if !position::in_range(position) {
            return Err(Error::InvalidArgument);
        }
        self.write_operational(Register::AbsPos, position::encode(position))
    }

    /// Electrical position: full step in bits 8:7, microstep in bits 6:0.
    pub fn electrical_position(&mut self) -> Result<u16> {
        self.read_operational(Register::ElPos).map(|raw| raw as u16)
    }

    /// Overwrite the electrical position.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if the value exceeds 9 bits.
    pub fn set_electrical_position(&mut self, position: u16) -> Result<()> {
        if position > EL_POS_MAX {
            return Err(Error::InvalidArgument);
        }
        self.write_operational(Register::ElPos, u32::from(position))
    }

    /// Position mark in microsteps.
    pub fn position_mark(&mut self) -> Result<i32> {
        self.read_operational(Register::Mark).map(position::decode)
    }

    /// Overwrite the position mark.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if the position does not fit 22 bits.
    pub fn set_position_mark(&mut self, position: i32) -> Result<()> {
        if !position::in_range(position) {
            return Err(Error::InvalidArgument);
        }
        self.write_operational(Register::Mark, position::encode(position))
    }

    /// Enabled alarms.
    pub fn alarm_enables(&mut self) -> Result<AlarmEnables> {
        self.read_operational(Register::AlarmEn)
            .map(|raw| AlarmEnables::from_bits_retain(raw as u8))
    }

    /// Select which conditions raise FLAG.
    pub fn set_alarm_enables(&mut self, alarms: AlarmEnables) -> Result<()> {
        self.write_operational(Register::AlarmEn, u32::from(alarms.bits()))
    }

    /// Read a property register.
    pub fn property(&mut self, property: Property) -> Result<u32> {
        self.read_operational(property.register())
    }

    /// Write a property register; the value is masked to its width.
    ///
    /// # Errors
    ///
    /// `Forbidden` for [`Property::AdcOut`]. `InvalidState` for the timing
    /// properties while the bridges are enabled.
    pub fn set_property(&mut self, property: Property, value: u32) -> Result<()> {
        self.write_operational(property.register(), value)
    }

    /// Read any defined register by address.
    pub fn read_register(&mut self, address: u8) -> Result<u32> {
        self.locked(|dev| {
            let _ = dev.status_command();
            dev.get_param(address)
        })
    }

    /// Write any defined register by address; the value is masked to its width.
    pub fn write_register(&mut self, address: u8, value: u32) -> Result<()> {
        self.locked(|dev| {
            let _ = dev.status_command();
            dev.set_param(address, value)
        })
    }

    // ---- Motion ----

    /// Move by `steps` microsteps; the sign selects the direction.
    ///
    /// Blocks until done in synchronous mode. In asynchronous mode it
    /// returns once the pulse generator started and the move stays pending
    /// until its [`Completion`](super::Completion) fires.
    ///
    /// # Errors
    ///
    /// - `NullArgument` for a zero-step move
    /// - `InvalidState` unless the bridges are enabled
    /// - `Pending` while another move is outstanding
    /// - `Internal` if the pulse generator fails
    pub fn step_incremental(&mut self, steps: i32) -> Result<()> {
        if steps == 0 {
            return Err(Error::NullArgument);
        }

        self.locked(|dev| {
            let _ = dev.status_command();
            if dev.state != State::Enabled {
                return Err(Error::InvalidState(dev.state));
            }
            if dev.cell.is_pending() {
                return Err(Error::Pending);
            }

            let direction = Direction::from_steps(steps);
            let pulses = steps.unsigned_abs();
            debug!("step {} pulses {}", direction, pulses);
            dev.motion.execute(dev.cell, direction, pulses)
        })
    }

    /// Cancel the outstanding move.
    ///
    /// Succeeds without action when nothing is pending or the bridges are
    /// off. Synchronous moves cannot be cancelled and yield `Internal`.
    pub fn stop_movement(&mut self) -> Result<()> {
        self.locked(|dev| {
            let _ = dev.status_command();
            if dev.state != State::Enabled || !dev.cell.is_pending() {
                return Ok(());
            }

            dev.motion.cancel()?;
            dev.cell.set_pending(false);
            debug!("move cancelled");
            Ok(())
        })
    }

    /// True while a move is outstanding.
    pub fn is_moving(&mut self) -> Result<bool> {
        self.locked(|dev| Ok(dev.cell.is_pending()))
    }

    /// True if the FLAG output (open drain, active low) is asserted.
    ///
    /// # Errors
    ///
    /// `InvalidState` if no FLAG pin was supplied, `Internal` if the pin
    /// cannot be read.
    pub fn flag_asserted(&mut self) -> Result<bool> {
        self.locked(|dev| {
            let state = dev.state;
            match dev.flag.as_mut() {
                Some(pin) => pin.is_low().map_err(|_e| Error::Internal),
                None => Err(Error::InvalidState(state)),
            }
        })
    }

    // ---- Internals ----

    fn locked<T>(&mut self, op: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let cell = self.cell;
        let _guard = LockGuard::acquire(cell.lock())?;
        op(self)
    }

    /// Lock, refresh, and reject the call in [`State::Reset`].
    fn operational<T>(&mut self, op: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.locked(|dev| {
            let _ = dev.status_command();
            if dev.state == State::Reset {
                return Err(Error::InvalidState(State::Reset));
            }
            op(dev)
        })
    }

    fn read_operational(&mut self, register: Register) -> Result<u32> {
        self.operational(|dev| dev.get_param(register.address()))
    }

    fn write_operational(&mut self, register: Register, value: u32) -> Result<()> {
        self.operational(|dev| dev.set_param(register.address(), value))
    }

    fn set_state(&mut self, state: State) {
        if self.state != state {
            debug!("state {} -> {}", self.state, state);
            self.state = state;
        }
    }

    fn transmit(&mut self, command: Command) -> Result<[u8; 4]> {
        let mut frame = command.encode();
        exchange(&mut self.spi, &mut frame)?;
        let mut response = [0u8; 4];
        response[..frame.len()].copy_from_slice(frame.as_slice());
        Ok(response)
    }

    /// GET_STATUS. Re-derives the cached state from HiZ.
    fn status_command(&mut self) -> Result<u16> {
        if self.state == State::Reset {
            return Err(Error::InvalidState(State::Reset));
        }

        let response = self.transmit(Command::GetStatus)?;
        let raw = decode_status(&response);
        self.image.set(Register::Status, u32::from(raw));

        let state = if status::is_high_z(raw) {
            State::Disabled
        } else {
            State::Enabled
        };
        self.set_state(state);
        Ok(raw)
    }

    /// Read STATUS after a command and reject it if the chip flagged it.
    fn confirm(&mut self) -> Result<()> {
        let raw = self.status_command()?;
        if status::command_rejected(raw) {
            warn!("command rejected, status {:#x}", raw);
            return Err(Error::DeviceState { status: raw });
        }
        Ok(())
    }

    fn get_param(&mut self, address: u8) -> Result<u32> {
        let descriptor = lookup(address).ok_or(Error::InvalidArgument)?;
        if !descriptor.access.is_readable() {
            return Err(Error::Forbidden);
        }
        if self.state == State::Reset {
            return Err(Error::InvalidState(self.state));
        }

        let response = self.transmit(Command::GetParam(descriptor))?;
        let value = decode_param(descriptor, &response);
        self.confirm()?;

        trace!("get {} = {:#x}", descriptor.name, value);
        self.image.set(descriptor.register, value);
        Ok(value)
    }

    fn set_param(&mut self, address: u8, value: u32) -> Result<()> {
        let descriptor = lookup(address).ok_or(Error::InvalidArgument)?;
        if !descriptor.access.is_writable() {
            return Err(Error::Forbidden);
        }
        if self.state == State::Reset
            || (self.state == State::Enabled && descriptor.access.requires_inactive())
        {
            return Err(Error::InvalidState(self.state));
        }

        self.transmit(Command::SetParam(descriptor, value))?;
        self.confirm()?;

        trace!("set {} = {:#x}", descriptor.name, value);
        self.image.set(descriptor.register, value);
        Ok(())
    }

    fn enable_command(&mut self) -> Result<()> {
        match self.state {
            State::Reset => return Err(Error::InvalidState(State::Reset)),
            State::Enabled => return Ok(()),
            State::Disabled => {}
        }

        self.transmit(Command::Enable)?;
        self.confirm()?;
        self.set_state(State::Enabled);
        Ok(())
    }

    fn disable_command(&mut self) -> Result<()> {
        match self.state {
            State::Reset => return Err(Error::InvalidState(State::Reset)),
            State::Disabled => {
                // Bridges may have dropped to HiZ on their own (thermal
                // shutdown) with a move still outstanding.
                if M::ASYNC && self.cell.is_pending() {
                    self.abort_motion();
                }
                return Ok(());
            }
            State::Enabled => {}
        }

        self.transmit(Command::Disable)?;
        self.confirm()?;
        self.set_state(State::Disabled);
        if M::ASYNC {
            self.abort_motion();
        }
        Ok(())
    }

    fn abort_motion(&mut self) {
        self.cell.set_pending(false);
        if self.motion.cancel().is_err() {
            warn!("cancel failed while disabling");
        }
    }

    fn enter_standby(&mut self) -> Result<()> {
        let _ = self.status_command();

        // The bridges may already be in HiZ with a move still outstanding.
        if M::ASYNC && self.cell.is_pending() {
            if self.motion.cancel().is_err() {
                warn!("cancel failed while entering standby");
            }
            self.delay.delay_ms(SETTLE_DELAY_MS);
            self.cell.set_pending(false);
        }

        if self.state == State::Enabled {
            self.disable_command()?;
        }

        let asserted = self.reset.set_low();
        self.set_state(State::Reset);
        self.image.reset();
        self.delay.delay_ms(SETTLE_DELAY_MS);
        asserted.map_err(|_e| Error::Internal)
    }

    fn configure(&mut self, parameters: &BaseParameters) -> Result<()> {
        self.reset.set_high().map_err(|_e| Error::Internal)?;
        self.set_state(State::Disabled);
        self.delay.delay_ms(POWER_UP_DELAY_MS);

        let mut config = CONFIG_DEFAULT & !CONFIG_CLOCK_BITS;
        if self.options.disable_ocd {
            config &= !CONFIG_OC_SD;
        }

        self.set_param(Register::Config.address(), config)?;
        self.set_param(
            Register::OcdTh.address(),
            u32::from(parameters.ocd_threshold.code()),
        )?;
        self.set_param(Register::TVal.address(), u32::from(parameters.torque))?;
        self.set_param(Register::ToffMin.address(), u32::from(parameters.toff_min))?;
        self.set_param(Register::TonMin.address(), u32::from(parameters.ton_min))?;
        self.set_param(Register::TFast.address(), u32::from(parameters.t_fast))?;
        self.set_param(
            Register::StepMode.address(),
            u32::from(parameters.step_mode.register_value()),
        )?;
        self.set_param(
            Register::AlarmEn.address(),
            u32::from(AlarmEnables::ALL.bits()),
        )?;

        // Bridges are already off after reset; DISABLE is sent regardless.
        self.transmit(Command::Disable)?;
        self.confirm()?;
        self.set_state(State::Disabled);

        self.status_command()?;
        let _ = self.get_param(Register::Config.address());
        Ok(())
    }
}
