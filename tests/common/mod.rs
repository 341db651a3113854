//! Simulated L6474 for integration tests.
//!
//! The chip is shared through `Rc<RefCell<_>>` between the SPI device, the
//! reset pin, the FLAG pin and the pulse generators handed to the driver,
//! so tests can inspect and poke it while the driver owns the parts.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{self, InputPin, OutputPin};
use embedded_hal::spi::{self, Operation, SpiDevice};

use l6474::{
    AsyncStepPulses, Asynchronous, Completion, Direction, L6474, MotionCell, StepPulses,
    Synchronous,
};

pub const ABS_POS: u8 = 0x01;
pub const EL_POS: u8 = 0x02;
pub const MARK: u8 = 0x03;
pub const TVAL: u8 = 0x09;
pub const T_FAST: u8 = 0x0E;
pub const TON_MIN: u8 = 0x0F;
pub const TOFF_MIN: u8 = 0x10;
pub const ADC_OUT: u8 = 0x12;
pub const OCD_TH: u8 = 0x13;
pub const STEP_MODE: u8 = 0x16;
pub const ALARM_EN: u8 = 0x17;
pub const CONFIG: u8 = 0x18;
pub const STATUS: u8 = 0x19;

const HIGH_Z: u16 = 1 << 0;
const DIRECTION: u16 = 1 << 4;
const NOT_PERFORMED: u16 = 1 << 7;
const WRONG_COMMAND: u16 = 1 << 8;
const UVLO_N: u16 = 1 << 9;
const TH_WRN_N: u16 = 1 << 10;
const TH_SD_N: u16 = 1 << 11;
const OCD_N: u16 = 1 << 12;

/// `(length, mask, writable only in HiZ)` of each register the chip knows.
fn layout(address: u8) -> Option<(usize, u32, bool)> {
    match address {
        ABS_POS | MARK => Some((3, 0x3F_FFFF, false)),
        EL_POS => Some((2, 0x1FF, false)),
        TVAL => Some((1, 0x7F, false)),
        T_FAST | STEP_MODE => Some((1, 0xFF, true)),
        TON_MIN | TOFF_MIN => Some((1, 0x7F, true)),
        ADC_OUT => Some((1, 0x1F, false)),
        OCD_TH => Some((1, 0x0F, false)),
        ALARM_EN => Some((1, 0xFF, false)),
        CONFIG => Some((2, 0xFFFF, true)),
        STATUS => Some((2, 0xFFFF, false)),
        _ => None,
    }
}

/// Command being received.
#[derive(Debug, Clone, Copy)]
enum Receiving {
    Idle,
    Set { address: u8, remaining: usize, value: u32 },
    Discard { remaining: usize },
}

/// Observable chip state.
#[derive(Debug)]
pub struct ChipState {
    pub registers: [u32; 32],
    pub reset_asserted: bool,
    pub high_z: bool,
    pub forward: bool,
    pub not_performed: bool,
    pub wrong_command: bool,
    pub undervoltage: bool,
    pub thermal_warning: bool,
    pub thermal_shutdown: bool,
    pub overcurrent: bool,
    pub flag_asserted: bool,
    pub fail_spi: bool,
    /// Fault bits survive GET_STATUS.
    pub hold_faults: bool,
    /// NOTPERF_CMD and WRONG_CMD survive GET_STATUS.
    pub hold_command_flags: bool,
    /// Every SET is answered with NOTPERF_CMD.
    pub refuse_writes: bool,
    /// Every byte received on MOSI.
    pub received: Vec<u8>,
    /// Every command byte received.
    pub opcodes: Vec<u8>,
    receiving: Receiving,
    outgoing: VecDeque<u8>,
}

impl ChipState {
    fn power_on() -> Self {
        let mut chip = Self {
            registers: [0; 32],
            reset_asserted: true,
            high_z: true,
            forward: true,
            not_performed: false,
            wrong_command: false,
            undervoltage: false,
            thermal_warning: false,
            thermal_shutdown: false,
            overcurrent: false,
            flag_asserted: false,
            fail_spi: false,
            hold_faults: false,
            hold_command_flags: false,
            refuse_writes: false,
            received: Vec::new(),
            opcodes: Vec::new(),
            receiving: Receiving::Idle,
            outgoing: VecDeque::new(),
        };
        chip.load_defaults();
        chip
    }

    fn load_defaults(&mut self) {
        self.registers = [0; 32];
        self.registers[T_FAST as usize] = 0x19;
        self.registers[TON_MIN as usize] = 0x29;
        self.registers[TOFF_MIN as usize] = 0x29;
        self.registers[TVAL as usize] = 0x29;
        self.registers[OCD_TH as usize] = 0x08;
        self.registers[STEP_MODE as usize] = 0x07;
        self.registers[ALARM_EN as usize] = 0xFF;
        self.registers[CONFIG as usize] = 0x2E88;
        self.high_z = true;
        self.receiving = Receiving::Idle;
        self.outgoing.clear();
    }

    /// Current STATUS word.
    pub fn status_word(&self) -> u16 {
        let mut word = 0;
        if self.high_z {
            word |= HIGH_Z;
        }
        if self.forward {
            word |= DIRECTION;
        }
        if self.not_performed {
            word |= NOT_PERFORMED;
        }
        if self.wrong_command {
            word |= WRONG_COMMAND;
        }
        if !self.undervoltage {
            word |= UVLO_N;
        }
        if !self.thermal_warning {
            word |= TH_WRN_N;
        }
        if !self.thermal_shutdown {
            word |= TH_SD_N;
        }
        if !self.overcurrent {
            word |= OCD_N;
        }
        word
    }

    /// Register value.
    pub fn register(&self, address: u8) -> u32 {
        self.registers[address as usize]
    }

    /// Microsteps per STEP pulse at the current resolution.
    pub fn microsteps(&self) -> i32 {
        1 << (self.registers[STEP_MODE as usize] & 0x07).min(4)
    }

    /// Advance ABS_POS as the pulses would, when the bridges are on.
    pub fn apply_pulses(&mut self, direction: Direction, pulses: u32) {
        self.forward = direction == Direction::Forward;
        if self.high_z || self.reset_asserted {
            return;
        }
        let delta = direction.sign() * pulses as i32 * self.microsteps();
        let position = self.registers[ABS_POS as usize] as i32;
        self.registers[ABS_POS as usize] = (position.wrapping_add(delta) as u32) & 0x3F_FFFF;
    }

    fn exchange(&mut self, incoming: u8) -> u8 {
        let outgoing = self.outgoing.pop_front().unwrap_or(0);
        self.received.push(incoming);
        if self.reset_asserted {
            return 0;
        }

        self.receiving = match self.receiving {
            Receiving::Idle => self.decode(incoming),
            Receiving::Set {
                address,
                remaining,
                value,
            } => {
                let value = (value << 8) | u32::from(incoming);
                if remaining == 1 {
                    self.finish_set(address, value);
                    Receiving::Idle
                } else {
                    Receiving::Set {
                        address,
                        remaining: remaining - 1,
                        value,
                    }
                }
            }
            Receiving::Discard { remaining } if remaining > 1 => Receiving::Discard {
                remaining: remaining - 1,
            },
            Receiving::Discard { .. } => Receiving::Idle,
        };
        outgoing
    }

    fn decode(&mut self, opcode: u8) -> Receiving {
        self.opcodes.push(opcode);
        match opcode {
            0x00 => Receiving::Idle,
            0x01..=0x1F => match layout(opcode) {
                Some((length, _, _)) => Receiving::Set {
                    address: opcode,
                    remaining: length,
                    value: 0,
                },
                None => {
                    self.wrong_command = true;
                    Receiving::Idle
                }
            },
            0x20..=0x3F => {
                let address = opcode & 0x1F;
                match layout(address) {
                    Some((length, mask, _)) => {
                        let value = if address == STATUS {
                            u32::from(self.status_word())
                        } else {
                            self.registers[address as usize] & mask
                        };
                        for i in (0..length).rev() {
                            self.outgoing.push_back((value >> (8 * i)) as u8);
                        }
                        Receiving::Discard { remaining: length }
                    }
                    None => {
                        self.wrong_command = true;
                        Receiving::Idle
                    }
                }
            }
            0xB8 => {
                self.high_z = false;
                Receiving::Idle
            }
            0xA8 => {
                self.high_z = true;
                Receiving::Idle
            }
            0xD0 => {
                let [msb, lsb] = self.status_word().to_be_bytes();
                self.outgoing.push_back(msb);
                self.outgoing.push_back(lsb);
                self.clear_latched();
                Receiving::Discard { remaining: 2 }
            }
            _ => {
                self.wrong_command = true;
                Receiving::Idle
            }
        }
    }

    fn finish_set(&mut self, address: u8, value: u32) {
        if self.refuse_writes {
            self.not_performed = true;
            return;
        }
        match layout(address) {
            Some((_, _, true)) if !self.high_z => self.not_performed = true,
            Some((_, _, _)) if address == ADC_OUT || address == STATUS => {
                self.wrong_command = true
            }
            Some((_, mask, _)) => self.registers[address as usize] = value & mask,
            None => self.wrong_command = true,
        }
    }

    fn clear_latched(&mut self) {
        if !self.hold_command_flags {
            self.not_performed = false;
            self.wrong_command = false;
        }
        if self.hold_faults {
            return;
        }
        self.undervoltage = false;
        self.thermal_warning = false;
        self.thermal_shutdown = false;
        self.overcurrent = false;
    }
}

pub type Chip = Rc<RefCell<ChipState>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimError;

impl spi::Error for SimError {
    fn kind(&self) -> spi::ErrorKind {
        spi::ErrorKind::Other
    }
}

impl digital::Error for SimError {
    fn kind(&self) -> digital::ErrorKind {
        digital::ErrorKind::Other
    }
}

/// SPI side of the chip.
pub struct SimSpi {
    chip: Chip,
}

impl spi::ErrorType for SimSpi {
    type Error = SimError;
}

impl SpiDevice for SimSpi {
    fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), SimError> {
        let mut chip = self.chip.borrow_mut();
        if chip.fail_spi {
            return Err(SimError);
        }
        for operation in operations {
            match operation {
                Operation::TransferInPlace(buf) => {
                    for byte in buf.iter_mut() {
                        *byte = chip.exchange(*byte);
                    }
                }
                Operation::Transfer(read, write) => {
                    for (i, &byte) in write.iter().enumerate() {
                        let response = chip.exchange(byte);
                        if let Some(slot) = read.get_mut(i) {
                            *slot = response;
                        }
                    }
                }
                Operation::Write(write) => {
                    for &byte in write.iter() {
                        chip.exchange(byte);
                    }
                }
                Operation::Read(read) => {
                    for slot in read.iter_mut() {
                        *slot = chip.exchange(0);
                    }
                }
                Operation::DelayNs(_) => {}
            }
        }
        Ok(())
    }
}

/// STBY/RESET line, active low.
pub struct SimResetPin {
    chip: Chip,
}

impl digital::ErrorType for SimResetPin {
    type Error = core::convert::Infallible;
}

impl OutputPin for SimResetPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        let mut chip = self.chip.borrow_mut();
        chip.reset_asserted = true;
        chip.load_defaults();
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.chip.borrow_mut().reset_asserted = false;
        Ok(())
    }
}

/// FLAG output, open drain active low.
pub struct SimFlagPin {
    chip: Chip,
}

impl digital::ErrorType for SimFlagPin {
    type Error = core::convert::Infallible;
}

impl InputPin for SimFlagPin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.chip.borrow().flag_asserted)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(self.chip.borrow().flag_asserted)
    }
}

/// Delay that only records the requested time.
#[derive(Clone, Default)]
pub struct SimDelay {
    pub total_ns: Rc<Cell<u64>>,
}

impl DelayNs for SimDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ns.set(self.total_ns.get() + u64::from(ns));
    }
}

/// Blocking pulse generator.
pub struct SimStepper {
    chip: Chip,
    pub moves: Rc<RefCell<Vec<(Direction, u32)>>>,
    pub fail: Rc<Cell<bool>>,
}

impl StepPulses for SimStepper {
    type Error = SimError;

    fn step(&mut self, direction: Direction, pulses: u32) -> Result<(), SimError> {
        if self.fail.get() {
            return Err(SimError);
        }
        self.moves.borrow_mut().push((direction, pulses));
        self.chip.borrow_mut().apply_pulses(direction, pulses);
        Ok(())
    }
}

type InFlight = Rc<RefCell<Option<(Direction, u32, Completion<'static>)>>>;

/// Interrupt-driven pulse generator. Moves stay in flight until the test
/// calls [`AsyncControl::finish`].
pub struct SimAsyncStepper {
    in_flight: InFlight,
    cancels: Rc<Cell<u32>>,
    starts: Rc<Cell<u32>>,
    refuse: Rc<Cell<bool>>,
}

impl AsyncStepPulses<'static> for SimAsyncStepper {
    type Error = SimError;

    fn start(
        &mut self,
        direction: Direction,
        pulses: u32,
        completion: Completion<'static>,
    ) -> Result<(), SimError> {
        if self.refuse.get() {
            return Err(SimError);
        }
        self.starts.set(self.starts.get() + 1);
        *self.in_flight.borrow_mut() = Some((direction, pulses, completion));
        Ok(())
    }

    fn cancel(&mut self) -> Result<(), SimError> {
        self.cancels.set(self.cancels.get() + 1);
        self.in_flight.borrow_mut().take();
        Ok(())
    }
}

/// Test-side handle on a [`SimAsyncStepper`].
#[derive(Clone)]
pub struct AsyncControl {
    chip: Chip,
    in_flight: InFlight,
    pub cancels: Rc<Cell<u32>>,
    pub starts: Rc<Cell<u32>>,
    pub refuse: Rc<Cell<bool>>,
}

impl AsyncControl {
    /// True while a move is in flight.
    pub fn busy(&self) -> bool {
        self.in_flight.borrow().is_some()
    }

    /// Emit the in-flight pulses and fire the completion.
    pub fn finish(&self) {
        let (direction, pulses, completion) = self
            .in_flight
            .borrow_mut()
            .take()
            .expect("no move in flight");
        self.chip.borrow_mut().apply_pulses(direction, pulses);
        completion.complete().expect("completion failed");
    }

    /// Force the bridge state behind the driver's back.
    pub fn chip_high_z(&self, high_z: bool) {
        self.chip.borrow_mut().high_z = high_z;
    }

    /// Take the in-flight completion without emitting pulses.
    pub fn take_completion(&self) -> Completion<'static> {
        self.in_flight
            .borrow_mut()
            .take()
            .expect("no move in flight")
            .2
    }
}

pub fn new_chip() -> Chip {
    Rc::new(RefCell::new(ChipState::power_on()))
}

pub fn leak_cell() -> &'static MotionCell {
    Box::leak(Box::new(MotionCell::new()))
}

pub type SyncDriver =
    L6474<'static, SimSpi, SimResetPin, SimDelay, Synchronous<SimStepper>, SimFlagPin>;

pub type AsyncDriver = L6474<'static, SimSpi, SimResetPin, SimDelay, Asynchronous<SimAsyncStepper>>;

/// Handles the tests keep on a synchronous setup.
pub struct SyncRig {
    pub chip: Chip,
    pub delay: SimDelay,
    pub moves: Rc<RefCell<Vec<(Direction, u32)>>>,
    pub fail: Rc<Cell<bool>>,
    pub cell: &'static MotionCell,
}

/// Driver in blocking mode with a FLAG pin.
pub fn sync_driver() -> (SyncDriver, SyncRig) {
    let chip = new_chip();
    let delay = SimDelay::default();
    let moves = Rc::new(RefCell::new(Vec::new()));
    let fail = Rc::new(Cell::new(false));
    let cell = leak_cell();

    let driver = L6474::builder()
        .spi(SimSpi { chip: chip.clone() })
        .reset_pin(SimResetPin { chip: chip.clone() })
        .delay(delay.clone())
        .motion(Synchronous(SimStepper {
            chip: chip.clone(),
            moves: moves.clone(),
            fail: fail.clone(),
        }))
        .motion_cell(cell)
        .flag_pin(SimFlagPin { chip: chip.clone() })
        .build()
        .expect("build failed");

    (
        driver,
        SyncRig {
            chip,
            delay,
            moves,
            fail,
            cell,
        },
    )
}

/// Driver in interrupt-driven mode, without FLAG pin.
pub fn async_driver() -> (AsyncDriver, AsyncControl, &'static MotionCell) {
    let chip = new_chip();
    let in_flight: InFlight = Rc::new(RefCell::new(None));
    let control = AsyncControl {
        chip: chip.clone(),
        in_flight: in_flight.clone(),
        cancels: Rc::new(Cell::new(0)),
        starts: Rc::new(Cell::new(0)),
        refuse: Rc::new(Cell::new(false)),
    };
    let cell = leak_cell();

    let driver = L6474::builder()
        .spi(SimSpi { chip: chip.clone() })
        .reset_pin(SimResetPin { chip: chip.clone() })
        .delay(SimDelay::default())
        .motion(Asynchronous(SimAsyncStepper {
            in_flight,
            cancels: control.cancels.clone(),
            starts: control.starts.clone(),
            refuse: control.refuse.clone(),
        }))
        .motion_cell(cell)
        .build()
        .expect("build failed");

    (driver, control, cell)
}

/// Spare parts for builder tests.
pub fn parts() -> (SimSpi, SimResetPin, SimDelay, SimStepper, Chip) {
    let chip = new_chip();
    (
        SimSpi { chip: chip.clone() },
        SimResetPin { chip: chip.clone() },
        SimDelay::default(),
        SimStepper {
            chip: chip.clone(),
            moves: Rc::new(RefCell::new(Vec::new())),
            fail: Rc::new(Cell::new(false)),
        },
        chip,
    )
}
