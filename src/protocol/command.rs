//! Command framing.
//!
//! Every command is an opcode byte followed by up to three payload bytes,
//! MSB first. The chip echoes one byte per byte sent; the byte returned for
//! the opcode is discarded and the rest carry the response value.

use super::registers::Descriptor;

/// NOP opcode.
pub const OP_NOP: u8 = 0x00;
/// SET_PARAM opcode, OR-ed with the register address.
pub const OP_SET_PARAM: u8 = 0x00;
/// GET_PARAM opcode, OR-ed with the register address.
pub const OP_GET_PARAM: u8 = 0x20;
/// ENABLE opcode.
pub const OP_ENABLE: u8 = 0xB8;
/// DISABLE opcode.
pub const OP_DISABLE: u8 = 0xA8;
/// GET_STATUS opcode.
pub const OP_GET_STATUS: u8 = 0xD0;

/// Longest frame: opcode plus a 3-byte register.
pub const MAX_FRAME_LEN: usize = 4;

/// Length of a GET_STATUS frame.
const STATUS_FRAME_LEN: usize = 3;

/// A command understood by the chip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// No operation.
    Nop,
    /// Write a register.
    SetParam(&'static Descriptor, u32),
    /// Read a register.
    GetParam(&'static Descriptor),
    /// Enable the power stage.
    Enable,
    /// Disable the power stage (outputs high impedance).
    Disable,
    /// Read and clear the status register.
    GetStatus,
}

impl Command {
    /// Opcode byte.
    pub fn opcode(&self) -> u8 {
        match self {
            Command::Nop => OP_NOP,
            Command::SetParam(descriptor, _) => OP_SET_PARAM | descriptor.address(),
            Command::GetParam(descriptor) => OP_GET_PARAM | descriptor.address(),
            Command::Enable => OP_ENABLE,
            Command::Disable => OP_DISABLE,
            Command::GetStatus => OP_GET_STATUS,
        }
    }

    /// Build the outgoing frame.
    pub fn encode(&self) -> Frame {
        let mut frame = Frame::new(self.opcode());
        match *self {
            Command::SetParam(descriptor, value) => {
                frame.put_value(descriptor.length, descriptor.clamp(value));
            }
            Command::GetParam(descriptor) => frame.put_value(descriptor.length, 0),
            Command::GetStatus => frame.len = STATUS_FRAME_LEN,
            Command::Nop | Command::Enable | Command::Disable => {}
        }
        frame
    }
}

/// Fixed-capacity byte frame, exchanged in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    bytes: [u8; MAX_FRAME_LEN],
    len: usize,
}

impl Frame {
    fn new(opcode: u8) -> Self {
        Self {
            bytes: [opcode, 0, 0, 0],
            len: 1,
        }
    }

    fn put_value(&mut self, length: u8, value: u32) {
        let length = usize::from(length).min(MAX_FRAME_LEN - 1);
        for i in 0..length {
            let shift = 8 * (length - 1 - i);
            self.bytes[1 + i] = (value >> shift) as u8;
        }
        self.len = 1 + length;
    }

    /// Bytes of the frame.
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    /// Mutable bytes of the frame, overwritten by the response.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.bytes[..self.len]
    }

    /// Frame length in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Always false; a frame carries at least the opcode.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Decode a GET_PARAM response, masked to the register width.
pub fn decode_param(descriptor: &Descriptor, response: &[u8]) -> u32 {
    let length = usize::from(descriptor.length);
    let value = response
        .iter()
        .skip(1)
        .take(length)
        .fold(0u32, |acc, &byte| (acc << 8) | u32::from(byte));
    descriptor.clamp(value)
}

/// Decode a GET_STATUS response.
pub fn decode_status(response: &[u8]) -> u16 {
    match response {
        [_, msb, lsb, ..] => u16::from_be_bytes([*msb, *lsb]),
        _ => 0,
    }
}
