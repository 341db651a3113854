//! L6474 SPI protocol: register map, command framing and field codecs.

pub mod command;
pub mod position;
pub mod registers;
pub mod status;

pub use command::{Command, Frame};
pub use registers::{lookup, Access, AlarmEnables, Descriptor, Property, Register, RegisterImage};
pub use status::{Status, StatusFlags};
