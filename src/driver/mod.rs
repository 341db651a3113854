//! L6474 driver with an operating state machine and motion control.
//!
//! Provides [`L6474`] for talking to one chip over embedded-hal 1.0 traits,
//! plus the motion primitives it delegates STEP pulse generation to.

mod builder;
mod device;
pub mod motion;
pub mod state;
mod transport;

pub use builder::L6474Builder;
pub use device::{Parts, L6474};
pub use motion::{
    AsyncStepPulses, Asynchronous, Completion, Direction, Lock, LockGuard, MotionCell,
    MotionMode, NoLock, StepPulses, Synchronous,
};
pub use state::State;
pub use transport::NoFlag;
