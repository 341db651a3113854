//! Motion execution: pulse generators, the shared motion cell and locking.
//!
//! The chip moves one microstep per STEP pulse; generating those pulses is
//! delegated to the caller. Two modes exist, chosen when the driver is built:
//!
//! - [`Synchronous`]: a blocking [`StepPulses`] generator. The move has
//!   finished when `step` returns.
//! - [`Asynchronous`]: a non-blocking [`AsyncStepPulses`] generator that is
//!   handed a [`Completion`] token and fires it from its timer or interrupt
//!   once the last pulse went out.
//!
//! The outstanding-move flag and the optional lock live in a [`MotionCell`]
//! shared by reference between the driver and the completion context.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::error::{Error, Result};

/// Direction of a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// Positive step count.
    Forward,
    /// Negative step count.
    Backward,
}

impl Direction {
    /// Get direction from signed step count.
    #[inline]
    pub fn from_steps(steps: i32) -> Self {
        if steps >= 0 {
            Direction::Forward
        } else {
            Direction::Backward
        }
    }

    /// Get the sign multiplier.
    #[inline]
    pub fn sign(self) -> i32 {
        match self {
            Direction::Forward => 1,
            Direction::Backward => -1,
        }
    }
}

/// Optional mutual exclusion around driver calls and completions.
///
/// Implementations should behave like a recursive mutex: a pulse generator
/// may fire its completion from inside `start` while the driver holds the
/// lock.
pub trait Lock {
    /// Acquire the lock. Returns false if it could not be taken.
    fn lock(&self) -> bool;

    /// Release the lock.
    fn unlock(&self);
}

/// Lock that always succeeds.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLock;

impl Lock for NoLock {
    #[inline]
    fn lock(&self) -> bool {
        true
    }

    #[inline]
    fn unlock(&self) {}
}

/// Held lock, released on drop.
pub struct LockGuard<'l, L: Lock + ?Sized> {
    lock: &'l L,
}

impl<'l, L: Lock + ?Sized> LockGuard<'l, L> {
    /// Acquire `lock`, failing with [`Error::Locking`].
    pub fn acquire(lock: &'l L) -> Result<Self> {
        if lock.lock() {
            Ok(Self { lock })
        } else {
            warn!("lock acquisition failed");
            Err(Error::Locking)
        }
    }
}

impl<L: Lock + ?Sized> Drop for LockGuard<'_, L> {
    fn drop(&mut self) {
        self.lock.unlock();
    }
}

/// State shared between the driver and its completion tokens.
///
/// Usually placed in a `static` so an interrupt handler can complete moves:
///
/// ```rust
/// use l6474::MotionCell;
///
/// static MOTION: MotionCell = MotionCell::new();
/// assert!(!MOTION.is_pending());
/// ```
#[derive(Debug)]
pub struct MotionCell<L: Lock = NoLock> {
    lock: L,
    pending: AtomicBool,
    generation: AtomicU32,
}

impl MotionCell<NoLock> {
    /// Cell without locking.
    pub const fn new() -> Self {
        Self::with_lock(NoLock)
    }
}

impl Default for MotionCell<NoLock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: Lock> MotionCell<L> {
    /// Cell guarded by `lock`.
    pub const fn with_lock(lock: L) -> Self {
        Self {
            lock,
            pending: AtomicBool::new(false),
            generation: AtomicU32::new(0),
        }
    }

    /// True while a move is outstanding.
    #[inline]
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::SeqCst)
    }

    /// The lock guarding this cell.
    #[inline]
    pub fn lock(&self) -> &L {
        &self.lock
    }

    /// Mark a move outstanding and hand out a token for it.
    pub(crate) fn begin(&self) -> Completion<'_, L> {
        // Only the lock holder starts moves, so load/store is enough here
        // and keeps the cell usable on targets without compare-and-swap.
        let generation = self.generation.load(Ordering::SeqCst).wrapping_add(1);
        self.generation.store(generation, Ordering::SeqCst);
        self.pending.store(true, Ordering::SeqCst);
        Completion {
            cell: self,
            generation,
        }
    }

    #[inline]
    pub(crate) fn set_pending(&self, pending: bool) {
        self.pending.store(pending, Ordering::SeqCst);
    }
}

/// One-shot token that clears the outstanding-move flag.
///
/// A token belongs to the move that produced it: completing it after that
/// move was cancelled and a newer one started leaves the newer move pending.
#[must_use = "a move stays pending until its completion fires"]
#[derive(Debug)]
pub struct Completion<'a, L: Lock = NoLock> {
    cell: &'a MotionCell<L>,
    generation: u32,
}

impl<'a, L: Lock> Completion<'a, L> {
    /// Signal that the move finished.
    ///
    /// The flag is cleared even when the lock cannot be taken, so a move
    /// never stays pending for good because of one contended completion.
    ///
    /// # Errors
    ///
    /// [`Error::Locking`] if the cell lock could not be acquired.
    pub fn complete(self) -> Result<()> {
        let guard = LockGuard::acquire(&self.cell.lock);
        if self.is_current() {
            self.cell.set_pending(false);
            trace!("move {=u32} completed", self.generation);
        }
        guard.map(drop)
    }

    /// True if no newer move was started since this token was issued.
    pub fn is_current(&self) -> bool {
        self.cell.generation.load(Ordering::SeqCst) == self.generation
    }
}

/// Blocking pulse generator.
pub trait StepPulses {
    /// Generator error.
    type Error: core::fmt::Debug;

    /// Emit `pulses` STEP pulses in `direction`, returning when done.
    fn step(&mut self, direction: Direction, pulses: u32) -> core::result::Result<(), Self::Error>;
}

/// Non-blocking pulse generator with cancellation.
pub trait AsyncStepPulses<'a, L: Lock = NoLock> {
    /// Generator error.
    type Error: core::fmt::Debug;

    /// Start emitting `pulses` STEP pulses and return immediately.
    ///
    /// `completion` must be fired once the last pulse was emitted. It may be
    /// dropped instead if the move is cancelled.
    fn start(
        &mut self,
        direction: Direction,
        pulses: u32,
        completion: Completion<'a, L>,
    ) -> core::result::Result<(), Self::Error>;

    /// Abort the running move.
    fn cancel(&mut self) -> core::result::Result<(), Self::Error>;
}

/// Blocking motion mode.
#[derive(Debug)]
pub struct Synchronous<S>(pub S);

/// Interrupt-driven motion mode.
#[derive(Debug)]
pub struct Asynchronous<A>(pub A);

/// Motion mode selected at construction, [`Synchronous`] or [`Asynchronous`].
pub trait MotionMode<'a, L: Lock>: private::Sealed {
    /// True if moves return before the pulses are out.
    const ASYNC: bool;

    /// Run or start a move, maintaining the outstanding-move flag.
    fn execute(&mut self, cell: &'a MotionCell<L>, direction: Direction, pulses: u32) -> Result<()>;

    /// Abort the running move.
    fn cancel(&mut self) -> Result<()>;
}

impl<'a, L: Lock, S: StepPulses> MotionMode<'a, L> for Synchronous<S> {
    const ASYNC: bool = false;

    fn execute(&mut self, cell: &'a MotionCell<L>, direction: Direction, pulses: u32) -> Result<()> {
        cell.set_pending(true);
        let result = self.0.step(direction, pulses);
        cell.set_pending(false);
        result.map_err(|_e| {
            warn!("step generator failed");
            Error::Internal
        })
    }

    fn cancel(&mut self) -> Result<()> {
        Err(Error::Internal)
    }
}

impl<'a, L: Lock, A: AsyncStepPulses<'a, L>> MotionMode<'a, L> for Asynchronous<A> {
    const ASYNC: bool = true;

    fn execute(&mut self, cell: &'a MotionCell<L>, direction: Direction, pulses: u32) -> Result<()> {
        let completion = cell.begin();
        self.0.start(direction, pulses, completion).map_err(|_e| {
            cell.set_pending(false);
            warn!("step generator refused to start");
            Error::Internal
        })
    }

    fn cancel(&mut self) -> Result<()> {
        self.0.cancel().map_err(|_e| {
            warn!("step generator cancel failed");
            Error::Internal
        })
    }
}

mod private {
    pub trait Sealed {}
    impl<S> Sealed for super::Synchronous<S> {}
    impl<A> Sealed for super::Asynchronous<A> {}
}
