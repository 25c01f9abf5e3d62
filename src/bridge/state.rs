//! Coalescing of wake-ups between producers and the drain loop
//!
//! The state is two bits.  `RUNNING` is owned by the owner thread and
//! is set only for the duration of a single drain step.  `PENDING` is
//! set by anyone who has made work available.  The rules are:
//!
//! - `PENDING` with `RUNNING` set means the drain loop must go round
//! again before yielding the owner thread.
//!
//! - `PENDING` with `RUNNING` clear means a wake-up is already on its
//! way to the owner thread (or the drain loop is between two steps
//! and is about to go round again).
//!
//! So only the producer that moves the state from idle (no bits) to
//! `PENDING` needs to arm the waker.  Everybody else coalesces into
//! the wake-up or the drain that is already under way.

use std::sync::atomic::{AtomicU8, Ordering};

const RUNNING: u8 = 1;
const PENDING: u8 = 2;

pub(crate) struct DispatchState {
    bits: AtomicU8,
}

impl DispatchState {
    pub fn new() -> Self {
        Self {
            bits: AtomicU8::new(0),
        }
    }

    /// Flag that work is available.  Returns `true` if the caller
    /// must arm the waker, i.e. there was neither a drain in progress
    /// nor a wake-up already outstanding.
    #[inline]
    pub fn request_wake(&self) -> bool {
        let prev = self.bits.fetch_or(PENDING, Ordering::AcqRel);
        prev & (RUNNING | PENDING) == 0
    }

    /// Flag that work is available regardless of the current state.
    /// The caller must arm the waker unconditionally.  Used by the
    /// drain loop itself when it runs out of budget, since it may be
    /// the one holding the `PENDING` bit.
    #[inline]
    pub fn force_pending(&self) {
        self.bits.fetch_or(PENDING, Ordering::AcqRel);
    }

    /// Enter a drain step.  Consumes any `PENDING` bit, since the step
    /// about to run will see the work it announced.
    #[inline]
    pub fn begin_drain(&self) {
        self.bits.swap(RUNNING, Ordering::AcqRel);
    }

    /// Leave a drain step.  Returns `true` if some producer flagged
    /// work whilst the step was running, in which case the caller
    /// must go round again even if the queue looked empty.
    #[inline]
    pub fn end_drain(&self) -> bool {
        let prev = self.bits.fetch_and(!RUNNING, Ordering::AcqRel);
        prev & PENDING != 0
    }

    #[cfg(test)]
    pub fn is_idle(&self) -> bool {
        self.bits.load(Ordering::Acquire) == 0
    }

    #[cfg(test)]
    pub fn is_pending(&self) -> bool {
        self.bits.load(Ordering::Acquire) & PENDING != 0
    }
}
