//! Cross-thread call bridge
//!
//! # Data flow
//!
//! A producer thread pushes a payload onto the bridge's queue.  If
//! that makes work available on an idle bridge, the bridge's
//! [`Waker`] is armed, which eventually gets the wake handler called
//! in the owner thread during [`Host::poll_wake`].  The wake handler
//! drains the queue in bounded cycles, calling the callback for each
//! payload.  When the bridge has closed and the queue is empty and no
//! producers remain, the finalizer runs and the wake slot is
//! released.
//!
//! # Locking
//!
//! The queue is protected by a mutex which is held only for O(1)
//! operations, never across a callback.  Whether a wake-up is needed
//! is decided by a two-bit atomic state, so that a burst of pushes
//! from many threads costs at most one wake-up per drain cycle.
//!
//! [`Host::poll_wake`]: ../struct.Host.html#method.poll_wake
//! [`Waker`]: ../struct.Waker.html

mod callq;
mod config;
mod dispatch;
mod error;
mod lifecycle;
pub(crate) mod state;

pub use config::{BridgeConfig, DEFAULT_ITERATION_CAP};
pub use error::{AcquireError, PushError};
pub use lifecycle::{Bridge, CallMode, CloseMode};
