//! **callbridge** lets any number of producer threads queue calls to
//! a callback that may only run in one designated owner thread, the
//! thread that drives a cooperative event loop.  It is designed to be
//! layered on top of whatever event loop the owner thread already
//! runs.  The owner thread is woken at most as often as necessary, and
//! is never starved by a burst of incoming work.
//!
//! - [Overview of types](#overview-of-types)
//! - [Efficiency](#efficiency)
//! - [Shutdown](#shutdown)
//! - [Main loop example](#main-loop-example)
//!
//! # Overview of types
//!
//! [`Host`] is the owner-thread side.  It holds the wake handlers and
//! callbacks, and provides the calls that the event loop makes.  It
//! is neither `Send` nor `Sync`, which guarantees that callbacks and
//! finalizers only ever run in the owner thread.
//!
//! [`Waker`] is the primitive which allows another thread to schedule
//! a call to a wake handler in the owner thread.  Wake-ups coalesce:
//! any number of wakes before the owner thread gets round to it
//! produce a single call.
//!
//! [`Bridge`] is a producer reference to a call queue whose callback
//! runs in the owner thread.  It may be sent to any thread, and
//! further references may be acquired for more threads.
//! [`BridgeConfig`] sets the queue capacity and the drain budget.
//!
//! # Efficiency
//!
//! A push takes the queue lock for a constant-time append, and then
//! in the common case costs just one atomic operation to decide that
//! no wake-up is required, because the owner thread is already
//! draining or is already due to be woken.  Only the push that finds
//! the bridge idle arms the [`Waker`].
//!
//! In the owner thread, each wake-up runs a drain cycle which
//! delivers at most `iteration_cap` payloads.  If work remains, the
//! [`Waker`] is re-armed and control returns to the event loop, so
//! timers and I/O on the owner thread still get serviced under a
//! sustained flood of calls.
//!
//! # Shutdown
//!
//! A bridge starts closing when its last producer reference is
//! released, or when [`Bridge::request_close`] is called.  From then
//! on no payloads or producers are accepted.  With
//! [`CloseMode::Drain`] the queue is still delivered in full, and with
//! [`CloseMode::Abort`] it is dropped unseen.  Once closing, empty
//! and unreferenced, the finalizer runs exactly once in the owner
//! thread.
//!
//! # Main loop example
//!
//! ```
//! use callbridge::{Bridge, BridgeConfig, Host};
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use std::sync::mpsc;
//!
//! // A full channel means a wake-up is already outstanding
//! let (wake_tx, wake_rx) = mpsc::sync_channel(1);
//! let mut host = Host::new();
//! host.set_poll_waker(move || {
//!     let _ = wake_tx.try_send(());
//! });
//!
//! let total = Rc::new(RefCell::new(0_u64));
//! let total2 = total.clone();
//! let bridge = Bridge::new(
//!     &mut host,
//!     BridgeConfig::new("sum"),
//!     move |_, v: u64| *total2.borrow_mut() += v,
//!     |_| println!("bridge finalized"),
//! );
//!
//! let producers: Vec<_> = (0..4)
//!     .map(|_| {
//!         let b = bridge.acquire().unwrap();
//!         std::thread::spawn(move || {
//!             for v in 1..=100 {
//!                 b.call(v).unwrap();
//!             }
//!         })
//!     })
//!     .collect();
//! drop(bridge);
//! for p in producers {
//!     p.join().unwrap();
//! }
//!
//! // Event loop: wait for a wake-up, then let the host handle it
//! loop {
//!     wake_rx.recv().unwrap();
//!     host.poll_wake();
//!     if !host.run() {
//!         break;
//!     }
//! }
//! assert_eq!(*total.borrow(), 4 * 5050);
//! ```
//!
//! [`Bridge::request_close`]: struct.Bridge.html#method.request_close
//! [`BridgeConfig`]: struct.BridgeConfig.html
//! [`Bridge`]: struct.Bridge.html
//! [`CloseMode::Abort`]: enum.CloseMode.html#variant.Abort
//! [`CloseMode::Drain`]: enum.CloseMode.html#variant.Drain
//! [`Host`]: struct.Host.html
//! [`Waker`]: struct.Waker.html

// Insist on 2018 style
#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

pub use bridge::{
    AcquireError, Bridge, BridgeConfig, CallMode, CloseMode, PushError, DEFAULT_ITERATION_CAP,
};
pub use host::Host;
pub use waker::Waker;

// Static assertions
static_assertions::assert_not_impl_any!(Host: Send, Sync);
static_assertions::assert_not_impl_any!(Waker: Clone);
static_assertions::assert_not_impl_any!(Bridge<u8>: Clone);
static_assertions::assert_impl_all!(Waker: Send, Sync);
static_assertions::assert_impl_all!(Bridge<u8>: Send, Sync);
static_assertions::assert_impl_all!(CallMode: Copy, Clone);
static_assertions::assert_impl_all!(CloseMode: Copy, Clone);
static_assertions::assert_impl_all!(PushError<u8>: std::error::Error);

mod bridge;
mod host;
mod waker;

#[cfg(test)]
mod test;
