//! Shared helpers for the tests
//!
//! Tests that only need one thread drive the [`Host`] directly and
//! check for poll-waker calls with [`PollSignal::take`], which keeps
//! the order of operations completely under control.  Tests with
//! real producer threads run the owner-thread event loop with
//! [`run_until`], which blocks on the poll-waker like a real event
//! loop would.

mod host;
mod waker;

use crate::Host;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, Once};
use std::time::Duration;

static INIT_LOGGING: Once = Once::new();

/// Send `tracing` output to the test harness.  Only the first call
/// does anything.
pub(crate) fn init_test_logging() {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_test_writer()
            .with_thread_ids(true)
            .with_target(true)
            .with_ansi(false)
            .try_init();
    });
}

/// Stand-in for an event loop's poll-waker.  Counts every call, and
/// lets the owner thread either check for or block on a call.
pub(crate) struct PollSignal {
    pair: Arc<(Mutex<usize>, Condvar)>,
    seen: usize,
}

impl PollSignal {
    /// Create a host with this signal installed as its poll-waker
    pub fn host() -> (Host, Self) {
        init_test_logging();
        let pair = Arc::new((Mutex::new(0_usize), Condvar::new()));
        let pair2 = pair.clone();
        let mut host = Host::new();
        host.set_poll_waker(move || {
            let mut lock = pair2.0.lock().unwrap();
            *lock += 1;
            pair2.1.notify_one();
        });
        (host, Self { pair, seen: 0 })
    }

    /// Total number of poll-waker calls so far
    pub fn arms(&self) -> usize {
        *self.pair.0.lock().unwrap()
    }

    /// Check whether the poll-waker has been called since the last
    /// `take` or `wait`
    pub fn take(&mut self) -> bool {
        let count = self.arms();
        let fired = count != self.seen;
        self.seen = count;
        fired
    }

    /// Block until the poll-waker has been called since the last
    /// `take` or `wait`.  Panics rather than hang the test run.
    pub fn wait(&mut self) {
        let mut lock = self.pair.0.lock().unwrap();
        while *lock == self.seen {
            let (guard, res) = self
                .pair
                .1
                .wait_timeout(lock, Duration::from_secs(10))
                .unwrap();
            lock = guard;
            if res.timed_out() && *lock == self.seen {
                panic!("Timed out waiting for poll-waker");
            }
        }
        self.seen = *lock;
    }
}

/// Run the owner-thread event loop until `done` returns true
pub(crate) fn run_until(host: &mut Host, sig: &mut PollSignal, mut done: impl FnMut() -> bool) {
    while !done() {
        sig.wait();
        host.poll_wake();
        host.run();
    }
}

/// Payload that counts its own drops, to check that nothing is leaked
/// or dropped twice
pub(crate) struct Tracked {
    pub value: usize,
    drops: Arc<AtomicUsize>,
}

impl Tracked {
    pub fn new(value: usize, drops: &Arc<AtomicUsize>) -> Self {
        Self {
            value,
            drops: drops.clone(),
        }
    }
}

impl Drop for Tracked {
    fn drop(&mut self) {
        self.drops.fetch_add(1, Ordering::SeqCst);
    }
}
