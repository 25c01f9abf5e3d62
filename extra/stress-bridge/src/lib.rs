use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

/// Stand-in for an event loop's poll-waker.  Returns (send, recv)
/// closures.  `recv` blocks until at least one `send` has happened
/// since the last `recv`, and returns how many sends were coalesced
/// into this wake-up, or `None` if `timeout` passed with no send,
/// which under load means a wake-up was lost.
#[allow(clippy::mutex_atomic)]
pub fn notify_channel(
    timeout: Duration,
) -> (impl Fn() + Send + Sync, impl FnMut() -> Option<usize> + Send + Sync) {
    let pair1 = Arc::new((Mutex::new(0_usize), Condvar::new()));
    let pair2 = pair1.clone();
    let mut seen = 0;
    (
        move || {
            let mut lock = pair1.0.lock().unwrap();
            *lock = lock.wrapping_add(1);
            pair1.1.notify_one();
        },
        move || {
            let mut lock = pair2.0.lock().unwrap();
            while *lock == seen {
                let (guard, res) = pair2.1.wait_timeout(lock, timeout).unwrap();
                lock = guard;
                if res.timed_out() && *lock == seen {
                    return None;
                }
            }
            let sends = lock.wrapping_sub(seen);
            seen = *lock;
            Some(sends)
        },
    )
}
