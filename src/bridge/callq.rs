use super::state::DispatchState;
use super::{CallMode, CloseMode, PushError};
use crate::Waker;
use std::collections::VecDeque;
use std::mem;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard};

// Contention is expected to be low: every operation under the lock is
// O(1) and no callback ever runs with the lock held.  So hopefully
// almost all locks are handled in userspace without going to the OS.
pub(crate) struct CallQueue<T: Send + 'static> {
    mutex: Mutex<CallQueueInner<T>>,
    condvar: Condvar,
    max: usize,
}

struct CallQueueInner<T> {
    closing: bool,
    items: VecDeque<T>,
    waker: Option<Waker>, // None once finalized
}

/// Result of taking one payload off the queue
pub(crate) enum Pop<T> {
    Item(T),
    Empty { closing: bool },
}

impl<T: Send + 'static> CallQueue<T> {
    pub fn new(max: usize) -> Self {
        Self {
            mutex: Mutex::new(CallQueueInner {
                closing: false,
                items: VecDeque::new(),
                waker: None,
            }),
            condvar: Condvar::new(),
            max,
        }
    }

    fn lock(&self) -> MutexGuard<'_, CallQueueInner<T>> {
        self.mutex.lock().expect("callbridge queue lock poisoned")
    }

    pub fn set_waker(&self, waker: Waker) {
        self.lock().waker = Some(waker);
    }

    /// Take the waker out, so that dropping it releases the wake slot
    pub fn take_waker(&self) -> Option<Waker> {
        self.lock().waker.take()
    }

    /// Append a payload, blocking whilst a bounded queue is full if
    /// `mode` allows.  A producer blocked here that sees the bridge
    /// close gets its payload back as `Closed`.
    pub fn push(&self, payload: T, mode: CallMode, state: &DispatchState) -> Result<(), PushError<T>> {
        let mut lock = self.lock();
        loop {
            if lock.closing {
                return Err(PushError::Closed(payload));
            }
            if self.max == 0 || lock.items.len() < self.max {
                break;
            }
            match mode {
                CallMode::NonBlocking => return Err(PushError::Full(payload)),
                CallMode::Blocking => {
                    lock = self
                        .condvar
                        .wait(lock)
                        .expect("callbridge queue lock poisoned");
                }
            }
        }
        lock.items.push_back(payload);
        Self::wake(&lock, state);
        Ok(())
    }

    /// Count in another producer unless the queue is closing.  Returns
    /// the previous producer count, or `None` if closing.
    pub fn try_join(&self, threads: &AtomicUsize) -> Option<usize> {
        let lock = self.lock();
        if lock.closing {
            return None;
        }
        let prev = threads.fetch_add(1, Ordering::AcqRel);
        drop(lock);
        Some(prev)
    }

    /// Remove the front payload.  Any producer blocked on a full
    /// queue is given the chance to take the freed slot.
    pub fn pop(&self) -> Pop<T> {
        let mut lock = self.lock();
        match lock.items.pop_front() {
            Some(item) => {
                drop(lock);
                if self.max != 0 {
                    self.condvar.notify_one();
                }
                Pop::Item(item)
            }
            None => Pop::Empty {
                closing: lock.closing,
            },
        }
    }

    /// Set the closing flag, wake all blocked producers and make sure
    /// the owner thread comes round to drain and finalize.  With
    /// `CloseMode::Abort` the queued payloads are removed and returned
    /// so that the caller can drop them outside of the lock.
    pub fn close(&self, mode: CloseMode, state: &DispatchState) -> VecDeque<T> {
        let mut lock = self.lock();
        lock.closing = true;
        let discarded = match mode {
            CloseMode::Drain => VecDeque::new(),
            CloseMode::Abort => mem::take(&mut lock.items),
        };
        Self::wake(&lock, state);
        drop(lock);
        self.condvar.notify_all();
        discarded
    }

    /// Arm the waker unconditionally.  Used by the drain loop when it
    /// yields with work outstanding.
    pub fn rearm(&self, state: &DispatchState) {
        state.force_pending();
        if let Some(ref waker) = self.lock().waker {
            waker.wake();
        }
    }

    fn wake(lock: &CallQueueInner<T>, state: &DispatchState) {
        if state.request_wake() {
            if let Some(ref waker) = lock.waker {
                waker.wake();
            }
        }
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_closing(&self) -> bool {
        self.lock().closing
    }

    pub fn max(&self) -> usize {
        self.max
    }
}
