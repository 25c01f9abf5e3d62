//! # Inter-thread waking
//!
//! This converts the single poll-waker that we get from the event
//! loop of the owner thread into many, arranged in a two-level bitmap
//! to minimise lookups.  A bitmap is used so that a producer thread
//! wishing to wake its handler in the owner thread doesn't need to
//! remember whether it already has a wake-up request outstanding.
//! The bitmap allows the operation to be ignored quickly if it is
//! already outstanding.
//!
//! ## Layout
//!
//! Wakers are allocated slots in a slab.  Each run of 64 consecutive
//! slots forms a group, and each group has one `AtomicU64` word with
//! a bit per slot.  Above the groups is a single 64-bit summary word,
//! where group `g` maps to summary bit `g % 64`.  So for the first
//! 4096 wakers each summary bit maps to at most one group, and beyond
//! that several groups share a summary bit, which just means a few
//! extra words get swapped when collecting.
//!
//! So the cost of a single "wake" is minimum 1 atomic operation, and
//! maximum 2 atomic operations plus the poll-wake.  The more heavily
//! loaded the owner thread becomes, the less often it collects the
//! wakes, accumulating more each time, so as load goes up the waking
//! mechanism becomes more efficient.
//!
//! ## Drop handling
//!
//! The drop of a [`Waker`] is handled by pushing its slot onto a
//! mutex-protected list and raising a separate drop flag.  On the
//! next `poll_wake` the slot is released from the slab and its
//! handler is called one last time with `deleted` set.  A [`Waker`]
//! is only a lookup key into the slab, never an owner of the handler,
//! so there is no reference cycle between a handler and the
//! [`Waker`] that triggers it.
//!
//! [`Waker`]: struct.Waker.html

use crate::Host;
use slab::Slab;
use std::mem;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

pub(crate) type BoxWakeHandler = Box<dyn FnMut(&mut Host, bool) + 'static>;

const GROUP_BITS: u32 = 6;
const GROUP_SIZE: u32 = 1 << GROUP_BITS;
const LANE_MASK: u32 = GROUP_SIZE - 1;

// `set` sets the bit in the group word and works up to the summary,
// and `drain` clears the summary and works down.  If these cross over
// they must do so in an ordered way, hence SeqCst.  A crossing gives
// at worst a spurious wake, which is harmless.  An unordered crossing
// could leave a group bit set with no summary bit, which would strand
// that wake-up indefinitely.
const ORDERING: Ordering = Ordering::SeqCst;

pub(crate) struct WakeHandlers {
    signal: Arc<WakeSignal>,
    slab: Slab<Option<BoxWakeHandler>>,
    groups: Vec<Arc<WakeGroup>>,
}

impl WakeHandlers {
    pub fn new(poll_waker: Box<dyn Fn() + Send + Sync>) -> Self {
        Self {
            signal: Arc::new(WakeSignal::new(poll_waker)),
            slab: Slab::new(),
            groups: Vec::new(),
        }
    }

    /// Get a list of all the wake handlers that need to run
    pub fn wake_list(&mut self) -> Vec<u32> {
        let mut rv = Vec::new();
        let groups = &self.groups;
        self.signal.summary.drain(|lane| {
            // Slots that were freed since the wake just produce a
            // spurious call to whatever reuses the slot, which every
            // handler must tolerate.
            for group in groups.iter().skip(lane as usize).step_by(GROUP_SIZE as usize) {
                group.bits.drain(|bit| rv.push(group.base + bit));
            }
        });
        rv
    }

    /// Get the list of slots whose [`Waker`] has been dropped, if any
    /// drops have been flagged since the last call.
    ///
    /// [`Waker`]: struct.Waker.html
    pub fn drop_list(&mut self) -> Vec<u32> {
        if !self.signal.drops_pending.swap(false, ORDERING) {
            return Vec::new();
        }
        let mut guard = self
            .signal
            .drop_list
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        mem::take(&mut *guard)
    }

    /// Borrows a wake handler from its slot in the slab, leaving a
    /// `None` there.  Panics if a handler has been borrowed twice.
    /// Returns `None` if the slot is now unoccupied.
    pub fn handler_borrow(&mut self, bit: u32) -> Option<BoxWakeHandler> {
        match self.slab.get_mut(bit as usize) {
            None => None,
            Some(slot) => {
                if let Some(cb) = slot.take() {
                    Some(cb)
                } else {
                    panic!("Wake handler has been borrowed from its slot twice");
                }
            }
        }
    }

    /// Restores a wake handler back into its slot in the slab.  A
    /// slot is only released via the drop list, which is never
    /// processed during a handler call, so a missing or occupied slot
    /// means something has gone badly wrong.
    pub fn handler_restore(&mut self, bit: u32, cb: BoxWakeHandler) {
        let slot = self
            .slab
            .get_mut(bit as usize)
            .expect("WakeHandlers slot unexpectedly deleted during handler call");
        if mem::replace(slot, Some(cb)).is_some() {
            panic!("WakeHandlers slot unexpectedly occupied during wake handler call");
        }
    }

    /// Add a wake handler and return a [`Waker`] to pass to the
    /// producer threads.  The handler must tolerate spurious wakes.
    ///
    /// [`Waker`]: struct.Waker.html
    pub fn add(&mut self, cb: impl FnMut(&mut Host, bool) + 'static) -> Waker {
        let bit = u32::try_from(self.slab.insert(Some(Box::new(cb))))
            .expect("Exceeded 2^32 Waker instances");
        let index = (bit >> GROUP_BITS) as usize;
        while self.groups.len() <= index {
            let base = (self.groups.len() as u32) << GROUP_BITS;
            self.groups.push(Arc::new(WakeGroup {
                bits: Leaf::default(),
                base,
                lane: (base >> GROUP_BITS) & LANE_MASK,
                signal: self.signal.clone(),
            }));
        }
        Waker {
            bit,
            group: self.groups[index].clone(),
        }
    }

    /// Delete a handler, and return it if it was found.  The returned
    /// handler should be called with a `deleted` argument of `true`.
    pub fn del(&mut self, bit: u32) -> Option<BoxWakeHandler> {
        if self.slab.contains(bit as usize) {
            return self.slab.remove(bit as usize);
        }
        None
    }

    /// Check the number of stored handlers (for testing)
    #[cfg(test)]
    pub fn handler_count(&self) -> usize {
        self.slab.len()
    }
}

/// Single-shot coalescing wake-up of a handler in the owner thread
///
/// Obtain an instance using [`Host::waker`], and pass it to whatever
/// threads need to wake the owner thread.  This primitive would
/// normally be used in conjunction with a queue or some other shared
/// state, to alert the wake handler that there is new work.  The
/// [`Bridge`] type is built on it.
///
/// When this is dropped, a final call to the wake handler in the
/// owner thread is scheduled with the `deleted` argument set to
/// true, and then the wake handler is removed and dropped.
///
/// [`Bridge`]: struct.Bridge.html
/// [`Host::waker`]: struct.Host.html#method.waker
pub struct Waker {
    bit: u32,
    group: Arc<WakeGroup>,
}

impl Waker {
    /// Schedule a call to the corresponding wake handler in the owner
    /// thread, if it is not already scheduled.  If it is already
    /// scheduled, or another handler in the same group is, this costs
    /// just one `SeqCst` atomic operation.  Otherwise the summary
    /// word is updated and, if the owner thread has not already been
    /// signalled, the poll-waker is called.
    #[inline]
    pub fn wake(&self) {
        self.group.set(self.bit - self.group.base);
    }
}

impl Drop for Waker {
    fn drop(&mut self) {
        // Ignore poisoning here, to not panic in panic handler
        if let Ok(mut guard) = self.group.signal.drop_list.lock() {
            guard.push(self.bit);
            drop(guard);
            self.group.signal.flag_drops();
        }
    }
}

// A word of 64 wake bits
#[derive(Default)]
struct Leaf {
    bitmap: AtomicU64,
}

impl Leaf {
    /// Returns `true` if the word was previously all-zero
    #[inline]
    fn set(&self, bit: u32) -> bool {
        0 == self.bitmap.fetch_or(1 << bit, ORDERING)
    }
    #[inline]
    fn drain(&self, mut cb: impl FnMut(u32)) {
        let mut bits = self.bitmap.swap(0, ORDERING);
        while bits != 0 {
            let bit = bits.trailing_zeros();
            bits &= !(1 << bit);
            cb(bit);
        }
    }
}

struct WakeGroup {
    bits: Leaf,
    base: u32,
    lane: u32,
    signal: Arc<WakeSignal>,
}

impl WakeGroup {
    #[inline]
    fn set(&self, bit: u32) {
        if self.bits.set(bit) && self.signal.summary.set(self.lane) {
            (self.signal.poll_waker)();
        }
    }
}

/// Interface to the poll-waker of the owner thread
struct WakeSignal {
    // Bit `g % 64` is set if group `g` may have wake bits set
    summary: Leaf,

    // Waker provided by the event loop
    poll_waker: Box<dyn Fn() + Send + Sync + 'static>,

    // Slots whose `Waker` has been dropped
    drop_list: Mutex<Vec<u32>>,
    drops_pending: AtomicBool,
}

impl WakeSignal {
    fn new(poll_waker: Box<dyn Fn() + Send + Sync>) -> Self {
        Self {
            summary: Leaf::default(),
            poll_waker,
            drop_list: Mutex::new(Vec::new()),
            drops_pending: AtomicBool::new(false),
        }
    }

    fn flag_drops(&self) {
        if !self.drops_pending.swap(true, ORDERING) {
            (self.poll_waker)();
        }
    }
}
