use super::callq::Pop;
use super::lifecycle::Shared;
use super::CloseMode;
use crate::Host;
use std::sync::Arc;

pub(crate) type BoxCallback<T> = Box<dyn FnMut(&mut Host, T) + 'static>;
pub(crate) type BoxFinalizer = Box<dyn FnOnce(&mut Host) + 'static>;

/// Outcome of a single drain step
enum Step {
    /// A payload was delivered, so there may be more
    Delivered,
    /// Queue found empty, bridge still open or producers remain
    Idle,
    /// Queue found empty on a closed bridge with no producers left
    Finalized,
}

/// Owner-thread side of a bridge
///
/// Lives inside the wake handler registered with the [`Host`], so it
/// is only reachable from the owner thread.  It never runs
/// concurrently with itself.
///
/// [`Host`]: struct.Host.html
pub(crate) struct Dispatcher<T: Send + 'static> {
    shared: Arc<Shared<T>>,
    callback: BoxCallback<T>,
    finalizer: Option<BoxFinalizer>,
    iteration_cap: usize,
}

impl<T: Send + 'static> Dispatcher<T> {
    pub fn new(
        shared: Arc<Shared<T>>,
        callback: BoxCallback<T>,
        finalizer: BoxFinalizer,
        iteration_cap: usize,
    ) -> Self {
        Self {
            shared,
            callback,
            finalizer: Some(finalizer),
            iteration_cap,
        }
    }

    /// Entry point from the wake handler
    pub fn handle_wake(&mut self, host: &mut Host, deleted: bool) {
        if deleted {
            // The wake slot has been released after finalize, and this
            // dispatcher is dropped straight after returning
            tracing::trace!(bridge = %self.shared.name, "wake slot released");
            return;
        }
        if self.finalizer.is_none() {
            // Spurious wake after finalize
            return;
        }
        self.dispatch_cycle(host);
    }

    /// Drain up to `iteration_cap` payloads, then yield.  If work
    /// remains when the budget runs out, the waker is re-armed so that
    /// the owner thread comes back on a later turn of its event loop.
    fn dispatch_cycle(&mut self, host: &mut Host) {
        let shared = self.shared.clone();
        let state = &shared.state;
        let mut budget = self.iteration_cap;
        let mut delivered = 0_usize;
        let mut has_more = true;
        while has_more && budget > 0 {
            budget -= 1;
            state.begin_drain();
            has_more = match self.dispatch_one(host) {
                Step::Delivered => {
                    delivered += 1;
                    true
                }
                Step::Idle => false,
                Step::Finalized => return,
            };
            if state.end_drain() {
                has_more = true;
            }
        }
        if has_more {
            shared.queue.rearm(state);
        }
        tracing::trace!(
            bridge = %shared.name,
            delivered,
            rearmed = has_more,
            "drain cycle"
        );
    }

    fn dispatch_one(&mut self, host: &mut Host) -> Step {
        match self.shared.queue.pop() {
            Pop::Item(payload) => {
                (self.callback)(host, payload);
                Step::Delivered
            }
            Pop::Empty { closing } => {
                if closing && self.shared.thread_count() == 0 {
                    self.finalize(host);
                    Step::Finalized
                } else {
                    Step::Idle
                }
            }
        }
    }

    /// Tear down the bridge.  Runs once only, in the owner thread,
    /// with the queue empty, closing set and no producers left.
    fn finalize(&mut self, host: &mut Host) {
        if self.shared.mark_finalized() {
            panic!("Bridge '{}' finalized twice", self.shared.name);
        }
        tracing::debug!(bridge = %self.shared.name, "finalizing");
        let waker = self.shared.queue.take_waker();
        self.shared.drop_host_ref(host);
        if let Some(finalizer) = self.finalizer.take() {
            finalizer(host);
        }
        // Releases the wake slot.  The host calls back with `deleted`
        // set on a later `poll_wake` and then drops this dispatcher.
        drop(waker);
    }
}

impl<T: Send + 'static> Drop for Dispatcher<T> {
    // Unfinalized here only if a callback panicked out of `poll_wake`
    // or the `Host` was dropped with the bridge open.  Nothing can
    // drain the queue after this, so the bridge must not stay open.
    fn drop(&mut self) {
        if self.shared.is_finalized() {
            return;
        }
        tracing::warn!(
            bridge = %self.shared.name,
            "dispatcher lost before finalize; aborting bridge"
        );
        self.shared.close(CloseMode::Abort);
        drop(self.shared.queue.take_waker());
    }
}
