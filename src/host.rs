use crate::waker::WakeHandlers;
use crate::Waker;
use std::collections::VecDeque;

type BoxDeferred = Box<dyn FnOnce(&mut Host) + 'static>;

/// The owner-thread side of the runtime
///
/// It holds every wake handler registered for the owner thread, a
/// queue of deferred calls, and the keep-alive count that tells the
/// event loop whether it still has a reason to keep running.  It
/// provides the calls used by an event loop: [`Host::set_poll_waker`]
/// on startup, then [`Host::poll_wake`] whenever the poll-waker has
/// fired and [`Host::run`] to flush deferred calls.
///
/// A [`Host`] is neither `Send` nor `Sync`.  Everything that must only
/// run in the owner thread, such as [`Bridge`] callbacks and
/// finalizers, is stored here and is only ever called with a
/// `&mut Host`, so it cannot run anywhere else.
///
/// [`Bridge`]: struct.Bridge.html
/// [`Host::poll_wake`]: struct.Host.html#method.poll_wake
/// [`Host::run`]: struct.Host.html#method.run
/// [`Host::set_poll_waker`]: struct.Host.html#method.set_poll_waker
/// [`Host`]: struct.Host.html
pub struct Host {
    wake_handlers: WakeHandlers,
    wake_handlers_unset: bool,
    deferred: VecDeque<BoxDeferred>,
    refs: usize,
}

impl Host {
    /// Construct a [`Host`] instance.  It must then be given a
    /// poll-waker before any [`Waker`] or [`Bridge`] can be created.
    ///
    /// [`Bridge`]: struct.Bridge.html
    /// [`Host`]: struct.Host.html
    /// [`Waker`]: struct.Waker.html
    pub fn new() -> Self {
        Self {
            wake_handlers: WakeHandlers::new(Box::new(|| {})),
            wake_handlers_unset: true,
            deferred: VecDeque::new(),
            refs: 0,
        }
    }

    /// Used to provide the [`Host`] with a means to wake the owner
    /// thread.
    ///
    /// Normally the owner thread will be blocked waiting for I/O
    /// events or some other condition most of the time.  If another
    /// thread wants to get a call into the owner thread, then it
    /// needs a way to interrupt that blocked call.  This is done via
    /// creating an artificial event, for example by writing to an
    /// eventfd or notifying a condition variable.  The event loop
    /// must respond by calling [`Host::poll_wake`] in the owner
    /// thread.
    ///
    /// This may be called only once.
    ///
    /// [`Host::poll_wake`]: struct.Host.html#method.poll_wake
    /// [`Host`]: struct.Host.html
    pub fn set_poll_waker(&mut self, waker: impl Fn() + Send + Sync + 'static) {
        if !self.wake_handlers_unset {
            panic!("Host::set_poll_waker called more than once");
        }
        self.wake_handlers = WakeHandlers::new(Box::new(waker));
        self.wake_handlers_unset = false;
    }

    /// Indicate that the owner thread has been woken up due to a call
    /// from another thread to the poll-waker.  Runs every wake
    /// handler whose [`Waker`] fired since the last call, then
    /// releases the slots of any [`Waker`] instances that were
    /// dropped, calling their handlers one final time with
    /// `deleted == true`.
    ///
    /// [`Waker`]: struct.Waker.html
    pub fn poll_wake(&mut self) {
        // Wake handlers need a `&mut Host`, so we can't hold a borrow
        // on `wake_handlers` whilst calling one.  Instead the handler
        // is pulled out of its slot and put back afterwards.
        for bit in self.wake_handlers.wake_list() {
            if let Some(mut cb) = self.wake_handlers.handler_borrow(bit) {
                cb(self, false);
                self.wake_handlers.handler_restore(bit, cb);
            }
        }
        self.process_waker_drops();
    }

    fn process_waker_drops(&mut self) {
        for bit in self.wake_handlers.drop_list() {
            if let Some(mut cb) = self.wake_handlers.del(bit) {
                cb(self, true);
            }
        }
    }

    /// Register a wake handler and return the [`Waker`] that triggers
    /// it.  The [`Waker`] may be passed to any thread.  When it is
    /// woken, the handler is called with `deleted == false` in the
    /// owner thread during the next [`Host::poll_wake`].  When the
    /// [`Waker`] is dropped, the handler is called one last time with
    /// `deleted == true` and is then dropped.
    ///
    /// Spurious calls may occur, so the handler must check whatever
    /// shared state it is watching.
    ///
    /// This call panics if no poll-waker has yet been set up using
    /// [`Host::set_poll_waker`].
    ///
    /// [`Host::poll_wake`]: struct.Host.html#method.poll_wake
    /// [`Host::set_poll_waker`]: struct.Host.html#method.set_poll_waker
    /// [`Waker`]: struct.Waker.html
    pub fn waker(&mut self, cb: impl FnMut(&mut Host, bool) + 'static) -> Waker {
        if self.wake_handlers_unset {
            panic!("Host::waker() called with no poll-waker set up");
        }
        self.wake_handlers.add(cb)
    }

    /// Defer a call to be run in the owner thread on the next call to
    /// [`Host::run`], after anything already queued.
    ///
    /// A bridge callback runs inside a drain cycle, which is counted
    /// against the bridge's iteration cap.  Longer work triggered by a
    /// payload, or work that creates or tears down other bridges, can
    /// be pushed out of the drain cycle with this, and the event loop
    /// then picks it up by calling [`Host::run`] after
    /// [`Host::poll_wake`].
    ///
    /// [`Host::poll_wake`]: struct.Host.html#method.poll_wake
    /// [`Host::run`]: struct.Host.html#method.run
    pub fn defer(&mut self, f: impl FnOnce(&mut Host) + 'static) {
        self.deferred.push_back(Box::new(f));
    }

    /// Run deferred calls until there are none outstanding, including
    /// those deferred by the calls themselves.  Returns `true` if the
    /// event loop should keep running, i.e. something still holds a
    /// reference on the host.  The event loop should call this once
    /// per turn, after [`Host::poll_wake`], and use the return value
    /// as its exit condition.
    ///
    /// [`Host::poll_wake`]: struct.Host.html#method.poll_wake
    pub fn run(&mut self) -> bool {
        while let Some(cb) = self.deferred.pop_front() {
            cb(self);
        }
        self.is_referenced()
    }

    /// Number of active keep-alive references
    pub fn ref_count(&self) -> usize {
        self.refs
    }

    /// Test whether anything still wants the event loop of the owner
    /// thread kept alive.  This is advisory: the event loop may
    /// choose to exit once it returns `false`.
    pub fn is_referenced(&self) -> bool {
        self.refs != 0
    }

    pub(crate) fn ref_inc(&mut self) {
        self.refs += 1;
    }

    pub(crate) fn ref_dec(&mut self) {
        self.refs = self
            .refs
            .checked_sub(1)
            .expect("Host keep-alive count underflow");
    }

    // For testing
    #[cfg(test)]
    pub(crate) fn wake_handler_count(&self) -> usize {
        self.wake_handlers.handler_count()
    }
}

impl Default for Host {
    fn default() -> Self {
        Self::new()
    }
}
