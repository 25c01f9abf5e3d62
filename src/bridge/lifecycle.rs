use super::callq::CallQueue;
use super::dispatch::Dispatcher;
use super::state::DispatchState;
use super::{AcquireError, BridgeConfig, PushError};
use crate::Host;
use std::borrow::Cow;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// State shared between all producer references and the owner thread
pub(crate) struct Shared<T: Send + 'static> {
    pub name: Cow<'static, str>,
    pub queue: CallQueue<T>,
    pub state: DispatchState,
    threads: AtomicUsize,
    refed: AtomicBool,
    finalized: AtomicBool,
}

impl<T: Send + 'static> Shared<T> {
    fn new(config: &BridgeConfig) -> Self {
        Self {
            name: config.name.clone(),
            queue: CallQueue::new(config.max_queue_size),
            state: DispatchState::new(),
            threads: AtomicUsize::new(1),
            refed: AtomicBool::new(false),
            finalized: AtomicBool::new(false),
        }
    }

    pub fn thread_count(&self) -> usize {
        self.threads.load(Ordering::Acquire)
    }

    /// Returns `true` if the bridge had already been finalized
    pub fn mark_finalized(&self) -> bool {
        self.finalized.swap(true, Ordering::AcqRel)
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized.load(Ordering::Acquire)
    }

    /// Drop this bridge's keep-alive reference on the host, if held
    pub fn drop_host_ref(&self, host: &mut Host) {
        if self.refed.swap(false, Ordering::AcqRel) {
            host.ref_dec();
        }
    }

    pub fn close(&self, mode: CloseMode) {
        let discarded = self.queue.close(mode, &self.state);
        if !discarded.is_empty() {
            tracing::warn!(
                bridge = %self.name,
                count = discarded.len(),
                "close aborted; discarding queued calls"
            );
        }
        // Payload destructors run here, outside of the queue lock
        drop(discarded);
    }

    fn release(&self) {
        let prev = self.threads.fetch_sub(1, Ordering::AcqRel);
        debug_assert_ne!(prev, 0, "Bridge released more times than acquired");
        if prev == 1 {
            tracing::debug!(bridge = %self.name, "last producer reference released");
            self.close(CloseMode::Drain);
        }
    }
}

/// How [`Bridge::push`] behaves when a bounded queue is full
///
/// [`Bridge::push`]: struct.Bridge.html#method.push
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallMode {
    /// Suspend the calling thread until there is room or the bridge
    /// closes
    Blocking,
    /// Fail immediately with [`PushError::Full`]
    ///
    /// [`PushError::Full`]: enum.PushError.html#variant.Full
    NonBlocking,
}

/// How [`Bridge::request_close`] treats payloads already queued
///
/// [`Bridge::request_close`]: struct.Bridge.html#method.request_close
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseMode {
    /// Deliver everything already queued, then finalize
    Drain,
    /// Drop everything already queued without calling the callback.
    /// This is an explicit data-loss operation.
    Abort,
}

/// Producer reference to a cross-thread call bridge
///
/// A [`Bridge`] lets any thread queue payloads of type `T` for a
/// callback that only ever runs in the owner thread, i.e. the thread
/// that owns the [`Host`].  Each instance counts as one producer
/// reference.  More references are obtained with
/// [`Bridge::acquire`], and are given up by [`Bridge::release`] or by
/// dropping the instance, which also covers a thread that exits
/// abruptly or panics.
///
/// Cleanup is handled as follows:
///
/// - When the last producer reference is released, the bridge starts
/// closing.  The owner thread delivers whatever is still queued and
/// then runs the finalizer.
///
/// - [`Bridge::request_close`] starts closing early.  Further pushes
/// and acquires fail, but the finalizer only runs once all producer
/// references have also been released.
///
/// The owner thread is woken at most once per idle period, however
/// many producers push at the same time, and a burst of work is
/// delivered in bounded drain cycles so that the owner thread's event
/// loop is never starved.
///
/// [`Bridge::acquire`]: struct.Bridge.html#method.acquire
/// [`Bridge::release`]: struct.Bridge.html#method.release
/// [`Bridge::request_close`]: struct.Bridge.html#method.request_close
/// [`Bridge`]: struct.Bridge.html
/// [`Host`]: struct.Host.html
pub struct Bridge<T: Send + 'static> {
    shared: Arc<Shared<T>>,
}

impl<T: Send + 'static> Bridge<T> {
    /// Create a bridge in the owner thread.  `callback` is called in
    /// the owner thread for each payload in push order, and
    /// `finalizer` is called once after the bridge has closed and
    /// drained.  The returned instance is the first producer
    /// reference.  The bridge starts out holding a keep-alive
    /// reference on the host (see [`Bridge::unref_host`]).
    ///
    /// Panics if `config.iteration_cap` is zero, or if the host has no
    /// poll-waker yet.
    ///
    /// [`Bridge::unref_host`]: struct.Bridge.html#method.unref_host
    pub fn new(
        host: &mut Host,
        config: BridgeConfig,
        callback: impl FnMut(&mut Host, T) + 'static,
        finalizer: impl FnOnce(&mut Host) + 'static,
    ) -> Self {
        assert!(
            config.iteration_cap > 0,
            "Bridge '{}' created with an iteration cap of zero",
            config.name
        );
        let shared = Arc::new(Shared::new(&config));
        let mut dispatcher = Dispatcher::new(
            shared.clone(),
            Box::new(callback),
            Box::new(finalizer),
            config.iteration_cap,
        );
        let waker = host.waker(move |host, deleted| dispatcher.handle_wake(host, deleted));
        shared.queue.set_waker(waker);
        shared.refed.store(true, Ordering::Release);
        host.ref_inc();
        tracing::debug!(
            bridge = %config.name,
            max_queue_size = config.max_queue_size,
            iteration_cap = config.iteration_cap,
            "bridge created"
        );
        Self { shared }
    }

    /// Get another producer reference, typically to hand to another
    /// thread.  Fails if the bridge is closing.
    pub fn acquire(&self) -> Result<Self, AcquireError> {
        // Closing check and increment under the queue lock, so that a
        // concurrent close either sees this producer or refuses it
        let prev = self
            .shared
            .queue
            .try_join(&self.shared.threads)
            .ok_or(AcquireError::Closing)?;
        assert_ne!(
            prev, 0,
            "Bridge '{}' acquired after its last reference was released",
            self.shared.name
        );
        Ok(Self {
            shared: self.shared.clone(),
        })
    }

    /// Give up this producer reference.  Same as dropping it.
    pub fn release(self) {}

    /// Queue a payload for the callback in the owner thread.  On
    /// failure the payload is handed back inside the error.
    ///
    /// With [`CallMode::Blocking`] a full bounded queue suspends the
    /// calling thread until the owner thread takes something off the
    /// queue.  If the bridge closes whilst waiting, the call fails
    /// with [`PushError::Closed`].  Don't use blocking mode from the
    /// owner thread itself on a bounded queue, since nothing can
    /// drain the queue whilst it is blocked.
    ///
    /// [`CallMode::Blocking`]: enum.CallMode.html#variant.Blocking
    /// [`PushError::Closed`]: enum.PushError.html#variant.Closed
    pub fn push(&self, payload: T, mode: CallMode) -> Result<(), PushError<T>> {
        self.shared.queue.push(payload, mode, &self.shared.state)
    }

    /// Blocking push
    #[inline]
    pub fn call(&self, payload: T) -> Result<(), PushError<T>> {
        self.push(payload, CallMode::Blocking)
    }

    /// Non-blocking push
    #[inline]
    pub fn try_call(&self, payload: T) -> Result<(), PushError<T>> {
        self.push(payload, CallMode::NonBlocking)
    }

    /// Start closing the bridge from any thread.  No more payloads or
    /// producers are accepted after this.  Blocked producers are
    /// woken and fail with [`PushError::Closed`].  With
    /// [`CloseMode::Abort`], payloads already queued are dropped
    /// without being delivered.
    ///
    /// This does not release this producer reference.
    ///
    /// [`CloseMode::Abort`]: enum.CloseMode.html#variant.Abort
    /// [`PushError::Closed`]: enum.PushError.html#variant.Closed
    pub fn request_close(&self, mode: CloseMode) {
        tracing::debug!(bridge = %self.shared.name, ?mode, "close requested");
        self.shared.close(mode);
    }

    /// Make the bridge keep the host's event loop alive until it is
    /// finalized.  Idempotent.  Owner thread only.
    pub fn ref_host(&self, host: &mut Host) {
        if !self.shared.is_finalized() && !self.shared.refed.swap(true, Ordering::AcqRel) {
            host.ref_inc();
        }
    }

    /// Stop the bridge keeping the host's event loop alive.  This
    /// doesn't affect delivery, only whether the event loop is
    /// allowed to exit whilst the bridge is still open.  Idempotent.
    /// Owner thread only.
    pub fn unref_host(&self, host: &mut Host) {
        self.shared.drop_host_ref(host);
    }

    /// Number of payloads currently queued
    pub fn queue_len(&self) -> usize {
        self.shared.queue.len()
    }

    /// Capacity limit of the queue, or 0 if unbounded
    pub fn max_queue_size(&self) -> usize {
        self.shared.queue.max()
    }

    /// Test whether the bridge has started closing
    pub fn is_closing(&self) -> bool {
        self.shared.queue.is_closing()
    }

    /// Number of live producer references
    pub fn thread_count(&self) -> usize {
        self.shared.thread_count()
    }

    /// Name given in the [`BridgeConfig`]
    ///
    /// [`BridgeConfig`]: struct.BridgeConfig.html
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    #[cfg(test)]
    pub(crate) fn shared(&self) -> &Shared<T> {
        &self.shared
    }
}

impl<T: Send + 'static> Drop for Bridge<T> {
    fn drop(&mut self) {
        self.shared.release();
    }
}
