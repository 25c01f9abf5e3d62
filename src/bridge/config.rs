use std::borrow::Cow;

/// Default number of payloads delivered per drain cycle before the
/// owner thread is yielded back to its event loop
pub const DEFAULT_ITERATION_CAP: usize = 1000;

/// Creation-time settings for a [`Bridge`]
///
/// These are fixed for the life of the bridge.
///
/// [`Bridge`]: struct.Bridge.html
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Name used to identify the bridge in log events
    pub name: Cow<'static, str>,
    /// Maximum number of queued payloads, or 0 for unbounded
    pub max_queue_size: usize,
    /// Maximum payloads delivered in one drain cycle.  Must be at
    /// least 1.
    pub iteration_cap: usize,
}

impl BridgeConfig {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Limit the queue to `max` payloads (0 for unbounded)
    #[must_use]
    pub fn with_max_queue_size(mut self, max: usize) -> Self {
        self.max_queue_size = max;
        self
    }

    #[must_use]
    pub fn with_iteration_cap(mut self, cap: usize) -> Self {
        self.iteration_cap = cap;
        self
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            name: Cow::Borrowed("bridge"),
            max_queue_size: 0,
            iteration_cap: DEFAULT_ITERATION_CAP,
        }
    }
}
