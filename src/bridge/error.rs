use thiserror::Error;

/// Failure to queue a call on a [`Bridge`]
///
/// The payload is handed back so that the caller can decide whether
/// to retry later or drop it.
///
/// [`Bridge`]: struct.Bridge.html
#[derive(Error)]
pub enum PushError<T> {
    /// Non-blocking push against a queue already at capacity
    #[error("bridge queue is full")]
    Full(T),
    /// The bridge is closing and accepts no more calls
    #[error("bridge is closed")]
    Closed(T),
}

impl<T> PushError<T> {
    /// Recover the payload that could not be queued
    pub fn into_inner(self) -> T {
        match self {
            Self::Full(v) | Self::Closed(v) => v,
        }
    }

    pub fn is_full(&self) -> bool {
        matches!(self, Self::Full(_))
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed(_))
    }
}

// Hand-written so that `T` need not be `Debug`
impl<T> std::fmt::Debug for PushError<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Full(_) => f.write_str("Full(..)"),
            Self::Closed(_) => f.write_str("Closed(..)"),
        }
    }
}

/// Failure to obtain another producer reference on a [`Bridge`]
///
/// [`Bridge`]: struct.Bridge.html
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireError {
    /// No new producers may join a closing bridge
    #[error("bridge is closing")]
    Closing,
}
