use std::fmt;

use thiserror::Error;

/// Result code of a queue operation.
///
/// The numeric values are stable and ordered as listed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Status {
    Ok = 0,
    Finalized = 1,
    TimedOut = 2,
    Interrupted = 3,
    Error = 4,
}

impl Status {
    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn of<T, E>(result: &Result<T, E>) -> Status
    where
        for<'a> &'a E: Into<Status>,
    {
        match result {
            Ok(_) => Status::Ok,
            Err(e) => e.into(),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Status::Ok => "OK",
            Status::Finalized => "FINALIZED",
            Status::TimedOut => "TIMEDOUT",
            Status::Interrupted => "INTERRUPTED",
            Status::Error => "ERROR",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QueueError {
    /// Shutdown has begun; expected terminal signal, not a fault.
    #[error("queue is finalized")]
    Finalized,
    #[error("timed out waiting on queue")]
    TimedOut,
    /// Reserved for platforms where a blocked wait can be cut short by an
    /// external event. Neither std nor loom condition variables report this.
    #[error("wait on queue was interrupted")]
    Interrupted,
    /// A thread panicked while holding the queue lock.
    #[error("queue lock poisoned")]
    Poisoned,
    #[error("queue capacity must be positive")]
    InvalidCapacity,
    #[error("failed to allocate queue buffer of {0} slots")]
    Alloc(usize),
    #[error("queue is still shared by {0} other handle(s)")]
    InUse(usize),
}

impl QueueError {
    pub fn status(&self) -> Status {
        match self {
            QueueError::Finalized => Status::Finalized,
            QueueError::TimedOut => Status::TimedOut,
            QueueError::Interrupted => Status::Interrupted,
            QueueError::Poisoned
            | QueueError::InvalidCapacity
            | QueueError::Alloc(_)
            | QueueError::InUse(_) => Status::Error,
        }
    }

    /// `TimedOut` and `Interrupted` leave the queue untouched; the caller may try again.
    #[inline]
    pub fn is_retryable(&self) -> bool {
        matches!(self, QueueError::TimedOut | QueueError::Interrupted)
    }
}

impl From<&QueueError> for Status {
    fn from(e: &QueueError) -> Self {
        e.status()
    }
}

/// A rejected push. Carries the payload back so the caller keeps ownership.
#[derive(PartialEq, Eq)]
pub struct PushError<T> {
    pub error: QueueError,
    pub tag: i32,
    pub payload: T,
}

impl<T> PushError<T> {
    pub(crate) fn new(error: QueueError, tag: i32, payload: T) -> Self {
        PushError {
            error,
            tag,
            payload,
        }
    }

    #[inline]
    pub fn error(&self) -> QueueError {
        self.error
    }

    pub fn into_inner(self) -> (i32, T) {
        (self.tag, self.payload)
    }
}

impl<T> From<&PushError<T>> for Status {
    fn from(e: &PushError<T>) -> Self {
        e.error.status()
    }
}

impl<T> fmt::Debug for PushError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PushError")
            .field("error", &self.error)
            .field("tag", &self.tag)
            .finish_non_exhaustive()
    }
}

impl<T> fmt::Display for PushError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "push of tag {} failed: {}", self.tag, self.error)
    }
}

impl<T> std::error::Error for PushError<T> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}
