pub mod bounded;
pub mod error;
pub mod timeout;

mod sync;

pub use bounded::BoundedQueue;
pub use error::{PushError, QueueError, Status};
pub use timeout::Timeout;

// Common interface for blocking queues with a finalize (close-for-writes) protocol.
pub trait BlockingQueue<T: Send>: Send + Sync {
    fn push(&self, tag: i32, payload: T, timeout: Timeout) -> Result<(), PushError<T>>;
    fn pop(&self, timeout: Timeout) -> Result<(i32, T), QueueError>;
    fn finalize(&self);
    fn is_finalized(&self) -> bool;
    fn capacity(&self) -> usize;
    fn is_empty(&self) -> bool;
}

impl<T: Send> BlockingQueue<T> for BoundedQueue<T> {
    #[inline]
    fn push(&self, tag: i32, payload: T, timeout: Timeout) -> Result<(), PushError<T>> {
        BoundedQueue::push(self, tag, payload, timeout)
    }

    #[inline]
    fn pop(&self, timeout: Timeout) -> Result<(i32, T), QueueError> {
        BoundedQueue::pop(self, timeout)
    }

    #[inline]
    fn finalize(&self) {
        BoundedQueue::finalize(self)
    }

    #[inline]
    fn is_finalized(&self) -> bool {
        BoundedQueue::is_finalized(self)
    }

    #[inline]
    fn capacity(&self) -> usize {
        BoundedQueue::capacity(self)
    }

    #[inline]
    fn is_empty(&self) -> bool {
        BoundedQueue::is_empty(self)
    }
}
