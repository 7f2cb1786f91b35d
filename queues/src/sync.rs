// Lock and condition variable used by the queue. Under `--cfg loom` these are
// loom's model-checked versions so tests/loom_queue.rs can explore interleavings.

#[cfg(loom)]
pub(crate) use loom::sync::{Condvar, Mutex, MutexGuard};

#[cfg(not(loom))]
pub(crate) use std::sync::{Condvar, Mutex, MutexGuard};
