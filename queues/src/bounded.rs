// Fixed-capacity blocking queue: one mutex, one condvar per side, and a
// latching finalized flag. Consumers drain everything pushed before finalize.
use std::fmt;
use std::sync::{Arc, PoisonError};
use std::time::Instant;

use tracing::{debug, trace, warn};

use crate::error::{PushError, QueueError};
use crate::sync::{Condvar, Mutex, MutexGuard};
use crate::timeout::{remaining, Timeout};

struct Slot<T> {
    tag: i32,
    payload: T,
}

// Everything below is only touched with `BoundedQueue::state` locked.
struct State<T> {
    slots: Box<[Option<Slot<T>>]>,
    head: usize, // next slot to pop
    tail: usize, // next slot to push
    len: usize,
    waiting_producers: usize,
    waiting_consumers: usize,
    finalized: bool,
}

impl<T> State<T> {
    fn with_capacity(capacity: usize) -> Result<Self, QueueError> {
        let mut slots = Vec::new();
        slots
            .try_reserve_exact(capacity)
            .map_err(|_| QueueError::Alloc(capacity))?;
        slots.resize_with(capacity, || None);

        Ok(State {
            slots: slots.into_boxed_slice(),
            head: 0,
            tail: 0,
            len: 0,
            waiting_producers: 0,
            waiting_consumers: 0,
            finalized: false,
        })
    }

    #[inline]
    fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    fn is_full(&self) -> bool {
        self.len == self.capacity()
    }

    #[inline]
    fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    fn next(&self, idx: usize) -> usize {
        if idx + 1 < self.capacity() {
            idx + 1
        } else {
            0
        }
    }

    fn push_back(&mut self, tag: i32, payload: T) {
        debug_assert!(!self.is_full());
        debug_assert!(self.slots[self.tail].is_none());
        self.slots[self.tail] = Some(Slot { tag, payload });
        self.tail = self.next(self.tail);
        self.len += 1;
    }

    fn pop_front(&mut self) -> Option<Slot<T>> {
        if self.is_empty() {
            return None;
        }
        let slot = self.slots[self.head].take();
        debug_assert!(slot.is_some());
        self.head = self.next(self.head);
        self.len -= 1;
        slot
    }

    fn drain(&mut self) -> Vec<(i32, T)> {
        let mut items = Vec::with_capacity(self.len);
        while let Some(slot) = self.pop_front() {
            items.push((slot.tag, slot.payload));
        }
        items
    }
}

// Why a wait loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Wake {
    Ready,
    TimedOut,
    Poisoned,
}

impl Wake {
    // Only reached when the queue is neither finalized nor able to make progress.
    fn into_error(self) -> QueueError {
        match self {
            Wake::TimedOut => QueueError::TimedOut,
            Wake::Ready | Wake::Poisoned => {
                debug_assert_eq!(self, Wake::Poisoned);
                QueueError::Poisoned
            }
        }
    }
}

/// Bounded FIFO of `(tag, payload)` items shared by any number of producer
/// and consumer threads.
///
/// `push` blocks while the queue is full and `pop` blocks while it is empty,
/// each for at most the requested [`Timeout`]. [`finalize`](Self::finalize)
/// closes the queue: pushes are refused from then on (including those already
/// blocked), while pops keep returning buffered items until the queue is
/// empty and only then report [`QueueError::Finalized`].
///
/// Payloads are moved through the queue, never cloned or inspected.
pub struct BoundedQueue<T> {
    capacity: usize,
    state: Mutex<State<T>>,
    not_full: Condvar,  // producers wait here
    not_empty: Condvar, // consumers wait here
}

impl<T> BoundedQueue<T> {
    /// Creates an empty, open queue able to hold `capacity` items.
    pub fn new(capacity: usize) -> Result<Self, QueueError> {
        if capacity == 0 {
            return Err(QueueError::InvalidCapacity);
        }
        let state = State::with_capacity(capacity)?;
        debug!(capacity, "bounded queue created");

        Ok(BoundedQueue {
            capacity,
            state: Mutex::new(state),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
        })
    }

    /// Like [`new`](Self::new) but panics on an invalid capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        match Self::new(capacity) {
            Ok(queue) => queue,
            Err(e) => panic!("cannot create bounded queue: {e}"),
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Enqueues `(tag, payload)`, waiting up to `timeout` for a free slot.
    ///
    /// Once the queue is finalized this fails with `Finalized` even if a slot
    /// is free. On any failure the payload comes back inside the error.
    pub fn push(
        &self,
        tag: i32,
        payload: T,
        timeout: impl Into<Timeout>,
    ) -> Result<(), PushError<T>> {
        let timeout = timeout.into();
        let mut state = match self.state.lock() {
            Ok(guard) => guard,
            Err(_) => {
                warn!(tag, "push on poisoned queue");
                return Err(PushError::new(QueueError::Poisoned, tag, payload));
            }
        };
        let deadline = timeout.deadline();

        state.waiting_producers += 1;
        let (mut state, wake) = Self::wait_while(&self.not_full, state, deadline, |s| {
            !s.finalized && s.is_full()
        });
        state.waiting_producers -= 1;

        if state.finalized {
            return Err(PushError::new(QueueError::Finalized, tag, payload));
        }
        if !state.is_full() {
            state.push_back(tag, payload);
            trace!(tag, len = state.len, "pushed");
            if state.waiting_consumers > 0 {
                self.not_empty.notify_one();
            }
            return Ok(());
        }

        let error = wake.into_error();
        if error == QueueError::Poisoned {
            warn!(tag, "queue lock poisoned while producer waited");
        }
        Err(PushError::new(error, tag, payload))
    }

    /// Dequeues the oldest item, waiting up to `timeout` for one to arrive.
    ///
    /// Buffered items are always returned before `Finalized` is reported.
    pub fn pop(&self, timeout: impl Into<Timeout>) -> Result<(i32, T), QueueError> {
        let timeout = timeout.into();
        let mut state = self.state.lock().map_err(|_| {
            warn!("pop on poisoned queue");
            QueueError::Poisoned
        })?;
        let deadline = timeout.deadline();

        state.waiting_consumers += 1;
        let (mut state, wake) = Self::wait_while(&self.not_empty, state, deadline, |s| {
            s.is_empty() && !s.finalized
        });
        state.waiting_consumers -= 1;

        if let Some(Slot { tag, payload }) = state.pop_front() {
            trace!(tag, len = state.len, "popped");
            if state.waiting_producers > 0 {
                self.not_full.notify_one();
            }
            return Ok((tag, payload));
        }
        if state.finalized {
            return Err(QueueError::Finalized);
        }

        let error = wake.into_error();
        if error == QueueError::Poisoned {
            warn!("queue lock poisoned while consumer waited");
        }
        Err(error)
    }

    /// Shorthand for `push` with [`Timeout::IMMEDIATE`].
    #[inline]
    pub fn try_push(&self, tag: i32, payload: T) -> Result<(), PushError<T>> {
        self.push(tag, payload, Timeout::IMMEDIATE)
    }

    /// Shorthand for `pop` with [`Timeout::IMMEDIATE`].
    #[inline]
    pub fn try_pop(&self) -> Result<(i32, T), QueueError> {
        self.pop(Timeout::IMMEDIATE)
    }

    /// Closes the queue and wakes every blocked producer and consumer.
    /// Calling it again does nothing.
    pub fn finalize(&self) {
        let mut state = self.lock_recovering();
        if state.finalized {
            return;
        }
        state.finalized = true;
        debug!(
            len = state.len,
            waiting_producers = state.waiting_producers,
            waiting_consumers = state.waiting_consumers,
            "bounded queue finalized"
        );
        if state.waiting_producers > 0 {
            self.not_full.notify_all();
        }
        if state.waiting_consumers > 0 {
            self.not_empty.notify_all();
        }
    }

    /// Point-in-time snapshot of the finalized flag.
    pub fn is_finalized(&self) -> bool {
        self.lock_recovering().finalized
    }

    pub fn len(&self) -> usize {
        self.lock_recovering().len
    }

    pub fn is_empty(&self) -> bool {
        self.lock_recovering().is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.lock_recovering().is_full()
    }

    pub fn waiting_producers(&self) -> usize {
        self.lock_recovering().waiting_producers
    }

    pub fn waiting_consumers(&self) -> usize {
        self.lock_recovering().waiting_consumers
    }

    /// Tears the queue down and returns the items nobody popped, oldest first.
    ///
    /// Owning `self` guarantees no thread is still blocked in `push` or `pop`.
    pub fn destroy(self) -> Result<Vec<(i32, T)>, QueueError> {
        let capacity = self.capacity;
        let mut state = self.state.into_inner().map_err(|_| {
            warn!(capacity, "destroying poisoned queue");
            QueueError::Poisoned
        })?;
        debug_assert_eq!(state.waiting_producers, 0);
        debug_assert_eq!(state.waiting_consumers, 0);

        let leftover = state.drain();
        debug!(capacity, leftover = leftover.len(), "bounded queue destroyed");
        Ok(leftover)
    }

    /// Destroys a shared queue, failing with `InUse` while other handles
    /// (and therefore possibly blocked threads) still exist.
    ///
    /// On failure this handle is released; the remaining handles keep the
    /// queue alive.
    pub fn destroy_shared(queue: Arc<Self>) -> Result<Vec<(i32, T)>, QueueError> {
        match Arc::try_unwrap(queue) {
            Ok(queue) => queue.destroy(),
            Err(shared) => {
                let others = Arc::strong_count(&shared) - 1;
                warn!(others, "refusing to destroy queue still in use");
                Err(QueueError::InUse(others))
            }
        }
    }

    // Blocks on `cv` while `blocked` holds, re-checking after every wake.
    // The deadline is fixed by the caller; only the remaining slice is
    // handed to each `wait_timeout`.
    fn wait_while<'a, F>(
        cv: &Condvar,
        mut state: MutexGuard<'a, State<T>>,
        deadline: Option<Instant>,
        blocked: F,
    ) -> (MutexGuard<'a, State<T>>, Wake)
    where
        F: Fn(&State<T>) -> bool,
    {
        while blocked(&state) {
            match deadline {
                None => match cv.wait(state) {
                    Ok(guard) => state = guard,
                    Err(poisoned) => return (poisoned.into_inner(), Wake::Poisoned),
                },
                Some(deadline) => {
                    let Some(left) = remaining(deadline) else {
                        return (state, Wake::TimedOut);
                    };
                    match cv.wait_timeout(state, left) {
                        Ok((guard, _)) => state = guard,
                        Err(poisoned) => return (poisoned.into_inner().0, Wake::Poisoned),
                    }
                }
            }
        }
        (state, Wake::Ready)
    }

    // Shutdown and read-only snapshots keep working after a panic elsewhere.
    fn lock_recovering(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(|poisoned| {
            warn!("recovering poisoned queue lock");
            PoisonError::into_inner(poisoned)
        })
    }
}

impl<T> fmt::Debug for BoundedQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock_recovering();
        f.debug_struct("BoundedQueue")
            .field("capacity", &self.capacity)
            .field("len", &state.len)
            .field("head", &state.head)
            .field("tail", &state.tail)
            .field("waiting_producers", &state.waiting_producers)
            .field("waiting_consumers", &state.waiting_consumers)
            .field("finalized", &state.finalized)
            .finish()
    }
}
