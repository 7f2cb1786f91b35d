use std::time::{Duration, Instant};

/// How long a blocking `push`/`pop` may wait.
///
/// `After(Duration::ZERO)` still evaluates the operation once under the lock,
/// so it succeeds when a slot (or an item) is available right away.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Timeout {
    #[default]
    Infinite,
    After(Duration),
}

impl Timeout {
    pub const IMMEDIATE: Timeout = Timeout::After(Duration::ZERO);

    /// Millisecond contract: negative waits forever, zero is a single attempt.
    pub fn from_millis(ms: i64) -> Self {
        if ms < 0 {
            Timeout::Infinite
        } else {
            Timeout::After(Duration::from_millis(ms as u64))
        }
    }

    #[inline]
    pub fn is_infinite(&self) -> bool {
        matches!(self, Timeout::Infinite)
    }

    /// Absolute deadline on the monotonic clock, read once.
    ///
    /// `None` means no deadline, either because the timeout is infinite or
    /// because `now + d` is not representable.
    pub fn deadline(self) -> Option<Instant> {
        match self {
            Timeout::Infinite => None,
            Timeout::After(d) => Instant::now().checked_add(d),
        }
    }
}

impl From<i64> for Timeout {
    fn from(ms: i64) -> Self {
        Timeout::from_millis(ms)
    }
}

impl From<i32> for Timeout {
    fn from(ms: i32) -> Self {
        Timeout::from_millis(i64::from(ms))
    }
}

impl From<Duration> for Timeout {
    fn from(d: Duration) -> Self {
        Timeout::After(d)
    }
}

impl From<Option<Duration>> for Timeout {
    fn from(d: Option<Duration>) -> Self {
        d.map_or(Timeout::Infinite, Timeout::After)
    }
}

/// Time left until `deadline`, or `None` once it has passed.
#[inline]
pub(crate) fn remaining(deadline: Instant) -> Option<Duration> {
    let now = Instant::now();
    if now >= deadline {
        None
    } else {
        Some(deadline - now)
    }
}
