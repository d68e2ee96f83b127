use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A monotonic clock reading. Only comparable with readings of the same clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp(Duration);

impl Timestamp {
    pub const ZERO: Timestamp = Timestamp(Duration::ZERO);

    pub fn from_duration(since_origin: Duration) -> Self {
        Self(since_origin)
    }

    pub fn from_secs_f32(seconds: f32) -> Self {
        Self(Duration::from_secs_f32(seconds.max(0.0)))
    }

    pub fn as_duration(self) -> Duration {
        self.0
    }

    /// Seconds elapsed from `earlier` to `self`; zero if `earlier` is later.
    pub fn seconds_since(self, earlier: Timestamp) -> f32 {
        self.0.saturating_sub(earlier.0).as_secs_f32()
    }
}

/// Source of the timestamps used for play positions and recency ranking.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall-clock time since construction, backed by `Instant`.
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Timestamp {
        Timestamp(self.origin.elapsed())
    }
}

/// A clock that only moves when told to. Clones share the same reading.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    nanos: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, at: Timestamp) {
        self.nanos
            .store(at.as_duration().as_nanos() as u64, Ordering::Relaxed);
    }

    pub fn advance(&self, by: Duration) {
        self.nanos
            .fetch_add(by.as_nanos() as u64, Ordering::Relaxed);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp(Duration::from_nanos(self.nanos.load(Ordering::Relaxed)))
    }
}
