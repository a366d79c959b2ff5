use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Source of "now" for idle-connection bookkeeping. Abstracted so tests can
/// advance time deterministically instead of sleeping real wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Test clock that only advances when told to. `Instant` has no safe way to
/// construct an arbitrary point in time, so this tracks a nanosecond offset
/// applied to a fixed base instant taken at construction. The offset is an
/// `AtomicU64` rather than a `Cell` so `ManualClock` stays `Sync` and can be
/// shared behind an `Arc` by a caller that also needs to advance it after
/// handing a `Box<dyn Clock>` to a `Selector`. Not gated behind `cfg(test)`
/// so integration tests in `tests/` can drive the idle-reap scenario
/// deterministically without sleeping real wall-clock time.
#[derive(Debug)]
pub struct ManualClock {
    base: Instant,
    offset_nanos: AtomicU64,
}

impl Default for ManualClock {
    fn default() -> ManualClock {
        ManualClock::new()
    }
}

impl ManualClock {
    pub fn new() -> ManualClock {
        ManualClock {
            base: Instant::now(),
            offset_nanos: AtomicU64::new(0),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.offset_nanos.fetch_add(by.as_nanos() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + Duration::from_nanos(self.offset_nanos.load(Ordering::SeqCst))
    }
}
