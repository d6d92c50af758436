//! Wall-clock access behind a trait so expiry and freshness rules can be
//! exercised deterministically.

use std::sync::atomic::{AtomicI64, Ordering};

use crate::types::{EpochMillis, EpochSecs};

/// Source of the current wall-clock time.
pub trait TimeSource: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn now_millis(&self) -> EpochMillis;

    /// Whole seconds since the Unix epoch.
    fn now_secs(&self) -> EpochSecs {
        self.now_millis().div_euclid(1000)
    }
}

/// The real system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now_millis(&self) -> EpochMillis {
        chrono::Utc::now().timestamp_millis()
    }
}

/// A clock that only moves when told to.
///
/// Used by tests and simulations that need to step across claim TTLs or
/// cache freshness windows without sleeping.
#[derive(Debug, Default)]
pub struct ManualTimeSource {
    millis: AtomicI64,
}

impl ManualTimeSource {
    pub fn at_secs(secs: EpochSecs) -> Self {
        Self {
            millis: AtomicI64::new(secs * 1000),
        }
    }

    pub fn set_secs(&self, secs: EpochSecs) {
        self.millis.store(secs * 1000, Ordering::SeqCst);
    }

    pub fn advance_millis(&self, millis: i64) {
        self.millis.fetch_add(millis, Ordering::SeqCst);
    }

    pub fn advance_secs(&self, secs: i64) {
        self.advance_millis(secs * 1000);
    }
}

impl TimeSource for ManualTimeSource {
    fn now_millis(&self) -> EpochMillis {
        self.millis.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_steps_forward() {
        let clock = ManualTimeSource::at_secs(1_000);
        assert_eq!(clock.now_secs(), 1_000);

        clock.advance_millis(1_500);
        assert_eq!(clock.now_millis(), 1_001_500);
        assert_eq!(clock.now_secs(), 1_001);

        clock.advance_secs(120);
        assert_eq!(clock.now_secs(), 1_121);
    }

    #[test]
    fn system_clock_is_after_2020() {
        assert!(SystemTimeSource.now_secs() > 1_577_836_800);
    }
}
