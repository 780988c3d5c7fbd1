//! Wall-clock sources.
//!
//! Alarms are matched on local wall time, so clocks hand out
//! [`NaiveDateTime`]s already converted to the local zone.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{Duration, NaiveDateTime};

use crate::error::ClockError;

pub trait Clock {
    fn now(&self) -> Result<NaiveDateTime, ClockError>;
}

/// The system clock in the local time zone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Result<NaiveDateTime, ClockError> {
        Ok(chrono::Local::now().naive_local())
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same time, so a test can keep a handle while a
/// [`crate::scheduler::Scheduler`] owns another.
#[derive(Debug, Clone)]
pub struct ManualClock {
    // None means the clock is broken
    now: Arc<Mutex<Option<NaiveDateTime>>>,
}

impl ManualClock {
    #[must_use]
    pub fn new(now: NaiveDateTime) -> Self {
        Self {
            now: Arc::new(Mutex::new(Some(now))),
        }
    }

    pub fn set(&self, now: NaiveDateTime) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = Some(now);
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now = now.map(|now| now + by);
    }

    /// Makes every later `now()` call fail until [`Self::set`] is called.
    pub fn break_down(&self) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Result<NaiveDateTime, ClockError> {
        self.now
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .ok_or_else(|| ClockError("manual clock is broken".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    #[test]
    fn manual_clock_is_shared_between_clones() {
        let start = NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(23, 59, 30)
            .unwrap();
        let clock = ManualClock::new(start);
        let handle = clock.clone();
        handle.advance(Duration::seconds(45));
        assert_eq!(
            clock.now().unwrap(),
            NaiveDate::from_ymd_opt(2024, 6, 2)
                .unwrap()
                .and_hms_opt(0, 0, 15)
                .unwrap()
        );

        handle.break_down();
        assert!(clock.now().is_err());
        handle.set(start);
        assert_eq!(clock.now().unwrap(), start);
    }
}
