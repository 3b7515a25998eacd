// breadcrumbs/src/clock.rs

use chrono::{Duration, Local, NaiveDate, NaiveDateTime, NaiveTime};
use parking_lot::Mutex;

/// Source of "now" for stamping and expiry.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;

    fn today(&self) -> NaiveDate { self.now().date() }
    fn time(&self) -> NaiveTime { self.now().time() }
}

/// Wall clock in local time.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime { Local::now().naive_local() }
}

/// Virtual clock for tests and replay; only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<NaiveDateTime>,
}

impl ManualClock {
    pub fn new(start: NaiveDateTime) -> Self { Self { now: Mutex::new(start) } }
    pub fn set(&self, to: NaiveDateTime) { *self.now.lock() = to; }
    pub fn advance(&self, by: Duration) { *self.now.lock() += by; }
}

impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime { *self.now.lock() }
}

/// `HH-MM`, the stamp format used by `TIME` and `ATIME`.
pub fn stamp(t: NaiveTime) -> String { t.format("%H-%M").to_string() }

/// Parse an `HH-MM` stamp.
pub fn parse_stamp(s: &str) -> Option<NaiveTime> {
    let (h, m) = s.split_once('-')?;
    NaiveTime::from_hms_opt(h.trim().parse().ok()?, m.trim().parse().ok()?, 0)
}
