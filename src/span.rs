// breadcrumbs/src/span.rs

//! Relative time spans (`1d-~`, `2w-3d`, `~-~`) and crumb instants.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};

use crate::clock::parse_stamp;
use crate::crumb::{ATIME, Crumb, TIME};
use crate::error::{CrumbError, Result};

fn epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default().and_time(NaiveTime::MIN)
}

/// `<number><m,h,d,w,y>`; an unknown unit means days.
pub fn parse_delta(s: &str) -> Result<Duration> {
    let s = s.trim();
    let bad = || CrumbError::InvalidSpan(s.to_string());
    let unit = s.chars().last().ok_or_else(bad)?;
    let value: f64 = s[..s.len() - unit.len_utf8()].parse().map_err(|_| bad())?;
    let minutes = match unit.to_ascii_lowercase() {
        'm' => value,
        'h' => value * 60.0,
        'w' => value * 60.0 * 24.0 * 7.0,
        'y' => value * 60.0 * 24.0 * 365.0,
        _ => value * 60.0 * 24.0,
    };
    let secs = (minutes * 60.0).round();
    // `as` saturates, so the range is checked on the float first.
    if !secs.is_finite() || secs.abs() >= i64::MAX as f64 { return Err(bad()); }
    Duration::try_seconds(secs as i64).ok_or_else(bad)
}

/// `now - delta`, or [`CrumbError::InvalidSpan`] when that leaves the calendar.
pub fn before(now: NaiveDateTime, delta: Duration, span: &str) -> Result<NaiveDateTime> {
    now.checked_sub_signed(delta).ok_or_else(|| CrumbError::InvalidSpan(span.to_string()))
}

/// `now + delta`, or [`CrumbError::InvalidSpan`] when that leaves the calendar.
pub fn after(now: NaiveDateTime, delta: Duration, span: &str) -> Result<NaiveDateTime> {
    now.checked_add_signed(delta).ok_or_else(|| CrumbError::InvalidSpan(span.to_string()))
}

/// A closed interval `[start, end]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Span {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl Span {
    pub fn contains(&self, t: NaiveDateTime) -> bool { self.start <= t && t <= self.end }
}

/// Parse `A-B` relative to `now`. `~` opens the side.
pub fn parse_span(span: &str, now: NaiveDateTime) -> Result<Span> {
    let (a, b) = span.split_once('-').ok_or_else(|| CrumbError::InvalidSpan(span.to_string()))?;
    let side = |s: &str, open: NaiveDateTime| -> Result<NaiveDateTime> {
        if s.trim() == "~" { return Ok(open); }
        let d = parse_delta(s).map_err(|_| CrumbError::InvalidSpan(span.to_string()))?;
        before(now, d, span)
    };
    Ok(Span { start: side(a, epoch())?, end: side(b, now)? })
}

fn instant(date: Option<NaiveDate>, stamp: Option<&str>) -> NaiveDateTime {
    let date = date.unwrap_or(epoch().date());
    let time = stamp.and_then(parse_stamp).unwrap_or(NaiveTime::from_hms_opt(1, 1, 0).unwrap_or_default());
    date.and_time(time)
}

/// Creation date plus `TIME`.
pub fn made_at(c: &Crumb) -> NaiveDateTime { instant(c.creation_date, c.attribute(TIME)) }

/// Completion date (creation date when unknown) plus `ATIME`.
pub fn archived_at(c: &Crumb) -> NaiveDateTime {
    instant(c.completion_date.or(c.creation_date), c.attribute(ATIME))
}

/// Date taken from an attribute (e.g. `FUTURE:2024-05-01`) plus `TIME`.
pub fn tagged_at(c: &Crumb, tag: &str) -> Option<NaiveDateTime> {
    let date = NaiveDate::parse_from_str(c.attribute(tag)?, "%Y-%m-%d").ok()?;
    Some(instant(Some(date), c.attribute(TIME)))
}
