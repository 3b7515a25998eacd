// breadcrumbs/src/buffer.rs

use chrono::{Duration, NaiveDateTime};

/// Self-clearing holder of the most recent selection.
///
/// Every read or write re-arms the expiry to `now + ttl`. A read at or after
/// the expiry finds the buffer empty.
#[derive(Clone, Debug)]
pub struct SelectionBuffer<T> {
    items: Vec<T>,
    expires: Option<NaiveDateTime>,
    ttl: Duration,
}

impl<T: Clone> SelectionBuffer<T> {
    pub fn new(ttl: Duration) -> Self { Self { items: Vec::new(), expires: None, ttl } }

    pub fn ttl(&self) -> Duration { self.ttl }
    pub fn expires(&self) -> Option<NaiveDateTime> { self.expires }

    pub fn get(&mut self, now: NaiveDateTime) -> Vec<T> {
        if self.expires.is_none_or(|exp| now >= exp) { self.items.clear(); }
        self.expires = Some(self.deadline(now));
        self.items.clone()
    }

    pub fn set(&mut self, items: Vec<T>, now: NaiveDateTime) {
        self.items = items;
        self.expires = Some(self.deadline(now));
    }

    fn deadline(&self, now: NaiveDateTime) -> NaiveDateTime { now.checked_add_signed(self.ttl).unwrap_or(NaiveDateTime::MAX) }
}

impl<T: Clone> Default for SelectionBuffer<T> {
    fn default() -> Self { Self::new(Duration::seconds(30)) }
}
