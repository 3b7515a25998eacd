// breadcrumbs/src/crumb.rs

//! One crumb: a todo.txt line with priority, dates, completion and
//! `key:value` attributes.

use std::fmt;
use std::sync::LazyLock;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Creation clock-time stamp, `HH-MM`.
pub const TIME: &str = "TIME";
/// Archive clock-time stamp, `HH-MM`.
pub const ATIME: &str = "ATIME";

static TOKEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\S+").expect("token regex"));

/// Session-local identity of a crumb. Never persisted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CrumbId(u64);

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

impl CrumbId {
    fn fresh() -> Self { Self(NEXT_ID.fetch_add(1, Ordering::Relaxed)) }
}

type HeadFields = (bool, Option<char>, Option<NaiveDate>, Option<NaiveDate>);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Crumb {
    pub id: CrumbId,
    pub completed: bool,
    pub priority: Option<char>,
    pub completion_date: Option<NaiveDate>,
    pub creation_date: Option<NaiveDate>,
    /// Everything after the leading markers, verbatim. `+project`,
    /// `@context` and `key:value` tokens all stay here, where they were written.
    pub description: String,
    /// Leading markers as read, reused on output while the fields still match.
    head: Option<(String, HeadFields)>,
}

fn parse_date(tok: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(tok, "%Y-%m-%d").ok()
}

fn parse_priority(tok: &str) -> Option<char> {
    let b = tok.as_bytes();
    (b.len() == 3 && b[0] == b'(' && b[2] == b')' && b[1].is_ascii_uppercase()).then(|| b[1] as char)
}

/// Splits `key:value`; URLs and bare colons are not attributes.
fn split_attribute(tok: &str) -> Option<(&str, &str)> {
    let (k, v) = tok.split_once(':')?;
    if k.is_empty() || v.is_empty() || v.starts_with("//") { return None; }
    if k.starts_with('+') || k.starts_with('@') { return None; }
    Some((k, v))
}

impl Crumb {
    /// Parse one todo.txt line. Never fails; unrecognised structure is text.
    pub fn parse(line: &str) -> Self {
        let mut toks = TOKEN.find_iter(line).peekable();
        let mut c = Crumb {
            id: CrumbId::fresh(),
            completed: false,
            priority: None,
            completion_date: None,
            creation_date: None,
            description: String::new(),
            head: None,
        };
        if toks.peek().is_some_and(|t| t.as_str() == "x") {
            c.completed = true;
            toks.next();
        }
        if let Some(p) = toks.peek().and_then(|t| parse_priority(t.as_str())) {
            c.priority = Some(p);
            toks.next();
        }
        if let Some(d) = toks.peek().and_then(|t| parse_date(t.as_str())) {
            toks.next();
            let second = toks.peek().and_then(|t| parse_date(t.as_str()));
            match (c.completed, second) {
                (true, Some(d2)) => {
                    toks.next();
                    c.completion_date = Some(d);
                    c.creation_date = Some(d2);
                }
                (true, None) => c.completion_date = Some(d),
                (false, _) => c.creation_date = Some(d),
            }
        }
        let start = toks.peek().map_or(line.len(), |t| t.start());
        c.description = line[start..].to_string();
        c.head = Some((line[..start].to_string(), c.head_fields()));
        c
    }

    fn head_fields(&self) -> HeadFields { (self.completed, self.priority, self.completion_date, self.creation_date) }

    /// Same content under a fresh identity.
    pub fn duplicate(&self) -> Self { Self { id: CrumbId::fresh(), ..self.clone() } }

    /// `key:value` tokens in the order they appear. Keys may repeat.
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        TOKEN.find_iter(&self.description).filter_map(|m| split_attribute(m.as_str()))
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    pub fn attribute_values(&self, key: &str) -> Vec<&str> {
        self.attributes().filter(|(k, _)| *k == key).map(|(_, v)| v).collect()
    }

    /// The description without its `key:value` tokens.
    pub fn text(&self) -> String {
        TOKEN.find_iter(&self.description).map(|m| m.as_str()).filter(|t| split_attribute(t).is_none()).collect::<Vec<_>>().join(" ")
    }

    /// Appends `key:value`; [`Crumb::remove_attribute`] undoes it exactly.
    pub fn add_attribute(&mut self, key: &str, value: &str) {
        if !self.description.is_empty() { self.description.push(' '); }
        self.description.push_str(key);
        self.description.push(':');
        self.description.push_str(value);
    }

    /// Drops every value of `key`, each with the separator before it. The
    /// rest of the text is untouched. Returns how many were removed.
    pub fn remove_attribute(&mut self, key: &str) -> usize {
        let text = &self.description;
        let cuts: Vec<(usize, usize)> = TOKEN
            .find_iter(text)
            .filter(|m| split_attribute(m.as_str()).is_some_and(|(k, _)| k == key))
            .map(|m| {
                let lead = text[..m.start()].chars().next_back().map_or(0, char::len_utf8);
                (m.start() - lead, m.end())
            })
            .collect();
        let Some(&(first, _)) = cuts.first() else { return 0 };
        let mut out = String::with_capacity(text.len());
        let mut at = 0;
        for &(a, b) in &cuts {
            out.push_str(&text[at..a]);
            at = b;
        }
        out.push_str(&text[at..]);
        if first == 0 {
            if let Some(ws) = out.chars().next().filter(|c| c.is_whitespace()) { out.replace_range(..ws.len_utf8(), ""); }
        }
        self.description = out;
        cuts.len()
    }

    pub fn projects(&self) -> impl Iterator<Item = &str> {
        self.description.split_whitespace().filter_map(|w| w.strip_prefix('+')).filter(|w| !w.is_empty())
    }

    pub fn contexts(&self) -> impl Iterator<Item = &str> {
        self.description.split_whitespace().filter_map(|w| w.strip_prefix('@')).filter(|w| !w.is_empty())
    }
}

impl fmt::Display for Crumb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some((raw, fields)) = &self.head {
            if *fields == self.head_fields() {
                f.write_str(raw)?;
                if !raw.is_empty() && !raw.ends_with(char::is_whitespace) && !self.description.is_empty() {
                    f.write_str(" ")?;
                }
                return f.write_str(&self.description);
            }
        }
        let mut parts: Vec<String> = Vec::new();
        if self.completed { parts.push("x".into()); }
        if let Some(p) = self.priority { parts.push(format!("({p})")); }
        if self.completed {
            if let Some(d) = self.completion_date { parts.push(d.to_string()); }
        }
        if let Some(d) = self.creation_date { parts.push(d.to_string()); }
        if !self.description.is_empty() { parts.push(self.description.clone()); }
        f.write_str(&parts.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate { parse_date(s).unwrap() }

    #[test]
    fn parses_full_completed_line() {
        let c = Crumb::parse("x (B) 2024-03-02 2024-03-01 call mom +family @phone TIME:09-15 ATIME:10-00");
        assert!(c.completed);
        assert_eq!(c.priority, Some('B'));
        assert_eq!(c.completion_date, Some(d("2024-03-02")));
        assert_eq!(c.creation_date, Some(d("2024-03-01")));
        assert_eq!(c.description, "call mom +family @phone TIME:09-15 ATIME:10-00");
        assert_eq!(c.text(), "call mom +family @phone");
        assert_eq!(c.attribute(TIME), Some("09-15"));
        assert_eq!(c.attribute(ATIME), Some("10-00"));
        assert_eq!(c.projects().collect::<Vec<_>>(), vec!["family"]);
        assert_eq!(c.contexts().collect::<Vec<_>>(), vec!["phone"]);
    }

    #[test]
    fn single_date_on_open_crumb_is_creation() {
        let c = Crumb::parse("2024-01-05 buy milk");
        assert!(!c.completed);
        assert_eq!(c.creation_date, Some(d("2024-01-05")));
        assert_eq!(c.completion_date, None);
        assert_eq!(c.description, "buy milk");
    }

    #[test]
    fn repeated_keys_are_kept_in_order() {
        let c = Crumb::parse("gym rep:5 set:1 rep:8");
        assert_eq!(c.attribute_values("rep"), vec!["5", "8"]);
        assert_eq!(c.attribute("rep"), Some("5"));
        assert_eq!(c.text(), "gym");
    }

    #[test]
    fn urls_stay_in_description() {
        let c = Crumb::parse("read https://example.org/post later");
        assert!(c.attributes().next().is_none());
        assert_eq!(c.text(), "read https://example.org/post later");
    }

    #[test]
    fn display_round_trips() {
        let line = "x (A) 2024-03-02 2024-03-01 fix bike +home TIME:08-00";
        assert_eq!(Crumb::parse(line).to_string(), line);
        let open = "(C) 2024-03-01 plan trip @desk due:2024-04-01";
        assert_eq!(Crumb::parse(open).to_string(), open);
    }

    #[test]
    fn display_keeps_text_byte_for_byte() {
        for line in [
            "2024-03-10 meet at 10:30 with bob TIME:09-00",
            "  (A)  2024-03-01   spaced   out k:v  trailing  ",
            "x 2024-03-02",
            "no markers key:value in the middle",
        ] {
            assert_eq!(Crumb::parse(line).to_string(), line);
        }
        let c = Crumb::parse("2024-03-10 meet at 10:30 with bob TIME:09-00");
        assert_eq!(c.attribute("10"), Some("30"));
        assert!(c.description.contains("at 10:30 with"));
    }

    #[test]
    fn changed_markers_are_written_canonically() {
        let mut c = Crumb::parse("  (A)  2024-03-01   spaced   out");
        c.priority = None;
        assert_eq!(c.to_string(), "2024-03-01 spaced   out");
        let mut done = Crumb::parse("x 2024-03-02");
        done.add_attribute(ATIME, "10-00");
        assert_eq!(done.to_string(), "x 2024-03-02 ATIME:10-00");
    }

    #[test]
    fn remove_attribute_drops_all_values() {
        let mut c = Crumb::parse("thing ATIME:01-01 ATIME:02-02 TIME:00-30");
        assert_eq!(c.remove_attribute(ATIME), 2);
        assert_eq!(c.description, "thing TIME:00-30");
        assert_eq!(c.attributes().collect::<Vec<_>>(), vec![(TIME, "00-30")]);
        let mut lead = Crumb::parse("k:1 k:2 rest k:3");
        assert_eq!(lead.remove_attribute("k"), 3);
        assert_eq!(lead.description, "rest");
        assert_eq!(lead.remove_attribute("k"), 0);
    }

    #[test]
    fn add_then_remove_restores_the_text() {
        let line = "2024-03-10 meet  at 10:30 with bob TIME:09-00 ";
        let mut c = Crumb::parse(line);
        c.add_attribute(ATIME, "11-00");
        assert_eq!(c.attribute(ATIME), Some("11-00"));
        c.remove_attribute(ATIME);
        assert_eq!(c.to_string(), line);
    }

    #[test]
    fn duplicate_gets_fresh_id() {
        let c = Crumb::parse("a");
        let e = c.duplicate();
        assert_ne!(c.id, e.id);
        assert_eq!(c.description, e.description);
    }
}
