// breadcrumbs/src/loaf.rs

//! The loaf: every crumb, loaded whole and rewritten whole.

use std::{fs, io::Write, path::{Path, PathBuf}};

use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::clock::stamp;
use crate::crumb::{ATIME, Crumb, CrumbId, TIME};
use crate::error::Result;
use crate::span::{self, archived_at, made_at, parse_span};

#[derive(Debug, Default)]
pub struct Loaf {
    path: PathBuf,
    pub crumbs: Vec<Crumb>,
    /// Attribute holding an ISO date that overrides creation date + `TIME`.
    pub sort_key: Option<String>,
}

/// Canonical chronological key used to order crumbs on save.
pub fn chrono_key(c: &Crumb, sort_key: Option<&str>) -> NaiveDateTime {
    sort_key.and_then(|k| span::tagged_at(c, k)).unwrap_or_else(|| made_at(c))
}

impl Loaf {
    /// An empty loaf that will be written to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self { Self { path: path.into(), ..Self::default() } }

    /// Missing files load as empty loaves.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut loaf = Self::new(path);
        if path.exists() {
            let text = fs::read_to_string(path)?;
            loaf.crumbs = text.lines().filter(|l| !l.trim().is_empty()).map(Crumb::parse).collect();
        }
        tracing::debug!(path = %path.display(), crumbs = loaf.crumbs.len(), "loaf loaded");
        Ok(loaf)
    }

    pub fn path(&self) -> &Path { &self.path }
    pub fn len(&self) -> usize { self.crumbs.len() }
    pub fn is_empty(&self) -> bool { self.crumbs.is_empty() }

    pub fn get(&self, id: CrumbId) -> Option<&Crumb> { self.crumbs.iter().find(|c| c.id == id) }
    pub fn get_mut(&mut self, id: CrumbId) -> Option<&mut Crumb> { self.crumbs.iter_mut().find(|c| c.id == id) }

    /// Resolve ids, skipping any no longer present.
    pub fn resolve(&self, ids: &[CrumbId]) -> Vec<&Crumb> { ids.iter().filter_map(|id| self.get(*id)).collect() }

    pub fn resolve_mut(&mut self, ids: &[CrumbId]) -> Vec<&mut Crumb> {
        self.crumbs.iter_mut().filter(|c| ids.contains(&c.id)).collect()
    }

    /// Append without stamping.
    pub fn push(&mut self, c: Crumb) -> CrumbId {
        let id = c.id;
        self.crumbs.push(c);
        id
    }

    pub fn remove(&mut self, ids: &[CrumbId]) -> usize {
        let before = self.crumbs.len();
        self.crumbs.retain(|c| !ids.contains(&c.id));
        before - self.crumbs.len()
    }

    /// Parse `raw`, stamp `TIME` and the creation date when absent, append.
    /// Does not persist.
    pub fn add_entry(&mut self, raw: &str, now: NaiveDateTime) -> CrumbId {
        let mut c = Crumb::parse(raw);
        if c.attribute(TIME).is_none() { c.add_attribute(TIME, &stamp(now.time())); }
        if c.creation_date.is_none() { c.creation_date = Some(now.date()); }
        self.push(c)
    }

    /// Sort on the canonical key then atomically replace the file.
    pub fn save(&mut self) -> Result<()> {
        let key = self.sort_key.clone();
        self.crumbs.sort_by_key(|c| chrono_key(c, key.as_deref()));
        let dir = match self.path.parent() {
            Some(d) if !d.as_os_str().is_empty() => d.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;
        let mut tmp = NamedTempFile::new_in(&dir)?;
        for c in &self.crumbs { writeln!(tmp, "{c}")?; }
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        tracing::debug!(path = %self.path.display(), crumbs = self.crumbs.len(), "loaf saved");
        Ok(())
    }

    /// Indices (1-based line numbers) whose key sorts before the previous line's.
    pub fn out_of_order(&self) -> Vec<usize> {
        let key = self.sort_key.as_deref();
        self.crumbs
            .windows(2)
            .enumerate()
            .filter(|(_, w)| chrono_key(&w[1], key) < chrono_key(&w[0], key))
            .map(|(i, _)| i + 2)
            .collect()
    }
}

/// Mark crumbs archived, stamping `ATIME`. Already archived crumbs are left alone.
pub fn archive<'a>(crumbs: impl IntoIterator<Item = &'a mut Crumb>, now: NaiveDateTime) -> usize {
    let mut n = 0;
    for c in crumbs {
        if c.completed { continue; }
        c.add_attribute(ATIME, &stamp(now.time()));
        c.completion_date = Some(now.date());
        c.completed = true;
        n += 1;
    }
    n
}

/// Undo [`archive`]: drop `ATIME` and the completion marker.
pub fn unarchive<'a>(crumbs: impl IntoIterator<Item = &'a mut Crumb>) -> usize {
    let mut n = 0;
    for c in crumbs {
        if !c.completed { continue; }
        c.remove_attribute(ATIME);
        c.completion_date = None;
        c.completed = false;
        n += 1;
    }
    n
}

/// Search parameters. Unset fields are not applied.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SearchFilter {
    /// Matched against the description, or the whole line with `raw_text`.
    #[serde(alias = "regex_str")]
    pub regex: Option<String>,
    pub raw_text: bool,
    pub archived: Option<bool>,
    /// `""` selects crumbs without a priority.
    pub priority: Option<String>,
    /// Creation span, e.g. `1d-~`.
    pub span: Option<String>,
    /// Archive span.
    pub archived_span: Option<String>,
}

impl SearchFilter {
    pub fn regex(r: impl Into<String>) -> Self { Self { regex: Some(r.into()), ..Self::default() } }
    pub fn archived(mut self, a: bool) -> Self { self.archived = Some(a); self }
    pub fn span(mut self, s: impl Into<String>) -> Self { self.span = Some(s.into()); self }

    pub fn is_empty(&self) -> bool {
        self.regex.is_none()
            && self.archived.is_none()
            && self.priority.is_none()
            && self.span.is_none()
            && self.archived_span.is_none()
    }
}

/// Crumbs matching every set filter, in loaf order. No filters select nothing.
pub fn search(loaf: &Loaf, f: &SearchFilter, now: NaiveDateTime) -> Result<Vec<CrumbId>> {
    if f.is_empty() { return Ok(Vec::new()); }
    let re = f.regex.as_deref().map(Regex::new).transpose()?;
    let made = f.span.as_deref().map(|s| parse_span(s, now)).transpose()?;
    let gone = f.archived_span.as_deref().map(|s| parse_span(s, now)).transpose()?;
    let prio = f.priority.as_deref().map(|p| p.trim().to_ascii_uppercase().chars().next());

    Ok(loaf
        .crumbs
        .iter()
        .filter(|c| f.archived.is_none_or(|a| a == c.completed))
        .filter(|c| prio.is_none_or(|p| p == c.priority))
        .filter(|c| made.is_none_or(|s| s.contains(made_at(c))))
        .filter(|c| gone.is_none_or(|s| c.completed && s.contains(archived_at(c))))
        .filter(|c| match &re {
            None => true,
            Some(re) if f.raw_text => re.is_match(&c.to_string()),
            Some(re) => re.is_match(&c.description),
        })
        .map(|c| c.id)
        .collect())
}

/// Crumbs whose creation date is `day`.
pub fn made_on(loaf: &Loaf, day: NaiveDate) -> Vec<CrumbId> {
    loaf.crumbs.iter().filter(|c| c.creation_date == Some(day)).map(|c| c.id).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> NaiveDateTime { NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap() }

    fn sample() -> Loaf {
        let mut l = Loaf::new("unused.loaf");
        for line in [
            "2024-03-10 walk dog TIME:08-00",
            "(A) 2024-03-10 pay rent +home TIME:09-30",
            "x 2024-03-10 2024-03-09 old chore TIME:07-00 ATIME:06-00",
            "2024-01-01 ancient note TIME:12-00",
        ] {
            l.push(Crumb::parse(line));
        }
        l
    }

    #[test]
    fn add_entry_stamps_time_and_date() {
        let mut l = Loaf::new("unused.loaf");
        let id = l.add_entry("buy milk", at("2024-03-10 14:05"));
        let c = l.get(id).unwrap();
        assert_eq!(c.text(), "buy milk");
        assert_eq!(c.attribute(TIME), Some("14-05"));
        assert_eq!(c.to_string(), "2024-03-10 buy milk TIME:14-05");
        assert_eq!(c.creation_date, Some(at("2024-03-10 00:00").date()));
    }

    #[test]
    fn add_entry_keeps_explicit_stamps() {
        let mut l = Loaf::new("unused.loaf");
        let id = l.add_entry("2023-12-31 party TIME:23-59", at("2024-03-10 14:05"));
        let c = l.get(id).unwrap();
        assert_eq!(c.attribute_values(TIME), vec!["23-59"]);
        assert_eq!(c.creation_date, Some(at("2023-12-31 00:00").date()));
    }

    #[test]
    fn archive_round_trip_restores_crumb() {
        let mut c = Crumb::parse("2024-03-10 task +p k:v TIME:08-00");
        let original = c.clone();
        assert_eq!(archive([&mut c], at("2024-03-10 10:00")), 1);
        assert!(c.completed);
        assert_eq!(c.attribute(ATIME), Some("10-00"));
        assert_eq!(archive([&mut c], at("2024-03-10 11:00")), 0);
        assert_eq!(c.attribute_values(ATIME), vec!["10-00"]);
        assert_eq!(unarchive([&mut c]), 1);
        assert_eq!(c, original);
        assert_eq!(unarchive([&mut c]), 0);
    }

    #[test]
    fn empty_filter_selects_nothing() {
        let l = sample();
        assert!(search(&l, &SearchFilter::default(), at("2024-03-10 12:00")).unwrap().is_empty());
        let raw_only = SearchFilter { raw_text: true, ..SearchFilter::default() };
        assert!(search(&l, &raw_only, at("2024-03-10 12:00")).unwrap().is_empty());
    }

    #[test]
    fn filters_combine() {
        let l = sample();
        let now = at("2024-03-10 12:00");
        let open_today = search(&l, &SearchFilter::default().archived(false).span("1d-~"), now).unwrap();
        assert_eq!(open_today.len(), 2);
        let rent = search(&l, &SearchFilter::regex("rent").archived(false), now).unwrap();
        assert_eq!(l.resolve(&rent)[0].text(), "pay rent +home");
        let prio = SearchFilter { priority: Some("a".into()), ..SearchFilter::default() };
        assert_eq!(search(&l, &prio, now).unwrap(), rent);
        let no_prio = SearchFilter { priority: Some(String::new()), ..SearchFilter::default() };
        assert_eq!(search(&l, &no_prio, now).unwrap().len(), 3);
        let raw = SearchFilter { regex: Some("^x ".into()), raw_text: true, ..SearchFilter::default() };
        assert_eq!(search(&l, &raw, now).unwrap().len(), 1);
        let gone = SearchFilter { archived_span: Some("2d-~".into()), ..SearchFilter::default() };
        assert_eq!(search(&l, &gone, now).unwrap().len(), 1);
    }

    #[test]
    fn malformed_filters_are_errors() {
        let l = sample();
        let now = at("2024-03-10 12:00");
        assert!(search(&l, &SearchFilter::regex("("), now).is_err());
        assert!(search(&l, &SearchFilter::default().span("soon"), now).is_err());
    }

    #[test]
    fn filter_from_json() {
        let f: SearchFilter = serde_json::from_str(r#"{"regex_str":"dog","archived":false}"#).unwrap();
        assert_eq!(f, SearchFilter::regex("dog").archived(false));
        assert!(serde_json::from_str::<SearchFilter>(r#"{"colour":"red"}"#).is_err());
    }

    #[test]
    fn save_sorts_and_replaces_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("default.loaf");
        let mut l = sample();
        l.path = path.clone();
        l.save().unwrap();
        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "2024-01-01 ancient note TIME:12-00");
        assert_eq!(lines[1], "x 2024-03-10 2024-03-09 old chore TIME:07-00 ATIME:06-00");
        assert_eq!(lines.len(), 4);
        let back = Loaf::load(&path).unwrap();
        assert!(back.out_of_order().is_empty());
    }

    #[test]
    fn save_leaves_untouched_lines_byte_for_byte() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("default.loaf");
        let text = "2024-03-09 call  the bank TIME:08-00\n2024-03-10 meet at 10:30 with bob TIME:09-00\n";
        fs::write(&path, text).unwrap();
        let mut l = Loaf::load(&path).unwrap();
        l.save().unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), text);

        let ids: Vec<_> = l.crumbs.iter().map(|c| c.id).collect();
        archive(l.resolve_mut(&ids), at("2024-03-10 12:00"));
        unarchive(l.resolve_mut(&ids));
        l.save().unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), text);
    }

    #[test]
    fn regex_sees_attribute_text() {
        let l = sample();
        let hits = search(&l, &SearchFilter::regex("TIME:09"), at("2024-03-10 12:00")).unwrap();
        assert_eq!(l.resolve(&hits)[0].text(), "pay rent +home");
    }

    #[test]
    fn sort_key_override() {
        let mut l = Loaf::new("unused.loaf");
        l.push(Crumb::parse("2024-01-01 a TIME:00-00 due:2024-05-01"));
        l.push(Crumb::parse("2024-02-01 b TIME:00-00 due:2024-04-01"));
        assert!(l.out_of_order().is_empty());
        l.sort_key = Some("due".into());
        assert_eq!(l.out_of_order(), vec![2]);
    }
}
