// breadcrumbs/src/config.rs

//! Typed settings deserialized from the merged plugin settings table, plus
//! the breadbox and user `config.toml` that feed it.

use std::{fs, path::{Path, PathBuf}};

use anyhow::Context as _;
use chrono::Duration;
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use toml::{Table, Value};

use crate::error::{CrumbError, Result};
use crate::macros::Macro;
use crate::plugin::{PluginDescriptor, PluginInfo};

/// Settings after every plugin has been merged. The first plugin to set a
/// scalar wins.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub breadbox: PathBuf,
    /// Loaf file name inside the breadbox.
    pub loaf: String,
    /// External editor command; `%P` is replaced with a path.
    pub editor: String,
    /// Leading character that marks a command.
    pub escape: char,
    pub default_span: String,
    pub selection_ttl_secs: u64,
    /// Display profile name.
    pub profile: String,
    /// Attribute that overrides creation date + `TIME` when sorting on save.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_key: Option<String>,
    pub future: FutureSettings,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FutureSettings {
    /// Minimum seconds between future-cast reminders.
    pub wait_secs: u64,
}

impl Default for FutureSettings {
    fn default() -> Self { Self { wait_secs: 60 * 30 } }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            breadbox: PathBuf::from(".breadbox"),
            loaf: "default.loaf".into(),
            editor: "vim %P".into(),
            escape: '?',
            default_span: "1d-~".into(),
            selection_ttl_secs: 30,
            profile: "normal".into(),
            sort_key: None,
            future: FutureSettings::default(),
        }
    }
}

impl Settings {
    /// Deserialize and range-check. Second counts must fit a [`Duration`].
    pub fn from_table(t: &Table) -> Result<Self> {
        let s: Self = Value::Table(t.clone()).try_into()?;
        for (key, value) in [("selection_ttl_secs", s.selection_ttl_secs), ("future.wait_secs", s.future.wait_secs)] {
            if seconds(value).is_none() { return Err(CrumbError::SettingOutOfRange { key, value }); }
        }
        Ok(s)
    }

    pub fn loaf_path(&self) -> PathBuf { self.breadbox.join(&self.loaf) }
    pub fn selection_ttl(&self) -> Duration { seconds(self.selection_ttl_secs).unwrap_or(Duration::MAX) }
    pub fn future_wait(&self) -> Duration { seconds(self.future.wait_secs).unwrap_or(Duration::MAX) }
}

fn seconds(n: u64) -> Option<Duration> { i64::try_from(n).ok().and_then(Duration::try_seconds) }

/// Left-biased deep merge: tables recurse, arrays concatenate (`a` first),
/// any other value already in `a` is kept.
pub fn merge_tables(a: &mut Table, b: Table) {
    for (k, v) in b {
        match (a.get_mut(&k), v) {
            (None, v) => { a.insert(k, v); }
            (Some(Value::Table(at)), Value::Table(bt)) => merge_tables(at, bt),
            (Some(Value::Array(aa)), Value::Array(ba)) => aa.extend(ba),
            (Some(_), _) => {}
        }
    }
}

/// `--breadbox`, else `./.breadbox` when present, else `~/.breadbox`.
/// Creates the directory and an empty `default.loaf` when missing.
pub fn ensure_breadbox(explicit: Option<&Path>) -> anyhow::Result<PathBuf> {
    let dir = match explicit {
        Some(p) => p.to_path_buf(),
        None if Path::new(".breadbox").is_dir() => PathBuf::from(".breadbox"),
        None => BaseDirs::new().context("no home directory")?.home_dir().join(".breadbox"),
    };
    fs::create_dir_all(&dir).with_context(|| format!("create breadbox {}", dir.display()))?;
    let loaf = dir.join("default.loaf");
    if !loaf.exists() {
        fs::write(&loaf, "").with_context(|| format!("create {}", loaf.display()))?;
    }
    Ok(dir)
}

/// Reads `<breadbox>/config.toml`; a missing file is not an error.
pub fn read_user_table(breadbox: &Path) -> Result<Option<Table>> {
    let path = breadbox.join("config.toml");
    if !path.exists() { return Ok(None); }
    let text = fs::read_to_string(&path)?;
    Ok(Some(toml::from_str(&text)?))
}

/// Turns user/CLI settings into the highest-precedence descriptor.
///
/// `imports` enables more built-in plugins; `[macros]` adds static
/// `name = [pattern, replacement]` rules; everything else is settings.
pub fn user_plugin(mut table: Table) -> Result<PluginDescriptor> {
    let imports = match table.remove("imports") {
        Some(Value::Array(a)) => a.into_iter().filter_map(|v| v.as_str().map(str::to_string)).collect(),
        _ => Vec::new(),
    };
    let mut desc = PluginDescriptor::new(PluginInfo {
        name: "user".into(),
        description: "Settings from the breadbox config.toml and the command line.".into(),
        imports,
        ..PluginInfo::default()
    });
    if let Some(Value::Table(macros)) = table.remove("macros") {
        for (name, rule) in macros {
            let pair = rule.as_array().filter(|a| a.len() == 2);
            let Some([Value::String(pat), Value::String(rep)]) = pair.map(Vec::as_slice) else {
                tracing::warn!(%name, "ignoring macro: expected [pattern, replacement]");
                continue;
            };
            let rule = Macro::pattern(&name, pat, rep)?;
            desc = desc.macro_rule(name, rule);
        }
    }
    desc.settings = table;
    Ok(desc)
}

/// A settings-only layer, e.g. command line overrides.
pub fn overrides(pairs: impl IntoIterator<Item = (&'static str, Value)>) -> Table {
    pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}
