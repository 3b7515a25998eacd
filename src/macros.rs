// breadcrumbs/src/macros.rs

use std::{fmt, sync::Arc};

use regex::Regex;

use crate::error::{CrumbError, Result};

pub type TransformFn = Arc<dyn Fn(&str) -> anyhow::Result<String> + Send + Sync>;

/// A text rewrite applied to raw input before dispatch.
#[derive(Clone)]
pub enum Macro {
    /// Every match of `regex` is replaced; `$1`/`${name}` refer to groups.
    Pattern { regex: Regex, replacement: String },
    /// Arbitrary rewrite of the whole input. The docs are shown by `?ic`.
    Transform { func: TransformFn, before: String, after: String },
}

impl fmt::Debug for Macro {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (before, after) = self.describe();
        f.debug_struct("Macro").field("before", &before).field("after", &after).finish()
    }
}

/// `\1` style back references are accepted alongside `$1`.
fn normalize_replacement(rep: &str) -> String {
    let mut out = String::with_capacity(rep.len());
    let mut chars = rep.chars().peekable();
    while let Some(c) = chars.next() {
        match (c, chars.peek()) {
            ('\\', Some(d)) if d.is_ascii_digit() => {
                let mut n = String::new();
                while let Some(d) = chars.peek().filter(|d| d.is_ascii_digit()) { n.push(*d); chars.next(); }
                out.push_str(&format!("${{{n}}}"));
            }
            _ => out.push(c),
        }
    }
    out
}

impl Macro {
    pub fn pattern(name: &str, pattern: &str, replacement: &str) -> Result<Self> {
        let regex = Regex::new(pattern).map_err(|source| CrumbError::BadMacro { name: name.to_string(), source })?;
        Ok(Macro::Pattern { regex, replacement: normalize_replacement(replacement) })
    }

    pub fn transform<F>(before: impl Into<String>, after: impl Into<String>, f: F) -> Self
    where
        F: Fn(&str) -> anyhow::Result<String> + Send + Sync + 'static,
    {
        Macro::Transform { func: Arc::new(f), before: before.into(), after: after.into() }
    }

    pub fn apply(&self, text: &str) -> anyhow::Result<String> {
        match self {
            Macro::Pattern { regex, replacement } => Ok(regex.replace_all(text, replacement.as_str()).into_owned()),
            Macro::Transform { func, .. } => func(text),
        }
    }

    /// `(before, after)` pair for listings.
    pub fn describe(&self) -> (String, String) {
        match self {
            Macro::Pattern { regex, replacement } => (regex.as_str().to_string(), replacement.clone()),
            Macro::Transform { before, after, .. } => (before.clone(), after.clone()),
        }
    }
}

#[derive(Clone, Debug)]
pub struct MacroSpec {
    pub name: String,
    pub rule: Macro,
    /// Contributing plugin.
    pub plugin: String,
}

/// Ordered macro set. Later rules see the output of earlier ones.
#[derive(Clone, Debug, Default)]
pub struct MacroTable {
    rules: Vec<MacroSpec>,
}

impl MacroTable {
    pub fn new() -> Self { Self::default() }
    pub fn push(&mut self, spec: MacroSpec) { self.rules.push(spec); }
    pub fn contains(&self, name: &str) -> bool { self.rules.iter().any(|m| m.name == name) }
    pub fn iter(&self) -> impl Iterator<Item = &MacroSpec> { self.rules.iter() }
    pub fn len(&self) -> usize { self.rules.len() }
    pub fn is_empty(&self) -> bool { self.rules.is_empty() }

    /// One forward pass over every rule. Input without matches is returned unchanged.
    pub fn expand(&self, input: &str) -> anyhow::Result<String> {
        let mut text = input.to_string();
        for m in &self.rules {
            text = m.rule.apply(&text).map_err(|e| e.context(format!("macro '{}' failed", m.name)))?;
        }
        Ok(text)
    }
}

impl FromIterator<MacroSpec> for MacroTable {
    fn from_iter<I: IntoIterator<Item = MacroSpec>>(iter: I) -> Self { Self { rules: iter.into_iter().collect() } }
}
