// breadcrumbs/src/metrics.rs

//! Named computations over the loaf that render as figures.

use std::{collections::HashMap, fmt, sync::Arc};

use anyhow::Result;
use chrono::NaiveDateTime;
use serde_json::{Map, Value};

use crate::context::Context;
use crate::loaf::Loaf;
use crate::sink::Figure;

pub type Options = Map<String, Value>;

/// Inputs shared by every metric computation.
pub struct MetricInput<'a> {
    pub loaf: &'a Loaf,
    pub tag: &'a str,
    pub options: &'a Options,
    pub now: NaiveDateTime,
}

pub trait Metric: Send + Sync {
    fn name(&self) -> &'static str;

    /// `Ok(None)` when there is nothing new to show.
    fn compute(&self, input: &MetricInput<'_>, cache: &mut MetricCache) -> Result<Option<Vec<Figure>>>;
}

#[derive(Clone)]
pub struct MetricSpec {
    pub tag: String,
    pub metric: Arc<dyn Metric>,
    pub options: Options,
    /// Computed after every successful command, not only on request.
    pub eager: bool,
    pub plugin: String,
}

impl fmt::Debug for MetricSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MetricSpec({} {} eager={})", self.metric.name(), self.tag, self.eager)
    }
}

/// Last rendered sample per tag, so unchanged metrics stay quiet.
#[derive(Debug, Default)]
pub struct MetricCache {
    samples: HashMap<String, String>,
    primed: bool,
}

impl MetricCache {
    /// Records `sample` for `tag`; true when it differs from the previous one.
    pub fn changed<T: fmt::Debug>(&mut self, tag: &str, sample: &T) -> bool {
        let fingerprint = format!("{sample:?}");
        if self.samples.get(tag) == Some(&fingerprint) { return false; }
        self.samples.insert(tag.to_string(), fingerprint);
        true
    }

    pub fn forget(&mut self, tag: &str) { self.samples.remove(tag); }
    pub fn is_primed(&self) -> bool { self.primed }
}

/// Who asked for the metrics.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Trigger {
    /// Explicit request: always recompute and render under a title.
    Command,
    /// After a command: eager metrics only, rendering what changed.
    Hook,
    /// Fill the cache without rendering.
    Prime,
}

/// Compute every metric whose tag matches `tag` (all when `None`).
/// `overrides` take precedence over the registered options.
pub fn collect(ctx: &mut Context, loaf: &Loaf, tag: Option<&str>, overrides: Option<&Options>, trigger: Trigger) -> Vec<Figure> {
    let specs: Vec<MetricSpec> = ctx
        .config
        .metrics
        .iter()
        .filter(|m| tag.is_none_or(|t| t.eq_ignore_ascii_case(&m.tag)))
        .filter(|m| trigger == Trigger::Command || m.eager)
        .cloned()
        .collect();
    let now = ctx.now();
    let mut figures = Vec::new();
    for spec in specs {
        let mut options = overrides.cloned().unwrap_or_default();
        for (k, v) in &spec.options { options.entry(k.clone()).or_insert_with(|| v.clone()); }
        let cache = ctx.ext.get_or_default::<MetricCache>();
        if trigger == Trigger::Command { cache.forget(&spec.tag); }
        let input = MetricInput { loaf, tag: &spec.tag, options: &options, now };
        match spec.metric.compute(&input, cache) {
            Ok(Some(f)) => figures.extend(f),
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(metric = spec.metric.name(), tag = %spec.tag, error = %format!("{e:#}"), "metric failed");
                ctx.sink.err(&format!("Could not collect metric {}", spec.tag), &e);
            }
        }
    }
    ctx.ext.get_or_default::<MetricCache>().primed = true;
    match trigger {
        Trigger::Prime => {}
        Trigger::Command => {
            ctx.sink.clear();
            ctx.sink.title("METRICS");
            for f in &figures { ctx.sink.figure(f); }
        }
        Trigger::Hook => for f in &figures { ctx.sink.figure(f); },
    }
    figures
}
