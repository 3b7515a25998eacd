// breadcrumbs/src/plugins/metrics.rs

//! `?m`, `?im`, the metric hooks and the built-in metric functions.
//!
//! Every metric reads `tag:<value>` attributes from unarchived crumbs and
//! answers `None` when its sample for the tag has not changed since the
//! last computation.

use std::collections::BTreeMap;

use anyhow::{Context as _, Result};
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use serde_json::Value;

use crate::context::Context;
use crate::hooks::HookEvent;
use crate::loaf::{Loaf, SearchFilter, search};
use crate::metrics::{Metric, MetricCache, MetricInput, Options, Trigger, collect};
use crate::plugin::{Plugin, PluginDescriptor, PluginInfo};
use crate::sink::Figure;
use crate::span::{before, made_at, parse_delta};

const WEEKDAYS: [&str; 7] = ["Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday", "Sunday"];
const EMPTY_DAY: &str = "∅";
const TIME_FMT: &str = "%Y-%m-%d %H:%M";

pub struct MetricsPlugin;

fn opt_str<'a>(options: &'a Options, key: &str, default: &'a str) -> &'a str {
    options.get(key).and_then(Value::as_str).unwrap_or(default)
}

fn opt_f64(options: &Options, key: &str) -> Option<f64> {
    options.get(key).and_then(Value::as_f64)
}

/// `(value, made_at)` for every unarchived crumb carrying `tag`, oldest first.
fn samples(input: &MetricInput<'_>, span: Option<&str>) -> Result<Vec<(String, NaiveDateTime)>> {
    let mut filter = SearchFilter::default().archived(false);
    if let Some(span) = span { filter = filter.span(span); }
    let ids = search(input.loaf, &filter, input.now)?;
    let mut out: Vec<_> = input
        .loaf
        .resolve(&ids)
        .into_iter()
        .flat_map(|c| c.attribute_values(input.tag).into_iter().map(move |v| (v.to_string(), made_at(c))))
        .collect();
    out.sort_by_key(|(_, t)| *t);
    Ok(out)
}

fn minutes(d: Duration) -> f64 { d.num_seconds() as f64 / 60.0 }

/// Sums by category, smallest first.
fn breakdown(title: String, column: &str, data: impl IntoIterator<Item = (String, f64)>) -> Figure {
    let mut totals: BTreeMap<String, f64> = BTreeMap::new();
    for (k, v) in data { *totals.entry(k).or_default() += v; }
    let mut rows: Vec<_> = totals.into_iter().collect();
    rows.sort_by(|a, b| a.1.total_cmp(&b.1));
    let mut t = Figure::table(title, ["Category", column]);
    for (k, v) in rows { t.push_row([k, format!("{v}")]); }
    t
}

/// Time tracking. Each `tag:<category>` starts a segment that runs until the
/// next sample; `tag:END` (or `tag:0`) only closes the running segment.
///
/// Options: `span` (default `1d-~`).
pub struct SpanMetric;

impl SpanMetric {
    fn closes(value: &str) -> bool { value == "0" || value.eq_ignore_ascii_case("end") }

    fn segments(data: &[(String, NaiveDateTime)]) -> Vec<(String, NaiveDateTime, NaiveDateTime)> {
        data.windows(2)
            .filter(|w| !Self::closes(&w[0].0))
            .map(|w| (w[0].0.clone(), w[0].1, w[1].1))
            .collect()
    }
}

impl Metric for SpanMetric {
    fn name(&self) -> &'static str { "span" }

    fn compute(&self, input: &MetricInput<'_>, cache: &mut MetricCache) -> Result<Option<Vec<Figure>>> {
        let span = opt_str(input.options, "span", "1d-~");
        let data = samples(input, Some(span))?;
        if !cache.changed(input.tag, &data) { return Ok(None); }
        let segments = Self::segments(&data);
        let (Some(first), Some(last)) = (segments.first(), segments.last()) else { return Ok(None) };
        let mut t = Figure::table(
            format!("Time Spans: {} - {}", first.1.format(TIME_FMT), last.2.format(TIME_FMT)),
            ["Start", "End", "Task", "Delta (m)", "Delta (h)"],
        );
        for (task, start, end) in &segments {
            let m = minutes(*end - *start);
            t.push_row([start.format(TIME_FMT).to_string(), end.format(TIME_FMT).to_string(), task.clone(), format!("{m}"), format!("{:.2}", m / 60.0)]);
        }
        let totals = breakdown(
            format!("Breakdown of {}", input.tag),
            "Minutes",
            segments.iter().map(|(task, start, end)| (task.clone(), minutes(*end - *start))),
        );
        Ok(Some(vec![t, totals]))
    }
}

/// Signed amounts per source: `tag:<value>/<category>`.
///
/// Options: `time_limit` in days for the running total (default 40).
pub struct RunningTotal;

impl Metric for RunningTotal {
    fn name(&self) -> &'static str { "running_total" }

    fn compute(&self, input: &MetricInput<'_>, cache: &mut MetricCache) -> Result<Option<Vec<Figure>>> {
        let mut data = Vec::new();
        for (raw, t) in samples(input, None)? {
            let Some((value, category)) = raw.split_once('/') else {
                tracing::debug!(tag = input.tag, value = %raw, "sample has no category");
                continue;
            };
            let value: f64 = value.parse().with_context(|| format!("'{raw}' is not {}:<number>/<category>", input.tag))?;
            data.push((value, category.to_string(), t));
        }
        if !cache.changed(input.tag, &data) || data.is_empty() { return Ok(None); }
        let heat = breakdown(format!("Heatmap of {} (All Time)", input.tag), "Effect", data.iter().map(|(v, c, _)| (c.clone(), *v)));
        let days = opt_f64(input.options, "time_limit").unwrap_or(40.0);
        let limit = format!("{days}d");
        let since = before(input.now, parse_delta(&limit)?, &limit)?;
        let mut net = Figure::table(format!("Net Change Over Time of {}", input.tag), ["Time", "Net Total"]);
        let mut total = 0.0;
        for (v, _, t) in &data {
            total += v;
            if *t >= since { net.push_row([t.format(TIME_FMT).to_string(), format!("{total}")]); }
        }
        Ok(Some(vec![heat, net]))
    }
}

/// Per-day sums of `tag:<value>` laid out as a week grid.
///
/// Options: `span` (default `40d-~`), `goal` and `fail` thresholds, and
/// `good_is_low` to flip which direction meets them.
pub struct DailyTotal;

impl DailyTotal {
    fn mark(value: f64, options: &Options) -> &'static str {
        let low = options.get("good_is_low").and_then(Value::as_bool).unwrap_or(false);
        let reached = |limit: f64| if low { value <= limit } else { value >= limit };
        let missed = |limit: f64| if low { value >= limit } else { value <= limit };
        match (opt_f64(options, "goal"), opt_f64(options, "fail")) {
            (Some(g), _) if reached(g) => " ✓",
            (_, Some(f)) if missed(f) => " ✗",
            _ => "",
        }
    }
}

impl Metric for DailyTotal {
    fn name(&self) -> &'static str { "daily_total" }

    fn compute(&self, input: &MetricInput<'_>, cache: &mut MetricCache) -> Result<Option<Vec<Figure>>> {
        let span = opt_str(input.options, "span", "40d-~");
        let mut days: BTreeMap<NaiveDate, f64> = BTreeMap::new();
        for (raw, t) in samples(input, Some(span))? {
            let v: f64 = raw.parse().with_context(|| format!("'{raw}' is not {}:<number>", input.tag))?;
            *days.entry(t.date()).or_default() += v;
        }
        if !cache.changed(input.tag, &days) { return Ok(None); }
        let (Some(first), Some(last)) = (days.keys().next().copied(), days.keys().last().copied()) else { return Ok(None) };
        let start = first.checked_sub_signed(Duration::days(first.weekday().num_days_from_monday() as i64)).unwrap_or(first);
        let mut t = Figure::table(format!("Record of {} over {span}", input.tag), std::iter::once("Week").chain(WEEKDAYS));
        let mut week = start;
        while week <= last {
            let mut row = vec![week.iso_week().week().to_string()];
            for day in week.iter_days().take(7) {
                let cell = match days.get(&day) {
                    Some(v) => format!("{day}\n{v}{}", Self::mark(*v, input.options)),
                    None => format!("{day}\n{EMPTY_DAY}"),
                };
                row.push(cell);
            }
            t.push_row(row);
            let Some(next) = week.checked_add_signed(Duration::weeks(1)) else { break };
            week = next;
        }
        Ok(Some(vec![t]))
    }
}

fn metrics_cmd(ctx: &mut Context, loaf: &mut Loaf, args: &str) -> Result<bool> {
    let args = args.trim();
    let (tag, overrides) = match args.split_once('/') {
        Some((tag, json)) => match serde_json::from_str::<Options>(json) {
            Ok(o) => (tag.trim(), Some(o)),
            Err(e) => {
                tracing::debug!(error = %e, "metric options are not a JSON object; using the whole argument as tag");
                (args, None)
            }
        },
        None => (args, None),
    };
    let tag = (!tag.is_empty()).then_some(tag);
    let figures = collect(ctx, loaf, tag, overrides.as_ref(), Trigger::Command);
    if figures.is_empty() { ctx.sink.info("No metrics to show."); }
    Ok(false)
}

fn list_metrics_cmd(ctx: &mut Context, _: &mut Loaf, _: &str) -> Result<bool> {
    let mut t = Figure::table("Programmed Metrics", ["Tag", "Type", "Eager", "Plugin"]);
    for m in &ctx.config.metrics {
        t.push_row([m.tag.clone(), m.metric.name().to_string(), m.eager.to_string(), m.plugin.clone()]);
    }
    ctx.sink.clear();
    ctx.sink.figure(&t);
    Ok(false)
}

/// The first run after startup fills the cache without drawing anything.
fn check_metrics(ctx: &mut Context, loaf: &mut Loaf) -> Result<()> {
    let primed = ctx.ext.get::<MetricCache>().is_some_and(MetricCache::is_primed);
    collect(ctx, loaf, None, None, if primed { Trigger::Hook } else { Trigger::Prime });
    Ok(())
}

impl Plugin for MetricsPlugin {
    fn name(&self) -> &str { "metrics" }

    fn describe(&self) -> Result<PluginDescriptor> {
        let info = PluginInfo::new("metrics", "Collects and renders metrics from crumb attributes.", &[])
            .topic("usage", "Metrics read tag:value attributes. Eager metrics redraw after a command when their data changes. ?m <tag>/<json> overrides a metric's options once.");
        Ok(PluginDescriptor::new(info)
            .command("im", "- No args.\n- Lists the programmed metrics.\n- Never saves.", list_metrics_cmd)
            .command("m", "- <tag>/<json options> -> Both optional.\n- Renders every metric, or only those for the tag.\n- Never saves.", metrics_cmd)
            .hook(HookEvent::Init, "check_metrics", check_metrics)
            .hook(HookEvent::CmdOk, "check_metrics", check_metrics))
    }
}
