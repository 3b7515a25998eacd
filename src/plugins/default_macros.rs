// breadcrumbs/src/plugins/default_macros.rs

//! Shorthand macros and the metric tags they feed.

use std::sync::{Arc, LazyLock};

use anyhow::Result;
use regex::{Captures, Regex};

use super::future::FUTURE;
use super::metrics::{DailyTotal, RunningTotal, SpanMetric};
use crate::clock::{Clock, stamp};
use crate::macros::Macro;
use crate::metrics::Options;
use crate::plugin::{Plugin, PluginDescriptor, PluginInfo};
use crate::span::{after, parse_delta};

/// Daily habit tags summed per day.
const HABITS: [&str; 18] = [
    "brush", "floss", "mwash", "shavef", "shaveb", "showere", "showern", "vit", "zol", "thy", "laundry", "sclean",
    "fclean", "exe", "str", "wake", "meal", "sleep",
];

static DELTA: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\.\.delta\s(\S*)").expect("delta regex"));

pub struct DefaultMacrosPlugin {
    clock: Arc<dyn Clock>,
}

impl DefaultMacrosPlugin {
    pub fn new(clock: Arc<dyn Clock>) -> Self { Self { clock } }
}

/// `..delta 3d` becomes the date three days from today.
fn expand_delta(clock: &dyn Clock, text: &str) -> Result<String> {
    let mut failure = None;
    let out = DELTA.replace_all(text, |caps: &Captures<'_>| match parse_delta(&caps[1]).and_then(|d| after(clock.now(), d, &caps[1])) {
        Ok(t) => t.date().to_string(),
        Err(e) => {
            failure.get_or_insert(e);
            caps[0].to_string()
        }
    });
    match failure {
        Some(e) => Err(e.into()),
        None => Ok(out.into_owned()),
    }
}

impl Plugin for DefaultMacrosPlugin {
    fn name(&self) -> &str { "default_macros" }

    fn describe(&self) -> Result<PluginDescriptor> {
        let info = PluginInfo::new("default_macros", "Default macros and metric tags.", &["metrics", "future"])
            .topic("usage", "..n x -> x:1, ..today, ..now, ..delta 3d, ..f <date>, ..c <value> <category>, ..t <task>, ..m <mood>. ?io lists them all.");
        let (today, now, delta) = (self.clock.clone(), self.clock.clone(), self.clock.clone());
        let mut d = PluginDescriptor::new(info)
            .macro_rule("slash", Macro::pattern("slash", ",,", "/")?)
            .macro_rule("value", Macro::pattern("value", r"\.\.n\s(\S*)", r"\1:1")?)
            .macro_rule("date", Macro::transform("..today", "<today's date>", move |t| Ok(t.replace("..today", &today.today().to_string()))))
            .macro_rule("time", Macro::transform("..now", "<clock time, HH-MM>", move |t| Ok(t.replace("..now", &stamp(now.time())))))
            .macro_rule("delta", Macro::transform(r"..delta <span>", "<today + span>", move |t| expand_delta(delta.as_ref(), t)))
            .macro_rule("future", Macro::pattern("future", r"\.\.f\s(\S*)", &format!(r"{FUTURE}:\1"))?)
            .macro_rule("cost", Macro::pattern("cost", r"\.\.c\s(\S*)\s(\S*)", r"cost:\1/\2")?)
            .macro_rule("track", Macro::pattern("track", r"\.\.t\s(\S*)", r"track:\1")?)
            .macro_rule("mood", Macro::pattern("mood", r"\.\.m\s(\S*)", r"mood:\1")?)
            .metric("track", SpanMetric, Options::new(), true)
            .metric("mood", SpanMetric, Options::new(), true)
            .metric("cost", RunningTotal, Options::new(), true);
        for habit in HABITS {
            d = d.metric(habit, DailyTotal, Options::new(), true);
        }
        Ok(d)
    }
}
