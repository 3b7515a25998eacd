// breadcrumbs/src/plugins/future.rs

//! Future casting: `FUTURE:<date>` marks a crumb for a later day.

use anyhow::Result;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use super::render;
use crate::context::Context;
use crate::crumb::CrumbId;
use crate::hooks::HookEvent;
use crate::loaf::{Loaf, SearchFilter, search};
use crate::plugin::{Plugin, PluginDescriptor, PluginInfo};
use crate::sink::Figure;
use crate::span::tagged_at;

pub const FUTURE: &str = "FUTURE";

pub struct FuturePlugin;

#[derive(Debug, Default)]
struct Reminder {
    last: Option<NaiveDateTime>,
}

/// Unarchived crumbs cast to `day` or earlier, ordered by cast date.
pub fn casts_until(loaf: &Loaf, day: NaiveDate, now: NaiveDateTime) -> Result<Vec<CrumbId>> {
    let until = day.succ_opt().map_or(NaiveDateTime::MAX, |d| d.and_time(NaiveTime::MIN));
    let open = search(loaf, &SearchFilter::default().archived(false), now)?;
    let mut hits: Vec<(NaiveDateTime, CrumbId)> = loaf
        .resolve(&open)
        .into_iter()
        .filter_map(|c| tagged_at(c, FUTURE).filter(|t| *t < until).map(|t| (t, c.id)))
        .collect();
    hits.sort_by_key(|(t, _)| *t);
    Ok(hits.into_iter().map(|(_, id)| id).collect())
}

fn check_future_cmd(ctx: &mut Context, loaf: &mut Loaf, args: &str) -> Result<bool> {
    let day = NaiveDate::parse_from_str(args.trim(), "%Y-%m-%d").unwrap_or_else(|_| ctx.clock.today());
    let ids = casts_until(loaf, day, ctx.now())?;
    render(ctx, loaf, &format!("FUTURE CASTS FOR {day}"), &ids);
    if ids.is_empty() { ctx.sink.info(&format!("No casts to {day}...")); }
    ctx.select(ids);
    Ok(false)
}

fn check_future_hook(ctx: &mut Context, loaf: &mut Loaf) -> Result<()> {
    let now = ctx.now();
    let wait = ctx.settings().future_wait();
    let state = ctx.ext.get_or_default::<Reminder>();
    if state.last.is_some_and(|last| last.checked_add_signed(wait).is_none_or(|next| now < next)) { return Ok(()); }
    state.last = Some(now);
    let day = now.date();
    let ids = casts_until(loaf, day, now)?;
    if ids.is_empty() { return Ok(()); }
    let mut t = Figure::table(format!("Future Casts For {day}"), ["Cast Date", "Crumb Info"]);
    for c in loaf.resolve(&ids) {
        let text = c.text();
        let desc = if text.is_empty() { "<empty>".to_string() } else { text };
        t.push_row([c.attribute(FUTURE).unwrap_or_default().to_string(), desc]);
    }
    ctx.sink.figure(&t);
    Ok(())
}

impl Plugin for FuturePlugin {
    fn name(&self) -> &str { "future" }

    fn describe(&self) -> Result<PluginDescriptor> {
        let info = PluginInfo::new("future", "Adds future casting to crumbs.", &[])
            .topic("usage", "Add FUTURE:<yyyy-mm-dd> to a crumb (or use the ..f macro). ?f lists casts due; a reminder shows after commands.");
        Ok(PluginDescriptor::new(info)
            .command("f", "- <date> -> Optional ISO date; defaults to today.\n- Lists crumbs future cast to that date or before.\n- Never saves. Sets selection buffer.", check_future_cmd)
            .hook(HookEvent::CmdOk, "check_future", check_future_hook))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;

    use super::*;
    use crate::clock::ManualClock;
    use crate::crumb::Crumb;
    use crate::plugin::RuntimeConfig;
    use crate::plugins::{commands::CorePlugin, root::RootPlugin};
    use crate::session::Session;
    use crate::sink::{MemorySink, SinkEvent};

    fn at(s: &str) -> NaiveDateTime { NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap() }

    fn loaf() -> Loaf {
        let mut l = Loaf::new("unused.loaf");
        for line in [
            "2024-03-01 dentist FUTURE:2024-03-10 TIME:09-00",
            "2024-03-01 taxes FUTURE:2024-04-15 TIME:09-00",
            "x 2024-03-05 2024-03-01 done FUTURE:2024-03-02 TIME:09-00",
            "2024-03-01 renew FUTURE:2024-03-08 TIME:18-00",
        ] {
            l.push(Crumb::parse(line));
        }
        l
    }

    #[test]
    fn casts_include_the_whole_day_and_skip_archived() {
        let l = loaf();
        let ids = casts_until(&l, at("2024-03-10 00:00").date(), at("2024-03-10 08:00")).unwrap();
        let names: Vec<_> = l.resolve(&ids).iter().map(|c| c.text()).collect();
        assert_eq!(names, vec!["renew", "dentist"]);
        assert_eq!(casts_until(&l, NaiveDate::MAX, at("2024-03-10 08:00")).unwrap().len(), 3);
    }

    #[test]
    fn reminder_is_throttled() {
        let clock = Arc::new(ManualClock::new(at("2024-03-10 08:00")));
        let descs = vec![RootPlugin.describe().unwrap(), CorePlugin.describe().unwrap(), FuturePlugin.describe().unwrap()];
        let config = RuntimeConfig::from_descriptors(descs).unwrap();
        let sink = Arc::new(MemorySink::new());
        let mut s = Session::with_parts(config, sink.clone(), clock.clone(), loaf());
        let figures = || sink.events().iter().filter(|e| matches!(e, SinkEvent::Figure(_))).count();
        s.parse("?l");
        assert_eq!(figures(), 1);
        s.parse("?l");
        assert_eq!(figures(), 1);
        clock.advance(Duration::minutes(31));
        s.parse("?l");
        assert_eq!(figures(), 2);
    }
}
