// breadcrumbs/src/plugins/commands.rs

//! The `core` plugin: adding, selecting, archiving and inspecting crumbs.

use std::{collections::BTreeMap, fs, process::Command};

use anyhow::{Context as _, Result, anyhow, bail};
use regex::Regex;

use super::{render, trail_ids};
use crate::context::Context;
use crate::crumb::{Crumb, CrumbId};
use crate::loaf::{self, Loaf, SearchFilter, search};
use crate::plugin::{Plugin, PluginDescriptor, PluginInfo};
use crate::sink::Figure;

pub struct CorePlugin;

/// Show the trail and make `ids` the selection.
fn added(ctx: &mut Context, loaf: &Loaf, ids: Vec<CrumbId>) -> Result<()> {
    let trail = trail_ids(ctx, loaf)?;
    render(ctx, loaf, "BREADCRUMB TRAIL", &trail);
    ctx.buffers.last_added = ids.last().copied();
    ctx.select(ids);
    Ok(())
}

fn print_buffer_cmd(ctx: &mut Context, loaf: &mut Loaf, _: &str) -> Result<bool> {
    let ids = ctx.selected();
    render(ctx, loaf, "SELECTION BUFFER", &ids);
    match ctx.buffers.selection.expires() {
        Some(exp) if !ids.is_empty() => ctx.sink.info(&format!("Buffer auto-expires at {}.", exp.format("%Y-%m-%d %H:%M:%S"))),
        _ => ctx.sink.info("Buffer is empty..."),
    }
    Ok(false)
}

fn raw_add_cmd(ctx: &mut Context, loaf: &mut Loaf, args: &str) -> Result<bool> {
    let id = loaf.push(Crumb::parse(args));
    added(ctx, loaf, vec![id])?;
    Ok(true)
}

fn add_cmd(ctx: &mut Context, loaf: &mut Loaf, args: &str) -> Result<bool> {
    if Crumb::parse(args).text().is_empty() {
        ctx.sink.warn("Not adding a crumb without a description.");
        return Ok(false);
    }
    let id = loaf.add_entry(args, ctx.now());
    added(ctx, loaf, vec![id])?;
    Ok(true)
}

fn edit_external_cmd(ctx: &mut Context, loaf: &mut Loaf, args: &str) -> Result<bool> {
    let selected = ctx.selected();
    let path = ctx.settings().breadbox.join("selection_buffer");
    let text: String = loaf.resolve(&selected).iter().map(|c| format!("{c}\n")).collect();
    fs::write(&path, text).with_context(|| format!("write {}", path.display()))?;
    let editor = if args.trim().is_empty() { ctx.settings().editor.clone() } else { args.trim().to_string() };
    let cmd = editor.replace("%P", &path.display().to_string());
    tracing::debug!(%cmd, "launching editor");
    let status = Command::new("sh").arg("-c").arg(&cmd).status().with_context(|| format!("run `{cmd}`"))?;
    if !status.success() {
        ctx.sink.err("Not saving...", &anyhow!("`{cmd}` exited with {status}"));
        return Ok(false);
    }
    let edited = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
    loaf.remove(&selected);
    let ids: Vec<CrumbId> = edited.lines().filter(|l| !l.trim().is_empty()).map(|l| loaf.push(Crumb::parse(l))).collect();
    ctx.select(ids);
    print_buffer_cmd(ctx, loaf, "")?;
    Ok(true)
}

fn block_add_cmd(ctx: &mut Context, loaf: &mut Loaf, args: &str) -> Result<bool> {
    let (prefix, postfix) = args.split_once('/').unwrap_or(("", args));
    let table = Figure::table("Editing in block mode using:", ["Prefix", "Postfix"])
        .row([prefix, postfix])
        .with_caption("(Type END to finish block edit)");
    let mut ids = Vec::new();
    loop {
        render(ctx, loaf, "BLOCK EDIT", &ids);
        ctx.sink.figure(&table);
        let line = ctx.sink.prompt("")?;
        if line == "END" { break; }
        let text = format!("{prefix} {line} {postfix}");
        ids.push(loaf.add_entry(text.trim(), ctx.now()));
    }
    render(ctx, loaf, "BLOCK EDIT", &ids);
    ctx.sink.info("Saving Block");
    ctx.buffers.last_added = ids.last().copied();
    ctx.select(ids);
    Ok(true)
}

fn nop_cmd(ctx: &mut Context, _: &mut Loaf, _: &str) -> Result<bool> {
    let esc = ctx.config.commands.escape();
    ctx.sink.info(&format!("Use {esc}ic to list commands"));
    Ok(false)
}

fn command_info_cmd(ctx: &mut Context, _: &mut Loaf, _: &str) -> Result<bool> {
    let esc = ctx.config.commands.escape();
    let mut t = Figure::table("Crumb Commands.", ["What You Type...", "What Happens..."]);
    for s in ctx.config.commands.specs() { t.push_row([format!("{esc}{}", s.trigger), s.help.clone()]); }
    ctx.sink.clear();
    ctx.sink.title("COMMAND INFO");
    ctx.sink.figure(&t);
    Ok(false)
}

fn macro_info_cmd(ctx: &mut Context, _: &mut Loaf, _: &str) -> Result<bool> {
    let mut t = Figure::table("Macro Commands.", ["Name", "Before Regex...", "After Regex..."]);
    for m in ctx.config.macros.iter() {
        let (before, after) = m.rule.describe();
        t.push_row([m.name.clone(), before, after]);
    }
    ctx.sink.clear();
    ctx.sink.title("MACRO INFO");
    ctx.sink.figure(&t);
    Ok(false)
}

fn hooks_info_cmd(ctx: &mut Context, _: &mut Loaf, _: &str) -> Result<bool> {
    let mut t = Figure::table("Registered Hooks.", ["Hook", "Registered Functions"]);
    for (event, hooks) in ctx.config.hooks.iter() {
        let names: Vec<String> = hooks.iter().map(|h| format!("{}::{}", h.plugin, h.name)).collect();
        t.push_row([event.to_string(), names.join("\n")]);
    }
    ctx.sink.clear();
    ctx.sink.title("HOOK INFO");
    ctx.sink.figure(&t);
    Ok(false)
}

fn archive_cmd(ctx: &mut Context, loaf: &mut Loaf, _: &str) -> Result<bool> {
    let ids = ctx.selected();
    loaf::archive(loaf.resolve_mut(&ids), ctx.now());
    render(ctx, loaf, "ARCHIVED", &ids);
    ctx.sink.info(&format!("Archived {} crumbs.", ids.len()));
    Ok(true)
}

fn unarchive_cmd(ctx: &mut Context, loaf: &mut Loaf, _: &str) -> Result<bool> {
    let ids = ctx.selected();
    loaf::unarchive(loaf.resolve_mut(&ids));
    render(ctx, loaf, "UNARCHIVED", &ids);
    ctx.sink.info(&format!("Unarchived {} crumbs.", ids.len()));
    Ok(true)
}

fn select_with(ctx: &mut Context, loaf: &Loaf, filter: &SearchFilter, title: &str) -> Result<bool> {
    let ids = search(loaf, filter, ctx.now())?;
    render(ctx, loaf, title, &ids);
    ctx.select(ids);
    Ok(true)
}

fn select_cmd(ctx: &mut Context, loaf: &mut Loaf, args: &str) -> Result<bool> {
    select_with(ctx, loaf, &SearchFilter::regex(args).archived(false), "SELECT")
}

fn select_archive_cmd(ctx: &mut Context, loaf: &mut Loaf, args: &str) -> Result<bool> {
    select_with(ctx, loaf, &SearchFilter::regex(args).archived(true), "STALE SELECT")
}

fn advanced_select_cmd(ctx: &mut Context, loaf: &mut Loaf, args: &str) -> Result<bool> {
    let filter: SearchFilter = serde_json::from_str(args).context("search json (see ?h core/search-json)")?;
    select_with(ctx, loaf, &filter, "ADVANCED SELECT")
}

fn sub_select_cmd(ctx: &mut Context, loaf: &mut Loaf, _: &str) -> Result<bool> {
    let ids = ctx.selected();
    let mut t = Figure::table("Selection Buffer.", ["ID", "Crumb"]);
    for (i, c) in loaf.resolve(&ids).iter().enumerate() { t.push_row([i.to_string(), c.to_string()]); }
    ctx.sink.clear();
    ctx.sink.title("SUB-SELECT MODE");
    ctx.sink.figure(&t);
    let answer = ctx.sink.prompt("Space Separated ID Selection")?;
    let picked: Vec<usize> = answer.split_whitespace().filter_map(|s| s.parse().ok()).collect();
    let kept = ids.into_iter().enumerate().filter(|(i, _)| picked.contains(i)).map(|(_, id)| id).collect();
    ctx.select(kept);
    print_buffer_cmd(ctx, loaf, "")
}

fn list_cmd(ctx: &mut Context, loaf: &mut Loaf, _: &str) -> Result<bool> {
    let ids = trail_ids(ctx, loaf)?;
    render(ctx, loaf, "BREADCRUMB TRAIL", &ids);
    Ok(false)
}

fn undo_cmd(ctx: &mut Context, loaf: &mut Loaf, args: &str) -> Result<bool> {
    let target = ctx.buffers.last_added.filter(|id| loaf.get(*id).is_some()).or_else(|| loaf.crumbs.last().map(|c| c.id));
    let Some(id) = target else { bail!("nothing to undo") };
    loaf::archive(loaf.resolve_mut(&[id]), ctx.now());
    ctx.buffers.last_added = None;
    list_cmd(ctx, loaf, args)?;
    ctx.sink.info("Undo successful...");
    Ok(true)
}

fn substitute_cmd(ctx: &mut Context, loaf: &mut Loaf, args: &str) -> Result<bool> {
    let (before, after) = args.split_once('/').ok_or_else(|| anyhow!("usage: s <before_regex>/<after_regex>"))?;
    let re = Regex::new(before)?;
    let ids = ctx.selected();
    let mut t = Figure::table("Changes", ["Before", "After"]);
    for c in loaf.resolve_mut(&ids) {
        let old = std::mem::take(&mut c.description);
        c.description = re.replace_all(&old, after).into_owned();
        t.push_row([old, c.description.clone()]);
    }
    ctx.sink.clear();
    ctx.sink.title("SUBSTITUTE");
    ctx.sink.figure(&t);
    Ok(true)
}

fn count_table<'a>(ctx: &Context, title: &str, heading: &str, table: &str, items: impl Iterator<Item = &'a str>) {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for i in items { *counts.entry(i).or_default() += 1; }
    let mut rows: Vec<_> = counts.into_iter().collect();
    rows.sort_by_key(|(_, n)| *n);
    let mut t = Figure::table(table, [heading, "Count"]);
    for (k, n) in rows { t.push_row([k.to_string(), n.to_string()]); }
    ctx.sink.clear();
    ctx.sink.title(title);
    ctx.sink.figure(&t);
}

fn projects_info_cmd(ctx: &mut Context, loaf: &mut Loaf, _: &str) -> Result<bool> {
    count_table(ctx, "PROJECT INFO", "Project Name", "Known Projects.", loaf.crumbs.iter().flat_map(|c| c.projects()));
    Ok(false)
}

fn context_info_cmd(ctx: &mut Context, loaf: &mut Loaf, _: &str) -> Result<bool> {
    count_table(ctx, "CONTEXTS INFO", "Context Name", "Known Contexts.", loaf.crumbs.iter().flat_map(|c| c.contexts()));
    Ok(false)
}

fn tag_info_cmd(ctx: &mut Context, loaf: &mut Loaf, _: &str) -> Result<bool> {
    let keys = loaf.crumbs.iter().flat_map(|c| c.attributes().map(|(k, _)| k));
    count_table(ctx, "TAG INFO", "Tag Name", "Known Tags.", keys);
    Ok(false)
}

const SEARCH_JSON: &str = "A JSON object; every field is optional and unset fields are not applied. \
An object with no filters selects nothing.\n\
  regex          regex matched against the description\n\
  raw_text       true to match the regex against the whole line\n\
  archived       true or false\n\
  priority       a letter, or \"\" for crumbs without one\n\
  span           creation span, e.g. \"1d-~\"\n\
  archived_span  archive span, e.g. \"2w-1w\"\n\
Example: ?v! {\"regex\": \"rent\", \"archived\": false, \"span\": \"30d-~\"}";

const SPANS: &str = "<A>-<B>, where each side is ~ (open) or <number><unit> meaning that long ago. \
Units: m minutes, h hours, d days, w weeks, y years. 1d-~ is the last day; ~-~ is everything.";

impl Plugin for CorePlugin {
    fn name(&self) -> &str { "core" }

    fn describe(&self) -> Result<PluginDescriptor> {
        let info = PluginInfo::new("core", "Defines the core commands.", &[])
            .topic("search-json", SEARCH_JSON)
            .topic("spans", SPANS);
        // Longer triggers go first where one is a prefix of another.
        Ok(PluginDescriptor::new(info)
            .command("lv", "- No args.\n- Prints the selection buffer.\n- Never saves.", print_buffer_cmd)
            .command("e!", "- <crumb> -> The crumb to add.\n- Adds a crumb with no stamping.\n- Saves. Sets selection buffer.", raw_add_cmd)
            .command("ex", "- <editor_command> -> Optional; %P is the buffer file.\n- Edits the selection buffer in an external editor.\n- Saves. Sets selection buffer.", edit_external_cmd)
            .command("e", "- <crumb> -> The crumb to add.\n- Adds a crumb.\n- Saves. Sets selection buffer.", add_cmd)
            .command("b", "- <prefix>/<postfix>\n- Adds one crumb per line until END.\n- Saves. Sets selection buffer.", block_add_cmd)
            .command("nop", "- No args.\n- Nothing.\n- Never saves.", nop_cmd)
            .command("ic", "- No args.\n- Prints all registered commands.\n- Never saves.", command_info_cmd)
            .command("io", "- No args.\n- Prints all registered macros.\n- Never saves.", macro_info_cmd)
            .command("ih", "- No args.\n- Prints all registered hooks.\n- Never saves.", hooks_info_cmd)
            .command("ip", "- No args.\n- Prints all known projects.\n- Never saves.", projects_info_cmd)
            .command("ix", "- No args.\n- Prints all known contexts.\n- Never saves.", context_info_cmd)
            .command("it", "- No args.\n- Prints all known tags.\n- Never saves.", tag_info_cmd)
            .command("a", "- No args.\n- Archives every crumb in the selection buffer.\n- Always saves.", archive_cmd)
            .command("A", "- No args.\n- Unarchives every crumb in the selection buffer.\n- Always saves.", unarchive_cmd)
            .command("vv", "- No args.\n- Sub-selects crumbs in the selection buffer by ID.\n- Never saves. Sets selection buffer.", sub_select_cmd)
            .command("v!", "- <search_json> -> See ?h core/search-json.\n- Selects crumbs with a search json.\n- Saves. Sets selection buffer.", advanced_select_cmd)
            .command("v", "- <regex> -> Matched against descriptions.\n- Selects unarchived crumbs.\n- Saves. Sets selection buffer.", select_cmd)
            .command("V", "- <regex> -> Matched against descriptions.\n- Selects archived crumbs.\n- Saves. Sets selection buffer.", select_archive_cmd)
            .command("l", "- No args.\n- Prints the crumb trail for the default span.\n- Never saves.", list_cmd)
            .command("u", "- No args.\n- Archives the last added crumb.\n- Always saves.", undo_cmd)
            .command("s", "- <before_regex>/<after_regex>\n- Substitutes in descriptions of the selection buffer.\n- Always saves.", substitute_cmd)
            .default_command(nop_cmd)
            .null_command(add_cmd))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::NaiveDate;

    use super::*;
    use crate::clock::ManualClock;
    use crate::crumb::{ATIME, TIME};
    use crate::plugin::RuntimeConfig;
    use crate::plugins::{display::DisplayPlugin, root::RootPlugin};
    use crate::session::Session;
    use crate::sink::{MemorySink, SinkEvent};

    fn session(answers: &[&str]) -> (Session, Arc<MemorySink>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(NaiveDate::from_ymd_opt(2024, 3, 10).unwrap().and_hms_opt(12, 0, 0).unwrap()));
        let descs = vec![RootPlugin.describe().unwrap(), DisplayPlugin.describe().unwrap(), CorePlugin.describe().unwrap()];
        let config = RuntimeConfig::from_descriptors(descs).unwrap();
        let sink = Arc::new(MemorySink::with_answers(answers.iter().copied()));
        let s = Session::with_parts(config, sink.clone(), clock.clone(), Loaf::new("unused.loaf"));
        (s, sink, clock)
    }

    fn run(s: &mut Session, line: &str) -> Result<bool> {
        let config = Arc::clone(&s.ctx.config);
        let routed = config.commands.route(line)?.ok_or_else(|| anyhow!("blank"))?;
        routed.handler.run(&mut s.ctx, &mut s.loaf, &routed.args)
    }

    #[test]
    fn add_then_select_and_archive() {
        let (mut s, sink, _) = session(&[]);
        assert!(run(&mut s, "walk the dog").unwrap());
        assert!(run(&mut s, "?e water plants +garden").unwrap());
        assert_eq!(s.loaf.len(), 2);
        assert!(run(&mut s, "?v dog").unwrap());
        assert_eq!(s.ctx.selected().len(), 1);
        assert!(run(&mut s, "?a").unwrap());
        let dog = s.loaf.crumbs.iter().find(|c| c.text() == "walk the dog").unwrap();
        assert!(dog.completed);
        assert_eq!(dog.attribute(ATIME), Some("12-00"));
        assert_eq!(sink.infos().last().map(String::as_str), Some("Archived 1 crumbs."));
        assert!(run(&mut s, "?V dog").unwrap());
        assert!(run(&mut s, "?A").unwrap());
        assert!(!s.loaf.crumbs.iter().any(|c| c.completed));
    }

    #[test]
    fn empty_add_is_refused() {
        let (mut s, _, _) = session(&[]);
        assert!(!run(&mut s, "?e   ").unwrap());
        assert!(s.loaf.is_empty());
    }

    #[test]
    fn raw_add_skips_stamping() {
        let (mut s, _, _) = session(&[]);
        run(&mut s, "?e! plain").unwrap();
        assert!(s.loaf.crumbs[0].creation_date.is_none());
        assert!(s.loaf.crumbs[0].attributes().next().is_none());
    }

    #[test]
    fn block_mode_adds_until_end() {
        let (mut s, sink, _) = session(&["one", "two", "END"]);
        assert!(run(&mut s, "?b (B)/+chores").unwrap());
        let lines: Vec<String> = s.loaf.crumbs.iter().map(|c| c.text()).collect();
        assert_eq!(lines, vec!["one +chores", "two +chores"]);
        assert!(s.loaf.crumbs.iter().all(|c| c.priority == Some('B')));
        assert_eq!(s.ctx.selected().len(), 2);
        assert!(sink.infos().contains(&"Saving Block".to_string()));
    }

    #[test]
    fn sub_select_keeps_chosen_ids() {
        let (mut s, _, _) = session(&["1"]);
        for t in ["a1", "a2", "a3"] { run(&mut s, t).unwrap(); }
        run(&mut s, "?v a").unwrap();
        assert!(!run(&mut s, "?vv").unwrap());
        let sel = s.ctx.selected();
        assert_eq!(s.loaf.resolve(&sel)[0].text(), "a2");
        assert_eq!(sel.len(), 1);
    }

    #[test]
    fn selection_expires_between_commands() {
        let (mut s, sink, clock) = session(&[]);
        run(&mut s, "thing").unwrap();
        clock.advance(chrono::Duration::seconds(31));
        run(&mut s, "?a").unwrap();
        assert_eq!(sink.infos().last().map(String::as_str), Some("Archived 0 crumbs."));
    }

    #[test]
    fn substitute_rewrites_selection() {
        let (mut s, _, _) = session(&[]);
        run(&mut s, "buy milk").unwrap();
        run(&mut s, "?s milk/bread").unwrap();
        assert_eq!(s.loaf.crumbs[0].text(), "buy bread");
        run(&mut s, "?s TIME:12/TIME:13").unwrap();
        assert_eq!(s.loaf.crumbs[0].attribute(TIME), Some("13-00"));
        assert!(run(&mut s, "?s nothing-to-split").is_err());
    }

    #[test]
    fn undo_archives_last_added() {
        let (mut s, _, _) = session(&[]);
        run(&mut s, "first").unwrap();
        run(&mut s, "second").unwrap();
        run(&mut s, "?u").unwrap();
        let second = s.loaf.crumbs.iter().find(|c| c.text() == "second").unwrap();
        assert!(second.completed);
    }

    #[test]
    fn advanced_select_reads_json() {
        let (mut s, _, _) = session(&[]);
        run(&mut s, "(A) urgent").unwrap();
        run(&mut s, "later").unwrap();
        run(&mut s, r#"?v! {"priority": "A"}"#).unwrap();
        assert_eq!(s.ctx.selected().len(), 1);
        run(&mut s, "?v! {}").unwrap();
        assert!(s.ctx.selected().is_empty());
        assert!(run(&mut s, "?v! {not json").is_err());
    }

    #[test]
    fn info_tables_count() {
        let (mut s, sink, _) = session(&[]);
        run(&mut s, "a +home @desk k:1").unwrap();
        run(&mut s, "b +home").unwrap();
        sink.take();
        run(&mut s, "?ip").unwrap();
        let fig = sink.events().into_iter().find_map(|e| match e { SinkEvent::Figure(f) => Some(f), _ => None }).unwrap();
        assert!(fig.contains("home          2"));
        run(&mut s, "?it").unwrap();
        run(&mut s, "?ic").unwrap();
        run(&mut s, "?io").unwrap();
        run(&mut s, "?ih").unwrap();
    }

    #[test]
    fn external_editor_replaces_selection() {
        let dir = tempfile::tempdir().unwrap();
        let (mut s, _, _) = session(&[]);
        Arc::get_mut(&mut s.ctx.config).unwrap().settings.breadbox = dir.path().to_path_buf();
        run(&mut s, "buy milk").unwrap();
        assert!(run(&mut s, "?ex sed -i s/milk/bread/ %P").unwrap());
        assert_eq!(s.loaf.len(), 1);
        assert!(s.loaf.crumbs[0].description.starts_with("buy bread"));
        run(&mut s, "?v bread").unwrap();
        assert!(!run(&mut s, "?ex false").unwrap());
    }
}
