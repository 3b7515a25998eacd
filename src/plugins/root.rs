// breadcrumbs/src/plugins/root.rs

use anyhow::{Result, bail};

use crate::config::Settings;
use crate::context::Context;
use crate::loaf::Loaf;
use crate::plugin::{Plugin, PluginDescriptor, PluginInfo};
use crate::sink::Figure;

/// Settings defaults, `ping`, `debug` and `h`. Imports `display` and `core`.
pub struct RootPlugin;

fn ping_cmd(ctx: &mut Context, _: &mut Loaf, _: &str) -> Result<bool> {
    ctx.sink.info("...pong");
    Ok(false)
}

fn debug_cmd(ctx: &mut Context, loaf: &mut Loaf, _: &str) -> Result<bool> {
    let selected = ctx.selected();
    let b = &ctx.buffers;
    let expires = b.selection.expires().map(|e| e.to_string()).unwrap_or_default();
    let selection: Vec<String> = loaf.resolve(&selected).iter().map(|c| c.to_string()).collect();
    let loaf_desc = format!("{} ({} crumbs)", loaf.path().display(), loaf.len());
    let t = Figure::table("Session Buffers", ["Buffer", "Value"])
        .row(["input_raw", b.input_raw.as_str()])
        .row(["input_post_macro", b.input_post_macro.as_str()])
        .row(["cmd", b.cmd.as_str()])
        .row(["args", b.args.as_str()])
        .row(["err", b.err.as_deref().unwrap_or("")])
        .row(["selection", selection.join("\n").as_str()])
        .row(["selection_expires", expires.as_str()])
        .row(["loaf", loaf_desc.as_str()]);
    let mut s = Figure::table("Merged Settings", ["Key", "Value"]);
    for (k, v) in &ctx.config.raw_settings { s.push_row([k.clone(), v.to_string()]); }
    ctx.sink.clear();
    ctx.sink.title("DEBUG");
    ctx.sink.figure(&t);
    ctx.sink.figure(&s);
    for w in &ctx.config.warnings { ctx.sink.warn(w); }
    Ok(false)
}

fn help_cmd(ctx: &mut Context, _: &mut Loaf, args: &str) -> Result<bool> {
    let args = args.trim();
    let (plugin, topic) = match args.split_once('/') {
        Some((p, t)) => (p.trim(), Some(t.trim())),
        None => (args, None),
    };
    ctx.sink.clear();
    if plugin.is_empty() {
        ctx.sink.title("HELP");
        let mut t = Figure::table("Loaded Plugins.", ["Plugin", "Version", "Description"])
            .with_caption("(?h <plugin> for commands and topics)");
        for p in &ctx.config.plugins { t.push_row([p.name.as_str(), p.version.as_str(), p.description.as_str()]); }
        ctx.sink.figure(&t);
        return Ok(false);
    }
    let Some(info) = ctx.config.plugin(plugin) else { bail!("no plugin named '{plugin}' is loaded") };
    match topic {
        Some(topic) => {
            let Some(text) = info.help.get(topic) else { bail!("plugin '{plugin}' has no help topic '{topic}'") };
            ctx.sink.title(&format!("HELP: {plugin}/{topic}"));
            ctx.sink.info(text);
        }
        None => {
            ctx.sink.title(&format!("HELP: {plugin}"));
            ctx.sink.info(&info.description);
            let esc = ctx.config.commands.escape();
            let mut c = Figure::table("Commands.", ["What You Type...", "What Happens..."]);
            for (trigger, help) in ctx.config.help_for(plugin) { c.push_row([format!("{esc}{trigger}"), help.to_string()]); }
            let mut t = Figure::table("Topics.", ["Topic"]);
            for name in info.help.keys() { t.push_row([format!("{plugin}/{name}")]); }
            ctx.sink.figure(&c);
            ctx.sink.figure(&t);
        }
    }
    Ok(false)
}

impl Plugin for RootPlugin {
    fn name(&self) -> &str { "root" }

    fn describe(&self) -> Result<PluginDescriptor> {
        let defaults = toml::Value::try_from(Settings::default())?;
        let settings = defaults.as_table().cloned().unwrap_or_default();
        let info = PluginInfo::new("root", "The root plugin; settings defaults.", &["display", "core"])
            .topic("usage", "Type a line to add a crumb. Lines starting with the escape character (default ?) are commands; ?ic lists them.");
        Ok(PluginDescriptor::new(info)
            .settings(settings)
            .command("ping", "- No args.\n- Replies with 'pong'. Used for debugging.\n- Never saves.", ping_cmd)
            .command("debug", "- No args.\n- Shows session buffers and merged settings.\n- Never saves.", debug_cmd)
            .command("h", "- <plugin>/<topic> -> Optional.\n- Shows plugins, their commands and help topics.\n- Never saves.", help_cmd))
    }
}
