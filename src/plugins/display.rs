// breadcrumbs/src/plugins/display.rs

use anyhow::Result;

use crate::context::Context;
use crate::crumb::Crumb;
use crate::display::{DebugSink, JsonSink, NormalSink, SimpleSink};
use crate::loaf::Loaf;
use crate::plugin::{Plugin, PluginDescriptor, PluginInfo};
use crate::sink::Figure;

/// The `debug`, `normal`, `json` and `simple` profiles.
pub struct DisplayPlugin;

fn display_test_cmd(ctx: &mut Context, _: &mut Loaf, _: &str) -> Result<bool> {
    let sample = Crumb::parse("(A) 2024-01-01 test crumb +project @context key:value TIME:12-00");
    let figure = Figure::table("Test Figure", ["Column A", "Column B"]).row(["1", "2"]).with_caption("caption");
    let profiles = ctx.config.profiles.clone();
    for (name, sink) in profiles {
        sink.title(&format!("PROFILE {name}"));
        sink.info("info text");
        sink.warn("warn text");
        sink.debug("debug text");
        sink.crumb(&sample);
        sink.figure(&figure);
        sink.err("err text", &anyhow::anyhow!("sample error"));
        sink.close();
    }
    Ok(false)
}

impl Plugin for DisplayPlugin {
    fn name(&self) -> &str { "display" }

    fn describe(&self) -> Result<PluginDescriptor> {
        let info = PluginInfo::new("display", "Terminal, plain and JSON display profiles.", &[])
            .topic("profiles", "normal (default), simple (-s), debug (-d), json (-j). Set `profile` in config.toml to change the default.");
        Ok(PluginDescriptor::new(info)
            .profile("debug", DebugSink::new())
            .profile("normal", NormalSink::new())
            .profile("json", JsonSink::new())
            .profile("simple", SimpleSink::new())
            .command("display-test", "- No args.\n- Renders every capability on every profile.\n- Never saves.", display_test_cmd))
    }
}
