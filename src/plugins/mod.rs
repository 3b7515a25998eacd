// breadcrumbs/src/plugins/mod.rs

//! Built-in plugins, addressable by name from `imports`.

pub mod commands;
pub mod default_macros;
pub mod display;
pub mod future;
pub mod metrics;
pub mod root;

use std::sync::Arc;

use crate::clock::Clock;
use crate::context::Context;
use crate::crumb::CrumbId;
use crate::loaf::{Loaf, SearchFilter, search};
use crate::plugin::PluginRegistry;

/// Every built-in plugin. Date and time macros read `clock`.
pub fn builtin(clock: Arc<dyn Clock>) -> PluginRegistry {
    let mut r = PluginRegistry::new();
    r.register(Arc::new(root::RootPlugin));
    r.register(Arc::new(display::DisplayPlugin));
    r.register(Arc::new(commands::CorePlugin));
    r.register(Arc::new(future::FuturePlugin));
    r.register(Arc::new(metrics::MetricsPlugin));
    r.register(Arc::new(default_macros::DefaultMacrosPlugin::new(clock)));
    r
}

/// Unarchived crumbs made within the default span.
pub(crate) fn trail_ids(ctx: &Context, loaf: &Loaf) -> anyhow::Result<Vec<CrumbId>> {
    let filter = SearchFilter::default().archived(false).span(ctx.settings().default_span.clone());
    Ok(search(loaf, &filter, ctx.now())?)
}

/// Clear, title, then every crumb.
pub(crate) fn render(ctx: &Context, loaf: &Loaf, title: &str, ids: &[CrumbId]) {
    ctx.sink.clear();
    ctx.sink.title(title);
    ctx.show(loaf, ids);
}
