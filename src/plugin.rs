// breadcrumbs/src/plugin.rs

//! Plugin descriptors, the built-in registry and import composition.

use std::{collections::{BTreeMap, HashMap}, fmt, sync::Arc};

use serde::Serialize;
use toml::Table;

use crate::config::{Settings, merge_tables};
use crate::dispatch::{CommandSpec, CommandTable, Handler};
use crate::error::{CrumbError, Result};
use crate::hooks::{Hook, HookEvent, HookRegistry, HookSpec};
use crate::macros::{Macro, MacroSpec, MacroTable};
use crate::metrics::{Metric, MetricSpec, Options};
use crate::sink::LogSink;

#[derive(Clone, Debug, Default, Serialize, PartialEq)]
pub struct PluginInfo {
    pub name: String,
    pub author: String,
    pub website: String,
    pub version: String,
    pub description: String,
    /// Plugins merged after this one, in order.
    pub imports: Vec<String>,
    /// Help topics shown by `?h <plugin>/<topic>`.
    pub help: BTreeMap<String, String>,
}

impl PluginInfo {
    pub fn new(name: &str, description: &str, imports: &[&str]) -> Self {
        Self {
            name: name.into(),
            author: "breadcrumbs developers".into(),
            version: env!("CARGO_PKG_VERSION").into(),
            description: description.into(),
            imports: imports.iter().map(|s| s.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn topic(mut self, name: &str, text: &str) -> Self {
        self.help.insert(name.into(), text.into());
        self
    }
}

/// Everything a plugin contributes. Merged left-biased into a
/// [`RuntimeConfig`].
#[derive(Clone, Default)]
pub struct PluginDescriptor {
    pub info: PluginInfo,
    pub settings: Table,
    pub commands: Vec<CommandSpec>,
    pub macros: Vec<MacroSpec>,
    pub hooks: Vec<HookSpec>,
    pub metrics: Vec<MetricSpec>,
    pub profiles: Vec<(String, Arc<dyn LogSink>)>,
    pub default_command: Option<Arc<dyn Handler>>,
    pub null_command: Option<Arc<dyn Handler>>,
}

impl fmt::Debug for PluginDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginDescriptor")
            .field("info", &self.info)
            .field("commands", &self.commands.len())
            .field("macros", &self.macros.len())
            .field("hooks", &self.hooks.len())
            .field("metrics", &self.metrics.len())
            .finish()
    }
}

impl PluginDescriptor {
    pub fn new(info: PluginInfo) -> Self { Self { info, ..Self::default() } }

    pub fn command<H: Handler + 'static>(mut self, trigger: &str, help: &str, h: H) -> Self {
        self.commands.push(CommandSpec {
            trigger: trigger.into(),
            help: help.into(),
            plugin: self.info.name.clone(),
            handler: Arc::new(h),
        });
        self
    }

    pub fn macro_rule(mut self, name: impl Into<String>, rule: Macro) -> Self {
        self.macros.push(MacroSpec { name: name.into(), rule, plugin: self.info.name.clone() });
        self
    }

    pub fn hook<H: Hook + 'static>(mut self, event: HookEvent, name: &str, h: H) -> Self {
        self.hooks.push(HookSpec { event, name: name.into(), plugin: self.info.name.clone(), hook: Arc::new(h) });
        self
    }

    pub fn metric<M: Metric + 'static>(mut self, tag: &str, m: M, options: Options, eager: bool) -> Self {
        self.metrics.push(MetricSpec { tag: tag.into(), metric: Arc::new(m), options, eager, plugin: self.info.name.clone() });
        self
    }

    pub fn profile<S: LogSink + 'static>(mut self, name: &str, sink: S) -> Self {
        self.profiles.push((name.into(), Arc::new(sink)));
        self
    }

    pub fn default_command<H: Handler + 'static>(mut self, h: H) -> Self { self.default_command = Some(Arc::new(h)); self }
    pub fn null_command<H: Handler + 'static>(mut self, h: H) -> Self { self.null_command = Some(Arc::new(h)); self }
    pub fn settings(mut self, t: Table) -> Self { self.settings = t; self }

    /// `self` wins every conflict. Keyed contributions (commands, macros,
    /// profiles) keep the first entry; hooks and metrics concatenate.
    pub fn merge(&mut self, other: PluginDescriptor, warnings: &mut Vec<String>) {
        for c in other.commands {
            match self.commands.iter().find(|s| s.trigger == c.trigger) {
                Some(kept) if kept.plugin != c.plugin => {
                    warnings.push(format!("command '{}' from {} shadowed by {}", c.trigger, c.plugin, kept.plugin));
                }
                Some(_) => {}
                None => self.commands.push(c),
            }
        }
        for m in other.macros {
            if !self.macros.iter().any(|s| s.name == m.name) { self.macros.push(m); }
        }
        for (name, sink) in other.profiles {
            if !self.profiles.iter().any(|(n, _)| *n == name) { self.profiles.push((name, sink)); }
        }
        self.hooks.extend(other.hooks);
        self.metrics.extend(other.metrics);
        self.default_command = self.default_command.take().or(other.default_command);
        self.null_command = self.null_command.take().or(other.null_command);
        merge_tables(&mut self.settings, other.settings);
    }
}

pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;
    fn describe(&self) -> anyhow::Result<PluginDescriptor>;
}

/// Plugins addressable by name from `imports`.
#[derive(Clone, Default)]
pub struct PluginRegistry {
    plugins: Vec<Arc<dyn Plugin>>,
}

impl PluginRegistry {
    pub fn new() -> Self { Self::default() }
    pub fn register(&mut self, p: Arc<dyn Plugin>) { self.plugins.push(p); }
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Plugin>> { self.plugins.iter().find(|p| p.name() == name) }
    pub fn names(&self) -> impl Iterator<Item = &str> { self.plugins.iter().map(|p| p.name()) }
}

/// The merged, immutable configuration a session runs with.
pub struct RuntimeConfig {
    /// Every visited plugin, first visit order, deduplicated by name.
    pub plugins: Vec<PluginInfo>,
    pub settings: Settings,
    pub raw_settings: Table,
    pub commands: CommandTable,
    pub macros: MacroTable,
    pub hooks: HookRegistry,
    pub metrics: Vec<MetricSpec>,
    pub profiles: Vec<(String, Arc<dyn LogSink>)>,
    pub warnings: Vec<String>,
}

impl fmt::Debug for RuntimeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeConfig")
            .field("plugins", &self.plugins.iter().map(|p| p.name.as_str()).collect::<Vec<_>>())
            .field("settings", &self.settings)
            .field("commands", &self.commands)
            .field("warnings", &self.warnings)
            .finish()
    }
}

impl RuntimeConfig {
    pub fn profile(&self, name: &str) -> Option<Arc<dyn LogSink>> {
        self.profiles.iter().find(|(n, _)| n == name).map(|(_, s)| Arc::clone(s))
    }

    pub fn plugin(&self, name: &str) -> Option<&PluginInfo> { self.plugins.iter().find(|p| p.name == name) }

    /// Help blocks of a plugin's commands, by trigger.
    pub fn help_for(&self, plugin: &str) -> Vec<(&str, &str)> {
        self.commands.specs().filter(|s| s.plugin == plugin).map(|s| (s.trigger.as_str(), s.help.as_str())).collect()
    }

    /// Merge an already ordered list of descriptors.
    pub fn from_descriptors(descs: Vec<PluginDescriptor>) -> Result<Self> {
        let mut warnings = Vec::new();
        let mut plugins: Vec<PluginInfo> = Vec::new();
        let mut acc = PluginDescriptor::default();
        for d in descs {
            if !plugins.iter().any(|p| p.name == d.info.name) { plugins.push(d.info.clone()); }
            acc.merge(d, &mut warnings);
        }
        for w in &warnings { tracing::warn!("{w}"); }
        let settings = Settings::from_table(&acc.settings)?;
        let commands = CommandTable::compile(settings.escape, acc.commands, acc.default_command, acc.null_command)?;
        let mut hooks = HookRegistry::new();
        for h in acc.hooks { hooks.register(h); }
        Ok(Self {
            plugins,
            settings,
            raw_settings: acc.settings,
            commands,
            macros: acc.macros.into_iter().collect(),
            hooks,
            metrics: acc.metrics,
            profiles: acc.profiles,
            warnings,
        })
    }
}

struct Walk<'a> {
    registry: &'a PluginRegistry,
    path: Vec<String>,
    visits: HashMap<String, usize>,
    out: Vec<PluginDescriptor>,
}

impl Walk<'_> {
    fn visit(&mut self, name: &str) -> Result<()> {
        if self.path.iter().any(|p| p == name) {
            let mut cycle = self.path.clone();
            cycle.push(name.to_string());
            return Err(CrumbError::ImportCycle(cycle));
        }
        let plugin = self.registry.get(name).ok_or_else(|| CrumbError::UnknownPlugin(name.to_string()))?;
        let desc = plugin.describe().map_err(|source| CrumbError::PluginFailed { name: name.to_string(), source })?;
        *self.visits.entry(name.to_string()).or_default() += 1;
        let imports = desc.info.imports.clone();
        self.out.push(desc);
        self.imports(name, &imports)
    }

    fn imports(&mut self, name: &str, imports: &[String]) -> Result<()> {
        self.path.push(name.to_string());
        for i in imports { self.visit(i)?; }
        self.path.pop();
        Ok(())
    }
}

/// Resolve `root` depth-first through `imports` and merge the result.
///
/// `layers` (command line, user config) come first and therefore win; their
/// own imports are resolved after the root tree. A plugin reached twice
/// through different branches is merged twice and reported in `warnings`.
pub fn compose(registry: &PluginRegistry, root: &str, layers: Vec<PluginDescriptor>) -> Result<RuntimeConfig> {
    let mut walk = Walk { registry, path: Vec::new(), visits: HashMap::new(), out: Vec::new() };
    let extra: Vec<(String, Vec<String>)> = layers.iter().map(|l| (l.info.name.clone(), l.info.imports.clone())).collect();
    walk.out.extend(layers);
    walk.visit(root)?;
    for (name, imports) in &extra { walk.imports(name, imports)?; }

    let mut dups: Vec<_> = walk.visits.iter().filter(|(_, n)| **n > 1).map(|(k, n)| (k.clone(), *n)).collect();
    dups.sort();
    let mut config = RuntimeConfig::from_descriptors(walk.out)?;
    for (name, n) in dups {
        tracing::warn!(plugin = %name, times = n, "plugin imported more than once");
        config.warnings.push(format!("plugin '{name}' imported {n} times"));
    }
    tracing::debug!(plugins = config.plugins.len(), commands = config.commands.specs().count(), "composed plugins");
    Ok(config)
}
