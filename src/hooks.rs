// breadcrumbs/src/hooks.rs

use std::{collections::BTreeMap, fmt, str::FromStr, sync::Arc};

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::context::Context;
use crate::loaf::Loaf;

/// Lifecycle points plugins can attach to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HookEvent {
    Init,
    PreMacro,
    PreCmd,
    CmdOk,
    CmdErr,
    PostCmd,
    Exit,
    SafeExit,
    FatalExit,
}

impl HookEvent {
    pub const ALL: [HookEvent; 9] = [
        Self::Init, Self::PreMacro, Self::PreCmd, Self::CmdOk, Self::CmdErr,
        Self::PostCmd, Self::Exit, Self::SafeExit, Self::FatalExit,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Init => "INIT",
            Self::PreMacro => "PREMACRO",
            Self::PreCmd => "PRECMD",
            Self::CmdOk => "CMDOK",
            Self::CmdErr => "CMDERR",
            Self::PostCmd => "POSTCMD",
            Self::Exit => "EXIT",
            Self::SafeExit => "SAFEEXIT",
            Self::FatalExit => "FATALEXIT",
        }
    }
}

impl fmt::Display for HookEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for HookEvent {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|e| e.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| anyhow::anyhow!("unknown hook event: {s}"))
    }
}

pub trait Hook: Send + Sync {
    fn call(&self, ctx: &mut Context, loaf: &mut Loaf) -> Result<()>;
}

impl<F> Hook for F
where
    F: Fn(&mut Context, &mut Loaf) -> Result<()> + Send + Sync,
{
    fn call(&self, ctx: &mut Context, loaf: &mut Loaf) -> Result<()> { self(ctx, loaf) }
}

#[derive(Clone)]
pub struct HookSpec {
    pub event: HookEvent,
    pub name: String,
    pub plugin: String,
    pub hook: Arc<dyn Hook>,
}

impl fmt::Debug for HookSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HookSpec({} {}::{})", self.event, self.plugin, self.name)
    }
}

/// Hooks grouped by event, in registration order.
#[derive(Clone, Debug, Default)]
pub struct HookRegistry {
    hooks: BTreeMap<HookEvent, Vec<HookSpec>>,
}

impl HookRegistry {
    pub fn new() -> Self { Self::default() }
    pub fn register(&mut self, spec: HookSpec) { self.hooks.entry(spec.event).or_default().push(spec); }
    pub fn for_event(&self, event: HookEvent) -> &[HookSpec] { self.hooks.get(&event).map_or(&[], Vec::as_slice) }
    pub fn iter(&self) -> impl Iterator<Item = (HookEvent, &[HookSpec])> { self.hooks.iter().map(|(e, v)| (*e, v.as_slice())) }
}

/// Run every hook for `event` in order. A failing hook is logged and
/// rendered; the rest still run. Returns the number that failed.
pub fn fire(event: HookEvent, ctx: &mut Context, loaf: &mut Loaf) -> usize {
    let hooks = ctx.config.hooks.for_event(event).to_vec();
    let mut failed = 0;
    for h in hooks {
        tracing::trace!(%event, hook = %h.name, "firing hook");
        if let Err(e) = h.hook.call(ctx, loaf) {
            failed += 1;
            tracing::error!(%event, hook = %h.name, plugin = %h.plugin, error = %format!("{e:#}"), "hook failed");
            ctx.sink.err(&format!("Hook '{}' failed on {event}", h.name), &e);
        }
    }
    failed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_names_round_trip() {
        for e in HookEvent::ALL {
            assert_eq!(e.as_str().parse::<HookEvent>().unwrap(), e);
        }
        assert_eq!("cmdok".parse::<HookEvent>().unwrap(), HookEvent::CmdOk);
        assert!("LATER".parse::<HookEvent>().is_err());
        assert_eq!(serde_json::to_string(&HookEvent::SafeExit).unwrap(), "\"SAFEEXIT\"");
    }

    #[test]
    fn registry_keeps_order_per_event() {
        let mut r = HookRegistry::new();
        for (i, ev) in [HookEvent::CmdOk, HookEvent::Init, HookEvent::CmdOk].into_iter().enumerate() {
            let hook: Arc<dyn Hook> = Arc::new(|_: &mut Context, _: &mut Loaf| -> Result<()> { Ok(()) });
            r.register(HookSpec { event: ev, name: format!("h{i}"), plugin: "p".into(), hook });
        }
        let names: Vec<_> = r.for_event(HookEvent::CmdOk).iter().map(|h| h.name.clone()).collect();
        assert_eq!(names, vec!["h0", "h2"]);
        assert!(r.for_event(HookEvent::Exit).is_empty());
    }
}
