// breadcrumbs/src/dispatch.rs

use std::{fmt, sync::Arc};

use anyhow::Result;
use regex::Regex;

use crate::context::Context;
use crate::error::CrumbError;
use crate::hooks::{self, HookEvent};
use crate::loaf::Loaf;

/// A command body. Returns whether the loaf should be saved.
pub trait Handler: Send + Sync {
    fn run(&self, ctx: &mut Context, loaf: &mut Loaf, args: &str) -> Result<bool>;
}

impl<F> Handler for F
where
    F: Fn(&mut Context, &mut Loaf, &str) -> Result<bool> + Send + Sync,
{
    fn run(&self, ctx: &mut Context, loaf: &mut Loaf, args: &str) -> Result<bool> { self(ctx, loaf, args) }
}

/// Wraps a plain function as a shareable handler.
pub fn handler<F>(f: F) -> Arc<dyn Handler>
where
    F: Fn(&mut Context, &mut Loaf, &str) -> Result<bool> + Send + Sync + 'static,
{
    Arc::new(f)
}

#[derive(Clone)]
pub struct CommandSpec {
    /// Regex fragment matched right after the escape character.
    pub trigger: String,
    pub help: String,
    pub plugin: String,
    pub handler: Arc<dyn Handler>,
}

impl fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CommandSpec({}::{})", self.plugin, self.trigger)
    }
}

#[derive(Clone, Debug)]
struct Compiled {
    spec: CommandSpec,
    pattern: Regex,
}

#[derive(Debug, PartialEq, Eq)]
pub enum MatchResult {
    Matched { trigger: String, args: String },
    Unmatched,
}

/// What an input line resolves to.
pub struct Routed {
    /// Trigger, or `default`/`null` for the fallbacks.
    pub cmd: String,
    pub args: String,
    pub handler: Arc<dyn Handler>,
}

/// Triggers compiled against the escape character, tried in insertion order.
#[derive(Clone, Default)]
pub struct CommandTable {
    escape: char,
    commands: Vec<Compiled>,
    default_command: Option<Arc<dyn Handler>>,
    null_command: Option<Arc<dyn Handler>>,
}

impl fmt::Debug for CommandTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandTable")
            .field("escape", &self.escape)
            .field("triggers", &self.commands.iter().map(|c| c.spec.trigger.as_str()).collect::<Vec<_>>())
            .finish()
    }
}

impl CommandTable {
    pub fn compile(
        escape: char,
        specs: impl IntoIterator<Item = CommandSpec>,
        default_command: Option<Arc<dyn Handler>>,
        null_command: Option<Arc<dyn Handler>>,
    ) -> crate::error::Result<Self> {
        let esc = regex::escape(&escape.to_string());
        let commands = specs
            .into_iter()
            .map(|spec| {
                let re = format!("^{esc}(?:{})(?P<rest>(?s:.*))$", spec.trigger);
                let pattern = Regex::new(&re)
                    .map_err(|source| CrumbError::BadTrigger { trigger: spec.trigger.clone(), source })?;
                Ok(Compiled { spec, pattern })
            })
            .collect::<crate::error::Result<Vec<_>>>()?;
        Ok(Self { escape, commands, default_command, null_command })
    }

    pub fn escape(&self) -> char { self.escape }
    pub fn specs(&self) -> impl Iterator<Item = &CommandSpec> { self.commands.iter().map(|c| &c.spec) }
    pub fn get(&self, trigger: &str) -> Option<&CommandSpec> { self.specs().find(|s| s.trigger == trigger) }

    /// First trigger that matches wins. At most one space between trigger
    /// and arguments is dropped.
    pub fn find(&self, input: &str) -> MatchResult {
        for c in &self.commands {
            if let Some(caps) = c.pattern.captures(input) {
                let rest = caps.name("rest").map_or("", |m| m.as_str());
                let args = rest.strip_prefix(' ').unwrap_or(rest);
                return MatchResult::Matched { trigger: c.spec.trigger.clone(), args: args.to_string() };
            }
        }
        MatchResult::Unmatched
    }

    /// `Ok(None)` for blank input. Unmatched input starting with the escape
    /// goes to the default command, anything else to the null command.
    pub fn route(&self, input: &str) -> crate::error::Result<Option<Routed>> {
        if input.trim().is_empty() { return Ok(None); }
        if let MatchResult::Matched { trigger, args } = self.find(input) {
            let handler = self.get(&trigger).map(|s| Arc::clone(&s.handler)).ok_or(CrumbError::Missing("command"))?;
            return Ok(Some(Routed { cmd: trigger, args, handler }));
        }
        let (cmd, fallback) = if input.starts_with(self.escape) {
            ("default", self.default_command.as_ref().ok_or(CrumbError::Missing("default command"))?)
        } else {
            ("null", self.null_command.as_ref().ok_or(CrumbError::Missing("null command"))?)
        };
        Ok(Some(Routed { cmd: cmd.into(), args: input.to_string(), handler: Arc::clone(fallback) }))
    }
}

/// Whether the loaf was written after a command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Persisted,
    NotPersisted,
}

impl Outcome {
    pub fn persisted(self) -> bool { self == Outcome::Persisted }
}

fn invoke(ctx: &mut Context, loaf: &mut Loaf, input: &str) -> Result<bool> {
    let config = Arc::clone(&ctx.config);
    let Some(routed) = config.commands.route(input)? else { return Ok(false) };
    tracing::debug!(cmd = %routed.cmd, args = %routed.args, "dispatching");
    ctx.buffers.cmd = routed.cmd;
    ctx.buffers.args = routed.args.clone();
    routed.handler.run(ctx, loaf, &routed.args)
}

/// Route an expanded line to its handler, run it, fire the outcome hooks
/// and save when the handler asked for it.
pub fn dispatch(ctx: &mut Context, loaf: &mut Loaf, input: &str) -> Outcome {
    let result = invoke(ctx, loaf, input);
    settle(ctx, loaf, result)
}

/// Shared tail of the pipeline: CMDOK or CMDERR, POSTCMD, then save.
pub fn settle(ctx: &mut Context, loaf: &mut Loaf, result: Result<bool>) -> Outcome {
    let persist = match result {
        Ok(p) => {
            ctx.buffers.err = None;
            hooks::fire(HookEvent::CmdOk, ctx, loaf);
            p
        }
        Err(e) => {
            if matches!(e.downcast_ref::<CrumbError>(), Some(CrumbError::Interrupted)) {
                ctx.buffers.interrupted = true;
            }
            tracing::warn!(cmd = %ctx.buffers.cmd, error = %format!("{e:#}"), "command failed");
            ctx.buffers.err = Some(format!("{e:#}"));
            hooks::fire(HookEvent::CmdErr, ctx, loaf);
            ctx.sink.err("Could not run command", &e);
            false
        }
    };
    hooks::fire(HookEvent::PostCmd, ctx, loaf);
    if !persist { return Outcome::NotPersisted; }
    match loaf.save() {
        Ok(()) => Outcome::Persisted,
        Err(e) => {
            let e = anyhow::Error::from(e).context(format!("save {}", loaf.path().display()));
            tracing::error!(error = %format!("{e:#}"), "loaf not saved");
            ctx.buffers.err = Some(format!("{e:#}"));
            ctx.sink.err("Could not save loaf", &e);
            Outcome::NotPersisted
        }
    }
}
