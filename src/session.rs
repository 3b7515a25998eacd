// breadcrumbs/src/session.rs

//! One running session: the merged configuration, the loaf, and the input
//! pipeline PREMACRO → macros → PRECMD → dispatch.

use std::sync::Arc;

use crate::clock::Clock;
use crate::context::Context;
use crate::dispatch::{self, Outcome};
use crate::error::{CrumbError, Result};
use crate::hooks::{self, HookEvent};
use crate::loaf::{Loaf, SearchFilter, search};
use crate::plugin::RuntimeConfig;
use crate::sink::LogSink;

/// How the session ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExitKind {
    /// End of input, Ctrl-C or a finished one-shot command.
    Safe,
    /// The loop could not continue.
    Fatal,
}

pub struct Session {
    pub ctx: Context,
    pub loaf: Loaf,
}

impl Session {
    /// Load the configured loaf and pick the display profile (`profile`
    /// overrides the `profile` setting).
    pub fn open(config: RuntimeConfig, clock: Arc<dyn Clock>, profile: Option<&str>) -> Result<Self> {
        let name = profile.unwrap_or(config.settings.profile.as_str()).to_string();
        let sink = config.profile(&name).ok_or(CrumbError::Missing("display profile"))?;
        let loaf = Loaf::load(config.settings.loaf_path())?;
        tracing::debug!(profile = %name, loaf = %loaf.path().display(), "session opened");
        Ok(Self::with_parts(config, sink, clock, loaf))
    }

    pub fn with_parts(config: RuntimeConfig, sink: Arc<dyn LogSink>, clock: Arc<dyn Clock>, mut loaf: Loaf) -> Self {
        loaf.sort_key = config.settings.sort_key.clone();
        Self { ctx: Context::new(Arc::new(config), sink, clock), loaf }
    }

    pub fn init(&mut self) { hooks::fire(HookEvent::Init, &mut self.ctx, &mut self.loaf); }

    /// Fire INIT and show the recent trail.
    pub fn start(&mut self) {
        self.init();
        let span = self.ctx.settings().default_span.clone();
        let filter = SearchFilter::default().archived(false).span(span);
        match search(&self.loaf, &filter, self.ctx.now()) {
            Ok(ids) => {
                self.ctx.sink.clear();
                self.ctx.sink.title("24HR OF CRUMBS");
                self.ctx.show(&self.loaf, &ids);
            }
            Err(e) => self.ctx.sink.err("Could not list the trail", &e.into()),
        }
    }

    /// Run one input line through the whole pipeline.
    pub fn parse(&mut self, line: &str) -> Outcome {
        let (ctx, loaf) = (&mut self.ctx, &mut self.loaf);
        if line.trim().is_empty() { return Outcome::NotPersisted; }
        ctx.buffers.input_raw = line.to_string();
        ctx.buffers.input_post_macro.clear();
        ctx.buffers.cmd.clear();
        ctx.buffers.args.clear();
        tracing::debug!(input = %line, "input");

        hooks::fire(HookEvent::PreMacro, ctx, loaf);
        let raw = ctx.buffers.input_raw.clone();
        let config = Arc::clone(&ctx.config);
        match config.macros.expand(&raw) {
            Ok(text) => ctx.buffers.input_post_macro = text,
            Err(e) => return dispatch::settle(ctx, loaf, Err(e)),
        }
        tracing::debug!(expanded = %ctx.buffers.input_post_macro, "macros applied");

        hooks::fire(HookEvent::PreCmd, ctx, loaf);
        let input = ctx.buffers.input_post_macro.clone();
        dispatch::dispatch(ctx, loaf, &input)
    }

    /// True once a prompt was interrupted; the loop should stop.
    pub fn interrupted(&self) -> bool { self.ctx.buffers.interrupted }

    /// Prompt and parse until input ends or is interrupted.
    pub fn run(&mut self) -> ExitKind {
        loop {
            match self.ctx.sink.prompt("") {
                Ok(line) => {
                    self.parse(&line);
                    if self.interrupted() { return ExitKind::Safe; }
                }
                Err(CrumbError::Interrupted) => return ExitKind::Safe,
                Err(e) => {
                    tracing::error!(error = %e, "input failed");
                    self.ctx.sink.err("Could not read input", &e.into());
                    return ExitKind::Fatal;
                }
            }
        }
    }

    /// One line as a whole session: INIT, the line, then the exit hooks.
    /// An interrupted prompt still ends safely.
    pub fn run_once(&mut self, line: &str) -> ExitKind {
        self.init();
        self.parse(line);
        if self.interrupted() { tracing::debug!("one-shot command interrupted"); }
        self.shutdown(ExitKind::Safe);
        ExitKind::Safe
    }

    /// EXIT, then SAFEEXIT or FATALEXIT.
    pub fn shutdown(&mut self, kind: ExitKind) {
        hooks::fire(HookEvent::Exit, &mut self.ctx, &mut self.loaf);
        let event = match kind {
            ExitKind::Safe => HookEvent::SafeExit,
            ExitKind::Fatal => HookEvent::FatalExit,
        };
        hooks::fire(event, &mut self.ctx, &mut self.loaf);
        match kind {
            ExitKind::Safe => self.ctx.sink.info("Mañana"),
            ExitKind::Fatal => self.ctx.sink.fatal("Session ended on an unrecoverable error"),
        }
        self.ctx.sink.close();
        tracing::debug!(?kind, "session closed");
    }
}
