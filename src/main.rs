// breadcrumbs/src/main.rs

use std::{path::PathBuf, process::ExitCode, sync::Arc};

use clap::Parser;
use toml::Value;
use tracing_subscriber::EnvFilter;

use breadcrumbs::{
    Clock, ExitKind, LogSink, PluginDescriptor, PluginInfo, Session, SystemClock, compose,
    config::{ensure_breadbox, overrides, read_user_table, user_plugin},
    display::SimpleSink,
    input,
    plugins::builtin,
};

#[derive(Parser)]
#[command(name = "bc", version, about = "A stream based todo list for confused people.")]
struct Args {
    /// Debug profile and debug logging on stderr
    #[arg(short, long, conflicts_with_all = ["simple", "json"])]
    debug: bool,
    /// Plain text profile
    #[arg(short, long, conflicts_with = "json")]
    simple: bool,
    /// JSON profile
    #[arg(short, long)]
    json: bool,
    /// Breadbox directory (default: ./.breadbox if present, else ~/.breadbox)
    #[arg(long)]
    breadbox: Option<PathBuf>,
    /// Run one line, then exit
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

impl Args {
    fn profile(&self) -> Option<&'static str> {
        match (self.debug, self.simple, self.json) {
            (true, _, _) => Some("debug"),
            (_, true, _) => Some("simple"),
            (_, _, true) => Some("json"),
            _ => None,
        }
    }
}

fn run(args: Args) -> anyhow::Result<ExitKind> {
    let breadbox = ensure_breadbox(args.breadbox.as_deref())?;
    let mut cli = vec![("breadbox", Value::String(breadbox.display().to_string()))];
    if let Some(p) = args.profile() { cli.push(("profile", Value::String(p.into()))); }
    let cli = PluginDescriptor::new(PluginInfo {
        name: "cli".into(),
        description: "Command line overrides.".into(),
        ..PluginInfo::default()
    })
    .settings(overrides(cli));
    let mut layers = vec![cli];
    if let Some(t) = read_user_table(&breadbox)? { layers.push(user_plugin(t)?); }

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let config = compose(&builtin(clock.clone()), "root", layers)?;
    for w in &config.warnings { tracing::warn!("{w}"); }
    let mut session = Session::open(config, clock, None)?;

    // Prompting commands block in one-shot mode too.
    if let Err(e) = input::watch_interrupts() {
        tracing::warn!(error = %e, "Ctrl-C will end the process without exit hooks");
    }
    if !args.command.is_empty() { return Ok(session.run_once(&args.command.join(" "))); }
    session.start();
    let kind = session.run();
    session.shutdown(kind);
    Ok(kind)
}

fn main() -> ExitCode {
    let args = Args::parse();
    let level = if args.debug { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .init();

    match run(args) {
        Ok(ExitKind::Safe) => ExitCode::SUCCESS,
        Ok(ExitKind::Fatal) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "startup failed");
            SimpleSink::new().fatal(&format!("{e:#}"));
            ExitCode::FAILURE
        }
    }
}
