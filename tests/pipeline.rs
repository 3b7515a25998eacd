// breadcrumbs/tests/pipeline.rs

use std::{
    fs,
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use anyhow::bail;
use breadcrumbs::{
    Clock, Context, HookEvent, Loaf, Macro, ManualClock, MemorySink, Plugin, PluginDescriptor, PluginInfo,
    PluginRegistry, RuntimeConfig, Session, compose,
    config::{overrides, read_user_table, user_plugin},
    dispatch::Outcome,
    plugins::builtin,
    sink::SinkEvent,
};
use chrono::NaiveDateTime;
use tempfile::TempDir;
use toml::Value;

fn noon() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(NaiveDateTime::parse_from_str("2024-03-10 12:00", "%Y-%m-%d %H:%M").unwrap()))
}

fn layers(breadbox: &Path) -> Vec<PluginDescriptor> {
    let cli = PluginDescriptor::new(PluginInfo { name: "cli".into(), ..PluginInfo::default() })
        .settings(overrides([("breadbox", Value::String(breadbox.display().to_string()))]));
    let mut out = vec![cli];
    if let Some(t) = read_user_table(breadbox).unwrap() {
        out.push(user_plugin(t).unwrap());
    }
    out
}

fn open(config: RuntimeConfig, clock: Arc<ManualClock>) -> (Session, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new());
    let loaf = Loaf::load(config.settings.loaf_path()).unwrap();
    (Session::with_parts(config, sink.clone(), clock, loaf), sink)
}

fn session(dir: &TempDir) -> (Session, Arc<MemorySink>) {
    let clock = noon();
    let config = compose(&builtin(clock.clone()), "root", layers(dir.path())).unwrap();
    open(config, clock)
}

fn loaf_lines(dir: &TempDir) -> Vec<String> {
    fs::read_to_string(dir.path().join("default.loaf")).unwrap_or_default().lines().map(str::to_string).collect()
}

#[test]
fn plain_line_is_stamped_and_persisted() {
    let dir = TempDir::new().unwrap();
    let (mut s, _) = session(&dir);
    assert_eq!(s.parse("buy milk +home"), Outcome::Persisted);
    assert_eq!(loaf_lines(&dir), vec!["2024-03-10 buy milk +home TIME:12-00"]);
}

#[test]
fn persisted_file_is_chronological() {
    let dir = TempDir::new().unwrap();
    let (mut s, _) = session(&dir);
    s.parse("second TIME:11-00");
    s.parse("first TIME:09-00");
    s.parse("third");
    let lines = loaf_lines(&dir);
    assert!(lines[0].contains("first"));
    assert!(lines[1].contains("second"));
    assert!(lines[2].contains("third"));
    assert!(Loaf::load(dir.path().join("default.loaf")).unwrap().out_of_order().is_empty());
}

#[test]
fn select_then_archive() {
    let dir = TempDir::new().unwrap();
    let (mut s, sink) = session(&dir);
    s.parse("buy milk");
    s.parse("milk the cow");
    s.parse("walk dog");
    s.parse("?v milk");
    assert_eq!(s.parse("?a"), Outcome::Persisted);
    assert_eq!(sink.infos().last().map(String::as_str), Some("Archived 2 crumbs."));
    let archived = loaf_lines(&dir).iter().filter(|l| l.starts_with("x ")).count();
    assert_eq!(archived, 2);
}

#[test]
fn blank_input_does_nothing() {
    let dir = TempDir::new().unwrap();
    let (mut s, sink) = session(&dir);
    assert_eq!(s.parse("   "), Outcome::NotPersisted);
    assert!(sink.events().is_empty());
    assert!(loaf_lines(&dir).is_empty());
}

#[test]
fn commands_do_not_persist_unless_asked() {
    let dir = TempDir::new().unwrap();
    let (mut s, sink) = session(&dir);
    assert_eq!(s.parse("?ping"), Outcome::NotPersisted);
    assert_eq!(sink.infos(), vec!["...pong"]);
    assert_eq!(s.parse("?nosuchcommand"), Outcome::NotPersisted);
    assert_eq!(sink.infos().last().map(String::as_str), Some("Use ?ic to list commands"));
}

#[test]
fn composition_is_deterministic() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("config.toml"), "imports = ['default_macros']\n").unwrap();
    let snapshot = || {
        let clock = noon();
        let cfg = compose(&builtin(clock), "root", layers(dir.path())).unwrap();
        let triggers: Vec<String> = cfg.commands.specs().map(|c| c.trigger.clone()).collect();
        let macros: Vec<String> = cfg.macros.iter().map(|m| m.name.clone()).collect();
        let hooks: Vec<String> =
            cfg.hooks.iter().flat_map(|(event, specs)| specs.iter().map(move |h| format!("{event}:{}", h.name))).collect();
        (triggers, macros, hooks)
    };
    let first = snapshot();
    assert_eq!(first, snapshot());
    assert!(first.0.iter().position(|t| t == "ping") < first.0.iter().position(|t| t == "lv"));
}

#[test]
fn user_config_adds_plugins_macros_and_settings() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("config.toml"),
        "imports = ['default_macros']\nescape = '!'\n[macros]\nhome = ['@h\\b', '@home']\n",
    )
    .unwrap();
    let (mut s, sink) = session(&dir);
    let names: Vec<&str> = s.ctx.config.plugins.iter().map(|p| p.name.as_str()).collect();
    assert!(names.contains(&"metrics"));
    assert!(names.contains(&"future"));
    assert_eq!(s.ctx.config.macros.iter().next().map(|m| m.name.as_str()), Some("home"));

    s.parse("!ping");
    assert_eq!(sink.infos(), vec!["...pong"]);
    s.parse("reading ..t novel @h");
    let lines = loaf_lines(&dir);
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("@home"));
    assert!(lines[0].contains("track:novel"));
}

#[test]
fn unknown_import_is_fatal() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("config.toml"), "imports = ['nope']\n").unwrap();
    let clock = noon();
    let err = compose(&builtin(clock), "root", layers(dir.path())).unwrap_err();
    assert!(err.to_string().contains("nope"));
}

/// Counts PRECMD and CMDERR, fails on PRECMD and rejects `explode` in macros.
struct Faulty {
    precmd: Arc<AtomicUsize>,
    cmderr: Arc<AtomicUsize>,
}

impl Plugin for Faulty {
    fn name(&self) -> &str { "faulty" }

    fn describe(&self) -> anyhow::Result<PluginDescriptor> {
        let (precmd, cmderr) = (self.precmd.clone(), self.cmderr.clone());
        Ok(PluginDescriptor::new(PluginInfo::new("faulty", "Misbehaves on purpose.", &[]))
            .macro_rule(
                "tripwire",
                Macro::transform("explode", "<error>", |t| if t.contains("explode") { bail!("tripwire hit") } else { Ok(t.to_string()) }),
            )
            .hook(HookEvent::PreCmd, "explode", |_: &mut Context, _: &mut Loaf| -> anyhow::Result<()> { bail!("boom") })
            .hook(HookEvent::PreCmd, "count", move |_: &mut Context, _: &mut Loaf| -> anyhow::Result<()> {
                precmd.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .hook(HookEvent::CmdErr, "count_err", move |_: &mut Context, _: &mut Loaf| -> anyhow::Result<()> {
                cmderr.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }))
    }
}

fn faulty_session(dir: &TempDir) -> (Session, Arc<MemorySink>, Arc<AtomicUsize>, Arc<AtomicUsize>) {
    let clock = noon();
    let precmd = Arc::new(AtomicUsize::new(0));
    let cmderr = Arc::new(AtomicUsize::new(0));
    let shared: Arc<dyn Clock> = clock.clone();
    let mut registry: PluginRegistry = builtin(shared);
    registry.register(Arc::new(Faulty { precmd: precmd.clone(), cmderr: cmderr.clone() }));
    let mut l = layers(dir.path());
    l.push(PluginDescriptor::new(PluginInfo { name: "test".into(), imports: vec!["faulty".into()], ..PluginInfo::default() }));
    let config = compose(&registry, "root", l).unwrap();
    let (s, sink) = open(config, clock);
    (s, sink, precmd, cmderr)
}

#[test]
fn failing_hook_does_not_stop_the_pipeline() {
    let dir = TempDir::new().unwrap();
    let (mut s, sink, precmd, _) = faulty_session(&dir);
    assert_eq!(s.parse("buy milk"), Outcome::Persisted);
    assert_eq!(precmd.load(Ordering::SeqCst), 1);
    assert_eq!(sink.errors(), vec!["Hook 'explode' failed on PRECMD"]);
    assert_eq!(loaf_lines(&dir).len(), 1);
}

#[test]
fn macro_failure_is_a_recovered_command_error() {
    let dir = TempDir::new().unwrap();
    let (mut s, sink, precmd, cmderr) = faulty_session(&dir);
    assert_eq!(s.parse("explode now"), Outcome::NotPersisted);
    assert_eq!(precmd.load(Ordering::SeqCst), 0);
    assert_eq!(cmderr.load(Ordering::SeqCst), 1);
    assert_eq!(sink.errors(), vec!["Could not run command"]);
    assert!(s.ctx.buffers.err.as_deref().is_some_and(|e| e.contains("tripwire hit")));
    assert!(loaf_lines(&dir).is_empty());

    assert_eq!(s.parse("fine again"), Outcome::Persisted);
}

/// Counts EXIT and SAFEEXIT.
struct Exits {
    exit: Arc<AtomicUsize>,
    safe: Arc<AtomicUsize>,
}

impl Plugin for Exits {
    fn name(&self) -> &str { "exits" }

    fn describe(&self) -> anyhow::Result<PluginDescriptor> {
        let (exit, safe) = (self.exit.clone(), self.safe.clone());
        Ok(PluginDescriptor::new(PluginInfo::new("exits", "Counts exit hooks.", &[]))
            .hook(HookEvent::Exit, "count_exit", move |_: &mut Context, _: &mut Loaf| -> anyhow::Result<()> {
                exit.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .hook(HookEvent::SafeExit, "count_safe", move |_: &mut Context, _: &mut Loaf| -> anyhow::Result<()> {
                safe.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }))
    }
}

#[test]
fn interrupted_one_shot_prompt_runs_the_exit_chain() {
    let dir = TempDir::new().unwrap();
    let clock = noon();
    let (exit, safe) = (Arc::new(AtomicUsize::new(0)), Arc::new(AtomicUsize::new(0)));
    let shared: Arc<dyn Clock> = clock.clone();
    let mut registry = builtin(shared);
    registry.register(Arc::new(Exits { exit: exit.clone(), safe: safe.clone() }));
    let mut l = layers(dir.path());
    l.push(PluginDescriptor::new(PluginInfo { name: "test".into(), imports: vec!["exits".into()], ..PluginInfo::default() }));
    let config = compose(&registry, "root", l).unwrap();
    // No scripted answers: the first prompt reports an interrupt.
    let (mut s, sink) = open(config, clock);

    assert_eq!(s.run_once("?b (A)/+later"), breadcrumbs::ExitKind::Safe);
    assert!(s.interrupted());
    assert_eq!(exit.load(Ordering::SeqCst), 1);
    assert_eq!(safe.load(Ordering::SeqCst), 1);
    let events = sink.events();
    assert!(events.contains(&SinkEvent::Info("Mañana".into())));
    assert_eq!(events.last(), Some(&SinkEvent::Close));
    assert!(loaf_lines(&dir).is_empty());
}
