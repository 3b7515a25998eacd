// breadcrumbs/src/display.rs

//! Terminal profiles: `normal` (colour), `simple` (plain), `debug`
//! (timestamped) and `json` (one streamed array).

use std::{
    io::{self, Write},
    sync::{Arc, LazyLock},
};

use chrono::Local;
use crossterm::{
    cursor::MoveTo,
    execute,
    style::{Color, Stylize},
    terminal::{self, Clear, ClearType},
};
use parking_lot::Mutex;
use regex::Regex;
use serde_json::json;

use crate::crumb::Crumb;
use crate::error::Result;
use crate::input;
use crate::sink::{Figure, LogSink};

type Out = Mutex<Box<dyn Write + Send>>;

fn stdout() -> Out { Mutex::new(Box::new(io::stdout())) }

fn emit(out: &Out, text: &str) {
    let mut w = out.lock();
    let _ = writeln!(w, "{text}");
    let _ = w.flush();
}

fn ask(out: &Out, text: &str) -> Result<String> {
    {
        let mut w = out.lock();
        let _ = write!(w, "{text}");
        let _ = w.flush();
    }
    input::read_line()
}

/// Writer that can be inspected after the sink is done with it.
#[derive(Clone, Default)]
pub struct SharedBuf(pub Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    pub fn contents(&self) -> String { String::from_utf8_lossy(&self.0.lock()).into_owned() }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> { self.0.lock().write(buf) }
    fn flush(&mut self) -> io::Result<()> { Ok(()) }
}

static TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:x|\([A-Z]\)|\d{4}-\d{2}-\d{2}|[+@]\S+|[^\s:]+:\S+)$").expect("token regex"));

fn paint(token: &str) -> String {
    if !TOKEN.is_match(token) { return token.to_string(); }
    let color = match token.chars().next() {
        Some('x') if token == "x" => Color::DarkGrey,
        Some('(') => Color::Yellow,
        Some('+') => Color::Red,
        Some('@') => Color::Green,
        Some(c) if c.is_ascii_digit() && !token.contains(':') => Color::Cyan,
        _ => Color::Magenta,
    };
    token.with(color).to_string()
}

/// Colourised todo.txt line.
pub fn highlight(c: &Crumb) -> String {
    let line = c.to_string();
    let painted: Vec<String> = line.split(' ').map(paint).collect();
    let painted = painted.join(" ");
    if c.completed { painted.dim().to_string() } else { painted }
}

fn rule(text: &str) -> String {
    let width = terminal::size().map(|(w, _)| w as usize).unwrap_or(80);
    let label = format!(" {text} ");
    let side = width.saturating_sub(label.chars().count()) / 2;
    format!("{}{}{}", "─".repeat(side), label, "─".repeat(side))
}

/// Default interactive profile.
pub struct NormalSink {
    out: Out,
    clear_screen: bool,
}

impl NormalSink {
    pub fn new() -> Self { Self { out: stdout(), clear_screen: true } }
    pub fn to_writer(w: impl Write + Send + 'static) -> Self { Self { out: Mutex::new(Box::new(w)), clear_screen: false } }
}

impl Default for NormalSink {
    fn default() -> Self { Self::new() }
}

impl LogSink for NormalSink {
    fn clear(&self) {
        if self.clear_screen {
            let _ = execute!(io::stdout(), Clear(ClearType::All), MoveTo(0, 0));
        }
    }
    fn title(&self, text: &str) { emit(&self.out, &rule(text).bold().to_string()) }
    fn crumb(&self, crumb: &Crumb) { emit(&self.out, &highlight(crumb)) }
    fn figure(&self, figure: &Figure) { emit(&self.out, &figure.render_plain().with(Color::Blue).to_string()) }
    fn info(&self, text: &str) { emit(&self.out, &format!("  🡢  {text}")) }
    fn warn(&self, text: &str) { emit(&self.out, &format!("  🡢  {text}").with(Color::Yellow).to_string()) }
    fn err(&self, text: &str, err: &anyhow::Error) {
        emit(&self.out, &format!("  🡢  {text} (ERROR)\n  🡢  {err:#}").with(Color::Red).to_string())
    }
    fn fatal(&self, text: &str) { emit(&self.out, &format!("  🡢  {text} (EXIT)").with(Color::Red).bold().to_string()) }
    fn prompt(&self, text: &str) -> Result<String> { ask(&self.out, &format!(" {text} 🡠  ")) }
}

/// Plain text, no colour or screen control.
pub struct SimpleSink {
    out: Out,
}

impl SimpleSink {
    pub fn new() -> Self { Self { out: stdout() } }
    pub fn to_writer(w: impl Write + Send + 'static) -> Self { Self { out: Mutex::new(Box::new(w)) } }
}

impl Default for SimpleSink {
    fn default() -> Self { Self::new() }
}

impl LogSink for SimpleSink {
    fn clear(&self) {}
    fn title(&self, text: &str) { emit(&self.out, &format!("== {text} ==")) }
    fn crumb(&self, crumb: &Crumb) { emit(&self.out, &crumb.to_string()) }
    fn figure(&self, figure: &Figure) { emit(&self.out, &figure.render_plain()) }
    fn info(&self, text: &str) { emit(&self.out, text) }
    fn warn(&self, text: &str) { emit(&self.out, &format!("warning: {text}")) }
    fn err(&self, text: &str, err: &anyhow::Error) { emit(&self.out, &format!("error: {text}: {err:#}")) }
    fn fatal(&self, text: &str) { emit(&self.out, &format!("fatal: {text}")) }
    fn prompt(&self, text: &str) -> Result<String> { ask(&self.out, &format!("{text}> ")) }
}

/// Every call tagged with a wall-clock time and level.
pub struct DebugSink {
    out: Out,
}

impl DebugSink {
    pub fn new() -> Self { Self { out: stdout() } }
    pub fn to_writer(w: impl Write + Send + 'static) -> Self { Self { out: Mutex::new(Box::new(w)) } }

    fn log(&self, level: &str, text: &str) {
        emit(&self.out, &format!("[{}] <{level}>\n{text}", Local::now().format("%H:%M:%S")))
    }
}

impl Default for DebugSink {
    fn default() -> Self { Self::new() }
}

impl LogSink for DebugSink {
    fn clear(&self) { self.log("CLEAR", "") }
    fn title(&self, text: &str) { self.log("TITLE", text) }
    fn crumb(&self, crumb: &Crumb) { self.log("CRUMB", &format!("{crumb}\n{crumb:?}")) }
    fn figure(&self, figure: &Figure) { self.log("FIGURE", &figure.render_plain()) }
    fn info(&self, text: &str) { self.log("INFO", text) }
    fn debug(&self, text: &str) { self.log("DEBUG", text) }
    fn warn(&self, text: &str) { self.log("WARN", text) }
    fn err(&self, text: &str, err: &anyhow::Error) { self.log("ERROR", &format!("{text}\n{err:?}")) }
    fn fatal(&self, text: &str) { self.log("FATAL", text) }
    fn prompt(&self, text: &str) -> Result<String> { ask(&self.out, &format!("[{}] <PROMPT> {text}\n", Local::now().format("%H:%M:%S"))) }
}

/// Streams one JSON array of event objects; closed by `fatal` or `close`.
pub struct JsonSink {
    out: Out,
    open: Mutex<bool>,
}

impl JsonSink {
    pub fn new() -> Self { Self { out: stdout(), open: Mutex::new(false) } }
    pub fn to_writer(w: impl Write + Send + 'static) -> Self { Self { out: Mutex::new(Box::new(w)), open: Mutex::new(false) } }

    fn event(&self, value: serde_json::Value) {
        let mut open = self.open.lock();
        let lead = if *open { "," } else { "[" };
        *open = true;
        emit(&self.out, &format!("{lead}{value}"));
    }

    fn finish(&self) {
        let mut open = self.open.lock();
        if *open { emit(&self.out, "]"); }
        *open = false;
    }
}

impl Default for JsonSink {
    fn default() -> Self { Self::new() }
}

impl LogSink for JsonSink {
    fn clear(&self) {}
    fn title(&self, text: &str) { self.event(json!({ "level": "title", "text": text })) }
    fn crumb(&self, c: &Crumb) {
        let attributes: Vec<_> = c.attributes().map(|(k, v)| json!([k, v])).collect();
        self.event(json!({
            "level": "crumb",
            "line": c.to_string(),
            "completed": c.completed,
            "priority": c.priority.map(String::from),
            "creation_date": c.creation_date.map(|d| d.to_string()),
            "completion_date": c.completion_date.map(|d| d.to_string()),
            "description": c.description,
            "text": c.text(),
            "attributes": attributes,
        }))
    }
    fn figure(&self, figure: &Figure) { self.event(json!({ "level": "figure", "figure": figure })) }
    fn info(&self, text: &str) { self.event(json!({ "level": "info", "text": text })) }
    fn warn(&self, text: &str) { self.event(json!({ "level": "warn", "text": text })) }
    fn err(&self, text: &str, err: &anyhow::Error) {
        self.event(json!({ "level": "error", "text": text, "error": format!("{err:#}") }))
    }
    fn fatal(&self, text: &str) {
        self.event(json!({ "level": "fatal", "text": text }));
        self.finish();
    }
    fn prompt(&self, text: &str) -> Result<String> {
        eprint!("{text} ");
        input::read_line()
    }
    fn close(&self) { self.finish() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_profile_streams_one_array() {
        let buf = SharedBuf::default();
        let s = JsonSink::to_writer(buf.clone());
        s.info("Added crumb.");
        s.crumb(&Crumb::parse("(A) 2024-03-10 pay rent TIME:09-00"));
        s.figure(&Figure::table("Totals", ["Tag", "Total"]).row(["food", "12"]));
        s.close();
        let v: serde_json::Value = serde_json::from_str(&buf.contents()).unwrap();
        let events = v.as_array().unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0]["text"], "Added crumb.");
        assert_eq!(events[1]["priority"], "A");
        assert_eq!(events[1]["attributes"][0][1], "09-00");
        assert_eq!(events[2]["figure"]["kind"], "table");
    }

    #[test]
    fn json_close_without_events_writes_nothing() {
        let buf = SharedBuf::default();
        JsonSink::to_writer(buf.clone()).close();
        assert!(buf.contents().is_empty());
    }

    #[test]
    fn simple_profile_is_plain() {
        let buf = SharedBuf::default();
        let s = SimpleSink::to_writer(buf.clone());
        s.title("24HR OF CRUMBS");
        s.crumb(&Crumb::parse("2024-03-10 walk +dog"));
        s.err("Could not run command", &anyhow::anyhow!("boom"));
        assert_eq!(buf.contents(), "== 24HR OF CRUMBS ==\n2024-03-10 walk +dog\nerror: Could not run command: boom\n");
    }

    #[test]
    fn highlight_keeps_text() {
        let c = Crumb::parse("(B) 2024-03-10 call +mom @phone due:2024-03-11");
        let plain = highlight(&c);
        for part in ["call", "+mom", "@phone", "due:2024-03-11"] {
            assert!(plain.contains(part));
        }
    }
}
