// breadcrumbs/src/sink.rs

//! The log-sink capability set every display profile implements.

use std::collections::VecDeque;

use parking_lot::Mutex;
use serde::Serialize;
use unicode_width::UnicodeWidthStr;

use crate::crumb::Crumb;
use crate::error::{CrumbError, Result};

/// Something more complicated than one line of text.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Figure {
    Text { text: String },
    Table {
        title: String,
        caption: Option<String>,
        headers: Vec<String>,
        rows: Vec<Vec<String>>,
    },
}

impl Figure {
    pub fn table<H: Into<String>>(title: impl Into<String>, headers: impl IntoIterator<Item = H>) -> Self {
        Figure::Table {
            title: title.into(),
            caption: None,
            headers: headers.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn with_caption(mut self, text: impl Into<String>) -> Self {
        if let Figure::Table { caption, .. } = &mut self { *caption = Some(text.into()); }
        self
    }

    pub fn row<C: Into<String>>(mut self, cells: impl IntoIterator<Item = C>) -> Self {
        self.push_row(cells);
        self
    }

    pub fn push_row<C: Into<String>>(&mut self, cells: impl IntoIterator<Item = C>) {
        if let Figure::Table { rows, .. } = self { rows.push(cells.into_iter().map(Into::into).collect()); }
    }

    pub fn rows(&self) -> &[Vec<String>] {
        match self {
            Figure::Table { rows, .. } => rows,
            Figure::Text { .. } => &[],
        }
    }

    /// Box-free column layout. Multi-line cells are split across lines.
    pub fn render_plain(&self) -> String {
        let (title, caption, headers, rows) = match self {
            Figure::Text { text } => return text.clone(),
            Figure::Table { title, caption, headers, rows } => (title, caption, headers, rows),
        };
        let cols = rows.iter().map(Vec::len).chain([headers.len()]).max().unwrap_or(0);
        let mut widths = vec![0usize; cols];
        for r in rows.iter().chain([headers]) {
            for (i, cell) in r.iter().enumerate() {
                for line in cell.lines() { widths[i] = widths[i].max(line.width()); }
            }
        }
        let mut out = String::new();
        if !title.is_empty() { out.push_str(title); out.push('\n'); }
        let emit = |r: &[String], out: &mut String| {
            let height = r.iter().map(|c| c.lines().count().max(1)).max().unwrap_or(1);
            for h in 0..height {
                let mut line = String::new();
                for (i, w) in widths.iter().enumerate() {
                    let cell = r.get(i).and_then(|c| c.lines().nth(h)).unwrap_or("");
                    line.push_str(cell);
                    if i + 1 < cols { line.push_str(&" ".repeat(w - cell.width() + 2)); }
                }
                out.push_str(line.trim_end());
                out.push('\n');
            }
        };
        if !headers.is_empty() {
            emit(headers, &mut out);
            let rule: usize = widths.iter().sum::<usize>() + 2 * cols.saturating_sub(1);
            out.push_str(&"-".repeat(rule));
            out.push('\n');
        }
        for r in rows { emit(r, &mut out); }
        if let Some(c) = caption { out.push_str(c); out.push('\n'); }
        out.trim_end().to_string()
    }
}

/// Rendering profile. All methods are infallible except `prompt`.
pub trait LogSink: Send + Sync {
    fn clear(&self);
    fn title(&self, text: &str);
    fn crumb(&self, crumb: &Crumb);
    fn figure(&self, figure: &Figure);
    fn info(&self, text: &str);
    fn debug(&self, _text: &str) {}
    fn warn(&self, text: &str);
    fn err(&self, text: &str, err: &anyhow::Error);
    fn fatal(&self, text: &str);
    /// Blocks for one line of user input.
    fn prompt(&self, text: &str) -> Result<String>;
    /// End of session; streaming profiles terminate their output here.
    fn close(&self) {}
}

/// One recorded call on a [`MemorySink`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SinkEvent {
    Clear,
    Title(String),
    Crumb(String),
    Figure(String),
    Info(String),
    Debug(String),
    Warn(String),
    Err(String, String),
    Fatal(String),
    Prompt(String),
    Close,
}

/// Records everything and answers prompts from a script; for tests and
/// embedding.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<SinkEvent>>,
    answers: Mutex<VecDeque<String>>,
}

impl MemorySink {
    pub fn new() -> Self { Self::default() }

    pub fn with_answers<S: Into<String>>(answers: impl IntoIterator<Item = S>) -> Self {
        let s = Self::new();
        s.answers.lock().extend(answers.into_iter().map(Into::into));
        s
    }

    pub fn events(&self) -> Vec<SinkEvent> { self.events.lock().clone() }
    pub fn take(&self) -> Vec<SinkEvent> { std::mem::take(&mut *self.events.lock()) }

    pub fn infos(&self) -> Vec<String> {
        self.events().into_iter().filter_map(|e| match e { SinkEvent::Info(t) => Some(t), _ => None }).collect()
    }

    pub fn errors(&self) -> Vec<String> {
        self.events().into_iter().filter_map(|e| match e { SinkEvent::Err(t, _) => Some(t), _ => None }).collect()
    }

    fn push(&self, e: SinkEvent) { self.events.lock().push(e); }
}

impl LogSink for MemorySink {
    fn clear(&self) { self.push(SinkEvent::Clear) }
    fn title(&self, text: &str) { self.push(SinkEvent::Title(text.into())) }
    fn crumb(&self, crumb: &Crumb) { self.push(SinkEvent::Crumb(crumb.to_string())) }
    fn figure(&self, figure: &Figure) { self.push(SinkEvent::Figure(figure.render_plain())) }
    fn info(&self, text: &str) { self.push(SinkEvent::Info(text.into())) }
    fn debug(&self, text: &str) { self.push(SinkEvent::Debug(text.into())) }
    fn warn(&self, text: &str) { self.push(SinkEvent::Warn(text.into())) }
    fn err(&self, text: &str, err: &anyhow::Error) { self.push(SinkEvent::Err(text.into(), format!("{err:#}"))) }
    fn fatal(&self, text: &str) { self.push(SinkEvent::Fatal(text.into())) }
    fn prompt(&self, text: &str) -> Result<String> {
        self.push(SinkEvent::Prompt(text.into()));
        self.answers.lock().pop_front().ok_or(CrumbError::Interrupted)
    }
    fn close(&self) { self.push(SinkEvent::Close) }
}
