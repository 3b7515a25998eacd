// breadcrumbs/src/context.rs

//! Session-scoped state handed to every handler, hook and metric.

use std::{any::{Any, TypeId}, collections::HashMap, sync::Arc};

use chrono::NaiveDateTime;

use crate::buffer::SelectionBuffer;
use crate::clock::Clock;
use crate::config::Settings;
use crate::crumb::CrumbId;
use crate::loaf::Loaf;
use crate::plugin::RuntimeConfig;
use crate::sink::LogSink;

/// What the last command did, for hooks and the debug command.
#[derive(Debug, Default)]
pub struct Buffers {
    pub input_raw: String,
    pub input_post_macro: String,
    pub cmd: String,
    pub args: String,
    pub err: Option<String>,
    pub selection: SelectionBuffer<CrumbId>,
    pub last_added: Option<CrumbId>,
    /// Set when a prompt was cut short by Ctrl-C or end of input.
    pub interrupted: bool,
}

/// Per-plugin state keyed by type.
#[derive(Default)]
pub struct Extensions {
    map: HashMap<TypeId, Box<dyn Any + Send>>,
}

impl Extensions {
    pub fn get<T: Any + Send>(&self) -> Option<&T> { self.map.get(&TypeId::of::<T>()).and_then(|b| b.downcast_ref()) }

    pub fn get_or_default<T: Any + Send + Default>(&mut self) -> &mut T {
        self.map
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(T::default()))
            .downcast_mut()
            .expect("extension stored under its own TypeId")
    }

    pub fn insert<T: Any + Send>(&mut self, v: T) { self.map.insert(TypeId::of::<T>(), Box::new(v)); }
}

pub struct Context {
    pub config: Arc<RuntimeConfig>,
    pub sink: Arc<dyn LogSink>,
    pub clock: Arc<dyn Clock>,
    pub buffers: Buffers,
    pub ext: Extensions,
}

impl Context {
    pub fn new(config: Arc<RuntimeConfig>, sink: Arc<dyn LogSink>, clock: Arc<dyn Clock>) -> Self {
        let buffers = Buffers { selection: SelectionBuffer::new(config.settings.selection_ttl()), ..Buffers::default() };
        Self { config, sink, clock, buffers, ext: Extensions::default() }
    }

    pub fn settings(&self) -> &Settings { &self.config.settings }
    pub fn now(&self) -> NaiveDateTime { self.clock.now() }

    /// Current selection; empty once it has expired.
    pub fn selected(&mut self) -> Vec<CrumbId> {
        let now = self.now();
        self.buffers.selection.get(now)
    }

    pub fn select(&mut self, ids: Vec<CrumbId>) {
        let now = self.now();
        self.buffers.selection.set(ids, now);
    }

    /// Render crumbs by id in the given order.
    pub fn show(&self, loaf: &Loaf, ids: &[CrumbId]) {
        for c in loaf.resolve(ids) { self.sink.crumb(c); }
    }
}
