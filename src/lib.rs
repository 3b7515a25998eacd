// breadcrumbs/src/lib.rs

pub mod buffer;
pub mod clock;
pub mod config;
pub mod context;
pub mod crumb;
pub mod dispatch;
pub mod display;
pub mod error;
pub mod hooks;
pub mod input;
pub mod loaf;
pub mod macros;
pub mod metrics;
pub mod plugin;
pub mod plugins;
pub mod session;
pub mod sink;
pub mod span;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Settings;
pub use context::{Buffers, Context};
pub use crumb::{Crumb, CrumbId};
pub use dispatch::{CommandSpec, CommandTable, Handler, MatchResult, Outcome, dispatch};
pub use error::{CrumbError, Result};
pub use hooks::{Hook, HookEvent, HookRegistry, HookSpec};
pub use loaf::Loaf;
pub use macros::{Macro, MacroSpec, MacroTable};
pub use metrics::{Metric, MetricSpec};
pub use plugin::{Plugin, PluginDescriptor, PluginInfo, PluginRegistry, RuntimeConfig, compose};
pub use session::{ExitKind, Session};
pub use sink::{Figure, LogSink, MemorySink};
