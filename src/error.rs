// breadcrumbs/src/error.rs

use std::io;

/// Errors produced by the breadcrumbs core.
///
/// Composition errors abort startup. Everything else is recovered at the
/// dispatch boundary and rendered through the active log sink.
#[derive(Debug, thiserror::Error)]
pub enum CrumbError {
    #[error("unknown plugin: {0}")]
    UnknownPlugin(String),

    #[error("plugin import cycle: {}", .0.join(" -> "))]
    ImportCycle(Vec<String>),

    #[error("plugin '{name}' failed to load: {source}")]
    PluginFailed {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("malformed command trigger '{trigger}': {source}")]
    BadTrigger {
        trigger: String,
        #[source]
        source: regex::Error,
    },

    #[error("malformed macro '{name}': {source}")]
    BadMacro {
        name: String,
        #[source]
        source: regex::Error,
    },

    #[error("settings error: {0}")]
    Settings(#[from] toml::de::Error),

    #[error("setting '{key}' is out of range: {value}")]
    SettingOutOfRange { key: &'static str, value: u64 },

    #[error("no {0} configured")]
    Missing(&'static str),

    #[error("invalid span '{0}': expected <A>-<B> where each side is ~ or <number><m,h,d,w,y>")]
    InvalidSpan(String),

    #[error("invalid date '{0}'")]
    InvalidDate(String),

    #[error("invalid regex: {0}")]
    Regex(#[from] regex::Error),

    #[error("invalid search json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("interrupted")]
    Interrupted,
}

impl CrumbError {
    /// Composition errors leave no valid configuration to run with.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::UnknownPlugin(_)
                | Self::ImportCycle(_)
                | Self::PluginFailed { .. }
                | Self::BadTrigger { .. }
                | Self::BadMacro { .. }
                | Self::Settings(_)
                | Self::SettingOutOfRange { .. }
                | Self::Missing(_)
        )
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, CrumbError>;
