//! Logging setup.
//!
//! Every component logs through `tracing` under its module target
//! (`intura_ai::fetch`, `intura_ai::experiment`, ...). Levels are plain
//! configuration rendered into an [`EnvFilter`]; nothing mutates a global
//! level at runtime.

use std::collections::BTreeMap;
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable with raw filter directives; wins over [`LogConfig`].
pub const LOG_ENV: &str = "INTURA_LOG";

/// SDK components with independently configurable log levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Component {
    Fetch,
    Transport,
    Registry,
    Experiment,
    Callbacks,
}

impl Component {
    pub fn target(&self) -> &'static str {
        match self {
            Component::Fetch => "intura_ai::fetch",
            Component::Transport => "intura_ai::transport",
            Component::Registry => "intura_ai::registry",
            Component::Experiment => "intura_ai::experiment",
            Component::Callbacks => "intura_ai::callbacks",
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub default_level: Level,
    pub components: BTreeMap<Component, Level>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            default_level: Level::INFO,
            components: BTreeMap::new(),
        }
    }
}

impl LogConfig {
    pub fn new(default_level: Level) -> Self {
        Self {
            default_level,
            components: BTreeMap::new(),
        }
    }

    /// Debug output for every SDK component.
    pub fn verbose() -> Self {
        Self::new(Level::DEBUG)
    }

    pub fn with_component(mut self, component: Component, level: Level) -> Self {
        self.components.insert(component, level);
        self
    }

    /// Render as `EnvFilter` directives, e.g. `intura_ai=info,intura_ai::fetch=debug`.
    pub fn directives(&self) -> String {
        let mut parts = vec![format!("intura_ai={}", level_name(self.default_level))];
        for (component, level) in &self.components {
            parts.push(format!("{}={}", component.target(), level_name(*level)));
        }
        parts.join(",")
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(self.directives()))
    }
}

fn level_name(level: Level) -> &'static str {
    match level {
        Level::TRACE => "trace",
        Level::DEBUG => "debug",
        Level::INFO => "info",
        Level::WARN => "warn",
        _ => "error",
    }
}

/// Install a `fmt` subscriber for the SDK.
///
/// Returns `false` when a global subscriber was already set (by the
/// application or an earlier call); the existing one is left in place.
pub fn init(config: &LogConfig) -> bool {
    tracing_subscriber::registry()
        .with(config.filter())
        .with(fmt::layer().with_target(true))
        .try_init()
        .is_ok()
}
