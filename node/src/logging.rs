//! Structured logging initialisation for the field node.
//!
//! Two output formats are supported:
//! - [`LogFormat::Human`]: readable lines for development
//! - [`LogFormat::Json`]: newline-delimited JSON for log collection
//!
//! `RUST_LOG` overrides the caller-supplied level at startup. The filter is
//! installed behind a reload layer, so [`LogLevelHandle`] can swap it while
//! the node runs.

use std::str::FromStr;

use tracing_subscriber::{
    fmt, layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter, Registry,
};

use crate::NodeError;

/// Selects the output format for structured logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Human,
    Json,
}

impl FromStr for LogFormat {
    type Err = NodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "human" => Ok(Self::Human),
            "json" => Ok(Self::Json),
            other => Err(NodeError::Logging(format!("unknown log format {other:?}"))),
        }
    }
}

/// Changes the active log filter at runtime.
#[derive(Clone, Debug)]
pub struct LogLevelHandle {
    handle: reload::Handle<EnvFilter, Registry>,
}

impl LogLevelHandle {
    /// Replace the filter with `level`, e.g. `"debug"` or
    /// `"info,fieldnode_node=trace"`.
    pub fn set_level(&self, level: &str) -> Result<(), NodeError> {
        let filter = parse_filter(level)?;
        self.handle
            .reload(filter)
            .map_err(|e| NodeError::Logging(e.to_string()))?;
        tracing::info!(level, "log level changed");
        Ok(())
    }
}

fn parse_filter(level: &str) -> Result<EnvFilter, NodeError> {
    EnvFilter::try_new(level).map_err(|e| NodeError::Logging(format!("bad filter {level:?}: {e}")))
}

/// Install the global tracing subscriber.
///
/// Fails if a global subscriber has already been set.
pub fn init_logging(format: LogFormat, level: &str) -> Result<LogLevelHandle, NodeError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => parse_filter(level)?,
    };
    let (filter, handle) = reload::Layer::new(filter);

    let installed = match format {
        LogFormat::Human => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_target(true).with_thread_ids(true))
            .try_init(),
    };
    installed.map_err(|e| NodeError::Logging(e.to_string()))?;
    Ok(LogLevelHandle { handle })
}
