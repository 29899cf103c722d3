//! Node configuration with TOML file support.
//!
//! One file carries two sections:
//! - `[device]`: the device's place in the namespace and its commands, read
//!   through [`ConfigTree`] path lookups
//! - `[node]`: runtime settings, deserialized into [`NodeConfig`]

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use fieldnode_security::TrustPolicy;
use fieldnode_types::Name;

use crate::bootstrap::{BootstrapConfig, DEFAULT_CERTIFICATE_ATTEMPTS};
use crate::command_table::CommandTable;
use crate::config_tree::{ConfigError, ConfigTree};
use crate::logging::LogFormat;
use crate::NodeError;

/// Runtime settings of a field node.
///
/// Can be loaded from the `[node]` table of the configuration file or built
/// programmatically (e.g. for tests).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Address of the local forwarder.
    #[serde(default = "default_forwarder")]
    pub forwarder: SocketAddr,

    /// Identity storage snapshot file.
    #[serde(default = "default_identity_file")]
    pub identity_file: PathBuf,

    /// Directory holding private key files.
    #[serde(default = "default_key_dir")]
    pub key_dir: PathBuf,

    /// Directory of trust anchor certificates; none configured means the
    /// anchors must be installed programmatically.
    #[serde(default)]
    pub trust_anchor_dir: Option<PathBuf>,

    /// How often the trust anchor directory is re-read.
    #[serde(default = "default_trust_anchor_refresh_secs")]
    pub trust_anchor_refresh_secs: u64,

    /// Lifetime of a certificate request; the controller may take a while
    /// to sign.
    #[serde(default = "default_certificate_request_lifetime_ms")]
    pub certificate_request_lifetime_ms: u64,

    #[serde(default = "default_capabilities_lifetime_ms")]
    pub capabilities_lifetime_ms: u64,

    /// Delay between a certificate response and the capability announcement.
    #[serde(default = "default_grace_delay_ms")]
    pub grace_delay_ms: u64,

    /// Delay before re-announcing capabilities after a timeout.
    #[serde(default = "default_capabilities_retry_ms")]
    pub capabilities_retry_ms: u64,

    /// Certificate requests sent before giving up (at most 10).
    #[serde(default = "default_certificate_max_attempts")]
    pub certificate_max_attempts: u32,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Whether to keep Prometheus metrics.
    #[serde(default)]
    pub enable_metrics: bool,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_forwarder() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 6363))
}

fn default_identity_file() -> PathBuf {
    PathBuf::from("./fieldnode_data/identity.bin")
}

fn default_key_dir() -> PathBuf {
    PathBuf::from("./fieldnode_data/keys")
}

fn default_trust_anchor_refresh_secs() -> u64 {
    3600
}

fn default_certificate_request_lifetime_ms() -> u64 {
    10_000
}

fn default_capabilities_lifetime_ms() -> u64 {
    3_000
}

fn default_grace_delay_ms() -> u64 {
    5_000
}

fn default_capabilities_retry_ms() -> u64 {
    30_000
}

fn default_certificate_max_attempts() -> u32 {
    DEFAULT_CERTIFICATE_ATTEMPTS
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

// ── Impl ───────────────────────────────────────────────────────────────

impl NodeConfig {
    pub fn log_format(&self) -> Result<LogFormat, NodeError> {
        self.log_format.parse()
    }

    pub fn bootstrap(&self) -> BootstrapConfig {
        BootstrapConfig {
            certificate_max_attempts: self.certificate_max_attempts,
            grace_delay: Duration::from_millis(self.grace_delay_ms),
            capabilities_retry_delay: Duration::from_millis(self.capabilities_retry_ms),
            ..BootstrapConfig::default()
        }
    }

    pub fn certificate_request_lifetime(&self) -> Duration {
        Duration::from_millis(self.certificate_request_lifetime_ms)
    }

    pub fn capabilities_lifetime(&self) -> Duration {
        Duration::from_millis(self.capabilities_lifetime_ms)
    }

    pub fn trust_anchor_refresh(&self) -> Duration {
        Duration::from_secs(self.trust_anchor_refresh_secs)
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            forwarder: default_forwarder(),
            identity_file: default_identity_file(),
            key_dir: default_key_dir(),
            trust_anchor_dir: None,
            trust_anchor_refresh_secs: default_trust_anchor_refresh_secs(),
            certificate_request_lifetime_ms: default_certificate_request_lifetime_ms(),
            capabilities_lifetime_ms: default_capabilities_lifetime_ms(),
            grace_delay_ms: default_grace_delay_ms(),
            capabilities_retry_ms: default_capabilities_retry_ms(),
            certificate_max_attempts: default_certificate_max_attempts(),
            log_format: default_log_format(),
            log_level: default_log_level(),
            enable_metrics: false,
        }
    }
}

/// The whole configuration file.
#[derive(Clone, Debug)]
pub struct Config {
    pub tree: ConfigTree,
    pub node: NodeConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &Path) -> Result<Self, NodeError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Parse(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, NodeError> {
        let table: toml::Table = toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))?;
        let node = match table.get("node") {
            Some(section) => section
                .clone()
                .try_into()
                .map_err(|e: toml::de::Error| ConfigError::Parse(format!("[node]: {e}")))?,
            None => NodeConfig::default(),
        };
        Ok(Self {
            tree: ConfigTree::from_table(&table),
            node,
        })
    }

    pub fn environment_prefix(&self) -> Result<Name, NodeError> {
        Ok(Name::from_uri(self.tree.first_value("device/environmentPrefix")?)?)
    }

    /// Controller name, relative to the environment prefix.
    pub fn controller_name(&self) -> Result<Name, NodeError> {
        Ok(Name::from_uri(self.tree.first_value("device/controllerName")?)?)
    }

    /// Configured device name, if any.
    pub fn device_name(&self) -> Result<Option<String>, NodeError> {
        Ok(self
            .tree
            .optional_value("device/deviceName")?
            .map(str::to_string))
    }

    pub fn trust_policy(&self) -> Result<TrustPolicy, NodeError> {
        Ok(TrustPolicy::with_controller(
            self.environment_prefix()?,
            &self.controller_name()?,
        )?)
    }

    pub fn command_table(&self) -> Result<CommandTable, NodeError> {
        Ok(CommandTable::from_config(&self.tree)?)
    }

    /// The node's prefix: environment prefix plus device name. Without a
    /// configured name, `serial` supplies the `pi-<serial>` fallback.
    pub fn device_prefix(
        &self,
        serial: impl FnOnce() -> Result<String, NodeError>,
    ) -> Result<Name, NodeError> {
        let device_name = match self.device_name()? {
            Some(name) => name,
            None => format!("pi-{}", serial()?),
        };
        Ok(self.environment_prefix()?.append_name(&Name::from_uri(&device_name)?))
    }
}
