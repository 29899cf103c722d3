use thiserror::Error;

use crate::bootstrap::FailureReason;
use crate::config_tree::ConfigError;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("security error: {0}")]
    Security(#[from] fieldnode_security::SecurityError),

    #[error("network error: {0}")]
    Network(#[from] fieldnode_network::NetworkError),

    #[error("types error: {0}")]
    Types(#[from] fieldnode_types::TypesError),

    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("logging error: {0}")]
    Logging(String),

    #[error("certificate {0} is not for this device's key")]
    ForeignCertificate(fieldnode_types::Name),

    #[error("platform serial number not found")]
    SerialNotFound,

    #[error("bootstrap failed: {0}")]
    BootstrapFailed(FailureReason),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
