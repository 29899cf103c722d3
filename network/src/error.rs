use thiserror::Error;

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("connection to forwarder failed: {0}")]
    ConnectionFailed(String),

    #[error("packet of {size} bytes exceeds the {max} byte limit")]
    PacketTooLarge { size: usize, max: usize },

    #[error("malformed packet: {0}")]
    Malformed(String),

    #[error("face is closed")]
    Closed,

    #[error("types error: {0}")]
    Types(#[from] fieldnode_types::TypesError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
