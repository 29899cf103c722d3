//! Error type shared by the type-level codecs.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TypesError {
    #[error("invalid name URI: {0}")]
    InvalidUri(String),

    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("decoding error: {0}")]
    Decoding(String),

    #[error("not a certificate: {0}")]
    NotACertificate(String),
}
