use fieldnode_types::{Name, TypesError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SecurityError {
    #[error("identity {0} not found")]
    IdentityNotFound(Name),

    #[error("key {0} not found")]
    KeyNotFound(Name),

    #[error("private key {0} not found")]
    PrivateKeyNotFound(Name),

    #[error("invalid key name {0}")]
    InvalidKeyName(Name),

    #[error("certificate {0} not found")]
    CertificateNotFound(Name),

    #[error("no default {0} set")]
    NoDefault(&'static str),

    #[error("certificate {0} already present")]
    DuplicateCertificate(Name),

    #[error("malformed signature: {0}")]
    MalformedSignature(String),

    #[error("invalid trust domain: {0}")]
    InvalidTrustDomain(String),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("packet error: {0}")]
    Types(#[from] TypesError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
