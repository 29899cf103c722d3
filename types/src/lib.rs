//! Fundamental types for the field node.
//!
//! This crate defines the types shared across every other crate in the workspace:
//! hierarchical names, request/response packets, key material, identity
//! certificates, and timestamps.

pub mod certificate;
pub mod error;
pub mod keys;
pub mod name;
pub mod packet;
pub mod time;

pub use certificate::{IdentityCertificate, PublicKeyInfo};
pub use error::TypesError;
pub use keys::{KeyPair, KeyType, PrivateKey, PublicKey, Signature};
pub use name::{Component, Name};
pub use packet::{Data, Interest, MetaInfo, SignatureBlock, SignatureInfo};
pub use time::Timestamp;
