//! Request (`Interest`) and response (`Data`) packets.
//!
//! Both packets are encoded with bincode. The encoding is deterministic, so
//! a decoded packet re-encodes to the same bytes; certificate pass-through
//! relies on that.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{KeyType, Name, Signature, TypesError};

/// Default lifetime of an outgoing request.
pub const DEFAULT_INTEREST_LIFETIME: Duration = Duration::from_millis(4000);

/// A request for named data.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interest {
    pub name: Name,
    /// How long the requester waits for a response, in milliseconds.
    pub lifetime_ms: u64,
}

impl Interest {
    pub fn new(name: Name) -> Self {
        Self {
            name,
            lifetime_ms: DEFAULT_INTEREST_LIFETIME.as_millis() as u64,
        }
    }

    pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime_ms = lifetime.as_millis() as u64;
        self
    }

    pub fn lifetime(&self) -> Duration {
        Duration::from_millis(self.lifetime_ms)
    }

    pub fn wire_encode(&self) -> Result<Vec<u8>, TypesError> {
        bincode::serialize(self).map_err(|e| TypesError::Encoding(e.to_string()))
    }

    pub fn wire_decode(bytes: &[u8]) -> Result<Self, TypesError> {
        bincode::deserialize(bytes).map_err(|e| TypesError::Decoding(e.to_string()))
    }
}

/// Cache-related metadata of a response.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaInfo {
    /// How long the response may be served from caches, in milliseconds.
    pub freshness_period_ms: Option<u64>,
}

/// Describes who produced a signature.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureInfo {
    pub key_type: KeyType,
    /// Name of the certificate whose key produced the signature.
    pub key_locator: Name,
}

impl SignatureInfo {
    pub fn encode(&self) -> Result<Vec<u8>, TypesError> {
        bincode::serialize(self).map_err(|e| TypesError::Encoding(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, TypesError> {
        bincode::deserialize(bytes).map_err(|e| TypesError::Decoding(e.to_string()))
    }
}

/// Signature info together with the signature value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureBlock {
    pub info: SignatureInfo,
    pub value: Signature,
}

/// A named, optionally signed response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Data {
    pub name: Name,
    pub meta_info: MetaInfo,
    pub content: Vec<u8>,
    pub signature: Option<SignatureBlock>,
}

impl Data {
    pub fn new(name: Name) -> Self {
        Self {
            name,
            meta_info: MetaInfo::default(),
            content: Vec::new(),
            signature: None,
        }
    }

    pub fn with_content(mut self, content: impl Into<Vec<u8>>) -> Self {
        self.content = content.into();
        self
    }

    pub fn with_freshness(mut self, period: Duration) -> Self {
        self.meta_info.freshness_period_ms = Some(period.as_millis() as u64);
        self
    }

    pub fn key_locator(&self) -> Option<&Name> {
        self.signature.as_ref().map(|s| &s.info.key_locator)
    }

    /// Bytes covered by a signature carrying `info`.
    pub fn signed_portion(&self, info: &SignatureInfo) -> Result<Vec<u8>, TypesError> {
        bincode::serialize(&(&self.name, &self.meta_info, &self.content, info))
            .map_err(|e| TypesError::Encoding(e.to_string()))
    }

    pub fn wire_encode(&self) -> Result<Vec<u8>, TypesError> {
        bincode::serialize(self).map_err(|e| TypesError::Encoding(e.to_string()))
    }

    pub fn wire_decode(bytes: &[u8]) -> Result<Self, TypesError> {
        bincode::deserialize(bytes).map_err(|e| TypesError::Decoding(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(uri: &str) -> Name {
        Name::from_uri(uri).unwrap()
    }

    #[test]
    fn data_wire_encoding_is_stable() {
        let data = Data::new(name("/home/pi/KEY/ksk-1/ID-CERT/1"))
            .with_content(b"key bits".to_vec())
            .with_freshness(Duration::from_secs(1));
        let first = data.wire_encode().unwrap();
        let decoded = Data::wire_decode(&first).unwrap();
        assert_eq!(decoded, data);
        assert_eq!(decoded.wire_encode().unwrap(), first);
    }

    #[test]
    fn signed_portion_depends_on_signer() {
        let data = Data::new(name("/home/pi/status")).with_content(b"ok".to_vec());
        let a = SignatureInfo {
            key_type: KeyType::Ed25519,
            key_locator: name("/home/pi/KEY/a"),
        };
        let b = SignatureInfo {
            key_type: KeyType::Ed25519,
            key_locator: name("/home/pi/KEY/b"),
        };
        assert_ne!(data.signed_portion(&a).unwrap(), data.signed_portion(&b).unwrap());
    }

    #[test]
    fn interest_lifetime_is_millis() {
        let interest = Interest::new(name("/home/pi/ping")).with_lifetime(Duration::from_secs(10));
        assert_eq!(interest.lifetime_ms, 10_000);
        assert_eq!(interest.lifetime(), Duration::from_secs(10));
    }

    #[test]
    fn garbage_does_not_decode() {
        assert!(Data::wire_decode(&[0xFF, 0x01]).is_err());
    }
}
