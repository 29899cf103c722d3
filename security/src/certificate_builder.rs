//! Construction of unsigned certificates.
//!
//! The builder only prepares the packet; signing it is the job of whichever
//! key chain acts as issuer (the device itself for a self-signed bootstrap
//! certificate, the controller for the certificate the device asks for).

use std::time::Duration;

use fieldnode_types::certificate::certificate_prefix;
use fieldnode_types::{Component, Data, KeyType, Name, PublicKey, PublicKeyInfo, Timestamp};

use crate::SecurityError;

/// Validity of a freshly built certificate.
pub const DEFAULT_VALIDITY: Duration = Duration::from_secs(365 * 24 * 3600);

/// Freshness period attached to certificate packets.
const CERTIFICATE_FRESHNESS: Duration = Duration::from_secs(3600);

/// Current time in milliseconds followed by a random suffix, so two issuers
/// certifying the same key within one millisecond still pick distinct names.
pub fn unique_version() -> Component {
    let suffix = fieldnode_crypto::random_nonce();
    Component::from(format!(
        "{}-{}",
        Timestamp::now().as_millis(),
        hex::encode(&suffix[..4])
    ))
}

pub struct CertificateBuilder {
    key_name: Name,
    key_type: KeyType,
    public_key: PublicKey,
    not_before: Timestamp,
    not_after: Timestamp,
    version: Option<Component>,
}

impl CertificateBuilder {
    pub fn new(key_name: Name, key_type: KeyType, public_key: PublicKey) -> Self {
        let now = Timestamp::now();
        Self {
            key_name,
            key_type,
            public_key,
            not_before: now,
            not_after: now.saturating_add_millis(DEFAULT_VALIDITY.as_millis() as u64),
            version: None,
        }
    }

    pub fn validity(mut self, not_before: Timestamp, not_after: Timestamp) -> Self {
        self.not_before = not_before;
        self.not_after = not_after;
        self
    }

    /// Version component; defaults to [`unique_version`].
    pub fn version(mut self, version: impl Into<Component>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn certificate_name(&self) -> Result<Name, SecurityError> {
        let prefix = certificate_prefix(&self.key_name)
            .ok_or_else(|| SecurityError::InvalidKeyName(self.key_name.clone()))?;
        let version = self
            .version
            .clone()
            .unwrap_or_else(unique_version);
        Ok(prefix.append(version))
    }

    pub fn build_unsigned(&self) -> Result<Data, SecurityError> {
        let info = PublicKeyInfo {
            key_name: self.key_name.clone(),
            key_type: self.key_type,
            public_key: self.public_key.clone(),
            not_before: self.not_before,
            not_after: self.not_after,
        };
        Ok(Data::new(self.certificate_name()?)
            .with_content(info.encode()?)
            .with_freshness(CERTIFICATE_FRESHNESS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldnode_types::IdentityCertificate;

    fn name(uri: &str) -> Name {
        Name::from_uri(uri).unwrap()
    }

    #[test]
    fn default_versions_do_not_collide() {
        let builder =
            CertificateBuilder::new(name("/home/pi/ksk-1"), KeyType::Ed25519, PublicKey([2u8; 32]));
        let first = builder.certificate_name().unwrap();
        let second = builder.certificate_name().unwrap();
        assert_ne!(first, second);
        assert_eq!(first.prefix(first.len() - 1), second.prefix(second.len() - 1));
    }

    #[test]
    fn builds_versioned_certificate_name() {
        let builder =
            CertificateBuilder::new(name("/home/pi/ksk-1"), KeyType::Ed25519, PublicKey([2u8; 32]))
                .version("42");
        let data = builder.build_unsigned().unwrap();
        assert_eq!(data.name, name("/home/pi/KEY/ksk-1/ID-CERT/42"));
        let cert = IdentityCertificate::from_data(data).unwrap();
        assert_eq!(cert.key_name(), &name("/home/pi/ksk-1"));
        assert!(cert.is_valid_at(Timestamp::now()));
    }

    #[test]
    fn empty_key_name_is_rejected() {
        let builder = CertificateBuilder::new(Name::new(), KeyType::Ed25519, PublicKey([2u8; 32]));
        assert!(matches!(builder.build_unsigned(), Err(SecurityError::InvalidKeyName(_))));
    }
}
