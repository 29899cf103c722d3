//! Identity certificates.
//!
//! A certificate is an ordinary signed [`Data`] packet whose content is the
//! bincode-encoded [`PublicKeyInfo`]. For the key `/<identity>/<keyId>` the
//! certificate is named `/<identity>/KEY/<keyId>/ID-CERT/<version>`.

use serde::{Deserialize, Serialize};

use crate::{Data, KeyType, Name, PublicKey, Timestamp, TypesError};

/// Name component separating the identity from the key id.
pub const KEY_MARKER: &str = "KEY";
/// Name component separating the key id from the certificate version.
pub const CERT_MARKER: &str = "ID-CERT";

/// The public-key binding carried in a certificate's content.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKeyInfo {
    pub key_name: Name,
    pub key_type: KeyType,
    pub public_key: PublicKey,
    pub not_before: Timestamp,
    pub not_after: Timestamp,
}

impl PublicKeyInfo {
    pub fn encode(&self) -> Result<Vec<u8>, TypesError> {
        bincode::serialize(self).map_err(|e| TypesError::Encoding(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, TypesError> {
        bincode::deserialize(bytes).map_err(|e| TypesError::Decoding(e.to_string()))
    }
}

/// A decoded certificate. The received packet is kept verbatim so it can be
/// served back unchanged.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityCertificate {
    data: Data,
    info: PublicKeyInfo,
}

impl IdentityCertificate {
    /// Interpret a data packet as a certificate.
    pub fn from_data(data: Data) -> Result<Self, TypesError> {
        if key_name_from_certificate(&data.name).is_none() {
            return Err(TypesError::NotACertificate(data.name.to_uri()));
        }
        let info = PublicKeyInfo::decode(&data.content)?;
        Ok(Self { data, info })
    }

    pub fn wire_decode(bytes: &[u8]) -> Result<Self, TypesError> {
        Self::from_data(Data::wire_decode(bytes)?)
    }

    pub fn wire_encode(&self) -> Result<Vec<u8>, TypesError> {
        self.data.wire_encode()
    }

    pub fn name(&self) -> &Name {
        &self.data.name
    }

    pub fn key_name(&self) -> &Name {
        &self.info.key_name
    }

    pub fn key_type(&self) -> KeyType {
        self.info.key_type
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.info.public_key
    }

    pub fn info(&self) -> &PublicKeyInfo {
        &self.info
    }

    /// Name of the certificate that signed this one.
    pub fn signer(&self) -> Option<&Name> {
        self.data.key_locator()
    }

    pub fn data(&self) -> &Data {
        &self.data
    }

    pub fn into_data(self) -> Data {
        self.data
    }

    pub fn is_valid_at(&self, now: Timestamp) -> bool {
        self.info.not_before <= now && now <= self.info.not_after
    }
}

/// `/<identity>/KEY/<keyId>/ID-CERT` for the key `/<identity>/<keyId>`.
pub fn certificate_prefix(key_name: &Name) -> Option<Name> {
    let key_id = key_name.last()?.clone();
    Some(
        identity_from_key_name(key_name)
            .append(KEY_MARKER)
            .append(key_id)
            .append(CERT_MARKER),
    )
}

/// Recover `/<identity>/<keyId>` from a certificate name (with or without a
/// version component).
pub fn key_name_from_certificate(certificate_name: &Name) -> Option<Name> {
    let key_pos = certificate_name.position_of(KEY_MARKER.as_bytes())?;
    let key_id = certificate_name.get(key_pos + 1)?;
    let cert_marker = certificate_name.get(key_pos + 2)?;
    if cert_marker.as_bytes() != CERT_MARKER.as_bytes() {
        return None;
    }
    Some(certificate_name.prefix(key_pos).append(key_id.clone()))
}

/// The identity that owns a key: every component except the key id.
pub fn identity_from_key_name(key_name: &Name) -> Name {
    key_name.prefix(key_name.len().saturating_sub(1))
}
