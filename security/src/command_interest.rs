//! Signed command requests.
//!
//! A command request carries its signature in the last four name
//! components: `<timestamp>/<nonce>/<signature info>/<signature value>`.
//! The signature covers the name up to and including the signature info.

use fieldnode_types::{Name, Signature, SignatureInfo, Timestamp};

use crate::SecurityError;

/// Number of components appended by signing.
pub const SIGNED_COMMAND_COMPONENTS: usize = 4;

/// The signature components of a command request, decoded.
#[derive(Clone, Debug)]
pub struct SignedCommand {
    pub timestamp: Timestamp,
    pub nonce: Vec<u8>,
    pub info: SignatureInfo,
    pub value: Signature,
    /// Encoded bytes covered by `value`.
    pub signed_portion: Vec<u8>,
}

/// Bytes covered by a command signature: the name without its last component.
pub fn signed_portion(unsigned_name: &Name) -> Result<Vec<u8>, SecurityError> {
    bincode::serialize(unsigned_name).map_err(|e| SecurityError::MalformedSignature(e.to_string()))
}

/// Decode the signature components of a command request name.
pub fn parse(name: &Name) -> Result<SignedCommand, SecurityError> {
    let len = name.len();
    if len < SIGNED_COMMAND_COMPONENTS {
        return Err(SecurityError::MalformedSignature(format!(
            "{name} has no signature components"
        )));
    }
    let component = |offset: usize| {
        name.get(len - offset)
            .map(|c| c.as_bytes())
            .unwrap_or_default()
    };

    let timestamp = Timestamp::from_be_slice(component(4))
        .ok_or_else(|| SecurityError::MalformedSignature("bad timestamp component".into()))?;
    let nonce = component(3).to_vec();
    let info = SignatureInfo::decode(component(2))
        .map_err(|e| SecurityError::MalformedSignature(format!("bad signature info: {e}")))?;
    let value = Signature::from_slice(component(1))
        .ok_or_else(|| SecurityError::MalformedSignature("bad signature value".into()))?;

    Ok(SignedCommand {
        timestamp,
        nonce,
        info,
        value,
        signed_portion: signed_portion(&name.prefix(len - 1))?,
    })
}

/// The request name with its signature components removed.
pub fn command_name(name: &Name) -> Name {
    name.prefix(name.len().saturating_sub(SIGNED_COMMAND_COMPONENTS))
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldnode_types::KeyType;

    fn name(uri: &str) -> Name {
        Name::from_uri(uri).unwrap()
    }

    fn signed_name() -> Name {
        let info = SignatureInfo {
            key_type: KeyType::Ed25519,
            key_locator: name("/home/ctl/KEY/ksk-1/ID-CERT/1"),
        };
        name("/home/pi/reboot")
            .append(Timestamp::from_millis(1234).to_be_bytes().to_vec())
            .append(vec![1u8; 8])
            .append(info.encode().unwrap())
            .append(vec![0u8; 64])
    }

    #[test]
    fn parses_signature_components() {
        let signed = parse(&signed_name()).unwrap();
        assert_eq!(signed.timestamp, Timestamp::from_millis(1234));
        assert_eq!(signed.nonce, vec![1u8; 8]);
        assert_eq!(signed.info.key_locator, name("/home/ctl/KEY/ksk-1/ID-CERT/1"));
        assert_eq!(command_name(&signed_name()), name("/home/pi/reboot"));
    }

    #[test]
    fn unsigned_name_is_malformed() {
        assert!(matches!(
            parse(&name("/home/pi")),
            Err(SecurityError::MalformedSignature(_))
        ));
        assert!(matches!(
            parse(&name("/home/pi/reboot/a/b/c/d")),
            Err(SecurityError::MalformedSignature(_))
        ));
    }
}
