//! Payloads of the commands a node sends to its controller.
//!
//! Both payloads are protobuf messages, carried as the last name component
//! of a signed request:
//! - `<trustRoot>/certificateRequest/<CertificateRequestMessage>`
//! - `<trustRoot>/updateCapabilities/<UpdateCapabilitiesCommandMessage>`

use fieldnode_types::{Component, KeyType, Name, PublicKey};
use prost::Message;

/// Command component for certificate requests.
pub const CERTIFICATE_REQUEST: &str = "certificateRequest";
/// Command component for capability announcements.
pub const UPDATE_CAPABILITIES: &str = "updateCapabilities";

/// A name as an ordered list of raw components.
#[derive(Clone, PartialEq, Message)]
pub struct NameMessage {
    #[prost(bytes = "vec", repeated, tag = "8")]
    pub components: Vec<Vec<u8>>,
}

impl From<&Name> for NameMessage {
    fn from(name: &Name) -> Self {
        Self {
            components: name.components().iter().map(|c| c.as_bytes().to_vec()).collect(),
        }
    }
}

impl From<&NameMessage> for Name {
    fn from(message: &NameMessage) -> Self {
        Name::from_components(message.components.iter().cloned().map(Component::new).collect())
    }
}

/// The key a node wants certified.
#[derive(Clone, PartialEq, Message)]
pub struct CertificateRequest {
    #[prost(uint32, tag = "1")]
    pub key_type: u32,
    #[prost(bytes = "vec", tag = "2")]
    pub key_bits: Vec<u8>,
    #[prost(message, optional, tag = "3")]
    pub key_name: Option<NameMessage>,
}

#[derive(Clone, PartialEq, Message)]
pub struct CertificateRequestMessage {
    #[prost(message, optional, tag = "1")]
    pub command: Option<CertificateRequest>,
}

impl CertificateRequestMessage {
    pub fn new(key_name: &Name, key_type: KeyType, public_key: &PublicKey) -> Self {
        Self {
            command: Some(CertificateRequest {
                key_type: key_type.code(),
                key_bits: public_key.as_bytes().to_vec(),
                key_name: Some(NameMessage::from(key_name)),
            }),
        }
    }
}

/// One command a node can execute.
#[derive(Clone, PartialEq, Message)]
pub struct DeviceCapability {
    #[prost(message, optional, tag = "1")]
    pub command_prefix: Option<NameMessage>,
    #[prost(string, repeated, tag = "2")]
    pub keywords: Vec<String>,
    #[prost(bool, tag = "3")]
    pub needs_signature: bool,
}

#[derive(Clone, PartialEq, Message)]
pub struct UpdateCapabilitiesCommandMessage {
    #[prost(message, repeated, tag = "1")]
    pub capabilities: Vec<DeviceCapability>,
}

/// Encode any payload for use as a name component.
pub fn encode_component<M: Message>(message: &M) -> Component {
    Component::new(message.encode_to_vec())
}

/// Decode a payload from a name component.
pub fn decode_component<M: Message + Default>(
    component: &Component,
) -> Result<M, prost::DecodeError> {
    M::decode(component.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(uri: &str) -> Name {
        Name::from_uri(uri).unwrap()
    }

    #[test]
    fn certificate_request_carries_key() {
        let key_name = name("/home/pi/ksk-0011");
        let msg =
            CertificateRequestMessage::new(&key_name, KeyType::Ed25519, &PublicKey([9u8; 32]));
        let decoded: CertificateRequestMessage = decode_component(&encode_component(&msg)).unwrap();
        let command = decoded.command.unwrap();
        assert_eq!(command.key_type, KeyType::Ed25519.code());
        assert_eq!(command.key_bits, vec![9u8; 32]);
        assert_eq!(Name::from(&command.key_name.unwrap()), key_name);
    }

    #[test]
    fn capabilities_preserve_order() {
        let msg = UpdateCapabilitiesCommandMessage {
            capabilities: vec![
                DeviceCapability {
                    command_prefix: Some(NameMessage::from(&name("/home/pi/ping"))),
                    keywords: vec!["test".into()],
                    needs_signature: false,
                },
                DeviceCapability {
                    command_prefix: Some(NameMessage::from(&name("/home/pi/reboot"))),
                    keywords: vec![],
                    needs_signature: true,
                },
            ],
        };
        let decoded: UpdateCapabilitiesCommandMessage =
            decode_component(&encode_component(&msg)).unwrap();
        assert_eq!(decoded, msg);
        assert!(decoded.capabilities[1].needs_signature);
    }
}
