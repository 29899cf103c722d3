//! Hierarchical names.
//!
//! A [`Name`] is an ordered list of opaque binary components. Every packet,
//! key, certificate and command on the network is addressed by one. The URI
//! form is `/a/b/c`, with bytes outside the unreserved set written as `%XX`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::TypesError;

/// A single name component.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Component(Vec<u8>);

impl Component {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Lossy UTF-8 view, for log lines and configuration values.
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.0).into_owned()
    }

    /// Escaped URI form of this component (no leading slash).
    pub fn to_escaped(&self) -> String {
        let mut out = String::with_capacity(self.0.len());
        for &b in &self.0 {
            if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~') {
                out.push(b as char);
            } else {
                out.push_str(&format!("%{b:02X}"));
            }
        }
        out
    }

    fn from_escaped(s: &str) -> Result<Self, TypesError> {
        let bytes = s.as_bytes();
        let mut out = Vec::with_capacity(bytes.len());
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] == b'%' {
                let hex_digits = s
                    .get(i + 1..i + 3)
                    .ok_or_else(|| TypesError::InvalidUri(format!("truncated escape in {s:?}")))?;
                if !hex_digits.bytes().all(|b| b.is_ascii_hexdigit()) {
                    return Err(TypesError::InvalidUri(format!("bad escape %{hex_digits}")));
                }
                let byte = u8::from_str_radix(hex_digits, 16)
                    .map_err(|_| TypesError::InvalidUri(format!("bad escape %{hex_digits}")))?;
                out.push(byte);
                i += 3;
            } else {
                out.push(bytes[i]);
                i += 1;
            }
        }
        Ok(Self(out))
    }
}

impl From<&str> for Component {
    fn from(s: &str) -> Self {
        Self(s.as_bytes().to_vec())
    }
}

impl From<String> for Component {
    fn from(s: String) -> Self {
        Self(s.into_bytes())
    }
}

impl From<Vec<u8>> for Component {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

/// An ordered list of name components.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Name {
    components: Vec<Component>,
}

impl Name {
    /// The empty (root) name.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a name from its URI form. An optional `ndn:` scheme is accepted.
    pub fn from_uri(uri: &str) -> Result<Self, TypesError> {
        let trimmed = uri.trim();
        let path = trimmed.strip_prefix("ndn:").unwrap_or(trimmed);
        let components = path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(Component::from_escaped)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { components })
    }

    pub fn from_components(components: Vec<Component>) -> Self {
        Self { components }
    }

    /// Append one component, returning `self` for chaining.
    pub fn append(mut self, component: impl Into<Component>) -> Self {
        self.components.push(component.into());
        self
    }

    /// Append every component of `other`.
    pub fn append_name(mut self, other: &Name) -> Self {
        self.components.extend(other.components.iter().cloned());
        self
    }

    pub fn push(&mut self, component: impl Into<Component>) {
        self.components.push(component.into());
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Component> {
        self.components.get(index)
    }

    pub fn last(&self) -> Option<&Component> {
        self.components.last()
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    /// The first `count` components (clamped to the name length).
    pub fn prefix(&self, count: usize) -> Name {
        let end = count.min(self.components.len());
        Name {
            components: self.components[..end].to_vec(),
        }
    }

    /// Whether every component of `self` equals the corresponding leading
    /// component of `other`. The empty name is a prefix of everything.
    pub fn is_prefix_of(&self, other: &Name) -> bool {
        self.components.len() <= other.components.len()
            && self
                .components
                .iter()
                .zip(other.components.iter())
                .all(|(a, b)| a == b)
    }

    /// Position of the first component equal to `marker`, if any.
    pub fn position_of(&self, marker: &[u8]) -> Option<usize> {
        self.components.iter().position(|c| c.as_bytes() == marker)
    }

    pub fn to_uri(&self) -> String {
        if self.components.is_empty() {
            return "/".to_string();
        }
        let mut out = String::new();
        for component in &self.components {
            out.push('/');
            out.push_str(&component.to_escaped());
        }
        out
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_uri())
    }
}

impl FromStr for Name {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Name::from_uri(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(uri: &str) -> Name {
        Name::from_uri(uri).unwrap()
    }

    #[test]
    fn parses_and_prints_uri() {
        let n = name("/home/pi-01/ping");
        assert_eq!(n.len(), 3);
        assert_eq!(n.to_uri(), "/home/pi-01/ping");
        assert_eq!(name("ndn:/home").to_uri(), "/home");
        assert_eq!(Name::new().to_uri(), "/");
    }

    #[test]
    fn redundant_slashes_are_ignored() {
        assert_eq!(name("//home///pi/"), name("/home/pi"));
    }

    #[test]
    fn escapes_non_unreserved_bytes() {
        let n = Name::new().append(vec![0x00, b'a', 0xFF]).append("a b");
        assert_eq!(n.to_uri(), "/%00a%FF/a%20b");
        assert_eq!(name(&n.to_uri()), n);
    }

    #[test]
    fn truncated_escape_is_rejected() {
        assert!(Name::from_uri("/abc%4").is_err());
        assert!(Name::from_uri("/abc%zz").is_err());
    }

    #[test]
    fn escape_requires_two_hex_digits() {
        assert!(Name::from_uri("/home/%+1").is_err());
        assert!(Name::from_uri("/home/%-1").is_err());
        assert!(Name::from_uri("/home/% 1").is_err());
        assert_eq!(name("/home/%2b").get(1).map(Component::as_bytes), Some(&b"+"[..]));
    }

    #[test]
    fn prefix_match_is_component_wise() {
        let device = name("/home/pi");
        assert!(device.is_prefix_of(&name("/home/pi/ping")));
        assert!(device.is_prefix_of(&name("/home/pi")));
        assert!(!device.is_prefix_of(&name("/home/pizza/ping")));
        assert!(!device.is_prefix_of(&name("/home")));
        assert!(Name::new().is_prefix_of(&device));
    }

    #[test]
    fn append_name_concatenates() {
        let full = name("/home/pi").append_name(&name("/led/on"));
        assert_eq!(full, name("/home/pi/led/on"));
        assert_eq!(full.prefix(2), name("/home/pi"));
        assert_eq!(full.prefix(10), full);
    }
}
