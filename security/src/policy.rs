//! Hierarchical trust model.
//!
//! The policy enforces an environment: the network prefix that is the root of
//! the namespace. Within it, a single trust root (the controller) is the top
//! authority. A signature is trusted only if its certificate chain ends at
//! the trust root.

use fieldnode_types::Name;

use crate::{IdentityStorage, SecurityError};

/// Environment prefix plus trust root identity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrustPolicy {
    environment_prefix: Name,
    trust_root_identity: Name,
}

impl TrustPolicy {
    /// The trust root must be a strict descendant of the environment prefix.
    pub fn new(environment_prefix: Name, trust_root_identity: Name) -> Result<Self, SecurityError> {
        if !environment_prefix.is_prefix_of(&trust_root_identity)
            || trust_root_identity.len() == environment_prefix.len()
        {
            return Err(SecurityError::InvalidTrustDomain(format!(
                "trust root {trust_root_identity} is not under {environment_prefix}"
            )));
        }
        Ok(Self {
            environment_prefix,
            trust_root_identity,
        })
    }

    /// Trust root named relative to the environment, e.g. `/home` + `controller`.
    pub fn with_controller(
        environment_prefix: Name,
        controller: &Name,
    ) -> Result<Self, SecurityError> {
        let root = environment_prefix.clone().append_name(controller);
        Self::new(environment_prefix, root)
    }

    pub fn environment_prefix(&self) -> &Name {
        &self.environment_prefix
    }

    pub fn trust_root_identity(&self) -> &Name {
        &self.trust_root_identity
    }

    pub fn is_within_trust_domain(&self, name: &Name) -> bool {
        self.environment_prefix.is_prefix_of(name)
    }

    /// Whether a key locator names a certificate of the trust root.
    pub fn signer_is_trust_root(&self, key_locator: &Name) -> bool {
        self.trust_root_identity.is_prefix_of(key_locator)
    }

    /// Whether this device's default certificate was issued by the trust root.
    ///
    /// Any lookup failure reads as "not yet trusted".
    pub fn has_accepted_root_certificate(&self, storage: &dyn IdentityStorage) -> bool {
        let Ok(identity) = storage.default_identity() else {
            return false;
        };
        let Ok(certificate_name) = storage.default_certificate_name_for_identity(&identity) else {
            return false;
        };
        storage
            .certificate(&certificate_name)
            .and_then(|certificate| certificate.signer().cloned())
            .is_some_and(|signer| self.signer_is_trust_root(&signer))
    }
}
