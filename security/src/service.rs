//! The signature service seam used by the node.

use fieldnode_types::{Data, Interest, Name};

use crate::{IdentityStorage, SecurityError};

/// Outcome of a completed verification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verification {
    Verified,
    /// The packet is not trusted; carries a reason for the log.
    Rejected(String),
}

impl Verification {
    pub fn is_verified(&self) -> bool {
        matches!(self, Self::Verified)
    }
}

/// Signs outgoing packets and verifies incoming ones.
///
/// `Err` from a verify call means verification could not be set up at all
/// (for example a request without signature components); `Ok(Rejected)`
/// means it ran and the packet is untrusted.
pub trait SignatureService {
    fn storage(&self) -> &dyn IdentityStorage;

    fn storage_mut(&mut self) -> &mut dyn IdentityStorage;

    /// Certificate used for signing when none is given explicitly.
    fn default_certificate_name(&self) -> Result<Name, SecurityError>;

    fn sign_data(&self, data: &mut Data, certificate_name: &Name) -> Result<(), SecurityError>;

    fn verify_data(&mut self, data: &Data) -> Result<Verification, SecurityError>;

    fn verify_request(&mut self, interest: &Interest) -> Result<Verification, SecurityError>;

    /// Stamp a request with timestamp, nonce and signature components.
    fn make_command_interest(&mut self, interest: &mut Interest) -> Result<(), SecurityError>;

    /// Re-read trust anchors from their backing store, if there is one.
    /// Returns the number of anchors now installed.
    fn refresh_trust_anchors(&mut self) -> Result<usize, SecurityError> {
        Ok(0)
    }
}
