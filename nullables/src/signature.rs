//! Nullable signature service with scripted verification and fake signatures.

use std::collections::VecDeque;

use fieldnode_security::{
    CertificateBuilder, IdentityStorage, MemoryIdentityStorage, SecurityError, SignatureService,
    Verification,
};
use fieldnode_types::{
    Data, IdentityCertificate, Interest, KeyType, Name, PublicKey, Signature, SignatureBlock,
    SignatureInfo, Timestamp,
};

/// Scripted result of a verification call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Verified,
    Rejected,
    /// Verification cannot be set up; the call returns `Err`.
    Error,
}

impl Outcome {
    fn result(self, what: &Name) -> Result<Verification, SecurityError> {
        match self {
            Self::Verified => Ok(Verification::Verified),
            Self::Rejected => Ok(Verification::Rejected(format!("scripted rejection of {what}"))),
            Self::Error => Err(SecurityError::MalformedSignature(format!(
                "scripted failure for {what}"
            ))),
        }
    }
}

/// Public key given to every identity created by the nullable service.
pub const NULL_PUBLIC_KEY: PublicKey = PublicKey([7u8; 32]);

/// A signature service over in-memory storage that never does real
/// cryptography.
///
/// Signing attaches a zero signature naming the requested certificate, so
/// the signer of a response can be read back from the packet.
/// Verification returns scripted outcomes: queued ones first, then the
/// default.
pub struct NullSignatureService {
    storage: MemoryIdentityStorage,
    data_outcomes: VecDeque<Outcome>,
    default_data_outcome: Outcome,
    request_outcomes: VecDeque<Outcome>,
    default_request_outcome: Outcome,
    signed: Vec<(Name, Name)>,
    verified_requests: Vec<Name>,
    command_counter: u64,
}

impl NullSignatureService {
    pub fn new() -> Self {
        Self {
            storage: MemoryIdentityStorage::new(),
            data_outcomes: VecDeque::new(),
            default_data_outcome: Outcome::Verified,
            request_outcomes: VecDeque::new(),
            default_request_outcome: Outcome::Verified,
            signed: Vec::new(),
            verified_requests: Vec::new(),
            command_counter: 0,
        }
    }

    /// A service whose default identity is `identity`, holding one key and a
    /// self-signed certificate for it.
    pub fn with_identity(identity: &Name) -> Self {
        let mut service = Self::new();
        service.create_identity(identity);
        service
    }

    fn create_identity(&mut self, identity: &Name) {
        let key_name = identity.clone().append("ksk-null");
        let certificate = certificate_with_version(&key_name, NULL_PUBLIC_KEY, None, "0");
        self.storage
            .add_key(&key_name, KeyType::Ed25519, &NULL_PUBLIC_KEY)
            .and_then(|_| self.storage.add_certificate(&certificate))
            .and_then(|_| self.storage.set_default_certificate_for_key(certificate.name()))
            .and_then(|_| self.storage.set_default_identity(identity))
            .unwrap_or_else(|e| panic!("nullable identity setup failed: {e}"));
    }

    /// Name of the default key of the default identity.
    pub fn device_key_name(&self) -> Option<Name> {
        let identity = self.storage.default_identity().ok()?;
        self.storage.default_key_name_for_identity(&identity).ok()
    }

    /// Queue an outcome for the next `verify_data` call.
    pub fn push_data_outcome(&mut self, outcome: Outcome) {
        self.data_outcomes.push_back(outcome);
    }

    pub fn set_data_outcome(&mut self, outcome: Outcome) {
        self.default_data_outcome = outcome;
    }

    /// Queue an outcome for the next `verify_request` call.
    pub fn push_request_outcome(&mut self, outcome: Outcome) {
        self.request_outcomes.push_back(outcome);
    }

    pub fn set_request_outcome(&mut self, outcome: Outcome) {
        self.default_request_outcome = outcome;
    }

    /// `(request name, certificate name)` for every command interest made.
    pub fn signed_commands(&self) -> &[(Name, Name)] {
        &self.signed
    }

    /// Names of requests passed to `verify_request`.
    pub fn verified_requests(&self) -> &[Name] {
        &self.verified_requests
    }
}

impl Default for NullSignatureService {
    fn default() -> Self {
        Self::new()
    }
}

impl SignatureService for NullSignatureService {
    fn storage(&self) -> &dyn IdentityStorage {
        &self.storage
    }

    fn storage_mut(&mut self) -> &mut dyn IdentityStorage {
        &mut self.storage
    }

    fn default_certificate_name(&self) -> Result<Name, SecurityError> {
        let identity = self.storage.default_identity()?;
        self.storage.default_certificate_name_for_identity(&identity)
    }

    fn sign_data(&self, data: &mut Data, certificate_name: &Name) -> Result<(), SecurityError> {
        data.signature = Some(fake_signature(certificate_name.clone()));
        Ok(())
    }

    fn verify_data(&mut self, data: &Data) -> Result<Verification, SecurityError> {
        let outcome = self
            .data_outcomes
            .pop_front()
            .unwrap_or(self.default_data_outcome);
        outcome.result(&data.name)
    }

    fn verify_request(&mut self, interest: &Interest) -> Result<Verification, SecurityError> {
        self.verified_requests.push(interest.name.clone());
        let outcome = self
            .request_outcomes
            .pop_front()
            .unwrap_or(self.default_request_outcome);
        outcome.result(&interest.name)
    }

    fn make_command_interest(&mut self, interest: &mut Interest) -> Result<(), SecurityError> {
        let certificate_name = self.default_certificate_name()?;
        self.command_counter += 1;
        let info = SignatureInfo {
            key_type: KeyType::Ed25519,
            key_locator: certificate_name.clone(),
        };
        interest.name = interest
            .name
            .clone()
            .append(Timestamp::from_millis(self.command_counter).to_be_bytes().to_vec())
            .append(self.command_counter.to_be_bytes().to_vec())
            .append(info.encode()?)
            .append(vec![0u8; 64]);
        self.signed.push((interest.name.clone(), certificate_name));
        Ok(())
    }
}

fn fake_signature(key_locator: Name) -> SignatureBlock {
    SignatureBlock {
        info: SignatureInfo {
            key_type: KeyType::Ed25519,
            key_locator,
        },
        value: Signature([0u8; 64]),
    }
}

/// A version-1 certificate for `key_name` whose signature names `signer`,
/// or the certificate itself when `signer` is `None`.
///
/// Identities created by [`NullSignatureService`] start with a version-0
/// self-signed certificate, so this one can be installed next to it.
pub fn certificate_signed_by(
    key_name: &Name,
    public_key: PublicKey,
    signer: Option<&Name>,
) -> IdentityCertificate {
    certificate_with_version(key_name, public_key, signer, "1")
}

/// Like [`certificate_signed_by`], with an explicit version component.
pub fn certificate_with_version(
    key_name: &Name,
    public_key: PublicKey,
    signer: Option<&Name>,
    version: &str,
) -> IdentityCertificate {
    let mut data = CertificateBuilder::new(key_name.clone(), KeyType::Ed25519, public_key)
        .version(version)
        .build_unsigned()
        .unwrap_or_else(|e| panic!("cannot build certificate for {key_name}: {e}"));
    let locator = signer.cloned().unwrap_or_else(|| data.name.clone());
    data.signature = Some(fake_signature(locator));
    IdentityCertificate::from_data(data)
        .unwrap_or_else(|e| panic!("built certificate does not decode: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(uri: &str) -> Name {
        Name::from_uri(uri).unwrap()
    }

    #[test]
    fn identity_has_self_signed_default_certificate() {
        let service = NullSignatureService::with_identity(&name("/home/pi"));
        let cert_name = service.default_certificate_name().unwrap();
        assert_eq!(cert_name, name("/home/pi/KEY/ksk-null/ID-CERT/0"));
        let cert = service.storage().certificate(&cert_name).unwrap();
        assert_eq!(cert.signer(), Some(&cert_name));
        assert_eq!(service.device_key_name(), Some(name("/home/pi/ksk-null")));
    }

    #[test]
    fn queued_outcomes_come_before_default() {
        let mut service = NullSignatureService::new();
        service.push_request_outcome(Outcome::Rejected);
        service.set_request_outcome(Outcome::Error);
        let interest = Interest::new(name("/home/pi/reboot"));
        assert!(!service.verify_request(&interest).unwrap().is_verified());
        assert!(service.verify_request(&interest).is_err());
        assert_eq!(service.verified_requests().len(), 2);
    }

    #[test]
    fn command_interests_are_unique() {
        let mut service = NullSignatureService::with_identity(&name("/home/pi"));
        let mut a = Interest::new(name("/home/controller/updateCapabilities"));
        let mut b = a.clone();
        service.make_command_interest(&mut a).unwrap();
        service.make_command_interest(&mut b).unwrap();
        assert_ne!(a.name, b.name);
        assert_eq!(a.name.len(), 3 + 4);
    }
}
