//! The node's signature service.
//!
//! A [`KeyChain`] combines identity storage, private key storage and a
//! [`TrustPolicy`]. Verification walks the certificate chain of a packet's
//! signer until it reaches a trust anchor; the anchor must belong to the
//! trust root, and every certificate on the way must be inside its validity
//! period.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use fieldnode_crypto::{generate_keypair, key_id, random_nonce, verify_signature};
use fieldnode_types::certificate::key_name_from_certificate;
use fieldnode_types::{
    Data, IdentityCertificate, Interest, KeyType, Name, SignatureBlock, SignatureInfo, Timestamp,
};

use crate::command_interest::{self, SignedCommand};
use crate::{
    load_certificate_directory, CertificateBuilder, IdentityStorage, PrivateKeyStorage,
    SecurityError, SignatureService, TrustPolicy, Verification,
};

/// Longest certificate chain followed before giving up.
pub const MAX_CHAIN_DEPTH: usize = 5;

/// How far a signer's first command timestamp may be from local time.
pub const TIMESTAMP_GRACE_MS: u64 = 60_000;

pub struct KeyChain<S: IdentityStorage, P: PrivateKeyStorage> {
    identities: S,
    keys: P,
    policy: TrustPolicy,
    anchors: BTreeMap<Name, IdentityCertificate>,
    anchor_directory: Option<PathBuf>,
    /// Last accepted command timestamp per signing key.
    last_command: HashMap<Name, Timestamp>,
    last_issued: Timestamp,
}

impl<S: IdentityStorage, P: PrivateKeyStorage> KeyChain<S, P> {
    pub fn new(identities: S, keys: P, policy: TrustPolicy) -> Self {
        Self {
            identities,
            keys,
            policy,
            anchors: BTreeMap::new(),
            anchor_directory: None,
            last_command: HashMap::new(),
            last_issued: Timestamp::EPOCH,
        }
    }

    pub fn policy(&self) -> &TrustPolicy {
        &self.policy
    }

    pub fn add_trust_anchor(&mut self, certificate: IdentityCertificate) {
        tracing::debug!(anchor = %certificate.name(), "trust anchor added");
        self.anchors.insert(certificate.name().clone(), certificate);
    }

    /// Replace all trust anchors.
    pub fn set_trust_anchors(
        &mut self,
        certificates: impl IntoIterator<Item = IdentityCertificate>,
    ) {
        self.anchors = certificates
            .into_iter()
            .map(|certificate| (certificate.name().clone(), certificate))
            .collect();
    }

    /// Replace the trust anchors with the certificates found in `directory`.
    pub fn load_trust_anchors(&mut self, directory: &Path) -> Result<usize, SecurityError> {
        let certificates = load_certificate_directory(directory)?;
        let count = certificates.len();
        self.set_trust_anchors(certificates);
        tracing::debug!(directory = %directory.display(), count, "trust anchors loaded");
        Ok(count)
    }

    /// Remember `directory` as the anchor source for
    /// [`SignatureService::refresh_trust_anchors`].
    pub fn with_anchor_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.anchor_directory = Some(directory.into());
        self
    }

    pub fn trust_anchor_names(&self) -> Vec<Name> {
        self.anchors.keys().cloned().collect()
    }

    /// Make `identity` the default identity, creating a key and a self-signed
    /// certificate for it when it has none. Returns the default certificate
    /// name.
    pub fn ensure_identity(&mut self, identity: &Name) -> Result<Name, SecurityError> {
        if let Ok(certificate_name) = self.usable_certificate(identity) {
            self.identities.set_default_identity(identity)?;
            return Ok(certificate_name);
        }

        let keypair = generate_keypair();
        let key_name = identity.clone().append(key_id(&keypair.public));
        self.keys.add_private_key(&key_name, keypair.private)?;
        self.identities
            .add_key(&key_name, KeyType::Ed25519, &keypair.public)?;

        let mut data = CertificateBuilder::new(key_name.clone(), KeyType::Ed25519, keypair.public)
            .build_unsigned()?;
        let info = SignatureInfo {
            key_type: KeyType::Ed25519,
            key_locator: data.name.clone(),
        };
        let value = self.keys.sign(&key_name, &data.signed_portion(&info)?)?;
        data.signature = Some(SignatureBlock { info, value });

        let certificate = IdentityCertificate::from_data(data)?;
        self.identities.add_certificate(&certificate)?;
        self.identities
            .set_default_certificate_for_key(certificate.name())?;
        self.identities.set_default_identity(identity)?;
        tracing::info!(key = %key_name, certificate = %certificate.name(), "created identity");
        Ok(certificate.name().clone())
    }

    fn usable_certificate(&self, identity: &Name) -> Result<Name, SecurityError> {
        let key_name = self.identities.default_key_name_for_identity(identity)?;
        if !self.keys.has_key(&key_name) {
            return Err(SecurityError::PrivateKeyNotFound(key_name));
        }
        self.identities.default_certificate_name_for_key(&key_name)
    }

    /// Sign a prepared certificate packet as `issuer`.
    pub fn issue_certificate(
        &self,
        unsigned: Data,
        issuer: &Name,
    ) -> Result<IdentityCertificate, SecurityError> {
        let mut data = unsigned;
        self.sign_data(&mut data, issuer)?;
        Ok(IdentityCertificate::from_data(data)?)
    }

    fn resolve_signer(&self, locator: &Name) -> Option<(IdentityCertificate, bool)> {
        let anchor = self.anchors.get(locator).cloned().or_else(|| {
            self.anchors
                .iter()
                .find(|(name, _)| locator.is_prefix_of(name))
                .map(|(_, certificate)| certificate.clone())
        });
        match anchor {
            Some(certificate) => Some((certificate, true)),
            None => self
                .identities
                .find_certificate(locator)
                .map(|certificate| (certificate, false)),
        }
    }

    fn verify_chain(
        &self,
        signed_portion: Vec<u8>,
        block: SignatureBlock,
        now: Timestamp,
    ) -> Result<Verification, SecurityError> {
        let mut portion = signed_portion;
        let mut block = block;
        for _ in 0..MAX_CHAIN_DEPTH {
            let locator = &block.info.key_locator;
            let Some((signer, is_anchor)) = self.resolve_signer(locator) else {
                return Ok(Verification::Rejected(format!("unknown signer {locator}")));
            };
            if !self.policy.is_within_trust_domain(signer.name()) {
                return Ok(Verification::Rejected(format!(
                    "signer {} is outside {}",
                    signer.name(),
                    self.policy.environment_prefix()
                )));
            }
            if !signer.is_valid_at(now) {
                return Ok(Verification::Rejected(format!(
                    "certificate {} is outside its validity period",
                    signer.name()
                )));
            }
            if !verify_signature(&portion, &block.value, signer.public_key()) {
                return Ok(Verification::Rejected(format!(
                    "bad signature by {}",
                    signer.name()
                )));
            }
            if is_anchor {
                if self.policy.signer_is_trust_root(signer.name()) {
                    return Ok(Verification::Verified);
                }
                return Ok(Verification::Rejected(format!(
                    "anchor {} is not the trust root",
                    signer.name()
                )));
            }

            let Some(next) = signer.data().signature.clone() else {
                return Ok(Verification::Rejected(format!(
                    "certificate {} is unsigned",
                    signer.name()
                )));
            };
            let locator_key = key_name_from_certificate(&next.info.key_locator);
            if locator_key.as_ref() == Some(signer.key_name()) {
                return Ok(Verification::Rejected(format!(
                    "self-signed certificate {} is not a trust anchor",
                    signer.name()
                )));
            }
            portion = signer.data().signed_portion(&next.info)?;
            block = next;
        }
        Ok(Verification::Rejected("certificate chain too long".into()))
    }

    fn check_command_timestamp(
        &self,
        signer_key: &Name,
        command: &SignedCommand,
        now: Timestamp,
    ) -> Option<String> {
        match self.last_command.get(signer_key) {
            Some(last) if command.timestamp <= *last => Some(format!(
                "command timestamp {} not after {last}",
                command.timestamp
            )),
            Some(_) => None,
            None if command.timestamp.abs_diff(now) > TIMESTAMP_GRACE_MS => Some(format!(
                "command timestamp {} too far from local time {now}",
                command.timestamp
            )),
            None => None,
        }
    }

    fn next_timestamp(&mut self) -> Timestamp {
        let now = Timestamp::now();
        let next = if now > self.last_issued {
            now
        } else {
            self.last_issued.saturating_add_millis(1)
        };
        self.last_issued = next;
        next
    }
}

impl<S: IdentityStorage, P: PrivateKeyStorage> SignatureService for KeyChain<S, P> {
    fn storage(&self) -> &dyn IdentityStorage {
        &self.identities
    }

    fn storage_mut(&mut self) -> &mut dyn IdentityStorage {
        &mut self.identities
    }

    fn default_certificate_name(&self) -> Result<Name, SecurityError> {
        let identity = self.identities.default_identity()?;
        self.identities.default_certificate_name_for_identity(&identity)
    }

    fn sign_data(&self, data: &mut Data, certificate_name: &Name) -> Result<(), SecurityError> {
        let certificate = self
            .identities
            .certificate(certificate_name)
            .ok_or_else(|| SecurityError::CertificateNotFound(certificate_name.clone()))?;
        let info = SignatureInfo {
            key_type: certificate.key_type(),
            key_locator: certificate_name.clone(),
        };
        let value = self
            .keys
            .sign(certificate.key_name(), &data.signed_portion(&info)?)?;
        data.signature = Some(SignatureBlock { info, value });
        Ok(())
    }

    fn verify_data(&mut self, data: &Data) -> Result<Verification, SecurityError> {
        let Some(block) = data.signature.clone() else {
            return Ok(Verification::Rejected(format!("{} is unsigned", data.name)));
        };
        let portion = data.signed_portion(&block.info)?;
        self.verify_chain(portion, block, Timestamp::now())
    }

    fn verify_request(&mut self, interest: &Interest) -> Result<Verification, SecurityError> {
        let command = command_interest::parse(&interest.name)?;
        let now = Timestamp::now();
        let signer_key = key_name_from_certificate(&command.info.key_locator)
            .unwrap_or_else(|| command.info.key_locator.clone());

        if let Some(reason) = self.check_command_timestamp(&signer_key, &command, now) {
            return Ok(Verification::Rejected(reason));
        }
        let block = SignatureBlock {
            info: command.info.clone(),
            value: command.value.clone(),
        };
        let outcome = self.verify_chain(command.signed_portion.clone(), block, now)?;
        if outcome.is_verified() {
            self.last_command.insert(signer_key, command.timestamp);
        }
        Ok(outcome)
    }

    fn make_command_interest(&mut self, interest: &mut Interest) -> Result<(), SecurityError> {
        let certificate_name = self.default_certificate_name()?;
        let certificate = self
            .identities
            .certificate(&certificate_name)
            .ok_or_else(|| SecurityError::CertificateNotFound(certificate_name.clone()))?;
        let info = SignatureInfo {
            key_type: certificate.key_type(),
            key_locator: certificate_name,
        };
        let unsigned = interest
            .name
            .clone()
            .append(self.next_timestamp().to_be_bytes().to_vec())
            .append(random_nonce().to_vec())
            .append(info.encode()?);
        let value = self.keys.sign(
            certificate.key_name(),
            &command_interest::signed_portion(&unsigned)?,
        )?;
        interest.name = unsigned.append(value.as_bytes().to_vec());
        Ok(())
    }

    fn refresh_trust_anchors(&mut self) -> Result<usize, SecurityError> {
        match self.anchor_directory.clone() {
            Some(directory) => self.load_trust_anchors(&directory),
            None => Ok(self.anchors.len()),
        }
    }
}
