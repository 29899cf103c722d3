//! Identity storage: identities, their public keys, and certificates.
//!
//! [`MemoryIdentityStorage`] keeps everything in ordered maps.
//! [`FileIdentityStorage`] wraps it and rewrites a bincode snapshot after
//! every mutation, so accepted certificates survive a restart.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use fieldnode_types::certificate::identity_from_key_name;
use fieldnode_types::{IdentityCertificate, KeyType, Name, PublicKey};

use crate::SecurityError;

/// Storage for identities, public keys and certificates.
pub trait IdentityStorage {
    fn does_identity_exist(&self, identity: &Name) -> bool;

    /// Register a public key. The identity is created if missing, and the
    /// first key of an identity becomes its default.
    fn add_key(
        &mut self,
        key_name: &Name,
        key_type: KeyType,
        public_key: &PublicKey,
    ) -> Result<(), SecurityError>;

    fn default_key_name_for_identity(&self, identity: &Name) -> Result<Name, SecurityError>;

    fn key_type(&self, key_name: &Name) -> Result<KeyType, SecurityError>;

    fn public_key(&self, key_name: &Name) -> Result<PublicKey, SecurityError>;

    /// The certificate stored under exactly this name.
    fn certificate(&self, name: &Name) -> Option<IdentityCertificate>;

    fn certificate_names(&self) -> Vec<Name>;

    /// Store a certificate. Fails with [`SecurityError::DuplicateCertificate`]
    /// if one with the same name is already present.
    fn add_certificate(&mut self, certificate: &IdentityCertificate) -> Result<(), SecurityError>;

    fn set_default_certificate_for_key(&mut self, certificate_name: &Name)
        -> Result<(), SecurityError>;

    fn default_certificate_name_for_key(&self, key_name: &Name) -> Result<Name, SecurityError>;

    fn set_default_identity(&mut self, identity: &Name) -> Result<(), SecurityError>;

    fn default_identity(&self) -> Result<Name, SecurityError>;

    fn default_certificate_name_for_identity(
        &self,
        identity: &Name,
    ) -> Result<Name, SecurityError> {
        let key_name = self.default_key_name_for_identity(identity)?;
        self.default_certificate_name_for_key(&key_name)
    }

    /// Resolve a key locator: an exact certificate name, or a certificate
    /// name prefix such as one without its version component.
    fn find_certificate(&self, locator: &Name) -> Option<IdentityCertificate> {
        if let Some(certificate) = self.certificate(locator) {
            return Some(certificate);
        }
        self.certificate_names()
            .into_iter()
            .find(|name| locator.is_prefix_of(name))
            .and_then(|name| self.certificate(&name))
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct IdentityRecord {
    default_key: Option<Name>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct KeyRecord {
    key_type: KeyType,
    public_key: PublicKey,
    default_certificate: Option<Name>,
}

/// In-memory identity storage.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MemoryIdentityStorage {
    identities: BTreeMap<Name, IdentityRecord>,
    keys: BTreeMap<Name, KeyRecord>,
    certificates: BTreeMap<Name, IdentityCertificate>,
    default_identity: Option<Name>,
}

impl MemoryIdentityStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn key_record(&self, key_name: &Name) -> Result<&KeyRecord, SecurityError> {
        self.keys
            .get(key_name)
            .ok_or_else(|| SecurityError::KeyNotFound(key_name.clone()))
    }
}

impl IdentityStorage for MemoryIdentityStorage {
    fn does_identity_exist(&self, identity: &Name) -> bool {
        self.identities.contains_key(identity)
    }

    fn add_key(
        &mut self,
        key_name: &Name,
        key_type: KeyType,
        public_key: &PublicKey,
    ) -> Result<(), SecurityError> {
        let identity = identity_from_key_name(key_name);
        let record = self.identities.entry(identity).or_default();
        if record.default_key.is_none() {
            record.default_key = Some(key_name.clone());
        }
        self.keys.insert(
            key_name.clone(),
            KeyRecord {
                key_type,
                public_key: public_key.clone(),
                default_certificate: None,
            },
        );
        Ok(())
    }

    fn default_key_name_for_identity(&self, identity: &Name) -> Result<Name, SecurityError> {
        self.identities
            .get(identity)
            .ok_or_else(|| SecurityError::IdentityNotFound(identity.clone()))?
            .default_key
            .clone()
            .ok_or(SecurityError::NoDefault("key"))
    }

    fn key_type(&self, key_name: &Name) -> Result<KeyType, SecurityError> {
        Ok(self.key_record(key_name)?.key_type)
    }

    fn public_key(&self, key_name: &Name) -> Result<PublicKey, SecurityError> {
        Ok(self.key_record(key_name)?.public_key.clone())
    }

    fn certificate(&self, name: &Name) -> Option<IdentityCertificate> {
        self.certificates.get(name).cloned()
    }

    fn certificate_names(&self) -> Vec<Name> {
        self.certificates.keys().cloned().collect()
    }

    fn add_certificate(&mut self, certificate: &IdentityCertificate) -> Result<(), SecurityError> {
        if self.certificates.contains_key(certificate.name()) {
            return Err(SecurityError::DuplicateCertificate(certificate.name().clone()));
        }
        self.certificates
            .insert(certificate.name().clone(), certificate.clone());
        Ok(())
    }

    fn set_default_certificate_for_key(
        &mut self,
        certificate_name: &Name,
    ) -> Result<(), SecurityError> {
        let key_name = self
            .certificates
            .get(certificate_name)
            .ok_or_else(|| SecurityError::CertificateNotFound(certificate_name.clone()))?
            .key_name()
            .clone();
        let record = self
            .keys
            .get_mut(&key_name)
            .ok_or(SecurityError::KeyNotFound(key_name))?;
        record.default_certificate = Some(certificate_name.clone());
        Ok(())
    }

    fn default_certificate_name_for_key(&self, key_name: &Name) -> Result<Name, SecurityError> {
        self.key_record(key_name)?
            .default_certificate
            .clone()
            .ok_or(SecurityError::NoDefault("certificate"))
    }

    fn set_default_identity(&mut self, identity: &Name) -> Result<(), SecurityError> {
        self.identities.entry(identity.clone()).or_default();
        self.default_identity = Some(identity.clone());
        Ok(())
    }

    fn default_identity(&self) -> Result<Name, SecurityError> {
        self.default_identity
            .clone()
            .ok_or(SecurityError::NoDefault("identity"))
    }
}

/// Identity storage persisted to a single snapshot file.
pub struct FileIdentityStorage {
    inner: MemoryIdentityStorage,
    path: PathBuf,
}

impl FileIdentityStorage {
    /// Open the snapshot at `path`, starting empty if it does not exist yet.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SecurityError> {
        let path = path.as_ref().to_path_buf();
        let inner = if path.exists() {
            let bytes = std::fs::read(&path)?;
            bincode::deserialize(&bytes).map_err(|e| SecurityError::Persistence(e.to_string()))?
        } else {
            MemoryIdentityStorage::new()
        };
        Ok(Self { inner, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> Result<(), SecurityError> {
        let bytes =
            bincode::serialize(&self.inner).map_err(|e| SecurityError::Persistence(e.to_string()))?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl IdentityStorage for FileIdentityStorage {
    fn does_identity_exist(&self, identity: &Name) -> bool {
        self.inner.does_identity_exist(identity)
    }

    fn add_key(
        &mut self,
        key_name: &Name,
        key_type: KeyType,
        public_key: &PublicKey,
    ) -> Result<(), SecurityError> {
        self.inner.add_key(key_name, key_type, public_key)?;
        self.persist()
    }

    fn default_key_name_for_identity(&self, identity: &Name) -> Result<Name, SecurityError> {
        self.inner.default_key_name_for_identity(identity)
    }

    fn key_type(&self, key_name: &Name) -> Result<KeyType, SecurityError> {
        self.inner.key_type(key_name)
    }

    fn public_key(&self, key_name: &Name) -> Result<PublicKey, SecurityError> {
        self.inner.public_key(key_name)
    }

    fn certificate(&self, name: &Name) -> Option<IdentityCertificate> {
        self.inner.certificate(name)
    }

    fn certificate_names(&self) -> Vec<Name> {
        self.inner.certificate_names()
    }

    fn add_certificate(&mut self, certificate: &IdentityCertificate) -> Result<(), SecurityError> {
        self.inner.add_certificate(certificate)?;
        self.persist()
    }

    fn set_default_certificate_for_key(
        &mut self,
        certificate_name: &Name,
    ) -> Result<(), SecurityError> {
        self.inner.set_default_certificate_for_key(certificate_name)?;
        self.persist()
    }

    fn default_certificate_name_for_key(&self, key_name: &Name) -> Result<Name, SecurityError> {
        self.inner.default_certificate_name_for_key(key_name)
    }

    fn set_default_identity(&mut self, identity: &Name) -> Result<(), SecurityError> {
        self.inner.set_default_identity(identity)?;
        self.persist()
    }

    fn default_identity(&self) -> Result<Name, SecurityError> {
        self.inner.default_identity()
    }
}
