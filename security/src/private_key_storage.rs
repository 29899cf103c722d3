//! Private key storage.
//!
//! [`FilePrivateKeyStorage`] keeps one file per key in a directory. The file
//! is named after the SHA-256 of the key name and holds the hex-encoded
//! Ed25519 seed.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use fieldnode_crypto::sign_message;
use fieldnode_types::{Name, PrivateKey, Signature};

use crate::SecurityError;

/// Storage for private keys; signs on behalf of a key name.
pub trait PrivateKeyStorage {
    fn add_private_key(&mut self, key_name: &Name, key: PrivateKey) -> Result<(), SecurityError>;

    fn has_key(&self, key_name: &Name) -> bool;

    fn sign(&self, key_name: &Name, message: &[u8]) -> Result<Signature, SecurityError>;
}

/// In-memory private key storage.
#[derive(Default)]
pub struct MemoryPrivateKeyStorage {
    keys: HashMap<Name, PrivateKey>,
}

impl MemoryPrivateKeyStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PrivateKeyStorage for MemoryPrivateKeyStorage {
    fn add_private_key(&mut self, key_name: &Name, key: PrivateKey) -> Result<(), SecurityError> {
        self.keys.insert(key_name.clone(), key);
        Ok(())
    }

    fn has_key(&self, key_name: &Name) -> bool {
        self.keys.contains_key(key_name)
    }

    fn sign(&self, key_name: &Name, message: &[u8]) -> Result<Signature, SecurityError> {
        let key = self
            .keys
            .get(key_name)
            .ok_or_else(|| SecurityError::PrivateKeyNotFound(key_name.clone()))?;
        Ok(sign_message(message, key))
    }
}

/// Private keys kept as individual files under a directory.
pub struct FilePrivateKeyStorage {
    directory: PathBuf,
}

impl FilePrivateKeyStorage {
    pub fn open(directory: impl AsRef<Path>) -> Result<Self, SecurityError> {
        let directory = directory.as_ref().to_path_buf();
        std::fs::create_dir_all(&directory)?;
        Ok(Self { directory })
    }

    fn key_path(&self, key_name: &Name) -> PathBuf {
        let digest = Sha256::digest(key_name.to_uri().as_bytes());
        self.directory.join(format!("{}.pri", hex::encode(digest)))
    }

    fn load(&self, key_name: &Name) -> Result<PrivateKey, SecurityError> {
        let path = self.key_path(key_name);
        if !path.exists() {
            return Err(SecurityError::PrivateKeyNotFound(key_name.clone()));
        }
        let encoded = std::fs::read_to_string(&path)?;
        let bytes = hex::decode(encoded.trim())
            .map_err(|e| SecurityError::Persistence(format!("{}: {e}", path.display())))?;
        let seed: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
            SecurityError::Persistence(format!("{}: expected 32 key bytes", path.display()))
        })?;
        Ok(PrivateKey(seed))
    }
}

impl PrivateKeyStorage for FilePrivateKeyStorage {
    fn add_private_key(&mut self, key_name: &Name, key: PrivateKey) -> Result<(), SecurityError> {
        let path = self.key_path(key_name);
        std::fs::write(&path, hex::encode(key.0))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))?;
        }
        Ok(())
    }

    fn has_key(&self, key_name: &Name) -> bool {
        self.key_path(key_name).exists()
    }

    fn sign(&self, key_name: &Name, message: &[u8]) -> Result<Signature, SecurityError> {
        let key = self.load(key_name)?;
        Ok(sign_message(message, &key))
    }
}
