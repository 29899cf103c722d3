//! Security layer of the field node.
//!
//! - [`IdentityStorage`]: identities, public keys and accepted certificates
//! - [`PrivateKeyStorage`]: private key material
//! - [`TrustPolicy`]: the environment prefix and the controller that anchors trust
//! - [`KeyChain`]: the [`SignatureService`] that signs outgoing packets and
//!   verifies incoming ones against the trust policy

pub mod anchors;
pub mod certificate_builder;
pub mod command_interest;
pub mod error;
pub mod identity_storage;
pub mod keychain;
pub mod policy;
pub mod private_key_storage;
pub mod service;

pub use anchors::{load_certificate_directory, write_certificate_file};
pub use certificate_builder::CertificateBuilder;
pub use error::SecurityError;
pub use identity_storage::{FileIdentityStorage, IdentityStorage, MemoryIdentityStorage};
pub use keychain::KeyChain;
pub use policy::TrustPolicy;
pub use private_key_storage::{FilePrivateKeyStorage, MemoryPrivateKeyStorage, PrivateKeyStorage};
pub use service::{SignatureService, Verification};
