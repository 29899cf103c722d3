//! Cryptographic primitives for the field node.
//!
//! - **Ed25519** for signing and signature verification
//! - **SHA-256** key ids derived from public keys
//! - Random nonces for signed command requests

pub mod keys;
pub mod nonce;
pub mod sign;

pub use keys::{
    generate_keypair, key_id, keypair_from_private, keypair_from_seed, public_from_private,
};
pub use nonce::random_nonce;
pub use sign::{sign_message, verify_signature};
