//! Nullable infrastructure for deterministic testing.
//!
//! The node reaches the outside world through two seams: the forwarder
//! [`Face`](fieldnode_network::Face) and the
//! [`SignatureService`](fieldnode_security::SignatureService). This crate
//! provides implementations of both that:
//! - Record everything the node does
//! - Return outcomes scripted by the test
//! - Never touch the network or the filesystem
//!
//! Usage: build the node with nullables, feed it events, assert on the
//! recordings.

pub mod face;
pub mod signature;

pub use face::NullFace;
pub use signature::{
    certificate_signed_by, certificate_with_version, NullSignatureService, Outcome, NULL_PUBLIC_KEY,
};
