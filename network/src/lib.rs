//! Transport layer of the field node.
//!
//! The node talks to a local forwarder through a [`Face`]. Every outcome of
//! a face operation (a registered prefix, an incoming request, a response or
//! a timeout) is posted as a [`FaceEvent`] on the channel given to the face,
//! so all node state stays in one task.

pub mod codec;
pub mod error;
pub mod face;
pub mod udp;

pub use codec::Packet;
pub use error::NetworkError;
pub use face::{Face, FaceEvent, FaceEventSender};
pub use udp::UdpFace;
