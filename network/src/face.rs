use tokio::sync::mpsc;

use fieldnode_types::{Data, Interest, Name};

use crate::NetworkError;

/// Outcome of a face operation, or traffic arriving from the forwarder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FaceEvent {
    PrefixRegistered(Name),
    RegisterFailed(Name),
    /// A request under a registered prefix.
    Interest(Interest),
    /// Response to a request expressed through this face.
    Data { interest_name: Name, data: Data },
    /// No response arrived within the request lifetime.
    Timeout { interest_name: Name },
}

pub type FaceEventSender = mpsc::UnboundedSender<FaceEvent>;

/// Link to the local forwarder.
///
/// Calls return once the operation has been handed to the transport; their
/// results arrive later as [`FaceEvent`]s. For every expressed request
/// exactly one of `Data` or `Timeout` is delivered.
pub trait Face: Send {
    fn register_prefix(&mut self, prefix: &Name) -> Result<(), NetworkError>;

    fn express_interest(&mut self, interest: Interest) -> Result<(), NetworkError>;

    /// Send an encoded response packet.
    fn send(&mut self, wire: &[u8]) -> Result<(), NetworkError>;

    fn put_data(&mut self, data: &Data) -> Result<(), NetworkError> {
        self.send(&data.wire_encode()?)
    }

    fn shutdown(&mut self);
}
