//! Nullable face: records traffic instead of sending it.

use std::sync::{Arc, Mutex, MutexGuard};

use fieldnode_network::{Face, NetworkError};
use fieldnode_types::{Data, Interest, Name};

#[derive(Default)]
struct Recorded {
    registered: Vec<Name>,
    expressed: Vec<Interest>,
    sent: Vec<Vec<u8>>,
    closed: bool,
}

/// A face that records operations instead of performing them.
///
/// Clones share the same recordings, so a test can keep a handle after
/// moving the face into a node.
#[derive(Clone, Default)]
pub struct NullFace {
    recorded: Arc<Mutex<Recorded>>,
}

impl NullFace {
    pub fn new() -> Self {
        Self::default()
    }

    fn recorded(&self) -> MutexGuard<'_, Recorded> {
        // A poisoned lock only means another test thread panicked.
        self.recorded.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Prefixes passed to `register_prefix`, in call order.
    pub fn registered_prefixes(&self) -> Vec<Name> {
        self.recorded().registered.clone()
    }

    /// Interests expressed so far.
    pub fn expressed(&self) -> Vec<Interest> {
        self.recorded().expressed.clone()
    }

    /// Names of expressed interests that start with `prefix`.
    pub fn expressed_under(&self, prefix: &Name) -> Vec<Name> {
        self.recorded()
            .expressed
            .iter()
            .filter(|interest| prefix.is_prefix_of(&interest.name))
            .map(|interest| interest.name.clone())
            .collect()
    }

    /// Raw packets sent so far.
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.recorded().sent.clone()
    }

    /// Sent packets decoded as responses; undecodable packets are skipped.
    pub fn sent_data(&self) -> Vec<Data> {
        self.recorded()
            .sent
            .iter()
            .filter_map(|bytes| Data::wire_decode(bytes).ok())
            .collect()
    }

    pub fn is_closed(&self) -> bool {
        self.recorded().closed
    }

    /// Clear all recordings.
    pub fn reset(&self) {
        let mut recorded = self.recorded();
        recorded.registered.clear();
        recorded.expressed.clear();
        recorded.sent.clear();
    }
}

impl Face for NullFace {
    fn register_prefix(&mut self, prefix: &Name) -> Result<(), NetworkError> {
        self.recorded().registered.push(prefix.clone());
        Ok(())
    }

    fn express_interest(&mut self, interest: Interest) -> Result<(), NetworkError> {
        self.recorded().expressed.push(interest);
        Ok(())
    }

    fn send(&mut self, wire: &[u8]) -> Result<(), NetworkError> {
        let mut recorded = self.recorded();
        if recorded.closed {
            return Err(NetworkError::Closed);
        }
        recorded.sent.push(wire.to_vec());
        Ok(())
    }

    fn shutdown(&mut self) {
        self.recorded().closed = true;
    }
}
