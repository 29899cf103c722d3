//! UDP face to a local forwarder.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use fieldnode_types::{Interest, Name};

use crate::codec::{frame_data, MAX_PACKET_SIZE};
use crate::{Face, FaceEvent, FaceEventSender, NetworkError, Packet};

/// Prefix of the forwarder's registration command.
pub const REGISTER_COMMAND_PREFIX: &str = "/localhost/nfd/rib/register";

#[derive(Clone, Debug)]
enum PendingKind {
    Request,
    Registration(Name),
}

#[derive(Clone, Debug)]
struct PendingInterest {
    id: u64,
    kind: PendingKind,
}

/// Requests awaiting a response. Whoever removes an entry first (the
/// receive task or the timeout task) reports the outcome.
#[derive(Default)]
struct PendingTable {
    next_id: u64,
    entries: HashMap<Name, PendingInterest>,
    registered: Vec<Name>,
}

struct Tasks {
    receiver: JoinHandle<()>,
    writer: JoinHandle<()>,
}

pub struct UdpFace {
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    events: FaceEventSender,
    pending: Arc<Mutex<PendingTable>>,
    tasks: Option<Tasks>,
}

impl UdpFace {
    /// Connect to the forwarder at `forwarder` and start receiving.
    pub async fn connect(
        forwarder: SocketAddr,
        events: FaceEventSender,
    ) -> Result<Self, NetworkError> {
        let bind: SocketAddr = if forwarder.is_ipv4() {
            SocketAddr::from(([0, 0, 0, 0], 0))
        } else {
            SocketAddr::from(([0u16; 8], 0))
        };
        let socket = UdpSocket::bind(bind)
            .await
            .map_err(|e| NetworkError::ConnectionFailed(format!("bind failed: {e}")))?;
        socket.connect(forwarder).await.map_err(|e| {
            NetworkError::ConnectionFailed(format!("connect to {forwarder} failed: {e}"))
        })?;
        let socket = Arc::new(socket);
        let pending = Arc::new(Mutex::new(PendingTable::default()));

        let receiver = tokio::spawn(receive_loop(
            Arc::clone(&socket),
            Arc::clone(&pending),
            events.clone(),
        ));
        let (outbound, queue) = mpsc::unbounded_channel();
        let writer = tokio::spawn(send_loop(socket, queue));
        tracing::info!(%forwarder, "connected to forwarder");

        Ok(Self {
            outbound,
            events,
            pending,
            tasks: Some(Tasks { receiver, writer }),
        })
    }

    /// Queue a datagram for the writer task.
    fn transmit(&self, bytes: Vec<u8>) -> Result<(), NetworkError> {
        if self.tasks.is_none() {
            return Err(NetworkError::Closed);
        }
        self.outbound.send(bytes).map_err(|_| NetworkError::Closed)
    }

    fn track(&self, interest: &Interest, kind: PendingKind) -> Result<(), NetworkError> {
        let id = {
            let mut table = self.pending.lock().map_err(|_| NetworkError::Closed)?;
            table.next_id += 1;
            let id = table.next_id;
            table
                .entries
                .insert(interest.name.clone(), PendingInterest { id, kind });
            id
        };

        let pending = Arc::clone(&self.pending);
        let events = self.events.clone();
        let name = interest.name.clone();
        let lifetime = interest.lifetime();
        tokio::spawn(async move {
            tokio::time::sleep(lifetime).await;
            let expired = match pending.lock() {
                Ok(mut table) => match table.entries.get(&name) {
                    Some(entry) if entry.id == id => table.entries.remove(&name),
                    _ => None,
                },
                Err(_) => None,
            };
            if let Some(entry) = expired {
                let event = match entry.kind {
                    PendingKind::Request => FaceEvent::Timeout { interest_name: name },
                    PendingKind::Registration(prefix) => FaceEvent::RegisterFailed(prefix),
                };
                let _ = events.send(event);
            }
        });
        Ok(())
    }

    fn express(&self, interest: Interest, kind: PendingKind) -> Result<(), NetworkError> {
        let bytes = Packet::Interest(interest.clone()).encode()?;
        self.track(&interest, kind)?;
        if let Err(e) = self.transmit(bytes) {
            // Leave nothing behind that could fire a second outcome.
            if let Ok(mut table) = self.pending.lock() {
                table.entries.remove(&interest.name);
            }
            return Err(e);
        }
        tracing::trace!(name = %interest.name, "interest expressed");
        Ok(())
    }
}

impl Face for UdpFace {
    fn register_prefix(&mut self, prefix: &Name) -> Result<(), NetworkError> {
        let command = Name::from_uri(REGISTER_COMMAND_PREFIX)?.append(prefix.to_uri());
        self.express(Interest::new(command), PendingKind::Registration(prefix.clone()))
    }

    fn express_interest(&mut self, interest: Interest) -> Result<(), NetworkError> {
        self.express(interest, PendingKind::Request)
    }

    fn send(&mut self, wire: &[u8]) -> Result<(), NetworkError> {
        self.transmit(frame_data(wire)?)
    }

    fn shutdown(&mut self) {
        if let Some(tasks) = self.tasks.take() {
            tasks.receiver.abort();
            tasks.writer.abort();
            tracing::debug!("face closed");
        }
        if let Ok(mut table) = self.pending.lock() {
            table.entries.clear();
        }
    }
}

impl Drop for UdpFace {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn send_loop(socket: Arc<UdpSocket>, mut queue: mpsc::UnboundedReceiver<Vec<u8>>) {
    while let Some(datagram) = queue.recv().await {
        if let Err(e) = socket.send(&datagram).await {
            tracing::warn!(error = %e, size = datagram.len(), "send to forwarder failed");
        }
    }
}

async fn receive_loop(
    socket: Arc<UdpSocket>,
    pending: Arc<Mutex<PendingTable>>,
    events: FaceEventSender,
) {
    let mut buffer = vec![0u8; MAX_PACKET_SIZE];
    loop {
        let size = match socket.recv(&mut buffer).await {
            Ok(size) => size,
            Err(e) => {
                tracing::warn!(error = %e, "receive from forwarder failed");
                continue;
            }
        };
        let packet = match Packet::decode(&buffer[..size]) {
            Ok(packet) => packet,
            Err(e) => {
                tracing::debug!(error = %e, "dropping undecodable datagram");
                continue;
            }
        };
        let Some(event) = route(packet, &pending) else {
            continue;
        };
        if events.send(event).is_err() {
            break;
        }
    }
}

/// Match an incoming packet against the pending and registered tables.
fn route(packet: Packet, pending: &Mutex<PendingTable>) -> Option<FaceEvent> {
    let mut table = pending.lock().ok()?;
    match packet {
        Packet::Data(data) => {
            let interest_name = table
                .entries
                .keys()
                .find(|name| name.is_prefix_of(&data.name))
                .cloned()?;
            let entry = table.entries.remove(&interest_name)?;
            Some(match entry.kind {
                PendingKind::Request => FaceEvent::Data { interest_name, data },
                PendingKind::Registration(prefix) => {
                    table.registered.push(prefix.clone());
                    FaceEvent::PrefixRegistered(prefix)
                }
            })
        }
        Packet::Interest(interest) => {
            if table
                .registered
                .iter()
                .any(|prefix| prefix.is_prefix_of(&interest.name))
            {
                Some(FaceEvent::Interest(interest))
            } else {
                tracing::trace!(name = %interest.name, "interest outside registered prefixes");
                None
            }
        }
    }
}
