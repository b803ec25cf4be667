//! Packet delivery to viewers.
//!
//! The synchronizer hands packets to a [`RosterTransport`] and never waits
//! on it. [`ChannelTransport`] is the bundled implementation: one bounded
//! tokio `mpsc` channel per connected viewer, carrying bincode-encoded
//! packets. A viewer whose buffer is full loses the packet; the failure is
//! counted and returned, never retried.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, RwLock};

use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::protocol::{ProtocolError, RosterPacket};
use crate::viewer::ViewerSession;

/// Delivery failures. None of them are retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("viewer {0} is not connected")]
    NotConnected(Uuid),
    #[error("send buffer for viewer {0} is full")]
    Full(Uuid),
    #[error("viewer {0} closed its receiver")]
    Closed(Uuid),
    #[error(transparent)]
    Encode(#[from] ProtocolError),
}

/// Fire-and-forget packet sink.
pub trait RosterTransport: Send + Sync {
    fn send(&self, viewer: &ViewerSession, packet: RosterPacket) -> Result<(), TransportError>;
}

/// Statistics for monitoring delivery health.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportStats {
    pub packets_sent: u64,
    pub packets_dropped: u64,
    pub bytes_sent: u64,
    pub connected: usize,
}

#[derive(Debug, Default)]
struct AtomicTransportStats {
    packets_sent: AtomicU64,
    packets_dropped: AtomicU64,
    bytes_sent: AtomicU64,
}

/// One bounded channel per viewer.
///
/// The routing table sits behind a std `RwLock`: sends only read it and
/// never hold it across an await.
pub struct ChannelTransport {
    senders: RwLock<HashMap<Uuid, mpsc::Sender<Vec<u8>>>>,
    capacity: usize,
    stats: AtomicTransportStats,
}

impl ChannelTransport {
    /// `capacity` is the number of packets buffered per viewer before sends
    /// start failing with [`TransportError::Full`].
    pub fn new(capacity: usize) -> Self {
        Self {
            senders: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
            stats: AtomicTransportStats::default(),
        }
    }

    /// Open a channel for `viewer_id`, replacing any previous one.
    ///
    /// Returns the receiving end of the viewer's packet stream.
    pub fn connect(&self, viewer_id: Uuid) -> mpsc::Receiver<Vec<u8>> {
        let (tx, rx) = mpsc::channel(self.capacity);
        let mut senders = self.senders.write().unwrap_or_else(|e| e.into_inner());
        if senders.insert(viewer_id, tx).is_some() {
            log::debug!("Replaced packet channel for viewer {viewer_id}");
        }
        rx
    }

    /// Close the channel for `viewer_id`. Buffered packets stay readable.
    pub fn disconnect(&self, viewer_id: &Uuid) -> bool {
        let mut senders = self.senders.write().unwrap_or_else(|e| e.into_inner());
        senders.remove(viewer_id).is_some()
    }

    pub fn is_connected(&self, viewer_id: &Uuid) -> bool {
        let senders = self.senders.read().unwrap_or_else(|e| e.into_inner());
        senders.contains_key(viewer_id)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Lock-free counters plus the current channel count.
    pub fn stats(&self) -> TransportStats {
        let connected = self.senders.read().unwrap_or_else(|e| e.into_inner()).len();
        TransportStats {
            packets_sent: self.stats.packets_sent.load(Ordering::Relaxed),
            packets_dropped: self.stats.packets_dropped.load(Ordering::Relaxed),
            bytes_sent: self.stats.bytes_sent.load(Ordering::Relaxed),
            connected,
        }
    }

    fn dropped(&self, err: TransportError) -> TransportError {
        self.stats.packets_dropped.fetch_add(1, Ordering::Relaxed);
        err
    }
}

impl RosterTransport for ChannelTransport {
    fn send(&self, viewer: &ViewerSession, packet: RosterPacket) -> Result<(), TransportError> {
        let id = viewer.viewer_id;
        let sender = {
            let senders = self.senders.read().unwrap_or_else(|e| e.into_inner());
            senders.get(&id).cloned()
        };
        let Some(sender) = sender else {
            return Err(self.dropped(TransportError::NotConnected(id)));
        };

        let bytes = packet.encode().map_err(|e| self.dropped(e.into()))?;
        let len = bytes.len() as u64;
        match sender.try_send(bytes) {
            Ok(()) => {
                self.stats.packets_sent.fetch_add(1, Ordering::Relaxed);
                self.stats.bytes_sent.fetch_add(len, Ordering::Relaxed);
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(_)) => Err(self.dropped(TransportError::Full(id))),
            Err(mpsc::error::TrySendError::Closed(_)) => {
                Err(self.dropped(TransportError::Closed(id)))
            }
        }
    }
}

/// Keeps every packet in memory, in send order. For tests and tooling.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<(Uuid, RosterPacket)>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Packets sent to `viewer_id` so far.
    pub fn packets_for(&self, viewer_id: &Uuid) -> Vec<RosterPacket> {
        let sent = self.sent.lock().unwrap_or_else(|e| e.into_inner());
        sent.iter()
            .filter(|(id, _)| id == viewer_id)
            .map(|(_, packet)| packet.clone())
            .collect()
    }

    /// Remove and return everything recorded.
    pub fn take(&self) -> Vec<(Uuid, RosterPacket)> {
        let mut sent = self.sent.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::take(&mut *sent)
    }

    pub fn len(&self) -> usize {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RosterTransport for RecordingTransport {
    fn send(&self, viewer: &ViewerSession, packet: RosterPacket) -> Result<(), TransportError> {
        let mut sent = self.sent.lock().unwrap_or_else(|e| e.into_inner());
        sent.push((viewer.viewer_id, packet));
        Ok(())
    }
}
