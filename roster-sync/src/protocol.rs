//! Roster packets sent to a viewer.
//!
//! One packet per change; the transport decides how (and whether) they
//! reach the client. Packets are bincode-encoded for the channel transport:
//!
//! ```text
//! ┌─────────┬──────────────────────────────────────────────┐
//! │ variant │ payload                                      │
//! │ varint  │ entry | identity | identities | header/footer│
//! └─────────┴──────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::entry::PresenceEntry;
use crate::markup::StyledLabel;

/// Header and footer text for one viewer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderFooter {
    pub header: StyledLabel,
    pub footer: StyledLabel,
}

/// A single roster update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RosterPacket {
    /// Insert a row the viewer does not have yet.
    Add(PresenceEntry),
    /// Replace the display fields of a row the viewer already has.
    Update(PresenceEntry),
    Remove(Uuid),
    /// Bulk removal, used on teardown.
    RemoveAll(Vec<Uuid>),
    HeaderFooter(HeaderFooter),
}

impl RosterPacket {
    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Add(_) => "add",
            Self::Update(_) => "update",
            Self::Remove(_) => "remove",
            Self::RemoveAll(_) => "remove-all",
            Self::HeaderFooter(_) => "header-footer",
        }
    }

    /// Identities this packet touches.
    pub fn identities(&self) -> Vec<Uuid> {
        match self {
            Self::Add(entry) | Self::Update(entry) => vec![entry.identity()],
            Self::Remove(id) => vec![*id],
            Self::RemoveAll(ids) => ids.clone(),
            Self::HeaderFooter(_) => Vec::new(),
        }
    }

    /// Serialize to binary wire format.
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| ProtocolError::Serialization(e.to_string()))
    }

    /// Deserialize from binary wire format.
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let (packet, _) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map_err(|e| ProtocolError::Deserialization(e.to_string()))?;
        Ok(packet)
    }
}

/// Packet encoding errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Deserialization error: {0}")]
    Deserialization(String),
}
