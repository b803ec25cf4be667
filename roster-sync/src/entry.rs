//! The synthetic roster row.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::markup::StyledLabel;

/// Maximum sort-key length the client accepts for a roster name.
pub const MAX_SORT_KEY_LEN: usize = 16;

/// Display-mode icon shown next to a row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StatusIcon {
    #[default]
    Normal,
    Creative,
    Adventure,
    Spectator,
}

/// Rejected row construction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EntryError {
    #[error("sort key is empty")]
    EmptySortKey,
    #[error("sort key '{key}' is {len} characters, limit is 16")]
    SortKeyTooLong { key: String, len: usize },
    #[error("latency cannot be negative: {0}")]
    NegativeLatency(i32),
    #[error("latency out of range: {0}")]
    LatencyOutOfRange(u32),
}

/// One synthetic row in a viewer's roster.
///
/// Immutable once built; equality is by value, which is what the diff uses
/// to tell an unchanged row from an updated one. Decoding goes through
/// [`PresenceEntry::new`], so a decoded row is as valid as a built one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WireEntry")]
pub struct PresenceEntry {
    identity: Uuid,
    sort_key: String,
    label: StyledLabel,
    latency: u32,
    status_icon: StatusIcon,
}

impl PresenceEntry {
    pub fn new(
        identity: Uuid,
        sort_key: impl Into<String>,
        label: StyledLabel,
        latency: i32,
        status_icon: StatusIcon,
    ) -> Result<Self, EntryError> {
        let sort_key = sort_key.into();
        let len = sort_key.chars().count();
        if len == 0 {
            return Err(EntryError::EmptySortKey);
        }
        if len > MAX_SORT_KEY_LEN {
            return Err(EntryError::SortKeyTooLong { key: sort_key, len });
        }
        let latency = u32::try_from(latency).map_err(|_| EntryError::NegativeLatency(latency))?;

        Ok(Self {
            identity,
            sort_key,
            label,
            latency,
            status_icon,
        })
    }

    /// Row with zero latency and the normal icon.
    pub fn simple(identity: Uuid, sort_key: impl Into<String>, label: StyledLabel) -> Result<Self, EntryError> {
        Self::new(identity, sort_key, label, 0, StatusIcon::Normal)
    }

    pub fn identity(&self) -> Uuid {
        self.identity
    }

    pub fn sort_key(&self) -> &str {
        &self.sort_key
    }

    pub fn label(&self) -> &StyledLabel {
        &self.label
    }

    pub fn latency(&self) -> u32 {
        self.latency
    }

    pub fn status_icon(&self) -> StatusIcon {
        self.status_icon
    }

    /// Padding rows carry an empty label.
    pub fn is_padding(&self) -> bool {
        self.label.is_empty()
    }
}

/// Field-for-field mirror of [`PresenceEntry`] as it comes off the wire.
#[derive(Deserialize)]
struct WireEntry {
    identity: Uuid,
    sort_key: String,
    label: StyledLabel,
    latency: u32,
    status_icon: StatusIcon,
}

impl TryFrom<WireEntry> for PresenceEntry {
    type Error = EntryError;

    fn try_from(wire: WireEntry) -> Result<Self, Self::Error> {
        let latency = i32::try_from(wire.latency).map_err(|_| EntryError::LatencyOutOfRange(wire.latency))?;
        Self::new(wire.identity, wire.sort_key, wire.label, latency, wire.status_icon)
    }
}
