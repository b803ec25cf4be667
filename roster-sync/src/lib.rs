//! # roster-sync: synthetic presence rows for a shared roster view
//!
//! Keeps, per connected viewer, a set of synthetic rows inside a roster the
//! client sorts alphabetically and flows into columns on its own. Rows are
//! laid out into fixed slot ranges to fake columns, diffed against what the
//! viewer already has, and sent as minimal add/update/remove packets.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐  RosterEvent   ┌──────────────┐
//! │ DriverHandle │ ─────────────► │ RosterDriver │ ◄── interval tick
//! └──────────────┘                └──────┬───────┘
//!                                        │ ViewerContext + RosterConfig
//!                                        ▼
//!                              ┌────────────────────┐
//!                              │ RosterSynchronizer │
//!                              └───┬────────────┬───┘
//!                                  │            │
//!                         ┌────────▼─────┐ ┌────▼────────────┐
//!                         │ LayoutEngine │ │ ViewerRoster    │
//!                         │ (pure)       │ │ (last sent)     │
//!                         └──────────────┘ └────┬────────────┘
//!                                               │ RosterDiff
//!                                               ▼
//!                                      ┌─────────────────┐
//!                                      │ RosterTransport │
//!                                      └─────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`identity`]: UUID v5 identities seeded by region and slot
//! - [`entry`]: the validated synthetic row
//! - [`layout`]: column faking via sort-key prefixes and padding
//! - [`cache`]: per-viewer record and diff
//! - [`sync`]: refresh, teardown and shutdown
//! - [`header`]: header/footer rendering
//! - [`transport`]: packet delivery (bounded channels)
//! - [`driver`]: tokio event loop
//! - [`config`], [`markup`], [`placeholder`], [`metrics`], [`viewer`]: collaborators

pub mod cache;
pub mod config;
pub mod driver;
pub mod entry;
pub mod header;
pub mod identity;
pub mod layout;
pub mod markup;
pub mod metrics;
pub mod placeholder;
pub mod protocol;
pub mod sync;
pub mod transport;
pub mod viewer;

// Re-exports for convenience
pub use cache::{RosterDiff, ViewerRoster};
pub use config::{ConfigError, EntriesConfig, LayoutMode, RosterConfig};
pub use driver::{DriverError, DriverHandle, DriverOptions, RosterDriver, RosterEvent};
pub use entry::{EntryError, PresenceEntry, StatusIcon, MAX_SORT_KEY_LEN};
pub use header::HeaderFooterRenderer;
pub use identity::{counter_identity, derive_identity, slot_identity};
pub use layout::{EntryKind, LayoutEngine, LayoutPlan, LayoutRegion, PlacedEntry, PrefixClass, RegionSpan};
pub use markup::{MarkupRenderer, RenderError, StyledLabel, StyledSpan, TagMarkup};
pub use metrics::{ServerMetrics, TickRateTracker};
pub use placeholder::{BuiltinSubstitutor, Substitutor};
pub use protocol::{HeaderFooter, ProtocolError, RosterPacket};
pub use sync::{RefreshReport, RosterSynchronizer, SyncStats};
pub use transport::{ChannelTransport, RecordingTransport, RosterTransport, TransportError, TransportStats};
pub use viewer::{ViewerContext, ViewerProfile, ViewerSession};
