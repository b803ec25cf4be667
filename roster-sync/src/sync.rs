//! Per-viewer refresh cycle: compute, diff, emit, record.
//!
//! ```text
//!   refresh(ctx) ──► LayoutEngine::compute ──► desired
//!                                               │
//!        ViewerRoster (last sent) ──► RosterDiff::between
//!                                               │
//!                         Add / Update / Remove ▼
//!                                        RosterTransport
//! ```
//!
//! Every viewer has its own slot behind a `tokio::sync::Mutex`, so refreshes
//! for different viewers never wait on each other while a refresh and a
//! teardown for the same viewer are serialized. Teardown closes the slot;
//! a refresh that gets the lock afterwards does nothing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::cache::{RosterDiff, ViewerRoster};
use crate::config::RosterConfig;
use crate::header::HeaderFooterRenderer;
use crate::layout::LayoutEngine;
use crate::protocol::RosterPacket;
use crate::transport::{RosterTransport, TransportError};
use crate::viewer::{ViewerContext, ViewerSession};

/// Synchronizer statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub refreshes: u64,
    pub adds: u64,
    pub updates: u64,
    pub removes: u64,
    pub send_failures: u64,
    pub teardowns: u64,
    pub active_viewers: usize,
}

#[derive(Debug, Default)]
struct AtomicSyncStats {
    refreshes: AtomicU64,
    adds: AtomicU64,
    updates: AtomicU64,
    removes: AtomicU64,
    send_failures: AtomicU64,
    teardowns: AtomicU64,
}

/// What one refresh did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshReport {
    pub adds: usize,
    pub updates: usize,
    /// Identities removed, whether singly or in one bulk packet.
    pub removes: usize,
    pub failed_sends: usize,
    /// The viewer was not attached or already torn down.
    pub skipped: bool,
}

impl RefreshReport {
    fn skipped() -> Self {
        Self {
            skipped: true,
            ..Self::default()
        }
    }

    /// Nothing was sent.
    pub fn is_noop(&self) -> bool {
        self.adds == 0 && self.updates == 0 && self.removes == 0
    }
}

struct ViewerSlot {
    session: ViewerSession,
    roster: ViewerRoster,
    closed: bool,
}

/// Keeps every attached viewer's synthetic rows converged on its layout.
pub struct RosterSynchronizer {
    layout: LayoutEngine,
    header: HeaderFooterRenderer,
    transport: Arc<dyn RosterTransport>,
    viewers: RwLock<HashMap<Uuid, Arc<Mutex<ViewerSlot>>>>,
    stats: AtomicSyncStats,
}

impl RosterSynchronizer {
    pub fn new(
        layout: LayoutEngine,
        header: HeaderFooterRenderer,
        transport: Arc<dyn RosterTransport>,
    ) -> Self {
        Self {
            layout,
            header,
            transport,
            viewers: RwLock::new(HashMap::new()),
            stats: AtomicSyncStats::default(),
        }
    }

    /// Synchronizer with the bundled markup renderer and substitutor.
    pub fn with_transport(transport: Arc<dyn RosterTransport>) -> Self {
        Self::new(LayoutEngine::default(), HeaderFooterRenderer::default(), transport)
    }

    /// Start tracking a viewer. Returns false if it was already attached.
    pub async fn attach(&self, session: ViewerSession) -> bool {
        let mut viewers = self.viewers.write().await;
        if viewers.contains_key(&session.viewer_id) {
            return false;
        }
        log::info!("Viewer {} ({}) attached", session.name, session.viewer_id);
        let id = session.viewer_id;
        let slot = ViewerSlot {
            session,
            roster: ViewerRoster::new(),
            closed: false,
        };
        viewers.insert(id, Arc::new(Mutex::new(slot)));
        true
    }

    pub async fn is_attached(&self, viewer_id: &Uuid) -> bool {
        self.viewers.read().await.contains_key(viewer_id)
    }

    pub async fn viewer_count(&self) -> usize {
        self.viewers.read().await.len()
    }

    /// Identities currently tracked for a viewer, sorted. Empty if unknown.
    pub async fn tracked(&self, viewer_id: &Uuid) -> Vec<Uuid> {
        let Some(slot) = self.slot(viewer_id).await else {
            return Vec::new();
        };
        let slot = slot.lock().await;
        let mut ids: Vec<Uuid> = slot.roster.identities().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Converge one viewer's roster on the layout for `config`.
    pub async fn refresh(&self, viewer: &ViewerContext, config: &RosterConfig) -> RefreshReport {
        let viewer_id = viewer.viewer_id();
        let Some(slot) = self.slot(&viewer_id).await else {
            log::trace!("Refresh for unattached viewer {viewer_id} ignored");
            return RefreshReport::skipped();
        };
        self.refresh_slot(&slot, viewer, config).await
    }

    /// Refresh against a slot looked up earlier. The slot may have been torn
    /// down since; a closed slot is left alone.
    async fn refresh_slot(
        &self,
        slot: &Mutex<ViewerSlot>,
        viewer: &ViewerContext,
        config: &RosterConfig,
    ) -> RefreshReport {
        let viewer_id = viewer.viewer_id();
        let mut slot = slot.lock().await;
        if slot.closed {
            log::trace!("Refresh for torn-down viewer {viewer_id} ignored");
            return RefreshReport::skipped();
        }
        self.stats.refreshes.fetch_add(1, Ordering::Relaxed);

        if !config.entries_enabled() {
            return self.clear(&mut slot);
        }

        let desired = self.layout.compute(viewer, config);
        let diff = RosterDiff::between(&slot.roster, &desired);
        let mut report = RefreshReport {
            adds: diff.adds.len(),
            updates: diff.updates.len(),
            removes: diff.removes.len(),
            ..RefreshReport::default()
        };

        let RosterDiff {
            adds,
            updates,
            removes,
        } = diff;
        let packets = adds
            .into_iter()
            .map(RosterPacket::Add)
            .chain(updates.into_iter().map(RosterPacket::Update))
            .chain(removes.into_iter().map(RosterPacket::Remove));
        for packet in packets {
            if self.send(&slot.session, packet).is_err() {
                report.failed_sends += 1;
            }
        }

        slot.roster.replace(&desired);
        self.record(&report);

        if report.failed_sends > 0 {
            log::warn!(
                "Refresh for {}: {} of {} packets not delivered",
                slot.session.name,
                report.failed_sends,
                report.adds + report.updates + report.removes
            );
        }
        if !report.is_noop() {
            log::debug!(
                "Refreshed {}: +{} ~{} -{} ({} tracked)",
                slot.session.name,
                report.adds,
                report.updates,
                report.removes,
                slot.roster.len()
            );
        }
        report
    }

    /// Render and send the header and footer. Not diffed.
    pub fn send_header_footer(
        &self,
        viewer: &ViewerContext,
        config: &RosterConfig,
    ) -> Result<(), TransportError> {
        let blocks = self.header.render(viewer, config);
        self.send(viewer.session(), RosterPacket::HeaderFooter(blocks))
    }

    /// Remove every synthetic row from a viewer and forget it.
    ///
    /// Returns the number of identities removed. Later refreshes for this
    /// viewer are ignored until it is attached again.
    pub async fn teardown(&self, viewer_id: &Uuid) -> usize {
        let slot = self.viewers.write().await.remove(viewer_id);
        let Some(slot) = slot else {
            return 0;
        };
        let removed = self.close(&mut *slot.lock().await);
        self.stats.teardowns.fetch_add(1, Ordering::Relaxed);
        log::info!("Viewer {viewer_id} torn down ({removed} rows removed)");
        removed
    }

    /// Tear down every viewer. Returns the total number of identities removed.
    pub async fn shutdown(&self) -> usize {
        let slots: Vec<Arc<Mutex<ViewerSlot>>> = {
            let mut viewers = self.viewers.write().await;
            viewers.drain().map(|(_, slot)| slot).collect()
        };
        let count = slots.len();
        let mut removed = 0;
        for slot in slots {
            removed += self.close(&mut *slot.lock().await);
            self.stats.teardowns.fetch_add(1, Ordering::Relaxed);
        }
        log::info!("Roster synchronizer shut down ({count} viewers, {removed} rows removed)");
        removed
    }

    pub async fn stats(&self) -> SyncStats {
        let active_viewers = self.viewers.read().await.len();
        SyncStats {
            refreshes: self.stats.refreshes.load(Ordering::Relaxed),
            adds: self.stats.adds.load(Ordering::Relaxed),
            updates: self.stats.updates.load(Ordering::Relaxed),
            removes: self.stats.removes.load(Ordering::Relaxed),
            send_failures: self.stats.send_failures.load(Ordering::Relaxed),
            teardowns: self.stats.teardowns.load(Ordering::Relaxed),
            active_viewers,
        }
    }

    async fn slot(&self, viewer_id: &Uuid) -> Option<Arc<Mutex<ViewerSlot>>> {
        self.viewers.read().await.get(viewer_id).cloned()
    }

    /// Feature switched off: drop everything but keep the viewer attached.
    fn clear(&self, slot: &mut ViewerSlot) -> RefreshReport {
        if slot.roster.is_empty() {
            return RefreshReport::default();
        }
        let removed = self.remove_all(slot);
        log::debug!("Roster entries disabled; cleared {removed} rows for {}", slot.session.name);
        let report = RefreshReport {
            removes: removed,
            ..RefreshReport::default()
        };
        self.record(&report);
        report
    }

    fn close(&self, slot: &mut ViewerSlot) -> usize {
        slot.closed = true;
        let removed = self.remove_all(slot);
        self.stats.removes.fetch_add(removed as u64, Ordering::Relaxed);
        removed
    }

    fn remove_all(&self, slot: &mut ViewerSlot) -> usize {
        let mut ids = slot.roster.drain();
        if ids.is_empty() {
            return 0;
        }
        ids.sort_unstable();
        let removed = ids.len();
        // Delivery failures are counted in send(); the record is gone either way.
        let _ = self.send(&slot.session, RosterPacket::RemoveAll(ids));
        removed
    }

    fn send(&self, viewer: &ViewerSession, packet: RosterPacket) -> Result<(), TransportError> {
        let kind = packet.kind();
        self.transport.send(viewer, packet).inspect_err(|e| {
            self.stats.send_failures.fetch_add(1, Ordering::Relaxed);
            log::debug!("Dropped {kind} packet for {}: {e}", viewer.name);
        })
    }

    fn record(&self, report: &RefreshReport) {
        self.stats.adds.fetch_add(report.adds as u64, Ordering::Relaxed);
        self.stats.updates.fetch_add(report.updates as u64, Ordering::Relaxed);
        self.stats.removes.fetch_add(report.removes as u64, Ordering::Relaxed);
    }
}
