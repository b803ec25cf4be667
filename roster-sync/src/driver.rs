//! Event loop driving refreshes.
//!
//! ```text
//!  DriverHandle ──► mpsc<RosterEvent> ──┐
//!                                      ├──► RosterDriver ──► RosterSynchronizer
//!  interval(update_interval_ms) ───────┘         │
//!                                                └── ServerMetrics sampled per tick
//! ```
//!
//! One task owns the viewer profiles and the config snapshot. Joins are
//! attached at once but only refreshed after `join_delay_ms`, when a
//! `Ready` event comes back through the same channel.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

use crate::config::RosterConfig;
use crate::metrics::{memory_usage_mb, ServerMetrics, TickRateTracker};
use crate::sync::RosterSynchronizer;
use crate::viewer::{ViewerContext, ViewerProfile};

/// Inputs to the driver.
#[derive(Debug, Clone)]
pub enum RosterEvent {
    /// A viewer connected.
    Join(ViewerProfile),
    /// A viewer's display facts changed (ping, world, display name).
    Profile(ViewerProfile),
    /// Join delay elapsed for one join of a viewer. A `generation` from an
    /// earlier join of the same id is ignored.
    Ready { viewer_id: Uuid, generation: u64 },
    Quit(Uuid),
    /// Swap in a new configuration snapshot.
    Reload(RosterConfig),
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DriverError {
    #[error("roster driver has stopped")]
    Closed,
}

/// Driver settings that are not part of the roster configuration.
#[derive(Debug, Clone)]
pub struct DriverOptions {
    /// Participant capacity reported as `{max}`.
    pub capacity: usize,
    pub server_name: String,
    /// Event channel buffer.
    pub event_buffer: usize,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            capacity: 100,
            server_name: "roster-sync".to_string(),
            event_buffer: 256,
        }
    }
}

/// Cloneable sender side of the driver.
#[derive(Debug, Clone)]
pub struct DriverHandle {
    events: mpsc::Sender<RosterEvent>,
}

impl DriverHandle {
    pub async fn send(&self, event: RosterEvent) -> Result<(), DriverError> {
        self.events.send(event).await.map_err(|_| DriverError::Closed)
    }

    pub async fn join(&self, profile: ViewerProfile) -> Result<(), DriverError> {
        self.send(RosterEvent::Join(profile)).await
    }

    pub async fn update_profile(&self, profile: ViewerProfile) -> Result<(), DriverError> {
        self.send(RosterEvent::Profile(profile)).await
    }

    pub async fn quit(&self, viewer_id: Uuid) -> Result<(), DriverError> {
        self.send(RosterEvent::Quit(viewer_id)).await
    }

    pub async fn reload(&self, config: RosterConfig) -> Result<(), DriverError> {
        self.send(RosterEvent::Reload(config)).await
    }

    pub async fn shutdown(&self) -> Result<(), DriverError> {
        self.send(RosterEvent::Shutdown).await
    }

    pub fn is_closed(&self) -> bool {
        self.events.is_closed()
    }
}

struct DriverViewer {
    profile: ViewerProfile,
    ready: bool,
    generation: u64,
}

pub struct RosterDriver {
    sync: Arc<RosterSynchronizer>,
    config: Arc<RosterConfig>,
    options: DriverOptions,
    viewers: HashMap<Uuid, DriverViewer>,
    events: mpsc::Receiver<RosterEvent>,
    // Weak so that dropping every handle stops the loop.
    ready_tx: mpsc::WeakSender<RosterEvent>,
    joins: u64,
    tick_rate: TickRateTracker,
    started: Instant,
}

impl RosterDriver {
    pub fn new(
        sync: Arc<RosterSynchronizer>,
        config: RosterConfig,
        options: DriverOptions,
    ) -> (Self, DriverHandle) {
        let (tx, rx) = mpsc::channel(options.event_buffer.max(1));
        let interval = Duration::from_millis(config.update_interval_ms);
        let driver = Self {
            sync,
            config: Arc::new(config),
            options,
            viewers: HashMap::new(),
            events: rx,
            ready_tx: tx.downgrade(),
            joins: 0,
            tick_rate: TickRateTracker::new(interval),
            started: Instant::now(),
        };
        (driver, DriverHandle { events: tx })
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Run until `Shutdown` or until every handle is dropped, then tear
    /// down all viewers.
    pub async fn run(mut self) {
        let mut ticker = self.ticker();
        log::info!(
            "Roster driver started (interval {}ms, join delay {}ms)",
            self.config.update_interval_ms,
            self.config.join_delay_ms
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => self.tick().await,
                event = self.events.recv() => match event {
                    None | Some(RosterEvent::Shutdown) => break,
                    Some(event) => {
                        if self.handle(event).await {
                            ticker = self.ticker();
                        }
                    }
                },
            }
        }

        let removed = self.sync.shutdown().await;
        log::info!(
            "Roster driver stopped ({} viewers, {removed} rows removed)",
            self.viewers.len()
        );
    }

    fn ticker(&self) -> tokio::time::Interval {
        let period = Duration::from_millis(self.config.update_interval_ms.max(1));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    }

    /// Returns true when the tick interval changed.
    async fn handle(&mut self, event: RosterEvent) -> bool {
        match event {
            RosterEvent::Join(profile) => self.join(profile).await,
            RosterEvent::Profile(profile) => {
                if let Some(viewer) = self.viewers.get_mut(&profile.session.viewer_id) {
                    viewer.profile = profile;
                }
            }
            RosterEvent::Ready {
                viewer_id,
                generation,
            } => self.ready(viewer_id, generation).await,
            RosterEvent::Quit(viewer_id) => {
                if self.viewers.remove(&viewer_id).is_some() {
                    self.sync.teardown(&viewer_id).await;
                }
            }
            RosterEvent::Reload(config) => return self.reload(config).await,
            RosterEvent::Shutdown => {}
        }
        false
    }

    async fn join(&mut self, profile: ViewerProfile) {
        let viewer_id = profile.session.viewer_id;
        if !self.sync.attach(profile.session.clone()).await {
            log::debug!("Viewer {viewer_id} joined twice; ignoring");
            return;
        }
        self.joins += 1;
        let generation = self.joins;
        self.viewers.insert(
            viewer_id,
            DriverViewer {
                profile,
                ready: false,
                generation,
            },
        );

        let delay = self.config.join_delay_ms;
        if delay == 0 {
            self.ready(viewer_id, generation).await;
            return;
        }
        let ready_tx = self.ready_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(delay)).await;
            if let Some(tx) = ready_tx.upgrade() {
                let _ = tx
                    .send(RosterEvent::Ready {
                        viewer_id,
                        generation,
                    })
                    .await;
            }
        });
    }

    async fn ready(&mut self, viewer_id: Uuid, generation: u64) {
        let Some(viewer) = self.viewers.get_mut(&viewer_id) else {
            log::trace!("Viewer {viewer_id} left before its first refresh");
            return;
        };
        if viewer.generation != generation {
            log::trace!("Stale join delay for viewer {viewer_id} ignored");
            return;
        }
        viewer.ready = true;
        if !self.config.enabled {
            return;
        }
        let metrics = self.metrics();
        if let Some(viewer) = self.viewers.get(&viewer_id) {
            let ctx = ViewerContext::new(viewer.profile.clone(), metrics);
            self.refresh(&ctx, true).await;
        }
    }

    async fn reload(&mut self, config: RosterConfig) -> bool {
        if let Err(e) = config.validate() {
            log::warn!("Rejected roster config reload: {e}");
            return false;
        }
        let interval_changed = config.update_interval_ms != self.config.update_interval_ms;
        self.config = Arc::new(config);
        if interval_changed {
            self.tick_rate
                .set_expected(Duration::from_millis(self.config.update_interval_ms));
        }
        log::info!("Roster config reloaded");

        // Apply entry changes now, including clearing rows when switched off.
        let metrics = self.metrics();
        for ctx in self.ready_contexts(&metrics) {
            self.refresh(&ctx, false).await;
        }
        interval_changed
    }

    async fn tick(&mut self) {
        self.tick_rate.record(Instant::now());
        if !self.config.enabled {
            return;
        }
        let metrics = self.metrics();
        let contexts = self.ready_contexts(&metrics);
        for ctx in &contexts {
            self.refresh(ctx, true).await;
        }
        log::trace!("Tick refreshed {} viewers", contexts.len());
    }

    async fn refresh(&self, ctx: &ViewerContext, with_header: bool) {
        let config = Arc::clone(&self.config);
        if with_header && config.enabled {
            if let Err(e) = self.sync.send_header_footer(ctx, &config) {
                log::debug!("Header/footer not delivered to {}: {e}", ctx.session().name);
            }
        }
        self.sync.refresh(ctx, &config).await;
    }

    fn ready_contexts(&self, metrics: &ServerMetrics) -> Vec<ViewerContext> {
        self.viewers
            .values()
            .filter(|v| v.ready)
            .map(|v| ViewerContext::new(v.profile.clone(), metrics.clone()))
            .collect()
    }

    fn metrics(&self) -> ServerMetrics {
        let (memory_used_mb, memory_max_mb) = memory_usage_mb();
        ServerMetrics {
            online: self.viewers.len(),
            capacity: self.options.capacity,
            tps: self.tick_rate.current(),
            uptime: self.started.elapsed(),
            memory_used_mb,
            memory_max_mb,
            server_name: self.options.server_name.clone(),
            ..ServerMetrics::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::RecordingTransport;
    use crate::viewer::ViewerSession;

    fn config() -> RosterConfig {
        let mut config = RosterConfig::default();
        config.update_interval_ms = 3_600_000;
        config.join_delay_ms = 0;
        config.entries.enabled = true;
        config.entries.lines = vec!["{online} online".into()];
        config
    }

    #[tokio::test]
    async fn test_handle_closed_after_shutdown() {
        let sync = Arc::new(RosterSynchronizer::with_transport(Arc::new(RecordingTransport::new())));
        let (driver, handle) = RosterDriver::new(sync, config(), DriverOptions::default());
        let task = driver.spawn();

        handle.shutdown().await.unwrap();
        task.await.unwrap();
        assert!(handle.is_closed());
        assert_eq!(handle.quit(Uuid::new_v4()).await, Err(DriverError::Closed));
    }

    #[tokio::test]
    async fn test_join_without_delay_refreshes_immediately() {
        let transport = Arc::new(RecordingTransport::new());
        let sync = Arc::new(RosterSynchronizer::with_transport(transport.clone()));
        let (mut driver, _handle) = RosterDriver::new(sync.clone(), config(), DriverOptions::default());

        let profile = ViewerProfile::new(ViewerSession::new("Alice"));
        let id = profile.session.viewer_id;
        driver.handle(RosterEvent::Join(profile)).await;

        assert_eq!(sync.tracked(&id).await.len(), 1);
        // Header/footer plus one add.
        assert_eq!(transport.packets_for(&id).len(), 2);
    }

    #[tokio::test]
    async fn test_rejoin_ignores_earlier_join_delay() {
        let transport = Arc::new(RecordingTransport::new());
        let sync = Arc::new(RosterSynchronizer::with_transport(transport.clone()));
        let mut slow = config();
        slow.join_delay_ms = 3_600_000;
        let (mut driver, _handle) = RosterDriver::new(sync.clone(), slow, DriverOptions::default());

        let profile = ViewerProfile::new(ViewerSession::new("Alice"));
        let id = profile.session.viewer_id;
        driver.handle(RosterEvent::Join(profile.clone())).await;
        let first = driver.viewers[&id].generation;
        driver.handle(RosterEvent::Quit(id)).await;
        driver.handle(RosterEvent::Join(profile)).await;
        let second = driver.viewers[&id].generation;
        assert_ne!(first, second);

        // The first join's delay expiring must not mark the new join ready.
        driver
            .handle(RosterEvent::Ready {
                viewer_id: id,
                generation: first,
            })
            .await;
        assert!(!driver.viewers[&id].ready);
        assert!(transport.packets_for(&id).is_empty());
        assert!(sync.tracked(&id).await.is_empty());

        driver
            .handle(RosterEvent::Ready {
                viewer_id: id,
                generation: second,
            })
            .await;
        assert!(driver.viewers[&id].ready);
        assert_eq!(sync.tracked(&id).await.len(), 1);
    }

    #[tokio::test]
    async fn test_reload_rejects_invalid_config() {
        let sync = Arc::new(RosterSynchronizer::with_transport(Arc::new(RecordingTransport::new())));
        let (mut driver, _handle) = RosterDriver::new(sync, config(), DriverOptions::default());

        let mut bad = config();
        bad.update_interval_ms = 0;
        assert!(!driver.handle(RosterEvent::Reload(bad)).await);
        assert_eq!(driver.config.update_interval_ms, 3_600_000);

        let mut faster = config();
        faster.update_interval_ms = 50;
        assert!(driver.handle(RosterEvent::Reload(faster)).await);
        assert_eq!(driver.config.update_interval_ms, 50);
    }

    #[test]
    fn test_metrics_reflect_driver_state() {
        let sync = Arc::new(RosterSynchronizer::with_transport(Arc::new(RecordingTransport::new())));
        let options = DriverOptions {
            capacity: 42,
            server_name: "lobby".into(),
            ..DriverOptions::default()
        };
        let (driver, _handle) = RosterDriver::new(sync, config(), options);
        let metrics = driver.metrics();
        assert_eq!(metrics.online, 0);
        assert_eq!(metrics.capacity, 42);
        assert_eq!(metrics.server_name, "lobby");
    }
}
