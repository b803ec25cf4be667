//! Viewer sessions and the per-refresh context built for them.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::metrics::ServerMetrics;

/// Handle for one connected viewer.
///
/// Keyed by `viewer_id`; the name is carried for logs and substitution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ViewerSession {
    pub viewer_id: Uuid,
    pub name: String,
}

impl ViewerSession {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4(), name)
    }

    /// Create with explicit viewer_id (for testing)
    pub fn with_id(viewer_id: Uuid, name: impl Into<String>) -> Self {
        Self {
            viewer_id,
            name: name.into(),
        }
    }
}

/// Per-viewer facts the host knows about a connected viewer.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewerProfile {
    pub session: ViewerSession,
    pub display_name: String,
    pub world: String,
    pub ping_ms: u32,
}

impl ViewerProfile {
    pub fn new(session: ViewerSession) -> Self {
        Self {
            display_name: session.name.clone(),
            session,
            world: "world".to_string(),
            ping_ms: 0,
        }
    }
}

/// Everything a layout or header computation may read for one viewer.
///
/// Built fresh for every refresh; treated as a read-only snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewerContext {
    pub profile: ViewerProfile,
    pub metrics: ServerMetrics,
}

impl ViewerContext {
    pub fn new(profile: ViewerProfile, metrics: ServerMetrics) -> Self {
        Self { profile, metrics }
    }

    /// Context with default metrics (for tests and tooling).
    pub fn for_session(session: ViewerSession) -> Self {
        Self::new(ViewerProfile::new(session), ServerMetrics::default())
    }

    pub fn session(&self) -> &ViewerSession {
        &self.profile.session
    }

    pub fn viewer_id(&self) -> Uuid {
        self.profile.session.viewer_id
    }

    /// Real participants currently in the shared roster.
    pub fn participants(&self) -> usize {
        self.metrics.online
    }

    pub fn with_participants(mut self, online: usize) -> Self {
        self.metrics.online = online;
        self
    }
}
