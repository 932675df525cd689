//! Run and batch registry types.

use crate::types::SessionWindow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One (strategy, session window) unit of replay, grouped under a
/// batch. Created once, before any of its trades are written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: i64,
    pub batch_id: Uuid,
    pub strategy: String,
    pub start_time: DateTime<Utc>,
    pub duration_minutes: i64,
    pub created_at: DateTime<Utc>,
}

impl Run {
    /// The session window this run replays.
    pub fn window(&self) -> SessionWindow {
        SessionWindow::new(self.start_time, self.duration_minutes)
    }
}

/// Summary row for batch listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSummary {
    pub batch_id: Uuid,
    pub strategy: String,
    pub first_run_at: DateTime<Utc>,
    pub run_count: i64,
}
