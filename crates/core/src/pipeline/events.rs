//! # Pipeline Events
//!
//! Event types emitted by the orchestrator while a run progresses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::status::{Stage, StageState};

/// Kind of pipeline event
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PipelineEventKind {
    /// Run accepted, inputs snapshotted
    RunStarted,
    /// A stage moved forward
    StageChanged,
    /// Best-effort step degraded or failed
    Warning,
    /// Design written to history
    DesignSaved,
    /// Results committed and shown
    RunCompleted,
    /// Fatal failure, back to style selection
    RunFailed,
}

/// An event in a pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineEvent {
    /// Unique event ID
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub kind: PipelineEventKind,
    /// Stage this event concerns, if any
    #[serde(default)]
    pub stage: Option<Stage>,
    /// Associated data (JSON)
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

impl PipelineEvent {
    pub fn new(kind: PipelineEventKind) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            kind,
            stage: None,
            data: None,
        }
    }

    /// Stage transition event
    pub fn stage_changed(stage: Stage, state: StageState) -> Self {
        Self::new(PipelineEventKind::StageChanged)
            .with_stage(stage)
            .with_data(serde_json::json!({ "state": state }))
    }

    pub fn with_stage(mut self, stage: Stage) -> Self {
        self.stage = Some(stage);
        self
    }

    /// Add data to the event
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}
