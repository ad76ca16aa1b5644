//! # Processing Status
//!
//! Per-stage progress of a pipeline run, shown on the processing screen.

use serde::{Deserialize, Serialize};

/// State of a single stage. Only ever moves forward.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageState {
    #[default]
    Pending,
    Active,
    Complete,
}

/// Stage of the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Structured renovation plan
    Analysis,
    /// Rendering the renovated room
    Vision,
    /// Locating products in the rendered image
    Polishing,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Analysis => "analysis",
            Stage::Vision => "vision",
            Stage::Polishing => "polishing",
        }
    }

    /// Progress bar contribution while active and once complete
    fn weights(&self) -> (u8, u8) {
        match self {
            Stage::Analysis => (10, 40),
            Stage::Vision => (10, 45),
            Stage::Polishing => (5, 10),
        }
    }
}

/// Progress of one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingStatus {
    pub analysis: StageState,
    pub vision: StageState,
    pub polishing: StageState,
}

const BASE_PROGRESS: u8 = 5;

impl ProcessingStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, stage: Stage) -> StageState {
        match stage {
            Stage::Analysis => self.analysis,
            Stage::Vision => self.vision,
            Stage::Polishing => self.polishing,
        }
    }

    /// Move a stage forward. Returns false if the stage was already at or past `state`.
    pub fn advance(&mut self, stage: Stage, state: StageState) -> bool {
        let slot = match stage {
            Stage::Analysis => &mut self.analysis,
            Stage::Vision => &mut self.vision,
            Stage::Polishing => &mut self.polishing,
        };
        if state <= *slot {
            return false;
        }
        *slot = state;
        true
    }

    pub fn activate(&mut self, stage: Stage) -> bool {
        self.advance(stage, StageState::Active)
    }

    pub fn complete(&mut self, stage: Stage) -> bool {
        self.advance(stage, StageState::Complete)
    }

    /// Check if every stage is complete
    pub fn is_complete(&self) -> bool {
        [self.analysis, self.vision, self.polishing]
            .iter()
            .all(|s| *s == StageState::Complete)
    }

    /// Overall progress in percent
    pub fn progress_percent(&self) -> u8 {
        let stages = [Stage::Analysis, Stage::Vision, Stage::Polishing];
        let total = stages.iter().fold(BASE_PROGRESS, |acc, stage| {
            let (active, complete) = stage.weights();
            acc + match self.get(*stage) {
                StageState::Pending => 0,
                StageState::Active => active,
                StageState::Complete => complete,
            }
        });
        total.min(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions_are_monotonic() {
        let mut status = ProcessingStatus::new();
        assert!(status.activate(Stage::Analysis));
        assert!(status.complete(Stage::Analysis));

        // No going back
        assert!(!status.activate(Stage::Analysis));
        assert_eq!(status.analysis, StageState::Complete);
        assert!(!status.complete(Stage::Analysis));
    }

    #[test]
    fn test_pending_straight_to_complete() {
        let mut status = ProcessingStatus::new();
        assert!(status.complete(Stage::Polishing));
        assert_eq!(status.get(Stage::Polishing), StageState::Complete);
    }

    #[test]
    fn test_progress_percent() {
        let mut status = ProcessingStatus::new();
        assert_eq!(status.progress_percent(), 5);

        status.activate(Stage::Analysis);
        status.activate(Stage::Vision);
        assert_eq!(status.progress_percent(), 25);

        status.complete(Stage::Analysis);
        assert_eq!(status.progress_percent(), 55);

        status.complete(Stage::Vision);
        status.activate(Stage::Polishing);
        assert_eq!(status.progress_percent(), 95);

        status.complete(Stage::Polishing);
        assert_eq!(status.progress_percent(), 100);
        assert!(status.is_complete());
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let mut status = ProcessingStatus::new();
        status.activate(Stage::Vision);
        let json = serde_json::to_value(status).unwrap();
        assert_eq!(json["vision"], "active");
        assert_eq!(json["analysis"], "pending");
    }
}
