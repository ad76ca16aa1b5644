//! # Errors
//!
//! Typed errors for each component boundary. Only [`PipelineError`] is ever
//! surfaced to the user; enrichment and persistence failures are contained
//! by the orchestrator and reported as warnings instead.

use thiserror::Error;

use crate::pipeline::navigation::{NavAction, Step};

/// Failure of a remote generation call
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("generation API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("{0} returned no usable content")]
    EmptyResponse(&'static str),

    #[error("failed to decode model output: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Failure of the key/value medium under the history store
#[derive(Debug, Error)]
pub enum MediumError {
    #[error("storage quota exceeded: {requested} bytes requested, quota is {quota} bytes")]
    QuotaExceeded { requested: u64, quota: u64 },

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("lock error: {0}")]
    Lock(String),
}

impl MediumError {
    /// Whether the medium rejected the write for lack of space
    pub fn is_capacity(&self) -> bool {
        matches!(self, MediumError::QuotaExceeded { .. })
    }
}

/// Failure of a history store operation
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Medium(#[from] MediumError),

    #[error("failed to serialize design history: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl StoreError {
    pub fn is_capacity(&self) -> bool {
        matches!(self, StoreError::Medium(err) if err.is_capacity())
    }
}

/// Rejected step transition
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NavigationError {
    #[error("cannot apply {action:?} while on the {from} step")]
    InvalidTransition { from: Step, action: NavAction },
}

/// Rejected user input
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("at most {max} room locations can be selected, got {count}")]
    TooManyLocations { count: usize, max: usize },

    #[error("please specify a budget")]
    MissingBudget,

    #[error("invalid budget: {0}")]
    InvalidBudget(String),

    #[error("please describe a style or add an inspiration image")]
    EmptyStyle,

    #[error("saved design '{0}' not found")]
    DesignNotFound(String),

    #[error(transparent)]
    Navigation(#[from] NavigationError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Outcome of a pipeline run that did not reach the results step
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("no room image found")]
    MissingRoomImage,

    #[error("generation failed: {0}")]
    Generation(#[from] GenerationError),

    #[error("a pipeline run is already in progress")]
    RunInFlight,

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Navigation(#[from] NavigationError),
}

impl PipelineError {
    /// Fatal errors are the ones routed back to the style step with a user-visible message
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PipelineError::MissingRoomImage | PipelineError::Generation(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_detection_through_store_error() {
        let err = StoreError::from(MediumError::QuotaExceeded {
            requested: 10,
            quota: 5,
        });
        assert!(err.is_capacity());

        let err = StoreError::from(MediumError::Lock("poisoned".to_string()));
        assert!(!err.is_capacity());
    }

    #[test]
    fn test_fatal_classification() {
        assert!(PipelineError::MissingRoomImage.is_fatal());
        assert!(PipelineError::Generation(GenerationError::EmptyResponse("visualize")).is_fatal());
        assert!(!PipelineError::RunInFlight.is_fatal());
        assert!(!PipelineError::Session(SessionError::MissingBudget).is_fatal());
    }

    #[test]
    fn test_navigation_error_message() {
        let err = NavigationError::InvalidTransition {
            from: Step::Upload,
            action: NavAction::DesignLoaded,
        };
        assert_eq!(err.to_string(), "cannot apply DesignLoaded while on the upload step");
    }
}
