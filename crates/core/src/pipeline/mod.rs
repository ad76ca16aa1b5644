//! # Renovation Pipeline
//!
//! Drives a design from confirmed preferences to shown results.
//!
//! ## Pipeline Flow
//!
//! ```text
//! preferences → ┬ analysis      ┬ → polishing (detection) → history → results
//!               └ visualization ┘
//!                 (join barrier, fatal on failure → style)
//! ```

pub mod events;
pub mod merge;
pub mod navigation;
pub mod orchestrator;
pub mod status;

pub use events::{PipelineEvent, PipelineEventKind};
pub use merge::{merge_coordinates, ProductDetection};
pub use navigation::{HistoryStack, NavAction, NavigationPlatform, Navigator, PopEvent, Step};
pub use orchestrator::{BestEffort, Orchestrator, PipelineConfig, RunReport, RunWarning};
pub use status::{ProcessingStatus, Stage, StageState};
