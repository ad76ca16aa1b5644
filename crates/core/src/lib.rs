//! # Pinterestify Core
//!
//! Business logic of the Pinterestify renovation app: the generation
//! pipeline, the step navigation machine and the bounded design history.
//!
//! ## Architecture
//!
//! - `design` - Domain records (analysis, products, saved designs, styles)
//! - `generation/` - Remote generation capability and the Gemini client
//! - `models` - Model selection per remote call
//! - `pipeline/` - Orchestrator, processing status, navigation and coordinate merge
//! - `state/` - Session state, history store and storage media
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pinterestify_core::generation::GeminiBackend;
//! use pinterestify_core::pipeline::{Orchestrator, PipelineConfig};
//! use pinterestify_core::state::{HistoryStore, SessionContext, SqliteMedium};
//!
//! let config = PipelineConfig::default();
//! let backend = Arc::new(GeminiBackend::from_env(config.models.clone())?);
//! let history = Arc::new(HistoryStore::new(SqliteMedium::open()?));
//! let orchestrator = Orchestrator::new(config, backend, history, SessionContext::default().into_shared());
//! let report = orchestrator.submit_preferences(preferences).await?;
//! ```

pub mod design;
pub mod error;
pub mod generation;
pub mod image;
pub mod models;
pub mod pipeline;
pub mod state;
