//! # Pipeline Orchestrator
//!
//! Runs one renovation pipeline per confirmed preferences step:
//!
//! 1. analysis and visualization in parallel behind a join barrier
//! 2. best-effort product detection on the rendered image
//! 3. best-effort persistence to the design history
//! 4. a short dwell, then results are committed and shown
//!
//! Only a barrier failure (or a missing room photo) is fatal. Everything after
//! the barrier degrades into a [`RunWarning`] instead.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

use super::events::{PipelineEvent, PipelineEventKind};
use super::merge::merge_coordinates;
use super::navigation::{HistoryStack, NavigationPlatform, Step};
use super::status::{ProcessingStatus, Stage, StageState};
use crate::design::{DesignDraft, Preferences, RenovationAnalysis};
use crate::error::{GenerationError, PipelineError, SessionError};
use crate::generation::{AnalysisRequest, GenerationBackend, VisualizationRequest};
use crate::image::ImageHandle;
use crate::models::GenerationModels;
use crate::state::history::HistoryStore;
use crate::state::session::{RunInputs, SharedSession};

/// Configuration for the orchestrator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Model per remote call
    pub models: GenerationModels,
    /// Pause on the finished status before showing results
    pub results_dwell_ms: u64,
    /// Message shown on the style step after a fatal failure
    pub failure_message: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            models: GenerationModels::default(),
            results_dwell_ms: 600,
            failure_message: "Something went wrong. Please try again.".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Load from a JSON file; missing fields take their defaults
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read pipeline config {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Invalid pipeline config {}", path.display()))
    }

    pub fn results_dwell(&self) -> Duration {
        Duration::from_millis(self.results_dwell_ms)
    }
}

/// Non-fatal problem encountered during a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunWarning {
    /// An enrichment step failed; its input was kept as-is
    DegradedResult { stage: Stage, reason: String },
    /// The finished design could not be written to history
    PersistenceFailure { reason: String },
}

/// A value that is usable even when the step producing it failed
#[derive(Debug, Clone, PartialEq)]
pub struct BestEffort<T> {
    pub value: T,
    pub warning: Option<RunWarning>,
}

impl<T> BestEffort<T> {
    pub fn ok(value: T) -> Self {
        Self {
            value,
            warning: None,
        }
    }

    pub fn degraded(value: T, warning: RunWarning) -> Self {
        Self {
            value,
            warning: Some(warning),
        }
    }

    pub fn into_parts(self) -> (T, Option<RunWarning>) {
        (self.value, self.warning)
    }
}

/// Outcome of a run that reached the end of the pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    /// Status at the end of the run
    pub status: ProcessingStatus,
    pub warnings: Vec<RunWarning>,
    /// History ID, absent if persistence failed
    pub saved_design_id: Option<String>,
    /// False if the user had left the processing step before results were ready
    pub committed: bool,
}

/// Clears the in-flight flag when a run ends, however it ends
struct RunGuard<'a>(&'a AtomicBool);

impl<'a> RunGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// The pipeline orchestrator
pub struct Orchestrator<P: NavigationPlatform = HistoryStack> {
    config: PipelineConfig,
    backend: Arc<dyn GenerationBackend>,
    history: Arc<HistoryStore>,
    session: SharedSession<P>,
    status_tx: watch::Sender<ProcessingStatus>,
    event_tx: Option<mpsc::Sender<PipelineEvent>>,
    running: AtomicBool,
}

impl<P: NavigationPlatform> Orchestrator<P> {
    pub fn new(
        config: PipelineConfig,
        backend: Arc<dyn GenerationBackend>,
        history: Arc<HistoryStore>,
        session: SharedSession<P>,
    ) -> Self {
        let (status_tx, _) = watch::channel(ProcessingStatus::default());
        Self {
            config,
            backend,
            history,
            session,
            status_tx,
            event_tx: None,
            running: AtomicBool::new(false),
        }
    }

    /// Set event channel for streaming events
    pub fn with_event_channel(mut self, tx: mpsc::Sender<PipelineEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn session(&self) -> &SharedSession<P> {
        &self.session
    }

    pub fn history(&self) -> &Arc<HistoryStore> {
        &self.history
    }

    /// Observe stage progress of the current run
    pub fn subscribe_status(&self) -> watch::Receiver<ProcessingStatus> {
        self.status_tx.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Open a saved design from the history step
    pub async fn load_saved_design(&self, id: &str) -> Result<Step, SessionError> {
        let design = self
            .history
            .get(id)?
            .ok_or_else(|| SessionError::DesignNotFound(id.to_string()))?;
        self.session.lock().await.load_design(design)
    }

    /// Confirm the preferences step and run the pipeline to completion.
    ///
    /// Rejected preferences and overlapping runs leave the session untouched.
    /// A fatal failure routes the user back to the style step with the
    /// configured message and is returned as the error.
    #[tracing::instrument(skip(self, preferences), fields(budget = %preferences.budget))]
    pub async fn submit_preferences(
        &self,
        preferences: Preferences,
    ) -> Result<RunReport, PipelineError> {
        let _guard = RunGuard::acquire(&self.running).ok_or(PipelineError::RunInFlight)?;

        let inputs = self.session.lock().await.confirm_preferences(preferences)?;
        tracing::info!(style = %inputs.style, locations = ?inputs.room_locations, "Pipeline run started");
        self.emit(PipelineEvent::new(PipelineEventKind::RunStarted))
            .await;

        let outcome = self.execute(inputs).await;
        let status = self.status_tx.send_replace(ProcessingStatus::default());

        match outcome {
            Ok(mut report) => {
                report.status = status;
                tracing::info!(
                    committed = report.committed,
                    warnings = report.warnings.len(),
                    "Pipeline run completed"
                );
                self.emit(
                    PipelineEvent::new(PipelineEventKind::RunCompleted).with_data(
                        serde_json::json!({
                            "committed": report.committed,
                            "saved_design_id": report.saved_design_id,
                        }),
                    ),
                )
                .await;
                Ok(report)
            }
            Err(err) => {
                let routed = if err.is_fatal() {
                    tracing::error!(error = %err, "Pipeline run failed");
                    self.session
                        .lock()
                        .await
                        .fail_run(self.config.failure_message.clone())
                } else {
                    tracing::warn!(error = %err, "Pipeline run rejected");
                    false
                };
                self.emit(
                    PipelineEvent::new(PipelineEventKind::RunFailed).with_data(serde_json::json!({
                        "error": err.to_string(),
                        "routed_to_style": routed,
                        "status": status,
                    })),
                )
                .await;
                Err(err)
            }
        }
    }

    async fn execute(&self, inputs: RunInputs) -> Result<RunReport, PipelineError> {
        let room_image = inputs
            .original_image
            .clone()
            .ok_or(PipelineError::MissingRoomImage)?;
        let mut warnings = Vec::new();

        let (analysis, generated_image) = self.generate(&room_image, &inputs).await?;

        let (analysis, warning) = self
            .locate_products(analysis, &generated_image, &inputs.style)
            .await
            .into_parts();
        warnings.extend(warning);

        let draft = inputs.into_draft(room_image, generated_image.clone(), analysis.clone());
        let (saved_design_id, warning) = self.persist(draft).await.into_parts();
        warnings.extend(warning);

        let dwell = self.config.results_dwell();
        if !dwell.is_zero() {
            tokio::time::sleep(dwell).await;
        }

        let committed = {
            let mut session = self.session.lock().await;
            let committed = session.complete_run(analysis, generated_image)?;
            if !committed {
                tracing::info!(step = %session.step(), "Session moved on, results not committed");
            }
            committed
        };

        Ok(RunReport {
            status: *self.status_tx.borrow(),
            warnings,
            saved_design_id,
            committed,
        })
    }

    /// Analysis and visualization behind a single join barrier
    async fn generate(
        &self,
        room_image: &ImageHandle,
        inputs: &RunInputs,
    ) -> Result<(RenovationAnalysis, ImageHandle), GenerationError> {
        let analysis_request = AnalysisRequest::from_inputs(room_image.clone(), inputs);
        let visualization_request = VisualizationRequest::from_inputs(room_image.clone(), inputs);

        self.advance(Stage::Analysis, StageState::Active).await;
        self.advance(Stage::Vision, StageState::Active).await;

        tokio::try_join!(
            async {
                let analysis = self.backend.analyze(&analysis_request).await?;
                self.advance(Stage::Analysis, StageState::Complete).await;
                Ok::<_, GenerationError>(analysis)
            },
            async {
                let image = self.backend.visualize(&visualization_request).await?;
                self.advance(Stage::Vision, StageState::Complete).await;
                Ok::<_, GenerationError>(image)
            },
        )
    }

    /// Annotate products with their position in the rendered image
    async fn locate_products(
        &self,
        mut analysis: RenovationAnalysis,
        image: &ImageHandle,
        style: &str,
    ) -> BestEffort<RenovationAnalysis> {
        self.advance(Stage::Polishing, StageState::Active).await;

        let result = match self
            .backend
            .detect_coordinates(image, &analysis.products, Some(style))
            .await
        {
            Ok(detections) => {
                let products = std::mem::take(&mut analysis.products);
                analysis.products = merge_coordinates(products, &detections);
                BestEffort::ok(analysis)
            }
            Err(e) => {
                tracing::warn!("Product detection failed, keeping products unannotated: {}", e);
                let warning = RunWarning::DegradedResult {
                    stage: Stage::Polishing,
                    reason: e.to_string(),
                };
                self.emit_warning(&warning).await;
                BestEffort::degraded(analysis, warning)
            }
        };

        self.advance(Stage::Polishing, StageState::Complete).await;
        result
    }

    /// Save the finished design on a blocking worker
    async fn persist(&self, draft: DesignDraft) -> BestEffort<Option<String>> {
        let history = Arc::clone(&self.history);
        let saved = tokio::task::spawn_blocking(move || history.save(draft)).await;

        let reason = match saved {
            Ok(Ok(design)) => {
                self.emit(
                    PipelineEvent::new(PipelineEventKind::DesignSaved)
                        .with_data(serde_json::json!({ "design_id": design.id })),
                )
                .await;
                return BestEffort::ok(Some(design.id));
            }
            Ok(Err(e)) => e.to_string(),
            Err(e) => format!("history worker failed: {}", e),
        };

        tracing::warn!("Failed to save design to history: {}", reason);
        let warning = RunWarning::PersistenceFailure { reason };
        self.emit_warning(&warning).await;
        BestEffort::degraded(None, warning)
    }

    /// Move a stage forward and publish the change
    async fn advance(&self, stage: Stage, state: StageState) {
        if self.status_tx.send_if_modified(|status| status.advance(stage, state)) {
            tracing::debug!(stage = stage.as_str(), ?state, "Stage changed");
            self.emit(PipelineEvent::stage_changed(stage, state)).await;
        }
    }

    async fn emit_warning(&self, warning: &RunWarning) {
        let mut event = PipelineEvent::new(PipelineEventKind::Warning);
        if let RunWarning::DegradedResult { stage, .. } = warning {
            event = event.with_stage(*stage);
        }
        if let Ok(data) = serde_json::to_value(warning) {
            event = event.with_data(data);
        }
        self.emit(event).await;
    }

    async fn emit(&self, event: PipelineEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::design::{Coordinates, ProductRecommendation, SavedDesign};
    use crate::error::MediumError;
    use crate::pipeline::merge::ProductDetection;
    use crate::state::medium::{MemoryMedium, StorageMedium};
    use crate::state::session::SessionContext;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    /// Generation backend driven by a fixed script
    #[derive(Default)]
    struct ScriptedBackend {
        fail_analysis: bool,
        fail_visualization: bool,
        fail_detection: bool,
        detections: Vec<ProductDetection>,
        analysis_gate: Option<Arc<Notify>>,
        visualization_gate: Option<Arc<Notify>>,
        calls: AtomicUsize,
    }

    impl ScriptedBackend {
        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    fn rendered() -> ImageHandle {
        ImageHandle::from_base64("image/png", "cmVuZGVy")
    }

    fn room() -> ImageHandle {
        ImageHandle::from_base64("image/jpeg", "cm9vbQ==")
    }

    fn plan() -> RenovationAnalysis {
        RenovationAnalysis {
            style_analysis: "Light woods, low profile furniture".to_string(),
            color_palette: vec!["#F5F0E8".to_string(), "#8B7355".to_string()],
            design_tips: vec!["Hide cables".to_string()],
            functional_additions: Vec::new(),
            products: vec![
                ProductRecommendation {
                    name: "Lamp".to_string(),
                    price_estimate: "₹2,500".to_string(),
                    ..Default::default()
                },
                ProductRecommendation {
                    name: "Rug".to_string(),
                    price_estimate: "₹6,000".to_string(),
                    ..Default::default()
                },
            ],
        }
    }

    #[async_trait]
    impl GenerationBackend for ScriptedBackend {
        async fn analyze(&self, _request: &AnalysisRequest) -> Result<RenovationAnalysis, GenerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.analysis_gate {
                gate.notified().await;
            }
            if self.fail_analysis {
                return Err(GenerationError::EmptyResponse("analysis"));
            }
            Ok(plan())
        }

        async fn visualize(&self, _request: &VisualizationRequest) -> Result<ImageHandle, GenerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.visualization_gate {
                gate.notified().await;
            }
            if self.fail_visualization {
                return Err(GenerationError::Api {
                    status: 500,
                    body: "render failed".to_string(),
                });
            }
            Ok(rendered())
        }

        async fn detect_coordinates(
            &self,
            _image: &ImageHandle,
            _products: &[ProductRecommendation],
            _style: Option<&str>,
        ) -> Result<Vec<ProductDetection>, GenerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_detection {
                return Err(GenerationError::EmptyResponse("detection"));
            }
            Ok(self.detections.clone())
        }
    }

    /// Medium whose writes always fail
    struct ReadOnlyMedium;

    impl StorageMedium for ReadOnlyMedium {
        fn read(&self, _key: &str) -> Result<Option<Vec<u8>>, MediumError> {
            Ok(None)
        }

        fn write(&self, _key: &str, _value: &[u8]) -> Result<(), MediumError> {
            Err(MediumError::Lock("read-only".to_string()))
        }
    }

    /// Medium that cannot be read
    struct UnreadableMedium;

    impl StorageMedium for UnreadableMedium {
        fn read(&self, _key: &str) -> Result<Option<Vec<u8>>, MediumError> {
            Err(MediumError::Lock("database is locked".to_string()))
        }

        fn write(&self, _key: &str, _value: &[u8]) -> Result<(), MediumError> {
            Ok(())
        }
    }

    fn lamp_detection() -> ProductDetection {
        ProductDetection {
            name: "Lamp".to_string(),
            found: true,
            x_min: 100.0,
            y_min: 200.0,
            x_max: 300.0,
            y_max: 400.0,
        }
    }

    fn test_config() -> PipelineConfig {
        PipelineConfig {
            results_dwell_ms: 0,
            ..PipelineConfig::default()
        }
    }

    fn prefs() -> Preferences {
        Preferences::new("40000", vec!["Ikea India".to_string()], "")
    }

    fn session_at_preferences() -> SharedSession {
        let mut session = SessionContext::<HistoryStack>::default();
        session.capture_image(room()).unwrap();
        session
            .select_room_locations(vec!["Bedroom".to_string()])
            .unwrap();
        session.confirm_style("Japandi", None).unwrap();
        session.into_shared()
    }

    async fn orchestrator_with(
        backend: ScriptedBackend,
        history: HistoryStore,
    ) -> (Orchestrator, Arc<ScriptedBackend>) {
        let backend = Arc::new(backend);
        let orchestrator = Orchestrator::new(
            test_config(),
            Arc::clone(&backend) as Arc<dyn GenerationBackend>,
            Arc::new(history),
            session_at_preferences(),
        );
        (orchestrator, backend)
    }

    fn history() -> HistoryStore {
        HistoryStore::new(MemoryMedium::new())
    }

    #[tokio::test]
    async fn test_successful_run_commits_jointly() {
        let (orchestrator, _) = orchestrator_with(
            ScriptedBackend {
                detections: vec![lamp_detection()],
                ..Default::default()
            },
            history(),
        )
        .await;

        let report = orchestrator.submit_preferences(prefs()).await.unwrap();

        assert!(report.committed);
        assert!(report.warnings.is_empty());
        assert!(report.status.is_complete());

        let session = orchestrator.session().lock().await;
        assert_eq!(session.step(), Step::Results);
        assert_eq!(session.state().generated_image, Some(rendered()));
        let analysis = session.state().analysis_data.as_ref().unwrap();
        assert_eq!(
            analysis.products[0].coordinates,
            Some(Coordinates { x: 20.0, y: 30.0 })
        );
        assert_eq!(analysis.products[1].coordinates, None);
        assert_eq!(session.state().error, None);
        drop(session);

        let saved: Vec<SavedDesign> = orchestrator.history().list();
        assert_eq!(saved.len(), 1);
        assert_eq!(report.saved_design_id.as_deref(), Some(saved[0].id.as_str()));
        assert_eq!(saved[0].design.budget, "40000");
        assert_eq!(saved[0].design.generated_image, rendered());
    }

    #[tokio::test]
    async fn test_barrier_failure_routes_back_to_style() {
        let (orchestrator, _) = orchestrator_with(
            ScriptedBackend {
                fail_visualization: true,
                ..Default::default()
            },
            history(),
        )
        .await;

        let err = orchestrator.submit_preferences(prefs()).await.unwrap_err();
        assert!(matches!(err, PipelineError::Generation(_)));

        let session = orchestrator.session().lock().await;
        assert_eq!(session.step(), Step::Style);
        assert_eq!(
            session.state().error.as_deref(),
            Some("Something went wrong. Please try again.")
        );
        // Inputs survive for a retry, nothing half-committed
        assert_eq!(session.state().original_image, Some(room()));
        assert_eq!(session.state().selected_style, "Japandi");
        assert_eq!(session.state().budget, "40000");
        assert_eq!(session.state().analysis_data, None);
        assert_eq!(session.state().generated_image, None);
        assert!(session.navigator().is_synchronized());
        drop(session);

        assert!(orchestrator.history().list().is_empty());
        assert_eq!(*orchestrator.subscribe_status().borrow(), ProcessingStatus::default());
    }

    #[tokio::test]
    async fn test_failure_keeps_previous_results() {
        let (orchestrator, _) = orchestrator_with(ScriptedBackend::default(), history()).await;
        orchestrator.submit_preferences(prefs()).await.unwrap();
        let before = orchestrator.session().lock().await.state().clone();

        // Back from results lands on preferences; retry with a failing backend
        let failing = Orchestrator::new(
            test_config(),
            Arc::new(ScriptedBackend {
                fail_analysis: true,
                ..Default::default()
            }),
            Arc::clone(orchestrator.history()),
            Arc::clone(orchestrator.session()),
        );
        assert_eq!(
            failing.session().lock().await.back(),
            Some(Step::Preferences)
        );
        failing.submit_preferences(prefs()).await.unwrap_err();

        let session = failing.session().lock().await;
        assert_eq!(session.step(), Step::Style);
        assert_eq!(session.state().analysis_data, before.analysis_data);
        assert_eq!(session.state().generated_image, before.generated_image);
    }

    #[tokio::test]
    async fn test_detection_failure_degrades_gracefully() {
        let (orchestrator, _) = orchestrator_with(
            ScriptedBackend {
                fail_detection: true,
                ..Default::default()
            },
            history(),
        )
        .await;

        let report = orchestrator.submit_preferences(prefs()).await.unwrap();

        assert!(report.committed);
        assert_eq!(report.status.polishing, StageState::Complete);
        assert!(matches!(
            report.warnings.as_slice(),
            [RunWarning::DegradedResult {
                stage: Stage::Polishing,
                ..
            }]
        ));

        let session = orchestrator.session().lock().await;
        assert_eq!(session.step(), Step::Results);
        assert_eq!(session.state().analysis_data, Some(plan()));
    }

    #[tokio::test]
    async fn test_persistence_failure_still_shows_results() {
        let (orchestrator, _) = orchestrator_with(
            ScriptedBackend::default(),
            HistoryStore::new(ReadOnlyMedium),
        )
        .await;

        let report = orchestrator.submit_preferences(prefs()).await.unwrap();

        assert!(report.committed);
        assert_eq!(report.saved_design_id, None);
        assert!(matches!(
            report.warnings.as_slice(),
            [RunWarning::PersistenceFailure { .. }]
        ));
        let session = orchestrator.session().lock().await;
        assert_eq!(session.step(), Step::Results);
        assert!(session.state().has_results());
    }

    #[tokio::test]
    async fn test_missing_room_image_is_fatal() {
        let (orchestrator, backend) = orchestrator_with(ScriptedBackend::default(), history()).await;
        orchestrator.session().lock().await.state_mut().original_image = None;

        let err = orchestrator.submit_preferences(prefs()).await.unwrap_err();

        assert!(matches!(err, PipelineError::MissingRoomImage));
        assert_eq!(backend.calls(), 0);
        let session = orchestrator.session().lock().await;
        assert_eq!(session.step(), Step::Style);
        assert!(session.state().error.is_some());
    }

    #[tokio::test]
    async fn test_invalid_preferences_are_not_a_run() {
        let (orchestrator, backend) = orchestrator_with(ScriptedBackend::default(), history()).await;

        let err = orchestrator
            .submit_preferences(Preferences::new("", Vec::new(), ""))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PipelineError::Session(SessionError::MissingBudget)
        ));
        assert_eq!(backend.calls(), 0);
        assert_eq!(orchestrator.session().lock().await.step(), Step::Preferences);
        assert!(!orchestrator.is_running());
    }

    #[tokio::test]
    async fn test_overlapping_run_rejected() {
        let gate = Arc::new(Notify::new());
        let (orchestrator, _) = orchestrator_with(
            ScriptedBackend {
                analysis_gate: Some(Arc::clone(&gate)),
                ..Default::default()
            },
            history(),
        )
        .await;
        let orchestrator = Arc::new(orchestrator);
        let mut status = orchestrator.subscribe_status();

        let first = tokio::spawn({
            let orchestrator = Arc::clone(&orchestrator);
            async move { orchestrator.submit_preferences(prefs()).await }
        });
        status.wait_for(|s| s.analysis == StageState::Active).await.unwrap();

        let err = orchestrator
            .submit_preferences(Preferences::new("99999", Vec::new(), "Piano"))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::RunInFlight));
        {
            let session = orchestrator.session().lock().await;
            assert_eq!(session.step(), Step::Processing);
            assert_eq!(session.state().budget, "40000");
        }

        gate.notify_one();
        let report = first.await.unwrap().unwrap();
        assert!(report.committed);
        assert!(!orchestrator.is_running());
    }

    #[tokio::test]
    async fn test_stage_progress_is_observable() {
        let gate = Arc::new(Notify::new());
        let (orchestrator, _) = orchestrator_with(
            ScriptedBackend {
                visualization_gate: Some(Arc::clone(&gate)),
                ..Default::default()
            },
            history(),
        )
        .await;
        let (tx, mut rx) = mpsc::channel(64);
        let orchestrator = Arc::new(orchestrator.with_event_channel(tx));
        let mut status = orchestrator.subscribe_status();

        let run = tokio::spawn({
            let orchestrator = Arc::clone(&orchestrator);
            async move { orchestrator.submit_preferences(prefs()).await }
        });

        let observed = *status
            .wait_for(|s| s.analysis == StageState::Complete)
            .await
            .unwrap();
        assert_eq!(observed.vision, StageState::Active);
        assert_eq!(observed.polishing, StageState::Pending);
        assert_eq!(observed.progress_percent(), 55);

        gate.notify_one();
        run.await.unwrap().unwrap();

        let mut kinds = Vec::new();
        while let Ok(event) = rx.try_recv() {
            kinds.push(event.kind);
        }
        assert_eq!(kinds.first(), Some(&PipelineEventKind::RunStarted));
        assert_eq!(kinds.last(), Some(&PipelineEventKind::RunCompleted));
        assert!(kinds.contains(&PipelineEventKind::DesignSaved));
        assert_eq!(
            kinds
                .iter()
                .filter(|k| **k == PipelineEventKind::StageChanged)
                .count(),
            6
        );
    }

    #[tokio::test]
    async fn test_abandoned_run_is_saved_but_not_committed() {
        let gate = Arc::new(Notify::new());
        let (orchestrator, _) = orchestrator_with(
            ScriptedBackend {
                analysis_gate: Some(Arc::clone(&gate)),
                ..Default::default()
            },
            history(),
        )
        .await;
        let orchestrator = Arc::new(orchestrator);
        let mut status = orchestrator.subscribe_status();

        let run = tokio::spawn({
            let orchestrator = Arc::clone(&orchestrator);
            async move { orchestrator.submit_preferences(prefs()).await }
        });
        // Only analysis is gated; vision may already be complete by now
        status.wait_for(|s| s.analysis == StageState::Active).await.unwrap();

        assert_eq!(orchestrator.session().lock().await.reset(), Step::Upload);
        gate.notify_one();
        let report = run.await.unwrap().unwrap();

        assert!(!report.committed);
        assert!(report.saved_design_id.is_some());
        let session = orchestrator.session().lock().await;
        assert_eq!(session.step(), Step::Upload);
        assert!(!session.state().has_results());
        assert!(session.navigator().is_synchronized());
        drop(session);
        assert_eq!(orchestrator.history().list().len(), 1);
    }

    #[tokio::test]
    async fn test_back_from_results_lands_on_preferences() {
        let (orchestrator, _) = orchestrator_with(ScriptedBackend::default(), history()).await;
        orchestrator.submit_preferences(prefs()).await.unwrap();

        let mut session = orchestrator.session().lock().await;
        assert_eq!(session.back(), Some(Step::Preferences));
        assert_eq!(session.back(), Some(Step::Style));
        assert_eq!(session.forward(), Some(Step::Preferences));
        assert!(session.navigator().is_synchronized());
    }

    #[tokio::test]
    async fn test_load_saved_design() {
        let (orchestrator, _) = orchestrator_with(ScriptedBackend::default(), history()).await;
        let report = orchestrator.submit_preferences(prefs()).await.unwrap();
        let id = report.saved_design_id.unwrap();

        assert_eq!(orchestrator.session().lock().await.reset(), Step::Upload);
        orchestrator.session().lock().await.open_history().unwrap();

        assert!(matches!(
            orchestrator.load_saved_design("missing").await,
            Err(SessionError::DesignNotFound(_))
        ));
        assert_eq!(orchestrator.load_saved_design(&id).await.unwrap(), Step::Results);
        let session = orchestrator.session().lock().await;
        assert_eq!(session.state().selected_style, "Japandi");
        assert_eq!(session.state().generated_image, Some(rendered()));
    }

    #[tokio::test]
    async fn test_load_saved_design_reports_unreadable_history() {
        let (orchestrator, _) =
            orchestrator_with(ScriptedBackend::default(), HistoryStore::new(UnreadableMedium)).await;
        orchestrator.session().lock().await.open_history().unwrap();

        let err = orchestrator.load_saved_design("any").await.unwrap_err();
        assert!(matches!(err, SessionError::Store(_)));
        assert_eq!(orchestrator.session().lock().await.step(), Step::History);
    }

    #[tokio::test]
    async fn test_unreadable_history_is_a_persistence_warning() {
        let (orchestrator, _) =
            orchestrator_with(ScriptedBackend::default(), HistoryStore::new(UnreadableMedium)).await;

        let report = orchestrator.submit_preferences(prefs()).await.unwrap();

        assert!(report.committed);
        assert_eq!(report.saved_design_id, None);
        assert!(matches!(
            report.warnings.as_slice(),
            [RunWarning::PersistenceFailure { .. }]
        ));
    }

    #[test]
    fn test_config_defaults_and_partial_load() {
        let config = PipelineConfig::default();
        assert_eq!(config.results_dwell(), Duration::from_millis(600));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.json");
        std::fs::write(&path, r#"{"results_dwell_ms": 0}"#).unwrap();

        let loaded = PipelineConfig::load(&path).unwrap();
        assert_eq!(loaded.results_dwell_ms, 0);
        assert_eq!(loaded.failure_message, config.failure_message);
        assert_eq!(loaded.models, GenerationModels::default());

        assert!(PipelineConfig::load(dir.path().join("absent.json")).is_err());
    }

    #[test]
    fn test_run_guard_releases_on_drop() {
        let flag = AtomicBool::new(false);
        let guard = RunGuard::acquire(&flag).unwrap();
        assert!(RunGuard::acquire(&flag).is_none());
        drop(guard);
        assert!(RunGuard::acquire(&flag).is_some());
    }
}
