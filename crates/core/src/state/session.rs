//! # Session State
//!
//! The single record describing the user's current inputs and results, and
//! the input handlers that write it. The orchestrator only ever writes the
//! pipeline-derived fields (`analysis_data`, `generated_image`, `error`).

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::design::{
    DesignDraft, Preferences, RenovationAnalysis, RoomType, SavedDesign, MAX_ROOM_LOCATIONS,
};
use crate::error::{NavigationError, SessionError};
use crate::image::ImageHandle;
use crate::pipeline::navigation::{
    HistoryStack, NavAction, NavigationPlatform, Navigator, PopEvent, Step,
};

/// Current inputs and results of the design flow
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub original_image: Option<ImageHandle>,
    pub inspiration_image: Option<ImageHandle>,
    pub selected_style: String,
    pub room_type: RoomType,
    pub room_locations: Vec<String>,
    pub room_size: String,
    pub room_purpose: String,
    pub generated_image: Option<ImageHandle>,
    pub analysis_data: Option<RenovationAnalysis>,
    pub error: Option<String>,
    pub budget: String,
    pub preferred_stores: Vec<String>,
    pub existing_furniture: String,
}

impl SessionState {
    /// Whether a complete pipeline result is present
    pub fn has_results(&self) -> bool {
        self.analysis_data.is_some() && self.generated_image.is_some()
    }

    /// Commit a finished run. Both halves are written together.
    fn commit_results(&mut self, analysis: RenovationAnalysis, image: ImageHandle) {
        self.analysis_data = Some(analysis);
        self.generated_image = Some(image);
    }

    fn load_design(&mut self, design: DesignDraft) {
        *self = SessionState {
            original_image: Some(design.original_image),
            inspiration_image: design.inspiration_image,
            selected_style: design.style,
            room_type: design.room_type,
            room_locations: design.room_locations,
            room_size: design.room_size,
            room_purpose: design.room_purpose,
            generated_image: Some(design.generated_image),
            analysis_data: Some(design.analysis_data),
            error: None,
            budget: design.budget,
            preferred_stores: design.preferred_stores,
            existing_furniture: design.existing_furniture,
        };
    }
}

/// Inputs captured when a run starts; the run works from this copy
#[derive(Debug, Clone)]
pub struct RunInputs {
    pub original_image: Option<ImageHandle>,
    pub inspiration_image: Option<ImageHandle>,
    pub style: String,
    pub room_type: RoomType,
    pub room_locations: Vec<String>,
    pub room_size: String,
    pub room_purpose: String,
    pub preferences: Preferences,
}

impl RunInputs {
    /// Pair the inputs with a finished result for persistence
    pub fn into_draft(
        self,
        original_image: ImageHandle,
        generated_image: ImageHandle,
        analysis: RenovationAnalysis,
    ) -> DesignDraft {
        DesignDraft {
            original_image,
            inspiration_image: self.inspiration_image,
            style: self.style,
            room_type: self.room_type,
            room_locations: self.room_locations,
            room_size: self.room_size,
            room_purpose: self.room_purpose,
            generated_image,
            analysis_data: analysis,
            budget: self.preferences.budget,
            preferred_stores: self.preferences.preferred_stores,
            existing_furniture: self.preferences.existing_furniture,
        }
    }
}

/// Session state plus the navigation machine that decides which step is shown
#[derive(Debug)]
pub struct SessionContext<P: NavigationPlatform = HistoryStack> {
    state: SessionState,
    navigator: Navigator<P>,
    /// Set between confirming preferences and the run's outcome
    run_active: bool,
}

/// Session context shared between input handlers and the orchestrator
pub type SharedSession<P = HistoryStack> = Arc<Mutex<SessionContext<P>>>;

impl<P: NavigationPlatform> SessionContext<P> {
    pub fn new(platform: P) -> Self {
        Self {
            state: SessionState::default(),
            navigator: Navigator::new(platform),
            run_active: false,
        }
    }

    pub fn into_shared(self) -> SharedSession<P> {
        Arc::new(Mutex::new(self))
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    #[cfg(test)]
    pub(crate) fn state_mut(&mut self) -> &mut SessionState {
        &mut self.state
    }

    pub fn step(&self) -> Step {
        self.navigator.step()
    }

    pub fn navigator(&self) -> &Navigator<P> {
        &self.navigator
    }

    fn navigate(&mut self, action: NavAction) -> Result<Step, SessionError> {
        Ok(self.navigator.apply(action)?)
    }

    // =========================================================================
    // Upload step
    // =========================================================================

    /// Room photo captured; moves on to style selection
    pub fn capture_image(&mut self, image: ImageHandle) -> Result<Step, SessionError> {
        let step = self.navigate(NavAction::ImageCaptured)?;
        self.state.original_image = Some(image);
        Ok(step)
    }

    pub fn select_room_type(&mut self, room_type: RoomType) {
        self.state.room_type = room_type;
    }

    /// Replace the selected room functions (at most three)
    pub fn select_room_locations(&mut self, locations: Vec<String>) -> Result<(), SessionError> {
        if locations.len() > MAX_ROOM_LOCATIONS {
            return Err(SessionError::TooManyLocations {
                count: locations.len(),
                max: MAX_ROOM_LOCATIONS,
            });
        }
        self.state.room_locations = locations;
        Ok(())
    }

    pub fn set_room_size(&mut self, size: impl Into<String>) {
        self.state.room_size = size.into();
    }

    pub fn set_room_purpose(&mut self, purpose: impl Into<String>) {
        self.state.room_purpose = purpose.into();
    }

    // =========================================================================
    // Style step
    // =========================================================================

    pub fn confirm_style(
        &mut self,
        style: impl Into<String>,
        inspiration_image: Option<ImageHandle>,
    ) -> Result<Step, SessionError> {
        let style = style.into();
        if style.trim().is_empty() {
            return Err(SessionError::EmptyStyle);
        }
        let step = self.navigate(NavAction::StyleConfirmed)?;
        self.state.selected_style = style;
        self.state.inspiration_image = inspiration_image;
        Ok(step)
    }

    // =========================================================================
    // Preferences step
    // =========================================================================

    /// Record preferences, enter the processing step and snapshot the run inputs.
    ///
    /// Clears any error left by a previous run.
    pub fn confirm_preferences(&mut self, preferences: Preferences) -> Result<RunInputs, SessionError> {
        validate_budget(&preferences.budget)?;
        self.navigate(NavAction::PreferencesConfirmed)?;
        self.run_active = true;

        self.state.budget = preferences.budget.clone();
        self.state.preferred_stores = preferences.preferred_stores.clone();
        self.state.existing_furniture = preferences.existing_furniture.clone();
        self.state.error = None;

        Ok(RunInputs {
            original_image: self.state.original_image.clone(),
            inspiration_image: self.state.inspiration_image.clone(),
            style: self.state.selected_style.clone(),
            room_type: self.state.room_type,
            room_locations: self.state.room_locations.clone(),
            room_size: self.state.room_size.clone(),
            room_purpose: self.state.room_purpose.clone(),
            preferences,
        })
    }

    // =========================================================================
    // Pipeline outcomes
    // =========================================================================

    /// Commit a finished run if the user is still on the processing step.
    ///
    /// Returns false, leaving state and navigation alone, once the user has moved on.
    pub(crate) fn complete_run(
        &mut self,
        analysis: RenovationAnalysis,
        image: ImageHandle,
    ) -> Result<bool, NavigationError> {
        self.run_active = false;
        if self.step() != Step::Processing {
            return Ok(false);
        }
        self.navigator.apply(NavAction::PipelineSucceeded)?;
        self.state.commit_results(analysis, image);
        Ok(true)
    }

    /// Record a fatal run error; sends the user back to style selection if still waiting
    pub(crate) fn fail_run(&mut self, message: impl Into<String>) -> bool {
        self.run_active = false;
        self.state.error = Some(message.into());
        self.step() == Step::Processing && self.navigator.apply(NavAction::PipelineFailed).is_ok()
    }

    // =========================================================================
    // History and navigation
    // =========================================================================

    pub fn open_history(&mut self) -> Result<Step, SessionError> {
        self.state.error = None;
        self.navigate(NavAction::HistoryRequested)
    }

    /// Replace the whole session with a saved design and show its results
    pub fn load_design(&mut self, design: SavedDesign) -> Result<Step, SessionError> {
        let step = self.navigate(NavAction::DesignLoaded)?;
        tracing::info!(design_id = %design.id, "Loaded saved design");
        self.state.load_design(design.design);
        Ok(step)
    }

    /// Start a new design from scratch
    pub fn reset(&mut self) -> Step {
        self.state = SessionState::default();
        // Reset is allowed from every step
        self.navigator.apply(NavAction::Reset).unwrap_or(Step::Upload)
    }

    /// Home button: resets unless already on the upload step
    pub fn go_home(&mut self) -> Step {
        if self.step() == Step::Upload {
            return Step::Upload;
        }
        self.reset()
    }

    /// Platform back gesture
    pub fn back(&mut self) -> Option<Step> {
        let step = self.navigator.back()?;
        Some(self.settle(step))
    }

    pub fn forward(&mut self) -> Option<Step> {
        let step = self.navigator.forward()?;
        Some(self.settle(step))
    }

    /// Pop event delivered by the platform outside of [`Self::back`]
    pub fn on_pop(&mut self, event: PopEvent) -> Step {
        let step = self.navigator.reconcile(event);
        self.settle(step)
    }

    /// A processing entry left behind by a finished run reopens the preferences step
    fn settle(&mut self, step: Step) -> Step {
        if step == Step::Processing && !self.run_active {
            return self.navigator.redirect(Step::Preferences);
        }
        step
    }
}

impl Default for SessionContext<HistoryStack> {
    fn default() -> Self {
        Self::new(HistoryStack::new())
    }
}

/// A budget must be present and read as a non-negative whole number
fn validate_budget(budget: &str) -> Result<(), SessionError> {
    let budget = budget.trim();
    if budget.is_empty() {
        return Err(SessionError::MissingBudget);
    }
    crate::generation::prompts::parse_budget(budget)
        .map(|_| ())
        .ok_or_else(|| SessionError::InvalidBudget(budget.to_string()))
}
