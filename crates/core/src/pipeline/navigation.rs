//! # Navigation State Machine
//!
//! Maps user actions onto the fixed step sequence and mirrors every
//! transition onto the platform history stack, so a back gesture always lands
//! on a step the application agrees with.
//!
//! ```text
//! upload → style → preferences → processing ─┬→ results
//!    ↑                              ↑        └→ style (failure)
//!    └──── reset (any)              └─ history (any) → results
//! ```

use serde::{Deserialize, Serialize};

use crate::error::NavigationError;

/// Screen currently shown to the user
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    #[default]
    Upload,
    Style,
    Preferences,
    Processing,
    Results,
    History,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::Upload => "upload",
            Step::Style => "style",
            Step::Preferences => "preferences",
            Step::Processing => "processing",
            Step::Results => "results",
            Step::History => "history",
        }
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-driven transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavAction {
    /// Room photo captured on the upload step
    ImageCaptured,
    StyleConfirmed,
    /// Starts a pipeline run
    PreferencesConfirmed,
    PipelineSucceeded,
    /// Fatal pipeline error; the user retries from the style step
    PipelineFailed,
    HistoryRequested,
    /// A saved design was opened from the history step
    DesignLoaded,
    Reset,
}

impl NavAction {
    /// Target step when taken from `from`, `None` if the transition is not allowed
    pub fn target(self, from: Step) -> Option<Step> {
        match (self, from) {
            (NavAction::ImageCaptured, Step::Upload) => Some(Step::Style),
            (NavAction::StyleConfirmed, Step::Style) => Some(Step::Preferences),
            (NavAction::PreferencesConfirmed, Step::Preferences) => Some(Step::Processing),
            (NavAction::PipelineSucceeded, Step::Processing) => Some(Step::Results),
            (NavAction::PipelineFailed, Step::Processing) => Some(Step::Style),
            (NavAction::HistoryRequested, _) => Some(Step::History),
            (NavAction::DesignLoaded, Step::History) => Some(Step::Results),
            (NavAction::Reset, _) => Some(Step::Upload),
            _ => None,
        }
    }

    /// Processing is transient: leaving it overwrites its history entry
    fn replaces_entry(self) -> bool {
        matches!(
            self,
            NavAction::PipelineSucceeded | NavAction::PipelineFailed
        )
    }
}

/// Delivered by the platform when the current history entry changes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PopEvent {
    /// Tag of the entry that is now current, if it carries one
    pub tag: Option<Step>,
}

/// Push-state style history owned by the host platform
pub trait NavigationPlatform: Send {
    /// Add an entry after the current one, discarding forward entries
    fn push_state(&mut self, tag: Step);

    /// Overwrite the tag of the current entry
    fn replace_state(&mut self, tag: Step);

    /// Tag of the current entry
    fn current(&self) -> Option<Step>;

    /// Tag of the entry before the current one; `None` at the first entry or when untagged
    fn previous(&self) -> Option<Step>;

    /// Move one entry back; `None` when already at the first entry
    fn go_back(&mut self) -> Option<PopEvent>;

    /// Move one entry forward; `None` when already at the last entry
    fn go_forward(&mut self) -> Option<PopEvent>;
}

/// In-process history with browser semantics
#[derive(Debug, Clone)]
pub struct HistoryStack {
    entries: Vec<Option<Step>>,
    cursor: usize,
}

impl Default for HistoryStack {
    fn default() -> Self {
        Self {
            entries: vec![None],
            cursor: 0,
        }
    }
}

impl HistoryStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[Option<Step>] {
        &self.entries
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }
}

impl NavigationPlatform for HistoryStack {
    fn push_state(&mut self, tag: Step) {
        self.entries.truncate(self.cursor + 1);
        self.entries.push(Some(tag));
        self.cursor = self.entries.len() - 1;
    }

    fn replace_state(&mut self, tag: Step) {
        self.entries[self.cursor] = Some(tag);
    }

    fn current(&self) -> Option<Step> {
        self.entries[self.cursor]
    }

    fn previous(&self) -> Option<Step> {
        self.cursor.checked_sub(1).and_then(|i| self.entries[i])
    }

    fn go_back(&mut self) -> Option<PopEvent> {
        if self.cursor == 0 {
            return None;
        }
        self.cursor -= 1;
        Some(PopEvent {
            tag: self.entries[self.cursor],
        })
    }

    fn go_forward(&mut self) -> Option<PopEvent> {
        if self.cursor + 1 >= self.entries.len() {
            return None;
        }
        self.cursor += 1;
        Some(PopEvent {
            tag: self.entries[self.cursor],
        })
    }
}

/// The step state machine, kept in lockstep with its platform
#[derive(Debug)]
pub struct Navigator<P: NavigationPlatform> {
    step: Step,
    platform: P,
}

impl<P: NavigationPlatform> Navigator<P> {
    /// Take over the platform's current entry as the initial upload step
    pub fn new(mut platform: P) -> Self {
        platform.replace_state(Step::Upload);
        Self {
            step: Step::Upload,
            platform,
        }
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// Apply a transition, recording it on the platform stack
    pub fn apply(&mut self, action: NavAction) -> Result<Step, NavigationError> {
        let from = self.step;
        let to = action
            .target(from)
            .ok_or(NavigationError::InvalidTransition { from, action })?;

        if action.replaces_entry() {
            self.platform.replace_state(to);
        } else {
            self.platform.push_state(to);
        }
        self.step = to;

        tracing::debug!(%from, %to, ?action, "Step transition");
        Ok(to)
    }

    /// Adopt the step carried by an externally delivered pop event
    pub fn reconcile(&mut self, event: PopEvent) -> Step {
        self.step = event.tag.unwrap_or(Step::Upload);
        tracing::debug!(step = %self.step, "Reconciled step with platform history");
        self.step
    }

    /// Navigate back on the platform and reconcile. `None` if there is nothing to go back to.
    pub fn back(&mut self) -> Option<Step> {
        let event = self.platform.go_back()?;
        Some(self.reconcile(event))
    }

    /// Navigate forward on the platform and reconcile
    pub fn forward(&mut self) -> Option<Step> {
        let event = self.platform.go_forward()?;
        Some(self.reconcile(event))
    }

    /// Move off the current entry onto `step`.
    ///
    /// Steps back when the previous entry already holds `step`, so the stack never
    /// carries the same step twice in a row. Otherwise the current entry is overwritten.
    pub fn redirect(&mut self, step: Step) -> Step {
        let from = self.step;
        if self.platform.previous() == Some(step) {
            if let Some(event) = self.platform.go_back() {
                tracing::debug!(%from, to = %step, "Redirected onto previous history entry");
                return self.reconcile(event);
            }
        }
        self.platform.replace_state(step);
        self.step = step;
        tracing::debug!(%from, to = %step, "Redirected current history entry");
        step
    }

    /// Whether the in-memory step agrees with the platform's current entry
    pub fn is_synchronized(&self) -> bool {
        self.platform.current().unwrap_or(Step::Upload) == self.step
    }
}
