//! # Design History
//!
//! Newest-first collection of saved designs, persisted as one JSON document
//! under a single well-known key.
//!
//! The store never refuses a save outright while it still has something to
//! give up: when the medium runs out of space, the oldest design is evicted
//! and the write is retried exactly once.

use chrono::{SubsecRound, Utc};
use uuid::Uuid;

use super::medium::StorageMedium;
use crate::design::{DesignDraft, SavedDesign};
use crate::error::StoreError;

/// Key under which the serialized collection is stored
pub const STORAGE_KEY: &str = "pinterestify_designs";

/// Capacity-aware store of saved designs
pub struct HistoryStore {
    medium: Box<dyn StorageMedium>,
}

impl HistoryStore {
    pub fn new(medium: impl StorageMedium + 'static) -> Self {
        Self {
            medium: Box::new(medium),
        }
    }

    /// Assign identity to a finished design and prepend it to the history
    ///
    /// A medium read failure aborts the save so the existing history is never overwritten.
    pub fn save(&self, draft: DesignDraft) -> Result<SavedDesign, StoreError> {
        let designs = self.load()?;
        // Persisted timestamps carry millisecond precision
        let saved = draft.into_saved(Uuid::new_v4().to_string(), Utc::now().trunc_subsecs(3));

        let mut updated = Vec::with_capacity(designs.len() + 1);
        updated.push(saved.clone());
        updated.extend(designs);

        match self.persist(&updated) {
            Ok(()) => {}
            Err(err) if err.is_capacity() && updated.len() > 1 => {
                let evicted = updated.pop();
                tracing::warn!(
                    evicted_id = evicted.as_ref().map(|d| d.id.as_str()).unwrap_or_default(),
                    "Storage quota exceeded, removing oldest design"
                );
                self.persist(&updated)?;
            }
            Err(err) => return Err(err),
        }

        tracing::info!(design_id = %saved.id, count = updated.len(), "Design saved to history");
        Ok(saved)
    }

    /// All saved designs, newest first. Unreadable or corrupt data reads as empty.
    pub fn list(&self) -> Vec<SavedDesign> {
        self.load().unwrap_or_else(|e| {
            tracing::warn!("Failed to read design history: {}", e);
            Vec::new()
        })
    }

    /// Look up a saved design by ID
    pub fn get(&self, id: &str) -> Result<Option<SavedDesign>, StoreError> {
        Ok(self.load()?.into_iter().find(|design| design.id == id))
    }

    /// Remove a design by ID and return what remains. Unknown IDs are a no-op.
    pub fn delete(&self, id: &str) -> Result<Vec<SavedDesign>, StoreError> {
        let mut designs = self.load()?;
        let before = designs.len();
        designs.retain(|design| design.id != id);

        if designs.len() == before {
            tracing::debug!(design_id = %id, "Design not in history, nothing to delete");
            return Ok(designs);
        }

        self.persist(&designs)?;
        tracing::info!(design_id = %id, "Design deleted from history");
        Ok(designs)
    }

    /// Current collection; absent or corrupt data is an empty one, a failed read is an error
    fn load(&self) -> Result<Vec<SavedDesign>, StoreError> {
        let Some(bytes) = self.medium.read(STORAGE_KEY)? else {
            return Ok(Vec::new());
        };

        match serde_json::from_slice(&bytes) {
            Ok(designs) => Ok(designs),
            Err(e) => {
                tracing::warn!("Discarding unreadable design history: {}", e);
                Ok(Vec::new())
            }
        }
    }

    fn persist(&self, designs: &[SavedDesign]) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(designs)?;
        self.medium.write(STORAGE_KEY, &bytes)?;
        Ok(())
    }
}
