//! # Generation
//!
//! The remote capability behind a pipeline run: a structured renovation plan,
//! a rendered image of the renovated room and best-effort product locations.
//!
//! [`GenerationBackend`] is the seam the orchestrator depends on;
//! [`gemini::GeminiBackend`] is the production implementation.

pub mod gemini;
pub mod prompts;

use async_trait::async_trait;

use crate::design::{Preferences, ProductRecommendation, RenovationAnalysis, RoomType};
use crate::error::GenerationError;
use crate::image::ImageHandle;
use crate::pipeline::merge::ProductDetection;
use crate::state::session::RunInputs;

pub use gemini::GeminiBackend;

/// Inputs for the analysis call
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub room_image: ImageHandle,
    pub style: String,
    pub room_type: RoomType,
    pub room_locations: Vec<String>,
    pub room_size: String,
    pub room_purpose: String,
    pub inspiration_image: Option<ImageHandle>,
    pub preferences: Option<Preferences>,
}

impl AnalysisRequest {
    pub fn from_inputs(room_image: ImageHandle, inputs: &RunInputs) -> Self {
        Self {
            room_image,
            style: inputs.style.clone(),
            room_type: inputs.room_type,
            room_locations: inputs.room_locations.clone(),
            room_size: inputs.room_size.clone(),
            room_purpose: inputs.room_purpose.clone(),
            inspiration_image: inputs.inspiration_image.clone(),
            preferences: Some(inputs.preferences.clone()),
        }
    }
}

/// Inputs for the visualization call
#[derive(Debug, Clone)]
pub struct VisualizationRequest {
    pub room_image: ImageHandle,
    pub style: String,
    pub room_type: RoomType,
    pub room_locations: Vec<String>,
    pub room_size: String,
    pub room_purpose: String,
    pub inspiration_image: Option<ImageHandle>,
    pub existing_items: Option<String>,
    pub budget: Option<String>,
}

impl VisualizationRequest {
    pub fn from_inputs(room_image: ImageHandle, inputs: &RunInputs) -> Self {
        let non_empty = |s: &str| Some(s.to_string()).filter(|s| !s.trim().is_empty());
        Self {
            room_image,
            style: inputs.style.clone(),
            room_type: inputs.room_type,
            room_locations: inputs.room_locations.clone(),
            room_size: inputs.room_size.clone(),
            room_purpose: inputs.room_purpose.clone(),
            inspiration_image: inputs.inspiration_image.clone(),
            existing_items: non_empty(&inputs.preferences.existing_furniture),
            budget: non_empty(&inputs.preferences.budget),
        }
    }
}

/// Remote generation capability
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Structured renovation plan for the room
    async fn analyze(&self, request: &AnalysisRequest) -> Result<RenovationAnalysis, GenerationError>;

    /// Rendered image of the renovated room
    async fn visualize(&self, request: &VisualizationRequest) -> Result<ImageHandle, GenerationError>;

    /// Bounding boxes for the listed products inside `image`
    async fn detect_coordinates(
        &self,
        image: &ImageHandle,
        products: &[ProductRecommendation],
        style: Option<&str>,
    ) -> Result<Vec<ProductDetection>, GenerationError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs() -> RunInputs {
        RunInputs {
            original_image: Some(ImageHandle::from_base64("image/jpeg", "cm9vbQ==")),
            inspiration_image: None,
            style: "Scandinavian".to_string(),
            room_type: RoomType::SingleWall,
            room_locations: vec!["Kitchen".to_string()],
            room_size: "8x6".to_string(),
            room_purpose: String::new(),
            preferences: Preferences::new("30000", Vec::new(), "  "),
        }
    }

    #[test]
    fn test_visualization_request_drops_blank_fields() {
        let inputs = inputs();
        let image = ImageHandle::from_base64("image/jpeg", "cm9vbQ==");
        let request = VisualizationRequest::from_inputs(image, &inputs);

        assert_eq!(request.budget.as_deref(), Some("30000"));
        assert_eq!(request.existing_items, None);
        assert_eq!(request.room_type, RoomType::SingleWall);
    }

    #[test]
    fn test_analysis_request_carries_preferences() {
        let inputs = inputs();
        let image = ImageHandle::from_base64("image/jpeg", "cm9vbQ==");
        let request = AnalysisRequest::from_inputs(image, &inputs);
        assert_eq!(request.preferences, Some(inputs.preferences.clone()));
        assert_eq!(request.style, "Scandinavian");
    }
}
