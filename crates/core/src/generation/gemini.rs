//! Gemini REST implementation of [`GenerationBackend`].
//!
//! Calls `generateContent` directly over `reqwest`. Analysis and detection ask
//! for JSON constrained by a schema derived from the output types; the
//! visualization call returns its image as an inline-data part.

use async_trait::async_trait;
use reqwest::Client;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::prompts;
use super::{AnalysisRequest, GenerationBackend, VisualizationRequest};
use crate::design::{ProductRecommendation, RenovationAnalysis};
use crate::error::GenerationError;
use crate::image::ImageHandle;
use crate::models::{api_key_from_env, GenerationModels, ModelConfig, API_KEY_VARS};
use crate::pipeline::merge::ProductDetection;

/// Generation backend talking to the Gemini API
#[derive(Clone)]
pub struct GeminiBackend {
    client: Client,
    api_key: String,
    models: GenerationModels,
}

impl GeminiBackend {
    pub fn new(api_key: impl Into<String>, models: GenerationModels) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            models,
        }
    }

    /// Read the API key from `GEMINI_API_KEY` or `API_KEY`
    pub fn from_env(models: GenerationModels) -> Result<Self, GenerationError> {
        let api_key = api_key_from_env().ok_or_else(|| {
            GenerationError::Config(format!("set one of {}", API_KEY_VARS.join(" or ")))
        })?;
        Ok(Self::new(api_key, models))
    }

    pub fn models(&self) -> &GenerationModels {
        &self.models
    }

    async fn generate(
        &self,
        model: &ModelConfig,
        body: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, GenerationError> {
        let response = self
            .client
            .post(model.generate_content_url())
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read Gemini error body".to_string());
            return Err(GenerationError::Api {
                status,
                body: error_message(&body),
            });
        }

        Ok(response.json().await?)
    }

    async fn generate_json<T: DeserializeOwned>(
        &self,
        model: &ModelConfig,
        parts: Vec<Part>,
        schema: serde_json::Value,
        call: &'static str,
    ) -> Result<T, GenerationError> {
        let body = GenerateContentRequest::new(parts).with_json_schema(schema);
        let response = self.generate(model, &body).await?;
        let text = response
            .first_text()
            .ok_or(GenerationError::EmptyResponse(call))?;
        Ok(serde_json::from_str(text)?)
    }
}

#[async_trait]
impl GenerationBackend for GeminiBackend {
    #[tracing::instrument(skip_all, fields(model = %self.models.analysis.model))]
    async fn analyze(&self, request: &AnalysisRequest) -> Result<RenovationAnalysis, GenerationError> {
        let mut parts = vec![Part::image(&request.room_image)];
        if let Some(inspiration) = &request.inspiration_image {
            parts.push(Part::image(inspiration));
            parts.push(Part::text(
                "Use the second image as specific inspiration for the style.",
            ));
        }
        parts.push(Part::text(prompts::analysis_prompt(request)));

        let schema = response_schema::<RenovationAnalysis>()?;
        self.generate_json(&self.models.analysis, parts, schema, "analysis")
            .await
    }

    #[tracing::instrument(skip_all, fields(model = %self.models.visualization.model))]
    async fn visualize(&self, request: &VisualizationRequest) -> Result<ImageHandle, GenerationError> {
        let mut parts = vec![Part::image(&request.room_image)];
        if let Some(inspiration) = &request.inspiration_image {
            parts.push(Part::image(inspiration));
        }
        parts.push(Part::text(prompts::visualization_prompt(request)));

        let body = GenerateContentRequest::new(parts);
        let response = self.generate(&self.models.visualization, &body).await?;
        response
            .first_image()
            .ok_or(GenerationError::EmptyResponse("visualization"))
    }

    #[tracing::instrument(skip_all, fields(model = %self.models.detection.model, products = products.len()))]
    async fn detect_coordinates(
        &self,
        image: &ImageHandle,
        products: &[ProductRecommendation],
        style: Option<&str>,
    ) -> Result<Vec<ProductDetection>, GenerationError> {
        let parts = vec![
            Part::image(image),
            Part::text(prompts::detection_prompt(products, style)),
        ];
        let schema = response_schema::<Vec<ProductDetection>>()?;
        self.generate_json(&self.models.detection, parts, schema, "detection")
            .await
    }
}

/// JSON schema for `T` in the form `responseJsonSchema` accepts
fn response_schema<T: JsonSchema>() -> Result<serde_json::Value, GenerationError> {
    let mut schema = serde_json::to_value(schemars::schema_for!(T))?;
    if let Some(object) = schema.as_object_mut() {
        object.remove("$schema");
        object.remove("title");
    }
    Ok(schema)
}

/// Prefer the API's own error message over the raw body
fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorWrapper>(body)
        .ok()
        .map(|wrapper| match (wrapper.error.status, wrapper.error.message) {
            (Some(status), Some(message)) => format!("{status}: {message}"),
            (None, Some(message)) => message,
            _ => body.to_string(),
        })
        .unwrap_or_else(|| body.to_string())
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

impl GenerateContentRequest {
    fn new(parts: Vec<Part>) -> Self {
        Self {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts,
            }],
            generation_config: None,
        }
    }

    fn with_json_schema(mut self, schema: serde_json::Value) -> Self {
        self.generation_config = Some(GenerationConfig {
            response_mime_type: "application/json".to_string(),
            response_json_schema: schema,
        });
        self
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: String,
    response_json_schema: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

impl Part {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    fn image(image: &ImageHandle) -> Self {
        Self {
            inline_data: Some(InlineData {
                mime_type: image.mime_type().to_string(),
                data: image.base64_payload().to_string(),
            }),
            ..Default::default()
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

impl GenerateContentResponse {
    fn first_parts(&self) -> impl Iterator<Item = &Part> {
        self.candidates
            .first()
            .and_then(|candidate| candidate.content.as_ref())
            .map(|content| content.parts.iter())
            .into_iter()
            .flatten()
    }

    fn first_text(&self) -> Option<&str> {
        self.first_parts()
            .filter_map(|part| part.text.as_deref())
            .find(|text| !text.trim().is_empty())
    }

    fn first_image(&self) -> Option<ImageHandle> {
        self.first_parts()
            .filter_map(|part| part.inline_data.as_ref())
            .find(|inline| !inline.data.is_empty())
            .map(|inline| ImageHandle::from_base64(&inline.mime_type, &inline.data))
    }
}

#[derive(Deserialize)]
struct ErrorWrapper {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    status: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_shape() {
        let image = ImageHandle::from_base64("image/png", "QUJD");
        let body = GenerateContentRequest::new(vec![Part::image(&image), Part::text("hello")])
            .with_json_schema(serde_json::json!({ "type": "object" }));
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(json["contents"][0]["parts"][0]["inlineData"]["mimeType"], "image/png");
        assert_eq!(json["contents"][0]["parts"][0]["inlineData"]["data"], "QUJD");
        assert_eq!(json["contents"][0]["parts"][1]["text"], "hello");
        assert!(json["contents"][0]["parts"][1].get("inlineData").is_none());
        assert_eq!(json["generationConfig"]["responseMimeType"], "application/json");
    }

    #[test]
    fn test_plain_request_has_no_generation_config() {
        let body = GenerateContentRequest::new(vec![Part::text("render")]);
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("generationConfig").is_none());
    }

    #[test]
    fn test_first_image_skips_text_parts() {
        let response: GenerateContentResponse = serde_json::from_value(serde_json::json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [
                        { "text": "Here is your room" },
                        { "inlineData": { "mimeType": "image/png", "data": "aW1n" } }
                    ]
                }
            }]
        }))
        .unwrap();

        let image = response.first_image().unwrap();
        assert_eq!(image.as_str(), "data:image/png;base64,aW1n");
    }

    #[test]
    fn test_missing_candidates_yield_nothing() {
        let response: GenerateContentResponse = serde_json::from_str("{}").unwrap();
        assert!(response.first_text().is_none());
        assert!(response.first_image().is_none());
    }

    #[test]
    fn test_analysis_text_decodes() {
        let response: GenerateContentResponse = serde_json::from_value(serde_json::json!({
            "candidates": [{ "content": { "parts": [{
                "text": "{\"styleAnalysis\":\"Airy\",\"colorPalette\":[\"#FFFFFF\"],\"products\":[{\"name\":\"Lamp\",\"priceEstimate\":\"₹2,500\"}]}"
            }]}}]
        }))
        .unwrap();

        let analysis: RenovationAnalysis =
            serde_json::from_str(response.first_text().unwrap()).unwrap();
        assert_eq!(analysis.style_analysis, "Airy");
        assert_eq!(analysis.products[0].price_estimate, "₹2,500");
        assert!(analysis.design_tips.is_empty());
    }

    #[test]
    fn test_response_schema_is_stripped() {
        let schema = response_schema::<RenovationAnalysis>().unwrap();
        assert!(schema.get("$schema").is_none());
        assert!(schema.get("title").is_none());
        assert_eq!(schema["type"], "object");
        assert!(schema["properties"].get("styleAnalysis").is_some());
    }

    #[test]
    fn test_error_message_prefers_api_message() {
        let body = r#"{"error":{"code":429,"message":"Quota exhausted","status":"RESOURCE_EXHAUSTED"}}"#;
        assert_eq!(error_message(body), "RESOURCE_EXHAUSTED: Quota exhausted");
        assert_eq!(error_message("upstream timeout"), "upstream timeout");
    }
}
