//! # Image Handles
//!
//! Images travel through the system as opaque `data:` URLs. Nothing in the
//! core inspects pixels; the handle only knows how to expose its mime type and
//! base64 payload to the generation backend.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

const DEFAULT_MIME_TYPE: &str = "image/jpeg";

/// An encoded image, stored as `data:<mime>;base64,<payload>`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageHandle(String);

impl ImageHandle {
    /// Encode raw bytes into a handle
    pub fn from_bytes(mime_type: &str, bytes: &[u8]) -> Self {
        Self::from_base64(mime_type, STANDARD.encode(bytes))
    }

    /// Wrap an already base64-encoded payload
    pub fn from_base64(mime_type: &str, payload: impl AsRef<str>) -> Self {
        Self(format!("data:{};base64,{}", mime_type, payload.as_ref()))
    }

    /// Wrap a handle produced elsewhere without validating it
    pub fn from_data_url(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Mime type from the `data:` header, `image/jpeg` when there is none
    pub fn mime_type(&self) -> &str {
        self.0
            .strip_prefix("data:")
            .and_then(|rest| rest.split_once(','))
            .and_then(|(header, _)| header.split(';').next())
            .filter(|mime| !mime.is_empty())
            .unwrap_or(DEFAULT_MIME_TYPE)
    }

    /// Base64 payload with any `data:` header stripped
    pub fn base64_payload(&self) -> &str {
        match self.0.split_once(',') {
            Some((_, payload)) if !payload.is_empty() => payload,
            _ => &self.0,
        }
    }

    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        STANDARD.decode(self.base64_payload())
    }

    /// Conventional file extension for the mime type
    pub fn extension(&self) -> &'static str {
        match self.mime_type() {
            "image/png" => "png",
            "image/webp" => "webp",
            "image/gif" => "gif",
            _ => "jpg",
        }
    }
}

impl std::fmt::Display for ImageHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Payloads are megabytes; show the header and size only
        write!(
            f,
            "<{} image, {} base64 chars>",
            self.mime_type(),
            self.base64_payload().len()
        )
    }
}
