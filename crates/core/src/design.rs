//! # Design Models
//!
//! Domain records shared by the pipeline, the session and the history store.
//!
//! Field names serialize in camelCase so a persisted history written by the
//! web client stays readable.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::image::ImageHandle;

/// Maximum number of room functions a single design can combine.
pub const MAX_ROOM_LOCATIONS: usize = 3;

/// Room functions offered by the upload step. Free-form labels are accepted too.
pub const ROOM_LOCATION_OPTIONS: &[&str] = &[
    "Living Room",
    "Bedroom",
    "Kitchen",
    "Dining Room",
    "Bathroom",
    "Home Office",
    "Balcony",
    "Entryway",
    "Art Studio",
    "Gaming Room",
    "Guest Room",
    "Other",
];

/// Store identifiers offered by the preferences step.
pub const POPULAR_STORES: &[&str] = &[
    "Amazon.in",
    "Flipkart",
    "Meesho",
    "Ikea India",
    "Myntra",
    "Pepperfry",
];

/// Renovation scope
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomType {
    #[default]
    WholeRoom,
    SingleWall,
}

impl RoomType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoomType::WholeRoom => "whole_room",
            RoomType::SingleWall => "single_wall",
        }
    }
}

/// Position of a product inside the generated image, as percentages.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Coordinates {
    pub x: f64,
    pub y: f64,
}

/// A product on the shopping list
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct ProductRecommendation {
    /// Generic but searchable product name; join key for coordinate merging
    pub name: String,
    pub description: String,
    /// Display string such as "₹2,500", never parsed
    pub price_estimate: String,
    /// Query optimized for marketplace search
    pub search_query: String,
    /// e.g. Furniture, Lighting, Decor
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schemars(skip)]
    pub coordinates: Option<Coordinates>,
}

/// Structured renovation plan returned by the analysis call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct RenovationAnalysis {
    /// How to optimize the space for its functions and purpose
    pub style_analysis: String,
    /// Hex color codes, in display order
    pub color_palette: Vec<String>,
    pub design_tips: Vec<String>,
    /// Optional upgrades beyond the core budget
    pub functional_additions: Vec<String>,
    pub products: Vec<ProductRecommendation>,
}

/// Preference fields entered on the preferences step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Preferences {
    pub budget: String,
    pub preferred_stores: Vec<String>,
    pub existing_furniture: String,
}

impl Preferences {
    pub fn new(
        budget: impl Into<String>,
        preferred_stores: Vec<String>,
        existing_furniture: impl Into<String>,
    ) -> Self {
        Self {
            budget: budget.into(),
            preferred_stores,
            existing_furniture: existing_furniture.into(),
        }
    }

    /// Budget as a whole number of rupees, ignoring currency symbols and separators.
    pub fn budget_amount(&self) -> Option<u64> {
        crate::generation::prompts::parse_budget(&self.budget)
    }
}

/// A finished design before the history store assigns identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignDraft {
    pub original_image: ImageHandle,
    #[serde(default)]
    pub inspiration_image: Option<ImageHandle>,
    pub style: String,
    #[serde(default)]
    pub room_type: RoomType,
    #[serde(rename = "roomLocation", default)]
    pub room_locations: Vec<String>,
    #[serde(default)]
    pub room_size: String,
    #[serde(default)]
    pub room_purpose: String,
    pub generated_image: ImageHandle,
    pub analysis_data: RenovationAnalysis,
    #[serde(default)]
    pub budget: String,
    #[serde(default)]
    pub preferred_stores: Vec<String>,
    #[serde(default)]
    pub existing_furniture: String,
}

impl DesignDraft {
    pub fn into_saved(self, id: String, timestamp: DateTime<Utc>) -> SavedDesign {
        SavedDesign {
            id,
            timestamp,
            design: self,
        }
    }
}

/// An immutable entry of the design history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedDesign {
    pub id: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub design: DesignDraft,
}

/// Preset renovation styles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenovationStyle {
    ModernMinimalist,
    BohemianChic,
    Scandinavian,
    IndustrialLoft,
    MidCenturyModern,
    ModernFarmhouse,
    Japandi,
    ArtDeco,
}

impl RenovationStyle {
    pub fn all() -> &'static [RenovationStyle] {
        &[
            RenovationStyle::ModernMinimalist,
            RenovationStyle::BohemianChic,
            RenovationStyle::Scandinavian,
            RenovationStyle::IndustrialLoft,
            RenovationStyle::MidCenturyModern,
            RenovationStyle::ModernFarmhouse,
            RenovationStyle::Japandi,
            RenovationStyle::ArtDeco,
        ]
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            RenovationStyle::ModernMinimalist => "Modern Minimalist",
            RenovationStyle::BohemianChic => "Bohemian Chic",
            RenovationStyle::Scandinavian => "Scandinavian",
            RenovationStyle::IndustrialLoft => "Industrial Loft",
            RenovationStyle::MidCenturyModern => "Mid-Century Modern",
            RenovationStyle::ModernFarmhouse => "Modern Farmhouse",
            RenovationStyle::Japandi => "Japandi",
            RenovationStyle::ArtDeco => "Art Deco",
        }
    }

    /// Descriptive style prompt handed to the generation backend
    pub fn description(&self) -> &'static str {
        match self {
            RenovationStyle::ModernMinimalist => "Clean lines, neutral color palette, uncluttered spaces, functional furniture, glass and steel accents.",
            RenovationStyle::BohemianChic => "Eclectic mix of patterns, textures, plants, vintage furniture, warm earthy tones, relaxed atmosphere.",
            RenovationStyle::Scandinavian => "Simplicity, functionality, bright whites, natural light, wood textures, cozy textiles (hygge).",
            RenovationStyle::IndustrialLoft => "Exposed brick, metal fixtures, raw wood, concrete floors, open concept, utilitarian aesthetic.",
            RenovationStyle::MidCenturyModern => "Organic shapes, tapered legs, bold accent colors, natural woods, geometric patterns.",
            RenovationStyle::ModernFarmhouse => "Rustic charm, shiplap walls, distressed wood, cozy fabrics, neutral tones, vintage accessories.",
            RenovationStyle::Japandi => "Hybrid of Japanese rustic minimalism and Scandinavian functionality. Clean lines, bright spaces, light wood.",
            RenovationStyle::ArtDeco => "Bold geometric shapes, rich colors, luxurious fabrics like velvet, gold and brass accents, glamour.",
        }
    }

    /// Case-insensitive lookup by display name
    pub fn from_name(name: &str) -> Option<RenovationStyle> {
        let name = name.trim();
        Self::all()
            .iter()
            .copied()
            .find(|style| style.display_name().eq_ignore_ascii_case(name))
    }
}

/// Build the style descriptor confirmed on the style step.
///
/// A preset contributes its description, custom text is appended after it.
/// With neither but an inspiration image, the image itself becomes the brief.
/// Returns `None` when there is nothing to go on.
pub fn compose_style(
    preset: Option<RenovationStyle>,
    custom: &str,
    has_inspiration: bool,
) -> Option<String> {
    let custom = custom.trim();
    let composed = match (preset, custom.is_empty()) {
        (Some(style), true) => style.description().to_string(),
        (Some(style), false) => format!("{} {}", style.description(), custom),
        (None, _) => custom.to_string(),
    };

    if !composed.is_empty() {
        Some(composed)
    } else if has_inspiration {
        Some("Match the style of the uploaded inspiration image.".to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> DesignDraft {
        DesignDraft {
            original_image: ImageHandle::from_bytes("image/jpeg", b"room"),
            inspiration_image: None,
            style: "Japandi".to_string(),
            room_type: RoomType::SingleWall,
            room_locations: vec!["Bedroom".to_string()],
            room_size: "10x12".to_string(),
            room_purpose: "Sleep".to_string(),
            generated_image: ImageHandle::from_bytes("image/png", b"render"),
            analysis_data: RenovationAnalysis::default(),
            budget: "25000".to_string(),
            preferred_stores: vec!["Flipkart".to_string()],
            existing_furniture: "Bed".to_string(),
        }
    }

    #[test]
    fn test_saved_design_uses_client_field_names() {
        let saved = draft().into_saved("abc".to_string(), Utc::now());
        let json = serde_json::to_value(&saved).unwrap();

        assert_eq!(json["id"], "abc");
        assert!(json["timestamp"].is_i64());
        assert_eq!(json["roomType"], "single_wall");
        assert_eq!(json["roomLocation"][0], "Bedroom");
        assert!(json.get("analysisData").is_some());
        assert!(json.get("design").is_none());
    }

    #[test]
    fn test_saved_design_tolerates_missing_optional_fields() {
        let json = serde_json::json!({
            "id": "legacy",
            "timestamp": 1700000000000i64,
            "originalImage": "data:image/jpeg;base64,AAAA",
            "inspirationImage": null,
            "style": "Art Deco",
            "generatedImage": "data:image/png;base64,BBBB",
            "analysisData": { "styleAnalysis": "Bold" }
        });

        let saved: SavedDesign = serde_json::from_value(json).unwrap();
        assert_eq!(saved.design.room_type, RoomType::WholeRoom);
        assert!(saved.design.room_locations.is_empty());
        assert_eq!(saved.design.analysis_data.style_analysis, "Bold");
        assert_eq!(saved.timestamp.timestamp_millis(), 1700000000000);
    }

    #[test]
    fn test_product_without_coordinates_omits_field() {
        let product = ProductRecommendation {
            name: "Lamp".to_string(),
            ..Default::default()
        };
        let json = serde_json::to_value(&product).unwrap();
        assert!(json.get("coordinates").is_none());
        assert_eq!(json["priceEstimate"], "");
    }

    #[test]
    fn test_style_lookup_is_case_insensitive() {
        assert_eq!(
            RenovationStyle::from_name("japandi"),
            Some(RenovationStyle::Japandi)
        );
        assert_eq!(RenovationStyle::from_name("Space Age"), None);
    }

    #[test]
    fn test_compose_style() {
        let preset = Some(RenovationStyle::ArtDeco);
        assert_eq!(
            compose_style(preset, "", false).as_deref(),
            Some(RenovationStyle::ArtDeco.description())
        );
        assert!(compose_style(preset, "with teal", false)
            .unwrap()
            .ends_with(" with teal"));
        assert_eq!(
            compose_style(None, "  cozy cabin ", false).as_deref(),
            Some("cozy cabin")
        );
        assert!(compose_style(None, "", true).unwrap().contains("inspiration"));
        assert_eq!(compose_style(None, " ", false), None);
    }
}
