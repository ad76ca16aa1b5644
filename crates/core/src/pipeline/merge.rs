//! # Coordinate Merge
//!
//! Folds best-effort spatial detections back onto the shopping list.
//!
//! Detections come back in the model's 0–1000 normalized space; products
//! carry the box midpoint as a 0–100 percentage of the image.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::design::{Coordinates, ProductRecommendation};

/// Bounding box reported for one product name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ProductDetection {
    /// The exact name from the product list
    pub name: String,
    /// True only if the item is clearly visible
    pub found: bool,
    /// Top boundary (0-1000)
    pub y_min: f64,
    /// Left boundary (0-1000)
    pub x_min: f64,
    /// Bottom boundary (0-1000)
    pub y_max: f64,
    /// Right boundary (0-1000)
    pub x_max: f64,
}

impl ProductDetection {
    /// Box midpoint rescaled to percentages
    pub fn center(&self) -> Coordinates {
        Coordinates {
            x: to_percent((self.x_min + self.x_max) / 2.0),
            y: to_percent((self.y_min + self.y_max) / 2.0),
        }
    }
}

fn to_percent(normalized: f64) -> f64 {
    (normalized / 10.0).clamp(0.0, 100.0)
}

/// Annotate each product whose name exactly matches a found detection.
///
/// The first matching detection wins; products without one are returned as-is.
pub fn merge_coordinates(
    products: Vec<ProductRecommendation>,
    detections: &[ProductDetection],
) -> Vec<ProductRecommendation> {
    products
        .into_iter()
        .map(|product| {
            match detections
                .iter()
                .find(|d| d.found && d.name == product.name)
            {
                Some(detection) => ProductRecommendation {
                    coordinates: Some(detection.center()),
                    ..product
                },
                None => product,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(name: &str) -> ProductRecommendation {
        ProductRecommendation {
            name: name.to_string(),
            ..Default::default()
        }
    }

    fn detection(name: &str, found: bool, x: (f64, f64), y: (f64, f64)) -> ProductDetection {
        ProductDetection {
            name: name.to_string(),
            found,
            x_min: x.0,
            x_max: x.1,
            y_min: y.0,
            y_max: y.1,
        }
    }

    #[test]
    fn test_matching_product_gets_box_center() {
        let products = vec![product("Lamp"), product("Rug")];
        let detections = vec![detection("Lamp", true, (100.0, 300.0), (200.0, 400.0))];

        let merged = merge_coordinates(products, &detections);

        assert_eq!(merged[0].coordinates, Some(Coordinates { x: 20.0, y: 30.0 }));
        assert_eq!(merged[1], product("Rug"));
    }

    #[test]
    fn test_not_found_detection_is_ignored() {
        let detections = vec![detection("Lamp", false, (0.0, 1000.0), (0.0, 1000.0))];
        let merged = merge_coordinates(vec![product("Lamp")], &detections);
        assert_eq!(merged[0].coordinates, None);
    }

    #[test]
    fn test_matching_is_case_sensitive() {
        let detections = vec![detection("lamp", true, (0.0, 100.0), (0.0, 100.0))];
        let merged = merge_coordinates(vec![product("Lamp")], &detections);
        assert_eq!(merged[0].coordinates, None);
    }

    #[test]
    fn test_first_found_detection_wins() {
        let detections = vec![
            detection("Lamp", false, (900.0, 1000.0), (900.0, 1000.0)),
            detection("Lamp", true, (0.0, 200.0), (0.0, 200.0)),
            detection("Lamp", true, (800.0, 1000.0), (800.0, 1000.0)),
        ];
        let merged = merge_coordinates(vec![product("Lamp"), product("Lamp")], &detections);

        // Duplicate product names both take the first found box
        for p in &merged {
            assert_eq!(p.coordinates, Some(Coordinates { x: 10.0, y: 10.0 }));
        }
    }

    #[test]
    fn test_out_of_range_boxes_are_clamped() {
        let detections = vec![detection("Rug", true, (1200.0, 1400.0), (-50.0, -10.0))];
        let merged = merge_coordinates(vec![product("Rug")], &detections);
        assert_eq!(merged[0].coordinates, Some(Coordinates { x: 100.0, y: 0.0 }));
    }

    #[test]
    fn test_detection_parses_model_json() {
        let json = r#"[{"name":"Lamp","found":true,"y_min":200,"x_min":100,"y_max":400,"x_max":300},{"name":"Rug","found":false}]"#;
        let detections: Vec<ProductDetection> = serde_json::from_str(json).unwrap();
        assert_eq!(detections.len(), 2);
        assert_eq!(detections[0].center(), Coordinates { x: 20.0, y: 30.0 });
        assert!(!detections[1].found);
    }
}
