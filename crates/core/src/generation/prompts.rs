//! Prompt construction for the renovation models.
//!
//! Budget strings are free text ("₹25,000", "50k INR"); only their digits
//! count when choosing a budget tier.

use std::sync::OnceLock;

use regex::Regex;

use super::{AnalysisRequest, VisualizationRequest};
use crate::design::{ProductRecommendation, RoomType, POPULAR_STORES};

fn non_digits() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^0-9]").expect("non-digit pattern compiles"))
}

/// Whole-rupee amount from a budget string, or `None` if it has no digits.
pub fn parse_budget(budget: &str) -> Option<u64> {
    let digits = non_digits().replace_all(budget, "");
    if digits.is_empty() {
        return None;
    }
    // Absurdly long digit runs saturate rather than fail
    Some(digits.parse().unwrap_or(u64::MAX))
}

/// How far the shopping list may go for a given budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisTier {
    Micro,
    Low,
    Mid,
    High,
}

impl AnalysisTier {
    pub fn for_amount(amount: u64) -> Self {
        match amount {
            0..=15_000 => AnalysisTier::Micro,
            15_001..=50_000 => AnalysisTier::Low,
            50_001..=150_000 => AnalysisTier::Mid,
            _ => AnalysisTier::High,
        }
    }

    fn guidance(&self) -> &'static str {
        match self {
            AnalysisTier::Micro => {
                "MICRO BUDGET SCENARIO (< ₹15k):
- STRICT RULE: DO NOT suggest furniture (No chairs, tables, cabinets).
- Suggest ONLY: Cushion covers, wall posters, small plants, fairy lights, or a very small rug.
- Strategy: Focus on decluttering and adding small pops of color.
- If the user asked for a sofa change, IGNORE IT and say it's not possible within budget."
            }
            AnalysisTier::Low => {
                "LOW BUDGET SCENARIO (< ₹50k):
- Focus on: Rugs, curtains, lamps, throw pillows, bedding.
- Allowed Furniture: Maximum 1 small item (e.g. side table, pouf, shoe rack) under ₹5,000.
- DO NOT suggest: Sofas, Beds, Wardrobes, Dining Tables."
            }
            AnalysisTier::Mid => {
                "MID BUDGET SCENARIO (< ₹1.5L):
- Allowed: 1-2 key furniture pieces (e.g. Coffee table, Accent chair, Bookshelf).
- Decor: Premium lighting, large area rugs.
- Keep the main Sofa/Bed unless it's the ONLY thing being bought."
            }
            AnalysisTier::High => {
                "HIGH BUDGET SCENARIO:
- You may suggest larger furniture replacements if they fit the style.
- Focus on high-quality materials and statement pieces."
            }
        }
    }
}

/// How much of the room the rendering may change for a given budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisualizationTier {
    Low,
    Mid,
    High,
}

impl VisualizationTier {
    pub fn for_amount(amount: u64) -> Self {
        match amount {
            0..=19_999 => VisualizationTier::Low,
            20_000..=99_999 => VisualizationTier::Mid,
            _ => VisualizationTier::High,
        }
    }

    fn guidance(&self) -> &'static str {
        match self {
            VisualizationTier::Low => {
                "STRICT LOW BUDGET CONSTRAINT:
- DO NOT CHANGE THE ROOM STRUCTURE.
- DO NOT REPLACE LARGE FURNITURE (Sofa, Bed, Wardrobes must stay same).
- ONLY CHANGE: Wall color, Rugs, Curtains, Throw Pillows, Plants, Wall Art.
- The room should look like a DIY makeover, not a luxury remodel.
- Keep the flooring exactly as is."
            }
            VisualizationTier::Mid => {
                "MID-RANGE BUDGET CONSTRAINT:
- Keep the flooring and ceiling as is.
- You can update small furniture (coffee table, chairs).
- Use practical, accessible decor (IKEA/Pepperfry style).
- Avoid luxury materials like marble or gold unless they exist in original."
            }
            VisualizationTier::High => {
                "HIGH BUDGET: Premium finishes, custom lighting, new furniture allowed."
            }
        }
    }
}

fn or_default<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.trim().is_empty() {
        fallback
    } else {
        value
    }
}

/// Text part of the analysis request
pub fn analysis_prompt(request: &AnalysisRequest) -> String {
    let locations = request.room_locations.join(" + ");
    let scope = match request.room_type {
        RoomType::WholeRoom => "the entire room",
        RoomType::SingleWall => "this specific wall or corner",
    };

    let mut prompt = format!(
        "You are an expert Indian interior designer.
Analyze the first image.

CONTEXT:
- Room Function(s): {locations} (Multi-functional space).
- Room Size: {size}.
- Primary Usage/Purpose: {purpose}.
- Renovation Scope: {scope}.
- Style Goal: \"{style}\".
",
        size = or_default(&request.room_size, "Standard"),
        purpose = or_default(&request.room_purpose, "General living"),
        style = request.style,
    );

    if let Some(prefs) = &request.preferences {
        let budget = prefs.budget.trim();
        if !budget.is_empty() {
            prompt.push_str(&format!(
                "
CRITICAL BUDGET CONSTRAINT: The user has a STRICT total budget of ₹{budget} INR.
You must suggest 5 products that are ABSOLUTELY ESSENTIAL for the look.
The SUM of the estimated prices of these 5 products MUST NOT exceed ₹{budget}.
"
            ));
            let tier = AnalysisTier::for_amount(parse_budget(budget).unwrap_or(0));
            prompt.push('\n');
            prompt.push_str(tier.guidance());
            prompt.push('\n');
        }

        if prefs.preferred_stores.is_empty() {
            prompt.push_str(&format!(
                "\nSuggest products widely available in the Indian online marketplace ({}).\n",
                POPULAR_STORES[..4].join(", ")
            ));
        } else {
            prompt.push_str(&format!(
                "\nPrioritize finding products available on these stores: {}.\n",
                prefs.preferred_stores.join(", ")
            ));
        }

        let existing = prefs.existing_furniture.trim();
        if !existing.is_empty() {
            prompt.push_str(&format!(
                "\nThe user wants to KEEP the following existing items: \"{existing}\". Your design MUST incorporate these. Do not suggest replacing them.\n"
            ));
        }
    }

    prompt.push_str(&format!(
        "
Provide a structured renovation plan including:
1. A short analysis of how to optimize this {size} space for {locations}, addressing the user's purpose: \"{purpose}\".
2. A color palette of 5 hex codes.
3. 4-5 specific, actionable design tips.
4. A list of 'functionalAdditions': 2-3 items/ideas that would add *extra* utility to the room (e.g. \"A clip-on reading light\", \"Under-desk cable organizer\") that are optional upgrades if they had more budget.
5. A list of 5 specific products to buy within the budget.
   For each product:
   - 'name': A generic but searchable product name.
   - 'searchQuery': A highly optimized search term for Amazon India or Flipkart.
   - 'priceEstimate': A realistic market price in INR.
   - 'category': The type of item.
",
        size = request.room_size,
        purpose = request.room_purpose,
    ));

    prompt
}

/// Text part of the visualization request
pub fn visualization_prompt(request: &VisualizationRequest) -> String {
    let locations = request.room_locations.join(" combined with ");
    let budget_context = request
        .budget
        .as_deref()
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .map(|b| VisualizationTier::for_amount(parse_budget(b).unwrap_or(0)).guidance())
        .unwrap_or_default();

    let mut prompt = match request.room_type {
        RoomType::WholeRoom => format!(
            "Redesign this room as a {locations}.
Style: \"{style}\".
Size: {size}. Purpose: {purpose}.
{budget_context}

Maintain strict realism. This is a renovation visualization.
Only show products that fit within the budget description above.
Maintain the exact room structure (windows, doors, ceiling height) and perspective.
",
            style = request.style,
            size = request.room_size,
            purpose = request.room_purpose,
        ),
        RoomType::SingleWall => format!(
            "Redesign this specific wall area for {locations}.
Style: \"{style}\".
{budget_context}
Update wall treatments and decor only.
",
            style = request.style,
        ),
    };

    if let Some(existing) = request
        .existing_items
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty())
    {
        prompt.push_str(&format!(
            "The user has existing items described as: \"{existing}\". You MUST preserve items matching this description in the generated image. Blend them into the new design.\n"
        ));
    }

    prompt.push_str(
        "Make it look like a real photo taken with a smartphone or DSLR in a real Indian home.
Realistic lighting and textures. Avoid hyper-realistic AI gloss.
",
    );

    if request.inspiration_image.is_some() {
        prompt.push_str("Use the second image as a visual reference for the color scheme and vibe.\n");
    }

    prompt
}

/// Text part of the product detection request
pub fn detection_prompt(products: &[ProductRecommendation], style: Option<&str>) -> String {
    let names: Vec<&str> = products.iter().map(|p| p.name.as_str()).collect();
    format!(
        "Look at this room image. The room is designed in the style: \"{style}\".
I have a list of products that should be in this room: [{names}].

For each product in the list that you can visibly find in the image, identify its 2D coordinate center.

Return a JSON array of objects. Each object must have:
- 'name': The exact name from my list.
- 'found': boolean, true if found.
- 'y_min': number (0-1000 scale), top boundary.
- 'x_min': number (0-1000 scale), left boundary.
- 'y_max': number (0-1000 scale), bottom boundary.
- 'x_max': number (0-1000 scale), right boundary.

IMPORTANT: Only mark 'found: true' if the item is CLEARLY visible in the image. Do not guess.
",
        style = style.filter(|s| !s.trim().is_empty()).unwrap_or("Modern"),
        names = names.join(", "),
    )
}
