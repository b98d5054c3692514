//! Keyword tables for free-text hints in record descriptions
//!
//! Descriptions are written by the rule layer and by operators, so these
//! tables are a heuristic fallback, not a classifier. All matching is
//! case-insensitive substring matching.

use crate::domain::types::{Direction, VehicleCategory};

/// Words that mark a departure
pub const EXIT_KEYWORDS: [&str; 3] = ["exit", "departure", "leaving"];

/// Words that mark an arrival
pub const ENTRY_KEYWORDS: [&str; 3] = ["entry", "arrival", "entering"];

/// Category keywords in priority order (first matching category wins)
pub const CATEGORY_KEYWORDS: [(VehicleCategory, &[&str]); 3] = [
    (VehicleCategory::Machinery, &["machinery", "excavator", "crane"]),
    (VehicleCategory::Staff, &["staff", "employee", "personnel"]),
    (VehicleCategory::MaterialTruck, &["truck", "material", "delivery"]),
];

#[inline]
fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

/// Direction hinted by a description. Exit words are checked first.
pub fn direction_hint(description: Option<&str>) -> Option<Direction> {
    let text = description?.to_lowercase();
    if contains_any(&text, &EXIT_KEYWORDS) {
        Some(Direction::Exit)
    } else if contains_any(&text, &ENTRY_KEYWORDS) {
        Some(Direction::Entry)
    } else {
        None
    }
}

/// Vehicle category from a description, defaulting to material trucks
pub fn vehicle_category(description: Option<&str>) -> VehicleCategory {
    let Some(text) = description.map(str::to_lowercase) else {
        return VehicleCategory::MaterialTruck;
    };

    CATEGORY_KEYWORDS
        .iter()
        .find(|(_, words)| contains_any(&text, words))
        .map(|(category, _)| *category)
        .unwrap_or(VehicleCategory::MaterialTruck)
}
