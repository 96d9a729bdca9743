//! Static inspection checklist catalog and submission validation.
//!
//! The catalog is configuration compiled into the binary: an ordered list of
//! categories, each with an ordered list of item names. Every report must
//! answer every item — validation is all-or-nothing and happens before any
//! database write.

use std::collections::HashMap;

use crate::errors::{AppError, AppResult};

/// The three allowed item states. Submitted values are compared
/// case/whitespace-insensitively against these, but the submitter's original
/// string is what gets persisted.
pub const VALID_STATES: [&str; 3] = ["Good Condition", "Bad Condition", "N/A"];

/// Ordered (category, items) catalog for the fixed inspection form.
pub const CHECKLIST_ITEMS: &[(&str, &[&str])] = &[
    ("Fluid Levels", &[
        "Radiator coolant level",
        "Auxiliary reservoir coolant",
        "Brake fluid",
        "Engine oil",
        "Hydraulic fluid level",
        "Windshield washer reservoir",
    ]),
    ("Pedals (check anti-slip pads)", &[
        "Accelerator (smooth travel)",
        "Clutch",
        "Brake (grip/firmness)",
    ]),
    ("Lights (intensity, housing condition and even activation)", &[
        "Headlights (high, mid and low beam)",
        "Turn signals",
        "Hazard lights",
        "Brake lights",
        "Dashboard warning lights",
        "Reverse light",
        "Cabin interior light",
    ]),
    ("Tires and Wheels", &[
        "Spare tire",
        "Tires (air pressure, tread and wear)",
        "Battery (terminal condition, corrosion or sulfation)",
        "Rims (dents or cracks)",
    ]),
    ("Road Kit", &[
        "Triangles/Cones",
        "Lug wrench",
        "Jack",
    ]),
    ("General", &[
        "Seat belts",
        "Horn",
        "Handbrake (function and level)",
        "Mirrors",
        "Wiper blades",
        "Upholstery",
    ]),
    ("Audio (promotional amplification equipment)", &[
        "Amplifier (power and function)",
        "Radio",
        "Memory stick (spots and/or music)",
        "Microphone",
        "Microphone cable",
        "Exterior speakers (function)",
    ]),
    ("Advertising", &[
        "Door logos",
        "Skirt panels",
        "Billboard (both sides)",
        "Truck rear panel",
    ]),
];

/// Total number of items across all categories.
pub fn catalog_size() -> usize {
    CHECKLIST_ITEMS.iter().map(|(_, items)| items.len()).sum()
}

/// Derive the submitted-form key for a catalog item: `check_` prefix, spaces
/// and slashes become underscores, and `( ) , - .` are dropped.
pub fn form_key(item: &str) -> String {
    let mut key = String::with_capacity(item.len() + 6);
    key.push_str("check_");
    for c in item.chars() {
        match c {
            ' ' | '/' => key.push('_'),
            '(' | ')' | ',' | '-' | '.' => {}
            _ => key.push(c),
        }
    }
    key
}

/// One validated checklist answer, carried in catalog order.
#[derive(Debug, Clone, PartialEq)]
pub struct ChecklistResult {
    pub category: &'static str,
    pub item:     &'static str,
    /// Original submitted string, not the normalized form.
    pub state:    String,
}

/// Validate a raw submitted form against the catalog.
///
/// Every catalog item must be present under its derived form key and hold one
/// of [`VALID_STATES`] (compared lowercased and trimmed). Returns the full
/// set of answers — exactly [`catalog_size`] entries — or the first error.
pub fn validate_checklist(form: &HashMap<String, String>) -> AppResult<Vec<ChecklistResult>> {
    let mut results = Vec::with_capacity(catalog_size());

    for &(category, items) in CHECKLIST_ITEMS {
        for &item in items {
            let key = form_key(item);
            let value = form.get(&key).ok_or_else(|| {
                AppError::BadRequest(format!("missing item state for {item}"))
            })?;

            let normalized = value.to_lowercase();
            let normalized = normalized.trim();
            if !VALID_STATES.iter().any(|s| s.to_lowercase() == normalized) {
                return Err(AppError::BadRequest(format!(
                    "invalid state for {item}: {value}"
                )));
            }

            results.push(ChecklistResult {
                category,
                item,
                state: value.clone(),
            });
        }
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_form() -> HashMap<String, String> {
        CHECKLIST_ITEMS
            .iter()
            .flat_map(|(_, items)| items.iter())
            .map(|item| (form_key(item), "Good Condition".to_string()))
            .collect()
    }

    #[test]
    fn catalog_has_unique_form_keys() {
        let keys: std::collections::HashSet<String> = CHECKLIST_ITEMS
            .iter()
            .flat_map(|(_, items)| items.iter())
            .map(|item| form_key(item))
            .collect();
        assert_eq!(keys.len(), catalog_size());
    }

    #[test]
    fn form_key_strips_separators() {
        assert_eq!(form_key("Triangles/Cones"), "check_Triangles_Cones");
        assert_eq!(
            form_key("Brake (grip/firmness)"),
            "check_Brake_grip_firmness"
        );
        assert_eq!(
            form_key("Memory stick (spots and/or music)"),
            "check_Memory_stick_spots_and_or_music"
        );
    }

    #[test]
    fn full_form_validates_to_catalog_size() {
        let results = validate_checklist(&full_form()).unwrap();
        assert_eq!(results.len(), catalog_size());
    }

    #[test]
    fn missing_item_is_rejected() {
        let mut form = full_form();
        form.remove(&form_key("Spare tire"));
        let err = validate_checklist(&form).unwrap_err();
        assert!(err.to_string().contains("missing item state for Spare tire"));
    }

    #[test]
    fn invalid_state_is_rejected_with_value() {
        let mut form = full_form();
        form.insert(form_key("Horn"), "Broken".into());
        let err = validate_checklist(&form).unwrap_err();
        assert!(err.to_string().contains("invalid state for Horn: Broken"));
    }

    #[test]
    fn state_comparison_is_case_and_whitespace_insensitive() {
        let mut form = full_form();
        form.insert(form_key("Horn"), "good condition ".into());
        let results = validate_checklist(&form).unwrap();
        let horn = results.iter().find(|r| r.item == "Horn").unwrap();
        // The original string is preserved, not the normalized form.
        assert_eq!(horn.state, "good condition ");
    }

    #[test]
    fn answers_keep_their_category() {
        let results = validate_checklist(&full_form()).unwrap();
        let jack = results.iter().find(|r| r.item == "Jack").unwrap();
        assert_eq!(jack.category, "Road Kit");
    }
}
