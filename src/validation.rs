//! Line item checks before costing
//!
//! Costing never fails on bad input, it prices it at zero. This report lets
//! the caller show why a row came out empty.

use std::collections::HashSet;

use serde::Serialize;

use crate::model::LineItem;
use crate::units::Unit;

/// A problem found on one line item
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationIssue {
    pub item_id: String,
    pub field: String,
    pub value: String,
    pub message: String,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}: {} ({})", self.item_id, self.field, self.value, self.message)
    }
}

/// Check one item. An empty list means it will cost normally.
pub fn validate_line_item(item: &LineItem) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    let mut push = |field: &str, value: String, message: &str| {
        issues.push(ValidationIssue {
            item_id: item.id.clone(),
            field: field.to_string(),
            value,
            message: message.to_string(),
        });
    };

    if item.id.trim().is_empty() {
        push("id", String::new(), "missing selection item id");
    }

    let unit = item.unit_label.trim();
    if !unit.is_empty() && Unit::recognize(unit).is_none() {
        push("unit", unit.to_string(), "unrecognized unit, treated as mm");
    }

    check_dimension("width", item.width, &mut push);
    check_dimension("height", item.height, &mut push);

    if item.calculation_type.is_empty() {
        push(
            "calculationType",
            item.calculation_type.to_tag_string(),
            "no calculation type assigned",
        );
    }
    for token in item.calculation_type.unrecognized() {
        push("calculationType", token.clone(), "unknown calculation type, ignored");
    }

    issues
}

fn check_dimension(field: &str, value: f64, push: &mut impl FnMut(&str, String, &str)) {
    if value < 0.0 {
        push(field, value.to_string(), "negative measurement, priced as zero");
    } else if value == 0.0 {
        push(field, value.to_string(), "missing measurement, priced as zero");
    }
}

/// Check every item, plus duplicate ids across the selection.
pub fn validate_line_items(items: &[LineItem]) -> Vec<ValidationIssue> {
    let mut issues: Vec<ValidationIssue> = items.iter().flat_map(validate_line_item).collect();

    let mut seen = HashSet::new();
    for item in items {
        if !item.id.is_empty() && !seen.insert(item.id.as_str()) {
            issues.push(ValidationIssue {
                item_id: item.id.clone(),
                field: "id".to_string(),
                value: item.id.clone(),
                message: "duplicate selection item id".to_string(),
            });
        }
    }

    issues
}

/// WASM-friendly validation (takes a JSON item array, returns a JSON issue array)
#[cfg(feature = "wasm")]
use wasm_bindgen::prelude::*;

#[cfg(feature = "wasm")]
#[wasm_bindgen(js_name = "validateLineItems")]
pub fn validate_line_items_wasm(json: &str) -> String {
    match serde_json::from_str::<Vec<LineItem>>(json) {
        Ok(items) => {
            let issues = validate_line_items(&items);
            serde_json::to_string(&issues).unwrap_or_else(|_| "[]".to_string())
        }
        Err(e) => serde_json::json!([{
            "itemId": "",
            "field": "parse",
            "value": "",
            "message": e.to_string(),
        }])
        .to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CategorySet;

    fn valid_item() -> LineItem {
        LineItem {
            id: "item-1".to_string(),
            width: 1500.0,
            height: 2400.0,
            unit_label: "mm".to_string(),
            calculation_type: CategorySet::parse("Local"),
            ..LineItem::default()
        }
    }

    #[test]
    fn test_valid_item_no_issues() {
        let issues = validate_line_item(&valid_item());
        assert!(issues.is_empty(), "Expected no issues, got: {:?}", issues);
    }

    #[test]
    fn test_unknown_unit_reported() {
        let mut item = valid_item();
        item.unit_label = "yards".to_string();
        let issues = validate_line_item(&item);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].field, "unit");
        assert_eq!(issues[0].value, "yards");
    }

    #[test]
    fn test_empty_unit_is_fine() {
        let mut item = valid_item();
        item.unit_label = String::new();
        assert!(validate_line_item(&item).is_empty());
    }

    #[test]
    fn test_zero_and_negative_dimensions() {
        let mut item = valid_item();
        item.width = 0.0;
        item.height = -5.0;
        let issues = validate_line_item(&item);
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].field, "width");
        assert_eq!(issues[1].field, "height");
    }

    #[test]
    fn test_missing_and_unknown_categories() {
        let mut item = valid_item();
        item.calculation_type = CategorySet::parse("Wallpaper");
        let issues = validate_line_item(&item);
        assert_eq!(issues.len(), 2);
        assert!(issues.iter().all(|i| i.field == "calculationType"));
        assert_eq!(issues[1].value, "Wallpaper");
    }

    #[test]
    fn test_duplicate_ids() {
        let items = vec![valid_item(), valid_item()];
        let issues = validate_line_items(&items);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].message, "duplicate selection item id");
    }

    #[test]
    fn test_display() {
        let mut item = valid_item();
        item.width = 0.0;
        let issues = validate_line_item(&item);
        assert_eq!(
            issues[0].to_string(),
            "item-1.width: 0 (missing measurement, priced as zero)"
        );
    }
}
