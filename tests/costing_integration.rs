//! Integration tests for selection costing.
//!
//! These drive the public API the way the web front end does: line items
//! arrive as JSON, a session is opened, edited and saved, and the saved
//! payload is fed back into a new session.

use costing_core::pipeline::SaveItem;
use costing_core::{
    grand_total, local, parse::parse_saved_rows, strict_threshold, track_price, validate_line_items,
    CalculationRow, CalculationStore, Category, Costing, CostingSession, Dimensions, Edit,
    LineItem, LocalOptions, RateField, RowKey, SavePayload, StoreError, Toggle, Unit, Variant,
    TARIFF,
};
use pretty_assertions::assert_eq;
use std::cell::RefCell;

const EPS: f64 = 1e-9;

/// A selection as the front end posts it
const SELECTION_JSON: &str = r#"[
    {
        "id": "item-1",
        "width": "2100",
        "height": 2540,
        "unit": "mm",
        "calculationType": "Forest (Manual),Roman",
        "areaName": "Master Bedroom",
        "productName": "Velvet Ivory",
        "attributes": {"Weight/Mt": "499 GSM"}
    },
    {
        "id": "item-2",
        "width": 84,
        "height": 100,
        "unit": "inch",
        "calculationType": ["Local"],
        "areaName": "Living (M+S)",
        "productName": "Linen Sheer"
    },
    {
        "id": "item-3",
        "width": 5,
        "height": 4,
        "unit": "ft",
        "calculationType": "Blinds, Wallpaper",
        "areaName": "Kitchen",
        "productName": "Roller Blind"
    },
    {
        "id": "item-4",
        "width": 3.2,
        "height": 2.6,
        "unit": "M",
        "calculationType": "Forest (Auto),GPW,Somfy",
        "areaName": "Hall (M)",
        "productName": "Blackout Grey",
        "attributes": {"Fabric weight": 320}
    }
]"#;

fn selection() -> Vec<LineItem> {
    serde_json::from_str(SELECTION_JSON).unwrap()
}

/// Holds the last saved payload as JSON
#[derive(Default)]
struct MemoryStore {
    payload: RefCell<Option<String>>,
}

impl CalculationStore for MemoryStore {
    fn load(&self, _selection_id: &str) -> Result<Vec<CalculationRow>, StoreError> {
        match self.payload.borrow().as_deref() {
            Some(json) => parse_saved_rows(json).map_err(|e| StoreError::Unavailable(e.to_string())),
            None => Ok(Vec::new()),
        }
    }

    fn save(&self, payload: &SavePayload) -> Result<(), StoreError> {
        let json = serde_json::to_string(payload).map_err(|e| StoreError::Rejected(e.to_string()))?;
        *self.payload.borrow_mut() = Some(json);
        Ok(())
    }
}

fn keys(session: &CostingSession<'_>) -> Vec<(String, Category, Variant)> {
    session
        .rows()
        .iter()
        .map(|r| (r.selection_item_id.clone(), r.category, r.variant))
        .collect()
}

// ==================== Row generation ====================

#[test]
fn test_rows_for_every_item_and_category() {
    let session = CostingSession::open("sel-1", selection(), Vec::new(), &TARIFF);

    // Sorted by area name; within an item, categories in catalog order
    let expected = vec![
        ("item-4".to_string(), Category::ForestAuto, Variant::Normal),
        ("item-4".to_string(), Category::Somfy, Variant::Normal),
        ("item-4".to_string(), Category::Gpw, Variant::Normal),
        ("item-3".to_string(), Category::Blinds, Variant::Normal),
        ("item-2".to_string(), Category::Local, Variant::Main),
        ("item-2".to_string(), Category::Local, Variant::Sheer),
        ("item-1".to_string(), Category::ForestManual, Variant::Normal),
        ("item-1".to_string(), Category::Roman, Variant::Normal),
    ];
    assert_eq!(keys(&session), expected);
}

#[test]
fn test_multi_category_item_is_never_merged() {
    let session = CostingSession::open("sel-1", selection(), Vec::new(), &TARIFF);
    let manual = session
        .row(&RowKey::new("item-1", Category::ForestManual, Variant::Normal))
        .unwrap();
    let roman = session
        .row(&RowKey::new("item-1", Category::Roman, Variant::Normal))
        .unwrap();

    let (Costing::Fabric(manual), Costing::Fabric(roman)) = (&manual.costing, &roman.costing) else {
        panic!("both rows should be fabric rows");
    };
    // 82.68" x 100": pleated panna 4, Roman billed area 57.4 sq ft -> 58
    assert_eq!(manual.quantities.panna, 4.0);
    assert_eq!(roman.quantities.panna, 58.0);
    assert!(manual.toggles.channel);
    assert!(!roman.toggles.channel);
}

#[test]
fn test_unknown_tag_reported_not_costed() {
    let items = selection();
    let issues = validate_line_items(&items);
    let fields: Vec<(&str, &str)> = issues
        .iter()
        .map(|i| (i.item_id.as_str(), i.value.as_str()))
        .collect();
    assert_eq!(fields, vec![("item-3", "Wallpaper")]);

    let session = CostingSession::open("sel-1", items, Vec::new(), &TARIFF);
    assert_eq!(session.rows().iter().filter(|r| r.selection_item_id == "item-3").count(), 1);
}

// ==================== Calculator properties ====================

#[test]
fn test_local_example() {
    let dims = Dimensions::new(500.0, 1500.0, Unit::Millimeter);
    let r = local(&dims, &LocalOptions::default());
    assert_eq!(r.panna, 1.0);
    assert!((r.fabric - 1.899).abs() < 1e-3);
}

#[test]
fn test_forest_tier_selection() {
    let forest = &TARIFF.forest;
    for finish in costing_core::tariff::TrackFinish::ALL {
        let tier0 = forest.track_tiers[0].prices.get(*finish);
        let tier1 = forest.track_tiers[1].prices.get(*finish);
        let tier8 = forest.track_tiers[8].prices.get(*finish);
        let excess = forest.excess_rates.get(*finish);
        assert_eq!(track_price(forest, 6.5, *finish), tier0);
        assert_eq!(track_price(forest, 6.51, *finish), tier1);
        assert!((track_price(forest, 20.0, *finish) - (tier8 + excess)).abs() < EPS);
    }
}

#[test]
fn test_strict_threshold_is_the_only_pleat_rule() {
    // Channel feet, labour pleats and running feet share one rule
    assert_eq!(strict_threshold(14.09), 14.0);
    assert_eq!(strict_threshold(14.091), 15.0);
}

// ==================== Session behaviour ====================

#[test]
fn test_recompute_is_idempotent() {
    let mut session = CostingSession::open("sel-1", selection(), Vec::new(), &TARIFF);
    session.recalculate_all();
    let first = session.rows().to_vec();
    session.recalculate_all();
    assert_eq!(session.rows(), &first[..]);
}

#[test]
fn test_toggle_round_trip_restores_quantity() {
    let mut session = CostingSession::open("sel-1", selection(), Vec::new(), &TARIFF);
    let key = RowKey::new("item-1", Category::ForestManual, Variant::Normal);
    let blackout = |s: &CostingSession<'_>| match &s.row(&key).unwrap().costing {
        Costing::Fabric(c) => (c.quantities.blackout, c.rates.blackout),
        _ => unreachable!(),
    };

    session.edit(&key, Edit::Rate { field: RateField::Blackout, value: 260.0 });
    let (on_qty, _) = blackout(&session);
    assert!(on_qty > 0.0);

    session.edit(&key, Edit::Toggle { toggle: Toggle::Blackout, on: false });
    assert_eq!(blackout(&session), (0.0, 260.0));

    session.edit(&key, Edit::Toggle { toggle: Toggle::Blackout, on: true });
    assert_eq!(blackout(&session), (on_qty, 260.0));
}

#[test]
fn test_save_and_reopen_through_store() {
    let store = MemoryStore::default();
    let mut session = CostingSession::open_with_store("sel-1", selection(), &store, &TARIFF);
    session.apply_bulk_rate(Category::Roman, RateField::Fabric, 850.0);
    session.edit(
        &RowKey::new("item-4", Category::ForestAuto, Variant::Normal),
        Edit::ForestMotor("l_white_auto".into()),
    );
    session.edit(
        &RowKey::new("item-4", Category::Somfy, Variant::Normal),
        Edit::SomfyMotor("1240437".into()),
    );
    let total = session.grand_total();
    session.save(&store).unwrap();

    let reopened = CostingSession::open_with_store("sel-1", selection(), &store, &TARIFF);
    assert_eq!(keys(&reopened), keys(&session));
    assert!((reopened.grand_total() - total).abs() < EPS);
    assert!((grand_total(reopened.rows()) - total).abs() < EPS);
}

#[test]
fn test_save_payload_shape() {
    let session = CostingSession::open("sel-1", selection(), Vec::new(), &TARIFF);
    let payload = session.save_payload();
    let item: &SaveItem = &payload.items[0];
    let json = serde_json::to_value(item).unwrap();

    assert_eq!(json["selectionItemId"], "item-4");
    assert_eq!(json["category"], "Forest (Auto)");
    assert_eq!(json["unit"], "m");
    assert_eq!(json["costing"]["kind"], "forest");
    assert_eq!(json["costing"]["finish"], "white");
    assert_eq!(json["costing"]["gsm"], 320.0);
    assert!(json["rowTotal"].as_f64().unwrap() > 0.0);
}

#[test]
fn test_main_and_sheer_layers_priced_separately() {
    let mut session = CostingSession::open("sel-1", selection(), Vec::new(), &TARIFF);
    session.apply_bulk_rate(Category::Local, RateField::Fabric, 400.0);
    session.apply_bulk_rate(Category::Local, RateField::Sheer, 300.0);

    let main = RowKey::new("item-2", Category::Local, Variant::Main);
    let sheer = RowKey::new("item-2", Category::Local, Variant::Sheer);
    let total = |key: &RowKey| costing_core::row_total(session.row(key).unwrap());

    // Main: 12 * 400 + 7 * 285 + 4 * 450 + 355; sheer: 12 * 300 + 4 * 450
    assert!((total(&main) - 8950.0).abs() < EPS);
    assert!((total(&sheer) - 5400.0).abs() < EPS);
}

// ==================== Bad numeric input ====================

#[test]
fn test_cleared_and_invalid_numbers_cost_as_zero() {
    let mut session = CostingSession::open("sel-1", selection(), Vec::new(), &TARIFF);
    let main = RowKey::new("item-2", Category::Local, Variant::Main);

    let cleared: Edit =
        serde_json::from_str(r#"{"edit":"rate","value":{"field":"channel","value":""}}"#).unwrap();
    assert!(session.edit(&main, cleared));
    session.edit(&main, Edit::Rate { field: RateField::Labour, value: f64::NAN });
    session.edit(&main, Edit::Quantity { field: costing_core::QuantityField::Fitting, value: -1.0 });
    session.apply_bulk_rate(Category::Local, RateField::Fitting, f64::INFINITY);

    let Costing::Fabric(row) = &session.row(&main).unwrap().costing else {
        panic!("main layer should be a fabric row");
    };
    assert_eq!((row.rates.channel, row.rates.labour, row.rates.fitting), (0.0, 0.0, 0.0));
    assert_eq!(row.quantities.fitting, 0.0);
    assert_eq!(costing_core::row_total(session.row(&main).unwrap()), 0.0);

    let total = session.grand_total();
    assert!(total.is_finite() && total > 0.0);
    let json = serde_json::to_value(session.save_payload()).unwrap();
    assert!((json["grandTotal"].as_f64().unwrap() - total).abs() < EPS);
}
