//! Deep-costing session
//!
//! Provides the `CalculationStore` trait and `CostingSession`, which turns a
//! selection's line items into one calculation row per item × category
//! (× curtain layer), applies user edits and produces the save payload.
//! The same session drives the native callers and the WASM front end, so
//! both price a selection identically.

use serde::{Deserialize, Serialize};

use crate::calculation::{blinds, motor_kg};
use crate::error::StoreError;
use crate::forest::{ForestCosting, PriceField};
use crate::model::{
    BlindsCosting, CalculationRow, Category, Costing, FabricCosting, FabricFamily, LineItem,
    QuantityField, RateField, RowKey, Toggle, Variant,
};
use crate::parse::{lenient_f64, non_negative};
use crate::somfy::{GpwCosting, SomfyCosting};
use crate::tariff::{
    CatalogKey, ForestMotor, ForestRemote, GpwType, Runner, SomfyDuty, SomfyTrack, Tape, Tariff,
    TrackFinish,
};
use crate::totals::{category_total, grand_total, row_total, totals_by_category};
use crate::units::Unit;

// ─── CalculationStore trait ──────────────────────────────────────────

/// Persistence collaborator for saved calculation rows.
/// Implemented by the host application (HTTP API, database, file).
pub trait CalculationStore {
    /// Rows saved for a selection; an empty list when nothing was saved.
    fn load(&self, selection_id: &str) -> Result<Vec<CalculationRow>, StoreError>;
    /// Persist the full row set of a selection.
    fn save(&self, payload: &SavePayload) -> Result<(), StoreError>;
}

// ─── Edits ───────────────────────────────────────────────────────────

/// A user edit on one row.
///
/// Catalog selections arrive as raw ids; an unknown id clears the
/// selection (priced at zero) rather than failing. A cleared number field
/// arrives as `""` or `null` and is applied as 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "edit", content = "value", rename_all = "camelCase")]
pub enum Edit {
    Width(#[serde(deserialize_with = "lenient_f64")] f64),
    Height(#[serde(deserialize_with = "lenient_f64")] f64),
    Unit(Unit),
    Rate {
        field: RateField,
        #[serde(default, deserialize_with = "lenient_f64")]
        value: f64,
    },
    Toggle { toggle: Toggle, on: bool },
    Quantity {
        field: QuantityField,
        #[serde(default, deserialize_with = "lenient_f64")]
        value: f64,
    },
    Price {
        field: PriceField,
        #[serde(default, deserialize_with = "lenient_f64")]
        value: f64,
    },
    Gsm(#[serde(deserialize_with = "lenient_f64")] f64),
    TrackFinish(String),
    Runner(String),
    Tape(String),
    ForestMotor(String),
    ForestRemote(String),
    GpwType(String),
    GpwMotor(String),
    GpwRemote(String),
    SomfyTrack(String),
    SomfyDuty(String),
    SomfyMotor(String),
    SomfyRemote(String),
}

// ─── Save payload ────────────────────────────────────────────────────

/// Row as persisted, with its total.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveItem {
    #[serde(flatten)]
    pub row: CalculationRow,
    pub row_total: f64,
}

/// Everything the store needs to persist a selection.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavePayload {
    pub selection_id: String,
    pub items: Vec<SaveItem>,
    pub grand_total: f64,
}

// ─── Session ─────────────────────────────────────────────────────────

/// Rows of one selection under edit.
#[derive(Debug, Clone)]
pub struct CostingSession<'t> {
    selection_id: String,
    tariff: &'t Tariff,
    items: Vec<LineItem>,
    rows: Vec<CalculationRow>,
    baseline: Vec<CalculationRow>,
}

impl<'t> CostingSession<'t> {
    /// Build rows for every item and category, merging in saved rows.
    ///
    /// Saved rates, toggles and selections are kept. A saved row whose
    /// measurement no longer matches its item is re-derived.
    pub fn open(
        selection_id: impl Into<String>,
        items: Vec<LineItem>,
        saved: Vec<CalculationRow>,
        tariff: &'t Tariff,
    ) -> Self {
        let selection_id = selection_id.into();
        let rows = build_rows(&items, &saved, tariff);
        tracing::info!(
            selection = %selection_id,
            items = items.len(),
            rows = rows.len(),
            saved = saved.len(),
            "costing session opened"
        );
        Self {
            selection_id,
            tariff,
            items,
            rows,
            baseline: saved,
        }
    }

    /// [`CostingSession::open`] with saved rows fetched from a store.
    ///
    /// A store failure is not fatal: the session opens with default rows.
    pub fn open_with_store(
        selection_id: impl Into<String>,
        items: Vec<LineItem>,
        store: &dyn CalculationStore,
        tariff: &'t Tariff,
    ) -> Self {
        let selection_id = selection_id.into();
        let saved = match store.load(&selection_id) {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(selection = %selection_id, error = %e, "saved rows unavailable, using defaults");
                Vec::new()
            }
        };
        Self::open(selection_id, items, saved, tariff)
    }

    /// Resume from rows already on screen; they also become the baseline.
    pub fn from_rows(
        selection_id: impl Into<String>,
        items: Vec<LineItem>,
        rows: Vec<CalculationRow>,
        tariff: &'t Tariff,
    ) -> Self {
        Self {
            selection_id: selection_id.into(),
            tariff,
            items,
            baseline: rows.clone(),
            rows,
        }
    }

    pub fn selection_id(&self) -> &str {
        &self.selection_id
    }

    pub fn rows(&self) -> &[CalculationRow] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<CalculationRow> {
        self.rows
    }

    pub fn row(&self, key: &RowKey) -> Option<&CalculationRow> {
        self.rows.iter().find(|r| r.matches(key))
    }

    /// Rows of one category, in display order.
    pub fn rows_for(&self, category: Category) -> impl Iterator<Item = &CalculationRow> {
        self.rows.iter().filter(move |r| r.category == category)
    }

    /// Apply an edit to one row. Returns false when the row does not exist
    /// or the edit does not apply to its category.
    pub fn edit(&mut self, key: &RowKey, edit: Edit) -> bool {
        let tariff = self.tariff;
        let Some(row) = self.rows.iter_mut().find(|r| r.matches(key)) else {
            tracing::debug!(item = %key.selection_item_id, category = %key.category, "edit for unknown row ignored");
            return false;
        };
        let applied = apply_edit(row, &edit, tariff);
        if !applied {
            tracing::debug!(category = %key.category, ?edit, "edit not applicable");
        }
        applied
    }

    /// Set one rate on every row of a category. Returns the rows changed.
    pub fn apply_bulk_rate(&mut self, category: Category, field: RateField, value: f64) -> usize {
        let value = non_negative(value);
        let mut changed = 0;
        for row in self.rows.iter_mut().filter(|r| r.category == category) {
            let applied = match &mut row.costing {
                Costing::Fabric(c) => c.rates.set(field, value),
                Costing::Blinds(c) => c.rates.set(field, value),
                _ => false,
            };
            if applied {
                changed += 1;
            }
        }
        tracing::info!(%category, ?field, value, changed, "bulk rate applied");
        changed
    }

    /// Discard manual overrides and re-derive every quantity.
    ///
    /// Rates, toggles and catalog selections are kept.
    pub fn recalculate_all(&mut self) {
        for row in &mut self.rows {
            recompute_row(row, self.tariff);
        }
        tracing::info!(selection = %self.selection_id, rows = self.rows.len(), "recalculated");
    }

    /// Go back to the last saved state. Rows that were never saved are
    /// regenerated with defaults.
    pub fn reset_to_saved(&mut self) {
        self.rows = build_rows(&self.items, &self.baseline, self.tariff);
        tracing::info!(selection = %self.selection_id, "reset to saved");
    }

    /// Drop an item and all its rows. Returns the number of rows removed.
    pub fn remove_item(&mut self, selection_item_id: &str) -> usize {
        self.items.retain(|i| i.id != selection_item_id);
        let before = self.rows.len();
        self.rows.retain(|r| r.selection_item_id != selection_item_id);
        before - self.rows.len()
    }

    pub fn grand_total(&self) -> f64 {
        grand_total(&self.rows)
    }

    pub fn category_total(&self, category: Category) -> f64 {
        category_total(&self.rows, category)
    }

    pub fn category_totals(&self) -> std::collections::BTreeMap<Category, f64> {
        totals_by_category(&self.rows)
    }

    pub fn save_payload(&self) -> SavePayload {
        SavePayload {
            selection_id: self.selection_id.clone(),
            items: self
                .rows
                .iter()
                .map(|row| SaveItem {
                    row: row.clone(),
                    row_total: row_total(row),
                })
                .collect(),
            grand_total: self.grand_total(),
        }
    }

    /// Persist the rows; on success they become the new baseline.
    pub fn save(&mut self, store: &dyn CalculationStore) -> Result<(), StoreError> {
        let payload = self.save_payload();
        if let Err(e) = store.save(&payload) {
            tracing::warn!(selection = %self.selection_id, error = %e, "save failed");
            return Err(e);
        }
        self.baseline = self.rows.clone();
        tracing::info!(selection = %self.selection_id, rows = payload.items.len(), "saved");
        Ok(())
    }
}

// ─── Row generation ──────────────────────────────────────────────────

const SPLIT_MARKER: &str = "(M+S)";

/// Byte offset of the `(M+S)` marker, matched case-insensitively.
fn find_split_marker(area_name: &str) -> Option<usize> {
    let marker = SPLIT_MARKER.as_bytes();
    let bytes = area_name.as_bytes();
    area_name
        .char_indices()
        .map(|(i, _)| i)
        .find(|&i| {
            bytes
                .get(i..i + marker.len())
                .is_some_and(|window| window.eq_ignore_ascii_case(marker))
        })
}

/// Curtain layers an item is costed as under a category.
pub fn variants_for(category: Category, area_name: &str) -> Vec<Variant> {
    let split = category.fabric_family().is_some() && find_split_marker(area_name).is_some();
    if split {
        vec![Variant::Main, Variant::Sheer]
    } else {
        vec![Variant::Normal]
    }
}

/// Area name shown on a layer row: `(M+S)` becomes `(Main)` or `(Sheer)`.
pub fn variant_area_name(area_name: &str, variant: Variant) -> String {
    let replacement = match variant {
        Variant::Normal => return area_name.to_string(),
        Variant::Main => "(Main)",
        Variant::Sheer => "(Sheer)",
    };
    // The marker is ASCII, so both ends of a match are char boundaries
    match find_split_marker(area_name) {
        Some(pos) => format!(
            "{}{}{}",
            &area_name[..pos],
            replacement,
            &area_name[pos + SPLIT_MARKER.len()..]
        ),
        None => area_name.to_string(),
    }
}

/// A fresh row with tariff default rates.
pub fn new_row(item: &LineItem, category: Category, variant: Variant, tariff: &Tariff) -> CalculationRow {
    let dims = item.dimensions();
    let area_name = variant_area_name(&item.area_name, variant);
    let costing = match category.fabric_family() {
        Some(family) => {
            let rates = match family {
                FabricFamily::Local => tariff.default_rates.local,
                FabricFamily::Roman => tariff.default_rates.roman,
            };
            Costing::Fabric(FabricCosting::new(family, variant, &dims, rates))
        }
        None => match category {
            Category::Blinds => Costing::Blinds(BlindsCosting {
                sqft: blinds(&dims),
                rates: tariff.default_rates.blinds,
            }),
            Category::Somfy => {
                Costing::Somfy(SomfyCosting::new(&dims, item.gsm(), &area_name, tariff))
            }
            Category::Gpw => Costing::Gpw(GpwCosting::new(&dims, tariff)),
            _ => Costing::Forest(ForestCosting::new(&dims, item.gsm(), &area_name, tariff)),
        },
    };
    CalculationRow {
        selection_item_id: item.id.clone(),
        category,
        variant,
        area_name,
        product_name: item.product_name.clone(),
        width: item.width,
        height: item.height,
        unit: item.unit(),
        costing,
    }
}

/// A saved row brought up to date with its item.
fn restore_row(item: &LineItem, saved: &CalculationRow, tariff: &Tariff) -> CalculationRow {
    let mut row = saved.clone();
    row.area_name = variant_area_name(&item.area_name, row.variant);
    row.product_name = item.product_name.clone();

    let dims = item.dimensions();
    let moved = row.dimensions() != dims;
    row.width = dims.width;
    row.height = dims.height;
    row.unit = dims.unit;

    // A costing of the wrong shape for its category is unusable
    if !shape_matches(row.category, &row.costing) {
        tracing::debug!(item = %item.id, category = %row.category, "saved row has wrong shape, regenerated");
        return new_row(item, row.category, row.variant, tariff);
    }

    let gsm = item.gsm();
    match &mut row.costing {
        Costing::Fabric(c) => {
            if moved {
                c.recompute(&dims);
            }
        }
        Costing::Blinds(c) => {
            if moved {
                c.sqft = blinds(&dims);
            }
        }
        Costing::Forest(c) => {
            if gsm > 0.0 {
                c.gsm = gsm;
            }
            if c.motor_price <= 0.0 {
                c.motor_price = crate::forest::motor_price(&tariff.forest, c.motor);
            }
            if c.remote_price <= 0.0 {
                c.remote_price = crate::forest::remote_price(&tariff.forest, c.remote);
            }
            c.apply_dimensions(&dims, &row.area_name, tariff);
        }
        Costing::Somfy(c) => {
            if gsm > 0.0 {
                c.gsm = gsm;
            }
            c.recompute(&dims, &row.area_name, tariff);
        }
        Costing::Gpw(c) => c.recompute(&dims, tariff),
    }
    row
}

fn shape_matches(category: Category, costing: &Costing) -> bool {
    match costing {
        Costing::Fabric(c) => category.fabric_family() == Some(c.family),
        Costing::Blinds(_) => category == Category::Blinds,
        Costing::Forest(_) => category == Category::ForestAuto,
        Costing::Somfy(_) => category == Category::Somfy,
        Costing::Gpw(_) => category == Category::Gpw,
    }
}

fn build_rows(items: &[LineItem], saved: &[CalculationRow], tariff: &Tariff) -> Vec<CalculationRow> {
    let mut rows = Vec::new();
    for item in items {
        for category in item.calculation_type.iter() {
            for variant in variants_for(category, &item.area_name) {
                let key = RowKey::new(item.id.clone(), category, variant);
                let row = match saved.iter().find(|s| s.matches(&key)) {
                    Some(s) => restore_row(item, s, tariff),
                    None => new_row(item, category, variant, tariff),
                };
                rows.push(row);
            }
        }
    }
    rows.sort_by(|a, b| a.area_name.cmp(&b.area_name));
    rows
}

// ─── Edits and recomputation ─────────────────────────────────────────

/// Re-derive quantities after a measurement change. Manual motor/remote
/// prices on motorised rows survive.
fn apply_dimensions(row: &mut CalculationRow, tariff: &Tariff) {
    let dims = row.dimensions();
    match &mut row.costing {
        Costing::Fabric(c) => c.recompute(&dims),
        Costing::Blinds(c) => c.sqft = blinds(&dims),
        Costing::Forest(c) => c.apply_dimensions(&dims, &row.area_name, tariff),
        Costing::Somfy(c) => c.apply_dimensions(&dims, &row.area_name, tariff),
        Costing::Gpw(c) => c.recompute(&dims, tariff),
    }
}

/// Re-derive everything except rates, toggles and selections.
fn recompute_row(row: &mut CalculationRow, tariff: &Tariff) {
    let dims = row.dimensions();
    match &mut row.costing {
        Costing::Fabric(c) => c.recompute(&dims),
        Costing::Blinds(c) => c.sqft = blinds(&dims),
        Costing::Forest(c) => c.recompute(&dims, &row.area_name, tariff),
        Costing::Somfy(c) => c.recompute(&dims, &row.area_name, tariff),
        Costing::Gpw(c) => c.recompute(&dims, tariff),
    }
}

fn apply_edit(row: &mut CalculationRow, edit: &Edit, tariff: &Tariff) -> bool {
    match edit {
        Edit::Width(v) => {
            row.width = non_negative(*v);
            apply_dimensions(row, tariff);
            return true;
        }
        Edit::Height(v) => {
            row.height = non_negative(*v);
            apply_dimensions(row, tariff);
            return true;
        }
        Edit::Unit(u) => {
            row.unit = *u;
            apply_dimensions(row, tariff);
            return true;
        }
        _ => {}
    }

    let dims = row.dimensions();
    let area_name = row.area_name.as_str();
    match (&mut row.costing, edit) {
        (Costing::Fabric(c), Edit::Rate { field, value }) => c.rates.set(*field, *value),
        (Costing::Blinds(c), Edit::Rate { field, value }) => c.rates.set(*field, *value),
        (Costing::Fabric(c), Edit::Toggle { toggle, on }) => {
            c.set_toggle(*toggle, *on, &dims);
            true
        }
        (Costing::Fabric(c), Edit::Quantity { field, value }) => c.set_quantity(*field, *value),
        (Costing::Blinds(c), Edit::Quantity { field: QuantityField::Sqft, value }) => {
            c.sqft = non_negative(*value);
            true
        }
        (Costing::Forest(c), Edit::Quantity { field, value }) => {
            c.set_quantity(*field, *value, tariff)
        }
        (Costing::Gpw(c), Edit::Quantity { field, value }) => c.set_quantity(*field, *value, tariff),

        (Costing::Forest(c), Edit::Price { field, value }) => {
            c.set_price(*field, *value, tariff.gst_rate);
            true
        }
        (Costing::Somfy(c), Edit::Price { field, value }) => {
            c.set_price(*field, *value, tariff.gst_rate)
        }

        (Costing::Forest(c), Edit::Gsm(v)) => {
            c.gsm = non_negative(*v);
            c.motor_kg = motor_kg(c.gsm, c.fabric_qty, area_name);
            true
        }
        (Costing::Somfy(c), Edit::Gsm(v)) => {
            c.gsm = non_negative(*v);
            c.motor_kg = motor_kg(c.gsm, c.fabric_qty, area_name);
            true
        }

        (Costing::Forest(c), Edit::TrackFinish(id)) => {
            c.set_finish(TrackFinish::from_id(id), tariff);
            true
        }
        (Costing::Forest(c), Edit::Runner(id)) => {
            c.set_runner(Runner::from_id(id), tariff);
            true
        }
        (Costing::Forest(c), Edit::Tape(id)) => {
            c.set_tape(Tape::from_id(id), &dims, tariff);
            true
        }
        (Costing::Forest(c), Edit::ForestMotor(id)) => {
            c.set_motor(ForestMotor::from_id(id), tariff);
            true
        }
        (Costing::Forest(c), Edit::ForestRemote(id)) => {
            c.set_remote(ForestRemote::from_id(id), tariff);
            true
        }

        (Costing::Gpw(c), Edit::GpwType(id)) => {
            c.set_main_type(gpw_type(id), tariff);
            true
        }
        (Costing::Gpw(c), Edit::GpwMotor(id)) => {
            c.set_motor_type(gpw_type(id), tariff);
            true
        }
        (Costing::Gpw(c), Edit::GpwRemote(id)) => {
            c.set_remote_type(gpw_type(id), tariff);
            true
        }

        (Costing::Somfy(c), Edit::SomfyTrack(id)) => {
            c.set_track_type(SomfyTrack::from_id(id).unwrap_or(SomfyTrack::Ripple), tariff);
            true
        }
        (Costing::Somfy(c), Edit::SomfyDuty(id)) => {
            c.set_duty(SomfyDuty::from_id(id).unwrap_or(SomfyDuty::Medium), tariff);
            true
        }
        (Costing::Somfy(c), Edit::SomfyMotor(id)) => {
            c.set_motor(Some(id.clone()), tariff);
            true
        }
        (Costing::Somfy(c), Edit::SomfyRemote(id)) => {
            c.set_remote(Some(id.clone()), tariff);
            true
        }

        _ => false,
    }
}

fn gpw_type(id: &str) -> GpwType {
    GpwType::from_id(id).unwrap_or(GpwType::Gravel)
}

// ─── WASM ────────────────────────────────────────────────────────────

#[cfg(feature = "wasm")]
use wasm_bindgen::prelude::*;

#[cfg(feature = "wasm")]
fn session_json(session: &CostingSession<'_>) -> String {
    serde_json::json!({
        "selectionId": session.selection_id(),
        "rows": session.rows(),
        "categoryTotals": session.category_totals(),
        "grandTotal": session.grand_total(),
    })
    .to_string()
}

#[cfg(feature = "wasm")]
fn error_json(message: impl std::fmt::Display) -> String {
    serde_json::json!({ "error": message.to_string() }).to_string()
}

/// Cost a selection from its items and previously saved rows.
#[cfg(feature = "wasm")]
#[wasm_bindgen(js_name = "costSelection")]
pub fn cost_selection_wasm(selection_id: &str, items_json: &str, saved_json: &str) -> String {
    let items: Vec<LineItem> = match serde_json::from_str(items_json) {
        Ok(items) => items,
        Err(e) => return error_json(e),
    };
    let saved = crate::parse::parse_saved_rows(saved_json).unwrap_or_default();
    let session = CostingSession::open(selection_id, items, saved, &crate::tariff::TARIFF);
    session_json(&session)
}

/// Apply one edit to rows already on screen and return the updated set.
#[cfg(feature = "wasm")]
#[wasm_bindgen(js_name = "editCostingRow")]
pub fn edit_costing_row_wasm(
    selection_id: &str,
    items_json: &str,
    rows_json: &str,
    key_json: &str,
    edit_json: &str,
) -> String {
    let items: Vec<LineItem> = match serde_json::from_str(items_json) {
        Ok(items) => items,
        Err(e) => return error_json(e),
    };
    let rows = match crate::parse::parse_saved_rows(rows_json) {
        Ok(rows) => rows,
        Err(e) => return error_json(e),
    };
    let key: RowKey = match serde_json::from_str(key_json) {
        Ok(key) => key,
        Err(e) => return error_json(e),
    };
    let edit: Edit = match serde_json::from_str(edit_json) {
        Ok(edit) => edit,
        Err(e) => return error_json(e),
    };
    let mut session = CostingSession::from_rows(selection_id, items, rows, &crate::tariff::TARIFF);
    session.edit(&key, edit);
    session_json(&session)
}

// ─── Tests ───────────────────────────────────────────────────────────
