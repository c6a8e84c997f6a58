//! Line items, category tags and calculation rows
//!
//! A [`LineItem`] is owned by the selection; the core only reads it. Each
//! item produces one [`CalculationRow`] per assigned [`Category`] (and per
//! [`Variant`] when a curtain is split into main and sheer layers).

use std::collections::BTreeSet;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::forest::ForestCosting;
use crate::parse::{lenient_bool, lenient_f64, non_negative};
use crate::somfy::{GpwCosting, SomfyCosting};
use crate::tariff::{catalog_key, CatalogKey};
use crate::units::{to_inches, Unit};

catalog_key! {
    /// Calculation type assigned to a line item.
    Category {
        Local => "Local",
        ForestAuto => "Forest (Auto)",
        ForestManual => "Forest (Manual)",
        Somfy => "Somfy",
        SomfyManual => "Somfy (Manual)",
        Gpw => "GPW",
        Roman => "Roman",
        Blinds => "Blinds",
    }
}

impl Category {
    /// Fabric formula used when the category is costed as curtain fabric.
    pub fn fabric_family(&self) -> Option<FabricFamily> {
        match self {
            Category::Local | Category::ForestManual | Category::SomfyManual => {
                Some(FabricFamily::Local)
            }
            Category::Roman => Some(FabricFamily::Roman),
            Category::ForestAuto | Category::Somfy | Category::Gpw | Category::Blinds => None,
        }
    }
}

catalog_key! {
    /// Layer of a curtain row. `(M+S)` areas are split into Main and Sheer.
    #[derive(Default)]
    Variant {
        #[default]
        Normal => "Normal",
        Main => "Main",
        Sheer => "Sheer",
    }
}

/// The set of categories assigned to one item.
///
/// Persisted as a comma-joined string; tokens that are not a known tag are
/// kept aside so they can be reported, and never produce rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategorySet {
    categories: BTreeSet<Category>,
    unrecognized: Vec<String>,
}

impl CategorySet {
    pub fn parse(raw: &str) -> Self {
        let mut set = CategorySet::default();
        for token in raw.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            set.push_token(token);
        }
        set
    }

    fn push_token(&mut self, token: &str) {
        match Category::from_id(token) {
            Some(category) => {
                self.categories.insert(category);
            }
            None => self.unrecognized.push(token.to_string()),
        }
    }

    pub fn insert(&mut self, category: Category) -> bool {
        self.categories.insert(category)
    }

    pub fn remove(&mut self, category: Category) -> bool {
        self.categories.remove(&category)
    }

    /// Add the tag if absent, remove it if present.
    pub fn toggle(&mut self, category: Category) {
        if !self.categories.remove(&category) {
            self.categories.insert(category);
        }
    }

    pub fn contains(&self, category: Category) -> bool {
        self.categories.contains(&category)
    }

    pub fn iter(&self) -> impl Iterator<Item = Category> + '_ {
        self.categories.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn unrecognized(&self) -> &[String] {
        &self.unrecognized
    }

    /// Comma-joined tag string, as the selection stores it.
    pub fn to_tag_string(&self) -> String {
        self.categories
            .iter()
            .map(|c| c.id())
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl FromIterator<Category> for CategorySet {
    fn from_iter<I: IntoIterator<Item = Category>>(iter: I) -> Self {
        CategorySet {
            categories: iter.into_iter().collect(),
            unrecognized: Vec::new(),
        }
    }
}

impl Serialize for CategorySet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_tag_string())
    }
}

impl<'de> Deserialize<'de> for CategorySet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Joined(String),
            List(Vec<String>),
            Missing(()),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Joined(s) => CategorySet::parse(&s),
            Raw::List(tokens) => {
                let mut set = CategorySet::default();
                for token in tokens.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
                    set.push_token(token);
                }
                set
            }
            Raw::Missing(()) => CategorySet::default(),
        })
    }
}

/// An item of a selection, as handed to the core.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    /// Selection item id
    pub id: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub width: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub height: f64,
    /// Unit label as entered; see [`LineItem::unit`]
    #[serde(default, rename = "unit")]
    pub unit_label: String,
    #[serde(default)]
    pub calculation_type: CategorySet,
    #[serde(default)]
    pub area_name: String,
    #[serde(default)]
    pub product_name: String,
    /// Product attributes, searched for the fabric GSM
    #[serde(default)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

impl LineItem {
    /// Resolved unit (millimeters when absent or unrecognized).
    pub fn unit(&self) -> Unit {
        Unit::from_label(&self.unit_label)
    }

    pub fn dimensions(&self) -> Dimensions {
        Dimensions {
            width: self.width,
            height: self.height,
            unit: self.unit(),
        }
    }

    /// Fabric weight per square meter from the product attributes.
    pub fn gsm(&self) -> f64 {
        crate::parse::gsm_from_attributes(&self.attributes)
    }
}

/// Raw measurement of a row.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Dimensions {
    pub width: f64,
    pub height: f64,
    pub unit: Unit,
}

impl Dimensions {
    pub fn new(width: f64, height: f64, unit: Unit) -> Self {
        Self { width, height, unit }
    }

    pub fn width_in(&self) -> f64 {
        to_inches(self.width, self.unit)
    }

    pub fn height_in(&self) -> f64 {
        to_inches(self.height, self.unit)
    }
}

// ─── Calculation rows ────────────────────────────────────────────────

/// Identity of a row within a costing session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowKey {
    pub selection_item_id: String,
    pub category: Category,
    #[serde(default)]
    pub variant: Variant,
}

impl RowKey {
    pub fn new(selection_item_id: impl Into<String>, category: Category, variant: Variant) -> Self {
        Self {
            selection_item_id: selection_item_id.into(),
            category,
            variant,
        }
    }
}

/// Quantities, rates and totals of one item under one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculationRow {
    pub selection_item_id: String,
    pub category: Category,
    #[serde(default)]
    pub variant: Variant,
    #[serde(default)]
    pub area_name: String,
    #[serde(default)]
    pub product_name: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub width: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub height: f64,
    #[serde(default)]
    pub unit: Unit,
    pub costing: Costing,
}

impl CalculationRow {
    pub fn key(&self) -> RowKey {
        RowKey::new(self.selection_item_id.clone(), self.category, self.variant)
    }

    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.width, self.height, self.unit)
    }

    pub fn matches(&self, key: &RowKey) -> bool {
        self.selection_item_id == key.selection_item_id
            && self.category == key.category
            && self.variant == key.variant
    }
}

/// Category-specific part of a row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Costing {
    Fabric(FabricCosting),
    Blinds(BlindsCosting),
    Forest(ForestCosting),
    Somfy(SomfyCosting),
    Gpw(GpwCosting),
}

/// Which fabric formula a curtain row follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FabricFamily {
    /// Pleated curtain: panna from width, fabric from drop
    #[default]
    Local,
    /// Roman blind: area-billed panna, fabric per part
    Roman,
}

/// Curtain fabric row (Local, Forest (Manual), Somfy (Manual), Roman).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FabricCosting {
    #[serde(default)]
    pub family: FabricFamily,
    #[serde(default)]
    pub quantities: FabricQuantities,
    #[serde(default)]
    pub rates: FabricRates,
    #[serde(default)]
    pub toggles: FabricToggles,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FabricQuantities {
    #[serde(deserialize_with = "lenient_f64")]
    pub panna: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub part: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub fabric: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub blackout: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub sheer: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub channel: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub labour: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub fitting: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub weight_chain: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FabricRates {
    #[serde(deserialize_with = "lenient_f64")]
    pub fabric: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub blackout: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub sheer: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub channel: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub labour: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub fitting: f64,
}

/// Which components count towards a fabric row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FabricToggles {
    #[serde(deserialize_with = "lenient_bool")]
    pub fabric: bool,
    #[serde(deserialize_with = "lenient_bool")]
    pub blackout: bool,
    #[serde(deserialize_with = "lenient_bool")]
    pub sheer: bool,
    #[serde(deserialize_with = "lenient_bool")]
    pub channel: bool,
    #[serde(deserialize_with = "lenient_bool")]
    pub labour: bool,
    #[serde(deserialize_with = "lenient_bool")]
    pub fitting: bool,
}

impl Default for FabricToggles {
    fn default() -> Self {
        Self::for_new_row(FabricFamily::Local, Variant::Normal)
    }
}

impl FabricToggles {
    /// Toggles of a freshly generated row.
    ///
    /// A sheer layer carries only sheer fabric and stitching; Roman blinds
    /// have no channel.
    pub fn for_new_row(family: FabricFamily, variant: Variant) -> Self {
        let sheer_layer = variant == Variant::Sheer;
        Self {
            fabric: !sheer_layer,
            blackout: !sheer_layer,
            sheer: sheer_layer,
            channel: !sheer_layer && family != FabricFamily::Roman,
            labour: true,
            fitting: !sheer_layer,
        }
    }

    pub fn get(&self, toggle: Toggle) -> bool {
        match toggle {
            Toggle::Fabric => self.fabric,
            Toggle::Blackout => self.blackout,
            Toggle::Sheer => self.sheer,
            Toggle::Channel => self.channel,
            Toggle::Labour => self.labour,
            Toggle::Fitting => self.fitting,
        }
    }

    pub fn set(&mut self, toggle: Toggle, on: bool) {
        match toggle {
            Toggle::Fabric => self.fabric = on,
            Toggle::Blackout => self.blackout = on,
            Toggle::Sheer => self.sheer = on,
            Toggle::Channel => self.channel = on,
            Toggle::Labour => self.labour = on,
            Toggle::Fitting => self.fitting = on,
        }
    }
}

/// Blind or rug billed by area.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BlindsCosting {
    #[serde(deserialize_with = "lenient_f64")]
    pub sqft: f64,
    pub rates: BlindsRates,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BlindsRates {
    #[serde(deserialize_with = "lenient_f64")]
    pub sqft: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub labour: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub fitting: f64,
}

// ─── Editable fields ─────────────────────────────────────────────────

/// A user-editable rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RateField {
    Fabric,
    Blackout,
    Sheer,
    Channel,
    Labour,
    Fitting,
    /// Blinds material rate
    Sqft,
}

/// A component switch of a fabric row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Toggle {
    Fabric,
    Blackout,
    Sheer,
    Channel,
    Labour,
    Fitting,
}

/// A quantity the user may override by hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum QuantityField {
    Panna,
    Part,
    Fabric,
    Blackout,
    Sheer,
    Channel,
    Labour,
    Fitting,
    WeightChain,
    Sqft,
    Rft,
}

impl FabricRates {
    pub fn get(&self, field: RateField) -> Option<f64> {
        match field {
            RateField::Fabric => Some(self.fabric),
            RateField::Blackout => Some(self.blackout),
            RateField::Sheer => Some(self.sheer),
            RateField::Channel => Some(self.channel),
            RateField::Labour => Some(self.labour),
            RateField::Fitting => Some(self.fitting),
            RateField::Sqft => None,
        }
    }

    /// Returns false when the row has no such rate.
    pub fn set(&mut self, field: RateField, value: f64) -> bool {
        let slot = match field {
            RateField::Fabric => &mut self.fabric,
            RateField::Blackout => &mut self.blackout,
            RateField::Sheer => &mut self.sheer,
            RateField::Channel => &mut self.channel,
            RateField::Labour => &mut self.labour,
            RateField::Fitting => &mut self.fitting,
            RateField::Sqft => return false,
        };
        *slot = non_negative(value);
        true
    }
}

impl BlindsRates {
    pub fn set(&mut self, field: RateField, value: f64) -> bool {
        let slot = match field {
            RateField::Sqft => &mut self.sqft,
            RateField::Labour => &mut self.labour,
            RateField::Fitting => &mut self.fitting,
            _ => return false,
        };
        *slot = non_negative(value);
        true
    }
}
