//! Somfy and Gravel/Pulse/Weave motorised track costing
//!
//! Somfy tracks are priced by meter bracket:
//!   roundedMeters = frac > 0.09 ? floor + 1 : max(2, floor)
//!   bracket       = table[clamp(roundedMeters - 1, 0, last)]
//! Motors and remotes are vendor SKUs looked up by code or name.
//!
//! GPW channels are priced per running foot, with motor and remote bases
//! taken from their own (possibly different) channel family.

use serde::{Deserialize, Serialize};

use crate::calculation::{fabric_for_kg, motor_kg, CHANNEL_WIDTH_IN};
use crate::forest::PriceField;
use crate::model::{Dimensions, QuantityField};
use crate::parse::{lenient_f64, lenient_key, non_negative};
use crate::rounding::strict_threshold;
use crate::tariff::{CatalogKey, GpwTariff, GpwType, SomfyDuty, SomfyTariff, SomfyTrack, Tariff};
use crate::totals::GstSplit;
use crate::units::to_meters;

// ─── Somfy ───────────────────────────────────────────────────────────

/// Whole meters billed for a track of `meters`.
pub fn rounded_meters(meters: f64, minimum: f64) -> f64 {
    if !meters.is_finite() || meters <= 0.0 {
        return 0.0;
    }
    let whole = meters.floor();
    let fraction = ((meters - whole) * 1000.0).round() / 1000.0;
    if fraction > crate::rounding::STRICT_THRESHOLD {
        whole + 1.0
    } else {
        whole.max(minimum)
    }
}

/// Bracket index for a rounded length, clamped to the table.
pub fn bracket_index(rounded: f64, len: usize) -> usize {
    let last = len.saturating_sub(1);
    if rounded <= 1.0 {
        return 0;
    }
    ((rounded - 1.0) as usize).min(last)
}

/// Track price and bracket label; zero length prices nothing.
pub fn somfy_track_price(
    tariff: &SomfyTariff,
    track: SomfyTrack,
    duty: SomfyDuty,
    rounded: f64,
) -> (f64, String) {
    if rounded <= 0.0 {
        return (0.0, String::new());
    }
    let table = tariff.table(track);
    match table.get(bracket_index(rounded, table.len())) {
        Some(tier) => (tier.price(duty), tier.label.clone()),
        None => (0.0, String::new()),
    }
}

fn default_track() -> SomfyTrack {
    SomfyTrack::Ripple
}

fn default_duty() -> SomfyDuty {
    SomfyDuty::Medium
}

fn lenient_track<'de, D: serde::Deserializer<'de>>(d: D) -> Result<SomfyTrack, D::Error> {
    Ok(lenient_key(d)?.unwrap_or_else(default_track))
}

fn lenient_duty<'de, D: serde::Deserializer<'de>>(d: D) -> Result<SomfyDuty, D::Error> {
    Ok(lenient_key(d)?.unwrap_or_else(default_duty))
}

/// `"none"` and empty strings mean no SKU.
fn sku(raw: Option<String>) -> Option<String> {
    raw.map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("none"))
}

/// Somfy row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SomfyCosting {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub gsm: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub fabric_qty: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub motor_kg: f64,

    #[serde(default = "default_track", deserialize_with = "lenient_track")]
    pub track_type: SomfyTrack,
    #[serde(default = "default_duty", deserialize_with = "lenient_duty")]
    pub duty: SomfyDuty,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub rounded_meters: f64,
    #[serde(default)]
    pub bracket_label: String,
    /// Motor SKU code or name
    #[serde(default)]
    pub motor: Option<String>,
    /// Remote SKU code or name
    #[serde(default)]
    pub remote: Option<String>,

    #[serde(default, deserialize_with = "lenient_f64")]
    pub track_price: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub motor_price: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub remote_price: f64,

    #[serde(default)]
    pub track_gst: GstSplit,
    #[serde(default)]
    pub motor_gst: GstSplit,
    #[serde(default)]
    pub remote_gst: GstSplit,
}

impl SomfyCosting {
    /// A new Ripple / Medium row with no motor or remote.
    pub fn new(dims: &Dimensions, gsm: f64, area_name: &str, tariff: &Tariff) -> Self {
        let mut row = Self {
            gsm,
            fabric_qty: 0.0,
            motor_kg: 0.0,
            track_type: default_track(),
            duty: default_duty(),
            rounded_meters: 0.0,
            bracket_label: String::new(),
            motor: None,
            remote: None,
            track_price: 0.0,
            motor_price: 0.0,
            remote_price: 0.0,
            track_gst: GstSplit::default(),
            motor_gst: GstSplit::default(),
            remote_gst: GstSplit::default(),
        };
        row.recompute(dims, area_name, tariff);
        row
    }

    /// Re-derive the track bracket, SKU prices and motor load.
    pub fn recompute(&mut self, dims: &Dimensions, area_name: &str, tariff: &Tariff) {
        self.motor = sku(self.motor.take());
        self.remote = sku(self.remote.take());
        self.motor_price = self
            .motor
            .as_deref()
            .and_then(|m| tariff.somfy.motor(m))
            .map_or(0.0, |e| e.price);
        self.remote_price = self
            .remote
            .as_deref()
            .and_then(|r| tariff.somfy.remote(r))
            .map_or(0.0, |e| e.price);
        self.apply_dimensions(dims, area_name, tariff);
    }

    /// Re-derive the length-dependent values; motor and remote are kept.
    pub fn apply_dimensions(&mut self, dims: &Dimensions, area_name: &str, tariff: &Tariff) {
        let meters = to_meters(dims.width, dims.unit);
        self.rounded_meters = rounded_meters(meters, tariff.somfy.minimum_meters);
        self.reprice_track(tariff);
        self.fabric_qty = fabric_for_kg(dims);
        self.motor_kg = motor_kg(self.gsm, self.fabric_qty, area_name);
        self.refresh_gst(tariff.gst_rate);
    }

    fn reprice_track(&mut self, tariff: &Tariff) {
        let (price, label) =
            somfy_track_price(&tariff.somfy, self.track_type, self.duty, self.rounded_meters);
        self.track_price = price;
        self.bracket_label = label;
    }

    pub fn set_track_type(&mut self, track: SomfyTrack, tariff: &Tariff) {
        self.track_type = track;
        self.reprice_track(tariff);
        self.refresh_gst(tariff.gst_rate);
    }

    pub fn set_duty(&mut self, duty: SomfyDuty, tariff: &Tariff) {
        self.duty = duty;
        self.reprice_track(tariff);
        self.refresh_gst(tariff.gst_rate);
    }

    pub fn set_motor(&mut self, motor: Option<String>, tariff: &Tariff) {
        self.motor = sku(motor);
        self.motor_price = self
            .motor
            .as_deref()
            .and_then(|m| tariff.somfy.motor(m))
            .map_or(0.0, |e| e.price);
        self.refresh_gst(tariff.gst_rate);
    }

    pub fn set_remote(&mut self, remote: Option<String>, tariff: &Tariff) {
        self.remote = sku(remote);
        self.remote_price = self
            .remote
            .as_deref()
            .and_then(|r| tariff.somfy.remote(r))
            .map_or(0.0, |e| e.price);
        self.refresh_gst(tariff.gst_rate);
    }

    /// Manual price override; runner and tape do not exist on Somfy rows.
    pub fn set_price(&mut self, field: PriceField, value: f64, gst_rate: f64) -> bool {
        let slot = match field {
            PriceField::Track => &mut self.track_price,
            PriceField::Motor => &mut self.motor_price,
            PriceField::Remote => &mut self.remote_price,
            PriceField::Runner | PriceField::Tape => return false,
        };
        *slot = non_negative(value);
        self.refresh_gst(gst_rate);
        true
    }

    pub fn refresh_gst(&mut self, gst_rate: f64) {
        self.track_gst = GstSplit::of(self.track_price, gst_rate);
        self.motor_gst = GstSplit::of(self.motor_price, gst_rate);
        self.remote_gst = GstSplit::of(self.remote_price, gst_rate);
    }

    pub fn total(&self) -> f64 {
        self.track_gst.total + self.motor_gst.total + self.remote_gst.total
    }
}

// ─── Gravel / Pulse / Weave ──────────────────────────────────────────

/// Family whose base price equals a saved price, Gravel otherwise.
pub fn type_from_motor_price(tariff: &GpwTariff, price: f64) -> GpwType {
    type_from_price(tariff, price, |r| r.motor_base)
}

pub fn type_from_remote_price(tariff: &GpwTariff, price: f64) -> GpwType {
    type_from_price(tariff, price, |r| r.remote_base)
}

fn type_from_price(
    tariff: &GpwTariff,
    price: f64,
    base: impl Fn(&crate::tariff::GpwRates) -> f64,
) -> GpwType {
    [GpwType::Pulse, GpwType::Weave]
        .into_iter()
        .find(|t| (base(tariff.get(*t)) - price).abs() < 0.005)
        .unwrap_or(GpwType::Gravel)
}

fn default_gpw() -> GpwType {
    GpwType::Gravel
}

fn lenient_gpw<'de, D: serde::Deserializer<'de>>(d: D) -> Result<GpwType, D::Error> {
    Ok(lenient_key(d)?.unwrap_or_else(default_gpw))
}

/// GPW row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GpwCosting {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub rft: f64,
    /// Channel family; drives the track rate
    #[serde(default = "default_gpw", deserialize_with = "lenient_gpw")]
    pub main_type: GpwType,
    /// Resolved on load when only a saved price is known
    #[serde(default, deserialize_with = "lenient_key")]
    pub motor_type: Option<GpwType>,
    #[serde(default, deserialize_with = "lenient_key")]
    pub remote_type: Option<GpwType>,

    #[serde(default, deserialize_with = "lenient_f64")]
    pub track_price: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub motor_price: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub remote_price: f64,

    #[serde(default)]
    pub track_gst: GstSplit,
    #[serde(default)]
    pub motor_gst: GstSplit,
    #[serde(default)]
    pub remote_gst: GstSplit,
}

impl GpwCosting {
    pub fn new(dims: &Dimensions, tariff: &Tariff) -> Self {
        let mut row = Self {
            rft: 0.0,
            main_type: default_gpw(),
            motor_type: None,
            remote_type: None,
            track_price: 0.0,
            motor_price: 0.0,
            remote_price: 0.0,
            track_gst: GstSplit::default(),
            motor_gst: GstSplit::default(),
            remote_gst: GstSplit::default(),
        };
        row.recompute(dims, tariff);
        row
    }

    /// Fill in motor/remote families of a saved row that only kept prices.
    ///
    /// A positive saved price identifies its family; otherwise the main
    /// family is used.
    pub fn resolve_types(&mut self, tariff: &GpwTariff) {
        if self.motor_type.is_none() {
            self.motor_type = Some(if self.motor_price > 0.0 {
                type_from_motor_price(tariff, self.motor_price)
            } else {
                self.main_type
            });
        }
        if self.remote_type.is_none() {
            self.remote_type = Some(if self.remote_price > 0.0 {
                type_from_remote_price(tariff, self.remote_price)
            } else {
                self.main_type
            });
        }
    }

    /// Re-derive every price from the width and the three families.
    pub fn recompute(&mut self, dims: &Dimensions, tariff: &Tariff) {
        self.resolve_types(&tariff.gpw);
        self.rft = strict_threshold(dims.width_in() / CHANNEL_WIDTH_IN);
        self.reprice(tariff);
    }

    fn reprice(&mut self, tariff: &Tariff) {
        let main = self.main_type;
        let motor = self.motor_type.unwrap_or(main);
        let remote = self.remote_type.unwrap_or(main);
        self.track_price = self.rft * tariff.gpw.get(main).track_rate;
        self.motor_price = tariff.gpw.get(motor).motor_base;
        self.remote_price = tariff.gpw.get(remote).remote_base;
        self.refresh_gst(tariff.gst_rate);
    }

    /// Change the channel family; motor and remote follow it.
    pub fn set_main_type(&mut self, kind: GpwType, tariff: &Tariff) {
        self.main_type = kind;
        self.motor_type = Some(kind);
        self.remote_type = Some(kind);
        self.reprice(tariff);
    }

    pub fn set_motor_type(&mut self, kind: GpwType, tariff: &Tariff) {
        self.motor_type = Some(kind);
        self.reprice(tariff);
    }

    pub fn set_remote_type(&mut self, kind: GpwType, tariff: &Tariff) {
        self.remote_type = Some(kind);
        self.reprice(tariff);
    }

    /// Manual running-feet override.
    pub fn set_quantity(&mut self, field: QuantityField, value: f64, tariff: &Tariff) -> bool {
        match field {
            QuantityField::Rft => {
                self.rft = non_negative(value);
                self.reprice(tariff);
                true
            }
            _ => false,
        }
    }

    pub fn refresh_gst(&mut self, gst_rate: f64) {
        self.track_gst = GstSplit::of(self.track_price, gst_rate);
        self.motor_gst = GstSplit::of(self.motor_price, gst_rate);
        self.remote_gst = GstSplit::of(self.remote_price, gst_rate);
    }

    pub fn total(&self) -> f64 {
        self.track_gst.total + self.motor_gst.total + self.remote_gst.total
    }

    /// Family ids as persisted.
    pub fn type_ids(&self) -> (&'static str, Option<&'static str>, Option<&'static str>) {
        (
            self.main_type.id(),
            self.motor_type.map(|t| t.id()),
            self.remote_type.map(|t| t.id()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tariff::TARIFF;
    use crate::units::Unit;

    #[test]
    fn test_rounded_meters() {
        assert!((rounded_meters(2.5, 2.0) - 3.0).abs() < f64::EPSILON);
        assert!((rounded_meters(3.05, 2.0) - 3.0).abs() < f64::EPSILON);
        assert!((rounded_meters(1.05, 2.0) - 2.0).abs() < f64::EPSILON);
        assert!((rounded_meters(0.5, 2.0) - 1.0).abs() < f64::EPSILON);
        assert!(rounded_meters(0.0, 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_bracket_index_clamped() {
        assert_eq!(bracket_index(1.0, 9), 0);
        assert_eq!(bracket_index(2.0, 9), 1);
        assert_eq!(bracket_index(9.0, 9), 8);
        assert_eq!(bracket_index(15.0, 9), 8);
    }

    #[test]
    fn test_somfy_track_bracket_and_duty() {
        // 3 rounded meters index the fourth-meter bracket
        let (price, label) =
            somfy_track_price(&TARIFF.somfy, SomfyTrack::Ripple, SomfyDuty::Heavy, 3.0);
        assert_eq!(label, "3m - 4m");
        assert!((price - 24945.0).abs() < f64::EPSILON);
        // Minimum billing of 2 m stays in the second bracket
        let (price, label) =
            somfy_track_price(&TARIFF.somfy, SomfyTrack::Ripple, SomfyDuty::Medium, 2.0);
        assert_eq!(label, "2m - 3m");
        assert!((price - 15753.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_somfy_zero_width_is_free() {
        let row = SomfyCosting::new(&Dimensions::new(0.0, 2000.0, Unit::Millimeter), 0.0, "", &TARIFF);
        assert!(row.total().abs() < f64::EPSILON);
        assert!(row.bracket_label.is_empty());
    }

    #[test]
    fn test_somfy_row_with_skus() {
        let dims = Dimensions::new(2500.0, 2400.0, Unit::Millimeter);
        let mut row = SomfyCosting::new(&dims, 0.0, "Living", &TARIFF);
        assert!((row.rounded_meters - 3.0).abs() < f64::EPSILON);
        assert!((row.track_price - 19864.0).abs() < f64::EPSILON);

        row.set_motor(Some("1240437".into()), &TARIFF);
        assert!((row.motor_price - 21744.0).abs() < f64::EPSILON);
        row.set_remote(Some("Situo RTS".into()), &TARIFF);
        assert!((row.remote_price - 6626.0).abs() < f64::EPSILON);
        row.set_remote(Some("none".into()), &TARIFF);
        assert_eq!(row.remote, None);
        assert!(row.remote_gst.total.abs() < f64::EPSILON);
    }

    #[test]
    fn test_somfy_runner_price_not_applicable() {
        let dims = Dimensions::new(2500.0, 2400.0, Unit::Millimeter);
        let mut row = SomfyCosting::new(&dims, 0.0, "Living", &TARIFF);
        assert!(!row.set_price(PriceField::Runner, 100.0, 0.18));
        assert!(row.set_price(PriceField::Track, 1000.0, 0.18));
        assert!((row.track_gst.total - 1180.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_gpw_pricing() {
        // 84" -> 7 rft
        let row = GpwCosting::new(&Dimensions::new(84.0, 96.0, Unit::Inch), &TARIFF);
        assert!((row.rft - 7.0).abs() < f64::EPSILON);
        assert!((row.track_price - 7.0 * 750.0).abs() < 1e-9);
        assert!((row.motor_price - 8500.0).abs() < f64::EPSILON);
        assert!((row.remote_gst.total - (2400.0f64 * 1.18).round()).abs() < f64::EPSILON);
    }

    #[test]
    fn test_gpw_main_type_resets_components() {
        let dims = Dimensions::new(84.0, 96.0, Unit::Inch);
        let mut row = GpwCosting::new(&dims, &TARIFF);
        row.set_motor_type(GpwType::Weave, &TARIFF);
        assert!((row.motor_price - 14500.0).abs() < f64::EPSILON);

        row.set_main_type(GpwType::Pulse, &TARIFF);
        assert_eq!(row.motor_type, Some(GpwType::Pulse));
        assert_eq!(row.remote_type, Some(GpwType::Pulse));
        assert!((row.track_price - 7.0 * 900.0).abs() < 1e-9);
        assert!((row.motor_price - 11500.0).abs() < f64::EPSILON);

        // Components can still diverge afterwards
        row.set_remote_type(GpwType::Gravel, &TARIFF);
        assert!((row.remote_price - 2400.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_gpw_type_detection_from_saved_prices() {
        let json = r#"{"mainType": "Gravel", "motorPrice": "14500", "remotePrice": 0}"#;
        let mut row: GpwCosting = serde_json::from_str(json).unwrap();
        row.resolve_types(&TARIFF.gpw);
        assert_eq!(row.motor_type, Some(GpwType::Weave));
        assert_eq!(row.remote_type, Some(GpwType::Gravel));

        // Unrecognised price falls back to Gravel
        assert_eq!(type_from_motor_price(&TARIFF.gpw, 1234.0), GpwType::Gravel);
        assert_eq!(type_from_remote_price(&TARIFF.gpw, 2800.0), GpwType::Pulse);
    }

    #[test]
    fn test_gpw_unknown_main_type_is_gravel() {
        let row: GpwCosting = serde_json::from_str(r#"{"mainType": "Marble"}"#).unwrap();
        assert_eq!(row.main_type, GpwType::Gravel);
    }
}
