//! Fabric, Roman and blinds quantity calculation from measurements
//!
//! Local (pleated) curtain:
//!   panna   = round(w / 21)                  (unless supplied)
//!   channel = w / 12
//!   fabric  = ((h + 15) / 39) * panna
//!   weightChain = hasSheer ? panna * 54 / 39 : 0
//!   labour  = strict(w / 21) * band(h)
//!
//! Roman blind:
//!   part   = w > 50 ? w / 50 : 1
//!   panna  = minimumFloor(16, w * h / 144)
//!   fabric = ceil(h + 15) * part / 39
//!
//! Blinds / rugs:
//!   sqft = minimumFloor(14, w * h / 144)
//!
//! All widths and heights are in inches after unit conversion. The raw
//! results here are unrounded; [`derive_fabric`] applies the billing
//! rounding that rows carry.

use serde::Serialize;

use crate::model::{
    Dimensions, FabricCosting, FabricFamily, FabricQuantities, FabricRates, FabricToggles,
    QuantityField, Toggle, Variant,
};
use crate::parse::non_negative;
use crate::rounding::{minimum_floor, quarter_step, round2, strict_threshold};

/// Inches of fabric width per pleat (panna).
pub const PANNA_WIDTH_IN: f64 = 21.0;
/// Inches of track per channel foot.
pub const CHANNEL_WIDTH_IN: f64 = 12.0;
/// Stitching allowance added to every drop.
pub const HEM_ALLOWANCE_IN: f64 = 15.0;
/// Inches per billed fabric length.
pub const FABRIC_LENGTH_IN: f64 = 39.0;
/// Weight chain inches per panna.
pub const WEIGHT_CHAIN_PER_PANNA: f64 = 54.0;
/// Width of one Roman part.
pub const ROMAN_PART_WIDTH_IN: f64 = 50.0;
/// Minimum billed Roman area (sq ft).
pub const ROMAN_MIN_SQFT: f64 = 16.0;
/// Minimum billed blinds area (sq ft).
pub const BLINDS_MIN_SQFT: f64 = 14.0;
/// Blackout lining GSM added to main curtains for motor load.
pub const MAIN_CURTAIN_LINING_GSM: f64 = 280.0;

/// Options of the Local calculator
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalOptions {
    /// Pre-supplied panna; non-positive values are ignored
    pub panna: Option<f64>,
    pub has_blackout: bool,
    pub has_sheer: bool,
}

/// Unrounded Local curtain quantities
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalQuantities {
    pub panna: f64,
    pub channel: f64,
    pub fabric: f64,
    pub blackout: f64,
    pub sheer: f64,
    pub weight_chain: f64,
    /// Billable stitching pleats after the height band
    pub labour: f64,
}

/// Local (pleated) curtain quantities.
pub fn local(dims: &Dimensions, options: &LocalOptions) -> LocalQuantities {
    let w = dims.width_in();
    let h = dims.height_in();

    let panna = match options.panna {
        Some(p) if p > 0.0 && p.is_finite() => p,
        _ => (w / PANNA_WIDTH_IN).round().max(0.0),
    };
    let channel = (w / CHANNEL_WIDTH_IN).max(0.0);
    let fabric = if h > 0.0 {
        ((h + HEM_ALLOWANCE_IN) / FABRIC_LENGTH_IN) * panna
    } else {
        0.0
    };
    let weight_chain = if options.has_sheer {
        panna * WEIGHT_CHAIN_PER_PANNA / FABRIC_LENGTH_IN
    } else {
        0.0
    };

    LocalQuantities {
        panna,
        channel,
        fabric,
        blackout: if options.has_blackout { fabric } else { 0.0 },
        sheer: if options.has_sheer { fabric } else { 0.0 },
        weight_chain,
        labour: labour_pleats(w, h),
    }
}

/// Stitching multiplier by drop height (inches).
///
/// | height       | band |
/// |--------------|------|
/// | below 115    | 1    |
/// | 115..=145    | 1.5  |
/// | 145..=280    | 2    |
/// | above 280    | 3    |
pub fn labour_band(height_in: f64) -> f64 {
    if height_in < 115.0 {
        1.0
    } else if height_in <= 145.0 {
        1.5
    } else if height_in <= 280.0 {
        2.0
    } else {
        3.0
    }
}

/// Pleats charged for stitching: `strict(w / 21) * band(h)`.
pub fn labour_pleats(width_in: f64, height_in: f64) -> f64 {
    if height_in <= 0.0 {
        return 0.0;
    }
    strict_threshold(width_in / PANNA_WIDTH_IN) * labour_band(height_in)
}

/// Unrounded Roman blind quantities
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RomanQuantities {
    pub part: f64,
    /// Billed area in sq ft (minimum 16)
    pub panna: f64,
    pub fabric: f64,
}

/// Roman blind quantities.
pub fn roman(dims: &Dimensions) -> RomanQuantities {
    let w = dims.width_in();
    let h = dims.height_in();

    let part = if w > ROMAN_PART_WIDTH_IN {
        w / ROMAN_PART_WIDTH_IN
    } else {
        1.0
    };
    let panna = minimum_floor(ROMAN_MIN_SQFT, w * h / 144.0);
    let fabric = if h > 0.0 {
        (h + HEM_ALLOWANCE_IN).ceil() * part / FABRIC_LENGTH_IN
    } else {
        0.0
    };

    RomanQuantities { part, panna, fabric }
}

/// Billed blinds/rug area in sq ft (minimum 14).
pub fn blinds(dims: &Dimensions) -> f64 {
    minimum_floor(BLINDS_MIN_SQFT, dims.width_in() * dims.height_in() / 144.0)
}

// ─── Motor load ──────────────────────────────────────────────────────

/// Fabric length hung on a motorised track, for the motor load estimate.
pub fn fabric_for_kg(dims: &Dimensions) -> f64 {
    let w = dims.width_in();
    let h = dims.height_in();
    if w <= 0.0 || h <= 0.0 {
        return 0.0;
    }
    let panna = strict_threshold(w / PANNA_WIDTH_IN);
    round2(((h + HEM_ALLOWANCE_IN) / FABRIC_LENGTH_IN) * panna)
}

/// Whether the area is a main (lined) curtain, marked `(M)` in its name.
pub fn is_main_curtain(area_name: &str) -> bool {
    area_name.to_uppercase().contains("(M)")
}

/// Curtain weight in kg the motor has to pull.
pub fn motor_kg(gsm: f64, fabric_qty: f64, area_name: &str) -> f64 {
    let lining = if is_main_curtain(area_name) {
        MAIN_CURTAIN_LINING_GSM
    } else {
        0.0
    };
    round2((gsm.max(0.0) + lining) * 1.39 * fabric_qty / 1000.0)
}

// ─── Billing rows ────────────────────────────────────────────────────

/// Billable quantities of a fabric row.
///
/// Fabric lengths are rounded up to the quarter, pleat counts and channel
/// feet by the strict threshold. Components whose toggle is off are 0.
pub fn derive_fabric(
    family: FabricFamily,
    dims: &Dimensions,
    toggles: &FabricToggles,
) -> FabricQuantities {
    let measured = dims.width_in() > 0.0;
    let mut q = match family {
        FabricFamily::Local => {
            let raw = local(
                dims,
                &LocalOptions {
                    panna: None,
                    has_blackout: toggles.blackout,
                    has_sheer: toggles.sheer,
                },
            );
            let fabric = quarter_step(raw.fabric);
            FabricQuantities {
                panna: raw.panna,
                part: if measured { 1.0 } else { 0.0 },
                fabric,
                blackout: fabric,
                sheer: fabric,
                channel: strict_threshold(raw.channel),
                labour: raw.labour,
                fitting: if measured { 1.0 } else { 0.0 },
                weight_chain: round2(raw.weight_chain),
            }
        }
        FabricFamily::Roman => {
            let raw = roman(dims);
            let fabric = quarter_step(raw.fabric);
            FabricQuantities {
                panna: raw.panna,
                part: if measured { round2(raw.part) } else { 0.0 },
                fabric,
                blackout: fabric,
                sheer: fabric,
                channel: 0.0,
                labour: raw.panna,
                fitting: if measured { 1.0 } else { 0.0 },
                weight_chain: 0.0,
            }
        }
    };
    mask(&mut q, toggles);
    q
}

fn mask(q: &mut FabricQuantities, toggles: &FabricToggles) {
    let slots = [
        (Toggle::Fabric, &mut q.fabric),
        (Toggle::Blackout, &mut q.blackout),
        (Toggle::Sheer, &mut q.sheer),
        (Toggle::Channel, &mut q.channel),
        (Toggle::Labour, &mut q.labour),
        (Toggle::Fitting, &mut q.fitting),
    ];
    for (toggle, slot) in slots {
        if !toggles.get(toggle) {
            *slot = 0.0;
        }
    }
}

impl FabricCosting {
    /// A freshly generated row with default toggles for the variant.
    pub fn new(family: FabricFamily, variant: Variant, dims: &Dimensions, rates: FabricRates) -> Self {
        let toggles = FabricToggles::for_new_row(family, variant);
        Self {
            family,
            quantities: derive_fabric(family, dims, &toggles),
            rates,
            toggles,
        }
    }

    /// Re-derive every quantity from the measurement; rates are kept.
    pub fn recompute(&mut self, dims: &Dimensions) {
        self.quantities = derive_fabric(self.family, dims, &self.toggles);
    }

    /// Switch a component on or off and re-derive quantities.
    pub fn set_toggle(&mut self, toggle: Toggle, on: bool, dims: &Dimensions) {
        self.toggles.set(toggle, on);
        self.recompute(dims);
    }

    /// Manually override a quantity.
    ///
    /// A fabric override also feeds blackout and sheer where they are on.
    /// Negative or non-finite values become 0. Returns false when the field does not belong to a fabric row.
    pub fn set_quantity(&mut self, field: QuantityField, value: f64) -> bool {
        let value = non_negative(value);
        let q = &mut self.quantities;
        match field {
            QuantityField::Panna => q.panna = value,
            QuantityField::Part => q.part = value,
            QuantityField::Fabric => {
                q.fabric = value;
                q.blackout = value;
                q.sheer = value;
            }
            QuantityField::Blackout => q.blackout = value,
            QuantityField::Sheer => q.sheer = value,
            QuantityField::Channel => q.channel = value,
            QuantityField::Labour => q.labour = value,
            QuantityField::Fitting => q.fitting = value,
            QuantityField::WeightChain => q.weight_chain = value,
            QuantityField::Sqft | QuantityField::Rft => return false,
        }
        mask(q, &self.toggles);
        true
    }
}

#[cfg(feature = "wasm")]
use wasm_bindgen::prelude::*;

#[cfg(feature = "wasm")]
#[wasm_bindgen(js_name = "computeLocal")]
pub fn compute_local_wasm(
    width: f64,
    height: f64,
    unit: &str,
    panna: Option<f64>,
    has_blackout: bool,
    has_sheer: bool,
) -> String {
    let dims = Dimensions::new(width, height, crate::units::Unit::from_label(unit));
    let result = local(
        &dims,
        &LocalOptions {
            panna,
            has_blackout,
            has_sheer,
        },
    );
    serde_json::to_string(&result).unwrap_or_default()
}

#[cfg(feature = "wasm")]
#[wasm_bindgen(js_name = "computeRoman")]
pub fn compute_roman_wasm(width: f64, height: f64, unit: &str) -> String {
    let dims = Dimensions::new(width, height, crate::units::Unit::from_label(unit));
    serde_json::to_string(&roman(&dims)).unwrap_or_default()
}

#[cfg(feature = "wasm")]
#[wasm_bindgen(js_name = "computeBlinds")]
pub fn compute_blinds_wasm(width: f64, height: f64, unit: &str) -> String {
    let dims = Dimensions::new(width, height, crate::units::Unit::from_label(unit));
    serde_json::json!({ "sqft": blinds(&dims) }).to_string()
}
