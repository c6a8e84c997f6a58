//! Row totals, GST splits and grand totals

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::{BlindsCosting, CalculationRow, Category, Costing, FabricCosting};
use crate::parse::lenient_f64;

/// A basic amount with GST added and rounded to the rupee.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GstSplit {
    #[serde(deserialize_with = "lenient_f64")]
    pub basic: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub gst: f64,
    #[serde(rename = "final", deserialize_with = "lenient_f64")]
    pub total: f64,
}

impl GstSplit {
    pub fn of(basic: f64, gst_rate: f64) -> Self {
        let basic = if basic.is_finite() { basic } else { 0.0 };
        let gst = basic * gst_rate;
        Self {
            basic,
            gst,
            total: (basic + gst).round(),
        }
    }
}

impl FabricCosting {
    /// Sum of quantity × rate over components that are switched on.
    pub fn total(&self) -> f64 {
        let q = &self.quantities;
        let r = &self.rates;
        let t = &self.toggles;
        [
            (t.fabric, q.fabric, r.fabric),
            (t.blackout, q.blackout, r.blackout),
            (t.sheer, q.sheer, r.sheer),
            (t.channel, q.channel, r.channel),
            (t.labour, q.labour, r.labour),
            (t.fitting, q.fitting, r.fitting),
        ]
        .iter()
        .filter(|(on, _, _)| *on)
        .map(|(_, qty, rate)| qty * rate)
        .sum()
    }
}

impl BlindsCosting {
    /// Material and labour by area, plus one fitting.
    pub fn total(&self) -> f64 {
        if self.sqft <= 0.0 {
            return 0.0;
        }
        self.sqft * self.rates.sqft + self.sqft * self.rates.labour + self.rates.fitting
    }
}

/// Total of one row.
pub fn row_total(row: &CalculationRow) -> f64 {
    match &row.costing {
        Costing::Fabric(c) => c.total(),
        Costing::Blinds(c) => c.total(),
        Costing::Forest(c) => c.total(),
        Costing::Somfy(c) => c.total(),
        Costing::Gpw(c) => c.total(),
    }
}

pub fn grand_total(rows: &[CalculationRow]) -> f64 {
    rows.iter().map(row_total).sum()
}

pub fn category_total(rows: &[CalculationRow], category: Category) -> f64 {
    rows.iter()
        .filter(|r| r.category == category)
        .map(row_total)
        .sum()
}

/// Totals of every category that has rows.
pub fn totals_by_category(rows: &[CalculationRow]) -> BTreeMap<Category, f64> {
    let mut totals = BTreeMap::new();
    for row in rows {
        *totals.entry(row.category).or_insert(0.0) += row_total(row);
    }
    totals
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BlindsRates, FabricFamily, FabricQuantities, FabricRates, FabricToggles, Variant};
    use crate::units::Unit;

    fn fabric_row(category: Category, fabric_qty: f64, fabric_rate: f64) -> CalculationRow {
        CalculationRow {
            selection_item_id: "x".into(),
            category,
            variant: Variant::Normal,
            area_name: String::new(),
            product_name: String::new(),
            width: 0.0,
            height: 0.0,
            unit: Unit::Inch,
            costing: Costing::Fabric(FabricCosting {
                family: FabricFamily::Local,
                quantities: FabricQuantities {
                    fabric: fabric_qty,
                    ..FabricQuantities::default()
                },
                rates: FabricRates {
                    fabric: fabric_rate,
                    ..FabricRates::default()
                },
                toggles: FabricToggles::default(),
            }),
        }
    }

    #[test]
    fn test_gst_split_rounds_final() {
        let s = GstSplit::of(1000.0, 0.18);
        assert!((s.gst - 180.0).abs() < 1e-9);
        assert!((s.total - 1180.0).abs() < f64::EPSILON);
        // 333 * 1.18 = 392.94
        assert!((GstSplit::of(333.0, 0.18).total - 393.0).abs() < f64::EPSILON);
        assert!(GstSplit::of(0.0, 0.18).total.abs() < f64::EPSILON);
    }

    #[test]
    fn test_fabric_total_respects_toggles() {
        let mut c = FabricCosting {
            family: FabricFamily::Local,
            quantities: FabricQuantities {
                fabric: 12.0,
                channel: 7.0,
                labour: 4.0,
                fitting: 1.0,
                ..FabricQuantities::default()
            },
            rates: FabricRates {
                fabric: 500.0,
                blackout: 0.0,
                sheer: 0.0,
                channel: 285.0,
                labour: 450.0,
                fitting: 355.0,
            },
            toggles: FabricToggles::default(),
        };
        // 6000 + 1995 + 1800 + 355
        assert!((c.total() - 10150.0).abs() < 1e-9);
        c.toggles.channel = false;
        assert!((c.total() - 8155.0).abs() < 1e-9);
    }

    #[test]
    fn test_blinds_total() {
        let c = BlindsCosting {
            sqft: 20.0,
            rates: BlindsRates {
                sqft: 120.0,
                labour: 200.0,
                fitting: 355.0,
            },
        };
        assert!((c.total() - 6755.0).abs() < 1e-9);
        assert!(BlindsCosting::default().total().abs() < f64::EPSILON);
    }

    #[test]
    fn test_blinds_unmeasured_has_no_fitting_charge() {
        let c = BlindsCosting {
            sqft: 0.0,
            rates: BlindsRates {
                sqft: 120.0,
                labour: 200.0,
                fitting: 355.0,
            },
        };
        assert_eq!(c.total(), 0.0);
        let measured = BlindsCosting { sqft: 14.0, ..c };
        // 14 * 120 + 14 * 200 + 355
        assert!((measured.total() - 4835.0).abs() < 1e-9);
    }

    #[test]
    fn test_grand_and_category_totals() {
        let rows = vec![
            fabric_row(Category::Local, 10.0, 100.0),
            fabric_row(Category::Roman, 2.0, 50.0),
            fabric_row(Category::Local, 1.0, 5.0),
        ];
        assert!((grand_total(&rows) - 1105.0).abs() < 1e-9);
        assert!((category_total(&rows, Category::Local) - 1005.0).abs() < 1e-9);
        assert!(category_total(&rows, Category::Blinds).abs() < f64::EPSILON);
        let by_cat = totals_by_category(&rows);
        assert_eq!(by_cat.len(), 2);
        assert!((by_cat[&Category::Roman] - 100.0).abs() < 1e-9);
    }
}
