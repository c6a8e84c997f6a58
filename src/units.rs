//! Length units and inch normalisation
//!
//! Every calculator works in inches. Measurements arrive in whatever unit
//! the site visit recorded, so this is the leaf every other module sits on.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Millimeters per inch.
pub const MM_PER_INCH: f64 = 25.4;

/// Centimeters per inch.
pub const CM_PER_INCH: f64 = 2.54;

/// Inches per foot.
pub const INCHES_PER_FOOT: f64 = 12.0;

/// Inches per meter. One constant for every calculator.
pub const INCHES_PER_METER: f64 = 39.3701;

/// Measurement unit of a line item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Unit {
    #[default]
    Millimeter,
    Centimeter,
    Meter,
    Foot,
    Inch,
}

impl Unit {
    pub const ALL: [Unit; 5] = [
        Unit::Millimeter,
        Unit::Centimeter,
        Unit::Meter,
        Unit::Foot,
        Unit::Inch,
    ];

    /// Recognise a unit label (trimmed, case-insensitive).
    pub fn recognize(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "mm" => Some(Unit::Millimeter),
            "cm" => Some(Unit::Centimeter),
            "m" | "meter" => Some(Unit::Meter),
            "ft" | "feet" => Some(Unit::Foot),
            "inch" | "inches" | "\"" => Some(Unit::Inch),
            _ => None,
        }
    }

    /// Resolve a unit label, falling back to millimeters.
    pub fn from_label(label: &str) -> Self {
        Self::recognize(label).unwrap_or_else(|| {
            if !label.trim().is_empty() {
                tracing::debug!(unit = label, "unrecognized unit, treating as mm");
            }
            Unit::Millimeter
        })
    }

    /// Canonical label used when a row is persisted.
    pub fn label(&self) -> &'static str {
        match self {
            Unit::Millimeter => "mm",
            Unit::Centimeter => "cm",
            Unit::Meter => "m",
            Unit::Foot => "ft",
            Unit::Inch => "inch",
        }
    }

    /// How many inches one of this unit is.
    pub fn inches_per_unit(&self) -> f64 {
        match self {
            Unit::Millimeter => 1.0 / MM_PER_INCH,
            Unit::Centimeter => 1.0 / CM_PER_INCH,
            Unit::Meter => INCHES_PER_METER,
            Unit::Foot => INCHES_PER_FOOT,
            Unit::Inch => 1.0,
        }
    }
}

impl std::fmt::Display for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for Unit {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for Unit {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().map(Unit::from_label).unwrap_or_default())
    }
}

/// Convert a measurement to inches.
///
/// Zero, NaN and infinite values yield 0; nothing here can fail.
pub fn to_inches(value: f64, unit: Unit) -> f64 {
    if value == 0.0 || !value.is_finite() {
        return 0.0;
    }
    match unit {
        Unit::Inch => value,
        Unit::Millimeter => value / MM_PER_INCH,
        Unit::Centimeter => value / CM_PER_INCH,
        Unit::Foot => value * INCHES_PER_FOOT,
        Unit::Meter => value * INCHES_PER_METER,
    }
}

/// [`to_inches`] with a raw unit label.
pub fn label_to_inches(value: f64, unit: &str) -> f64 {
    to_inches(value, Unit::from_label(unit))
}

/// Inverse of [`to_inches`].
pub fn from_inches(inches: f64, unit: Unit) -> f64 {
    if inches == 0.0 || !inches.is_finite() {
        return 0.0;
    }
    match unit {
        Unit::Inch => inches,
        Unit::Millimeter => inches * MM_PER_INCH,
        Unit::Centimeter => inches * CM_PER_INCH,
        Unit::Foot => inches / INCHES_PER_FOOT,
        Unit::Meter => inches / INCHES_PER_METER,
    }
}

/// Convert a measurement to meters (Somfy track brackets are metric).
pub fn to_meters(value: f64, unit: Unit) -> f64 {
    match unit {
        Unit::Meter if value.is_finite() => value,
        _ => to_inches(value, unit) / INCHES_PER_METER,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_recognize_labels() {
        assert_eq!(Unit::recognize(" MM "), Some(Unit::Millimeter));
        assert_eq!(Unit::recognize("Inches"), Some(Unit::Inch));
        assert_eq!(Unit::recognize("\""), Some(Unit::Inch));
        assert_eq!(Unit::recognize("feet"), Some(Unit::Foot));
        assert_eq!(Unit::recognize("Meter"), Some(Unit::Meter));
        assert_eq!(Unit::recognize("yards"), None);
    }

    #[test]
    fn test_unknown_or_empty_unit_is_mm() {
        assert_eq!(Unit::from_label(""), Unit::Millimeter);
        assert_eq!(Unit::from_label("furlong"), Unit::Millimeter);
        assert!((label_to_inches(254.0, "furlong") - 10.0).abs() < EPS);
    }

    #[test]
    fn test_to_inches_each_unit() {
        assert!((to_inches(25.4, Unit::Millimeter) - 1.0).abs() < EPS);
        assert!((to_inches(2.54, Unit::Centimeter) - 1.0).abs() < EPS);
        assert!((to_inches(2.0, Unit::Foot) - 24.0).abs() < EPS);
        assert!((to_inches(1.0, Unit::Meter) - 39.3701).abs() < EPS);
        assert!((to_inches(7.5, Unit::Inch) - 7.5).abs() < EPS);
    }

    #[test]
    fn test_invalid_values_give_zero() {
        assert_eq!(to_inches(0.0, Unit::Meter), 0.0);
        assert_eq!(to_inches(f64::NAN, Unit::Millimeter), 0.0);
        assert_eq!(to_inches(f64::INFINITY, Unit::Foot), 0.0);
    }

    #[test]
    fn test_round_trip_every_unit() {
        for unit in Unit::ALL {
            for x in [0.5, 12.0, 1234.567] {
                let back = to_inches(from_inches(x, unit), unit);
                assert!((back - x).abs() < 1e-9 * x.max(1.0), "{unit}: {x} -> {back}");
            }
        }
    }

    #[test]
    fn test_to_meters() {
        assert!((to_meters(2500.0, Unit::Millimeter) - 2.5).abs() < 1e-4);
        assert!((to_meters(3.2, Unit::Meter) - 3.2).abs() < EPS);
        assert!((to_meters(39.3701, Unit::Inch) - 1.0).abs() < EPS);
    }

    #[test]
    fn test_serde_label() {
        let json = serde_json::to_string(&Unit::Foot).unwrap();
        assert_eq!(json, "\"ft\"");
        let unit: Unit = serde_json::from_str("\"CM\"").unwrap();
        assert_eq!(unit, Unit::Centimeter);
        let unit: Unit = serde_json::from_str("null").unwrap();
        assert_eq!(unit, Unit::Millimeter);
    }
}
