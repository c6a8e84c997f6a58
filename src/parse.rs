//! Lenient parsing of selection data
//!
//! Items and saved rows come from a form-driven front end, so numbers may
//! arrive as strings ("499 GSM"), booleans as "true"/1, and catalog ids in
//! whatever case was typed. Nothing here fails: unusable input becomes 0,
//! false or `None`.

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use crate::model::CalculationRow;
use crate::tariff::CatalogKey;

/// Parse the leading number of a string, ignoring any trailing text.
///
/// `"499 GSM"` gives 499, `" 12.5mm"` gives 12.5, and anything without a
/// leading number gives 0.
pub fn parse_number(text: &str) -> f64 {
    let s = text.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end += 1;
    }
    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;
    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        if digits > 0 {
            end = frac_end;
        }
    }
    if digits == 0 {
        return 0.0;
    }
    // Exponent only counts when digits follow it
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+') | Some(b'-')) {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    s[..end]
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Number from any JSON value.
pub fn number_from_value(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()).unwrap_or(0.0),
        Value::String(s) => parse_number(s),
        Value::Bool(b) => f64::from(u8::from(*b)),
        _ => 0.0,
    }
}

/// Clamp a user-entered amount: non-finite and negative values become 0.
pub fn non_negative(value: f64) -> f64 {
    if value.is_finite() {
        value.max(0.0)
    } else {
        0.0
    }
}

/// Truthiness of a JSON value. The strings "false" and "0" are false.
pub fn bool_from_value(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0 && !v.is_nan()),
        Value::String(s) => {
            let s = s.trim();
            !(s.is_empty() || s == "0" || s.eq_ignore_ascii_case("false"))
        }
        Value::Array(_) | Value::Object(_) => true,
        Value::Null => false,
    }
}

// ─── serde helpers ───────────────────────────────────────────────────

/// `deserialize_with` for numbers that may arrive as strings or null.
pub fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Ok(number_from_value(&Value::deserialize(deserializer)?))
}

/// `deserialize_with` for flags that may arrive as strings or numbers.
pub fn lenient_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(bool_from_value(&Value::deserialize(deserializer)?))
}

/// `deserialize_with` for optional catalog selections.
///
/// Unknown ids become `None` so a discontinued option prices at zero
/// instead of rejecting the whole row.
pub fn lenient_key<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: CatalogKey,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match &value {
        Value::String(s) if !s.trim().is_empty() => {
            let key = T::from_id(s);
            if key.is_none() {
                tracing::debug!(id = %s, "unknown catalog id, priced at zero");
            }
            key
        }
        _ => None,
    })
}

// ─── Product attributes ──────────────────────────────────────────────

const GSM_KEYS: [&str; 4] = ["Weight/Mt", "Weight/mt", "GSM", "gsm"];

/// Fabric weight (g/m²) from product attributes.
///
/// Well-known keys are tried first, then any key mentioning weight or GSM.
pub fn gsm_from_attributes(attributes: &Map<String, Value>) -> f64 {
    let known = GSM_KEYS.iter().find_map(|k| attributes.get(*k));
    let value = known.or_else(|| {
        attributes.iter().find_map(|(k, v)| {
            let k = k.to_lowercase();
            (k.contains("weight") || k.contains("gsm")).then_some(v)
        })
    });
    value.map(number_from_value).unwrap_or(0.0)
}

// ─── Saved rows ──────────────────────────────────────────────────────

/// Parse previously saved rows.
///
/// Accepts a bare array or an object with an `items` array. A row that
/// does not deserialize is skipped with a warning; only a document that is
/// not JSON at all is an error.
pub fn parse_saved_rows(json: &str) -> Result<Vec<CalculationRow>, serde_json::Error> {
    if json.trim().is_empty() {
        return Ok(Vec::new());
    }
    let doc: Value = serde_json::from_str(json)?;
    let entries = match doc {
        Value::Array(entries) => entries,
        Value::Object(mut obj) => match obj.remove("items") {
            Some(Value::Array(entries)) => entries,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };
    Ok(rows_from_values(entries))
}

pub(crate) fn rows_from_values(entries: Vec<Value>) -> Vec<CalculationRow> {
    entries
        .into_iter()
        .enumerate()
        .filter_map(|(index, entry)| match serde_json::from_value(entry) {
            Ok(row) => Some(row),
            Err(e) => {
                tracing::warn!(index, error = %e, "skipping unreadable saved row");
                None
            }
        })
        .collect()
}
