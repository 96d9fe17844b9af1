use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;
use tracing::debug;

use super::numeric::{clean_numeric_str, clean_numeric_value};
use crate::models::WeightVolume;

static QUANTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([\d.,]+)\s*([a-záéíóúñ]+)\.?$").expect("valid quantity regex")
});

const REJECTED_PHRASES: [&str; 2] = ["rango de peso", "weight range"];

/// Canonical unit and multiplication factor for a unit spelling.
pub fn canonical_unit(unit: &str) -> Option<(&'static str, f64)> {
    let canonical = match unit.trim().to_lowercase().as_str() {
        "g" | "gr" | "grs" | "gramo" | "gramos" => ("g", 1.0),
        "kg" | "kgs" | "kilo" | "kilos" | "kilogramo" | "kilogramos" => ("g", 1000.0),
        "mg" | "miligramo" | "miligramos" => ("g", 0.001),
        "ml" | "mililitro" | "mililitros" => ("ml", 1.0),
        "cl" | "centilitro" | "centilitros" => ("ml", 10.0),
        "dl" | "decilitro" | "decilitros" => ("ml", 100.0),
        "l" | "lt" | "litro" | "litros" => ("ml", 1000.0),
        _ => return None,
    };
    Some(canonical)
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Parses `[value, unit]` pairs or free text such as "1 kg" into grams or millilitres.
pub fn parse_weight_volume(value: &Value) -> Option<WeightVolume> {
    match value {
        Value::Array(items) if items.len() == 2 => parse_pair(&items[0], &items[1]),
        Value::String(text) => parse_quantity_text(text),
        _ => None,
    }
}

fn parse_pair(magnitude: &Value, unit: &Value) -> Option<WeightVolume> {
    let magnitude = clean_numeric_value(magnitude)?;
    let unit = unit.as_str()?.trim();
    if unit.is_empty() {
        return None;
    }

    match canonical_unit(unit) {
        Some((canonical, factor)) => Some(WeightVolume(
            round_to(magnitude * factor, 6),
            canonical.to_string(),
        )),
        None => {
            debug!("Keeping unrecognized unit {:?} verbatim", unit);
            Some(WeightVolume(magnitude, unit.to_string()))
        }
    }
}

pub fn parse_quantity_text(text: &str) -> Option<WeightVolume> {
    let text = text.trim().to_lowercase();
    if text.is_empty() || REJECTED_PHRASES.iter().any(|p| text.contains(p)) {
        return None;
    }

    let captures = QUANTITY_RE.captures(&text)?;
    let magnitude = clean_numeric_str(&captures[1])?;
    let (canonical, factor) = canonical_unit(&captures[2])?;

    Some(WeightVolume(
        round_to(magnitude * factor, 6),
        canonical.to_string(),
    ))
}
