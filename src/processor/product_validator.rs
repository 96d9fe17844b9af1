use serde_json::Value;
use tracing::warn;

use crate::models::{NutritionFacts, UnifiedProduct};

/// Reason a unified product fails schema validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaViolation {
    NotAnObject,
    MissingUrl,
    MissingTitle,
    MissingNutrition,
}

impl SchemaViolation {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaViolation::NotAnObject => "record is not an object",
            SchemaViolation::MissingUrl => "missing url",
            SchemaViolation::MissingTitle => "missing titulo",
            SchemaViolation::MissingNutrition => "missing valores_nutricionales_100_g",
        }
    }
}

fn is_blank(value: Option<&str>) -> bool {
    value.map(|s| s.trim().is_empty()).unwrap_or(true)
}

pub struct ProductValidator;

impl ProductValidator {
    pub fn check(product: &UnifiedProduct) -> Result<(), SchemaViolation> {
        if is_blank(product.url.as_deref()) {
            return Err(SchemaViolation::MissingUrl);
        }
        if is_blank(product.title.as_deref()) {
            return Err(SchemaViolation::MissingTitle);
        }
        if product.nutrition_per_100.is_none() {
            return Err(SchemaViolation::MissingNutrition);
        }
        Ok(())
    }

    /// Nutrition must be present but may be entirely null.
    pub fn is_valid(product: &UnifiedProduct) -> bool {
        match Self::check(product) {
            Ok(()) => true,
            Err(violation) => {
                warn!(
                    "Rejecting {} product {:?}: {}",
                    product.source,
                    product.title.as_deref().or(product.url.as_deref()),
                    violation.as_str()
                );
                false
            }
        }
    }

    /// At least `min_values` nutrients present and non-zero.
    pub fn has_nutrition_completeness(facts: &NutritionFacts, min_values: usize) -> bool {
        facts
            .iter()
            .filter(|(_, value)| matches!(value, Some(v) if *v != 0.0))
            .count()
            >= min_values
    }

    /// Same checks for a product in its JSON form.
    pub fn is_valid_value(record: &Value) -> bool {
        let violation = match record.as_object() {
            None => Some(SchemaViolation::NotAnObject),
            Some(fields) => {
                if is_blank(fields.get("url").and_then(Value::as_str)) {
                    Some(SchemaViolation::MissingUrl)
                } else if is_blank(fields.get("titulo").and_then(Value::as_str)) {
                    Some(SchemaViolation::MissingTitle)
                } else if !fields
                    .get("valores_nutricionales_100_g")
                    .map(Value::is_object)
                    .unwrap_or(false)
                {
                    Some(SchemaViolation::MissingNutrition)
                } else {
                    None
                }
            }
        };

        match violation {
            None => true,
            Some(violation) => {
                warn!("Rejecting unified record: {}", violation.as_str());
                false
            }
        }
    }
}
