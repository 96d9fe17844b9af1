use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::Nutrient;

/// Row filtering applied before and after imputation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CleaningConfig {
    /// Observed nutrient values a row needs to survive cleaning.
    pub min_required_nutrients: usize,
    /// Non-null nutrient values a row needs to be considered ML-ready.
    pub min_nutrition_cols: usize,
    /// Columns whose whitespace gets collapsed during cleaning.
    pub text_fields: Vec<String>,
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self {
            min_required_nutrients: 2,
            min_nutrition_cols: 3,
            text_fields: [
                "product_name",
                "descripcion",
                "country",
                "marcas",
                "tiendas",
                "nombre_operador",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
}

impl ValueRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Thresholds for the advisory quality report.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Plausible per-100g range keyed by nutrient column.
    pub plausible_ranges: BTreeMap<String, ValueRange>,
    pub outlier_z_threshold: f64,
    pub kcal_to_kj_factor: f64,
    pub energy_tolerance: f64,
    pub macro_sum_limit: f64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        let plausible_ranges = Nutrient::ALL
            .iter()
            .map(|n| {
                let range = match n {
                    Nutrient::EnergyKcal => ValueRange::new(0.0, 900.0),
                    Nutrient::EnergyKj => ValueRange::new(0.0, 3800.0),
                    Nutrient::Salt => ValueRange::new(0.0, 50.0),
                    _ => ValueRange::new(0.0, 100.0),
                };
                (n.column().to_string(), range)
            })
            .collect();

        Self {
            plausible_ranges,
            outlier_z_threshold: 3.0,
            kcal_to_kj_factor: 4.184,
            energy_tolerance: 0.10,
            macro_sum_limit: 100.0,
        }
    }
}

/// One penalty or bonus term: `(value - threshold) * weight / divisor` when value > threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreRule {
    pub nutrient: Nutrient,
    pub threshold: f64,
    pub weight: f64,
    #[serde(default = "default_divisor")]
    pub divisor: f64,
}

fn default_divisor() -> f64 {
    1.0
}

impl ScoreRule {
    pub fn new(nutrient: Nutrient, threshold: f64, weight: f64, divisor: f64) -> Self {
        Self {
            nutrient,
            threshold,
            weight,
            divisor,
        }
    }

    pub fn term(&self, value: f64) -> f64 {
        if value > self.threshold {
            (value - self.threshold) * self.weight / self.divisor
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub base_score: f64,
    pub min_score: f64,
    pub max_score: f64,
    pub penalties: Vec<ScoreRule>,
    pub bonuses: Vec<ScoreRule>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            base_score: 100.0,
            min_score: 0.0,
            max_score: 100.0,
            penalties: vec![
                ScoreRule::new(Nutrient::EnergyKcal, 400.0, 1.0, 10.0),
                ScoreRule::new(Nutrient::Fat, 20.0, 2.0, 1.0),
                ScoreRule::new(Nutrient::SaturatedFat, 5.0, 3.0, 1.0),
                ScoreRule::new(Nutrient::Sugars, 15.0, 2.0, 1.0),
                ScoreRule::new(Nutrient::Salt, 1.5, 10.0, 1.0),
            ],
            bonuses: vec![
                ScoreRule::new(Nutrient::Fibre, 6.0, 2.0, 1.0),
                ScoreRule::new(Nutrient::Proteins, 10.0, 1.5, 1.0),
            ],
        }
    }
}

/// Half-open `[min, max)` calorie bin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalorieBin {
    pub label: String,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    pub high_salt: f64,
    pub high_sugar: f64,
    pub high_fat: f64,
    pub high_saturated_fat: f64,
    pub calorie_bins: Vec<CalorieBin>,
    pub calorie_fallback_label: String,
    pub unknown_label: String,
    pub kcal_per_g_fat: f64,
    pub kcal_per_g_carbohydrates: f64,
    pub kcal_per_g_proteins: f64,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        let bin = |label: &str, min: f64, max: f64| CalorieBin {
            label: label.to_string(),
            min,
            max,
        };

        Self {
            high_salt: 1.5,
            high_sugar: 15.0,
            high_fat: 17.5,
            high_saturated_fat: 5.0,
            calorie_bins: vec![
                bin("low", 0.0, 100.0),
                bin("medium", 100.0, 300.0),
                bin("high", 300.0, 500.0),
            ],
            calorie_fallback_label: "very_high".to_string(),
            unknown_label: "unknown".to_string(),
            kcal_per_g_fat: 9.0,
            kcal_per_g_carbohydrates: 4.0,
            kcal_per_g_proteins: 4.0,
        }
    }
}

/// NLP text normalization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TextConfig {
    pub fields: Vec<String>,
    /// Comma-separated list columns; items are cleaned one by one.
    pub categorical_fields: Vec<String>,
    pub tokenize: bool,
    /// Spanish Snowball stemming of tokens.
    pub stemming: bool,
    pub min_token_length: usize,
    pub max_token_length: usize,
    pub domain_stopwords: Vec<String>,
}

impl Default for TextConfig {
    fn default() -> Self {
        let to_strings = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();

        Self {
            fields: to_strings(&[
                "product_name",
                "descripcion",
                "categorias",
                "marcas",
                "tiendas",
                "alergenos",
                "certificaciones",
                "nombre_operador",
                "country",
            ]),
            categorical_fields: to_strings(&["categorias", "alergenos", "certificaciones"]),
            tokenize: false,
            stemming: true,
            min_token_length: 2,
            max_token_length: 50,
            domain_stopwords: to_strings(&[
                "producto", "productos", "pack", "unidad", "unidades", "lata", "bote",
                "envase", "paquete", "caja", "bolsa", "uds", "ud", "alcampo", "auchan",
                "gramos", "litros", "mililitros", "kilogramos",
            ]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_rule_terms() {
        let energy = ScoreRule::new(Nutrient::EnergyKcal, 400.0, 1.0, 10.0);
        assert_eq!(energy.term(500.0), 10.0);
        assert_eq!(energy.term(400.0), 0.0);
        assert_eq!(energy.term(10.0), 0.0);
    }

    #[test]
    fn test_default_ranges() {
        let config = ValidationConfig::default();
        assert_eq!(config.plausible_ranges.len(), 9);
        assert_eq!(config.plausible_ranges["energia_kcal"], ValueRange::new(0.0, 900.0));
        assert_eq!(config.plausible_ranges["sal"], ValueRange::new(0.0, 50.0));
        assert!(config.plausible_ranges["grasas_totales"].contains(100.0));
        assert!(!config.plausible_ranges["grasas_totales"].contains(-0.1));
    }

    #[test]
    fn test_calorie_bins_are_ordered() {
        let config = FeatureConfig::default();
        let bins = &config.calorie_bins;
        assert_eq!(bins.len(), 3);
        assert!(bins.windows(2).all(|w| w[0].max == w[1].min));
    }
}
