use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::{Nutrient, Source};

/// Source field name → canonical nutrient, one table per source.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NutritionConfig {
    pub alcampo_map: BTreeMap<String, Nutrient>,
    pub openfood_map: BTreeMap<String, Nutrient>,
    /// Free-text field holding both kJ and kcal, e.g. "1580 kJ (375 kcal)".
    pub combined_energy_field: String,
    /// Keys whose presence identifies an Alcampo nutrition block when the source is unknown.
    pub alcampo_marker_keys: Vec<String>,
}

impl NutritionConfig {
    pub fn mapping_for(&self, source: Source) -> &BTreeMap<String, Nutrient> {
        match source {
            Source::OpenFoodFacts => &self.openfood_map,
            _ => &self.alcampo_map,
        }
    }
}

impl Default for NutritionConfig {
    fn default() -> Self {
        let alcampo_map = [
            ("valor_energetico_kj", Nutrient::EnergyKj),
            ("valor_energetico_kcal", Nutrient::EnergyKcal),
            ("grasas_g", Nutrient::Fat),
            ("grasas_saturadas_g", Nutrient::SaturatedFat),
            ("hidratos_g", Nutrient::Carbohydrates),
            ("azucares_g", Nutrient::Sugars),
            ("proteinas_g", Nutrient::Proteins),
            ("sal_g", Nutrient::Salt),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        let openfood_map = [
            ("grasas", Nutrient::Fat),
            ("grasas_saturadas", Nutrient::SaturatedFat),
            ("hidratos", Nutrient::Carbohydrates),
            ("azucares", Nutrient::Sugars),
            ("fibra", Nutrient::Fibre),
            ("proteinas", Nutrient::Proteins),
            ("sal", Nutrient::Salt),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        Self {
            alcampo_map,
            openfood_map,
            combined_energy_field: "energia".to_string(),
            alcampo_marker_keys: vec![
                "valor_energetico_kj".to_string(),
                "valor_energetico_kcal".to_string(),
            ],
        }
    }
}

/// Candidate columns per consolidated concept, in priority order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsolidationConfig {
    pub nutrient_candidates: BTreeMap<String, Vec<String>>,
    pub feature_candidates: BTreeMap<String, Vec<String>>,
}

impl Default for ConsolidationConfig {
    fn default() -> Self {
        let nutrient_candidates = Nutrient::ALL
            .iter()
            .map(|n| (n.column().to_string(), vec![n.column().to_string()]))
            .collect();

        let mut feature_candidates = BTreeMap::new();
        feature_candidates.insert(
            "country".to_string(),
            vec![
                "desc_países de venta".to_string(),
                "desc_country".to_string(),
                "char_país".to_string(),
                "country".to_string(),
            ],
        );
        feature_candidates.insert(
            "ingredients".to_string(),
            vec![
                "char_ingredientes".to_string(),
                "desc_ingredientes".to_string(),
                "nutr_ingredientes".to_string(),
            ],
        );
        feature_candidates.insert(
            "serving_size".to_string(),
            vec![
                "char_porción".to_string(),
                "char_serving_size".to_string(),
                "char_tamaño porción".to_string(),
            ],
        );

        Self {
            nutrient_candidates,
            feature_candidates,
        }
    }
}
