use serde::{Deserialize, Serialize};
use std::fmt;

/// Data source a record was extracted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Alcampo,
    #[serde(rename = "openfoodfacts")]
    OpenFoodFacts,
    #[default]
    Unknown,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Alcampo => "alcampo",
            Source::OpenFoodFacts => "openfoodfacts",
            Source::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The nine canonical per-100g nutrient keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Nutrient {
    EnergyKj,
    EnergyKcal,
    Fat,
    SaturatedFat,
    Carbohydrates,
    Sugars,
    Fibre,
    Proteins,
    Salt,
}

impl Nutrient {
    pub const ALL: [Nutrient; 9] = [
        Nutrient::EnergyKj,
        Nutrient::EnergyKcal,
        Nutrient::Fat,
        Nutrient::SaturatedFat,
        Nutrient::Carbohydrates,
        Nutrient::Sugars,
        Nutrient::Fibre,
        Nutrient::Proteins,
        Nutrient::Salt,
    ];

    /// Key used inside `valores_nutricionales_100_g` of a unified product.
    pub fn unified_key(&self) -> &'static str {
        match self {
            Nutrient::EnergyKj => "energia_kj",
            Nutrient::EnergyKcal => "energia_kcal",
            Nutrient::Fat => "grasas_g",
            Nutrient::SaturatedFat => "grasas_saturadas_g",
            Nutrient::Carbohydrates => "hidratos_g",
            Nutrient::Sugars => "azucares_g",
            Nutrient::Fibre => "fibra_g",
            Nutrient::Proteins => "proteinas_g",
            Nutrient::Salt => "sal_g",
        }
    }

    /// Column name in the flattened product table.
    pub fn column(&self) -> &'static str {
        match self {
            Nutrient::EnergyKj => "energia_kj",
            Nutrient::EnergyKcal => "energia_kcal",
            Nutrient::Fat => "grasas_totales",
            Nutrient::SaturatedFat => "grasas_saturadas",
            Nutrient::Carbohydrates => "carbohidratos",
            Nutrient::Sugars => "azucares",
            Nutrient::Fibre => "fibra",
            Nutrient::Proteins => "proteinas",
            Nutrient::Salt => "sal",
        }
    }
}

/// Nutrition per 100 g/ml. Always serializes all nine keys, `null` when absent.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NutritionFacts {
    #[serde(rename = "energia_kj", default)]
    pub energy_kj: Option<f64>,
    #[serde(rename = "energia_kcal", default)]
    pub energy_kcal: Option<f64>,
    #[serde(rename = "grasas_g", default)]
    pub fat_g: Option<f64>,
    #[serde(rename = "grasas_saturadas_g", default)]
    pub saturated_fat_g: Option<f64>,
    #[serde(rename = "hidratos_g", default)]
    pub carbohydrates_g: Option<f64>,
    #[serde(rename = "azucares_g", default)]
    pub sugars_g: Option<f64>,
    #[serde(rename = "fibra_g", default)]
    pub fibre_g: Option<f64>,
    #[serde(rename = "proteinas_g", default)]
    pub proteins_g: Option<f64>,
    #[serde(rename = "sal_g", default)]
    pub salt_g: Option<f64>,
}

impl NutritionFacts {
    pub fn get(&self, nutrient: Nutrient) -> Option<f64> {
        match nutrient {
            Nutrient::EnergyKj => self.energy_kj,
            Nutrient::EnergyKcal => self.energy_kcal,
            Nutrient::Fat => self.fat_g,
            Nutrient::SaturatedFat => self.saturated_fat_g,
            Nutrient::Carbohydrates => self.carbohydrates_g,
            Nutrient::Sugars => self.sugars_g,
            Nutrient::Fibre => self.fibre_g,
            Nutrient::Proteins => self.proteins_g,
            Nutrient::Salt => self.salt_g,
        }
    }

    pub fn set(&mut self, nutrient: Nutrient, value: Option<f64>) {
        let slot = match nutrient {
            Nutrient::EnergyKj => &mut self.energy_kj,
            Nutrient::EnergyKcal => &mut self.energy_kcal,
            Nutrient::Fat => &mut self.fat_g,
            Nutrient::SaturatedFat => &mut self.saturated_fat_g,
            Nutrient::Carbohydrates => &mut self.carbohydrates_g,
            Nutrient::Sugars => &mut self.sugars_g,
            Nutrient::Fibre => &mut self.fibre_g,
            Nutrient::Proteins => &mut self.proteins_g,
            Nutrient::Salt => &mut self.salt_g,
        };
        *slot = value;
    }

    pub fn iter(&self) -> impl Iterator<Item = (Nutrient, Option<f64>)> + '_ {
        Nutrient::ALL.iter().map(move |n| (*n, self.get(*n)))
    }

    pub fn populated_count(&self) -> usize {
        self.iter().filter(|(_, v)| v.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.populated_count() == 0
    }
}

/// Canonical `[magnitude, unit]` pair; serializes as a two-element array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightVolume(pub f64, pub String);

impl WeightVolume {
    pub fn magnitude(&self) -> f64 {
        self.0
    }

    pub fn unit(&self) -> &str {
        &self.1
    }
}

/// A product mapped onto the unified schema.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UnifiedProduct {
    #[serde(default)]
    pub source: Source,
    pub url: Option<String>,
    #[serde(rename = "titulo")]
    pub title: Option<String>,
    #[serde(rename = "valores_nutricionales_100_g")]
    pub nutrition_per_100: Option<NutritionFacts>,
    #[serde(rename = "descripcion", default)]
    pub description: Option<String>,
    #[serde(rename = "categorias", default)]
    pub categories: Option<Vec<String>>,
    #[serde(rename = "precio_total", default)]
    pub total_price: Option<f64>,
    #[serde(rename = "precio_por_cantidad", default)]
    pub price_per_quantity: Option<f64>,
    #[serde(rename = "peso_volumen", default)]
    pub weight_volume: Option<WeightVolume>,
    #[serde(rename = "alergenos", default)]
    pub allergens: Option<Vec<String>>,
    #[serde(rename = "origen", default)]
    pub origin: Option<String>,
    #[serde(rename = "direccion_manufactura", default)]
    pub manufacturing_address: Option<String>,
    #[serde(rename = "marcas", default)]
    pub brands: Option<String>,
    #[serde(rename = "tiendas", default)]
    pub stores: Option<Vec<String>>,
    #[serde(rename = "certificaciones", default)]
    pub certifications: Option<Vec<String>>,
    #[serde(rename = "numero_raciones", default)]
    pub serving_count: Option<i64>,
    #[serde(rename = "nombre_operador", default)]
    pub operator_name: Option<String>,
}

impl UnifiedProduct {
    pub fn new(source: Source) -> Self {
        Self {
            source,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nutrition_facts_serializes_nine_keys() {
        let facts = NutritionFacts {
            energy_kcal: Some(65.0),
            ..Default::default()
        };

        let value = serde_json::to_value(facts).unwrap();
        let obj = value.as_object().unwrap();

        assert_eq!(obj.len(), 9);
        for nutrient in Nutrient::ALL {
            assert!(obj.contains_key(nutrient.unified_key()));
        }
        assert_eq!(obj["energia_kcal"], json!(65.0));
        assert!(obj["sal_g"].is_null());
    }

    #[test]
    fn test_weight_volume_is_a_pair() {
        let wv = WeightVolume(500.0, "g".to_string());
        assert_eq!(serde_json::to_value(&wv).unwrap(), json!([500.0, "g"]));
    }

    #[test]
    fn test_unified_product_uses_unified_keys() {
        let mut product = UnifiedProduct::new(Source::Alcampo);
        product.url = Some("https://www.alcampo.es/leche".to_string());
        product.title = Some("Leche".to_string());
        product.nutrition_per_100 = Some(NutritionFacts::default());

        let value = serde_json::to_value(&product).unwrap();
        assert_eq!(value["source"], "alcampo");
        assert_eq!(value["titulo"], "Leche");
        assert!(value["valores_nutricionales_100_g"].is_object());

        let back: UnifiedProduct = serde_json::from_value(value).unwrap();
        assert_eq!(back, product);
    }

    #[test]
    fn test_source_tags() {
        assert_eq!(Source::OpenFoodFacts.to_string(), "openfoodfacts");
        assert_eq!(serde_json::to_value(Source::Alcampo).unwrap(), json!("alcampo"));
        let parsed: Source = serde_json::from_value(json!("openfoodfacts")).unwrap();
        assert_eq!(parsed, Source::OpenFoodFacts);
    }
}
