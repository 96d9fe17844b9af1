use anyhow::Result;
use polars::prelude::*;
use tracing::info;

use super::columns::{f64_values, has_column, set_bool, set_f64, set_str, str_values};
use super::units::round_to;
use crate::config::FeatureConfig;
use crate::models::Nutrient;

/// Nutrient columns of one table, read once.
struct NutrientColumns {
    height: usize,
    values: Vec<(Nutrient, Vec<Option<f64>>)>,
}

impl NutrientColumns {
    fn read(df: &DataFrame) -> Result<Self> {
        let height = df.height();
        let values = Nutrient::ALL
            .iter()
            .map(|n| {
                let column = if has_column(df, n.column()) {
                    f64_values(df, n.column())?
                } else {
                    vec![None; height]
                };
                Ok((*n, column))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { height, values })
    }

    fn get(&self, nutrient: Nutrient) -> &[Option<f64>] {
        self.values
            .iter()
            .find(|(n, _)| *n == nutrient)
            .map(|(_, v)| v.as_slice())
            .unwrap_or(&[])
    }

    fn at(&self, nutrient: Nutrient, row: usize) -> Option<f64> {
        self.get(nutrient).get(row).copied().flatten()
    }
}

fn ratio(numerator: Option<f64>, denominator: Option<f64>) -> Option<f64> {
    match (numerator, denominator) {
        (Some(n), Some(d)) if d > 0.0 => Some(round_to(n / d, 3)),
        _ => None,
    }
}

/// Derived ML features; every column is overwritten on each run.
pub struct FeatureEngineer {
    config: FeatureConfig,
}

impl FeatureEngineer {
    pub fn new(config: FeatureConfig) -> Self {
        Self { config }
    }

    pub fn create_all_features(&self, df: &mut DataFrame) -> Result<()> {
        let nutrients = NutrientColumns::read(df)?;

        self.create_nutritional_ratios(df, &nutrients)?;
        self.create_health_indicators(df, &nutrients)?;
        self.create_aggregate_features(df, &nutrients)?;
        self.create_categorical_features(df, &nutrients)?;

        info!("Derived features for {} products", df.height());
        Ok(())
    }

    fn create_nutritional_ratios(&self, df: &mut DataFrame, n: &NutrientColumns) -> Result<()> {
        let ratios = [
            ("ratio_saturated_fat", Nutrient::SaturatedFat, Nutrient::Fat),
            ("ratio_sugars", Nutrient::Sugars, Nutrient::Carbohydrates),
            ("ratio_protein_carbohydrates", Nutrient::Proteins, Nutrient::Carbohydrates),
            ("ratio_protein_fat", Nutrient::Proteins, Nutrient::Fat),
        ];

        for (name, numerator, denominator) in ratios {
            let values = (0..n.height)
                .map(|row| ratio(n.at(numerator, row), n.at(denominator, row)))
                .collect();
            set_f64(df, name, values)?;
        }
        Ok(())
    }

    fn create_health_indicators(&self, df: &mut DataFrame, n: &NutrientColumns) -> Result<()> {
        let indicators = [
            ("has_fibre", Nutrient::Fibre, 0.0),
            ("high_salt", Nutrient::Salt, self.config.high_salt),
            ("high_sugar", Nutrient::Sugars, self.config.high_sugar),
            ("high_fat", Nutrient::Fat, self.config.high_fat),
            ("high_saturated_fat", Nutrient::SaturatedFat, self.config.high_saturated_fat),
        ];

        for (name, nutrient, threshold) in indicators {
            let flags = (0..n.height)
                .map(|row| n.at(nutrient, row).map(|v| v > threshold).unwrap_or(false))
                .collect();
            set_bool(df, name, flags)?;
        }

        for (name, source) in [
            ("has_allergens", "alergenos"),
            ("has_certifications", "certificaciones"),
        ] {
            let flags = if has_column(df, source) {
                str_values(df, source)?
                    .iter()
                    .map(|v| v.as_deref().map(|s| !s.trim().is_empty()).unwrap_or(false))
                    .collect()
            } else {
                vec![false; n.height]
            };
            set_bool(df, name, flags)?;
        }
        Ok(())
    }

    fn create_aggregate_features(&self, df: &mut DataFrame, n: &NutrientColumns) -> Result<()> {
        let macros = [
            Nutrient::Fat,
            Nutrient::Carbohydrates,
            Nutrient::Proteins,
            Nutrient::Fibre,
        ];
        let sums = (0..n.height)
            .map(|row| {
                let sum: f64 = macros.iter().filter_map(|m| n.at(*m, row)).sum();
                Some(round_to(sum, 2))
            })
            .collect();
        set_f64(df, "macronutrient_sum", sums)?;

        set_f64(df, "caloric_density", n.get(Nutrient::EnergyKcal).to_vec())?;

        let calories_from = [
            ("calories_from_fat", Nutrient::Fat, self.config.kcal_per_g_fat),
            (
                "calories_from_carbohydrates",
                Nutrient::Carbohydrates,
                self.config.kcal_per_g_carbohydrates,
            ),
            ("calories_from_proteins", Nutrient::Proteins, self.config.kcal_per_g_proteins),
        ];
        for (name, nutrient, factor) in calories_from {
            let values = n
                .get(nutrient)
                .iter()
                .map(|v| v.map(|g| round_to(g * factor, 1)))
                .collect();
            set_f64(df, name, values)?;
        }
        Ok(())
    }

    fn create_categorical_features(&self, df: &mut DataFrame, n: &NutrientColumns) -> Result<()> {
        let categories = n
            .get(Nutrient::EnergyKcal)
            .iter()
            .map(|kcal| Some(self.calorie_category(*kcal)))
            .collect();
        set_str(df, "calorie_category", categories)?;

        let profiles = (0..n.height)
            .map(|row| {
                Some(self.macronutrient_profile(
                    n.at(Nutrient::Fat, row),
                    n.at(Nutrient::Carbohydrates, row),
                    n.at(Nutrient::Proteins, row),
                ))
            })
            .collect();
        set_str(df, "macronutrient_profile", profiles)?;
        Ok(())
    }

    pub fn calorie_category(&self, kcal: Option<f64>) -> String {
        let Some(kcal) = kcal else {
            return self.config.unknown_label.clone();
        };

        self.config
            .calorie_bins
            .iter()
            .find(|bin| bin.min <= kcal && kcal < bin.max)
            .map(|bin| bin.label.clone())
            .unwrap_or_else(|| self.config.calorie_fallback_label.clone())
    }

    /// Dominant macronutrient; ties resolve fat, then carbohydrates.
    pub fn macronutrient_profile(
        &self,
        fat: Option<f64>,
        carbohydrates: Option<f64>,
        proteins: Option<f64>,
    ) -> String {
        let (Some(fat), Some(carbs), Some(proteins)) = (fat, carbohydrates, proteins) else {
            return self.config.unknown_label.clone();
        };

        if fat + carbs + proteins == 0.0 {
            return self.config.unknown_label.clone();
        }

        let profile = if fat >= carbs && fat >= proteins {
            "high_in_fat"
        } else if carbs >= proteins {
            "high_in_carbohydrates"
        } else {
            "high_in_proteins"
        };
        profile.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engineer() -> FeatureEngineer {
        FeatureEngineer::new(FeatureConfig::default())
    }

    fn sample() -> DataFrame {
        df!(
            "energia_kcal" => &[Some(65.0), Some(550.0), None],
            "grasas_totales" => &[Some(3.6), Some(30.0), Some(0.0)],
            "grasas_saturadas" => &[Some(2.4), Some(12.0), None],
            "carbohidratos" => &[Some(4.7), Some(50.0), Some(0.0)],
            "azucares" => &[Some(4.7), Some(20.0), None],
            "proteinas" => &[Some(3.1), Some(6.0), Some(0.0)],
            "sal" => &[Some(0.13), Some(2.0), None],
            "alergenos" => &[Some("leche"), Some(" "), None]
        )
        .unwrap()
    }

    #[test]
    fn test_features() {
        let mut df = sample();
        engineer().create_all_features(&mut df).unwrap();

        assert_eq!(
            f64_values(&df, "ratio_saturated_fat").unwrap(),
            vec![Some(0.667), Some(0.4), None]
        );
        assert_eq!(
            f64_values(&df, "ratio_protein_fat").unwrap(),
            vec![Some(0.861), Some(0.2), None]
        );
        assert_eq!(
            f64_values(&df, "macronutrient_sum").unwrap(),
            vec![Some(11.4), Some(86.0), Some(0.0)]
        );
        assert_eq!(
            f64_values(&df, "calories_from_fat").unwrap(),
            vec![Some(32.4), Some(270.0), Some(0.0)]
        );
        assert_eq!(
            str_values(&df, "calorie_category").unwrap(),
            vec![
                Some("low".to_string()),
                Some("very_high".to_string()),
                Some("unknown".to_string())
            ]
        );
        assert_eq!(
            str_values(&df, "macronutrient_profile").unwrap(),
            vec![
                Some("high_in_carbohydrates".to_string()),
                Some("high_in_carbohydrates".to_string()),
                Some("unknown".to_string())
            ]
        );

        let high_salt = df.column("high_salt").unwrap().bool().unwrap();
        assert_eq!(high_salt.get(0), Some(false));
        assert_eq!(high_salt.get(1), Some(true));
        assert_eq!(high_salt.get(2), Some(false));

        let has_allergens = df.column("has_allergens").unwrap().bool().unwrap();
        assert_eq!(has_allergens.get(0), Some(true));
        assert_eq!(has_allergens.get(1), Some(false));

        let has_fibre = df.column("has_fibre").unwrap().bool().unwrap();
        assert_eq!(has_fibre.get(0), Some(false));
    }

    #[test]
    fn test_idempotent() {
        let mut once = sample();
        engineer().create_all_features(&mut once).unwrap();

        let mut twice = once.clone();
        engineer().create_all_features(&mut twice).unwrap();

        assert_eq!(once.width(), twice.width());
        assert!(once.equals_missing(&twice));
    }

    #[test]
    fn test_calorie_bins() {
        let e = engineer();
        assert_eq!(e.calorie_category(Some(0.0)), "low");
        assert_eq!(e.calorie_category(Some(99.9)), "low");
        assert_eq!(e.calorie_category(Some(100.0)), "medium");
        assert_eq!(e.calorie_category(Some(300.0)), "high");
        assert_eq!(e.calorie_category(Some(500.0)), "very_high");
        assert_eq!(e.calorie_category(None), "unknown");
    }

    #[test]
    fn test_profile_ties() {
        let e = engineer();
        assert_eq!(e.macronutrient_profile(Some(5.0), Some(5.0), Some(5.0)), "high_in_fat");
        assert_eq!(
            e.macronutrient_profile(Some(1.0), Some(5.0), Some(5.0)),
            "high_in_carbohydrates"
        );
        assert_eq!(e.macronutrient_profile(Some(1.0), Some(2.0), Some(5.0)), "high_in_proteins");
        assert_eq!(e.macronutrient_profile(None, Some(2.0), Some(5.0)), "unknown");
    }
}
