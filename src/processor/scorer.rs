use anyhow::Result;
use polars::prelude::*;
use tracing::info;

use super::columns::{nutrient_table, set_f64};
use crate::config::{ScoreRule, ScoringConfig};
use crate::models::NutritionFacts;

pub const SCORE_COLUMN: &str = "nutrition_score";

/// 0-100 health score from nutrient penalties and bonuses.
pub struct NutritionScorer {
    config: ScoringConfig,
}

impl NutritionScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    /// Missing nutrients contribute nothing.
    pub fn score(&self, facts: &NutritionFacts) -> f64 {
        let term = |rules: &[ScoreRule]| -> f64 {
            rules
                .iter()
                .filter_map(|rule| facts.get(rule.nutrient).map(|v| rule.term(v)))
                .sum()
        };

        let score = self.config.base_score - term(&self.config.penalties) + term(&self.config.bonuses);
        score.clamp(self.config.min_score, self.config.max_score)
    }

    pub fn add_scores(&self, df: &mut DataFrame) -> Result<()> {
        let table = nutrient_table(df)?;
        let scores: Vec<Option<f64>> = (0..df.height())
            .map(|row| {
                let mut facts = NutritionFacts::default();
                for (nutrient, values) in &table {
                    facts.set(*nutrient, values[row]);
                }
                Some(self.score(&facts))
            })
            .collect();

        let mean = if scores.is_empty() {
            0.0
        } else {
            scores.iter().flatten().sum::<f64>() / scores.len() as f64
        };
        info!("Scored {} products (mean score {:.1})", scores.len(), mean);

        set_f64(df, SCORE_COLUMN, scores)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::columns::f64_values;

    fn scorer() -> NutritionScorer {
        NutritionScorer::new(ScoringConfig::default())
    }

    #[test]
    fn test_energy_penalty() {
        let facts = NutritionFacts {
            energy_kcal: Some(500.0),
            salt_g: Some(1.5),
            ..Default::default()
        };
        assert_eq!(scorer().score(&facts), 90.0);
    }

    #[test]
    fn test_fat_penalties() {
        let facts = NutritionFacts {
            fat_g: Some(30.0),
            saturated_fat_g: Some(10.0),
            ..Default::default()
        };
        assert_eq!(scorer().score(&facts), 65.0);
    }

    #[test]
    fn test_clamped() {
        let facts = NutritionFacts {
            energy_kcal: Some(5000.0),
            ..Default::default()
        };
        assert_eq!(scorer().score(&facts), 0.0);

        let facts = NutritionFacts {
            fibre_g: Some(30.0),
            proteins_g: Some(40.0),
            ..Default::default()
        };
        assert_eq!(scorer().score(&facts), 100.0);
        assert_eq!(scorer().score(&NutritionFacts::default()), 100.0);
    }

    #[test]
    fn test_bonus_offsets_penalty() {
        let facts = NutritionFacts {
            sugars_g: Some(25.0),
            fibre_g: Some(8.0),
            ..Default::default()
        };
        // 100 - 20 + 4
        assert_eq!(scorer().score(&facts), 84.0);
    }

    #[test]
    fn test_score_column() {
        let mut df = df!(
            "energia_kcal" => &[Some(500.0), None],
            "grasas_totales" => &[None, Some(30.0)],
            "grasas_saturadas" => &[None, Some(10.0)]
        )
        .unwrap();

        scorer().add_scores(&mut df).unwrap();
        assert_eq!(
            f64_values(&df, SCORE_COLUMN).unwrap(),
            vec![Some(90.0), Some(65.0)]
        );
    }
}
