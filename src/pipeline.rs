use anyhow::{Context, Result};
use polars::prelude::*;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::models::{Source, UnifiedProduct};
use crate::processor::{
    CleaningReport, Consolidator, DataCleaner, DataValidator, FeatureEngineer, Imputer,
    JsonFlattener, MultiSourceUnifier, NutritionScorer, ProductValidator, TextNormalizer,
    UnificationStats, ValidationReport, ValueNormalizer,
};

/// Row counts and per-stage reports of one `build_ml_table` run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TableStats {
    pub flattened_rows: usize,
    pub cleaning: CleaningReport,
    pub imputed_values: usize,
    pub ml_ready_rows: usize,
    pub text_values_normalized: usize,
}

pub struct TableOutput {
    /// One row per unified product, before cleaning.
    pub flat_table: DataFrame,
    pub ml_table: DataFrame,
    pub validation: ValidationReport,
    pub stats: TableStats,
}

/// Runs the unification and table stages with one shared configuration.
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Fails with `NoProducts` when no record survives validation.
    pub fn unify(
        &self,
        inputs: &[(Source, Value)],
    ) -> Result<(Vec<UnifiedProduct>, UnificationStats)> {
        info!("=== Unifying {} sources ===", inputs.len());

        let unifier = MultiSourceUnifier::new(&self.config.nutrition);
        let (products, stats) = unifier.unify(inputs);

        if products.is_empty() {
            return Err(PipelineError::NoProducts.into());
        }

        for (source, source_stats) in &stats.per_source {
            info!(
                "{}: {} records, {} accepted, {} invalid, {} failed",
                source,
                source_stats.records,
                source_stats.accepted,
                source_stats.invalid,
                source_stats.failed
            );
        }

        let min_values = self.config.cleaning.min_required_nutrients;
        let complete = products
            .iter()
            .filter_map(|p| p.nutrition_per_100.as_ref())
            .filter(|facts| ProductValidator::has_nutrition_completeness(facts, min_values))
            .count();
        info!(
            "{} of {} products report at least {} non-zero nutrients",
            complete,
            products.len(),
            min_values
        );

        Ok((products, stats))
    }

    pub fn build_ml_table(&self, products: &[UnifiedProduct]) -> Result<TableOutput> {
        info!("=== Building ML table from {} products ===", products.len());

        let flat_table = JsonFlattener::new()
            .flatten_to_dataframe(products)
            .context("Failed to flatten unified products")?;
        self.process_flat_table(flat_table)
    }

    /// Table stage over unified products read back from a stored JSON array.
    /// Records failing the unified schema check are skipped.
    pub fn build_ml_table_from_values(&self, records: &[Value]) -> Result<TableOutput> {
        info!("=== Building ML table from {} stored records ===", records.len());

        let valid: Vec<Value> = records
            .iter()
            .filter(|record| ProductValidator::is_valid_value(record))
            .cloned()
            .collect();
        if valid.len() < records.len() {
            warn!(
                "Skipped {} stored records failing the unified schema",
                records.len() - valid.len()
            );
        }
        if valid.is_empty() {
            return Err(PipelineError::NoProducts.into());
        }

        let flat_table = JsonFlattener::new()
            .flatten_values(&valid)
            .context("Failed to flatten stored unified records")?;
        self.process_flat_table(flat_table)
    }

    fn process_flat_table(&self, flat_table: DataFrame) -> Result<TableOutput> {
        let mut stats = TableStats {
            flattened_rows: flat_table.height(),
            ..Default::default()
        };

        let cleaner = DataCleaner::new(self.config.cleaning.clone());
        let (mut df, cleaning) = cleaner.clean_all(&flat_table)?;
        stats.cleaning = cleaning;
        ensure_rows(&df, "cleaning")?;

        ValueNormalizer::new().normalize_all(&mut df)?;

        Consolidator::new(self.config.consolidation.clone()).consolidate_all(&mut df)?;

        stats.imputed_values = Imputer::new().impute_missing_values(&mut df)?;

        let validation = DataValidator::new(self.config.validation.clone()).validate_all(&df)?;

        let mut df = cleaner.filter_ml_ready(&df)?;
        ensure_rows(&df, "ML-readiness filter")?;
        stats.ml_ready_rows = df.height();

        NutritionScorer::new(self.config.scoring.clone()).add_scores(&mut df)?;
        FeatureEngineer::new(self.config.features.clone()).create_all_features(&mut df)?;
        stats.text_values_normalized =
            TextNormalizer::new(self.config.text.clone()).normalize_all_fields(&mut df)?;

        info!(
            "ML table ready: {} rows x {} columns",
            df.height(),
            df.width()
        );

        Ok(TableOutput {
            flat_table,
            ml_table: df,
            validation,
            stats,
        })
    }
}

fn ensure_rows(df: &DataFrame, stage: &str) -> Result<()> {
    if df.height() == 0 {
        return Err(PipelineError::EmptyTable {
            stage: stage.to_string(),
        }
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::columns::{f64_values, has_column, str_values};
    use serde_json::json;

    fn pipeline() -> Pipeline {
        Pipeline::new(PipelineConfig::default())
    }

    fn alcampo_record(n: usize, kcal: &str, fat: &str, sugars: &str) -> Value {
        json!({
            "url": format!("https://www.alcampo.es/p/{}", n),
            "nombre": format!("Producto {} 500 g", n),
            "precio": "1,99 €",
            "unidad": "500 g",
            "nutricion": {
                "valor_energetico_kcal": kcal,
                "grasas_g": fat,
                "azucares_g": sugars,
                "proteinas_g": "3,1"
            }
        })
    }

    #[test]
    fn test_unify_skips_record_without_url() {
        let inputs = vec![
            (
                Source::Alcampo,
                json!([{
                    "url": "https://www.alcampo.es/p/leche",
                    "nombre": "Leche",
                    "nutricion": {"valor_energetico_kcal": "65"}
                }]),
            ),
            (
                Source::OpenFoodFacts,
                json!([{
                    "URL": "",
                    "titulo": "Yogur – Open Food Facts",
                    "valores_nutricionales_100_g": {"sal": "0,1"}
                }]),
            ),
        ];

        let (products, stats) = pipeline().unify(&inputs).unwrap();

        assert_eq!(products.len(), 1);
        assert_eq!(products[0].title.as_deref(), Some("Leche"));
        assert_eq!(products[0].source, Source::Alcampo);
        assert_eq!(stats.per_source["openfoodfacts"].invalid, 1);
    }

    #[test]
    fn test_unify_without_products_fails() {
        let inputs = vec![(Source::Alcampo, json!({"unexpected": true}))];
        let err = pipeline().unify(&inputs).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::NoProducts)
        ));
    }

    #[test]
    fn test_build_ml_table_end_to_end() {
        let inputs = vec![(
            Source::Alcampo,
            json!([
                alcampo_record(1, "65", "3,6", "4,7"),
                alcampo_record(2, "550", "30", "20"),
                alcampo_record(2, "550", "30", "20"),
                alcampo_record(3, "120", "", "")
            ]),
        )];

        let p = pipeline();
        let (products, _) = p.unify(&inputs).unwrap();
        let output = p.build_ml_table(&products).unwrap();

        assert_eq!(output.flat_table.height(), 4);
        assert_eq!(output.stats.cleaning.duplicates_removed, 1);
        assert_eq!(output.stats.ml_ready_rows, 3);
        assert_eq!(output.validation.total_products, 3);

        let df = &output.ml_table;
        assert!(has_column(df, "nutrition_score"));
        assert!(has_column(df, "calorie_category"));
        assert_eq!(
            str_values(df, "product_name").unwrap()[0].as_deref(),
            Some("producto 1")
        );
        // Imputed from the source median of the observed fat values
        let fat = f64_values(df, "grasas_totales").unwrap()[2].unwrap();
        assert!((fat - 16.8).abs() < 1e-9);
        assert_eq!(
            f64_values(df, "precio_por_cantidad").unwrap()[0],
            Some(0.4)
        );
    }

    #[test]
    fn test_build_ml_table_from_stored_records() {
        let inputs = vec![(
            Source::Alcampo,
            json!([
                alcampo_record(1, "65", "3,6", "4,7"),
                alcampo_record(2, "550", "30", "20")
            ]),
        )];

        let p = pipeline();
        let (products, _) = p.unify(&inputs).unwrap();
        let mut records: Vec<Value> = products
            .iter()
            .map(|product| serde_json::to_value(product).unwrap())
            .collect();
        records.push(json!({"url": "", "titulo": "Sin url", "valores_nutricionales_100_g": {}}));
        records.push(json!("not a product"));

        let output = p.build_ml_table_from_values(&records).unwrap();
        assert_eq!(output.flat_table.height(), 2);
        assert_eq!(output.stats.ml_ready_rows, 2);

        let err = p.build_ml_table_from_values(&records[2..]).err().unwrap();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::NoProducts)
        ));
    }

    #[test]
    fn test_build_ml_table_empty_after_cleaning() {
        let mut product = UnifiedProduct::new(Source::Alcampo);
        product.url = Some("https://www.alcampo.es/p/1".to_string());
        product.title = Some("Agua".to_string());
        product.nutrition_per_100 = Some(Default::default());

        let err = pipeline().build_ml_table(&[product]).err().unwrap();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::EmptyTable { .. })
        ));
    }
}
