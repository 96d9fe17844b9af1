use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use super::nutrition_config::{ConsolidationConfig, NutritionConfig};
use super::quality_config::{
    CleaningConfig, FeatureConfig, ScoringConfig, TextConfig, ValidationConfig,
};

pub const ENV_PREFIX: &str = "NUTRI_PIPELINE";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub alcampo_input: String,
    pub openfood_input: String,
    pub output_dir: String,
    pub unified_json: String,
    pub flat_table: String,
    pub ml_table: String,
    pub validation_report: String,
    /// Nest outputs under `YYYY/MM/DD/<run id>`.
    pub dated_runs: bool,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            alcampo_input: "data/resultado_alcampo.json".to_string(),
            openfood_input: "data/openfood_facts_productos.json".to_string(),
            output_dir: "data/output".to_string(),
            unified_json: "productos_unificados.json".to_string(),
            flat_table: "productos_unificados.csv".to_string(),
            ml_table: "productos_ml.parquet".to_string(),
            validation_report: "validation_report.json".to_string(),
            dated_runs: false,
        }
    }
}

/// Every vocabulary, mapping table and threshold the pipeline uses.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub paths: PathsConfig,
    pub nutrition: NutritionConfig,
    pub consolidation: ConsolidationConfig,
    pub cleaning: CleaningConfig,
    pub validation: ValidationConfig,
    pub scoring: ScoringConfig,
    pub features: FeatureConfig,
    pub text: TextConfig,
}

impl PipelineConfig {
    /// Loads `path` (TOML, optional) layered with `NUTRI_PIPELINE__SECTION__KEY` overrides.
    pub fn from_file(path: &str) -> Result<Self> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::new(path, ::config::FileFormat::Toml).required(false))
            .add_source(::config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()
            .with_context(|| format!("Failed to read pipeline configuration from {}", path))?;

        let config: PipelineConfig = settings
            .try_deserialize()
            .context("Failed to deserialize pipeline configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: PipelineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for (column, range) in &self.validation.plausible_ranges {
            if range.min > range.max {
                bail!("Invalid plausible range for {}: {} > {}", column, range.min, range.max);
            }
        }

        if self.validation.outlier_z_threshold <= 0.0 {
            bail!("outlier_z_threshold must be positive");
        }

        if self.scoring.min_score > self.scoring.max_score {
            bail!(
                "Invalid score bounds: {} > {}",
                self.scoring.min_score,
                self.scoring.max_score
            );
        }

        if let Some(rule) = self
            .scoring
            .penalties
            .iter()
            .chain(self.scoring.bonuses.iter())
            .find(|r| r.divisor == 0.0)
        {
            bail!("Score rule for {:?} has a zero divisor", rule.nutrient);
        }

        if self.text.min_token_length > self.text.max_token_length {
            bail!("min_token_length must not exceed max_token_length");
        }

        Ok(())
    }
}
