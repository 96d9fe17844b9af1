use anyhow::{Context, Result};
use crate::config::PipelineConfig;
use pipeline::Pipeline;
use std::env;
use std::path::Path;
use storage::LocalStorage;
use tracing::info;

mod config;
mod error;
mod models;
mod pipeline;
mod processor;
mod storage;

const DEFAULT_CONFIG_PATH: &str = "config/pipeline.toml";

/// Value following `long` or `short` on the command line.
fn arg_value(long: &str, short: &str) -> Option<String> {
    let args: Vec<String> = env::args().collect();
    args.iter()
        .position(|arg| arg == long || arg == short)
        .and_then(|i| args.get(i + 1).cloned())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    // Load environment variables
    dotenv::dotenv().ok();

    // Stop after writing the unified JSON
    let unify_only = env::args().any(|arg| arg == "--unify-only" || arg == "-u");
    // Rebuild the tables from a previously written unified JSON
    let from_unified = arg_value("--from-unified", "-f");

    info!("🚀 Starting Nutrition Unification Pipeline");

    let config_path =
        arg_value("--config", "-c").unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = PipelineConfig::from_file(&config_path)
        .with_context(|| format!("Failed to load pipeline configuration from {}", config_path))?;
    info!("Loaded configuration (file: {})", config_path);

    let storage = LocalStorage::from_config(&config.paths);
    info!("Writing outputs to {}", storage.run_dir().display());

    let pipeline = Pipeline::new(config);
    let paths = &pipeline.config().paths;

    let (products_in, mut output) = match from_unified {
        Some(unified_path) => {
            info!("Reading unified products from {}", unified_path);
            let payload = storage::load_json(Path::new(&unified_path)).await?;
            let records = payload
                .as_array()
                .with_context(|| format!("{} does not hold a JSON array", unified_path))?;
            (records.len(), pipeline.build_ml_table_from_values(records)?)
        }
        None => {
            let inputs = storage::load_inputs(paths).await?;
            let (products, unification) = pipeline.unify(&inputs)?;
            storage.store_json(&paths.unified_json, &products).await?;
            info!("✅ Unified {} products", unification.total_accepted);

            if unify_only {
                info!("🎉 Unification finished");
                return Ok(());
            }

            (products.len(), pipeline.build_ml_table(&products)?)
        }
    };

    storage.store_table(&paths.flat_table, &mut output.flat_table).await?;
    storage.store_table(&paths.ml_table, &mut output.ml_table).await?;
    storage
        .store_json(&paths.validation_report, &output.validation)
        .await?;

    info!("\n=== Pipeline Summary ===");
    info!("📊 Unified products in: {}", products_in);
    info!(
        "🧹 Rows after cleaning: {} (from {})",
        output.stats.cleaning.final_count, output.stats.flattened_rows
    );
    info!("🧮 Imputed values: {}", output.stats.imputed_values);
    info!("🤖 ML-ready products: {}", output.stats.ml_ready_rows);
    info!("🎉 Pipeline completed successfully!");

    Ok(())
}
