use anyhow::{Context, Result};
use chrono::Utc;
use polars::prelude::*;
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::PathsConfig;
use crate::error::PipelineError;
use crate::models::Source;

/// `<base>/<YYYY>/<MM>/<DD>/<run id>` for dated runs, `<base>` otherwise.
pub fn run_directory(base: &Path, dated: bool) -> PathBuf {
    if !dated {
        return base.to_path_buf();
    }
    let date = Utc::now().format("%Y/%m/%d").to_string();
    base.join(date).join(Uuid::new_v4().to_string())
}

pub async fn load_json(path: &Path) -> Result<Value> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {}", path.display()))
}

/// Reads whichever input files exist; fails with `NoInput` only when none load.
pub async fn load_inputs(paths: &PathsConfig) -> Result<Vec<(Source, Value)>> {
    let candidates = [
        (Source::Alcampo, &paths.alcampo_input),
        (Source::OpenFoodFacts, &paths.openfood_input),
    ];

    let mut inputs = Vec::new();
    for (source, path) in candidates {
        match load_json(Path::new(path)).await {
            Ok(payload) => {
                info!("Loaded {} input from {}", source, path);
                inputs.push((source, payload));
            }
            Err(e) => warn!("Skipping {} input: {:#}", source, e),
        }
    }

    if inputs.is_empty() {
        return Err(PipelineError::NoInput.into());
    }
    Ok(inputs)
}

/// Writes pipeline outputs under one run directory.
pub struct LocalStorage {
    run_dir: PathBuf,
}

impl LocalStorage {
    pub fn new(run_dir: PathBuf) -> Self {
        Self { run_dir }
    }

    pub fn from_config(paths: &PathsConfig) -> Self {
        Self::new(run_directory(Path::new(&paths.output_dir), paths.dated_runs))
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    async fn write_file(&self, file_name: &str, data: &[u8]) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.run_dir)
            .await
            .with_context(|| format!("Failed to create {}", self.run_dir.display()))?;

        let path = self.run_dir.join(file_name);
        tokio::fs::write(&path, data)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }

    pub async fn store_json<T: Serialize>(&self, file_name: &str, value: &T) -> Result<PathBuf> {
        let data = serde_json::to_vec_pretty(value)?;
        let path = self.write_file(file_name, &data).await?;
        info!("Stored JSON: {}", path.display());
        Ok(path)
    }

    /// Parquet for `.parquet` names, CSV otherwise.
    pub async fn store_table(&self, file_name: &str, df: &mut DataFrame) -> Result<PathBuf> {
        let mut buf = Vec::new();
        if file_name.ends_with(".parquet") {
            ParquetWriter::new(&mut buf).finish(df)?;
        } else {
            CsvWriter::new(&mut buf).include_header(true).finish(df)?;
        }

        let path = self.write_file(file_name, &buf).await?;
        info!(
            "Stored table ({} rows x {} columns): {}",
            df.height(),
            df.width(),
            path.display()
        );
        Ok(path)
    }
}
