use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{error, info, warn};

use super::product_validator::ProductValidator;
use super::transformers::TransformerRegistry;
use crate::config::NutritionConfig;
use crate::error::json_type_name;
use crate::models::{Source, UnifiedProduct};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SourceStats {
    pub records: usize,
    pub accepted: usize,
    pub invalid: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UnificationStats {
    pub per_source: BTreeMap<String, SourceStats>,
    pub total_accepted: usize,
}

/// Records of a source payload: a bare array or `{"products": [...]}`.
pub fn extract_records(payload: &Value) -> Option<&[Value]> {
    match payload {
        Value::Array(records) => Some(records.as_slice()),
        Value::Object(fields) => fields
            .get("products")
            .and_then(Value::as_array)
            .map(Vec::as_slice),
        _ => None,
    }
}

pub struct MultiSourceUnifier {
    registry: TransformerRegistry,
}

impl MultiSourceUnifier {
    pub fn new(config: &NutritionConfig) -> Self {
        Self::with_registry(TransformerRegistry::new(config))
    }

    pub fn with_registry(registry: TransformerRegistry) -> Self {
        Self { registry }
    }

    /// Transforms and validates every record, sources in the given order,
    /// records in their original order. Per-record failures are skipped.
    pub fn unify(&self, inputs: &[(Source, Value)]) -> (Vec<UnifiedProduct>, UnificationStats) {
        let mut products = Vec::new();
        let mut stats = UnificationStats::default();

        for (source, payload) in inputs {
            let source_stats = stats
                .per_source
                .entry(source.as_str().to_string())
                .or_default();

            let Some(records) = extract_records(payload) else {
                warn!(
                    "Skipping {} payload: expected a list of records, got {}",
                    source,
                    json_type_name(payload)
                );
                continue;
            };

            info!("Unifying {} records from {}", records.len(), source);

            for (index, record) in records.iter().enumerate() {
                source_stats.records += 1;

                match self.registry.transform(*source, record) {
                    Ok(product) => {
                        if ProductValidator::is_valid(&product) {
                            source_stats.accepted += 1;
                            products.push(product);
                        } else {
                            source_stats.invalid += 1;
                        }
                    }
                    Err(e) => {
                        source_stats.failed += 1;
                        error!("Failed to transform {} record at index {}: {}", source, index, e);
                    }
                }
            }

            info!(
                "{}: {} accepted, {} invalid, {} failed out of {}",
                source,
                source_stats.accepted,
                source_stats.invalid,
                source_stats.failed,
                source_stats.records
            );
        }

        stats.total_accepted = products.len();
        (products, stats)
    }
}
