use anyhow::Result;
use polars::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{info, warn};

use super::columns::{f64_values, has_column, nutrient_columns};
use super::units::round_to;
use crate::config::{ValidationConfig, ValueRange};

const MACRO_COLUMNS: [&str; 4] = ["grasas_totales", "carbohidratos", "proteinas", "fibra"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RangeError {
    pub count: usize,
    pub expected_range: (f64, f64),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RangeReport {
    pub total_checked: usize,
    pub products_with_errors: usize,
    pub errors_by_field: BTreeMap<String, RangeError>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldOutliers {
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub threshold_z: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OutlierReport {
    pub outliers_by_field: BTreeMap<String, FieldOutliers>,
    pub total_outliers: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Inconsistency {
    #[serde(rename = "type")]
    pub kind: String,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConsistencyReport {
    pub inconsistencies: Vec<Inconsistency>,
    /// Rows with saturated fat above fat or sugars above carbohydrates.
    pub total_inconsistent_products: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    pub total_products: usize,
    pub range_validation: RangeReport,
    pub outliers: OutlierReport,
    pub consistency: ConsistencyReport,
}

/// Mean and sample standard deviation.
fn mean_and_std(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    (mean, variance.sqrt())
}

fn column_or_nulls(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    if has_column(df, name) {
        f64_values(df, name)
    } else {
        Ok(vec![None; df.height()])
    }
}

/// Rows where `greater > lesser`, both present.
fn ordering_violations(df: &DataFrame, greater: &str, lesser: &str) -> Result<Option<Vec<bool>>> {
    if !has_column(df, greater) || !has_column(df, lesser) {
        return Ok(None);
    }

    let a = f64_values(df, greater)?;
    let b = f64_values(df, lesser)?;
    Ok(Some(
        a.iter()
            .zip(b.iter())
            .map(|(a, b)| matches!((a, b), (Some(a), Some(b)) if a > b))
            .collect(),
    ))
}

/// Advisory quality checks; the table is never modified.
pub struct DataValidator {
    config: ValidationConfig,
}

impl DataValidator {
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    pub fn validate_all(&self, df: &DataFrame) -> Result<ValidationReport> {
        info!("Starting data validation");

        let report = ValidationReport {
            total_products: df.height(),
            range_validation: self.validate_nutritional_ranges(df)?,
            outliers: self.detect_outliers(df)?,
            consistency: self.validate_consistency(df)?,
        };

        info!("Data validation finished");
        Ok(report)
    }

    pub fn validate_nutritional_ranges(&self, df: &DataFrame) -> Result<RangeReport> {
        let mut report = RangeReport {
            total_checked: df.height(),
            ..Default::default()
        };
        let mut affected = vec![false; df.height()];

        for nutrient in nutrient_columns(df) {
            let column = nutrient.column();
            let Some(range) = self.config.plausible_ranges.get(column) else {
                continue;
            };

            let values = f64_values(df, column)?;
            let mut count = 0;
            for (row, value) in values.iter().enumerate() {
                if let Some(v) = value {
                    if !range.contains(*v) {
                        count += 1;
                        affected[row] = true;
                    }
                }
            }

            if count > 0 {
                warn!(
                    "Field '{}': {} values outside [{}, {}]",
                    column, count, range.min, range.max
                );
                let ValueRange { min, max } = *range;
                report.errors_by_field.insert(
                    column.to_string(),
                    RangeError {
                        count,
                        expected_range: (min, max),
                    },
                );
            }
        }

        report.products_with_errors = affected.iter().filter(|a| **a).count();
        info!(
            "Range validation: {} products with out-of-range values",
            report.products_with_errors
        );
        Ok(report)
    }

    pub fn detect_outliers(&self, df: &DataFrame) -> Result<OutlierReport> {
        let threshold = self.config.outlier_z_threshold;
        let mut report = OutlierReport::default();

        for nutrient in nutrient_columns(df) {
            let column = nutrient.column();
            let values: Vec<f64> = f64_values(df, column)?.into_iter().flatten().collect();
            if values.len() < 2 {
                continue;
            }

            let (mean, std) = mean_and_std(&values);
            if std == 0.0 {
                continue;
            }

            let count = values
                .iter()
                .filter(|v| ((*v - mean) / std).abs() > threshold)
                .count();

            if count > 0 {
                report.outliers_by_field.insert(
                    column.to_string(),
                    FieldOutliers {
                        count,
                        mean: round_to(mean, 2),
                        std: round_to(std, 2),
                        threshold_z: threshold,
                    },
                );
                report.total_outliers += count;
            }
        }

        info!(
            "Outliers detected: {} across {} fields",
            report.total_outliers,
            report.outliers_by_field.len()
        );
        Ok(report)
    }

    pub fn validate_consistency(&self, df: &DataFrame) -> Result<ConsistencyReport> {
        let mut report = ConsistencyReport::default();
        let mut inconsistent = vec![false; df.height()];

        let ordering_rules = [
            ("grasas_saturadas", "grasas_totales"),
            ("azucares", "carbohidratos"),
        ];
        for (greater, lesser) in ordering_rules {
            if let Some(violations) = ordering_violations(df, greater, lesser)? {
                let count = violations.iter().filter(|v| **v).count();
                if count > 0 {
                    report.inconsistencies.push(Inconsistency {
                        kind: format!("{} > {}", greater, lesser),
                        count,
                    });
                }
                // Only these two rules feed the per-product total
                for (flag, violated) in inconsistent.iter_mut().zip(violations) {
                    *flag |= violated;
                }
            }
        }

        if has_column(df, "energia_kcal") && has_column(df, "energia_kj") {
            let kcal = f64_values(df, "energia_kcal")?;
            let kj = f64_values(df, "energia_kj")?;
            let count = kcal
                .iter()
                .zip(kj.iter())
                .filter(|(kcal, kj)| match (kcal, kj) {
                    (Some(kcal), Some(kj)) if *kcal > 0.0 => {
                        let expected = kcal * self.config.kcal_to_kj_factor;
                        (kj - expected).abs() / expected > self.config.energy_tolerance
                    }
                    _ => false,
                })
                .count();

            if count > 0 {
                report.inconsistencies.push(Inconsistency {
                    kind: format!(
                        "energia_kcal and energia_kj differ by more than {}%",
                        self.config.energy_tolerance * 100.0
                    ),
                    count,
                });
            }
        }

        let available: Vec<&str> = MACRO_COLUMNS
            .iter()
            .copied()
            .filter(|c| has_column(df, c))
            .collect();
        if available.len() >= 2 {
            let columns = available
                .iter()
                .map(|c| column_or_nulls(df, c))
                .collect::<Result<Vec<_>>>()?;
            let count = (0..df.height())
                .filter(|row| {
                    let sum: f64 = columns.iter().filter_map(|col| col[*row]).sum();
                    sum > self.config.macro_sum_limit
                })
                .count();

            if count > 0 {
                report.inconsistencies.push(Inconsistency {
                    kind: format!("macronutrient sum > {}g", self.config.macro_sum_limit),
                    count,
                });
            }
        }

        report.total_inconsistent_products = inconsistent.iter().filter(|f| **f).count();
        info!(
            "Inconsistencies: {} kinds, {} products affected",
            report.inconsistencies.len(),
            report.total_inconsistent_products
        );
        Ok(report)
    }
}
