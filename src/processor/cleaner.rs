use anyhow::Result;
use polars::prelude::*;
use serde::Serialize;
use std::collections::HashSet;
use tracing::{info, warn};

use super::columns::{
    f64_values, filter_rows, has_column, nutrient_columns, nutrient_table, set_f64, set_str,
    str_values,
};
use super::json_flattener::PRICE_COLUMNS;
use crate::config::CleaningConfig;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CleaningReport {
    pub initial_count: usize,
    pub empty_rows_removed: usize,
    pub duplicates_removed: usize,
    pub insufficient_nutrition_removed: usize,
    pub negative_values_nulled: usize,
    pub final_count: usize,
}

pub struct DataCleaner {
    config: CleaningConfig,
}

impl DataCleaner {
    pub fn new(config: CleaningConfig) -> Self {
        Self { config }
    }

    /// Runs every cleaning step in order and reports what each removed.
    pub fn clean_all(&self, df: &DataFrame) -> Result<(DataFrame, CleaningReport)> {
        let mut report = CleaningReport {
            initial_count: df.height(),
            ..Default::default()
        };

        let before = df.height();
        let df = self.remove_empty_rows(df)?;
        report.empty_rows_removed = before - df.height();

        let before = df.height();
        let df = self.remove_duplicates(&df)?;
        report.duplicates_removed = before - df.height();

        let before = df.height();
        let mut df = self.filter_insufficient_nutrition(&df)?;
        report.insufficient_nutrition_removed = before - df.height();

        self.normalize_text_fields(&mut df)?;
        report.negative_values_nulled = self.null_negative_values(&mut df)?;

        report.final_count = df.height();
        info!(
            "Cleaning complete: {} initial, {} final, {} removed",
            report.initial_count,
            report.final_count,
            report.initial_count - report.final_count
        );

        Ok((df, report))
    }

    /// Drops rows without a product name.
    pub fn remove_empty_rows(&self, df: &DataFrame) -> Result<DataFrame> {
        if !has_column(df, "product_name") {
            return Ok(df.clone());
        }

        let keep: Vec<bool> = str_values(df, "product_name")?
            .iter()
            .map(|name| name.as_deref().map(|n| !n.trim().is_empty()).unwrap_or(false))
            .collect();

        let removed = keep.iter().filter(|k| !**k).count();
        if removed > 0 {
            info!("Removed {} rows without a product name", removed);
        }
        filter_rows(df, &keep)
    }

    /// Keeps the first occurrence of each url.
    pub fn remove_duplicates(&self, df: &DataFrame) -> Result<DataFrame> {
        if !has_column(df, "url") {
            warn!("Column 'url' not found, skipping duplicate removal");
            return Ok(df.clone());
        }

        let mut seen = HashSet::new();
        let keep: Vec<bool> = str_values(df, "url")?
            .into_iter()
            .map(|url| match url {
                Some(url) => seen.insert(url),
                None => true,
            })
            .collect();

        let result = filter_rows(df, &keep)?;
        info!(
            "Duplicates removed: {}. Remaining products: {}",
            df.height() - result.height(),
            result.height()
        );
        Ok(result)
    }

    /// Drops rows with fewer than `min_required_nutrients` observed nutrient values.
    pub fn filter_insufficient_nutrition(&self, df: &DataFrame) -> Result<DataFrame> {
        if nutrient_columns(df).is_empty() {
            warn!("No nutrition columns found, skipping nutrition filter");
            return Ok(df.clone());
        }

        let counts = nutrition_counts(df)?;
        let keep: Vec<bool> = counts
            .iter()
            .map(|c| *c >= self.config.min_required_nutrients)
            .collect();

        let result = filter_rows(df, &keep)?;
        info!(
            "Products with enough nutrition data: {}. Removed: {}",
            result.height(),
            df.height() - result.height()
        );
        Ok(result)
    }

    /// Collapses runs of whitespace and trims; blank values become null.
    pub fn normalize_text_fields(&self, df: &mut DataFrame) -> Result<()> {
        let mut normalized = 0;

        for field in &self.config.text_fields {
            if !has_column(df, field) {
                continue;
            }

            let values: Vec<Option<String>> = str_values(df, field)?
                .into_iter()
                .map(|v| {
                    v.map(|s| s.split_whitespace().collect::<Vec<_>>().join(" "))
                        .filter(|s| !s.is_empty())
                })
                .collect();
            set_str(df, field, values)?;
            normalized += 1;
        }

        info!("Normalized {} text fields", normalized);
        Ok(())
    }

    /// Negative nutrients and prices are impossible; they become null.
    pub fn null_negative_values(&self, df: &mut DataFrame) -> Result<usize> {
        let mut columns: Vec<&str> = nutrient_columns(df).iter().map(|n| n.column()).collect();
        columns.extend(PRICE_COLUMNS.iter().copied().filter(|c| has_column(df, c)));

        let mut total = 0;
        for column in columns {
            let mut values = f64_values(df, column)?;
            let mut nulled = 0;
            for value in values.iter_mut() {
                if matches!(value, Some(v) if *v < 0.0) {
                    *value = None;
                    nulled += 1;
                }
            }

            if nulled > 0 {
                warn!("Nulled {} negative values in {}", nulled, column);
                set_f64(df, column, values)?;
                total += nulled;
            }
        }

        Ok(total)
    }

    /// Adds `nutrition_completeness` and keeps rows with at least `min_nutrition_cols` values.
    pub fn filter_ml_ready(&self, df: &DataFrame) -> Result<DataFrame> {
        let mut df = df.clone();
        let counts = nutrition_counts(&df)?;

        let completeness: Vec<i64> = counts.iter().map(|c| *c as i64).collect();
        df.with_column(Series::new("nutrition_completeness".into(), completeness))?;

        let keep: Vec<bool> = counts
            .iter()
            .map(|c| *c >= self.config.min_nutrition_cols)
            .collect();

        let result = filter_rows(&df, &keep)?;
        info!(
            "ML-ready products: {} of {} (min {} nutrition values)",
            result.height(),
            df.height(),
            self.config.min_nutrition_cols
        );
        Ok(result)
    }
}

/// Non-null nutrient values per row.
pub fn nutrition_counts(df: &DataFrame) -> Result<Vec<usize>> {
    let mut counts = vec![0usize; df.height()];
    for (nutrient, values) in nutrient_table(df)? {
        if !has_column(df, nutrient.column()) {
            continue;
        }
        for (count, value) in counts.iter_mut().zip(values) {
            if value.is_some() {
                *count += 1;
            }
        }
    }
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cleaner() -> DataCleaner {
        DataCleaner::new(CleaningConfig::default())
    }

    fn sample() -> DataFrame {
        df!(
            "product_name" => &[Some("Leche  entera "), None, Some("Leche entera"), Some("Agua"), Some("Pan")],
            "url" => &["u1", "u2", "u1", "u3", "u4"],
            "energia_kcal" => &[Some(65.0), Some(10.0), Some(65.0), Some(0.0), Some(250.0)],
            "grasas_totales" => &[Some(3.6), Some(1.0), Some(3.6), None, Some(-1.0)],
            "sal" => &[Some(0.1), None, Some(0.1), None, Some(1.2)],
            "precio_total" => &[Some(1.15), None, Some(1.15), Some(0.3), Some(-2.0)]
        )
        .unwrap()
    }

    #[test]
    fn test_clean_all() {
        let (df, report) = cleaner().clean_all(&sample()).unwrap();

        assert_eq!(report.initial_count, 5);
        assert_eq!(report.empty_rows_removed, 1);
        assert_eq!(report.duplicates_removed, 1);
        assert_eq!(report.insufficient_nutrition_removed, 1);
        assert_eq!(report.negative_values_nulled, 2);
        assert_eq!(report.final_count, 2);

        assert_eq!(
            str_values(&df, "product_name").unwrap(),
            vec![Some("Leche entera".to_string()), Some("Pan".to_string())]
        );
        assert_eq!(f64_values(&df, "grasas_totales").unwrap(), vec![Some(3.6), None]);
        assert_eq!(f64_values(&df, "precio_total").unwrap(), vec![Some(1.15), None]);
    }

    #[test]
    fn test_duplicates_keep_first() {
        let df = df!(
            "url" => &[Some("a"), Some("b"), Some("a"), None, None],
            "n" => &[1i64, 2, 3, 4, 5]
        )
        .unwrap();

        let result = cleaner().remove_duplicates(&df).unwrap();
        assert_eq!(
            f64_values(&result, "n").unwrap(),
            vec![Some(1.0), Some(2.0), Some(4.0), Some(5.0)]
        );
    }

    #[test]
    fn test_ml_ready_filter() {
        let df = df!(
            "energia_kcal" => &[Some(100.0), Some(100.0), None],
            "grasas_totales" => &[Some(1.0), Some(1.0), None],
            "sal" => &[Some(0.1), None, Some(0.2)]
        )
        .unwrap();

        let result = cleaner().filter_ml_ready(&df).unwrap();
        assert_eq!(result.height(), 1);
        assert_eq!(
            f64_values(&result, "nutrition_completeness").unwrap(),
            vec![Some(3.0)]
        );
    }
}
