use anyhow::Result;
use polars::prelude::*;
use tracing::{debug, info};

use super::columns::{f64_values, has_column, nutrient_columns, set_f64, str_values};

/// Median of the non-null values, `None` when there are none.
pub fn median(values: &[Option<f64>]) -> Option<f64> {
    let mut present: Vec<f64> = values.iter().flatten().copied().collect();
    if present.is_empty() {
        return None;
    }
    present.sort_by(|a, b| a.total_cmp(b));

    let mid = present.len() / 2;
    if present.len() % 2 == 0 {
        Some((present[mid - 1] + present[mid]) / 2.0)
    } else {
        Some(present[mid])
    }
}

/// Fills missing nutrient values with the median of the row's source.
pub struct Imputer;

impl Imputer {
    pub fn new() -> Self {
        Imputer
    }

    /// Per column: source median, then global median, then 0.0.
    /// Sources are filled in order of first appearance and the global
    /// median reflects the sources already filled. Returns the number of
    /// filled cells.
    pub fn impute_missing_values(&self, df: &mut DataFrame) -> Result<usize> {
        let groups = source_groups(df)?;
        let mut filled = 0;

        for nutrient in nutrient_columns(df) {
            let column = nutrient.column();
            let mut imputed = f64_values(df, column)?;

            for (source, rows) in &groups {
                let group_values: Vec<Option<f64>> = rows.iter().map(|i| imputed[*i]).collect();
                let missing: Vec<usize> = rows
                    .iter()
                    .copied()
                    .filter(|i| imputed[*i].is_none())
                    .collect();
                if missing.is_empty() {
                    continue;
                }

                let fill = median(&group_values)
                    .or_else(|| median(&imputed))
                    .unwrap_or(0.0);
                debug!(
                    "Imputing {} values of {} for source '{}' with {}",
                    missing.len(),
                    column,
                    source,
                    fill
                );
                for i in missing {
                    imputed[i] = Some(fill);
                    filled += 1;
                }
            }

            set_f64(df, column, imputed)?;
        }

        info!("Imputed {} missing nutrition values", filled);
        Ok(filled)
    }
}

/// Row indices per distinct source in order of first appearance; one group
/// when there is no `source` column.
fn source_groups(df: &DataFrame) -> Result<Vec<(String, Vec<usize>)>> {
    if !has_column(df, "source") {
        return Ok(vec![(String::new(), (0..df.height()).collect())]);
    }

    let mut groups: Vec<(String, Vec<usize>)> = Vec::new();
    for (i, source) in str_values(df, "source")?.into_iter().enumerate() {
        let source = source.unwrap_or_default();
        match groups.iter_mut().find(|(name, _)| *name == source) {
            Some((_, rows)) => rows.push(i),
            None => groups.push((source, vec![i])),
        }
    }
    Ok(groups)
}
