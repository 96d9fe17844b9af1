use anyhow::Result;
use polars::prelude::*;
use std::collections::BTreeMap;
use tracing::{debug, info};

use super::columns::{
    f64_values, has_column, is_numeric_dtype, nutrient_columns, set_f64, set_str, str_values,
};
use super::numeric::clean_numeric_str;
use crate::config::ConsolidationConfig;

/// Merges candidate columns into one, first non-null value winning.
pub struct Consolidator {
    config: ConsolidationConfig,
}

fn present_candidates<'a>(df: &DataFrame, candidates: &'a [String]) -> Vec<&'a str> {
    candidates
        .iter()
        .map(String::as_str)
        .filter(|c| has_column(df, c))
        .collect()
}

fn is_numeric_column(df: &DataFrame, name: &str) -> bool {
    df.column(name)
        .map(|c| is_numeric_dtype(c.dtype()))
        .unwrap_or(false)
}

/// Column values as numbers; text goes through the numeric normalizer.
fn numeric_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    if is_numeric_column(df, name) {
        return f64_values(df, name);
    }
    Ok(str_values(df, name)?
        .into_iter()
        .map(|v| v.and_then(|s| clean_numeric_str(&s)))
        .collect())
}

fn first_non_null<T: Clone>(columns: &[Vec<Option<T>>], height: usize) -> Vec<Option<T>> {
    (0..height)
        .map(|row| columns.iter().find_map(|col| col[row].clone()))
        .collect()
}

/// Writes `target` as the per-row first non-null of `candidates`.
/// Float64 when every present candidate is numeric, String otherwise.
pub fn consolidate_columns(df: &mut DataFrame, target: &str, candidates: &[String]) -> Result<()> {
    let present = present_candidates(df, candidates);
    let height = df.height();

    if !present.is_empty() && present.iter().all(|c| is_numeric_column(df, c)) {
        return consolidate_numeric(df, target, candidates);
    }

    let columns = present
        .iter()
        .map(|c| str_values(df, c))
        .collect::<Result<Vec<_>>>()?;
    if columns.is_empty() {
        debug!("No candidate columns present for {}", target);
    }
    set_str(df, target, first_non_null(&columns, height))
}

/// Like `consolidate_columns` but always numeric.
pub fn consolidate_numeric(df: &mut DataFrame, target: &str, candidates: &[String]) -> Result<()> {
    let height = df.height();
    let columns = present_candidates(df, candidates)
        .iter()
        .map(|c| numeric_values(df, c))
        .collect::<Result<Vec<_>>>()?;
    set_f64(df, target, first_non_null(&columns, height))
}

impl Consolidator {
    pub fn new(config: ConsolidationConfig) -> Self {
        Self { config }
    }

    pub fn consolidate_all(&self, df: &mut DataFrame) -> Result<()> {
        self.consolidate_nutrition(df)?;
        self.consolidate_features(df)?;
        Ok(())
    }

    pub fn consolidate_nutrition(&self, df: &mut DataFrame) -> Result<()> {
        for (target, candidates) in &self.config.nutrient_candidates {
            consolidate_numeric(df, target, candidates)?;
        }
        info!("Consolidated {} nutrition columns", self.config.nutrient_candidates.len());

        for (source, completeness) in nutrition_completeness_by_source(df)? {
            info!("Completeness '{}': {:?}", source, completeness);
        }
        Ok(())
    }

    pub fn consolidate_features(&self, df: &mut DataFrame) -> Result<()> {
        for (target, candidates) in &self.config.feature_candidates {
            consolidate_columns(df, target, candidates)?;
        }
        info!("Consolidated {} additional features", self.config.feature_candidates.len());
        Ok(())
    }
}

/// Per source, `"non-null/total"` for every nutrient column.
pub fn nutrition_completeness_by_source(
    df: &DataFrame,
) -> Result<BTreeMap<String, BTreeMap<String, String>>> {
    let sources = if has_column(df, "source") {
        str_values(df, "source")?
    } else {
        vec![None; df.height()]
    };

    let mut totals: BTreeMap<String, usize> = BTreeMap::new();
    for source in &sources {
        *totals.entry(source.clone().unwrap_or_default()).or_default() += 1;
    }

    let mut report: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
    for nutrient in nutrient_columns(df) {
        let values = f64_values(df, nutrient.column())?;
        let mut present: BTreeMap<String, usize> = BTreeMap::new();
        for (source, value) in sources.iter().zip(values.iter()) {
            if value.is_some() {
                *present.entry(source.clone().unwrap_or_default()).or_default() += 1;
            }
        }

        for (source, total) in &totals {
            let count = present.get(source).copied().unwrap_or(0);
            report
                .entry(source.clone())
                .or_default()
                .insert(nutrient.column().to_string(), format!("{}/{}", count, total));
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_first_non_null_precedence() {
        let mut df = df!(
            "a" => &[None, Some(3.0), None],
            "b" => &[Some(5.0), Some(5.0), None]
        )
        .unwrap();

        consolidate_columns(&mut df, "x", &names(&["a", "b"])).unwrap();

        assert_eq!(f64_values(&df, "x").unwrap(), vec![Some(5.0), Some(3.0), None]);
        assert_eq!(df.column("x").unwrap().dtype(), &DataType::Float64);
    }

    #[test]
    fn test_absent_candidates_are_skipped() {
        let mut df = df!("b" => &[Some(1.0), None]).unwrap();
        consolidate_columns(&mut df, "x", &names(&["missing", "b"])).unwrap();
        assert_eq!(f64_values(&df, "x").unwrap(), vec![Some(1.0), None]);

        consolidate_columns(&mut df, "y", &names(&["nope"])).unwrap();
        assert_eq!(str_values(&df, "y").unwrap(), vec![None, None]);
    }

    #[test]
    fn test_text_candidates() {
        let mut df = df!(
            "char_país" => &[None, Some("Francia")],
            "country" => &[Some("España"), Some("Italia")]
        )
        .unwrap();

        consolidate_columns(
            &mut df,
            "country",
            &names(&["desc_países de venta", "char_país", "country"]),
        )
        .unwrap();

        assert_eq!(
            str_values(&df, "country").unwrap(),
            vec![Some("España".to_string()), Some("Francia".to_string())]
        );
    }

    #[test]
    fn test_numeric_group_parses_text() {
        let mut df = df!(
            "sal_texto" => &[Some("0,8 g"), None],
            "sal" => &[Some(1.0), Some(2.0)]
        )
        .unwrap();

        consolidate_numeric(&mut df, "sal", &names(&["sal_texto", "sal"])).unwrap();
        assert_eq!(f64_values(&df, "sal").unwrap(), vec![Some(0.8), Some(2.0)]);
    }

    #[test]
    fn test_completeness_by_source() {
        let df = df!(
            "source" => &["alcampo", "alcampo", "openfoodfacts"],
            "sal" => &[Some(1.0), None, Some(0.5)]
        )
        .unwrap();

        let report = nutrition_completeness_by_source(&df).unwrap();
        assert_eq!(report["alcampo"]["sal"], "1/2");
        assert_eq!(report["openfoodfacts"]["sal"], "1/1");
    }
}
