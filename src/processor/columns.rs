use anyhow::Result;
use polars::prelude::*;

use crate::models::Nutrient;

pub fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_index(name).is_some()
}

pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Float64
            | DataType::Float32
            | DataType::Int64
            | DataType::Int32
            | DataType::Int16
            | DataType::Int8
            | DataType::UInt64
            | DataType::UInt32
            | DataType::UInt16
            | DataType::UInt8
    )
}

/// Values of `name` as `f64`; non-numeric entries become null.
pub fn f64_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let column = df.column(name)?.cast(&DataType::Float64)?;
    Ok(column.f64()?.into_iter().collect())
}

pub fn str_values(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let column = df.column(name)?.cast(&DataType::String)?;
    Ok(column
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect())
}

pub fn set_f64(df: &mut DataFrame, name: &str, values: Vec<Option<f64>>) -> Result<()> {
    df.with_column(Series::new(name.into(), values))?;
    Ok(())
}

pub fn set_str(df: &mut DataFrame, name: &str, values: Vec<Option<String>>) -> Result<()> {
    df.with_column(Series::new(name.into(), values))?;
    Ok(())
}

pub fn set_bool(df: &mut DataFrame, name: &str, values: Vec<bool>) -> Result<()> {
    df.with_column(Series::new(name.into(), values))?;
    Ok(())
}

/// Nutrient columns present in the table, in canonical order.
pub fn nutrient_columns(df: &DataFrame) -> Vec<Nutrient> {
    Nutrient::ALL
        .iter()
        .copied()
        .filter(|n| has_column(df, n.column()))
        .collect()
}

/// All nutrient values keyed by nutrient; absent columns read as all-null.
pub fn nutrient_table(df: &DataFrame) -> Result<Vec<(Nutrient, Vec<Option<f64>>)>> {
    let height = df.height();
    Nutrient::ALL
        .iter()
        .map(|n| {
            let values = if has_column(df, n.column()) {
                f64_values(df, n.column())?
            } else {
                vec![None; height]
            };
            Ok((*n, values))
        })
        .collect()
}

/// Keeps the rows where `keep` is true.
pub fn filter_rows(df: &DataFrame, keep: &[bool]) -> Result<DataFrame> {
    let mask = BooleanChunked::from_slice("keep".into(), keep);
    Ok(df.filter(&mask)?)
}
