use anyhow::Result;
use polars::prelude::*;
use tracing::{debug, info, warn};

use super::columns::{f64_values, has_column, set_f64, set_str, str_values};
use super::json_flattener::PRICE_COLUMNS;
use super::units::{canonical_unit, round_to};

const WEIGHT_COLUMN: &str = "weight_volume_clean";
const UNIT_COLUMN: &str = "weight_unit";

/// Unit, price and weight normalization on the product table.
pub struct ValueNormalizer;

impl ValueNormalizer {
    pub fn new() -> Self {
        ValueNormalizer
    }

    pub fn normalize_all(&self, df: &mut DataFrame) -> Result<()> {
        self.normalize_weight_volume_units(df)?;
        self.normalize_prices(df)?;
        self.calculate_price_per_quantity(df)?;
        self.add_weight_in_kg(df)?;
        Ok(())
    }

    /// Rewrites known units to g/ml, scaling the magnitude.
    pub fn normalize_weight_volume_units(&self, df: &mut DataFrame) -> Result<usize> {
        if !has_column(df, WEIGHT_COLUMN) || !has_column(df, UNIT_COLUMN) {
            warn!("Weight/volume columns not found");
            return Ok(0);
        }

        let mut values = f64_values(df, WEIGHT_COLUMN)?;
        let mut units = str_values(df, UNIT_COLUMN)?;
        let mut normalized = 0;

        for (value, unit) in values.iter_mut().zip(units.iter_mut()) {
            let (Some(magnitude), Some(unit_name)) = (value.as_mut(), unit.as_mut()) else {
                continue;
            };

            match canonical_unit(unit_name) {
                Some((canonical, factor)) => {
                    if unit_name.as_str() != canonical || factor != 1.0 {
                        normalized += 1;
                    }
                    *magnitude = round_to(*magnitude * factor, 6);
                    *unit_name = canonical.to_string();
                }
                None => debug!("Unknown unit {:?}", unit_name),
            }
        }

        set_f64(df, WEIGHT_COLUMN, values)?;
        set_str(df, UNIT_COLUMN, units)?;
        info!("Normalized units for {} products", normalized);
        Ok(normalized)
    }

    /// Negative prices become null; the rest are rounded to cents.
    pub fn normalize_prices(&self, df: &mut DataFrame) -> Result<()> {
        for column in PRICE_COLUMNS {
            if !has_column(df, column) {
                continue;
            }

            let values: Vec<Option<f64>> = f64_values(df, column)?
                .into_iter()
                .map(|v| v.filter(|p| *p >= 0.0).map(|p| round_to(p, 2)))
                .collect();
            set_f64(df, column, values)?;
        }
        Ok(())
    }

    /// Fills `precio_por_cantidad` (price per 100 g/ml) from the total price and weight.
    pub fn calculate_price_per_quantity(&self, df: &mut DataFrame) -> Result<usize> {
        let required = [PRICE_COLUMNS[0], PRICE_COLUMNS[1], WEIGHT_COLUMN, UNIT_COLUMN];
        if !required.iter().all(|c| has_column(df, c)) {
            warn!("Missing columns for price per quantity");
            return Ok(0);
        }

        let totals = f64_values(df, PRICE_COLUMNS[0])?;
        let mut per_quantity = f64_values(df, PRICE_COLUMNS[1])?;
        let weights = f64_values(df, WEIGHT_COLUMN)?;
        let units = str_values(df, UNIT_COLUMN)?;
        let mut calculated = 0;

        for (i, slot) in per_quantity.iter_mut().enumerate() {
            if slot.is_some() {
                continue;
            }
            let metric_unit = matches!(units[i].as_deref(), Some("g") | Some("ml"));
            if let (Some(total), Some(weight), true) = (totals[i], weights[i], metric_unit) {
                if weight > 0.0 {
                    *slot = Some(round_to(total / weight * 100.0, 2));
                    calculated += 1;
                }
            }
        }

        set_f64(df, PRICE_COLUMNS[1], per_quantity)?;
        info!("Calculated price per 100 g/ml for {} products", calculated);
        Ok(calculated)
    }

    /// `peso_en_kg`, treating 1 ml as 1 g.
    pub fn add_weight_in_kg(&self, df: &mut DataFrame) -> Result<()> {
        let height = df.height();
        if !has_column(df, WEIGHT_COLUMN) || !has_column(df, UNIT_COLUMN) {
            warn!("Weight/volume columns not found");
            return set_f64(df, "peso_en_kg", vec![None; height]);
        }

        let weights = f64_values(df, WEIGHT_COLUMN)?;
        let units = str_values(df, UNIT_COLUMN)?;
        let kg: Vec<Option<f64>> = weights
            .iter()
            .zip(units.iter())
            .map(|(weight, unit)| match (weight, unit.as_deref()) {
                (Some(w), Some("g") | Some("ml")) => Some(round_to(w / 1000.0, 3)),
                _ => None,
            })
            .collect();

        set_f64(df, "peso_en_kg", kg)
    }
}
