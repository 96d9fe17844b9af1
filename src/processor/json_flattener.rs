use anyhow::{Result, anyhow};
use polars::prelude::*;
use serde_json::Value;
use tracing::{info, warn};

use crate::models::{Nutrient, UnifiedProduct};

/// Text columns of the flattened product table, in output order.
pub const TEXT_COLUMNS: [&str; 13] = [
    "source",
    "product_name",
    "url",
    "descripcion",
    "country",
    "weight_unit",
    "categorias",
    "alergenos",
    "marcas",
    "tiendas",
    "certificaciones",
    "nombre_operador",
    "direccion_manufactura",
];

pub const PRICE_COLUMNS: [&str; 2] = ["precio_total", "precio_por_cantidad"];

fn join_list(items: &Option<Vec<String>>) -> Option<String> {
    items
        .as_ref()
        .filter(|items| !items.is_empty())
        .map(|items| items.join(", "))
}

/// One row of the product table before it becomes columns.
#[derive(Debug, Clone, Default)]
struct ProductRow {
    text: Vec<Option<String>>,
    total_price: Option<f64>,
    price_per_quantity: Option<f64>,
    weight_volume: Option<f64>,
    serving_count: Option<i64>,
    nutrients: Vec<Option<f64>>,
}

pub struct JsonFlattener;

impl JsonFlattener {
    pub fn new() -> Self {
        JsonFlattener
    }

    /// Flattens unified products given in their JSON form.
    pub fn flatten_values(&self, json_data: &[Value]) -> Result<DataFrame> {
        let mut products = Vec::with_capacity(json_data.len());
        let mut failed_count = 0;

        for (index, item) in json_data.iter().enumerate() {
            match serde_json::from_value::<UnifiedProduct>(item.clone()) {
                Ok(product) => products.push(product),
                Err(e) => {
                    failed_count += 1;
                    warn!("Failed to read unified product at index {}: {}", index, e);
                    if let Some(title) = item.get("titulo").and_then(|v| v.as_str()) {
                        warn!("Failed product title: {}", title);
                    }
                }
            }
        }

        info!(
            "Unified record summary: {} readable, {} failed out of {} total",
            products.len(),
            failed_count,
            json_data.len()
        );

        self.flatten_to_dataframe(&products)
    }

    pub fn flatten_to_dataframe(&self, products: &[UnifiedProduct]) -> Result<DataFrame> {
        let records: Vec<ProductRow> = products.iter().map(|p| self.to_row(p)).collect();
        let df = self.records_to_dataframe(records)?;
        info!("Flattened {} products into {} columns", df.height(), df.width());
        Ok(df)
    }

    fn to_row(&self, product: &UnifiedProduct) -> ProductRow {
        let weight_unit = product.weight_volume.as_ref().map(|wv| wv.unit().to_string());

        let text = vec![
            Some(product.source.as_str().to_string()),
            product.title.clone(),
            product.url.clone(),
            product.description.clone(),
            product.origin.clone(),
            weight_unit,
            join_list(&product.categories),
            join_list(&product.allergens),
            product.brands.clone(),
            join_list(&product.stores),
            join_list(&product.certifications),
            product.operator_name.clone(),
            product.manufacturing_address.clone(),
        ];

        let nutrients = match &product.nutrition_per_100 {
            Some(facts) => Nutrient::ALL.iter().map(|n| facts.get(*n)).collect(),
            None => vec![None; Nutrient::ALL.len()],
        };

        ProductRow {
            text,
            total_price: product.total_price,
            price_per_quantity: product.price_per_quantity,
            weight_volume: product.weight_volume.as_ref().map(|wv| wv.magnitude()),
            serving_count: product.serving_count,
            nutrients,
        }
    }

    fn records_to_dataframe(&self, records: Vec<ProductRow>) -> Result<DataFrame> {
        let mut columns: Vec<Column> = Vec::new();

        for (i, field) in TEXT_COLUMNS.iter().enumerate() {
            let values: Vec<Option<String>> = records.iter().map(|r| r.text[i].clone()).collect();
            columns.push(Column::new((*field).into(), values));
        }

        let total_price: Vec<Option<f64>> = records.iter().map(|r| r.total_price).collect();
        let price_per_quantity: Vec<Option<f64>> =
            records.iter().map(|r| r.price_per_quantity).collect();
        let weight: Vec<Option<f64>> = records.iter().map(|r| r.weight_volume).collect();
        let servings: Vec<Option<i64>> = records.iter().map(|r| r.serving_count).collect();

        columns.push(Column::new(PRICE_COLUMNS[0].into(), total_price));
        columns.push(Column::new(PRICE_COLUMNS[1].into(), price_per_quantity));
        columns.push(Column::new("weight_volume_clean".into(), weight));
        columns.push(Column::new("numero_raciones".into(), servings));

        for (i, nutrient) in Nutrient::ALL.iter().enumerate() {
            let values: Vec<Option<f64>> = records.iter().map(|r| r.nutrients[i]).collect();
            columns.push(Column::new(nutrient.column().into(), values));
        }

        DataFrame::new(columns).map_err(|e| anyhow!("Failed to create DataFrame: {}", e))
    }
}
