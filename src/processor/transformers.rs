use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::warn;

use super::field_extractors::{
    TextField, clean_off_title, extract_serving_count, first_text, first_text_field, text_field,
};
use super::numeric::clean_numeric_value;
use super::nutrition::NutritionStandardizer;
use super::units::parse_weight_volume;
use crate::config::NutritionConfig;
use crate::error::{TransformError, json_type_name};
use crate::models::{Source, UnifiedProduct};

/// Maps one raw source record onto the unified product schema.
pub trait SourceTransformer: Send + Sync {
    fn source(&self) -> Source;

    fn transform(&self, record: &Value) -> Result<UnifiedProduct, TransformError>;
}

fn as_record(source: Source, record: &Value) -> Result<&Map<String, Value>, TransformError> {
    record.as_object().ok_or_else(|| TransformError::NotAnObject {
        data_source: source,
        found: json_type_name(record),
    })
}

fn warn_missing_identity(product: &UnifiedProduct) {
    if product.url.is_none() {
        warn!(
            "{} record without url (title: {:?})",
            product.source, product.title
        );
    }
    if product.title.is_none() {
        warn!("{} record without title (url: {:?})", product.source, product.url);
    }
}

pub struct AlcampoTransformer {
    standardizer: NutritionStandardizer,
}

impl AlcampoTransformer {
    pub fn new(config: &NutritionConfig) -> Self {
        Self {
            standardizer: NutritionStandardizer::new(config.clone()),
        }
    }
}

impl SourceTransformer for AlcampoTransformer {
    fn source(&self) -> Source {
        Source::Alcampo
    }

    fn transform(&self, record: &Value) -> Result<UnifiedProduct, TransformError> {
        let fields = as_record(Source::Alcampo, record)?;
        let mut product = UnifiedProduct::new(Source::Alcampo);

        product.url = text_field(fields, "url");
        product.title = text_field(fields, "nombre");
        product.nutrition_per_100 = Some(
            self.standardizer
                .standardize(Source::Alcampo, fields.get("nutricion").unwrap_or(&Value::Null)),
        );

        if let Some(details) = fields.get("caracteristicas").and_then(Value::as_object) {
            product.description = text_field(details, "denominacion_legal");
            product.origin = first_text(details, &["pais_origen", "lugar_procedencia"]);
            product.manufacturing_address = text_field(details, "direccion_operador");
            product.operator_name = text_field(details, "nombre_operador");
            product.serving_count = extract_serving_count(details.get("numero_raciones"));
        }

        product.total_price = fields.get("precio").and_then(clean_numeric_value);
        product.price_per_quantity = fields.get("precio_por_unidad").and_then(clean_numeric_value);
        product.weight_volume = fields.get("unidad").and_then(parse_weight_volume);
        product.stores = Some(vec!["Alcampo".to_string()]);

        warn_missing_identity(&product);
        Ok(product)
    }
}

pub struct OpenFoodFactsTransformer {
    standardizer: NutritionStandardizer,
}

impl OpenFoodFactsTransformer {
    pub fn new(config: &NutritionConfig) -> Self {
        Self {
            standardizer: NutritionStandardizer::new(config.clone()),
        }
    }
}

impl SourceTransformer for OpenFoodFactsTransformer {
    fn source(&self) -> Source {
        Source::OpenFoodFacts
    }

    fn transform(&self, record: &Value) -> Result<UnifiedProduct, TransformError> {
        let fields = as_record(Source::OpenFoodFacts, record)?;
        let mut product = UnifiedProduct::new(Source::OpenFoodFacts);

        product.url = text_field(fields, "URL");
        product.title = text_field(fields, "titulo").and_then(|t| clean_off_title(&t));
        product.nutrition_per_100 = Some(self.standardizer.standardize(
            Source::OpenFoodFacts,
            fields
                .get("valores_nutricionales_100_g")
                .unwrap_or(&Value::Null),
        ));

        if let Some(details) = fields.get("descripcion").and_then(Value::as_object) {
            product.description =
                first_text(details, &["denominación general", "denominacion_general"]);
            product.categories = TextField::from_value(details.get("categorias")).into_list();
            product.origin = first_text_field(
                details,
                &[
                    "paises_de_venta",
                    "países_de_venta",
                    "lugares_de_fabricación_o_de_transformación",
                    "lugares_de_fabricacion_o_de_transformacion",
                ],
            )
            .into_text();
            product.brands = TextField::from_value(details.get("marcas")).into_text();
            product.stores = TextField::from_value(details.get("tiendas")).into_list();
            product.certifications =
                TextField::from_value(details.get("sellos, certificados de calidad, premios"))
                    .into_list();
        }

        product.weight_volume = fields.get("peso_volumen").and_then(parse_weight_volume);
        product.allergens = TextField::from_value(fields.get("alergenos")).into_list();

        warn_missing_identity(&product);
        Ok(product)
    }
}

/// Registered transformers keyed by source.
pub struct TransformerRegistry {
    transformers: HashMap<Source, Box<dyn SourceTransformer>>,
}

impl TransformerRegistry {
    pub fn new(config: &NutritionConfig) -> Self {
        let mut registry = Self {
            transformers: HashMap::new(),
        };

        registry.register(Box::new(AlcampoTransformer::new(config)));
        registry.register(Box::new(OpenFoodFactsTransformer::new(config)));
        registry
    }

    pub fn register(&mut self, transformer: Box<dyn SourceTransformer>) {
        self.transformers.insert(transformer.source(), transformer);
    }

    pub fn get(&self, source: Source) -> Option<&dyn SourceTransformer> {
        self.transformers.get(&source).map(|t| t.as_ref())
    }

    pub fn transform(&self, source: Source, record: &Value) -> Result<UnifiedProduct, TransformError> {
        self.get(source)
            .ok_or(TransformError::UnsupportedSource(source))?
            .transform(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WeightVolume;
    use serde_json::json;

    fn registry() -> TransformerRegistry {
        TransformerRegistry::new(&NutritionConfig::default())
    }

    #[test]
    fn test_alcampo_record() {
        let record = json!({
            "url": "https://www.alcampo.es/compra-online/leche-entera",
            "nombre": "Leche entera PASCUAL 1 l.",
            "nutricion": {"valor_energetico_kcal": "65", "grasas_g": "3,6", "sal_g": "0,13"},
            "caracteristicas": {
                "denominacion_legal": "Leche entera UHT",
                "pais_origen": null,
                "lugar_procedencia": "España",
                "direccion_operador": "Ctra. de Palencia, Burgos",
                "nombre_operador": "Leche Pascual S.A.",
                "numero_raciones": "4,0"
            },
            "precio": "1,15 €",
            "precio_por_unidad": "1,15 €/l",
            "unidad": "1 l"
        });

        let product = registry().transform(Source::Alcampo, &record).unwrap();

        assert_eq!(product.source, Source::Alcampo);
        assert_eq!(product.title.as_deref(), Some("Leche entera PASCUAL 1 l."));
        let nutrition = product.nutrition_per_100.unwrap();
        assert_eq!(nutrition.energy_kcal, Some(65.0));
        assert_eq!(nutrition.fat_g, Some(3.6));
        assert_eq!(nutrition.salt_g, Some(0.13));
        assert_eq!(product.description.as_deref(), Some("Leche entera UHT"));
        assert_eq!(product.origin.as_deref(), Some("España"));
        assert_eq!(product.operator_name.as_deref(), Some("Leche Pascual S.A."));
        assert_eq!(product.serving_count, Some(4));
        assert_eq!(product.total_price, Some(1.15));
        assert_eq!(product.price_per_quantity, Some(1.15));
        assert_eq!(product.weight_volume, Some(WeightVolume(1000.0, "ml".to_string())));
        assert_eq!(product.stores, Some(vec!["Alcampo".to_string()]));
        assert_eq!(product.allergens, None);
        assert_eq!(product.brands, None);
    }

    #[test]
    fn test_openfood_record() {
        let record = json!({
            "URL": "https://es.openfoodfacts.org/producto/8410128000011",
            "titulo": "Yogur natural – Open Food Facts",
            "valores_nutricionales_100_g": {"energia": "257 kJ (61 kcal)", "proteinas": "3,5 g"},
            "descripcion": {
                "denominación general": "Yogur natural",
                "categorias": "Lácteos, Yogures",
                "países_de_venta": ["España", "Francia"],
                "marcas": ["Danone"],
                "tiendas": "Carrefour, Mercadona",
                "sellos, certificados de calidad, premios": "Punto verde"
            },
            "peso_volumen": "125 g",
            "alergenos": "Leche"
        });

        let product = registry()
            .transform(Source::OpenFoodFacts, &record)
            .unwrap();

        assert_eq!(product.title.as_deref(), Some("Yogur natural"));
        let nutrition = product.nutrition_per_100.unwrap();
        assert_eq!(nutrition.energy_kj, Some(257.0));
        assert_eq!(nutrition.energy_kcal, Some(61.0));
        assert_eq!(nutrition.proteins_g, Some(3.5));
        assert_eq!(product.description.as_deref(), Some("Yogur natural"));
        assert_eq!(
            product.categories,
            Some(vec!["Lácteos".to_string(), "Yogures".to_string()])
        );
        assert_eq!(product.origin.as_deref(), Some("España, Francia"));
        assert_eq!(product.brands.as_deref(), Some("Danone"));
        assert_eq!(
            product.stores,
            Some(vec!["Carrefour".to_string(), "Mercadona".to_string()])
        );
        assert_eq!(product.certifications, Some(vec!["Punto verde".to_string()]));
        assert_eq!(product.weight_volume, Some(WeightVolume(125.0, "g".to_string())));
        assert_eq!(product.allergens, Some(vec!["Leche".to_string()]));
        assert_eq!(product.total_price, None);
        assert_eq!(product.serving_count, None);
    }

    #[test]
    fn test_blank_url_is_missing() {
        let record = json!({"URL": "", "titulo": "Galletas", "valores_nutricionales_100_g": {}});
        let product = registry()
            .transform(Source::OpenFoodFacts, &record)
            .unwrap();

        assert_eq!(product.url, None);
        assert_eq!(product.title.as_deref(), Some("Galletas"));
        assert!(product.nutrition_per_100.is_some());
    }

    #[test]
    fn test_non_object_record_is_an_error() {
        let err = registry()
            .transform(Source::Alcampo, &json!("not a record"))
            .unwrap_err();
        assert_eq!(
            err,
            TransformError::NotAnObject {
                data_source: Source::Alcampo,
                found: "string"
            }
        );
    }

    #[test]
    fn test_unknown_source_has_no_transformer() {
        let err = registry()
            .transform(Source::Unknown, &json!({}))
            .unwrap_err();
        assert_eq!(err, TransformError::UnsupportedSource(Source::Unknown));
    }
}
