pub mod cleaner;
pub mod columns;
pub mod consolidator;
pub mod feature_engineer;
pub mod field_extractors;
pub mod imputer;
pub mod json_flattener;
pub mod numeric;
pub mod nutrition;
pub mod product_validator;
pub mod quality;
pub mod scorer;
pub mod text_normalizer;
pub mod transformers;
pub mod unifier;
pub mod units;
pub mod value_normalizer;

pub use cleaner::{CleaningReport, DataCleaner};
pub use consolidator::Consolidator;
pub use feature_engineer::FeatureEngineer;
pub use imputer::Imputer;
pub use json_flattener::JsonFlattener;
pub use product_validator::ProductValidator;
pub use quality::{DataValidator, ValidationReport};
pub use scorer::NutritionScorer;
pub use text_normalizer::TextNormalizer;
pub use unifier::{MultiSourceUnifier, UnificationStats};
pub use value_normalizer::ValueNormalizer;
