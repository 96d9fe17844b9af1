use thiserror::Error;

use crate::models::Source;

/// A single raw record could not be mapped onto the unified schema.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransformError {
    #[error("{data_source} record is not a JSON object (got {found})")]
    NotAnObject { data_source: Source, found: &'static str },

    #[error("no transformer registered for source {0}")]
    UnsupportedSource(Source),
}

/// Conditions that stop a pipeline run.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("no input source could be loaded")]
    NoInput,

    #[error("unification produced no valid products")]
    NoProducts,

    #[error("no rows left after {stage}")]
    EmptyTable { stage: String },
}

pub fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
