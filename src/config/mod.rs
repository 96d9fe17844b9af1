pub mod nutrition_config;
pub mod pipeline_config;
pub mod quality_config;

pub use nutrition_config::*;
pub use pipeline_config::*;
pub use quality_config::*;
