//! Feature preprocessing
//!
//! Imputation, scaling and one-hot encoding combined into a single fitted
//! transform, plus the stage that fits it on the training partition.

mod encoder;
mod imputer;
mod scaler;
mod schema;
mod stage;
mod transform;

pub use encoder::OneHotEncoder;
pub use imputer::{ImputeStrategy, ImputeValue, Imputer};
pub use scaler::Scaler;
pub use schema::FeatureSchema;
pub use stage::{DataTransformation, SchemaSource, TransformationArtifacts, TransformationConfig};
pub use transform::PreprocessingTransform;
