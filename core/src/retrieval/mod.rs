//! Adapter between assembled swaths and externally trained retrieval models.

pub mod adapter;
pub mod model;
pub mod scaler;

pub use adapter::{
    water_content, FeatureSpec, FeatureTransform, OutputSpec, RetrievalAdapter,
    WATER_CONTENT_FIELD,
};
pub use model::{LinearModel, Predictor};
pub use scaler::StandardScaler;
