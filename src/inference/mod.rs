//! Inference over persisted artifacts
//!
//! [`PredictionPipeline`] loads the fitted preprocessing transform and the
//! selected model once and scores JSON records or data frames with them.

mod pipeline;

pub use pipeline::{records_to_frame, ModelInfo, PredictionPipeline, Record};
