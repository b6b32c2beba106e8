use crate::{classification::ClassifierResult, config::Delegate};
use image::RgbImage;
use std::{fmt, path::PathBuf, sync::Arc};
use thiserror::Error;

pub type ResultListener = Arc<dyn Fn(ClassifierResult) + Send + Sync>;
pub type ErrorListener = Arc<dyn Fn(ClassifierError) + Send + Sync>;

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("Invalid classifier options: {0}")]
    InvalidOptions(String),
    #[error("Model file not found: {0:?}")]
    ModelNotFound(PathBuf),
    #[error("Failed to load labels: {0}")]
    Labels(#[from] std::io::Error),
    #[error("ONNX Runtime error: {0}")]
    Ort(#[from] ort::Error),
    #[error("{0}")]
    Runtime(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct BaseOptions {
    pub model_asset_path: String,
    pub delegate: Delegate,
}

#[derive(Clone)]
pub struct ClassifierOptions {
    pub base_options: BaseOptions,
    pub score_threshold: f32,
    /// `-1` keeps every category above the threshold.
    pub max_results: i32,
    pub num_threads: usize,
    pub result_listener: ResultListener,
    pub error_listener: ErrorListener,
}

impl fmt::Debug for ClassifierOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassifierOptions")
            .field("base_options", &self.base_options)
            .field("score_threshold", &self.score_threshold)
            .field("max_results", &self.max_results)
            .field("num_threads", &self.num_threads)
            .finish_non_exhaustive()
    }
}

impl ClassifierOptions {
    pub fn validate(&self) -> Result<(), ClassifierError> {
        if self.base_options.model_asset_path.is_empty() {
            return Err(ClassifierError::InvalidOptions(
                "model asset path must not be empty".to_string(),
            ));
        }
        if self.max_results == 0 || self.max_results < -1 {
            return Err(ClassifierError::InvalidOptions(format!(
                "max_results must be -1 or greater than 0, got {}",
                self.max_results
            )));
        }
        if !self.score_threshold.is_finite() {
            return Err(ClassifierError::InvalidOptions(format!(
                "score_threshold must be finite, got {}",
                self.score_threshold
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImageProcessingOptions {
    /// Clockwise rotation to apply before inference; a multiple of 90.
    pub rotation_degrees: i32,
}

/// Creates classifier handles from options.
pub trait ClassifierService: Send + Sync + 'static {
    type Handle: ClassifierHandle;

    fn create_from_options(
        &self,
        options: ClassifierOptions,
    ) -> Result<Self::Handle, ClassifierError>;
}

/// A live classifier. Submissions return immediately; the outcome is
/// delivered through the listeners registered in [`ClassifierOptions`].
pub trait ClassifierHandle: Send + 'static {
    fn classify_async(
        &self,
        image: RgbImage,
        processing_options: ImageProcessingOptions,
        timestamp_ms: u64,
    );
}
