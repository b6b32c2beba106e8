mod classification;
mod frame;
mod helper;
mod labels;
mod listener;
mod model_service;
mod ort_service;

pub mod config;

pub use classification::{rank_categories, Category, ClassifierResult};
pub use config::{ClassifierConfig, Delegate, ModelSettings};
pub use frame::{Frame, FrameError, PixelFormat};
pub use helper::{ImageClassifierHelper, INIT_ERROR_MESSAGE};
pub use labels::load_labels;
pub use listener::{ChannelListener, ClassifierEvent, ClassifierListener};
pub use model_service::{
    BaseOptions, ClassifierError, ClassifierHandle, ClassifierOptions, ClassifierService,
    ErrorListener, ImageProcessingOptions, ResultListener,
};
pub use ort_service::{OrtClassifier, OrtClassifierService};
