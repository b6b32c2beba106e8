use crate::{
    classification::{rank_categories, Category, ClassifierResult},
    config::{Delegate, ModelSettings, TensorLayout},
    labels::load_labels,
    model_service::{
        ClassifierError, ClassifierHandle, ClassifierOptions, ClassifierService, ErrorListener,
        ImageProcessingOptions, ResultListener,
    },
};
use image::{imageops, imageops::FilterType, RgbImage};
use ndarray::{Array, Ix4};
use ort::{
    execution_providers::{CPUExecutionProvider, CUDAExecutionProvider},
    session::{builder::GraphOptimizationLevel, Session},
    value::TensorRef,
};
use parking_lot::Mutex;
use std::{cell::Cell, path::Path, sync::Arc};
use tokio::runtime::Handle;

fn rotate_image(image: RgbImage, rotation_degrees: i32) -> RgbImage {
    match rotation_degrees.rem_euclid(360) {
        90 => imageops::rotate90(&image),
        180 => imageops::rotate180(&image),
        270 => imageops::rotate270(&image),
        _ => image,
    }
}

fn transform_image(image: &RgbImage, settings: &ModelSettings) -> Array<f32, Ix4> {
    let (width, height) = (settings.input_width, settings.input_height);
    let img = imageops::resize(image, width, height, FilterType::Triangle);

    let shape = match settings.layout {
        TensorLayout::Nchw => (1, 3, height as usize, width as usize),
        TensorLayout::Nhwc => (1, height as usize, width as usize, 3),
    };
    let mut input = Array::zeros(shape);
    for (x, y, pixel) in img.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        for (c, value) in pixel.0.iter().enumerate() {
            let normalized = (*value as f32 / 255. - settings.mean[c]) / settings.std[c];
            match settings.layout {
                TensorLayout::Nchw => input[[0, c, y, x]] = normalized,
                TensorLayout::Nhwc => input[[0, y, x, c]] = normalized,
            }
        }
    }

    input
}

fn build_session(
    model_path: &Path,
    delegate: Delegate,
    num_threads: usize,
) -> Result<Session, ort::Error> {
    let execution_provider = match delegate {
        Delegate::Cpu => CPUExecutionProvider::default().build(),
        Delegate::Gpu => CUDAExecutionProvider::default().build().error_on_failure(),
    };

    let session = Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_intra_threads(num_threads)?
        .with_execution_providers([execution_provider])?
        .commit_from_file(model_path)?;

    Ok(session)
}

/// Runs ONNX image classification models through ONNX Runtime.
#[derive(Clone)]
pub struct OrtClassifierService {
    settings: Arc<ModelSettings>,
    runtime: Handle,
}

impl OrtClassifierService {
    pub fn new(settings: ModelSettings, runtime: Handle) -> Result<Self, ClassifierError> {
        settings.validate().map_err(ClassifierError::InvalidOptions)?;

        Ok(Self {
            settings: Arc::new(settings),
            runtime,
        })
    }
}

impl ClassifierService for OrtClassifierService {
    type Handle = OrtClassifier;

    fn create_from_options(
        &self,
        options: ClassifierOptions,
    ) -> Result<OrtClassifier, ClassifierError> {
        options.validate()?;

        let model_path = self
            .settings
            .get_model_path(&options.base_options.model_asset_path);
        if !model_path.exists() {
            return Err(ClassifierError::ModelNotFound(model_path));
        }

        let labels = match self.settings.get_labels_path() {
            Some(labels_path) => load_labels(&labels_path)?,
            None => Vec::new(),
        };

        let session = build_session(
            &model_path,
            options.base_options.delegate,
            options.num_threads,
        )?;

        tracing::info!(
            "Created ONNX session for {:?} on {} with {} labels",
            model_path,
            options.base_options.delegate.as_str(),
            labels.len()
        );

        Ok(OrtClassifier {
            model: Arc::new(OrtModel {
                session: Mutex::new(session),
                labels,
                settings: self.settings.clone(),
                score_threshold: options.score_threshold,
                max_results: options.max_results,
            }),
            result_listener: options.result_listener,
            error_listener: options.error_listener,
            runtime: self.runtime.clone(),
            guard: SubmissionGuard::default(),
        })
    }
}

struct OrtModel {
    session: Mutex<Session>,
    labels: Vec<String>,
    settings: Arc<ModelSettings>,
    score_threshold: f32,
    max_results: i32,
}

impl OrtModel {
    fn run_inference(&self, input: &Array<f32, Ix4>) -> Result<Vec<f32>, ClassifierError> {
        let mut session = self.session.lock();

        let tensor_ref = TensorRef::from_array_view(input.view())
            .map_err(|e| ClassifierError::Runtime(format!("failed to build tensor: {}", e)))?;

        let outputs = session
            .run(ort::inputs![tensor_ref])
            .map_err(|e| ClassifierError::Runtime(format!("inference failed: {}", e)))?;

        let (_shape, data) = outputs[self.settings.output_name.as_str()]
            .try_extract_tensor::<f32>()
            .map_err(|e| ClassifierError::Runtime(format!("failed to extract tensor: {}", e)))?;

        Ok(data.to_vec())
    }

    fn classify(
        &self,
        image: RgbImage,
        processing_options: ImageProcessingOptions,
    ) -> Result<Vec<Category>, ClassifierError> {
        let image = rotate_image(image, processing_options.rotation_degrees);
        let input = transform_image(&image, &self.settings);

        let mut scores = self.run_inference(&input)?;
        self.settings.activation.apply(&mut scores);

        Ok(rank_categories(
            &scores,
            &self.labels,
            self.score_threshold,
            self.max_results,
        ))
    }
}

/// Rejects submissions a live stream classifier cannot accept: rotations
/// that are not a multiple of 90 and timestamps that do not increase.
#[derive(Debug, Default)]
struct SubmissionGuard {
    last_timestamp_ms: Cell<Option<u64>>,
}

impl SubmissionGuard {
    fn check(
        &self,
        processing_options: &ImageProcessingOptions,
        timestamp_ms: u64,
    ) -> Result<(), ClassifierError> {
        if processing_options.rotation_degrees % 90 != 0 {
            return Err(ClassifierError::Runtime(format!(
                "Expected rotation to be a multiple of 90°, got {}.",
                processing_options.rotation_degrees
            )));
        }
        if let Some(last) = self.last_timestamp_ms.get() {
            if timestamp_ms <= last {
                return Err(ClassifierError::Runtime(
                    "Input timestamp must be monotonically increasing.".to_string(),
                ));
            }
        }
        self.last_timestamp_ms.set(Some(timestamp_ms));
        Ok(())
    }
}

/// A classifier handle backed by one ONNX session. Inference runs on the
/// tokio blocking pool.
pub struct OrtClassifier {
    model: Arc<OrtModel>,
    result_listener: ResultListener,
    error_listener: ErrorListener,
    runtime: Handle,
    guard: SubmissionGuard,
}

impl ClassifierHandle for OrtClassifier {
    fn classify_async(
        &self,
        image: RgbImage,
        processing_options: ImageProcessingOptions,
        timestamp_ms: u64,
    ) {
        if let Err(err) = self.guard.check(&processing_options, timestamp_ms) {
            (self.error_listener)(err);
            return;
        }

        let model = self.model.clone();
        let result_listener = self.result_listener.clone();
        let error_listener = self.error_listener.clone();

        self.runtime.spawn_blocking(move || {
            match model.classify(image, processing_options) {
                Ok(categories) => {
                    tracing::debug!(
                        "Classified frame {} with {} categories",
                        timestamp_ms,
                        categories.len()
                    );
                    result_listener(ClassifierResult {
                        categories,
                        timestamp_ms,
                    });
                }
                Err(err) => {
                    tracing::error!("Classification of frame {} failed: {}", timestamp_ms, err);
                    error_listener(err);
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model_service::BaseOptions;
    use image::Rgb;

    fn options(model_asset_path: &str, max_results: i32) -> ClassifierOptions {
        ClassifierOptions {
            base_options: BaseOptions {
                model_asset_path: model_asset_path.to_string(),
                delegate: Delegate::Cpu,
            },
            score_threshold: 0.1,
            max_results,
            num_threads: 1,
            result_listener: Arc::new(|_| {}),
            error_listener: Arc::new(|_| {}),
        }
    }

    #[test]
    fn test_transform_image_nchw() {
        let img = RgbImage::from_pixel(100, 50, Rgb([255, 0, 0]));
        let mut settings = ModelSettings::new(".");
        settings.mean = vec![0.0, 0.0, 0.0];
        settings.std = vec![1.0, 1.0, 1.0];

        let input = transform_image(&img, &settings);

        assert_eq!(input.shape(), &[1, 3, 224, 224]);
        assert_eq!(input[[0, 0, 10, 10]], 1.0);
        assert_eq!(input[[0, 1, 10, 10]], 0.0);
    }

    #[test]
    fn test_transform_image_nhwc_normalizes() {
        let img = RgbImage::from_pixel(8, 8, Rgb([0, 0, 255]));
        let mut settings = ModelSettings::new(".");
        settings.input_width = 4;
        settings.input_height = 2;
        settings.layout = TensorLayout::Nhwc;
        settings.mean = vec![0.5, 0.5, 0.5];
        settings.std = vec![0.5, 0.5, 0.5];

        let input = transform_image(&img, &settings);

        assert_eq!(input.shape(), &[1, 2, 4, 3]);
        assert_eq!(input[[0, 1, 3, 0]], -1.0);
        assert_eq!(input[[0, 1, 3, 2]], 1.0);
    }

    #[test]
    fn test_rotate_image_clockwise() {
        let mut img = RgbImage::new(3, 2);
        img.put_pixel(0, 0, Rgb([9, 9, 9]));

        let rotated = rotate_image(img.clone(), 90);
        assert_eq!(rotated.dimensions(), (2, 3));
        assert_eq!(rotated.get_pixel(1, 0), &Rgb([9, 9, 9]));

        let rotated = rotate_image(img.clone(), -90);
        assert_eq!(rotated.get_pixel(0, 2), &Rgb([9, 9, 9]));

        let rotated = rotate_image(img, 360);
        assert_eq!(rotated.dimensions(), (3, 2));
    }

    fn rotation(rotation_degrees: i32) -> ImageProcessingOptions {
        ImageProcessingOptions { rotation_degrees }
    }

    #[test]
    fn test_guard_rejects_repeated_timestamp() {
        let guard = SubmissionGuard::default();

        assert!(guard.check(&rotation(0), 10).is_ok());
        let err = guard.check(&rotation(0), 10).unwrap_err();

        assert_eq!(
            err.to_string(),
            "Input timestamp must be monotonically increasing."
        );
    }

    #[test]
    fn test_guard_rejects_decreasing_timestamp() {
        let guard = SubmissionGuard::default();

        assert!(guard.check(&rotation(0), 10).is_ok());
        assert!(guard.check(&rotation(0), 9).is_err());
        assert!(guard.check(&rotation(0), 11).is_ok());
        assert_eq!(guard.last_timestamp_ms.get(), Some(11));
    }

    #[test]
    fn test_guard_checks_rotation() {
        let guard = SubmissionGuard::default();

        let err = guard.check(&rotation(45), 1).unwrap_err();
        assert!(err.to_string().contains("multiple of 90"));
        assert!(guard.check(&rotation(-90), 2).is_ok());
        assert!(guard.check(&rotation(450), 3).is_ok());
    }

    #[test]
    fn test_rejected_submission_keeps_last_timestamp() {
        let guard = SubmissionGuard::default();
        assert!(guard.check(&rotation(0), 5).is_ok());

        assert!(guard.check(&rotation(45), 6).is_err());
        assert_eq!(guard.last_timestamp_ms.get(), Some(5));

        assert!(guard.check(&rotation(0), 4).is_err());
        assert_eq!(guard.last_timestamp_ms.get(), Some(5));

        assert!(guard.check(&rotation(90), 6).is_ok());
        assert_eq!(guard.last_timestamp_ms.get(), Some(6));
    }

    #[tokio::test]
    async fn test_create_fails_for_missing_model() {
        let service =
            OrtClassifierService::new(ModelSettings::new(std::env::temp_dir()), Handle::current())
                .unwrap();

        let result = service.create_from_options(options("no_such_model.onnx", 3));

        assert!(matches!(result, Err(ClassifierError::ModelNotFound(_))));
    }

    #[tokio::test]
    async fn test_create_fails_for_invalid_max_results() {
        let service =
            OrtClassifierService::new(ModelSettings::new(std::env::temp_dir()), Handle::current())
                .unwrap();

        let result = service.create_from_options(options("no_such_model.onnx", 0));

        assert!(matches!(result, Err(ClassifierError::InvalidOptions(_))));
    }

    #[tokio::test]
    async fn test_new_rejects_missing_labels_file() {
        let mut settings = ModelSettings::new(std::env::temp_dir());
        settings.labels_file = Some("no_such_labels.txt".to_string());

        let result = OrtClassifierService::new(settings, Handle::current());

        assert!(matches!(result, Err(ClassifierError::InvalidOptions(_))));
    }
}
