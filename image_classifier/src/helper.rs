use crate::{
    classification::ClassifierResult,
    config::ClassifierConfig,
    frame::Frame,
    listener::ClassifierListener,
    model_service::{
        BaseOptions, ClassifierError, ClassifierHandle, ClassifierOptions, ClassifierService,
        ImageProcessingOptions,
    },
};
use std::{sync::Arc, time::Instant};

pub const INIT_ERROR_MESSAGE: &str =
    "Image classifier failed to initialize. See error logs for details";
const UNKNOWN_ERROR_MESSAGE: &str = "An unknown error has occurred";

#[derive(Debug, Clone, Copy)]
struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

/// Configures a classifier from [`ClassifierConfig`], feeds it frames and
/// relays its results and errors to a [`ClassifierListener`].
///
/// The classifier is built lazily on the first `classify` call and kept
/// until `invalidate` is called. Mutating `config` does not rebuild it.
pub struct ImageClassifierHelper<S: ClassifierService> {
    pub config: ClassifierConfig,
    service: S,
    listener: Option<Arc<dyn ClassifierListener>>,
    classifier: Option<S::Handle>,
    clock: MonotonicClock,
    last_timestamp_ms: Option<u64>,
}

impl<S: ClassifierService> ImageClassifierHelper<S> {
    pub fn new(
        config: ClassifierConfig,
        service: S,
        listener: Option<Arc<dyn ClassifierListener>>,
    ) -> Self {
        Self {
            config,
            service,
            listener,
            classifier: None,
            clock: MonotonicClock::new(),
            last_timestamp_ms: None,
        }
    }

    pub fn has_classifier(&self) -> bool {
        self.classifier.is_some()
    }

    /// Drops the current classifier. The next `classify` rebuilds it from
    /// the current config.
    pub fn invalidate(&mut self) {
        self.classifier = None;
    }

    /// Replaces the classifier with one built from the current config. On
    /// failure the classifier is left absent and the listener is notified.
    pub fn setup_classifier(&mut self) {
        self.classifier = None;

        let options = self.build_options();
        match self.service.create_from_options(options) {
            Ok(classifier) => {
                tracing::info!(
                    model = %self.config.model_name,
                    delegate = self.config.delegate.as_str(),
                    threshold = self.config.threshold,
                    max_results = self.config.max_results,
                    "Image classifier initialized"
                );
                self.classifier = Some(classifier);
            }
            Err(err) => {
                tracing::error!("Failed to load model with error: {}", err);
                self.notify_error(INIT_ERROR_MESSAGE.to_string());
            }
        }
    }

    /// Submits `frame` for classification and returns without waiting for
    /// the result. The frame is consumed and released before returning.
    pub fn classify<B: AsRef<[u8]>>(&mut self, frame: Frame<B>) {
        if self.classifier.is_none() {
            self.setup_classifier();
        }
        if self.classifier.is_none() {
            return;
        }

        let image = frame.to_rgb_image();
        let processing_options = ImageProcessingOptions {
            rotation_degrees: frame.rotation_degrees,
        };
        drop(frame);

        let image = match image {
            Ok(image) => image,
            Err(err) => {
                tracing::warn!("Dropping frame: {}", err);
                self.notify_error(err.to_string());
                return;
            }
        };

        let timestamp_ms = self.next_timestamp_ms();
        if let Some(classifier) = &self.classifier {
            tracing::debug!(
                "Submitting {}x{} frame at {} ms",
                image.width(),
                image.height(),
                timestamp_ms
            );
            classifier.classify_async(image, processing_options, timestamp_ms);
        }
    }

    fn build_options(&self) -> ClassifierOptions {
        let clock = self.clock;
        let result_target = self.listener.clone();
        let error_target = self.listener.clone();

        ClassifierOptions {
            base_options: BaseOptions {
                model_asset_path: self.config.model_name.clone(),
                delegate: self.config.delegate,
            },
            score_threshold: self.config.threshold,
            max_results: self.config.max_results,
            num_threads: self.config.num_threads,
            result_listener: Arc::new(move |result: ClassifierResult| {
                let inference_time_ms = clock.now_ms().saturating_sub(result.timestamp_ms);
                if let Some(listener) = &result_target {
                    listener.on_results(result, inference_time_ms);
                }
            }),
            error_listener: Arc::new(move |error: ClassifierError| {
                let mut message = error.to_string();
                if message.is_empty() {
                    message = UNKNOWN_ERROR_MESSAGE.to_string();
                }
                if let Some(listener) = &error_target {
                    listener.on_error(message);
                }
            }),
        }
    }

    // Live stream classifiers reject timestamps that do not increase.
    fn next_timestamp_ms(&mut self) -> u64 {
        let now = self.clock.now_ms();
        let timestamp_ms = match self.last_timestamp_ms {
            Some(last) if now <= last => last + 1,
            _ => now,
        };
        self.last_timestamp_ms = Some(timestamp_ms);
        timestamp_ms
    }

    fn notify_error(&self, message: String) {
        if let Some(listener) = &self.listener {
            listener.on_error(message);
        }
    }
}
