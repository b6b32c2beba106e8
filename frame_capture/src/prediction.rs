use crate::camera::{Camera, CameraError};
use crate::config::CaptureConfig;
use crate::telemetry::Metrics;
use image_classifier::{ClassifierEvent, ClassifierService, ImageClassifierHelper};
use std::sync::Arc;
use tokio::{
    sync::{broadcast, mpsc},
    task::JoinHandle,
    time::{interval, Duration, MissedTickBehavior},
};

/// Owns the classifier helper and hands it one camera frame per poll
/// interval.
pub struct ClassificationPoller<S: ClassifierService> {
    helper: ImageClassifierHelper<S>,
    camera: Camera,
    metrics: Arc<Metrics>,
    poll_interval_ms: u64,
    max_consecutive_failures: u64,
}

impl<S: ClassifierService> ClassificationPoller<S> {
    pub fn new(
        helper: ImageClassifierHelper<S>,
        camera: Camera,
        metrics: Arc<Metrics>,
        capture_config: &CaptureConfig,
    ) -> Self {
        Self {
            helper,
            camera,
            metrics,
            poll_interval_ms: capture_config.get_prediction_delay_ms(),
            max_consecutive_failures: capture_config.max_consecutive_failures,
        }
    }

    pub fn run(mut self, mut shutdown_rx: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(Duration::from_millis(self.poll_interval_ms));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut consecutive_failures = 0;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(err) = self.poll_and_classify() {
                            consecutive_failures += 1;
                            tracing::warn!(
                                "Frame capture failed ({}/{} consecutive failures): {}",
                                consecutive_failures,
                                self.max_consecutive_failures,
                                err
                            );
                            if consecutive_failures >= self.max_consecutive_failures {
                                tracing::error!(
                                    "Persistent failure detected. Exiting polling loop"
                                );
                                break;
                            }
                        } else {
                            consecutive_failures = 0;
                        }
                    },
                    _ = shutdown_rx.recv() => {
                        tracing::info!("Camera polling received shutdown signal");
                        break;
                    }
                }
            }
            tracing::info!("Camera polling stopped");
        })
    }

    /// Returns whether the frame reached a classifier. A failed build is
    /// reported by the helper's listener, not as a capture failure.
    fn poll_and_classify(&mut self) -> Result<bool, CameraError> {
        let frame = self.camera.capture_frame()?;
        self.helper.classify(frame);
        if !self.helper.has_classifier() {
            return Ok(false);
        }
        self.metrics.record_frame_submitted();
        Ok(true)
    }
}

/// Drains classifier events into logs and metrics.
pub struct EventLogger {
    metrics: Arc<Metrics>,
}

impl EventLogger {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self { metrics }
    }

    pub fn run(
        self,
        mut events_rx: mpsc::UnboundedReceiver<ClassifierEvent>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    event = events_rx.recv() => match event {
                        Some(event) => self.handle(event),
                        None => break,
                    },
                    _ = shutdown_rx.recv() => break,
                }
            }
            tracing::info!("Classifier event logger stopped");
        })
    }

    fn handle(&self, event: ClassifierEvent) {
        match event {
            ClassifierEvent::Results {
                results,
                inference_time_ms,
            } => {
                let top = results.top();
                tracing::info!(
                    timestamp_ms = results.timestamp_ms,
                    inference_time_ms,
                    top_label = top.map(|c| c.label.as_str()).unwrap_or("none"),
                    top_score = top.map(|c| c.score).unwrap_or(0.0),
                    "Classified frame"
                );
                for (i, category) in results.categories.iter().enumerate() {
                    tracing::debug!(
                        "Category {}: index={}, label={}, score={:.3}",
                        i,
                        category.index,
                        category.label,
                        category.score
                    );
                }
                self.metrics
                    .record_result(inference_time_ms, top.map(|c| c.label.as_str()));
            }
            ClassifierEvent::Error(error) => {
                tracing::error!("Classifier error: {}", error);
                self.metrics.record_error();
            }
        }
    }
}
