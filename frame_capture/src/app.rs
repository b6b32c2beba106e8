use crate::camera::Camera;
use crate::config::Config;
use crate::prediction::{ClassificationPoller, EventLogger};
use crate::telemetry::Metrics;

use image_classifier::{
    ChannelListener, ClassifierListener, ImageClassifierHelper, OrtClassifierService,
};
use std::{error::Error, sync::Arc};
use tokio::{runtime::Handle, signal, sync::broadcast};

pub async fn start_app(config: Config) -> Result<(), Box<dyn Error>> {
    let camera = match Camera::new(&config.capture) {
        Ok(camera) => camera,
        Err(e) => {
            tracing::error!("Failed to initialize camera: {}", e);
            return Err(Box::new(e));
        }
    };

    let classifier_service =
        match OrtClassifierService::new(config.model.clone(), Handle::current()) {
            Ok(service) => service,
            Err(e) => {
                tracing::error!("Failed to initialize classifier service: {}", e);
                return Err(Box::new(e));
            }
        };

    let metrics = Arc::new(Metrics::new().map_err(|e| e as Box<dyn Error>)?);
    let (listener, events_rx) = ChannelListener::new();

    let mut helper = ImageClassifierHelper::new(
        config.classifier.clone(),
        classifier_service,
        Some(Arc::new(listener) as Arc<dyn ClassifierListener>),
    );
    helper.setup_classifier();

    let (shutdown_tx, _) = broadcast::channel(1);
    let poller_shutdown_rx = shutdown_tx.subscribe();
    let logger_shutdown_rx = shutdown_tx.subscribe();

    let logger_handle = EventLogger::new(metrics.clone()).run(events_rx, logger_shutdown_rx);
    let mut poller_handle =
        ClassificationPoller::new(helper, camera, metrics.clone(), &config.capture)
            .run(poller_shutdown_rx);

    tokio::select! {
        _ = shutdown_signal() => {
            tracing::info!("Shutdown signal received, starting graceful shutdown.");
        }
        _ = &mut poller_handle => {
            tracing::warn!("Camera polling ended on its own, shutting down.");
        }
    }

    let _ = shutdown_tx.send(());
    if !poller_handle.is_finished() {
        let _ = poller_handle.await;
    }
    let _ = logger_handle.await;

    tracing::info!("Final metrics:\n{}", metrics.render());

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
