use opentelemetry::{
    global,
    metrics::{Counter, Histogram, MeterProvider},
    KeyValue,
};
use prometheus::{Encoder, Registry, TextEncoder};
use std::collections::HashSet;

pub struct Metrics {
    frames_submitted: Counter<u64>,
    classification_results: Counter<u64>,
    classification_errors: Counter<u64>,
    inference_duration: Histogram<u64>,
    pub registry: Registry,
}

impl Metrics {
    pub fn new() -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let registry = Registry::new();
        let exporter = opentelemetry_prometheus::exporter()
            .with_registry(registry.clone())
            .build()?;

        let provider = opentelemetry_sdk::metrics::SdkMeterProvider::builder()
            .with_reader(exporter)
            .build();

        let meter = provider.meter("frame_capture");
        global::set_meter_provider(provider);

        let frames_submitted = meter
            .u64_counter("frames_submitted_total")
            .with_description("Total number of frames handed to the classifier")
            .build();

        let classification_results = meter
            .u64_counter("classification_results_total")
            .with_description("Total number of classification results received")
            .build();

        let classification_errors = meter
            .u64_counter("classification_errors_total")
            .with_description("Total number of classifier errors received")
            .build();

        let boundaries = generate_boundaries((5, 25, 50, 250, 1000));

        let inference_duration = meter
            .u64_histogram("inference_duration_ms")
            .with_boundaries(boundaries)
            .with_description("Time between frame submission and result delivery in milliseconds")
            .build();

        Ok(Metrics {
            frames_submitted,
            classification_results,
            classification_errors,
            inference_duration,
            registry,
        })
    }

    pub fn record_frame_submitted(&self) {
        self.frames_submitted.add(1, &[]);
    }

    pub fn record_result(&self, inference_time_ms: u64, top_label: Option<&str>) {
        let attributes = vec![KeyValue::new(
            "top_label",
            top_label.unwrap_or("none").to_string(),
        )];
        self.classification_results.add(1, &attributes);
        self.inference_duration.record(inference_time_ms, &[]);
    }

    pub fn record_error(&self) {
        self.classification_errors.add(1, &[]);
    }

    /// Renders the registry in the Prometheus text exposition format.
    pub fn render(&self) -> String {
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buffer) {
            tracing::error!("Failed to encode metrics: {}", e);
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

fn generate_boundaries(parts: (i32, i32, i32, i32, i32)) -> Vec<f64> {
    let first_step: usize = 5;
    let middle_step: usize = 5;
    let end_step: usize = 25;
    let tail_step: usize = 250;
    let first_part = (parts.0..=parts.1).step_by(first_step);
    let middle_part = (parts.1..=parts.2).step_by(middle_step);
    let end_part = (parts.2..=parts.3).step_by(end_step);
    let tail_part = (parts.3..=parts.4).step_by(tail_step);

    let mut seen = HashSet::new();
    first_part
        .chain(middle_part)
        .chain(end_part)
        .chain(tail_part)
        .filter(|&x| seen.insert(x))
        .map(|x| x as f64)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_boundaries() {
        let parts = (5, 15, 25, 75, 575);
        let get = generate_boundaries(parts);
        let expected = vec![5.0, 10.0, 15.0, 20.0, 25.0, 50.0, 75.0, 325.0, 575.0];

        assert_eq!(get, expected);
    }

    #[test]
    fn test_metrics_render_counts() {
        let metrics = Metrics::new().unwrap();

        metrics.record_frame_submitted();
        metrics.record_frame_submitted();
        metrics.record_result(12, Some("tabby"));
        metrics.record_error();

        let rendered = metrics.render();
        assert!(rendered.contains("frames_submitted_total"));
        assert!(rendered.contains("classification_errors_total"));
        assert!(rendered.contains("inference_duration_ms"));
    }
}
