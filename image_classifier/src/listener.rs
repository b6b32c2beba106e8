use crate::classification::ClassifierResult;
use tokio::sync::mpsc;

/// Receives the outcome of classifications. Called from inference worker
/// threads, in completion order.
pub trait ClassifierListener: Send + Sync {
    fn on_error(&self, error: String);
    fn on_results(&self, results: ClassifierResult, inference_time_ms: u64);
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClassifierEvent {
    Results {
        results: ClassifierResult,
        inference_time_ms: u64,
    },
    Error(String),
}

/// Forwards listener callbacks into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelListener {
    sender: mpsc::UnboundedSender<ClassifierEvent>,
}

impl ChannelListener {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ClassifierEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    fn send(&self, event: ClassifierEvent) {
        if self.sender.send(event).is_err() {
            tracing::debug!("Classifier event dropped, receiver is gone");
        }
    }
}

impl ClassifierListener for ChannelListener {
    fn on_error(&self, error: String) {
        self.send(ClassifierEvent::Error(error));
    }

    fn on_results(&self, results: ClassifierResult, inference_time_ms: u64) {
        self.send(ClassifierEvent::Results {
            results,
            inference_time_ms,
        });
    }
}
