// Fire-and-forget alerting: partial fills, cancellations, placements and
// unexpected-state errors all flow through this one contract. Delivery
// failures are logged, never propagated into the engine.

pub mod webhook;

pub use webhook::WebhookNotifier;

use async_trait::async_trait;
use std::sync::Mutex;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_message(&self, text: &str);
}

/// Notifier that only writes to the log. Default for dry runs.
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn send_message(&self, text: &str) {
        tracing::info!("🔔 {}", text);
    }
}

/// Notifier that records every message; used by tests and paper sweeps to
/// assert on alerting behavior.
#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_message(&self, text: &str) {
        self.messages.lock().unwrap().push(text.to_string());
    }
}
