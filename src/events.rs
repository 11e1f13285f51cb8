use std::sync::Mutex;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Started,
    Succeeded,
    Warning,
    Failed,
}

/// One observable step: a remote call or a batch item. Carries no
/// credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationEvent {
    pub operation: String,
    pub target: String,
    pub outcome: Outcome,
    pub error: Option<String>,
}

impl OperationEvent {
    pub fn started(operation: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            target: target.into(),
            outcome: Outcome::Started,
            error: None,
        }
    }

    pub fn succeeded(operation: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            target: target.into(),
            outcome: Outcome::Succeeded,
            error: None,
        }
    }

    /// Something worth a look that did not fail the operation.
    pub fn warning(
        operation: impl Into<String>,
        target: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            operation: operation.into(),
            target: target.into(),
            outcome: Outcome::Warning,
            error: Some(message.into()),
        }
    }

    pub fn failed(
        operation: impl Into<String>,
        target: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            operation: operation.into(),
            target: target.into(),
            outcome: Outcome::Failed,
            error: Some(error.into()),
        }
    }
}

pub trait EventSink: Send + Sync {
    fn record(&self, event: OperationEvent);
}

/// Forwards events to `tracing`. Failed batch items also go to the
/// `failed_items` target so they can be routed to their own log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn record(&self, event: OperationEvent) {
        match event.outcome {
            Outcome::Started => tracing::debug!(
                operation = %event.operation,
                subject = %event.target,
                "started"
            ),
            Outcome::Succeeded => tracing::info!(
                operation = %event.operation,
                subject = %event.target,
                "succeeded"
            ),
            Outcome::Warning => tracing::warn!(
                operation = %event.operation,
                subject = %event.target,
                "{}",
                event.error.as_deref().unwrap_or_default()
            ),
            Outcome::Failed => {
                let error = event.error.as_deref().unwrap_or("unknown error");
                tracing::warn!(
                    operation = %event.operation,
                    subject = %event.target,
                    error = %error,
                    "failed"
                );
                if event.operation.ends_with(".item") {
                    tracing::error!(
                        target: "failed_items",
                        item = %event.target,
                        error = %error,
                        "{} failed",
                        event.operation
                    );
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn record(&self, _event: OperationEvent) {}
}

/// Keeps every event in memory; handy for asserting on what was reported.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<OperationEvent>>,
}

impl MemorySink {
    pub fn events(&self) -> Vec<OperationEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl EventSink for MemorySink {
    fn record(&self, event: OperationEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
