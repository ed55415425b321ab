use jiff::Timestamp;
use tracing::{Level, event};
use uuid::Uuid;

use crate::errors::Error;

#[derive(Clone, Debug)]
pub enum RefreshOutcome {
    Refreshed,
    Rotated,
    Failed,
    Abandoned,
}

/// Structured events for one refresh attempt, correlated by `attempt_id`.
#[derive(Clone, Debug)]
pub struct RefreshTelemetry {
    attempt_id: Uuid,
    context: String,
}

impl RefreshTelemetry {
    pub fn new(context: impl Into<String>) -> Self {
        Self {
            attempt_id: Uuid::new_v4(),
            context: context.into(),
        }
    }

    pub fn attempt_id(&self) -> Uuid {
        self.attempt_id
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn emit_start(&self) {
        event!(
            Level::INFO,
            attempt_id = %self.attempt_id,
            context = %self.context,
            timestamp = %Timestamp::now(),
            "refresh.start"
        );
    }

    pub fn emit_success(&self, outcome: RefreshOutcome, released: usize) {
        event!(
            Level::INFO,
            attempt_id = %self.attempt_id,
            context = %self.context,
            timestamp = %Timestamp::now(),
            outcome = ?outcome,
            released,
            "refresh.success"
        );
    }

    pub fn emit_failure(&self, error: &Error, rejected: usize) {
        event!(
            Level::ERROR,
            attempt_id = %self.attempt_id,
            context = %self.context,
            timestamp = %Timestamp::now(),
            outcome = ?RefreshOutcome::Failed,
            rejected,
            error = %error,
            "refresh.failure"
        );
    }
}

pub fn emit_queued(context: &str, position: usize) {
    event!(Level::DEBUG, context = %context, position, "refresh.queued");
}

pub fn emit_abandoned(dropped: usize) {
    event!(
        Level::WARN,
        timestamp = %Timestamp::now(),
        outcome = ?RefreshOutcome::Abandoned,
        dropped,
        "refresh.abandoned"
    );
}
