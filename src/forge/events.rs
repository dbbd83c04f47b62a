//! Progress and lifecycle events emitted by the retrying caller and the pipeline.
//!
//! Events flow through an [`EventSink`], which keeps the core free of any
//! presentation concern. Sinks are provided for discarding events, logging
//! them through `tracing`, and forwarding them over a tokio channel.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::pipeline::{Stage, Transition};

/// What a single attempt of a retried call is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProgressMessage {
    /// The first attempt is starting.
    FirstAttempt,
    /// The second attempt (first retry) is starting.
    FirstRetry,
    /// A later attempt is starting (1-based attempt number).
    Attempt(u32),
    /// A failed attempt is followed by a backoff wait.
    Backoff { failed_attempt: u32, wait_ms: u64 },
}

impl ProgressMessage {
    /// Builds the message for the given 1-based attempt number.
    pub fn for_attempt(attempt: u32) -> Self {
        match attempt {
            0 | 1 => ProgressMessage::FirstAttempt,
            2 => ProgressMessage::FirstRetry,
            n => ProgressMessage::Attempt(n),
        }
    }

    /// Human-readable text for an operation.
    pub fn text(&self, operation: &str) -> String {
        match self {
            ProgressMessage::FirstAttempt => format!("Generating {}...", operation),
            ProgressMessage::FirstRetry => format!("Generating {} (retrying)...", operation),
            ProgressMessage::Attempt(n) => format!("Generating {} (attempt {})...", operation, n),
            ProgressMessage::Backoff {
                failed_attempt,
                wait_ms,
            } => format!(
                "Attempt {} for {} failed, retrying in {:.1}s",
                failed_attempt,
                operation,
                *wait_ms as f64 / 1000.0
            ),
        }
    }
}

/// Severity of an attempt failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    /// More attempts remain.
    Warning,
    /// The retry budget is exhausted.
    Fatal,
}

/// Notification for one failed attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureNotice {
    /// Human-readable operation name.
    pub operation: String,
    /// 1-based number of the failed attempt.
    pub attempt: u32,
    /// Attempt budget of the call.
    pub max_attempts: u32,
    /// True when no further attempt follows.
    pub final_attempt: bool,
    pub severity: Severity,
    /// Rendered error of the attempt.
    pub error: String,
}

impl FailureNotice {
    /// Short title suitable for a notification banner.
    pub fn title(&self) -> String {
        if self.final_attempt {
            format!("{} failed", self.operation)
        } else {
            format!("{}: attempt {} failed", self.operation, self.attempt)
        }
    }

    /// Longer description of the failure.
    pub fn description(&self) -> String {
        if self.final_attempt {
            format!(
                "Gave up after {} attempts. Error: {}",
                self.max_attempts, self.error
            )
        } else {
            format!(
                "Attempt {} of {} for {} failed, retrying.",
                self.attempt, self.max_attempts, self.operation
            )
        }
    }
}

/// Events emitted during a forge session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ForgeEvent {
    /// A call attempt is starting or waiting to retry.
    Progress {
        operation: String,
        message: ProgressMessage,
        timestamp: DateTime<Utc>,
    },
    /// A call attempt failed.
    AttemptFailed {
        notice: FailureNotice,
        timestamp: DateTime<Utc>,
    },
    /// A transition began.
    TransitionStarted {
        transition: Transition,
        epoch: u64,
        timestamp: DateTime<Utc>,
    },
    /// A transition committed its results.
    StageChanged {
        transition: Transition,
        from: Stage,
        to: Stage,
        epoch: u64,
        timestamp: DateTime<Utc>,
    },
    /// A transition failed and left the state untouched.
    TransitionFailed {
        transition: Transition,
        error: String,
        timestamp: DateTime<Utc>,
    },
    /// The session was cleared.
    SessionReset {
        epoch: u64,
        timestamp: DateTime<Utc>,
    },
}

impl ForgeEvent {
    /// Creates a Progress event.
    pub fn progress(operation: impl Into<String>, message: ProgressMessage) -> Self {
        Self::Progress {
            operation: operation.into(),
            message,
            timestamp: Utc::now(),
        }
    }

    /// Creates an AttemptFailed event.
    pub fn attempt_failed(notice: FailureNotice) -> Self {
        Self::AttemptFailed {
            notice,
            timestamp: Utc::now(),
        }
    }

    /// Creates a TransitionStarted event.
    pub fn transition_started(transition: Transition, epoch: u64) -> Self {
        Self::TransitionStarted {
            transition,
            epoch,
            timestamp: Utc::now(),
        }
    }

    /// Creates a StageChanged event.
    pub fn stage_changed(transition: Transition, from: Stage, to: Stage, epoch: u64) -> Self {
        Self::StageChanged {
            transition,
            from,
            to,
            epoch,
            timestamp: Utc::now(),
        }
    }

    /// Creates a TransitionFailed event.
    pub fn transition_failed(transition: Transition, error: impl Into<String>) -> Self {
        Self::TransitionFailed {
            transition,
            error: error.into(),
            timestamp: Utc::now(),
        }
    }

    /// Creates a SessionReset event.
    pub fn session_reset(epoch: u64) -> Self {
        Self::SessionReset {
            epoch,
            timestamp: Utc::now(),
        }
    }
}

/// Receiver of forge events.
///
/// Implementations must not block; they are called from inside the retry loop.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: ForgeEvent);
}

/// Sink that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn emit(&self, _event: ForgeEvent) {}
}

/// Sink that logs every event through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: ForgeEvent) {
        match event {
            ForgeEvent::Progress {
                operation, message, ..
            } => {
                tracing::info!(operation = %operation, "{}", message.text(&operation));
            }
            ForgeEvent::AttemptFailed { notice, .. } => match notice.severity {
                Severity::Warning => tracing::warn!(
                    operation = %notice.operation,
                    attempt = notice.attempt,
                    max_attempts = notice.max_attempts,
                    error = %notice.error,
                    "Attempt failed"
                ),
                Severity::Fatal => tracing::error!(
                    operation = %notice.operation,
                    attempts = notice.max_attempts,
                    error = %notice.error,
                    "Call failed permanently"
                ),
            },
            ForgeEvent::TransitionStarted {
                transition, epoch, ..
            } => {
                tracing::debug!(%transition, epoch, "Transition started");
            }
            ForgeEvent::StageChanged {
                transition,
                from,
                to,
                epoch,
                ..
            } => {
                tracing::info!(%transition, %from, %to, epoch, "Stage changed");
            }
            ForgeEvent::TransitionFailed {
                transition, error, ..
            } => {
                tracing::warn!(%transition, error = %error, "Transition failed");
            }
            ForgeEvent::SessionReset { epoch, .. } => {
                tracing::info!(epoch, "Session reset");
            }
        }
    }
}

impl EventSink for mpsc::UnboundedSender<ForgeEvent> {
    fn emit(&self, event: ForgeEvent) {
        // Receiver may have been dropped
        let _ = self.send(event);
    }
}

impl EventSink for mpsc::Sender<ForgeEvent> {
    fn emit(&self, event: ForgeEvent) {
        if let Err(e) = self.try_send(event) {
            tracing::debug!("Dropping forge event: {}", e);
        }
    }
}
