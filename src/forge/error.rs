//! Error types for generation capabilities and pipeline transitions.

use thiserror::Error;

use super::pipeline::Stage;
use crate::error::LlmError;
use crate::utils::JsonExtractionError;

/// Failure of a single capability call.
///
/// Every variant is treated as transient by the retrying caller.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The LLM provider failed.
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// No JSON object could be extracted from the model output.
    #[error("Malformed model output: {0}")]
    Extraction(#[from] JsonExtractionError),

    /// The extracted JSON did not match the expected record.
    #[error("Unexpected output shape: {0}")]
    Schema(#[from] serde_json::Error),

    /// The output parsed but violates a field constraint.
    #[error("Invalid output: {0}")]
    InvalidOutput(String),

    /// Any other capability failure.
    #[error("{0}")]
    Other(String),
}

/// Result type alias for capability calls.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Failure of a pipeline transition.
///
/// A transition that returns any of these leaves the pipeline state untouched.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Code generation was requested without a statement.
    #[error("No problem statement available")]
    NoStatement,

    /// Statement regeneration was requested before any configuration was submitted.
    #[error("No configuration has been submitted yet")]
    NoConfiguration,

    /// The statement evaluation rejected the statement and no override was given.
    #[error("Statement was judged unsuitable (quality score {quality_score:.2}); approve with an override to continue")]
    StatementUnsuitable { quality_score: f64 },

    /// The operation is not available from the current stage.
    #[error("'{operation}' is not available in stage {stage}")]
    InvalidStage {
        operation: &'static str,
        stage: Stage,
    },

    /// The submitted configuration failed validation.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Another transition is still running.
    #[error("Another transition is already in progress")]
    TransitionInProgress,

    /// The session was reset while this transition was running; its results were discarded.
    #[error("Session was reset while the transition was running (started at epoch {started}, now {current})")]
    StaleTransition { started: u64, current: u64 },

    /// A capability call exhausted its retries.
    #[error("{operation} failed after {attempts} attempts: {source}")]
    CallFailed {
        operation: &'static str,
        attempts: u32,
        #[source]
        source: ServiceError,
    },
}

impl PipelineError {
    /// Name of the failed operation, when the error came from a capability call.
    pub fn failed_operation(&self) -> Option<&'static str> {
        match self {
            PipelineError::CallFailed { operation, .. } => Some(operation),
            _ => None,
        }
    }

    /// Returns true for errors raised before any external call was attempted.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            PipelineError::NoStatement
                | PipelineError::NoConfiguration
                | PipelineError::StatementUnsuitable { .. }
                | PipelineError::InvalidStage { .. }
                | PipelineError::InvalidConfig(_)
                | PipelineError::TransitionInProgress
        )
    }
}

/// Result type alias for pipeline transitions.
pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_failed_names_operation() {
        let err = PipelineError::CallFailed {
            operation: "Validator Code",
            attempts: 3,
            source: ServiceError::Other("boom".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "Validator Code failed after 3 attempts: boom"
        );
        assert_eq!(err.failed_operation(), Some("Validator Code"));
        assert!(!err.is_precondition());
    }

    #[test]
    fn test_precondition_classification() {
        assert!(PipelineError::NoStatement.is_precondition());
        assert!(PipelineError::InvalidStage {
            operation: "approve",
            stage: Stage::Configure,
        }
        .is_precondition());
        assert!(!PipelineError::StaleTransition {
            started: 1,
            current: 2
        }
        .is_precondition());
    }

    #[test]
    fn test_service_error_from_llm_error() {
        let err: ServiceError = LlmError::RateLimited("slow".to_string()).into();
        assert!(err.to_string().contains("Rate limited"));
    }
}
