//! Problem forge: retrying capability calls sequenced by a staged pipeline.
//!
//! - [`retry`]: bounded retry with exponential backoff around one call
//! - [`pipeline`]: the Configure / ReviewStatement / ReviewFullProblem state machine
//! - [`service`]: the six generation capabilities and their LLM-backed implementation
//! - [`events`]: progress and lifecycle events, and the sinks that receive them
//! - [`package`]: export of a finished problem to disk

pub mod error;
pub mod events;
pub mod package;
pub mod pipeline;
pub mod prompts;
pub mod retry;
pub mod service;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{PipelineError, PipelineResult, ServiceError, ServiceResult};
pub use events::{
    EventSink, FailureNotice, ForgeEvent, NoopSink, ProgressMessage, Severity, TracingSink,
};
pub use package::ProblemPackage;
pub use pipeline::{
    PipelineState, ProblemPipeline, Stage, Transition, OP_FULL_EVALUATION, OP_INPUT_CODE,
    OP_SOLUTION_CODE, OP_STATEMENT, OP_STATEMENT_EVALUATION, OP_VALIDATOR_CODE,
};
pub use retry::{RetryPolicy, RetryingCaller, DEFAULT_INITIAL_DELAY, DEFAULT_MAX_RETRIES};
pub use service::{LlmGenerationService, LlmServiceConfig, ProblemGenerationService};
pub use types::{
    DifficultyConfig, EvaluateFullProblemInput, EvaluateStatementInput, FullProblemEvaluation,
    GenerateInputCodeInput, GenerateStatementInput, GeneratedCodes, InputCodeOutput,
    ProblemStatement, SolutionCodeOutput, StatementEvaluation, StatementOnlyInput,
    ValidatorCodeOutput,
};
