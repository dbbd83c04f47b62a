//! ps-forge: competitive-programming problem generation with LLMs.
//!
//! A forge session walks through three stages. A statement is generated and
//! evaluated, then an input generator, validator and reference solution are
//! generated concurrently and the whole package is evaluated. Every external
//! call is retried with exponential backoff.

pub mod cli;
pub mod config;
pub mod error;
pub mod forge;
pub mod llm;
pub mod utils;

// Re-export commonly used types
pub use config::ForgeConfig;
pub use error::{ConfigError, ExportError, LlmError};
pub use forge::{
    DifficultyConfig, PipelineError, PipelineState, ProblemPipeline, RetryPolicy,
    RetryingCaller, Stage,
};
