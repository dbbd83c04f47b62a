//! LLM integration for ps-forge.
//!
//! Provides the [`LlmProvider`] abstraction the generation service talks to
//! and an OpenAI-compatible HTTP client for LiteLLM proxies and OpenRouter.
//!
//! ```ignore
//! use ps_forge::llm::{GenerationRequest, LiteLlmClient, LlmProvider, Message};
//!
//! let client = LiteLlmClient::from_env()?;
//! let request = GenerationRequest::new("", vec![Message::user("Hello")]);
//! let response = client.generate(request).await?;
//! ```

pub mod litellm;

pub use litellm::{
    Choice, GenerationRequest, GenerationResponse, LiteLlmClient, LlmProvider, Message, Usage,
    DEFAULT_MODEL, OPENROUTER_API_BASE,
};
