//! The problem-generation service: six asynchronous capabilities.
//!
//! [`ProblemGenerationService`] is the only external collaborator of the
//! pipeline. [`LlmGenerationService`] implements it on top of any
//! [`LlmProvider`] by rendering a prompt per capability and parsing the JSON
//! answer into the matching output record.

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use super::error::{ServiceError, ServiceResult};
use super::prompts::{
    render_full_evaluation_prompt, render_input_code_prompt, render_statement_evaluation_prompt,
    render_statement_only_prompt, render_statement_prompt, FULL_EVALUATION_SYSTEM_PROMPT,
    INPUT_CODE_SYSTEM_PROMPT, SOLUTION_CODE_SYSTEM_PROMPT, STATEMENT_EVALUATION_SYSTEM_PROMPT,
    STATEMENT_SYSTEM_PROMPT, VALIDATOR_CODE_SYSTEM_PROMPT,
};
use super::types::{
    EvaluateFullProblemInput, EvaluateStatementInput, FullProblemEvaluation,
    GenerateInputCodeInput, GenerateStatementInput, InputCodeOutput, ProblemStatement,
    SolutionCodeOutput, StatementEvaluation, StatementOnlyInput, ValidatorCodeOutput,
};
use crate::error::LlmError;
use crate::llm::{GenerationRequest, LlmProvider, Message};
use crate::utils::extract_json_object;

/// The six generation capabilities the pipeline sequences.
#[async_trait]
pub trait ProblemGenerationService: Send + Sync {
    /// Writes a problem statement for the given difficulty configuration.
    async fn generate_statement(
        &self,
        input: GenerateStatementInput,
    ) -> ServiceResult<ProblemStatement>;

    /// Scores a serialized statement.
    async fn evaluate_statement(
        &self,
        input: EvaluateStatementInput,
    ) -> ServiceResult<StatementEvaluation>;

    /// Writes the input generator.
    async fn generate_input_code(
        &self,
        input: GenerateInputCodeInput,
    ) -> ServiceResult<InputCodeOutput>;

    /// Writes the input validator.
    async fn generate_validator_code(
        &self,
        input: StatementOnlyInput,
    ) -> ServiceResult<ValidatorCodeOutput>;

    /// Writes the reference solution.
    async fn generate_solution_code(
        &self,
        input: StatementOnlyInput,
    ) -> ServiceResult<SolutionCodeOutput>;

    /// Audits the statement together with all three code artifacts.
    async fn evaluate_full_problem(
        &self,
        input: EvaluateFullProblemInput,
    ) -> ServiceResult<FullProblemEvaluation>;
}

/// Settings for the LLM-backed service.
#[derive(Debug, Clone)]
pub struct LlmServiceConfig {
    /// Model identifier; empty uses the provider default.
    pub model: String,
    /// Maximum tokens for each response.
    pub max_tokens: u32,
}

impl Default for LlmServiceConfig {
    fn default() -> Self {
        Self {
            model: String::new(),
            max_tokens: 4096,
        }
    }
}

impl LlmServiceConfig {
    /// Creates a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the model identifier.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sets the maximum tokens per response.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// Generation service backed by an LLM provider.
pub struct LlmGenerationService {
    llm: Arc<dyn LlmProvider>,
    config: LlmServiceConfig,
}

impl std::fmt::Debug for LlmGenerationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmGenerationService")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl LlmGenerationService {
    /// Creates a new service.
    pub fn new(llm: Arc<dyn LlmProvider>, config: LlmServiceConfig) -> Self {
        Self { llm, config }
    }

    pub fn config(&self) -> &LlmServiceConfig {
        &self.config
    }

    /// Sends one system/user exchange and parses the JSON answer.
    async fn complete<T: DeserializeOwned>(
        &self,
        capability: &str,
        system_prompt: &str,
        user_prompt: String,
        temperature: Option<f64>,
    ) -> ServiceResult<T> {
        let request = GenerationRequest::new(
            self.config.model.clone(),
            vec![Message::system(system_prompt), Message::user(user_prompt)],
        )
        .with_optional_temperature(temperature)
        .with_max_tokens(self.config.max_tokens);

        let response = self.llm.generate(request).await?;
        let content = response
            .first_content()
            .filter(|c| !c.trim().is_empty())
            .ok_or(LlmError::EmptyResponse)?;

        tracing::debug!(
            capability,
            tokens = response.usage.total_tokens,
            "Received capability response"
        );

        let json = extract_json_object(content)?;
        Ok(serde_json::from_str(&json)?)
    }
}

#[async_trait]
impl ProblemGenerationService for LlmGenerationService {
    async fn generate_statement(
        &self,
        input: GenerateStatementInput,
    ) -> ServiceResult<ProblemStatement> {
        let statement: ProblemStatement = self
            .complete(
                "generate_statement",
                STATEMENT_SYSTEM_PROMPT,
                render_statement_prompt(&input),
                input.temperature,
            )
            .await?;

        let missing = statement.missing_sections();
        if !missing.is_empty() {
            return Err(ServiceError::InvalidOutput(format!(
                "statement is missing sections: {}",
                missing.join(", ")
            )));
        }
        Ok(statement)
    }

    async fn evaluate_statement(
        &self,
        input: EvaluateStatementInput,
    ) -> ServiceResult<StatementEvaluation> {
        let evaluation: StatementEvaluation = self
            .complete(
                "evaluate_statement",
                STATEMENT_EVALUATION_SYSTEM_PROMPT,
                render_statement_evaluation_prompt(&input.problem_statement),
                None,
            )
            .await?;

        if !(0.0..=1.0).contains(&evaluation.quality_score) {
            return Err(ServiceError::InvalidOutput(format!(
                "qualityScore {} is outside [0, 1]",
                evaluation.quality_score
            )));
        }
        Ok(evaluation)
    }

    async fn generate_input_code(
        &self,
        input: GenerateInputCodeInput,
    ) -> ServiceResult<InputCodeOutput> {
        let output: InputCodeOutput = self
            .complete(
                "generate_input_code",
                INPUT_CODE_SYSTEM_PROMPT,
                render_input_code_prompt(&input.input_format, &input.problem_statement),
                None,
            )
            .await?;

        Ok(InputCodeOutput {
            generator_code: clean_code("generatorCode", &output.generator_code)?,
        })
    }

    async fn generate_validator_code(
        &self,
        input: StatementOnlyInput,
    ) -> ServiceResult<ValidatorCodeOutput> {
        let output: ValidatorCodeOutput = self
            .complete(
                "generate_validator_code",
                VALIDATOR_CODE_SYSTEM_PROMPT,
                render_statement_only_prompt(&input.problem_statement),
                None,
            )
            .await?;

        Ok(ValidatorCodeOutput {
            validator_code: clean_code("validatorCode", &output.validator_code)?,
        })
    }

    async fn generate_solution_code(
        &self,
        input: StatementOnlyInput,
    ) -> ServiceResult<SolutionCodeOutput> {
        let output: SolutionCodeOutput = self
            .complete(
                "generate_solution_code",
                SOLUTION_CODE_SYSTEM_PROMPT,
                render_statement_only_prompt(&input.problem_statement),
                None,
            )
            .await?;

        Ok(SolutionCodeOutput {
            solution_code: clean_code("solutionCode", &output.solution_code)?,
        })
    }

    async fn evaluate_full_problem(
        &self,
        input: EvaluateFullProblemInput,
    ) -> ServiceResult<FullProblemEvaluation> {
        let evaluation: FullProblemEvaluation = self
            .complete(
                "evaluate_full_problem",
                FULL_EVALUATION_SYSTEM_PROMPT,
                render_full_evaluation_prompt(&input),
                None,
            )
            .await?;

        if evaluation.overall_assessment.trim().is_empty() {
            return Err(ServiceError::InvalidOutput(
                "overallAssessment is empty".to_string(),
            ));
        }
        Ok(evaluation)
    }
}

/// Strips a markdown fence the model may have left inside a code field and
/// rejects blank code.
fn clean_code(field: &str, code: &str) -> ServiceResult<String> {
    let trimmed = code.trim();
    let unfenced = match trimmed.strip_prefix("```") {
        Some(rest) => {
            // Drop the language tag line
            let body = rest.split_once('\n').map(|(_, b)| b).unwrap_or("");
            body.trim_end().strip_suffix("```").unwrap_or(body).trim()
        }
        None => trimmed,
    };

    if unfenced.is_empty() {
        return Err(ServiceError::InvalidOutput(format!("{} is empty", field)));
    }
    Ok(format!("{}\n", unfenced))
}
