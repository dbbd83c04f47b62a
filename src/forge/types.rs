//! Data model for a forge session.
//!
//! The four entities produced by the pipeline ([`ProblemStatement`],
//! [`StatementEvaluation`], [`GeneratedCodes`], [`FullProblemEvaluation`]),
//! the user-supplied [`DifficultyConfig`], and the input/output records of
//! the six generation capabilities.
//!
//! Field names serialize in camelCase, which is also the shape the
//! generation prompts ask the model to answer in.

use serde::{Deserialize, Serialize};

/// A complete competitive-programming problem statement.
///
/// Every section is free text; mathematical content uses `$...$` LaTeX.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemStatement {
    pub title: String,
    pub time_limit: String,
    pub memory_limit: String,
    pub legend: String,
    pub inputs: String,
    pub outputs: String,
    pub example: String,
    pub notes: String,
}

impl ProblemStatement {
    /// Serializes the statement as the JSON text handed to downstream
    /// capabilities.
    pub fn to_prompt_text(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| self.title.clone())
    }

    /// Names of required sections that are blank.
    pub fn missing_sections(&self) -> Vec<&'static str> {
        [
            ("title", &self.title),
            ("timeLimit", &self.time_limit),
            ("memoryLimit", &self.memory_limit),
            ("legend", &self.legend),
            ("inputs", &self.inputs),
            ("outputs", &self.outputs),
            ("example", &self.example),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
    }
}

/// Quality assessment of a statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementEvaluation {
    /// Overall quality in `[0, 1]`.
    pub quality_score: f64,
    /// Whether the statement is fit for a contest.
    pub is_suitable: bool,
    pub feedback: String,
}

/// The three code artifacts generated for an approved statement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedCodes {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_generator_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validator_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solution_code: Option<String>,
}

impl GeneratedCodes {
    /// Creates a set where all three artifacts are present.
    pub fn complete(
        input_generator_code: impl Into<String>,
        validator_code: impl Into<String>,
        solution_code: impl Into<String>,
    ) -> Self {
        Self {
            input_generator_code: Some(input_generator_code.into()),
            validator_code: Some(validator_code.into()),
            solution_code: Some(solution_code.into()),
        }
    }

    /// Returns true when all three artifacts exist.
    pub fn is_complete(&self) -> bool {
        self.input_generator_code.is_some()
            && self.validator_code.is_some()
            && self.solution_code.is_some()
    }
}

/// Assessment of the whole package: statement, generator, validator, solution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FullProblemEvaluation {
    pub overall_assessment: String,
    pub errors_found: bool,
    #[serde(default)]
    pub suggestions: String,
}

/// User configuration for statement generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DifficultyConfig {
    /// Difficulty label, e.g. "Gold III".
    pub difficulty: String,
    /// Comma-separated algorithm tags, e.g. "DP,Graph".
    pub algorithm_tags: String,
    /// Sampling temperature in `[0, 1]`; model default when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_idea: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub problem_idea: Option<String>,
}

impl DifficultyConfig {
    /// Creates a configuration with the two required fields.
    pub fn new(difficulty: impl Into<String>, algorithm_tags: impl Into<String>) -> Self {
        Self {
            difficulty: difficulty.into(),
            algorithm_tags: algorithm_tags.into(),
            temperature: None,
            title_idea: None,
            problem_idea: None,
        }
    }

    /// Sets the sampling temperature.
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Sets a suggested title.
    pub fn with_title_idea(mut self, idea: impl Into<String>) -> Self {
        self.title_idea = Some(idea.into());
        self
    }

    /// Sets keywords or a short idea for the problem content.
    pub fn with_problem_idea(mut self, idea: impl Into<String>) -> Self {
        self.problem_idea = Some(idea.into());
        self
    }

    /// Individual algorithm tags, trimmed, empties dropped.
    pub fn tags(&self) -> Vec<&str> {
        self.algorithm_tags
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect()
    }

    /// Checks the form-level constraints.
    ///
    /// # Errors
    ///
    /// Returns a message describing the first violated constraint.
    pub fn validate(&self) -> Result<(), String> {
        if self.difficulty.trim().is_empty() {
            return Err("difficulty must be selected".to_string());
        }
        if self.tags().is_empty() {
            return Err("at least one algorithm tag is required".to_string());
        }
        if let Some(t) = self.temperature {
            if !(0.0..=1.0).contains(&t) {
                return Err(format!("temperature {} is outside [0, 1]", t));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Capability inputs and outputs
// ============================================================================

/// Input of the statement-generation capability.
pub type GenerateStatementInput = DifficultyConfig;

/// Input of the statement-evaluation capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateStatementInput {
    /// Serialized statement.
    pub problem_statement: String,
}

/// Input of the input-generator capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateInputCodeInput {
    /// The statement's input section.
    pub input_format: String,
    /// Serialized statement.
    pub problem_statement: String,
}

/// Input of the validator and solution capabilities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementOnlyInput {
    /// Serialized statement.
    pub problem_statement: String,
}

/// Input of the full-evaluation capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateFullProblemInput {
    pub statement: String,
    pub inputs: String,
    pub validator: String,
    pub solution: String,
}

/// Output of the input-generator capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputCodeOutput {
    #[serde(alias = "cppCode")]
    pub generator_code: String,
}

/// Output of the validator capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatorCodeOutput {
    pub validator_code: String,
}

/// Output of the solution capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolutionCodeOutput {
    pub solution_code: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_statement() -> ProblemStatement {
        ProblemStatement {
            title: "Lantern Paths".to_string(),
            time_limit: "1 second".to_string(),
            memory_limit: "256 MB".to_string(),
            legend: "Count paths in a DAG of $n$ lanterns.".to_string(),
            inputs: "The first line contains $n$ ($1 \\le n \\le 10^5$).".to_string(),
            outputs: "Print the number of paths modulo $10^9+7$.".to_string(),
            example: "Input: 3\nOutput: 4".to_string(),
            notes: String::new(),
        }
    }

    #[test]
    fn test_statement_round_trips_camel_case() {
        let statement = sample_statement();
        let text = statement.to_prompt_text();
        assert!(text.contains("\"timeLimit\":\"1 second\""));
        assert!(text.contains("\"memoryLimit\""));

        let parsed: ProblemStatement = serde_json::from_str(&text).expect("valid json");
        assert_eq!(parsed, statement);
    }

    #[test]
    fn test_missing_sections_ignores_notes() {
        let mut statement = sample_statement();
        assert!(statement.missing_sections().is_empty());

        statement.legend = "   ".to_string();
        assert_eq!(statement.missing_sections(), vec!["legend"]);
    }

    #[test]
    fn test_generated_codes_completeness() {
        assert!(!GeneratedCodes::default().is_complete());
        assert!(GeneratedCodes::complete("gen", "val", "sol").is_complete());
    }

    #[test]
    fn test_input_code_output_accepts_cpp_code_alias() {
        let parsed: InputCodeOutput =
            serde_json::from_str(r#"{"cppCode": "int main(){}"}"#).expect("alias accepted");
        assert_eq!(parsed.generator_code, "int main(){}");

        let parsed: InputCodeOutput =
            serde_json::from_str(r#"{"generatorCode": "gen"}"#).expect("field accepted");
        assert_eq!(parsed.generator_code, "gen");
    }

    #[test]
    fn test_difficulty_config_validation() {
        let config = DifficultyConfig::new("Gold III", "DP, Graph").with_temperature(0.7);
        assert!(config.validate().is_ok());
        assert_eq!(config.tags(), vec!["DP", "Graph"]);

        assert!(DifficultyConfig::new("", "DP").validate().is_err());
        assert!(DifficultyConfig::new("Gold III", " , ").validate().is_err());

        let hot = DifficultyConfig::new("Gold III", "DP").with_temperature(1.5);
        assert!(hot.validate().unwrap_err().contains("temperature"));
    }

    #[test]
    fn test_full_evaluation_defaults_suggestions() {
        let parsed: FullProblemEvaluation =
            serde_json::from_str(r#"{"overallAssessment": "ok", "errorsFound": false}"#)
                .expect("suggestions optional");
        assert!(parsed.suggestions.is_empty());
    }
}
