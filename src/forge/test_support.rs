//! Test doubles shared by the forge unit tests.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::error::{ServiceError, ServiceResult};
use super::events::{EventSink, FailureNotice, ForgeEvent, ProgressMessage};
use super::pipeline::Stage;
use super::service::ProblemGenerationService;
use super::types::{
    DifficultyConfig, EvaluateFullProblemInput, EvaluateStatementInput, FullProblemEvaluation,
    GenerateInputCodeInput, InputCodeOutput, ProblemStatement, SolutionCodeOutput,
    StatementEvaluation, StatementOnlyInput, ValidatorCodeOutput,
};

/// Sink that keeps every event in memory.
#[derive(Default)]
pub(crate) struct RecordingSink {
    events: Mutex<Vec<ForgeEvent>>,
}

impl RecordingSink {
    pub(crate) fn events(&self) -> Vec<ForgeEvent> {
        self.events.lock().expect("lock not poisoned").clone()
    }

    pub(crate) fn failure_notices(&self) -> Vec<FailureNotice> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ForgeEvent::AttemptFailed { notice, .. } => Some(notice),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn progress_messages(&self) -> Vec<ProgressMessage> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ForgeEvent::Progress { message, .. } => Some(message),
                _ => None,
            })
            .collect()
    }

    /// Backoff waits in milliseconds, in emission order.
    pub(crate) fn backoff_waits(&self) -> Vec<u64> {
        self.progress_messages()
            .into_iter()
            .filter_map(|m| match m {
                ProgressMessage::Backoff { wait_ms, .. } => Some(wait_ms),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn stage_changes(&self) -> Vec<(Stage, Stage)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ForgeEvent::StageChanged { from, to, .. } => Some((from, to)),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn transition_failures(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ForgeEvent::TransitionFailed { error, .. } => Some(error),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: ForgeEvent) {
        self.events.lock().expect("lock not poisoned").push(event);
    }
}

/// One scripted outcome of a capability call.
#[derive(Debug, Clone)]
pub(crate) enum Step<T> {
    Ok(T),
    Fail(String),
}

/// Scripted behaviour of one capability.
///
/// Call `n` plays step `n`; once the script runs out the last step repeats.
/// Every input is recorded.
pub(crate) struct Scripted<I, T> {
    steps: Vec<Step<T>>,
    delay: Duration,
    inputs: Mutex<Vec<I>>,
}

impl<I: Clone, T: Clone> Scripted<I, T> {
    pub(crate) fn new(steps: Vec<Step<T>>) -> Self {
        Self {
            steps,
            delay: Duration::ZERO,
            inputs: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn ok(value: T) -> Self {
        Self::new(vec![Step::Ok(value)])
    }

    /// Returns each value once, in order, repeating the last.
    pub(crate) fn sequence(values: Vec<T>) -> Self {
        Self::new(values.into_iter().map(Step::Ok).collect())
    }

    pub(crate) fn failing_then(failures: u32, value: T) -> Self {
        let mut steps: Vec<Step<T>> = (1..=failures)
            .map(|n| Step::Fail(format!("scripted failure #{}", n)))
            .collect();
        steps.push(Step::Ok(value));
        Self::new(steps)
    }

    pub(crate) fn always_failing(message: &str) -> Self {
        Self::new(vec![Step::Fail(message.to_string())])
    }

    /// Every call sleeps this long before answering.
    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.inputs.lock().expect("lock not poisoned").len()
    }

    pub(crate) fn inputs(&self) -> Vec<I> {
        self.inputs.lock().expect("lock not poisoned").clone()
    }

    async fn next(&self, input: I) -> ServiceResult<T> {
        let step = {
            let mut inputs = self.inputs.lock().expect("lock not poisoned");
            inputs.push(input);
            let idx = inputs.len() - 1;
            self.steps.get(idx).or_else(|| self.steps.last()).cloned()
        };

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match step {
            Some(Step::Ok(value)) => Ok(value),
            Some(Step::Fail(message)) => Err(ServiceError::Other(message)),
            None => Err(ServiceError::Other("no scripted step".to_string())),
        }
    }
}

/// In-memory generation service driven by per-capability scripts.
pub(crate) struct ScriptedService {
    pub(crate) statement: Scripted<DifficultyConfig, ProblemStatement>,
    pub(crate) statement_evaluation: Scripted<EvaluateStatementInput, StatementEvaluation>,
    pub(crate) input_code: Scripted<GenerateInputCodeInput, InputCodeOutput>,
    pub(crate) validator_code: Scripted<StatementOnlyInput, ValidatorCodeOutput>,
    pub(crate) solution_code: Scripted<StatementOnlyInput, SolutionCodeOutput>,
    pub(crate) full_evaluation: Scripted<EvaluateFullProblemInput, FullProblemEvaluation>,
}

impl Default for ScriptedService {
    /// Every capability succeeds on the first attempt.
    fn default() -> Self {
        Self {
            statement: Scripted::ok(sample_statement("Lantern Paths")),
            statement_evaluation: Scripted::ok(suitable_evaluation()),
            input_code: Scripted::ok(InputCodeOutput {
                generator_code: "// generator\n".to_string(),
            }),
            validator_code: Scripted::ok(ValidatorCodeOutput {
                validator_code: "// validator\n".to_string(),
            }),
            solution_code: Scripted::ok(SolutionCodeOutput {
                solution_code: "// solution\n".to_string(),
            }),
            full_evaluation: Scripted::ok(clean_full_evaluation()),
        }
    }
}

impl ScriptedService {
    /// Number of code-generation calls across the three code capabilities.
    pub(crate) fn code_calls(&self) -> usize {
        self.input_code.calls() + self.validator_code.calls() + self.solution_code.calls()
    }
}

#[async_trait]
impl ProblemGenerationService for ScriptedService {
    async fn generate_statement(&self, input: DifficultyConfig) -> ServiceResult<ProblemStatement> {
        self.statement.next(input).await
    }

    async fn evaluate_statement(
        &self,
        input: EvaluateStatementInput,
    ) -> ServiceResult<StatementEvaluation> {
        self.statement_evaluation.next(input).await
    }

    async fn generate_input_code(
        &self,
        input: GenerateInputCodeInput,
    ) -> ServiceResult<InputCodeOutput> {
        self.input_code.next(input).await
    }

    async fn generate_validator_code(
        &self,
        input: StatementOnlyInput,
    ) -> ServiceResult<ValidatorCodeOutput> {
        self.validator_code.next(input).await
    }

    async fn generate_solution_code(
        &self,
        input: StatementOnlyInput,
    ) -> ServiceResult<SolutionCodeOutput> {
        self.solution_code.next(input).await
    }

    async fn evaluate_full_problem(
        &self,
        input: EvaluateFullProblemInput,
    ) -> ServiceResult<FullProblemEvaluation> {
        self.full_evaluation.next(input).await
    }
}

pub(crate) fn sample_statement(title: &str) -> ProblemStatement {
    ProblemStatement {
        title: title.to_string(),
        time_limit: "1 second".to_string(),
        memory_limit: "256 MB".to_string(),
        legend: "Count paths in a DAG of $n$ lanterns.".to_string(),
        inputs: "The first line contains $n$ ($1 \\le n \\le 10^5$).".to_string(),
        outputs: "Print the number of paths modulo $10^9+7$.".to_string(),
        example: "Input:\n3\nOutput:\n4".to_string(),
        notes: "Paths of length zero count.".to_string(),
    }
}

pub(crate) fn suitable_evaluation() -> StatementEvaluation {
    StatementEvaluation {
        quality_score: 0.9,
        is_suitable: true,
        feedback: "Clear and well constrained.".to_string(),
    }
}

pub(crate) fn unsuitable_evaluation() -> StatementEvaluation {
    StatementEvaluation {
        quality_score: 0.4,
        is_suitable: false,
        feedback: "Constraints on n are missing.".to_string(),
    }
}

pub(crate) fn clean_full_evaluation() -> FullProblemEvaluation {
    FullProblemEvaluation {
        overall_assessment: "Consistent package.".to_string(),
        errors_found: false,
        suggestions: "None.".to_string(),
    }
}

pub(crate) fn faulty_full_evaluation() -> FullProblemEvaluation {
    FullProblemEvaluation {
        overall_assessment: "Validator accepts n = 0.".to_string(),
        errors_found: true,
        suggestions: "Tighten the lower bound check.".to_string(),
    }
}
