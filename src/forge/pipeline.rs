//! The three-stage problem pipeline.
//!
//! ```text
//! Configure --generate_statement--> ReviewStatement --approve--> ReviewFullProblem
//!     ^                                   |                            |
//!     +------------- start_over ----------+----------------------------+
//! ```
//!
//! Each transition runs its capability calls through a [`RetryingCaller`] and
//! commits all of its results at once, or none of them. A transition that
//! fails leaves the state exactly as it was.
//!
//! `start_over` advances the session epoch. A transition that started in an
//! earlier epoch discards its results and reports
//! [`PipelineError::StaleTransition`] instead of overwriting the new session.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::{PipelineError, PipelineResult, ServiceError};
use super::events::{EventSink, ForgeEvent};
use super::retry::{RetryPolicy, RetryingCaller};
use super::service::ProblemGenerationService;
use super::types::{
    DifficultyConfig, EvaluateFullProblemInput, EvaluateStatementInput, FullProblemEvaluation,
    GenerateInputCodeInput, GeneratedCodes, ProblemStatement, StatementEvaluation,
    StatementOnlyInput,
};

/// Operation name of the statement-generation call.
pub const OP_STATEMENT: &str = "Problem Statement";
/// Operation name of the statement-evaluation call.
pub const OP_STATEMENT_EVALUATION: &str = "Statement Evaluation";
/// Operation name of the input-generator call.
pub const OP_INPUT_CODE: &str = "Input Code";
/// Operation name of the validator call.
pub const OP_VALIDATOR_CODE: &str = "Validator Code";
/// Operation name of the solution call.
pub const OP_SOLUTION_CODE: &str = "Solution Code";
/// Operation name of the full-evaluation call.
pub const OP_FULL_EVALUATION: &str = "Full Problem Evaluation";

// ============================================================================
// Stages and transitions
// ============================================================================

/// Stage of a forge session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    /// Waiting for a difficulty configuration.
    #[default]
    Configure,
    /// A statement and its evaluation await approval.
    ReviewStatement,
    /// Codes and the full evaluation are available.
    ReviewFullProblem,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Configure => "Configure",
            Stage::ReviewStatement => "ReviewStatement",
            Stage::ReviewFullProblem => "ReviewFullProblem",
        };
        f.write_str(name)
    }
}

/// Named pipeline transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    GenerateStatement,
    RegenerateStatement,
    ApproveAndGenerateCodes,
    ForceApproveAndGenerateCodes,
    #[serde(rename = "regenerate_codes_and_reevaluate")]
    RegenerateCodes,
}

impl Transition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Transition::GenerateStatement => "generate_statement",
            Transition::RegenerateStatement => "regenerate_statement",
            Transition::ApproveAndGenerateCodes => "approve_and_generate_codes",
            Transition::ForceApproveAndGenerateCodes => "force_approve_and_generate_codes",
            Transition::RegenerateCodes => "regenerate_codes_and_reevaluate",
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// State
// ============================================================================

/// Snapshot of a forge session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineState {
    pub stage: Stage,
    pub statement: Option<ProblemStatement>,
    pub statement_evaluation: Option<StatementEvaluation>,
    pub codes: Option<GeneratedCodes>,
    pub full_evaluation: Option<FullProblemEvaluation>,
    /// Configuration of the last statement round, reused by regeneration.
    pub last_config: Option<DifficultyConfig>,
    /// Advanced by every commit and by `start_over`.
    pub epoch: u64,
}

impl PipelineState {
    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn statement(&self) -> Option<&ProblemStatement> {
        self.statement.as_ref()
    }

    pub fn statement_evaluation(&self) -> Option<&StatementEvaluation> {
        self.statement_evaluation.as_ref()
    }

    pub fn codes(&self) -> Option<&GeneratedCodes> {
        self.codes.as_ref()
    }

    pub fn full_evaluation(&self) -> Option<&FullProblemEvaluation> {
        self.full_evaluation.as_ref()
    }

    /// True when nothing has been produced yet.
    pub fn is_empty(&self) -> bool {
        self.statement.is_none()
            && self.statement_evaluation.is_none()
            && self.codes.is_none()
            && self.full_evaluation.is_none()
    }

    /// Whether approval passes the suitability gate without an override.
    pub fn can_approve(&self) -> bool {
        self.stage == Stage::ReviewStatement
            && self
                .statement_evaluation
                .as_ref()
                .is_some_and(|e| e.is_suitable)
    }

    /// Whether code regeneration should be offered: the full evaluation found errors.
    pub fn can_regenerate_codes(&self) -> bool {
        self.stage == Stage::ReviewFullProblem
            && self
                .full_evaluation
                .as_ref()
                .is_some_and(|e| e.errors_found)
    }
}

struct Inner {
    state: PipelineState,
    /// Epoch of the transition currently running, if any.
    in_flight: Option<u64>,
}

/// Clears the in-flight marker when a transition ends, however it ends.
struct InFlight<'a> {
    pipeline: &'a ProblemPipeline,
    transition: Transition,
    epoch: u64,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut inner = self.pipeline.lock();
        if inner.in_flight == Some(self.epoch) {
            inner.in_flight = None;
        }
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// Sequences statement generation, evaluation, code generation and full
/// evaluation over a [`ProblemGenerationService`].
pub struct ProblemPipeline {
    service: Arc<dyn ProblemGenerationService>,
    caller: RetryingCaller,
    sink: Arc<dyn EventSink>,
    session_id: Uuid,
    inner: Mutex<Inner>,
}

impl fmt::Debug for ProblemPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProblemPipeline")
            .field("session_id", &self.session_id)
            .field("policy", &self.caller.policy())
            .field("state", &self.lock().state)
            .finish_non_exhaustive()
    }
}

impl ProblemPipeline {
    /// Creates a pipeline in the Configure stage.
    pub fn new(
        service: Arc<dyn ProblemGenerationService>,
        policy: RetryPolicy,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            service,
            caller: RetryingCaller::new(policy, sink.clone()),
            sink,
            session_id: Uuid::new_v4(),
            inner: Mutex::new(Inner {
                state: PipelineState::default(),
                in_flight: None,
            }),
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn policy(&self) -> RetryPolicy {
        self.caller.policy()
    }

    /// Returns a copy of the current state.
    pub fn snapshot(&self) -> PipelineState {
        self.lock().state.clone()
    }

    /// Generates a statement for `config` and evaluates it.
    ///
    /// Moves Configure -> ReviewStatement. Both results are committed together.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` for a rejected configuration, `InvalidStage` outside
    /// Configure, `CallFailed` when either call exhausts its retries.
    pub async fn generate_statement(&self, config: DifficultyConfig) -> PipelineResult<PipelineState> {
        let transition = Transition::GenerateStatement;
        let result = self.run_generate_statement(transition, config).await;
        self.finish(transition, result)
    }

    /// Repeats the statement round with the last submitted configuration.
    ///
    /// Replaces the statement and its evaluation; the stage stays ReviewStatement.
    pub async fn regenerate_statement(&self) -> PipelineResult<PipelineState> {
        let transition = Transition::RegenerateStatement;
        let result = self.run_regenerate_statement(transition).await;
        self.finish(transition, result)
    }

    /// Generates the three codes concurrently, then evaluates the full package.
    ///
    /// Moves ReviewStatement -> ReviewFullProblem.
    ///
    /// # Errors
    ///
    /// `StatementUnsuitable` when the evaluation rejected the statement; use
    /// [`force_approve_and_generate_codes`](Self::force_approve_and_generate_codes)
    /// to override. `CallFailed` names the first failed call; no code is
    /// committed unless all three calls and the evaluation succeed.
    pub async fn approve_and_generate_codes(&self) -> PipelineResult<PipelineState> {
        let transition = Transition::ApproveAndGenerateCodes;
        let result = self.run_approve(transition, false).await;
        self.finish(transition, result)
    }

    /// Like [`approve_and_generate_codes`](Self::approve_and_generate_codes)
    /// but bypasses the suitability gate.
    pub async fn force_approve_and_generate_codes(&self) -> PipelineResult<PipelineState> {
        let transition = Transition::ForceApproveAndGenerateCodes;
        let result = self.run_approve(transition, true).await;
        self.finish(transition, result)
    }

    /// Regenerates the codes for the current statement and re-evaluates them.
    pub async fn regenerate_codes_and_reevaluate(&self) -> PipelineResult<PipelineState> {
        let transition = Transition::RegenerateCodes;
        let result = self.run_regenerate_codes(transition).await;
        self.finish(transition, result)
    }

    /// Clears the session and returns to Configure.
    ///
    /// Transitions still running for the previous epoch will fail to commit.
    pub fn start_over(&self) -> PipelineState {
        let snapshot = {
            let mut inner = self.lock();
            let epoch = inner.state.epoch + 1;
            inner.state = PipelineState {
                epoch,
                ..PipelineState::default()
            };
            inner.state.clone()
        };

        tracing::info!(session = %self.session_id, epoch = snapshot.epoch, "Starting over");
        self.sink.emit(ForgeEvent::session_reset(snapshot.epoch));
        snapshot
    }

    // ------------------------------------------------------------------------
    // Transition bodies
    // ------------------------------------------------------------------------

    async fn run_generate_statement(
        &self,
        transition: Transition,
        config: DifficultyConfig,
    ) -> PipelineResult<PipelineState> {
        config.validate().map_err(PipelineError::InvalidConfig)?;
        let (guard, ()) = self.begin(transition, |state| {
            require_stage(state, transition, Stage::Configure)
        })?;

        self.statement_round(&guard, config).await
    }

    async fn run_regenerate_statement(
        &self,
        transition: Transition,
    ) -> PipelineResult<PipelineState> {
        let (guard, config) = self.begin(transition, |state| {
            let config = state
                .last_config
                .clone()
                .ok_or(PipelineError::NoConfiguration)?;
            require_stage(state, transition, Stage::ReviewStatement)?;
            Ok(config)
        })?;

        self.statement_round(&guard, config).await
    }

    async fn run_approve(
        &self,
        transition: Transition,
        force: bool,
    ) -> PipelineResult<PipelineState> {
        let (guard, statement) = self.begin(transition, |state| {
            let statement = state.statement.clone().ok_or(PipelineError::NoStatement)?;
            require_stage(state, transition, Stage::ReviewStatement)?;
            if let Some(evaluation) = state.statement_evaluation.as_ref() {
                if !evaluation.is_suitable && !force {
                    return Err(PipelineError::StatementUnsuitable {
                        quality_score: evaluation.quality_score,
                    });
                }
                if !evaluation.is_suitable {
                    tracing::warn!(
                        quality_score = evaluation.quality_score,
                        "Approving a statement judged unsuitable"
                    );
                }
            }
            Ok(statement)
        })?;

        self.code_round(&guard, &statement).await
    }

    async fn run_regenerate_codes(&self, transition: Transition) -> PipelineResult<PipelineState> {
        let (guard, statement) = self.begin(transition, |state| {
            let statement = state.statement.clone().ok_or(PipelineError::NoStatement)?;
            require_stage(state, transition, Stage::ReviewFullProblem)?;
            Ok(statement)
        })?;

        self.code_round(&guard, &statement).await
    }

    /// Statement generation followed by its evaluation.
    async fn statement_round(
        &self,
        guard: &InFlight<'_>,
        config: DifficultyConfig,
    ) -> PipelineResult<PipelineState> {
        let service = self.service.as_ref();

        let statement = self
            .caller
            .call(
                OP_STATEMENT,
                move |input| service.generate_statement(input),
                config.clone(),
            )
            .await
            .map_err(|source| self.call_failed(guard, OP_STATEMENT, source))?;

        self.ensure_current(guard)?;

        let evaluation = self
            .caller
            .call(
                OP_STATEMENT_EVALUATION,
                move |input| service.evaluate_statement(input),
                EvaluateStatementInput {
                    problem_statement: statement.to_prompt_text(),
                },
            )
            .await
            .map_err(|source| self.call_failed(guard, OP_STATEMENT_EVALUATION, source))?;

        tracing::info!(
            session = %self.session_id,
            title = %statement.title,
            quality_score = evaluation.quality_score,
            is_suitable = evaluation.is_suitable,
            "Statement evaluated"
        );

        self.commit(guard, Stage::ReviewStatement, move |state| {
            state.statement = Some(statement);
            state.statement_evaluation = Some(evaluation);
            state.last_config = Some(config);
        })
    }

    /// Concurrent code generation followed by the full evaluation.
    async fn code_round(
        &self,
        guard: &InFlight<'_>,
        statement: &ProblemStatement,
    ) -> PipelineResult<PipelineState> {
        let service = self.service.as_ref();
        let statement_text = statement.to_prompt_text();
        let statement_only = StatementOnlyInput {
            problem_statement: statement_text.clone(),
        };

        // All three calls settle before any result is inspected
        let (input_code, validator_code, solution_code) = futures::join!(
            self.caller.call(
                OP_INPUT_CODE,
                move |input| service.generate_input_code(input),
                GenerateInputCodeInput {
                    input_format: statement.inputs.clone(),
                    problem_statement: statement_text.clone(),
                },
            ),
            self.caller.call(
                OP_VALIDATOR_CODE,
                move |input| service.generate_validator_code(input),
                statement_only.clone(),
            ),
            self.caller.call(
                OP_SOLUTION_CODE,
                move |input| service.generate_solution_code(input),
                statement_only,
            ),
        );

        let generator = input_code
            .map_err(|source| self.call_failed(guard, OP_INPUT_CODE, source))?
            .generator_code;
        let validator = validator_code
            .map_err(|source| self.call_failed(guard, OP_VALIDATOR_CODE, source))?
            .validator_code;
        let solution = solution_code
            .map_err(|source| self.call_failed(guard, OP_SOLUTION_CODE, source))?
            .solution_code;

        self.ensure_current(guard)?;

        let evaluation = self
            .caller
            .call(
                OP_FULL_EVALUATION,
                move |input| service.evaluate_full_problem(input),
                EvaluateFullProblemInput {
                    statement: statement_text,
                    inputs: generator.clone(),
                    validator: validator.clone(),
                    solution: solution.clone(),
                },
            )
            .await
            .map_err(|source| self.call_failed(guard, OP_FULL_EVALUATION, source))?;

        tracing::info!(
            session = %self.session_id,
            errors_found = evaluation.errors_found,
            "Full problem evaluated"
        );

        let codes = GeneratedCodes::complete(generator, validator, solution);
        self.commit(guard, Stage::ReviewFullProblem, move |state| {
            state.codes = Some(codes);
            state.full_evaluation = Some(evaluation);
        })
    }

    // ------------------------------------------------------------------------
    // Bookkeeping
    // ------------------------------------------------------------------------

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Checks preconditions and marks a transition as running.
    fn begin<T>(
        &self,
        transition: Transition,
        check: impl FnOnce(&PipelineState) -> PipelineResult<T>,
    ) -> PipelineResult<(InFlight<'_>, T)> {
        let (epoch, value) = {
            let mut inner = self.lock();
            let epoch = inner.state.epoch;
            if inner.in_flight == Some(epoch) {
                return Err(PipelineError::TransitionInProgress);
            }
            let value = check(&inner.state)?;
            inner.in_flight = Some(epoch);
            (epoch, value)
        };

        tracing::debug!(session = %self.session_id, %transition, epoch, "Transition started");
        self.sink
            .emit(ForgeEvent::transition_started(transition, epoch));

        Ok((
            InFlight {
                pipeline: self,
                transition,
                epoch,
            },
            value,
        ))
    }

    fn ensure_current(&self, guard: &InFlight<'_>) -> PipelineResult<()> {
        let current = self.lock().state.epoch;
        if current != guard.epoch {
            return Err(PipelineError::StaleTransition {
                started: guard.epoch,
                current,
            });
        }
        Ok(())
    }

    /// Applies a transition's results if its epoch is still current.
    fn commit(
        &self,
        guard: &InFlight<'_>,
        to: Stage,
        apply: impl FnOnce(&mut PipelineState),
    ) -> PipelineResult<PipelineState> {
        let (from, snapshot) = {
            let mut inner = self.lock();
            let current = inner.state.epoch;
            if current != guard.epoch {
                return Err(PipelineError::StaleTransition {
                    started: guard.epoch,
                    current,
                });
            }

            let from = inner.state.stage;
            apply(&mut inner.state);
            inner.state.stage = to;
            inner.state.epoch += 1;
            inner.in_flight = None;
            (from, inner.state.clone())
        };

        self.sink.emit(ForgeEvent::stage_changed(
            guard.transition,
            from,
            to,
            snapshot.epoch,
        ));
        Ok(snapshot)
    }

    /// Wraps an exhausted call, unless the session was reset meanwhile.
    fn call_failed(
        &self,
        guard: &InFlight<'_>,
        operation: &'static str,
        source: ServiceError,
    ) -> PipelineError {
        if let Err(stale) = self.ensure_current(guard) {
            tracing::debug!(
                session = %self.session_id,
                operation,
                error = %source,
                "Discarding failure of a stale call"
            );
            return stale;
        }
        PipelineError::CallFailed {
            operation,
            attempts: self.caller.policy().max_retries(),
            source,
        }
    }

    fn finish(
        &self,
        transition: Transition,
        result: PipelineResult<PipelineState>,
    ) -> PipelineResult<PipelineState> {
        match result {
            // The session this transition belonged to is gone
            Err(ref e @ PipelineError::StaleTransition { .. }) => {
                tracing::debug!(session = %self.session_id, %transition, error = %e, "Transition discarded");
            }
            Err(ref e) => {
                tracing::warn!(session = %self.session_id, %transition, error = %e, "Transition failed");
                self.sink
                    .emit(ForgeEvent::transition_failed(transition, e.to_string()));
            }
            Ok(_) => {}
        }
        result
    }
}

fn require_stage(
    state: &PipelineState,
    transition: Transition,
    expected: Stage,
) -> PipelineResult<()> {
    if state.stage != expected {
        return Err(PipelineError::InvalidStage {
            operation: transition.as_str(),
            stage: state.stage,
        });
    }
    Ok(())
}
