//! Prompt templates for the six generation capabilities.
//!
//! Templates use `{placeholder}` markers filled by the `render_*` functions.
//! Each system prompt pins the JSON shape of the answer so the response can
//! be deserialized directly into the matching output record.

use super::types::{DifficultyConfig, EvaluateFullProblemInput};

/// System prompt for statement generation.
pub const STATEMENT_SYSTEM_PROMPT: &str = r#"You are a seasoned problem setter for competitive programming contests.

Write one original, self-contained problem. Every section except the title and
limits uses LaTeX for mathematics, with expressions wrapped in $...$.

You MUST respond with ONLY a JSON object in this exact format:
{
  "title": "<short title>",
  "timeLimit": "<e.g. 1 second>",
  "memoryLimit": "<e.g. 256 MB>",
  "legend": "<story and task description>",
  "inputs": "<input format with every constraint>",
  "outputs": "<output format>",
  "example": "<at least one sample input with its output>",
  "notes": "<explanation of the sample or additional remarks>"
}

Do not include any text outside the JSON object."#;

/// User prompt template for statement generation.
pub const STATEMENT_USER_TEMPLATE: &str = r#"Create a problem with these properties:

Difficulty: {difficulty}
(Tiers run Bronze < Silver < Gold < Platinum < Diamond < Ruby; inside a tier, V is the easiest level and I the hardest.)
Algorithm tags: {tags}
{title_idea}{problem_idea}
The intended solution must fit the stated time and memory limits, and the
difficulty must match the requested level. Fold any user ideas in naturally
without lowering the quality of the problem."#;

/// System prompt for statement evaluation.
pub const STATEMENT_EVALUATION_SYSTEM_PROMPT: &str = r#"You review competitive programming problems before they are used in contests. Be strict.

Judge clarity, ambiguity, interest, completeness of constraints, usefulness of
the example, and unhandled edge cases.

Scoring guide for qualityScore (0.0 to 1.0):
- 0.90-1.00: contest-ready, unambiguous, interesting
- 0.70-0.89: good, minor fixes needed
- below 0.70: significant problems

You MUST respond with ONLY a JSON object in this exact format:
{
  "qualityScore": <number between 0 and 1>,
  "isSuitable": <true or false>,
  "feedback": "<specific strengths and weaknesses>"
}

Do not include any text outside the JSON object."#;

/// User prompt template for statement evaluation.
pub const STATEMENT_EVALUATION_USER_TEMPLATE: &str = r#"Evaluate this problem statement (JSON):

{statement}"#;

/// System prompt for the input generator.
pub const INPUT_CODE_SYSTEM_PROMPT: &str = r#"You write C++ test generators for competitive programming problems using testlib.h.

Requirements:
- #include "testlib.h" plus any standard headers needed
- call registerGen(argc, argv, 1) first in main
- draw all randomness from testlib (rnd.next, rnd.wnext, shuffle), never from stdin
- print exactly one valid test to standard output, honoring every constraint
- accept command-line parameters that steer test size and shape so edge cases can be produced

You MUST respond with ONLY a JSON object in this exact format:
{
  "generatorCode": "<complete C++ source>"
}

Do not include any text outside the JSON object."#;

/// User prompt template for the input generator.
pub const INPUT_CODE_USER_TEMPLATE: &str = r#"Input format:
{input_format}

Full problem statement (JSON):
{statement}"#;

/// System prompt for the validator.
pub const VALIDATOR_CODE_SYSTEM_PROMPT: &str = r#"You write C++ input validators for competitive programming problems using testlib.h.

Requirements:
- #include "testlib.h"
- call registerValidation(argc, argv) first in main
- read the whole input with inf.readInt/readLong/readToken/readSpace/readEoln and name every variable
- check every bound, structural property and whitespace rule from the statement
- finish with inf.readEof()

You MUST respond with ONLY a JSON object in this exact format:
{
  "validatorCode": "<complete C++ source>"
}

Do not include any text outside the JSON object."#;

/// System prompt for the reference solution.
pub const SOLUTION_CODE_SYSTEM_PROMPT: &str = r#"You are a competitive programmer writing the reference solution for a problem.

Requirements:
- complete C++17 program reading stdin and writing stdout
- correct for every input allowed by the constraints, within the time and memory limits
- clear structure, brief comments on the key idea

You MUST respond with ONLY a JSON object in this exact format:
{
  "solutionCode": "<complete C++ source>"
}

Do not include any text outside the JSON object."#;

/// User prompt template shared by the validator and solution capabilities.
pub const STATEMENT_ONLY_USER_TEMPLATE: &str = r#"Problem statement (JSON):

{statement}"#;

/// System prompt for the full package evaluation.
pub const FULL_EVALUATION_SYSTEM_PROMPT: &str = r#"You audit complete competitive programming problem packages: statement, input generator, validator and reference solution.

Check:
- consistency of constraints across all four parts
- the generator only produces inputs the validator accepts, including edge cases
- the validator rejects every input the statement forbids
- the solution is correct and efficient for all valid inputs
- missing edge cases and unclear statement wording

Set errorsFound to true if any logical error, inconsistency, omission or bug exists.

You MUST respond with ONLY a JSON object in this exact format:
{
  "overallAssessment": "<detailed assessment>",
  "errorsFound": <true or false>,
  "suggestions": "<concrete fixes, or a short confirmation if none are needed>"
}

Do not include any text outside the JSON object."#;

/// User prompt template for the full package evaluation.
pub const FULL_EVALUATION_USER_TEMPLATE: &str = r#"Problem statement (JSON):
{statement}

Input generator:
{inputs}

Validator:
{validator}

Solution:
{solution}"#;

/// Renders the statement-generation user prompt.
pub fn render_statement_prompt(config: &DifficultyConfig) -> String {
    let title_idea = optional_line("Suggested title", config.title_idea.as_deref());
    let problem_idea = optional_line("Ideas to include", config.problem_idea.as_deref());
    let tags = config.tags().join(", ");

    fill_template(
        STATEMENT_USER_TEMPLATE,
        &[
            ("difficulty", config.difficulty.trim()),
            ("tags", tags.as_str()),
            ("title_idea", title_idea.as_str()),
            ("problem_idea", problem_idea.as_str()),
        ],
    )
}

/// Renders the statement-evaluation user prompt.
pub fn render_statement_evaluation_prompt(statement: &str) -> String {
    fill_template(STATEMENT_EVALUATION_USER_TEMPLATE, &[("statement", statement)])
}

/// Renders the input-generator user prompt.
pub fn render_input_code_prompt(input_format: &str, statement: &str) -> String {
    fill_template(
        INPUT_CODE_USER_TEMPLATE,
        &[("input_format", input_format), ("statement", statement)],
    )
}

/// Renders the validator or solution user prompt.
pub fn render_statement_only_prompt(statement: &str) -> String {
    fill_template(STATEMENT_ONLY_USER_TEMPLATE, &[("statement", statement)])
}

/// Renders the full-evaluation user prompt.
pub fn render_full_evaluation_prompt(input: &EvaluateFullProblemInput) -> String {
    fill_template(
        FULL_EVALUATION_USER_TEMPLATE,
        &[
            ("statement", input.statement.as_str()),
            ("inputs", input.inputs.as_str()),
            ("validator", input.validator.as_str()),
            ("solution", input.solution.as_str()),
        ],
    )
}

/// Substitutes `{name}` markers in a single pass over the template.
///
/// Values are inserted verbatim, so code or statements containing brace
/// text are never re-substituted. Unknown markers are kept as-is.
pub fn fill_template(template: &str, vars: &[(&str, &str)]) -> String {
    let extra: usize = vars.iter().map(|(_, v)| v.len()).sum();
    let mut out = String::with_capacity(template.len() + extra);
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let Some(end) = tail.find('}') else {
            rest = tail;
            break;
        };
        let key = &tail[1..end];
        match vars.iter().find(|(name, _)| *name == key) {
            Some((_, value)) => out.push_str(value),
            None => out.push_str(&tail[..=end]),
        }
        rest = &tail[end + 1..];
    }

    out.push_str(rest);
    out
}

fn optional_line(label: &str, value: Option<&str>) -> String {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => format!("{}: {}\n", label, v),
        None => String::new(),
    }
}
