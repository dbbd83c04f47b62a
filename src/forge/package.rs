//! Export of a finished problem package.
//!
//! A [`ProblemPackage`] bundles whatever the session produced and writes it
//! to a directory:
//!
//! ```text
//! <dir>/
//!   statement.md     rendered statement
//!   statement.json   statement record
//!   generator.cpp    input generator (when generated)
//!   validator.cpp    validator (when generated)
//!   solution.cpp     reference solution (when generated)
//!   evaluation.md    statement and full evaluations (when available)
//! ```

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::pipeline::PipelineState;
use super::types::{FullProblemEvaluation, GeneratedCodes, ProblemStatement, StatementEvaluation};
use crate::error::ExportError;

pub const STATEMENT_MD: &str = "statement.md";
pub const STATEMENT_JSON: &str = "statement.json";
pub const GENERATOR_CPP: &str = "generator.cpp";
pub const VALIDATOR_CPP: &str = "validator.cpp";
pub const SOLUTION_CPP: &str = "solution.cpp";
pub const EVALUATION_MD: &str = "evaluation.md";

/// Everything a session produced for one problem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemPackage {
    pub statement: ProblemStatement,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statement_evaluation: Option<StatementEvaluation>,
    #[serde(default)]
    pub codes: GeneratedCodes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_evaluation: Option<FullProblemEvaluation>,
}

impl ProblemPackage {
    /// Creates a package holding only a statement.
    pub fn new(statement: ProblemStatement) -> Self {
        Self {
            statement,
            statement_evaluation: None,
            codes: GeneratedCodes::default(),
            full_evaluation: None,
        }
    }

    /// Collects the results of a pipeline state.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::NoStatement`] before the first statement round.
    pub fn from_state(state: &PipelineState) -> Result<Self, ExportError> {
        let statement = state.statement.clone().ok_or(ExportError::NoStatement)?;
        Ok(Self {
            statement,
            statement_evaluation: state.statement_evaluation.clone(),
            codes: state.codes.clone().unwrap_or_default(),
            full_evaluation: state.full_evaluation.clone(),
        })
    }

    /// Renders the statement as Markdown.
    pub fn statement_markdown(&self) -> String {
        let s = &self.statement;
        let mut out = String::new();
        let _ = writeln!(out, "# {}\n", s.title.trim());
        let _ = writeln!(out, "- Time limit: {}", s.time_limit.trim());
        let _ = writeln!(out, "- Memory limit: {}\n", s.memory_limit.trim());

        for (heading, body) in [
            ("Legend", &s.legend),
            ("Input", &s.inputs),
            ("Output", &s.outputs),
            ("Example", &s.example),
            ("Notes", &s.notes),
        ] {
            if body.trim().is_empty() {
                continue;
            }
            let _ = writeln!(out, "## {}\n\n{}\n", heading, body.trim());
        }

        out.truncate(out.trim_end().len());
        out.push('\n');
        out
    }

    /// Renders both evaluations as Markdown, or `None` if neither exists.
    pub fn evaluation_markdown(&self) -> Option<String> {
        if self.statement_evaluation.is_none() && self.full_evaluation.is_none() {
            return None;
        }

        let mut out = format!("# Evaluation: {}\n", self.statement.title.trim());

        if let Some(ref e) = self.statement_evaluation {
            let _ = write!(
                out,
                "\n## Statement\n\n- Quality score: {:.2}\n- Suitable: {}\n\n{}\n",
                e.quality_score,
                if e.is_suitable { "yes" } else { "no" },
                e.feedback.trim()
            );
        }

        if let Some(ref e) = self.full_evaluation {
            let _ = write!(
                out,
                "\n## Full problem\n\n- Errors found: {}\n\n{}\n",
                if e.errors_found { "yes" } else { "no" },
                e.overall_assessment.trim()
            );
            if !e.suggestions.trim().is_empty() {
                let _ = write!(out, "\n### Suggestions\n\n{}\n", e.suggestions.trim());
            }
        }

        Some(out)
    }

    /// Writes the package into `dir`, creating it if needed.
    ///
    /// Code and evaluation files the package does not hold are removed, so
    /// re-exporting into an earlier export leaves no outdated files behind.
    /// Returns the paths written, in a stable order.
    pub fn write_to(&self, dir: &Path) -> Result<Vec<PathBuf>, ExportError> {
        if dir.exists() && !dir.is_dir() {
            return Err(ExportError::NotADirectory(dir.display().to_string()));
        }
        fs::create_dir_all(dir)?;

        let mut files: Vec<(&str, String)> = vec![
            (STATEMENT_MD, self.statement_markdown()),
            (
                STATEMENT_JSON,
                serde_json::to_string_pretty(&self.statement)?,
            ),
        ];
        for (name, code) in [
            (GENERATOR_CPP, &self.codes.input_generator_code),
            (VALIDATOR_CPP, &self.codes.validator_code),
            (SOLUTION_CPP, &self.codes.solution_code),
        ] {
            match code {
                Some(code) => files.push((name, code.clone())),
                None => remove_stale(&dir.join(name))?,
            }
        }
        match self.evaluation_markdown() {
            Some(report) => files.push((EVALUATION_MD, report)),
            None => remove_stale(&dir.join(EVALUATION_MD))?,
        }

        let mut written = Vec::with_capacity(files.len());
        for (name, content) in files {
            let path = dir.join(name);
            fs::write(&path, content)?;
            written.push(path);
        }

        tracing::info!(
            dir = %dir.display(),
            files = written.len(),
            "Exported problem package"
        );
        Ok(written)
    }
}

fn remove_stale(path: &Path) -> Result<(), ExportError> {
    match fs::remove_file(path) {
        Ok(()) => {
            tracing::debug!(path = %path.display(), "Removed outdated export file");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forge::pipeline::Stage;
    use crate::forge::test_support::{faulty_full_evaluation, sample_statement, suitable_evaluation};

    fn full_package() -> ProblemPackage {
        ProblemPackage {
            statement: sample_statement("Lantern Paths"),
            statement_evaluation: Some(suitable_evaluation()),
            codes: GeneratedCodes::complete("// gen\n", "// val\n", "// sol\n"),
            full_evaluation: Some(faulty_full_evaluation()),
        }
    }

    #[test]
    fn test_statement_markdown_sections() {
        let md = full_package().statement_markdown();

        assert!(md.starts_with("# Lantern Paths\n\n- Time limit: 1 second\n"));
        assert!(md.contains("- Memory limit: 256 MB"));
        assert!(md.contains("## Input\n\nThe first line contains $n$"));
        assert!(md.contains("## Notes\n\nPaths of length zero count.\n"));
        assert!(md.ends_with("count.\n"));
    }

    #[test]
    fn test_blank_notes_are_skipped() {
        let mut package = full_package();
        package.statement.notes = "  ".to_string();
        let md = package.statement_markdown();
        assert!(!md.contains("## Notes"));
        assert!(md.contains("## Example"));
    }

    #[test]
    fn test_evaluation_markdown() {
        let report = full_package().evaluation_markdown().expect("report");
        assert!(report.contains("- Quality score: 0.90"));
        assert!(report.contains("- Errors found: yes"));
        assert!(report.contains("### Suggestions\n\nTighten the lower bound check."));

        assert!(ProblemPackage::new(sample_statement("T"))
            .evaluation_markdown()
            .is_none());
    }

    #[test]
    fn test_from_state_requires_statement() {
        let state = PipelineState::default();
        assert!(matches!(
            ProblemPackage::from_state(&state),
            Err(ExportError::NoStatement)
        ));

        let state = PipelineState {
            stage: Stage::ReviewStatement,
            statement: Some(sample_statement("T")),
            statement_evaluation: Some(suitable_evaluation()),
            ..PipelineState::default()
        };
        let package = ProblemPackage::from_state(&state).expect("statement present");
        assert!(!package.codes.is_complete());
        assert!(package.full_evaluation.is_none());
    }

    #[test]
    fn test_write_full_package() {
        let dir = tempfile::tempdir().expect("tempdir");
        let out = dir.path().join("lantern-paths");

        let written = full_package().write_to(&out).expect("write");

        let names: Vec<String> = written
            .iter()
            .filter_map(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            vec![
                STATEMENT_MD,
                STATEMENT_JSON,
                GENERATOR_CPP,
                VALIDATOR_CPP,
                SOLUTION_CPP,
                EVALUATION_MD
            ]
        );

        let json = fs::read_to_string(out.join(STATEMENT_JSON)).expect("statement.json");
        let parsed: ProblemStatement = serde_json::from_str(&json).expect("valid json");
        assert_eq!(parsed, sample_statement("Lantern Paths"));
        assert_eq!(
            fs::read_to_string(out.join(VALIDATOR_CPP)).expect("validator.cpp"),
            "// val\n"
        );
    }

    #[test]
    fn test_write_statement_only_package() {
        let dir = tempfile::tempdir().expect("tempdir");
        let written = ProblemPackage::new(sample_statement("T"))
            .write_to(dir.path())
            .expect("write");

        assert_eq!(written.len(), 2);
        assert!(!dir.path().join(SOLUTION_CPP).exists());
        assert!(!dir.path().join(EVALUATION_MD).exists());
    }

    #[test]
    fn test_rewrite_removes_files_no_longer_present() {
        let dir = tempfile::tempdir().expect("tempdir");
        full_package().write_to(dir.path()).expect("full write");
        assert!(dir.path().join(GENERATOR_CPP).exists());

        let written = ProblemPackage::new(sample_statement("Lantern Paths"))
            .write_to(dir.path())
            .expect("statement-only write");

        assert_eq!(written.len(), 2);
        for name in [GENERATOR_CPP, VALIDATOR_CPP, SOLUTION_CPP, EVALUATION_MD] {
            assert!(!dir.path().join(name).exists(), "{} left behind", name);
        }
        assert!(dir.path().join(STATEMENT_MD).exists());
    }

    #[test]
    fn test_write_to_file_path_fails() {
        let file = tempfile::NamedTempFile::new().expect("temp file");
        let err = full_package().write_to(file.path()).unwrap_err();
        assert!(matches!(err, ExportError::NotADirectory(_)));
    }
}
