//! Classification of analysis runs.

use std::fmt;

use super::tool::ToolRun;

/// Line printed by FlowDroid when the analysis found no leak.
pub const NO_LEAKS_PHRASE: &str = "Found 0 leaks";

/// Message returned when the analysis found no leak.
pub const NO_VULNERABILITIES_MESSAGE: &str = "Analysis complete - No vulnerabilities detected";

/// Message returned when the tool exited cleanly but wrote no result document.
pub const MISSING_OUTPUT_MESSAGE: &str =
    "Analysis process completed but no output file was generated";

/// Verdict on a completed run, before the result document is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// The tool reported zero leaks.
    NoVulnerabilities,
    /// The tool exited with a failure status.
    ExecutionError,
    /// The result document is available.
    Findings,
    /// The tool exited cleanly without a result document.
    MissingOutput,
}

/// Classifies a completed run.
///
/// The zero leaks line wins over everything else, so a stale document left by a previous
/// run is never reported as findings.
pub fn classify(run: &ToolRun) -> Classification {
    if run.captured_text().contains(NO_LEAKS_PHRASE) {
        Classification::NoVulnerabilities
    } else if !run.is_success() {
        Classification::ExecutionError
    } else if run.output_exists() {
        Classification::Findings
    } else {
        Classification::MissingOutput
    }
}

/// Reasons for an analysis to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The tool could not be started or exited with a failure status.
    ExecutionError,
    /// The tool wrote more output than allowed.
    BufferOverflow,
    /// The tool did not finish in time.
    Timeout,
    /// The tool exited cleanly without a result document.
    MissingOutput,
    /// The result document exists but could not be read back.
    Transport,
}

impl FailureKind {
    /// Short label of the failure, as sent in the `error` field of the gateway answer.
    pub fn label(self) -> &'static str {
        match self {
            FailureKind::ExecutionError => "Execution error",
            FailureKind::BufferOverflow => "Output buffer exceeded",
            FailureKind::Timeout => "Analysis timed out",
            FailureKind::MissingOutput => "Missing output file",
            FailureKind::Transport => "Error sending file",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Result of one analysis job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportOutcome {
    /// The analysis found no leak.
    NoVulnerabilities {
        /// Message for the user.
        message: String,
        /// Captured output of the tool.
        output: String,
    },
    /// The analysis produced a result document.
    Findings {
        /// Raw XML result document.
        document: Vec<u8>,
    },
    /// The analysis failed.
    Failed {
        /// What went wrong.
        kind: FailureKind,
        /// Message for the user.
        message: String,
        /// Captured output of the tool, if any.
        output: String,
    },
}

impl ReportOutcome {
    /// Creates a failed outcome.
    pub fn failed<M, O>(kind: FailureKind, message: M, output: O) -> Self
    where
        M: Into<String>,
        O: Into<String>,
    {
        ReportOutcome::Failed {
            kind,
            message: message.into(),
            output: output.into(),
        }
    }

    /// Checks if the outcome is a failure.
    pub fn is_failure(&self) -> bool {
        match self {
            ReportOutcome::Failed { .. } => true,
            _ => false,
        }
    }
}
