//! Analysis module.
//!
//! Runs the taint analysis tool on submitted packages, one job at a time by default, and
//! turns each run into a [`ReportOutcome`].

use std::{path::PathBuf, sync::Arc, time::Instant};

use failure::Error;
use tokio::sync::Semaphore;

use crate::{error::ErrorKind, Config};

mod job;
mod outcome;
mod tool;

pub use self::{
    job::{AnalysisJob, JobStatus},
    outcome::{
        classify, Classification, FailureKind, ReportOutcome, MISSING_OUTPUT_MESSAGE,
        NO_LEAKS_PHRASE, NO_VULNERABILITIES_MESSAGE,
    },
    tool::{AnalysisTool, FlowDroid, Invocation, ToolRun},
};

/// Runs analysis jobs with a bounded number of concurrent tool processes.
pub struct Orchestrator {
    tool: Arc<dyn AnalysisTool>,
    platforms: PathBuf,
    sources_and_sinks: PathBuf,
    queue: Semaphore,
}

impl Orchestrator {
    /// Creates an orchestrator running FlowDroid as configured.
    pub fn from_config(config: &Config) -> Self {
        Self::new(config, Arc::new(FlowDroid::new(config)))
    }

    /// Creates an orchestrator running the given tool.
    pub fn new(config: &Config, tool: Arc<dyn AnalysisTool>) -> Self {
        Self {
            tool,
            platforms: config.platforms_folder().to_path_buf(),
            sources_and_sinks: config.sources_and_sinks().to_path_buf(),
            queue: Semaphore::new(config.max_concurrent_jobs().max(1)),
        }
    }

    /// Runs the analysis of the given job and removes its files.
    ///
    /// Jobs wait in arrival order while all the analysis slots are taken. The result document,
    /// if any, is read into memory before the files are removed.
    pub async fn run(&self, job: &mut AnalysisJob) -> ReportOutcome {
        let outcome = self.execute(job).await;
        job.set_status(match outcome {
            ReportOutcome::NoVulnerabilities { .. } => JobStatus::SucceededNoFindings,
            ReportOutcome::Findings { .. } => JobStatus::Succeeded,
            ReportOutcome::Failed { .. } => JobStatus::Failed,
        });
        job.cleanup().await;
        outcome
    }

    async fn execute(&self, job: &mut AnalysisJob) -> ReportOutcome {
        let invocation = match Invocation::new(
            job.input_path(),
            &self.platforms,
            &self.sources_and_sinks,
            job.output_path(),
        ) {
            Ok(invocation) => invocation,
            Err(e) => return ReportOutcome::failed(FailureKind::ExecutionError, e.to_string(), ""),
        };

        let _permit = match self.queue.acquire().await {
            Ok(permit) => permit,
            Err(e) => {
                return ReportOutcome::failed(
                    FailureKind::ExecutionError,
                    format!("the analysis queue is closed: {}", e),
                    "",
                );
            }
        };

        job.set_status(JobStatus::Running);
        info!("job {}: analyzing `{}`", job.id(), job.input_path().display());
        let start = Instant::now();

        let run = match self.tool.run(&invocation).await {
            Ok(run) => run,
            Err(e) => {
                error!("job {}: {}", job.id(), e);
                return failure_from_error(&e);
            }
        };
        info!(
            "job {}: the analysis tool finished in {:.1}s",
            job.id(),
            start.elapsed().as_secs_f64()
        );

        match classify(&run) {
            Classification::NoVulnerabilities => ReportOutcome::NoVulnerabilities {
                message: NO_VULNERABILITIES_MESSAGE.to_owned(),
                output: run.into_captured_text(),
            },
            Classification::ExecutionError => {
                let message = match run.exit_code() {
                    Some(code) => format!("the analysis tool exited with status {}", code),
                    None => "the analysis tool was terminated by a signal".to_owned(),
                };
                error!("job {}: {}", job.id(), message);
                ReportOutcome::failed(FailureKind::ExecutionError, message, run.into_captured_text())
            }
            Classification::Findings => match tokio::fs::read(job.output_path()).await {
                Ok(document) => ReportOutcome::Findings { document },
                Err(e) => {
                    error!(
                        "job {}: could not read `{}`: {}",
                        job.id(),
                        job.output_path().display(),
                        e
                    );
                    let error = ErrorKind::Transport {
                        message: format!("the result document could not be read: {}", e),
                    };
                    ReportOutcome::failed(
                        FailureKind::Transport,
                        error.to_string(),
                        run.into_captured_text(),
                    )
                }
            },
            Classification::MissingOutput => {
                warn!("job {}: {}", job.id(), ErrorKind::MissingOutput);
                ReportOutcome::failed(
                    FailureKind::MissingOutput,
                    MISSING_OUTPUT_MESSAGE,
                    run.into_captured_text(),
                )
            }
        }
    }
}

/// Maps an error of the analysis tool to a failed outcome.
fn failure_from_error(error: &Error) -> ReportOutcome {
    match error.downcast_ref::<ErrorKind>() {
        Some(kind @ ErrorKind::BufferOverflow { .. }) => ReportOutcome::failed(
            FailureKind::BufferOverflow,
            kind.to_string(),
            kind.output().unwrap_or_default(),
        ),
        Some(kind @ ErrorKind::Timeout { .. }) => {
            ReportOutcome::failed(FailureKind::Timeout, kind.to_string(), "")
        }
        Some(kind) => ReportOutcome::failed(
            FailureKind::ExecutionError,
            kind.to_string(),
            kind.output().unwrap_or_default(),
        ),
        None => ReportOutcome::failed(FailureKind::ExecutionError, error.to_string(), ""),
    }
}
