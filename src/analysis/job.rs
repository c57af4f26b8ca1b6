//! Analysis jobs and their workspaces.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use uuid::Uuid;

/// Lifecycle of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    /// Waiting for an analysis slot.
    Pending,
    /// The analysis tool is running.
    Running,
    /// The analysis produced a result document.
    Succeeded,
    /// The analysis found no leak.
    SucceededNoFindings,
    /// The analysis failed.
    Failed,
}

/// One submitted package and the files created for it.
///
/// Every file and folder of the job is removed when the job is dropped.
#[derive(Debug)]
pub struct AnalysisJob {
    id: Uuid,
    input_path: PathBuf,
    output_path: PathBuf,
    workspace: Vec<PathBuf>,
    fingerprint: Option<String>,
    status: JobStatus,
    cleaned: bool,
}

impl AnalysisJob {
    /// Creates a new pending job.
    pub fn new<I: Into<PathBuf>, O: Into<PathBuf>>(id: Uuid, input_path: I, output_path: O) -> Self {
        Self {
            id,
            input_path: input_path.into(),
            output_path: output_path.into(),
            workspace: Vec::new(),
            fingerprint: None,
            status: JobStatus::Pending,
            cleaned: false,
        }
    }

    /// Adds folders owned by the job. They are removed recursively on cleanup.
    pub fn with_workspace<I>(mut self, folders: I) -> Self
    where
        I: IntoIterator<Item = PathBuf>,
    {
        self.workspace.extend(folders);
        self
    }

    /// Sets the SHA-256 fingerprint of the submitted package.
    pub fn with_fingerprint<S: Into<String>>(mut self, fingerprint: S) -> Self {
        self.fingerprint = Some(fingerprint.into());
        self
    }

    /// Gets the identifier of the job.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Gets the path of the submitted package.
    pub fn input_path(&self) -> &Path {
        &self.input_path
    }

    /// Gets the path where the result document is expected.
    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Gets the fingerprint of the submitted package, if computed.
    pub fn fingerprint(&self) -> Option<&str> {
        self.fingerprint.as_ref().map(String::as_str)
    }

    /// Gets the current status of the job.
    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub(crate) fn set_status(&mut self, status: JobStatus) {
        debug!("job {}: {:?} -> {:?}", self.id, self.status, status);
        self.status = status;
    }

    /// Removes every file and folder of the job.
    ///
    /// Running it more than once is harmless. Failures are logged and never returned.
    pub async fn cleanup(&mut self) {
        if self.cleaned {
            return;
        }
        self.cleaned = true;

        report(&self.input_path, tokio::fs::remove_file(&self.input_path).await);
        report(&self.output_path, tokio::fs::remove_file(&self.output_path).await);
        for folder in &self.workspace {
            report(folder, tokio::fs::remove_dir_all(folder).await);
        }
        debug!("job {}: workspace removed", self.id);
    }
}

impl Drop for AnalysisJob {
    fn drop(&mut self) {
        if self.cleaned {
            return;
        }
        self.cleaned = true;

        report(&self.input_path, fs::remove_file(&self.input_path));
        report(&self.output_path, fs::remove_file(&self.output_path));
        for folder in &self.workspace {
            report(folder, fs::remove_dir_all(folder));
        }
        debug!("job {}: workspace removed on drop", self.id);
    }
}

/// Logs a failed removal. Paths already gone are fine.
fn report(path: &Path, result: io::Result<()>) {
    match result {
        Ok(()) => {}
        Err(ref e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!("could not remove `{}`: {}", path.display(), e),
    }
}
