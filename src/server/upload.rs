//! Upload handling: validation and per-job workspaces.

use std::path::{Path, PathBuf};

use chrono::Utc;
use failure::{Error, ResultExt};
use futures::TryStreamExt;
use tokio::fs;
use uuid::Uuid;
use warp::{
    multipart::{FormData, Part},
    Buf,
};

use crate::{analysis::AnalysisJob, error::ErrorKind, fingerprint, package_name, Config};

/// Multipart field carrying the package.
pub const UPLOAD_FIELD: &str = "apkFile";

/// Extension accepted for uploaded packages.
const PACKAGE_EXTENSION: &str = ".apk";

/// A file received from a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    name: String,
    bytes: Vec<u8>,
}

impl UploadedFile {
    /// Creates a new uploaded file.
    pub fn new<S: Into<String>>(name: S, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    /// Gets the name given by the client.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Gets the contents of the file.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Checks if the given file name looks like an Android package.
pub fn is_package(name: &str) -> bool {
    name.ends_with(PACKAGE_EXTENSION)
}

/// Folders where job workspaces are created.
#[derive(Debug, Clone)]
pub struct Workspace {
    input_folder: PathBuf,
    output_folder: PathBuf,
}

impl Workspace {
    /// Creates a workspace rooted at the given folders.
    pub fn new<I: Into<PathBuf>, O: Into<PathBuf>>(input_folder: I, output_folder: O) -> Self {
        Self {
            input_folder: input_folder.into(),
            output_folder: output_folder.into(),
        }
    }

    /// Creates the workspace configured for the gateway.
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.input_folder(), config.output_folder())
    }

    /// Gets the folder holding the input workspaces.
    pub fn input_folder(&self) -> &Path {
        &self.input_folder
    }

    /// Gets the folder holding the output workspaces.
    pub fn output_folder(&self) -> &Path {
        &self.output_folder
    }

    /// Validates and stores the given file, creating its analysis job.
    ///
    /// Nothing is written if the file is not an Android package.
    pub async fn submit(&self, file: &UploadedFile) -> Result<AnalysisJob, Error> {
        let name = Path::new(file.name())
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        if !is_package(&name) {
            return Err(ErrorKind::InvalidInput {
                message: format!("`{}` is not an APK file", file.name()),
            }
            .into());
        }

        let id = Uuid::new_v4();
        let input_dir = self.input_folder.join(id.to_string());
        let output_dir = self.output_folder.join(id.to_string());

        let stored_name = format!(
            "{}-{}-{}",
            Utc::now().timestamp_millis(),
            Uuid::new_v4().as_fields().0,
            name
        );
        let input_path = input_dir.join(&stored_name);
        let output_path = output_dir.join(format!("{}.xml", package_name(&stored_name)));

        // The job owns its folders from here on, so a failure below removes them.
        let job = AnalysisJob::new(id, &input_path, output_path)
            .with_workspace(vec![input_dir.clone(), output_dir.clone()])
            .with_fingerprint(fingerprint(file.bytes()));

        fs::create_dir_all(&input_dir).await.context(format!(
            "could not create the input folder {}",
            input_dir.display()
        ))?;
        fs::create_dir_all(&output_dir).await.context(format!(
            "could not create the output folder {}",
            output_dir.display()
        ))?;
        fs::write(&input_path, file.bytes()).await.context(format!(
            "could not store the uploaded file at {}",
            input_path.display()
        ))?;

        info!(
            "job {}: received `{}` ({} bytes, SHA-256 {})",
            id,
            name,
            file.bytes().len(),
            job.fingerprint().unwrap_or_default()
        );
        Ok(job)
    }
}

/// Extracts the package field from a multipart form.
///
/// Returns `None` if the form has no such field. Other fields are skipped. Parts are read one
/// at a time, since a part must be released before the next one can be polled.
pub async fn extract_package(mut form: FormData) -> Result<Option<UploadedFile>, Error> {
    while let Some(part) = form.try_next().await.map_err(|e| ErrorKind::InvalidInput {
        message: format!("the multipart form could not be read: {}", e),
    })? {
        if part.name() != UPLOAD_FIELD {
            continue;
        }
        let name = part.filename().unwrap_or_default().to_owned();
        let bytes = read_part(part)
            .await
            .map_err(|e| ErrorKind::InvalidInput {
                message: format!("the uploaded file could not be read: {}", e),
            })?;

        return Ok(Some(UploadedFile::new(name, bytes)));
    }

    Ok(None)
}

/// Drains the contents of a form part.
async fn read_part(part: Part) -> Result<Vec<u8>, warp::Error> {
    part.stream()
        .try_fold(Vec::new(), |mut bytes, mut chunk| async move {
            while chunk.has_remaining() {
                let read = chunk.chunk().len();
                bytes.extend_from_slice(chunk.chunk());
                chunk.advance(read);
            }
            Ok(bytes)
        })
        .await
}
