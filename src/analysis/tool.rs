//! External taint analysis tool.

use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    process::Stdio,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use failure::Error;
use tokio::{
    fs,
    io::{AsyncRead, AsyncReadExt},
    process::{Child, Command},
};

use crate::{error::ErrorKind, Config};

/// Arguments of one analysis run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    input: PathBuf,
    platforms: PathBuf,
    sources_and_sinks: PathBuf,
    output: PathBuf,
}

impl Invocation {
    /// Creates a new invocation. All four paths are required.
    pub fn new<I, P, S, O>(
        input: I,
        platforms: P,
        sources_and_sinks: S,
        output: O,
    ) -> Result<Self, Error>
    where
        I: Into<PathBuf>,
        P: Into<PathBuf>,
        S: Into<PathBuf>,
        O: Into<PathBuf>,
    {
        let invocation = Self {
            input: input.into(),
            platforms: platforms.into(),
            sources_and_sinks: sources_and_sinks.into(),
            output: output.into(),
        };

        for (name, path) in &[
            ("input package", &invocation.input),
            ("Android platforms", &invocation.platforms),
            ("sources and sinks", &invocation.sources_and_sinks),
            ("output", &invocation.output),
        ] {
            if path.as_os_str().is_empty() {
                return Err(ErrorKind::Config {
                    message: format!("the {} path of the analysis is empty", name),
                }
                .into());
            }
        }

        Ok(invocation)
    }

    /// Gets the package to analyze.
    pub fn input(&self) -> &Path {
        &self.input
    }

    /// Gets the Android platforms folder.
    pub fn platforms(&self) -> &Path {
        &self.platforms
    }

    /// Gets the sources and sinks definition file.
    pub fn sources_and_sinks(&self) -> &Path {
        &self.sources_and_sinks
    }

    /// Gets the path where the result document must be written.
    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Gets the command line arguments understood by `soot-infoflow-cmd`.
    pub fn args(&self) -> Vec<OsString> {
        vec![
            OsString::from("-a"),
            self.input.clone().into_os_string(),
            OsString::from("-p"),
            self.platforms.clone().into_os_string(),
            OsString::from("-s"),
            self.sources_and_sinks.clone().into_os_string(),
            OsString::from("-o"),
            self.output.clone().into_os_string(),
        ]
    }
}

/// What an analysis run left behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolRun {
    success: bool,
    exit_code: Option<i32>,
    captured_text: String,
    output_exists: bool,
}

impl ToolRun {
    /// Creates a new run summary.
    pub fn new<S: Into<String>>(
        success: bool,
        exit_code: Option<i32>,
        captured_text: S,
        output_exists: bool,
    ) -> Self {
        Self {
            success,
            exit_code,
            captured_text: captured_text.into(),
            output_exists,
        }
    }

    /// Checks if the process exited successfully.
    pub fn is_success(&self) -> bool {
        self.success
    }

    /// Gets the exit code of the process, if it exited normally.
    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    /// Gets the standard output followed by the standard error of the process.
    pub fn captured_text(&self) -> &str {
        &self.captured_text
    }

    /// Consumes the run, returning the captured text.
    pub fn into_captured_text(self) -> String {
        self.captured_text
    }

    /// Checks if the result document was written.
    pub fn output_exists(&self) -> bool {
        self.output_exists
    }
}

/// Capability of running the taint analysis.
#[async_trait]
pub trait AnalysisTool: Send + Sync {
    /// Runs the analysis to completion.
    ///
    /// Errors are reserved for runs that could not be observed to the end: the process could
    /// not be started, its output exceeded the buffer ceiling or it timed out.
    async fn run(&self, invocation: &Invocation) -> Result<ToolRun, Error>;
}

/// FlowDroid, run as `java -jar soot-infoflow-cmd.jar`.
#[derive(Debug, Clone)]
pub struct FlowDroid {
    java: String,
    jar: PathBuf,
    timeout: Duration,
    ceiling: usize,
}

impl FlowDroid {
    /// Creates the tool from the configuration.
    pub fn new(config: &Config) -> Self {
        Self {
            java: config.java_bin().to_owned(),
            jar: config.analyzer_jar().to_path_buf(),
            timeout: config.tool_timeout(),
            ceiling: config.max_output_buffer(),
        }
    }
}

#[async_trait]
impl AnalysisTool for FlowDroid {
    async fn run(&self, invocation: &Invocation) -> Result<ToolRun, Error> {
        let mut command = Command::new(&self.java);
        let _ = command
            .arg("-jar")
            .arg(&self.jar)
            .args(invocation.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        info!(
            "executing command: {} -jar {} {}",
            self.java,
            self.jar.display(),
            invocation
                .args()
                .iter()
                .map(|arg| arg.to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join(" ")
        );

        let start = Instant::now();
        let child = command.spawn().map_err(|e| ErrorKind::ToolExecution {
            message: format!("could not start `{}`: {}", self.java, e),
            output: String::new(),
        })?;

        let (success, exit_code, captured_text) =
            match tokio::time::timeout(self.timeout, execute(child, self.ceiling)).await {
                Ok(result) => result?,
                Err(_) => {
                    return Err(ErrorKind::Timeout {
                        seconds: self.timeout.as_secs(),
                    }
                    .into());
                }
            };
        debug!(
            "the analysis tool exited with {:?} after {:.1}s",
            exit_code,
            start.elapsed().as_secs_f64()
        );
        debug!("complete output:\n{}", captured_text);

        let output_exists = fs::metadata(invocation.output()).await.is_ok();
        Ok(ToolRun::new(success, exit_code, captured_text, output_exists))
    }
}

/// Reasons to stop reading the output of the tool.
enum CaptureError {
    Io(std::io::Error),
    Overflow(Vec<u8>),
}

/// Waits for the process, capturing its output.
///
/// The child is killed when this future is dropped, so a timeout also stops the analysis.
async fn execute(mut child: Child, ceiling: usize) -> Result<(bool, Option<i32>, String), Error> {
    let (stdout, stderr) = match (child.stdout.take(), child.stderr.take()) {
        (Some(stdout), Some(stderr)) => (stdout, stderr),
        _ => {
            return Err(ErrorKind::ToolExecution {
                message: "the output of the analysis tool could not be captured".to_owned(),
                output: String::new(),
            }
            .into());
        }
    };

    let (stdout, stderr) =
        match tokio::try_join!(capture(stdout, ceiling), capture(stderr, ceiling)) {
            Ok(streams) => streams,
            Err(CaptureError::Overflow(partial)) => {
                if let Err(e) = child.kill().await {
                    warn!("could not stop the analysis tool: {}", e);
                }
                return Err(ErrorKind::BufferOverflow {
                    limit: ceiling,
                    output: String::from_utf8_lossy(&partial).into_owned(),
                }
                .into());
            }
            Err(CaptureError::Io(e)) => {
                return Err(ErrorKind::ToolExecution {
                    message: format!("could not read the output of the analysis tool: {}", e),
                    output: String::new(),
                }
                .into());
            }
        };

    let status = child.wait().await.map_err(|e| ErrorKind::ToolExecution {
        message: format!("could not wait for the analysis tool: {}", e),
        output: String::new(),
    })?;

    let mut captured_text = String::from_utf8_lossy(&stdout).into_owned();
    captured_text.push_str(&String::from_utf8_lossy(&stderr));

    Ok((status.success(), status.code(), captured_text))
}

/// Reads a whole stream, giving up once it grows over `ceiling` bytes.
async fn capture<R: AsyncRead + Unpin>(mut reader: R, ceiling: usize) -> Result<Vec<u8>, CaptureError> {
    let mut buffer = Vec::new();
    let mut chunk = [0_u8; 8192];

    loop {
        let read = reader.read(&mut chunk).await.map_err(CaptureError::Io)?;
        if read == 0 {
            return Ok(buffer);
        }
        if buffer.len() + read > ceiling {
            let room = ceiling - buffer.len();
            buffer.extend_from_slice(&chunk[..room]);
            return Err(CaptureError::Overflow(buffer));
        }
        buffer.extend_from_slice(&chunk[..read]);
    }
}

#[cfg(test)]
mod tests {
    use super::{capture, CaptureError, Invocation};
    use std::ffi::OsString;

    #[test]
    fn it_invocation() {
        let invocation = Invocation::new(
            "input/app.apk",
            "/opt/android/platforms",
            "tools/SourcesAndSinks.txt",
            "output/app.xml",
        )
        .unwrap();

        assert_eq!(
            invocation.args(),
            vec![
                OsString::from("-a"),
                OsString::from("input/app.apk"),
                OsString::from("-p"),
                OsString::from("/opt/android/platforms"),
                OsString::from("-s"),
                OsString::from("tools/SourcesAndSinks.txt"),
                OsString::from("-o"),
                OsString::from("output/app.xml"),
            ]
        );
    }

    #[test]
    fn it_invocation_requires_paths() {
        assert!(Invocation::new("app.apk", "", "sas.txt", "app.xml").is_err());
        assert!(Invocation::new("", "platforms", "sas.txt", "app.xml").is_err());
        assert!(Invocation::new("app.apk", "platforms", "", "app.xml").is_err());
        assert!(Invocation::new("app.apk", "platforms", "sas.txt", "").is_err());
    }

    #[tokio::test]
    async fn it_capture() {
        let text: &[u8] = b"Found 3 leaks";
        match capture(text, 64).await {
            Ok(captured) => assert_eq!(captured, b"Found 3 leaks".to_vec()),
            Err(_) => panic!("the output fits in the buffer"),
        }

        let long = vec![b'x'; 20_000];
        match capture(long.as_slice(), 10_000).await {
            Err(CaptureError::Overflow(partial)) => assert_eq!(partial.len(), 10_000),
            _ => panic!("the output does not fit in the buffer"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn it_flowdroid_missing_java() {
        use super::{AnalysisTool, FlowDroid};
        use crate::{error::ErrorKind, Config};

        let mut config: Config = toml::from_str("java_bin = \"/nonexistent/java\"").unwrap();
        config.set_platforms_folder("platforms");
        let tool = FlowDroid::new(&config);
        let invocation = Invocation::new("app.apk", "platforms", "sas.txt", "app.xml").unwrap();

        let error = tool.run(&invocation).await.unwrap_err();
        match error.downcast_ref::<ErrorKind>() {
            Some(ErrorKind::ToolExecution { .. }) => {}
            other => panic!("unexpected error: {:?}", other),
        }
    }

    /// Writes an executable shell script standing in for the Java binary.
    #[cfg(unix)]
    fn fake_java(dir: &std::path::Path, script: &str) -> std::path::PathBuf {
        use std::{fs, os::unix::fs::PermissionsExt};

        let path = dir.join("java");
        fs::write(&path, format!("#!/bin/sh\n{}\n", script)).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    fn flowdroid(java: &std::path::Path, settings: &str) -> super::FlowDroid {
        let config: crate::Config =
            toml::from_str(&format!("java_bin = \"{}\"\n{}", java.display(), settings)).unwrap();
        super::FlowDroid::new(&config)
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn it_flowdroid_timeout() {
        use super::AnalysisTool;
        use crate::error::ErrorKind;
        use std::time::{Duration, Instant};

        let dir = tempfile::tempdir().unwrap();
        let tool = flowdroid(&fake_java(dir.path(), "exec sleep 30"), "tool_timeout = 1");
        let invocation = Invocation::new(
            "app.apk",
            "platforms",
            "sas.txt",
            dir.path().join("app.xml"),
        )
        .unwrap();

        let start = Instant::now();
        let error = tool.run(&invocation).await.unwrap_err();
        assert!(start.elapsed() < Duration::from_secs(20));
        match error.downcast_ref::<ErrorKind>() {
            Some(ErrorKind::Timeout { seconds }) => assert_eq!(*seconds, 1),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn it_flowdroid_buffer_overflow() {
        use super::AnalysisTool;
        use crate::error::ErrorKind;

        let dir = tempfile::tempdir().unwrap();
        let tool = flowdroid(
            &fake_java(dir.path(), "head -c 100000 /dev/zero | tr '\\0' x"),
            "max_output_buffer = 1000",
        );
        let invocation = Invocation::new(
            "app.apk",
            "platforms",
            "sas.txt",
            dir.path().join("app.xml"),
        )
        .unwrap();

        let error = tool.run(&invocation).await.unwrap_err();
        match error.downcast_ref::<ErrorKind>() {
            Some(ErrorKind::BufferOverflow { limit, output }) => {
                assert_eq!(*limit, 1000);
                assert_eq!(output.len(), 1000);
                assert!(output.chars().all(|c| c == 'x'));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn it_flowdroid_exit_status() {
        use super::AnalysisTool;
        use crate::analysis::{classify, Classification};

        let dir = tempfile::tempdir().unwrap();
        let tool = flowdroid(
            &fake_java(dir.path(), "echo starting\necho 'Found 0 leaks' >&2\nexit 3"),
            "",
        );
        let invocation = Invocation::new(
            "app.apk",
            "platforms",
            "sas.txt",
            dir.path().join("app.xml"),
        )
        .unwrap();

        let run = tool.run(&invocation).await.unwrap();
        assert!(!run.is_success());
        assert_eq!(run.exit_code(), Some(3));
        assert_eq!(run.captured_text(), "starting\nFound 0 leaks\n");
        assert!(!run.output_exists());
        assert_eq!(classify(&run), Classification::NoVulnerabilities);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn it_flowdroid_document() {
        use super::AnalysisTool;
        use crate::analysis::{classify, Classification};

        let dir = tempfile::tempdir().unwrap();
        // `-jar <jar> -a <apk> -p <platforms> -s <sources> -o <output>`
        let tool = flowdroid(
            &fake_java(
                dir.path(),
                "echo '<DataFlowResults/>' > \"${10}\"\necho 'Found 1 leaks'",
            ),
            "",
        );
        let output = dir.path().join("app.xml");
        let invocation = Invocation::new("app.apk", "platforms", "sas.txt", &output).unwrap();

        let run = tool.run(&invocation).await.unwrap();
        assert!(run.is_success());
        assert_eq!(run.exit_code(), Some(0));
        assert!(run.output_exists());
        assert!(output.exists());
        assert_eq!(classify(&run), Classification::Findings);
    }
}
