//! Gateway tests, through the HTTP routes and with a scripted analysis tool.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use failure::Error;
use warp::{http::StatusCode, hyper::body::Bytes};

use super::{outcome_reply, routes, Gateway, Workspace};
use crate::{
    analysis::{
        AnalysisTool, FailureKind, Invocation, Orchestrator, ReportOutcome, ToolRun,
        MISSING_OUTPUT_MESSAGE,
    },
    Config,
};

const BOUNDARY: &str = "------------------------apkleakanalyzer";

const PACKAGE: &[u8] = b"PK\x03\x04 not really a package";

const DOCUMENT: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
<DataFlowResults TerminationState=\"Success\"><Results><Result>\
<Sink Statement=\"log\" Method=\"m\" MethodSourceSinkDefinition=\"d\"/>\
<Sources><Source Statement=\"imei\" Method=\"m\" MethodSourceSinkDefinition=\"s\"/></Sources>\
</Result></Results></DataFlowResults>";

/// Tool writing a fixed document and recording what it was asked to do.
struct Recording {
    text: &'static str,
    document: Option<&'static str>,
    invocations: Mutex<Vec<(PathBuf, PathBuf)>>,
    packages: Mutex<Vec<Vec<u8>>>,
}

impl Recording {
    fn new(text: &'static str, document: Option<&'static str>) -> Arc<Self> {
        Arc::new(Self {
            text,
            document,
            invocations: Mutex::new(Vec::new()),
            packages: Mutex::new(Vec::new()),
        })
    }

    fn invocations(&self) -> Vec<(PathBuf, PathBuf)> {
        self.invocations.lock().unwrap().clone()
    }

    /// Contents of the packages the tool was run on.
    fn packages(&self) -> Vec<Vec<u8>> {
        self.packages.lock().unwrap().clone()
    }
}

#[async_trait]
impl AnalysisTool for Recording {
    async fn run(&self, invocation: &Invocation) -> Result<ToolRun, Error> {
        self.packages
            .lock()
            .unwrap()
            .push(fs::read(invocation.input())?);
        self.invocations.lock().unwrap().push((
            invocation.input().to_path_buf(),
            invocation.output().to_path_buf(),
        ));

        if let Some(document) = self.document {
            fs::write(invocation.output(), document)?;
        }
        Ok(ToolRun::new(
            true,
            Some(0),
            self.text,
            invocation.output().exists(),
        ))
    }
}

fn gateway(root: &Path, tool: Arc<Recording>) -> Arc<Gateway> {
    let mut config = Config::default();
    config.set_platforms_folder("/opt/android/platforms");

    Arc::new(Gateway::new(
        Orchestrator::new(&config, tool),
        Workspace::new(root.join("input"), root.join("output")),
        1024 * 1024,
    ))
}

fn multipart(field: &str, file_name: &str, contents: &[u8]) -> Vec<u8> {
    let mut body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file}\"\r\n\
         Content-Type: application/vnd.android.package-archive\r\n\r\n",
        b = BOUNDARY,
        field = field,
        file = file_name
    )
    .into_bytes();
    body.extend_from_slice(contents);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

async fn upload(
    gateway: Arc<Gateway>,
    field: &str,
    file_name: &str,
) -> warp::http::Response<Bytes> {
    post(gateway, multipart(field, file_name, PACKAGE)).await
}

async fn post(gateway: Arc<Gateway>, body: Vec<u8>) -> warp::http::Response<Bytes> {
    warp::test::request()
        .method("POST")
        .path("/apk")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(body)
        .reply(&routes(gateway))
        .await
}

fn json(body: &[u8]) -> serde_json::Value {
    serde_json::from_slice(body).unwrap()
}

/// Counts the files left anywhere under the given folder.
fn files_in(folder: &Path) -> usize {
    match fs::read_dir(folder) {
        Ok(entries) => entries
            .filter_map(Result::ok)
            .map(|entry| {
                let path = entry.path();
                if path.is_dir() {
                    files_in(&path)
                } else {
                    1
                }
            })
            .sum(),
        Err(_) => 0,
    }
}

#[tokio::test]
async fn it_no_vulnerabilities() {
    let dir = tempfile::tempdir().unwrap();
    // The tool writes a document, but the zero leaks line decides.
    let tool = Recording::new("[main] INFO - Found 0 leaks", Some(DOCUMENT));

    let response = upload(gateway(dir.path(), tool.clone()), "apkFile", "app.apk").await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = json(response.body());
    assert_eq!(body["vulnerabilitiesFound"], false);
    assert_eq!(
        body["message"],
        "Analysis complete - No vulnerabilities detected"
    );
    assert!(body["output"].as_str().unwrap().contains("Found 0 leaks"));

    assert_eq!(tool.packages(), vec![PACKAGE.to_vec()]);
    let invocations = tool.invocations();
    assert_eq!(invocations.len(), 1);
    assert!(!invocations[0].0.exists());
    assert!(!invocations[0].1.exists());
    assert_eq!(files_in(dir.path()), 0);
}

#[tokio::test]
async fn it_findings() {
    let dir = tempfile::tempdir().unwrap();
    let tool = Recording::new("Found 1 leaks", Some(DOCUMENT));

    let response = upload(gateway(dir.path(), tool.clone()), "apkFile", "app.apk").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "application/xml");
    assert_eq!(response.body().as_ref(), DOCUMENT.as_bytes());

    assert_eq!(tool.packages(), vec![PACKAGE.to_vec()]);
    let (input, output) = tool.invocations().remove(0);
    assert!(input.to_string_lossy().ends_with("-app.apk"));
    assert!(output.to_string_lossy().ends_with("-app.xml"));
    assert!(!input.exists());
    assert!(!output.exists());
}

#[tokio::test]
async fn it_missing_output() {
    let dir = tempfile::tempdir().unwrap();
    let tool = Recording::new("Soot finished", None);

    let response = upload(gateway(dir.path(), tool.clone()), "apkFile", "app.apk").await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json(response.body());
    assert_eq!(body["message"], MISSING_OUTPUT_MESSAGE);
    assert_eq!(body["error"], "Missing output file");
    assert_eq!(body["output"], "Soot finished");
    assert_eq!(files_in(dir.path()), 0);
}

#[tokio::test]
async fn it_skips_other_fields() {
    let dir = tempfile::tempdir().unwrap();
    let tool = Recording::new("Found 1 leaks", Some(DOCUMENT));

    let mut body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"comment\"\r\n\r\nfirst build\r\n",
        b = BOUNDARY
    )
    .into_bytes();
    body.extend(multipart("apkFile", "app.apk", PACKAGE));

    let response = post(gateway(dir.path(), tool.clone()), body).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.body().as_ref(), DOCUMENT.as_bytes());
    assert_eq!(tool.packages(), vec![PACKAGE.to_vec()]);
    assert_eq!(files_in(dir.path()), 0);
}

#[tokio::test]
async fn it_rejects_other_files() {
    let dir = tempfile::tempdir().unwrap();
    let tool = Recording::new("Found 0 leaks", None);

    let response = upload(gateway(dir.path(), tool.clone()), "apkFile", "app.txt").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        response.body().as_ref(),
        &b"Invalid file type. Please upload an APK file."[..]
    );
    assert!(tool.invocations().is_empty());
    assert_eq!(files_in(dir.path()), 0);
}

#[tokio::test]
async fn it_requires_file() {
    let dir = tempfile::tempdir().unwrap();
    let tool = Recording::new("Found 0 leaks", None);

    let response = upload(gateway(dir.path(), tool.clone()), "document", "app.apk").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(response.body().as_ref(), &b"No file uploaded"[..]);
    assert!(tool.invocations().is_empty());
}

#[test]
fn it_outcome_reply() {
    let response = outcome_reply(ReportOutcome::failed(
        FailureKind::Timeout,
        "the analysis did not finish within 1800 seconds",
        "",
    ));
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.headers()["content-type"], "application/json");

    let response = outcome_reply(ReportOutcome::failed(FailureKind::Transport, "gone", ""));
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/plain"));
}
