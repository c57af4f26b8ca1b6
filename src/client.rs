//! Gateway client.
//!
//! Uploads packages to a running gateway and decides, from the status and content type of
//! the answer, what the gateway meant.

use std::path::Path;

use failure::{Error, ResultExt};
use reqwest::{
    header::CONTENT_TYPE,
    multipart::{Form, Part},
};

use crate::{
    error::ErrorKind,
    results::{parse, Report},
    server::{is_package, UPLOAD_FIELD},
};

/// Media type of Android packages.
const PACKAGE_MIME: &str = "application/vnd.android.package-archive";

/// Message shown when the gateway did not send one.
const NO_VULNERABILITIES: &str = "No vulnerabilities detected in the APK file";

/// Answer of the gateway to an analysis request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisResponse {
    /// The analysis found no leak.
    NoVulnerabilities {
        /// Message of the gateway.
        message: String,
    },
    /// The analysis produced a result document.
    Report(Report),
    /// The analysis failed, or the gateway answered something unexpected.
    Failure {
        /// HTTP status of the answer.
        status: u16,
        /// What went wrong.
        message: String,
        /// Short error label, if the gateway sent one.
        error: Option<String>,
        /// Captured output of the analysis tool, if the gateway sent it.
        output: Option<String>,
    },
}

/// JSON body of the gateway answers.
#[derive(Debug, Default, Deserialize)]
struct GatewayMessage {
    message: Option<String>,
    #[serde(rename = "vulnerabilitiesFound")]
    vulnerabilities_found: Option<bool>,
    error: Option<String>,
    output: Option<String>,
}

impl AnalysisResponse {
    /// Decides the kind of answer from its status, content type and body.
    ///
    /// Only a successful answer that is not JSON is parsed as a result document.
    pub fn from_parts(
        status: u16,
        content_type: Option<&str>,
        body: &[u8],
    ) -> Result<Self, Error> {
        let is_json = content_type
            .and_then(|content_type| content_type.split(';').next())
            .map_or(false, |mime| mime.trim().eq_ignore_ascii_case("application/json"));

        if !(200..300).contains(&status) {
            let decoded = if is_json {
                serde_json::from_slice::<GatewayMessage>(body).ok()
            } else {
                None
            };
            let response = match decoded {
                Some(decoded) => AnalysisResponse::Failure {
                    status,
                    message: decoded
                        .message
                        .unwrap_or_else(|| format!("the gateway answered with status {}", status)),
                    error: decoded.error,
                    output: decoded.output,
                },
                None => {
                    let text = String::from_utf8_lossy(body).trim().to_owned();
                    AnalysisResponse::Failure {
                        status,
                        message: if text.is_empty() {
                            format!("the gateway answered with status {}", status)
                        } else {
                            text
                        },
                        error: None,
                        output: None,
                    }
                }
            };
            return Ok(response);
        }

        if is_json {
            let decoded: GatewayMessage =
                serde_json::from_slice(body).map_err(|e| ErrorKind::Parse {
                    message: format!("invalid JSON answer from the gateway: {}", e),
                })?;

            return Ok(if decoded.vulnerabilities_found == Some(false) {
                AnalysisResponse::NoVulnerabilities {
                    message: decoded
                        .message
                        .unwrap_or_else(|| NO_VULNERABILITIES.to_owned()),
                }
            } else if decoded.error.is_some() {
                AnalysisResponse::Failure {
                    status,
                    message: decoded
                        .message
                        .unwrap_or_else(|| "the analysis failed".to_owned()),
                    error: decoded.error,
                    output: decoded.output,
                }
            } else {
                AnalysisResponse::Failure {
                    status,
                    message: "unexpected answer from the gateway".to_owned(),
                    error: None,
                    output: decoded.output,
                }
            });
        }

        Ok(AnalysisResponse::Report(parse(body)?))
    }

    /// Checks if the answer is a failure.
    pub fn is_failure(&self) -> bool {
        match self {
            AnalysisResponse::Failure { .. } => true,
            _ => false,
        }
    }
}

/// Client of the analysis gateway.
#[derive(Debug, Clone)]
pub struct Client {
    http: reqwest::Client,
    server_url: String,
}

impl Client {
    /// Creates a client for the gateway at the given base URL.
    pub fn new<S: Into<String>>(server_url: S) -> Self {
        Self {
            http: reqwest::Client::new(),
            server_url: server_url.into(),
        }
    }

    /// Gets the URL analysis requests are sent to.
    pub fn endpoint(&self) -> String {
        format!("{}/apk", self.server_url.trim_end_matches('/'))
    }

    /// Uploads the given package and waits for the analysis.
    ///
    /// Files without the `.apk` extension are rejected before anything is sent.
    pub async fn submit<P: AsRef<Path>>(&self, package: P) -> Result<AnalysisResponse, Error> {
        let package = package.as_ref();
        let file_name = package
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        if !is_package(&file_name) {
            return Err(ErrorKind::InvalidInput {
                message: "please select a valid APK file".to_owned(),
            }
            .into());
        }

        let bytes = tokio::fs::read(package)
            .await
            .context(format!("could not read {}", package.display()))?;
        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(PACKAGE_MIME)
            .map_err(|e| ErrorKind::Http {
                message: e.to_string(),
            })?;
        let form = Form::new().part(UPLOAD_FIELD, part);

        info!("uploading {} to {}", package.display(), self.endpoint());
        let response = self
            .http
            .post(&self.endpoint())
            .multipart(form)
            .send()
            .await
            .map_err(|e| ErrorKind::Http {
                message: e.to_string(),
            })?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        let body = response.bytes().await.map_err(|e| ErrorKind::Http {
            message: e.to_string(),
        })?;
        debug!(
            "the gateway answered {} ({}, {} bytes)",
            status,
            content_type.as_ref().map_or("no content type", String::as_str),
            body.len()
        );

        AnalysisResponse::from_parts(status, content_type.as_ref().map(String::as_str), &body)
    }
}
