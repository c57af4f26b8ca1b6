//! Analysis gateway.
//!
//! Serves `POST /apk`: the uploaded package is stored in its own workspace, analyzed, and
//! either a "no leaks" answer or the raw result document is returned.

use std::{convert::Infallible, net::ToSocketAddrs, sync::Arc};

use failure::{Error, ResultExt};
use serde_json::json;
use warp::{
    http::{header::CONTENT_TYPE, StatusCode},
    multipart::FormData,
    reply::{self, Reply, Response},
    Filter, Rejection,
};

use crate::{
    analysis::{FailureKind, Orchestrator, ReportOutcome},
    error::ErrorKind,
    Config,
};

#[cfg(test)]
mod tests;
pub mod upload;

pub use self::upload::{extract_package, is_package, UploadedFile, Workspace, UPLOAD_FIELD};

/// Answer when the request carries no package.
pub const NO_FILE_MESSAGE: &str = "No file uploaded";
/// Answer when the uploaded file is not an Android package.
pub const INVALID_TYPE_MESSAGE: &str = "Invalid file type. Please upload an APK file.";
/// Answer when the result document could not be delivered.
pub const SEND_ERROR_MESSAGE: &str = "Error sending file";

/// State shared by the request handlers.
pub struct Gateway {
    orchestrator: Orchestrator,
    workspace: Workspace,
    max_upload_size: u64,
}

impl Gateway {
    /// Creates a new gateway.
    pub fn new(orchestrator: Orchestrator, workspace: Workspace, max_upload_size: u64) -> Self {
        Self {
            orchestrator,
            workspace,
            max_upload_size,
        }
    }

    /// Creates the gateway running FlowDroid as configured.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            Orchestrator::from_config(config),
            Workspace::from_config(config),
            config.max_upload_size(),
        )
    }

    /// Gets the workspace of the gateway.
    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    async fn analyze(&self, file: UploadedFile) -> Response {
        let mut job = match self.workspace.submit(&file).await {
            Ok(job) => job,
            Err(e) => {
                return match e.downcast_ref::<ErrorKind>() {
                    Some(ErrorKind::InvalidInput { .. }) => {
                        warn!("rejected upload: {}", e);
                        text(StatusCode::BAD_REQUEST, INVALID_TYPE_MESSAGE)
                    }
                    _ => {
                        error!("could not store the upload: {}", e);
                        failure_reply("Could not store the uploaded file", "Storage error", "")
                    }
                };
            }
        };

        let outcome = self.orchestrator.run(&mut job).await;
        outcome_reply(outcome)
    }
}

/// Builds the routes of the gateway.
pub fn routes(
    gateway: Arc<Gateway>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let max_upload_size = gateway.max_upload_size;
    let gateway_filter = warp::any().map(move || Arc::clone(&gateway));

    warp::path("apk")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::multipart::form().max_length(max_upload_size))
        .and(gateway_filter)
        .and_then(analyze_handler)
        .recover(rejection_handler)
        .with(
            warp::cors()
                .allow_any_origin()
                .allow_headers(vec!["content-type"])
                .allow_methods(vec!["POST"]),
        )
}

/// Runs the gateway until `Ctrl+C` is received.
pub async fn serve(config: &Config) -> Result<(), Error> {
    let gateway = Gateway::from_config(config);
    for folder in &[
        gateway.workspace().input_folder(),
        gateway.workspace().output_folder(),
    ] {
        tokio::fs::create_dir_all(folder)
            .await
            .context(format!("could not create the folder {}", folder.display()))?;
    }

    let addr = (config.host(), config.port())
        .to_socket_addrs()
        .context(format!("invalid address {}:{}", config.host(), config.port()))?
        .next()
        .ok_or_else(|| ErrorKind::Config {
            message: format!("{} does not resolve to any address", config.host()),
        })?;

    let (addr, server) = warp::serve(routes(Arc::new(gateway)))
        .try_bind_with_graceful_shutdown(addr, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("could not listen for the shutdown signal: {}", e);
            }
        })
        .context(format!("could not bind to {}", addr))?;

    info!("analysis gateway listening on http://{}", addr);
    server.await;
    info!("analysis gateway stopped");

    Ok(())
}

async fn analyze_handler(form: FormData, gateway: Arc<Gateway>) -> Result<Response, Infallible> {
    let file = match extract_package(form).await {
        Ok(Some(file)) => file,
        Ok(None) => return Ok(text(StatusCode::BAD_REQUEST, NO_FILE_MESSAGE)),
        Err(e) => {
            warn!("{}", e);
            return Ok(text(StatusCode::BAD_REQUEST, NO_FILE_MESSAGE));
        }
    };

    Ok(gateway.analyze(file).await)
}

async fn rejection_handler(rejection: Rejection) -> Result<Response, Infallible> {
    if rejection.is_not_found() {
        Ok(text(StatusCode::NOT_FOUND, "Not found"))
    } else if rejection.find::<warp::reject::PayloadTooLarge>().is_some() {
        Ok(text(StatusCode::PAYLOAD_TOO_LARGE, "The uploaded file is too large"))
    } else if rejection.find::<warp::reject::MethodNotAllowed>().is_some() {
        Ok(text(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed"))
    } else {
        debug!("request rejected: {:?}", rejection);
        Ok(text(StatusCode::BAD_REQUEST, NO_FILE_MESSAGE))
    }
}

/// Maps the outcome of a job to the answer of the gateway.
pub fn outcome_reply(outcome: ReportOutcome) -> Response {
    match outcome {
        ReportOutcome::NoVulnerabilities { message, output } => reply::with_status(
            reply::json(&json!({
                "message": message,
                "vulnerabilitiesFound": false,
                "output": output,
            })),
            StatusCode::OK,
        )
        .into_response(),
        ReportOutcome::Findings { document } => {
            reply::with_header(document, CONTENT_TYPE, "application/xml").into_response()
        }
        ReportOutcome::Failed {
            kind: FailureKind::Transport,
            message,
            ..
        } => {
            error!("{}", message);
            text(StatusCode::INTERNAL_SERVER_ERROR, SEND_ERROR_MESSAGE)
        }
        ReportOutcome::Failed {
            kind,
            message,
            output,
        } => failure_reply(&message, kind.label(), &output),
    }
}

fn failure_reply(message: &str, error: &str, output: &str) -> Response {
    reply::with_status(
        reply::json(&json!({
            "message": message,
            "error": error,
            "output": output,
        })),
        StatusCode::INTERNAL_SERVER_ERROR,
    )
    .into_response()
}

fn text(status: StatusCode, message: &'static str) -> Response {
    reply::with_status(message, status).into_response()
}
