//! APK Leak Analyzer command line.

#![forbid(
    anonymous_parameters,
    unsafe_code,
    overflowing_literals,
    unconditional_recursion,
    while_true
)]
#![warn(
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unused_extern_crates,
    unused_import_braces,
    unused_qualifications,
    unused_results,
    clippy::all
)]

#[macro_use]
extern crate log;

use std::{fs::File, io::BufReader, process::exit};

use apk_leak_analyzer::{
    cli,
    client::{AnalysisResponse, Client},
    initialize_config, initialize_logger, package_name, print_error,
    results::{
        parse,
        report::{Generator, Json, Terminal},
        Report, ReportView,
    },
    server, Config, ErrorKind,
};
use clap::ArgMatches;
use failure::{Error, ResultExt};
use tokio::runtime::Runtime;

fn main() {
    if let Err(e) = run() {
        print_error(&e);
        exit(1);
    }
}

fn run() -> Result<(), Error> {
    let cli = cli::generate().get_matches();
    let config = initialize_config(&cli)?;
    initialize_logger(config.is_verbose());

    for file in config.loaded_config_files() {
        debug!("loaded configuration file {}", file.display());
    }

    match cli.subcommand() {
        ("serve", Some(_)) => serve(&config),
        ("submit", Some(matches)) => submit(&config, matches),
        ("inspect", Some(matches)) => inspect(matches),
        _ => Err(ErrorKind::Config {
            message: "no command was given, run with --help to see them".to_owned(),
        }
        .into()),
    }
}

/// Runs the gateway. The analysis tool and its inputs must be in place before it starts.
fn serve(config: &Config) -> Result<(), Error> {
    let errors = config.errors();
    if !errors.is_empty() {
        for error in &errors {
            error!("{}", error);
        }
        return Err(ErrorKind::Config {
            message: format!(
                "{} problem{} found, the gateway cannot run the analysis",
                errors.len(),
                if errors.len() == 1 { "" } else { "s" }
            ),
        }
        .into());
    }

    if !config.is_quiet() {
        info!(
            "using the Android platforms in {}",
            config.platforms_folder().display()
        );
    }

    let runtime = Runtime::new().context("could not start the async runtime")?;
    runtime.block_on(server::serve(config))
}

fn submit(config: &Config, matches: &ArgMatches<'_>) -> Result<(), Error> {
    let package = matches.value_of("package").unwrap_or_default();

    let runtime = Runtime::new().context("could not start the async runtime")?;
    let response = runtime
        .block_on(Client::new(config.server_url()).submit(package))
        .context(format!("could not analyze {}", package))?;

    match response {
        AnalysisResponse::NoVulnerabilities { message } => {
            Terminal::stdout().no_vulnerabilities(Some(&message))
        }
        AnalysisResponse::Report(report) => {
            present(package_name(package), report, matches.value_of("json"))
        }
        AnalysisResponse::Failure {
            status,
            message,
            error,
            output,
        } => {
            if let Some(output) = output.filter(|output| !output.is_empty()) {
                debug!("analysis tool output:\n{}", output);
            }
            let message = match error {
                Some(error) => format!("{} ({})", message, error),
                None => message,
            };
            Err(ErrorKind::Http {
                message: format!("the gateway answered {}: {}", status, message),
            }
            .into())
        }
    }
}

fn inspect(matches: &ArgMatches<'_>) -> Result<(), Error> {
    let path = matches.value_of("results").unwrap_or_default();
    let file = File::open(path).context(format!("could not open {}", path))?;
    let report = parse(BufReader::new(file)).context(format!("could not read {}", path))?;

    present(package_name(path), report, matches.value_of("json"))
}

fn present(package: String, report: Report, json: Option<&str>) -> Result<(), Error> {
    let view = ReportView::new(package, report);
    Terminal::stdout().generate(&view)?;

    if let Some(path) = json {
        Json::new(path).generate(&view)?;
        info!("JSON report written to {}", path);
    }

    Ok(())
}
