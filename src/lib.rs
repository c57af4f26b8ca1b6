//! APK Leak Analyzer
//!
//! Gateway and report viewer for FlowDroid taint analysis of Android applications. The gateway
//! receives APK uploads, runs the analysis tool on them and returns either a "no leaks" answer
//! or the raw result document. The client turns that document into a typed report with
//! aggregated statistics.

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
    variant_size_differences,
    clippy::all
)]

#[macro_use]
extern crate clap;
#[macro_use]
extern crate failure_derive;
#[macro_use]
extern crate serde_derive;
#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate log;

pub mod analysis;
pub mod cli;
pub mod client;
mod config;
mod error;
pub mod results;
pub mod server;
mod utils;

use std::{env, io::Write, path::PathBuf};

use clap::ArgMatches;
use colored::Colorize;
use env_logger::Builder;
use failure::{Error, ResultExt};
use log::{Level, LevelFilter};

pub use crate::{
    config::Config,
    error::ErrorKind,
    utils::{file_exists, fingerprint, package_name, print_error, print_warning},
};

/// Initialize the config with the config files and command line options.
///
/// An explicit `--config` file is always used. Otherwise, on UNIX, if the local file
/// (`config.toml`) does not exist but the global one does
/// (`/etc/apk-leak-analyzer/config.toml`), the latter is used. Otherwise, the local file is
/// used. Finally, if none of the files could be loaded, the default config is used.
pub fn initialize_config(cli: &ArgMatches<'_>) -> Result<Config, Error> {
    let explicit_path = cli.value_of("config").map(PathBuf::from).or_else(|| {
        cli.subcommand()
            .1
            .and_then(|sub| sub.value_of("config"))
            .map(PathBuf::from)
    });
    let config_path = PathBuf::from("config.toml");
    let global_config_path = PathBuf::from("/etc/apk-leak-analyzer/config.toml");

    let mut config = if let Some(path) = explicit_path {
        Config::from_file(&path).context(format!(
            "there was an error when reading the {} file",
            path.display()
        ))?
    } else if cfg!(target_family = "unix") && !config_path.exists() && global_config_path.exists()
    {
        Config::from_file(&global_config_path).context(
            "there was an error when reading the /etc/apk-leak-analyzer/config.toml file",
        )?
    } else if config_path.exists() {
        Config::from_file(&config_path)
            .context("there was an error when reading the config.toml file")?
    } else {
        print_warning("config file not found. Using default configuration");
        Config::default()
    };

    config.load_from_env();
    config
        .decorate_with_cli(cli)
        .context("there was an error reading config from CLI")?;

    Ok(config)
}

/// Initializes the logger.
///
/// `RUST_LOG` takes precedence. Otherwise the crate logs at the `Info` level, or `Debug` in
/// verbose mode.
pub fn initialize_logger(is_verbose: bool) {
    let log_level = if is_verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let mut builder = Builder::new();
    let _ = builder.format(|buf, record| match record.level() {
        Level::Warn => writeln!(
            buf,
            "{}{}",
            "Warning: ".bold().yellow(),
            record.args().to_string().yellow()
        ),
        Level::Error => writeln!(
            buf,
            "{}{}",
            "Error: ".bold().red(),
            record.args().to_string().red()
        ),
        Level::Debug => writeln!(
            buf,
            "{}{}",
            "Debug: ".bold(),
            record.args().to_string().bold()
        ),
        Level::Info => writeln!(buf, "{}", record.args()),
        _ => writeln!(buf, "{}: {}", record.level(), record.args()),
    });

    let _ = if let Ok(env_log) = env::var("RUST_LOG") {
        builder.parse(&env_log)
    } else {
        builder.filter(Some("apk_leak_analyzer"), log_level)
    };

    if let Err(e) = builder.try_init() {
        println!("Could not initialize logger: {}", e);
    }
}
