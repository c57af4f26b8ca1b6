//! Command line interface.

use clap::{App, AppSettings, Arg, SubCommand};

/// Generates the command line interface.
pub fn generate() -> App<'static, 'static> {
    App::new("APK Leak Analyzer")
        .version(crate_version!())
        .about("Runs FlowDroid taint analysis on Android applications and reports data leaks")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .setting(AppSettings::VersionlessSubcommands)
        .arg(
            Arg::with_name("config")
                .long("config")
                .short("c")
                .value_name("FILE")
                .takes_value(true)
                .global(true)
                .help("Uses the given configuration file instead of config.toml"),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .global(true)
                .conflicts_with("quiet")
                .help("If you'd like the auditor to talk more than necessary"),
        )
        .arg(
            Arg::with_name("quiet")
                .short("q")
                .long("quiet")
                .global(true)
                .help("If you'd like a zen auditor that won't talk unless it's 100% necessary"),
        )
        .subcommand(
            SubCommand::with_name("serve")
                .about("Starts the analysis gateway")
                .arg(
                    Arg::with_name("host")
                        .long("host")
                        .value_name("HOST")
                        .takes_value(true)
                        .help("Address the gateway listens on"),
                )
                .arg(
                    Arg::with_name("port")
                        .long("port")
                        .short("p")
                        .value_name("PORT")
                        .takes_value(true)
                        .help("Port the gateway listens on"),
                )
                .arg(
                    Arg::with_name("platforms")
                        .long("platforms")
                        .value_name("DIR")
                        .takes_value(true)
                        .help("Android platforms folder passed to the analysis tool"),
                )
                .arg(
                    Arg::with_name("jobs")
                        .long("jobs")
                        .short("j")
                        .value_name("JOBS")
                        .takes_value(true)
                        .help("Maximum number of analyses running at the same time"),
                ),
        )
        .subcommand(
            SubCommand::with_name("submit")
                .about("Uploads an APK file to the gateway and shows the report")
                .arg(
                    Arg::with_name("package")
                        .value_name("APK")
                        .required(true)
                        .takes_value(true)
                        .help("APK file to analyze"),
                )
                .arg(
                    Arg::with_name("server")
                        .long("server")
                        .short("s")
                        .value_name("URL")
                        .takes_value(true)
                        .help("Base URL of the analysis gateway"),
                )
                .arg(
                    Arg::with_name("json")
                        .long("json")
                        .value_name("FILE")
                        .takes_value(true)
                        .help("Also writes the report as JSON to the given file"),
                ),
        )
        .subcommand(
            SubCommand::with_name("inspect")
                .about("Shows the report for a FlowDroid result document")
                .arg(
                    Arg::with_name("results")
                        .value_name("RESULTS")
                        .required(true)
                        .takes_value(true)
                        .help("FlowDroid XML result file"),
                )
                .arg(
                    Arg::with_name("json")
                        .long("json")
                        .value_name("FILE")
                        .takes_value(true)
                        .help("Also writes the report as JSON to the given file"),
                ),
        )
}
