//! Configuration module.
//!
//! Handles and configures the initial settings and variables needed to run the gateway and the
//! client. The configuration is loaded from a TOML file, completed with the `ANDROID_SDK`
//! environment variable and finally decorated with the command line options.

use std::{
    env,
    fs::File,
    io::Read,
    path::{Path, PathBuf},
    time::Duration,
};

use clap::ArgMatches;
use failure::{Error, ResultExt};

use crate::{error, file_exists};

/// Environment variable that can provide the Android platforms folder.
pub const PLATFORMS_ENV: &str = "ANDROID_SDK";

/// Vendor folder used when the gateway is installed system-wide.
#[cfg(target_family = "unix")]
const SHARE_FOLDER: &str = "/usr/share/apk-leak-analyzer";

/// Default ceiling for the captured output of the analysis tool (10 MiB).
const DEFAULT_OUTPUT_BUFFER: usize = 10 * 1024 * 1024;

/// Default maximum size of an uploaded package (512 MiB).
const DEFAULT_UPLOAD_SIZE: u64 = 512 * 1024 * 1024;

/// Config structure.
///
/// Contains configuration related fields. It is used for storing the configuration parameters
/// and checking their values. Implements the `Default` trait.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Boolean to represent `--verbose` mode.
    #[serde(skip)]
    verbose: bool,
    /// Boolean to represent `--quiet` mode.
    #[serde(skip)]
    quiet: bool,
    /// Address the gateway binds to.
    host: String,
    /// Port the gateway listens on.
    port: u16,
    /// Folder where per-job input workspaces are created.
    input_folder: PathBuf,
    /// Folder where per-job output workspaces are created.
    output_folder: PathBuf,
    /// Java executable used to launch the analysis tool.
    java_bin: String,
    /// Path to the FlowDroid command line JAR file.
    analyzer_jar: PathBuf,
    /// Path to the Android platforms folder.
    platforms_folder: PathBuf,
    /// Path to the sources and sinks definition file.
    sources_and_sinks: PathBuf,
    /// Maximum running time of one analysis, in seconds.
    tool_timeout: u64,
    /// Maximum captured output of one analysis stream, in bytes.
    max_output_buffer: usize,
    /// Maximum size of an uploaded package, in bytes.
    max_upload_size: u64,
    /// Number of analyses allowed to run at the same time.
    max_concurrent_jobs: usize,
    /// Base URL of the gateway, used by the client.
    server_url: String,
    /// Configuration files loaded, in order.
    #[serde(skip)]
    loaded_files: Vec<PathBuf>,
}

impl Config {
    /// Creates a new `Config` struct from the given TOML file.
    pub fn from_file<P: AsRef<Path>>(config_path: P) -> Result<Self, Error> {
        let mut f = File::open(config_path.as_ref())?;
        let mut toml = String::new();
        let _ = f.read_to_string(&mut toml)?;

        let mut config: Self = toml::from_str(&toml).context(format!(
            "could not parse the configuration file {}",
            config_path.as_ref().display()
        ))?;
        config.loaded_files.push(config_path.as_ref().to_path_buf());

        Ok(config)
    }

    /// Fills the platforms folder from the environment if the file did not set it.
    pub fn load_from_env(&mut self) {
        if self.platforms_folder.as_os_str().is_empty() {
            if let Some(platforms) = env::var_os(PLATFORMS_ENV) {
                self.platforms_folder = PathBuf::from(platforms);
            }
        }
    }

    /// Modifies the options from the CLI.
    pub fn decorate_with_cli(&mut self, cli: &ArgMatches<'_>) -> Result<(), Error> {
        let (name, sub) = cli.subcommand();
        let is_present = |arg: &str| {
            cli.is_present(arg) || sub.map_or(false, |matches| matches.is_present(arg))
        };

        self.verbose = is_present("verbose");
        self.quiet = is_present("quiet");

        let sub = match sub {
            Some(matches) => matches,
            None => return Ok(()),
        };

        match name {
            "serve" => {
                if let Some(host) = sub.value_of("host") {
                    self.host = host.to_owned();
                }
                if let Some(port) = sub.value_of("port") {
                    self.port = port.parse().map_err(|_| error::ErrorKind::Config {
                        message: format!("the port must be a number, found `{}`", port),
                    })?;
                }
                if let Some(platforms) = sub.value_of("platforms") {
                    self.platforms_folder = PathBuf::from(platforms);
                }
                if let Some(jobs) = sub.value_of("jobs") {
                    match jobs.parse::<usize>() {
                        Ok(jobs) if jobs > 0 => self.max_concurrent_jobs = jobs,
                        _ => {
                            return Err(error::ErrorKind::Config {
                                message: format!(
                                    "the number of jobs must be a positive number, found `{}`",
                                    jobs
                                ),
                            }
                            .into());
                        }
                    }
                }
            }
            "submit" => {
                if let Some(server) = sub.value_of("server") {
                    self.server_url = server.to_owned();
                }
            }
            _ => {}
        }

        Ok(())
    }

    /// Checks if all the files and folders needed to run an analysis exist.
    pub fn check(&self) -> bool {
        self.errors().is_empty()
    }

    /// Returns the configuration errors found.
    pub fn errors(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.platforms_folder.as_os_str().is_empty() {
            errors.push(format!(
                "the Android platforms folder is not set, use the `platforms_folder` option or \
                 the `{}` environment variable",
                PLATFORMS_ENV
            ));
        } else if !file_exists(&self.platforms_folder) {
            errors.push(format!(
                "the Android platforms folder `{}` does not exist",
                self.platforms_folder.display()
            ));
        }
        if !file_exists(&self.analyzer_jar) {
            errors.push(format!(
                "the FlowDroid JAR file `{}` does not exist",
                self.analyzer_jar.display()
            ));
        }
        if !file_exists(&self.sources_and_sinks) {
            errors.push(format!(
                "the sources and sinks file `{}` does not exist",
                self.sources_and_sinks.display()
            ));
        }
        if self.java_bin.is_empty() {
            errors.push("the Java executable is not set".to_owned());
        }
        if self.max_concurrent_jobs == 0 {
            errors.push("at least one concurrent analysis must be allowed".to_owned());
        }

        errors
    }

    /// Returns the currently loaded config files.
    pub fn loaded_config_files(&self) -> impl Iterator<Item = &Path> {
        self.loaded_files.iter().map(PathBuf::as_path)
    }

    /// Returns true if the application is running in `--verbose` mode.
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Returns true if the application is running in `--quiet` mode.
    pub fn is_quiet(&self) -> bool {
        self.quiet
    }

    /// Returns the address the gateway binds to.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the port the gateway listens on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Returns the folder for per-job input workspaces.
    pub fn input_folder(&self) -> &Path {
        &self.input_folder
    }

    /// Returns the folder for per-job output workspaces.
    pub fn output_folder(&self) -> &Path {
        &self.output_folder
    }

    /// Returns the Java executable.
    pub fn java_bin(&self) -> &str {
        &self.java_bin
    }

    /// Returns the path to the FlowDroid JAR file.
    pub fn analyzer_jar(&self) -> &Path {
        &self.analyzer_jar
    }

    /// Returns the Android platforms folder.
    pub fn platforms_folder(&self) -> &Path {
        &self.platforms_folder
    }

    /// Sets the Android platforms folder.
    pub fn set_platforms_folder<P: Into<PathBuf>>(&mut self, platforms: P) {
        self.platforms_folder = platforms.into();
    }

    /// Returns the sources and sinks definition file.
    pub fn sources_and_sinks(&self) -> &Path {
        &self.sources_and_sinks
    }

    /// Returns the analysis timeout.
    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout)
    }

    /// Returns the ceiling for the captured output of one stream.
    pub fn max_output_buffer(&self) -> usize {
        self.max_output_buffer
    }

    /// Returns the maximum size of an uploaded package.
    pub fn max_upload_size(&self) -> u64 {
        self.max_upload_size
    }

    /// Returns the number of analyses allowed to run at the same time.
    pub fn max_concurrent_jobs(&self) -> usize {
        self.max_concurrent_jobs
    }

    /// Returns the base URL of the gateway.
    pub fn server_url(&self) -> &str {
        &self.server_url
    }
}

impl Default for Config {
    /// Creates the default `Config` struct.
    ///
    /// On Unix, when the gateway is installed system-wide, the vendor files are looked up in
    /// `/usr/share/apk-leak-analyzer`.
    fn default() -> Self {
        #[cfg(target_family = "unix")]
        let share_path = Path::new(SHARE_FOLDER);
        #[cfg(target_family = "unix")]
        let tools = if share_path.exists() {
            share_path.join("vendor")
        } else {
            PathBuf::from("tools")
        };
        #[cfg(not(target_family = "unix"))]
        let tools = PathBuf::from("tools");

        Self {
            verbose: false,
            quiet: false,
            host: String::from("127.0.0.1"),
            port: 3040,
            input_folder: PathBuf::from("tools/input"),
            output_folder: PathBuf::from("tools/output"),
            java_bin: String::from("java"),
            analyzer_jar: tools.join("soot-infoflow-cmd-jar-with-dependencies.jar"),
            platforms_folder: PathBuf::new(),
            sources_and_sinks: tools.join("SourcesAndSinks.txt"),
            tool_timeout: 30 * 60,
            max_output_buffer: DEFAULT_OUTPUT_BUFFER,
            max_upload_size: DEFAULT_UPLOAD_SIZE,
            max_concurrent_jobs: 1,
            server_url: String::from("http://localhost:3040"),
            loaded_files: Vec::new(),
        }
    }
}
