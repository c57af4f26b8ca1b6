//! Module containing the definition of error types.

/// Enumeration of the different error kinds.
#[derive(Debug, Fail)]
pub enum ErrorKind {
    /// Configuration error.
    #[fail(display = "there was an error in the configuration: {}", message)]
    Config {
        /// Error message.
        message: String,
    },
    /// The submitted file was rejected before any analysis took place.
    #[fail(display = "invalid input: {}", message)]
    InvalidInput {
        /// Error message.
        message: String,
    },
    /// The analysis tool could not be started or failed unexpectedly.
    #[fail(display = "the analysis tool could not be executed: {}", message)]
    ToolExecution {
        /// Error message.
        message: String,
        /// Output captured before the failure.
        output: String,
    },
    /// The analysis tool wrote more output than allowed.
    #[fail(display = "the analysis tool output exceeded {} bytes", limit)]
    BufferOverflow {
        /// Configured ceiling, in bytes.
        limit: usize,
        /// Output captured before the ceiling was reached.
        output: String,
    },
    /// The analysis tool did not finish in time.
    #[fail(display = "the analysis did not finish within {} seconds", seconds)]
    Timeout {
        /// Configured timeout, in seconds.
        seconds: u64,
    },
    /// The analysis tool finished without generating the result document.
    #[fail(display = "the analysis finished but no output file was generated")]
    MissingOutput,
    /// The result document could not be delivered.
    #[fail(display = "the result could not be sent: {}", message)]
    Transport {
        /// Error message.
        message: String,
    },
    /// Parsing error.
    #[fail(display = "there was an error in the parsing process: {}", message)]
    Parse {
        /// Error message.
        message: String,
    },
    /// The gateway could not be reached.
    #[fail(display = "the request to the analysis gateway failed: {}", message)]
    Http {
        /// Error message.
        message: String,
    },
}

impl ErrorKind {
    /// Output captured from the analysis tool, if the error carries any.
    pub fn output(&self) -> Option<&str> {
        match self {
            ErrorKind::ToolExecution { output, .. } | ErrorKind::BufferOverflow { output, .. } => {
                Some(output.as_str())
            }
            _ => None,
        }
    }
}
