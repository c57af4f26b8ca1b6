//! JSON report generation module.

use std::{
    fs::File,
    io::BufWriter,
    path::{Path, PathBuf},
};

use failure::{Error, ResultExt};
use serde_json::ser;

use crate::results::{report::Generator, ReportView};

/// JSON report generator.
pub struct Json {
    path: PathBuf,
}

impl Json {
    /// Creates a new JSON report generator writing to the given file.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl Generator for Json {
    fn generate(&mut self, view: &ReportView) -> Result<(), Error> {
        debug!("starting JSON report generation in {}", self.path.display());
        let mut f = BufWriter::new(File::create(&self.path).context(format!(
            "could not create the JSON report file {}",
            self.path.display()
        ))?);
        ser::to_writer_pretty(&mut f, view)?;
        debug!("JSON report generated");

        Ok(())
    }
}
