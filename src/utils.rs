//! Utilities module.

use std::{fs, path::Path};

use colored::Colorize;
use sha2::{Digest, Sha256};

/// Prints a warning through the logger.
pub fn print_warning<S: AsRef<str>>(warning: S) {
    warn!("{}", warning.as_ref());
}

/// Prints the given error and its whole cause chain to `stderr`.
pub fn print_error(error: &failure::Error) {
    eprintln!("{} {}", "Error:".bold().red(), error.to_string().red());

    for cause in error.iter_chain().skip(1) {
        eprintln!("\t{} {}", "Caused by:".bold(), cause);
    }
}

/// Checks if the given path exists in the file system.
pub fn file_exists<P: AsRef<Path>>(path: P) -> bool {
    fs::metadata(path).is_ok()
}

/// Gets the file name of the given package without its extension.
pub fn package_name<P: AsRef<Path>>(package: P) -> String {
    package
        .as_ref()
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Computes the hexadecimal SHA-256 fingerprint of a package.
pub fn fingerprint(bytes: &[u8]) -> String {
    let mut hasher = Sha256::default();
    hasher.input(bytes);
    hex::encode(hasher.result().as_slice())
}
