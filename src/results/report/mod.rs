//! Report generation module.

mod json;
mod terminal;

use failure::Error;

use crate::results::ReportView;

pub use self::{
    json::Json,
    terminal::{format_method_name, format_performance_key, format_performance_value, Terminal},
};

/// Trait that represents a type that can generate a report.
pub trait Generator {
    /// Generates an actual report.
    fn generate(&mut self, view: &ReportView) -> Result<(), Error>;
}
