//! Results module.
//!
//! Typed model of a FlowDroid result document, the statistics derived from it and the
//! generators that present them.

use std::{collections::BTreeMap, result::Result as StdResult};

use chrono::Local;
use serde::ser::{Serialize, SerializeStruct, Serializer};

pub mod finding;
pub mod parser;
pub mod report;
pub mod risk;
pub mod stats;
#[cfg(test)]
mod tests;

pub use self::{
    finding::{AccessPath, Endpoint, Finding},
    parser::{parse, parse_str},
    risk::RiskTier,
    stats::{aggregate, simplify_method_name, AggregatedStats},
};

/// Termination state reported by a complete analysis.
pub const SUCCESS_STATE: &str = "Success";

/// Parsed result document.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Report {
    findings: Vec<Finding>,
    performance: BTreeMap<String, String>,
    termination_state: String,
}

impl Report {
    /// Creates a new report.
    pub fn new(
        findings: Vec<Finding>,
        performance: BTreeMap<String, String>,
        termination_state: String,
    ) -> Self {
        Self {
            findings,
            performance,
            termination_state,
        }
    }

    /// Gets the findings, in document order.
    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    /// Gets the performance counters of the analysis.
    pub fn performance(&self) -> &BTreeMap<String, String> {
        &self.performance
    }

    /// Gets the termination state of the analysis, empty if the document has none.
    pub fn termination_state(&self) -> &str {
        &self.termination_state
    }

    /// Checks if the analysis ran to completion.
    ///
    /// A report that did not is still complete enough to be shown, but its findings might
    /// be partial.
    pub fn is_success(&self) -> bool {
        self.termination_state == SUCCESS_STATE
    }
}

/// A report together with its statistics, ready to be presented.
#[derive(Debug, Clone)]
pub struct ReportView {
    package: String,
    report: Report,
    stats: AggregatedStats,
}

impl ReportView {
    /// Creates the view of the given report.
    pub fn new<S: Into<String>>(package: S, report: Report) -> Self {
        let stats = aggregate(report.findings());
        Self {
            package: package.into(),
            report,
            stats,
        }
    }

    /// Gets the name of the analyzed package.
    pub fn package(&self) -> &str {
        &self.package
    }

    /// Gets the report.
    pub fn report(&self) -> &Report {
        &self.report
    }

    /// Gets the statistics of the report.
    pub fn stats(&self) -> &AggregatedStats {
        &self.stats
    }
}

impl Serialize for ReportView {
    fn serialize<S>(&self, serializer: S) -> StdResult<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let now = Local::now();
        let mut ser_struct = serializer.serialize_struct("ReportView", 11)?;

        ser_struct.serialize_field("analyzer_version", crate_version!())?;
        ser_struct.serialize_field("now_rfc3339", &now.to_rfc3339())?;
        ser_struct.serialize_field("package", &self.package)?;
        ser_struct.serialize_field("termination_state", &self.report.termination_state)?;
        ser_struct.serialize_field("success", &self.report.is_success())?;
        ser_struct.serialize_field("risk_tier", &self.stats.risk_tier())?;
        ser_struct.serialize_field("total_findings", &self.stats.total_findings())?;
        ser_struct.serialize_field("source_type_counts", self.stats.source_type_counts())?;
        ser_struct.serialize_field("sink_type_counts", self.stats.sink_type_counts())?;
        ser_struct.serialize_field("findings", &self.report.findings)?;
        ser_struct.serialize_field("performance", &self.report.performance)?;

        ser_struct.end()
    }
}
