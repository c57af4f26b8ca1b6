//! Aggregated statistics of a report.

use std::{borrow::Cow, collections::BTreeMap};

use regex::Regex;

use super::{finding::Finding, risk::RiskTier};

lazy_static! {
    static ref SIGNATURE: Regex = Regex::new(r"<([^:]+): ([^>]+)>").unwrap();
}

/// Statistics derived from the findings of a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregatedStats {
    total_findings: usize,
    source_type_counts: BTreeMap<String, usize>,
    sink_type_counts: BTreeMap<String, usize>,
    risk_tier: RiskTier,
}

impl AggregatedStats {
    /// Gets the number of findings.
    pub fn total_findings(&self) -> usize {
        self.total_findings
    }

    /// Gets the number of occurrences of each simplified source definition.
    pub fn source_type_counts(&self) -> &BTreeMap<String, usize> {
        &self.source_type_counts
    }

    /// Gets the number of occurrences of each simplified sink definition.
    pub fn sink_type_counts(&self) -> &BTreeMap<String, usize> {
        &self.sink_type_counts
    }

    /// Gets the number of distinct sources.
    pub fn unique_sources(&self) -> usize {
        self.source_type_counts.len()
    }

    /// Gets the number of distinct sinks.
    pub fn unique_sinks(&self) -> usize {
        self.sink_type_counts.len()
    }

    /// Gets the risk tier of the report.
    pub fn risk_tier(&self) -> RiskTier {
        self.risk_tier
    }
}

/// Aggregates the given findings.
pub fn aggregate(findings: &[Finding]) -> AggregatedStats {
    let mut source_type_counts = BTreeMap::new();
    let mut sink_type_counts = BTreeMap::new();

    for finding in findings {
        for source in finding.sources() {
            *source_type_counts
                .entry(simplify_method_name(source.definition()).into_owned())
                .or_insert(0) += 1;
        }

        *sink_type_counts
            .entry(simplify_method_name(finding.sink().definition()).into_owned())
            .or_insert(0) += 1;
    }

    AggregatedStats {
        total_findings: findings.len(),
        source_type_counts,
        sink_type_counts,
        risk_tier: RiskTier::from_findings(findings.len()),
    }
}

/// Simplifies a Soot method signature.
///
/// `<com.foo.Bar: void baz()>` becomes `Bar.void baz()`. Strings without a signature are
/// returned unchanged.
pub fn simplify_method_name(method: &str) -> Cow<'_, str> {
    match SIGNATURE.captures(method) {
        Some(caps) => {
            let class = &caps[1];
            let class = class.rsplit('.').next().unwrap_or(class);
            Cow::Owned(format!("{}.{}", class, &caps[2]))
        }
        None => Cow::Borrowed(method),
    }
}
