//! Risk tier of a report.

use std::fmt;

use serde::{Serialize, Serializer};

/// Reports with more findings than this are high risk.
pub const HIGH_RISK_THRESHOLD: usize = 10;

/// Coarse classification of the number of findings of a report.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Copy, Clone)]
pub enum RiskTier {
    /// No findings.
    Low,
    /// Between one and ten findings.
    Medium,
    /// More than ten findings.
    High,
}

impl RiskTier {
    /// Gets the tier for the given number of findings.
    pub fn from_findings(total: usize) -> Self {
        if total > HIGH_RISK_THRESHOLD {
            RiskTier::High
        } else if total > 0 {
            RiskTier::Medium
        } else {
            RiskTier::Low
        }
    }

    /// Gets the human readable assessment for the tier.
    pub fn description(self) -> &'static str {
        match self {
            RiskTier::High => "High Risk: Multiple data flow vulnerabilities detected",
            RiskTier::Medium => "Medium Risk: Some data flow vulnerabilities detected",
            RiskTier::Low => "Low Risk: No data flow vulnerabilities detected",
        }
    }
}

impl fmt::Display for RiskTier {
    #[allow(clippy::use_debug)]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", format!("{:?}", self).to_lowercase())
    }
}

impl Serialize for RiskTier {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.to_string().as_str())
    }
}
