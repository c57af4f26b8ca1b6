//! Findings reported by the taint analysis.

/// Placeholder used for required attributes missing from the result document.
pub const UNKNOWN: &str = "Unknown";

/// Qualifies exactly which variable or field carries the tainted data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessPath {
    value: String,
    #[serde(rename = "type")]
    kind: String,
}

impl AccessPath {
    /// Creates a new access path.
    pub fn new<V: Into<String>, K: Into<String>>(value: V, kind: K) -> Self {
        Self {
            value: value.into(),
            kind: kind.into(),
        }
    }

    /// Gets the tainted value, usually a local variable such as `$r3`.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Gets the declared type of the tainted value.
    pub fn kind(&self) -> &str {
        &self.kind
    }
}

/// A source or a sink of a finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Endpoint {
    statement: String,
    method: String,
    definition: String,
    access_path: Option<AccessPath>,
}

impl Endpoint {
    /// Creates a new endpoint.
    pub fn new<S, M, D>(
        statement: S,
        method: M,
        definition: D,
        access_path: Option<AccessPath>,
    ) -> Self
    where
        S: Into<String>,
        M: Into<String>,
        D: Into<String>,
    {
        Self {
            statement: statement.into(),
            method: method.into(),
            definition: definition.into(),
            access_path,
        }
    }

    /// Gets the Jimple statement where data enters or leaves.
    pub fn statement(&self) -> &str {
        &self.statement
    }

    /// Gets the method containing the statement.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Gets the fully qualified source/sink definition that matched, such as
    /// `<android.telephony.TelephonyManager: java.lang.String getDeviceId()>`.
    pub fn definition(&self) -> &str {
        &self.definition
    }

    /// Gets the access path, if the document provides one.
    pub fn access_path(&self) -> Option<&AccessPath> {
        self.access_path.as_ref()
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::new(UNKNOWN, UNKNOWN, UNKNOWN, None)
    }
}

/// One potential data leak: a sink reached by one or more sources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    sink: Endpoint,
    sources: Vec<Endpoint>,
}

impl Finding {
    /// Creates a new finding.
    pub fn new(sink: Endpoint, sources: Vec<Endpoint>) -> Self {
        Self { sink, sources }
    }

    /// Gets the sink where the data may leak.
    pub fn sink(&self) -> &Endpoint {
        &self.sink
    }

    /// Gets the sources of the leaked data, in document order.
    pub fn sources(&self) -> &[Endpoint] {
        &self.sources
    }
}
