//! Terminal report generation module.

use std::io::{self, Write};

use colored::Colorize;
use failure::Error;
use regex::Regex;

use crate::results::{finding::Endpoint, report::Generator, ReportView};

lazy_static! {
    static ref PACKAGE_PREFIX: Regex = Regex::new(r"^.*\.([\w$]+): ").unwrap();
}

/// Message shown when the gateway does not provide one.
const NO_VULNERABILITIES: &str = "No vulnerabilities detected in the APK file";

/// Terminal report generator.
pub struct Terminal<W: Write> {
    out: W,
}

impl Terminal<io::Stdout> {
    /// Creates a new terminal report generator printing to `stdout`.
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> Terminal<W> {
    /// Creates a new terminal report generator printing to the given writer.
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Consumes the generator, returning its writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    /// Prints the answer for an analysis without findings.
    pub fn no_vulnerabilities(&mut self, message: Option<&str>) -> Result<(), Error> {
        writeln!(self.out, "{}", "Analysis Complete".bold().green())?;
        writeln!(self.out, "{}", message.unwrap_or(NO_VULNERABILITIES))?;
        writeln!(self.out)?;
        writeln!(self.out, "{}", "Your APK is secure!".green())?;
        writeln!(
            self.out,
            "No data flow vulnerabilities were detected in the analyzed APK file."
        )?;
        Ok(())
    }

    fn banner(&mut self, view: &ReportView) -> io::Result<()> {
        let report = view.report();
        let title = format!("Analysis {}", report.termination_state());
        if report.is_success() {
            writeln!(self.out, "{}", title.bold())?;
            writeln!(
                self.out,
                "Found {} potential data flow vulnerabilities.",
                report.findings().len()
            )
        } else {
            writeln!(self.out, "{}", title.bold().red())?;
            writeln!(
                self.out,
                "{}",
                "The analysis did not complete successfully.".red()
            )
        }
    }

    fn summary(&mut self, view: &ReportView) -> io::Result<()> {
        let stats = view.stats();
        writeln!(self.out, "{}", "Vulnerability Summary".bold())?;
        writeln!(self.out, "  Total Findings: {}", stats.total_findings())?;
        writeln!(self.out, "  Unique Sources: {}", stats.unique_sources())?;
        writeln!(self.out, "  Unique Sinks: {}", stats.unique_sinks())?;
        writeln!(
            self.out,
            "  Risk Assessment: {}",
            stats.risk_tier().description().yellow()
        )?;

        writeln!(self.out)?;
        writeln!(self.out, "{}", "Source Distribution".bold())?;
        if stats.source_type_counts().is_empty() {
            writeln!(self.out, "  No source data available")?;
        }
        for (name, count) in stats.source_type_counts() {
            writeln!(self.out, "  {}: {} occurrences", name, count)?;
        }

        writeln!(self.out)?;
        writeln!(self.out, "{}", "Sink Distribution".bold())?;
        if stats.sink_type_counts().is_empty() {
            writeln!(self.out, "  No sink data available")?;
        }
        for (name, count) in stats.sink_type_counts() {
            writeln!(self.out, "  {}: {} occurrences", name, count)?;
        }
        Ok(())
    }

    fn details(&mut self, view: &ReportView) -> io::Result<()> {
        let findings = view.report().findings();
        writeln!(
            self.out,
            "{} ({} Findings)",
            "Detailed Analysis Results".bold(),
            findings.len()
        )?;

        for (i, finding) in findings.iter().enumerate() {
            let sources = finding.sources().len();
            writeln!(self.out)?;
            writeln!(
                self.out,
                "{} [{} Source{}] {}",
                format!("Finding #{}", i + 1).bold(),
                sources,
                if sources == 1 { "" } else { "s" },
                format_method_name(finding.sink().method()).italic()
            )?;
            writeln!(self.out, "  {}", "Sink (Vulnerability Target)".red())?;
            self.endpoint(finding.sink())?;
            writeln!(self.out, "  {}", "Sources (Data Origins)".cyan())?;
            for source in finding.sources() {
                self.endpoint(source)?;
            }
        }
        Ok(())
    }

    fn endpoint(&mut self, endpoint: &Endpoint) -> io::Result<()> {
        writeln!(self.out, "    Statement: {}", endpoint.statement())?;
        writeln!(self.out, "    Method: {}", endpoint.method())?;
        if let Some(access_path) = endpoint.access_path() {
            writeln!(
                self.out,
                "    Access Path: {}({})",
                access_path.value(),
                access_path.kind()
            )?;
        }
        Ok(())
    }

    fn performance(&mut self, view: &ReportView) -> io::Result<()> {
        writeln!(self.out, "{}", "Performance Metrics".bold())?;
        for (key, value) in view.report().performance() {
            writeln!(
                self.out,
                "  {}: {}",
                format_performance_key(key),
                format_performance_value(key, value)
            )?;
        }
        Ok(())
    }
}

impl<W: Write> Generator for Terminal<W> {
    fn generate(&mut self, view: &ReportView) -> Result<(), Error> {
        self.banner(view)?;
        writeln!(self.out)?;
        self.summary(view)?;
        writeln!(self.out)?;
        self.details(view)?;
        if !view.report().performance().is_empty() {
            writeln!(self.out)?;
            self.performance(view)?;
        }
        self.out.flush()?;
        Ok(())
    }
}

/// Removes the angle brackets and the package of a Soot method signature.
///
/// `<com.foo.Bar: void baz()>` becomes `Bar: void baz()`.
pub fn format_method_name(method: &str) -> String {
    let stripped = method.replace(&['<', '>'][..], "");
    PACKAGE_PREFIX.replace(&stripped, "${1}: ").into_owned()
}

/// Splits a camel case performance key into words.
pub fn format_performance_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    let mut formatted = String::with_capacity(key.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if i > 0 && c.is_uppercase() {
            let previous = chars[i - 1];
            let next_is_lower = chars.get(i + 1).map_or(false, |n| n.is_lowercase());
            if previous.is_lowercase()
                || previous.is_numeric()
                || (previous.is_uppercase() && next_is_lower)
            {
                formatted.push(' ');
            }
        }
        formatted.push(c);
    }

    formatted
}

/// Adds the unit implied by the key to a performance value.
pub fn format_performance_value(key: &str, value: &str) -> String {
    if key.contains("Seconds") {
        format!("{} seconds", value)
    } else if key == "MaxMemoryConsumption" {
        format!("{} MB", value)
    } else {
        value.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::{format_method_name, format_performance_key, format_performance_value, Terminal};
    use crate::results::{parse_str, report::Generator, ReportView};

    #[test]
    fn it_format_method_name() {
        assert_eq!(format_method_name("<com.foo.Bar: void baz()>"), "Bar: void baz()");
        assert_eq!(
            format_method_name("<com.example.Outer$Inner: void run()>"),
            "Outer$Inner: void run()"
        );
        assert_eq!(format_method_name("Unknown"), "Unknown");
    }

    #[test]
    fn it_format_performance() {
        assert_eq!(
            format_performance_key("CallgraphConstructionSeconds"),
            "Callgraph Construction Seconds"
        );
        assert_eq!(
            format_performance_key("MaxMemoryConsumption"),
            "Max Memory Consumption"
        );
        assert_eq!(format_performance_key("IFDSRuntime"), "IFDS Runtime");
        assert_eq!(format_performance_key("Total"), "Total");

        assert_eq!(
            format_performance_value("TaintPropagationSeconds", "4"),
            "4 seconds"
        );
        assert_eq!(format_performance_value("MaxMemoryConsumption", "512"), "512 MB");
        assert_eq!(format_performance_value("SourceCount", "7"), "7");
    }

    #[test]
    fn it_terminal_report() {
        let report = parse_str(
            r#"<DataFlowResults TerminationState="Success"><Results><Result>
                <Sink Statement="sink stmt" Method="&lt;com.a.Main: void onCreate()&gt;"
                      MethodSourceSinkDefinition="&lt;android.util.Log: int i()&gt;">
                  <AccessPath Value="$r3" Type="java.lang.String"/>
                </Sink>
                <Sources>
                  <Source Statement="src one" Method="m" MethodSourceSinkDefinition="d"/>
                  <Source Statement="src two" Method="m" MethodSourceSinkDefinition="d"/>
                </Sources>
            </Result></Results>
            <PerformanceData><PerformanceEntry Name="TotalRuntimeSeconds" Value="8"/></PerformanceData>
            </DataFlowResults>"#,
        )
        .unwrap();

        let mut terminal = Terminal::new(Vec::new());
        terminal.generate(&ReportView::new("app", report)).unwrap();
        let output = String::from_utf8(terminal.into_inner()).unwrap();

        assert!(output.contains("Found 1 potential data flow vulnerabilities."));
        assert!(output.contains("Total Findings: 1"));
        assert!(output.contains("Log.int i(): 1 occurrences"));
        assert!(output.contains("d: 2 occurrences"));
        assert!(output.contains("Main: void onCreate()"));
        assert!(output.contains("Access Path: $r3(java.lang.String)"));
        assert!(output.contains("Statement: src two"));
        assert!(output.contains("Total Runtime Seconds: 8 seconds"));
        assert!(output.contains("Medium Risk: Some data flow vulnerabilities detected"));
    }

    #[test]
    fn it_terminal_failed_analysis() {
        let report = parse_str(r#"<DataFlowResults TerminationState="DataFlowTimeout"/>"#).unwrap();

        let mut terminal = Terminal::new(Vec::new());
        terminal.generate(&ReportView::new("app", report)).unwrap();
        let output = String::from_utf8(terminal.into_inner()).unwrap();

        assert!(output.contains("Analysis DataFlowTimeout"));
        assert!(output.contains("The analysis did not complete successfully."));
        assert!(output.contains("No source data available"));
        assert!(!output.contains("Performance Metrics"));
    }

    #[test]
    fn it_terminal_no_vulnerabilities() {
        let mut terminal = Terminal::new(Vec::new());
        terminal.no_vulnerabilities(None).unwrap();
        let output = String::from_utf8(terminal.into_inner()).unwrap();

        assert!(output.contains("No vulnerabilities detected in the APK file"));
    }
}
