//! Test report generation
//!
//! Generates suite reports in multiple formats:
//! - Text (human-readable console output)
//! - JSON (machine-readable)
//! - JUnit XML (CI/CD integration)

use super::executor::{CaseResult, CaseStatus, Stage};
use super::suite::SuiteSummary;
use serde::Serialize;
use std::io::Write;

/// Maximum number of output characters kept per case in reports
const MAX_REPORTED_OUTPUT: usize = 4000;

/// Complete suite report
#[derive(Debug, Clone, Serialize)]
pub struct TestReport {
    /// Test root directory
    pub suite: String,

    /// Run ID
    pub run_id: String,

    /// Start time (ISO 8601)
    pub start_time: String,

    /// End time (ISO 8601)
    pub end_time: String,

    /// Total duration in milliseconds
    pub duration_ms: u64,

    /// Summary statistics
    pub summary: ReportSummary,

    /// Per-case results
    pub cases: Vec<CaseReport>,
}

/// Summary statistics
#[derive(Debug, Clone, Serialize)]
pub struct ReportSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Report for a single case
#[derive(Debug, Clone, Serialize)]
pub struct CaseReport {
    /// Case name
    pub name: String,

    /// Case directory
    pub directory: String,

    /// Case status
    pub status: CaseStatus,

    /// Execution time in milliseconds
    pub duration_ms: u64,

    /// Stage that failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,

    /// Error kind
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,

    /// Error message if failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Importer exit code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,

    /// Captured importer output (tail)
    #[serde(skip_serializing_if = "String::is_empty")]
    pub output: String,

    /// Cleanup/teardown warnings
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl From<&CaseResult> for CaseReport {
    fn from(result: &CaseResult) -> Self {
        Self {
            name: result.name.clone(),
            directory: result.case_dir.display().to_string(),
            status: result.status,
            duration_ms: result.duration.as_millis() as u64,
            stage: result.failed_stage(),
            error_kind: result.failure.as_ref().map(|f| f.error.kind().to_string()),
            error: result.failure.as_ref().map(|f| f.error.to_string()),
            exit_code: result.exit_code,
            output: tail(&result.output, MAX_REPORTED_OUTPUT),
            warnings: result.warnings.clone(),
        }
    }
}

/// Report generator
pub struct ReportGenerator {
    /// Suite name
    suite: String,

    /// Run ID
    run_id: String,

    /// Case reports
    cases: Vec<CaseReport>,

    /// Start time
    start_time: chrono::DateTime<chrono::Utc>,
}

impl ReportGenerator {
    /// Create new report generator
    pub fn new(suite: &str, run_id: &str) -> Self {
        Self {
            suite: suite.to_string(),
            run_id: run_id.to_string(),
            cases: Vec::new(),
            start_time: chrono::Utc::now(),
        }
    }

    /// Add a case result
    pub fn add_case_result(&mut self, result: &CaseResult) {
        self.cases.push(CaseReport::from(result));
    }

    /// Add every case of a summary
    pub fn add_summary(&mut self, summary: &SuiteSummary) {
        for result in &summary.results {
            self.add_case_result(result);
        }
    }

    /// Generate final report
    pub fn generate(&self) -> TestReport {
        let end_time = chrono::Utc::now();
        let duration = end_time - self.start_time;

        let count = |status: CaseStatus| self.cases.iter().filter(|c| c.status == status).count();

        TestReport {
            suite: self.suite.clone(),
            run_id: self.run_id.clone(),
            start_time: self.start_time.to_rfc3339(),
            end_time: end_time.to_rfc3339(),
            duration_ms: duration.num_milliseconds().max(0) as u64,
            summary: ReportSummary {
                total: self.cases.len(),
                passed: count(CaseStatus::Passed),
                failed: count(CaseStatus::Failed),
                skipped: count(CaseStatus::Skipped),
            },
            cases: self.cases.clone(),
        }
    }
}

/// Short run identifier derived from the current time
pub fn generate_run_id() -> String {
    let millis = chrono::Utc::now().timestamp_millis().max(0);
    format!("{:x}", millis % 0xFFFFFF)
}

/// Output format for reports
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputFormat {
    Text,
    Json,
    Junit,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "junit" | "xml" => Ok(OutputFormat::Junit),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

/// Write report to output
pub fn write_report(
    report: &TestReport,
    format: OutputFormat,
    writer: &mut dyn Write,
) -> std::io::Result<()> {
    match format {
        OutputFormat::Text => write_text_report(report, writer),
        OutputFormat::Json => write_json_report(report, writer),
        OutputFormat::Junit => write_junit_report(report, writer),
    }
}

/// Write text format report
fn write_text_report(report: &TestReport, writer: &mut dyn Write) -> std::io::Result<()> {
    writeln!(writer, "\n🧪 Importer Test Report")?;
    writeln!(writer, "════════════════════════════════════════")?;
    writeln!(writer, "Suite: {}", report.suite)?;
    writeln!(writer, "Run ID: {}", report.run_id)?;
    writeln!(writer, "Duration: {}ms", report.duration_ms)?;
    writeln!(writer)?;

    writeln!(writer, "📋 Case Results")?;
    writeln!(writer, "────────────────────────────────────────")?;

    for case in &report.cases {
        let status_icon = match case.status {
            CaseStatus::Passed => "✅",
            CaseStatus::Failed => "❌",
            CaseStatus::Skipped => "⏭️",
        };

        writeln!(writer, "{} {} ({}ms)", status_icon, case.name, case.duration_ms)?;

        if let Some(ref error) = case.error {
            for (idx, line) in error.lines().enumerate() {
                if idx == 0 {
                    writeln!(writer, "   ERROR: {}", line)?;
                } else {
                    writeln!(writer, "      {}", line)?;
                }
            }
        }

        for warning in &case.warnings {
            writeln!(writer, "   WARN: {}", warning)?;
        }
    }

    writeln!(writer)?;
    writeln!(writer, "📊 Summary")?;
    writeln!(writer, "────────────────────────────────────────")?;
    writeln!(
        writer,
        "Cases: {} total, {} passed, {} failed, {} skipped",
        report.summary.total, report.summary.passed, report.summary.failed, report.summary.skipped
    )?;

    writeln!(writer)?;
    if report.summary.failed == 0 {
        writeln!(writer, "🎉 ALL TESTS PASSED!")?;
    } else {
        writeln!(writer, "❌ {} failures", report.summary.failed)?;
    }

    Ok(())
}

/// Write JSON format report
fn write_json_report(report: &TestReport, writer: &mut dyn Write) -> std::io::Result<()> {
    let json = serde_json::to_string_pretty(report).map_err(std::io::Error::other)?;
    writeln!(writer, "{}", json)
}

/// Write JUnit XML format report
fn write_junit_report(report: &TestReport, writer: &mut dyn Write) -> std::io::Result<()> {
    let seconds = report.duration_ms as f64 / 1000.0;

    writeln!(writer, r#"<?xml version="1.0" encoding="UTF-8"?>"#)?;
    writeln!(
        writer,
        r#"<testsuites name="{}" tests="{}" failures="{}" time="{:.3}">"#,
        escape_xml(&report.suite),
        report.summary.total,
        report.summary.failed,
        seconds
    )?;
    writeln!(
        writer,
        r#"  <testsuite name="{}" tests="{}" failures="{}" skipped="{}" time="{:.3}">"#,
        escape_xml(&report.suite),
        report.cases.len(),
        report.summary.failed,
        report.summary.skipped,
        seconds
    )?;

    for case in &report.cases {
        writeln!(
            writer,
            r#"    <testcase name="{}" classname="{}" time="{:.3}">"#,
            escape_xml(&case.name),
            escape_xml(&report.suite),
            case.duration_ms as f64 / 1000.0
        )?;

        match case.status {
            CaseStatus::Failed => {
                let message = case.error.as_deref().unwrap_or("failed");
                let first_line = message.lines().next().unwrap_or("");
                writeln!(
                    writer,
                    r#"      <failure type="{}" message="{}">{}</failure>"#,
                    escape_xml(case.error_kind.as_deref().unwrap_or("Failure")),
                    escape_xml(first_line),
                    escape_xml(message)
                )?;
                if !case.output.is_empty() {
                    writeln!(
                        writer,
                        "      <system-out>{}</system-out>",
                        escape_xml(&case.output)
                    )?;
                }
            }
            CaseStatus::Skipped => {
                writeln!(writer, "      <skipped/>")?;
            }
            CaseStatus::Passed => {}
        }

        writeln!(writer, "    </testcase>")?;
    }

    writeln!(writer, "  </testsuite>")?;
    writeln!(writer, "</testsuites>")?;

    Ok(())
}

/// Escape XML special characters
fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Keep the last `max` characters of `text`
fn tail(text: &str, max: usize) -> String {
    let count = text.chars().count();
    if count <= max {
        text.to_string()
    } else {
        text.chars().skip(count - max).collect()
    }
}
