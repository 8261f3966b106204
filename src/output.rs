//! Table and JSON output formatting for CLI commands.

use serde::Serialize;
use tabled::{Table, Tabled};

use forge_converter::models::{BatchReport, ConversionJob, ConversionResult};
use forge_converter::observer::{ConversionObserver, OutputStream};

/// Output format selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// JSON output
    Json,
}

/// Print a list of items in the selected format
pub fn print_list<T: Serialize + Tabled>(items: &[T], format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            if items.is_empty() {
                println!("No results found.");
            } else {
                println!("{}", Table::new(items));
            }
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(items).unwrap_or_else(|_| "[]".to_string());
            println!("{}", json);
        }
    }
}

/// Print any serializable value as pretty JSON
pub fn print_json<T: Serialize>(item: &T) {
    let json = serde_json::to_string_pretty(item).unwrap_or_else(|_| "{}".to_string());
    println!("{}", json);
}

pub fn print_success(msg: &str) {
    println!("✓ {}", msg);
}

pub fn print_warning(msg: &str) {
    println!("⚠ {}", msg);
}

pub fn print_error(msg: &str) {
    eprintln!("✗ {}", msg);
}

/// Print a key-value pair
pub fn print_kv(key: &str, value: &str) {
    println!("  {:<24} {}", format!("{}:", key), value);
}

/// One row of the batch summary table.
#[derive(Debug, Serialize, Tabled)]
pub struct ResultRow {
    #[tabled(rename = "Project")]
    pub project: String,
    #[tabled(rename = "Status")]
    pub status: String,
    #[tabled(rename = "Exit")]
    pub exit: String,
    #[tabled(rename = "Rewritten")]
    pub rewritten: String,
    #[tabled(rename = "Files")]
    pub files: usize,
    #[tabled(rename = "Time")]
    pub time: String,
}

impl From<&ConversionResult> for ResultRow {
    fn from(r: &ConversionResult) -> Self {
        Self {
            project: r
                .source
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| r.source.display().to_string()),
            status: match &r.failure {
                None if r.success => "ok".to_string(),
                Some(reason) => reason.to_string(),
                None => "failed".to_string(),
            },
            exit: r
                .exit_code
                .map(|c| c.to_string())
                .unwrap_or_else(|| "-".to_string()),
            rewritten: if r.rewritten_fields.is_empty() {
                "-".to_string()
            } else {
                r.rewritten_fields.join(", ")
            },
            files: r.produced_files.len(),
            time: format!("{:.1}s", r.duration_ms as f64 / 1000.0),
        }
    }
}

/// Print a batch report as a table plus summary line, or as JSON.
pub fn print_report(report: &BatchReport, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(report),
        OutputFormat::Table => {
            let rows: Vec<ResultRow> = report.results.iter().map(ResultRow::from).collect();
            print_list(&rows, format);
            for failed in report.results.iter().filter(|r| !r.success) {
                if let Some(error) = &failed.error {
                    print_error(&format!("{}: {}", failed.source.display(), error));
                }
            }
            let summary = format!(
                "{} succeeded, {} failed ({} total)",
                report.succeeded,
                report.failed,
                report.total()
            );
            if report.all_succeeded() {
                print_success(&summary);
            } else {
                print_warning(&summary);
            }
        }
    }
}

/// Observer that echoes progress and Spine output to the terminal.
///
/// Writes to stderr so JSON reports on stdout stay parseable.
#[derive(Debug, Clone, Copy)]
pub struct ConsoleObserver {
    pub echo_output: bool,
}

impl ConversionObserver for ConsoleObserver {
    fn job_started(&self, index: usize, total: usize, job: &ConversionJob) {
        eprintln!("[{}/{}] Exporting {}", index + 1, total, job.display_name());
    }

    fn output_line(&self, stream: OutputStream, line: &str) {
        if !self.echo_output {
            return;
        }
        match stream {
            OutputStream::Stdout => eprintln!("    {}", line),
            OutputStream::Stderr => eprintln!("  ! {}", line),
        }
    }

    fn job_finished(&self, index: usize, total: usize, result: &ConversionResult) {
        let status = if result.success { "done" } else { "failed" };
        eprintln!(
            "[{}/{}] {} in {:.1}s",
            index + 1,
            total,
            status,
            result.duration_ms as f64 / 1000.0
        );
    }
}
