use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use docprims_schema::{FieldError, HookFailure};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// Outcome of validating one document.
#[derive(Debug, Serialize)]
pub struct DocumentReport {
    pub schema_id: &'static str,
    pub document: String,
    pub schema: String,
    pub valid: bool,
    pub errors: Vec<FieldError>,
    pub hook_failures: Vec<HookFailure>,
}

impl DocumentReport {
    pub const SCHEMA_ID: &'static str =
        "https://schemas.3leaps.dev/docprims/cli/v1/document-report.schema.json";
}

#[derive(Debug, Serialize)]
pub struct CheckReport {
    pub schema_id: &'static str,
    pub schema: String,
    pub file: String,
    pub loaded: bool,
    pub registered: Vec<String>,
}

impl CheckReport {
    pub const SCHEMA_ID: &'static str =
        "https://schemas.3leaps.dev/docprims/cli/v1/check-report.schema.json";
}

#[derive(Debug, Serialize)]
pub struct ValidatorListing {
    pub schema_id: &'static str,
    pub formats: Vec<String>,
    pub types: Vec<String>,
}

impl ValidatorListing {
    pub const SCHEMA_ID: &'static str =
        "https://schemas.3leaps.dev/docprims/cli/v1/validators.schema.json";
}

pub fn print_reports(reports: &[DocumentReport], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            for report in reports {
                print_json(report);
            }
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["DOCUMENT", "VALID", "PATH", "MESSAGE"]);
            for report in reports {
                if report.valid {
                    table.add_row(vec![report.document.as_str(), "yes", "-", "-"]);
                    continue;
                }
                for error in &report.errors {
                    table.add_row(vec![
                        report.document.clone(),
                        "no".to_string(),
                        display_path(&error.data_path).to_string(),
                        error.message.clone(),
                    ]);
                }
                for failure in &report.hook_failures {
                    table.add_row(vec![
                        report.document.clone(),
                        "no".to_string(),
                        "(hook)".to_string(),
                        failure.to_string(),
                    ]);
                }
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for report in reports {
                if report.valid {
                    println!("{}: ok", report.document);
                    continue;
                }
                println!(
                    "{}: {} problem(s)",
                    report.document,
                    report.errors.len() + report.hook_failures.len()
                );
                for error in &report.errors {
                    println!("  {error}");
                }
                for failure in &report.hook_failures {
                    println!("  hook: {failure}");
                }
            }
        }
    }
}

pub fn print_check(report: &CheckReport, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(report),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["SCHEMA", "FILE", "LOADED", "REGISTERED"])
                .add_row(vec![
                    report.schema.clone(),
                    report.file.clone(),
                    report.loaded.to_string(),
                    report.registered.join(", "),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "schema={} file={} loaded={} registered=[{}]",
                report.schema,
                report.file,
                report.loaded,
                report.registered.join(",")
            );
        }
    }
}

pub fn print_validators(listing: &ValidatorListing, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(listing),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["KIND", "NAME"]);
            for name in &listing.formats {
                table.add_row(vec!["format", name.as_str()]);
            }
            for name in &listing.types {
                table.add_row(vec!["type", name.as_str()]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("formats: {}", listing.formats.join(", "));
            println!("types: {}", listing.types.join(", "));
        }
    }
}

fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

fn display_path(data_path: &str) -> &str {
    if data_path.is_empty() {
        "(root)"
    } else {
        data_path
    }
}
