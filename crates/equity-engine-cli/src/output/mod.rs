pub mod csv_out;
pub mod json;
pub mod minimal;
pub mod table;

use colored::Colorize;
use serde_json::Value;

use crate::OutputFormat;

/// Dispatch output to the appropriate formatter.
pub fn format_output(format: &OutputFormat, value: &Value) {
    match format {
        OutputFormat::Json => json::print_json(value),
        OutputFormat::Table => table::print_table(value),
        OutputFormat::Csv => {
            csv_out::print_csv(value);
            warn_to_stderr(value);
        }
        OutputFormat::Minimal => {
            minimal::print_minimal(value);
            warn_to_stderr(value);
        }
    }
}

/// CSV and minimal output carry no room for the envelope's warnings, so
/// they go to stderr where they cannot corrupt piped data.
fn warn_to_stderr(value: &Value) {
    for text in warning_lines(value) {
        eprintln!("{}: {}", "warning".yellow().bold(), text);
    }
}

fn warning_lines(value: &Value) -> Vec<String> {
    let Some(Value::Array(warnings)) = value.get("warnings") else {
        return Vec::new();
    };
    warnings
        .iter()
        .map(|w| w.as_str().map(str::to_string).unwrap_or_else(|| w.to_string()))
        .collect()
}
