//! Output formatting for wva-cli (table, json)

use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use serde_json::Value;
use tabled::{Table, Tabled};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// ASCII table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Context for output rendering
pub struct OutputContext {
    pub format: OutputFormat,
    pub quiet: bool,
}

impl OutputContext {
    pub fn new(format: OutputFormat, no_color: bool, quiet: bool) -> Self {
        if no_color {
            colored::control::set_override(false);
        }
        Self { format, quiet }
    }

    /// Print a success message (unless in quiet mode)
    pub fn success(&self, msg: &str) {
        if !self.quiet {
            println!("{}", msg.green());
        }
    }

    /// Print an info message (unless in quiet mode)
    pub fn info(&self, msg: &str) {
        if !self.quiet {
            println!("{}", msg);
        }
    }

    /// Print data in the configured format
    pub fn print<T: Tabled + Serialize>(&self, data: &[T]) {
        match self.format {
            OutputFormat::Table => {
                if data.is_empty() {
                    if !self.quiet {
                        println!("No data");
                    }
                } else {
                    println!("{}", Table::new(data));
                }
            }
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::to_string_pretty(data).unwrap_or_else(|_| "[]".to_string())
                );
            }
        }
    }

    /// Print a single item in the configured format
    pub fn print_one<T: Tabled + Serialize>(&self, data: &T) {
        match self.format {
            OutputFormat::Table => println!("{}", Table::new([data])),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::to_string_pretty(data).unwrap_or_else(|_| "{}".to_string())
                );
            }
        }
    }

    /// Print a raw web services document
    ///
    /// Documents are always JSON; text bodies are printed as-is.
    pub fn print_document(&self, doc: &Value) {
        match doc {
            Value::String(text) => println!("{}", text),
            other => println!(
                "{}",
                serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string())
            ),
        }
    }
}

/// Compact rendering of a JSON value for table cells
pub fn format_json_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

// =============================================================================
// Display types for various commands
// =============================================================================

/// Vehicle data sample for sample command
#[derive(Debug, Tabled, Serialize)]
pub struct SampleRow {
    #[tabled(rename = "Element")]
    pub name: String,
    #[tabled(rename = "Value")]
    pub value: f64,
    #[tabled(rename = "Timestamp")]
    pub timestamp: String,
}

/// Subscription display for subscriptions command
#[derive(Debug, Tabled, Serialize)]
pub struct SubscriptionRow {
    #[tabled(rename = "Name")]
    pub short_name: String,
    #[tabled(rename = "URI")]
    pub uri: String,
    #[tabled(rename = "Buffer")]
    pub buffer: String,
    #[tabled(rename = "Interval")]
    pub interval: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_format_json_value() {
        assert_eq!(format_json_value(&json!("on")), "on");
        assert_eq!(format_json_value(&json!(42.5)), "42.5");
        assert_eq!(format_json_value(&Value::Null), "null");
        assert_eq!(format_json_value(&json!({"a": 1})), "{\"a\":1}");
    }
}
