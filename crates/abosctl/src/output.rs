//! Output formatting for abosctl (table, json)

use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use tabled::{Table, Tabled};

use abos_core::{Partition, PartitionInfo};

/// Output format options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
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

    /// Print a success message (unless in quiet mode or emitting JSON)
    pub fn success(&self, msg: &str) {
        if !self.quiet && self.format == OutputFormat::Table {
            println!("{}", msg.green());
        }
    }

    /// Print an error message
    pub fn error(&self, msg: &str) {
        eprintln!("{}", msg.red());
    }

    /// Print rows in the configured format
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
            OutputFormat::Json => println!("{}", to_json(data)),
        }
    }

    /// Print a serializable value as JSON, or `text` in table mode
    pub fn print_value<T: Serialize>(&self, value: &T, text: &str) {
        match self.format {
            OutputFormat::Table => println!("{}", text),
            OutputFormat::Json => println!("{}", to_json(value)),
        }
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "null".to_string())
}

// =============================================================================
// Display types
// =============================================================================

/// One partition in `status` output
#[derive(Debug, Tabled, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionRow {
    #[tabled(rename = "Partition")]
    pub label: String,
    #[tabled(rename = "Role")]
    pub role: String,
    #[tabled(rename = "State")]
    pub state: String,
    #[tabled(rename = "Device")]
    pub device: String,
    #[tabled(rename = "Image")]
    pub image: String,
    #[tabled(rename = "Version")]
    pub version: String,
}

impl PartitionRow {
    pub fn new(partition: &Partition, role: &str, mapping: Option<&PartitionInfo>) -> Self {
        Self {
            label: partition.label.to_string(),
            role: role.to_string(),
            state: partition.state.to_string(),
            device: partition.device_path.clone(),
            image: mapping
                .map(|m| m.uuid().to_string())
                .unwrap_or_else(|| "-".to_string()),
            version: mapping
                .map(|m| m.base_os_version.clone())
                .unwrap_or_else(|| "-".to_string()),
        }
    }
}

/// One mapping record in `mapping show` output
#[derive(Debug, Tabled, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingRow {
    #[tabled(rename = "Partition")]
    pub label: String,
    #[tabled(rename = "UUID")]
    pub uuid: String,
    #[tabled(rename = "Version")]
    pub version: String,
    #[tabled(rename = "Base OS")]
    pub base_os_version: String,
    #[tabled(rename = "SHA-256")]
    pub image_sha256: String,
}

impl From<&PartitionInfo> for MappingRow {
    fn from(info: &PartitionInfo) -> Self {
        Self {
            label: info.partition_label.to_string(),
            uuid: info.uuid().to_string(),
            version: info.uuid_and_version.version.clone(),
            base_os_version: info.base_os_version.clone(),
            image_sha256: info.image_sha256.clone(),
        }
    }
}
