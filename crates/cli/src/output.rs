//! Output formatting for CLI

use clap::ValueEnum;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use vizreg_common::{LedgerEntry, TestCase};

/// Output format
#[derive(Debug, Clone, Copy, ValueEnum, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format
    Json,
    /// YAML format
    Yaml,
    /// Plain text format
    Plain,
}

/// Trait for items that can be displayed in a table
pub trait TableDisplay {
    fn headers() -> Vec<&'static str>;
    fn row(&self) -> Vec<String>;
}

/// One line of a run report: a finished case or the error that stopped it
#[derive(Debug, Clone, Serialize)]
pub struct CaseRow {
    pub hash: String,
    pub url: String,
    pub viewport: String,
    pub threshold: f64,
    pub state: String,
    pub fresh: Option<bool>,
    #[serde(rename = "match")]
    pub matched: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&TestCase> for CaseRow {
    fn from(case: &TestCase) -> Self {
        Self {
            hash: case.short_fingerprint().to_string(),
            url: case.url.clone(),
            viewport: case.viewport.to_string(),
            threshold: case.threshold,
            state: case.state.to_string(),
            fresh: case.reference_fresh,
            matched: case.matched,
            error: None,
        }
    }
}

impl CaseRow {
    pub fn failed(url: &str, error: String) -> Self {
        Self {
            hash: "-".to_string(),
            url: url.to_string(),
            viewport: "-".to_string(),
            threshold: 0.0,
            state: "errored".to_string(),
            fresh: None,
            matched: None,
            error: Some(error),
        }
    }
}

impl TableDisplay for CaseRow {
    fn headers() -> Vec<&'static str> {
        vec!["Hash", "URL", "Viewport", "Threshold", "Reference", "Result"]
    }

    fn row(&self) -> Vec<String> {
        let reference = match self.fresh {
            Some(true) => "new".to_string(),
            Some(false) => "existing".to_string(),
            None => "-".to_string(),
        };
        let result = match (&self.error, self.matched) {
            (Some(e), _) => format!("{} {}", "error:".red(), e),
            (None, Some(true)) => "match".green().to_string(),
            (None, Some(false)) => "MISMATCH".red().bold().to_string(),
            (None, None) => self.state.clone(),
        };
        vec![
            self.hash.clone(),
            self.url.clone(),
            self.viewport.clone(),
            self.threshold.to_string(),
            reference,
            result,
        ]
    }
}

impl TableDisplay for LedgerEntry {
    fn headers() -> Vec<&'static str> {
        vec!["Hash", "URL", "Viewport", "Threshold", "Timestamp", "Match"]
    }

    fn row(&self) -> Vec<String> {
        let matched = match self.matched {
            Some(true) => "yes".green().to_string(),
            Some(false) => "no".red().to_string(),
            None => "-".to_string(),
        };
        let or_dash = |value: Option<String>| value.unwrap_or_else(|| "-".to_string());
        vec![
            self.hash.chars().take(12).collect(),
            or_dash(self.url.clone()),
            or_dash(self.viewport.map(|v| v.to_string())),
            or_dash(self.threshold.map(|t| t.to_string())),
            or_dash(self.timestamp.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())),
            matched,
        ]
    }
}

/// Print a list of items
pub fn print_list<T: Serialize + TableDisplay>(items: &[T], format: OutputFormat) {
    if items.is_empty() && format != OutputFormat::Json {
        println!("No items found.");
        return;
    }

    match format {
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic);

            table.set_header(T::headers());
            for item in items {
                table.add_row(item.row());
            }

            println!("{table}");
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(items).unwrap_or_default());
        }
        OutputFormat::Yaml => {
            println!("{}", serde_yaml::to_string(items).unwrap_or_default());
        }
        OutputFormat::Plain => {
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    println!("---");
                }
                let row = item.row();
                for (header, value) in T::headers().iter().zip(row.iter()) {
                    println!("{}: {}", header, value);
                }
            }
        }
    }
}

/// Print success message
pub fn print_success(message: &str) {
    println!("✅ {}", message);
}

/// Print error message
pub fn print_error(message: &str) {
    eprintln!("❌ {}", message);
}

/// Print warning message
pub fn print_warning(message: &str) {
    eprintln!("⚠️  {}", message);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_row_reports_error() {
        let row = CaseRow::failed("http://localhost/a", "boom".to_string());
        assert_eq!(row.state, "errored");
        assert!(row.row()[5].contains("boom"));
        assert_eq!(row.row().len(), CaseRow::headers().len());
    }

    #[test]
    fn test_key_only_ledger_entry_renders() {
        let mut entry = LedgerEntry::new("0123456789abcdef", "/tmp/shots");
        entry.matched = Some(true);
        let row = entry.row();
        assert_eq!(row.len(), LedgerEntry::headers().len());
        assert_eq!(row[0], "0123456789ab");
        assert_eq!(row[1], "-");
        assert_eq!(row[4], "-");
    }

    #[test]
    fn test_case_row_serializes_match_key() {
        let row = CaseRow::failed("http://localhost/a", "boom".to_string());
        let json = serde_json::to_value(&row).unwrap();
        assert!(json.get("match").is_some());
        assert_eq!(json["error"], "boom");
    }
}
