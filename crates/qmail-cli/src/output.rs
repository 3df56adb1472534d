//! Output formatting for CLI results
//!
//! This module provides consistent output formatting across all CLI commands.
//! It supports three output formats:
//! - Table: Human-readable tables (default)
//! - JSON: Structured JSON for scripting and automation
//! - Quiet: Minimal output, exit codes only

use std::str::FromStr;

use chrono::NaiveDateTime;
use comfy_table::{presets::UTF8_FULL, Table};
use serde::Serialize;

use crate::ExitCode;

/// Output format options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format for scripting
    Json,
    /// Minimal output - exit codes only
    Quiet,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(Self::Table),
            "json" => Ok(Self::Json),
            "quiet" => Ok(Self::Quiet),
            _ => Err(format!("Unknown output format: {s}")),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Table => write!(f, "table"),
            Self::Json => write!(f, "json"),
            Self::Quiet => write!(f, "quiet"),
        }
    }
}

/// Standard JSON response wrapper for consistent schema
#[derive(Serialize)]
pub struct JsonResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// ISO 8601 timestamp
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
}

impl<T: Serialize> JsonResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
            command: None,
        }
    }

    pub fn success_with_command(data: T, command: &str) -> Self {
        Self {
            command: Some(command.to_string()),
            ..Self::success(data)
        }
    }
}

impl JsonResponse<()> {
    pub fn error(message: &str) -> JsonResponse<()> {
        JsonResponse {
            success: false,
            data: None,
            error: Some(message.to_string()),
            timestamp: chrono::Utc::now().to_rfc3339(),
            command: None,
        }
    }
}

/// A generated key pair, as reported to the user. Never carries private bytes.
#[derive(Debug, Clone, Serialize)]
pub struct KeyInfo {
    pub identity: String,
    pub algorithm: String,
    pub fingerprint: String,
    /// Text form to publish to the directory
    pub public_key: String,
}

/// A mailbox listing: received or sent items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Folder {
    Inbox,
    Sent,
}

impl Folder {
    /// Command name used in JSON responses
    pub fn command(self) -> &'static str {
        match self {
            Folder::Inbox => "inbox",
            Folder::Sent => "sent",
        }
    }

    fn headers(self) -> [&'static str; 3] {
        match self {
            Folder::Inbox => ["From", "Received", "Message"],
            Folder::Sent => ["To", "Sent", "Message"],
        }
    }
}

/// One listing line: either the opened body or the reason it stayed sealed.
#[derive(Debug, Clone, Serialize)]
pub struct MailEntry {
    /// Sender for inbox items, recipient for sent items
    pub correspondent: String,
    pub timestamp: NaiveDateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Exit code name matching `error`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<&'static str>,
}

/// Formats output for different modes
pub struct OutputFormatter {
    format: OutputFormat,
    verbose: bool,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat, verbose: bool) -> Self {
        Self { format, verbose }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    pub fn is_quiet(&self) -> bool {
        self.format == OutputFormat::Quiet
    }

    /// Format generated key info
    pub fn format_key(&self, info: &KeyInfo) -> String {
        match self.format {
            OutputFormat::Table => self.key_table(info),
            OutputFormat::Json => self.to_json_response(info, "keygen"),
            OutputFormat::Quiet => String::new(),
        }
    }

    /// Format an inbox or sent listing
    pub fn format_mail(&self, folder: Folder, entries: &[MailEntry]) -> String {
        match self.format {
            OutputFormat::Table => self.mail_table(folder, entries),
            OutputFormat::Json => self.to_json_response(
                &MailOutput {
                    count: entries.len(),
                    messages: entries,
                },
                folder.command(),
            ),
            OutputFormat::Quiet => String::new(),
        }
    }

    /// Format a generic success result
    pub fn format_success<T: Serialize>(&self, data: &T, command: &str) -> String {
        match self.format {
            OutputFormat::Table => String::new(),
            OutputFormat::Json => self.to_json_response(data, command),
            OutputFormat::Quiet => String::new(),
        }
    }

    /// Format error with exit code context
    pub fn format_error_with_code(&self, message: &str, code: ExitCode) -> String {
        match self.format {
            OutputFormat::Table => format!("Error: {message}"),
            OutputFormat::Json => {
                let mut output = serde_json::to_value(JsonResponse::<()>::error(message))
                    .unwrap_or_default();
                output["exit_code"] = serde_json::json!(code as i32);
                output["exit_code_name"] = serde_json::json!(code.name());
                self.to_json(&output)
            }
            OutputFormat::Quiet => String::new(),
        }
    }

    /// Report a failure and hand back its exit code
    pub fn fail(&self, message: &str, code: ExitCode) -> ExitCode {
        match self.format {
            OutputFormat::Table => eprintln!("✗ {message}"),
            OutputFormat::Json => println!("{}", self.format_error_with_code(message, code)),
            OutputFormat::Quiet => {}
        }
        code
    }

    /// Format progress message (only shown in verbose mode)
    pub fn progress(&self, message: &str) {
        if self.verbose && self.format == OutputFormat::Table {
            eprintln!("... {message}");
        }
    }

    pub fn success(&self, message: &str) {
        if self.format == OutputFormat::Table {
            println!("✓ {message}");
        }
    }

    pub fn warning(&self, message: &str) {
        if self.format == OutputFormat::Table {
            eprintln!("⚠ {message}");
        } else if self.format == OutputFormat::Json {
            println!(
                "{}",
                self.to_json(&WarningOutput {
                    warning: message.to_string(),
                    timestamp: chrono::Utc::now().to_rfc3339(),
                })
            );
        }
    }

    fn to_json<T: Serialize>(&self, value: &T) -> String {
        serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"))
    }

    /// Format data with consistent JSON response wrapper
    fn to_json_response<T: Serialize>(&self, value: &T, command: &str) -> String {
        self.to_json(&JsonResponse::success_with_command(value, command))
    }

    fn key_table(&self, info: &KeyInfo) -> String {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(vec!["Property", "Value"]);
        table.add_row(vec!["Identity", &info.identity]);
        table.add_row(vec!["Algorithm", &info.algorithm]);
        table.add_row(vec!["Fingerprint", &info.fingerprint]);
        format!("{table}\nPublic key:\n{}", info.public_key)
    }

    fn mail_table(&self, folder: Folder, entries: &[MailEntry]) -> String {
        if entries.is_empty() {
            return "No messages.".to_string();
        }

        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(folder.headers().to_vec());

        for entry in entries {
            let body = match (&entry.message, &entry.error) {
                (Some(message), _) => message.clone(),
                (None, Some(error)) => format!("[{error}]"),
                (None, None) => String::new(),
            };
            table.add_row(vec![
                entry.correspondent.clone(),
                format_time(&entry.timestamp),
                body,
            ]);
        }

        table.to_string()
    }
}

fn format_time(time: &NaiveDateTime) -> String {
    time.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

#[derive(Serialize)]
struct MailOutput<'a> {
    messages: &'a [MailEntry],
    count: usize,
}

#[derive(Serialize)]
struct WarningOutput {
    warning: String,
    timestamp: String,
}

/// Simple success message for JSON output
#[derive(Serialize)]
pub struct SuccessMessage {
    pub message: String,
}

impl SuccessMessage {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(message: Option<&str>, error: Option<&str>) -> MailEntry {
        MailEntry {
            correspondent: "alice@qmail.co.in".to_string(),
            timestamp: chrono::DateTime::from_timestamp(1_700_000_000, 0).unwrap().naive_utc(),
            message: message.map(str::to_string),
            error: error.map(str::to_string),
            error_code: error.map(|_| "CANNOT_DECRYPT"),
        }
    }

    #[test]
    fn test_output_format_parsing() {
        assert_eq!(OutputFormat::from_str("table").unwrap(), OutputFormat::Table);
        assert_eq!(OutputFormat::from_str("json").unwrap(), OutputFormat::Json);
        assert_eq!(OutputFormat::from_str("quiet").unwrap(), OutputFormat::Quiet);
        assert_eq!(OutputFormat::from_str("JSON").unwrap(), OutputFormat::Json);
        assert!(OutputFormat::from_str("invalid").is_err());
    }

    #[test]
    fn test_output_format_display() {
        assert_eq!(OutputFormat::Table.to_string(), "table");
        assert_eq!(OutputFormat::Json.to_string(), "json");
        assert_eq!(OutputFormat::Quiet.to_string(), "quiet");
    }

    #[test]
    fn test_json_response_error() {
        let response = JsonResponse::<()>::error("test error");
        assert!(!response.success);
        assert!(response.data.is_none());
        assert_eq!(response.error, Some("test error".to_string()));
    }

    #[test]
    fn test_formatter_quiet_mode() {
        let formatter = OutputFormatter::new(OutputFormat::Quiet, false);
        assert!(formatter.is_quiet());
        assert_eq!(formatter.format_mail(Folder::Inbox, &[entry(Some("hi"), None)]), "");
    }

    #[test]
    fn test_inbox_json_is_valid() {
        let formatter = OutputFormatter::new(OutputFormat::Json, false);
        let output = formatter.format_mail(
            Folder::Inbox,
            &[entry(Some("hi"), None), entry(None, Some("cannot decrypt this message"))],
        );

        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["data"]["count"], 2);
        assert_eq!(value["data"]["messages"][0]["message"], "hi");
        assert!(value["data"]["messages"][0].get("error_code").is_none());
        assert_eq!(value["data"]["messages"][1]["error"], "cannot decrypt this message");
        assert_eq!(value["data"]["messages"][1]["error_code"], "CANNOT_DECRYPT");
        assert_eq!(value["command"], "inbox");
    }

    #[test]
    fn test_inbox_table_shows_failures_inline() {
        let formatter = OutputFormatter::new(OutputFormat::Table, false);
        let output =
            formatter.format_mail(Folder::Inbox, &[entry(None, Some("cannot decrypt this message"))]);
        assert!(output.contains("[cannot decrypt this message]"));
        assert!(output.contains("2023-11-14 22:13:20 UTC"));
        assert!(output.contains("From"));

        assert_eq!(formatter.format_mail(Folder::Inbox, &[]), "No messages.");
    }

    #[test]
    fn test_sent_listing_is_addressed_to_recipients() {
        let table = OutputFormatter::new(OutputFormat::Table, false).format_mail(
            Folder::Sent,
            &[entry(None, Some("sent messages cannot be decrypted on this device"))],
        );
        assert!(table.contains("To"));
        assert!(table.contains("[sent messages cannot be decrypted on this device]"));

        let json = OutputFormatter::new(OutputFormat::Json, false)
            .format_mail(Folder::Sent, &[entry(Some("hi"), None)]);
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["command"], "sent");
        assert_eq!(value["data"]["messages"][0]["correspondent"], "alice@qmail.co.in");
    }

    #[test]
    fn test_error_json_carries_exit_code() {
        let formatter = OutputFormatter::new(OutputFormat::Json, false);
        let output = formatter.format_error_with_code("no key", ExitCode::KeyNotFound);

        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["success"], false);
        assert_eq!(value["exit_code"], 6);
        assert_eq!(value["exit_code_name"], "KEY_NOT_FOUND");
    }
}
