pub mod config;
pub mod export;
pub mod profiles;
pub mod reconcile;
pub mod summarize;

use planbook_core::config::{AppConfig, LoadOptions};
use planbook_core::{ApplicationError, DomainError};
use serde::Serialize;
use serde_json::Value;

pub const EXIT_CONFIG: u8 = 2;
pub const EXIT_WORKBOOK: u8 = 3;
pub const EXIT_DOMAIN: u8 = 4;
pub const EXIT_ROWS: u8 = 5;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            data: None,
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn success_with_data(
        command: &str,
        message: impl Into<String>,
        data: &impl Serialize,
    ) -> Self {
        let data = match serde_json::to_value(data) {
            Ok(data) => data,
            Err(error) => {
                return Self::failure(command, "serialization", error.to_string(), 1);
            }
        };
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            data: Some(data),
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
            data: None,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }

    /// Maps an application error through the interface layer, using the
    /// command name as correlation id.
    pub fn application_failure(
        command: &str,
        error_class: &str,
        error: ApplicationError,
        exit_code: u8,
    ) -> Self {
        let interface = error.into_interface(command);
        Self::failure(command, error_class, interface.to_string(), exit_code)
    }

    pub fn domain_failure(command: &str, error: DomainError) -> Self {
        Self::application_failure(command, "domain", error.into(), EXIT_DOMAIN)
    }

    /// Workbook or row file I/O failure.
    pub fn persistence_failure(
        command: &str,
        error_class: &str,
        error: &anyhow::Error,
        exit_code: u8,
    ) -> Self {
        let error = ApplicationError::Persistence(format!("{error:#}"));
        Self::application_failure(command, error_class, error, exit_code)
    }
}

pub(crate) fn load_config(command: &str) -> Result<AppConfig, CommandResult> {
    AppConfig::load(LoadOptions::default()).map_err(|error| {
        let error = ApplicationError::Configuration(format!("config validation failed: {error}"));
        CommandResult::application_failure(command, "config_validation", error, EXIT_CONFIG)
    })
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}
