pub mod actions;
pub mod bid_readiness;
pub mod config;
pub mod doctor;
pub mod entitlement;
pub mod matrix;
pub mod pending;
pub mod quotes;

use std::fs;
use std::path::Path;

use anyhow::Context;
use procura_core::config::{AppConfig, LoadOptions};
use serde::de::DeserializeOwned;
use serde::Serialize;

pub const EXIT_CONFIG: u8 = 2;
pub const EXIT_INPUT: u8 = 3;
pub const EXIT_BACKEND: u8 = 4;

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
}

#[derive(Debug, Serialize)]
struct CommandReport<T: Serialize> {
    command: String,
    status: String,
    result: T,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
        };
        Self { exit_code: 0, output: serialize_payload(&payload) }
    }

    pub fn report(command: &str, result: impl Serialize) -> Self {
        let payload = CommandReport {
            command: command.to_string(),
            status: "ok".to_string(),
            result,
        };
        Self { exit_code: 0, output: serialize_payload(&payload) }
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
        };
        Self { exit_code, output: serialize_payload(&payload) }
    }
}

/// Loads configuration or produces the command's config failure payload.
pub(crate) fn load_config(command: &str) -> Result<AppConfig, CommandResult> {
    AppConfig::load(LoadOptions::default()).map_err(|error| {
        CommandResult::failure(
            command,
            "config_validation",
            format!("config validation failed: {error}"),
            EXIT_CONFIG,
        )
    })
}

pub(crate) fn read_input<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read input file `{}`", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse input file `{}`", path.display()))
}

pub(crate) fn input_failure(command: &str, error: &anyhow::Error) -> CommandResult {
    CommandResult::failure(command, "input", format!("{error:#}"), EXIT_INPUT)
}

fn serialize_payload(payload: &impl Serialize) -> String {
    serde_json::to_string(payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}
