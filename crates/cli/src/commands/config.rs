use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use procura_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let api_token = config
        .backend
        .api_token
        .as_ref()
        .map_or_else(|| "<unset>".to_string(), |token| redact_token(token.expose_secret()));

    let fields = [
        field("backend.base_url", config.backend.base_url.clone(), &["PROCURA_BACKEND_BASE_URL"]),
        field("backend.api_token", api_token, &["PROCURA_BACKEND_API_TOKEN"]),
        field(
            "backend.timeout_secs",
            config.backend.timeout_secs.to_string(),
            &["PROCURA_BACKEND_TIMEOUT_SECS"],
        ),
        field(
            "routing.vendor_path",
            config.routing.vendor_path.clone(),
            &["PROCURA_ROUTING_VENDOR_PATH"],
        ),
        field(
            "routing.management_path",
            config.routing.management_path.clone(),
            &["PROCURA_ROUTING_MANAGEMENT_PATH"],
        ),
        field(
            "routing.employee_path",
            config.routing.employee_path.clone(),
            &["PROCURA_ROUTING_EMPLOYEE_PATH"],
        ),
        field(
            "routing.billing_path",
            config.routing.billing_path.clone(),
            &["PROCURA_ROUTING_BILLING_PATH"],
        ),
        field(
            "routing.default_path",
            config.routing.default_path.clone(),
            &["PROCURA_ROUTING_DEFAULT_PATH"],
        ),
        field(
            "rfq.allow_reselection_after_close",
            config.rfq.allow_reselection_after_close.to_string(),
            &["PROCURA_RFQ_ALLOW_RESELECTION_AFTER_CLOSE"],
        ),
        field(
            "approvals.sla_warning_hours",
            config.approvals.sla_warning_hours.to_string(),
            &["PROCURA_APPROVALS_SLA_WARNING_HOURS"],
        ),
        field(
            "logging.level",
            config.logging.level.clone(),
            &["PROCURA_LOGGING_LEVEL", "PROCURA_LOG_LEVEL"],
        ),
        field(
            "logging.format",
            format!("{:?}", config.logging.format),
            &["PROCURA_LOGGING_FORMAT", "PROCURA_LOG_FORMAT"],
        ),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    lines.extend(fields.into_iter().map(|(key, value, env_keys)| {
        let source =
            field_source(key, env_keys, config_file_doc.as_ref(), config_file_path.as_deref());
        render_line(key, &value, source)
    }));

    lines.join("\n")
}

fn field(
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
) -> (&'static str, String, &'static [&'static str]) {
    (key, value, env_keys)
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("procura.toml"), PathBuf::from("config/procura.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Keeps a short prefix so operators can tell tokens apart.
fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('_') {
        return format!("{prefix}_***");
    }

    "<redacted>".to_string()
}

#[cfg(test)]
mod tests {
    use toml::Value;

    use super::{contains_path, redact_token};

    #[test]
    fn tokens_never_render_in_full() {
        assert_eq!(redact_token("pk_live_abcdef"), "pk_***");
        assert_eq!(redact_token("opaque-token"), "<redacted>");
        assert_eq!(redact_token("  "), "<empty>");
    }

    #[test]
    fn nested_keys_are_found_in_file() {
        let doc: Value = "[backend]\ntimeout_secs = 10\n".parse().expect("toml parses");
        assert!(contains_path(&doc, "backend.timeout_secs"));
        assert!(!contains_path(&doc, "backend.base_url"));
        assert!(!contains_path(&doc, "rfq.allow_reselection_after_close"));
    }
}
