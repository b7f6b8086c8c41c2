use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug, Default)]
pub struct AppConfig {
    pub backend: BackendConfig,
    pub routing: RoutingConfig,
    pub rfq: RfqConfig,
    pub approvals: ApprovalsConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct BackendConfig {
    pub base_url: String,
    pub api_token: Option<SecretString>,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoutingConfig {
    pub vendor_path: String,
    pub management_path: String,
    pub employee_path: String,
    pub billing_path: String,
    pub default_path: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RfqConfig {
    /// Whether a vendor may be chosen again once the RFQ is closed.
    pub allow_reselection_after_close: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ApprovalsConfig {
    pub sla_warning_hours: u32,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub backend_base_url: Option<String>,
    pub backend_api_token: Option<String>,
    pub backend_timeout_secs: Option<u64>,
    pub allow_reselection_after_close: Option<bool>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self { base_url: "http://localhost:5000/api".to_string(), api_token: None, timeout_secs: 30 }
    }
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            vendor_path: "/vendor".to_string(),
            management_path: "/management".to_string(),
            employee_path: "/employee".to_string(),
            billing_path: "/billing".to_string(),
            default_path: "/dashboard".to_string(),
        }
    }
}

impl Default for ApprovalsConfig {
    fn default() -> Self {
        Self { sla_warning_hours: 24 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: LogFormat::Compact }
    }
}

impl ApprovalsConfig {
    pub fn sla_warning_window(&self) -> chrono::Duration {
        chrono::Duration::hours(i64::from(self.sla_warning_hours))
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("procura.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(backend) = patch.backend {
            if let Some(base_url) = backend.base_url {
                self.backend.base_url = base_url;
            }
            if let Some(api_token) = backend.api_token {
                self.backend.api_token = Some(secret_value(api_token));
            }
            if let Some(timeout_secs) = backend.timeout_secs {
                self.backend.timeout_secs = timeout_secs;
            }
        }

        if let Some(routing) = patch.routing {
            if let Some(vendor_path) = routing.vendor_path {
                self.routing.vendor_path = vendor_path;
            }
            if let Some(management_path) = routing.management_path {
                self.routing.management_path = management_path;
            }
            if let Some(employee_path) = routing.employee_path {
                self.routing.employee_path = employee_path;
            }
            if let Some(billing_path) = routing.billing_path {
                self.routing.billing_path = billing_path;
            }
            if let Some(default_path) = routing.default_path {
                self.routing.default_path = default_path;
            }
        }

        if let Some(rfq) = patch.rfq {
            if let Some(allow) = rfq.allow_reselection_after_close {
                self.rfq.allow_reselection_after_close = allow;
            }
        }

        if let Some(approvals) = patch.approvals {
            if let Some(sla_warning_hours) = approvals.sla_warning_hours {
                self.approvals.sla_warning_hours = sla_warning_hours;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("PROCURA_BACKEND_BASE_URL") {
            self.backend.base_url = value;
        }
        if let Some(value) = read_env("PROCURA_BACKEND_API_TOKEN") {
            self.backend.api_token = Some(secret_value(value));
        }
        if let Some(value) = read_env("PROCURA_BACKEND_TIMEOUT_SECS") {
            self.backend.timeout_secs = parse_u64("PROCURA_BACKEND_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("PROCURA_ROUTING_VENDOR_PATH") {
            self.routing.vendor_path = value;
        }
        if let Some(value) = read_env("PROCURA_ROUTING_MANAGEMENT_PATH") {
            self.routing.management_path = value;
        }
        if let Some(value) = read_env("PROCURA_ROUTING_EMPLOYEE_PATH") {
            self.routing.employee_path = value;
        }
        if let Some(value) = read_env("PROCURA_ROUTING_BILLING_PATH") {
            self.routing.billing_path = value;
        }
        if let Some(value) = read_env("PROCURA_ROUTING_DEFAULT_PATH") {
            self.routing.default_path = value;
        }

        if let Some(value) = read_env("PROCURA_RFQ_ALLOW_RESELECTION_AFTER_CLOSE") {
            self.rfq.allow_reselection_after_close =
                parse_bool("PROCURA_RFQ_ALLOW_RESELECTION_AFTER_CLOSE", &value)?;
        }

        if let Some(value) = read_env("PROCURA_APPROVALS_SLA_WARNING_HOURS") {
            self.approvals.sla_warning_hours =
                parse_u32("PROCURA_APPROVALS_SLA_WARNING_HOURS", &value)?;
        }

        let log_level =
            read_env("PROCURA_LOGGING_LEVEL").or_else(|| read_env("PROCURA_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("PROCURA_LOGGING_FORMAT").or_else(|| read_env("PROCURA_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(base_url) = overrides.backend_base_url {
            self.backend.base_url = base_url;
        }
        if let Some(api_token) = overrides.backend_api_token {
            self.backend.api_token = Some(secret_value(api_token));
        }
        if let Some(timeout_secs) = overrides.backend_timeout_secs {
            self.backend.timeout_secs = timeout_secs;
        }
        if let Some(allow) = overrides.allow_reselection_after_close {
            self.rfq.allow_reselection_after_close = allow;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(log_format) = overrides.log_format {
            self.logging.format = log_format;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_backend(&self.backend)?;
        validate_routing(&self.routing)?;
        validate_approvals(&self.approvals)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("procura.toml"), PathBuf::from("config/procura.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_backend(backend: &BackendConfig) -> Result<(), ConfigError> {
    let base_url = backend.base_url.trim();
    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "backend.base_url must start with http:// or https://".to_string(),
        ));
    }

    if backend.timeout_secs == 0 || backend.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "backend.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if let Some(token) = &backend.api_token {
        if token.expose_secret().trim().is_empty() {
            return Err(ConfigError::Validation(
                "backend.api_token must not be blank when set".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_routing(routing: &RoutingConfig) -> Result<(), ConfigError> {
    let paths = [
        ("routing.vendor_path", &routing.vendor_path),
        ("routing.management_path", &routing.management_path),
        ("routing.employee_path", &routing.employee_path),
        ("routing.billing_path", &routing.billing_path),
        ("routing.default_path", &routing.default_path),
    ];

    for (key, path) in paths {
        if !path.starts_with('/') {
            return Err(ConfigError::Validation(format!("{key} must start with `/`")));
        }
    }

    if routing.default_path.trim_end_matches('/') == routing.billing_path.trim_end_matches('/') {
        return Err(ConfigError::Validation(
            "routing.default_path must differ from routing.billing_path".to_string(),
        ));
    }

    Ok(())
}

fn validate_approvals(approvals: &ApprovalsConfig) -> Result<(), ConfigError> {
    if approvals.sla_warning_hours == 0 {
        return Err(ConfigError::Validation(
            "approvals.sla_warning_hours must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    backend: Option<BackendPatch>,
    routing: Option<RoutingPatch>,
    rfq: Option<RfqPatch>,
    approvals: Option<ApprovalsPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct BackendPatch {
    base_url: Option<String>,
    api_token: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct RoutingPatch {
    vendor_path: Option<String>,
    management_path: Option<String>,
    employee_path: Option<String>,
    billing_path: Option<String>,
    default_path: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RfqPatch {
    allow_reselection_after_close: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct ApprovalsPatch {
    sla_warning_hours: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn defaults_are_valid_without_file_or_env() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let config = AppConfig::load(LoadOptions::default())
            .map_err(|err| format!("config load failed: {err}"))?;
        ensure(config.backend.timeout_secs == 30, "default timeout should be 30s")?;
        ensure(
            !config.rfq.allow_reselection_after_close,
            "reselection after close should be off by default",
        )?;
        ensure(config.routing.billing_path == "/billing", "default billing path")
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_PROCURA_TOKEN", "token-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("procura.toml");
            fs::write(
                &path,
                r#"
[backend]
base_url = "https://procurement.example.com/api"
api_token = "${TEST_PROCURA_TOKEN}"

[rfq]
allow_reselection_after_close = true
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.backend.api_token.as_ref().map(|token| token.expose_secret().to_string())
                    == Some("token-from-env".to_string()),
                "api token should be interpolated from environment",
            )?;
            ensure(
                config.rfq.allow_reselection_after_close,
                "rfq reselection flag should come from file",
            )?;
            Ok(())
        })();

        clear_vars(&["TEST_PROCURA_TOKEN"]);
        result
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("PROCURA_LOG_LEVEL", "warn");
        env::set_var("PROCURA_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "pretty logging format should be set from env var",
            )?;
            Ok(())
        })();

        clear_vars(&["PROCURA_LOG_LEVEL", "PROCURA_LOG_FORMAT"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("PROCURA_BACKEND_BASE_URL", "https://from-env.example.com");
        env::set_var("PROCURA_BACKEND_TIMEOUT_SECS", "12");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("procura.toml");
            fs::write(
                &path,
                r#"
[backend]
base_url = "https://from-file.example.com"
timeout_secs = 45

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    backend_base_url: Some("https://from-override.example.com".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.backend.base_url == "https://from-override.example.com",
                "override base url should win",
            )?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(config.backend.timeout_secs == 12, "env timeout should win over file")?;
            Ok(())
        })();

        clear_vars(&["PROCURA_BACKEND_BASE_URL", "PROCURA_BACKEND_TIMEOUT_SECS"]);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("PROCURA_BACKEND_BASE_URL", "ftp://procurement.example.com");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("backend.base_url")
            );
            ensure(has_message, "validation failure should mention backend.base_url")
        })();

        clear_vars(&["PROCURA_BACKEND_BASE_URL"]);
        result
    }

    #[test]
    fn invalid_numeric_env_override_is_reported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("PROCURA_APPROVALS_SLA_WARNING_HOURS", "soon");

        let result = match AppConfig::load(LoadOptions::default()) {
            Err(ConfigError::InvalidEnvOverride { key, .. }) => ensure(
                key == "PROCURA_APPROVALS_SLA_WARNING_HOURS",
                "error should name the offending variable",
            ),
            _ => Err("expected invalid env override error".to_string()),
        };

        clear_vars(&["PROCURA_APPROVALS_SLA_WARNING_HOURS"]);
        result
    }

    #[test]
    fn api_token_is_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("PROCURA_BACKEND_API_TOKEN", "bearer-secret-value");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(
                !debug.contains("bearer-secret-value"),
                "debug output should not contain api token",
            )?;
            ensure(
                matches!(config.logging.format, LogFormat::Compact),
                "default logging format should be compact",
            )?;
            Ok(())
        })();

        clear_vars(&["PROCURA_BACKEND_API_TOKEN"]);
        result
    }
}
