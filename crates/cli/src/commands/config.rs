use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use courier_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let file_path = detect_config_path();
    let file_doc = load_config_file_doc(file_path.as_deref());
    let sources = SourceLookup { file_doc: file_doc.as_ref(), file_path: file_path.as_deref() };

    let api_key = config
        .llm
        .api_key
        .as_ref()
        .map(|key| redact_secret(key.expose_secret()))
        .unwrap_or_else(|| "<unset>".to_string());

    let entries: Vec<(&str, String, &str)> = vec![
        ("database.url", config.database.url.clone(), "COURIER_DATABASE_URL"),
        (
            "database.max_connections",
            config.database.max_connections.to_string(),
            "COURIER_DATABASE_MAX_CONNECTIONS",
        ),
        (
            "database.timeout_secs",
            config.database.timeout_secs.to_string(),
            "COURIER_DATABASE_TIMEOUT_SECS",
        ),
        ("llm.provider", format!("{:?}", config.llm.provider), "COURIER_LLM_PROVIDER"),
        ("llm.model", config.llm.model.clone(), "COURIER_LLM_MODEL"),
        ("llm.verifier_model", config.llm.verifier_model().to_string(), "COURIER_LLM_VERIFIER_MODEL"),
        ("llm.base_url", config.llm.resolved_base_url().to_string(), "COURIER_LLM_BASE_URL"),
        ("llm.api_key", api_key, "COURIER_LLM_API_KEY"),
        ("llm.timeout_secs", config.llm.timeout_secs.to_string(), "COURIER_LLM_TIMEOUT_SECS"),
        (
            "llm.rate_limit_attempts",
            config.llm.rate_limit_attempts.to_string(),
            "COURIER_LLM_RATE_LIMIT_ATTEMPTS",
        ),
        (
            "assistant.response_budget_secs",
            config.assistant.response_budget_secs.to_string(),
            "COURIER_ASSISTANT_RESPONSE_BUDGET_SECS",
        ),
        (
            "assistant.trip_window_days",
            config.assistant.trip_window_days.to_string(),
            "COURIER_ASSISTANT_TRIP_WINDOW_DAYS",
        ),
        (
            "assistant.history_limit",
            config.assistant.history_limit.to_string(),
            "COURIER_ASSISTANT_HISTORY_LIMIT",
        ),
        (
            "assistant.verification_enabled",
            config.assistant.verification_enabled.to_string(),
            "COURIER_ASSISTANT_VERIFICATION_ENABLED",
        ),
        ("server.bind_address", config.server.bind_address.clone(), "COURIER_SERVER_BIND_ADDRESS"),
        ("server.port", config.server.port.to_string(), "COURIER_SERVER_PORT"),
        ("logging.level", config.logging.level.clone(), "COURIER_LOGGING_LEVEL"),
        ("logging.format", format!("{:?}", config.logging.format), "COURIER_LOGGING_FORMAT"),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    lines.extend(entries.into_iter().map(|(key, value, env_key)| {
        format!("- {key} = {value} (source: {})", sources.source_of(key, env_key))
    }));
    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    ["courier.toml", "config/courier.toml"].into_iter().map(PathBuf::from).find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let raw = fs::read_to_string(path?).ok()?;
    raw.parse::<Value>().ok()
}

struct SourceLookup<'a> {
    file_doc: Option<&'a Value>,
    file_path: Option<&'a Path>,
}

impl SourceLookup<'_> {
    fn source_of(&self, key_path: &str, env_key: &str) -> String {
        if env::var_os(env_key).is_some() {
            return format!("env ({env_key})");
        }

        if self.file_doc.is_some_and(|doc| contains_path(doc, key_path)) {
            let file_path = self
                .file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }

        "default".to_string()
    }
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

/// Keeps a recognisable key prefix such as `sk-` and hides the rest.
fn redact_secret(secret: &str) -> String {
    let trimmed = secret.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}
