use std::env;
use std::sync::{Mutex, OnceLock};

use courier_cli::commands::{ask, config, migrate, seed};
use serde_json::Value;

const MEMORY_DB: &[(&str, &str)] =
    &[("COURIER_DATABASE_URL", "sqlite::memory:"), ("COURIER_DATABASE_MAX_CONNECTIONS", "1")];

#[test]
fn migrate_returns_success_with_valid_env() {
    with_env(MEMORY_DB, || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
    });
}

#[test]
fn migrate_returns_config_failure_for_openai_without_key() {
    with_env(&[("COURIER_DATABASE_URL", "sqlite::memory:"), ("COURIER_LLM_PROVIDER", "openai")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
        assert!(payload["message"].as_str().unwrap_or_default().contains("llm.api_key"));
    });
}

#[test]
fn seed_lists_every_demo_customer() {
    with_env(MEMORY_DB, || {
        let result = seed::run();
        assert_eq!(result.exit_code, 0, "expected seed success");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "seed");
        assert_eq!(payload["status"], "ok");

        let message = payload["message"].as_str().unwrap_or_default();
        assert!(message.starts_with("demo dataset loaded for 3 customers"));
        assert!(message.contains("  - cust-demo-001: package waiting for pickup in Curazao"));
        assert!(message.contains("  - cust-demo-003: fully paid delivery, account is current"));
    });
}

#[test]
fn seed_is_idempotent_across_runs() {
    with_env(MEMORY_DB, || {
        let first = parse_payload(&seed::run().output);
        let second = parse_payload(&seed::run().output);

        assert_eq!(first["status"], "ok");
        assert_eq!(second["status"], "ok");
        assert_eq!(first["message"], second["message"]);
    });
}

#[test]
fn ask_answers_a_seeded_customer_without_calling_the_model() {
    with_env(MEMORY_DB, || {
        let result = ask::run(ask::AskArgs {
            phone: "+57 300 000 0001".to_string(),
            customer_id: None,
            seed: true,
            message: "¿cuándo viajan?".to_string(),
        });
        assert_eq!(result.exit_code, 0, "expected ask success: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "ask");
        let data = &payload["data"];
        assert_eq!(data["customerInfo"]["found"], Value::Bool(true));
        assert_eq!(data["isFromFallback"], Value::Bool(false));
        assert_eq!(data["wasEscalated"], Value::Bool(false));
        assert!(data["response"].as_str().unwrap_or_default().contains("Curazao"));
    });
}

#[test]
fn ask_rejects_an_empty_message() {
    with_env(MEMORY_DB, || {
        let result = ask::run(ask::AskArgs {
            phone: "+573000000001".to_string(),
            customer_id: None,
            seed: false,
            message: "   ".to_string(),
        });

        assert_eq!(result.exit_code, 2);
        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "invalid_input");
    });
}

#[test]
fn config_attributes_env_sources_and_redacts_the_api_key() {
    with_env(
        &[
            ("COURIER_DATABASE_URL", "sqlite::memory:"),
            ("COURIER_LLM_PROVIDER", "openai"),
            ("COURIER_LLM_API_KEY", "sk-secret-value"),
        ],
        || {
            let output = config::run();

            assert!(output
                .contains("- database.url = sqlite::memory: (source: env (COURIER_DATABASE_URL))"));
            assert!(output.contains("- llm.api_key = sk-*** (source: env (COURIER_LLM_API_KEY))"));
            assert!(output.contains("- server.port = 8080 (source: default)"));
            assert!(!output.contains("secret-value"));
        },
    );
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "COURIER_DATABASE_URL",
        "COURIER_DATABASE_MAX_CONNECTIONS",
        "COURIER_DATABASE_TIMEOUT_SECS",
        "COURIER_LLM_PROVIDER",
        "COURIER_LLM_API_KEY",
        "COURIER_LLM_BASE_URL",
        "COURIER_LLM_MODEL",
        "COURIER_LLM_VERIFIER_MODEL",
        "COURIER_LLM_TIMEOUT_SECS",
        "COURIER_LLM_RATE_LIMIT_ATTEMPTS",
        "COURIER_LLM_SERVER_ERROR_RETRIES",
        "COURIER_LLM_BACKOFF_BASE_MS",
        "COURIER_ASSISTANT_RESPONSE_BUDGET_SECS",
        "COURIER_ASSISTANT_TRIP_WINDOW_DAYS",
        "COURIER_ASSISTANT_HISTORY_LIMIT",
        "COURIER_ASSISTANT_VERIFICATION_ENABLED",
        "COURIER_SERVER_BIND_ADDRESS",
        "COURIER_SERVER_PORT",
        "COURIER_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "COURIER_LOGGING_LEVEL",
        "COURIER_LOGGING_FORMAT",
        "COURIER_LOG_LEVEL",
        "COURIER_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
