use courier_agent::{AssistantRequest, AssistantRuntime};

use crate::commands::seed::load_and_verify;
use crate::commands::{connect_and_migrate, prepare, CommandResult, StepFailure};

#[derive(Debug, Clone)]
pub struct AskArgs {
    pub phone: String,
    pub customer_id: Option<String>,
    pub seed: bool,
    pub message: String,
}

/// One turn through the full assistant pipeline against the configured
/// store. The assistant response goes under `data`.
pub fn run(args: AskArgs) -> CommandResult {
    if args.message.trim().is_empty() || args.phone.trim().is_empty() {
        return CommandResult::failure("ask", "invalid_input", "message and phone are required", 2);
    }

    let (config, runtime) = match prepare("ask") {
        Ok(prepared) => prepared,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = connect_and_migrate(&config).await?;
        if args.seed {
            if let Err(failure) = load_and_verify(&pool).await {
                pool.close().await;
                return Err(failure);
            }
        }

        let assistant = match AssistantRuntime::from_config(&config, pool.clone()) {
            Ok(assistant) => assistant,
            Err(error) => {
                pool.close().await;
                return Err(("llm_client", error.to_string(), 7u8));
            }
        };
        let response = assistant
            .respond(AssistantRequest {
                message: args.message,
                customer_phone: args.phone,
                customer_id: args.customer_id,
            })
            .await;
        pool.close().await;

        let data: Result<serde_json::Value, StepFailure> = serde_json::to_value(&response)
            .map_err(|error| ("serialization", error.to_string(), 8u8));
        data
    });

    match result {
        Ok(data) => CommandResult::success_with_data("ask", "assistant responded", Some(data)),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("ask", error_class, message, exit_code)
        }
    }
}
