use courier_db::{DemoSeedDataset, SeedCustomerInfo, SeedVerification};

use crate::commands::{connect_and_migrate, prepare, CommandResult, StepFailure};

pub fn run() -> CommandResult {
    let (config, runtime) = match prepare("seed") {
        Ok(prepared) => prepared,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = connect_and_migrate(&config).await?;
        let outcome = load_and_verify(&pool).await;
        pool.close().await;
        outcome
    });

    match result {
        Ok(customers) => CommandResult::success("seed", seed_summary(&customers)),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}

pub(crate) async fn load_and_verify(
    pool: &courier_db::DbPool,
) -> Result<Vec<SeedCustomerInfo>, StepFailure> {
    let seeded = DemoSeedDataset::load(pool)
        .await
        .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;
    let verification = DemoSeedDataset::verify(pool)
        .await
        .map_err(|error| ("seed_verification", error.to_string(), 6u8))?;

    if verification.all_present {
        Ok(seeded.customers_seeded)
    } else {
        Err(("seed_verification", verification_failure_message(&verification), 6u8))
    }
}

fn verification_failure_message(verification: &SeedVerification) -> String {
    let failed_checks = verification
        .checks
        .iter()
        .filter_map(|(check, passed)| (!passed).then_some(check.as_str()))
        .collect::<Vec<_>>();
    if failed_checks.is_empty() {
        "Some seed data failed to load".to_string()
    } else {
        format!("Seed verification failed for checks: {}", failed_checks.join(", "))
    }
}

fn seed_summary(customers: &[SeedCustomerInfo]) -> String {
    let lines = customers
        .iter()
        .map(|customer| format!("  - {}: {}", customer.customer_id, customer.description))
        .collect::<Vec<_>>();
    format!("demo dataset loaded for {} customers:\n{}", customers.len(), lines.join("\n"))
}
