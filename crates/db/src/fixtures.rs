use sqlx::Executor;

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

/// Customers in the demo dataset and what each one exercises.
const SEED_CUSTOMERS: &[SeedCustomerContract] = &[
    SeedCustomerContract {
        customer_id: "cust-demo-001",
        whatsapp_digits: "573000000001",
        tracking_numbers: &["EO-2025-0001", "EO-2025-0002"],
        description: "package waiting for pickup in Curazao plus a partially paid delivery",
    },
    SeedCustomerContract {
        customer_id: "cust-demo-002",
        whatsapp_digits: "59994612345",
        tracking_numbers: &["EO-2025-0003"],
        description: "package in transit to Barranquilla, nothing to collect",
    },
    SeedCustomerContract {
        customer_id: "cust-demo-003",
        whatsapp_digits: "573005550101",
        tracking_numbers: &["EO-2025-0004"],
        description: "fully paid delivery, account is current",
    },
];

const SEED_TRIP_IDS: &[&str] = &[
    "trip-demo-arrived",
    "trip-demo-transit",
    "trip-demo-next-cur",
    "trip-demo-cancelled",
    "trip-demo-next-baq",
    "trip-demo-later-cur",
];

const SEED_RATE_IDS: &[&str] = &[
    "rate-demo-baq-cur-2024",
    "rate-demo-baq-cur-2025",
    "rate-demo-cur-baq-old",
    "rate-demo-cur-baq-new",
];

const SEED_ADDRESS_CITIES: &[&str] = &["Barranquilla", "Curazao"];

/// Demo dataset for local runs and the end-to-end scenarios.
pub struct DemoSeedDataset;

impl DemoSeedDataset {
    pub const SQL: &'static str = include_str!("../../../config/fixtures/demo_seed.sql");

    /// Loads the dataset. Rows that already exist are left untouched.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;

        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        let customers_seeded = SEED_CUSTOMERS
            .iter()
            .map(|customer| SeedCustomerInfo {
                customer_id: customer.customer_id,
                description: customer.description,
            })
            .collect::<Vec<_>>();

        Ok(SeedResult { customers_seeded })
    }

    /// Checks that every row the scenarios rely on is present.
    pub async fn verify(pool: &DbPool) -> Result<SeedVerification, RepositoryError> {
        let mut checks = Vec::new();

        for customer in SEED_CUSTOMERS {
            let customer_ok: i64 = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM customer WHERE id = ?1 AND (whatsapp_digits = ?2 OR phone_digits = ?2))",
            )
            .bind(customer.customer_id)
            .bind(customer.whatsapp_digits)
            .fetch_one(pool)
            .await?;
            checks.push((customer.customer_id.to_string(), customer_ok == 1));

            for tracking_number in customer.tracking_numbers {
                let package_ok: i64 = sqlx::query_scalar(
                    "SELECT EXISTS(SELECT 1 FROM package WHERE tracking_number = ?1 AND customer_id = ?2)",
                )
                .bind(tracking_number)
                .bind(customer.customer_id)
                .fetch_one(pool)
                .await?;
                checks.push((format!("package:{tracking_number}"), package_ok == 1));
            }
        }

        let trip_count = count_ids(pool, "trip", SEED_TRIP_IDS).await?;
        checks.push(("trips".to_string(), trip_count == SEED_TRIP_IDS.len() as i64));

        let rate_count = count_ids(pool, "freight_rate", SEED_RATE_IDS).await?;
        checks.push(("freight-rates".to_string(), rate_count == SEED_RATE_IDS.len() as i64));

        for city in SEED_ADDRESS_CITIES {
            let address_ok: i64 = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM destination_address WHERE city = ?1)",
            )
            .bind(city)
            .fetch_one(pool)
            .await?;
            checks.push((format!("address:{city}"), address_ok == 1));
        }

        let all_present = checks.iter().all(|(_, present)| *present);
        Ok(SeedVerification { all_present, checks })
    }

    /// Removes the demo rows, children first.
    pub async fn clean(pool: &DbPool) -> Result<(), RepositoryError> {
        let customer_ids = SEED_CUSTOMERS.iter().map(|customer| customer.customer_id).collect::<Vec<_>>();
        let quoted_customers = sql_array_from_ids(&customer_ids);
        let quoted_trips = sql_array_from_ids(SEED_TRIP_IDS);
        let quoted_rates = sql_array_from_ids(SEED_RATE_IDS);

        let mut tx = pool.begin().await?;
        sqlx::query(&format!(
            "DELETE FROM payment WHERE package_id IN (SELECT id FROM package WHERE customer_id IN {quoted_customers})"
        ))
        .execute(&mut *tx)
        .await?;
        sqlx::query(&format!("DELETE FROM package WHERE customer_id IN {quoted_customers}"))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("DELETE FROM customer WHERE id IN {quoted_customers}"))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("DELETE FROM trip WHERE id IN {quoted_trips}"))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("DELETE FROM freight_rate WHERE id IN {quoted_rates}"))
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM destination_address WHERE id IN ('addr-demo-baq', 'addr-demo-cur')")
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }
}

async fn count_ids(pool: &DbPool, table: &str, ids: &[&str]) -> Result<i64, RepositoryError> {
    let quoted = sql_array_from_ids(ids);
    let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(1) FROM {table} WHERE id IN {quoted}"))
        .fetch_one(pool)
        .await?;
    Ok(count)
}

fn sql_array_from_ids(ids: &[&str]) -> String {
    let quoted = ids.iter().map(|id| format!("'{}'", id.replace('\'', "''"))).collect::<Vec<_>>();
    format!("({})", quoted.join(", "))
}

#[derive(Debug, Clone, Copy)]
struct SeedCustomerContract {
    customer_id: &'static str,
    whatsapp_digits: &'static str,
    tracking_numbers: &'static [&'static str],
    description: &'static str,
}

#[derive(Debug, Clone)]
pub struct SeedResult {
    pub customers_seeded: Vec<SeedCustomerInfo>,
}

#[derive(Debug, Clone)]
pub struct SeedCustomerInfo {
    pub customer_id: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Clone)]
pub struct SeedVerification {
    pub all_present: bool,
    pub checks: Vec<(String, bool)>,
}
