use sqlx::{sqlite::SqliteRow, Row};

use courier_core::domain::freight::FreightRate;

use super::sql::{parse_decimal, parse_enum, parse_optional_timestamp, parse_timestamp};
use super::{FreightRateRepository, RepositoryError};
use crate::DbPool;

pub struct SqlFreightRateRepository {
    pool: DbPool,
}

impl SqlFreightRateRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl FreightRateRepository for SqlFreightRateRepository {
    async fn list_all(&self) -> Result<Vec<FreightRate>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, origin, destination, price_per_kilo, currency, effective_from, effective_until
             FROM freight_rate
             ORDER BY origin ASC, destination ASC, effective_from DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(rate_from_row).collect()
    }

    async fn save(&self, rate: FreightRate) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO freight_rate (
                id,
                origin,
                destination,
                price_per_kilo,
                currency,
                effective_from,
                effective_until
             ) VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                price_per_kilo = excluded.price_per_kilo,
                currency = excluded.currency,
                effective_from = excluded.effective_from,
                effective_until = excluded.effective_until",
        )
        .bind(&rate.id)
        .bind(&rate.origin)
        .bind(&rate.destination)
        .bind(rate.price_per_kilo.to_string())
        .bind(rate.currency.code())
        .bind(rate.effective_from.to_rfc3339())
        .bind(rate.effective_until.map(|until| until.to_rfc3339()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn rate_from_row(row: SqliteRow) -> Result<FreightRate, RepositoryError> {
    Ok(FreightRate {
        id: row.try_get("id")?,
        origin: row.try_get("origin")?,
        destination: row.try_get("destination")?,
        price_per_kilo: parse_decimal("price_per_kilo", row.try_get("price_per_kilo")?)?,
        currency: parse_enum("currency", row.try_get("currency")?)?,
        effective_from: parse_timestamp("effective_from", row.try_get("effective_from")?)?,
        effective_until: parse_optional_timestamp(
            "effective_until",
            row.try_get("effective_until")?,
        )?,
    })
}
