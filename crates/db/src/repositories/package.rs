use sqlx::{sqlite::SqliteRow, QueryBuilder, Row, Sqlite};

use courier_core::domain::customer::CustomerId;
use courier_core::domain::package::{PackageId, PackageRecord, Payment, TripLink};
use courier_core::domain::trip::TripId;

use super::sql::{
    non_empty, parse_date, parse_decimal, parse_enum, parse_optional_decimal, parse_timestamp,
};
use super::{PackageRepository, RepositoryError};
use crate::DbPool;

pub struct SqlPackageRepository {
    pool: DbPool,
}

impl SqlPackageRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl PackageRepository for SqlPackageRepository {
    async fn list_for_customer(
        &self,
        customer_id: &CustomerId,
    ) -> Result<Vec<PackageRecord>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT
                p.id,
                p.customer_id,
                p.tracking_number,
                p.status,
                p.origin,
                p.destination,
                p.description,
                p.weight_kg,
                p.freight,
                p.currency,
                p.amount_to_collect,
                p.created_at,
                t.id AS trip_id,
                t.departure_date AS trip_departure_date,
                t.status AS trip_status,
                t.flight_number AS trip_flight_number
             FROM package p
             LEFT JOIN trip t ON t.id = p.trip_id
             WHERE p.customer_id = ?
             ORDER BY p.created_at DESC, p.id ASC",
        )
        .bind(&customer_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(package_from_row).collect()
    }

    async fn payments_for_packages(
        &self,
        package_ids: &[PackageId],
    ) -> Result<Vec<Payment>, RepositoryError> {
        if package_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder: QueryBuilder<'_, Sqlite> = QueryBuilder::new(
            "SELECT id, package_id, amount, currency, paid_at FROM payment WHERE package_id IN (",
        );
        let mut separated = builder.separated(", ");
        for package_id in package_ids {
            separated.push_bind(package_id.0.as_str());
        }
        separated.push_unseparated(") ORDER BY paid_at ASC, id ASC");

        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.into_iter().map(payment_from_row).collect()
    }

    async fn save(&self, package: PackageRecord) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO package (
                id,
                customer_id,
                tracking_number,
                status,
                origin,
                destination,
                description,
                weight_kg,
                freight,
                currency,
                amount_to_collect,
                trip_id,
                created_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                status = excluded.status,
                origin = excluded.origin,
                destination = excluded.destination,
                description = excluded.description,
                weight_kg = excluded.weight_kg,
                freight = excluded.freight,
                currency = excluded.currency,
                amount_to_collect = excluded.amount_to_collect,
                trip_id = excluded.trip_id",
        )
        .bind(&package.id.0)
        .bind(&package.customer_id.0)
        .bind(&package.tracking_number)
        .bind(package.status.as_str())
        .bind(&package.origin)
        .bind(&package.destination)
        .bind(&package.description)
        .bind(package.weight_kg.map(|weight| weight.to_string()))
        .bind(package.freight.to_string())
        .bind(package.currency.code())
        .bind(package.amount_to_collect.to_string())
        .bind(package.trip.as_ref().map(|trip| trip.trip_id.0.as_str()))
        .bind(package.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn save_payment(&self, payment: Payment) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO payment (id, package_id, amount, currency, paid_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&payment.id)
        .bind(&payment.package_id.0)
        .bind(payment.amount.to_string())
        .bind(payment.currency.code())
        .bind(payment.paid_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn package_from_row(row: SqliteRow) -> Result<PackageRecord, RepositoryError> {
    let trip = match row.try_get::<Option<String>, _>("trip_id")? {
        Some(trip_id) => Some(TripLink {
            trip_id: TripId(trip_id),
            departure_date: parse_date(
                "trip.departure_date",
                row.try_get("trip_departure_date")?,
            )?,
            status: parse_enum("trip.status", row.try_get("trip_status")?)?,
            flight_number: non_empty(row.try_get("trip_flight_number")?),
        }),
        None => None,
    };

    Ok(PackageRecord {
        id: PackageId(row.try_get("id")?),
        customer_id: CustomerId(row.try_get("customer_id")?),
        tracking_number: row.try_get("tracking_number")?,
        status: parse_enum("status", row.try_get("status")?)?,
        origin: row.try_get("origin")?,
        destination: row.try_get("destination")?,
        description: row.try_get("description")?,
        weight_kg: parse_optional_decimal("weight_kg", row.try_get("weight_kg")?)?,
        freight: parse_decimal("freight", row.try_get("freight")?)?,
        currency: parse_enum("currency", row.try_get("currency")?)?,
        amount_to_collect: parse_decimal("amount_to_collect", row.try_get("amount_to_collect")?)?,
        trip,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
    })
}

fn payment_from_row(row: SqliteRow) -> Result<Payment, RepositoryError> {
    Ok(Payment {
        id: row.try_get("id")?,
        package_id: PackageId(row.try_get("package_id")?),
        amount: parse_decimal("amount", row.try_get("amount")?)?,
        currency: parse_enum("currency", row.try_get("currency")?)?,
        paid_at: parse_timestamp("paid_at", row.try_get("paid_at")?)?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, NaiveDate, Utc};
    use rust_decimal::Decimal;

    use courier_core::domain::customer::{Customer, CustomerId};
    use courier_core::domain::package::{
        PackageId, PackageRecord, PackageStatus, Payment, TripLink,
    };
    use courier_core::domain::trip::{TripId, TripSchedule, TripStatus};
    use courier_core::money::Currency;

    use super::SqlPackageRepository;
    use crate::repositories::sql::test_support::setup_pool;
    use crate::repositories::{
        CustomerRepository, PackageRepository, SqlCustomerRepository, SqlTripRepository,
        TripRepository,
    };

    fn parse_ts(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value).expect("timestamp").with_timezone(&Utc)
    }

    fn package(id: &str, customer: &str, tracking: &str, trip: Option<TripLink>) -> PackageRecord {
        PackageRecord {
            id: PackageId(id.to_string()),
            customer_id: CustomerId(customer.to_string()),
            tracking_number: tracking.to_string(),
            status: PackageStatus::AtDestination,
            origin: "Barranquilla".to_string(),
            destination: "Curazao".to_string(),
            description: "Caja".to_string(),
            weight_kg: Some(Decimal::new(125, 1)),
            freight: Decimal::new(150_000, 0),
            currency: Currency::Cop,
            amount_to_collect: Decimal::new(150_000, 0),
            trip,
            created_at: parse_ts("2026-10-01T15:00:00Z"),
        }
    }

    async fn seed_customer(pool: &crate::DbPool, id: &str) {
        SqlCustomerRepository::new(pool.clone())
            .save(Customer {
                id: CustomerId(id.to_string()),
                first_name: "Ana".to_string(),
                last_name: None,
                phone: None,
                whatsapp: None,
            })
            .await
            .expect("save customer");
    }

    #[tokio::test]
    async fn packages_are_scoped_to_customer_and_carry_trip_link() {
        let pool = setup_pool().await;
        seed_customer(&pool, "C-1").await;
        seed_customer(&pool, "C-2").await;

        let trip = TripSchedule {
            id: TripId("T-1".to_string()),
            departure_date: NaiveDate::from_ymd_opt(2026, 10, 16).expect("date"),
            origin: "Barranquilla".to_string(),
            destination: "Curazao".to_string(),
            flight_number: Some("CC-101".to_string()),
            status: TripStatus::Arrived,
        };
        SqlTripRepository::new(pool.clone()).save(trip.clone()).await.expect("save trip");

        let link = TripLink {
            trip_id: trip.id.clone(),
            departure_date: trip.departure_date,
            status: TripStatus::Arrived,
            flight_number: trip.flight_number.clone(),
        };
        let repo = SqlPackageRepository::new(pool.clone());
        let own = package("P-1", "C-1", "EO-2025-0001", Some(link));
        repo.save(own.clone()).await.expect("save own package");
        repo.save(package("P-2", "C-2", "EO-2025-0099", None)).await.expect("save other package");

        let listed = repo.list_for_customer(&CustomerId("C-1".to_string())).await.expect("list");

        assert_eq!(listed, vec![own]);
        pool.close().await;
    }

    #[tokio::test]
    async fn payments_are_loaded_only_for_requested_packages() {
        let pool = setup_pool().await;
        seed_customer(&pool, "C-1").await;
        let repo = SqlPackageRepository::new(pool.clone());
        repo.save(package("P-1", "C-1", "EO-1", None)).await.expect("save P-1");
        repo.save(package("P-2", "C-1", "EO-2", None)).await.expect("save P-2");

        let first = Payment {
            id: "PAY-1".to_string(),
            package_id: PackageId("P-1".to_string()),
            amount: Decimal::new(50_000, 0),
            currency: Currency::Cop,
            paid_at: parse_ts("2026-10-02T10:00:00Z"),
        };
        let second = Payment {
            id: "PAY-2".to_string(),
            package_id: PackageId("P-2".to_string()),
            amount: Decimal::new(10_000, 0),
            currency: Currency::Cop,
            paid_at: parse_ts("2026-10-03T10:00:00Z"),
        };
        repo.save_payment(first.clone()).await.expect("save PAY-1");
        repo.save_payment(second).await.expect("save PAY-2");

        let payments = repo
            .payments_for_packages(&[PackageId("P-1".to_string())])
            .await
            .expect("payments");
        let none = repo.payments_for_packages(&[]).await.expect("empty payments");

        assert_eq!(payments, vec![first]);
        assert!(none.is_empty());
        pool.close().await;
    }
}
