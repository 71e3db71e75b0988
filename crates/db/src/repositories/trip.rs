use chrono::NaiveDate;
use sqlx::{sqlite::SqliteRow, Row};

use courier_core::domain::trip::{TripId, TripSchedule};

use super::sql::{non_empty, parse_date, parse_enum, DATE_FORMAT};
use super::{RepositoryError, TripRepository};
use crate::DbPool;

pub struct SqlTripRepository {
    pool: DbPool,
}

impl SqlTripRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl TripRepository for SqlTripRepository {
    async fn list_departing_between(
        &self,
        from: NaiveDate,
        until: NaiveDate,
    ) -> Result<Vec<TripSchedule>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, departure_date, origin, destination, flight_number, status
             FROM trip
             WHERE departure_date >= ? AND departure_date <= ?
             ORDER BY departure_date ASC, id ASC",
        )
        .bind(from.format(DATE_FORMAT).to_string())
        .bind(until.format(DATE_FORMAT).to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(trip_from_row).collect()
    }

    async fn save(&self, trip: TripSchedule) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO trip (id, departure_date, origin, destination, flight_number, status)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                departure_date = excluded.departure_date,
                origin = excluded.origin,
                destination = excluded.destination,
                flight_number = excluded.flight_number,
                status = excluded.status",
        )
        .bind(&trip.id.0)
        .bind(trip.departure_date.format(DATE_FORMAT).to_string())
        .bind(&trip.origin)
        .bind(&trip.destination)
        .bind(trip.flight_number.as_deref())
        .bind(trip.status.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn trip_from_row(row: SqliteRow) -> Result<TripSchedule, RepositoryError> {
    Ok(TripSchedule {
        id: TripId(row.try_get("id")?),
        departure_date: parse_date("departure_date", row.try_get("departure_date")?)?,
        origin: row.try_get("origin")?,
        destination: row.try_get("destination")?,
        flight_number: non_empty(row.try_get("flight_number")?),
        status: parse_enum("status", row.try_get("status")?)?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use courier_core::domain::trip::{TripId, TripSchedule, TripStatus};

    use super::SqlTripRepository;
    use crate::repositories::sql::test_support::setup_pool;
    use crate::repositories::TripRepository;

    fn day(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, day).expect("date")
    }

    fn trip(id: &str, departure: NaiveDate, status: TripStatus) -> TripSchedule {
        TripSchedule {
            id: TripId(id.to_string()),
            departure_date: departure,
            origin: "Barranquilla".to_string(),
            destination: "Curazao".to_string(),
            flight_number: None,
            status,
        }
    }

    #[tokio::test]
    async fn window_is_inclusive_and_sorted_ascending() {
        let pool = setup_pool().await;
        let repo = SqlTripRepository::new(pool.clone());
        repo.save(trip("T-late", day(28), TripStatus::Scheduled)).await.expect("save late");
        repo.save(trip("T-past", day(10), TripStatus::Arrived)).await.expect("save past");
        repo.save(trip("T-soon", day(21), TripStatus::Pending)).await.expect("save soon");
        repo.save(trip("T-edge", day(19), TripStatus::Scheduled)).await.expect("save edge");

        let trips = repo.list_departing_between(day(19), day(28)).await.expect("list trips");

        let ids = trips.iter().map(|trip| trip.id.0.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["T-edge", "T-soon", "T-late"]);
        pool.close().await;
    }
}
