use sqlx::{sqlite::SqliteRow, Row};

use courier_core::domain::address::DestinationAddress;

use super::sql::non_empty;
use super::{DestinationAddressRepository, RepositoryError};
use crate::DbPool;

pub struct SqlDestinationAddressRepository {
    pool: DbPool,
}

impl SqlDestinationAddressRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl DestinationAddressRepository for SqlDestinationAddressRepository {
    async fn list_all(&self) -> Result<Vec<DestinationAddress>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT city, address_line, contact_name, contact_phone, opening_hours, notes
             FROM destination_address
             ORDER BY city ASC, id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(address_from_row).collect()
    }

    async fn save(&self, address: DestinationAddress) -> Result<(), RepositoryError> {
        let id = format!("addr-{}", address.city.trim().to_lowercase().replace(' ', "-"));
        sqlx::query(
            "INSERT INTO destination_address (
                id,
                city,
                address_line,
                contact_name,
                contact_phone,
                opening_hours,
                notes
             ) VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                address_line = excluded.address_line,
                contact_name = excluded.contact_name,
                contact_phone = excluded.contact_phone,
                opening_hours = excluded.opening_hours,
                notes = excluded.notes",
        )
        .bind(id)
        .bind(&address.city)
        .bind(&address.address_line)
        .bind(address.contact_name.as_deref())
        .bind(address.contact_phone.as_deref())
        .bind(address.opening_hours.as_deref())
        .bind(address.notes.as_deref())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn address_from_row(row: SqliteRow) -> Result<DestinationAddress, RepositoryError> {
    Ok(DestinationAddress {
        city: row.try_get("city")?,
        address_line: row.try_get("address_line")?,
        contact_name: non_empty(row.try_get("contact_name")?),
        contact_phone: non_empty(row.try_get("contact_phone")?),
        opening_hours: non_empty(row.try_get("opening_hours")?),
        notes: non_empty(row.try_get("notes")?),
    })
}

#[cfg(test)]
mod tests {
    use courier_core::domain::address::DestinationAddress;

    use super::SqlDestinationAddressRepository;
    use crate::repositories::sql::test_support::setup_pool;
    use crate::repositories::DestinationAddressRepository;

    #[tokio::test]
    async fn saving_the_same_city_twice_updates_in_place() {
        let pool = setup_pool().await;
        let repo = SqlDestinationAddressRepository::new(pool.clone());
        let mut address = DestinationAddress {
            city: "Curazao".to_string(),
            address_line: "Schottegatweg Oost 12, Willemstad".to_string(),
            contact_name: None,
            contact_phone: Some("+5999 737 0000".to_string()),
            opening_hours: None,
            notes: None,
        };
        repo.save(address.clone()).await.expect("save address");
        address.opening_hours = Some("lunes a viernes".to_string());
        repo.save(address.clone()).await.expect("update address");

        let addresses = repo.list_all().await.expect("list addresses");

        assert_eq!(addresses, vec![address]);
        pool.close().await;
    }
}
