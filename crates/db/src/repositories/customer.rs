use sqlx::{sqlite::SqliteRow, Row};

use courier_core::domain::customer::{Customer, CustomerId};
use courier_core::phone::normalize_digits;

use super::sql::non_empty;
use super::{CustomerRepository, RepositoryError};
use crate::DbPool;

pub struct SqlCustomerRepository {
    pool: DbPool,
}

impl SqlCustomerRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl CustomerRepository for SqlCustomerRepository {
    async fn find_by_id(&self, id: &CustomerId) -> Result<Option<Customer>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, first_name, last_name, phone, whatsapp
             FROM customer
             WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(customer_from_row).transpose()
    }

    async fn find_by_phone_tail(&self, tail: &str) -> Result<Vec<Customer>, RepositoryError> {
        let digits = normalize_digits(tail);
        if digits.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            "SELECT id, first_name, last_name, phone, whatsapp
             FROM customer
             WHERE phone_digits LIKE '%' || ?1
                OR whatsapp_digits LIKE '%' || ?1
             ORDER BY id ASC",
        )
        .bind(&digits)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(customer_from_row).collect()
    }

    async fn save(&self, customer: Customer) -> Result<(), RepositoryError> {
        let phone_digits = customer.phone.as_deref().map(normalize_digits);
        let whatsapp_digits = customer.whatsapp.as_deref().map(normalize_digits);

        sqlx::query(
            "INSERT INTO customer (
                id,
                first_name,
                last_name,
                phone,
                whatsapp,
                phone_digits,
                whatsapp_digits
             ) VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                first_name = excluded.first_name,
                last_name = excluded.last_name,
                phone = excluded.phone,
                whatsapp = excluded.whatsapp,
                phone_digits = excluded.phone_digits,
                whatsapp_digits = excluded.whatsapp_digits",
        )
        .bind(&customer.id.0)
        .bind(&customer.first_name)
        .bind(customer.last_name.as_deref())
        .bind(customer.phone.as_deref())
        .bind(customer.whatsapp.as_deref())
        .bind(phone_digits)
        .bind(whatsapp_digits)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn customer_from_row(row: SqliteRow) -> Result<Customer, RepositoryError> {
    Ok(Customer {
        id: CustomerId(row.try_get("id")?),
        first_name: row.try_get("first_name")?,
        last_name: non_empty(row.try_get("last_name")?),
        phone: non_empty(row.try_get("phone")?),
        whatsapp: non_empty(row.try_get("whatsapp")?),
    })
}
