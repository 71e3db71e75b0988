use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row};
use uuid::Uuid;

use courier_core::domain::conversation::{ConversationTurn, Speaker};

use super::sql::parse_timestamp;
use super::{MessageDirection, MessageLogRepository, RepositoryError};
use crate::DbPool;

pub struct SqlMessageLogRepository {
    pool: DbPool,
}

impl SqlMessageLogRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl MessageLogRepository for SqlMessageLogRepository {
    async fn recent(
        &self,
        direction: MessageDirection,
        phone_digits: &str,
        limit: usize,
    ) -> Result<Vec<ConversationTurn>, RepositoryError> {
        let sql = match direction {
            MessageDirection::Inbound => {
                "SELECT body, received_at AS at
                 FROM inbound_message
                 WHERE phone_digits = ?
                 ORDER BY received_at DESC, id DESC
                 LIMIT ?"
            }
            MessageDirection::Outbound => {
                "SELECT body, sent_at AS at
                 FROM outbound_message
                 WHERE phone_digits = ?
                 ORDER BY sent_at DESC, id DESC
                 LIMIT ?"
            }
        };
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let rows =
            sqlx::query(sql).bind(phone_digits).bind(limit).fetch_all(&self.pool).await?;

        let speaker = speaker_for(direction);
        rows.into_iter().map(|row| turn_from_row(row, speaker)).collect()
    }

    async fn append(
        &self,
        direction: MessageDirection,
        phone_digits: &str,
        body: &str,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let sql = match direction {
            MessageDirection::Inbound => {
                "INSERT INTO inbound_message (id, phone_digits, body, received_at)
                 VALUES (?, ?, ?, ?)"
            }
            MessageDirection::Outbound => {
                "INSERT INTO outbound_message (id, phone_digits, body, sent_at)
                 VALUES (?, ?, ?, ?)"
            }
        };

        sqlx::query(sql)
            .bind(Uuid::new_v4().to_string())
            .bind(phone_digits)
            .bind(body)
            .bind(at.to_rfc3339())
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

pub(crate) fn speaker_for(direction: MessageDirection) -> Speaker {
    match direction {
        MessageDirection::Inbound => Speaker::Customer,
        MessageDirection::Outbound => Speaker::Assistant,
    }
}

fn turn_from_row(row: SqliteRow, speaker: Speaker) -> Result<ConversationTurn, RepositoryError> {
    Ok(ConversationTurn {
        speaker,
        text: row.try_get("body")?,
        timestamp: parse_timestamp("at", row.try_get("at")?)?,
    })
}
