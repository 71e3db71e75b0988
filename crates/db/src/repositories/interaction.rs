use sqlx::{sqlite::SqliteRow, Row};
use uuid::Uuid;

use courier_core::domain::customer::CustomerId;
use courier_core::domain::interaction::{
    InteractionId, InteractionRecord, LearningAnnotation, ToneMarker, VerificationResult,
};
use courier_core::phone::normalize_digits;

use super::sql::{parse_enum, parse_timestamp};
use super::{InteractionRepository, RepositoryError};
use crate::DbPool;

pub struct SqlInteractionRepository {
    pool: DbPool,
}

impl SqlInteractionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl InteractionRepository for SqlInteractionRepository {
    async fn append(&self, record: InteractionRecord) -> Result<InteractionId, RepositoryError> {
        let id = InteractionId(Uuid::new_v4().to_string());
        let verification_json = record
            .verification
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|error| RepositoryError::Decode(error.to_string()))?;
        let response_time_ms = i64::try_from(record.response_time_ms).unwrap_or(i64::MAX);

        sqlx::query(
            "INSERT INTO assistant_interaction (
                id,
                customer_id,
                phone_digits,
                user_message,
                final_response,
                response_time_ms,
                was_fallback,
                response_type,
                verification_json,
                context_snapshot_json,
                created_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id.0)
        .bind(record.customer_id.as_ref().map(|customer_id| customer_id.0.as_str()))
        .bind(normalize_digits(&record.phone))
        .bind(&record.user_message)
        .bind(&record.final_response)
        .bind(response_time_ms)
        .bind(record.was_fallback)
        .bind(record.response_type.as_str())
        .bind(verification_json)
        .bind(record.context_snapshot.to_string())
        .bind(record.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(id)
    }

    async fn find_by_id(
        &self,
        id: &InteractionId,
    ) -> Result<Option<InteractionRecord>, RepositoryError> {
        let row = sqlx::query(
            "SELECT
                customer_id,
                phone_digits,
                user_message,
                final_response,
                response_time_ms,
                was_fallback,
                response_type,
                verification_json,
                context_snapshot_json,
                created_at
             FROM assistant_interaction
             WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(interaction_from_row).transpose()
    }

    async fn append_learning(
        &self,
        annotation: LearningAnnotation,
    ) -> Result<(), RepositoryError> {
        let markers = annotation.tone_markers.iter().map(ToneMarker::as_str).collect::<Vec<_>>();
        let tone_markers_json = serde_json::to_string(&markers)
            .map_err(|error| RepositoryError::Decode(error.to_string()))?;

        sqlx::query(
            "INSERT INTO customer_learning (
                id,
                customer_id,
                interaction_id,
                intent_tag,
                tone_markers_json,
                created_at
             ) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&annotation.customer_id.0)
        .bind(annotation.interaction_id.as_ref().map(|id| id.0.as_str()))
        .bind(annotation.intent_tag.as_str())
        .bind(tone_markers_json)
        .bind(annotation.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn recent_learning(
        &self,
        customer_id: &CustomerId,
        limit: usize,
    ) -> Result<Vec<LearningAnnotation>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT customer_id, interaction_id, intent_tag, tone_markers_json, created_at
             FROM customer_learning
             WHERE customer_id = ?
             ORDER BY created_at DESC, id DESC
             LIMIT ?",
        )
        .bind(&customer_id.0)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(learning_from_row).collect()
    }
}

fn interaction_from_row(row: SqliteRow) -> Result<InteractionRecord, RepositoryError> {
    let verification = row
        .try_get::<Option<String>, _>("verification_json")?
        .map(|raw| serde_json::from_str::<VerificationResult>(&raw))
        .transpose()
        .map_err(|error| RepositoryError::Decode(format!("invalid verification_json: {error}")))?;
    let snapshot_raw = row.try_get::<String, _>("context_snapshot_json")?;
    let context_snapshot = serde_json::from_str(&snapshot_raw)
        .map_err(|error| RepositoryError::Decode(format!("invalid context_snapshot_json: {error}")))?;
    let response_time_ms = u64::try_from(row.try_get::<i64, _>("response_time_ms")?)
        .map_err(|_| RepositoryError::Decode("negative response_time_ms".to_string()))?;

    Ok(InteractionRecord {
        customer_id: row.try_get::<Option<String>, _>("customer_id")?.map(CustomerId),
        phone: row.try_get("phone_digits")?,
        user_message: row.try_get("user_message")?,
        final_response: row.try_get("final_response")?,
        response_time_ms,
        was_fallback: row.try_get("was_fallback")?,
        response_type: parse_enum("response_type", row.try_get("response_type")?)?,
        verification,
        context_snapshot,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
    })
}

fn learning_from_row(row: SqliteRow) -> Result<LearningAnnotation, RepositoryError> {
    let markers_raw = row.try_get::<String, _>("tone_markers_json")?;
    let markers = serde_json::from_str::<Vec<String>>(&markers_raw)
        .map_err(|error| RepositoryError::Decode(format!("invalid tone_markers_json: {error}")))?;
    let tone_markers = markers
        .into_iter()
        .map(|marker| parse_enum::<ToneMarker>("tone_markers_json", marker))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(LearningAnnotation {
        customer_id: CustomerId(row.try_get("customer_id")?),
        interaction_id: row.try_get::<Option<String>, _>("interaction_id")?.map(InteractionId),
        intent_tag: parse_enum("intent_tag", row.try_get("intent_tag")?)?,
        tone_markers,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, Utc};
    use serde_json::json;

    use courier_core::domain::customer::CustomerId;
    use courier_core::domain::interaction::{
        InteractionRecord, LearningAnnotation, ResponseType, ToneMarker, VerificationResult,
    };

    use super::SqlInteractionRepository;
    use crate::repositories::sql::test_support::setup_pool;
    use crate::repositories::InteractionRepository;

    fn parse_ts(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value).expect("timestamp").with_timezone(&Utc)
    }

    #[tokio::test]
    async fn interactions_are_appended_with_generated_ids() {
        let pool = setup_pool().await;
        let repo = SqlInteractionRepository::new(pool.clone());
        let record = InteractionRecord {
            customer_id: Some(CustomerId("C-1".to_string())),
            phone: "573000000001".to_string(),
            user_message: "¿cuánto debo?".to_string(),
            final_response: "Tienes un saldo pendiente de US$ 15.00.".to_string(),
            response_time_ms: 840,
            was_fallback: false,
            response_type: ResponseType::Generative,
            verification: Some(VerificationResult {
                approved: true,
                confidence: 92,
                issues: Vec::new(),
                improved_text: None,
            }),
            context_snapshot: json!({"found": true, "stages": ["idle", "responded"]}),
            created_at: parse_ts("2026-10-19T12:00:00Z"),
        };

        let first = repo.append(record.clone()).await.expect("append first");
        let second = repo.append(record.clone()).await.expect("append second");
        let found = repo.find_by_id(&first).await.expect("find interaction");

        assert_ne!(first, second);
        assert_eq!(found, Some(record));
        pool.close().await;
    }

    #[tokio::test]
    async fn learning_is_read_back_newest_first_for_one_customer() {
        let pool = setup_pool().await;
        let repo = SqlInteractionRepository::new(pool.clone());
        let start = parse_ts("2026-10-19T12:00:00Z");

        for (offset, tag) in
            [ResponseType::Generative, ResponseType::SpecificPackageInquiry].into_iter().enumerate()
        {
            repo.append_learning(LearningAnnotation {
                customer_id: CustomerId("C-1".to_string()),
                interaction_id: None,
                intent_tag: tag,
                tone_markers: vec![ToneMarker::Greeting, ToneMarker::Emoji],
                created_at: start + Duration::minutes(offset as i64),
            })
            .await
            .expect("append learning");
        }
        repo.append_learning(LearningAnnotation {
            customer_id: CustomerId("C-2".to_string()),
            interaction_id: None,
            intent_tag: ResponseType::Generative,
            tone_markers: vec![ToneMarker::Formal],
            created_at: start,
        })
        .await
        .expect("append other customer");

        let learned =
            repo.recent_learning(&CustomerId("C-1".to_string()), 10).await.expect("recent");

        assert_eq!(learned.len(), 2);
        assert_eq!(learned[0].intent_tag, ResponseType::SpecificPackageInquiry);
        assert_eq!(learned[0].tone_markers, vec![ToneMarker::Greeting, ToneMarker::Emoji]);
        pool.close().await;
    }
}
