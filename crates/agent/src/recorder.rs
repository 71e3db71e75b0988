use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use courier_core::domain::customer::CustomerId;
use courier_core::domain::interaction::{InteractionId, InteractionRecord, LearningAnnotation};
use courier_core::phone::normalize_digits;
use courier_db::repositories::{InteractionRepository, MessageDirection, MessageLogRepository};

use crate::conversation::tone_markers;

/// Best-effort persistence of each answered message. No write failure ever
/// reaches the caller.
pub struct InteractionRecorder {
    interactions: Arc<dyn InteractionRepository>,
    messages: Arc<dyn MessageLogRepository>,
}

impl InteractionRecorder {
    pub fn new(
        interactions: Arc<dyn InteractionRepository>,
        messages: Arc<dyn MessageLogRepository>,
    ) -> Self {
        Self { interactions, messages }
    }

    /// Appends the interaction, its learning note and both message-log
    /// entries. Returns the interaction id when the interaction row was
    /// written.
    pub async fn record(
        &self,
        record: InteractionRecord,
        received_at: DateTime<Utc>,
        correlation_id: &str,
    ) -> Option<InteractionId> {
        let phone_digits = normalize_digits(&record.phone);
        self.log_message(
            MessageDirection::Inbound,
            &phone_digits,
            &record.user_message,
            received_at,
            correlation_id,
        )
        .await;
        self.log_message(
            MessageDirection::Outbound,
            &phone_digits,
            &record.final_response,
            record.created_at,
            correlation_id,
        )
        .await;

        let customer_id = record.customer_id.clone();
        let intent_tag = record.response_type;
        let markers = tone_markers(&record.final_response);
        let created_at = record.created_at;

        let interaction_id = match self.interactions.append(record).await {
            Ok(id) => id,
            Err(error) => {
                write_failed("interaction", correlation_id, &error);
                return None;
            }
        };
        info!(
            event_name = "assistant.recorder.recorded",
            correlation_id,
            interaction_id = %interaction_id,
            response_type = intent_tag.as_str(),
            "interaction recorded"
        );

        if let Some(customer_id) = customer_id {
            let annotation = LearningAnnotation {
                customer_id,
                interaction_id: Some(interaction_id.clone()),
                intent_tag,
                tone_markers: markers,
                created_at,
            };
            if let Err(error) = self.interactions.append_learning(annotation).await {
                write_failed("learning", correlation_id, &error);
            }
        }

        Some(interaction_id)
    }

    /// Recent style notes for one customer, newest first. Empty on error.
    pub async fn learned_style(
        &self,
        customer_id: &CustomerId,
        limit: usize,
        correlation_id: &str,
    ) -> Vec<LearningAnnotation> {
        if limit == 0 {
            return Vec::new();
        }
        match self.interactions.recent_learning(customer_id, limit).await {
            Ok(annotations) => annotations,
            Err(error) => {
                warn!(
                    event_name = "assistant.recorder.read_failed",
                    correlation_id,
                    error = %error,
                    "could not read learning notes"
                );
                Vec::new()
            }
        }
    }

    async fn log_message(
        &self,
        direction: MessageDirection,
        phone_digits: &str,
        body: &str,
        at: DateTime<Utc>,
        correlation_id: &str,
    ) {
        if phone_digits.is_empty() {
            return;
        }
        if let Err(error) = self.messages.append(direction, phone_digits, body, at).await {
            let target = match direction {
                MessageDirection::Inbound => "inbound_message",
                MessageDirection::Outbound => "outbound_message",
            };
            write_failed(target, correlation_id, &error);
        }
    }
}

fn write_failed(target: &str, correlation_id: &str, error: &dyn std::error::Error) {
    warn!(
        event_name = "assistant.recorder.write_failed",
        correlation_id,
        target,
        error = %error,
        "best-effort write failed"
    );
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    use courier_core::domain::customer::CustomerId;
    use courier_core::domain::interaction::{
        InteractionId, InteractionRecord, LearningAnnotation, ResponseType, ToneMarker,
    };
    use courier_db::repositories::{
        InMemoryInteractionRepository, InMemoryMessageLogRepository, InteractionRepository,
        MessageDirection, MessageLogRepository,
    };
    use courier_db::RepositoryError;

    use super::InteractionRecorder;

    struct BrokenInteractions;

    #[async_trait]
    impl InteractionRepository for BrokenInteractions {
        async fn append(&self, _record: InteractionRecord) -> Result<InteractionId, RepositoryError> {
            Err(RepositoryError::Decode("disk full".to_string()))
        }

        async fn find_by_id(
            &self,
            _id: &InteractionId,
        ) -> Result<Option<InteractionRecord>, RepositoryError> {
            Err(RepositoryError::Decode("disk full".to_string()))
        }

        async fn append_learning(
            &self,
            _annotation: LearningAnnotation,
        ) -> Result<(), RepositoryError> {
            Err(RepositoryError::Decode("disk full".to_string()))
        }

        async fn recent_learning(
            &self,
            _customer_id: &CustomerId,
            _limit: usize,
        ) -> Result<Vec<LearningAnnotation>, RepositoryError> {
            Err(RepositoryError::Decode("disk full".to_string()))
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 15, 0, 0).single().expect("timestamp")
    }

    fn record(customer_id: Option<&str>) -> InteractionRecord {
        InteractionRecord {
            customer_id: customer_id.map(|id| CustomerId(id.to_string())),
            phone: "+57 300 000 0001".to_string(),
            user_message: "hola".to_string(),
            final_response: "¡Hola, Ana! Gracias por escribirnos.".to_string(),
            response_time_ms: 840,
            was_fallback: false,
            response_type: ResponseType::Generative,
            verification: None,
            context_snapshot: serde_json::json!({}),
            created_at: now(),
        }
    }

    #[tokio::test]
    async fn record_writes_interaction_learning_and_both_message_logs() {
        let interactions = Arc::new(InMemoryInteractionRepository::default());
        let messages = Arc::new(InMemoryMessageLogRepository::default());
        let recorder = InteractionRecorder::new(interactions.clone(), messages.clone());

        let id = recorder
            .record(record(Some("cust-demo-001")), now() - Duration::seconds(1), "test")
            .await
            .expect("interaction id");

        let stored = interactions.find_by_id(&id).await.expect("read").expect("stored");
        assert_eq!(stored.user_message, "hola");

        let learned = recorder
            .learned_style(&CustomerId("cust-demo-001".to_string()), 5, "test")
            .await;
        assert_eq!(learned.len(), 1);
        assert_eq!(learned[0].interaction_id.as_ref(), Some(&id));
        assert_eq!(learned[0].tone_markers, vec![ToneMarker::Greeting, ToneMarker::Gratitude]);

        let inbound =
            messages.recent(MessageDirection::Inbound, "573000000001", 10).await.expect("inbound");
        let outbound =
            messages.recent(MessageDirection::Outbound, "573000000001", 10).await.expect("outbound");
        assert_eq!(inbound.len(), 1);
        assert_eq!(outbound.len(), 1);
        assert!(inbound[0].timestamp < outbound[0].timestamp);
    }

    #[tokio::test]
    async fn unidentified_customer_gets_no_learning_note() {
        let interactions = Arc::new(InMemoryInteractionRepository::default());
        let recorder = InteractionRecorder::new(
            interactions.clone(),
            Arc::new(InMemoryMessageLogRepository::default()),
        );

        recorder.record(record(None), now(), "test").await.expect("interaction id");

        assert_eq!(interactions.interactions().await.len(), 1);
        assert!(recorder
            .learned_style(&CustomerId("cust-demo-001".to_string()), 5, "test")
            .await
            .is_empty());
    }

    #[tokio::test]
    async fn write_failures_are_swallowed() {
        let messages = Arc::new(InMemoryMessageLogRepository::default());
        let recorder = InteractionRecorder::new(Arc::new(BrokenInteractions), messages.clone());

        let id = recorder.record(record(Some("cust-demo-001")), now(), "test").await;

        assert_eq!(id, None);
        assert!(recorder
            .learned_style(&CustomerId("cust-demo-001".to_string()), 5, "test")
            .await
            .is_empty());
        let outbound =
            messages.recent(MessageDirection::Outbound, "573000000001", 10).await.expect("outbound");
        assert_eq!(outbound.len(), 1);
    }
}
