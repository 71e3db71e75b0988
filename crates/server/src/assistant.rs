//! `POST /api/v1/assistant/respond`
//!
//! Every response body carries text the delivery channel can relay to the
//! customer, including bad requests and crashes inside the pipeline.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use courier_agent::emergency::EmergencyResponder;
use courier_agent::{AssistantRequest, AssistantResponse, AssistantRuntime};
use courier_core::errors::{ApplicationError, InterfaceError};
use serde::Serialize;
use tracing::error;
use uuid::Uuid;

#[derive(Clone)]
pub struct AssistantState {
    runtime: Arc<AssistantRuntime>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantFailure {
    pub error: String,
    pub response: String,
    pub is_from_fallback: bool,
    pub was_escalated: bool,
    pub correlation_id: String,
}

impl AssistantFailure {
    fn from_interface(error: &InterfaceError) -> Self {
        Self {
            error: error.user_message().to_string(),
            response: EmergencyResponder.respond_without_context(),
            is_from_fallback: true,
            was_escalated: false,
            correlation_id: error.correlation_id().to_string(),
        }
    }
}

type Failure = (StatusCode, Json<AssistantFailure>);

pub fn router(runtime: Arc<AssistantRuntime>) -> Router {
    Router::new()
        .route("/api/v1/assistant/respond", post(respond))
        .with_state(AssistantState { runtime })
}

pub async fn respond(
    State(state): State<AssistantState>,
    body: Result<Json<AssistantRequest>, JsonRejection>,
) -> Result<Json<AssistantResponse>, Failure> {
    let correlation_id = Uuid::new_v4().to_string();

    let Json(request) = body.map_err(|rejection| {
        failure(ApplicationError::InvalidRequest(rejection.body_text()), &correlation_id)
    })?;
    if request.message.trim().is_empty() || request.customer_phone.trim().is_empty() {
        return Err(failure(
            ApplicationError::InvalidRequest(
                "message and customerPhone are required".to_string(),
            ),
            &correlation_id,
        ));
    }

    // The pipeline runs in its own task so a panic inside it still ends in
    // a reply.
    let runtime = state.runtime.clone();
    match tokio::spawn(async move { runtime.respond(request).await }).await {
        Ok(response) => Ok(Json(response)),
        Err(join_error) => {
            error!(
                event_name = "assistant.request.crashed",
                correlation_id = %correlation_id,
                error = %join_error,
                "assistant pipeline terminated unexpectedly"
            );
            Err(failure(ApplicationError::PipelineAborted(join_error.to_string()), &correlation_id))
        }
    }
}

fn failure(error: ApplicationError, correlation_id: &str) -> Failure {
    let error = error.into_interface(correlation_id);
    let status = match &error {
        InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(AssistantFailure::from_interface(&error)))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use courier_agent::llm::ScriptedLlmClient;
    use courier_agent::{AssistantRuntime, AssistantSettings, AssistantStores};
    use courier_core::domain::customer::{Customer, CustomerId};
    use courier_db::repositories::{
        CustomerRepository, InMemoryCustomerRepository, InMemoryDestinationAddressRepository,
        InMemoryFreightRateRepository, InMemoryInteractionRepository,
        InMemoryMessageLogRepository, InMemoryPackageRepository, InMemoryTripRepository,
    };
    use courier_db::RepositoryError;
    use serde_json::Value;
    use tower::ServiceExt;

    use super::router;

    struct PanickingCustomers;

    #[async_trait]
    impl CustomerRepository for PanickingCustomers {
        async fn find_by_id(&self, _id: &CustomerId) -> Result<Option<Customer>, RepositoryError> {
            panic!("customer store exploded")
        }

        async fn find_by_phone_tail(&self, _tail: &str) -> Result<Vec<Customer>, RepositoryError> {
            panic!("customer store exploded")
        }

        async fn save(&self, _customer: Customer) -> Result<(), RepositoryError> {
            Ok(())
        }
    }

    fn runtime(customers: Arc<dyn CustomerRepository>) -> Arc<AssistantRuntime> {
        let stores = AssistantStores {
            customers,
            packages: Arc::new(InMemoryPackageRepository::default()),
            trips: Arc::new(InMemoryTripRepository::default()),
            freight_rates: Arc::new(InMemoryFreightRateRepository::default()),
            addresses: Arc::new(InMemoryDestinationAddressRepository::default()),
            messages: Arc::new(InMemoryMessageLogRepository::default()),
            interactions: Arc::new(InMemoryInteractionRepository::default()),
        };
        Arc::new(AssistantRuntime::new(
            stores,
            Arc::new(ScriptedLlmClient::default()),
            Arc::new(ScriptedLlmClient::default()),
            AssistantSettings::default(),
        ))
    }

    async fn post(runtime: Arc<AssistantRuntime>, body: &str) -> (StatusCode, Value) {
        let response = router(runtime)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/assistant/respond")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .expect("request"),
            )
            .await
            .expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), 1_000_000).await.expect("body");
        (status, serde_json::from_slice(&bytes).expect("json body"))
    }

    #[tokio::test]
    async fn trip_question_gets_a_clarifying_reply() {
        let (status, body) = post(
            runtime(Arc::new(InMemoryCustomerRepository::default())),
            r#"{"message": "¿cuándo viajan?", "customerPhone": "+573000000009"}"#,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let text = body["response"].as_str().expect("response text");
        assert!(text.contains("Barranquilla") && text.contains("Curazao"));
        assert_eq!(body["isFromFallback"], Value::Bool(false));
        assert_eq!(body["wasEscalated"], Value::Bool(false));
        assert_eq!(body["customerInfo"]["found"], Value::Bool(false));
        assert!(body["interactionId"].is_string());
        assert!(body.get("tripsInfo").is_none());
    }

    #[tokio::test]
    async fn missing_fields_are_rejected_with_relayable_text() {
        let (status, body) = post(
            runtime(Arc::new(InMemoryCustomerRepository::default())),
            r#"{"message": "  ", "customerPhone": "+573000000009"}"#,
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["isFromFallback"], Value::Bool(true));
        assert!(body["response"].as_str().is_some_and(|text| !text.is_empty()));
    }

    #[tokio::test]
    async fn malformed_json_is_rejected_with_relayable_text() {
        let (status, body) =
            post(runtime(Arc::new(InMemoryCustomerRepository::default())), "{not json").await;

        assert!(status.is_client_error());
        assert_eq!(body["wasEscalated"], Value::Bool(false));
        assert!(body["response"].is_string());
    }

    #[tokio::test]
    async fn crash_inside_the_pipeline_still_returns_emergency_text() {
        let (status, body) = post(
            runtime(Arc::new(PanickingCustomers)),
            r#"{"message": "hola", "customerPhone": "+573000000001"}"#,
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "An unexpected internal error occurred.");
        assert_eq!(body["isFromFallback"], Value::Bool(true));
        assert_eq!(body["wasEscalated"], Value::Bool(false));
        assert!(body["response"].as_str().is_some_and(|text| text.contains("asesor")));
    }
}
