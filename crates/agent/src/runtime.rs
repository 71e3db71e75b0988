//! The response pipeline for one inbound WhatsApp message.
//!
//! Every path ends in exactly one reply text. Identity failures fall back
//! to the unidentified-customer path, provider failures to empty reference
//! data, generation failures and timeouts to the emergency templates, and
//! recording failures are logged and ignored.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use courier_core::config::{AppConfig, AssistantConfig};
use courier_core::domain::context::CustomerContext;
use courier_core::domain::customer::{Customer, CustomerId};
use courier_core::domain::interaction::{InteractionRecord, ResponseType, VerificationResult};
use courier_core::money::Currency;
use courier_core::phone::mask;
use courier_db::repositories::{
    CustomerRepository, DestinationAddressRepository, FreightRateRepository,
    InteractionRepository, MessageLogRepository, PackageRepository, SqlCustomerRepository,
    SqlDestinationAddressRepository, SqlFreightRateRepository, SqlInteractionRepository,
    SqlMessageLogRepository, SqlPackageRepository, SqlTripRepository, TripRepository,
};
use courier_db::DbPool;

use crate::context::CustomerContextAggregator;
use crate::conversation::MessageAnalyzer;
use crate::emergency::EmergencyResponder;
use crate::generative::{GenerativeFallback, PromptBuilder, PromptInput};
use crate::identity::IdentityResolver;
use crate::intents::{GenerationHint, IntentChain, IntentInput, TripsInfo};
use crate::llm::{LlmClient, LlmError, OpenAiClient, RetryPolicy, RetryingLlmClient};
use crate::recorder::InteractionRecorder;
use crate::reference::ReferenceDataProviders;
use crate::verifier::{ResponseVerifier, FAIL_OPEN_CONFIDENCE};

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantRequest {
    pub message: String,
    pub customer_phone: String,
    #[serde(default)]
    pub customer_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerInfo {
    pub found: bool,
    pub name: Option<String>,
    pub pending_amount: BTreeMap<Currency, Decimal>,
    pub pending_packages: usize,
    pub transit_packages: usize,
}

impl CustomerInfo {
    fn from_context(context: &CustomerContext) -> Self {
        Self {
            found: context.found,
            name: context.first_name.clone(),
            pending_amount: context
                .pending_by_currency
                .iter()
                .filter(|(_, amount)| **amount > Decimal::ZERO)
                .map(|(currency, amount)| (*currency, *amount))
                .collect(),
            pending_packages: context.pending_delivery.len(),
            transit_packages: context.moving_packages().count(),
        }
    }
}

/// Pipeline states, in the order a request passes through them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Idle,
    IdentityResolved,
    ContextBuilt,
    IntentChainEvaluated,
    HandlerMatched,
    GenerativeNeeded,
    Verified,
    VerificationSkipped,
    Recorded,
    Responded,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantResponse {
    pub response: String,
    pub has_package_info: bool,
    pub is_from_fallback: bool,
    pub customer_info: CustomerInfo,
    pub interaction_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trips_info: Option<TripsInfo>,
    /// Hand-offs always go through an explicit template, so this stays false.
    pub was_escalated: bool,
    #[serde(skip)]
    pub response_type: ResponseType,
    #[serde(skip)]
    pub verification: Option<VerificationResult>,
    #[serde(skip)]
    pub stages: Vec<PipelineStage>,
}

/// Stores the pipeline reads from and appends to.
#[derive(Clone)]
pub struct AssistantStores {
    pub customers: Arc<dyn CustomerRepository>,
    pub packages: Arc<dyn PackageRepository>,
    pub trips: Arc<dyn TripRepository>,
    pub freight_rates: Arc<dyn FreightRateRepository>,
    pub addresses: Arc<dyn DestinationAddressRepository>,
    pub messages: Arc<dyn MessageLogRepository>,
    pub interactions: Arc<dyn InteractionRepository>,
}

impl AssistantStores {
    pub fn from_pool(pool: DbPool) -> Self {
        Self {
            customers: Arc::new(SqlCustomerRepository::new(pool.clone())),
            packages: Arc::new(SqlPackageRepository::new(pool.clone())),
            trips: Arc::new(SqlTripRepository::new(pool.clone())),
            freight_rates: Arc::new(SqlFreightRateRepository::new(pool.clone())),
            addresses: Arc::new(SqlDestinationAddressRepository::new(pool.clone())),
            messages: Arc::new(SqlMessageLogRepository::new(pool.clone())),
            interactions: Arc::new(SqlInteractionRepository::new(pool)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssistantSettings {
    /// Ceiling for generation and verification together.
    pub response_budget: Duration,
    pub trip_window_days: u32,
    pub history_limit: usize,
    pub prompt_history_turns: usize,
    pub verification_enabled: bool,
    pub learning_lookback: usize,
}

impl Default for AssistantSettings {
    fn default() -> Self {
        Self {
            response_budget: Duration::from_secs(20),
            trip_window_days: 30,
            history_limit: 20,
            prompt_history_turns: 5,
            verification_enabled: true,
            learning_lookback: 10,
        }
    }
}

impl From<&AssistantConfig> for AssistantSettings {
    fn from(config: &AssistantConfig) -> Self {
        Self {
            response_budget: Duration::from_secs(config.response_budget_secs),
            trip_window_days: config.trip_window_days,
            history_limit: config.history_limit,
            prompt_history_turns: config.prompt_history_turns,
            verification_enabled: config.verification_enabled,
            learning_lookback: config.learning_lookback,
        }
    }
}

struct Composed {
    text: String,
    response_type: ResponseType,
    trips: Option<TripsInfo>,
    was_fallback: bool,
    verification: Option<VerificationResult>,
}

pub struct AssistantRuntime {
    identity: IdentityResolver,
    aggregator: CustomerContextAggregator,
    reference: ReferenceDataProviders,
    analyzer: MessageAnalyzer,
    chain: IntentChain,
    generator: GenerativeFallback,
    verifier: ResponseVerifier,
    emergency: EmergencyResponder,
    recorder: InteractionRecorder,
    settings: AssistantSettings,
}

impl AssistantRuntime {
    pub fn new(
        stores: AssistantStores,
        generation_client: Arc<dyn LlmClient>,
        verification_client: Arc<dyn LlmClient>,
        settings: AssistantSettings,
    ) -> Self {
        Self {
            identity: IdentityResolver::new(stores.customers),
            aggregator: CustomerContextAggregator::new(stores.packages),
            reference: ReferenceDataProviders::new(
                stores.freight_rates,
                stores.trips,
                stores.addresses,
                stores.messages.clone(),
                settings.trip_window_days,
                settings.history_limit,
            ),
            analyzer: MessageAnalyzer::new(),
            chain: IntentChain::standard(),
            generator: GenerativeFallback::new(
                generation_client,
                PromptBuilder::new(settings.prompt_history_turns),
            ),
            verifier: ResponseVerifier::new(verification_client),
            emergency: EmergencyResponder,
            recorder: InteractionRecorder::new(stores.interactions, stores.messages),
            settings,
        }
    }

    /// Production wiring: SQL stores and OpenAI-compatible clients with the
    /// configured retry policy.
    pub fn from_config(config: &AppConfig, pool: DbPool) -> Result<Self, LlmError> {
        let policy = RetryPolicy::from_config(&config.llm);
        let generation = RetryingLlmClient::new(
            OpenAiClient::new(&config.llm, &config.llm.model)?,
            policy.clone(),
            "generation",
        );
        let verification = RetryingLlmClient::new(
            OpenAiClient::new(&config.llm, config.llm.verifier_model())?,
            policy,
            "verification",
        );

        Ok(Self::new(
            AssistantStores::from_pool(pool),
            Arc::new(generation),
            Arc::new(verification),
            AssistantSettings::from(&config.assistant),
        ))
    }

    pub fn handler_names(&self) -> Vec<&'static str> {
        self.chain.handler_names()
    }

    pub async fn respond(&self, request: AssistantRequest) -> AssistantResponse {
        self.respond_at(request, Utc::now()).await
    }

    /// Runs the pipeline as if the message arrived at `received_at`.
    pub async fn respond_at(
        &self,
        request: AssistantRequest,
        received_at: DateTime<Utc>,
    ) -> AssistantResponse {
        let started = Instant::now();
        let correlation_id = Uuid::new_v4().to_string();
        let correlation_id = correlation_id.as_str();
        let mut stages = vec![PipelineStage::Idle];

        info!(
            event_name = "assistant.request.received",
            correlation_id,
            phone = %mask(&request.customer_phone),
            has_customer_id = request.customer_id.is_some(),
            message_chars = request.message.chars().count(),
            "assistant request received"
        );

        let known_customer_id = request
            .customer_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(|id| CustomerId(id.to_string()));
        let identity = self
            .identity
            .resolve(&request.customer_phone, known_customer_id.as_ref(), correlation_id)
            .await;
        stages.push(PipelineStage::IdentityResolved);

        let context = match &identity.customer {
            Some(customer) => self.build_context(customer, correlation_id).await,
            None => CustomerContext::unidentified(),
        };
        stages.push(PipelineStage::ContextBuilt);

        let reference = self.reference.load(received_at, correlation_id).await;
        let history = self.reference.history(&request.customer_phone, correlation_id).await;
        let analysis = self.analyzer.analyze(&request.message);

        let evaluation = self.chain.evaluate(&IntentInput {
            message: &request.message,
            analysis: &analysis,
            context: &context,
            reference: &reference,
            history: &history,
        });
        stages.push(PipelineStage::IntentChainEvaluated);

        let composed = match evaluation.reply {
            Some(reply) => {
                stages.push(PipelineStage::HandlerMatched);
                stages.push(PipelineStage::VerificationSkipped);
                info!(
                    event_name = "assistant.intent.matched",
                    correlation_id,
                    response_type = reply.response_type.as_str(),
                    "deterministic handler answered"
                );
                Composed {
                    text: reply.text,
                    response_type: reply.response_type,
                    trips: reply.trips,
                    was_fallback: false,
                    verification: None,
                }
            }
            None => {
                stages.push(PipelineStage::GenerativeNeeded);
                let learned_style = match &context.customer_id {
                    Some(customer_id) => {
                        self.recorder
                            .learned_style(
                                customer_id,
                                self.settings.learning_lookback,
                                correlation_id,
                            )
                            .await
                    }
                    None => Vec::new(),
                };
                let input = PromptInput {
                    message: &request.message,
                    analysis: &analysis,
                    context: &context,
                    reference: &reference,
                    history: &history,
                    hints: &evaluation.hints,
                    learned_style: &learned_style,
                };
                self.compose_generated(&input, &mut stages, correlation_id).await
            }
        };

        let elapsed = started.elapsed();
        let response_time_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        let responded_at = received_at
            + chrono::Duration::milliseconds(i64::try_from(response_time_ms.max(1)).unwrap_or(1));

        let context_snapshot = serde_json::json!({
            "correlationId": correlation_id,
            "identity": identity.outcome.as_str(),
            "context": context.snapshot(),
            "handlersEvaluated": evaluation.evaluated,
            "stages": stages,
        });
        let record = InteractionRecord {
            customer_id: context.customer_id.clone(),
            phone: request.customer_phone.clone(),
            user_message: request.message.clone(),
            final_response: composed.text.clone(),
            response_time_ms,
            was_fallback: composed.was_fallback,
            response_type: composed.response_type,
            verification: composed.verification.clone(),
            context_snapshot,
            created_at: responded_at,
        };
        let interaction_id = self.recorder.record(record, received_at, correlation_id).await;
        stages.push(PipelineStage::Recorded);
        stages.push(PipelineStage::Responded);

        info!(
            event_name = "assistant.request.responded",
            correlation_id,
            response_type = composed.response_type.as_str(),
            was_fallback = composed.was_fallback,
            found = context.found,
            recorded = interaction_id.is_some(),
            response_time_ms,
            "assistant reply ready"
        );

        AssistantResponse {
            has_package_info: context.found
                && !context.facts_unavailable
                && context.package_count > 0,
            is_from_fallback: composed.was_fallback,
            customer_info: CustomerInfo::from_context(&context),
            interaction_id: interaction_id.map(|id| id.0),
            trips_info: composed.trips,
            was_escalated: false,
            response: composed.text,
            response_type: composed.response_type,
            verification: composed.verification,
            stages,
        }
    }

    /// A verified customer whose packages cannot be read keeps their
    /// identity but carries no package facts.
    async fn build_context(&self, customer: &Customer, correlation_id: &str) -> CustomerContext {
        match self.aggregator.build(customer, correlation_id).await {
            Ok(context) => context,
            Err(error) => {
                warn!(
                    event_name = "assistant.context.unavailable",
                    correlation_id,
                    error = %error,
                    "could not load the customer's packages"
                );
                CustomerContext {
                    found: true,
                    customer_id: Some(customer.id.clone()),
                    first_name: Some(customer.first_name.trim().to_string())
                        .filter(|name| !name.is_empty()),
                    facts_unavailable: true,
                    ..CustomerContext::unidentified()
                }
            }
        }
    }

    async fn compose_generated(
        &self,
        input: &PromptInput<'_>,
        stages: &mut Vec<PipelineStage>,
        correlation_id: &str,
    ) -> Composed {
        let deadline = tokio::time::Instant::now() + self.settings.response_budget;

        let generated =
            tokio::time::timeout_at(deadline, self.generator.generate(input, correlation_id)).await;
        let candidate = match generated {
            Ok(Ok(text)) => text,
            Ok(Err(error)) => {
                return self.emergency_reply(input.context, stages, correlation_id, error.to_string())
            }
            Err(_) => {
                return self.emergency_reply(
                    input.context,
                    stages,
                    correlation_id,
                    "response budget exhausted during generation".to_string(),
                )
            }
        };

        let trips = input.hints.iter().find_map(|hint| match hint {
            GenerationHint::TripContext(destination) => {
                Some(TripsInfo::for_destination(input.reference, *destination))
            }
        });

        if !self.settings.verification_enabled {
            stages.push(PipelineStage::VerificationSkipped);
            return Composed {
                text: candidate,
                response_type: ResponseType::Generative,
                trips,
                was_fallback: false,
                verification: None,
            };
        }

        let verification = match tokio::time::timeout_at(
            deadline,
            self.verifier.verify(&candidate, input.message, input.context, correlation_id),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    event_name = "assistant.verification.failed_open",
                    correlation_id,
                    "response budget exhausted during verification, approving the generated reply"
                );
                VerificationResult {
                    approved: true,
                    confidence: FAIL_OPEN_CONFIDENCE,
                    issues: vec!["verification unavailable: response budget exhausted".to_string()],
                    improved_text: None,
                }
            }
        };
        stages.push(PipelineStage::Verified);

        let text = match (verification.approved, &verification.improved_text) {
            (false, Some(improved)) => improved.clone(),
            _ => candidate,
        };
        Composed {
            text,
            response_type: ResponseType::Generative,
            trips,
            was_fallback: false,
            verification: Some(verification),
        }
    }

    fn emergency_reply(
        &self,
        context: &CustomerContext,
        stages: &mut Vec<PipelineStage>,
        correlation_id: &str,
        reason: String,
    ) -> Composed {
        warn!(
            event_name = "assistant.generation.failed",
            correlation_id,
            error = %reason,
            "generation failed, answering with an emergency template"
        );
        stages.push(PipelineStage::VerificationSkipped);
        Composed {
            text: self.emergency.respond(context),
            response_type: ResponseType::Emergency,
            trips: None,
            was_fallback: true,
            verification: None,
        }
    }
}
