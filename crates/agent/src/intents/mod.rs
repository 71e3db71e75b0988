//! Deterministic handlers for the questions customers ask most.
//!
//! Handlers run in a fixed priority order and the first one that answers
//! wins, so a message never gets two replies. A handler that recognises
//! its question but needs free-form composition defers to the generative
//! stage, optionally leaving a hint about which facts the prompt needs.

use chrono::NaiveDate;
use serde::Serialize;

use courier_core::destination::Destination;
use courier_core::domain::context::CustomerContext;
use courier_core::domain::conversation::ConversationHistory;
use courier_core::domain::interaction::ResponseType;

use crate::conversation::MessageAnalysis;
use crate::reference::ReferenceData;

pub mod follow_up;
pub mod home_delivery;
pub mod package_inquiry;
pub mod shipping;
pub mod trip_schedule;

pub use follow_up::ContextualFollowUp;
pub use home_delivery::HomeDeliveryRequest;
pub use package_inquiry::SpecificPackageInquiry;
pub use shipping::{MultiQuestionShippingInquiry, SingleShippingQuestion};
pub use trip_schedule::TripScheduleInquiry;

pub const TRIP_DESTINATION_QUESTION: &str =
    "¿Para qué destino quieres consultar los próximos viajes? Viajamos a Barranquilla y a Curazao.";
pub const SHIPPING_DESTINATION_QUESTION: &str =
    "¿Hacia qué destino quieres enviar tu paquete? Viajamos a Barranquilla y a Curazao.";

/// Everything a handler may look at. Handlers never perform I/O.
#[derive(Clone, Copy, Debug)]
pub struct IntentInput<'a> {
    pub message: &'a str,
    pub analysis: &'a MessageAnalysis,
    pub context: &'a CustomerContext,
    pub reference: &'a ReferenceData,
    pub history: &'a ConversationHistory,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TripsInfo {
    pub destination: Destination,
    pub trips_found: usize,
    pub next_trip_date: Option<NaiveDate>,
}

impl TripsInfo {
    pub fn for_destination(reference: &ReferenceData, destination: Destination) -> Self {
        Self {
            destination,
            trips_found: reference.trips_to(destination).count(),
            next_trip_date: reference
                .next_bookable_trip(destination)
                .map(|trip| trip.departure_date),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IntentReply {
    pub text: String,
    pub response_type: ResponseType,
    pub trips: Option<TripsInfo>,
}

impl IntentReply {
    pub fn new(response_type: ResponseType, text: impl Into<String>) -> Self {
        Self { text: text.into(), response_type, trips: None }
    }

    pub fn with_trips(mut self, trips: TripsInfo) -> Self {
        self.trips = Some(trips);
        self
    }
}

/// Facts a deferring handler wants in the generative prompt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GenerationHint {
    TripContext(Destination),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IntentOutcome {
    Matched(IntentReply),
    Declined,
    Defer(GenerationHint),
}

pub trait IntentHandler: Send + Sync {
    fn name(&self) -> &'static str;

    fn handle(&self, input: &IntentInput<'_>) -> IntentOutcome;
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChainEvaluation {
    pub reply: Option<IntentReply>,
    pub hints: Vec<GenerationHint>,
    /// Handler names in the order they were asked.
    pub evaluated: Vec<&'static str>,
}

pub struct IntentChain {
    handlers: Vec<Box<dyn IntentHandler>>,
}

impl Default for IntentChain {
    fn default() -> Self {
        Self::standard()
    }
}

impl IntentChain {
    pub fn new(handlers: Vec<Box<dyn IntentHandler>>) -> Self {
        Self { handlers }
    }

    /// The production order, highest priority first.
    pub fn standard() -> Self {
        Self::new(vec![
            Box::new(ContextualFollowUp),
            Box::new(TripScheduleInquiry),
            Box::new(SpecificPackageInquiry),
            Box::new(MultiQuestionShippingInquiry),
            Box::new(SingleShippingQuestion),
            Box::new(HomeDeliveryRequest),
        ])
    }

    pub fn handler_names(&self) -> Vec<&'static str> {
        self.handlers.iter().map(|handler| handler.name()).collect()
    }

    pub fn evaluate(&self, input: &IntentInput<'_>) -> ChainEvaluation {
        let mut evaluation = ChainEvaluation::default();
        for handler in &self.handlers {
            evaluation.evaluated.push(handler.name());
            match handler.handle(input) {
                IntentOutcome::Matched(reply) => {
                    evaluation.reply = Some(reply);
                    break;
                }
                IntentOutcome::Defer(hint) => {
                    if !evaluation.hints.contains(&hint) {
                        evaluation.hints.push(hint);
                    }
                }
                IntentOutcome::Declined => {}
            }
        }
        evaluation
    }
}

/// Opening words for a deterministic reply.
pub(crate) fn salutation(context: &CustomerContext) -> String {
    match context.first_name.as_deref() {
        Some(name) if context.found => format!("¡Hola, {name}! "),
        _ => "¡Hola! ".to_string(),
    }
}


#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};

    use courier_core::domain::context::CustomerContext;
    use courier_core::domain::conversation::{ConversationHistory, ConversationTurn, Speaker};
    use courier_core::domain::interaction::ResponseType;

    use super::test_support::reference;
    use super::{
        ContextualFollowUp, IntentChain, IntentHandler, IntentInput, IntentOutcome,
        MultiQuestionShippingInquiry, TRIP_DESTINATION_QUESTION,
    };
    use crate::conversation::MessageAnalyzer;

    struct Counting<H> {
        inner: H,
        calls: Arc<AtomicUsize>,
    }

    impl<H: IntentHandler> IntentHandler for Counting<H> {
        fn name(&self) -> &'static str {
            self.inner.name()
        }

        fn handle(&self, input: &IntentInput<'_>) -> IntentOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.handle(input)
        }
    }

    #[test]
    fn standard_chain_order_is_fixed() {
        assert_eq!(
            IntentChain::standard().handler_names(),
            vec![
                "contextual_follow_up",
                "trip_schedule_inquiry",
                "specific_package_inquiry",
                "multi_question_shipping_inquiry",
                "single_shipping_question",
                "home_delivery_request",
            ]
        );
    }

    #[test]
    fn earlier_handler_wins_and_later_one_is_never_asked() {
        let follow_up_calls = Arc::new(AtomicUsize::new(0));
        let multi_calls = Arc::new(AtomicUsize::new(0));
        let chain = IntentChain::new(vec![
            Box::new(Counting { inner: ContextualFollowUp, calls: follow_up_calls.clone() }),
            Box::new(Counting { inner: MultiQuestionShippingInquiry, calls: multi_calls.clone() }),
        ]);

        let history = ConversationHistory::new(vec![ConversationTurn {
            speaker: Speaker::Assistant,
            text: TRIP_DESTINATION_QUESTION.to_string(),
            timestamp: Utc.with_ymd_and_hms(2026, 10, 19, 14, 0, 0).single().expect("timestamp"),
        }]);
        let message = "A Curazao. ¿Dónde lo dejo y hasta cuándo reciben?";
        let analysis = MessageAnalyzer::new().analyze(message);
        assert!(analysis.shipping_question_count() >= 2);

        let context = CustomerContext::unidentified();
        let reference = reference();
        let evaluation = chain.evaluate(&IntentInput {
            message,
            analysis: &analysis,
            context: &context,
            reference: &reference,
            history: &history,
        });

        let reply = evaluation.reply.expect("follow-up answers");
        assert_eq!(reply.response_type, ResponseType::ContextualFollowUp);
        assert_eq!(follow_up_calls.load(Ordering::SeqCst), 1);
        assert_eq!(multi_calls.load(Ordering::SeqCst), 0);
        assert_eq!(evaluation.evaluated, vec!["contextual_follow_up"]);
    }

    #[test]
    fn deferring_handlers_leave_hints_and_the_chain_continues() {
        let message = "¿Cuándo viajan a Curazao?";
        let analysis = MessageAnalyzer::new().analyze(message);
        let context = CustomerContext::unidentified();
        let reference = reference();
        let history = ConversationHistory::default();

        let evaluation = IntentChain::standard().evaluate(&IntentInput {
            message,
            analysis: &analysis,
            context: &context,
            reference: &reference,
            history: &history,
        });

        assert!(evaluation.reply.is_none());
        assert_eq!(
            evaluation.hints,
            vec![super::GenerationHint::TripContext(courier_core::destination::Destination::Curazao)]
        );
        assert_eq!(evaluation.evaluated.len(), 6);
    }
}
