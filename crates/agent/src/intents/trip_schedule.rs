use courier_core::domain::interaction::ResponseType;

use super::{
    salutation, GenerationHint, IntentHandler, IntentInput, IntentOutcome, IntentReply,
    TRIP_DESTINATION_QUESTION,
};

/// "¿Cuándo viajan?" Asks for the destination when none is given; with a
/// destination the trip list goes into the generative prompt.
pub struct TripScheduleInquiry;

impl IntentHandler for TripScheduleInquiry {
    fn name(&self) -> &'static str {
        "trip_schedule_inquiry"
    }

    fn handle(&self, input: &IntentInput<'_>) -> IntentOutcome {
        let analysis = input.analysis;
        if !analysis.asks_trip_schedule || analysis.shipping_question_count() >= 2 {
            return IntentOutcome::Declined;
        }

        match analysis.destination {
            Some(destination) => IntentOutcome::Defer(GenerationHint::TripContext(destination)),
            None => IntentOutcome::Matched(IntentReply::new(
                ResponseType::TripScheduleInquiry,
                format!("{}{TRIP_DESTINATION_QUESTION}", salutation(input.context)),
            )),
        }
    }
}
