use courier_core::calendar::{format_date, format_date_time, shipping_deadline};
use courier_core::destination::Destination;
use courier_core::domain::interaction::ResponseType;

use super::shipping::{no_trips_sentence, shipping_answer};
use super::{salutation, IntentHandler, IntentInput, IntentOutcome, IntentReply, TripsInfo};
use crate::conversation::{MessageAnalyzer, PendingQuestion};
use crate::reference::ReferenceData;

const MAX_LISTED_TRIPS: usize = 4;

/// Answers a destination given in reply to our own clarifying question.
pub struct ContextualFollowUp;

impl IntentHandler for ContextualFollowUp {
    fn name(&self) -> &'static str {
        "contextual_follow_up"
    }

    fn handle(&self, input: &IntentInput<'_>) -> IntentOutcome {
        let Some(pending) = MessageAnalyzer::new().pending_question(input.history) else {
            return IntentOutcome::Declined;
        };
        let analysis = input.analysis;
        let Some(destination) = analysis.destination else {
            return IntentOutcome::Declined;
        };
        // A message with its own request is not an answer to our question.
        if analysis.asks_home_delivery
            || analysis.asks_package_status
            || !analysis.tracking_numbers.is_empty()
            || analysis.asks_balance
        {
            return IntentOutcome::Declined;
        }

        let body = match pending {
            PendingQuestion::TripDestination => trip_list(input.reference, destination),
            PendingQuestion::ShippingDestination => shipping_answer(input.reference, destination),
        };
        let greeting = if analysis.greeting { salutation(input.context) } else { String::new() };

        IntentOutcome::Matched(
            IntentReply::new(ResponseType::ContextualFollowUp, format!("{greeting}{body}"))
                .with_trips(TripsInfo::for_destination(input.reference, destination)),
        )
    }
}

fn trip_list(reference: &ReferenceData, destination: Destination) -> String {
    let trips = reference.trips_to(destination).take(MAX_LISTED_TRIPS).collect::<Vec<_>>();
    if trips.is_empty() {
        return no_trips_sentence(reference, destination);
    }

    let mut lines = vec![format!("Estos son los próximos viajes a {destination}:")];
    for trip in trips {
        match trip.flight_number.as_deref().filter(|flight| !flight.trim().is_empty()) {
            Some(flight) => {
                lines.push(format!("• {} (vuelo {})", format_date(trip.departure_date), flight.trim()))
            }
            None => lines.push(format!("• {}", format_date(trip.departure_date))),
        }
    }

    match reference.next_bookable_trip(destination) {
        Some(trip) => lines.push(format!(
            // The formatted time already ends in "p. m."
            "Para el viaje del {}, recibimos paquetes hasta el {}",
            format_date(trip.departure_date),
            format_date_time(shipping_deadline(trip.departure_date))
        )),
        None => lines.push(
            "Ya cerramos la recepción para estos viajes; escríbenos y te confirmamos el siguiente."
                .to_string(),
        ),
    }
    lines.join("\n")
}
