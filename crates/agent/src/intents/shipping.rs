use courier_core::calendar::{format_date, format_date_time, shipping_deadline};
use courier_core::destination::Destination;
use courier_core::domain::interaction::ResponseType;
use courier_core::domain::trip::TripSchedule;

use super::{
    salutation, IntentHandler, IntentInput, IntentOutcome, IntentReply, TripsInfo,
    SHIPPING_DESTINATION_QUESTION,
};
use crate::reference::ReferenceData;

/// Where to drop off, next trip and deadline, asked together.
pub struct MultiQuestionShippingInquiry;

impl IntentHandler for MultiQuestionShippingInquiry {
    fn name(&self) -> &'static str {
        "multi_question_shipping_inquiry"
    }

    fn handle(&self, input: &IntentInput<'_>) -> IntentOutcome {
        if input.analysis.shipping_question_count() < 2 {
            return IntentOutcome::Declined;
        }

        let response_type = ResponseType::MultiQuestionShippingInquiry;
        let greeting = salutation(input.context);
        let Some(destination) = input.analysis.destination else {
            return IntentOutcome::Matched(IntentReply::new(
                response_type,
                format!("{greeting}{SHIPPING_DESTINATION_QUESTION}"),
            ));
        };

        IntentOutcome::Matched(
            IntentReply::new(
                response_type,
                format!("{greeting}{}", shipping_answer(input.reference, destination)),
            )
            .with_trips(TripsInfo::for_destination(input.reference, destination)),
        )
    }
}

/// A lone drop-off or deadline question.
pub struct SingleShippingQuestion;

impl IntentHandler for SingleShippingQuestion {
    fn name(&self) -> &'static str {
        "single_shipping_question"
    }

    fn handle(&self, input: &IntentInput<'_>) -> IntentOutcome {
        let analysis = input.analysis;
        if analysis.shipping_question_count() != 1
            || !(analysis.asks_where_to_ship || analysis.asks_deadline)
        {
            return IntentOutcome::Declined;
        }

        let response_type = ResponseType::SingleShippingQuestion;
        let greeting = salutation(input.context);

        if analysis.asks_where_to_ship {
            let text = match analysis.destination {
                Some(destination) => office_line(input.reference, destination),
                None => both_offices(input.reference),
            };
            return IntentOutcome::Matched(IntentReply::new(response_type, format!("{greeting}{text}")));
        }

        match analysis.destination {
            Some(destination) => IntentOutcome::Matched(
                IntentReply::new(
                    response_type,
                    format!("{greeting}{}", deadline_answer(input.reference, destination)),
                )
                .with_trips(TripsInfo::for_destination(input.reference, destination)),
            ),
            None => IntentOutcome::Matched(IntentReply::new(
                response_type,
                format!("{greeting}{SHIPPING_DESTINATION_QUESTION}"),
            )),
        }
    }
}

/// Office, next trip and deadline for a shipment to `destination`.
pub(crate) fn shipping_answer(reference: &ReferenceData, destination: Destination) -> String {
    format!(
        "Para enviar a {destination}:\n{}\n{}",
        office_line(reference, destination),
        deadline_answer(reference, destination)
    )
}

/// Drop-off office for shipments to `destination`, which is the office in
/// the other city.
pub(crate) fn office_line(reference: &ReferenceData, destination: Destination) -> String {
    let origin = destination.counterpart();
    match reference.address_for(origin) {
        Some(address) => format!(
            "Los paquetes para {destination} se reciben en nuestra oficina de {origin}: {}.",
            address.describe()
        ),
        None => format!(
            "Todavía no tengo registrada la dirección de nuestra oficina en {origin}. Un asesor te la confirmará por este medio."
        ),
    }
}

fn both_offices(reference: &ReferenceData) -> String {
    let lines = Destination::all()
        .into_iter()
        .map(|destination| format!("• {}", office_line(reference, destination)))
        .collect::<Vec<_>>();
    format!("Recibimos paquetes en nuestras dos oficinas:\n{}", lines.join("\n"))
}

pub(crate) fn deadline_answer(reference: &ReferenceData, destination: Destination) -> String {
    match reference.next_bookable_trip(destination) {
        Some(trip) => format!(
            // The formatted time already ends in "p. m."
            "{} Para alcanzarlo, tu paquete debe estar en la oficina a más tardar el {}",
            trip_sentence(trip, destination),
            format_date_time(shipping_deadline(trip.departure_date))
        ),
        None => no_trips_sentence(reference, destination),
    }
}

pub(crate) fn trip_sentence(trip: &TripSchedule, destination: Destination) -> String {
    match trip.flight_number.as_deref().filter(|flight| !flight.trim().is_empty()) {
        Some(flight) => format!(
            "El próximo viaje a {destination} sale el {} (vuelo {}).",
            format_date(trip.departure_date),
            flight.trim()
        ),
        None => format!(
            "El próximo viaje a {destination} sale el {}.",
            format_date(trip.departure_date)
        ),
    }
}

pub(crate) fn no_trips_sentence(reference: &ReferenceData, destination: Destination) -> String {
    format!(
        "Por ahora no tengo viajes programados a {destination} en los próximos {} días. Te avisaremos apenas se programe uno.",
        reference.trip_window_days
    )
}
