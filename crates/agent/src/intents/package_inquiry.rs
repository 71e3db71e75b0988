use chrono::NaiveDate;

use courier_core::calendar::format_date;
use courier_core::destination::Destination;
use courier_core::domain::context::CustomerContext;
use courier_core::domain::interaction::ResponseType;
use courier_core::domain::package::{Package, PackageStatus};
use courier_core::domain::trip::TripStatus;
use courier_core::money::{format_amount, format_amounts};

use super::{salutation, IntentHandler, IntentInput, IntentOutcome, IntentReply};
use crate::conversation::MessageAnalysis;
use crate::reference::ReferenceData;

const MAX_LISTED_PACKAGES: usize = 3;

pub const NO_PACKAGES_FOUND: &str = "No encontré paquetes asociados a este número de WhatsApp. \
¿Me compartes el número de guía que aparece en tu recibo para revisarlo?";

/// Where a package really is, reading the package and its trip together.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShipmentProgress {
    ReadyForPickup,
    OnTheWay { departed: Option<NaiveDate> },
    AwaitingTrip { departure: Option<NaiveDate> },
}

impl ShipmentProgress {
    /// A trip that already arrived means the package is at the office even
    /// when its own status has not been updated yet.
    pub fn of(package: &Package, today: NaiveDate) -> Self {
        let trip_status = package.trip.as_ref().map(|trip| trip.status);
        let trip_date = package.trip.as_ref().map(|trip| trip.departure_date);

        if package.status == PackageStatus::AtDestination || trip_status == Some(TripStatus::Arrived)
        {
            return Self::ReadyForPickup;
        }
        if package.status.is_moving() || trip_status == Some(TripStatus::InTransit) {
            return Self::OnTheWay { departed: trip_date.filter(|date| *date <= today) };
        }
        let departure = match trip_status {
            Some(TripStatus::Scheduled | TripStatus::Pending) => {
                trip_date.filter(|date| *date >= today)
            }
            _ => None,
        };
        Self::AwaitingTrip { departure }
    }
}

/// "¿Ya llegó mi encomienda?", "¿dónde está EO-2025-0001?"
pub struct SpecificPackageInquiry;

impl IntentHandler for SpecificPackageInquiry {
    fn name(&self) -> &'static str {
        "specific_package_inquiry"
    }

    fn handle(&self, input: &IntentInput<'_>) -> IntentOutcome {
        let analysis = input.analysis;
        let context = input.context;
        if !analysis.asks_package_status || context.facts_unavailable {
            return IntentOutcome::Declined;
        }

        let greeting = salutation(context);
        let reply = |text: String| {
            IntentOutcome::Matched(IntentReply::new(
                ResponseType::SpecificPackageInquiry,
                format!("{greeting}{text}"),
            ))
        };

        if !context.found || context.package_count == 0 {
            return reply(NO_PACKAGES_FOUND.to_string());
        }

        let mut unknown = Vec::new();
        let targets = if analysis.tracking_numbers.is_empty() {
            context.pending_delivery.iter().collect::<Vec<_>>()
        } else {
            let mut targets = Vec::new();
            for tracking_number in &analysis.tracking_numbers {
                match context.find_pending(tracking_number) {
                    Some(package) => targets.push(package),
                    None => unknown.push(tracking_number.as_str()),
                }
            }
            targets
        };

        let mut paragraphs = Vec::new();
        if targets.is_empty() && unknown.is_empty() {
            paragraphs.push(
                "Todos tus paquetes ya fueron entregados; no tienes envíos pendientes en este momento."
                    .to_string(),
            );
        }

        let single = targets.len() == 1;
        for package in targets.iter().take(MAX_LISTED_PACKAGES) {
            paragraphs.push(describe(package, analysis, context, input.reference, single));
        }
        if targets.len() > MAX_LISTED_PACKAGES {
            paragraphs.push(format!(
                "Tienes {} paquetes más en camino; si quieres el detalle de alguno, envíame su número de guía.",
                targets.len() - MAX_LISTED_PACKAGES
            ));
        }

        if !unknown.is_empty() {
            paragraphs.push(format!(
                "No encuentro {} entre tus paquetes pendientes de entrega. Si ya fue entregado o está a nombre de otra persona, un asesor puede revisarlo contigo.",
                unknown
                    .iter()
                    .map(|tracking_number| format!("la guía {tracking_number}"))
                    .collect::<Vec<_>>()
                    .join(" ni ")
            ));
        }

        if analysis.asks_balance && context.has_pending_balance() {
            paragraphs.push(format!(
                "Tu saldo pendiente total es de {}.",
                format_amounts(&context.pending_by_currency)
            ));
        }

        reply(paragraphs.join("\n"))
    }
}

fn describe(
    package: &Package,
    analysis: &MessageAnalysis,
    context: &CustomerContext,
    reference: &ReferenceData,
    single: bool,
) -> String {
    let label = if package.description.trim().is_empty() {
        format!("Tu paquete {}", package.tracking_number)
    } else {
        format!("Tu paquete {} ({})", package.tracking_number, package.description.trim())
    };
    let destination_name = Destination::from_name(&package.destination)
        .map(|destination| destination.display_name().to_string())
        .unwrap_or_else(|| package.destination.trim().to_string());

    let progress = ShipmentProgress::of(package, reference.today());
    let answer = if single && analysis.asks_arrival {
        match progress {
            ShipmentProgress::ReadyForPickup => "¡Sí! ",
            _ => "Todavía no. ",
        }
    } else {
        ""
    };

    let mut sentence = match progress {
        ShipmentProgress::ReadyForPickup => {
            let office = Destination::from_name(&package.destination)
                .and_then(|city| reference.address_for(city))
                .map(|address| format!(": {}", address.describe()))
                .unwrap_or_default();
            format!(
                "{answer}{label} ya llegó a {destination_name} y está listo para recoger en nuestra oficina{office}."
            )
        }
        ShipmentProgress::OnTheWay { departed } => {
            let since = departed
                .map(|date| format!(" (salió el {})", format_date(date)))
                .unwrap_or_default();
            let mut text = format!("{answer}{label} va en camino a {destination_name}{since}.");
            if analysis.asks_arrival_time || analysis.asks_arrival {
                text.push_str(" Te avisaremos por este medio en cuanto llegue.");
            }
            text
        }
        ShipmentProgress::AwaitingTrip { departure: Some(date) } => format!(
            "{answer}{label} está {} y viaja a {destination_name} el {}.",
            package.status.label(),
            format_date(date)
        ),
        ShipmentProgress::AwaitingTrip { departure: None } => format!(
            "{answer}{label} está {} y pronto le asignaremos un viaje a {destination_name}.",
            package.status.label()
        ),
    };

    if let Some(payment) = context
        .pending_payment
        .iter()
        .find(|payment| payment.tracking_number.eq_ignore_ascii_case(&package.tracking_number))
    {
        sentence.push_str(&format!(
            " Tiene un saldo pendiente de {}.",
            format_amount(payment.pending_amount, payment.currency)
        ));
    }
    sentence
}
