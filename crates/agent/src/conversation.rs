use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;

use courier_core::destination::Destination;
use courier_core::domain::conversation::ConversationHistory;
use courier_core::domain::interaction::ToneMarker;
use courier_core::text::{contains_any, fold};

const TRIP_SCHEDULE_PHRASES: &[&str] = &[
    "cuando viajan",
    "cuando viaja",
    "cuando viajas",
    "cuando es el viaje",
    "cuando hay viaje",
    "cuando sale",
    "cuando salen",
    "proximo viaje",
    "proximos viajes",
    "siguiente viaje",
    "proximo vuelo",
    "fecha de viaje",
    "fechas de viaje",
    "que dias viajan",
    "cuando despachan",
    "cuando mandan",
    "itinerario",
];

const WHERE_TO_SHIP_PHRASES: &[&str] = &[
    "donde envio",
    "donde llevo",
    "donde lo llevo",
    "donde los llevo",
    "donde dejo",
    "donde lo dejo",
    "donde los dejo",
    "donde entrego",
    "donde mando",
    "donde puedo enviar",
    "donde puedo dejar",
    "donde queda la oficina",
    "donde estan ubicados",
    "direccion de la oficina",
    "direccion",
    "punto de entrega",
    "oficina",
];

const DEADLINE_PHRASES: &[&str] = &[
    "hasta cuando",
    "hasta que hora",
    "hasta que dia",
    "fecha limite",
    "hora limite",
    "plazo",
    "ultimo dia",
    "a mas tardar",
];

const PACKAGE_STATUS_PHRASES: &[&str] = &[
    "mi paquete",
    "mis paquetes",
    "mi encomienda",
    "mis encomiendas",
    "mi caja",
    "mis cajas",
    "mi envio",
    "mis envios",
    "estado de",
    "rastrear",
    "rastreo",
    "seguimiento",
    "ya llego",
    "ya llegaron",
    "llego mi",
    "llegaron mis",
    "cuando llega",
    "cuando llegan",
];

const ARRIVAL_PHRASES: &[&str] =
    &["ya llego", "ya llegaron", "llego", "llegaron", "ha llegado", "han llegado"];

const ARRIVAL_TIME_PHRASES: &[&str] =
    &["cuando llega", "cuando llegan", "a que hora llega", "cuando va a llegar", "que dia llega"];

const HOME_DELIVERY_PHRASES: &[&str] = &[
    "a domicilio",
    "domicilio",
    "a mi casa",
    "hasta mi casa",
    "a la casa",
    "a mi direccion",
    "me lo llevan",
    "me lo traen",
    "me la traen",
    "me lo pueden llevar",
    "me lo pueden traer",
    "lo traen a",
];

const BALANCE_PHRASES: &[&str] = &[
    "cuanto debo",
    "cuanto le debo",
    "cuanto tengo que pagar",
    "saldo",
    "deuda",
    "debo algo",
    "pendiente por pagar",
];

const GREETING_PHRASES: &[&str] =
    &["hola", "buenos dias", "buen dia", "buenas tardes", "buenas noches", "buenas", "saludos"];
const FORMAL_PHRASES: &[&str] =
    &["usted", "ustedes", "por favor", "cordial", "cordialmente", "senor", "senora", "estimado"];
const INFORMAL_PHRASES: &[&str] = &["oye", "hey", "parce", "mano", "porfa", "xfa", "q tal", "vale"];
const GRATITUDE_PHRASES: &[&str] = &["gracias", "te agradezco", "le agradezco", "agradecido"];
const APOLOGY_PHRASES: &[&str] = &["disculpa", "disculpe", "perdon", "lo siento", "lamento"];

const TRIP_CLARIFICATION_PHRASES: &[&str] = &["para que destino quieres consultar"];
const SHIPPING_CLARIFICATION_PHRASES: &[&str] = &["hacia que destino quieres enviar"];

/// Structured reading of one customer message.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MessageAnalysis {
    pub folded: String,
    pub destination: Option<Destination>,
    pub tracking_numbers: Vec<String>,
    pub asks_trip_schedule: bool,
    pub asks_where_to_ship: bool,
    pub asks_deadline: bool,
    pub asks_package_status: bool,
    pub asks_arrival: bool,
    pub asks_arrival_time: bool,
    pub asks_home_delivery: bool,
    pub asks_balance: bool,
    pub greeting: bool,
}

impl MessageAnalysis {
    /// How many of {where to ship, next trip, deadline} the message asks.
    pub fn shipping_question_count(&self) -> usize {
        [self.asks_where_to_ship, self.asks_trip_schedule, self.asks_deadline]
            .into_iter()
            .filter(|asked| *asked)
            .count()
    }
}

/// Clarifying question the assistant left open in its previous turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PendingQuestion {
    TripDestination,
    ShippingDestination,
}

#[derive(Clone, Debug, Default)]
pub struct MessageAnalyzer;

impl MessageAnalyzer {
    pub fn new() -> Self {
        Self
    }

    pub fn analyze(&self, message: &str) -> MessageAnalysis {
        let folded = fold(message);
        let tracking_numbers = extract_tracking_numbers(message);

        let asks_home_delivery = contains_any(&folded, HOME_DELIVERY_PHRASES);
        let asks_trip_schedule = contains_any(&folded, TRIP_SCHEDULE_PHRASES);
        let asks_where_to_ship = !asks_home_delivery && contains_any(&folded, WHERE_TO_SHIP_PHRASES);
        let asks_deadline = contains_any(&folded, DEADLINE_PHRASES);
        let asks_arrival = contains_any(&folded, ARRIVAL_PHRASES);
        let asks_arrival_time = contains_any(&folded, ARRIVAL_TIME_PHRASES);
        let asks_package_status = !tracking_numbers.is_empty()
            || contains_any(&folded, PACKAGE_STATUS_PHRASES)
            || (asks_arrival && !asks_trip_schedule);

        MessageAnalysis {
            destination: Destination::detect(message),
            tracking_numbers,
            asks_trip_schedule,
            asks_where_to_ship,
            asks_deadline,
            asks_package_status,
            asks_arrival,
            asks_arrival_time,
            asks_home_delivery,
            asks_balance: contains_any(&folded, BALANCE_PHRASES),
            greeting: contains_any(&folded, GREETING_PHRASES),
            folded,
        }
    }

    /// The clarifying question still waiting for an answer, if the latest
    /// turn in the history is one.
    pub fn pending_question(&self, history: &ConversationHistory) -> Option<PendingQuestion> {
        if history.customer_turns_since_last_reply() > 0 {
            return None;
        }
        let (_, turn) = history.last_assistant_turn()?;
        let folded = fold(&turn.text);
        if contains_any(&folded, TRIP_CLARIFICATION_PHRASES) {
            Some(PendingQuestion::TripDestination)
        } else if contains_any(&folded, SHIPPING_CLARIFICATION_PHRASES) {
            Some(PendingQuestion::ShippingDestination)
        } else {
            None
        }
    }
}

fn tracking_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)\b([a-z]{2,3})-?(\d{4})-?(\d{3,6})\b").ok()).as_ref()
}

/// Tracking numbers in canonical `EO-2025-0001` form, in order of
/// appearance.
pub fn extract_tracking_numbers(message: &str) -> Vec<String> {
    let Some(pattern) = tracking_pattern() else {
        return Vec::new();
    };

    let mut seen = BTreeSet::new();
    let mut found = Vec::new();
    for captures in pattern.captures_iter(message) {
        let canonical = format!(
            "{}-{}-{}",
            captures[1].to_ascii_uppercase(),
            &captures[2],
            &captures[3]
        );
        if seen.insert(canonical.clone()) {
            found.push(canonical);
        }
    }
    found
}

/// Style markers present in a piece of text. Used for learning notes, so
/// it never looks at facts.
pub fn tone_markers(text: &str) -> Vec<ToneMarker> {
    let folded = fold(text);
    let mut markers = BTreeSet::new();

    if contains_any(&folded, GREETING_PHRASES) {
        markers.insert(ToneMarker::Greeting);
    }
    if contains_any(&folded, FORMAL_PHRASES) {
        markers.insert(ToneMarker::Formal);
    }
    if contains_any(&folded, INFORMAL_PHRASES) {
        markers.insert(ToneMarker::Informal);
    }
    if contains_any(&folded, GRATITUDE_PHRASES) {
        markers.insert(ToneMarker::Gratitude);
    }
    if contains_any(&folded, APOLOGY_PHRASES) {
        markers.insert(ToneMarker::Apology);
    }
    if text.chars().any(is_emoji) {
        markers.insert(ToneMarker::Emoji);
    }

    markers.into_iter().collect()
}

fn is_emoji(character: char) -> bool {
    matches!(character as u32, 0x1F300..=0x1FAFF | 0x2600..=0x27BF)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use courier_core::destination::Destination;
    use courier_core::domain::conversation::{ConversationHistory, ConversationTurn, Speaker};
    use courier_core::domain::interaction::ToneMarker;

    use super::{
        extract_tracking_numbers, tone_markers, MessageAnalyzer, PendingQuestion,
    };

    fn turn(speaker: Speaker, text: &str, minute: u32) -> ConversationTurn {
        ConversationTurn {
            speaker,
            text: text.to_string(),
            timestamp: Utc.with_ymd_and_hms(2026, 10, 19, 9, minute, 0).single().expect("timestamp"),
        }
    }

    #[test]
    fn arrival_question_reads_as_package_inquiry() {
        let analysis = MessageAnalyzer::new().analyze("¿ya llegó mi encomienda?");

        assert!(analysis.asks_package_status);
        assert!(analysis.asks_arrival);
        assert!(!analysis.asks_trip_schedule);
        assert_eq!(analysis.destination, None);
    }

    #[test]
    fn trip_question_without_destination() {
        let analysis = MessageAnalyzer::new().analyze("¿Cuándo viajan?");

        assert!(analysis.asks_trip_schedule);
        assert!(!analysis.asks_package_status);
        assert_eq!(analysis.shipping_question_count(), 1);
    }

    #[test]
    fn counts_every_shipping_sub_question() {
        let analysis = MessageAnalyzer::new()
            .analyze("Hola, ¿dónde dejo el paquete para Curazao, cuándo es el próximo viaje y hasta cuándo reciben?");

        assert_eq!(analysis.destination, Some(Destination::Curazao));
        assert!(analysis.asks_where_to_ship);
        assert!(analysis.asks_trip_schedule);
        assert!(analysis.asks_deadline);
        assert_eq!(analysis.shipping_question_count(), 3);
        assert!(analysis.greeting);
    }

    #[test]
    fn home_delivery_is_not_mistaken_for_office_question() {
        let analysis = MessageAnalyzer::new().analyze("¿Me lo pueden llevar a mi dirección?");

        assert!(analysis.asks_home_delivery);
        assert!(!analysis.asks_where_to_ship);
    }

    #[test]
    fn balance_question_is_not_a_package_status_question() {
        let analysis = MessageAnalyzer::new().analyze("¿cuánto debo?");

        assert!(analysis.asks_balance);
        assert!(!analysis.asks_package_status);
    }

    #[test]
    fn tracking_numbers_are_canonicalised_and_deduplicated() {
        assert_eq!(
            extract_tracking_numbers("guía eo20250001 y EO-2025-0001, también AB-2024-123456"),
            vec!["EO-2025-0001".to_string(), "AB-2024-123456".to_string()]
        );
        assert!(extract_tracking_numbers("llamé al 3000000001").is_empty());
    }

    #[test]
    fn pending_question_requires_assistant_to_have_the_last_word() {
        let analyzer = MessageAnalyzer::new();
        let asked = ConversationHistory::new(vec![
            turn(Speaker::Customer, "¿cuándo viajan?", 1),
            turn(
                Speaker::Assistant,
                "¿Para qué destino quieres consultar los próximos viajes? Viajamos a Barranquilla y a Curazao.",
                2,
            ),
        ]);
        assert_eq!(analyzer.pending_question(&asked), Some(PendingQuestion::TripDestination));

        let mut turns = asked.turns().to_vec();
        turns.push(turn(Speaker::Customer, "gracias", 3));
        assert_eq!(analyzer.pending_question(&ConversationHistory::new(turns)), None);
    }

    #[test]
    fn tone_markers_are_sorted_and_unique() {
        assert_eq!(
            tone_markers("¡Hola! Con gusto, gracias por escribirnos 😊"),
            vec![ToneMarker::Greeting, ToneMarker::Emoji, ToneMarker::Gratitude]
        );
        assert!(tone_markers("Tu paquete está en tránsito.").is_empty());
    }
}
