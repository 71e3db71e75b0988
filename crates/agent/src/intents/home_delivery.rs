use courier_core::domain::interaction::ResponseType;

use super::{salutation, IntentHandler, IntentInput, IntentOutcome, IntentReply};

pub const HOME_DELIVERY_HANDOFF: &str = "Con gusto revisamos la entrega a domicilio. \
Voy a pasar tu solicitud a nuestro coordinador de entregas, quien te escribirá por este medio \
para confirmar la dirección, el horario y el costo del servicio.";

/// Home delivery is always arranged by a person.
pub struct HomeDeliveryRequest;

impl IntentHandler for HomeDeliveryRequest {
    fn name(&self) -> &'static str {
        "home_delivery_request"
    }

    fn handle(&self, input: &IntentInput<'_>) -> IntentOutcome {
        if !input.analysis.asks_home_delivery {
            return IntentOutcome::Declined;
        }

        IntentOutcome::Matched(IntentReply::new(
            ResponseType::HomeDeliveryRequest,
            format!("{}{HOME_DELIVERY_HANDOFF}", salutation(input.context)),
        ))
    }
}

#[cfg(test)]
mod tests {
    use courier_core::domain::conversation::ConversationHistory;
    use courier_core::domain::interaction::ResponseType;

    use super::{HomeDeliveryRequest, HOME_DELIVERY_HANDOFF};
    use crate::conversation::MessageAnalyzer;
    use crate::intents::test_support::{arrived_package, customer_context, reference};
    use crate::intents::{IntentHandler, IntentInput, IntentOutcome};

    #[test]
    fn home_delivery_always_hands_off_with_the_fixed_template() {
        let message = "¿Me lo pueden llevar a domicilio?";
        let analysis = MessageAnalyzer::new().analyze(message);
        let context = customer_context(vec![arrived_package()]);
        let reference = reference();
        let history = ConversationHistory::default();

        let outcome = HomeDeliveryRequest.handle(&IntentInput {
            message,
            analysis: &analysis,
            context: &context,
            reference: &reference,
            history: &history,
        });

        let IntentOutcome::Matched(reply) = outcome else {
            panic!("expected the hand-off template");
        };
        assert_eq!(reply.response_type, ResponseType::HomeDeliveryRequest);
        assert_eq!(reply.text, format!("¡Hola, Ana! {HOME_DELIVERY_HANDOFF}"));
    }
}
