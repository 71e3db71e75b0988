use courier_core::domain::context::CustomerContext;
use courier_core::money::format_amounts;

pub const NO_ACCOUNT_REPLY: &str = "¡Hola! No encontramos una cuenta asociada a este número de \
WhatsApp. ¿Me compartes el número de guía que aparece en tu recibo para ayudarte?";

const SERVICE_BUSY_REPLY: &str = "En este momento no puedo consultar tu información. Un asesor \
revisará tu mensaje y te responderá por este medio en breve.";

const FOLLOW_UP: &str = "Si necesitas algo más, un asesor te atenderá por este medio.";

/// Last-resort reply built only from the context already in hand. Never
/// fails and never touches the network.
#[derive(Clone, Copy, Debug, Default)]
pub struct EmergencyResponder;

impl EmergencyResponder {
    /// Reply for failures that happen before any context exists.
    pub fn respond_without_context(&self) -> String {
        format!("¡Hola! {SERVICE_BUSY_REPLY}")
    }

    pub fn respond(&self, context: &CustomerContext) -> String {
        if !context.found {
            return NO_ACCOUNT_REPLY.to_string();
        }

        let greeting = match context.first_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => format!("¡Hola, {name}! "),
            _ => "¡Hola! ".to_string(),
        };

        if context.facts_unavailable {
            return format!("{greeting}{SERVICE_BUSY_REPLY}");
        }

        if context.has_pending_balance() {
            return format!(
                "{greeting}Tienes un saldo pendiente de {}. {FOLLOW_UP}",
                format_amounts(&context.pending_by_currency)
            );
        }

        if let Some(package) = context.pending_delivery.first() {
            let others = context.pending_delivery.len() - 1;
            let more = match others {
                0 => String::new(),
                1 => " Tienes 1 paquete más pendiente de entrega.".to_string(),
                count => format!(" Tienes {count} paquetes más pendientes de entrega."),
            };
            return format!(
                "{greeting}Tu paquete {} está {}.{more} {FOLLOW_UP}",
                package.tracking_number,
                package.status.label()
            );
        }

        format!("{greeting}Todo está al día con tus envíos: no tienes paquetes ni saldos pendientes. {FOLLOW_UP}")
    }
}
