use serde::{Deserialize, Serialize};

use crate::destination::Destination;

/// Office where packages are dropped off or collected in one city.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationAddress {
    pub city: String,
    pub address_line: String,
    pub contact_name: Option<String>,
    pub contact_phone: Option<String>,
    pub opening_hours: Option<String>,
    pub notes: Option<String>,
}

impl DestinationAddress {
    pub fn destination(&self) -> Option<Destination> {
        Destination::from_name(&self.city)
    }

    /// One-paragraph rendering used in replies and prompts.
    pub fn describe(&self) -> String {
        let mut parts = vec![self.address_line.trim().to_string()];
        if let Some(hours) = self.opening_hours.as_deref().filter(|value| !value.trim().is_empty()) {
            parts.push(format!("horario: {}", hours.trim()));
        }
        match (self.contact_name.as_deref(), self.contact_phone.as_deref()) {
            (Some(name), Some(phone)) => parts.push(format!("contacto: {name}, {phone}")),
            (None, Some(phone)) => parts.push(format!("teléfono: {phone}")),
            (Some(name), None) => parts.push(format!("contacto: {name}")),
            (None, None) => {}
        }
        if let Some(notes) = self.notes.as_deref().filter(|value| !value.trim().is_empty()) {
            parts.push(notes.trim().to_string());
        }
        parts.join(" · ")
    }
}
