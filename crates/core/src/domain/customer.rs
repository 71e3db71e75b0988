use serde::{Deserialize, Serialize};

use crate::phone::{match_phone, PhoneMatch};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CustomerId(pub String);

impl std::fmt::Display for CustomerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub first_name: String,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub whatsapp: Option<String>,
}

impl Customer {
    /// Strongest match between the requesting number and either stored
    /// number.
    pub fn phone_match(&self, requested: &str) -> Option<PhoneMatch> {
        [self.phone.as_deref(), self.whatsapp.as_deref()]
            .into_iter()
            .flatten()
            .filter_map(|stored| match_phone(stored, requested))
            .max()
    }

    pub fn full_name(&self) -> String {
        match self.last_name.as_deref().map(str::trim).filter(|value| !value.is_empty()) {
            Some(last_name) => format!("{} {last_name}", self.first_name.trim()),
            None => self.first_name.trim().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Customer, CustomerId};
    use crate::phone::PhoneMatch;

    fn customer(phone: Option<&str>, whatsapp: Option<&str>) -> Customer {
        Customer {
            id: CustomerId("C-1".to_string()),
            first_name: "Ana".to_string(),
            last_name: Some("Pérez".to_string()),
            phone: phone.map(str::to_string),
            whatsapp: whatsapp.map(str::to_string),
        }
    }

    #[test]
    fn whatsapp_exact_beats_phone_suffix() {
        let customer = customer(Some("300 000 0001"), Some("+57 300 000 0001"));
        assert_eq!(customer.phone_match("573000000001"), Some(PhoneMatch::Exact));
    }

    #[test]
    fn no_stored_numbers_never_match() {
        assert_eq!(customer(None, None).phone_match("573000000001"), None);
        assert_eq!(customer(None, None).full_name(), "Ana Pérez");
    }
}
