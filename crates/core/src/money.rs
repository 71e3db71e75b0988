use std::collections::BTreeMap;
use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Cop,
    Usd,
    Ang,
}

impl Currency {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Cop => "COP",
            Self::Usd => "USD",
            Self::Ang => "ANG",
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Cop => "$",
            Self::Usd => "US$",
            Self::Ang => "NAf",
        }
    }

    fn decimal_places(&self) -> u32 {
        match self {
            Self::Cop => 0,
            Self::Usd | Self::Ang => 2,
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl std::str::FromStr for Currency {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "COP" => Ok(Self::Cop),
            "USD" => Ok(Self::Usd),
            "ANG" | "XCG" => Ok(Self::Ang),
            other => Err(DomainError::InvalidCurrency(other.to_string())),
        }
    }
}

/// Renders an amount the way customers read it on a receipt.
///
/// Pesos are shown without cents and with `.` grouping (`$ 150.000 COP`);
/// dollars and guilders keep two decimals with `,` grouping
/// (`US$ 1,250.00`, `NAf 45.00`).
pub fn format_amount(amount: Decimal, currency: Currency) -> String {
    let places = currency.decimal_places();
    let rounded = amount.round_dp(places);
    let negative = rounded.is_sign_negative() && !rounded.is_zero();
    let absolute = rounded.abs();

    let rendered = format!("{:.*}", places as usize, absolute);
    let (integer_part, fraction_part) = match rendered.split_once('.') {
        Some((integer, fraction)) => (integer.to_string(), Some(fraction.to_string())),
        None => (rendered, None),
    };

    let (group_separator, decimal_separator) = match currency {
        Currency::Cop => ('.', ','),
        Currency::Usd | Currency::Ang => (',', '.'),
    };

    let mut body = group_thousands(&integer_part, group_separator);
    if let Some(fraction) = fraction_part {
        body.push(decimal_separator);
        body.push_str(&fraction);
    }

    let sign = if negative { "-" } else { "" };
    match currency {
        Currency::Cop => format!("{sign}{} {body} COP", currency.symbol()),
        Currency::Usd | Currency::Ang => format!("{sign}{} {body}", currency.symbol()),
    }
}

/// Joins a per-currency map into a single human sentence fragment,
/// e.g. `$ 80.000 COP y US$ 12.00`.
pub fn format_amounts(amounts: &BTreeMap<Currency, Decimal>) -> String {
    let parts = amounts
        .iter()
        .filter(|(_, amount)| !amount.is_zero())
        .map(|(currency, amount)| format_amount(*amount, *currency))
        .collect::<Vec<_>>();
    join_spanish(&parts)
}

pub fn join_spanish(parts: &[String]) -> String {
    match parts {
        [] => String::new(),
        [single] => single.clone(),
        [init @ .., last] => format!("{} y {last}", init.join(", ")),
    }
}

fn group_thousands(digits: &str, separator: char) -> String {
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    let length = digits.len();
    for (index, character) in digits.chars().enumerate() {
        if index > 0 && (length - index) % 3 == 0 {
            grouped.push(separator);
        }
        grouped.push(character);
    }
    grouped
}
