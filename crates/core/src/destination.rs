use std::fmt;

use serde::{Deserialize, Serialize};

use crate::text::{contains_phrase, fold, words};

/// The two cities the courier operates between.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Destination {
    Barranquilla,
    Curazao,
}

const BARRANQUILLA_ALIASES: &[&str] = &["barranquilla", "baq", "quilla", "colombia"];
const CURAZAO_ALIASES: &[&str] = &["curazao", "curacao", "willemstad", "korsou", "cur"];
const DIRECTION_WORDS: &[&str] = &["a", "para", "hacia", "hasta", "pa"];

impl Destination {
    pub fn all() -> [Destination; 2] {
        [Self::Barranquilla, Self::Curazao]
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Barranquilla => "Barranquilla",
            Self::Curazao => "Curazao",
        }
    }

    /// The other end of the route: shipments *to* one city are dropped off
    /// at the office in the other.
    pub fn counterpart(&self) -> Destination {
        match self {
            Self::Barranquilla => Self::Curazao,
            Self::Curazao => Self::Barranquilla,
        }
    }

    fn aliases(&self) -> &'static [&'static str] {
        match self {
            Self::Barranquilla => BARRANQUILLA_ALIASES,
            Self::Curazao => CURAZAO_ALIASES,
        }
    }

    /// Resolves a stored city name (`"Curaçao"`, `"Barranquilla, CO"`) to a
    /// known destination.
    pub fn from_name(name: &str) -> Option<Destination> {
        let folded = fold(name);
        Self::all()
            .into_iter()
            .find(|destination| destination.aliases().iter().any(|alias| contains_phrase(&folded, alias)))
    }

    pub fn matches_name(&self, name: &str) -> bool {
        Self::from_name(name) == Some(*self)
    }

    /// Finds the destination a customer message refers to.
    ///
    /// When both cities are mentioned ("de Barranquilla a Curazao") the one
    /// introduced by a direction word wins; if that is still ambiguous the
    /// message is treated as naming no destination.
    pub fn detect(message: &str) -> Option<Destination> {
        let folded = fold(message);
        let tokens = words(&folded).collect::<Vec<_>>();

        let mut mentioned = Vec::new();
        let mut directed = Vec::new();
        for (index, token) in tokens.iter().enumerate() {
            let Some(destination) =
                Self::all().into_iter().find(|destination| destination.aliases().contains(token))
            else {
                continue;
            };
            if !mentioned.contains(&destination) {
                mentioned.push(destination);
            }
            let preceded_by_direction =
                index > 0 && DIRECTION_WORDS.contains(&tokens[index - 1]);
            if preceded_by_direction && !directed.contains(&destination) {
                directed.push(destination);
            }
        }

        match (mentioned.as_slice(), directed.as_slice()) {
            ([single], _) => Some(*single),
            (_, [single]) => Some(*single),
            _ => None,
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}
