// Closely related keys searched during harmonization.
//
// The order is part of the contract: the matcher keeps the first candidate
// that reaches the minimum distance, so earlier keys win ties. Candidates are
// never deduplicated; if two ever coincide, the earlier one wins by order.

use crate::key::Key;
use serde::Serialize;
use std::fmt;

/// How a candidate key relates to the home key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyRelation {
    Home,
    /// Tonic a perfect fifth above, same mode.
    Dominant,
    /// Tonic a perfect fifth below, same mode.
    Subdominant,
    /// Opposite mode, same key signature.
    Relative,
}

impl fmt::Display for KeyRelation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            KeyRelation::Home => "home",
            KeyRelation::Dominant => "dominant",
            KeyRelation::Subdominant => "subdominant",
            KeyRelation::Relative => "relative",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ModulationCandidate {
    pub key: Key,
    pub relation: KeyRelation,
}

/// Search order: home, fifth up, fifth down, relative.
pub fn candidates(home: &Key) -> [ModulationCandidate; 4] {
    [
        ModulationCandidate { key: *home, relation: KeyRelation::Home },
        ModulationCandidate { key: home.fifth_up(), relation: KeyRelation::Dominant },
        ModulationCandidate { key: home.fifth_down(), relation: KeyRelation::Subdominant },
        ModulationCandidate { key: home.relative(), relation: KeyRelation::Relative },
    ]
}
