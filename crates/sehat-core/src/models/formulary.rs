//! Formulary models.

use serde::{Deserialize, Serialize};

/// A drug in the hospital formulary, keyed by a canonical code.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FormularyEntry {
    /// Canonical drug code (e.g. an ATC code)
    pub code: String,
    /// Generic (INN) name
    pub generic_name: String,
    /// Brand names and common spellings
    pub aliases: Vec<String>,
    pub active: bool,
}

impl FormularyEntry {
    pub fn new(code: String, generic_name: String) -> Self {
        Self {
            code,
            generic_name,
            aliases: Vec::new(),
            active: true,
        }
    }

    pub fn with_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases = aliases.into_iter().map(Into::into).collect();
        self
    }

    /// Check whether a name equals the generic name or any alias.
    pub fn is_known_as(&self, name: &str) -> bool {
        let lower = name.trim().to_lowercase();
        self.generic_name.to_lowercase() == lower
            || self.aliases.iter().any(|a| a.to_lowercase() == lower)
    }
}
