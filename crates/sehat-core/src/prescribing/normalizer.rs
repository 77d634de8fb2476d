//! Medicine name normalizer.
//!
//! Handles:
//! - Strength removal (`500mg`, `650`, `5 ml`)
//! - Dosage-form removal (`tablet`, `syrup`, `inj`)
//! - Brand expansion (`dolo` → `paracetamol`, `augmentin` → `amoxicillin-clavulanate`)

use std::collections::{HashMap, HashSet};

/// Normalizer for free-text medicine names.
pub struct NameNormalizer {
    /// Alias map: brand or short name → generic name
    aliases: HashMap<String, String>,
    /// Tokens dropped before comparison
    noise: HashSet<String>,
}

impl Default for NameNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl NameNormalizer {
    /// Create a new normalizer with default mappings.
    pub fn new() -> Self {
        Self {
            aliases: Self::default_aliases(),
            noise: Self::default_noise(),
        }
    }

    /// Normalize a medicine name to its comparable generic form.
    ///
    /// Returns an empty string when nothing but strengths or dosage forms
    /// remain.
    pub fn normalize(&self, name: &str) -> String {
        let lower = name.to_lowercase();
        let tokens: Vec<&str> = lower
            .split(|c: char| c.is_whitespace() || c == ',' || c == '(' || c == ')')
            .filter(|t| !t.is_empty())
            .filter(|t| !self.is_noise(t))
            .collect();

        let stem = tokens.join(" ");
        self.expand_alias(&stem)
    }

    /// Expand a brand name to its generic name.
    pub fn expand_alias(&self, name: &str) -> String {
        let lower = name.trim().to_lowercase();
        self.aliases.get(&lower).cloned().unwrap_or(lower)
    }

    /// Add a custom alias mapping.
    pub fn add_alias(&mut self, alias: &str, generic: &str) {
        self.aliases
            .insert(alias.trim().to_lowercase(), generic.trim().to_lowercase());
    }

    fn is_noise(&self, token: &str) -> bool {
        // Strengths start with a digit: 500, 500mg, 0.5%, 5ml
        token.starts_with(|c: char| c.is_ascii_digit()) || self.noise.contains(token)
    }

    /// Units and dosage forms that do not identify the drug.
    fn default_noise() -> HashSet<String> {
        [
            // Units
            "mg", "mcg", "g", "ml", "iu", "units", "%",
            // Dosage forms
            "tab", "tabs", "tablet", "tablets", "cap", "caps", "capsule", "capsules",
            "syrup", "syp", "suspension", "susp", "inj", "injection", "drops", "cream",
            "ointment", "gel", "inhaler", "sachet", "powder", "lotion", "spray",
            // Release modifiers
            "sr", "er", "xr", "cr", "mr", "ds",
        ]
        .into_iter()
        .map(String::from)
        .collect()
    }

    /// Default brand mappings for commonly prescribed medicines.
    fn default_aliases() -> HashMap<String, String> {
        let mut map = HashMap::new();

        // Analgesics / antipyretics
        map.insert("crocin".into(), "paracetamol".into());
        map.insert("dolo".into(), "paracetamol".into());
        map.insert("calpol".into(), "paracetamol".into());
        map.insert("pcm".into(), "paracetamol".into());
        map.insert("acetaminophen".into(), "paracetamol".into());
        map.insert("brufen".into(), "ibuprofen".into());
        map.insert("combiflam".into(), "ibuprofen-paracetamol".into());
        map.insert("voveran".into(), "diclofenac".into());

        // Antibiotics
        map.insert("augmentin".into(), "amoxicillin-clavulanate".into());
        map.insert("clavam".into(), "amoxicillin-clavulanate".into());
        map.insert("mox".into(), "amoxicillin".into());
        map.insert("azithral".into(), "azithromycin".into());
        map.insert("azee".into(), "azithromycin".into());
        map.insert("ciplox".into(), "ciprofloxacin".into());
        map.insert("taxim".into(), "cefixime".into());
        map.insert("flagyl".into(), "metronidazole".into());

        // Antihistamines
        map.insert("cetzine".into(), "cetirizine".into());
        map.insert("okacet".into(), "cetirizine".into());
        map.insert("allegra".into(), "fexofenadine".into());
        map.insert("avil".into(), "pheniramine".into());

        // GI
        map.insert("pan".into(), "pantoprazole".into());
        map.insert("pantocid".into(), "pantoprazole".into());
        map.insert("omez".into(), "omeprazole".into());
        map.insert("rantac".into(), "ranitidine".into());
        map.insert("ondem".into(), "ondansetron".into());
        map.insert("emeset".into(), "ondansetron".into());
        map.insert("electral".into(), "oral rehydration salts".into());
        map.insert("ors".into(), "oral rehydration salts".into());

        // Chronic care
        map.insert("glycomet".into(), "metformin".into());
        map.insert("amlong".into(), "amlodipine".into());
        map.insert("telma".into(), "telmisartan".into());
        map.insert("ecosprin".into(), "aspirin".into());
        map.insert("thyronorm".into(), "levothyroxine".into());
        map.insert("eltroxin".into(), "levothyroxine".into());

        // Respiratory
        map.insert("asthalin".into(), "salbutamol".into());
        map.insert("montair".into(), "montelukast".into());

        map
    }
}
