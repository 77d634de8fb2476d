//! Duplicate-medication checker.
//!
//! Flags a candidate medicine name when the patient already has a medication
//! line with a matching name that is still active on the given day. The check
//! is advisory: [`DuplicateChecker::check`] logs failures and reports nothing
//! instead of blocking submission.

use std::collections::HashSet;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{NameNormalizer, PrescribingResult};
use crate::db::Database;
use crate::models::ActiveMedication;

/// How a candidate name is compared with stored medication names.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MatchPolicy {
    /// Case-insensitive substring of the stored name. "Paracetamol 500" does
    /// not match a stored "Paracetamol"; "para" matches "Paracetamol".
    #[default]
    Substring,
    /// Equality after stripping strengths and dosage forms and expanding
    /// brand names to generics.
    NormalizedName,
    /// Equality of formulary codes, falling back to normalized names when
    /// either side has no code.
    DrugCode,
}

impl MatchPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchPolicy::Substring => "substring",
            MatchPolicy::NormalizedName => "normalized_name",
            MatchPolicy::DrugCode => "drug_code",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "substring" => Some(MatchPolicy::Substring),
            "normalized_name" | "normalized" => Some(MatchPolicy::NormalizedName),
            "drug_code" | "code" => Some(MatchPolicy::DrugCode),
            _ => None,
        }
    }
}

/// A candidate name that overlaps an active medication.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DuplicateWarning {
    /// The name as typed by the prescriber
    pub medicine_name: String,
    /// Latest end date among the matching active lines
    pub active_until: NaiveDate,
    /// Number of active lines that matched
    pub matches: usize,
}

impl fmt::Display for DuplicateWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "\"{}\" is already prescribed and active until {}",
            self.medicine_name,
            self.active_until.format("%Y-%m-%d")
        )
    }
}

/// Checks candidate names against a patient's active medications.
pub struct DuplicateChecker<'a> {
    db: &'a Database,
    policy: MatchPolicy,
    normalizer: NameNormalizer,
}

impl<'a> DuplicateChecker<'a> {
    /// Create a checker with the default normalizer.
    pub fn new(db: &'a Database, policy: MatchPolicy) -> Self {
        Self {
            db,
            policy,
            normalizer: NameNormalizer::new(),
        }
    }

    /// Replace the normalizer (custom brand mappings).
    pub fn with_normalizer(mut self, normalizer: NameNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn policy(&self) -> MatchPolicy {
        self.policy
    }

    /// Active medication lines of `patient_id` on `today` whose names match
    /// `candidate`, latest end date first.
    ///
    /// A blank candidate short-circuits without touching the database. Lines
    /// belonging to `exclude_prescription` are ignored.
    pub fn find_overlaps(
        &self,
        patient_id: &str,
        candidate: &str,
        today: NaiveDate,
        exclude_prescription: Option<&str>,
    ) -> PrescribingResult<Vec<ActiveMedication>> {
        let candidate = candidate.trim();
        if candidate.is_empty() {
            return Ok(Vec::new());
        }

        let active = self.db.list_active_medications(patient_id, today)?;
        let mut overlaps = Vec::new();
        for med in active {
            if exclude_prescription == Some(med.prescription_id.as_str()) {
                continue;
            }
            if self.names_match(candidate, &med.medicine_name)? {
                overlaps.push(med);
            }
        }
        Ok(overlaps)
    }

    /// Advisory check of one candidate name. Errors are logged and reported
    /// as "no duplicate".
    pub fn check(
        &self,
        patient_id: &str,
        candidate: &str,
        today: NaiveDate,
    ) -> Option<DuplicateWarning> {
        match self.find_overlaps(patient_id, candidate, today, None) {
            Ok(overlaps) => {
                let active_until = overlaps.iter().map(|m| m.end_date).max()?;
                debug!(
                    patient_id,
                    candidate,
                    matches = overlaps.len(),
                    policy = self.policy.as_str(),
                    "Duplicate medication found"
                );
                Some(DuplicateWarning {
                    medicine_name: candidate.trim().to_string(),
                    active_until,
                    matches: overlaps.len(),
                })
            }
            Err(e) => {
                warn!(patient_id, candidate, error = %e, "Duplicate check failed, ignoring");
                None
            }
        }
    }

    /// Check several candidate names, one warning per distinct name
    /// (case-insensitive), in input order.
    pub fn check_all<S: AsRef<str>>(
        &self,
        patient_id: &str,
        candidates: &[S],
        today: NaiveDate,
    ) -> Vec<DuplicateWarning> {
        let mut seen = HashSet::new();
        candidates
            .iter()
            .map(|c| c.as_ref().trim())
            .filter(|c| !c.is_empty() && seen.insert(c.to_lowercase()))
            .filter_map(|c| self.check(patient_id, c, today))
            .collect()
    }

    /// Compare a candidate with a stored name under the configured policy.
    pub fn names_match(&self, candidate: &str, stored: &str) -> PrescribingResult<bool> {
        let matched = match self.policy {
            MatchPolicy::Substring => stored
                .to_lowercase()
                .contains(&candidate.trim().to_lowercase()),
            MatchPolicy::NormalizedName => self.normalized_equal(candidate, stored),
            MatchPolicy::DrugCode => {
                match (self.drug_code(candidate)?, self.drug_code(stored)?) {
                    (Some(a), Some(b)) => a == b,
                    _ => self.normalized_equal(candidate, stored),
                }
            }
        };
        Ok(matched)
    }

    fn normalized_equal(&self, a: &str, b: &str) -> bool {
        let a = self.normalizer.normalize(a);
        !a.is_empty() && a == self.normalizer.normalize(b)
    }

    /// Formulary code for a name, trying the raw name before its normalized form.
    fn drug_code(&self, name: &str) -> PrescribingResult<Option<String>> {
        if let Some(code) = self.db.resolve_formulary_code(name)? {
            return Ok(Some(code));
        }
        let normalized = self.normalizer.normalize(name);
        if normalized.is_empty() {
            return Ok(None);
        }
        Ok(self.db.resolve_formulary_code(&normalized)?)
    }
}
