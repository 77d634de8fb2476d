//! In-memory prescription composer.
//!
//! Medication lines carry a stable `line_id` and a `name_revision` that bumps
//! on every name edit. A duplicate check started for one revision is dropped
//! if the line has since been renamed or removed, so a slow check can never
//! overwrite a newer state.

use std::collections::{HashMap, HashSet};
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{DuplicateChecker, DuplicateWarning, PrescribingError, PrescribingResult};
use crate::models::{ComposedPrescription, Frequency, NewMedication, Timing};

/// Default dose-timing for a new line.
pub const DEFAULT_FREQUENCY: Frequency = Frequency::TwiceDaily;
/// Default food timing for a new line.
pub const DEFAULT_TIMING: Timing = Timing::AfterFood;
/// Default course length for a new line.
pub const DEFAULT_DURATION_DAYS: u32 = 7;

/// One medication line being edited.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MedicationDraft {
    pub line_id: u64,
    pub medicine_name: String,
    pub dosage: String,
    pub frequency: Frequency,
    pub timing: Timing,
    pub duration_days: u32,
    pub instructions: String,
    pub name_revision: u64,
}

impl MedicationDraft {
    fn blank(line_id: u64) -> Self {
        Self {
            line_id,
            medicine_name: String::new(),
            dosage: String::new(),
            frequency: DEFAULT_FREQUENCY,
            timing: DEFAULT_TIMING,
            duration_days: DEFAULT_DURATION_DAYS,
            instructions: String::new(),
            name_revision: 0,
        }
    }
}

/// A single-field edit of a medication line.
#[derive(Debug, Clone, PartialEq)]
pub enum MedicationField {
    MedicineName(String),
    Dosage(String),
    Frequency(Frequency),
    Timing(Timing),
    DurationDays(u32),
    Instructions(String),
}

/// Identifies the line revision a duplicate check was started for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckTicket {
    pub line_id: u64,
    pub revision: u64,
    pub medicine_name: String,
}

/// Reasons a composed prescription cannot be submitted. Positions are
/// zero-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    EmptyDiagnosis,
    NoMedications,
    EmptyMedicineName { position: usize },
    EmptyDosage { position: usize },
    InvalidDuration { position: usize },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::EmptyDiagnosis => write!(f, "Diagnosis is required"),
            ValidationError::NoMedications => write!(f, "At least one medication is required"),
            ValidationError::EmptyMedicineName { position } => {
                write!(f, "Medication #{}: medicine name is required", position + 1)
            }
            ValidationError::EmptyDosage { position } => {
                write!(f, "Medication #{}: dosage is required", position + 1)
            }
            ValidationError::InvalidDuration { position } => {
                write!(f, "Medication #{}: duration must be at least 1 day", position + 1)
            }
        }
    }
}

/// Check a composed prescription before any write.
pub fn validate_composed(composed: &ComposedPrescription) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if composed.diagnosis.trim().is_empty() {
        errors.push(ValidationError::EmptyDiagnosis);
    }
    if composed.medications.is_empty() {
        errors.push(ValidationError::NoMedications);
    }
    for (position, med) in composed.medications.iter().enumerate() {
        if med.medicine_name.trim().is_empty() {
            errors.push(ValidationError::EmptyMedicineName { position });
        }
        if med.dosage.trim().is_empty() {
            errors.push(ValidationError::EmptyDosage { position });
        }
        if med.duration_days < 1 {
            errors.push(ValidationError::InvalidDuration { position });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Accumulates a prescription draft before submission.
#[derive(Debug, Clone)]
pub struct PrescriptionComposer {
    diagnosis: String,
    notes: String,
    follow_up_date: Option<NaiveDate>,
    lines: Vec<MedicationDraft>,
    next_line_id: u64,
    /// Current warning per line, keyed by line id
    warnings: HashMap<u64, DuplicateWarning>,
}

impl Default for PrescriptionComposer {
    fn default() -> Self {
        Self::new()
    }
}

impl PrescriptionComposer {
    /// Start a draft with one blank medication line.
    pub fn new() -> Self {
        let mut composer = Self::empty();
        composer.add_medication();
        composer
    }

    /// Start a draft with no medication lines.
    pub fn empty() -> Self {
        Self {
            diagnosis: String::new(),
            notes: String::new(),
            follow_up_date: None,
            lines: Vec::new(),
            next_line_id: 1,
            warnings: HashMap::new(),
        }
    }

    pub fn set_diagnosis(&mut self, diagnosis: impl Into<String>) {
        self.diagnosis = diagnosis.into();
    }

    pub fn set_notes(&mut self, notes: impl Into<String>) {
        self.notes = notes.into();
    }

    /// Set or clear the follow-up date. Dates before the prescription date
    /// are accepted.
    pub fn set_follow_up_date(&mut self, date: Option<NaiveDate>) {
        self.follow_up_date = date;
    }

    pub fn diagnosis(&self) -> &str {
        &self.diagnosis
    }

    pub fn medications(&self) -> &[MedicationDraft] {
        &self.lines
    }

    /// Append a blank line; returns its line id.
    pub fn add_medication(&mut self) -> u64 {
        let line_id = self.next_line_id;
        self.next_line_id += 1;
        self.lines.push(MedicationDraft::blank(line_id));
        line_id
    }

    /// Remove the line at `position`, dropping its warning. The last line
    /// may be removed; submission then fails validation.
    pub fn remove_medication(&mut self, position: usize) -> PrescribingResult<MedicationDraft> {
        if position >= self.lines.len() {
            return Err(PrescribingError::NoSuchLine(position));
        }
        let removed = self.lines.remove(position);
        self.warnings.remove(&removed.line_id);
        Ok(removed)
    }

    /// Edit one field of the line at `position`.
    ///
    /// Changing the medicine name clears that line's warning and, if the new
    /// name is not blank, returns a ticket for the duplicate check to run.
    pub fn update_medication(
        &mut self,
        position: usize,
        field: MedicationField,
    ) -> PrescribingResult<Option<CheckTicket>> {
        let line = self
            .lines
            .get_mut(position)
            .ok_or(PrescribingError::NoSuchLine(position))?;

        match field {
            MedicationField::MedicineName(name) => {
                line.medicine_name = name;
                line.name_revision += 1;
                self.warnings.remove(&line.line_id);

                if line.medicine_name.trim().is_empty() {
                    return Ok(None);
                }
                return Ok(Some(CheckTicket {
                    line_id: line.line_id,
                    revision: line.name_revision,
                    medicine_name: line.medicine_name.clone(),
                }));
            }
            MedicationField::Dosage(dosage) => line.dosage = dosage,
            MedicationField::Frequency(frequency) => line.frequency = frequency,
            MedicationField::Timing(timing) => line.timing = timing,
            MedicationField::DurationDays(days) => line.duration_days = days,
            MedicationField::Instructions(text) => line.instructions = text,
        }
        Ok(None)
    }

    /// Apply the result of a duplicate check. Returns `false` when the ticket
    /// is stale and the result was dropped.
    pub fn apply_check(&mut self, ticket: &CheckTicket, warning: Option<DuplicateWarning>) -> bool {
        let current = self
            .lines
            .iter()
            .any(|l| l.line_id == ticket.line_id && l.name_revision == ticket.revision);
        if !current {
            return false;
        }

        match warning {
            Some(w) => {
                self.warnings.insert(ticket.line_id, w);
            }
            None => {
                self.warnings.remove(&ticket.line_id);
            }
        }
        true
    }

    /// Edit a line and run the duplicate check in place.
    pub fn update_and_check(
        &mut self,
        position: usize,
        field: MedicationField,
        checker: &DuplicateChecker<'_>,
        patient_id: &str,
        today: NaiveDate,
    ) -> PrescribingResult<()> {
        if let Some(ticket) = self.update_medication(position, field)? {
            let warning = checker.check(patient_id, &ticket.medicine_name, today);
            self.apply_check(&ticket, warning);
        }
        Ok(())
    }

    /// Current warnings in line order, one per distinct medicine name.
    pub fn warnings(&self) -> Vec<DuplicateWarning> {
        let mut seen = HashSet::new();
        self.lines
            .iter()
            .filter_map(|l| self.warnings.get(&l.line_id))
            .filter(|w| seen.insert(w.medicine_name.trim().to_lowercase()))
            .cloned()
            .collect()
    }

    /// Validate and produce the prescription for submission. Text fields are
    /// trimmed; blank notes and instructions become `None`.
    pub fn validate(&self) -> Result<ComposedPrescription, Vec<ValidationError>> {
        let composed = ComposedPrescription {
            diagnosis: self.diagnosis.trim().to_string(),
            notes: non_blank(&self.notes),
            follow_up_date: self.follow_up_date,
            medications: self
                .lines
                .iter()
                .map(|l| NewMedication {
                    medicine_name: l.medicine_name.trim().to_string(),
                    dosage: l.dosage.trim().to_string(),
                    frequency: l.frequency,
                    timing: l.timing,
                    duration_days: l.duration_days,
                    instructions: non_blank(&l.instructions),
                })
                .collect(),
        };
        validate_composed(&composed)?;
        Ok(composed)
    }
}

fn non_blank(s: &str) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
