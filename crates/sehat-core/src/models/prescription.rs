//! Prescription and medication models.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

/// Dose-timing code: which daily slots a dose is taken in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Frequency {
    /// Once daily, morning
    #[serde(rename = "1-0-0")]
    Morning,
    /// Once daily, afternoon
    #[serde(rename = "0-1-0")]
    Afternoon,
    /// Once daily, night
    #[serde(rename = "0-0-1")]
    Night,
    /// Twice daily, morning and night
    #[serde(rename = "1-0-1")]
    TwiceDaily,
    /// Thrice daily
    #[serde(rename = "1-1-1")]
    ThriceDaily,
    /// Four times daily
    #[serde(rename = "1-1-1-1")]
    FourTimesDaily,
}

impl Frequency {
    pub const ALL: [Frequency; 6] = [
        Frequency::Morning,
        Frequency::Afternoon,
        Frequency::Night,
        Frequency::TwiceDaily,
        Frequency::ThriceDaily,
        Frequency::FourTimesDaily,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Frequency::Morning => "1-0-0",
            Frequency::Afternoon => "0-1-0",
            Frequency::Night => "0-0-1",
            Frequency::TwiceDaily => "1-0-1",
            Frequency::ThriceDaily => "1-1-1",
            Frequency::FourTimesDaily => "1-1-1-1",
        }
    }

    pub fn parse(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.code() == code.trim())
    }

    /// Per-slot flags in code order.
    pub fn slots(&self) -> Vec<bool> {
        self.code().split('-').map(|flag| flag == "1").collect()
    }

    pub fn doses_per_day(&self) -> usize {
        self.slots().into_iter().filter(|taken| *taken).count()
    }

    pub fn label(&self) -> &'static str {
        match self {
            Frequency::Morning => "Once daily - Morning",
            Frequency::Afternoon => "Once daily - Afternoon",
            Frequency::Night => "Once daily - Night",
            Frequency::TwiceDaily => "Twice daily",
            Frequency::ThriceDaily => "Thrice daily",
            Frequency::FourTimesDaily => "Four times daily",
        }
    }
}

/// When a dose is taken relative to food.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Timing {
    #[serde(rename = "Before Food")]
    BeforeFood,
    #[serde(rename = "After Food")]
    AfterFood,
    #[serde(rename = "With Food")]
    WithFood,
    #[serde(rename = "Empty Stomach")]
    EmptyStomach,
}

impl Timing {
    pub const ALL: [Timing; 4] = [
        Timing::BeforeFood,
        Timing::AfterFood,
        Timing::WithFood,
        Timing::EmptyStomach,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Timing::BeforeFood => "Before Food",
            Timing::AfterFood => "After Food",
            Timing::WithFood => "With Food",
            Timing::EmptyStomach => "Empty Stomach",
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        let lower = label.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|t| t.label().to_lowercase() == lower)
    }
}

/// Validity window of a medication: `(start, start + duration_days)`.
///
/// Calendar-day arithmetic. Returns `None` for a zero duration or a date
/// overflow.
pub fn validity_window(start: NaiveDate, duration_days: u32) -> Option<(NaiveDate, NaiveDate)> {
    if duration_days == 0 {
        return None;
    }
    let end = start.checked_add_days(Days::new(u64::from(duration_days)))?;
    Some((start, end))
}

/// A medication line ready to be persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewMedication {
    pub medicine_name: String,
    pub dosage: String,
    pub frequency: Frequency,
    pub timing: Timing,
    pub duration_days: u32,
    pub instructions: Option<String>,
}

/// A validated prescription, not yet stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComposedPrescription {
    pub diagnosis: String,
    pub notes: Option<String>,
    pub follow_up_date: Option<NaiveDate>,
    pub medications: Vec<NewMedication>,
}

/// A stored medication line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Medication {
    pub id: String,
    pub prescription_id: String,
    /// Display order within the prescription (0-based)
    pub position: u32,
    pub medicine_name: String,
    pub dosage: String,
    pub frequency: Frequency,
    pub timing: Timing,
    pub duration_days: u32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub instructions: Option<String>,
    pub created_at: String,
}

impl Medication {
    /// Active means the end date has not passed yet.
    pub fn is_active_on(&self, date: NaiveDate) -> bool {
        self.end_date >= date
    }
}

/// A stored prescription with its medication lines in display order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Prescription {
    pub id: String,
    pub patient_id: String,
    pub doctor_id: String,
    pub hospital_id: Option<String>,
    pub diagnosis: String,
    pub notes: Option<String>,
    pub prescription_date: NaiveDate,
    pub follow_up_date: Option<NaiveDate>,
    pub is_active: bool,
    pub created_at: String,
    pub medications: Vec<Medication>,
}

/// An active medication row belonging to a patient, as seen by the
/// duplicate checker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActiveMedication {
    pub medication_id: String,
    pub prescription_id: String,
    pub medicine_name: String,
    pub end_date: NaiveDate,
}
