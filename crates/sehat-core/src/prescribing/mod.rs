//! Prescribing workflow.
//!
//! Pipeline: Composer (in memory) → Duplicate check (advisory) → Persister (one transaction)

mod composer;
mod duplicates;
mod normalizer;
mod persister;

pub use composer::*;
pub use duplicates::*;
pub use normalizer::*;
pub use persister::*;

use std::fmt;
use thiserror::Error;

use crate::db::DbError;

/// Prescribing errors.
#[derive(Error, Debug)]
pub enum PrescribingError {
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Invalid prescription: {}", describe_all(.0))]
    Invalid(Vec<ValidationError>),

    #[error("Patient not found: {0}")]
    PatientNotFound(String),

    #[error("Patient is inactive: {0}")]
    PatientInactive(String),

    #[error("Doctor not found: {0}")]
    DoctorNotFound(String),

    #[error("Doctor is inactive: {0}")]
    DoctorInactive(String),

    #[error("No medication line at position {0}")]
    NoSuchLine(usize),

    #[error("A duration of {0} days runs past the supported calendar")]
    DateOverflow(u32),

    #[error("Failed to write {step}: {source}")]
    WriteFailed { step: WriteStep, source: DbError },
}

pub type PrescribingResult<T> = Result<T, PrescribingError>;

/// The write that failed during submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStep {
    Prescription,
    Medication { position: u32 },
    Outbox,
    Commit,
}

impl fmt::Display for WriteStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteStep::Prescription => write!(f, "prescription"),
            WriteStep::Medication { position } => write!(f, "medication #{}", position + 1),
            WriteStep::Outbox => write!(f, "notification outbox"),
            WriteStep::Commit => write!(f, "commit"),
        }
    }
}

fn describe_all(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
