//! Transactional prescription persister.
//!
//! The prescription row, its medication rows and the email outbox row are
//! written inside one `BEGIN IMMEDIATE` transaction. Either all of them are
//! visible or none are.

use chrono::NaiveDate;
use rusqlite::OptionalExtension;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{validate_composed, PrescribingError, PrescribingResult, WriteStep};
use crate::db::{
    enqueue_notification, insert_medication_row, insert_prescription_row, Database, DbError,
    OutboxEntry,
};
use crate::models::{validity_window, ComposedPrescription, Medication, Prescription};

/// What a successful submission produced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PrescriptionReceipt {
    pub prescription_id: String,
    pub prescription_date: NaiveDate,
    pub medication_ids: Vec<String>,
    /// Outbox row queued for the patient's email, if they have one
    pub email_outbox_id: Option<String>,
}

/// Writes composed prescriptions.
pub struct PrescriptionPersister<'a> {
    db: &'a mut Database,
}

impl<'a> PrescriptionPersister<'a> {
    pub fn new(db: &'a mut Database) -> Self {
        Self { db }
    }

    /// Commit `composed` for `patient_id` by `doctor_id`, dated `today`.
    ///
    /// Every medication starts on `today` and ends `duration_days` calendar
    /// days later. Validation and the patient/doctor checks run before any
    /// write; a failed write rolls everything back and names the failing step.
    pub fn submit(
        &mut self,
        patient_id: &str,
        doctor_id: &str,
        composed: &ComposedPrescription,
        today: NaiveDate,
    ) -> PrescribingResult<PrescriptionReceipt> {
        validate_composed(composed).map_err(PrescribingError::Invalid)?;

        let prescription = build_prescription(patient_id, doctor_id, composed, today)?;

        let tx = self.db.write_transaction()?;

        let patient: Option<(bool, Option<String>, Option<String>)> = tx
            .query_row(
                "SELECT is_active, email, hospital_id FROM patients WHERE id = ?",
                [patient_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()
            .map_err(DbError::from)?;
        let (patient_active, patient_email, patient_hospital) =
            patient.ok_or_else(|| PrescribingError::PatientNotFound(patient_id.to_string()))?;
        if !patient_active {
            return Err(PrescribingError::PatientInactive(patient_id.to_string()));
        }

        let doctor: Option<(bool, Option<String>)> = tx
            .query_row(
                "SELECT is_active, hospital_id FROM doctors WHERE id = ?",
                [doctor_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(DbError::from)?;
        let (doctor_active, doctor_hospital) =
            doctor.ok_or_else(|| PrescribingError::DoctorNotFound(doctor_id.to_string()))?;
        if !doctor_active {
            return Err(PrescribingError::DoctorInactive(doctor_id.to_string()));
        }

        let prescription = Prescription {
            hospital_id: doctor_hospital.or(patient_hospital),
            ..prescription
        };

        insert_prescription_row(&tx, &prescription).map_err(|source| {
            PrescribingError::WriteFailed {
                step: WriteStep::Prescription,
                source,
            }
        })?;

        for med in &prescription.medications {
            insert_medication_row(&tx, med).map_err(|source| PrescribingError::WriteFailed {
                step: WriteStep::Medication {
                    position: med.position,
                },
                source,
            })?;
        }

        let email_outbox_id = match patient_email.as_deref().map(str::trim) {
            Some(email) if !email.is_empty() => {
                let entry = OutboxEntry::email(prescription.id.clone(), email.to_string());
                enqueue_notification(&tx, &entry).map_err(|source| {
                    PrescribingError::WriteFailed {
                        step: WriteStep::Outbox,
                        source,
                    }
                })?;
                Some(entry.id)
            }
            _ => None,
        };

        tx.commit().map_err(|e| {
            warn!(patient_id, error = %e, "Prescription commit failed");
            PrescribingError::WriteFailed {
                step: WriteStep::Commit,
                source: e.into(),
            }
        })?;

        info!(
            patient_id,
            doctor_id,
            prescription_id = %prescription.id,
            medications = prescription.medications.len(),
            "Prescription committed"
        );

        Ok(PrescriptionReceipt {
            prescription_id: prescription.id,
            prescription_date: today,
            medication_ids: prescription.medications.into_iter().map(|m| m.id).collect(),
            email_outbox_id,
        })
    }
}

/// Expand a composed prescription into rows with fresh ids and validity
/// windows.
fn build_prescription(
    patient_id: &str,
    doctor_id: &str,
    composed: &ComposedPrescription,
    today: NaiveDate,
) -> PrescribingResult<Prescription> {
    let now = chrono::Utc::now().to_rfc3339();
    let prescription_id = uuid::Uuid::new_v4().to_string();

    let mut medications = Vec::with_capacity(composed.medications.len());
    for (position, med) in composed.medications.iter().enumerate() {
        let (start_date, end_date) = validity_window(today, med.duration_days)
            .ok_or(PrescribingError::DateOverflow(med.duration_days))?;

        medications.push(Medication {
            id: uuid::Uuid::new_v4().to_string(),
            prescription_id: prescription_id.clone(),
            position: position as u32,
            medicine_name: med.medicine_name.clone(),
            dosage: med.dosage.clone(),
            frequency: med.frequency,
            timing: med.timing,
            duration_days: med.duration_days,
            start_date,
            end_date,
            instructions: med.instructions.clone(),
            created_at: now.clone(),
        });
    }

    Ok(Prescription {
        id: prescription_id,
        patient_id: patient_id.to_string(),
        doctor_id: doctor_id.to_string(),
        hospital_id: None,
        diagnosis: composed.diagnosis.trim().to_string(),
        notes: composed.notes.clone(),
        prescription_date: today,
        follow_up_date: composed.follow_up_date,
        is_active: true,
        created_at: now,
        medications,
    })
}
