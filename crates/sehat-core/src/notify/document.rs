//! The prescription as seen by every notification channel.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use sehat_assistant::{MedicationBrief, PrescriptionBrief};

use crate::models::{Doctor, Patient, Prescription};

/// One medication row as printed or messaged.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentMedication {
    pub medicine_name: String,
    pub dosage: String,
    /// Dose-timing code, e.g. `1-0-1`
    pub frequency: String,
    pub timing: String,
    pub duration_days: u32,
    pub instructions: Option<String>,
}

/// Everything the PDF, email and share channels need about one persisted
/// prescription.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PrescriptionDocument {
    pub prescription_id: String,
    pub patient_name: String,
    pub patient_mrn: String,
    pub patient_age: u32,
    pub patient_gender: String,
    pub patient_mobile: String,
    pub patient_email: Option<String>,
    pub doctor_name: String,
    pub diagnosis: String,
    pub notes: Option<String>,
    pub prescription_date: NaiveDate,
    pub follow_up_date: Option<NaiveDate>,
    pub medications: Vec<DocumentMedication>,
}

impl PrescriptionDocument {
    pub fn from_records(prescription: &Prescription, patient: &Patient, doctor: &Doctor) -> Self {
        Self {
            prescription_id: prescription.id.clone(),
            patient_name: patient.full_name.clone(),
            patient_mrn: patient.mrn.clone(),
            patient_age: patient.age_on(prescription.prescription_date),
            patient_gender: capitalize(patient.gender.as_str()),
            patient_mobile: patient.mobile.clone(),
            patient_email: patient.contact_email().map(String::from),
            doctor_name: doctor.full_name.clone(),
            diagnosis: prescription.diagnosis.clone(),
            notes: prescription.notes.clone(),
            prescription_date: prescription.prescription_date,
            follow_up_date: prescription.follow_up_date,
            medications: prescription
                .medications
                .iter()
                .map(|m| DocumentMedication {
                    medicine_name: m.medicine_name.clone(),
                    dosage: m.dosage.clone(),
                    frequency: m.frequency.code().to_string(),
                    timing: m.timing.label().to_string(),
                    duration_days: m.duration_days,
                    instructions: m.instructions.clone(),
                })
                .collect(),
        }
    }

    /// Prescription date as printed for patients (`DD/MM/YYYY`).
    pub fn display_date(&self) -> String {
        display_date(self.prescription_date)
    }

    /// Summary handed to the health assistant.
    pub fn brief(&self) -> PrescriptionBrief {
        PrescriptionBrief {
            patient_name: self.patient_name.clone(),
            diagnosis: self.diagnosis.clone(),
            notes: self.notes.clone(),
            medications: self
                .medications
                .iter()
                .map(|m| MedicationBrief {
                    medicine_name: m.medicine_name.clone(),
                    dosage: m.dosage.clone(),
                    frequency: m.frequency.clone(),
                    timing: m.timing.clone(),
                    duration_days: m.duration_days,
                    instructions: m.instructions.clone(),
                })
                .collect(),
        }
    }
}

/// Format a date the way Indian patients read it.
pub fn display_date(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Frequency, Gender, Medication, Timing};

    #[test]
    fn test_from_records() {
        let mut patient = Patient::new(
            "Asha Verma".into(),
            Gender::Female,
            NaiveDate::from_ymd_opt(1990, 11, 16).unwrap(),
            "9876543210".into(),
        );
        patient.email = Some("asha@example.com".into());
        let doctor = Doctor::new("Anil Rao".into(), "General Medicine".into(), "KMC-1".into());
        let date = NaiveDate::from_ymd_opt(2025, 11, 15).unwrap();
        let prescription = Prescription {
            id: "rx1".into(),
            patient_id: patient.id.clone(),
            doctor_id: doctor.id.clone(),
            hospital_id: None,
            diagnosis: "Viral Fever".into(),
            notes: None,
            prescription_date: date,
            follow_up_date: None,
            is_active: true,
            created_at: String::new(),
            medications: vec![Medication {
                id: "m1".into(),
                prescription_id: "rx1".into(),
                position: 0,
                medicine_name: "Paracetamol".into(),
                dosage: "500mg".into(),
                frequency: Frequency::TwiceDaily,
                timing: Timing::AfterFood,
                duration_days: 5,
                start_date: date,
                end_date: NaiveDate::from_ymd_opt(2025, 11, 20).unwrap(),
                instructions: None,
                created_at: String::new(),
            }],
        };

        let doc = PrescriptionDocument::from_records(&prescription, &patient, &doctor);
        // Birthday falls the day after the prescription
        assert_eq!(doc.patient_age, 34);
        assert_eq!(doc.patient_gender, "Female");
        assert_eq!(doc.patient_email.as_deref(), Some("asha@example.com"));
        assert_eq!(doc.medications[0].frequency, "1-0-1");
        assert_eq!(doc.medications[0].timing, "After Food");
        assert_eq!(doc.display_date(), "15/11/2025");
    }

    #[test]
    fn test_brief_carries_medications() {
        let brief = fixtures::viral_fever().brief();
        assert_eq!(brief.diagnosis, "Viral Fever");
        assert_eq!(brief.medications.len(), 2);
        assert_eq!(brief.medications[1].medicine_name, "ORS");
        assert_eq!(brief.medications[1].instructions, None);
    }
}
