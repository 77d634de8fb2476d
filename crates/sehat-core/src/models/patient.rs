//! Patient models.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Administrative gender as recorded at registration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "male" | "m" => Some(Gender::Male),
            "female" | "f" => Some(Gender::Female),
            "other" | "o" => Some(Gender::Other),
            _ => None,
        }
    }
}

/// A registered patient.
///
/// `id`, `mrn` and `date_of_birth` never change after registration. Patients
/// are soft-deactivated through `is_active`, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Patient {
    /// Internal UUID
    pub id: String,
    /// Medical Record Number shown to humans
    pub mrn: String,
    pub full_name: String,
    pub gender: Gender,
    pub date_of_birth: NaiveDate,
    pub mobile: String,
    pub email: Option<String>,
    pub address: Option<String>,
    pub allergies: Vec<String>,
    pub blood_group: Option<String>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_mobile: Option<String>,
    pub hospital_id: Option<String>,
    pub assigned_doctor_id: Option<String>,
    pub is_discharged: bool,
    /// Discharge timestamp (RFC 3339)
    pub discharge_date: Option<String>,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl Patient {
    /// Create a new active patient with a freshly generated id and MRN.
    pub fn new(full_name: String, gender: Gender, date_of_birth: NaiveDate, mobile: String) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        let id = uuid::Uuid::new_v4();
        Self {
            id: id.to_string(),
            mrn: mrn_from_uuid(&id),
            full_name,
            gender,
            date_of_birth,
            mobile,
            email: None,
            address: None,
            allergies: Vec::new(),
            blood_group: None,
            emergency_contact_name: None,
            emergency_contact_mobile: None,
            hospital_id: None,
            assigned_doctor_id: None,
            is_discharged: false,
            discharge_date: None,
            is_active: true,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Completed years of age on the given date.
    pub fn age_on(&self, date: NaiveDate) -> u32 {
        let dob = self.date_of_birth;
        if date < dob {
            return 0;
        }
        let mut years = date.year() - dob.year();
        if (date.month(), date.day()) < (dob.month(), dob.day()) {
            years -= 1;
        }
        years.max(0) as u32
    }

    /// Email address if one is recorded and non-blank.
    pub fn contact_email(&self) -> Option<&str> {
        self.email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
    }

    /// Mobile number reduced to its digits (for wa.me links).
    pub fn mobile_digits(&self) -> String {
        self.mobile.chars().filter(|c| c.is_ascii_digit()).collect()
    }
}

fn mrn_from_uuid(id: &uuid::Uuid) -> String {
    let simple = id.simple().to_string().to_uppercase();
    format!("MRN{}", &simple[..8])
}
