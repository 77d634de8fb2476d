//! Doctor models.

use serde::{Deserialize, Serialize};

/// A prescribing doctor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Doctor {
    pub id: String,
    pub full_name: String,
    pub specialization: String,
    pub qualification: String,
    pub license_number: String,
    pub hospital_id: Option<String>,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl Doctor {
    pub fn new(full_name: String, specialization: String, license_number: String) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            full_name,
            specialization,
            qualification: String::new(),
            license_number,
            hospital_id: None,
            is_active: true,
            created_at: now.clone(),
            updated_at: now,
        }
    }
}
