//! Stored assistant interactions.

use serde::{Deserialize, Serialize};

/// One question/answer exchange with the health assistant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AiInteraction {
    pub id: String,
    pub patient_id: Option<String>,
    pub query: String,
    pub response: String,
    pub is_red_flag: bool,
    pub language: String,
    pub created_at: String,
}

impl AiInteraction {
    pub fn new(
        patient_id: Option<String>,
        query: String,
        response: String,
        is_red_flag: bool,
        language: String,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            patient_id,
            query,
            response,
            is_red_flag,
            language,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}
