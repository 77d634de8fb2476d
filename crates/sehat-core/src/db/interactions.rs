//! Assistant interaction log.

use rusqlite::params;

use super::{Database, DbResult};
use crate::models::AiInteraction;

impl Database {
    /// Record one assistant exchange.
    pub fn insert_ai_interaction(&self, interaction: &AiInteraction) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO ai_interactions (
                id, patient_id, query, response, is_red_flag, language, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                interaction.id,
                interaction.patient_id,
                interaction.query,
                interaction.response,
                interaction.is_red_flag,
                interaction.language,
                interaction.created_at,
            ],
        )?;
        Ok(())
    }

    /// List a patient's assistant exchanges, newest first.
    pub fn list_interactions_for_patient(&self, patient_id: &str) -> DbResult<Vec<AiInteraction>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, patient_id, query, response, is_red_flag, language, created_at
            FROM ai_interactions
            WHERE patient_id = ?
            ORDER BY created_at DESC, rowid DESC
            "#,
        )?;

        let rows = stmt.query_map([patient_id], |row| {
            Ok(AiInteraction {
                id: row.get(0)?,
                patient_id: row.get(1)?,
                query: row.get(2)?,
                response: row.get(3)?,
                is_red_flag: row.get(4)?,
                language: row.get(5)?,
                created_at: row.get(6)?,
            })
        })?;

        let mut interactions = Vec::new();
        for row in rows {
            interactions.push(row?);
        }
        Ok(interactions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Gender, Patient};
    use chrono::NaiveDate;

    #[test]
    fn test_interactions_listed_newest_first() {
        let db = Database::open_in_memory().unwrap();
        let patient = Patient::new(
            "Asha Verma".into(),
            Gender::Female,
            NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
            "9876543210".into(),
        );
        db.insert_patient(&patient).unwrap();

        let mut first = AiInteraction::new(
            Some(patient.id.clone()),
            "What is paracetamol for?".into(),
            "Fever and pain.".into(),
            false,
            "english".into(),
        );
        first.created_at = "2025-11-15T09:00:00+00:00".into();
        let mut second = AiInteraction::new(
            Some(patient.id.clone()),
            "I have chest pain".into(),
            "Seek emergency care.".into(),
            true,
            "english".into(),
        );
        second.created_at = "2025-11-15T10:00:00+00:00".into();

        db.insert_ai_interaction(&first).unwrap();
        db.insert_ai_interaction(&second).unwrap();

        let listed = db.list_interactions_for_patient(&patient.id).unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, second.id);
        assert!(listed[0].is_red_flag);
    }
}
