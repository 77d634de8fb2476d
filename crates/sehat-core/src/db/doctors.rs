//! Doctor database operations.

use rusqlite::{params, OptionalExtension};

use super::{Database, DbResult};
use crate::models::Doctor;

impl Database {
    /// Insert a new doctor.
    pub fn insert_doctor(&self, doctor: &Doctor) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO doctors (
                id, full_name, specialization, qualification, license_number,
                hospital_id, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                doctor.id,
                doctor.full_name,
                doctor.specialization,
                doctor.qualification,
                doctor.license_number,
                doctor.hospital_id,
                doctor.is_active,
                doctor.created_at,
                doctor.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Get a doctor by ID.
    pub fn get_doctor(&self, id: &str) -> DbResult<Option<Doctor>> {
        let doctor = self
            .conn
            .query_row(
                r#"
                SELECT id, full_name, specialization, qualification, license_number,
                       hospital_id, is_active, created_at, updated_at
                FROM doctors WHERE id = ?
                "#,
                [id],
                |row| {
                    Ok(Doctor {
                        id: row.get(0)?,
                        full_name: row.get(1)?,
                        specialization: row.get(2)?,
                        qualification: row.get(3)?,
                        license_number: row.get(4)?,
                        hospital_id: row.get(5)?,
                        is_active: row.get(6)?,
                        created_at: row.get(7)?,
                        updated_at: row.get(8)?,
                    })
                },
            )
            .optional()?;
        Ok(doctor)
    }

    /// Mark a doctor inactive. Existing prescriptions keep referencing them.
    pub fn deactivate_doctor(&self, id: &str) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "UPDATE doctors SET is_active = 0, updated_at = datetime('now') WHERE id = ?",
            [id],
        )?;
        Ok(rows_affected > 0)
    }
}
