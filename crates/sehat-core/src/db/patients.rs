//! Patient database operations.

use rusqlite::{params, OptionalExtension, Row};

use super::{date_from_sql, date_to_sql, Database, DbError, DbResult};
use crate::models::{Gender, Patient};

const PATIENT_COLUMNS: &str = r#"
    id, mrn, full_name, gender, date_of_birth, mobile, email, address,
    allergies, blood_group, emergency_contact_name, emergency_contact_mobile,
    hospital_id, assigned_doctor_id, is_discharged, discharge_date, is_active,
    created_at, updated_at
"#;

impl Database {
    /// Insert a new patient.
    pub fn insert_patient(&self, patient: &Patient) -> DbResult<()> {
        let allergies_json = serde_json::to_string(&patient.allergies)?;

        self.conn.execute(
            r#"
            INSERT INTO patients (
                id, mrn, full_name, gender, date_of_birth, mobile, email, address,
                allergies, blood_group, emergency_contact_name, emergency_contact_mobile,
                hospital_id, assigned_doctor_id, is_discharged, discharge_date, is_active,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)
            "#,
            params![
                patient.id,
                patient.mrn,
                patient.full_name,
                patient.gender.as_str(),
                date_to_sql(patient.date_of_birth),
                patient.mobile,
                patient.email,
                patient.address,
                allergies_json,
                patient.blood_group,
                patient.emergency_contact_name,
                patient.emergency_contact_mobile,
                patient.hospital_id,
                patient.assigned_doctor_id,
                patient.is_discharged,
                patient.discharge_date,
                patient.is_active,
                patient.created_at,
                patient.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Update the mutable contact and medical fields of a patient.
    ///
    /// Identity fields (`mrn`, `date_of_birth`, `gender`) are left untouched.
    pub fn update_patient(&self, patient: &Patient) -> DbResult<bool> {
        let allergies_json = serde_json::to_string(&patient.allergies)?;

        let rows_affected = self.conn.execute(
            r#"
            UPDATE patients SET
                full_name = ?2,
                mobile = ?3,
                email = ?4,
                address = ?5,
                allergies = ?6,
                blood_group = ?7,
                emergency_contact_name = ?8,
                emergency_contact_mobile = ?9,
                hospital_id = ?10,
                assigned_doctor_id = ?11,
                updated_at = datetime('now')
            WHERE id = ?1
            "#,
            params![
                patient.id,
                patient.full_name,
                patient.mobile,
                patient.email,
                patient.address,
                allergies_json,
                patient.blood_group,
                patient.emergency_contact_name,
                patient.emergency_contact_mobile,
                patient.hospital_id,
                patient.assigned_doctor_id,
            ],
        )?;
        Ok(rows_affected > 0)
    }

    /// Get a patient by internal ID.
    pub fn get_patient(&self, id: &str) -> DbResult<Option<Patient>> {
        let sql = format!("SELECT {} FROM patients WHERE id = ?", PATIENT_COLUMNS);
        self.conn
            .query_row(&sql, [id], read_patient_row)
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// Get a patient by Medical Record Number.
    pub fn get_patient_by_mrn(&self, mrn: &str) -> DbResult<Option<Patient>> {
        let sql = format!("SELECT {} FROM patients WHERE mrn = ?", PATIENT_COLUMNS);
        self.conn
            .query_row(&sql, [mrn], read_patient_row)
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// Search patients by name, MRN or mobile (case-insensitive substring).
    pub fn search_patients(&self, query: &str, limit: usize) -> DbResult<Vec<Patient>> {
        let pattern = format!("%{}%", query.trim());
        let sql = format!(
            r#"
            SELECT {} FROM patients
            WHERE full_name LIKE ?1 OR mrn LIKE ?1 OR mobile LIKE ?1
            ORDER BY full_name
            LIMIT ?2
            "#,
            PATIENT_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![pattern, limit as i64], read_patient_row)?;

        let mut patients = Vec::new();
        for row in rows {
            patients.push(row?.try_into()?);
        }
        Ok(patients)
    }

    /// List active patients.
    pub fn list_active_patients(&self) -> DbResult<Vec<Patient>> {
        let sql = format!(
            "SELECT {} FROM patients WHERE is_active = 1 ORDER BY full_name",
            PATIENT_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], read_patient_row)?;

        let mut patients = Vec::new();
        for row in rows {
            patients.push(row?.try_into()?);
        }
        Ok(patients)
    }

    /// Mark a patient discharged, recording the discharge timestamp.
    pub fn discharge_patient(&self, id: &str, discharged_at: &str) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE patients SET is_discharged = 1, discharge_date = ?2, updated_at = datetime('now')
            WHERE id = ?1
            "#,
            params![id, discharged_at],
        )?;
        Ok(rows_affected > 0)
    }

    /// Soft-delete a patient.
    pub fn deactivate_patient(&self, id: &str) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "UPDATE patients SET is_active = 0, updated_at = datetime('now') WHERE id = ?",
            [id],
        )?;
        Ok(rows_affected > 0)
    }
}

/// Intermediate row struct for database mapping.
struct PatientRow {
    id: String,
    mrn: String,
    full_name: String,
    gender: String,
    date_of_birth: String,
    mobile: String,
    email: Option<String>,
    address: Option<String>,
    allergies: String,
    blood_group: Option<String>,
    emergency_contact_name: Option<String>,
    emergency_contact_mobile: Option<String>,
    hospital_id: Option<String>,
    assigned_doctor_id: Option<String>,
    is_discharged: bool,
    discharge_date: Option<String>,
    is_active: bool,
    created_at: String,
    updated_at: String,
}

fn read_patient_row(row: &Row<'_>) -> rusqlite::Result<PatientRow> {
    Ok(PatientRow {
        id: row.get(0)?,
        mrn: row.get(1)?,
        full_name: row.get(2)?,
        gender: row.get(3)?,
        date_of_birth: row.get(4)?,
        mobile: row.get(5)?,
        email: row.get(6)?,
        address: row.get(7)?,
        allergies: row.get(8)?,
        blood_group: row.get(9)?,
        emergency_contact_name: row.get(10)?,
        emergency_contact_mobile: row.get(11)?,
        hospital_id: row.get(12)?,
        assigned_doctor_id: row.get(13)?,
        is_discharged: row.get(14)?,
        discharge_date: row.get(15)?,
        is_active: row.get(16)?,
        created_at: row.get(17)?,
        updated_at: row.get(18)?,
    })
}

impl TryFrom<PatientRow> for Patient {
    type Error = DbError;

    fn try_from(row: PatientRow) -> Result<Self, Self::Error> {
        let gender = Gender::parse(&row.gender)
            .ok_or_else(|| DbError::Constraint(format!("Unknown gender: {}", row.gender)))?;

        Ok(Patient {
            date_of_birth: date_from_sql("date_of_birth", &row.date_of_birth)?,
            allergies: serde_json::from_str(&row.allergies)?,
            id: row.id,
            mrn: row.mrn,
            full_name: row.full_name,
            gender,
            mobile: row.mobile,
            email: row.email,
            address: row.address,
            blood_group: row.blood_group,
            emergency_contact_name: row.emergency_contact_name,
            emergency_contact_mobile: row.emergency_contact_mobile,
            hospital_id: row.hospital_id,
            assigned_doctor_id: row.assigned_doctor_id,
            is_discharged: row.is_discharged,
            discharge_date: row.discharge_date,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn setup_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn patient(name: &str, mobile: &str) -> Patient {
        Patient::new(
            name.into(),
            Gender::Female,
            NaiveDate::from_ymd_opt(1988, 3, 9).unwrap(),
            mobile.into(),
        )
    }

    #[test]
    fn test_insert_and_get() {
        let db = setup_db();

        let mut p = patient("Asha Verma", "9876543210");
        p.allergies = vec!["Penicillin".into()];
        p.blood_group = Some("B+".into());
        p.email = Some("asha@example.com".into());
        db.insert_patient(&p).unwrap();

        let retrieved = db.get_patient(&p.id).unwrap().unwrap();
        assert_eq!(retrieved, p);

        let by_mrn = db.get_patient_by_mrn(&p.mrn).unwrap().unwrap();
        assert_eq!(by_mrn.id, p.id);
    }

    #[test]
    fn test_update_keeps_identity() {
        let db = setup_db();

        let mut p = patient("Asha Verma", "9876543210");
        db.insert_patient(&p).unwrap();
        let original_mrn = p.mrn.clone();

        p.mobile = "9000000000".into();
        p.allergies = vec!["Sulfa".into()];
        p.mrn = "MRNTAMPERED".into();
        assert!(db.update_patient(&p).unwrap());

        let retrieved = db.get_patient(&p.id).unwrap().unwrap();
        assert_eq!(retrieved.mobile, "9000000000");
        assert_eq!(retrieved.allergies, vec!["Sulfa".to_string()]);
        assert_eq!(retrieved.mrn, original_mrn);
    }

    #[test]
    fn test_search_patients() {
        let db = setup_db();

        let p1 = patient("Ravi Kumar", "9811111111");
        let p2 = patient("Ravina Shah", "9822222222");
        let p3 = patient("Meena Iyer", "9833333333");
        db.insert_patient(&p1).unwrap();
        db.insert_patient(&p2).unwrap();
        db.insert_patient(&p3).unwrap();

        let results = db.search_patients("ravi", 10).unwrap();
        assert_eq!(results.len(), 2);

        let by_mobile = db.search_patients("33333", 10).unwrap();
        assert_eq!(by_mobile.len(), 1);
        assert_eq!(by_mobile[0].full_name, "Meena Iyer");

        let by_mrn = db.search_patients(&p1.mrn, 10).unwrap();
        assert_eq!(by_mrn[0].id, p1.id);
    }

    #[test]
    fn test_discharge_and_deactivate() {
        let db = setup_db();
        let p = patient("Ravi Kumar", "9811111111");
        db.insert_patient(&p).unwrap();

        assert!(db.discharge_patient(&p.id, "2025-11-20T10:00:00+00:00").unwrap());
        let retrieved = db.get_patient(&p.id).unwrap().unwrap();
        assert!(retrieved.is_discharged);
        assert_eq!(retrieved.discharge_date.as_deref(), Some("2025-11-20T10:00:00+00:00"));

        assert!(db.deactivate_patient(&p.id).unwrap());
        assert!(db.list_active_patients().unwrap().is_empty());
        // Soft delete keeps the row
        assert!(db.get_patient(&p.id).unwrap().is_some());
    }
}
