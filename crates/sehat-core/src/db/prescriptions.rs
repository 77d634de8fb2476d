//! Prescription and medication database operations.
//!
//! Rows in both tables are append-only. Writers go through
//! [`insert_prescription_row`] and [`insert_medication_row`] so that the
//! persister can run them inside a single transaction.

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};

use super::{date_from_sql, date_to_sql, Database, DbError, DbResult};
use crate::models::{ActiveMedication, Frequency, Medication, Prescription, Timing};

/// Insert the prescription header row.
pub(crate) fn insert_prescription_row(conn: &Connection, rx: &Prescription) -> DbResult<()> {
    conn.execute(
        r#"
        INSERT INTO prescriptions (
            id, patient_id, doctor_id, hospital_id, diagnosis, notes,
            prescription_date, follow_up_date, is_active, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)
        "#,
        params![
            rx.id,
            rx.patient_id,
            rx.doctor_id,
            rx.hospital_id,
            rx.diagnosis,
            rx.notes,
            date_to_sql(rx.prescription_date),
            rx.follow_up_date.map(date_to_sql),
            rx.is_active,
            rx.created_at,
        ],
    )?;
    Ok(())
}

/// Insert one medication line.
pub(crate) fn insert_medication_row(conn: &Connection, med: &Medication) -> DbResult<()> {
    conn.execute(
        r#"
        INSERT INTO medications (
            id, prescription_id, position, medicine_name, dosage, frequency, timing,
            duration_days, start_date, end_date, instructions, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
        "#,
        params![
            med.id,
            med.prescription_id,
            med.position,
            med.medicine_name,
            med.dosage,
            med.frequency.code(),
            med.timing.label(),
            med.duration_days,
            date_to_sql(med.start_date),
            date_to_sql(med.end_date),
            med.instructions,
            med.created_at,
        ],
    )?;
    Ok(())
}

/// Load a prescription's medication lines in display order.
fn load_medications(conn: &Connection, prescription_id: &str) -> DbResult<Vec<Medication>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT id, prescription_id, position, medicine_name, dosage, frequency, timing,
               duration_days, start_date, end_date, instructions, created_at
        FROM medications
        WHERE prescription_id = ?
        ORDER BY position
        "#,
    )?;

    let rows = stmt.query_map([prescription_id], |row| {
        Ok(MedicationRow {
            id: row.get(0)?,
            prescription_id: row.get(1)?,
            position: row.get(2)?,
            medicine_name: row.get(3)?,
            dosage: row.get(4)?,
            frequency: row.get(5)?,
            timing: row.get(6)?,
            duration_days: row.get(7)?,
            start_date: row.get(8)?,
            end_date: row.get(9)?,
            instructions: row.get(10)?,
            created_at: row.get(11)?,
        })
    })?;

    let mut medications = Vec::new();
    for row in rows {
        medications.push(row?.try_into()?);
    }
    Ok(medications)
}

const PRESCRIPTION_COLUMNS: &str = r#"
    id, patient_id, doctor_id, hospital_id, diagnosis, notes,
    prescription_date, follow_up_date, is_active, created_at
"#;

fn read_prescription_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PrescriptionRow> {
    Ok(PrescriptionRow {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        doctor_id: row.get(2)?,
        hospital_id: row.get(3)?,
        diagnosis: row.get(4)?,
        notes: row.get(5)?,
        prescription_date: row.get(6)?,
        follow_up_date: row.get(7)?,
        is_active: row.get(8)?,
        created_at: row.get(9)?,
    })
}

impl Database {
    /// Get a prescription with its medications ordered by position.
    pub fn get_prescription(&self, id: &str) -> DbResult<Option<Prescription>> {
        let sql = format!("SELECT {} FROM prescriptions WHERE id = ?", PRESCRIPTION_COLUMNS);
        let row = self
            .conn
            .query_row(&sql, [id], read_prescription_row)
            .optional()?;

        match row {
            Some(row) => {
                let medications = load_medications(&self.conn, &row.id)?;
                Ok(Some(row.into_prescription(medications)?))
            }
            None => Ok(None),
        }
    }

    /// List a patient's prescriptions, newest first.
    pub fn list_prescriptions_for_patient(
        &self,
        patient_id: &str,
        limit: Option<usize>,
    ) -> DbResult<Vec<Prescription>> {
        let sql = format!(
            r#"
            SELECT {} FROM prescriptions
            WHERE patient_id = ?1
            ORDER BY prescription_date DESC, created_at DESC, rowid DESC
            LIMIT ?2
            "#,
            PRESCRIPTION_COLUMNS
        );
        // SQLite treats a negative LIMIT as unbounded
        let limit = limit.map(|l| l as i64).unwrap_or(-1);

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![patient_id, limit], read_prescription_row)?;

        let mut headers = Vec::new();
        for row in rows {
            headers.push(row?);
        }

        let mut prescriptions = Vec::with_capacity(headers.len());
        for row in headers {
            let medications = load_medications(&self.conn, &row.id)?;
            prescriptions.push(row.into_prescription(medications)?);
        }
        Ok(prescriptions)
    }

    /// List a patient's medication lines still active on `on`
    /// (`end_date >= on`), latest end date first.
    pub fn list_active_medications(
        &self,
        patient_id: &str,
        on: NaiveDate,
    ) -> DbResult<Vec<ActiveMedication>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT m.id, m.prescription_id, m.medicine_name, m.end_date
            FROM medications m
            JOIN prescriptions p ON p.id = m.prescription_id
            WHERE p.patient_id = ?1
            AND p.is_active = 1
            AND m.end_date >= ?2
            ORDER BY m.end_date DESC, m.medicine_name
            "#,
        )?;

        let rows = stmt.query_map(params![patient_id, date_to_sql(on)], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut active = Vec::new();
        for row in rows {
            let (medication_id, prescription_id, medicine_name, end_date) = row?;
            active.push(ActiveMedication {
                medication_id,
                prescription_id,
                medicine_name,
                end_date: date_from_sql("end_date", &end_date)?,
            });
        }
        Ok(active)
    }
}

/// Intermediate row struct for database mapping.
struct PrescriptionRow {
    id: String,
    patient_id: String,
    doctor_id: String,
    hospital_id: Option<String>,
    diagnosis: String,
    notes: Option<String>,
    prescription_date: String,
    follow_up_date: Option<String>,
    is_active: bool,
    created_at: String,
}

impl PrescriptionRow {
    fn into_prescription(self, medications: Vec<Medication>) -> DbResult<Prescription> {
        Ok(Prescription {
            prescription_date: date_from_sql("prescription_date", &self.prescription_date)?,
            follow_up_date: self
                .follow_up_date
                .as_deref()
                .map(|d| date_from_sql("follow_up_date", d))
                .transpose()?,
            id: self.id,
            patient_id: self.patient_id,
            doctor_id: self.doctor_id,
            hospital_id: self.hospital_id,
            diagnosis: self.diagnosis,
            notes: self.notes,
            is_active: self.is_active,
            created_at: self.created_at,
            medications,
        })
    }
}

/// Intermediate row struct for database mapping.
struct MedicationRow {
    id: String,
    prescription_id: String,
    position: u32,
    medicine_name: String,
    dosage: String,
    frequency: String,
    timing: String,
    duration_days: u32,
    start_date: String,
    end_date: String,
    instructions: Option<String>,
    created_at: String,
}

impl TryFrom<MedicationRow> for Medication {
    type Error = DbError;

    fn try_from(row: MedicationRow) -> Result<Self, Self::Error> {
        let frequency = Frequency::parse(&row.frequency).ok_or_else(|| {
            DbError::Constraint(format!("Unknown frequency code: {}", row.frequency))
        })?;
        let timing = Timing::parse(&row.timing)
            .ok_or_else(|| DbError::Constraint(format!("Unknown timing: {}", row.timing)))?;

        Ok(Medication {
            start_date: date_from_sql("start_date", &row.start_date)?,
            end_date: date_from_sql("end_date", &row.end_date)?,
            id: row.id,
            prescription_id: row.prescription_id,
            position: row.position,
            medicine_name: row.medicine_name,
            dosage: row.dosage,
            frequency,
            timing,
            duration_days: row.duration_days,
            instructions: row.instructions,
            created_at: row.created_at,
        })
    }
}
