//! Notification outbox.
//!
//! A row is written in the same transaction as its prescription. A delivery
//! first claims it (`pending` -> `sending`), so only one sender ever holds a
//! row, then records the outcome against that claim.

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use super::{Database, DbError, DbResult};

/// Delivery channel of an outbox row.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutboxChannel {
    Email,
}

impl OutboxChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutboxChannel::Email => "email",
        }
    }
}

/// Delivery state of an outbox row.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutboxStatus {
    Pending,
    /// Claimed by a delivery in flight
    Sending,
    Sent,
    Skipped,
    Failed,
}

/// One queued notification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutboxEntry {
    pub id: String,
    pub prescription_id: String,
    pub channel: OutboxChannel,
    pub recipient: String,
    pub status: OutboxStatus,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl OutboxEntry {
    /// Create a pending email notification for a prescription.
    pub fn email(prescription_id: String, recipient: String) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            prescription_id,
            channel: OutboxChannel::Email,
            recipient,
            status: OutboxStatus::Pending,
            attempts: 0,
            last_error: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }
}

/// Queue a notification. Takes a bare connection so it can join the
/// prescription's transaction.
pub(crate) fn enqueue_notification(conn: &Connection, entry: &OutboxEntry) -> DbResult<()> {
    conn.execute(
        r#"
        INSERT INTO notification_outbox (
            id, prescription_id, channel, recipient, status, attempts, last_error,
            created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
        params![
            entry.id,
            entry.prescription_id,
            entry.channel.as_str(),
            entry.recipient,
            status_to_string(entry.status),
            entry.attempts,
            entry.last_error,
            entry.created_at,
            entry.updated_at,
        ],
    )?;
    Ok(())
}

const OUTBOX_COLUMNS: &str = r#"
    id, prescription_id, channel, recipient, status, attempts, last_error,
    created_at, updated_at
"#;

impl Database {
    /// Get an outbox row by ID.
    pub fn get_notification(&self, id: &str) -> DbResult<Option<OutboxEntry>> {
        let sql = format!("SELECT {} FROM notification_outbox WHERE id = ?", OUTBOX_COLUMNS);
        self.conn
            .query_row(&sql, [id], read_outbox_row)
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// Pending rows that have been tried fewer than `max_attempts` times,
    /// oldest first.
    pub fn list_pending_notifications(&self, max_attempts: u32) -> DbResult<Vec<OutboxEntry>> {
        let sql = format!(
            r#"
            SELECT {} FROM notification_outbox
            WHERE status = 'pending' AND attempts < ?
            ORDER BY created_at, rowid
            "#,
            OUTBOX_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([max_attempts], read_outbox_row)?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?.try_into()?);
        }
        Ok(entries)
    }

    /// All outbox rows for a prescription.
    pub fn notifications_for_prescription(
        &self,
        prescription_id: &str,
    ) -> DbResult<Vec<OutboxEntry>> {
        let sql = format!(
            "SELECT {} FROM notification_outbox WHERE prescription_id = ? ORDER BY created_at, rowid",
            OUTBOX_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([prescription_id], read_outbox_row)?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?.try_into()?);
        }
        Ok(entries)
    }

    /// Claim a pending row for delivery. Returns `false` when the row is
    /// missing or another delivery already claimed or finished it.
    pub fn claim_notification(&self, id: &str) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE notification_outbox SET
                status = 'sending',
                updated_at = datetime('now')
            WHERE id = ?1 AND status = 'pending'
            "#,
            [id],
        )?;
        Ok(rows_affected > 0)
    }

    /// Record the outcome of a claimed delivery: bumps `attempts`, sets the
    /// new status and the error of this attempt (cleared on success).
    /// Returns `false` if the row is not currently claimed.
    pub fn record_delivery_attempt(
        &self,
        id: &str,
        status: OutboxStatus,
        error: Option<&str>,
    ) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE notification_outbox SET
                status = ?2,
                attempts = attempts + 1,
                last_error = ?3,
                updated_at = datetime('now')
            WHERE id = ?1 AND status = 'sending'
            "#,
            params![id, status_to_string(status), error],
        )?;
        Ok(rows_affected > 0)
    }

    /// Put rows left claimed by an interrupted process back in the queue.
    /// Only safe before any dispatcher for this database is running.
    pub fn requeue_interrupted_notifications(&self) -> DbResult<usize> {
        Ok(self.conn.execute(
            r#"
            UPDATE notification_outbox SET
                status = 'pending',
                updated_at = datetime('now')
            WHERE status = 'sending'
            "#,
            [],
        )?)
    }
}

fn status_to_string(status: OutboxStatus) -> &'static str {
    match status {
        OutboxStatus::Pending => "pending",
        OutboxStatus::Sending => "sending",
        OutboxStatus::Sent => "sent",
        OutboxStatus::Skipped => "skipped",
        OutboxStatus::Failed => "failed",
    }
}

fn string_to_status(s: &str) -> DbResult<OutboxStatus> {
    match s {
        "pending" => Ok(OutboxStatus::Pending),
        "sending" => Ok(OutboxStatus::Sending),
        "sent" => Ok(OutboxStatus::Sent),
        "skipped" => Ok(OutboxStatus::Skipped),
        "failed" => Ok(OutboxStatus::Failed),
        _ => Err(DbError::Constraint(format!("Unknown outbox status: {}", s))),
    }
}

/// Intermediate row struct for database mapping.
struct OutboxRow {
    id: String,
    prescription_id: String,
    channel: String,
    recipient: String,
    status: String,
    attempts: u32,
    last_error: Option<String>,
    created_at: String,
    updated_at: String,
}

fn read_outbox_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<OutboxRow> {
    Ok(OutboxRow {
        id: row.get(0)?,
        prescription_id: row.get(1)?,
        channel: row.get(2)?,
        recipient: row.get(3)?,
        status: row.get(4)?,
        attempts: row.get(5)?,
        last_error: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

impl TryFrom<OutboxRow> for OutboxEntry {
    type Error = DbError;

    fn try_from(row: OutboxRow) -> Result<Self, Self::Error> {
        let channel = match row.channel.as_str() {
            "email" => OutboxChannel::Email,
            other => {
                return Err(DbError::Constraint(format!("Unknown outbox channel: {}", other)))
            }
        };

        Ok(OutboxEntry {
            status: string_to_status(&row.status)?,
            id: row.id,
            prescription_id: row.prescription_id,
            channel,
            recipient: row.recipient,
            attempts: row.attempts,
            last_error: row.last_error,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.conn()
            .execute_batch(
                r#"
                INSERT INTO patients (id, mrn, full_name, gender, date_of_birth, mobile)
                VALUES ('p1', 'MRN00000001', 'Asha', 'female', '1990-01-01', '9876543210');
                INSERT INTO doctors (id, full_name, specialization, license_number)
                VALUES ('d1', 'Rao', 'General Medicine', 'KMC-1');
                INSERT INTO prescriptions (id, patient_id, doctor_id, diagnosis, prescription_date)
                VALUES ('rx1', 'p1', 'd1', 'Viral Fever', '2025-11-15');
                "#,
            )
            .unwrap();
        db
    }

    #[test]
    fn test_enqueue_and_list_pending() {
        let db = seeded();
        let entry = OutboxEntry::email("rx1".into(), "asha@example.com".into());
        enqueue_notification(db.conn(), &entry).unwrap();

        let pending = db.list_pending_notifications(3).unwrap();
        assert_eq!(pending, vec![entry.clone()]);

        let for_rx = db.notifications_for_prescription("rx1").unwrap();
        assert_eq!(for_rx.len(), 1);
        assert_eq!(for_rx[0].channel, OutboxChannel::Email);
    }

    #[test]
    fn test_attempts_limit_pending_list() {
        let db = seeded();
        let entry = OutboxEntry::email("rx1".into(), "asha@example.com".into());
        enqueue_notification(db.conn(), &entry).unwrap();

        for _ in 0..2 {
            assert!(db.claim_notification(&entry.id).unwrap());
            db.record_delivery_attempt(&entry.id, OutboxStatus::Pending, Some("timeout"))
                .unwrap();
        }

        let row = db.get_notification(&entry.id).unwrap().unwrap();
        assert_eq!(row.attempts, 2);
        assert_eq!(row.last_error.as_deref(), Some("timeout"));

        assert_eq!(db.list_pending_notifications(3).unwrap().len(), 1);
        assert!(db.list_pending_notifications(2).unwrap().is_empty());
    }

    #[test]
    fn test_sent_rows_leave_pending_list() {
        let db = seeded();
        let entry = OutboxEntry::email("rx1".into(), "asha@example.com".into());
        enqueue_notification(db.conn(), &entry).unwrap();

        assert!(db.claim_notification(&entry.id).unwrap());
        assert!(db
            .record_delivery_attempt(&entry.id, OutboxStatus::Sent, None)
            .unwrap());
        assert!(db.list_pending_notifications(5).unwrap().is_empty());

        let row = db.get_notification(&entry.id).unwrap().unwrap();
        assert_eq!(row.status, OutboxStatus::Sent);
        assert_eq!(row.last_error, None);
    }

    #[test]
    fn test_claim_is_exclusive() {
        let db = seeded();
        let entry = OutboxEntry::email("rx1".into(), "asha@example.com".into());
        enqueue_notification(db.conn(), &entry).unwrap();

        assert!(db.claim_notification(&entry.id).unwrap());
        assert!(!db.claim_notification(&entry.id).unwrap());
        assert!(db.list_pending_notifications(5).unwrap().is_empty());
        assert!(!db.claim_notification("missing").unwrap());
    }

    #[test]
    fn test_outcome_needs_a_claim() {
        let db = seeded();
        let entry = OutboxEntry::email("rx1".into(), "asha@example.com".into());
        enqueue_notification(db.conn(), &entry).unwrap();

        // Unclaimed rows are not touched
        assert!(!db
            .record_delivery_attempt(&entry.id, OutboxStatus::Sent, None)
            .unwrap());

        assert!(db.claim_notification(&entry.id).unwrap());
        assert!(db
            .record_delivery_attempt(&entry.id, OutboxStatus::Sent, None)
            .unwrap());

        // A late failure cannot overwrite the delivered row
        assert!(!db
            .record_delivery_attempt(&entry.id, OutboxStatus::Failed, Some("timeout"))
            .unwrap());
        let row = db.get_notification(&entry.id).unwrap().unwrap();
        assert_eq!(row.status, OutboxStatus::Sent);
        assert_eq!(row.attempts, 1);
        assert_eq!(row.last_error, None);
    }

    #[test]
    fn test_requeue_interrupted() {
        let db = seeded();
        let entry = OutboxEntry::email("rx1".into(), "asha@example.com".into());
        enqueue_notification(db.conn(), &entry).unwrap();
        db.claim_notification(&entry.id).unwrap();

        assert_eq!(db.requeue_interrupted_notifications().unwrap(), 1);
        assert_eq!(db.list_pending_notifications(3).unwrap().len(), 1);
        assert_eq!(db.requeue_interrupted_notifications().unwrap(), 0);
    }

    #[test]
    fn test_status_conversion() {
        for status in [
            OutboxStatus::Pending,
            OutboxStatus::Sending,
            OutboxStatus::Sent,
            OutboxStatus::Skipped,
            OutboxStatus::Failed,
        ] {
            assert_eq!(string_to_status(status_to_string(status)).unwrap(), status);
        }
        assert!(string_to_status("bounced").is_err());
    }
}
