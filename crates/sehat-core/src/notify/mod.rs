//! Notification fan-out.
//!
//! After a prescription is committed it can be delivered through three
//! independent channels: PDF ([`pdf`]), email ([`email`]) and pre-filled share
//! links ([`share`]). None of them touches stored prescription data, and a
//! failure in one never affects the others.
//!
//! Email goes through the notification outbox: the persister queues a row in
//! the prescription's transaction, and [`NotificationDispatcher`] claims it,
//! delivers it and records the outcome. A claimed row is never sent by a
//! second caller.

pub mod document;
pub mod email;
pub mod pdf;
pub mod share;

pub use document::{DocumentMedication, PrescriptionDocument};
pub use email::{
    EmailConfig, EmailJsTransport, EmailTransport, MockTransport, OutgoingEmail, PatientWelcomeEmail,
    PrescriptionEmail, PrescriptionMailer,
};

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::db::{Database, DbError, OutboxEntry, OutboxStatus};

/// Notification errors.
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PDF error: {0}")]
    Pdf(String),

    #[error("Email provider error ({status}): {message}")]
    Provider { status: u16, message: String },

    #[error("Timed out after {0}s")]
    Timeout(u64),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database lock poisoned")]
    LockPoisoned,
}

pub type NotifyResult<T> = Result<T, NotifyError>;

/// Result of one delivery attempt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "outcome", content = "reason", rename_all = "lowercase")]
pub enum DeliveryOutcome {
    Sent,
    /// Nothing to do: channel not configured or no recipient
    Skipped(String),
    Failed(String),
}

impl DeliveryOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, DeliveryOutcome::Sent)
    }

    /// Outcome already recorded on a settled outbox row.
    fn recorded(entry: &OutboxEntry) -> Self {
        let reason = || {
            entry
                .last_error
                .clone()
                .unwrap_or_else(|| format!("notification {:?}", entry.status).to_lowercase())
        };
        match entry.status {
            OutboxStatus::Sent => DeliveryOutcome::Sent,
            OutboxStatus::Skipped => DeliveryOutcome::Skipped(reason()),
            OutboxStatus::Pending | OutboxStatus::Sending | OutboxStatus::Failed => {
                DeliveryOutcome::Failed(reason())
            }
        }
    }
}

/// Load everything the channels need about a persisted prescription.
pub fn load_document(db: &Database, prescription_id: &str) -> NotifyResult<PrescriptionDocument> {
    let prescription = db
        .get_prescription(prescription_id)?
        .ok_or_else(|| NotifyError::NotFound(format!("prescription {}", prescription_id)))?;
    let patient = db
        .get_patient(&prescription.patient_id)?
        .ok_or_else(|| NotifyError::NotFound(format!("patient {}", prescription.patient_id)))?;
    let doctor = db
        .get_doctor(&prescription.doctor_id)?
        .ok_or_else(|| NotifyError::NotFound(format!("doctor {}", prescription.doctor_id)))?;
    Ok(PrescriptionDocument::from_records(&prescription, &patient, &doctor))
}

/// Default number of delivery attempts per outbox row.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

const SETTLE_POLL: Duration = Duration::from_millis(20);

/// Delivers queued outbox rows and records their outcome.
///
/// The database lock is only held for reads, claims and status updates,
/// never across a send.
#[derive(Clone)]
pub struct NotificationDispatcher {
    db: Arc<Mutex<Database>>,
    mailer: PrescriptionMailer,
    max_attempts: u32,
    timeout: Duration,
}

impl NotificationDispatcher {
    pub fn new(db: Arc<Mutex<Database>>, mailer: PrescriptionMailer) -> Self {
        Self {
            db,
            mailer,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Deliver one outbox row. Rows another caller already claimed or
    /// settled are left alone and reported as skipped.
    pub async fn dispatch(&self, outbox_id: &str) -> NotifyResult<DeliveryOutcome> {
        match self.deliver(outbox_id).await? {
            Some(outcome) => Ok(outcome),
            None => {
                let entry = self.notification(outbox_id)?;
                Ok(DeliveryOutcome::Skipped(
                    format!("notification already {:?}", entry.status).to_lowercase(),
                ))
            }
        }
    }

    /// Claim, send and record one row. `None` when the claim was lost.
    async fn deliver(&self, outbox_id: &str) -> NotifyResult<Option<DeliveryOutcome>> {
        let (entry, doc) = {
            let db = self.db.lock().map_err(|_| NotifyError::LockPoisoned)?;
            let entry = db
                .get_notification(outbox_id)?
                .ok_or_else(|| NotifyError::NotFound(format!("outbox entry {}", outbox_id)))?;
            if entry.status != OutboxStatus::Pending {
                return Ok(None);
            }
            let doc = load_document(&db, &entry.prescription_id)?;
            if !db.claim_notification(outbox_id)? {
                return Ok(None);
            }
            (entry, doc)
        };

        let outcome = match tokio::time::timeout(
            self.timeout,
            self.mailer.send_prescription(&doc, Some(entry.recipient.as_str())),
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(_) => DeliveryOutcome::Failed(NotifyError::Timeout(self.timeout.as_secs()).to_string()),
        };

        let (status, error) = match &outcome {
            DeliveryOutcome::Sent => (OutboxStatus::Sent, None),
            DeliveryOutcome::Skipped(reason) => (OutboxStatus::Skipped, Some(reason.as_str())),
            DeliveryOutcome::Failed(reason) => {
                let exhausted = entry.attempts + 1 >= self.max_attempts;
                if exhausted {
                    warn!(
                        outbox_id,
                        prescription_id = %entry.prescription_id,
                        attempt = entry.attempts + 1,
                        "Giving up on prescription email"
                    );
                }
                let status = if exhausted {
                    OutboxStatus::Failed
                } else {
                    OutboxStatus::Pending
                };
                (status, Some(reason.as_str()))
            }
        };

        let recorded = {
            let db = self.db.lock().map_err(|_| NotifyError::LockPoisoned)?;
            db.record_delivery_attempt(outbox_id, status, error)?
        };
        if !recorded {
            warn!(outbox_id, ?status, "Outbox row changed while its delivery was in flight");
        }
        Ok(Some(outcome))
    }

    /// Deliver every email queued for a prescription. A delivery already in
    /// flight is awaited, and a row already settled reports its recorded
    /// outcome, so an email that went out reports `Sent`.
    pub async fn dispatch_prescription_email(
        &self,
        prescription_id: &str,
    ) -> NotifyResult<DeliveryOutcome> {
        let entries = {
            let db = self.db.lock().map_err(|_| NotifyError::LockPoisoned)?;
            db.notifications_for_prescription(prescription_id)?
        };

        let mut last = DeliveryOutcome::Skipped("no email queued".into());
        for entry in entries {
            last = match entry.status {
                OutboxStatus::Pending => match self.deliver(&entry.id).await? {
                    Some(outcome) => outcome,
                    None => self.settled(&entry.id).await?,
                },
                OutboxStatus::Sending => self.settled(&entry.id).await?,
                _ => DeliveryOutcome::recorded(&entry),
            };
        }
        Ok(last)
    }

    /// Wait for a claimed row to settle, at most one delivery timeout.
    async fn settled(&self, outbox_id: &str) -> NotifyResult<DeliveryOutcome> {
        let deadline = tokio::time::Instant::now() + self.timeout + SETTLE_POLL;
        loop {
            let entry = self.notification(outbox_id)?;
            if entry.status != OutboxStatus::Sending {
                return Ok(DeliveryOutcome::recorded(&entry));
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok(DeliveryOutcome::Failed("delivery still in progress".into()));
            }
            tokio::time::sleep(SETTLE_POLL).await;
        }
    }

    fn notification(&self, outbox_id: &str) -> NotifyResult<OutboxEntry> {
        let db = self.db.lock().map_err(|_| NotifyError::LockPoisoned)?;
        db.get_notification(outbox_id)?
            .ok_or_else(|| NotifyError::NotFound(format!("outbox entry {}", outbox_id)))
    }

    /// Email a newly registered patient their MRN and assigned doctor.
    /// Best-effort and not queued: the outcome is returned, never retried.
    pub async fn send_patient_welcome(&self, patient_id: &str) -> NotifyResult<DeliveryOutcome> {
        let (patient, doctor) = {
            let db = self.db.lock().map_err(|_| NotifyError::LockPoisoned)?;
            let patient = db
                .get_patient(patient_id)?
                .ok_or_else(|| NotifyError::NotFound(format!("patient {}", patient_id)))?;
            let doctor = match patient.assigned_doctor_id.as_deref() {
                Some(doctor_id) => db.get_doctor(doctor_id)?,
                None => None,
            };
            (patient, doctor)
        };

        match tokio::time::timeout(self.timeout, self.mailer.send_welcome(&patient, doctor.as_ref()))
            .await
        {
            Ok(outcome) => Ok(outcome),
            Err(_) => Ok(DeliveryOutcome::Failed(
                NotifyError::Timeout(self.timeout.as_secs()).to_string(),
            )),
        }
    }

    /// Re-drive pending rows still under the attempt limit, oldest first.
    pub async fn retry_pending(&self) -> NotifyResult<Vec<(String, DeliveryOutcome)>> {
        let pending = {
            let db = self.db.lock().map_err(|_| NotifyError::LockPoisoned)?;
            db.list_pending_notifications(self.max_attempts)?
        };

        let mut results = Vec::with_capacity(pending.len());
        for entry in pending {
            match self.dispatch(&entry.id).await {
                Ok(outcome) => results.push((entry.id, outcome)),
                Err(e) => {
                    warn!(outbox_id = %entry.id, error = %e, "Outbox retry failed");
                    results.push((entry.id, DeliveryOutcome::Failed(e.to_string())));
                }
            }
        }
        info!(count = results.len(), "Outbox retry pass finished");
        Ok(results)
    }
}
