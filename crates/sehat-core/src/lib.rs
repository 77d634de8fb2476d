//! Sehat Rakshak Core Library
//!
//! Prescription workflow for a hospital patient-management system: duplicate
//! medication checks, prescription composition, transactional persistence and
//! notification fan-out.
//!
//! # Architecture
//!
//! ```text
//! Doctor edits draft ──► PrescriptionComposer ──► DuplicateChecker (advisory)
//!                                │                       │
//!                                │               warnings per line
//!                                ▼
//!                      PrescriptionPersister
//!               ┌──────── BEGIN IMMEDIATE ────────┐
//!               │  prescription + medications     │
//!               │  + notification_outbox row      │
//!               └──────────────┬──────────────────┘
//!                              │ commit (prescription id)
//!          ┌───────────────────┼────────────────────┐
//!          ▼                   ▼                    ▼
//!     PDF projections   NotificationDispatcher   Share links
//!   (bytes/data URL/file)  (email, retries)   (wa.me / mailto)
//! ```
//!
//! # Core Principle
//!
//! **Duplicate detection never blocks a prescription, and no notification
//! failure ever touches a committed one.**
//!
//! # Modules
//!
//! - [`db`]: SQLite database layer with FTS5 formulary search
//! - [`models`]: Domain types (Patient, Doctor, Prescription, Medication, etc.)
//! - [`prescribing`]: Composer, duplicate checker and persister
//! - [`notify`]: PDF, email, share links and the notification outbox
//! - [`config`]: TOML/environment configuration and logging setup

pub mod config;
pub mod db;
pub mod models;
pub mod notify;
pub mod prescribing;

// Re-export commonly used types
pub use config::{init_logging, AppConfig, ConfigError};
pub use db::{Database, DbError, OutboxEntry, OutboxStatus};
pub use models::{
    validity_window, ActiveMedication, AiInteraction, ComposedPrescription, Doctor,
    FormularyEntry, Frequency, Gender, Medication, NewMedication, Patient, Prescription, Timing,
};
pub use notify::{
    DeliveryOutcome, NotificationDispatcher, NotifyError, PrescriptionDocument, PrescriptionMailer,
};
pub use prescribing::{
    DuplicateChecker, DuplicateWarning, MatchPolicy, PrescribingError, PrescriptionComposer,
    PrescriptionPersister, PrescriptionReceipt,
};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use sehat_assistant::{AssistantError, AssistantReply, HealthAssistant, Language};
use tracing::{info, warn};

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum SehatError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Validation failed: {0}")]
    ValidationError(String),

    #[error("Notification error: {0}")]
    NotificationError(String),

    #[error("Assistant error: {0}")]
    AssistantError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<db::DbError> for SehatError {
    fn from(e: db::DbError) -> Self {
        match e {
            db::DbError::NotFound(what) => SehatError::NotFound(what),
            other => SehatError::DatabaseError(other.to_string()),
        }
    }
}

impl From<PrescribingError> for SehatError {
    fn from(e: PrescribingError) -> Self {
        match e {
            PrescribingError::Invalid(_) => SehatError::ValidationError(e.to_string()),
            PrescribingError::PatientNotFound(_) | PrescribingError::DoctorNotFound(_) => {
                SehatError::NotFound(e.to_string())
            }
            PrescribingError::PatientInactive(_)
            | PrescribingError::DoctorInactive(_)
            | PrescribingError::NoSuchLine(_)
            | PrescribingError::DateOverflow(_) => SehatError::InvalidInput(e.to_string()),
            PrescribingError::Database(_) | PrescribingError::WriteFailed { .. } => {
                SehatError::DatabaseError(e.to_string())
            }
        }
    }
}

impl From<NotifyError> for SehatError {
    fn from(e: NotifyError) -> Self {
        match e {
            NotifyError::NotFound(what) => SehatError::NotFound(what),
            other => SehatError::NotificationError(other.to_string()),
        }
    }
}

impl From<ConfigError> for SehatError {
    fn from(e: ConfigError) -> Self {
        SehatError::ConfigError(e.to_string())
    }
}

impl From<AssistantError> for SehatError {
    fn from(e: AssistantError) -> Self {
        SehatError::AssistantError(e.to_string())
    }
}

impl From<std::io::Error> for SehatError {
    fn from(e: std::io::Error) -> Self {
        SehatError::ConfigError(format!("Runtime setup failed: {}", e))
    }
}

impl<T> From<std::sync::PoisonError<T>> for SehatError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        SehatError::DatabaseError(format!("Lock poisoned: {}", e))
    }
}

fn parse_date(field: &str, value: &str) -> Result<NaiveDate, SehatError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
        SehatError::InvalidInput(format!("{} must be YYYY-MM-DD, got '{}'", field, value))
    })
}

fn parse_language(value: &str) -> Result<Language, SehatError> {
    Language::parse(value)
        .ok_or_else(|| SehatError::InvalidInput(format!("Unsupported language: {}", value)))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open the core from a TOML config file, or from the environment when no
/// path is given. Installs the logging subscriber.
#[uniffi::export]
pub fn open_core(config_path: Option<String>) -> Result<Arc<SehatCore>, SehatError> {
    let config = match config_path {
        Some(path) => AppConfig::load(Path::new(&path))?,
        None => AppConfig::from_env()?,
    };
    init_logging(&config.log_filter);
    let db = Database::open(&config.database_path)?;
    Ok(Arc::new(SehatCore::from_config(db, config)?))
}

/// Open or create a database at the given path, other settings from the
/// environment.
#[uniffi::export]
pub fn open_database(path: String) -> Result<Arc<SehatCore>, SehatError> {
    let mut config = AppConfig::from_env()?;
    config.database_path = PathBuf::from(path);
    let db = Database::open(&config.database_path)?;
    Ok(Arc::new(SehatCore::from_config(db, config)?))
}

/// Create an in-memory database with default settings (for testing).
#[uniffi::export]
pub fn open_database_in_memory() -> Result<Arc<SehatCore>, SehatError> {
    let db = Database::open_in_memory()?;
    Ok(Arc::new(SehatCore::from_config(db, AppConfig::default())?))
}

/// Whether a message mentions a red-flag symptom.
#[uniffi::export]
pub fn is_red_flag(text: String) -> bool {
    sehat_assistant::detect_red_flags(&text)
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe facade over the database, the notification fan-out and the
/// health assistant.
#[derive(uniffi::Object)]
pub struct SehatCore {
    db: Arc<Mutex<Database>>,
    runtime: tokio::runtime::Runtime,
    dispatcher: NotificationDispatcher,
    pdf: notify::pdf::PdfRenderer,
    assistant: HealthAssistant,
    config: AppConfig,
}

impl SehatCore {
    /// Build the mailer and assistant from `config`.
    pub fn from_config(db: Database, config: AppConfig) -> Result<Self, SehatError> {
        let mailer = PrescriptionMailer::from_config(&config.email)?;
        let assistant = HealthAssistant::from_config(&config.assistant)?;
        Self::with_services(db, config, mailer, assistant)
    }

    /// Build with explicit collaborators (mock transports in tests).
    pub fn with_services(
        db: Database,
        config: AppConfig,
        mailer: PrescriptionMailer,
        assistant: HealthAssistant,
    ) -> Result<Self, SehatError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()?;
        let requeued = db.requeue_interrupted_notifications()?;
        if requeued > 0 {
            info!(requeued, "Requeued notifications interrupted by a previous run");
        }
        let pdf = notify::pdf::PdfRenderer::from_font_file(config.notifications.pdf_font.as_deref())?;
        let mailer = mailer.with_pdf_renderer(pdf.clone());
        let db = Arc::new(Mutex::new(db));
        let dispatcher = NotificationDispatcher::new(Arc::clone(&db), mailer)
            .with_max_attempts(config.notifications.max_attempts)
            .with_timeout(config.notifications.timeout());
        Ok(Self {
            db,
            runtime,
            dispatcher,
            pdf,
            assistant,
            config,
        })
    }

    fn document(&self, prescription_id: &str) -> Result<PrescriptionDocument, SehatError> {
        let db = self.db.lock()?;
        Ok(notify::load_document(&db, prescription_id)?)
    }

    fn record_interaction(&self, patient_id: Option<&str>, reply: &AssistantReply) {
        let Some(patient_id) = patient_id else {
            return;
        };
        let interaction = AiInteraction::new(
            Some(patient_id.to_string()),
            reply.query.clone(),
            reply.message.clone(),
            reply.is_red_flag,
            reply.language.as_str().to_string(),
        );
        let stored = self
            .db
            .lock()
            .map_err(SehatError::from)
            .and_then(|db| Ok(db.insert_ai_interaction(&interaction)?));
        if let Err(e) = stored {
            warn!(patient_id, error = %e, "Failed to store assistant interaction");
        }
    }
}

#[uniffi::export]
impl SehatCore {
    // =========================================================================
    // Patient Operations
    // =========================================================================

    /// Register a new patient. A welcome email goes out in the background
    /// when enabled and the patient has an address.
    pub fn create_patient(&self, input: FfiNewPatient) -> Result<FfiPatient, SehatError> {
        let gender = Gender::parse(&input.gender)
            .ok_or_else(|| SehatError::InvalidInput(format!("Unknown gender: {}", input.gender)))?;
        let dob = parse_date("date_of_birth", &input.date_of_birth)?;
        if input.full_name.trim().is_empty() {
            return Err(SehatError::InvalidInput("Patient name is required".into()));
        }

        let mut patient = Patient::new(input.full_name.trim().to_string(), gender, dob, input.mobile);
        patient.email = non_blank(input.email);
        patient.address = non_blank(input.address);
        patient.allergies = input.allergies;
        patient.blood_group = non_blank(input.blood_group);
        patient.emergency_contact_name = non_blank(input.emergency_contact_name);
        patient.emergency_contact_mobile = non_blank(input.emergency_contact_mobile);
        patient.hospital_id = non_blank(input.hospital_id);
        patient.assigned_doctor_id = non_blank(input.assigned_doctor_id);

        {
            let db = self.db.lock()?;
            db.insert_patient(&patient)?;
        }
        info!(patient_id = %patient.id, mrn = %patient.mrn, "Patient registered");

        if self.config.notifications.welcome_email && patient.contact_email().is_some() {
            let dispatcher = self.dispatcher.clone();
            let patient_id = patient.id.clone();
            self.runtime.spawn(async move {
                match dispatcher.send_patient_welcome(&patient_id).await {
                    Ok(outcome) => info!(%patient_id, ?outcome, "Welcome email dispatched"),
                    Err(e) => warn!(%patient_id, error = %e, "Welcome email dispatch failed"),
                }
            });
        }
        Ok(patient.into())
    }

    /// Get a patient by internal ID.
    pub fn get_patient(&self, patient_id: String) -> Result<Option<FfiPatient>, SehatError> {
        let db = self.db.lock()?;
        let patient = db.get_patient(&patient_id)?;
        Ok(patient.map(|p| p.into()))
    }

    /// Get a patient by MRN.
    pub fn get_patient_by_mrn(&self, mrn: String) -> Result<Option<FfiPatient>, SehatError> {
        let db = self.db.lock()?;
        let patient = db.get_patient_by_mrn(&mrn)?;
        Ok(patient.map(|p| p.into()))
    }

    /// Search patients by name, MRN or mobile.
    pub fn search_patients(&self, query: String, limit: u32) -> Result<Vec<FfiPatient>, SehatError> {
        let db = self.db.lock()?;
        let patients = db.search_patients(&query, limit as usize)?;
        Ok(patients.into_iter().map(|p| p.into()).collect())
    }

    pub fn list_active_patients(&self) -> Result<Vec<FfiPatient>, SehatError> {
        let db = self.db.lock()?;
        let patients = db.list_active_patients()?;
        Ok(patients.into_iter().map(|p| p.into()).collect())
    }

    /// Update contact and medical details. Identity fields are never changed.
    pub fn update_patient(&self, update: FfiPatientUpdate) -> Result<FfiPatient, SehatError> {
        let db = self.db.lock()?;
        let mut patient = db
            .get_patient(&update.id)?
            .ok_or_else(|| SehatError::NotFound(format!("patient {}", update.id)))?;

        if update.full_name.trim().is_empty() {
            return Err(SehatError::InvalidInput("Patient name is required".into()));
        }
        patient.full_name = update.full_name.trim().to_string();
        patient.mobile = update.mobile;
        patient.email = non_blank(update.email);
        patient.address = non_blank(update.address);
        patient.allergies = update.allergies;
        patient.blood_group = non_blank(update.blood_group);
        patient.emergency_contact_name = non_blank(update.emergency_contact_name);
        patient.emergency_contact_mobile = non_blank(update.emergency_contact_mobile);
        patient.assigned_doctor_id = non_blank(update.assigned_doctor_id);

        db.update_patient(&patient)?;
        let stored = db
            .get_patient(&patient.id)?
            .ok_or_else(|| SehatError::NotFound(format!("patient {}", patient.id)))?;
        Ok(stored.into())
    }

    /// Mark a patient discharged now.
    pub fn discharge_patient(&self, patient_id: String) -> Result<bool, SehatError> {
        let db = self.db.lock()?;
        let now = chrono::Utc::now().to_rfc3339();
        Ok(db.discharge_patient(&patient_id, &now)?)
    }

    /// Soft-deactivate a patient.
    pub fn deactivate_patient(&self, patient_id: String) -> Result<bool, SehatError> {
        let db = self.db.lock()?;
        Ok(db.deactivate_patient(&patient_id)?)
    }

    // =========================================================================
    // Doctor Operations
    // =========================================================================

    pub fn create_doctor(&self, input: FfiNewDoctor) -> Result<FfiDoctor, SehatError> {
        if input.full_name.trim().is_empty() {
            return Err(SehatError::InvalidInput("Doctor name is required".into()));
        }
        let mut doctor = Doctor::new(
            input.full_name.trim().to_string(),
            input.specialization,
            input.license_number,
        );
        doctor.qualification = input.qualification;
        doctor.hospital_id = non_blank(input.hospital_id);

        let db = self.db.lock()?;
        db.insert_doctor(&doctor)?;
        Ok(doctor.into())
    }

    pub fn get_doctor(&self, doctor_id: String) -> Result<Option<FfiDoctor>, SehatError> {
        let db = self.db.lock()?;
        let doctor = db.get_doctor(&doctor_id)?;
        Ok(doctor.map(|d| d.into()))
    }

    pub fn deactivate_doctor(&self, doctor_id: String) -> Result<bool, SehatError> {
        let db = self.db.lock()?;
        Ok(db.deactivate_doctor(&doctor_id)?)
    }

    // =========================================================================
    // Formulary Operations
    // =========================================================================

    /// Add or update a formulary entry.
    pub fn upsert_formulary_entry(&self, entry: FfiFormularyEntry) -> Result<(), SehatError> {
        let db = self.db.lock()?;
        db.upsert_formulary_entry(&entry.into())?;
        Ok(())
    }

    /// Full-text search over generic names and aliases.
    pub fn search_formulary(
        &self,
        query: String,
        limit: u32,
    ) -> Result<Vec<FfiFormularyEntry>, SehatError> {
        let db = self.db.lock()?;
        let entries = db.search_formulary(&query, limit as usize)?;
        Ok(entries.into_iter().map(|e| e.into()).collect())
    }

    /// Resolve a medicine name to its formulary code.
    pub fn resolve_drug_code(&self, medicine_name: String) -> Result<Option<String>, SehatError> {
        let db = self.db.lock()?;
        Ok(db.resolve_formulary_code(&medicine_name)?)
    }

    // =========================================================================
    // Prescribing Operations
    // =========================================================================

    /// Advisory duplicate check for one medicine name. Never fails because of
    /// the check itself; only a malformed date is an error.
    pub fn check_duplicate(
        &self,
        patient_id: String,
        medicine_name: String,
        today: String,
    ) -> Result<Option<FfiDuplicateWarning>, SehatError> {
        let today = parse_date("today", &today)?;
        let db = self.db.lock()?;
        let checker = DuplicateChecker::new(&db, self.config.duplicates.policy);
        Ok(checker
            .check(&patient_id, &medicine_name, today)
            .map(|w| w.into()))
    }

    /// Duplicate check for every line of a draft, one warning per distinct name.
    pub fn check_duplicates(
        &self,
        patient_id: String,
        medicine_names: Vec<String>,
        today: String,
    ) -> Result<Vec<FfiDuplicateWarning>, SehatError> {
        let today = parse_date("today", &today)?;
        let db = self.db.lock()?;
        let checker = DuplicateChecker::new(&db, self.config.duplicates.policy);
        Ok(checker
            .check_all(&patient_id, medicine_names.as_slice(), today)
            .into_iter()
            .map(|w| w.into())
            .collect())
    }

    /// Commit a prescription. Returns as soon as the transaction commits; the
    /// patient email is delivered in the background.
    pub fn submit_prescription(
        &self,
        patient_id: String,
        doctor_id: String,
        prescription: FfiComposedPrescription,
        today: String,
    ) -> Result<FfiPrescriptionReceipt, SehatError> {
        let today = parse_date("today", &today)?;
        let composed = ComposedPrescription::try_from(prescription)?;

        let receipt = {
            let mut db = self.db.lock()?;
            let mut persister = PrescriptionPersister::new(&mut db);
            persister.submit(&patient_id, &doctor_id, &composed, today)?
        };

        if let Some(outbox_id) = receipt.email_outbox_id.clone() {
            let dispatcher = self.dispatcher.clone();
            self.runtime.spawn(async move {
                match dispatcher.dispatch(&outbox_id).await {
                    Ok(outcome) => info!(%outbox_id, ?outcome, "Prescription email dispatched"),
                    Err(e) => warn!(%outbox_id, error = %e, "Prescription email dispatch failed"),
                }
            });
        }

        Ok(receipt.into())
    }

    pub fn get_prescription(
        &self,
        prescription_id: String,
    ) -> Result<Option<FfiPrescription>, SehatError> {
        let db = self.db.lock()?;
        let prescription = db.get_prescription(&prescription_id)?;
        Ok(prescription.map(|p| p.into()))
    }

    /// A patient's prescriptions, newest first.
    pub fn list_prescriptions(
        &self,
        patient_id: String,
        limit: Option<u32>,
    ) -> Result<Vec<FfiPrescription>, SehatError> {
        let db = self.db.lock()?;
        let prescriptions =
            db.list_prescriptions_for_patient(&patient_id, limit.map(|l| l as usize))?;
        Ok(prescriptions.into_iter().map(|p| p.into()).collect())
    }

    /// Medication lines still active on `today`.
    pub fn list_active_medications(
        &self,
        patient_id: String,
        today: String,
    ) -> Result<Vec<FfiActiveMedication>, SehatError> {
        let today = parse_date("today", &today)?;
        let db = self.db.lock()?;
        let active = db.list_active_medications(&patient_id, today)?;
        Ok(active.into_iter().map(|m| m.into()).collect())
    }

    // =========================================================================
    // Notification Operations
    // =========================================================================

    /// Rendered PDF bytes.
    pub fn prescription_pdf(&self, prescription_id: String) -> Result<Vec<u8>, SehatError> {
        let doc = self.document(&prescription_id)?;
        Ok(self.pdf.render(&doc)?)
    }

    /// Rendered PDF as a `data:application/pdf;base64,` URL.
    pub fn prescription_pdf_data_url(&self, prescription_id: String) -> Result<String, SehatError> {
        let doc = self.document(&prescription_id)?;
        Ok(self.pdf.data_url(&doc)?)
    }

    /// Write the PDF into `dir` (or the configured PDF directory) and return
    /// its path.
    pub fn save_prescription_pdf(
        &self,
        prescription_id: String,
        dir: Option<String>,
    ) -> Result<String, SehatError> {
        let doc = self.document(&prescription_id)?;
        let dir = dir
            .map(PathBuf::from)
            .unwrap_or_else(|| self.config.notifications.pdf_dir.clone());
        let path = self.pdf.write(&doc, &dir)?;
        Ok(path.to_string_lossy().into_owned())
    }

    /// `wa.me` link with a pre-filled message, if the patient has a mobile.
    pub fn whatsapp_link(&self, prescription_id: String) -> Result<Option<String>, SehatError> {
        let doc = self.document(&prescription_id)?;
        Ok(notify::share::whatsapp_link(&doc))
    }

    /// `mailto:` link to `to`, or to the patient's own address.
    pub fn mailto_link(
        &self,
        prescription_id: String,
        to: Option<String>,
    ) -> Result<Option<String>, SehatError> {
        let doc = self.document(&prescription_id)?;
        Ok(notify::share::mailto_link(&doc, to.as_deref()))
    }

    /// Deliver the prescription's email now, or wait for the delivery
    /// already in flight. `true` once the email has gone out; `false` when
    /// email is not configured, the patient has no address, or delivery
    /// failed.
    pub fn send_prescription_email(&self, prescription_id: String) -> Result<bool, SehatError> {
        let outcome = self
            .runtime
            .block_on(self.dispatcher.dispatch_prescription_email(&prescription_id))?;
        Ok(outcome.is_sent())
    }

    /// Send the registration welcome email now. `false` when email is not
    /// configured, the patient has no address, or delivery failed.
    pub fn send_welcome_email(&self, patient_id: String) -> Result<bool, SehatError> {
        let outcome = self
            .runtime
            .block_on(self.dispatcher.send_patient_welcome(&patient_id))?;
        Ok(outcome.is_sent())
    }

    /// Re-drive pending outbox rows.
    pub fn retry_pending_notifications(&self) -> Result<Vec<FfiDeliveryReport>, SehatError> {
        let results = self.runtime.block_on(self.dispatcher.retry_pending())?;
        Ok(results
            .into_iter()
            .map(|(outbox_id, outcome)| FfiDeliveryReport::new(outbox_id, outcome))
            .collect())
    }

    pub fn notifications_for_prescription(
        &self,
        prescription_id: String,
    ) -> Result<Vec<FfiOutboxEntry>, SehatError> {
        let db = self.db.lock()?;
        let entries = db.notifications_for_prescription(&prescription_id)?;
        Ok(entries.into_iter().map(|e| e.into()).collect())
    }

    // =========================================================================
    // Assistant Operations
    // =========================================================================

    /// Answer a health question; stored against the patient when given.
    pub fn ask_health_question(
        &self,
        query: String,
        language: String,
        patient_id: Option<String>,
    ) -> Result<FfiAssistantReply, SehatError> {
        let language = parse_language(&language)?;
        let reply = self
            .runtime
            .block_on(self.assistant.ask_health_question(&query, language))?;
        self.record_interaction(patient_id.as_deref(), &reply);
        Ok(reply.into())
    }

    /// Evaluate reported symptoms; stored against the patient when given.
    pub fn analyze_symptoms(
        &self,
        symptoms: String,
        language: String,
        patient_id: Option<String>,
    ) -> Result<FfiAssistantReply, SehatError> {
        let language = parse_language(&language)?;
        let reply = self
            .runtime
            .block_on(self.assistant.analyze_symptoms(&symptoms, language))?;
        self.record_interaction(patient_id.as_deref(), &reply);
        Ok(reply.into())
    }

    /// Plain-language explanation of a stored prescription.
    pub fn explain_prescription(
        &self,
        prescription_id: String,
        language: String,
    ) -> Result<FfiAssistantReply, SehatError> {
        let language = parse_language(&language)?;
        let (patient_id, brief) = {
            let db = self.db.lock()?;
            let prescription = db
                .get_prescription(&prescription_id)?
                .ok_or_else(|| SehatError::NotFound(format!("prescription {}", prescription_id)))?;
            let doc = notify::load_document(&db, &prescription_id)?;
            (prescription.patient_id, doc.brief())
        };
        let reply = self
            .runtime
            .block_on(self.assistant.explain_prescription(&brief, language))?;
        self.record_interaction(Some(&patient_id), &reply);
        Ok(reply.into())
    }

    /// Short WhatsApp-ready summary of a stored prescription.
    pub fn whatsapp_summary(
        &self,
        prescription_id: String,
        language: String,
    ) -> Result<String, SehatError> {
        let language = parse_language(&language)?;
        let brief = self.document(&prescription_id)?.brief();
        Ok(self
            .runtime
            .block_on(self.assistant.whatsapp_summary(&brief, language))?)
    }

    /// Translate between English and Hindi.
    pub fn translate(&self, text: String, from: String, to: String) -> Result<String, SehatError> {
        let from = parse_language(&from)?;
        let to = parse_language(&to)?;
        Ok(self
            .runtime
            .block_on(self.assistant.translate(&text, from, to))?)
    }

    /// English answer with a Hindi translation.
    pub fn bilingual_reply(
        &self,
        query: String,
        patient_id: Option<String>,
    ) -> Result<FfiAssistantReply, SehatError> {
        let reply = self.runtime.block_on(self.assistant.bilingual_reply(&query))?;
        self.record_interaction(patient_id.as_deref(), &reply);
        Ok(reply.into())
    }

    pub fn interactions_for_patient(
        &self,
        patient_id: String,
    ) -> Result<Vec<FfiAiInteraction>, SehatError> {
        let db = self.db.lock()?;
        let interactions = db.list_interactions_for_patient(&patient_id)?;
        Ok(interactions.into_iter().map(|i| i.into()).collect())
    }
}

// =========================================================================
// FFI Types
// =========================================================================

/// Registration form for a new patient. Dates are `YYYY-MM-DD`.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiNewPatient {
    pub full_name: String,
    pub gender: String,
    pub date_of_birth: String,
    pub mobile: String,
    pub email: Option<String>,
    pub address: Option<String>,
    pub allergies: Vec<String>,
    pub blood_group: Option<String>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_mobile: Option<String>,
    pub hospital_id: Option<String>,
    pub assigned_doctor_id: Option<String>,
}

/// Mutable patient fields.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPatientUpdate {
    pub id: String,
    pub full_name: String,
    pub mobile: String,
    pub email: Option<String>,
    pub address: Option<String>,
    pub allergies: Vec<String>,
    pub blood_group: Option<String>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_mobile: Option<String>,
    pub assigned_doctor_id: Option<String>,
}

/// FFI-safe patient.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPatient {
    pub id: String,
    pub mrn: String,
    pub full_name: String,
    pub gender: String,
    pub date_of_birth: String,
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
    pub discharge_date: Option<String>,
    pub is_active: bool,
}

impl From<Patient> for FfiPatient {
    fn from(patient: Patient) -> Self {
        Self {
            id: patient.id,
            mrn: patient.mrn,
            full_name: patient.full_name,
            gender: patient.gender.as_str().to_string(),
            date_of_birth: patient.date_of_birth.to_string(),
            mobile: patient.mobile,
            email: patient.email,
            address: patient.address,
            allergies: patient.allergies,
            blood_group: patient.blood_group,
            emergency_contact_name: patient.emergency_contact_name,
            emergency_contact_mobile: patient.emergency_contact_mobile,
            hospital_id: patient.hospital_id,
            assigned_doctor_id: patient.assigned_doctor_id,
            is_discharged: patient.is_discharged,
            discharge_date: patient.discharge_date,
            is_active: patient.is_active,
        }
    }
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiNewDoctor {
    pub full_name: String,
    pub specialization: String,
    pub qualification: String,
    pub license_number: String,
    pub hospital_id: Option<String>,
}

/// FFI-safe doctor.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiDoctor {
    pub id: String,
    pub full_name: String,
    pub specialization: String,
    pub qualification: String,
    pub license_number: String,
    pub hospital_id: Option<String>,
    pub is_active: bool,
}

impl From<Doctor> for FfiDoctor {
    fn from(doctor: Doctor) -> Self {
        Self {
            id: doctor.id,
            full_name: doctor.full_name,
            specialization: doctor.specialization,
            qualification: doctor.qualification,
            license_number: doctor.license_number,
            hospital_id: doctor.hospital_id,
            is_active: doctor.is_active,
        }
    }
}

/// FFI-safe formulary entry.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiFormularyEntry {
    pub code: String,
    pub generic_name: String,
    pub aliases: Vec<String>,
    pub active: bool,
}

impl From<FormularyEntry> for FfiFormularyEntry {
    fn from(entry: FormularyEntry) -> Self {
        Self {
            code: entry.code,
            generic_name: entry.generic_name,
            aliases: entry.aliases,
            active: entry.active,
        }
    }
}

impl From<FfiFormularyEntry> for FormularyEntry {
    fn from(entry: FfiFormularyEntry) -> Self {
        FormularyEntry {
            code: entry.code,
            generic_name: entry.generic_name,
            aliases: entry.aliases,
            active: entry.active,
        }
    }
}

/// FFI-safe duplicate warning. `message` is the text shown to the doctor.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiDuplicateWarning {
    pub medicine_name: String,
    pub active_until: String,
    pub matches: u32,
    pub message: String,
}

impl From<DuplicateWarning> for FfiDuplicateWarning {
    fn from(warning: DuplicateWarning) -> Self {
        Self {
            message: warning.to_string(),
            active_until: warning.active_until.to_string(),
            matches: warning.matches as u32,
            medicine_name: warning.medicine_name,
        }
    }
}

/// One medication line as entered. `frequency` is a dose-timing code such
/// as `1-0-1`; `timing` a label such as `After Food`.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiNewMedication {
    pub medicine_name: String,
    pub dosage: String,
    pub frequency: String,
    pub timing: String,
    pub duration_days: u32,
    pub instructions: Option<String>,
}

impl TryFrom<FfiNewMedication> for NewMedication {
    type Error = SehatError;

    fn try_from(med: FfiNewMedication) -> Result<Self, Self::Error> {
        let frequency = Frequency::parse(&med.frequency).ok_or_else(|| {
            SehatError::InvalidInput(format!("Unknown frequency code: {}", med.frequency))
        })?;
        let timing = Timing::parse(&med.timing)
            .ok_or_else(|| SehatError::InvalidInput(format!("Unknown timing: {}", med.timing)))?;
        Ok(NewMedication {
            medicine_name: med.medicine_name.trim().to_string(),
            dosage: med.dosage.trim().to_string(),
            frequency,
            timing,
            duration_days: med.duration_days,
            instructions: non_blank(med.instructions),
        })
    }
}

/// A prescription ready for submission.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiComposedPrescription {
    pub diagnosis: String,
    pub notes: Option<String>,
    pub follow_up_date: Option<String>,
    pub medications: Vec<FfiNewMedication>,
}

impl TryFrom<FfiComposedPrescription> for ComposedPrescription {
    type Error = SehatError;

    fn try_from(rx: FfiComposedPrescription) -> Result<Self, Self::Error> {
        let follow_up_date = match non_blank(rx.follow_up_date) {
            Some(date) => Some(parse_date("follow_up_date", &date)?),
            None => None,
        };
        let medications = rx
            .medications
            .into_iter()
            .map(NewMedication::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ComposedPrescription {
            diagnosis: rx.diagnosis.trim().to_string(),
            notes: non_blank(rx.notes),
            follow_up_date,
            medications,
        })
    }
}

/// FFI-safe submission receipt.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPrescriptionReceipt {
    pub prescription_id: String,
    pub prescription_date: String,
    pub medication_ids: Vec<String>,
    pub email_queued: bool,
}

impl From<PrescriptionReceipt> for FfiPrescriptionReceipt {
    fn from(receipt: PrescriptionReceipt) -> Self {
        Self {
            prescription_id: receipt.prescription_id,
            prescription_date: receipt.prescription_date.to_string(),
            medication_ids: receipt.medication_ids,
            email_queued: receipt.email_outbox_id.is_some(),
        }
    }
}

/// FFI-safe stored medication line.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiMedication {
    pub id: String,
    pub position: u32,
    pub medicine_name: String,
    pub dosage: String,
    pub frequency: String,
    pub timing: String,
    pub duration_days: u32,
    pub start_date: String,
    pub end_date: String,
    pub instructions: Option<String>,
}

impl From<Medication> for FfiMedication {
    fn from(med: Medication) -> Self {
        Self {
            id: med.id,
            position: med.position,
            medicine_name: med.medicine_name,
            dosage: med.dosage,
            frequency: med.frequency.code().to_string(),
            timing: med.timing.label().to_string(),
            duration_days: med.duration_days,
            start_date: med.start_date.to_string(),
            end_date: med.end_date.to_string(),
            instructions: med.instructions,
        }
    }
}

/// FFI-safe stored prescription.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPrescription {
    pub id: String,
    pub patient_id: String,
    pub doctor_id: String,
    pub diagnosis: String,
    pub notes: Option<String>,
    pub prescription_date: String,
    pub follow_up_date: Option<String>,
    pub medications: Vec<FfiMedication>,
}

impl From<Prescription> for FfiPrescription {
    fn from(rx: Prescription) -> Self {
        Self {
            id: rx.id,
            patient_id: rx.patient_id,
            doctor_id: rx.doctor_id,
            diagnosis: rx.diagnosis,
            notes: rx.notes,
            prescription_date: rx.prescription_date.to_string(),
            follow_up_date: rx.follow_up_date.map(|d| d.to_string()),
            medications: rx.medications.into_iter().map(|m| m.into()).collect(),
        }
    }
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiActiveMedication {
    pub medication_id: String,
    pub prescription_id: String,
    pub medicine_name: String,
    pub end_date: String,
}

impl From<ActiveMedication> for FfiActiveMedication {
    fn from(med: ActiveMedication) -> Self {
        Self {
            medication_id: med.medication_id,
            prescription_id: med.prescription_id,
            medicine_name: med.medicine_name,
            end_date: med.end_date.to_string(),
        }
    }
}

/// Outcome of one delivery: `status` is `sent`, `skipped` or `failed`.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiDeliveryReport {
    pub outbox_id: String,
    pub status: String,
    pub detail: Option<String>,
}

impl FfiDeliveryReport {
    fn new(outbox_id: String, outcome: DeliveryOutcome) -> Self {
        let (status, detail) = match outcome {
            DeliveryOutcome::Sent => ("sent", None),
            DeliveryOutcome::Skipped(reason) => ("skipped", Some(reason)),
            DeliveryOutcome::Failed(reason) => ("failed", Some(reason)),
        };
        Self {
            outbox_id,
            status: status.to_string(),
            detail,
        }
    }
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiOutboxEntry {
    pub id: String,
    pub prescription_id: String,
    pub recipient: String,
    pub status: String,
    pub attempts: u32,
    pub last_error: Option<String>,
}

impl From<OutboxEntry> for FfiOutboxEntry {
    fn from(entry: OutboxEntry) -> Self {
        Self {
            id: entry.id,
            prescription_id: entry.prescription_id,
            recipient: entry.recipient,
            status: format!("{:?}", entry.status).to_lowercase(),
            attempts: entry.attempts,
            last_error: entry.last_error,
        }
    }
}

/// FFI-safe assistant reply.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiAssistantReply {
    pub message: String,
    pub is_red_flag: bool,
    pub red_flags: Vec<String>,
    pub language: String,
    pub hindi_translation: Option<String>,
}

impl From<AssistantReply> for FfiAssistantReply {
    fn from(reply: AssistantReply) -> Self {
        Self {
            message: reply.message,
            is_red_flag: reply.is_red_flag,
            red_flags: reply.red_flags,
            language: reply.language.as_str().to_string(),
            hindi_translation: reply.translation.map(|t| t.hindi),
        }
    }
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiAiInteraction {
    pub id: String,
    pub query: String,
    pub response: String,
    pub is_red_flag: bool,
    pub language: String,
    pub created_at: String,
}

impl From<AiInteraction> for FfiAiInteraction {
    fn from(interaction: AiInteraction) -> Self {
        Self {
            id: interaction.id,
            query: interaction.query,
            response: interaction.response,
            is_red_flag: interaction.is_red_flag,
            language: interaction.language,
            created_at: interaction.created_at,
        }
    }
}
