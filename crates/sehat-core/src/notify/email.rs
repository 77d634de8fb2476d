//! Patient email delivery through EmailJS: prescriptions and the
//! registration welcome.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::models::{Doctor, Patient};

use super::document::PrescriptionDocument;
use super::pdf::PdfRenderer;
use super::share::medication_summary;
use super::{DeliveryOutcome, NotifyError, NotifyResult};

/// EmailJS REST endpoint.
pub const EMAILJS_ENDPOINT: &str = "https://api.emailjs.com/api/v1.0/email/send";

/// Email provider settings. Any blank id means "not configured".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmailConfig {
    pub public_key: String,
    pub service_id: String,
    pub template_id: String,
    pub endpoint: String,
    pub timeout_secs: u64,
    /// Attach the rendered PDF as base64
    pub attach_pdf: bool,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            public_key: String::new(),
            service_id: String::new(),
            template_id: String::new(),
            endpoint: EMAILJS_ENDPOINT.to_string(),
            timeout_secs: 15,
            attach_pdf: true,
        }
    }
}

impl EmailConfig {
    pub fn is_configured(&self) -> bool {
        !self.public_key.trim().is_empty()
            && !self.service_id.trim().is_empty()
            && !self.template_id.trim().is_empty()
    }
}

/// Template parameters of the prescription email.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PrescriptionEmail {
    pub to_email: String,
    pub to_name: String,
    pub subject: String,
    pub patient_name: String,
    pub patient_mrn: String,
    pub doctor_name: String,
    pub diagnosis: String,
    pub prescription_date: String,
    pub medications: String,
    pub notes: String,
    pub message: String,
    /// Base64 PDF, empty when not attached
    pub pdf_attachment: String,
}

impl PrescriptionEmail {
    /// Build the email for `to_email`.
    pub fn build(doc: &PrescriptionDocument, to_email: &str, pdf_base64: Option<String>) -> Self {
        let medications = email_medication_list(doc);
        let notes_line = doc
            .notes
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .map(|n| format!("Clinical Notes: {}\n\n", n))
            .unwrap_or_default();

        let message = format!(
            "Dear {name},\n\n\
             Your prescription has been created by Dr. {doctor}.\n\n\
             Diagnosis: {diagnosis}\n\n\
             Medications Prescribed:\n{medications}\n\n\
             {notes_line}\
             Important Instructions:\n\
             • Take medicines exactly as prescribed\n\
             • Complete the full course even if you feel better\n\
             • Contact your doctor if you experience any side effects\n\
             • Keep medicines out of reach of children\n\
             • Store in a cool, dry place\n\n\
             You can also download your prescription from the Sehat Rakshak portal.\n\n\
             Stay healthy!\n\n\
             Dr. {doctor}\n\
             Sehat Rakshak\n\
             आपकी सेहत, हमारा वचन",
            name = doc.patient_name,
            doctor = doc.doctor_name,
            diagnosis = doc.diagnosis,
        );

        Self {
            to_email: to_email.to_string(),
            to_name: doc.patient_name.clone(),
            subject: format!(
                "New Prescription from Dr. {} - {}",
                doc.doctor_name,
                doc.display_date()
            ),
            patient_name: doc.patient_name.clone(),
            patient_mrn: doc.patient_mrn.clone(),
            doctor_name: doc.doctor_name.clone(),
            diagnosis: doc.diagnosis.clone(),
            prescription_date: doc.display_date(),
            medications,
            notes: doc
                .notes
                .clone()
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| "N/A".into()),
            message,
            pdf_attachment: pdf_base64.unwrap_or_default(),
        }
    }
}

/// Template parameters of the welcome email sent on registration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatientWelcomeEmail {
    pub to_email: String,
    pub to_name: String,
    pub subject: String,
    pub patient_name: String,
    pub patient_mrn: String,
    pub patient_mobile: String,
    pub doctor_name: String,
    pub doctor_specialization: String,
    pub message: String,
}

impl PatientWelcomeEmail {
    pub fn build(patient: &Patient, doctor: Option<&Doctor>, to_email: &str) -> Self {
        let specialization = doctor
            .map(|d| d.specialization.trim())
            .filter(|s| !s.is_empty())
            .unwrap_or("General Medicine")
            .to_string();
        let doctor_line = doctor
            .map(|d| format!("• Assigned Doctor: Dr. {} ({})\n", d.full_name, specialization))
            .unwrap_or_default();

        let message = format!(
            "Dear {name},\n\n\
             Welcome to Sehat Rakshak! You have been successfully registered in our hospital management system.\n\n\
             Your Details:\n\
             • Medical Record Number (MRN): {mrn}\n\
             {doctor_line}\
             • Mobile: {mobile}\n\n\
             You can now:\n\
             ✓ View your medical records online\n\
             ✓ Receive medication reminders\n\
             ✓ Access your prescriptions digitally\n\
             ✓ Track your health progress\n\
             ✓ Connect with your doctor\n\n\
             Please keep your MRN safe for future reference.\n\n\
             Best regards,\n\
             Sehat Rakshak Team\n\
             आपकी सेहत, हमारा वचन",
            name = patient.full_name,
            mrn = patient.mrn,
            mobile = patient.mobile,
        );

        Self {
            to_email: to_email.to_string(),
            to_name: patient.full_name.clone(),
            subject: "Welcome to Sehat Rakshak - Your Healthcare Journey Begins".to_string(),
            patient_name: patient.full_name.clone(),
            patient_mrn: patient.mrn.clone(),
            patient_mobile: patient.mobile.clone(),
            doctor_name: doctor.map(|d| d.full_name.clone()).unwrap_or_default(),
            doctor_specialization: specialization,
            message,
        }
    }
}

/// Any email handed to a transport. Serializes as the bare template
/// parameters.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum OutgoingEmail {
    Prescription(PrescriptionEmail),
    Welcome(PatientWelcomeEmail),
}

impl OutgoingEmail {
    pub fn to_email(&self) -> &str {
        match self {
            OutgoingEmail::Prescription(e) => &e.to_email,
            OutgoingEmail::Welcome(e) => &e.to_email,
        }
    }
}

/// Three-line entry per medication, blank line between entries.
fn email_medication_list(doc: &PrescriptionDocument) -> String {
    doc.medications
        .iter()
        .enumerate()
        .map(|(i, m)| {
            format!(
                "{}. {} - {}\n   Take: {}, {}\n   Duration: {} days",
                i + 1,
                m.medicine_name,
                m.dosage,
                m.frequency,
                m.timing,
                m.duration_days
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Anything that can deliver a patient email.
#[async_trait]
pub trait EmailTransport: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> NotifyResult<()>;
}

#[derive(Serialize)]
struct EmailJsRequest<'a> {
    service_id: &'a str,
    template_id: &'a str,
    user_id: &'a str,
    template_params: &'a OutgoingEmail,
}

/// EmailJS REST transport.
pub struct EmailJsTransport {
    client: reqwest::Client,
    config: EmailConfig,
}

impl EmailJsTransport {
    pub fn new(config: EmailConfig) -> NotifyResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl EmailTransport for EmailJsTransport {
    async fn send(&self, email: &OutgoingEmail) -> NotifyResult<()> {
        let request = EmailJsRequest {
            service_id: &self.config.service_id,
            template_id: &self.config.template_id,
            user_id: &self.config.public_key,
            template_params: email,
        };

        let send = self.client.post(&self.config.endpoint).json(&request).send();
        let response = tokio::time::timeout(Duration::from_secs(self.config.timeout_secs), send)
            .await
            .map_err(|_| NotifyError::Timeout(self.config.timeout_secs))??;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Provider {
                status: status.as_u16(),
                message: body,
            });
        }
        Ok(())
    }
}

/// Test transport that records emails and fails or stalls on demand.
#[derive(Default)]
pub struct MockTransport {
    sent: Mutex<Vec<OutgoingEmail>>,
    failures_left: Mutex<u32>,
    delay: Duration,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` sends.
    pub fn failing(n: u32) -> Self {
        Self {
            failures_left: Mutex::new(n),
            ..Self::default()
        }
    }

    /// Wait `delay` before every send.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Prescription emails delivered so far.
    pub fn sent(&self) -> Vec<PrescriptionEmail> {
        self.all()
            .into_iter()
            .filter_map(|e| match e {
                OutgoingEmail::Prescription(e) => Some(e),
                OutgoingEmail::Welcome(_) => None,
            })
            .collect()
    }

    /// Welcome emails delivered so far.
    pub fn welcomes(&self) -> Vec<PatientWelcomeEmail> {
        self.all()
            .into_iter()
            .filter_map(|e| match e {
                OutgoingEmail::Welcome(e) => Some(e),
                OutgoingEmail::Prescription(_) => None,
            })
            .collect()
    }

    fn all(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl EmailTransport for MockTransport {
    async fn send(&self, email: &OutgoingEmail) -> NotifyResult<()> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Ok(mut left) = self.failures_left.lock() {
            if *left > 0 {
                *left -= 1;
                return Err(NotifyError::Provider {
                    status: 503,
                    message: "mock outage".into(),
                });
            }
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(email.clone());
        }
        Ok(())
    }
}

/// Sends patient emails; a mailer without transport skips every send.
#[derive(Clone, Default)]
pub struct PrescriptionMailer {
    transport: Option<Arc<dyn EmailTransport>>,
    attach_pdf: bool,
    pdf: PdfRenderer,
}

impl PrescriptionMailer {
    /// Mailer for the configured provider, or a disabled one if the config
    /// is incomplete.
    pub fn from_config(config: &EmailConfig) -> NotifyResult<Self> {
        if !config.is_configured() {
            info!("Email provider not configured, patient emails disabled");
            return Ok(Self::disabled());
        }
        Ok(Self {
            transport: Some(Arc::new(EmailJsTransport::new(config.clone())?)),
            attach_pdf: config.attach_pdf,
            ..Self::default()
        })
    }

    pub fn with_transport(transport: Arc<dyn EmailTransport>) -> Self {
        Self {
            transport: Some(transport),
            ..Self::default()
        }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn attach_pdf(mut self, attach: bool) -> Self {
        self.attach_pdf = attach;
        self
    }

    /// Renderer for attachments (embedded font).
    pub fn with_pdf_renderer(mut self, pdf: PdfRenderer) -> Self {
        self.pdf = pdf;
        self
    }

    pub fn is_configured(&self) -> bool {
        self.transport.is_some()
    }

    /// Email the prescription to `recipient`, or to the patient's address
    /// when `recipient` is `None`. Never returns an error: missing
    /// configuration or address is a skip, a provider error is a failure.
    pub async fn send_prescription(
        &self,
        doc: &PrescriptionDocument,
        recipient: Option<&str>,
    ) -> DeliveryOutcome {
        let Some(transport) = &self.transport else {
            return DeliveryOutcome::Skipped("email provider not configured".into());
        };
        let Some(to) = recipient
            .or(doc.patient_email.as_deref())
            .map(str::trim)
            .filter(|e| !e.is_empty())
        else {
            return DeliveryOutcome::Skipped("patient has no email address".into());
        };

        let pdf_base64 = if self.attach_pdf {
            match self.pdf.render(doc) {
                Ok(bytes) => Some(STANDARD.encode(bytes)),
                Err(e) => {
                    warn!(prescription_id = %doc.prescription_id, error = %e, "PDF attachment skipped");
                    None
                }
            }
        } else {
            None
        };

        let email = PrescriptionEmail::build(doc, to, pdf_base64);
        match transport.send(&OutgoingEmail::Prescription(email)).await {
            Ok(()) => {
                info!(prescription_id = %doc.prescription_id, "Prescription email sent");
                DeliveryOutcome::Sent
            }
            Err(e) => {
                warn!(prescription_id = %doc.prescription_id, error = %e, "Prescription email failed");
                DeliveryOutcome::Failed(e.to_string())
            }
        }
    }

    /// Welcome a newly registered patient, naming their assigned doctor if
    /// any. Same skip rules as prescription emails.
    pub async fn send_welcome(&self, patient: &Patient, doctor: Option<&Doctor>) -> DeliveryOutcome {
        let Some(transport) = &self.transport else {
            return DeliveryOutcome::Skipped("email provider not configured".into());
        };
        let Some(to) = patient.contact_email() else {
            return DeliveryOutcome::Skipped("patient has no email address".into());
        };

        let email = PatientWelcomeEmail::build(patient, doctor, to);
        match transport.send(&OutgoingEmail::Welcome(email)).await {
            Ok(()) => {
                info!(patient_id = %patient.id, "Welcome email sent");
                DeliveryOutcome::Sent
            }
            Err(e) => {
                warn!(patient_id = %patient.id, error = %e, "Welcome email failed");
                DeliveryOutcome::Failed(e.to_string())
            }
        }
    }

    /// Boolean form: `true` only when the email went out.
    pub async fn send_prescription_email(&self, doc: &PrescriptionDocument) -> bool {
        self.send_prescription(doc, None).await.is_sent()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Gender;
    use crate::notify::document::fixtures::viral_fever;
    use chrono::NaiveDate;

    fn registered(email: Option<&str>) -> Patient {
        let mut patient = Patient::new(
            "Asha Verma".into(),
            Gender::Female,
            NaiveDate::from_ymd_opt(1990, 4, 12).unwrap(),
            "9876543210".into(),
        );
        patient.email = email.map(String::from);
        patient
    }

    #[test]
    fn test_config_requires_all_three_ids() {
        let mut config = EmailConfig::default();
        assert!(!config.is_configured());

        config.public_key = "pk".into();
        config.service_id = "service".into();
        assert!(!config.is_configured());

        config.template_id = "template".into();
        assert!(config.is_configured());

        config.service_id = "  ".into();
        assert!(!config.is_configured());
    }

    #[test]
    fn test_email_params() {
        let email = PrescriptionEmail::build(&viral_fever(), "asha@example.com", None);

        assert_eq!(email.to_email, "asha@example.com");
        assert_eq!(email.subject, "New Prescription from Dr. Anil Rao - 15/11/2025");
        assert_eq!(email.prescription_date, "15/11/2025");
        assert_eq!(email.notes, "Plenty of fluids");
        assert_eq!(email.pdf_attachment, "");
        assert!(email
            .medications
            .starts_with("1. Paracetamol - 500mg\n   Take: 1-0-1, After Food\n   Duration: 5 days\n\n2. ORS"));
        assert!(email.message.contains("Clinical Notes: Plenty of fluids"));
        assert!(email.message.contains("Diagnosis: Viral Fever"));

        let json = serde_json::to_value(&email).unwrap();
        assert!(json.get("pdf_attachment").is_some());
        assert!(json.get("patient_mrn").is_some());
    }

    #[test]
    fn test_email_without_notes() {
        let mut doc = viral_fever();
        doc.notes = None;
        let email = PrescriptionEmail::build(&doc, "asha@example.com", None);
        assert_eq!(email.notes, "N/A");
        assert!(!email.message.contains("Clinical Notes"));
    }

    #[tokio::test]
    async fn test_unconfigured_mailer_returns_false() {
        let mailer = PrescriptionMailer::from_config(&EmailConfig::default()).unwrap();
        assert!(!mailer.is_configured());

        let outcome = mailer.send_prescription(&viral_fever(), None).await;
        assert!(matches!(outcome, DeliveryOutcome::Skipped(_)));
        assert!(!mailer.send_prescription_email(&viral_fever()).await);
    }

    #[tokio::test]
    async fn test_missing_address_is_skip() {
        let transport = Arc::new(MockTransport::new());
        let mailer = PrescriptionMailer::with_transport(transport.clone());
        let mut doc = viral_fever();
        doc.patient_email = None;

        let outcome = mailer.send_prescription(&doc, None).await;
        assert_eq!(
            outcome,
            DeliveryOutcome::Skipped("patient has no email address".into())
        );
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn test_send_and_failure() {
        let transport = Arc::new(MockTransport::failing(1));
        let mailer = PrescriptionMailer::with_transport(transport.clone()).attach_pdf(true);

        let outcome = mailer.send_prescription(&viral_fever(), None).await;
        assert!(matches!(outcome, DeliveryOutcome::Failed(ref reason) if reason.contains("503")));

        assert!(mailer.send_prescription_email(&viral_fever()).await);
        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].pdf_attachment.starts_with("JVBER"));
    }

    #[test]
    fn test_welcome_params() {
        let patient = registered(Some("asha@example.com"));
        let doctor = Doctor::new("Anil Rao".into(), "Cardiology".into(), "KMC-1".into());

        let email = PatientWelcomeEmail::build(&patient, Some(&doctor), "asha@example.com");
        assert_eq!(email.subject, "Welcome to Sehat Rakshak - Your Healthcare Journey Begins");
        assert_eq!(email.patient_mrn, patient.mrn);
        assert_eq!(email.doctor_specialization, "Cardiology");
        assert!(email.message.contains(&format!("(MRN): {}", patient.mrn)));
        assert!(email.message.contains("Assigned Doctor: Dr. Anil Rao (Cardiology)"));

        let json = serde_json::to_value(OutgoingEmail::Welcome(email)).unwrap();
        assert_eq!(json["to_email"], "asha@example.com");
        assert!(json.get("patient_mobile").is_some());
    }

    #[test]
    fn test_welcome_without_doctor() {
        let patient = registered(Some("asha@example.com"));
        let email = PatientWelcomeEmail::build(&patient, None, "asha@example.com");
        assert_eq!(email.doctor_name, "");
        assert_eq!(email.doctor_specialization, "General Medicine");
        assert!(!email.message.contains("Assigned Doctor"));
    }

    #[tokio::test]
    async fn test_send_welcome() {
        let transport = Arc::new(MockTransport::new());
        let mailer = PrescriptionMailer::with_transport(transport.clone());

        let outcome = mailer.send_welcome(&registered(None), None).await;
        assert_eq!(
            outcome,
            DeliveryOutcome::Skipped("patient has no email address".into())
        );

        let outcome = mailer
            .send_welcome(&registered(Some("asha@example.com")), None)
            .await;
        assert!(outcome.is_sent());
        assert_eq!(transport.welcomes()[0].to_email, "asha@example.com");
        // Welcome mail is not a prescription email
        assert!(transport.sent().is_empty());

        let disabled = PrescriptionMailer::disabled();
        let outcome = disabled
            .send_welcome(&registered(Some("asha@example.com")), None)
            .await;
        assert!(matches!(outcome, DeliveryOutcome::Skipped(_)));
    }
}
