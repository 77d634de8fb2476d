//! End-to-end prescription workflow through the `SehatCore` facade.

use std::sync::Arc;
use std::time::Duration;

use sehat_assistant::{HealthAssistant, MockBackend, NOT_CONFIGURED_MESSAGE};
use sehat_core::notify::MockTransport;
use sehat_core::{
    open_database_in_memory, AppConfig, Database, FfiComposedPrescription, FfiNewDoctor,
    FfiNewMedication, FfiNewPatient, FfiOutboxEntry, PrescriptionMailer, SehatCore, SehatError,
};

fn new_patient(email: Option<&str>) -> FfiNewPatient {
    FfiNewPatient {
        full_name: "Asha Verma".to_string(),
        gender: "female".to_string(),
        date_of_birth: "1990-04-12".to_string(),
        mobile: "+91 98765-43210".to_string(),
        email: email.map(String::from),
        address: None,
        allergies: vec!["Penicillin".to_string()],
        blood_group: Some("B+".to_string()),
        emergency_contact_name: None,
        emergency_contact_mobile: None,
        hospital_id: None,
        assigned_doctor_id: None,
    }
}

fn new_doctor() -> FfiNewDoctor {
    FfiNewDoctor {
        full_name: "Anil Rao".to_string(),
        specialization: "General Medicine".to_string(),
        qualification: "MBBS, MD".to_string(),
        license_number: "KMC-10442".to_string(),
        hospital_id: None,
    }
}

fn medication(name: &str, dosage: &str, frequency: &str, duration_days: u32) -> FfiNewMedication {
    FfiNewMedication {
        medicine_name: name.to_string(),
        dosage: dosage.to_string(),
        frequency: frequency.to_string(),
        timing: "After Food".to_string(),
        duration_days,
        instructions: None,
    }
}

fn viral_fever() -> FfiComposedPrescription {
    FfiComposedPrescription {
        diagnosis: "Viral Fever".to_string(),
        notes: Some("Plenty of fluids".to_string()),
        follow_up_date: Some("2025-11-22".to_string()),
        medications: vec![
            medication("Paracetamol", "500mg", "1-0-1", 5),
            medication("ORS", "1 sachet", "1-1-1", 3),
        ],
    }
}

/// Core with a recording email transport and no assistant. Welcome emails
/// are off so only prescription emails reach the transport.
fn core_with_mailer(transport: Arc<MockTransport>, max_attempts: u32) -> SehatCore {
    let mut config = AppConfig::default();
    config.notifications.max_attempts = max_attempts;
    config.notifications.welcome_email = false;
    SehatCore::with_services(
        Database::open_in_memory().unwrap(),
        config,
        PrescriptionMailer::with_transport(transport),
        HealthAssistant::default(),
    )
    .unwrap()
}

/// Poll the outbox until the background delivery has recorded an attempt.
fn wait_for_attempt(core: &SehatCore, prescription_id: &str) -> FfiOutboxEntry {
    for _ in 0..200 {
        let entries = core
            .notifications_for_prescription(prescription_id.to_string())
            .unwrap();
        if let Some(entry) = entries.into_iter().find(|e| e.attempts > 0) {
            return entry;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    panic!("background email delivery never ran");
}

#[test]
fn test_viral_fever_prescription_round_trip() {
    let core = open_database_in_memory().unwrap();
    let doctor = core.create_doctor(new_doctor()).unwrap();
    let patient = core.create_patient(new_patient(None)).unwrap();

    let receipt = core
        .submit_prescription(
            patient.id.clone(),
            doctor.id.clone(),
            viral_fever(),
            "2025-11-15".to_string(),
        )
        .unwrap();
    assert_eq!(receipt.prescription_date, "2025-11-15");
    assert_eq!(receipt.medication_ids.len(), 2);
    assert!(!receipt.email_queued);

    let prescriptions = core.list_prescriptions(patient.id.clone(), None).unwrap();
    assert_eq!(prescriptions.len(), 1);
    let rx = &prescriptions[0];
    assert_eq!(rx.id, receipt.prescription_id);
    assert_eq!(rx.diagnosis, "Viral Fever");
    assert_eq!(rx.follow_up_date.as_deref(), Some("2025-11-22"));
    assert_eq!(rx.medications.len(), 2);

    let paracetamol = &rx.medications[0];
    assert_eq!(paracetamol.medicine_name, "Paracetamol");
    assert_eq!(paracetamol.start_date, "2025-11-15");
    assert_eq!(paracetamol.end_date, "2025-11-20");
    assert_eq!(paracetamol.frequency, "1-0-1");
    let ors = &rx.medications[1];
    assert_eq!(ors.position, 1);
    assert_eq!(ors.end_date, "2025-11-18");
}

#[test]
fn test_duplicate_warning_mentions_end_date_and_does_not_block() {
    let core = open_database_in_memory().unwrap();
    let doctor = core.create_doctor(new_doctor()).unwrap();
    let patient = core.create_patient(new_patient(None)).unwrap();

    let earlier = FfiComposedPrescription {
        diagnosis: "Dengue (suspected)".to_string(),
        notes: None,
        follow_up_date: None,
        medications: vec![medication("Paracetamol", "650mg", "1-1-1", 30)],
    };
    core.submit_prescription(patient.id.clone(), doctor.id.clone(), earlier, "2025-11-01".to_string())
        .unwrap();

    let warning = core
        .check_duplicate(patient.id.clone(), "paracetamol".to_string(), "2025-11-15".to_string())
        .unwrap()
        .expect("active paracetamol should be flagged");
    assert_eq!(warning.active_until, "2025-12-01");
    assert!(warning.message.contains("2025-12-01"));
    assert!(warning.message.starts_with("\"paracetamol\" is already prescribed"));

    assert!(core
        .check_duplicate(patient.id.clone(), "   ".to_string(), "2025-11-15".to_string())
        .unwrap()
        .is_none());

    // Advisory only: the new prescription still goes through
    core.submit_prescription(patient.id.clone(), doctor.id, viral_fever(), "2025-11-15".to_string())
        .unwrap();
    assert_eq!(core.list_prescriptions(patient.id.clone(), None).unwrap().len(), 2);
    assert_eq!(core.list_prescriptions(patient.id, Some(1)).unwrap()[0].diagnosis, "Viral Fever");
}

#[test]
fn test_invalid_prescriptions_are_rejected_before_any_write() {
    let core = open_database_in_memory().unwrap();
    let doctor = core.create_doctor(new_doctor()).unwrap();
    let patient = core.create_patient(new_patient(None)).unwrap();

    let mut empty = viral_fever();
    empty.medications.clear();
    let err = core
        .submit_prescription(patient.id.clone(), doctor.id.clone(), empty, "2025-11-15".to_string())
        .unwrap_err();
    assert!(matches!(err, SehatError::ValidationError(_)));

    let mut zero_days = viral_fever();
    zero_days.medications[1].duration_days = 0;
    zero_days.medications[0].dosage = "  ".to_string();
    let err = core
        .submit_prescription(patient.id.clone(), doctor.id.clone(), zero_days, "2025-11-15".to_string())
        .unwrap_err();
    match err {
        SehatError::ValidationError(message) => {
            assert!(message.contains("; "), "both problems reported: {}", message);
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let mut bad_code = viral_fever();
    bad_code.medications[0].frequency = "2-0-2".to_string();
    let err = core
        .submit_prescription(patient.id.clone(), doctor.id, bad_code, "2025-11-15".to_string())
        .unwrap_err();
    assert!(matches!(err, SehatError::InvalidInput(_)));

    assert!(core.list_prescriptions(patient.id, None).unwrap().is_empty());
}

#[test]
fn test_inactive_patient_and_unknown_doctor_are_rejected() {
    let core = open_database_in_memory().unwrap();
    let doctor = core.create_doctor(new_doctor()).unwrap();
    let patient = core.create_patient(new_patient(None)).unwrap();

    let err = core
        .submit_prescription(patient.id.clone(), "no-such-doctor".to_string(), viral_fever(), "2025-11-15".to_string())
        .unwrap_err();
    assert!(matches!(err, SehatError::NotFound(_)));

    assert!(core.deactivate_patient(patient.id.clone()).unwrap());
    let err = core
        .submit_prescription(patient.id.clone(), doctor.id, viral_fever(), "2025-11-15".to_string())
        .unwrap_err();
    assert!(matches!(err, SehatError::InvalidInput(_)));
    assert!(core.list_prescriptions(patient.id, None).unwrap().is_empty());
}

#[test]
fn test_unconfigured_email_returns_false() {
    let core = open_database_in_memory().unwrap();
    let doctor = core.create_doctor(new_doctor()).unwrap();
    let patient = core.create_patient(new_patient(Some("asha@example.com"))).unwrap();

    let receipt = core
        .submit_prescription(patient.id, doctor.id, viral_fever(), "2025-11-15".to_string())
        .unwrap();
    assert!(receipt.email_queued);

    let sent = core
        .send_prescription_email(receipt.prescription_id.clone())
        .unwrap();
    assert!(!sent);
    // The prescription itself is untouched
    assert!(core.get_prescription(receipt.prescription_id).unwrap().is_some());
}

#[test]
fn test_email_is_delivered_in_background_after_commit() {
    let transport = Arc::new(MockTransport::new());
    let core = core_with_mailer(Arc::clone(&transport), 3);
    let doctor = core.create_doctor(new_doctor()).unwrap();
    let patient = core.create_patient(new_patient(Some("asha@example.com"))).unwrap();

    let receipt = core
        .submit_prescription(patient.id, doctor.id, viral_fever(), "2025-11-15".to_string())
        .unwrap();

    let entry = wait_for_attempt(&core, &receipt.prescription_id);
    assert_eq!(entry.status, "sent");
    assert_eq!(entry.recipient, "asha@example.com");

    let sent = transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to_email, "asha@example.com");
    assert_eq!(sent[0].diagnosis, "Viral Fever");

    // Already delivered: reported as sent, not sent again
    assert!(core.send_prescription_email(receipt.prescription_id).unwrap());
    assert_eq!(transport.sent().len(), 1);
}

#[test]
fn test_explicit_send_during_background_delivery_sends_once() {
    let transport = Arc::new(MockTransport::new().with_delay(Duration::from_millis(150)));
    let core = core_with_mailer(Arc::clone(&transport), 3);
    let doctor = core.create_doctor(new_doctor()).unwrap();
    let patient = core.create_patient(new_patient(Some("asha@example.com"))).unwrap();

    let receipt = core
        .submit_prescription(patient.id, doctor.id, viral_fever(), "2025-11-15".to_string())
        .unwrap();
    assert!(core
        .send_prescription_email(receipt.prescription_id.clone())
        .unwrap());

    let entry = wait_for_attempt(&core, &receipt.prescription_id);
    assert_eq!(entry.status, "sent");
    assert_eq!(entry.attempts, 1);
    assert_eq!(transport.sent().len(), 1);
    assert!(core.retry_pending_notifications().unwrap().is_empty());
}

#[test]
fn test_registration_sends_welcome_email() {
    let transport = Arc::new(MockTransport::new());
    let core = SehatCore::with_services(
        Database::open_in_memory().unwrap(),
        AppConfig::default(),
        PrescriptionMailer::with_transport(transport.clone()),
        HealthAssistant::default(),
    )
    .unwrap();
    let doctor = core.create_doctor(new_doctor()).unwrap();

    let mut input = new_patient(Some("asha@example.com"));
    input.assigned_doctor_id = Some(doctor.id.clone());
    let patient = core.create_patient(input).unwrap();

    let mut welcomes = transport.welcomes();
    for _ in 0..200 {
        if !welcomes.is_empty() {
            break;
        }
        std::thread::sleep(Duration::from_millis(10));
        welcomes = transport.welcomes();
    }
    assert_eq!(welcomes.len(), 1);
    assert_eq!(welcomes[0].to_email, "asha@example.com");
    assert_eq!(welcomes[0].patient_mrn, patient.mrn);
    assert_eq!(welcomes[0].doctor_name, "Anil Rao");
    assert_eq!(welcomes[0].doctor_specialization, "General Medicine");

    // No address: nothing to send
    let without_email = core.create_patient(new_patient(None)).unwrap();
    assert!(!core.send_welcome_email(without_email.id).unwrap());

    assert!(core.send_welcome_email(patient.id).unwrap());
    assert_eq!(transport.welcomes().len(), 2);
    assert!(transport.sent().is_empty());
}

#[test]
fn test_welcome_email_unconfigured_returns_false() {
    let core = open_database_in_memory().unwrap();
    let patient = core.create_patient(new_patient(Some("asha@example.com"))).unwrap();
    assert!(!core.send_welcome_email(patient.id).unwrap());
    assert!(matches!(
        core.send_welcome_email("missing".to_string()),
        Err(SehatError::NotFound(_))
    ));
}

#[test]
fn test_failed_email_is_retried_until_the_attempt_limit() {
    let transport = Arc::new(MockTransport::failing(5));
    let core = core_with_mailer(Arc::clone(&transport), 2);
    let doctor = core.create_doctor(new_doctor()).unwrap();
    let patient = core.create_patient(new_patient(Some("asha@example.com"))).unwrap();

    let receipt = core
        .submit_prescription(patient.id, doctor.id, viral_fever(), "2025-11-15".to_string())
        .unwrap();

    let entry = wait_for_attempt(&core, &receipt.prescription_id);
    assert_eq!(entry.status, "pending");
    assert_eq!(entry.attempts, 1);
    assert!(entry.last_error.is_some());

    let reports = core.retry_pending_notifications().unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].status, "failed");

    let entries = core
        .notifications_for_prescription(receipt.prescription_id.clone())
        .unwrap();
    assert_eq!(entries[0].status, "failed");
    assert_eq!(entries[0].attempts, 2);

    assert!(core.retry_pending_notifications().unwrap().is_empty());
    assert!(transport.sent().is_empty());
    assert!(core.get_prescription(receipt.prescription_id).unwrap().is_some());
}

#[test]
fn test_pdf_projections_and_share_links() {
    let core = open_database_in_memory().unwrap();
    let doctor = core.create_doctor(new_doctor()).unwrap();
    let patient = core.create_patient(new_patient(Some("asha@example.com"))).unwrap();
    let receipt = core
        .submit_prescription(patient.id, doctor.id, viral_fever(), "2025-11-15".to_string())
        .unwrap();
    let id = receipt.prescription_id;

    let bytes = core.prescription_pdf(id.clone()).unwrap();
    assert!(bytes.starts_with(b"%PDF"));

    let url = core.prescription_pdf_data_url(id.clone()).unwrap();
    assert!(url.starts_with("data:application/pdf;base64,"));

    let dir = tempfile::tempdir().unwrap();
    let path = core
        .save_prescription_pdf(id.clone(), Some(dir.path().to_string_lossy().into_owned()))
        .unwrap();
    assert!(path.ends_with(&format!("Prescription_{}_2025-11-15.pdf", patient.mrn)));
    assert!(std::path::Path::new(&path).exists());

    let whatsapp = core.whatsapp_link(id.clone()).unwrap().unwrap();
    assert!(whatsapp.starts_with("https://wa.me/919876543210?text="));

    let mailto = core.mailto_link(id.clone(), None).unwrap().unwrap();
    assert!(mailto.starts_with("mailto:asha@example.com?subject="));
    let other = core
        .mailto_link(id.clone(), Some("family@example.com".to_string()))
        .unwrap()
        .unwrap();
    assert!(other.starts_with("mailto:family@example.com?"));

    // Sharing leaves stored data alone
    assert_eq!(core.get_prescription(id).unwrap().unwrap().medications.len(), 2);

    let err = core.prescription_pdf("missing".to_string()).unwrap_err();
    assert!(matches!(err, SehatError::NotFound(_)));
}

#[test]
fn test_patient_record_store() {
    let core = open_database_in_memory().unwrap();
    let patient = core.create_patient(new_patient(Some("asha@example.com"))).unwrap();
    assert!(patient.mrn.starts_with("MRN"));

    let by_mrn = core.get_patient_by_mrn(patient.mrn.clone()).unwrap().unwrap();
    assert_eq!(by_mrn.id, patient.id);
    assert_eq!(core.search_patients("asha".to_string(), 10).unwrap().len(), 1);

    let updated = core
        .update_patient(sehat_core::FfiPatientUpdate {
            id: patient.id.clone(),
            full_name: "Asha Verma Singh".to_string(),
            mobile: "9000011111".to_string(),
            email: Some("  ".to_string()),
            address: Some("12 MG Road, Pune".to_string()),
            allergies: vec![],
            blood_group: Some("B+".to_string()),
            emergency_contact_name: None,
            emergency_contact_mobile: None,
            assigned_doctor_id: None,
        })
        .unwrap();
    assert_eq!(updated.full_name, "Asha Verma Singh");
    assert_eq!(updated.email, None);
    assert_eq!(updated.mrn, patient.mrn);
    assert_eq!(updated.date_of_birth, "1990-04-12");

    assert!(core.discharge_patient(patient.id.clone()).unwrap());
    let discharged = core.get_patient(patient.id.clone()).unwrap().unwrap();
    assert!(discharged.is_discharged);
    assert!(discharged.discharge_date.is_some());

    assert!(core.deactivate_patient(patient.id.clone()).unwrap());
    assert!(core.list_active_patients().unwrap().is_empty());
    // Soft delete: still readable
    assert!(core.get_patient(patient.id).unwrap().is_some());
}

#[test]
fn test_assistant_interactions_are_stored_for_patients() {
    let core = open_database_in_memory().unwrap();
    let patient = core.create_patient(new_patient(None)).unwrap();

    let reply = core
        .ask_health_question(
            "I have chest pain since morning".to_string(),
            "english".to_string(),
            Some(patient.id.clone()),
        )
        .unwrap();
    assert!(reply.is_red_flag);
    assert_eq!(reply.message, NOT_CONFIGURED_MESSAGE);

    core.ask_health_question("What is a normal BP?".to_string(), "en".to_string(), None)
        .unwrap();

    let stored = core.interactions_for_patient(patient.id).unwrap();
    assert_eq!(stored.len(), 1);
    assert!(stored[0].is_red_flag);

    assert!(matches!(
        core.ask_health_question("hi".to_string(), "klingon".to_string(), None),
        Err(SehatError::InvalidInput(_))
    ));
}

#[test]
fn test_explain_prescription_uses_stored_medications() {
    let backend = Arc::new(MockBackend::with_replies(["Take paracetamol twice a day."]));
    let core = SehatCore::with_services(
        Database::open_in_memory().unwrap(),
        AppConfig::default(),
        PrescriptionMailer::disabled(),
        HealthAssistant::new(backend.clone()),
    )
    .unwrap();
    let doctor = core.create_doctor(new_doctor()).unwrap();
    let patient = core.create_patient(new_patient(None)).unwrap();
    let receipt = core
        .submit_prescription(patient.id.clone(), doctor.id, viral_fever(), "2025-11-15".to_string())
        .unwrap();

    let reply = core
        .explain_prescription(receipt.prescription_id, "english".to_string())
        .unwrap();
    assert_eq!(reply.message, "Take paracetamol twice a day.");

    let requests = backend.requests();
    assert_eq!(requests.len(), 1);
    let prompt = &requests[0][1].content;
    assert!(prompt.contains("Paracetamol"));
    assert!(prompt.contains("ORS"));

    assert_eq!(core.interactions_for_patient(patient.id).unwrap().len(), 1);
}
