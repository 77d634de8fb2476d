//! End-to-end assistant flows against the mock backend.

use std::sync::Arc;

use sehat_assistant::{
    HealthAssistant, Language, MedicationBrief, MockBackend, PrescriptionBrief,
    PRESCRIPTION_SYSTEM_PROMPT, WHATSAPP_SYSTEM_PROMPT,
};

fn viral_fever() -> PrescriptionBrief {
    PrescriptionBrief {
        patient_name: "Meena Iyer".to_string(),
        diagnosis: "Viral Fever".to_string(),
        notes: Some("Review if fever persists beyond 3 days".to_string()),
        medications: vec![
            MedicationBrief {
                medicine_name: "Paracetamol".to_string(),
                dosage: "500mg".to_string(),
                frequency: "1-0-1".to_string(),
                timing: "After Food".to_string(),
                duration_days: 5,
                instructions: None,
            },
            MedicationBrief {
                medicine_name: "ORS".to_string(),
                dosage: "1 sachet".to_string(),
                frequency: "1-1-1".to_string(),
                timing: "With Food".to_string(),
                duration_days: 3,
                instructions: Some("Dissolve in 1L water".to_string()),
            },
        ],
    }
}

#[tokio::test]
async fn test_whatsapp_summary_uses_summary_prompt() {
    let backend = Arc::new(MockBackend::with_replies(["Get well soon!"]));
    let assistant = HealthAssistant::new(backend.clone());

    let summary = assistant
        .whatsapp_summary(&viral_fever(), Language::Hindi)
        .await
        .unwrap();
    assert_eq!(summary, "Get well soon!");

    let requests = backend.requests();
    assert_eq!(requests[0][0].content, WHATSAPP_SYSTEM_PROMPT);
    assert!(requests[0][1].content.contains("Patient: Meena Iyer"));
    assert!(requests[0][1].content.contains("Devanagari"));
}

#[tokio::test]
async fn test_explanation_in_hindi() {
    let backend = Arc::new(MockBackend::with_replies(["समझाया गया"]));
    let assistant = HealthAssistant::new(backend.clone());

    let reply = assistant
        .explain_prescription(&viral_fever(), Language::Hindi)
        .await
        .unwrap();

    assert_eq!(reply.language, Language::Hindi);
    assert_eq!(backend.requests()[0][0].content, PRESCRIPTION_SYSTEM_PROMPT);
    assert!(reply.query.contains("(Dissolve in 1L water)"));
}
