//! Pre-filled WhatsApp and mail client links.
//!
//! Pure string construction; nothing is sent. A link is produced whenever a
//! destination exists.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use super::document::{display_date, PrescriptionDocument};

/// Characters left unescaped by JavaScript's `encodeURIComponent`.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

fn encode(s: &str) -> String {
    utf8_percent_encode(s, URI_COMPONENT).to_string()
}

/// Numbered medication lines: `1. Name - dosage - 1-0-1 - After Food (5 days)`.
pub fn medication_summary(doc: &PrescriptionDocument) -> String {
    doc.medications
        .iter()
        .enumerate()
        .map(|(i, m)| {
            format!(
                "{}. {} - {} - {} - {} ({} days)",
                i + 1,
                m.medicine_name,
                m.dosage,
                m.frequency,
                m.timing,
                m.duration_days
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Message body for WhatsApp.
pub fn whatsapp_message(doc: &PrescriptionDocument) -> String {
    format!(
        "Hello {},\n\n\
         Your prescription has been created by Dr. {}.\n\n\
         Diagnosis: {}\n\n\
         Medications:\n{}\n\n\
         Please download your prescription from Sehat Rakshak portal.\n\n\
         Thank you!",
        doc.patient_name,
        doc.doctor_name,
        doc.diagnosis,
        medication_summary(doc)
    )
}

/// `https://wa.me/<digits>?text=<message>`, or `None` when the mobile number
/// has no digits.
pub fn whatsapp_link(doc: &PrescriptionDocument) -> Option<String> {
    let digits: String = doc
        .patient_mobile
        .chars()
        .filter(|c| c.is_ascii_digit())
        .collect();
    if digits.is_empty() {
        return None;
    }
    Some(format!(
        "https://wa.me/{}?text={}",
        digits,
        encode(&whatsapp_message(doc))
    ))
}

/// Subject line for the mail client share.
pub fn email_share_subject(doc: &PrescriptionDocument) -> String {
    format!(
        "Prescription from Dr. {} - {}",
        doc.doctor_name,
        doc.display_date()
    )
}

/// Body for the mail client share.
pub fn email_share_body(doc: &PrescriptionDocument) -> String {
    let notes = doc
        .notes
        .as_deref()
        .filter(|n| !n.trim().is_empty())
        .unwrap_or("N/A");
    let follow_up = doc
        .follow_up_date
        .map(display_date)
        .unwrap_or_else(|| "Not scheduled".to_string());

    format!(
        "Dear {},\n\n\
         Your prescription has been created.\n\n\
         Diagnosis: {}\n\n\
         Medications:\n{}\n\n\
         Clinical Notes: {}\n\n\
         Follow-up Date: {}\n\n\
         Best regards,\n\
         Dr. {}\n\
         Sehat Rakshak",
        doc.patient_name,
        doc.diagnosis,
        medication_summary(doc),
        notes,
        follow_up,
        doc.doctor_name
    )
}

/// `mailto:` link addressed to `to`, or to the patient's own email when `to`
/// is `None`. Returns `None` when there is no address.
pub fn mailto_link(doc: &PrescriptionDocument, to: Option<&str>) -> Option<String> {
    let address = to
        .or(doc.patient_email.as_deref())
        .map(str::trim)
        .filter(|a| !a.is_empty())?;
    Some(format!(
        "mailto:{}?subject={}&body={}",
        address,
        encode(&email_share_subject(doc)),
        encode(&email_share_body(doc))
    ))
}
