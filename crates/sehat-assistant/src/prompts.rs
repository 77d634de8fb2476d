//! Prompt templates for the health assistant.

use serde::{Deserialize, Serialize};

/// Reply language requested by the patient.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    English,
    Hindi,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::English => "english",
            Language::Hindi => "hindi",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "english" | "en" => Some(Language::English),
            "hindi" | "hi" => Some(Language::Hindi),
            _ => None,
        }
    }
}

/// General system prompt for open health questions.
pub const GENERAL_SYSTEM_PROMPT: &str = r#"You are Sehat Rakshak AI Health Assistant. You help patients understand their prescriptions, medications, and provide basic health guidance.

Guidelines:
- Be empathetic and supportive
- Explain medical terms in simple language
- Always remind patients to consult their doctor for serious concerns
- Detect emergency symptoms and escalate immediately
- Provide information in both English and Hindi when needed
- Never provide specific medical diagnoses
- Focus on medication adherence and general wellness"#;

/// System prompt used when explaining a prescription.
pub const PRESCRIPTION_SYSTEM_PROMPT: &str = r#"You are helping a patient understand their prescription. Explain:
- What each medicine is for
- How to take it (dosage, timing, with/without food)
- Possible side effects
- When to expect improvement
- Importance of completing the full course
Keep explanations simple and in both English and Hindi."#;

/// System prompt for symptom evaluation.
pub const SYMPTOMS_SYSTEM_PROMPT: &str = r#"You are evaluating patient-reported symptoms.
CRITICAL: If you detect any emergency symptoms (chest pain, difficulty breathing, severe bleeding, stroke symptoms, etc.), immediately flag it as a red flag emergency.
For non-emergency symptoms, provide general guidance and recommend consulting a doctor if symptoms persist."#;

/// System prompt for translation between English and Hindi.
pub const TRANSLATION_SYSTEM_PROMPT: &str = "Translate the following medical instructions from English to Hindi and vice versa. Maintain medical accuracy while using simple, patient-friendly language.";

/// System prompt for WhatsApp summaries.
pub const WHATSAPP_SYSTEM_PROMPT: &str =
    "You create concise, patient-friendly medication summaries for WhatsApp.";

/// One medication line as the assistant sees it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MedicationBrief {
    pub medicine_name: String,
    pub dosage: String,
    pub frequency: String,
    pub timing: String,
    pub duration_days: u32,
    pub instructions: Option<String>,
}

/// Prescription summary handed to the assistant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PrescriptionBrief {
    pub patient_name: String,
    pub diagnosis: String,
    pub notes: Option<String>,
    pub medications: Vec<MedicationBrief>,
}

/// Build the user prompt asking for a prescription explanation.
pub fn make_explanation_prompt(brief: &PrescriptionBrief, language: Language) -> String {
    let medications = brief
        .medications
        .iter()
        .enumerate()
        .map(|(i, med)| {
            let extra = med
                .instructions
                .as_deref()
                .filter(|s| !s.trim().is_empty())
                .map(|s| format!(" ({})", s))
                .unwrap_or_default();
            format!(
                "{}. {} - {}, {}, {}, for {} days{}",
                i + 1,
                med.medicine_name,
                med.dosage,
                med.frequency,
                med.timing,
                med.duration_days,
                extra
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let notes = brief
        .notes
        .as_deref()
        .filter(|n| !n.trim().is_empty())
        .map(|n| format!("Doctor's Notes: {}", n))
        .unwrap_or_default();

    let script_hint = match language {
        Language::Hindi => "Provide the explanation in Hindi (Devanagari script).",
        Language::English => "",
    };

    format!(
        r#"Explain this prescription in simple {} language:

Diagnosis: {}
Medications:
{}

{}

Please explain:
1. What is the diagnosis in simple terms
2. What each medicine does
3. How to take them properly
4. What to expect during treatment
5. Any important precautions

{}"#,
        language.as_str(),
        brief.diagnosis,
        medications,
        notes,
        script_hint
    )
}

/// Build the user prompt for a short WhatsApp-friendly summary.
pub fn make_whatsapp_prompt(brief: &PrescriptionBrief, language: Language) -> String {
    let medications = brief
        .medications
        .iter()
        .enumerate()
        .map(|(i, med)| {
            format!(
                "{}. {} - {}\n   {}, {}",
                i + 1,
                med.medicine_name,
                med.dosage,
                med.frequency,
                med.timing
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    let script_hint = match language {
        Language::Hindi => "Use Hindi (Devanagari script).",
        Language::English => "",
    };

    format!(
        r#"Create a short, WhatsApp-friendly message (max 160 words) summarizing this prescription in {}:

Patient: {}
Diagnosis: {}
Medications:
{}

Format: Friendly, easy to understand, include emoji for clarity.
{}"#,
        language.as_str(),
        brief.patient_name,
        brief.diagnosis,
        medications,
        script_hint
    )
}

/// Build the user prompt for symptom analysis.
pub fn make_symptoms_prompt(symptoms: &str, red_flag: bool, language: Language) -> String {
    format!(
        "Patient reports these symptoms: {}\n\n{}Provide guidance in {} language.",
        symptoms,
        if red_flag { "EMERGENCY DETECTED! " } else { "" },
        language.as_str()
    )
}

/// Build the user prompt for translation.
pub fn make_translation_prompt(text: &str, from: Language, to: Language) -> String {
    format!(
        "Translate this medical text from {} to {}. Maintain accuracy and use patient-friendly language:\n\n{}",
        from.as_str(),
        to.as_str(),
        text
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn brief() -> PrescriptionBrief {
        PrescriptionBrief {
            patient_name: "Asha Verma".into(),
            diagnosis: "Viral Fever".into(),
            notes: Some("Plenty of fluids".into()),
            medications: vec![
                MedicationBrief {
                    medicine_name: "Paracetamol".into(),
                    dosage: "500mg".into(),
                    frequency: "1-0-1".into(),
                    timing: "After Food".into(),
                    duration_days: 5,
                    instructions: Some("Take with water".into()),
                },
                MedicationBrief {
                    medicine_name: "Cetirizine".into(),
                    dosage: "10mg".into(),
                    frequency: "0-0-1".into(),
                    timing: "After Food".into(),
                    duration_days: 3,
                    instructions: None,
                },
            ],
        }
    }

    #[test]
    fn test_explanation_prompt_lists_medications() {
        let prompt = make_explanation_prompt(&brief(), Language::English);
        assert!(prompt.contains("Diagnosis: Viral Fever"));
        assert!(prompt.contains("1. Paracetamol - 500mg, 1-0-1, After Food, for 5 days (Take with water)"));
        assert!(prompt.contains("2. Cetirizine - 10mg, 0-0-1, After Food, for 3 days"));
        assert!(prompt.contains("Doctor's Notes: Plenty of fluids"));
        assert!(!prompt.contains("Devanagari"));
    }

    #[test]
    fn test_hindi_prompt_requests_devanagari() {
        let prompt = make_explanation_prompt(&brief(), Language::Hindi);
        assert!(prompt.contains("simple hindi language"));
        assert!(prompt.contains("Devanagari"));
    }

    #[test]
    fn test_symptoms_prompt_marks_emergency() {
        let prompt = make_symptoms_prompt("chest pain since morning", true, Language::English);
        assert!(prompt.contains("EMERGENCY DETECTED!"));

        let prompt = make_symptoms_prompt("mild cough", false, Language::English);
        assert!(!prompt.contains("EMERGENCY"));
    }

    #[test]
    fn test_language_parse() {
        assert_eq!(Language::parse("Hindi"), Some(Language::Hindi));
        assert_eq!(Language::parse(" en "), Some(Language::English));
        assert_eq!(Language::parse("tamil"), None);
    }
}
