//! Red-flag symptom triage.
//!
//! Keyword matching is intentionally crude: it runs before the LLM call so an
//! emergency label never depends on the remote model answering.

/// Symptoms that require immediate escalation.
pub const RED_FLAG_SYMPTOMS: &[&str] = &[
    "chest pain",
    "difficulty breathing",
    "severe bleeding",
    "unconscious",
    "stroke",
    "heart attack",
    "severe headache",
    "high fever",
    "seizure",
    "allergic reaction",
    "swelling throat",
    "dizziness severe",
];

/// Returns true when the text mentions any red-flag symptom.
pub fn detect_red_flags(text: &str) -> bool {
    !matched_red_flags(text).is_empty()
}

/// All red-flag keywords found in the text, in list order.
pub fn matched_red_flags(text: &str) -> Vec<&'static str> {
    let lower = text.to_lowercase();
    RED_FLAG_SYMPTOMS
        .iter()
        .copied()
        .filter(|symptom| lower.contains(symptom))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_detects_case_insensitively() {
        assert!(detect_red_flags("Sudden CHEST PAIN after walking"));
        assert!(detect_red_flags("my child had a seizure"));
        assert!(!detect_red_flags("mild cold and runny nose"));
    }

    #[test]
    fn test_matched_keywords() {
        let found = matched_red_flags("high fever and severe headache");
        assert_eq!(found, vec!["severe headache", "high fever"]);
    }

    proptest! {
        #[test]
        fn prop_keyword_anywhere_is_flagged(prefix in "[a-z ]{0,20}", suffix in "[a-z ]{0,20}", idx in 0..RED_FLAG_SYMPTOMS.len()) {
            let text = format!("{}{}{}", prefix, RED_FLAG_SYMPTOMS[idx], suffix);
            prop_assert!(detect_red_flags(&text));
        }
    }
}
