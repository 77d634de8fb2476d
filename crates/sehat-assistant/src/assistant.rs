//! Patient-facing health assistant built on a [`ChatBackend`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::chat::{
    AssistantConfig, AssistantResult, ChatBackend, ChatMessage, OpenAiBackend,
};
use crate::prompts::{
    make_explanation_prompt, make_symptoms_prompt, make_translation_prompt,
    make_whatsapp_prompt, Language, PrescriptionBrief, GENERAL_SYSTEM_PROMPT,
    PRESCRIPTION_SYSTEM_PROMPT, SYMPTOMS_SYSTEM_PROMPT, TRANSLATION_SYSTEM_PROMPT,
    WHATSAPP_SYSTEM_PROMPT,
};
use crate::triage::matched_red_flags;

/// Reply used when no API key is configured.
pub const NOT_CONFIGURED_MESSAGE: &str =
    "AI Assistant is not configured. Please add an API key to the assistant configuration.";

/// Reply used when a red-flag query cannot reach the model.
pub const EMERGENCY_FALLBACK_MESSAGE: &str =
    "Your symptoms may need urgent care. Please contact your doctor or the nearest emergency service immediately.";

/// Translated copies of a reply.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Translation {
    pub english: String,
    pub hindi: String,
}

/// What the assistant answered, plus the triage verdict.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssistantReply {
    /// Prompt text as sent (stored with the interaction)
    pub query: String,
    pub message: String,
    pub is_red_flag: bool,
    pub red_flags: Vec<String>,
    pub language: Language,
    pub translation: Option<Translation>,
}

/// Health assistant. Without a backend every call returns
/// [`NOT_CONFIGURED_MESSAGE`].
#[derive(Clone, Default)]
pub struct HealthAssistant {
    backend: Option<Arc<dyn ChatBackend>>,
}

impl HealthAssistant {
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self {
            backend: Some(backend),
        }
    }

    /// Build from config, using the HTTP backend when an API key is present.
    pub fn from_config(config: &AssistantConfig) -> AssistantResult<Self> {
        if !config.is_configured() {
            tracing::info!("assistant API key missing; assistant disabled");
            return Ok(Self::default());
        }
        Ok(Self::new(Arc::new(OpenAiBackend::new(config.clone())?)))
    }

    pub fn is_configured(&self) -> bool {
        self.backend.is_some()
    }

    async fn call(&self, system: &str, user: &str) -> AssistantResult<String> {
        let Some(backend) = &self.backend else {
            return Ok(NOT_CONFIGURED_MESSAGE.to_string());
        };
        let messages = [ChatMessage::system(system), ChatMessage::user(user)];
        backend.complete(&messages).await
    }

    /// Same as `call`, but a red-flag query never surfaces an error.
    async fn call_triaged(
        &self,
        system: &str,
        user: &str,
        red_flag: bool,
    ) -> AssistantResult<String> {
        match self.call(system, user).await {
            Ok(message) => Ok(message),
            Err(e) if red_flag => {
                tracing::error!(error = %e, "assistant call failed for red-flag query");
                Ok(EMERGENCY_FALLBACK_MESSAGE.to_string())
            }
            Err(e) => Err(e),
        }
    }

    /// Answer a free-form health question.
    pub async fn ask_health_question(
        &self,
        query: &str,
        language: Language,
    ) -> AssistantResult<AssistantReply> {
        let red_flags = matched_red_flags(query);
        let is_red_flag = !red_flags.is_empty();
        if is_red_flag {
            tracing::warn!(?red_flags, "red-flag symptoms in health question");
        }

        let message = self
            .call_triaged(GENERAL_SYSTEM_PROMPT, query, is_red_flag)
            .await?;

        Ok(AssistantReply {
            query: query.to_string(),
            message,
            is_red_flag,
            red_flags: red_flags.into_iter().map(str::to_string).collect(),
            language,
            translation: None,
        })
    }

    /// Explain a prescription in plain language.
    pub async fn explain_prescription(
        &self,
        brief: &PrescriptionBrief,
        language: Language,
    ) -> AssistantResult<AssistantReply> {
        let prompt = make_explanation_prompt(brief, language);
        let message = self.call(PRESCRIPTION_SYSTEM_PROMPT, &prompt).await?;
        Ok(AssistantReply {
            query: prompt,
            message,
            is_red_flag: false,
            red_flags: Vec::new(),
            language,
            translation: None,
        })
    }

    /// Evaluate reported symptoms, escalating red flags.
    pub async fn analyze_symptoms(
        &self,
        symptoms: &str,
        language: Language,
    ) -> AssistantResult<AssistantReply> {
        let red_flags = matched_red_flags(symptoms);
        let is_red_flag = !red_flags.is_empty();
        if is_red_flag {
            tracing::warn!(?red_flags, "red-flag symptoms reported");
        }

        let prompt = make_symptoms_prompt(symptoms, is_red_flag, language);
        let message = self
            .call_triaged(SYMPTOMS_SYSTEM_PROMPT, &prompt, is_red_flag)
            .await?;

        Ok(AssistantReply {
            query: symptoms.to_string(),
            message,
            is_red_flag,
            red_flags: red_flags.into_iter().map(str::to_string).collect(),
            language,
            translation: None,
        })
    }

    /// Short WhatsApp-ready summary of a prescription.
    pub async fn whatsapp_summary(
        &self,
        brief: &PrescriptionBrief,
        language: Language,
    ) -> AssistantResult<String> {
        let prompt = make_whatsapp_prompt(brief, language);
        self.call(WHATSAPP_SYSTEM_PROMPT, &prompt).await
    }

    /// Translate medical text between English and Hindi.
    pub async fn translate(
        &self,
        text: &str,
        from: Language,
        to: Language,
    ) -> AssistantResult<String> {
        if from == to {
            return Ok(text.to_string());
        }
        let prompt = make_translation_prompt(text, from, to);
        self.call(TRANSLATION_SYSTEM_PROMPT, &prompt).await
    }

    /// English answer plus a Hindi translation of it.
    pub async fn bilingual_reply(&self, query: &str) -> AssistantResult<AssistantReply> {
        let mut reply = self.ask_health_question(query, Language::English).await?;
        let hindi = self
            .translate(&reply.message, Language::English, Language::Hindi)
            .await?;
        reply.translation = Some(Translation {
            english: reply.message.clone(),
            hindi,
        });
        Ok(reply)
    }
}
