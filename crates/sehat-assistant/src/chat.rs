//! Chat completion backends.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default OpenAI-compatible endpoint.
pub const DEFAULT_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Default chat model.
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// Returned when the backend answers without any choice.
pub const EMPTY_COMPLETION: &str = "No response from AI";

/// Assistant errors.
#[derive(Error, Debug)]
pub enum AssistantError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("LLM API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("LLM request timed out after {0}s")]
    Timeout(u64),
}

pub type AssistantResult<T> = Result<T, AssistantError>;

/// Connection settings for the LLM provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AssistantConfig {
    pub api_key: String,
    pub api_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_url: DEFAULT_API_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.7,
            max_tokens: 500,
            timeout_secs: 30,
        }
    }
}

impl AssistantConfig {
    /// An empty API key means the assistant is switched off.
    pub fn is_configured(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

/// Speaker of a chat message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// A single chat message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

/// Anything that turns a message list into a reply.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> AssistantResult<String>;
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: Option<CompletionMessage>,
}

#[derive(Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

/// Extract the first choice's text from a chat completion body.
pub fn parse_completion(body: &str) -> AssistantResult<String> {
    let response: CompletionResponse = serde_json::from_str(body)?;
    Ok(response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message)
        .and_then(|m| m.content)
        .unwrap_or_else(|| EMPTY_COMPLETION.to_string()))
}

/// OpenAI-compatible HTTP backend.
pub struct OpenAiBackend {
    client: reqwest::Client,
    config: AssistantConfig,
}

impl OpenAiBackend {
    pub fn new(config: AssistantConfig) -> AssistantResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl ChatBackend for OpenAiBackend {
    async fn complete(&self, messages: &[ChatMessage]) -> AssistantResult<String> {
        let request = CompletionRequest {
            model: &self.config.model,
            messages,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let send = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send();

        let response = tokio::time::timeout(Duration::from_secs(self.config.timeout_secs), send)
            .await
            .map_err(|_| AssistantError::Timeout(self.config.timeout_secs))??;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(AssistantError::Api {
                status: status.as_u16(),
                message: status
                    .canonical_reason()
                    .map(str::to_string)
                    .unwrap_or(body),
            });
        }

        parse_completion(&body)
    }
}

/// Canned backend for tests; records every request it receives.
#[derive(Default)]
pub struct MockBackend {
    replies: Mutex<Vec<String>>,
    requests: Mutex<Vec<Vec<ChatMessage>>>,
}

impl MockBackend {
    /// Replies are handed out in order; the last one repeats.
    pub fn with_replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut replies: Vec<String> = replies.into_iter().map(Into::into).collect();
        replies.reverse();
        Self {
            replies: Mutex::new(replies),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ChatBackend for MockBackend {
    async fn complete(&self, messages: &[ChatMessage]) -> AssistantResult<String> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(messages.to_vec());
        }
        let mut replies = match self.replies.lock() {
            Ok(r) => r,
            Err(_) => return Ok(EMPTY_COMPLETION.to_string()),
        };
        let reply = if replies.len() > 1 {
            replies.pop()
        } else {
            replies.last().cloned()
        };
        Ok(reply.unwrap_or_else(|| EMPTY_COMPLETION.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_completion() {
        let body = r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"Drink water."}}]}"#;
        assert_eq!(parse_completion(body).unwrap(), "Drink water.");
    }

    #[test]
    fn test_parse_completion_without_choices() {
        assert_eq!(parse_completion(r#"{"choices":[]}"#).unwrap(), EMPTY_COMPLETION);
        assert_eq!(parse_completion("{}").unwrap(), EMPTY_COMPLETION);
    }

    #[test]
    fn test_parse_completion_rejects_garbage() {
        assert!(matches!(
            parse_completion("not json"),
            Err(AssistantError::Json(_))
        ));
    }

    #[test]
    fn test_message_serializes_lowercase_role() {
        let json = serde_json::to_string(&ChatMessage::system("hi")).unwrap();
        assert_eq!(json, r#"{"role":"system","content":"hi"}"#);
    }

    #[test]
    fn test_default_config_is_unconfigured() {
        let config = AssistantConfig::default();
        assert!(!config.is_configured());
        assert_eq!(config.model, DEFAULT_MODEL);
    }

    #[tokio::test]
    async fn test_mock_backend_replies_in_order() {
        let backend = MockBackend::with_replies(["first", "second"]);
        let msgs = [ChatMessage::user("q")];
        assert_eq!(backend.complete(&msgs).await.unwrap(), "first");
        assert_eq!(backend.complete(&msgs).await.unwrap(), "second");
        assert_eq!(backend.complete(&msgs).await.unwrap(), "second");
        assert_eq!(backend.requests().len(), 3);
    }
}
