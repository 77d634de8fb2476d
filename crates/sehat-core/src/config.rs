//! Startup configuration and logging.
//!
//! Configuration is read once (TOML file, then environment overrides) and
//! handed to the components that need it. Nothing below this module reads
//! the environment.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::notify::EmailConfig;
use crate::prescribing::MatchPolicy;
use sehat_assistant::AssistantConfig;

/// Default `tracing` filter.
pub const DEFAULT_LOG_FILTER: &str = "sehat_core=info,sehat_assistant=info";

pub const ENV_EMAILJS_PUBLIC_KEY: &str = "SEHAT_EMAILJS_PUBLIC_KEY";
pub const ENV_EMAILJS_SERVICE_ID: &str = "SEHAT_EMAILJS_SERVICE_ID";
pub const ENV_EMAILJS_TEMPLATE_ID: &str = "SEHAT_EMAILJS_TEMPLATE_ID";
pub const ENV_OPENAI_API_KEY: &str = "SEHAT_OPENAI_API_KEY";
pub const ENV_DATABASE_PATH: &str = "SEHAT_DATABASE_PATH";
pub const ENV_DUPLICATE_POLICY: &str = "SEHAT_DUPLICATE_POLICY";

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

/// Duplicate checker settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DuplicateConfig {
    pub policy: MatchPolicy,
}

/// Notification fan-out settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NotificationConfig {
    /// Delivery attempts per outbox row
    pub max_attempts: u32,
    /// Upper bound for one delivery, including PDF rendering
    pub timeout_secs: u64,
    /// Where downloadable PDFs are written
    pub pdf_dir: PathBuf,
    /// TrueType font embedded in PDFs; builtin Helvetica (Latin-1 only)
    /// when unset
    pub pdf_font: Option<PathBuf>,
    /// Email newly registered patients their MRN
    pub welcome_email: bool,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            max_attempts: crate::notify::DEFAULT_MAX_ATTEMPTS,
            timeout_secs: 30,
            pdf_dir: PathBuf::from("prescriptions"),
            pdf_font: None,
            welcome_email: true,
        }
    }
}

impl NotificationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub database_path: PathBuf,
    pub log_filter: String,
    pub duplicates: DuplicateConfig,
    pub email: EmailConfig,
    pub notifications: NotificationConfig,
    pub assistant: AssistantConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("sehat.db"),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            duplicates: DuplicateConfig::default(),
            email: EmailConfig::default(),
            notifications: NotificationConfig::default(),
            assistant: AssistantConfig::default(),
        }
    }
}

impl AppConfig {
    /// Parse TOML. Missing keys take their defaults.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Load a TOML file, then apply environment overrides.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml(&text)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Defaults plus environment overrides.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Override fields from `lookup` (normally the process environment).
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(ENV_EMAILJS_PUBLIC_KEY) {
            self.email.public_key = v;
        }
        if let Some(v) = lookup(ENV_EMAILJS_SERVICE_ID) {
            self.email.service_id = v;
        }
        if let Some(v) = lookup(ENV_EMAILJS_TEMPLATE_ID) {
            self.email.template_id = v;
        }
        if let Some(v) = lookup(ENV_OPENAI_API_KEY) {
            self.assistant.api_key = v;
        }
        if let Some(v) = lookup(ENV_DATABASE_PATH).filter(|v| !v.trim().is_empty()) {
            self.database_path = PathBuf::from(v);
        }
        if let Some(v) = lookup(ENV_DUPLICATE_POLICY) {
            self.duplicates.policy =
                MatchPolicy::parse(&v).ok_or_else(|| ConfigError::InvalidValue {
                    key: ENV_DUPLICATE_POLICY.to_string(),
                    value: v.clone(),
                })?;
        }
        Ok(())
    }
}

/// Install the global `tracing` subscriber. `RUST_LOG` wins over
/// `default_filter`. Returns `false` if a subscriber was already installed.
pub fn init_logging(default_filter: &str) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.duplicates.policy, MatchPolicy::Substring);
        assert!(!config.email.is_configured());
        assert!(!config.assistant.is_configured());
        assert_eq!(config.notifications.max_attempts, 3);
        assert!(config.notifications.welcome_email);
    }

    #[test]
    fn test_from_toml_partial() {
        let config = AppConfig::from_toml(
            r#"
            database_path = "/var/lib/sehat/sehat.db"

            [duplicates]
            policy = "drug_code"

            [email]
            public_key = "pk_live"
            service_id = "service_gmail"
            template_id = "template_rx"

            [notifications]
            max_attempts = 5
            welcome_email = false
            pdf_font = "/usr/share/fonts/NotoSansDevanagari-Regular.ttf"
            "#,
        )
        .unwrap();

        assert_eq!(config.database_path, PathBuf::from("/var/lib/sehat/sehat.db"));
        assert_eq!(config.duplicates.policy, MatchPolicy::DrugCode);
        assert!(config.email.is_configured());
        assert_eq!(config.email.endpoint, crate::notify::email::EMAILJS_ENDPOINT);
        assert_eq!(config.notifications.max_attempts, 5);
        assert_eq!(config.notifications.timeout_secs, 30);
        assert!(!config.notifications.welcome_email);
        assert_eq!(
            config.notifications.pdf_font,
            Some(PathBuf::from("/usr/share/fonts/NotoSansDevanagari-Regular.ttf"))
        );
        assert_eq!(config.log_filter, DEFAULT_LOG_FILTER);
    }

    #[test]
    fn test_bad_toml() {
        assert!(matches!(
            AppConfig::from_toml("[duplicates]\npolicy = \"soundex\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_EMAILJS_PUBLIC_KEY, "pk"),
            (ENV_EMAILJS_SERVICE_ID, "svc"),
            (ENV_EMAILJS_TEMPLATE_ID, "tpl"),
            (ENV_OPENAI_API_KEY, "sk-test"),
            (ENV_DUPLICATE_POLICY, "normalized_name"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config
            .apply_env(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();

        assert!(config.email.is_configured());
        assert!(config.assistant.is_configured());
        assert_eq!(config.duplicates.policy, MatchPolicy::NormalizedName);
        assert_eq!(config.database_path, PathBuf::from("sehat.db"));
    }

    #[test]
    fn test_invalid_env_policy() {
        let mut config = AppConfig::default();
        let err = config
            .apply_env(|k| (k == ENV_DUPLICATE_POLICY).then(|| "soundex".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sehat.toml");
        std::fs::write(&path, "log_filter = \"debug\"\n").unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.log_filter, "debug");

        assert!(matches!(
            AppConfig::load(&dir.path().join("missing.toml")),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    fn test_init_logging_twice() {
        init_logging("warn");
        assert!(!init_logging("warn"));
    }
}
