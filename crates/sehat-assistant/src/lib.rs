//! AI health-assistant client for Sehat Rakshak.
//!
//! This crate wraps an OpenAI-compatible chat completion API behind the
//! [`ChatBackend`] trait and layers red-flag symptom triage on top of it.
//! Nothing here touches the database; the core crate persists interactions.

pub mod assistant;
pub mod chat;
pub mod prompts;
pub mod triage;

pub use assistant::*;
pub use chat::*;
pub use prompts::*;
pub use triage::*;
