//! Language-model credentials kept out of logs.
//!
//! Uses the `secrecy` crate so API keys never show up in `Debug` output.

use secrecy::{ExposeSecret, SecretBox};
use std::fmt;

/// A secret string that won't be logged or displayed.
pub struct SecretString(SecretBox<str>);

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(SecretBox::new(Box::from(value.into().as_str())))
    }

    /// Only call this when building the outgoing request.
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl Clone for SecretString {
    fn clone(&self) -> Self {
        Self::new(self.expose())
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Endpoint, model, and key for an OpenAI-compatible chat service.
#[derive(Clone)]
pub struct LlmCredentials {
    pub api_key: SecretString,

    /// Chat model, e.g. `deepseek-chat`
    pub model: String,

    /// `None` uses the client's default endpoint
    pub base_url: Option<String>,
}

impl LlmCredentials {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::new(api_key),
            model: model.into(),
            base_url: None,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Whether the configured endpoint or model points at DeepSeek.
    pub fn is_deepseek(&self) -> bool {
        self.model.starts_with("deepseek")
            || self
                .base_url
                .as_deref()
                .is_some_and(|url| url.contains("deepseek"))
    }
}

impl fmt::Debug for LlmCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmCredentials")
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}
