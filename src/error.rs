use std::io;

use crate::webhook::Webhook;

/// Boxed error returned by secret resolvers
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Custom error type for webhook parsing and relay configuration
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Malformed webhook payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Unknown webhook event: {0:?}")]
    UnknownEvent(String),

    /// The token header did not match the resolved secret. The parsed event
    /// is kept so the caller can log or audit the rejected delivery.
    #[error("Invalid webhook signature for {}", .hook.repository().full_name())]
    SignatureInvalid { hook: Box<Webhook> },

    #[error("Secret lookup failed for {}: {source}", .hook.repository().full_name())]
    SecretResolution {
        hook: Box<Webhook>,
        #[source]
        source: BoxError,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

impl WebhookError {
    /// The event parsed before the failure, for the variants that carry one.
    pub fn hook(&self) -> Option<&Webhook> {
        match self {
            WebhookError::SignatureInvalid { hook } => Some(hook),
            WebhookError::SecretResolution { hook, .. } => Some(hook),
            _ => None,
        }
    }

    pub fn into_hook(self) -> Option<Webhook> {
        match self {
            WebhookError::SignatureInvalid { hook } => Some(*hook),
            WebhookError::SecretResolution { hook, .. } => Some(*hook),
            _ => None,
        }
    }
}

/// Helper type for Results that use WebhookError
pub type Result<T> = std::result::Result<T, WebhookError>;
