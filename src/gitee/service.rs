//! Webhook dispatcher for Gitee deliveries

use std::io;

use axum::body::Body;
use axum::http::{HeaderMap, Request};
use tracing::{debug, info, warn};

use super::convert::{convert_pull_request_hook, convert_push_family};
use super::payload::{PayloadSchema, decode_pull_request, decode_push};
use super::{EVENT_HEADER, MERGE_REQUEST_HOOK, PUSH_HOOK, TAG_PUSH_HOOK, TOKEN_HEADER};
use crate::error::{BoxError, Result, WebhookError};
use crate::utils::verify_token;
use crate::webhook::Webhook;

/// Largest body that is read before decoding (10 MB)
pub const MAX_PAYLOAD_SIZE: usize = 10_000_000;

/// Looks up the shared secret for a parsed delivery. An empty secret means
/// verification is not configured for that delivery.
pub trait SecretResolver {
    fn resolve(&self, hook: &Webhook) -> std::result::Result<String, BoxError>;
}

impl<F, E> SecretResolver for F
where
    F: Fn(&Webhook) -> std::result::Result<String, E>,
    E: Into<BoxError>,
{
    fn resolve(&self, hook: &Webhook) -> std::result::Result<String, BoxError> {
        self(hook).map_err(Into::into)
    }
}

/// Resolver returning the same secret for every delivery
#[derive(Debug, Clone, Default)]
pub struct StaticSecret(pub String);

impl SecretResolver for StaticSecret {
    fn resolve(&self, _hook: &Webhook) -> std::result::Result<String, BoxError> {
        Ok(self.0.clone())
    }
}

/// Turns Gitee webhook deliveries into normalized [`Webhook`] values.
///
/// Holds no per-request state; one instance can serve every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebhookService {
    schema: PayloadSchema,
}

impl WebhookService {
    pub fn new(schema: PayloadSchema) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> PayloadSchema {
        self.schema
    }

    /// Reads the request body (bounded by [`MAX_PAYLOAD_SIZE`]) and parses it.
    ///
    /// See [`WebhookService::parse_bytes`] for the outcomes.
    pub async fn parse<R>(&self, request: Request<Body>, resolver: &R) -> Result<Option<Webhook>>
    where
        R: SecretResolver + ?Sized,
    {
        let (parts, body) = request.into_parts();
        let data = axum::body::to_bytes(body, MAX_PAYLOAD_SIZE)
            .await
            .map_err(io::Error::other)?;
        self.parse_bytes(&parts.headers, &data, resolver)
    }

    /// Parses a delivery that has already been read into memory.
    ///
    /// * `Ok(Some(hook))` - parsed, and either verified or verification is
    ///   not configured (empty secret)
    /// * `Ok(None)` - valid merge request delivery with nothing actionable
    /// * `Err(SignatureInvalid | SecretResolution)` - parsed, the event is
    ///   attached to the error
    /// * any other `Err` - nothing was produced
    pub fn parse_bytes<R>(
        &self,
        headers: &HeaderMap,
        data: &[u8],
        resolver: &R,
    ) -> Result<Option<Webhook>>
    where
        R: SecretResolver + ?Sized,
    {
        if data.len() > MAX_PAYLOAD_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "payload of {} bytes exceeds limit of {} bytes",
                    data.len(),
                    MAX_PAYLOAD_SIZE
                ),
            )
            .into());
        }

        let event = header_str(headers, EVENT_HEADER);
        debug!("Dispatching {:?} event ({} bytes)", event, data.len());
        let hook = match event {
            PUSH_HOOK => Some(convert_push_family(decode_push(self.schema, data)?, false)),
            TAG_PUSH_HOOK => Some(convert_push_family(decode_push(self.schema, data)?, true)),
            MERGE_REQUEST_HOOK => {
                convert_pull_request_hook(decode_pull_request(self.schema, data)?)
                    .map(Webhook::PullRequest)
            }
            other => {
                warn!("Unknown webhook event {:?}", other);
                return Err(WebhookError::UnknownEvent(other.to_string()));
            }
        };
        let Some(hook) = hook else {
            debug!("{:?} event has nothing actionable, skipping.", event);
            return Ok(None);
        };

        // Resolved after parsing so the secret can depend on the repository.
        let secret = match resolver.resolve(&hook) {
            Ok(secret) => secret,
            Err(source) => {
                warn!(
                    "Secret lookup failed for '{}': {}",
                    hook.repository().full_name(),
                    source
                );
                return Err(WebhookError::SecretResolution {
                    hook: Box::new(hook),
                    source,
                });
            }
        };
        if secret.is_empty() {
            debug!(
                "No secret configured for '{}', skipping verification.",
                hook.repository().full_name()
            );
            return Ok(Some(hook));
        }

        if !verify_token(&secret, header_str(headers, TOKEN_HEADER)) {
            warn!(
                "Token verification failed for {} event on '{}'",
                hook.kind(),
                hook.repository().full_name()
            );
            return Err(WebhookError::SignatureInvalid {
                hook: Box::new(hook),
            });
        }

        info!(
            "Verified {} event for '{}'",
            hook.kind(),
            hook.repository().full_name()
        );
        Ok(Some(hook))
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}
