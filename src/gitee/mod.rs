//! Gitee webhook provider
//!
//! Gitee names the event in `X-Gitee-Event` and, when the hook is
//! configured with a password, sends that password verbatim in
//! `X-Gitee-Token`.

mod convert;
mod payload;
mod service;

pub use payload::PayloadSchema;
pub use service::{MAX_PAYLOAD_SIZE, SecretResolver, StaticSecret, WebhookService};

/// Header naming the event type (`X-Gitee-Event`). Kept lowercase so it
/// can be used directly as a static `HeaderName`.
pub const EVENT_HEADER: &str = "x-gitee-event";
/// Header carrying the shared token (`X-Gitee-Token`)
pub const TOKEN_HEADER: &str = "x-gitee-token";

/// Commit push, including branch creation and deletion
pub const PUSH_HOOK: &str = "Push Hook";
/// Tag creation and deletion
pub const TAG_PUSH_HOOK: &str = "Tag Push Hook";
pub const MERGE_REQUEST_HOOK: &str = "Merge Request Hook";
