use axum::{
    Json,
    extract::{Request, State as AxumState},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use scm_hooks::SharedState;
use scm_hooks::error::WebhookError;
use serde_json::json;
use tracing::{Instrument, error, info, info_span, warn};
use uuid::Uuid;

pub async fn root() -> &'static str {
    "scm_hooks relay"
}

/// Handles a Gitee webhook POST request.
///
/// Responds with the normalized event as JSON when it parsed and verified.
pub async fn handle_webhook(
    AxumState(state): AxumState<SharedState>,
    request: Request,
) -> Response {
    let delivery = Uuid::now_v7();
    let span = info_span!("delivery", id = %delivery);

    async move {
        match state.service.parse(request, &state.config).await {
            Ok(Some(hook)) => {
                info!(
                    "Accepted {} event for '{}' from '{}'",
                    hook.kind(),
                    hook.repository().full_name(),
                    hook.sender().login
                );
                (StatusCode::OK, Json(hook)).into_response()
            }
            Ok(None) => {
                info!("Delivery has nothing actionable, skipping.");
                StatusCode::NO_CONTENT.into_response()
            }
            Err(e) => {
                let status = status_for(&e);
                if status.is_server_error() {
                    error!("Webhook rejected: {}", e);
                } else {
                    warn!("Webhook rejected: {}", e);
                }
                (status, Json(json!({ "error": e.to_string() }))).into_response()
            }
        }
    }
    .instrument(span)
    .await
}

fn status_for(error: &WebhookError) -> StatusCode {
    match error {
        WebhookError::Io(_) => StatusCode::PAYLOAD_TOO_LARGE,
        WebhookError::Decode(_) | WebhookError::UnknownEvent(_) => StatusCode::BAD_REQUEST,
        WebhookError::SignatureInvalid { .. } => StatusCode::UNAUTHORIZED,
        WebhookError::SecretResolution { .. }
        | WebhookError::Config(_)
        | WebhookError::TomlParse(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
