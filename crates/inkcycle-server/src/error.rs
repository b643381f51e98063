use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use inkcycle_core::InkError;

// ---------------------------------------------------------------------------
// Internal sentinel for explicit 400 Bad Request errors
// ---------------------------------------------------------------------------

/// Carries a request validation failure through the `anyhow::Error` chain
/// without adding a variant to `InkError`.
#[derive(Debug)]
struct BadRequest(String);

impl std::fmt::Display for BadRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for BadRequest {}

// ---------------------------------------------------------------------------
// AppError
// ---------------------------------------------------------------------------

/// Unified error type for HTTP responses. The body is
/// `{"error": <message>, "kind": <failure kind>, "plugin_id": <id or null>}`.
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self(BadRequest(msg.into()).into())
    }
}

pub fn status_for(err: &InkError) -> StatusCode {
    match err {
        InkError::PlaylistNotFound(_)
        | InkError::PluginInstanceNotFound { .. }
        | InkError::PluginNotFound(_)
        | InkError::ConfigNotFound(_) => StatusCode::NOT_FOUND,
        InkError::PlaylistExists(_) | InkError::PluginInstanceExists { .. } => {
            StatusCode::CONFLICT
        }
        InkError::ContentResolution { .. } => StatusCode::BAD_GATEWAY,
        InkError::DeviceWrite(_) | InkError::SchedulerStopped => StatusCode::SERVICE_UNAVAILABLE,
        InkError::InvalidTime(_) | InkError::InvalidConfig(_) => StatusCode::BAD_REQUEST,
        InkError::ConfigPersist(_) | InkError::Io(_) | InkError::Yaml(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let Some(b) = self.0.downcast_ref::<BadRequest>() {
            let body = serde_json::json!({
                "error": b.0.clone(),
                "kind": "invalid_input",
                "plugin_id": null,
            });
            return (StatusCode::BAD_REQUEST, axum::Json(body)).into_response();
        }

        let (status, kind, plugin_id) = match self.0.downcast_ref::<InkError>() {
            Some(e) => (status_for(e), e.kind(), e.plugin_id().map(str::to_string)),
            None => (StatusCode::INTERNAL_SERVER_ERROR, "internal", None),
        };
        if status.is_server_error() {
            tracing::warn!(status = status.as_u16(), kind, error = %self.0, "request failed");
        }
        let body = serde_json::json!({
            "error": self.0.to_string(),
            "kind": kind,
            "plugin_id": plugin_id,
        });
        (status, axum::Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
