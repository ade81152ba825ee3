use crate::domain::error::FlowError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// Newtype over the domain error so the adapter layer owns the HTTP
/// response mapping.
pub struct ApiError(pub FlowError);

impl From<FlowError> for ApiError {
    fn from(err: FlowError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match &self.0 {
            FlowError::Validation(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "validation_error",
                msg.clone(),
            ),
            FlowError::KeyReuse { key, field } => {
                tracing::warn!(idempotency_key = %key, field, "idempotency key reuse rejected");
                (
                    StatusCode::CONFLICT,
                    "idempotency_conflict",
                    format!("idempotency key reused with different {field}"),
                )
            }
            FlowError::WebhookSignature(_) => (
                StatusCode::BAD_REQUEST,
                "webhook_error",
                "invalid webhook signature".to_string(),
            ),
            FlowError::Provider(msg) => {
                tracing::error!("provider error: {msg}");
                (
                    StatusCode::BAD_GATEWAY,
                    "provider_error",
                    "payment provider error".to_string(),
                )
            }
            FlowError::Database(err) => {
                tracing::error!("database error: {err}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal error".to_string(),
                )
            }
            FlowError::Serialization(err) => {
                tracing::error!("serialization error: {err}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal error".to_string(),
                )
            }
        };

        let body = serde_json::json!({
            "error_code": error_code,
            "message": message,
        });

        (status, Json(body)).into_response()
    }
}
