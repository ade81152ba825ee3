use {
    crate::{
        AppState,
        adapters::api_errors::ApiError,
        domain::{error::FlowError, id::EventId},
        services::webhook_apply::{Applied, ProviderEvent, apply_event_once},
    },
    axum::{Json, extract::State, http::HeaderMap},
};

/// Inbound Stripe webhook: verify the signature, then hand the event to
/// the exactly-once applier. Stripe retries deliveries, so every branch
/// here must be safe to hit repeatedly.
pub async fn stripe_webhook_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<serde_json::Value>, ApiError> {
    let sig = headers
        .get("Stripe-Signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            FlowError::WebhookSignature("missing Stripe-Signature header".into())
        })?;

    let event = stripe::Webhook::construct_event(&body, sig, &state.stripe_webhook_secret)
        .map_err(|e| FlowError::WebhookSignature(e.to_string()))?;

    let event_id = EventId::new(event.id.to_string())?;
    let payload: serde_json::Value = serde_json::from_str(&body).map_err(FlowError::from)?;
    let event_type = payload
        .get("type")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown")
        .to_string();
    let session_id = payload
        .pointer("/data/object/id")
        .and_then(|v| v.as_str())
        .map(str::to_string);

    let provider_event = ProviderEvent {
        event_id,
        event_type: event_type.clone(),
        session_id,
        payload,
    };

    match apply_event_once(&state.pool, &provider_event).await? {
        Applied::Fresh(attempt_id) => {
            tracing::info!(attempt_id = %attempt_id, event_type = %event_type, "event applied");
            Ok(Json(serde_json::json!({"status": "applied"})))
        }
        Applied::Duplicate => Ok(Json(serde_json::json!({"status": "duplicate"}))),
        Applied::Ignored => Ok(Json(serde_json::json!({"status": "ignored"}))),
    }
}
