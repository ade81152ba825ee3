use {
    crate::{
        AppState,
        adapters::api_errors::ApiError,
        domain::{
            attempt::FlowType,
            id::IdempotencyKey,
            money::{Currency, Money, MoneyAmount},
        },
        services::checkout::{CheckoutOutcome, CheckoutRequest, start_checkout},
    },
    axum::{Json, extract::State, http::StatusCode, response::IntoResponse},
    serde::Deserialize,
    uuid::Uuid,
};

#[derive(Debug, Deserialize)]
pub struct StartCheckoutBody {
    pub idempotency_key: String,
    pub flow_type: String,
    pub amount_cents: i64,
    pub currency: String,
    pub organization_id: Uuid,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

pub async fn start_checkout_handler(
    State(state): State<AppState>,
    Json(body): Json<StartCheckoutBody>,
) -> Result<impl IntoResponse, ApiError> {
    let req = CheckoutRequest {
        idempotency_key: IdempotencyKey::new(body.idempotency_key)?,
        flow_type: FlowType::try_from(body.flow_type.as_str())?,
        money: Money::new(
            MoneyAmount::new(body.amount_cents)?,
            Currency::try_from(body.currency.as_str())?,
        ),
        organization_id: body.organization_id,
        metadata: body.metadata,
    };

    match start_checkout(&state.pool, state.provider.as_ref(), req).await? {
        CheckoutOutcome::Ready(attempt) => Ok((
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "ready",
                "attempt_id": attempt.id(),
                "checkout_url": attempt.checkout_url(),
            })),
        )),
        // Winner still in flight: the client should retry with the
        // same idempotency key.
        CheckoutOutcome::Pending(attempt) => Ok((
            StatusCode::ACCEPTED,
            Json(serde_json::json!({
                "status": "pending",
                "attempt_id": attempt.id(),
            })),
        )),
    }
}
