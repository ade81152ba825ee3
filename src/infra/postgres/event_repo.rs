use {crate::domain::error::FlowError, crate::domain::id::EventId};

/// Record an inbound provider event. Returns `true` if this is the
/// first delivery, `false` if the event was already applied.
///
/// Insert is the lock: the unique constraint on `event_id` closes the
/// check-then-act race between concurrent deliveries, and running
/// inside the caller's transaction ties "recorded" to "side effect
/// applied" atomically.
pub async fn insert_event(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    event_id: &EventId,
    event_type: &str,
    payload: &serde_json::Value,
) -> Result<bool, FlowError> {
    let inserted: Option<bool> = sqlx::query_scalar(
        "INSERT INTO stripe_events (event_id, event_type, payload) \
         VALUES ($1, $2, $3) \
         ON CONFLICT (event_id) DO NOTHING \
         RETURNING true",
    )
    .bind(event_id.as_str())
    .bind(event_type)
    .bind(payload)
    .fetch_optional(&mut **tx)
    .await?;

    Ok(inserted.is_some())
}
