use {
    crate::domain::error::FlowError,
    crate::domain::id::EventId,
    crate::infra::postgres::event_repo,
    sqlx::PgPool,
    uuid::Uuid,
};

/// A verified provider notification, possibly delivered more than once.
pub struct ProviderEvent {
    pub event_id: EventId,
    pub event_type: String,
    /// Checkout session id carried in the event payload, when present.
    pub session_id: Option<String>,
    pub payload: serde_json::Value,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Applied {
    /// First delivery: the side effect ran.
    Fresh(Uuid),
    /// The event id was already recorded — side effect skipped.
    Duplicate,
    /// First delivery of an event we track but don't act on
    /// (unhandled type, or no matching attempt).
    Ignored,
}

/// Apply a provider event exactly once. The dedup insert and the side
/// effect share one transaction, so "recorded" and "applied" commit or
/// roll back together; a second delivery — including a concurrent one —
/// observes the conflict and skips the side effect.
pub async fn apply_event_once(
    pool: &PgPool,
    event: &ProviderEvent,
) -> Result<Applied, FlowError> {
    let mut tx = pool.begin().await?;

    let is_new =
        event_repo::insert_event(&mut tx, &event.event_id, &event.event_type, &event.payload)
            .await?;

    if !is_new {
        tx.commit().await?;
        tracing::info!(event_id = %event.event_id, "duplicate event, already applied");
        return Ok(Applied::Duplicate);
    }

    let applied = match event.event_type.as_str() {
        "checkout.session.completed" => {
            settle_attempt(&mut tx, event, "succeeded").await?
        }
        "checkout.session.expired" => settle_attempt(&mut tx, event, "failed").await?,
        other => {
            tracing::info!(event_id = %event.event_id, event_type = other, "unhandled event type");
            Applied::Ignored
        }
    };

    tx.commit().await?;
    Ok(applied)
}

/// Mark the attempt owning the event's session id. Terminal states
/// never regress: `failed` is not overwritten by completion, and a
/// `succeeded` attempt is not demoted by expiry.
async fn settle_attempt(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    event: &ProviderEvent,
    status: &str,
) -> Result<Applied, FlowError> {
    let Some(session_id) = event.session_id.as_deref() else {
        tracing::warn!(
            event_id = %event.event_id,
            event_type = %event.event_type,
            "event has no session id, nothing to settle"
        );
        return Ok(Applied::Ignored);
    };

    let guard = match status {
        "succeeded" => "failed",
        _ => "succeeded",
    };

    let updated: Option<Uuid> = sqlx::query_scalar(
        "UPDATE payment_attempts \
         SET status = $2, updated_at = now() \
         WHERE stripe_checkout_session_id = $1 AND status <> $3 \
         RETURNING id",
    )
    .bind(session_id)
    .bind(status)
    .bind(guard)
    .fetch_optional(&mut **tx)
    .await?;

    match updated {
        Some(id) => {
            tracing::info!(
                attempt_id = %id,
                event_id = %event.event_id,
                status,
                "attempt settled from webhook"
            );
            Ok(Applied::Fresh(id))
        }
        None => {
            tracing::warn!(
                event_id = %event.event_id,
                session_id,
                "no settleable attempt for session"
            );
            Ok(Applied::Ignored)
        }
    }
}
