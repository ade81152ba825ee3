use {
    crate::domain::attempt::{
        AttemptParts, AttemptStatus, NewAttempt, PaymentAttempt,
    },
    crate::domain::error::FlowError,
    crate::domain::id::IdempotencyKey,
    chrono::{DateTime, Utc},
    sqlx::PgPool,
    std::time::Duration,
    uuid::Uuid,
};

const ATTEMPT_COLUMNS: &str = "id, idempotency_key, flow_type, amount_cents, currency, \
     organization_id, request_fingerprint, status, stripe_checkout_session_id, \
     checkout_url, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct AttemptRow {
    id: Uuid,
    idempotency_key: String,
    flow_type: String,
    amount_cents: i64,
    currency: String,
    organization_id: Uuid,
    request_fingerprint: String,
    status: String,
    stripe_checkout_session_id: Option<String>,
    checkout_url: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<AttemptRow> for PaymentAttempt {
    type Error = FlowError;

    fn try_from(row: AttemptRow) -> Result<Self, Self::Error> {
        PaymentAttempt::try_from(AttemptParts {
            id: row.id,
            idempotency_key: row.idempotency_key,
            flow_type: row.flow_type,
            amount_cents: row.amount_cents,
            currency: row.currency,
            organization_id: row.organization_id,
            request_fingerprint: row.request_fingerprint,
            status: row.status,
            stripe_checkout_session_id: row.stripe_checkout_session_id,
            checkout_url: row.checkout_url,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Outcome of the claim CAS: `claimed = true` for exactly one of any
/// number of concurrent callers racing on the same row.
#[derive(Debug)]
pub struct Claim {
    pub attempt: PaymentAttempt,
    pub claimed: bool,
}

/// Terminal outcome written back by the claim winner.
#[derive(Debug, Clone)]
pub struct AttemptOutcome {
    session_id: Option<String>,
    checkout_url: Option<String>,
    status: AttemptStatus,
}

impl AttemptOutcome {
    pub fn succeeded(session_id: String, checkout_url: String) -> Self {
        Self {
            session_id: Some(session_id),
            checkout_url: Some(checkout_url),
            status: AttemptStatus::Succeeded,
        }
    }

    pub fn failed() -> Self {
        Self {
            session_id: None,
            checkout_url: None,
            status: AttemptStatus::Failed,
        }
    }
}

/// Insert a new `pending` attempt, or return the existing row when the
/// idempotency key was already taken. The unique constraint — not a
/// read-then-write — arbitrates racing first inserts.
///
/// A fetched row whose amount/currency/fingerprint differ from the
/// caller's input fails with `FlowError::KeyReuse` and is never mutated.
pub async fn ensure_attempt(
    pool: &PgPool,
    new: &NewAttempt,
) -> Result<PaymentAttempt, FlowError> {
    let inserted = sqlx::query_as::<_, AttemptRow>(&format!(
        "INSERT INTO payment_attempts \
             (id, idempotency_key, flow_type, amount_cents, currency, \
              organization_id, request_fingerprint, status) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, 'pending') \
         ON CONFLICT (idempotency_key) DO NOTHING \
         RETURNING {ATTEMPT_COLUMNS}"
    ))
    .bind(new.id())
    .bind(new.idempotency_key().as_str())
    .bind(new.flow_type().as_str())
    .bind(new.money().amount().cents())
    .bind(new.money().currency().as_str())
    .bind(new.organization_id())
    .bind(new.request_fingerprint())
    .fetch_optional(pool)
    .await?;

    let attempt: PaymentAttempt = match inserted {
        Some(row) => row.try_into()?,
        // Conflict-as-success: the row exists and rows are never deleted,
        // so this fetch cannot miss.
        None => get_by_key(pool, new.idempotency_key()).await?,
    };

    attempt.matches_request(new)?;
    Ok(attempt)
}

/// Atomic `pending → processing` transition. The store decides the
/// winner via the conditional update; losing is a normal outcome, not
/// an error, and returns the current row.
pub async fn claim_attempt(
    pool: &PgPool,
    attempt: &PaymentAttempt,
    new: &NewAttempt,
) -> Result<Claim, FlowError> {
    // Final consistency check before taking ownership of the side effect.
    attempt.matches_request(new)?;

    let updated = sqlx::query_as::<_, AttemptRow>(&format!(
        "UPDATE payment_attempts \
         SET status = 'processing', updated_at = now() \
         WHERE id = $1 AND status = 'pending' \
         RETURNING {ATTEMPT_COLUMNS}"
    ))
    .bind(attempt.id())
    .fetch_optional(pool)
    .await?;

    match updated {
        Some(row) => Ok(Claim {
            attempt: row.try_into()?,
            claimed: true,
        }),
        None => {
            let current = get_attempt(pool, attempt.id()).await?;
            Ok(Claim {
                attempt: current,
                claimed: false,
            })
        }
    }
}

/// Unconditional terminal write, invoked only by the claim winner.
/// Every current and future reader of this key observes the result.
pub async fn record_result(
    pool: &PgPool,
    id: Uuid,
    outcome: &AttemptOutcome,
) -> Result<PaymentAttempt, FlowError> {
    let row = sqlx::query_as::<_, AttemptRow>(&format!(
        "UPDATE payment_attempts \
         SET stripe_checkout_session_id = $2, checkout_url = $3, \
             status = $4, updated_at = now() \
         WHERE id = $1 \
         RETURNING {ATTEMPT_COLUMNS}"
    ))
    .bind(id)
    .bind(outcome.session_id.as_deref())
    .bind(outcome.checkout_url.as_deref())
    .bind(outcome.status.as_str())
    .fetch_one(pool)
    .await?;

    row.try_into()
}

pub async fn get_attempt(pool: &PgPool, id: Uuid) -> Result<PaymentAttempt, FlowError> {
    let row = sqlx::query_as::<_, AttemptRow>(&format!(
        "SELECT {ATTEMPT_COLUMNS} FROM payment_attempts WHERE id = $1"
    ))
    .bind(id)
    .fetch_one(pool)
    .await?;

    row.try_into()
}

pub async fn get_by_key(
    pool: &PgPool,
    key: &IdempotencyKey,
) -> Result<PaymentAttempt, FlowError> {
    let row = sqlx::query_as::<_, AttemptRow>(&format!(
        "SELECT {ATTEMPT_COLUMNS} FROM payment_attempts WHERE idempotency_key = $1"
    ))
    .bind(key.as_str())
    .fetch_one(pool)
    .await?;

    row.try_into()
}

/// Release attempts stuck in `processing` because a claim winner died
/// before recording a result. Operator-invoked maintenance, never part
/// of the request path. Returns the number of released rows.
pub async fn release_stale_processing(
    pool: &PgPool,
    older_than: Duration,
) -> Result<u64, FlowError> {
    let result = sqlx::query(
        "UPDATE payment_attempts \
         SET status = 'pending', updated_at = now() \
         WHERE status = 'processing' \
           AND updated_at < now() - make_interval(secs => $1)",
    )
    .bind(older_than.as_secs_f64())
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}
