use {
    crate::domain::attempt::{
        AttemptStatus, FlowType, NewAttempt, NewAttemptParams, PaymentAttempt,
        request_fingerprint,
    },
    crate::domain::error::FlowError,
    crate::domain::id::IdempotencyKey,
    crate::domain::money::Money,
    crate::infra::postgres::attempt_repo::{self, AttemptOutcome},
    sqlx::PgPool,
    std::{future::Future, pin::Pin, time::Duration},
    uuid::Uuid,
};

/// How long a race loser polls for the winner's result before giving up
/// and returning a retry hint. Must stay well inside the HTTP timeout.
pub const DEFAULT_WAIT_POLLS: u32 = 10;
pub const DEFAULT_WAIT_INTERVAL: Duration = Duration::from_millis(40);

pub struct CheckoutRequest {
    pub idempotency_key: IdempotencyKey,
    pub flow_type: FlowType,
    pub money: Money,
    pub organization_id: Uuid,
    pub metadata: serde_json::Value,
}

/// What the external provider hands back for a created hosted session.
#[derive(Debug, Clone)]
pub struct CheckoutSession {
    pub session_id: String,
    pub redirect_url: String,
}

/// The opaque, non-idempotent external call. Invoked at most once per
/// logical attempt, by whichever caller wins the claim.
pub trait CheckoutProvider: Send + Sync {
    fn create_session(
        &self,
        attempt: &PaymentAttempt,
    ) -> Pin<Box<dyn Future<Output = Result<CheckoutSession, FlowError>> + Send + '_>>;
}

#[derive(Debug)]
pub enum CheckoutOutcome {
    /// The redirect URL is available — either this caller created it or
    /// the race winner did.
    Ready(PaymentAttempt),
    /// The winner has not finished within the polling bound. The caller
    /// should retry with the same idempotency key.
    Pending(PaymentAttempt),
}

/// Single-flight checkout: ensure the canonical attempt row, race for
/// the claim, and either perform the external call (winner) or converge
/// on the winner's recorded result (loser).
pub async fn start_checkout(
    pool: &PgPool,
    provider: &dyn CheckoutProvider,
    req: CheckoutRequest,
) -> Result<CheckoutOutcome, FlowError> {
    let fingerprint = request_fingerprint(req.flow_type, req.organization_id, &req.metadata)?;
    let new = NewAttempt::new(NewAttemptParams {
        idempotency_key: req.idempotency_key,
        flow_type: req.flow_type,
        money: req.money,
        organization_id: req.organization_id,
        request_fingerprint: fingerprint,
    });

    let attempt = attempt_repo::ensure_attempt(pool, &new).await?;

    // A prior call already finished this attempt — nothing to race for.
    if attempt.status().is_terminal() {
        return resolve_recorded(pool, attempt).await;
    }

    let claim = attempt_repo::claim_attempt(pool, &attempt, &new).await?;
    if !claim.claimed {
        return resolve_recorded(pool, claim.attempt).await;
    }

    let claimed = claim.attempt;
    tracing::info!(
        attempt_id = %claimed.id(),
        idempotency_key = %claimed.idempotency_key(),
        flow_type = %claimed.flow_type(),
        "claimed attempt, creating checkout session"
    );

    match provider.create_session(&claimed).await {
        Ok(session) => {
            let outcome = AttemptOutcome::succeeded(session.session_id, session.redirect_url);
            let recorded = attempt_repo::record_result(pool, claimed.id(), &outcome).await?;
            Ok(CheckoutOutcome::Ready(recorded))
        }
        Err(err) => {
            attempt_repo::record_result(pool, claimed.id(), &AttemptOutcome::failed()).await?;
            tracing::error!(
                attempt_id = %claimed.id(),
                error = %err,
                "checkout session creation failed, attempt marked failed"
            );
            Err(err)
        }
    }
}

/// Race-loser path: short-circuit on an already-recorded URL, otherwise
/// poll for the winner's result within the bound.
async fn resolve_recorded(
    pool: &PgPool,
    attempt: PaymentAttempt,
) -> Result<CheckoutOutcome, FlowError> {
    if attempt.checkout_url().is_some() {
        return Ok(CheckoutOutcome::Ready(attempt));
    }
    if *attempt.status() == AttemptStatus::Failed {
        return Err(failed_attempt(&attempt));
    }

    let waited =
        wait_for_checkout_url(pool, attempt.id(), DEFAULT_WAIT_POLLS, DEFAULT_WAIT_INTERVAL)
            .await?;

    if waited.checkout_url().is_some() {
        Ok(CheckoutOutcome::Ready(waited))
    } else if *waited.status() == AttemptStatus::Failed {
        Err(failed_attempt(&waited))
    } else {
        tracing::info!(
            attempt_id = %waited.id(),
            status = %waited.status(),
            "wait bound exhausted, returning retry hint"
        );
        Ok(CheckoutOutcome::Pending(waited))
    }
}

fn failed_attempt(attempt: &PaymentAttempt) -> FlowError {
    // Failed is terminal: a retry needs a fresh idempotency key.
    FlowError::Provider(format!(
        "attempt {} already failed; retry with a new idempotency key",
        attempt.id()
    ))
}

/// Bounded polling for the winner's recorded result. Returns the last
/// row read whether or not `checkout_url` ever appeared — exhausting
/// the bound is a "not ready" signal, not an error.
pub async fn wait_for_checkout_url(
    pool: &PgPool,
    id: Uuid,
    max_polls: u32,
    interval: Duration,
) -> Result<PaymentAttempt, FlowError> {
    let mut last = attempt_repo::get_attempt(pool, id).await?;

    for _ in 0..max_polls {
        if last.checkout_url().is_some() || last.status().is_terminal() {
            break;
        }
        tokio::time::sleep(interval).await;
        last = attempt_repo::get_attempt(pool, id).await?;
    }

    Ok(last)
}
