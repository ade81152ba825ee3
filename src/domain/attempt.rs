use {
    super::error::FlowError,
    super::id::IdempotencyKey,
    super::money::{Currency, Money, MoneyAmount},
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
    sha2::{Digest, Sha256},
    std::fmt,
    uuid::Uuid,
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    Pending,
    Processing,
    Succeeded,
    Failed,
}

impl AttemptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// The only legal moves: pending → processing via the claim CAS,
    /// processing → succeeded | failed via the result recorder.
    /// Terminal states never transition.
    pub fn can_transition_to(&self, next: &AttemptStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Processing)
                | (Self::Processing, Self::Succeeded)
                | (Self::Processing, Self::Failed)
        )
    }
}

impl fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for AttemptStatus {
    type Error = FlowError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "succeeded" => Ok(Self::Succeeded),
            "failed" => Ok(Self::Failed),
            other => Err(FlowError::Validation(format!(
                "unknown attempt status: {other}"
            ))),
        }
    }
}

/// Informational tag for the kind of operation. Not used for correctness.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FlowType {
    DonationCheckout,
    SubscriptionChange,
}

impl FlowType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DonationCheckout => "donation_checkout",
            Self::SubscriptionChange => "subscription_change",
        }
    }
}

impl fmt::Display for FlowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for FlowType {
    type Error = FlowError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "donation_checkout" => Ok(Self::DonationCheckout),
            "subscription_change" => Ok(Self::SubscriptionChange),
            other => Err(FlowError::Validation(format!("unknown flow type: {other}"))),
        }
    }
}

/// Stable SHA-256 summary of the caller-supplied parameters beyond
/// amount/currency. serde_json maps are key-sorted, so equal metadata
/// always hashes equal regardless of construction order.
pub fn request_fingerprint(
    flow_type: FlowType,
    organization_id: Uuid,
    metadata: &serde_json::Value,
) -> Result<String, FlowError> {
    let mut hasher = Sha256::new();
    hasher.update(flow_type.as_str().as_bytes());
    hasher.update(organization_id.as_bytes());
    hasher.update(serde_json::to_vec(metadata)?);
    Ok(hex::encode(hasher.finalize()))
}

/// Full attempt row (for reads).
#[derive(Debug, Clone, Serialize)]
pub struct PaymentAttempt {
    id: Uuid,
    idempotency_key: IdempotencyKey,
    flow_type: FlowType,
    money: Money,
    organization_id: Uuid,
    request_fingerprint: String,
    status: AttemptStatus,
    stripe_checkout_session_id: Option<String>,
    checkout_url: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Raw column values as read from the store.
pub struct AttemptParts {
    pub id: Uuid,
    pub idempotency_key: String,
    pub flow_type: String,
    pub amount_cents: i64,
    pub currency: String,
    pub organization_id: Uuid,
    pub request_fingerprint: String,
    pub status: String,
    pub stripe_checkout_session_id: Option<String>,
    pub checkout_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<AttemptParts> for PaymentAttempt {
    type Error = FlowError;

    fn try_from(parts: AttemptParts) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parts.id,
            idempotency_key: IdempotencyKey::new(parts.idempotency_key)?,
            flow_type: FlowType::try_from(parts.flow_type.as_str())?,
            money: Money::new(
                MoneyAmount::new(parts.amount_cents)?,
                Currency::try_from(parts.currency.as_str())?,
            ),
            organization_id: parts.organization_id,
            request_fingerprint: parts.request_fingerprint,
            status: AttemptStatus::try_from(parts.status.as_str())?,
            stripe_checkout_session_id: parts.stripe_checkout_session_id,
            checkout_url: parts.checkout_url,
            created_at: parts.created_at,
            updated_at: parts.updated_at,
        })
    }
}

impl PaymentAttempt {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn idempotency_key(&self) -> &IdempotencyKey {
        &self.idempotency_key
    }

    pub fn flow_type(&self) -> FlowType {
        self.flow_type
    }

    pub fn money(&self) -> &Money {
        &self.money
    }

    pub fn organization_id(&self) -> Uuid {
        self.organization_id
    }

    pub fn request_fingerprint(&self) -> &str {
        &self.request_fingerprint
    }

    pub fn status(&self) -> &AttemptStatus {
        &self.status
    }

    pub fn stripe_checkout_session_id(&self) -> Option<&str> {
        self.stripe_checkout_session_id.as_deref()
    }

    pub fn checkout_url(&self) -> Option<&str> {
        self.checkout_url.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Fingerprint guard: a retry must carry the exact semantic payload
    /// captured at first creation. Any mismatch is key reuse, not a retry.
    pub fn matches_request(&self, new: &NewAttempt) -> Result<(), FlowError> {
        let reuse = |field| FlowError::KeyReuse {
            key: self.idempotency_key.as_str().to_string(),
            field,
        };

        if self.money.amount() != new.money().amount() {
            return Err(reuse("amount_cents"));
        }
        if self.money.currency() != new.money().currency() {
            return Err(reuse("currency"));
        }
        if self.request_fingerprint != new.request_fingerprint() {
            return Err(reuse("request_fingerprint"));
        }
        Ok(())
    }
}

pub struct NewAttemptParams {
    pub idempotency_key: IdempotencyKey,
    pub flow_type: FlowType,
    pub money: Money,
    pub organization_id: Uuid,
    pub request_fingerprint: String,
}

/// For INSERT — id generated in Rust via Uuid::now_v7().
#[derive(Debug, Clone)]
pub struct NewAttempt {
    id: Uuid,
    idempotency_key: IdempotencyKey,
    flow_type: FlowType,
    money: Money,
    organization_id: Uuid,
    request_fingerprint: String,
}

impl NewAttempt {
    pub fn new(params: NewAttemptParams) -> Self {
        Self {
            id: Uuid::now_v7(),
            idempotency_key: params.idempotency_key,
            flow_type: params.flow_type,
            money: params.money,
            organization_id: params.organization_id,
            request_fingerprint: params.request_fingerprint,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn idempotency_key(&self) -> &IdempotencyKey {
        &self.idempotency_key
    }

    pub fn flow_type(&self) -> FlowType {
        self.flow_type
    }

    pub fn money(&self) -> &Money {
        &self.money
    }

    pub fn organization_id(&self) -> Uuid {
        self.organization_id
    }

    pub fn request_fingerprint(&self) -> &str {
        &self.request_fingerprint
    }
}
