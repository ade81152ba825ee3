use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlowError {
    #[error("validation: {0}")]
    Validation(String),

    /// Idempotency key reused with different semantic parameters.
    /// Never resolved silently in either direction.
    #[error("idempotency key {key:?} reused with different {field}")]
    KeyReuse { key: String, field: &'static str },

    #[error("database: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("webhook signature: {0}")]
    WebhookSignature(String),

    #[error("provider: {0}")]
    Provider(String),
}
