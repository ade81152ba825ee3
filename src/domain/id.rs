use derive_more::Display;
use serde::{Deserialize, Serialize};

use super::error::FlowError;

/// Caller-chosen token identifying one logical payment request across
/// retries and duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    pub fn new(key: impl Into<String>) -> Result<Self, FlowError> {
        let key = key.into();
        if key.is_empty() {
            return Err(FlowError::Validation(
                "idempotency key must not be empty".into(),
            ));
        }
        if key.len() > 255 {
            return Err(FlowError::Validation(format!(
                "idempotency key too long: {} bytes",
                key.len()
            )));
        }
        Ok(Self(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

/// Stripe event identifier (`evt_xxx`).
#[derive(Debug, Clone, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    pub fn new(id: impl Into<String>) -> Result<Self, FlowError> {
        let id = id.into();
        if !id.starts_with("evt_") {
            return Err(FlowError::Validation(format!(
                "EventId must start with evt_, got: {id}"
            )));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_idempotency_key_rejected() {
        assert!(IdempotencyKey::new("").is_err());
    }

    #[test]
    fn overlong_idempotency_key_rejected() {
        assert!(IdempotencyKey::new("k".repeat(256)).is_err());
        assert!(IdempotencyKey::new("k".repeat(255)).is_ok());
    }

    #[test]
    fn event_id_requires_prefix() {
        assert!(EventId::new("evt_123").is_ok());
        assert!(EventId::new("cs_123").is_err());
    }
}
