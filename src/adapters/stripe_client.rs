use {
    crate::domain::{attempt::PaymentAttempt, error::FlowError},
    crate::services::checkout::{CheckoutProvider, CheckoutSession},
    serde::Deserialize,
    std::{future::Future, pin::Pin},
};

const CHECKOUT_SESSIONS_URL: &str = "https://api.stripe.com/v1/checkout/sessions";

#[derive(Debug, Deserialize)]
struct CreateSessionResponse {
    id: String,
    url: String,
}

/// Hosted-checkout session creation against the Stripe REST API.
/// One form POST, no idempotency on the wire — the claim protocol is
/// what keeps this to at most one call per attempt.
#[derive(Clone)]
pub struct StripeCheckout {
    client: reqwest::Client,
    secret_key: String,
    success_url: String,
    cancel_url: String,
}

impl StripeCheckout {
    pub fn new(
        secret_key: impl Into<String>,
        success_url: impl Into<String>,
        cancel_url: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            secret_key: secret_key.into(),
            success_url: success_url.into(),
            cancel_url: cancel_url.into(),
        }
    }

    async fn create_session_inner(
        &self,
        attempt: &PaymentAttempt,
    ) -> Result<CheckoutSession, FlowError> {
        let unit_amount = attempt.money().amount().cents().to_string();
        let attempt_id = attempt.id().to_string();
        let organization_id = attempt.organization_id().to_string();

        let response = self
            .client
            .post(CHECKOUT_SESSIONS_URL)
            .basic_auth(&self.secret_key, None::<&str>)
            .form(&[
                ("mode", "payment"),
                ("success_url", self.success_url.as_str()),
                ("cancel_url", self.cancel_url.as_str()),
                ("line_items[0][price_data][currency]", attempt.money().currency().as_str()),
                ("line_items[0][price_data][unit_amount]", unit_amount.as_str()),
                ("line_items[0][price_data][product_data][name]", attempt.flow_type().as_str()),
                ("line_items[0][quantity]", "1"),
                ("metadata[attempt_id]", attempt_id.as_str()),
                ("metadata[organization_id]", organization_id.as_str()),
            ])
            .send()
            .await
            .map_err(|e| FlowError::Provider(format!("stripe api: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(FlowError::Provider(format!(
                "stripe api returned {status}: {body}"
            )));
        }

        let session: CreateSessionResponse = response
            .json()
            .await
            .map_err(|e| FlowError::Provider(format!("stripe response: {e}")))?;

        Ok(CheckoutSession {
            session_id: session.id,
            redirect_url: session.url,
        })
    }
}

impl CheckoutProvider for StripeCheckout {
    fn create_session(
        &self,
        attempt: &PaymentAttempt,
    ) -> Pin<Box<dyn Future<Output = Result<CheckoutSession, FlowError>> + Send + '_>> {
        let attempt = attempt.clone();
        Box::pin(async move { self.create_session_inner(&attempt).await })
    }
}
