use crate::domain::payment::PaymentReference;
use crate::domain::ports::{
    CheckoutRequest, GatewayAck, GatewayStatus, GatewayStatusKind, PaymentGateway,
};
use crate::error::GatewayError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::error;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub secret_key: String,
    pub timeout: Duration,
}

impl GatewayConfig {
    pub fn new(base_url: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            secret_key: secret_key.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Serialize)]
struct InitializeBody<'a> {
    amount: String,
    currency: &'a str,
    email: &'a str,
    first_name: &'a str,
    last_name: &'a str,
    phone_number: &'a str,
    tx_ref: String,
    callback_url: &'a str,
    return_url: &'a str,
    description: &'a str,
}

/// Envelope every gateway response comes wrapped in.
#[derive(Deserialize)]
struct Envelope {
    status: String,
    message: Option<String>,
    data: Option<Value>,
}

/// HTTP adapter for the payment gateway's transaction API
/// (`POST /transaction/initialize`, `GET /transaction/verify/{tx_ref}`),
/// authenticated with a bearer secret key.
///
/// Every call is bounded by the configured timeout and never retried here;
/// transient failures surface as `GatewayError::Network` for the caller's
/// retry policy.
pub struct HttpGateway {
    config: GatewayConfig,
    client: reqwest::Client,
}

impl HttpGateway {
    pub fn new(config: GatewayConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("failed to build HTTP client");
        Self { config, client }
    }

    async fn read_envelope(
        response: reqwest::Response,
    ) -> Result<Envelope, GatewayError> {
        let body = response
            .text()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;
        serde_json::from_str(&body).map_err(|e| {
            error!(error = %e, "gateway returned an unparseable body");
            GatewayError::Malformed(format!("{e}: {body}"))
        })
    }
}

fn transport_error(e: reqwest::Error) -> GatewayError {
    GatewayError::Network(e.to_string())
}

#[async_trait]
impl PaymentGateway for HttpGateway {
    async fn initiate(
        &self,
        request: &CheckoutRequest,
    ) -> Result<GatewayAck, GatewayError> {
        let url = format!("{}/transaction/initialize", self.config.base_url);
        let body = InitializeBody {
            amount: request.amount.to_string(),
            currency: &request.currency,
            email: &request.customer.email,
            first_name: &request.customer.first_name,
            last_name: &request.customer.last_name,
            phone_number: request.customer.phone.as_deref().unwrap_or(""),
            tx_ref: request.reference.to_string(),
            callback_url: &request.callback_url,
            return_url: &request.return_url,
            description: &request.description,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.secret_key)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let envelope = Self::read_envelope(response).await?;
        if envelope.status != "success" {
            return Err(GatewayError::Rejected(
                envelope
                    .message
                    .unwrap_or_else(|| "payment initiation failed".to_owned()),
            ));
        }

        let data = envelope.data.unwrap_or(Value::Null);
        let checkout_handle = data
            .get("checkout_url")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                GatewayError::Malformed("initiate response missing checkout_url".to_owned())
            })?
            .to_owned();
        let transaction_id = data
            .get("reference")
            .and_then(Value::as_str)
            .map(str::to_owned);

        Ok(GatewayAck {
            checkout_handle,
            transaction_id,
            raw: data,
        })
    }

    async fn verify(
        &self,
        reference: &PaymentReference,
    ) -> Result<GatewayStatus, GatewayError> {
        let url = format!(
            "{}/transaction/verify/{}",
            self.config.base_url, reference
        );

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.config.secret_key)
            .send()
            .await
            .map_err(transport_error)?;

        let envelope = Self::read_envelope(response).await?;
        if envelope.status != "success" {
            return Err(GatewayError::Rejected(
                envelope
                    .message
                    .unwrap_or_else(|| "payment verification failed".to_owned()),
            ));
        }

        let data = envelope.data.unwrap_or(Value::Null);
        let kind = GatewayStatusKind::from_wire(
            data.get("status").and_then(Value::as_str).unwrap_or(""),
        );
        let transaction_id = data
            .get("reference")
            .and_then(Value::as_str)
            .map(str::to_owned);

        Ok(GatewayStatus {
            kind,
            transaction_id,
            raw: data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_parses_the_documented_shapes() {
        let ok: Envelope = serde_json::from_str(
            r#"{"status":"success","message":"Hosted Link","data":{"checkout_url":"https://checkout.gateway/x"}}"#,
        )
        .unwrap();
        assert_eq!(ok.status, "success");
        assert_eq!(
            ok.data.unwrap()["checkout_url"],
            "https://checkout.gateway/x"
        );

        let rejected: Envelope = serde_json::from_str(
            r#"{"status":"failed","message":"Invalid currency","data":null}"#,
        )
        .unwrap();
        assert_eq!(rejected.status, "failed");
        assert_eq!(rejected.message.as_deref(), Some("Invalid currency"));
    }

    #[test]
    fn config_defaults_to_bounded_timeout() {
        let config = GatewayConfig::new("https://api.gateway.test/v1", "sk-test");
        assert_eq!(config.timeout, Duration::from_secs(30));
        let config = config.with_timeout(Duration::from_secs(5));
        assert_eq!(config.timeout, Duration::from_secs(5));
    }
}
