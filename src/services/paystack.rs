use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::time::Duration;
use uuid::Uuid;

use crate::services::signature;

/// Header Paystack puts the webhook HMAC-SHA512 in.
pub const SIGNATURE_HEADER: &str = "x-paystack-signature";

#[derive(thiserror::Error, Debug)]
pub enum PaystackError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Paystack API error: {0}")]
    ApiError(String),

    #[error("Paystack rejected the request: {0}")]
    Rejected(String),
}

#[derive(Debug, Serialize)]
pub struct InitializeTransaction<'a> {
    pub email: &'a str,
    /// Amount in the currency's minor unit (kobo for NGN).
    pub amount: i64,
    pub currency: &'a str,
    pub reference: &'a str,
    pub callback_url: &'a str,
    pub metadata: JsonValue,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InitializedTransaction {
    pub authorization_url: String,
    pub access_code: String,
    pub reference: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Success,
    Failed,
    Abandoned,
    Reversed,
    Ongoing,
    Pending,
    Processing,
    Queued,
    #[serde(other)]
    Unknown,
}

impl TransactionStatus {
    /// Statuses after which the payment will never succeed. `abandoned` is
    /// not one of them: Paystack reports it while the buyer is still on the
    /// checkout page.
    pub fn is_terminal_failure(&self) -> bool {
        matches!(self, TransactionStatus::Failed | TransactionStatus::Reversed)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerifiedTransaction {
    pub status: TransactionStatus,
    pub reference: String,
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub gateway_response: Option<String>,
    #[serde(default)]
    pub paid_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: bool,
    message: String,
    data: Option<T>,
}

/// Webhook body. Only the fields we act on are typed.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub event: String,
    pub data: WebhookData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookData {
    pub reference: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub gateway_response: Option<String>,
}

#[derive(Clone)]
pub struct PaystackClient {
    http: Client,
    base_url: String,
    secret_key: Secret<String>,
}

impl PaystackClient {
    pub fn new(base_url: &str, secret_key: Secret<String>) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_default();

        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            secret_key,
        }
    }

    /// Unique per bulk registration; Paystack rejects reused references.
    pub fn generate_reference() -> String {
        format!("CL-{}", Uuid::new_v4().simple())
    }

    /// Checks the `x-paystack-signature` header against the raw request body.
    pub fn verify_webhook_signature(&self, body: &[u8], signature_hex: &str) -> bool {
        signature::verify_sha512(body, signature_hex, self.secret_key.expose_secret().as_bytes())
    }

    #[tracing::instrument(skip(self, request), fields(reference = %request.reference, amount = request.amount))]
    pub async fn initialize_transaction(
        &self,
        request: &InitializeTransaction<'_>,
    ) -> Result<InitializedTransaction, PaystackError> {
        let url = format!("{}/transaction/initialize", self.base_url);

        let response = self
            .http
            .post(&url)
            .bearer_auth(self.secret_key.expose_secret())
            .json(request)
            .send()
            .await?;

        let initialized: InitializedTransaction = Self::parse(response).await?;

        tracing::info!(
            reference = %initialized.reference,
            "Paystack transaction initialized"
        );

        Ok(initialized)
    }

    #[tracing::instrument(skip(self))]
    pub async fn verify_transaction(
        &self,
        reference: &str,
    ) -> Result<VerifiedTransaction, PaystackError> {
        let url = format!("{}/transaction/verify/{}", self.base_url, reference);

        let response = self
            .http
            .get(&url)
            .bearer_auth(self.secret_key.expose_secret())
            .send()
            .await?;

        let verified: VerifiedTransaction = Self::parse(response).await?;

        tracing::debug!(
            status = ?verified.status,
            amount = verified.amount,
            "Paystack transaction verified"
        );

        Ok(verified)
    }

    async fn parse<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, PaystackError> {
        let status = response.status();
        let body = response.text().await?;

        let envelope: Envelope<T> = serde_json::from_str(&body).map_err(|e| {
            tracing::error!(status = %status, error = %e, "Unparseable Paystack response");
            PaystackError::ApiError(format!("Status {}: unexpected response body", status))
        })?;

        if !status.is_success() || !envelope.status {
            tracing::warn!(status = %status, message = %envelope.message, "Paystack request failed");
            return Err(PaystackError::Rejected(envelope.message));
        }

        envelope
            .data
            .ok_or_else(|| PaystackError::ApiError("Response did not include data".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_webhook_signature_verification() {
        let client = PaystackClient::new("https://api.paystack.co", Secret::new("sk_test_abc".into()));
        let body = br#"{"event":"charge.success","data":{"reference":"CL-1"}}"#;
        let signature = signature::sign_sha512(body, b"sk_test_abc");

        assert!(client.verify_webhook_signature(body, &signature));
        assert!(!client.verify_webhook_signature(b"{\"tampered\":true}", &signature));
    }

    #[test]
    fn test_references_are_unique() {
        let a = PaystackClient::generate_reference();
        let b = PaystackClient::generate_reference();

        assert!(a.starts_with("CL-"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_status_deserialization() {
        let verified: VerifiedTransaction = serde_json::from_str(
            r#"{"status":"abandoned","reference":"CL-1","amount":1000,"currency":"NGN"}"#,
        )
        .unwrap();
        assert_eq!(verified.status, TransactionStatus::Abandoned);
        assert!(!verified.status.is_terminal_failure());
        assert!(TransactionStatus::Failed.is_terminal_failure());
        assert!(TransactionStatus::Reversed.is_terminal_failure());

        let odd: TransactionStatus = serde_json::from_str(r#""something_new""#).unwrap();
        assert_eq!(odd, TransactionStatus::Unknown);
        assert!(!TransactionStatus::Ongoing.is_terminal_failure());
    }
}
