use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::{Value, json};
use sha2::Sha256;
use tracing::error;
use uuid::Uuid;

use crate::domain::repositories::payment_gateway::PixGateway;
use crate::domain::value_objects::{
    enums::payment_statuses::PaymentStatus,
    payments::{ChargeDetails, CreateChargeRequest, CreatedCharge},
};

type HmacSha256 = Hmac<Sha256>;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct PixClientConfig {
    pub base_url: String,
    pub access_token: String,
    pub notification_url: Option<String>,
    pub webhook_secret: Option<String>,
}

/// Minimal PIX payments client built on reqwest (Mercado-Pago-shaped API).
pub struct PixClient {
    http: reqwest::Client,
    base_url: String,
    access_token: String,
    notification_url: Option<String>,
    webhook_secret: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PaymentResponse {
    id: PaymentId,
    status: Option<String>,
    transaction_amount: Option<f64>,
    external_reference: Option<String>,
    date_approved: Option<DateTime<Utc>>,
    point_of_interaction: Option<PointOfInteraction>,
}

/// The provider serializes payment ids as numbers on some product lines and
/// strings on others.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PaymentId {
    Num(i64),
    Str(String),
}

impl PaymentId {
    fn into_string(self) -> String {
        match self {
            PaymentId::Num(n) => n.to_string(),
            PaymentId::Str(s) => s,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PointOfInteraction {
    transaction_data: Option<TransactionData>,
}

#[derive(Debug, Deserialize)]
struct TransactionData {
    qr_code: Option<String>,
    ticket_url: Option<String>,
}

impl PixClient {
    pub fn new(config: PixClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            access_token: config.access_token,
            notification_url: config.notification_url,
            webhook_secret: config.webhook_secret,
        })
    }

    async fn ensure_success(resp: reqwest::Response, context: &str) -> Result<reqwest::Response> {
        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status();
        let request_id = resp
            .headers()
            .get("x-request-id")
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        let body = match resp.text().await {
            Ok(text) if !text.is_empty() => text,
            Ok(_) => "<empty response body>".to_string(),
            Err(err) => format!("<failed to read response body: {err}>"),
        };

        error!(
            status = %status,
            request_id = ?request_id,
            response_body = %body,
            context = %context,
            "pix api request failed"
        );

        anyhow::bail!(
            "PIX API request failed: {} (status {}, request_id={:?})",
            context,
            status,
            request_id
        );
    }

    fn status_from(raw: Option<&str>) -> PaymentStatus {
        raw.map(PaymentStatus::from_str)
            .unwrap_or(PaymentStatus::Unknown)
    }

    fn amount_to_minor(amount: f64) -> i32 {
        (amount * 100.0).round() as i32
    }

    pub fn has_webhook_secret(&self) -> bool {
        self.webhook_secret.is_some()
    }

    /// Verifies the provider's `x-signature` header (`ts=...,v1=...` over the
    /// manifest `id:<id>;request-id:<rid>;ts:<ts>;`). Callers treat the result
    /// as advisory: the scheme is not stable across provider product lines.
    pub fn verify_webhook_signature(
        &self,
        signature_header: &str,
        request_id: &str,
        data_id: &str,
    ) -> Result<()> {
        let secret = self
            .webhook_secret
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("no webhook secret configured"))?;

        let mut timestamp: Option<&str> = None;
        let mut signature: Option<&str> = None;
        for part in signature_header.split(',') {
            let part = part.trim();
            if let Some(rest) = part.strip_prefix("ts=") {
                timestamp = Some(rest);
            } else if let Some(rest) = part.strip_prefix("v1=") {
                signature = Some(rest);
            }
        }

        let timestamp =
            timestamp.ok_or_else(|| anyhow::anyhow!("missing ts in x-signature header"))?;
        let signature =
            signature.ok_or_else(|| anyhow::anyhow!("missing v1 in x-signature header"))?;

        let manifest = format!("id:{data_id};request-id:{request_id};ts:{timestamp};");
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())?;
        mac.update(manifest.as_bytes());
        let expected = mac.finalize().into_bytes();
        let provided = hex::decode(signature)?;

        if expected[..] != provided[..] {
            anyhow::bail!("invalid webhook signature");
        }

        Ok(())
    }
}

#[async_trait]
impl PixGateway for PixClient {
    async fn create_payment(&self, request: CreateChargeRequest) -> Result<CreatedCharge> {
        let mut body = json!({
            "transaction_amount": f64::from(request.amount_minor) / 100.0,
            "description": request.description,
            "payment_method_id": "pix",
            "external_reference": request.external_reference,
            "payer": {
                "email": request.payer_email,
            },
        });
        if let Some(notification_url) = self.notification_url.as_deref() {
            body["notification_url"] = Value::String(notification_url.to_string());
        }

        let resp = self
            .http
            .post(format!("{}/v1/payments", self.base_url))
            .header(AUTHORIZATION, format!("Bearer {}", self.access_token))
            .header(CONTENT_TYPE, "application/json")
            .header("X-Idempotency-Key", Uuid::new_v4().to_string())
            .json(&body)
            .send()
            .await?;
        let resp = Self::ensure_success(resp, "create payment").await?;

        let parsed: PaymentResponse = resp.json().await?;
        let transaction_data = parsed
            .point_of_interaction
            .and_then(|poi| poi.transaction_data);

        Ok(CreatedCharge {
            payment_id: parsed.id.into_string(),
            status: Self::status_from(parsed.status.as_deref()),
            qr_payload: transaction_data.as_ref().and_then(|tx| tx.qr_code.clone()),
            checkout_url: transaction_data.and_then(|tx| tx.ticket_url),
        })
    }

    async fn get_payment(&self, payment_id: &str) -> Result<ChargeDetails> {
        let resp = self
            .http
            .get(format!("{}/v1/payments/{}", self.base_url, payment_id))
            .header(AUTHORIZATION, format!("Bearer {}", self.access_token))
            .send()
            .await?;
        let resp = Self::ensure_success(resp, "get payment").await?;

        let parsed: PaymentResponse = resp.json().await?;

        Ok(ChargeDetails {
            payment_id: parsed.id.into_string(),
            status: Self::status_from(parsed.status.as_deref()),
            amount_minor: parsed.transaction_amount.map(Self::amount_to_minor),
            external_reference: parsed.external_reference,
            approved_at: parsed.date_approved,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payment_id_accepts_numeric_and_string_forms() {
        let numeric: PaymentResponse =
            serde_json::from_str(r#"{"id":123456789,"status":"approved"}"#).unwrap();
        assert_eq!(numeric.id.into_string(), "123456789");

        let string: PaymentResponse =
            serde_json::from_str(r#"{"id":"pay-abc","status":"pending"}"#).unwrap();
        assert_eq!(string.id.into_string(), "pay-abc");
    }

    #[test]
    fn amount_conversion_rounds_to_centavos() {
        assert_eq!(PixClient::amount_to_minor(19.90), 1990);
        assert_eq!(PixClient::amount_to_minor(29.99), 2999);
        assert_eq!(PixClient::amount_to_minor(0.1 + 0.2), 30);
    }

    #[test]
    fn signature_round_trip_verifies() {
        let client = PixClient::new(PixClientConfig {
            base_url: "https://api.example".to_string(),
            access_token: "token".to_string(),
            notification_url: None,
            webhook_secret: Some("secret".to_string()),
        })
        .unwrap();

        let manifest = "id:123;request-id:req-1;ts:1700000000;";
        let mut mac = HmacSha256::new_from_slice(b"secret").unwrap();
        mac.update(manifest.as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());
        let header = format!("ts=1700000000,v1={signature}");

        assert!(
            client
                .verify_webhook_signature(&header, "req-1", "123")
                .is_ok()
        );
        assert!(
            client
                .verify_webhook_signature(&header, "req-2", "123")
                .is_err()
        );
    }
}
