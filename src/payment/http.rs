//! HTTP Payment Gateway Client
//!
//! Talks to the upstream card processor over its REST API:
//! `GET /transaction/verify/{reference}` and `POST /refund`.
//! Bearer-authenticated, bounded timeout; transport failures surface as
//! transient network errors.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{info, warn};

use super::{CaptureStatus, PaymentGateway, RefundOutcome, RefundStatus};
use crate::error::EngineError;

pub struct HttpPaymentGateway {
    client: reqwest::Client,
    base_url: String,
    secret_key: String,
}

#[derive(Deserialize)]
struct VerifyResponse {
    status: bool,
    message: Option<String>,
    data: Option<VerifyData>,
}

#[derive(Deserialize)]
struct VerifyData {
    status: String,
}

#[derive(Deserialize)]
struct RefundResponse {
    status: bool,
    message: Option<String>,
    data: Option<RefundData>,
}

#[derive(Deserialize)]
struct RefundData {
    reference: Option<String>,
    status: Option<String>,
}

impl HttpPaymentGateway {
    pub fn new(
        base_url: String,
        secret_key: String,
        timeout: Duration,
    ) -> Result<Self, EngineError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EngineError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            secret_key,
        })
    }

    fn map_capture_status(status: &str) -> CaptureStatus {
        match status {
            "success" => CaptureStatus::Succeeded,
            "pending" | "ongoing" | "processing" => CaptureStatus::Pending,
            "failed" | "abandoned" | "reversed" => CaptureStatus::Failed,
            _ => CaptureStatus::Unknown,
        }
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    fn name(&self) -> &'static str {
        "http-payment"
    }

    async fn verify_capture(&self, payment_ref: &str) -> Result<CaptureStatus, EngineError> {
        let url = format!("{}/transaction/verify/{}", self.base_url, payment_ref);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| EngineError::Network(format!("verify request failed: {}", e)))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            // Unknown reference verifies as an unconfirmed capture
            return Ok(CaptureStatus::Unknown);
        }

        let body: VerifyResponse = response
            .json()
            .await
            .map_err(|e| EngineError::Network(format!("verify response malformed: {}", e)))?;

        if !body.status {
            warn!(
                payment_ref,
                message = body.message.as_deref().unwrap_or(""),
                "Capture verification returned an error envelope"
            );
            return Ok(CaptureStatus::Unknown);
        }

        let status = body
            .data
            .map(|d| Self::map_capture_status(&d.status))
            .unwrap_or(CaptureStatus::Unknown);

        Ok(status)
    }

    async fn issue_refund(
        &self,
        payment_ref: &str,
        amount_minor: u64,
    ) -> Result<RefundOutcome, EngineError> {
        let url = format!("{}/refund", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.secret_key)
            .json(&json!({
                "transaction": payment_ref,
                "amount": amount_minor,
            }))
            .send()
            .await
            .map_err(|e| EngineError::Network(format!("refund request failed: {}", e)))?;

        let http_status = response.status();
        let body: RefundResponse = response
            .json()
            .await
            .map_err(|e| EngineError::Network(format!("refund response malformed: {}", e)))?;

        if !http_status.is_success() || !body.status {
            warn!(
                payment_ref,
                http_status = http_status.as_u16(),
                message = body.message.as_deref().unwrap_or(""),
                "Refund declined by payment processor"
            );
            return Ok(RefundOutcome {
                refund_ref: None,
                status: RefundStatus::Failed,
            });
        }

        let refund_ref = body.data.as_ref().and_then(|d| d.reference.clone());
        let declared = body
            .data
            .as_ref()
            .and_then(|d| d.status.as_deref())
            .unwrap_or("processed");

        info!(payment_ref, refund_ref = ?refund_ref, declared, "Refund accepted");

        Ok(RefundOutcome {
            refund_ref,
            status: RefundStatus::Succeeded,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_status_mapping() {
        assert_eq!(
            HttpPaymentGateway::map_capture_status("success"),
            CaptureStatus::Succeeded
        );
        assert_eq!(
            HttpPaymentGateway::map_capture_status("pending"),
            CaptureStatus::Pending
        );
        assert_eq!(
            HttpPaymentGateway::map_capture_status("abandoned"),
            CaptureStatus::Failed
        );
        assert_eq!(
            HttpPaymentGateway::map_capture_status("???"),
            CaptureStatus::Unknown
        );
    }
}
