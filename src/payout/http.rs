//! HTTP Payout Client
//!
//! Talks to the mobile-money payout processor: `POST /payouts` with an
//! `Idempotency-Key` header and `GET /payouts?limit=&offset=` for the
//! reconciliation list. Business rejections (4xx with an error body)
//! surface as [`PayoutOutcome::Rejected`]; only transport failures are
//! errors.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{info, warn};

use super::{PayoutOrder, PayoutOutcome, PayoutProcessor, ProcessorPayout};
use crate::error::EngineError;

pub struct HttpPayoutClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    account_id: String,
}

#[derive(Deserialize)]
struct SubmitResponse {
    id: String,
    status: String,
}

#[derive(Deserialize)]
struct RejectionBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    details: Option<Value>,
}

#[derive(Deserialize)]
struct ListResponse {
    data: Vec<ListedPayout>,
}

#[derive(Deserialize)]
struct ListedPayout {
    id: String,
    status: String,
    #[serde(default)]
    failure_reason: Option<String>,
    #[serde(default)]
    settlement_ref: Option<String>,
}

impl HttpPayoutClient {
    pub fn new(
        base_url: String,
        api_key: String,
        account_id: String,
        timeout: Duration,
    ) -> Result<Self, EngineError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EngineError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            api_key,
            account_id,
        })
    }
}

#[async_trait]
impl PayoutProcessor for HttpPayoutClient {
    fn name(&self) -> &'static str {
        "http-payout"
    }

    async fn submit(&self, order: &PayoutOrder) -> Result<PayoutOutcome, EngineError> {
        let url = format!("{}/payouts", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("Idempotency-Key", &order.idempotency_key)
            .header("X-Account-Id", &self.account_id)
            .json(&json!({
                "amount": {
                    "currency": order.currency,
                    "value": order.amount_minor,
                },
                "destination": {
                    "routing_code": order.routing_code,
                    "account_id": order.msisdn,
                },
                "metadata": order.metadata,
            }))
            .send()
            .await
            .map_err(|e| EngineError::Network(format!("payout submit failed: {}", e)))?;

        let http_status = response.status();

        if http_status.is_success() {
            let body: SubmitResponse = response.json().await.map_err(|e| {
                EngineError::Network(format!("payout submit response malformed: {}", e))
            })?;

            info!(
                payout_ref = %body.id,
                status = %body.status,
                idempotency_key = %order.idempotency_key,
                "Payout accepted by processor"
            );
            return Ok(PayoutOutcome::Accepted {
                payout_ref: body.id,
                status: body.status,
            });
        }

        if http_status.is_client_error() {
            // Business rejection: the processor refused this payout.
            // Persisted by the caller, never retried blindly.
            let body: RejectionBody = response.json().await.unwrap_or(RejectionBody {
                code: None,
                reason: None,
                message: None,
                details: None,
            });

            let code = body.code.unwrap_or_else(|| "rejected".to_string());
            let reason = body
                .reason
                .unwrap_or_else(|| "payout rejected by processor".to_string());
            warn!(
                idempotency_key = %order.idempotency_key,
                http_status = http_status.as_u16(),
                code = %code,
                reason = %reason,
                "Payout rejected by processor"
            );
            return Ok(PayoutOutcome::Rejected {
                message: body.message.unwrap_or_default(),
                details: body.details.unwrap_or(Value::Null),
                code,
                reason,
            });
        }

        // 5xx: the processor may or may not have recorded the payout.
        // Transient; retry with the same key resolves it either way.
        Err(EngineError::Network(format!(
            "payout submit returned HTTP {}",
            http_status.as_u16()
        )))
    }

    async fn list(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<ProcessorPayout>, EngineError> {
        let url = format!(
            "{}/payouts?limit={}&offset={}",
            self.base_url, limit, offset
        );

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .header("X-Account-Id", &self.account_id)
            .send()
            .await
            .map_err(|e| EngineError::Network(format!("payout list failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(EngineError::Network(format!(
                "payout list returned HTTP {}",
                response.status().as_u16()
            )));
        }

        let body: ListResponse = response
            .json()
            .await
            .map_err(|e| EngineError::Network(format!("payout list response malformed: {}", e)))?;

        Ok(body
            .data
            .into_iter()
            .map(|p| ProcessorPayout {
                payout_ref: p.id,
                status: p.status,
                failure_reason: p.failure_reason,
                settlement_ref: p.settlement_ref,
            })
            .collect())
    }
}
