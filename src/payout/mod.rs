//! Payout Processor Seam
//!
//! Submits mobile-money payouts and pages the processor's transaction
//! list for reconciliation. Submission is idempotent at the processor:
//! one payout per distinct idempotency key, no matter how many times a
//! submission is retried.

pub mod http;

pub use http::HttpPayoutClient;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::EngineError;

/// A payout submission, fully resolved before any network call.
#[derive(Debug, Clone)]
pub struct PayoutOrder {
    pub amount_minor: u64,
    pub currency: String,
    pub routing_code: String,
    pub msisdn: String,
    /// Caller-supplied; the processor dedupes on this, so retries with
    /// the same key can never create a second payout.
    pub idempotency_key: String,
    pub metadata: Value,
}

/// What the processor said when a payout was submitted.
///
/// A rejection is a business outcome the caller must persist, not an
/// error. Only transport failures bubble as `Err`.
#[derive(Debug, Clone)]
pub enum PayoutOutcome {
    Accepted {
        payout_ref: String,
        status: String,
    },
    Rejected {
        code: String,
        reason: String,
        message: String,
        details: Value,
    },
}

/// One payout as reported by the processor's list endpoint.
#[derive(Debug, Clone)]
pub struct ProcessorPayout {
    pub payout_ref: String,
    pub status: String,
    pub failure_reason: Option<String>,
    pub settlement_ref: Option<String>,
}

/// Payout processor operations
#[async_trait]
pub trait PayoutProcessor: Send + Sync {
    /// Processor name for logging
    fn name(&self) -> &'static str;

    /// Submit a payout. Safe to retry with the same idempotency key.
    async fn submit(&self, order: &PayoutOrder) -> Result<PayoutOutcome, EngineError>;

    /// Page the processor's payout list, newest first.
    async fn list(&self, limit: usize, offset: usize)
    -> Result<Vec<ProcessorPayout>, EngineError>;
}

/// Mock processor for tests and mock-api deployments
#[cfg(any(test, feature = "mock-api"))]
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub struct MockPayoutProcessor {
        /// idempotency key -> payout_ref; the dedupe table
        submissions: Mutex<HashMap<String, String>>,
        /// payout_ref -> reported payout, in submission order via `order`
        payouts: Mutex<HashMap<String, ProcessorPayout>>,
        order: Mutex<Vec<String>>,
        submit_count: AtomicUsize,
        next_ref: AtomicUsize,
        reject_next: Mutex<Option<(String, String)>>,
        network_failure: Mutex<bool>,
    }

    impl MockPayoutProcessor {
        pub fn new() -> Self {
            Self {
                submissions: Mutex::new(HashMap::new()),
                payouts: Mutex::new(HashMap::new()),
                order: Mutex::new(Vec::new()),
                submit_count: AtomicUsize::new(0),
                next_ref: AtomicUsize::new(1),
                reject_next: Mutex::new(None),
                network_failure: Mutex::new(false),
            }
        }

        /// Reject the next submission with the given code and reason.
        pub fn set_reject_next(&self, code: &str, reason: &str) {
            *self.reject_next.lock().unwrap() = Some((code.to_string(), reason.to_string()));
        }

        pub fn set_network_failure(&self, fail: bool) {
            *self.network_failure.lock().unwrap() = fail;
        }

        /// Overwrite the status the list endpoint reports for a payout.
        pub fn set_payout_status(
            &self,
            payout_ref: &str,
            status: &str,
            failure_reason: Option<&str>,
            settlement_ref: Option<&str>,
        ) {
            let mut payouts = self.payouts.lock().unwrap();
            if let Some(p) = payouts.get_mut(payout_ref) {
                p.status = status.to_string();
                p.failure_reason = failure_reason.map(String::from);
                p.settlement_ref = settlement_ref.map(String::from);
            }
        }

        pub fn submit_count(&self) -> usize {
            self.submit_count.load(Ordering::SeqCst)
        }

        /// Distinct idempotency keys seen, i.e. payouts actually created.
        pub fn distinct_key_count(&self) -> usize {
            self.submissions.lock().unwrap().len()
        }
    }

    impl Default for MockPayoutProcessor {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl PayoutProcessor for MockPayoutProcessor {
        fn name(&self) -> &'static str {
            "mock-payout"
        }

        async fn submit(&self, order: &PayoutOrder) -> Result<PayoutOutcome, EngineError> {
            self.submit_count.fetch_add(1, Ordering::SeqCst);

            if *self.network_failure.lock().unwrap() {
                return Err(EngineError::Network("mock submit timeout".to_string()));
            }

            if let Some((code, reason)) = self.reject_next.lock().unwrap().take() {
                return Ok(PayoutOutcome::Rejected {
                    message: reason.clone(),
                    code,
                    reason,
                    details: Value::Null,
                });
            }

            // Dedupe on idempotency key: a retried submission returns the
            // payout created the first time.
            let mut submissions = self.submissions.lock().unwrap();
            if let Some(existing_ref) = submissions.get(&order.idempotency_key) {
                let payouts = self.payouts.lock().unwrap();
                let status = payouts
                    .get(existing_ref)
                    .map(|p| p.status.clone())
                    .unwrap_or_else(|| "pending".to_string());
                return Ok(PayoutOutcome::Accepted {
                    payout_ref: existing_ref.clone(),
                    status,
                });
            }

            let n = self.next_ref.fetch_add(1, Ordering::SeqCst);
            let payout_ref = format!("po_{}", n);
            submissions.insert(order.idempotency_key.clone(), payout_ref.clone());
            self.payouts.lock().unwrap().insert(
                payout_ref.clone(),
                ProcessorPayout {
                    payout_ref: payout_ref.clone(),
                    status: "pending".to_string(),
                    failure_reason: None,
                    settlement_ref: None,
                },
            );
            self.order.lock().unwrap().push(payout_ref.clone());

            Ok(PayoutOutcome::Accepted {
                payout_ref,
                status: "pending".to_string(),
            })
        }

        async fn list(
            &self,
            limit: usize,
            offset: usize,
        ) -> Result<Vec<ProcessorPayout>, EngineError> {
            if *self.network_failure.lock().unwrap() {
                return Err(EngineError::Network("mock list timeout".to_string()));
            }

            let order = self.order.lock().unwrap();
            let payouts = self.payouts.lock().unwrap();

            // Newest first, like the real endpoint
            Ok(order
                .iter()
                .rev()
                .skip(offset)
                .take(limit)
                .filter_map(|r| payouts.get(r).cloned())
                .collect())
        }
    }
}

#[cfg(any(test, feature = "mock-api"))]
pub use mock::MockPayoutProcessor;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn order_with_key(key: &str) -> PayoutOrder {
        PayoutOrder {
            amount_minor: 1265,
            currency: "KES".to_string(),
            routing_code: "ke_mobile_money".to_string(),
            msisdn: "254712345678".to_string(),
            idempotency_key: key.to_string(),
            metadata: json!({"transfer_id": "t1"}),
        }
    }

    #[tokio::test]
    async fn test_mock_dedupes_on_idempotency_key() {
        let processor = MockPayoutProcessor::new();

        let first = processor.submit(&order_with_key("payout-a")).await.unwrap();
        let PayoutOutcome::Accepted { payout_ref, .. } = first else {
            panic!("expected acceptance");
        };

        // Same key resubmitted: same payout, no new one created
        let second = processor.submit(&order_with_key("payout-a")).await.unwrap();
        let PayoutOutcome::Accepted {
            payout_ref: second_ref,
            ..
        } = second
        else {
            panic!("expected acceptance");
        };
        assert_eq!(payout_ref, second_ref);
        assert_eq!(processor.submit_count(), 2);
        assert_eq!(processor.distinct_key_count(), 1);

        // Different key creates a different payout
        let third = processor.submit(&order_with_key("payout-b")).await.unwrap();
        let PayoutOutcome::Accepted {
            payout_ref: third_ref,
            ..
        } = third
        else {
            panic!("expected acceptance");
        };
        assert_ne!(payout_ref, third_ref);
        assert_eq!(processor.distinct_key_count(), 2);
    }

    #[tokio::test]
    async fn test_mock_rejection_is_an_outcome() {
        let processor = MockPayoutProcessor::new();
        processor.set_reject_next("insufficient_float", "float balance too low");

        let outcome = processor.submit(&order_with_key("payout-c")).await.unwrap();
        let PayoutOutcome::Rejected { code, reason, .. } = outcome else {
            panic!("expected rejection");
        };
        assert_eq!(code, "insufficient_float");
        assert_eq!(reason, "float balance too low");

        // Rejection consumed; next submission goes through
        let outcome = processor.submit(&order_with_key("payout-c")).await.unwrap();
        assert!(matches!(outcome, PayoutOutcome::Accepted { .. }));
    }

    #[tokio::test]
    async fn test_mock_list_pages_newest_first() {
        let processor = MockPayoutProcessor::new();
        for i in 0..5 {
            processor
                .submit(&order_with_key(&format!("payout-{}", i)))
                .await
                .unwrap();
        }
        processor.set_payout_status("po_5", "completed", None, Some("batch_1"));

        let page = processor.list(2, 0).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].payout_ref, "po_5");
        assert_eq!(page[0].status, "completed");
        assert_eq!(page[0].settlement_ref.as_deref(), Some("batch_1"));

        let page = processor.list(2, 4).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].payout_ref, "po_1");

        let page = processor.list(2, 10).await.unwrap();
        assert!(page.is_empty());
    }

    #[tokio::test]
    async fn test_mock_network_failure_is_err() {
        let processor = MockPayoutProcessor::new();
        processor.set_network_failure(true);
        assert!(processor.submit(&order_with_key("payout-x")).await.is_err());
        assert!(processor.list(10, 0).await.is_err());
    }
}
