//! Payment Gateway Seam
//!
//! Verifies card captures before a payout is created and issues refunds
//! during compensation. Verification is read-only; `issue_refund` is the
//! only method with a side effect.

pub mod http;

pub use http::HttpPaymentGateway;

use async_trait::async_trait;

use crate::error::EngineError;

/// State of a capture at the payment processor.
///
/// Only `Succeeded` permits a payout. Everything else is a fail-fast
/// validation outcome, not a processor error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureStatus {
    Succeeded,
    Pending,
    Failed,
    Unknown,
}

impl CaptureStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaptureStatus::Succeeded => "succeeded",
            CaptureStatus::Pending => "pending",
            CaptureStatus::Failed => "failed",
            CaptureStatus::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefundStatus {
    Succeeded,
    Failed,
}

/// Outcome of a refund attempt
#[derive(Debug, Clone)]
pub struct RefundOutcome {
    pub refund_ref: Option<String>,
    pub status: RefundStatus,
}

/// Payment processor operations
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Gateway name for logging
    fn name(&self) -> &'static str;

    /// Verify the state of a capture. Side-effect-free.
    async fn verify_capture(&self, payment_ref: &str) -> Result<CaptureStatus, EngineError>;

    /// Refund a capture, fully or partially, in source minor units.
    async fn issue_refund(
        &self,
        payment_ref: &str,
        amount_minor: u64,
    ) -> Result<RefundOutcome, EngineError>;
}

/// Mock gateway for tests and mock-api deployments
#[cfg(any(test, feature = "mock-api"))]
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub struct MockPaymentGateway {
        /// Per-reference capture statuses; unlisted refs verify as the
        /// default status
        captures: Mutex<HashMap<String, CaptureStatus>>,
        default_status: CaptureStatus,
        verify_count: AtomicUsize,
        refund_count: AtomicUsize,
        fail_refund: Mutex<bool>,
        refund_network_error: Mutex<bool>,
    }

    impl MockPaymentGateway {
        pub fn new() -> Self {
            Self::with_default(CaptureStatus::Unknown)
        }

        /// Every unlisted reference verifies as succeeded. Mock-api
        /// deployments use this so any payment_ref is accepted.
        pub fn permissive() -> Self {
            Self::with_default(CaptureStatus::Succeeded)
        }

        fn with_default(default_status: CaptureStatus) -> Self {
            Self {
                captures: Mutex::new(HashMap::new()),
                default_status,
                verify_count: AtomicUsize::new(0),
                refund_count: AtomicUsize::new(0),
                fail_refund: Mutex::new(false),
                refund_network_error: Mutex::new(false),
            }
        }

        pub fn set_capture(&self, payment_ref: &str, status: CaptureStatus) {
            self.captures
                .lock()
                .unwrap()
                .insert(payment_ref.to_string(), status);
        }

        pub fn set_fail_refund(&self, fail: bool) {
            *self.fail_refund.lock().unwrap() = fail;
        }

        pub fn set_refund_network_error(&self, fail: bool) {
            *self.refund_network_error.lock().unwrap() = fail;
        }

        pub fn verify_count(&self) -> usize {
            self.verify_count.load(Ordering::SeqCst)
        }

        pub fn refund_count(&self) -> usize {
            self.refund_count.load(Ordering::SeqCst)
        }
    }

    impl Default for MockPaymentGateway {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl PaymentGateway for MockPaymentGateway {
        fn name(&self) -> &'static str {
            "mock-payment"
        }

        async fn verify_capture(&self, payment_ref: &str) -> Result<CaptureStatus, EngineError> {
            self.verify_count.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .captures
                .lock()
                .unwrap()
                .get(payment_ref)
                .copied()
                .unwrap_or(self.default_status))
        }

        async fn issue_refund(
            &self,
            payment_ref: &str,
            _amount_minor: u64,
        ) -> Result<RefundOutcome, EngineError> {
            self.refund_count.fetch_add(1, Ordering::SeqCst);

            if *self.refund_network_error.lock().unwrap() {
                return Err(EngineError::Network("mock refund timeout".to_string()));
            }

            if *self.fail_refund.lock().unwrap() {
                Ok(RefundOutcome {
                    refund_ref: None,
                    status: RefundStatus::Failed,
                })
            } else {
                Ok(RefundOutcome {
                    refund_ref: Some(format!("rf_{}", payment_ref)),
                    status: RefundStatus::Succeeded,
                })
            }
        }
    }
}

#[cfg(any(test, feature = "mock-api"))]
pub use mock::MockPaymentGateway;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_verify_defaults_unknown() {
        let gw = MockPaymentGateway::new();
        assert_eq!(
            gw.verify_capture("pay_missing").await.unwrap(),
            CaptureStatus::Unknown
        );

        gw.set_capture("pay_1", CaptureStatus::Succeeded);
        assert_eq!(
            gw.verify_capture("pay_1").await.unwrap(),
            CaptureStatus::Succeeded
        );
        assert_eq!(gw.verify_count(), 2);
    }

    #[tokio::test]
    async fn test_mock_refund_toggles() {
        let gw = MockPaymentGateway::new();

        let outcome = gw.issue_refund("pay_1", 500).await.unwrap();
        assert_eq!(outcome.status, RefundStatus::Succeeded);
        assert_eq!(outcome.refund_ref.as_deref(), Some("rf_pay_1"));

        gw.set_fail_refund(true);
        let outcome = gw.issue_refund("pay_1", 500).await.unwrap();
        assert_eq!(outcome.status, RefundStatus::Failed);
        assert!(outcome.refund_ref.is_none());

        gw.set_refund_network_error(true);
        assert!(gw.issue_refund("pay_1", 500).await.is_err());
        assert_eq!(gw.refund_count(), 3);
    }
}
