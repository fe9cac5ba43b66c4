//! Gateway Shared State

use std::sync::Arc;

use crate::coordinator::TransferCoordinator;
use crate::ledger::LedgerStore;
use crate::webhook::WebhookIngestor;

/// Application state shared by every handler.
pub struct AppState {
    pub coordinator: Arc<TransferCoordinator>,
    pub store: Arc<dyn LedgerStore>,
    /// Payout-processor deliveries, verified with the payout secret
    pub payout_ingestor: Arc<WebhookIngestor>,
    /// Payment-processor deliveries, verified with the payment secret
    pub payment_ingestor: Arc<WebhookIngestor>,
}

impl AppState {
    pub fn new(
        coordinator: Arc<TransferCoordinator>,
        store: Arc<dyn LedgerStore>,
        payout_ingestor: Arc<WebhookIngestor>,
        payment_ingestor: Arc<WebhookIngestor>,
    ) -> Self {
        Self {
            coordinator,
            store,
            payout_ingestor,
            payment_ingestor,
        }
    }
}
