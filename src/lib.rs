//! RemitFlow - Cross-Border Remittance Engine
//!
//! Card captures in NGN turn into mobile money payouts in KES, with a
//! ledger in the middle that every writer goes through.
//!
//! # Modules
//!
//! - [`ledger`] - Transfer records and the CAS-guarded state machine
//! - [`coordinator`] - The initiate/resume pipeline over the ledger
//! - [`payment`] - Card capture verification and refunds
//! - [`payout`] - Mobile money payout submission and listing
//! - [`webhook`] - Signed processor callbacks
//! - [`sweep`] - Periodic reconciliation against the payout processor
//! - [`compensation`] - Refund-on-failure with incident escalation
//! - [`recipient`] - Kenyan MSISDN validation and network routing
//! - [`money`] - Minor-unit arithmetic and currency conversion
//! - [`kyc`] - User verification gate
//! - [`gateway`] - HTTP surface (axum)

pub mod config;
pub mod logging;

// Domain primitives
pub mod error;
pub mod money;
pub mod recipient;

// Ledger and the writers that move it
pub mod compensation;
pub mod coordinator;
pub mod incident;
pub mod kyc;
pub mod ledger;
pub mod payment;
pub mod payout;
pub mod sweep;
pub mod webhook;

// HTTP surface
pub mod gateway;

// Convenient re-exports at crate root
pub use compensation::{CompensationHandler, CompensationResult};
pub use coordinator::{CoordinatorConfig, TransferCoordinator, TransferRequest};
pub use error::EngineError;
pub use incident::{Incident, IncidentKind, IncidentPriority, IncidentStore};
pub use kyc::{KycGate, KycStatus};
pub use ledger::{LedgerStore, TransferId, TransferRecord, TransferStatus};
pub use payment::{CaptureStatus, PaymentGateway, RefundStatus};
pub use payout::{PayoutOrder, PayoutOutcome, PayoutProcessor};
pub use recipient::{PrefixTable, validate_recipient};
pub use sweep::{ReconciliationSweep, SweepConfig, SweepSummary, SweepWorker, SweepWorkerConfig};
pub use webhook::{WebhookAck, WebhookIngestor};
