//! Transfer Ledger
//!
//! The persistent record of every transfer and the state machine that
//! governs it. Writers never read-modify-write: all status movement goes
//! through CAS updates, and processor-reported statuses go through the
//! guarded transition in [`transition`].

pub mod pg;
pub mod schema;
pub mod state;
pub mod store;
pub mod transition;
pub mod types;

pub use pg::PgLedgerStore;
pub use state::{PaymentSubState, TransferStatus};
pub use store::LedgerStore;
#[cfg(any(test, feature = "mock-api"))]
pub use store::MemoryLedgerStore;
pub use types::{TransferId, TransferRecord};
