//! Ledger Schema
//!
//! DDL for the transfers table. Idempotent, applied at startup.

use sqlx::PgPool;

use crate::error::EngineError;

const TRANSFERS_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS transfers_tb (
    id                  BIGSERIAL PRIMARY KEY,
    transfer_id         VARCHAR(26) NOT NULL UNIQUE,
    user_id             BIGINT NOT NULL,

    source_amount       BIGINT NOT NULL,
    fee                 BIGINT NOT NULL,
    total_charged       BIGINT NOT NULL,
    source_currency     VARCHAR(8) NOT NULL,

    payout_amount       BIGINT NOT NULL,
    payout_currency     VARCHAR(8) NOT NULL,

    recipient_raw       VARCHAR(64) NOT NULL,
    recipient_local     VARCHAR(16) NOT NULL,
    recipient_network   VARCHAR(32) NOT NULL,
    routing_code        VARCHAR(32) NOT NULL,

    payment_ref         VARCHAR(128) NOT NULL,
    payout_ref          VARCHAR(128),
    idempotency_key     VARCHAR(64) NOT NULL UNIQUE,

    status              SMALLINT NOT NULL,
    failure_reason      TEXT,
    settlement_ref      VARCHAR(128),

    refund_state        SMALLINT,
    refund_ref          VARCHAR(128),
    manual_intervention BOOLEAN NOT NULL DEFAULT FALSE,

    created_at          TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at          TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_transfers_payout_ref
    ON transfers_tb (payout_ref) WHERE payout_ref IS NOT NULL;

CREATE INDEX IF NOT EXISTS idx_transfers_status_updated
    ON transfers_tb (status, updated_at);
"#;

/// Apply the ledger DDL. Safe to run on every startup.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), EngineError> {
    for statement in TRANSFERS_DDL.split(';') {
        let statement = statement.trim();
        if statement.is_empty() {
            continue;
        }
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}
