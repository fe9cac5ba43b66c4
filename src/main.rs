//! RemitFlow - Cross-Border Remittance Engine
//!
//! Entry point. Architecture:
//!
//! ```text
//! ┌──────────┐    ┌─────────────┐    ┌──────────┐    ┌───────────┐
//! │  Gateway │───▶│ Coordinator │───▶│  Ledger  │◀───│  Webhooks │
//! │  (axum)  │    │ (validate,  │    │ (CAS     │    │  + Sweep  │
//! │          │    │  submit)    │    │  writes) │    │           │
//! └──────────┘    └─────────────┘    └──────────┘    └───────────┘
//! ```
//!
//! Wiring is picked by config: a `postgres_url` selects the Postgres
//! ledger and the HTTP processor clients; without one, the mock-api
//! feature provides in-memory stores and mock processors.

use std::sync::Arc;
use std::time::Duration;

use remitflow::compensation::CompensationHandler;
use remitflow::config::AppConfig;
use remitflow::coordinator::{CoordinatorConfig, TransferCoordinator};
use remitflow::gateway::{self, state::AppState};
use remitflow::incident::IncidentStore;
use remitflow::kyc::KycGate;
use remitflow::ledger::LedgerStore;
use remitflow::money::CurrencyLimits;
use remitflow::payment::PaymentGateway;
use remitflow::payout::PayoutProcessor;
use remitflow::recipient::PrefixTable;
use remitflow::sweep::{ReconciliationSweep, SweepConfig, SweepWorker, SweepWorkerConfig};
use remitflow::webhook::WebhookIngestor;

// ============================================================
// COMMAND LINE
// ============================================================

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

/// Get port override from command line (--port argument)
fn get_port_override() -> Option<u16> {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if args[i] == "--port" && i + 1 < args.len() {
            return args[i + 1].parse().ok();
        }
    }
    None
}

// ============================================================
// WIRING
// ============================================================

struct Wiring {
    store: Arc<dyn LedgerStore>,
    incidents: Arc<dyn IncidentStore>,
    kyc: Arc<dyn KycGate>,
    payments: Arc<dyn PaymentGateway>,
    processor: Arc<dyn PayoutProcessor>,
}

async fn postgres_wiring(config: &AppConfig, url: &str) -> Wiring {
    use remitflow::incident::{PgIncidentStore, ensure_incident_schema};
    use remitflow::kyc::PgKycGate;
    use remitflow::ledger::PgLedgerStore;
    use remitflow::ledger::schema::ensure_schema;
    use remitflow::payment::HttpPaymentGateway;
    use remitflow::payout::HttpPayoutClient;
    use sqlx::postgres::PgPoolOptions;

    let pool = PgPoolOptions::new()
        .max_connections(16)
        .acquire_timeout(Duration::from_secs(5))
        .connect(url)
        .await
        .expect("Failed to connect to PostgreSQL");

    ensure_schema(&pool)
        .await
        .expect("Failed to apply ledger schema");
    ensure_incident_schema(&pool)
        .await
        .expect("Failed to apply incident schema");

    let payments = HttpPaymentGateway::new(
        config.payment_processor.base_url.clone(),
        config.payment_processor.secret_key.clone(),
        Duration::from_secs(config.payment_processor.timeout_secs),
    )
    .expect("Failed to build payment processor client");

    let processor = HttpPayoutClient::new(
        config.payout_processor.base_url.clone(),
        config.payout_processor.api_key.clone(),
        config.payout_processor.account_id.clone(),
        Duration::from_secs(config.payout_processor.timeout_secs),
    )
    .expect("Failed to build payout processor client");

    Wiring {
        store: Arc::new(PgLedgerStore::new(pool.clone())),
        incidents: Arc::new(PgIncidentStore::new(pool.clone())),
        kyc: Arc::new(PgKycGate::new(pool)),
        payments: Arc::new(payments),
        processor: Arc::new(processor),
    }
}

#[cfg(feature = "mock-api")]
fn mock_wiring() -> Wiring {
    use remitflow::incident::MemoryIncidentStore;
    use remitflow::kyc::StaticKycGate;
    use remitflow::ledger::MemoryLedgerStore;
    use remitflow::payment::MockPaymentGateway;
    use remitflow::payout::MockPayoutProcessor;

    tracing::warn!("No postgres_url configured, using in-memory mock wiring");

    Wiring {
        store: Arc::new(MemoryLedgerStore::new()),
        incidents: Arc::new(MemoryIncidentStore::new()),
        kyc: Arc::new(StaticKycGate::approve_all()),
        payments: Arc::new(MockPaymentGateway::permissive()),
        processor: Arc::new(MockPayoutProcessor::new()),
    }
}

#[cfg(not(feature = "mock-api"))]
fn mock_wiring() -> Wiring {
    panic!("postgres_url is required when the mock-api feature is disabled")
}

// ============================================================
// MAIN
// ============================================================

#[tokio::main]
async fn main() {
    let env = get_env();
    let app_config = AppConfig::load(&env);
    let _log_guard = remitflow::logging::init_logging(&app_config);

    tracing::info!("Starting RemitFlow gateway in {} environment", env);

    let wiring = match &app_config.postgres_url {
        Some(url) => postgres_wiring(&app_config, url).await,
        None => mock_wiring(),
    };

    let fx_rate: rust_decimal::Decimal = app_config
        .corridor
        .fx_rate
        .parse()
        .expect("Invalid corridor.fx_rate in config");

    let coordinator_config = CoordinatorConfig {
        source_currency: app_config.corridor.source_currency.clone(),
        source_scale: app_config.corridor.source_scale,
        payout_currency: app_config.corridor.payout_currency.clone(),
        fx_rate,
        fee_bps: app_config.corridor.fee_bps,
    };

    let compensator = Arc::new(CompensationHandler::new(
        wiring.store.clone(),
        wiring.payments.clone(),
        wiring.incidents.clone(),
    ));

    let coordinator = Arc::new(TransferCoordinator::new(
        wiring.store.clone(),
        wiring.payments.clone(),
        wiring.processor.clone(),
        wiring.kyc.clone(),
        compensator.clone(),
        PrefixTable::kenya_defaults(),
        CurrencyLimits::kenya_defaults(),
        coordinator_config,
    ));

    let payout_ingestor = Arc::new(WebhookIngestor::new(
        wiring.store.clone(),
        compensator.clone(),
        app_config.payout_processor.webhook_secret.clone(),
    ));
    let payment_ingestor = Arc::new(WebhookIngestor::new(
        wiring.store.clone(),
        compensator.clone(),
        app_config.payment_processor.webhook_secret.clone(),
    ));

    let sweep = Arc::new(ReconciliationSweep::new(
        wiring.store.clone(),
        wiring.processor.clone(),
        compensator.clone(),
        SweepConfig {
            page_limit: app_config.payout_processor.page_limit,
            max_pages: app_config.payout_processor.max_pages,
        },
    ));

    let worker = SweepWorker::new(
        sweep,
        coordinator.clone(),
        wiring.store.clone(),
        SweepWorkerConfig {
            sweep_interval: Duration::from_secs(app_config.sweep.interval_secs),
            stale_threshold: Duration::from_secs(app_config.sweep.stale_threshold_secs),
            batch_size: app_config.sweep.batch_size,
        },
    );
    tokio::spawn(async move { worker.run().await });

    let state = Arc::new(AppState::new(
        coordinator,
        wiring.store.clone(),
        payout_ingestor,
        payment_ingestor,
    ));

    let port = get_port_override().unwrap_or(app_config.gateway.port);
    if let Err(e) = gateway::run_server(state, &app_config.gateway.host, port).await {
        tracing::error!(error = %e, "Gateway server exited");
        std::process::exit(1);
    }
}
