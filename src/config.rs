use serde::{Deserialize, Serialize};
use std::fs;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    pub enable_tracing: bool,
    pub gateway: GatewayConfig,
    /// PostgreSQL connection URL; absent means mock wiring (mock-api)
    #[serde(default)]
    pub postgres_url: Option<String>,
    pub payment_processor: PaymentProcessorConfig,
    pub payout_processor: PayoutProcessorConfig,
    #[serde(default)]
    pub corridor: CorridorConfig,
    #[serde(default)]
    pub sweep: SweepSettings,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
}

/// Card payment processor (captures and refunds)
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PaymentProcessorConfig {
    pub base_url: String,
    pub secret_key: String,
    pub webhook_secret: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Mobile money payout processor
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PayoutProcessorConfig {
    pub base_url: String,
    pub api_key: String,
    pub account_id: String,
    pub webhook_secret: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_page_limit")]
    pub page_limit: usize,
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
}

/// Corridor economics: NGN card capture to KES mobile money payout
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CorridorConfig {
    pub source_currency: String,
    pub source_scale: u32,
    pub payout_currency: String,
    /// Destination minor units per major source unit, as a decimal string
    pub fx_rate: String,
    pub fee_bps: u64,
}

impl Default for CorridorConfig {
    fn default() -> Self {
        Self {
            source_currency: "NGN".to_string(),
            source_scale: 2,
            payout_currency: "KES".to_string(),
            fx_rate: "0.085".to_string(),
            fee_bps: 150,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SweepSettings {
    pub interval_secs: u64,
    pub stale_threshold_secs: u64,
    pub batch_size: usize,
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            stale_threshold_secs: 120,
            batch_size: 50,
        }
    }
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_page_limit() -> usize {
    100
}

fn default_max_pages() -> usize {
    50
}

impl AppConfig {
    pub fn load(env: &str) -> Self {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path)
            .unwrap_or_else(|_| panic!("Failed to read config file: {}", config_path));
        serde_yaml::from_str(&content).expect("Failed to parse config yaml")
    }
}
