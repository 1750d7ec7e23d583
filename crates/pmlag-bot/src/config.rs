//! Application configuration.
//!
//! One TOML file, one section per component. Every field has a default
//! except the instrument ids. Trading credentials are read from the
//! environment, never from the file.

use crate::error::{AppError, AppResult};
use alloy::primitives::Address;
use pmlag_core::InstrumentId;
use pmlag_dashboard::PresenterConfig;
use pmlag_detector::TriggerConfig;
use pmlag_executor::{
    parse_address, ApiCredentials, ExecutionConfig, ExecutionMode, ExitConfig, KeyManager,
    VenueConfig,
};
use pmlag_feed::TrackerConfig;
use pmlag_ws::{ConnectionConfig, MarketSubscription};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use zeroize::Zeroizing;

pub const PRIVATE_KEY_VAR: &str = "PMLAG_PRIVATE_KEY";
pub const FUNDER_ADDRESS_VAR: &str = "PMLAG_FUNDER_ADDRESS";
pub const API_KEY_VAR: &str = "PMLAG_API_KEY";
pub const API_SECRET_VAR: &str = "PMLAG_API_SECRET";
pub const API_PASSPHRASE_VAR: &str = "PMLAG_API_PASSPHRASE";

/// Market-data stream settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    #[serde(default = "default_ws_url")]
    pub ws_url: String,
    #[serde(default = "default_channel")]
    pub channel: String,
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
    /// Silence after which the connection is recycled (0 = never).
    #[serde(default = "default_heartbeat_timeout_ms")]
    pub heartbeat_timeout_ms: u64,
    #[serde(default = "default_reconnect_initial_delay_ms")]
    pub reconnect_initial_delay_ms: u64,
    #[serde(default = "default_reconnect_max_delay_ms")]
    pub reconnect_max_delay_ms: u64,
    /// 0 = retry forever.
    #[serde(default)]
    pub max_reconnect_attempts: u32,
}

fn default_ws_url() -> String {
    "wss://ws-subscriptions-clob.polymarket.com/ws/market".to_string()
}

fn default_channel() -> String {
    "market".to_string()
}

fn default_heartbeat_interval_ms() -> u64 {
    10_000
}

fn default_heartbeat_timeout_ms() -> u64 {
    45_000
}

fn default_reconnect_initial_delay_ms() -> u64 {
    1_000
}

fn default_reconnect_max_delay_ms() -> u64 {
    30_000
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            ws_url: default_ws_url(),
            channel: default_channel(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            heartbeat_timeout_ms: default_heartbeat_timeout_ms(),
            reconnect_initial_delay_ms: default_reconnect_initial_delay_ms(),
            reconnect_max_delay_ms: default_reconnect_max_delay_ms(),
            max_reconnect_attempts: 0,
        }
    }
}

/// Leader and lagger token ids, as resolved by market discovery.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstrumentsConfig {
    #[serde(default)]
    pub leader: String,
    /// May equal `leader`.
    #[serde(default)]
    pub lagger: String,
    /// Display names keyed by token id.
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

impl InstrumentsConfig {
    pub fn leader_id(&self) -> AppResult<InstrumentId> {
        required_instrument("instruments.leader", &self.leader)
    }

    pub fn lagger_id(&self) -> AppResult<InstrumentId> {
        required_instrument("instruments.lagger", &self.lagger)
    }

    pub fn label_map(&self) -> HashMap<InstrumentId, String> {
        self.labels
            .iter()
            .map(|(id, label)| (InstrumentId::new(id.trim()), label.clone()))
            .collect()
    }
}

fn required_instrument(field: &str, raw: &str) -> AppResult<InstrumentId> {
    InstrumentId::try_new(raw.trim())
        .map_err(|_| AppError::Config(format!("{field} is required (instrument token id)")))
}

/// Rolling-history settings, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerSection {
    #[serde(default = "default_trade_retention_secs")]
    pub trade_retention_secs: u64,
    #[serde(default = "default_ask_retention_secs")]
    pub ask_retention_secs: u64,
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,
    #[serde(default = "default_ask_epsilon")]
    pub ask_epsilon: Decimal,
}

fn default_trade_retention_secs() -> u64 {
    120
}

fn default_ask_retention_secs() -> u64 {
    60
}

fn default_stale_after_secs() -> u64 {
    300
}

fn default_ask_epsilon() -> Decimal {
    Decimal::new(1, 12)
}

impl Default for TrackerSection {
    fn default() -> Self {
        Self {
            trade_retention_secs: default_trade_retention_secs(),
            ask_retention_secs: default_ask_retention_secs(),
            stale_after_secs: default_stale_after_secs(),
            ask_epsilon: default_ask_epsilon(),
        }
    }
}

impl From<&TrackerSection> for TrackerConfig {
    fn from(section: &TrackerSection) -> Self {
        Self {
            trade_retention: Duration::from_secs(section.trade_retention_secs),
            ask_retention: Duration::from_secs(section.ask_retention_secs),
            stale_after: Duration::from_secs(section.stale_after_secs),
            ask_epsilon: section.ask_epsilon,
        }
    }
}

/// Trade capture around fires.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_capture_secs")]
    pub pre_secs: u64,
    #[serde(default = "default_capture_secs")]
    pub post_secs: u64,
}

fn default_capture_secs() -> u64 {
    60
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            pre_secs: default_capture_secs(),
            post_secs: default_capture_secs(),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub instruments: InstrumentsConfig,
    #[serde(default)]
    pub trigger: TriggerConfig,
    #[serde(default)]
    pub tracker: TrackerSection,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub exit: ExitConfig,
    #[serde(default)]
    pub venue: VenueConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub presenter: PresenterConfig,
}

impl AppConfig {
    /// Load and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config {}: {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate TOML text.
    pub fn from_toml(content: &str) -> AppResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> AppResult<()> {
        self.instruments.leader_id()?;
        self.instruments.lagger_id()?;
        if self.stream.ws_url.trim().is_empty() {
            return Err(AppError::Config("stream.ws_url is required".to_string()));
        }
        self.trigger.validate()?;
        self.execution.validate().map_err(AppError::Config)?;
        self.exit.validate().map_err(AppError::Config)?;
        self.venue.validate().map_err(AppError::Config)?;
        self.presenter.validate().map_err(AppError::Config)?;
        Ok(())
    }

    pub fn is_trading(&self) -> bool {
        self.execution.mode == ExecutionMode::Trading
    }

    /// Stream connection settings with the instrument subscription.
    pub fn connection_config(&self) -> ConnectionConfig {
        let ids = [&self.instruments.leader, &self.instruments.lagger]
            .into_iter()
            .map(|id| id.trim().to_string());
        ConnectionConfig {
            url: self.stream.ws_url.clone(),
            subscription: MarketSubscription::new(self.stream.channel.clone(), ids),
            max_reconnect_attempts: self.stream.max_reconnect_attempts,
            reconnect_base_delay_ms: self.stream.reconnect_initial_delay_ms,
            reconnect_max_delay_ms: self.stream.reconnect_max_delay_ms,
            heartbeat_interval_ms: self.stream.heartbeat_interval_ms,
            heartbeat_timeout_ms: self.stream.heartbeat_timeout_ms,
        }
    }

    pub fn tracker_config(&self) -> TrackerConfig {
        TrackerConfig::from(&self.tracker)
    }
}

/// Trading credentials from the environment.
pub struct TradingCredentials {
    pub keys: KeyManager,
    pub funder: Address,
    /// Derived from the key at startup when absent.
    pub api: Option<ApiCredentials>,
}

impl TradingCredentials {
    pub fn from_env() -> AppResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load through `lookup`; blank values count as missing.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let raw_key = Zeroizing::new(get(PRIVATE_KEY_VAR).ok_or_else(|| {
            AppError::Config(format!("{PRIVATE_KEY_VAR} is required in trading mode"))
        })?);
        let keys = KeyManager::from_hex(&raw_key)
            .map_err(|e| AppError::Config(format!("{PRIVATE_KEY_VAR}: {e}")))?;

        let funder = get(FUNDER_ADDRESS_VAR).ok_or_else(|| {
            AppError::Config(format!("{FUNDER_ADDRESS_VAR} is required in trading mode"))
        })?;
        let funder = parse_address(&funder)
            .map_err(|e| AppError::Config(format!("{FUNDER_ADDRESS_VAR}: {e}")))?;

        let api = match (get(API_KEY_VAR), get(API_SECRET_VAR), get(API_PASSPHRASE_VAR)) {
            (Some(api_key), Some(secret), Some(passphrase)) => Some(ApiCredentials {
                api_key,
                secret,
                passphrase,
            }),
            (None, None, None) => None,
            _ => {
                return Err(AppError::Config(format!(
                    "set all of {API_KEY_VAR}, {API_SECRET_VAR}, {API_PASSPHRASE_VAR} or none"
                )))
            }
        };

        Ok(Self { keys, funder, api })
    }
}

impl std::fmt::Debug for TradingCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TradingCredentials")
            .field("signer", &self.keys.address())
            .field("funder", &self.funder)
            .field("api", &self.api)
            .finish()
    }
}
