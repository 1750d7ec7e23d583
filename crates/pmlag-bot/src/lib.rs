//! pmlag - Polymarket leader/lagger momentum trigger bot.
//!
//! Main application that orchestrates all components:
//! - Market-data stream connection
//! - Event parsing and rolling instrument trackers
//! - Momentum trigger with cooldown and single-flight discipline
//! - Order lifecycle (observation mode records the fire only)
//! - Status presenter

pub mod app;
pub mod config;
pub mod error;

pub use app::{Application, TrackerPriceProvider};
pub use config::{AppConfig, TradingCredentials};
pub use error::{AppError, AppResult};
