//! Order execution against the Polymarket CLOB.
//!
//! # Key Components
//!
//! - [`OrderLifecycleController`]: submit, monitor, cancel-on-timeout, cash-out
//! - [`VenueClient`]: venue operations the lifecycle needs
//! - [`normalize_order_status`]: the one place venue status payloads are read
//! - [`ClobClient`]: REST client with L2 HMAC auth
//! - [`OrderSigner`]: EIP-712 order and `ClobAuth` signing
//!
//! # Outcomes
//!
//! Every lifecycle run ends in a [`pmlag_core::LifecycleOutcome`]:
//!
//! 1. limit above ceiling -> `limit_capped` (no venue calls)
//! 2. submit error text -> `insufficient_balance` / `allowance_needed` / `submit_error`
//! 3. response without id -> `no_order_id`
//! 4. terminal poll -> `filled` / `cancelled` / `expired`
//! 5. timeout -> cancel -> `cancelled`, else the last observed status

pub mod clob;
pub mod config;
pub mod error;
pub mod lifecycle;
#[cfg(any(test, feature = "test-utils"))]
pub mod mock;
pub mod price_provider;
pub mod signer;
pub mod status;
pub mod venue;

pub use clob::{derive_api_credentials, l2_signature, ApiCredentials, ClobClient};
pub use config::{ExecutionConfig, ExecutionMode, ExitConfig, VenueConfig};
pub use error::{ExecutorError, ExecutorResult, VenueError, VenueResult};
pub use lifecycle::{ExitPrice, OrderLifecycleController};
pub use price_provider::{PriceProvider, StaticPriceProvider};
pub use signer::{parse_address, KeyManager, OrderSigner};
pub use status::{classify_submit_error, extract_order_id, normalize_order_status, NormalizedStatus};
pub use venue::{BoxFuture, DynVenue, OrderArgs, SignedOrder, VenueClient};

#[cfg(any(test, feature = "test-utils"))]
pub use mock::{MockVenue, VenueCall};
