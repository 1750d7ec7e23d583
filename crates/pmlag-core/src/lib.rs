//! Core domain types for the pmlag momentum trigger bot.
//!
//! This crate provides the vocabulary shared by every other crate:
//! - `InstrumentId`: Opaque outcome-token identifier
//! - `Price`, `Size`: Precision-safe numeric types
//! - `OrderSide`, `TradeSide`: Trading enums
//! - `Order`, `OrderStatus`: Venue order as tracked by the lifecycle controller
//! - `LifecycleOutcome`: Terminal result of one lifecycle run

pub mod decimal;
pub mod error;
pub mod instrument;
pub mod order;
pub mod outcome;

pub use decimal::{Price, Size};
pub use error::{CoreError, Result};
pub use instrument::{now_ms, InstrumentId};
pub use order::{Order, OrderSide, OrderStatus, TradeSide};
pub use outcome::{LifecycleOutcome, OutcomeStatus};
