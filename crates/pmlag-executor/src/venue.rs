//! Venue trading API abstraction.
//!
//! The lifecycle controller only talks to the venue through [`VenueClient`],
//! so it can be driven by a scripted mock in tests and by the CLOB client in
//! production. Responses stay as raw JSON; field sniffing lives in
//! [`crate::status`].

use std::pin::Pin;
use std::sync::Arc;

use pmlag_core::{InstrumentId, OrderSide, Price, Size};
use serde_json::Value;

use crate::error::VenueResult;

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// Parameters of a limit order to build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderArgs {
    pub instrument: InstrumentId,
    pub side: OrderSide,
    pub limit_price: Price,
    pub size: Size,
}

/// A signed order, ready to post.
#[derive(Debug, Clone)]
pub struct SignedOrder {
    pub args: OrderArgs,
    /// Venue wire payload (including the signature).
    pub payload: Value,
}

/// Venue operations used by the order lifecycle.
///
/// Every call may be slow or fail; the caller classifies errors.
pub trait VenueClient: Send + Sync {
    /// Build and sign an order.
    fn create_order(&self, args: OrderArgs) -> BoxFuture<'_, VenueResult<SignedOrder>>;

    /// Submit a signed order. Returns the raw response (carrying the id).
    fn post_order(&self, order: SignedOrder) -> BoxFuture<'_, VenueResult<Value>>;

    /// Raw status payload for an order.
    fn get_order_status(&self, order_id: String) -> BoxFuture<'_, VenueResult<Value>>;

    /// Request cancellation. `Ok(true)` only if the venue confirmed it.
    fn cancel_order(&self, order_id: String) -> BoxFuture<'_, VenueResult<bool>>;

    /// Best price for taking `side` on `instrument`.
    fn get_quote(&self, instrument: InstrumentId, side: OrderSide) -> BoxFuture<'_, VenueResult<Price>>;
}

/// Arc wrapper for VenueClient trait objects.
pub type DynVenue = Arc<dyn VenueClient>;
