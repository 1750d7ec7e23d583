//! Scripted in-memory venue for tests.

use std::collections::VecDeque;

use pmlag_core::{InstrumentId, OrderSide, Price};
use serde_json::{json, Value};

use crate::error::{VenueError, VenueResult};
use crate::venue::{BoxFuture, OrderArgs, SignedOrder, VenueClient};

/// A call recorded by [`MockVenue`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VenueCall {
    CreateOrder(OrderArgs),
    PostOrder(OrderArgs),
    GetOrderStatus(String),
    CancelOrder(String),
    GetQuote(InstrumentId, OrderSide),
}

/// Recording venue with scripted responses.
///
/// Status polls pop from a queue; once it is drained the last popped
/// response repeats, so a test can script "live, live, ..." with one entry.
#[derive(Debug)]
pub struct MockVenue {
    calls: parking_lot::Mutex<Vec<VenueCall>>,
    create_error: parking_lot::Mutex<Option<VenueError>>,
    post_result: parking_lot::Mutex<VenueResult<Value>>,
    statuses: parking_lot::Mutex<VecDeque<VenueResult<Value>>>,
    last_status: parking_lot::Mutex<VenueResult<Value>>,
    cancel_result: parking_lot::Mutex<VenueResult<bool>>,
    quote_result: parking_lot::Mutex<VenueResult<Price>>,
}

impl Default for MockVenue {
    fn default() -> Self {
        Self::new()
    }
}

impl MockVenue {
    pub fn new() -> Self {
        Self {
            calls: parking_lot::Mutex::new(Vec::new()),
            create_error: parking_lot::Mutex::new(None),
            post_result: parking_lot::Mutex::new(Ok(json!({ "success": true, "orderID": "mock-1" }))),
            statuses: parking_lot::Mutex::new(VecDeque::new()),
            last_status: parking_lot::Mutex::new(Ok(json!({ "status": "live" }))),
            cancel_result: parking_lot::Mutex::new(Ok(true)),
            quote_result: parking_lot::Mutex::new(Err(VenueError::Unsupported(
                "no quote scripted".to_string(),
            ))),
        }
    }

    pub fn fail_create(&self, error: VenueError) {
        *self.create_error.lock() = Some(error);
    }

    pub fn set_post_result(&self, result: VenueResult<Value>) {
        *self.post_result.lock() = result;
    }

    /// Queue the next status poll response.
    pub fn push_status(&self, result: VenueResult<Value>) {
        self.statuses.lock().push_back(result);
    }

    pub fn set_cancel_result(&self, result: VenueResult<bool>) {
        *self.cancel_result.lock() = result;
    }

    pub fn set_quote(&self, result: VenueResult<Price>) {
        *self.quote_result.lock() = result;
    }

    pub fn calls(&self) -> Vec<VenueCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Number of status polls issued.
    pub fn poll_count(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, VenueCall::GetOrderStatus(_)))
            .count()
    }

    fn record(&self, call: VenueCall) {
        self.calls.lock().push(call);
    }
}

impl VenueClient for MockVenue {
    fn create_order(&self, args: OrderArgs) -> BoxFuture<'_, VenueResult<SignedOrder>> {
        Box::pin(async move {
            self.record(VenueCall::CreateOrder(args.clone()));
            if let Some(error) = self.create_error.lock().clone() {
                return Err(error);
            }
            let payload = json!({
                "tokenId": args.instrument.as_str(),
                "side": args.side.as_str(),
                "price": args.limit_price.to_string(),
                "size": args.size.to_string(),
            });
            Ok(SignedOrder { args, payload })
        })
    }

    fn post_order(&self, order: SignedOrder) -> BoxFuture<'_, VenueResult<Value>> {
        Box::pin(async move {
            self.record(VenueCall::PostOrder(order.args));
            self.post_result.lock().clone()
        })
    }

    fn get_order_status(&self, order_id: String) -> BoxFuture<'_, VenueResult<Value>> {
        Box::pin(async move {
            self.record(VenueCall::GetOrderStatus(order_id));
            match self.statuses.lock().pop_front() {
                Some(next) => {
                    *self.last_status.lock() = next.clone();
                    next
                }
                None => self.last_status.lock().clone(),
            }
        })
    }

    fn cancel_order(&self, order_id: String) -> BoxFuture<'_, VenueResult<bool>> {
        Box::pin(async move {
            self.record(VenueCall::CancelOrder(order_id));
            self.cancel_result.lock().clone()
        })
    }

    fn get_quote(&self, instrument: InstrumentId, side: OrderSide) -> BoxFuture<'_, VenueResult<Price>> {
        Box::pin(async move {
            self.record(VenueCall::GetQuote(instrument, side));
            self.quote_result.lock().clone()
        })
    }
}
