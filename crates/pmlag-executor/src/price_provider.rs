//! Current-price lookup for exit pricing.
//!
//! The cash-out limit is derived from the instrument's latest trade. The
//! lifecycle task reads it through this trait so it never holds the state
//! lock itself.

use std::collections::HashMap;

use parking_lot::RwLock;
use pmlag_core::{InstrumentId, Price};

/// Source of the latest traded price for an instrument.
pub trait PriceProvider: Send + Sync {
    fn get_price(&self, instrument: &InstrumentId) -> Option<Price>;
}

/// Fixed prices, set explicitly.
#[derive(Debug, Default)]
pub struct StaticPriceProvider {
    prices: RwLock<HashMap<InstrumentId, Price>>,
}

impl StaticPriceProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, instrument: InstrumentId, price: Price) {
        self.prices.write().insert(instrument, price);
    }
}

impl PriceProvider for StaticPriceProvider {
    fn get_price(&self, instrument: &InstrumentId) -> Option<Price> {
        self.prices.read().get(instrument).copied()
    }
}
