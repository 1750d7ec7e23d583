//! Order lifecycle: submit, monitor, cancel on timeout, optional cash-out.
//!
//! ```text
//! Building -> Submitted -> { Filled | Cancelled | Expired | Errored }
//! ```
//!
//! Every public entry point returns a [`LifecycleOutcome`]; venue errors are
//! classified, never propagated. The monitor loop observes a
//! [`CancellationToken`] so shutdown interrupts polling without waiting out
//! the timeout. Shutdown does not cancel the order at the venue.

use std::time::Duration;

use pmlag_core::{
    InstrumentId, LifecycleOutcome, Order, OrderSide, OrderStatus, OutcomeStatus, Price, Size,
};
use serde_json::Value;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{ExecutionConfig, ExitConfig};
use crate::price_provider::PriceProvider;
use crate::status::{classify_submit_error, extract_order_id, normalize_order_status};
use crate::venue::{DynVenue, OrderArgs};

/// How the cash-out limit is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitPrice {
    /// Undercut this current market price.
    Undercut(Price),
    /// Use this limit as is.
    Explicit(Price),
}

/// How a monitor loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
enum MonitorEnd {
    Terminal,
    TimedOut { last_status: Option<String> },
    Shutdown { last_status: Option<String> },
}

/// Drives one order at a time through its lifecycle against a venue.
pub struct OrderLifecycleController {
    venue: DynVenue,
    execution: ExecutionConfig,
    exit: ExitConfig,
}

impl OrderLifecycleController {
    pub fn new(venue: DynVenue, execution: ExecutionConfig, exit: ExitConfig) -> Self {
        Self {
            venue,
            execution,
            exit,
        }
    }

    pub fn execution_config(&self) -> &ExecutionConfig {
        &self.execution
    }

    pub fn exit_config(&self) -> &ExitConfig {
        &self.exit
    }

    /// Entry limit for a reference price, or `Err(limit)` when it exceeds
    /// the ceiling.
    pub fn entry_limit(&self, reference: Price) -> Result<Price, Price> {
        let limit =
            Price::new(reference.inner() + self.execution.entry_offset).round_dp(self.execution.price_decimals);
        if limit.inner() > self.execution.price_ceiling {
            Err(limit)
        } else {
            Ok(limit)
        }
    }

    /// Cash-out limit for the given pricing rule.
    pub fn exit_limit(&self, price: ExitPrice) -> Price {
        match price {
            ExitPrice::Explicit(limit) => limit.round_dp(self.execution.price_decimals),
            ExitPrice::Undercut(current) => {
                let undercut = (current.inner() - self.exit.undercut).max(self.exit.price_floor);
                Price::new(undercut).round_dp(self.execution.price_decimals)
            }
        }
    }

    /// Entry, then cash-out of whatever filled when exits are enabled.
    pub async fn run(
        &self,
        instrument: InstrumentId,
        reference: Price,
        prices: &dyn PriceProvider,
        cancel: &CancellationToken,
    ) -> LifecycleOutcome {
        let entry = self.execute_entry(instrument.clone(), reference, cancel).await;
        if !self.exit.enabled || !entry.filled.is_positive() || cancel.is_cancelled() {
            return entry;
        }

        let exit = match self.resolve_exit_price(&instrument, prices).await {
            Some(price) => self.cash_out(instrument, entry.filled, price, cancel).await,
            None => {
                warn!(instrument = %instrument.short(), "No price available for cash-out");
                LifecycleOutcome::new(OutcomeStatus::Skipped)
                    .with_message("no price available for cash-out")
            }
        };
        entry.with_exit(exit)
    }

    /// Buy `instrument` at reference + offset and monitor until terminal or
    /// timeout.
    pub async fn execute_entry(
        &self,
        instrument: InstrumentId,
        reference: Price,
        cancel: &CancellationToken,
    ) -> LifecycleOutcome {
        let limit = match self.entry_limit(reference) {
            Ok(limit) => limit,
            Err(limit) => {
                info!(
                    instrument = %instrument.short(),
                    %reference,
                    %limit,
                    ceiling = %self.execution.price_ceiling,
                    "Limit price capped, not submitting"
                );
                return LifecycleOutcome::new(OutcomeStatus::LimitCapped).with_limit_price(limit);
            }
        };

        let size = match Size::from_notional(self.execution.notional_usdc, limit) {
            Some(size) => size.round_dp(self.execution.size_decimals),
            None => Size::ZERO,
        };
        if !size.is_positive() {
            return LifecycleOutcome::new(OutcomeStatus::SubmitError)
                .with_limit_price(limit)
                .with_message(format!("order size {size} at {limit} is not positive"));
        }

        let args = OrderArgs {
            instrument,
            side: OrderSide::Buy,
            limit_price: limit,
            size,
        };
        self.place_and_monitor(args, self.execution.order_timeout(), cancel)
            .await
    }

    /// Sell `filled` shares at a price derived from `price`.
    ///
    /// Skipped when nothing is held.
    pub async fn cash_out(
        &self,
        instrument: InstrumentId,
        filled: Size,
        price: ExitPrice,
        cancel: &CancellationToken,
    ) -> LifecycleOutcome {
        if !filled.is_positive() {
            debug!(instrument = %instrument.short(), "No filled size to cash out");
            return LifecycleOutcome::new(OutcomeStatus::Skipped);
        }

        let args = OrderArgs {
            instrument,
            side: OrderSide::Sell,
            limit_price: self.exit_limit(price),
            size: filled,
        };
        info!(
            instrument = %args.instrument.short(),
            size = %args.size,
            limit = %args.limit_price,
            "Submitting cash-out"
        );
        self.place_and_monitor(args, self.exit.timeout(), cancel).await
    }

    async fn resolve_exit_price(
        &self,
        instrument: &InstrumentId,
        prices: &dyn PriceProvider,
    ) -> Option<ExitPrice> {
        if let Some(explicit) = self.exit.explicit_price {
            return Some(ExitPrice::Explicit(Price::new(explicit)));
        }
        if let Some(current) = prices.get_price(instrument) {
            return Some(ExitPrice::Undercut(current));
        }
        match self
            .venue
            .get_quote(instrument.clone(), OrderSide::Sell)
            .await
        {
            Ok(quote) if quote.is_positive() => Some(ExitPrice::Undercut(quote)),
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, "Quote lookup failed");
                None
            }
        }
    }

    async fn place_and_monitor(
        &self,
        args: OrderArgs,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> LifecycleOutcome {
        let limit = args.limit_price;
        let mut order = match self.submit(args).await {
            Ok(order) => order,
            Err(outcome) => return outcome.with_limit_price(limit),
        };

        let end = self.monitor(&mut order, timeout, cancel).await;
        let outcome = match end {
            MonitorEnd::Terminal => match order.status {
                OrderStatus::Filled => LifecycleOutcome::new(OutcomeStatus::Filled),
                OrderStatus::Cancelled => LifecycleOutcome::new(OutcomeStatus::Cancelled),
                OrderStatus::Expired => LifecycleOutcome::new(OutcomeStatus::Expired),
                _ => LifecycleOutcome::new(OutcomeStatus::Error),
            },
            MonitorEnd::TimedOut { last_status } => self.cancel_after_timeout(&order, last_status).await,
            MonitorEnd::Shutdown { last_status } => {
                warn!(order_id = %order.id, "Monitoring interrupted by shutdown, order left as is");
                LifecycleOutcome::new(OutcomeStatus::Aborted).with_message(format!(
                    "last status: {}",
                    last_status.as_deref().unwrap_or("unknown")
                ))
            }
        };

        let outcome = outcome
            .with_order_id(order.id.clone())
            .with_limit_price(order.limit_price)
            .with_filled(order.filled_size);
        info!(
            order_id = %order.id,
            side = %order.side,
            status = %outcome.status,
            filled = %outcome.filled,
            "Order lifecycle finished"
        );
        outcome
    }

    /// Build, sign and post. Rejections become the `Err` outcome.
    async fn submit(&self, args: OrderArgs) -> Result<Order, LifecycleOutcome> {
        let rejected = |message: String| {
            let status = classify_submit_error(&message);
            warn!(%status, %message, "Order submission rejected");
            LifecycleOutcome::new(status).with_message(message)
        };

        let signed = self
            .venue
            .create_order(args.clone())
            .await
            .map_err(|e| rejected(e.to_string()))?;
        let response = self
            .venue
            .post_order(signed)
            .await
            .map_err(|e| rejected(e.to_string()))?;

        if let Some(message) = response_error(&response) {
            return Err(rejected(message));
        }
        let Some(order_id) = extract_order_id(&response) else {
            warn!(response = %response, "Order response carried no order id");
            return Err(LifecycleOutcome::new(OutcomeStatus::NoOrderId));
        };

        info!(
            order_id = %order_id,
            instrument = %args.instrument.short(),
            side = %args.side,
            limit = %args.limit_price,
            size = %args.size,
            "Order submitted"
        );
        Ok(Order::submitted(
            order_id,
            args.instrument,
            args.side,
            args.limit_price,
            args.size,
        ))
    }

    /// Poll until terminal, timeout or shutdown. Poll errors are transient.
    async fn monitor(
        &self,
        order: &mut Order,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> MonitorEnd {
        let deadline = Instant::now() + timeout;
        let mut last_status: Option<String> = None;

        while Instant::now() < deadline {
            match self.venue.get_order_status(order.id.clone()).await {
                Ok(payload) => {
                    let normalized = normalize_order_status(&payload, order.size);
                    order.apply(normalized.status, normalized.filled);
                    if !normalized.raw.is_empty() {
                        last_status = Some(normalized.raw.clone());
                    }
                    debug!(
                        order_id = %order.id,
                        status = %normalized.raw,
                        filled = %normalized.filled,
                        "Order polled"
                    );
                    if order.is_terminal() {
                        return MonitorEnd::Terminal;
                    }
                }
                Err(e) => {
                    debug!(order_id = %order.id, error = %e, "Status poll failed, retrying");
                }
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            tokio::select! {
                _ = cancel.cancelled() => return MonitorEnd::Shutdown { last_status },
                _ = tokio::time::sleep(self.execution.poll_interval().min(remaining)) => {}
            }
        }

        MonitorEnd::TimedOut { last_status }
    }

    async fn cancel_after_timeout(
        &self,
        order: &Order,
        last_status: Option<String>,
    ) -> LifecycleOutcome {
        info!(order_id = %order.id, "Order not terminal before timeout, cancelling");
        match self.venue.cancel_order(order.id.clone()).await {
            Ok(true) => LifecycleOutcome::new(OutcomeStatus::Cancelled),
            Ok(false) => {
                warn!(order_id = %order.id, "Venue did not confirm cancellation");
                unresolved(last_status)
            }
            Err(e) => {
                warn!(order_id = %order.id, error = %e, "Cancel request failed");
                unresolved(last_status)
            }
        }
    }
}

fn unresolved(last_status: Option<String>) -> LifecycleOutcome {
    LifecycleOutcome::new(OutcomeStatus::Unresolved {
        last_status: last_status.unwrap_or_else(|| "unknown".to_string()),
    })
}

/// Error text of a post-order response that reports failure in-band.
fn response_error(response: &Value) -> Option<String> {
    let message = response
        .get("errorMsg")
        .or_else(|| response.get("error"))
        .and_then(Value::as_str)
        .filter(|m| !m.is_empty());
    let failed = response.get("success").and_then(Value::as_bool) == Some(false);
    match (message, failed) {
        (Some(m), _) => Some(m.to_string()),
        (None, true) => Some("order rejected".to_string()),
        (None, false) => None,
    }
}
