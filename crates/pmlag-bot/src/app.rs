//! Main application orchestration.
//!
//! Coordinates all components:
//! - Stream connection (frames forwarded over an `mpsc` channel)
//! - Parsing and tracker updates on a single dispatch path
//! - Trigger evaluation after every applied batch
//! - Order lifecycle tasks (at most one in flight)
//! - Capture windows exported through the log stream
//! - Presenter loop and optional HTTP endpoint

use crate::config::{AppConfig, TradingCredentials};
use crate::error::{AppError, AppResult};
use pmlag_core::{now_ms, InstrumentId, LifecycleOutcome, OutcomeStatus, Price};
use pmlag_dashboard::{run_presenter, run_server, DashboardState};
use pmlag_detector::{
    CaptureRecorder, CaptureWindow, EngineState, SharedState, TriggerDecision, TriggerEvaluator,
    TriggerSignal, TriggerState,
};
use pmlag_executor::{
    derive_api_credentials, ClobClient, DynVenue, OrderLifecycleController, OrderSigner,
    PriceProvider,
};
use pmlag_feed::StreamEventParser;
use pmlag_telemetry::Metrics;
use pmlag_ws::ConnectionManager;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Raw frames buffered between the stream task and dispatch.
const FRAME_CHANNEL_CAPACITY: usize = 1000;

/// Trim and capture checks while the stream is quiet.
const HOUSEKEEPING_INTERVAL: Duration = Duration::from_secs(1);

/// How long shutdown waits for an in-flight lifecycle to settle.
const LIFECYCLE_GRACE: Duration = Duration::from_secs(10);

/// Exit prices from the trackers' last trade.
pub struct TrackerPriceProvider {
    engine: SharedState,
}

impl TrackerPriceProvider {
    pub fn new(engine: SharedState) -> Self {
        Self { engine }
    }
}

impl PriceProvider for TrackerPriceProvider {
    fn get_price(&self, instrument: &InstrumentId) -> Option<Price> {
        let engine = self.engine.lock();
        engine
            .trackers
            .get(instrument)
            .and_then(|tracker| tracker.last_trade())
            .map(|trade| trade.price)
    }
}

/// Main application.
pub struct Application {
    config: AppConfig,
    engine: SharedState,
    evaluator: TriggerEvaluator,
    parser: StreamEventParser,
    capture: Option<CaptureRecorder>,
    /// `None` in observation mode.
    controller: Option<Arc<OrderLifecycleController>>,
    lifecycle: Option<JoinHandle<()>>,
    shutdown: CancellationToken,
    dropped_seen: u64,
    /// Capture rows exported so far.
    captured_rows: usize,
}

impl Application {
    /// Create an application in observation mode. Call [`Self::with_venue`]
    /// to enable order placement.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        config.validate()?;
        let leader = config.instruments.leader_id()?;
        let lagger = config.instruments.lagger_id()?;

        let trigger = TriggerState::new(now_ms(), config.trigger.warmup());
        let engine = EngineState::new(
            leader.clone(),
            lagger.clone(),
            &config.tracker_config(),
            trigger,
        )
        .into_shared();
        let evaluator = TriggerEvaluator::new(config.trigger.clone(), leader, lagger);
        let capture = config.capture.enabled.then(|| {
            CaptureRecorder::new(
                Duration::from_secs(config.capture.pre_secs),
                Duration::from_secs(config.capture.post_secs),
            )
        });

        Ok(Self {
            config,
            engine,
            evaluator,
            parser: StreamEventParser::new(),
            capture,
            controller: None,
            lifecycle: None,
            shutdown: CancellationToken::new(),
            dropped_seen: 0,
            captured_rows: 0,
        })
    }

    /// Place orders through `venue` when a trigger fires.
    pub fn with_venue(mut self, venue: DynVenue) -> Self {
        self.controller = Some(Arc::new(OrderLifecycleController::new(
            venue,
            self.config.execution.clone(),
            self.config.exit.clone(),
        )));
        self
    }

    /// Build the authenticated CLOB client, deriving API credentials from
    /// the key when none were configured.
    pub async fn connect_venue(
        config: &AppConfig,
        credentials: TradingCredentials,
    ) -> AppResult<DynVenue> {
        let signer = OrderSigner::new(
            Arc::new(credentials.keys),
            Some(credentials.funder),
            config.venue.signature_type,
            config.venue.chain_id,
            config.venue.neg_risk,
        );
        info!(
            signer = %signer.signer_address(),
            funder = %signer.funder(),
            host = %config.venue.host,
            "Connecting to venue"
        );
        let api = match credentials.api {
            Some(api) => api,
            None => derive_api_credentials(&config.venue, &signer).await?,
        };
        Ok(Arc::new(ClobClient::new(&config.venue, signer, api)?))
    }

    pub fn engine(&self) -> SharedState {
        self.engine.clone()
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    fn mode_label(&self) -> &'static str {
        if self.controller.is_some() {
            "trading"
        } else {
            "observation"
        }
    }

    /// Run until ctrl-c or until the stream gives up.
    pub async fn run(mut self) -> AppResult<()> {
        if self.config.is_trading() && self.controller.is_none() {
            return Err(AppError::Config(
                "execution.mode = \"trading\" requires venue credentials".to_string(),
            ));
        }

        info!(
            mode = self.mode_label(),
            leader = %self.evaluator.leader().short(),
            lagger = %self.evaluator.lagger().short(),
            "Starting application"
        );

        let (frame_tx, mut frame_rx) = mpsc::channel::<String>(FRAME_CHANNEL_CAPACITY);
        let connection = Arc::new(
            ConnectionManager::new(self.config.connection_config(), frame_tx)
                .with_shutdown_token(self.shutdown.clone()),
        );
        let mut ws_handle = tokio::spawn({
            let connection = connection.clone();
            async move { connection.connect().await }
        });

        let dashboard = DashboardState::new(
            self.engine.clone(),
            self.config.trigger.horizon(),
            self.mode_label(),
        )
        .with_connection(connection.clone())
        .with_labels(self.config.instruments.label_map());

        let presenter = tokio::spawn(run_presenter(
            dashboard.clone(),
            self.config.presenter.refresh_interval(),
            self.shutdown.clone(),
        ));
        let server = self
            .config
            .presenter
            .http_port
            .map(|port| tokio::spawn(run_server(dashboard, port, self.shutdown.clone())));

        let mut housekeeping = tokio::time::interval(HOUSEKEEPING_INTERVAL);
        let mut stream_result = None;

        info!("Entering main event loop");
        loop {
            tokio::select! {
                Some(frame) = frame_rx.recv() => {
                    self.handle_frame(&frame, now_ms());
                }

                result = &mut ws_handle => {
                    stream_result = Some(result);
                    break;
                }

                _ = housekeeping.tick() => {
                    self.housekeeping(now_ms());
                }

                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        self.shutdown.cancel();
        self.await_lifecycle().await;

        if let Some(window) = self.capture.as_mut().and_then(CaptureRecorder::flush) {
            self.captured_rows += export_capture(&window);
        }

        let stream_result = match stream_result {
            Some(result) => result,
            None => ws_handle.await,
        };
        if let Err(e) = presenter.await {
            warn!(error = %e, "Presenter task failed");
        }
        if let Some(server) = server {
            match server.await {
                Ok(Err(e)) => warn!(error = %e, "HTTP server failed"),
                Err(e) => warn!(error = %e, "HTTP server task failed"),
                Ok(Ok(())) => {}
            }
        }

        let stats = self.parser.stats();
        info!(
            frames = stats.frames(),
            events = stats.events(),
            dropped = stats.dropped(),
            fires = self.engine.lock().fires,
            captured_rows = self.captured_rows,
            "Shutting down"
        );

        match stream_result {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                error!(error = %e, "Stream connection gave up");
                Err(AppError::WebSocket(Box::new(e)))
            }
            Err(e) => Err(AppError::Task(format!("stream task: {e}"))),
        }
    }

    /// Parse one frame, apply it, evaluate the trigger and start a
    /// lifecycle on fire. The state lock is not held across any await.
    pub fn handle_frame(&mut self, text: &str, now_ms: i64) -> Option<TriggerDecision> {
        let events = self.parser.parse_frame(text, now_ms);
        for event in &events {
            Metrics::event_parsed(event.kind());
        }
        let dropped = self.parser.stats().dropped();
        Metrics::frames_dropped(dropped.saturating_sub(self.dropped_seen));
        self.dropped_seen = dropped;

        if events.is_empty() {
            self.housekeeping(now_ms);
            return None;
        }

        let (decision, finished) = {
            let mut engine = self.engine.lock();
            let mut recorded = Vec::new();
            for event in &events {
                recorded.extend(engine.trackers.apply(event));
            }
            engine.trackers.trim_all(now_ms);

            if let Some(capture) = self.capture.as_mut() {
                capture.record(&recorded);
            }

            let decision = self.evaluator.check_engine(&mut engine, now_ms);
            if let (Some(signal), Some(capture)) = (decision.fired(), self.capture.as_mut()) {
                capture.begin(signal.fired_at_ms, &engine.trackers);
            }
            let finished = self
                .capture
                .as_mut()
                .and_then(|capture| capture.poll_finished(now_ms));
            (decision, finished)
        };

        if let Some(window) = finished {
            self.captured_rows += export_capture(&window);
        }

        match &decision {
            TriggerDecision::Fired(signal) => {
                Metrics::trigger("fired");
                self.start_lifecycle(signal.clone());
            }
            TriggerDecision::Skipped(reason) => Metrics::trigger(reason.as_str()),
        }
        Some(decision)
    }

    fn housekeeping(&mut self, now_ms: i64) {
        let finished = {
            let mut engine = self.engine.lock();
            engine.trackers.trim_all(now_ms);
            self.capture
                .as_mut()
                .and_then(|capture| capture.poll_finished(now_ms))
        };
        if let Some(window) = finished {
            self.captured_rows += export_capture(&window);
        }
    }

    fn start_lifecycle(&mut self, signal: TriggerSignal) {
        let Some(controller) = self.controller.clone() else {
            let outcome = LifecycleOutcome::new(OutcomeStatus::Observed).with_message(format!(
                "leader moved {} from {}; lagger reference {}",
                signal.delta, signal.leader_lagged, signal.reference_price
            ));
            info!(lagger = %signal.lagger.short(), "Observation mode, no order placed");
            Metrics::order_outcome(outcome.status.metric_label());
            self.engine.lock().finish_lifecycle(outcome);
            return;
        };

        Metrics::lifecycle_active(true);
        let engine = self.engine.clone();
        let cancel = self.shutdown.child_token();
        let inner = tokio::spawn({
            let engine = engine.clone();
            async move {
                let prices = TrackerPriceProvider::new(engine);
                controller
                    .run(signal.lagger, signal.reference_price, &prices, &cancel)
                    .await
            }
        });

        self.lifecycle = Some(tokio::spawn(async move {
            let outcome = match inner.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(error = %e, "Lifecycle task failed");
                    LifecycleOutcome::new(OutcomeStatus::Error).with_message(e.to_string())
                }
            };
            log_outcome(&outcome);
            Metrics::order_outcome(outcome.status.metric_label());
            if let Some(exit) = &outcome.exit {
                Metrics::order_outcome(exit.status.metric_label());
            }
            engine.lock().finish_lifecycle(outcome);
            Metrics::lifecycle_active(false);
        }));
    }

    /// Wait for the in-flight lifecycle, if any.
    pub async fn await_lifecycle(&mut self) {
        let Some(handle) = self.lifecycle.take() else {
            return;
        };
        match tokio::time::timeout(LIFECYCLE_GRACE, handle).await {
            Ok(Ok(())) => debug!("Lifecycle task settled"),
            Ok(Err(e)) => warn!(error = %e, "Lifecycle supervisor failed"),
            Err(_) => warn!("Lifecycle task still running after grace period"),
        }
    }
}

fn log_outcome(outcome: &LifecycleOutcome) {
    let exit = outcome.exit.as_ref().map(|exit| exit.status.to_string());
    if outcome.status.is_rejection() || outcome.status == OutcomeStatus::Error {
        warn!(
            status = %outcome.status,
            order_id = ?outcome.order_id,
            message = ?outcome.message,
            "Lifecycle finished"
        );
    } else {
        info!(
            status = %outcome.status,
            order_id = ?outcome.order_id,
            limit = ?outcome.limit_price.map(|p| p.to_string()),
            filled = %outcome.filled,
            exit = ?exit,
            "Lifecycle finished"
        );
    }
}

/// Emit a finished capture as JSON Lines on the `pmlag::capture` target,
/// one event per trade row. Returns the number of rows written.
fn export_capture(window: &CaptureWindow) -> usize {
    let lines = match window.to_json_lines() {
        Ok(lines) => lines,
        Err(e) => {
            warn!(error = %e, "Failed to serialize capture window");
            return 0;
        }
    };
    let mut written = 0;
    for row in lines.lines() {
        info!(target: "pmlag::capture", trigger_ts_ms = window.trigger_ts_ms, "{row}");
        written += 1;
    }
    info!(
        trigger_ts_ms = window.trigger_ts_ms,
        start_ms = window.start_ms,
        end_ms = window.end_ms,
        rows = written,
        "Capture window exported"
    );
    written
}

#[cfg(test)]
mod tests {
    use super::*;
    use pmlag_executor::{BoxFuture, MockVenue, OrderArgs, SignedOrder, VenueClient, VenueResult};
    use pmlag_core::OrderSide;
    use rust_decimal_macros::dec;
    use serde_json::{json, Value};

    const CONFIG: &str = r#"
[instruments]
leader = "leader"
lagger = "lagger"

[execution]
poll_interval_ms = 10
order_timeout_secs = 1
"#;

    fn trade(id: &str, ts_ms: i64, price: &str) -> String {
        json!({
            "event_type": "last_trade_price",
            "asset_id": id,
            "price": price,
            "side": "BUY",
            "size": "10",
            "timestamp": ts_ms.to_string(),
        })
        .to_string()
    }

    fn app(extra: &str) -> Application {
        let config = AppConfig::from_toml(&format!("{CONFIG}{extra}")).unwrap();
        let app = Application::new(config).unwrap();
        // Tests drive the clock from zero.
        app.engine.lock().trigger = TriggerState::default();
        app
    }

    /// Leader 0.50 -> 0.62 over 61s, lagger at 0.40.
    fn burst(app: &mut Application) -> Option<TriggerDecision> {
        app.handle_frame(&trade("leader", 0, "0.50"), 0);
        app.handle_frame(&trade("lagger", 0, "0.40"), 0);
        app.handle_frame(&trade("leader", 61_000, "0.62"), 61_000)
    }

    #[test]
    fn test_observation_fire_releases_immediately() {
        let mut app = app("");
        let decision = burst(&mut app).unwrap();
        assert!(decision.is_fired());

        let engine = app.engine.lock();
        assert_eq!(engine.fires, 1);
        assert!(!engine.trigger.is_active());
        assert!(engine.trigger.in_cooldown(61_000));
        assert_eq!(
            engine.last_outcome.as_ref().map(|o| o.status.clone()),
            Some(OutcomeStatus::Observed)
        );
    }

    #[test]
    fn test_malformed_frames_do_not_touch_state() {
        let mut app = app("");
        assert!(app.handle_frame("not json", 0).is_none());
        assert!(app.handle_frame("PONG", 0).is_none());
        assert_eq!(app.parser.stats().dropped(), 2);
        assert!(app.engine.lock().trackers.get(&InstrumentId::new("leader")).unwrap().last_trade().is_none());
    }

    #[test]
    fn test_capture_opens_on_fire() {
        let mut app = app("\n[capture]\nenabled = true\n");
        assert!(burst(&mut app).unwrap().is_fired());
        let capture = app.capture.as_mut().unwrap();
        assert!(capture.is_open());

        // Window ends 60s after the fire.
        app.handle_frame(&trade("lagger", 70_000, "0.45"), 70_000);
        // Delivered after the fire with a venue stamp before it.
        app.handle_frame(&trade("leader", 55_000, "0.63"), 80_000);
        assert!(app.capture.as_ref().unwrap().is_open());
        assert_eq!(app.captured_rows, 0);

        app.housekeeping(121_000);
        assert!(!app.capture.as_ref().unwrap().is_open());
        // Seeded leader@61s, then both trades recorded while open.
        assert_eq!(app.captured_rows, 3);
    }

    #[test]
    fn test_export_capture_writes_one_line_per_row() {
        let mut app = app("\n[capture]\nenabled = true\n");
        burst(&mut app);
        app.handle_frame(&trade("lagger", 70_000, "0.45"), 70_000);
        let window = app.capture.as_mut().unwrap().flush().unwrap();

        let lines = window.to_json_lines().unwrap();
        assert!(lines
            .lines()
            .all(|line| serde_json::from_str::<Value>(line).unwrap()["trigger_ts_ms"] == 61_000));
        assert_eq!(export_capture(&window), 2);
    }

    #[tokio::test]
    async fn test_trading_fire_runs_lifecycle() {
        let venue = Arc::new(MockVenue::new());
        venue.push_status(Ok(json!({ "status": "matched", "size_matched": "20" })));
        let mut app = app("").with_venue(venue.clone());

        assert!(burst(&mut app).unwrap().is_fired());
        assert!(app.engine.lock().trigger.is_active());

        // A second burst while active is skipped.
        let again = app.handle_frame(&trade("leader", 62_000, "0.70"), 62_000);
        assert!(!again.unwrap().is_fired());

        app.await_lifecycle().await;
        let engine = app.engine.lock();
        assert!(!engine.trigger.is_active());
        let outcome = engine.last_outcome.clone().unwrap();
        assert_eq!(outcome.status, OutcomeStatus::Filled);
        // 0.40 + 0.10 offset.
        assert_eq!(outcome.limit_price, Some(Price::new(dec!(0.50))));
        assert_eq!(venue.poll_count(), 1);
    }

    struct PanickingVenue;

    impl VenueClient for PanickingVenue {
        fn create_order(&self, _args: OrderArgs) -> BoxFuture<'_, VenueResult<SignedOrder>> {
            Box::pin(async { panic!("venue exploded") })
        }

        fn post_order(&self, _order: SignedOrder) -> BoxFuture<'_, VenueResult<Value>> {
            Box::pin(async { Ok(Value::Null) })
        }

        fn get_order_status(&self, _order_id: String) -> BoxFuture<'_, VenueResult<Value>> {
            Box::pin(async { Ok(Value::Null) })
        }

        fn cancel_order(&self, _order_id: String) -> BoxFuture<'_, VenueResult<bool>> {
            Box::pin(async { Ok(false) })
        }

        fn get_quote(
            &self,
            _instrument: InstrumentId,
            _side: OrderSide,
        ) -> BoxFuture<'_, VenueResult<Price>> {
            Box::pin(async { Ok(Price::new(dec!(0.5))) })
        }
    }

    #[tokio::test]
    async fn test_panicking_lifecycle_reports_error_and_releases() {
        let mut app = app("").with_venue(Arc::new(PanickingVenue));
        assert!(burst(&mut app).unwrap().is_fired());

        app.await_lifecycle().await;
        let engine = app.engine.lock();
        assert!(!engine.trigger.is_active());
        assert_eq!(
            engine.last_outcome.as_ref().map(|o| o.status.clone()),
            Some(OutcomeStatus::Error)
        );
    }

    #[test]
    fn test_tracker_price_provider_reads_last_trade() {
        let mut app = app("");
        app.handle_frame(&trade("lagger", 0, "0.41"), 0);
        let prices = TrackerPriceProvider::new(app.engine());
        assert_eq!(
            prices.get_price(&InstrumentId::new("lagger")),
            Some(Price::new(dec!(0.41)))
        );
        assert_eq!(prices.get_price(&InstrumentId::new("unknown")), None);
    }

    #[tokio::test]
    async fn test_trading_mode_without_venue_is_config_error() {
        let config = AppConfig::from_toml(&format!("{CONFIG}mode = \"trading\"\n")).unwrap();
        let app = Application::new(config).unwrap();
        assert!(matches!(app.run().await, Err(AppError::Config(_))));
    }
}
