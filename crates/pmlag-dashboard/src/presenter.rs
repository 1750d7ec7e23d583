//! Periodic status output.
//!
//! Collects a snapshot at a fixed cadence, writes the rendered lines to the
//! log stream and mirrors connection/lifecycle gauges into Prometheus.

use std::time::Duration;

use pmlag_telemetry::Metrics;
use pmlag_ws::ConnectionState;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::state::{render_lines, DashboardState};

/// Run until `shutdown` fires.
pub async fn run_presenter(state: DashboardState, interval: Duration, shutdown: CancellationToken) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut reconnects_seen = 0u64;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                debug!("Presenter stopped");
                return;
            }
            _ = ticker.tick() => {}
        }

        if let Some(connection) = state.connection() {
            if connection.state() == ConnectionState::Connected {
                Metrics::ws_connected();
            } else {
                Metrics::ws_disconnected();
            }
            let total = connection.total_reconnects();
            for _ in reconnects_seen..total {
                Metrics::ws_reconnect();
            }
            reconnects_seen = total;
        }

        let snapshot = state.collect_snapshot();
        Metrics::lifecycle_active(snapshot.lifecycle_active);
        for line in render_lines(&snapshot) {
            info!(target: "pmlag::presenter", "{line}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pmlag_core::InstrumentId;
    use pmlag_detector::{EngineState, TriggerState};
    use pmlag_feed::TrackerConfig;

    #[tokio::test]
    async fn test_presenter_stops_on_shutdown() {
        let engine = EngineState::new(
            InstrumentId::new("a"),
            InstrumentId::new("b"),
            &TrackerConfig::default(),
            TriggerState::default(),
        )
        .into_shared();
        let state = DashboardState::new(engine, Duration::from_secs(60), "observation");
        let shutdown = CancellationToken::new();

        let handle = tokio::spawn(run_presenter(
            state,
            Duration::from_millis(10),
            shutdown.clone(),
        ));
        tokio::time::sleep(Duration::from_millis(35)).await;
        shutdown.cancel();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("presenter should stop")
            .unwrap();
    }
}
