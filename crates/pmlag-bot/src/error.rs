//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    /// Missing or invalid configuration; aborts startup.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] Box<pmlag_ws::WsError>),

    #[error("Detector error: {0}")]
    Detector(#[from] pmlag_detector::DetectorError),

    #[error("Executor error: {0}")]
    Executor(#[from] pmlag_executor::ExecutorError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] pmlag_telemetry::TelemetryError),

    #[error("Dashboard error: {0}")]
    Dashboard(#[from] pmlag_dashboard::DashboardError),

    #[error("Task failed: {0}")]
    Task(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
