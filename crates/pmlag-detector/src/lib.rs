//! Leader/lagger momentum trigger for pmlag.
//!
//! Evaluates the leader instrument's move over the lag horizon after every
//! dispatched batch and decides, under a cooldown and single-flight
//! discipline, whether to start an order lifecycle on the lagger.

pub mod capture;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod signal;
pub mod state;

pub use capture::{CaptureRecorder, CaptureRow, CaptureWindow};
pub use config::{TriggerConfig, TriggerMode};
pub use error::{DetectorError, DetectorResult};
pub use evaluator::TriggerEvaluator;
pub use signal::{SkipReason, TriggerDecision, TriggerSignal};
pub use state::{EngineState, SharedState, TriggerState};
