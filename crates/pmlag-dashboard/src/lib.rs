//! pmlag-dashboard - read-only presentation of the engine state.
//!
//! - [`DashboardState`] takes snapshots of trackers, trigger and last outcome
//! - [`render_lines`] formats a snapshot as status text
//! - [`run_presenter`] logs the rendered lines at a fixed cadence
//! - [`run_server`] serves `/api/snapshot`, `/metrics` and `/health`
//!
//! Nothing here mutates engine state.

mod config;
mod error;
mod presenter;
mod server;
mod state;
mod types;

pub use config::PresenterConfig;
pub use error::{DashboardError, DashboardResult};
pub use presenter::run_presenter;
pub use server::{create_router, run_server};
pub use state::{render_lines, DashboardState};
pub use types::{DashboardSnapshot, InstrumentSnapshot, LastTradeSnapshot};
