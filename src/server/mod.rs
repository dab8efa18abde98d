//! HTTP control surface
//!
//! Starts runs from a JSON payload, exposes their status for polling and
//! accepts cancel requests. Runs execute in background tasks of the same
//! process; their checkpoint logs go to the shared store, so a run cut short
//! by a restart can be resumed from the CLI.

pub mod routes;
pub mod runs;

pub use routes::{build_router, serve, AppState, BackendFactory, StartScanRequest};
pub use runs::RunRegistry;
