//! HTTP server and background tasks

pub mod http;
pub mod maintenance;

pub use http::{handle_request, run, AppState};
pub use maintenance::{run_sweep, spawn_maintenance_task, SweepReport};
