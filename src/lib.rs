//! Starlight - location-based AR collectible game backend
//!
//! Players walk the real world to find hidden stars. A star within the
//! discovery radius can be discovered, and a discovered star within the AR
//! radius can be claimed through an AR challenge. Rewards settle onto the
//! player's profile exactly once per event, with a background retry queue
//! covering failed inline credits.

pub mod auth;
pub mod config;
pub mod db;
pub mod game;
pub mod notifications;
pub mod routes;
pub mod server;
pub mod store;
pub mod types;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{Result, StarlightError};
