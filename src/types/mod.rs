//! Shared types for Starlight

pub mod error;

pub use error::{ErrorBody, Result, StarlightError, StateError};
