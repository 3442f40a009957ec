//! Niti Core — domain types, error taxonomy, configuration.

pub mod config;
pub mod error;
pub mod types;

pub use config::{DataPaths, NitiConfig, ScorerMode};
pub use error::{Error, Result};
pub use types::*;
