#![forbid(unsafe_code)]

//! Carbs-on-board / insulin-on-board engine for a glucose dashboard.
//!
//! This crate provides:
//! - Domain types (log entries, status snapshots, projection points)
//! - Decay curves for carb absorption and insulin action
//! - Aggregation, status and projection over an entry snapshot
//! - Glucose prediction and bolus suggestions
//! - Engine configuration, the shared config store and the settings file
//!
//! Every computation takes the entry list and an `EngineConfig` as plain
//! arguments and returns a fresh result; nothing is cached between calls.

pub mod types;
pub mod error;
pub mod config;
pub mod store;
pub mod logging;
pub mod decay;
pub mod aggregate;
pub mod status;
pub mod projection;
pub mod prediction;
pub mod entries;
pub mod export;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use config::{Config, ConfigUpdate, EngineConfig};
pub use store::ConfigStore;
pub use decay::remaining_fraction;
pub use aggregate::{aggregate, Aggregate, ACTIVE_ENTRY_EPSILON};
pub use status::{compute_status, describe_insulin_activity};
pub use projection::{insulin_timeline, project};
pub use prediction::{predict_glucose, recommend_bolus, DEFAULT_HORIZON_MINUTES};
pub use entries::load_entries;
pub use export::write_projection_csv;
