//! Server Configuration Module
//!
//! ## Loading Order
//!
//! 1. `POTHOLE_CONFIG` environment variable (path to TOML file)
//! 2. `pothole.toml` in the current working directory
//! 3. Built-in defaults from [`defaults`]
//!
//! Environment overrides (`POTHOLE_SERVER_ADDR`, `POTHOLE_DATA_DIR`,
//! `CONSOLIDATION_INTERVAL_SECS`) are applied on top of whichever source
//! was used, and CLI flags on top of those.

pub mod defaults;
mod server_config;

pub use server_config::*;
