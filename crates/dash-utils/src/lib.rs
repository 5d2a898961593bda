//! Shared utilities for stockdash
//!
//! This crate provides common functionality used across the stockdash workspace,
//! including logging setup and process-level configuration.

pub mod config;
pub mod logging;

pub use config::Config;
pub use logging::{init_json_tracing, init_tracing, init_tracing_with};
