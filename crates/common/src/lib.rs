//! Conform Common Utilities
//!
//! Shared infrastructure for all conform crates:
//! - Error types and result aliases
//! - Application configuration loading
//! - Tracing/logging initialization

pub mod config;
pub mod error;
pub mod logging;

pub use config::*;
pub use error::*;
