//! Core types and utilities for glitter-boot
//!
//! # Modules
//!
//! - `config`: Environment loading and the `BootConfig` path/unit layout
//! - `error`: Error types and Result alias
//! - `types`: Node addresses, seed lists, operating and index modes

pub mod config;
pub mod error;
pub mod types;

// Re-exports
pub use config::{load_environment, BootConfig};
pub use error::{Error, Result};
pub use types::{parse_seeds, IndexMode, NodeAddr, NodeMode};
