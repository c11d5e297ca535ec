//! Boot State Store - node identity and progress flags
//!
//! A flat string-to-string map persisted as one JSON object. The store is the
//! single source of truth for whether a node has been initialized and whether
//! its validator status has converged.
//!
//! Features:
//! - Whole-file snapshot, rewritten atomically on every `set`
//! - Missing keys read as the empty string
//! - In-memory variant for tests

pub mod error;
pub mod file_store;
pub mod state_store;

pub use error::{Result, StateStoreError};
pub use file_store::FileStore;
pub use state_store::{MemoryStore, StateStore};
