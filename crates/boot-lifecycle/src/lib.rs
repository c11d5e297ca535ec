//! boot-lifecycle: node lifecycle operations
//!
//! Each operation (`init`, `setup`, `start`, `stop`, `show-node-info`) is a
//! [`Pipeline`](boot_workflows::Pipeline) of steps from the `catalog`, run by
//! the `dispatcher` against a fresh [`PipelineContext`].
//!
//! - `context`: per-operation state and collaborator handles
//! - `catalog`: the steps
//! - `poller`: validator-set convergence wait
//! - `keys`: state store key names

pub mod catalog;
pub mod context;
pub mod dispatcher;
pub mod keys;
pub mod poller;

pub use context::{Collaborators, InitArgs, PipelineContext};
pub use dispatcher::{Dispatcher, Operation};
pub use poller::{wait_for_validator, PollError, PollerConfig};
