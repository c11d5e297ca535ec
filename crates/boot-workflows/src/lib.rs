//! boot-workflows: sequential step pipelines
//!
//! Features:
//! - Steps run eagerly, in append order, against one shared context
//! - The first failing step short-circuits every later step
//! - Failures are attributed to the step label that produced them

pub mod pipeline;
pub mod step;

pub use pipeline::{Pipeline, PipelineError};
pub use step::{FnStep, Step};

/// Prelude for convenient imports
pub mod prelude {
    pub use super::pipeline::{Pipeline, PipelineError};
    pub use super::step::{FnStep, Step};
}
