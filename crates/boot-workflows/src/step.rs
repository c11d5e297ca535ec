//! Pipeline steps
//!
//! A step is one fallible operation over the pipeline context. Failure is
//! reported by returning `Err`; a panic is a defect and is never caught.

use anyhow::Result;
use async_trait::async_trait;

/// One named unit of work in a [`Pipeline`](crate::Pipeline)
#[async_trait]
pub trait Step<C: Send>: Send + Sync {
    async fn run(&self, ctx: &mut C) -> Result<()>;
}

/// Adapter running a synchronous closure as a step
pub struct FnStep<F>(pub F);

#[async_trait]
impl<C, F> Step<C> for FnStep<F>
where
    C: Send,
    F: Fn(&mut C) -> Result<()> + Send + Sync,
{
    async fn run(&self, ctx: &mut C) -> Result<()> {
        (self.0)(ctx)
    }
}
