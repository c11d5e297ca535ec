//! Pipeline - eager, short-circuiting step sequence
//!
//! Each appended step runs immediately against the shared context. Once a
//! step fails, every later `append` is a no-op and the first failure is kept
//! for [`Pipeline::result`].

use anyhow::Result;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::step::{FnStep, Step};

/// Failure of a pipeline, attributed to the step that produced it
#[derive(Debug, Error)]
#[error("failed to execute step [{step}]: {cause:#}")]
pub struct PipelineError {
    step: String,
    cause: anyhow::Error,
}

impl PipelineError {
    /// Label of the failing step
    pub fn step(&self) -> &str {
        &self.step
    }

    /// Underlying cause returned by the step
    pub fn cause(&self) -> &anyhow::Error {
        &self.cause
    }
}

/// Ordered steps over one exclusively owned context
pub struct Pipeline<C> {
    name: String,
    ctx: C,
    current: Option<String>,
    completed: Vec<String>,
    failure: Option<PipelineError>,
    started: Instant,
}

impl<C: Send> Pipeline<C> {
    /// Create a pipeline owning `ctx` for its whole run
    pub fn new(name: impl Into<String>, ctx: C) -> Self {
        Self {
            name: name.into(),
            ctx,
            current: None,
            completed: Vec::new(),
            failure: None,
            started: Instant::now(),
        }
    }

    /// Run `step` now, unless an earlier step already failed.
    pub async fn append<S: Step<C>>(&mut self, label: &str, step: S) -> &mut Self {
        if self.failure.is_some() {
            debug!(pipeline = %self.name, step = label, "Skipping step after earlier failure");
            return self;
        }

        self.current = Some(label.to_string());
        println!("[step] {}", label);
        info!(pipeline = %self.name, step = label, "Executing step");

        let start = Instant::now();
        match step.run(&mut self.ctx).await {
            Ok(()) => {
                debug!(
                    pipeline = %self.name,
                    step = label,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Step complete"
                );
                self.completed.push(label.to_string());
            }
            Err(cause) => {
                error!(pipeline = %self.name, step = label, error = %format!("{:#}", cause), "Step failed");
                self.failure = Some(PipelineError {
                    step: label.to_string(),
                    cause,
                });
            }
        }
        self
    }

    /// Run a synchronous closure as a step.
    pub async fn append_fn<F>(&mut self, label: &str, f: F) -> &mut Self
    where
        F: Fn(&mut C) -> Result<()> + Send + Sync,
    {
        self.append(label, FnStep(f)).await
    }

    /// Label of the most recently started step
    pub fn current_step(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Labels of the steps that finished successfully, in order
    pub fn completed(&self) -> &[String] {
        &self.completed
    }

    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }

    pub fn failure(&self) -> Option<&PipelineError> {
        self.failure.as_ref()
    }

    pub fn context(&self) -> &C {
        &self.ctx
    }

    /// Finish the pipeline: the context if every step succeeded, the first
    /// failure otherwise.
    pub fn result(self) -> std::result::Result<C, PipelineError> {
        let duration_ms = self.started.elapsed().as_millis() as u64;
        match self.failure {
            None => {
                info!(
                    pipeline = %self.name,
                    steps = self.completed.len(),
                    duration_ms,
                    "Pipeline complete"
                );
                Ok(self.ctx)
            }
            Some(err) => {
                info!(pipeline = %self.name, failed_step = %err.step, duration_ms, "Pipeline aborted");
                Err(err)
            }
        }
    }
}
