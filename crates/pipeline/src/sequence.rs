//! Sequential composition.

use async_trait::async_trait;
use chainloom_core::error::PipelineError;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};
use crate::step::{Step, StepStream};

/// Runs steps in order, feeding each output into the next step.
///
/// The first failing step aborts the run and its error is returned as-is;
/// later steps are never invoked.
pub struct Sequence {
    name: String,
    steps: Vec<Arc<dyn Step>>,
}

impl Sequence {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    /// Append a step.
    pub fn then<S: Step + 'static>(mut self, step: S) -> Self {
        self.steps.push(Arc::new(step));
        self
    }

    /// Append a step. Shadows [`StepExt::pipe`](crate::StepExt::pipe) so
    /// that `a.pipe(b).pipe(c)` stays flat.
    pub fn pipe<S: Step + 'static>(self, step: S) -> Self {
        self.then(step)
    }

    /// Rename this sequence.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Run every step but the last, returning the last step and its input.
    async fn run_prefix(&self, input: Value) -> Result<(&Arc<dyn Step>, Value), PipelineError> {
        let Some((last, prefix)) = self.steps.split_last() else {
            return Err(PipelineError::Empty(self.name.clone()));
        };

        let mut current = input;
        for (index, step) in prefix.iter().enumerate() {
            current = self.run_step(index, step, current).await?;
        }
        Ok((last, current))
    }

    async fn run_step(
        &self,
        index: usize,
        step: &Arc<dyn Step>,
        input: Value,
    ) -> Result<Value, PipelineError> {
        debug!(pipeline = %self.name, step = step.name(), index, "Running step");
        step.invoke(input).await.inspect_err(|e| {
            warn!(pipeline = %self.name, step = step.name(), index, error = %e, "Step failed");
        })
    }
}

#[async_trait]
impl Step for Sequence {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, input: Value) -> Result<Value, PipelineError> {
        let (last, input) = self.run_prefix(input).await?;
        self.run_step(self.steps.len() - 1, last, input).await
    }

    /// Streams the last step's chunks once the earlier steps have finished.
    async fn stream(&self, input: Value) -> Result<StepStream, PipelineError> {
        let (last, input) = self.run_prefix(input).await?;
        last.stream(input).await
    }
}
