//! Parallel (fan-out) composition.

use async_trait::async_trait;
use chainloom_core::error::PipelineError;
use futures::future::try_join_all;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};
use crate::step::Step;

/// Runs named branches on clones of the same input and collects their
/// outputs into an object keyed by branch name.
///
/// Branches are polled concurrently on the calling task. The policy is
/// fail-fast: the first branch error is returned as
/// [`PipelineError::BranchFailed`], the other branches are dropped and no
/// partial object is produced.
pub struct Parallel {
    name: String,
    branches: Vec<(String, Arc<dyn Step>)>,
}

impl Parallel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            branches: Vec::new(),
        }
    }

    /// Add a named branch. Branch names must be unique.
    pub fn branch<S: Step + 'static>(
        mut self,
        name: impl Into<String>,
        step: S,
    ) -> Result<Self, PipelineError> {
        let name = name.into();
        if self.branches.iter().any(|(existing, _)| *existing == name) {
            return Err(PipelineError::DuplicateBranch(name));
        }
        self.branches.push((name, Arc::new(step)));
        Ok(self)
    }

    /// Branch names in registration order.
    pub fn branch_names(&self) -> Vec<&str> {
        self.branches.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.branches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
    }
}

#[async_trait]
impl Step for Parallel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, input: Value) -> Result<Value, PipelineError> {
        if self.branches.is_empty() {
            return Err(PipelineError::Empty(self.name.clone()));
        }

        debug!(pipeline = %self.name, branches = self.branches.len(), "Fanning out");

        let runs = self.branches.iter().map(|(branch, step)| {
            let input = input.clone();
            async move {
                match step.invoke(input).await {
                    Ok(output) => Ok((branch.clone(), output)),
                    Err(e) => {
                        warn!(pipeline = %self.name, branch = %branch, error = %e, "Branch failed");
                        Err(PipelineError::BranchFailed {
                            branch: branch.clone(),
                            source: Box::new(e),
                        })
                    }
                }
            }
        });

        let outputs = try_join_all(runs).await?;
        Ok(Value::Object(outputs.into_iter().collect::<Map<String, Value>>()))
    }
}
