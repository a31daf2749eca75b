//! The Step trait and its leaf adapters.
//!
//! A step maps one JSON value to another. Composite steps
//! ([`Sequence`](crate::Sequence), [`Parallel`](crate::Parallel)) are steps
//! too, so pipelines nest freely.

use async_trait::async_trait;
use chainloom_core::error::PipelineError;
use futures::future::try_join_all;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use crate::sequence::Sequence;

/// Receiver side of [`Step::stream`].
pub type StepStream = mpsc::Receiver<Result<Value, PipelineError>>;

/// A unit of computation in a pipeline.
#[async_trait]
pub trait Step: Send + Sync {
    /// Name used in logs and error messages.
    fn name(&self) -> &str;

    /// Run the step on one input.
    async fn invoke(&self, input: Value) -> Result<Value, PipelineError>;

    /// Run the step on many inputs concurrently. Output order matches input
    /// order; the first failure aborts the batch.
    async fn batch(&self, inputs: Vec<Value>) -> Result<Vec<Value>, PipelineError> {
        try_join_all(inputs.into_iter().map(|input| self.invoke(input))).await
    }

    /// Run the step and receive its output as chunks.
    ///
    /// The default emits the whole output as one chunk.
    async fn stream(&self, input: Value) -> Result<StepStream, PipelineError> {
        let output = self.invoke(input).await?;
        let (tx, rx) = mpsc::channel(1);
        let _ = tx.send(Ok(output)).await;
        Ok(rx)
    }
}

#[async_trait]
impl<S: Step + ?Sized> Step for Arc<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn invoke(&self, input: Value) -> Result<Value, PipelineError> {
        (**self).invoke(input).await
    }

    async fn batch(&self, inputs: Vec<Value>) -> Result<Vec<Value>, PipelineError> {
        (**self).batch(inputs).await
    }

    async fn stream(&self, input: Value) -> Result<StepStream, PipelineError> {
        (**self).stream(input).await
    }
}

/// Composition helpers available on every sized step.
pub trait StepExt: Step + Sized + 'static {
    /// Chain `next` after this step.
    fn pipe<N: Step + 'static>(self, next: N) -> Sequence {
        Sequence::new("sequence").then(self).then(next)
    }

    /// Erase the concrete type.
    fn boxed(self) -> Arc<dyn Step> {
        Arc::new(self)
    }
}

impl<T: Step + Sized + 'static> StepExt for T {}

type StepFn = dyn Fn(Value) -> Result<Value, PipelineError> + Send + Sync;

/// Adapter wrapping a plain function as a step.
pub struct FnStep {
    name: String,
    func: Box<StepFn>,
}

impl FnStep {
    /// Wrap a fallible function.
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(Value) -> Result<Value, PipelineError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Box::new(func),
        }
    }

    /// Wrap an infallible function.
    pub fn map<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        Self::new(name, move |input| Ok(func(input)))
    }
}

#[async_trait]
impl Step for FnStep {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, input: Value) -> Result<Value, PipelineError> {
        (self.func)(input)
    }
}

/// Identity step.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl Passthrough {
    /// Start an [`Assign`](crate::Assign) that keeps the input and adds keys.
    pub fn assign() -> crate::assign::Assign {
        crate::assign::Assign::new("assign")
    }
}

#[async_trait]
impl Step for Passthrough {
    fn name(&self) -> &str {
        "passthrough"
    }

    async fn invoke(&self, input: Value) -> Result<Value, PipelineError> {
        Ok(input)
    }
}
