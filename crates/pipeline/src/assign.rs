//! Key-level helpers: add computed keys to an object, or pick keys out of it.

use async_trait::async_trait;
use chainloom_core::error::PipelineError;
use serde_json::{Map, Value};
use crate::parallel::Parallel;
use crate::step::Step;

/// Keeps the input object and adds one key per named step, each computed
/// from the original input. Existing keys with the same name are replaced.
pub struct Assign {
    name: String,
    fields: Parallel,
}

impl Assign {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            fields: Parallel::new(format!("{name}.fields")),
            name,
        }
    }

    /// Add a computed key.
    pub fn field<S: Step + 'static>(
        mut self,
        key: impl Into<String>,
        step: S,
    ) -> Result<Self, PipelineError> {
        self.fields = self.fields.branch(key, step)?;
        Ok(self)
    }
}

#[async_trait]
impl Step for Assign {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, input: Value) -> Result<Value, PipelineError> {
        let Value::Object(mut object) = input else {
            return Err(PipelineError::invalid_input(&self.name, "object", &input));
        };
        if self.fields.is_empty() {
            return Ok(Value::Object(object));
        }

        let computed = self.fields.invoke(Value::Object(object.clone())).await?;
        if let Value::Object(computed) = computed {
            object.extend(computed);
        }
        Ok(Value::Object(object))
    }
}

/// Selects values from an object by dotted path (`"analysis.order_id"`).
///
/// With one path the value itself is returned; with several, an object
/// keyed by the last path segment.
pub struct Pick {
    name: String,
    paths: Vec<String>,
}

impl Pick {
    pub fn key(path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            name: format!("pick({path})"),
            paths: vec![path],
        }
    }

    pub fn keys<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let paths: Vec<String> = paths.into_iter().map(Into::into).collect();
        Self {
            name: format!("pick({})", paths.join(",")),
            paths,
        }
    }

    fn lookup<'a>(&self, root: &'a Value, path: &str) -> Result<&'a Value, PipelineError> {
        path.split('.')
            .try_fold(root, |current, segment| current.get(segment))
            .ok_or_else(|| PipelineError::missing_key(&self.name, path))
    }
}

#[async_trait]
impl Step for Pick {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, input: Value) -> Result<Value, PipelineError> {
        if !input.is_object() {
            return Err(PipelineError::invalid_input(&self.name, "object", &input));
        }

        if let [path] = self.paths.as_slice() {
            return self.lookup(&input, path).cloned();
        }

        let mut picked = Map::new();
        for path in &self.paths {
            let key = path.rsplit('.').next().unwrap_or(path);
            picked.insert(key.to_string(), self.lookup(&input, path)?.clone());
        }
        Ok(Value::Object(picked))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::{FnStep, Passthrough};
    use serde_json::json;

    #[tokio::test]
    async fn assign_keeps_input_and_adds_keys() {
        let step = Passthrough::assign()
            .field("shout", FnStep::map("shout", |v| json!(v["text"].as_str().unwrap_or_default().to_uppercase())))
            .unwrap();

        let out = step.invoke(json!({"text": "hi", "keep": true})).await.unwrap();
        assert_eq!(out, json!({"text": "hi", "keep": true, "shout": "HI"}));
    }

    #[tokio::test]
    async fn assign_requires_object_input() {
        let err = Assign::new("a").invoke(json!("text")).await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn pick_single_path() {
        let input = json!({"analysis": {"order_id": {"order_id": "ORD1234567890"}}});
        let out = Pick::key("analysis.order_id.order_id").invoke(input).await.unwrap();
        assert_eq!(out, json!("ORD1234567890"));
    }

    #[tokio::test]
    async fn pick_many_paths() {
        let input = json!({"a": 1, "b": {"c": 2}, "d": 3});
        let out = Pick::keys(["a", "b.c"]).invoke(input).await.unwrap();
        assert_eq!(out, json!({"a": 1, "c": 2}));
    }

    #[tokio::test]
    async fn pick_missing_key() {
        let err = Pick::key("nope").invoke(json!({"a": 1})).await.unwrap_err();
        assert!(matches!(err, PipelineError::MissingKey { ref key, .. } if key == "nope"));
    }
}
