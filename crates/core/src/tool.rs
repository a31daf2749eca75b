//! Tool trait and registry.
//!
//! A tool is a named, described capability with a string-in, string-out
//! contract. Tools are registered in a [`ToolRegistry`] which rejects
//! duplicate names at registration time.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use crate::error::ToolError;
use crate::reasoner::ToolDefinition;

/// The core Tool trait.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "weather_lookup").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the reasoner).
    fn description(&self) -> &str;

    /// Execute the tool on a single string input.
    async fn call(&self, input: &str) -> std::result::Result<String, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the reasoner.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
        }
    }
}

type ToolFn = dyn Fn(&str) -> std::result::Result<String, String> + Send + Sync;

/// Adapter turning a plain function into a [`Tool`].
pub struct FnTool {
    name: String,
    description: String,
    func: Box<ToolFn>,
}

impl FnTool {
    pub fn new<F>(name: impl Into<String>, description: impl Into<String>, func: F) -> Self
    where
        F: Fn(&str) -> std::result::Result<String, String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            func: Box::new(func),
        }
    }
}

#[async_trait]
impl Tool for FnTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn call(&self, input: &str) -> std::result::Result<String, ToolError> {
        (self.func)(input).map_err(|reason| ToolError::ExecutionFailed {
            tool_name: self.name.clone(),
            reason,
        })
    }
}

/// A registry of available tools, keyed by unique name.
///
/// Iteration order is the name order, so definitions sent to the reasoner
/// are stable across invocations.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Fails if a tool with the same name exists.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> std::result::Result<(), ToolError> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(ToolError::DuplicateName(name));
        }
        self.tools.insert(name, tool);
        Ok(())
    }

    /// Builder-style registration.
    pub fn with(mut self, tool: Arc<dyn Tool>) -> std::result::Result<Self, ToolError> {
        self.register(tool)?;
        Ok(self)
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Get all tool definitions (for sending to the reasoner).
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.to_definition()).collect()
    }

    /// List all registered tool names.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A simple test tool for unit tests.
    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echoes back the input"
        }
        async fn call(&self, input: &str) -> std::result::Result<String, ToolError> {
            Ok(input.to_string())
        }
    }

    #[tokio::test]
    async fn registry_lookup_and_call() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool)).unwrap();

        let tool = registry.get("echo").unwrap();
        assert_eq!(tool.call("hello").await.unwrap(), "hello");
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn duplicate_names_rejected() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool)).unwrap();
        let err = registry.register(Arc::new(EchoTool)).unwrap_err();
        assert!(matches!(err, ToolError::DuplicateName(name) if name == "echo"));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn fn_tool_maps_errors() {
        let tool = FnTool::new("fail", "always fails", |_| Err("nope".to_string()));
        let err = tool.call("x").await.unwrap_err();
        assert!(matches!(err, ToolError::ExecutionFailed { ref tool_name, .. } if tool_name == "fail"));
    }

    #[test]
    fn definitions_sorted_by_name() {
        let registry = ToolRegistry::new()
            .with(Arc::new(FnTool::new("zeta", "z", |s| Ok(s.into()))))
            .unwrap()
            .with(Arc::new(FnTool::new("alpha", "a", |s| Ok(s.into()))))
            .unwrap();
        let names: Vec<_> = registry.definitions().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }
}
