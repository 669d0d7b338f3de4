use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::turns::ArgumentMap;

pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Tool implementation contract: a synchronous function over the parsed
/// argument map. Handlers may perform I/O but get no retries; a returned
/// error is captured into the dispatch result, never propagated.
pub type ToolHandler = dyn Fn(&ArgumentMap) -> Result<Value, HandlerError> + Send + Sync;

/// Static declaration of one capability offered to the model: the name the
/// model invokes it by, a description, a JSON Schema for its input, and the
/// local handler that runs when the model calls it.
#[derive(Clone)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    handler: Arc<ToolHandler>,
}

impl ToolSpec {
    pub fn new<F>(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
        handler: F,
    ) -> Self
    where
        F: Fn(&ArgumentMap) -> Result<Value, HandlerError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
            handler: Arc::new(handler),
        }
    }

    pub(crate) fn invoke(&self, arguments: &ArgumentMap) -> Result<Value, HandlerError> {
        (self.handler)(arguments)
    }
}

impl fmt::Debug for ToolSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolSpec")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("input_schema", &self.input_schema)
            .finish_non_exhaustive()
    }
}

/// Registry of the tools offered to the model for one run. Names are unique
/// keys; registering a name twice replaces the earlier spec. Iteration order
/// is stable (sorted by name) so encoded tool declarations are deterministic.
#[derive(Debug, Clone, Default)]
pub struct ToolCatalog {
    tools: BTreeMap<String, ToolSpec>,
}

impl ToolCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, spec: ToolSpec) -> &mut Self {
        self.tools.insert(spec.name.clone(), spec);
        self
    }

    pub fn with_tool(mut self, spec: ToolSpec) -> Self {
        self.register(spec);
        self
    }

    pub fn get(&self, name: &str) -> Option<&ToolSpec> {
        self.tools.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// The capability declarations to encode on the wire. Handlers stay
    /// private to the catalog.
    pub fn declarations(&self) -> impl Iterator<Item = &ToolSpec> {
        self.tools.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn add_tool() -> ToolSpec {
        ToolSpec::new(
            "add",
            "Add two integers.",
            json!({
                "type": "object",
                "properties": {
                    "a": { "type": "integer" },
                    "b": { "type": "integer" }
                },
                "required": ["a", "b"]
            }),
            |arguments| {
                let a = arguments.get("a").and_then(Value::as_i64).unwrap_or(0);
                let b = arguments.get("b").and_then(Value::as_i64).unwrap_or(0);
                Ok(json!(a + b))
            },
        )
    }

    #[test]
    fn register_replaces_same_name() {
        let mut catalog = ToolCatalog::new();
        catalog.register(add_tool());
        catalog.register(ToolSpec::new("add", "Replacement.", json!({}), |_| {
            Ok(json!(null))
        }));
        assert_eq!(catalog.len(), 1);
        assert_eq!(
            catalog.get("add").map(|spec| spec.description.as_str()),
            Some("Replacement.")
        );
    }

    #[test]
    fn declarations_are_sorted_by_name() {
        let catalog = ToolCatalog::new()
            .with_tool(ToolSpec::new("zeta", "", json!({}), |_| Ok(json!(null))))
            .with_tool(add_tool());
        let names: Vec<&str> = catalog
            .declarations()
            .map(|spec| spec.name.as_str())
            .collect();
        assert_eq!(names, ["add", "zeta"]);
    }
}
