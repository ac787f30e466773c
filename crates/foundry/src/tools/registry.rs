use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use super::calculator::CalculatorTool;
use super::executor::{ToolExecutor, ToolSpec};
use super::http::HttpTool;
use crate::errors::RegistryError;

/// Request body for registering a dynamic tool through the gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolRegistration {
    pub name: String,
    pub description: String,
    pub parameters_schema: Value,
    pub tool_type: String,
    #[serde(default)]
    pub config: Option<Value>,
}

/// Registry of the tools agents may call. Built-in tools are seeded at
/// startup; clients can add `api` and `calculation` tools at runtime.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn ToolExecutor>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn ToolExecutor>) -> Result<(), RegistryError> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(RegistryError::ToolExists(name));
        }
        self.tools.insert(name, tool);
        Ok(())
    }

    /// Create and register a tool from a client registration request.
    pub fn register_dynamic(
        &mut self,
        registration: ToolRegistration,
    ) -> Result<Arc<dyn ToolExecutor>, RegistryError> {
        if self.tools.contains_key(&registration.name) {
            return Err(RegistryError::ToolExists(registration.name));
        }

        let config = registration.config.unwrap_or(Value::Null);
        let tool: Arc<dyn ToolExecutor> = match registration.tool_type.as_str() {
            "api" => Arc::new(HttpTool::new(
                registration.name,
                registration.description,
                registration.parameters_schema,
                config,
            )),
            "calculation" => Arc::new(CalculatorTool::with_spec(
                registration.name,
                registration.description,
            )),
            other => return Err(RegistryError::UnsupportedToolType(other.to_string())),
        };

        self.tools.insert(tool.name().to_string(), tool.clone());
        Ok(tool)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ToolExecutor>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Specs of all registered tools, sorted by name.
    pub fn list(&self) -> Vec<ToolSpec> {
        let mut specs: Vec<ToolSpec> = self.tools.values().map(|tool| tool.spec()).collect();
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        specs
    }

    pub fn delete(&mut self, name: &str) -> bool {
        self.tools.remove(name).is_some()
    }

    pub fn update_config(&self, name: &str, patch: &Value) -> bool {
        match self.tools.get(name) {
            Some(tool) => tool.update_config(patch),
            None => false,
        }
    }

    /// Resolve a list of tool names to executors. Names that no longer exist
    /// are skipped with a warning; registration-time validation keeps this
    /// from happening unless a tool was deleted afterwards.
    pub fn select(&self, names: &[String]) -> Vec<Arc<dyn ToolExecutor>> {
        names
            .iter()
            .filter_map(|name| {
                let tool = self.tools.get(name).cloned();
                if tool.is_none() {
                    tracing::warn!("tool '{}' is assigned but no longer registered", name);
                }
                tool
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn api_registration(name: &str) -> ToolRegistration {
        ToolRegistration {
            name: name.to_string(),
            description: "Calls the MES endpoint".to_string(),
            parameters_schema: json!({"type": "object", "properties": {}}),
            tool_type: "api".to_string(),
            config: Some(json!({"base_url": "http://mes.local/api"})),
        }
    }

    #[test]
    fn test_register_dynamic_and_list() {
        let mut registry = ToolRegistry::new();
        registry.register_dynamic(api_registration("mes_lookup")).unwrap();
        registry
            .register_dynamic(ToolRegistration {
                name: "unit_convert".to_string(),
                description: "Converts units".to_string(),
                parameters_schema: json!({"type": "object"}),
                tool_type: "calculation".to_string(),
                config: None,
            })
            .unwrap();

        let specs = registry.list();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].name, "mes_lookup");
        assert_eq!(specs[1].name, "unit_convert");
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut registry = ToolRegistry::new();
        registry.register_dynamic(api_registration("mes_lookup")).unwrap();
        let err = registry
            .register_dynamic(api_registration("mes_lookup"))
            .unwrap_err();
        assert!(matches!(err, RegistryError::ToolExists(_)));
    }

    #[test]
    fn test_unsupported_tool_type() {
        let mut registry = ToolRegistry::new();
        let mut registration = api_registration("shady");
        registration.tool_type = "custom".to_string();
        let err = registry.register_dynamic(registration).unwrap_err();
        assert!(matches!(err, RegistryError::UnsupportedToolType(_)));
    }

    #[test]
    fn test_delete_and_select() {
        let mut registry = ToolRegistry::new();
        registry.register_dynamic(api_registration("mes_lookup")).unwrap();

        let selected = registry.select(&["mes_lookup".to_string(), "ghost".to_string()]);
        assert_eq!(selected.len(), 1);

        assert!(registry.delete("mes_lookup"));
        assert!(!registry.delete("mes_lookup"));
        assert!(registry.select(&["mes_lookup".to_string()]).is_empty());
    }

    #[test]
    fn test_update_config_through_registry() {
        let mut registry = ToolRegistry::new();
        registry.register_dynamic(api_registration("mes_lookup")).unwrap();

        assert!(registry.update_config("mes_lookup", &json!({"timeout_secs": 3})));
        let config = registry.get("mes_lookup").unwrap().config().unwrap();
        assert_eq!(config["timeout_secs"], 3);

        assert!(!registry.update_config("ghost", &json!({})));
    }
}
