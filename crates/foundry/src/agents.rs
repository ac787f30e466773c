use std::collections::HashMap;

use crate::errors::RegistryError;
use crate::models::agent::Agent;
use crate::tools::ToolRegistry;

/// Registry of agent definitions. Tool references are validated against the
/// tool registry at registration and assignment time.
#[derive(Default)]
pub struct AgentRegistry {
    agents: HashMap<String, Agent>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, agent: Agent, tools: &ToolRegistry) -> Result<(), RegistryError> {
        if self.agents.contains_key(&agent.name) {
            return Err(RegistryError::AgentExists(agent.name));
        }
        for tool_name in &agent.tools {
            if !tools.contains(tool_name) {
                return Err(RegistryError::ToolNotFound(tool_name.clone()));
            }
        }
        self.agents.insert(agent.name.clone(), agent);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Agent> {
        self.agents.get(name)
    }

    /// All registered agents, sorted by name.
    pub fn list(&self) -> Vec<Agent> {
        let mut agents: Vec<Agent> = self.agents.values().cloned().collect();
        agents.sort_by(|a, b| a.name.cmp(&b.name));
        agents
    }

    pub fn delete(&mut self, name: &str) -> bool {
        self.agents.remove(name).is_some()
    }

    /// Replace an agent's tool list after validating every name.
    pub fn assign_tools(
        &mut self,
        agent_name: &str,
        tool_names: Vec<String>,
        tools: &ToolRegistry,
    ) -> Result<(), RegistryError> {
        if !self.agents.contains_key(agent_name) {
            return Err(RegistryError::AgentNotFound(agent_name.to_string()));
        }
        for tool_name in &tool_names {
            if !tools.contains(tool_name) {
                return Err(RegistryError::ToolNotFound(tool_name.clone()));
            }
        }
        let agent = self.agents.get_mut(agent_name).expect("checked above");
        agent.tools = tool_names;
        Ok(())
    }
}
