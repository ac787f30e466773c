use indoc::formatdoc;
use serde::{Deserialize, Serialize};

/// A named configuration pairing a role prompt with the set of tools the
/// agent is permitted to call. Registered through the gateway and resolved
/// against the tool registry at invocation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    /// Unique agent name
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// System prompt biasing the model toward the agent's task domain
    pub role_prompt: String,
    /// Names of tools available to this agent
    #[serde(default)]
    pub tools: Vec<String>,
}

impl Agent {
    /// Assemble the system prompt sent with every completion for this agent.
    pub fn system_prompt(&self) -> String {
        if self.tools.is_empty() {
            return self.role_prompt.clone();
        }

        formatdoc! {r#"
            {role_prompt}

            You can call the following tools: {tools}.
            Decide whether a tool is needed to answer. If so, call it with
            arguments matching its parameter schema; tool results will be
            provided back to you. When no further tool call is needed, answer
            the user directly.
            "#,
            role_prompt = self.role_prompt.trim_end(),
            tools = self.tools.join(", "),
        }
    }
}
