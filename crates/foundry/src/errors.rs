use serde::{Deserialize, Serialize};
use thiserror::Error;

#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Deserialize, Serialize)]
pub enum AgentError {
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Tool execution failed: {0}")]
    ExecutionError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type AgentResult<T> = Result<T, AgentError>;

/// Validation failures raised by the agent and tool registries. The server
/// maps these onto 400/404 responses.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    #[error("Agent with name '{0}' is already registered")]
    AgentExists(String),

    #[error("Agent '{0}' not found")]
    AgentNotFound(String),

    #[error("Tool with name '{0}' is already registered")]
    ToolExists(String),

    #[error("Tool '{0}' not found")]
    ToolNotFound(String),

    #[error("Invalid tool type '{0}'; dynamic tools must be one of: api, calculation")]
    UnsupportedToolType(String),
}
