pub mod calculator;
pub mod database;
pub mod executor;
pub mod http;
pub mod registry;
pub mod retrieval;

pub use executor::{execute_with_timing, ExecuteOutcome, ToolExecutor, ToolKind, ToolSpec};
pub use registry::{ToolRegistration, ToolRegistry};
