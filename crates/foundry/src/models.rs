//! These models represent the objects passed around by the orchestrator
//!
//! There are a few related formats we need to interact with:
//! - the REST gateway's request/response bodies
//! - openai-compatible messages/tools, sent to the inference server
//! - tool requests, dispatched to the executors in the tool registry
//!
//! These overlap but do not coincide, so everything is converted into the
//! internal structs here at the boundary and back out again on the way to the
//! wire.
pub mod agent;
pub mod content;
pub mod message;
pub mod role;
pub mod tool;
