//! Agent execution
//!
//! - `config/` - Agent definitions, tool descriptors and execution limits
//! - `domain/` - Messages, tool calls and execution traces
//! - `llm/` - LLM provider port and the OpenAI-compatible implementation
//! - `registry` - Binds tool descriptors to live backends
//! - `core/` - The bounded model/tool-call loop
//! - `recorder` - Accumulates the execution trace
//! - `handler` - Entry point used by the API and the CLI

pub mod config;
pub mod core;
pub mod domain;
pub mod error;
pub mod handler;
pub mod llm;
pub mod recorder;
pub mod registry;

// Re-export commonly used types
pub use config::*;
pub use domain::*;
pub use error::*;
pub use handler::AgentHandler;
