//! Domain types for agent execution

mod message;
mod tool_call;
mod trace;

pub use message::*;
pub use tool_call::*;
pub use trace::*;

use serde::{Deserialize, Serialize};

/// Token usage reported for one model turn
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Tokens used in the prompt/input
    pub prompt_tokens: u32,
    /// Tokens generated in the response
    pub completion_tokens: u32,
    /// Total tokens used
    pub total_tokens: u32,
}
