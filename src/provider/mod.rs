//! LLM provider layer.
//!
//! The run engine talks to the model through the narrow `LanguageModel`
//! contract; `ProviderClient` is the OpenAI-compatible implementation.

mod client;
mod config;

pub use client::*;
pub use config::*;

use crate::message::{Message, ToolCall};
use crate::tool::ToolDefinition;
use async_trait::async_trait;

/// Provider failure. Fatal to the run that hit it.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("failed to build request: {0}")]
    Request(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("API error: {0}")]
    Api(String),
    #[error("malformed provider response: {0}")]
    InvalidResponse(String),
}

/// One LLM completion: plain text, tool calls, or both. When tool calls
/// are present they take priority over text.
#[derive(Debug, Clone, Default)]
pub struct Completion {
    pub text: Option<String>,
    pub tool_calls: Vec<ToolCall>,
}

impl Completion {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            tool_calls: Vec::new(),
        }
    }

    pub fn tool_calls(calls: Vec<ToolCall>) -> Self {
        Self {
            text: None,
            tool_calls: calls,
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// The LLM collaborator contract.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Run one completion over the full conversation plus the tool
    /// schema array.
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<Completion, ProviderError>;
}
