//! Conversation state: role-tagged messages forming the LLM context.
//!
//! The `Thread` is append-only within a run. Tool result messages must
//! reference an unanswered tool call of the most recent assistant message;
//! `push_tool_result` enforces that linking invariant instead of trusting
//! the caller.

use serde::{Deserialize, Serialize};

/// A single proposed tool invocation, as emitted by the LLM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique within a run
    pub id: String,
    pub name: String,
    /// Structured key -> value mapping
    pub arguments: serde_json::Value,
}

impl ToolCall {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: serde_json::Value,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// One turn in the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Message {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        /// Nullable: assistant messages may carry only tool calls
        content: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
    },
    Tool {
        tool_call_id: String,
        content: String,
    },
}

impl Message {
    pub fn role(&self) -> &'static str {
        match self {
            Message::System { .. } => "system",
            Message::User { .. } => "user",
            Message::Assistant { .. } => "assistant",
            Message::Tool { .. } => "tool",
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ThreadError {
    #[error("tool result '{0}' does not reference an unanswered tool call of the last assistant message")]
    UnlinkedToolResult(String),
}

/// Ordered conversation history for one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Thread {
    pub messages: Vec<Message>,
}

impl Thread {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the thread with the system directive and the user request.
    pub fn seeded(system_prompt: impl Into<String>, user_input: impl Into<String>) -> Self {
        let mut thread = Self::new();
        thread.push_system(system_prompt);
        thread.push_user(user_input);
        thread
    }

    pub fn push_system(&mut self, content: impl Into<String>) {
        self.messages.push(Message::System {
            content: content.into(),
        });
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.messages.push(Message::User {
            content: content.into(),
        });
    }

    pub fn push_assistant_text(&mut self, content: impl Into<String>) {
        self.messages.push(Message::Assistant {
            content: Some(content.into()),
            tool_calls: Vec::new(),
        });
    }

    /// Append an assistant message that requests tools.
    pub fn push_assistant_tool_calls(
        &mut self,
        content: Option<String>,
        tool_calls: Vec<ToolCall>,
    ) {
        self.messages.push(Message::Assistant {
            content,
            tool_calls,
        });
    }

    /// Append a tool result, checking that it answers a tool call of the
    /// most recent assistant message that is not yet answered.
    pub fn push_tool_result(
        &mut self,
        tool_call_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Result<(), ThreadError> {
        let tool_call_id = tool_call_id.into();
        if !self
            .unanswered_tool_calls()
            .iter()
            .any(|tc| tc.id == tool_call_id)
        {
            return Err(ThreadError::UnlinkedToolResult(tool_call_id));
        }
        self.messages.push(Message::Tool {
            tool_call_id,
            content: content.into(),
        });
        Ok(())
    }

    /// Tool calls from the most recent assistant message that have no
    /// tool result message yet, in emission order.
    pub fn unanswered_tool_calls(&self) -> Vec<ToolCall> {
        let mut answered: Vec<&str> = Vec::new();
        for msg in self.messages.iter().rev() {
            match msg {
                Message::Tool { tool_call_id, .. } => answered.push(tool_call_id),
                Message::Assistant { tool_calls, .. } => {
                    return tool_calls
                        .iter()
                        .filter(|tc| !answered.contains(&tc.id.as_str()))
                        .cloned()
                        .collect();
                }
                _ => return Vec::new(),
            }
        }
        Vec::new()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Last assistant text, if the thread ends with one.
    pub fn final_text(&self) -> Option<&str> {
        match self.messages.last() {
            Some(Message::Assistant { content, .. }) => content.as_deref(),
            _ => None,
        }
    }
}
