//! Gated Agent - an LLM agent loop with human-in-the-loop tool approval
//!
//! This crate provides:
//! - A run engine that suspends every tool call on a confirmation gate
//! - An ordered run event stream for external observers
//! - A SQL toolset over SQLite as the bundled capability set
//! - CLI/REPL interface for driving runs and answering confirmations

pub mod config;
pub mod events;
pub mod gate;
pub mod message;
pub mod provider;
pub mod run;
pub mod snapshot;
pub mod tool;
pub mod tools;

pub use config::Config;
pub use events::{event_channel, EventEnvelope, EventSender, EventStream, RunEvent};
pub use gate::{ConfirmationGate, ConfirmationRequest, Decision, DenialReason};
pub use message::{Message, Thread, ToolCall};
pub use provider::{Completion, LanguageModel, ProviderClient, ProviderConfig};
pub use run::{RunConfig, RunOutcome, RunReport, Runner};
pub use snapshot::RunSnapshot;
pub use tool::{Tool, ToolContext, ToolDefinition, ToolRegistry, ToolResult};
pub use tools::{sql_toolset, SqlSession};
