//! Run persistence.
//!
//! The resumable unit of a run is deliberately small: the thread, the
//! loop counter, and the id of a confirmation that was pending when the
//! snapshot was taken. Decision handles are process-local and never
//! persisted; on resume the pending call is re-proposed from the
//! thread's unanswered tool calls.

use crate::message::Thread;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Serializable state of a suspended or in-flight run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSnapshot {
    pub run_id: Uuid,
    pub thread: Thread,
    pub loop_count: usize,
    /// Tool call id awaiting confirmation at snapshot time, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_confirmation: Option<String>,
}

impl RunSnapshot {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}
