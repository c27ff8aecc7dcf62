//! Confirmation gate: decouples tool-call proposal from execution.
//!
//! The run engine opens a request per tool call and suspends on
//! `await_decision`; an external actor (UI, CLI, test) answers through
//! `resolve`. The pending map is shared across runs and safe for
//! concurrent insertion and removal. Each entry is inserted on `open`
//! and removed by exactly one of: `resolve`, deadline expiry, `abandon`.

use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

/// Outcome of a confirmation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Approved,
    Denied(DenialReason),
}

impl Decision {
    pub fn is_approved(&self) -> bool {
        matches!(self, Decision::Approved)
    }
}

/// Why a request was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialReason {
    /// Explicit denial from the external actor
    User,
    /// Configured deadline expired
    Timeout,
    /// Decision channel dropped before resolution
    Abandoned,
}

impl DenialReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenialReason::User => "user",
            DenialReason::Timeout => "timeout",
            DenialReason::Abandoned => "abandoned",
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum GateError {
    /// Duplicate proposal for a tool call id. Protocol violation.
    #[error("confirmation request already open for tool call '{0}'")]
    DuplicateRequest(String),
    /// Resolution of an unknown or already-resolved id.
    #[error("no pending confirmation for tool call '{0}'")]
    NotFound(String),
}

/// The suspension unit handed to observers.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ConfirmationRequest {
    pub tool_call_id: String,
    pub tool_name: String,
    pub arguments: Value,
    /// Human-readable prompt for the confirming actor
    pub prompt: String,
}

/// Receiver side of one pending decision. Owned by the run that opened it.
#[derive(Debug)]
pub struct DecisionReceiver {
    tool_call_id: String,
    rx: oneshot::Receiver<Decision>,
}

/// Gate shared between the run engine and the resolving side.
///
/// Cloning is cheap; all clones share the same pending map.
#[derive(Clone, Default)]
pub struct ConfirmationGate {
    pending: Arc<Mutex<HashMap<String, oneshot::Sender<Decision>>>>,
    deadline: Option<Duration>,
}

impl ConfirmationGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Gate with a decision deadline. Expiry resolves as a denial with
    /// reason `timeout`.
    pub fn with_deadline(deadline: Duration) -> Self {
        Self {
            pending: Arc::new(Mutex::new(HashMap::new())),
            deadline: Some(deadline),
        }
    }

    /// Register a pending request for a tool call.
    ///
    /// Fails with `DuplicateRequest` if the id already has an open
    /// request; the caller treats that as an internal invariant breach.
    pub fn open(
        &self,
        tool_call_id: &str,
        tool_name: &str,
        arguments: &Value,
    ) -> Result<(ConfirmationRequest, DecisionReceiver), GateError> {
        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock();
            if pending.contains_key(tool_call_id) {
                return Err(GateError::DuplicateRequest(tool_call_id.to_string()));
            }
            pending.insert(tool_call_id.to_string(), tx);
        }
        let request = ConfirmationRequest {
            tool_call_id: tool_call_id.to_string(),
            tool_name: tool_name.to_string(),
            arguments: arguments.clone(),
            prompt: format!(
                "Agent proposes to call `{}` with args: {}. Confirm?",
                tool_name, arguments
            ),
        };
        tracing::debug!(tool_call_id, tool = tool_name, "confirmation opened");
        Ok((request, DecisionReceiver {
            tool_call_id: tool_call_id.to_string(),
            rx,
        }))
    }

    /// Suspend until the request is resolved.
    ///
    /// Waits without bound unless the gate was built with a deadline, in
    /// which case expiry cleans up the entry and denies with `timeout`.
    pub async fn await_decision(&self, receiver: DecisionReceiver) -> Decision {
        let DecisionReceiver { tool_call_id, rx } = receiver;
        let decision = match self.deadline {
            Some(deadline) => match tokio::time::timeout(deadline, rx).await {
                Ok(Ok(decision)) => decision,
                Ok(Err(_)) => Decision::Denied(DenialReason::Abandoned),
                Err(_) => {
                    // Expired: the entry is still in the map, drop it so a
                    // late resolve gets NotFound.
                    self.pending.lock().remove(&tool_call_id);
                    Decision::Denied(DenialReason::Timeout)
                }
            },
            None => match rx.await {
                Ok(decision) => decision,
                Err(_) => Decision::Denied(DenialReason::Abandoned),
            },
        };
        tracing::debug!(tool_call_id = %tool_call_id, approved = decision.is_approved(), "confirmation decided");
        decision
    }

    /// Resolve a pending request. Idempotent-once: the first resolution
    /// for an id wakes the waiter exactly once, any later call returns
    /// `NotFound` without side effects.
    pub fn resolve(&self, tool_call_id: &str, approved: bool) -> Result<(), GateError> {
        let sender = self
            .pending
            .lock()
            .remove(tool_call_id)
            .ok_or_else(|| GateError::NotFound(tool_call_id.to_string()))?;
        let decision = if approved {
            Decision::Approved
        } else {
            Decision::Denied(DenialReason::User)
        };
        // Receiver dropped means the run already gave up on this call;
        // the entry is removed either way.
        let _ = sender.send(decision);
        Ok(())
    }

    /// Drop a pending request without waking anyone. Used when a run
    /// terminates with requests it no longer intends to wait on.
    pub fn abandon(&self, tool_call_id: &str) -> bool {
        self.pending.lock().remove(tool_call_id).is_some()
    }

    /// Ids with an open, unresolved request.
    pub fn pending_ids(&self) -> Vec<String> {
        self.pending.lock().keys().cloned().collect()
    }

    pub fn is_pending(&self, tool_call_id: &str) -> bool {
        self.pending.lock().contains_key(tool_call_id)
    }
}
