//! Run engine.
//!
//! Drives repeated LLM invocation, tool-call extraction,
//! confirmation-gated execution, result feedback, and termination. One
//! run is a single logical control flow that suspends at exactly one
//! point: `ConfirmationGate::await_decision`. The same state machine
//! serves fresh runs and runs resumed from a snapshot; unanswered tool
//! calls from the last assistant message are processed before the model
//! is asked again.

use crate::events::{emit, EventSender, RunEvent};
use crate::gate::{ConfirmationGate, Decision, GateError};
use crate::message::{Thread, ToolCall};
use crate::provider::LanguageModel;
use crate::snapshot::RunSnapshot;
use crate::tool::{ToolContext, ToolRegistry};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Terminal outcome of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Completed,
    Cancelled,
    Errored,
    MaxLoopsReached,
}

impl RunOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunOutcome::Completed => "completed",
            RunOutcome::Cancelled => "cancelled",
            RunOutcome::Errored => "errored",
            RunOutcome::MaxLoopsReached => "max_loops_reached",
        }
    }
}

/// Run engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// System directive seeded into every thread
    pub system_prompt: String,
    /// Ceiling on LLM invocations per run
    pub max_loops: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            system_prompt: "You are a SQL expert. Use tools to explore the database, \
                            test queries, and only call run_final_sql_query when correct."
                .to_string(),
            max_loops: 8,
        }
    }
}

/// What a finished run hands back to the caller
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub outcome: RunOutcome,
    pub loops: usize,
    /// Final text, terminal tool output, or a status line
    pub result: String,
    pub thread: Thread,
}

/// Mutable state of one run: the minimal resumable unit.
#[derive(Debug, Clone)]
pub struct RunState {
    pub run_id: Uuid,
    pub thread: Thread,
    pub loop_count: usize,
    /// Tool call id currently suspended on the gate, if any
    pub pending_call: Option<String>,
}

impl RunState {
    fn begin(system_prompt: &str, user_input: &str) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            thread: Thread::seeded(system_prompt, user_input),
            loop_count: 0,
            pending_call: None,
        }
    }

    pub fn snapshot(&self) -> RunSnapshot {
        RunSnapshot {
            run_id: self.run_id,
            thread: self.thread.clone(),
            loop_count: self.loop_count,
            pending_confirmation: self.pending_call.clone(),
        }
    }

    pub fn from_snapshot(snapshot: RunSnapshot) -> Self {
        Self {
            run_id: snapshot.run_id,
            thread: snapshot.thread,
            loop_count: snapshot.loop_count,
            // The decision handle did not survive; the call is
            // re-proposed from the thread's unanswered calls.
            pending_call: None,
        }
    }
}

/// How a processed turn continues
enum TurnFlow {
    /// Keep looping
    Continue,
    /// Terminal tool succeeded; finish with its output
    Finish(String),
    /// Run is over for another reason
    Stop(RunOutcome, String),
}

/// Drives runs over a provider, a tool registry, and a confirmation gate.
///
/// Runners are cheap to share; concurrent runs are independent except
/// for the gate's pending-decision map.
pub struct Runner {
    provider: Arc<dyn LanguageModel>,
    registry: ToolRegistry,
    gate: ConfirmationGate,
    config: RunConfig,
}

impl Runner {
    pub fn new(
        provider: Arc<dyn LanguageModel>,
        registry: ToolRegistry,
        gate: ConfirmationGate,
        config: RunConfig,
    ) -> Self {
        Self {
            provider,
            registry,
            gate,
            config,
        }
    }

    /// The gate external actors resolve decisions through
    pub fn gate(&self) -> &ConfirmationGate {
        &self.gate
    }

    /// Execute one run for one user request.
    pub async fn run(
        &self,
        user_input: &str,
        event_tx: &EventSender,
        cancellation: CancellationToken,
    ) -> RunReport {
        let state = RunState::begin(&self.config.system_prompt, user_input);
        emit(
            event_tx,
            RunEvent::RunStarted {
                run_id: state.run_id,
                input: user_input.to_string(),
            },
        );
        self.drive(state, event_tx, cancellation).await
    }

    /// Continue a run from a persisted snapshot.
    pub async fn resume(
        &self,
        snapshot: RunSnapshot,
        event_tx: &EventSender,
        cancellation: CancellationToken,
    ) -> RunReport {
        let state = RunState::from_snapshot(snapshot);
        tracing::debug!(run_id = %state.run_id, loop_count = state.loop_count, "resuming run");
        self.drive(state, event_tx, cancellation).await
    }

    async fn drive(
        &self,
        mut state: RunState,
        event_tx: &EventSender,
        cancellation: CancellationToken,
    ) -> RunReport {
        let (outcome, result) = self.drive_inner(&mut state, event_tx, cancellation).await;
        self.release(&state);

        match outcome {
            RunOutcome::Errored => emit(
                event_tx,
                RunEvent::RunError {
                    run_id: state.run_id,
                    message: result.clone(),
                },
            ),
            _ => emit(
                event_tx,
                RunEvent::RunFinished {
                    run_id: state.run_id,
                    outcome,
                    result: result.clone(),
                },
            ),
        }

        RunReport {
            run_id: state.run_id,
            outcome,
            loops: state.loop_count,
            result,
            thread: state.thread.clone(),
        }
    }

    async fn drive_inner(
        &self,
        state: &mut RunState,
        event_tx: &EventSender,
        cancellation: CancellationToken,
    ) -> (RunOutcome, String) {
        let definitions = self.registry.definitions();

        loop {
            // Tool calls left unanswered by the last assistant message
            // (fresh turn or resumed snapshot) come first.
            let pending = state.thread.unanswered_tool_calls();
            if !pending.is_empty() {
                match self
                    .handle_tools(state, &pending, event_tx, &cancellation)
                    .await
                {
                    TurnFlow::Continue => {}
                    TurnFlow::Finish(summary) => return (RunOutcome::Completed, summary),
                    TurnFlow::Stop(outcome, result) => return (outcome, result),
                }
            }

            if cancellation.is_cancelled() {
                return (RunOutcome::Cancelled, "Cancelled.".to_string());
            }
            if state.loop_count >= self.config.max_loops {
                return (
                    RunOutcome::MaxLoopsReached,
                    "Reached max agent loops.".to_string(),
                );
            }
            state.loop_count += 1;
            tracing::debug!(run_id = %state.run_id, loop_count = state.loop_count, "LLM call");

            let completion = match self
                .provider
                .complete(&state.thread.messages, &definitions)
                .await
            {
                Ok(completion) => completion,
                Err(e) => {
                    tracing::error!(run_id = %state.run_id, error = %e, "provider failure");
                    return (RunOutcome::Errored, format!("LLM call failed: {}", e));
                }
            };

            if completion.has_tool_calls() {
                // Tool calls take priority; any text rides along on the
                // assistant message. The loop top picks the calls up.
                let content = completion.text.filter(|t| !t.is_empty());
                state
                    .thread
                    .push_assistant_tool_calls(content, completion.tool_calls);
                continue;
            }

            // Finishing: no tool calls. Empty text is not fabricated.
            let text = completion.text.unwrap_or_default();
            if !text.is_empty() {
                state.thread.push_assistant_text(text.as_str());
                emit(event_tx, RunEvent::TextContent { text: text.clone() });
            }
            return (RunOutcome::Completed, text);
        }
    }

    /// Confirm and execute one assistant turn's tool calls, strictly in
    /// emission order. Denial (explicit or by deadline) cancels the rest
    /// of the turn.
    async fn handle_tools(
        &self,
        state: &mut RunState,
        calls: &[ToolCall],
        event_tx: &EventSender,
        cancellation: &CancellationToken,
    ) -> TurnFlow {
        let mut finish_summary: Option<String> = None;

        for call in calls {
            if cancellation.is_cancelled() {
                return TurnFlow::Stop(RunOutcome::Cancelled, "Cancelled.".to_string());
            }

            emit(
                event_tx,
                RunEvent::ToolCallProposed {
                    call_id: call.id.clone(),
                    tool: call.name.clone(),
                    arguments: call.arguments.clone(),
                },
            );

            let (request, receiver) = match self.gate.open(&call.id, &call.name, &call.arguments) {
                Ok(opened) => opened,
                Err(e @ GateError::DuplicateRequest(_)) => {
                    // Invariant breach inside the engine, not a user error
                    // and not something the model can correct.
                    tracing::error!(run_id = %state.run_id, error = %e, "confirmation protocol violation");
                    return TurnFlow::Stop(
                        RunOutcome::Errored,
                        "internal error: confirmation protocol violation".to_string(),
                    );
                }
                Err(e) => {
                    tracing::error!(run_id = %state.run_id, error = %e, "confirmation gate failure");
                    return TurnFlow::Stop(
                        RunOutcome::Errored,
                        "internal error: confirmation gate failure".to_string(),
                    );
                }
            };

            emit(
                event_tx,
                RunEvent::ConfirmationRequested {
                    call_id: call.id.clone(),
                    tool: call.name.clone(),
                    arguments: call.arguments.clone(),
                    prompt: request.prompt,
                },
            );

            state.pending_call = Some(call.id.clone());
            let decision = self.gate.await_decision(receiver).await;
            state.pending_call = None;

            match decision {
                Decision::Approved => {
                    emit(
                        event_tx,
                        RunEvent::ConfirmationResolved {
                            call_id: call.id.clone(),
                            approved: true,
                            reason: None,
                        },
                    );
                }
                Decision::Denied(reason) => {
                    emit(
                        event_tx,
                        RunEvent::ConfirmationResolved {
                            call_id: call.id.clone(),
                            approved: false,
                            reason: Some(reason.as_str().to_string()),
                        },
                    );
                    // Remaining calls in this turn are never confirmed.
                    return TurnFlow::Stop(RunOutcome::Cancelled, "Cancelled by user.".to_string());
                }
            }

            let start = Instant::now();
            let ctx = ToolContext::new(cancellation.clone());
            let result = self
                .registry
                .execute(&call.name, call.arguments.clone(), &ctx)
                .await;
            let duration_ms = start.elapsed().as_millis() as u64;

            if result.is_error {
                tracing::warn!(run_id = %state.run_id, tool = %call.name, output = %result.output, "tool failed");
            }

            emit(
                event_tx,
                RunEvent::ToolCallFinished {
                    call_id: call.id.clone(),
                    tool: call.name.clone(),
                    output: result.output.clone(),
                    is_error: result.is_error,
                    duration_ms,
                },
            );

            // Tool failures are folded into the conversation so the
            // model can self-correct; they never end the run.
            if let Err(e) = state
                .thread
                .push_tool_result(call.id.as_str(), result.output.as_str())
            {
                tracing::error!(run_id = %state.run_id, error = %e, "conversation linking violation");
                return TurnFlow::Stop(
                    RunOutcome::Errored,
                    "internal error: conversation linking violation".to_string(),
                );
            }

            // A successful terminal tool marks the run for completion,
            // but the remaining calls in this turn still drain first.
            if !result.is_error && self.registry.is_terminal(&call.name) {
                finish_summary = Some(result.output);
            }
        }

        match finish_summary {
            Some(summary) => TurnFlow::Finish(summary),
            None => TurnFlow::Continue,
        }
    }

    /// Run-end cleanup: a confirmation request that outlives its run is
    /// a leak and is reported as such.
    fn release(&self, state: &RunState) {
        if let Some(id) = &state.pending_call {
            if self.gate.abandon(id) {
                tracing::error!(run_id = %state.run_id, tool_call_id = %id, "confirmation request leaked past run end");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{event_channel, EventEnvelope};
    use crate::provider::{Completion, ProviderError};
    use crate::tool::{Tool, ToolDefinition, ToolResult};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted provider: pops one completion per call.
    struct ScriptedModel {
        script: Mutex<Vec<Result<Completion, ProviderError>>>,
        calls: AtomicUsize,
    }

    impl ScriptedModel {
        fn new(script: Vec<Result<Completion, ProviderError>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script),
                calls: AtomicUsize::new(0),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LanguageModel for ScriptedModel {
        async fn complete(
            &self,
            _messages: &[crate::message::Message],
            _tools: &[ToolDefinition],
        ) -> Result<Completion, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut script = self.script.lock();
            if script.is_empty() {
                return Err(ProviderError::InvalidResponse(
                    "script exhausted".to_string(),
                ));
            }
            script.remove(0)
        }
    }

    struct StubTool {
        name: &'static str,
        terminal: bool,
        invocations: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Tool for StubTool {
        fn name(&self) -> &str {
            self.name
        }

        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: self.name.to_string(),
                description: "stub".to_string(),
                parameters: json!({"type": "object", "properties": {}, "required": []}),
            }
        }

        fn terminal(&self) -> bool {
            self.terminal
        }

        async fn execute(&self, _args: serde_json::Value, _ctx: &ToolContext) -> ToolResult {
            self.invocations.fetch_add(1, Ordering::SeqCst);
            ToolResult::success(format!("{} ok", self.name))
        }
    }

    struct TestHarness {
        registry: ToolRegistry,
        list_invocations: Arc<AtomicUsize>,
        final_invocations: Arc<AtomicUsize>,
    }

    fn harness() -> TestHarness {
        let list_invocations = Arc::new(AtomicUsize::new(0));
        let final_invocations = Arc::new(AtomicUsize::new(0));
        let mut registry = ToolRegistry::new();
        registry.register(StubTool {
            name: "list_tables",
            terminal: false,
            invocations: list_invocations.clone(),
        });
        registry.register(StubTool {
            name: "run_final_sql_query",
            terminal: true,
            invocations: final_invocations.clone(),
        });
        TestHarness {
            registry,
            list_invocations,
            final_invocations,
        }
    }

    fn runner(provider: Arc<dyn LanguageModel>, registry: ToolRegistry) -> Runner {
        Runner::new(
            provider,
            registry,
            ConfirmationGate::new(),
            RunConfig {
                system_prompt: "sys".to_string(),
                max_loops: 8,
            },
        )
    }

    /// Resolves every confirmation with the scripted answers, in order.
    fn auto_confirm(gate: ConfirmationGate, answers: Vec<bool>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut answers = answers.into_iter();
            loop {
                let pending = gate.pending_ids();
                if let Some(id) = pending.first() {
                    let Some(answer) = answers.next() else { return };
                    gate.resolve(id, answer).unwrap();
                }
                tokio::time::sleep(std::time::Duration::from_millis(1)).await;
            }
        })
    }

    fn event_tags(events: &[EventEnvelope]) -> Vec<String> {
        events
            .iter()
            .map(|e| {
                serde_json::to_value(e).unwrap()["type"]
                    .as_str()
                    .unwrap()
                    .to_string()
            })
            .collect()
    }

    async fn collect(mut stream: crate::events::EventStream) -> Vec<EventEnvelope> {
        let mut events = Vec::new();
        while let Some(ev) = stream.recv().await {
            events.push(ev);
        }
        events
    }

    #[tokio::test]
    async fn test_scenario_approved_tool_then_text() {
        // "list my tables" -> list_tables proposed -> approved ->
        // executed -> plain text -> completed.
        let h = harness();
        let model = ScriptedModel::new(vec![
            Ok(Completion::tool_calls(vec![ToolCall::new(
                "call_1",
                "list_tables",
                json!({"reasoning": "see what exists"}),
            )])),
            Ok(Completion::text("You have two tables: users, orders.")),
        ]);
        let runner = runner(model.clone(), h.registry);
        let confirmer = auto_confirm(runner.gate().clone(), vec![true]);

        let (tx, stream) = event_channel();
        let report = runner
            .run("list my tables", &tx, CancellationToken::new())
            .await;
        drop(tx);
        confirmer.abort();

        assert_eq!(report.outcome, RunOutcome::Completed);
        assert_eq!(report.result, "You have two tables: users, orders.");
        assert_eq!(h.list_invocations.load(Ordering::SeqCst), 1);
        assert_eq!(model.call_count(), 2);
        assert!(runner.gate().pending_ids().is_empty());

        let events = collect(stream).await;
        assert_eq!(
            event_tags(&events),
            vec![
                "run_started",
                "tool_call_proposed",
                "confirmation_requested",
                "confirmation_resolved",
                "tool_call_finished",
                "text_content",
                "run_finished",
            ]
        );
    }

    #[tokio::test]
    async fn test_scenario_denied_final_query() {
        // Denial ends the run cancelled, the tool never executes, and no
        // further LLM call is made.
        let h = harness();
        let model = ScriptedModel::new(vec![Ok(Completion::tool_calls(vec![ToolCall::new(
            "call_1",
            "run_final_sql_query",
            json!({"reasoning": "ready", "sql_query": "DELETE FROM users"}),
        )]))]);
        let runner = runner(model.clone(), h.registry);
        let confirmer = auto_confirm(runner.gate().clone(), vec![false]);

        let (tx, stream) = event_channel();
        let report = runner.run("delete everything", &tx, CancellationToken::new()).await;
        drop(tx);
        confirmer.abort();

        assert_eq!(report.outcome, RunOutcome::Cancelled);
        assert_eq!(h.final_invocations.load(Ordering::SeqCst), 0);
        assert_eq!(model.call_count(), 1);

        let events = collect(stream).await;
        assert_eq!(
            event_tags(&events),
            vec![
                "run_started",
                "tool_call_proposed",
                "confirmation_requested",
                "confirmation_resolved",
                "run_finished",
            ]
        );
    }

    #[tokio::test]
    async fn test_scenario_two_calls_second_denied() {
        // First approved and executed, second denied: run cancelled, no
        // execution of the second, exactly two confirmations existed.
        let h = harness();
        let model = ScriptedModel::new(vec![Ok(Completion::tool_calls(vec![
            ToolCall::new("call_1", "list_tables", json!({"reasoning": "a"})),
            ToolCall::new(
                "call_2",
                "run_final_sql_query",
                json!({"reasoning": "b", "sql_query": "SELECT 1"}),
            ),
        ]))]);
        let runner = runner(model.clone(), h.registry);
        let confirmer = auto_confirm(runner.gate().clone(), vec![true, false]);

        let (tx, stream) = event_channel();
        let report = runner.run("query", &tx, CancellationToken::new()).await;
        drop(tx);
        confirmer.abort();

        assert_eq!(report.outcome, RunOutcome::Cancelled);
        assert_eq!(h.list_invocations.load(Ordering::SeqCst), 1);
        assert_eq!(h.final_invocations.load(Ordering::SeqCst), 0);

        let events = collect(stream).await;
        let confirmations = events
            .iter()
            .filter(|e| matches!(e.event, RunEvent::ConfirmationRequested { .. }))
            .count();
        assert_eq!(confirmations, 2);
    }

    #[tokio::test]
    async fn test_scenario_loop_ceiling() {
        // max_loops = 3, model always proposes a non-terminal call that
        // gets approved: after the 3rd LLM call the run ends
        // max-loops-reached without a 4th invocation.
        let h = harness();
        let script = (0..8)
            .map(|i| {
                Ok(Completion::tool_calls(vec![ToolCall::new(
                    format!("call_{}", i),
                    "list_tables",
                    json!({"reasoning": "again"}),
                )]))
            })
            .collect();
        let model = ScriptedModel::new(script);
        let runner = Runner::new(
            model.clone(),
            h.registry,
            ConfirmationGate::new(),
            RunConfig {
                system_prompt: "sys".to_string(),
                max_loops: 3,
            },
        );
        let confirmer = auto_confirm(runner.gate().clone(), vec![true; 8]);

        let (tx, _stream) = event_channel();
        let report = runner.run("loop forever", &tx, CancellationToken::new()).await;
        confirmer.abort();

        assert_eq!(report.outcome, RunOutcome::MaxLoopsReached);
        assert_eq!(report.loops, 3);
        assert_eq!(model.call_count(), 3);
        assert_eq!(h.list_invocations.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_scenario_provider_error_is_fatal() {
        let h = harness();
        let model = ScriptedModel::new(vec![Err(ProviderError::Transport(
            "connection refused".to_string(),
        ))]);
        let runner = runner(model, h.registry);

        let (tx, stream) = event_channel();
        let report = runner.run("anything", &tx, CancellationToken::new()).await;
        drop(tx);

        assert_eq!(report.outcome, RunOutcome::Errored);
        assert!(report.result.contains("connection refused"));
        assert_eq!(h.list_invocations.load(Ordering::SeqCst), 0);

        let events = collect(stream).await;
        assert_eq!(event_tags(&events), vec!["run_started", "run_error"]);
    }

    #[tokio::test]
    async fn test_terminal_tool_drains_rest_of_turn() {
        // Terminal tool first, non-terminal second: both are confirmed
        // and executed, then the run completes with the terminal output.
        let h = harness();
        let model = ScriptedModel::new(vec![Ok(Completion::tool_calls(vec![
            ToolCall::new(
                "call_1",
                "run_final_sql_query",
                json!({"reasoning": "done", "sql_query": "SELECT 1"}),
            ),
            ToolCall::new("call_2", "list_tables", json!({"reasoning": "extra"})),
        ]))]);
        let runner = runner(model.clone(), h.registry);
        let confirmer = auto_confirm(runner.gate().clone(), vec![true, true]);

        let (tx, _stream) = event_channel();
        let report = runner.run("final", &tx, CancellationToken::new()).await;
        confirmer.abort();

        assert_eq!(report.outcome, RunOutcome::Completed);
        assert_eq!(report.result, "run_final_sql_query ok");
        assert_eq!(h.final_invocations.load(Ordering::SeqCst), 1);
        assert_eq!(h.list_invocations.load(Ordering::SeqCst), 1);
        assert_eq!(model.call_count(), 1);
    }

    #[tokio::test]
    async fn test_unknown_tool_is_not_fatal() {
        // The model asks for a tool that does not exist; the failure is
        // surfaced as tool output and the run continues.
        let h = harness();
        let model = ScriptedModel::new(vec![
            Ok(Completion::tool_calls(vec![ToolCall::new(
                "call_1",
                "drop_database",
                json!({}),
            )])),
            Ok(Completion::text("That tool is not available.")),
        ]);
        let runner = runner(model.clone(), h.registry);
        let confirmer = auto_confirm(runner.gate().clone(), vec![true]);

        let (tx, _stream) = event_channel();
        let report = runner.run("drop it", &tx, CancellationToken::new()).await;
        confirmer.abort();

        assert_eq!(report.outcome, RunOutcome::Completed);
        assert_eq!(model.call_count(), 2);
        // The error result is linked into the thread as tool output
        let tool_msg = report
            .thread
            .messages
            .iter()
            .find_map(|m| match m {
                crate::message::Message::Tool { content, .. } => Some(content.clone()),
                _ => None,
            })
            .unwrap();
        assert!(tool_msg.contains("Unknown tool"));
    }

    #[tokio::test]
    async fn test_empty_completion_finishes_with_empty_message() {
        let h = harness();
        let model = ScriptedModel::new(vec![Ok(Completion::default())]);
        let runner = runner(model, h.registry);

        let (tx, stream) = event_channel();
        let report = runner.run("say nothing", &tx, CancellationToken::new()).await;
        drop(tx);

        assert_eq!(report.outcome, RunOutcome::Completed);
        assert_eq!(report.result, "");

        // No fabricated text event
        let events = collect(stream).await;
        assert_eq!(event_tags(&events), vec!["run_started", "run_finished"]);
    }

    #[tokio::test]
    async fn test_deadline_expiry_cancels_like_denial() {
        let h = harness();
        let model = ScriptedModel::new(vec![Ok(Completion::tool_calls(vec![ToolCall::new(
            "call_1",
            "list_tables",
            json!({"reasoning": "r"}),
        )]))]);
        let runner = Runner::new(
            model,
            h.registry,
            ConfirmationGate::with_deadline(std::time::Duration::from_millis(20)),
            RunConfig::default(),
        );

        let (tx, stream) = event_channel();
        let report = runner.run("slow human", &tx, CancellationToken::new()).await;
        drop(tx);

        assert_eq!(report.outcome, RunOutcome::Cancelled);
        assert_eq!(h.list_invocations.load(Ordering::SeqCst), 0);
        assert!(runner.gate().pending_ids().is_empty());

        let events = collect(stream).await;
        let resolved = events
            .iter()
            .find_map(|e| match &e.event {
                RunEvent::ConfirmationResolved { approved, reason, .. } => {
                    Some((*approved, reason.clone()))
                }
                _ => None,
            })
            .unwrap();
        assert_eq!(resolved, (false, Some("timeout".to_string())));
    }

    #[tokio::test]
    async fn test_snapshot_resume_reproposes_pending_call() {
        // A run snapshotted with an unanswered tool call picks it up on
        // resume: the call is confirmed and executed, then the loop
        // continues to the model.
        let h = harness();

        let mut thread = Thread::seeded("sys", "list my tables");
        thread.push_assistant_tool_calls(
            None,
            vec![ToolCall::new("call_1", "list_tables", json!({"reasoning": "r"}))],
        );
        let snapshot = RunSnapshot {
            run_id: Uuid::new_v4(),
            thread,
            loop_count: 1,
            pending_confirmation: Some("call_1".to_string()),
        };
        // Round trip through serde as a persistence stand-in
        let snapshot: RunSnapshot =
            serde_json::from_str(&serde_json::to_string(&snapshot).unwrap()).unwrap();

        let model = ScriptedModel::new(vec![Ok(Completion::text("done"))]);
        let runner = runner(model.clone(), h.registry);
        let confirmer = auto_confirm(runner.gate().clone(), vec![true]);

        let (tx, _stream) = event_channel();
        let report = runner.resume(snapshot, &tx, CancellationToken::new()).await;
        confirmer.abort();

        assert_eq!(report.outcome, RunOutcome::Completed);
        assert_eq!(h.list_invocations.load(Ordering::SeqCst), 1);
        assert_eq!(model.call_count(), 1);
        assert_eq!(report.loops, 2);
    }

    #[tokio::test]
    async fn test_external_cancellation_stops_run() {
        let h = harness();
        let model = ScriptedModel::new(vec![Ok(Completion::text("never seen"))]);
        let runner = runner(model.clone(), h.registry);

        let token = CancellationToken::new();
        token.cancel();
        let (tx, _stream) = event_channel();
        let report = runner.run("query", &tx, token).await;

        assert_eq!(report.outcome, RunOutcome::Cancelled);
        assert_eq!(model.call_count(), 0);
    }
}
