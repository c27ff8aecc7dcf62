//! Final query tool - the terminal step of a SQL session.
//!
//! Successful execution marks the run for completion; the engine still
//! drains any sibling calls from the same turn first.

use super::session::SqlSession;
use crate::tool::{Tool, ToolContext, ToolDefinition, ToolResult};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
struct Args {
    reasoning: String,
    sql_query: String,
}

pub struct FinalQueryTool {
    session: SqlSession,
}

impl FinalQueryTool {
    pub fn new(session: SqlSession) -> Self {
        Self { session }
    }
}

#[async_trait]
impl Tool for FinalQueryTool {
    fn name(&self) -> &str {
        "run_final_sql_query"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "run_final_sql_query".to_string(),
            description: "Runs the final validated SQL query and shows results to user"
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "reasoning": {
                        "type": "string",
                        "description": "Why this query answers the user's request"
                    },
                    "sql_query": {
                        "type": "string",
                        "description": "The final SQL query to run"
                    }
                },
                "required": ["reasoning", "sql_query"]
            }),
        }
    }

    fn terminal(&self) -> bool {
        true
    }

    async fn execute(&self, args: serde_json::Value, _ctx: &ToolContext) -> ToolResult {
        let args: Args = match serde_json::from_value(args) {
            Ok(a) => a,
            Err(e) => return ToolResult::error(format!("Invalid arguments: {}", e)),
        };
        tracing::info!(sql = %args.sql_query, reasoning = %args.reasoning, "final query");

        match self.session.run(&args.sql_query) {
            Ok(output) => ToolResult::success(output),
            Err(e) => ToolResult::error(format!("Error executing final query: {}", e)),
        }
    }
}
