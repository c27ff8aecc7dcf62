//! Test query tool - scratch SQL execution while the agent iterates

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

pub struct TestQueryTool {
    session: SqlSession,
}

impl TestQueryTool {
    pub fn new(session: SqlSession) -> Self {
        Self { session }
    }
}

#[async_trait]
impl Tool for TestQueryTool {
    fn name(&self) -> &str {
        "run_test_sql_query"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "run_test_sql_query".to_string(),
            description: "Tests a SQL query and returns results (only visible to agent)"
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "reasoning": {
                        "type": "string",
                        "description": "Why you are testing this query"
                    },
                    "sql_query": {
                        "type": "string",
                        "description": "The SQL query to test"
                    }
                },
                "required": ["reasoning", "sql_query"]
            }),
        }
    }

    async fn execute(&self, args: serde_json::Value, _ctx: &ToolContext) -> ToolResult {
        let args: Args = match serde_json::from_value(args) {
            Ok(a) => a,
            Err(e) => return ToolResult::error(format!("Invalid arguments: {}", e)),
        };
        tracing::debug!(sql = %args.sql_query, reasoning = %args.reasoning, "run_test_sql_query");

        match self.session.run(&args.sql_query) {
            Ok(output) => ToolResult::success(output),
            Err(e) => ToolResult::error(format!("Error executing test query: {}", e)),
        }
    }
}
