//! List tables tool - enumerates tables in the database

use super::session::SqlSession;
use crate::tool::{Tool, ToolContext, ToolDefinition, ToolResult};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
struct Args {
    reasoning: String,
}

pub struct ListTablesTool {
    session: SqlSession,
}

impl ListTablesTool {
    pub fn new(session: SqlSession) -> Self {
        Self { session }
    }
}

#[async_trait]
impl Tool for ListTablesTool {
    fn name(&self) -> &str {
        "list_tables"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "list_tables".to_string(),
            description: "Returns list of available tables in database".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "reasoning": {
                        "type": "string",
                        "description": "Why you need the table list"
                    }
                },
                "required": ["reasoning"]
            }),
        }
    }

    async fn execute(&self, args: serde_json::Value, _ctx: &ToolContext) -> ToolResult {
        let args: Args = match serde_json::from_value(args) {
            Ok(a) => a,
            Err(e) => return ToolResult::error(format!("Invalid arguments: {}", e)),
        };
        tracing::debug!(reasoning = %args.reasoning, "list_tables");

        match self
            .session
            .run("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
        {
            Ok(output) => ToolResult::success(output),
            Err(e) => ToolResult::error(format!("Error listing tables: {}", e)),
        }
    }
}
