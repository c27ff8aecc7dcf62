//! Describe table tool - reports a table's column schema

use super::session::{is_safe_identifier, SqlSession};
use crate::tool::{Tool, ToolContext, ToolDefinition, ToolResult};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
struct Args {
    reasoning: String,
    table_name: String,
}

pub struct DescribeTableTool {
    session: SqlSession,
}

impl DescribeTableTool {
    pub fn new(session: SqlSession) -> Self {
        Self { session }
    }
}

#[async_trait]
impl Tool for DescribeTableTool {
    fn name(&self) -> &str {
        "describe_table"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "describe_table".to_string(),
            description: "Returns schema info for specified table".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "reasoning": {
                        "type": "string",
                        "description": "Why you need this table's schema"
                    },
                    "table_name": {
                        "type": "string",
                        "description": "Name of the table to describe"
                    }
                },
                "required": ["reasoning", "table_name"]
            }),
        }
    }

    async fn execute(&self, args: serde_json::Value, _ctx: &ToolContext) -> ToolResult {
        let args: Args = match serde_json::from_value(args) {
            Ok(a) => a,
            Err(e) => return ToolResult::error(format!("Invalid arguments: {}", e)),
        };
        tracing::debug!(table = %args.table_name, reasoning = %args.reasoning, "describe_table");

        // Table names are interpolated, not bound
        if !is_safe_identifier(&args.table_name) {
            return ToolResult::error(format!("Invalid table name: {}", args.table_name));
        }

        match self
            .session
            .run(&format!("PRAGMA table_info({})", args.table_name))
        {
            // A missing table yields an empty pragma result, not an error
            Ok(output) if output.ends_with("(0 rows)") => {
                ToolResult::error(format!("No such table: {}", args.table_name))
            }
            Ok(output) => ToolResult::success(output),
            Err(e) => ToolResult::error(format!("Error describing {}: {}", args.table_name, e)),
        }
    }
}
