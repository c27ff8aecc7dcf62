//! Sample table tool - returns a handful of rows from a table

use super::session::{is_safe_identifier, SqlSession};
use crate::tool::{Tool, ToolContext, ToolDefinition, ToolResult};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

const MAX_SAMPLE_SIZE: usize = 100;

#[derive(Debug, Deserialize)]
struct Args {
    reasoning: String,
    table_name: String,
    #[serde(default)]
    row_sample_size: Option<usize>,
}

pub struct SampleTableTool {
    session: SqlSession,
    default_sample_size: usize,
}

impl SampleTableTool {
    pub fn new(session: SqlSession, default_sample_size: usize) -> Self {
        Self {
            session,
            default_sample_size,
        }
    }
}

#[async_trait]
impl Tool for SampleTableTool {
    fn name(&self) -> &str {
        "sample_table"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "sample_table".to_string(),
            description: "Returns sample rows from specified table".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "reasoning": {
                        "type": "string",
                        "description": "Why you need sample data"
                    },
                    "table_name": {
                        "type": "string",
                        "description": "Name of the table to sample"
                    },
                    "row_sample_size": {
                        "type": "integer",
                        "description": "Number of rows to return (optional)"
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
        tracing::debug!(table = %args.table_name, reasoning = %args.reasoning, "sample_table");

        if !is_safe_identifier(&args.table_name) {
            return ToolResult::error(format!("Invalid table name: {}", args.table_name));
        }
        let limit = args
            .row_sample_size
            .unwrap_or(self.default_sample_size)
            .min(MAX_SAMPLE_SIZE);

        match self.session.run(&format!(
            "SELECT * FROM {} LIMIT {}",
            args.table_name, limit
        )) {
            Ok(output) => ToolResult::success(output),
            Err(e) => ToolResult::error(format!("Error sampling {}: {}", args.table_name, e)),
        }
    }
}
