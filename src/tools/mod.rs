//! SQL toolset.
//!
//! Five tools over one shared SQLite session: three read-only
//! exploration tools, a scratch query runner, and the terminal
//! `run_final_sql_query`. Every tool takes a `reasoning` argument so the
//! model's intent is visible to the confirming human.

mod describe_table;
mod final_query;
mod list_tables;
mod sample_table;
mod session;
mod test_query;

pub use describe_table::DescribeTableTool;
pub use final_query::FinalQueryTool;
pub use list_tables::ListTablesTool;
pub use sample_table::SampleTableTool;
pub use session::{is_safe_identifier, SqlSession};
pub use test_query::TestQueryTool;

use crate::tool::ToolRegistry;

/// Registry with the full SQL toolset over one session.
pub fn sql_toolset(session: SqlSession, row_sample_size: usize) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(ListTablesTool::new(session.clone()));
    registry.register(DescribeTableTool::new(session.clone()));
    registry.register(SampleTableTool::new(session.clone(), row_sample_size));
    registry.register(TestQueryTool::new(session.clone()));
    registry.register(FinalQueryTool::new(session));
    registry
}
