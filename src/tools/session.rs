//! Shared SQLite session.
//!
//! One connection behind a mutex, cloned into every SQL tool. Query
//! results are rendered as plain text tables because they go straight
//! back to the LLM as tool output.

use parking_lot::Mutex;
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;

#[derive(Clone)]
pub struct SqlSession {
    conn: Arc<Mutex<Connection>>,
}

impl SqlSession {
    pub fn in_memory() -> Result<Self, rusqlite::Error> {
        Ok(Self {
            conn: Arc::new(Mutex::new(Connection::open_in_memory()?)),
        })
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            conn: Arc::new(Mutex::new(Connection::open(path)?)),
        })
    }

    /// Run one statement and render the outcome as text.
    ///
    /// Row-returning statements come back as a header line, one line per
    /// row, and a row count. Statements without a result set report the
    /// affected row count.
    pub fn run(&self, sql: &str) -> Result<String, rusqlite::Error> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(sql)?;

        if stmt.column_count() == 0 {
            let affected = stmt.execute([])?;
            return Ok(format!("OK ({} row{} affected)", affected, plural(affected)));
        }

        let columns: Vec<String> = stmt
            .column_names()
            .iter()
            .map(|name| name.to_string())
            .collect();
        let mut lines = vec![columns.join(" | ")];

        let mut rows = stmt.query([])?;
        let mut count = 0usize;
        while let Some(row) = rows.next()? {
            let mut cells = Vec::with_capacity(columns.len());
            for i in 0..columns.len() {
                cells.push(render_value(row.get_ref(i)?));
            }
            lines.push(cells.join(" | "));
            count += 1;
        }

        lines.push(format!("({} row{})", count, plural(count)));
        Ok(lines.join("\n"))
    }

    /// Run several statements at once. Used for seeding, not by tools.
    pub fn execute_batch(&self, sql: &str) -> Result<(), rusqlite::Error> {
        self.conn.lock().execute_batch(sql)
    }
}

fn render_value(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => "NULL".to_string(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(t) => String::from_utf8_lossy(t).into_owned(),
        ValueRef::Blob(b) => format!("<blob {} bytes>", b.len()),
    }
}

fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

/// A table name usable without quoting. SQL tools interpolate table
/// names, so anything else is rejected before it reaches the database.
pub fn is_safe_identifier(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
pub(crate) fn fixture_session() -> SqlSession {
    let session = SqlSession::in_memory().unwrap();
    session
        .execute_batch(
            "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL, age INTEGER);
             INSERT INTO users (name, age) VALUES ('alice', 34), ('bob', 28), ('carol', NULL);
             CREATE TABLE orders (id INTEGER PRIMARY KEY, user_id INTEGER, total REAL);
             INSERT INTO orders (user_id, total) VALUES (1, 19.99), (1, 5.00), (2, 42.50);",
        )
        .unwrap();
    session
}
