//! Relational dump engine
//!
//! Serializes a set of database tables into a textual script and reverses
//! such a script into executed statements.
//!
//! ## Script grammar
//!
//! For every table not in the exclude set, the script contains the table's
//! schema-definition statement followed by one `INSERT INTO "t" VALUES(..)`
//! statement per row, in source enumeration order. Statements end with the
//! terminator sequence `;\n`, which is also the split point on reverse.
//! `NULL` database values are emitted as the bare token `NULL`; every other
//! value is emitted as a double-quoted string literal.
//!
//! ## Escaping
//!
//! Embedded quote characters are doubled, and CR/LF bytes are spliced out
//! of the literal via `char(10)`/`char(13)` concatenation. No emitted value
//! can therefore contain a raw newline, which makes splitting on `;\n`
//! lossless even for values that contain the terminator sequence itself.
//!
//! ## Loading is not transactional
//!
//! `load` drops every existing non-excluded table, then executes each
//! statement independently: a failing statement is recorded and execution
//! continues, so one malformed statement does not abort an otherwise
//! recoverable restore. A crash mid-load leaves a mixed old/new schema;
//! this is an accepted trade-off for large heterogeneous dumps, not a bug.
//! Foreign-key enforcement is suspended around each statement because
//! insert order does not guarantee parent-before-child ordering.

use rusqlite::types::ValueRef;
use rusqlite::Connection;
use std::collections::HashSet;
use tracing::{debug, warn};

use crate::error::Result;
use crate::types::STATEMENT_TERMINATOR;

/// A database value at the dump boundary
///
/// The engine never needs full column typing; any non-null value is
/// carried as text and re-coerced by column affinity on insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowValue {
    /// SQL NULL, rendered as the bare token `NULL`
    Null,
    /// Any other value, rendered as an escaped string literal
    Text(String),
}

impl RowValue {
    /// Capture a raw column value in the tagged representation
    pub fn from_ref(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => RowValue::Null,
            ValueRef::Integer(i) => RowValue::Text(i.to_string()),
            ValueRef::Real(f) => RowValue::Text(f.to_string()),
            ValueRef::Text(t) => RowValue::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => RowValue::Text(String::from_utf8_lossy(b).into_owned()),
        }
    }

    /// Render the value as a script literal
    pub fn to_literal(&self) -> String {
        match self {
            RowValue::Null => "NULL".to_string(),
            RowValue::Text(text) => quote_text(text),
        }
    }
}

/// A generated dump script plus the tables it covers
#[derive(Debug, Clone)]
pub struct DumpScript {
    /// The script text
    pub text: String,
    /// Dumped table names in enumeration order
    pub tables: Vec<String>,
}

/// One statement that failed during a load
#[derive(Debug, Clone)]
pub struct StatementFailure {
    /// Full text of the failing statement
    pub statement: String,
    /// Database error message
    pub message: String,
}

/// Outcome of reversing a dump script
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    /// Tables dropped before execution began
    pub tables_dropped: Vec<String>,
    /// Statements that executed successfully
    pub statements_executed: usize,
    /// Statements that failed and were skipped
    pub failures: Vec<StatementFailure>,
    /// One line per significant step, oldest first
    pub actions: Vec<String>,
}

/// Serialize every table not in `excluded` into a dump script
///
/// Fails only if tables cannot be enumerated or read; this is a fatal
/// error for the surrounding snapshot.
pub fn dump(conn: &Connection, excluded: &HashSet<String>) -> Result<DumpScript> {
    let mut text = String::new();
    let mut dumped = Vec::new();

    for (table, schema) in list_tables(conn)? {
        if excluded.contains(&table) {
            debug!(table, "reserved table excluded from dump");
            continue;
        }
        text.push_str(&schema);
        text.push_str(";\n\n");

        let mut stmt = conn.prepare(&format!("SELECT * FROM {}", quote_ident(&table)))?;
        let columns = stmt.column_count();
        let mut rows = stmt.query([])?;
        let mut row_count = 0usize;
        while let Some(row) = rows.next()? {
            text.push_str("INSERT INTO ");
            text.push_str(&quote_ident(&table));
            text.push_str(" VALUES(");
            for index in 0..columns {
                if index > 0 {
                    text.push(',');
                }
                text.push_str(&RowValue::from_ref(row.get_ref(index)?).to_literal());
            }
            text.push_str(");\n");
            row_count += 1;
        }
        text.push('\n');
        debug!(table, rows = row_count, "dumped table");
        dumped.push(table);
    }

    Ok(DumpScript {
        text,
        tables: dumped,
    })
}

/// Reverse a dump script against the database
///
/// Drops every existing table not in `excluded` (restore replaces, never
/// merges), splits the script on the statement terminator, and executes
/// each remaining statement independently. Per-statement failures are
/// recorded in the report and execution continues.
pub fn load(conn: &Connection, script: &str, excluded: &HashSet<String>) -> Result<LoadReport> {
    let mut report = LoadReport::default();

    // Enumerating the current tables is the one fatal step of a load.
    for (table, _) in list_tables(conn)? {
        if excluded.contains(&table) {
            debug!(table, "reserved table preserved across restore");
            continue;
        }
        match conn.execute(&format!("DROP TABLE IF EXISTS {}", quote_ident(&table)), []) {
            Ok(_) => {
                report.actions.push(format!("Dropped table: {table}"));
                report.tables_dropped.push(table);
            }
            Err(e) => {
                warn!(table, error = %e, "failed to drop table");
                report
                    .actions
                    .push(format!("Error dropping table {table}: {e}"));
            }
        }
    }

    for fragment in script.split(STATEMENT_TERMINATOR) {
        let statement = fragment.trim();
        if statement.is_empty() {
            continue;
        }
        let _ = conn.execute_batch("PRAGMA foreign_keys = OFF");
        let outcome = conn.execute(statement, []);
        let _ = conn.execute_batch("PRAGMA foreign_keys = ON");
        match outcome {
            Ok(_) => {
                report.statements_executed += 1;
                report
                    .actions
                    .push(format!("Executed statement: {}", fragment_of(statement)));
            }
            Err(e) => {
                warn!(statement = %fragment_of(statement), error = %e, "statement failed");
                report.actions.push(format!(
                    "Error executing statement: {} - {e}",
                    fragment_of(statement)
                ));
                report.failures.push(StatementFailure {
                    statement: statement.to_string(),
                    message: e.to_string(),
                });
            }
        }
    }

    Ok(report)
}

/// Read a table back in the dump's tagged representation
///
/// Rows are returned in enumeration order, each as the ordered sequence of
/// its column values.
pub fn table_rows(conn: &Connection, table: &str) -> Result<Vec<Vec<RowValue>>> {
    let mut stmt = conn.prepare(&format!("SELECT * FROM {}", quote_ident(table)))?;
    let columns = stmt.column_count();
    let mut rows = stmt.query([])?;
    let mut result = Vec::new();
    while let Some(row) = rows.next()? {
        let mut values = Vec::with_capacity(columns);
        for index in 0..columns {
            values.push(RowValue::from_ref(row.get_ref(index)?));
        }
        result.push(values);
    }
    Ok(result)
}

/// Current user table names and their schema-definition statements, in
/// source enumeration order
fn list_tables(conn: &Connection) -> Result<Vec<(String, String)>> {
    let mut stmt = conn.prepare(
        "SELECT name, sql FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
    )?;
    let mut rows = stmt.query([])?;
    let mut tables = Vec::new();
    while let Some(row) = rows.next()? {
        let name: String = row.get(0)?;
        let schema: Option<String> = row.get(1)?;
        // Internal/shadow tables carry no schema text and are not dumped.
        if let Some(schema) = schema {
            tables.push((name, schema));
        }
    }
    Ok(tables)
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Render a text value as a double-quoted script literal
///
/// Quotes are doubled; CR/LF are spliced in through `char()` concatenation
/// so the emitted literal never contains a raw newline.
fn quote_text(value: &str) -> String {
    let mut literal = String::with_capacity(value.len() + 2);
    literal.push('"');
    for ch in value.chars() {
        match ch {
            '"' => literal.push_str("\"\""),
            '\n' => literal.push_str("\"||char(10)||\""),
            '\r' => literal.push_str("\"||char(13)||\""),
            other => literal.push(other),
        }
    }
    literal.push('"');
    literal
}

/// Single-line prefix of a statement for log lines
fn fragment_of(statement: &str) -> String {
    let flat: String = statement
        .chars()
        .map(|c| if c == '\n' { ' ' } else { c })
        .take(160)
        .collect();
    if statement.chars().count() > 160 {
        format!("{flat}...")
    } else {
        flat
    }
}
