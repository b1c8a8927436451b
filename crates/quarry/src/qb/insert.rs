//! INSERT statement compilation, single-row and batched.

use crate::dialect::Dialect;
use crate::error::{QbError, QbResult};
use crate::ident::escape_identifier;
use crate::state::QueryState;
use crate::value::{Value, escape_value};

/// Compile the staged SET assignments into an INSERT statement.
pub(crate) fn compile_insert(
    dialect: &dyn Dialect,
    state: &QueryState,
    table_sql: &str,
    ignore: bool,
    suffix: Option<&str>,
) -> QbResult<String> {
    if state.set.is_empty() {
        return Err(QbError::compile(
            "insert requires at least one staged column: call set() or pass data",
        ));
    }

    let cols: Vec<&str> = state.set.iter().map(|e| e.key_sql.as_str()).collect();
    let vals: Vec<&str> = state.set.iter().map(|e| e.value_sql.as_str()).collect();

    let mut sql = insert_head(dialect, table_sql, &cols, ignore)?;
    if let Some(output) = dialect.returning_clause(&state.returning) {
        sql.push_str(&output);
    }
    sql.push_str(" VALUES (");
    sql.push_str(&vals.join(", "));
    sql.push(')');
    if let Some(suffix) = suffix {
        sql.push(' ');
        sql.push_str(suffix.trim());
    }
    Ok(sql)
}

/// Compile rows into chunked multi-row INSERT statements.
///
/// Every row must carry exactly the first row's column set; values are
/// rendered in the first row's column order.
pub(crate) fn compile_insert_batch(
    dialect: &dyn Dialect,
    table_sql: &str,
    rows: &[Vec<(&str, Value)>],
    ignore: bool,
    suffix: Option<&str>,
    batch_size: usize,
) -> QbResult<Vec<String>> {
    if rows.is_empty() {
        return Err(QbError::invalid_argument(
            "insert_batch requires at least one row",
        ));
    }
    let first_cols: Vec<&str> = rows[0].iter().map(|(k, _)| *k).collect();
    if first_cols.is_empty() {
        return Err(QbError::invalid_argument(
            "insert_batch rows cannot be empty",
        ));
    }
    for (i, row) in rows.iter().enumerate().skip(1) {
        if row.len() != first_cols.len() {
            return Err(QbError::invalid_argument(format!(
                "insert_batch row {i} has {} columns, expected {}",
                row.len(),
                first_cols.len()
            )));
        }
        for col in &first_cols {
            if !row.iter().any(|(k, _)| k == col) {
                return Err(QbError::invalid_argument(format!(
                    "insert_batch row {i} is missing column '{col}'"
                )));
            }
        }
    }

    let cols_sql: Vec<String> = first_cols
        .iter()
        .map(|c| escape_identifier(dialect, c))
        .collect();
    let cols_sql: Vec<&str> = cols_sql.iter().map(String::as_str).collect();

    let mut stmts = Vec::with_capacity(rows.len().div_ceil(batch_size));
    for chunk in rows.chunks(batch_size) {
        let mut tuples = Vec::with_capacity(chunk.len());
        for row in chunk {
            let mut vals = Vec::with_capacity(first_cols.len());
            for col in &first_cols {
                let value = row
                    .iter()
                    .find(|(k, _)| k == col)
                    .map(|(_, v)| v)
                    .expect("column presence validated above");
                vals.push(escape_value(dialect, value)?);
            }
            tuples.push(format!("({})", vals.join(", ")));
        }

        let mut sql = insert_head(dialect, table_sql, &cols_sql, ignore)?;
        sql.push_str(" VALUES ");
        sql.push_str(&tuples.join(", "));
        if let Some(suffix) = suffix {
            sql.push(' ');
            sql.push_str(suffix.trim());
        }
        stmts.push(sql);
    }
    Ok(stmts)
}

/// Render `INSERT [IGNORE] INTO <table> (<cols>)`.
fn insert_head(
    dialect: &dyn Dialect,
    table_sql: &str,
    cols: &[&str],
    ignore: bool,
) -> QbResult<String> {
    let mut sql = String::from("INSERT ");
    if ignore {
        match dialect.insert_ignore_keyword() {
            Some(kw) => {
                sql.push_str(kw);
                sql.push(' ');
            }
            None => {
                return Err(QbError::unsupported(format!(
                    "the {} dialect has no ignore-duplicates INSERT",
                    dialect.name()
                )));
            }
        }
    }
    sql.push_str("INTO ");
    sql.push_str(table_sql);
    sql.push_str(" (");
    sql.push_str(&cols.join(", "));
    sql.push(')');
    Ok(sql)
}
