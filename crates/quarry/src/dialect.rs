//! Dialect strategy: the syntax rules that distinguish one target
//! database's SQL from another's.
//!
//! The builder itself is dialect-agnostic; everything flavor-specific
//! (quote characters, paging syntax, random ordering, OUTPUT/IGNORE
//! support) funnels through this trait.

use crate::error::{QbError, QbResult};

/// MySQL's all-rows sentinel for `LIMIT offset, n` when no row cap was given.
const MYSQL_ALL_ROWS: &str = "18446744073709551615";

/// Syntax rules for one SQL flavor.
pub trait Dialect: std::fmt::Debug + Send + Sync {
    /// Short flavor name, e.g. `"mysql"`.
    fn name(&self) -> &'static str;

    /// Opening identifier-quote character.
    fn open_quote(&self) -> char;

    /// Closing identifier-quote character.
    fn close_quote(&self) -> char;

    /// Escape the inside of a string literal (single-quote doubling).
    fn escape_string(&self, raw: &str) -> String {
        raw.replace('\'', "''")
    }

    /// Token producing random ordering.
    fn random_order_token(&self) -> &'static str;

    /// Keyword spliced into `INSERT <kw> INTO` for ignore-duplicates mode,
    /// or `None` when the flavor has no such mode.
    fn insert_ignore_keyword(&self) -> Option<&'static str>;

    /// Leading keyword(s) of a TRUNCATE statement, including trailing space.
    fn truncate_keyword(&self) -> &'static str;

    /// Modifier placed directly after `SELECT [DISTINCT]`.
    fn select_modifier(&self, _limit: Option<u64>, _offset: Option<u64>) -> Option<String> {
        None
    }

    /// Paging clause appended after any ORDER BY clause.
    fn select_paging_tail(
        &self,
        limit: Option<u64>,
        offset: Option<u64>,
        has_order_by: bool,
    ) -> String;

    /// Modifier placed directly after `UPDATE`.
    fn update_modifier(&self, _limit: Option<u64>) -> Option<String> {
        None
    }

    /// Whether UPDATE statements take trailing ORDER BY / LIMIT clauses.
    fn update_takes_tails(&self) -> bool;

    /// Modifier placed directly after `DELETE`.
    fn delete_modifier(&self, _limit: Option<u64>) -> Option<String> {
        None
    }

    /// Paging clause appended to a DELETE statement.
    fn delete_paging_tail(&self, _limit: Option<u64>) -> String {
        String::new()
    }

    /// Validate that this flavor can express a DELETE with the given offset.
    fn check_delete_offset(&self, _offset: Option<u64>) -> QbResult<()> {
        Ok(())
    }

    /// Clause surfacing freshly written column values from INSERT/UPDATE,
    /// or `None` when the flavor (or an empty column list) has nothing to say.
    fn returning_clause(&self, _cols: &[String]) -> Option<String> {
        None
    }
}

/// MySQL-flavored syntax: backtick quoting, `LIMIT offset, n`, `RAND()`.
#[derive(Debug, Clone, Copy)]
pub struct MysqlDialect;

impl Dialect for MysqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn open_quote(&self) -> char {
        '`'
    }

    fn close_quote(&self) -> char {
        '`'
    }

    fn random_order_token(&self) -> &'static str {
        "RAND()"
    }

    fn insert_ignore_keyword(&self) -> Option<&'static str> {
        Some("IGNORE")
    }

    fn truncate_keyword(&self) -> &'static str {
        "TRUNCATE "
    }

    fn select_paging_tail(
        &self,
        limit: Option<u64>,
        offset: Option<u64>,
        _has_order_by: bool,
    ) -> String {
        match (limit, offset) {
            (Some(n), Some(o)) => format!(" LIMIT {o}, {n}"),
            (Some(n), None) => format!(" LIMIT {n}"),
            (None, Some(o)) => format!(" LIMIT {o}, {MYSQL_ALL_ROWS}"),
            (None, None) => String::new(),
        }
    }

    fn update_takes_tails(&self) -> bool {
        true
    }

    fn delete_paging_tail(&self, limit: Option<u64>) -> String {
        match limit {
            Some(n) => format!(" LIMIT {n}"),
            None => String::new(),
        }
    }
}

/// SQL-Server-flavored syntax: bracket quoting, `TOP`/`OFFSET … FETCH`,
/// `NEWID()`, `OUTPUT INSERTED.*`.
#[derive(Debug, Clone, Copy)]
pub struct MssqlDialect;

impl Dialect for MssqlDialect {
    fn name(&self) -> &'static str {
        "mssql"
    }

    fn open_quote(&self) -> char {
        '['
    }

    fn close_quote(&self) -> char {
        ']'
    }

    fn random_order_token(&self) -> &'static str {
        "NEWID()"
    }

    fn insert_ignore_keyword(&self) -> Option<&'static str> {
        None
    }

    fn truncate_keyword(&self) -> &'static str {
        "TRUNCATE TABLE "
    }

    fn select_modifier(&self, limit: Option<u64>, offset: Option<u64>) -> Option<String> {
        // TOP only applies when there is no offset; paging with an offset
        // goes through OFFSET ... FETCH instead.
        match (limit, offset) {
            (Some(n), None) => Some(format!("TOP ({n}) ")),
            _ => None,
        }
    }

    fn select_paging_tail(
        &self,
        limit: Option<u64>,
        offset: Option<u64>,
        has_order_by: bool,
    ) -> String {
        let Some(o) = offset else {
            return String::new();
        };
        // OFFSET requires an ORDER BY; synthesize a trivial one if the
        // query has none.
        let mut tail = if has_order_by {
            String::new()
        } else {
            " ORDER BY (SELECT NULL)".to_string()
        };
        tail.push_str(&format!(" OFFSET {o} ROWS"));
        if let Some(n) = limit {
            tail.push_str(&format!(" FETCH NEXT {n} ROWS ONLY"));
        }
        tail
    }

    fn update_modifier(&self, limit: Option<u64>) -> Option<String> {
        limit.map(|n| format!("TOP ({n}) "))
    }

    fn update_takes_tails(&self) -> bool {
        false
    }

    fn delete_modifier(&self, limit: Option<u64>) -> Option<String> {
        limit.map(|n| format!("TOP ({n}) "))
    }

    fn check_delete_offset(&self, offset: Option<u64>) -> QbResult<()> {
        if offset.is_some() {
            return Err(QbError::invalid_argument(
                "DELETE with an offset is not supported by the mssql dialect",
            ));
        }
        Ok(())
    }

    fn returning_clause(&self, cols: &[String]) -> Option<String> {
        if cols.is_empty() {
            return None;
        }
        let outputs: Vec<String> = cols.iter().map(|c| format!("INSERTED.{c}")).collect();
        Some(format!(" OUTPUT {}", outputs.join(", ")))
    }
}

/// The MySQL dialect singleton.
pub const MYSQL: &dyn Dialect = &MysqlDialect;

/// The SQL Server dialect singleton.
pub const MSSQL: &dyn Dialect = &MssqlDialect;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mysql_paging_forms() {
        assert_eq!(MYSQL.select_paging_tail(Some(5), None, false), " LIMIT 5");
        assert_eq!(
            MYSQL.select_paging_tail(Some(5), Some(10), false),
            " LIMIT 10, 5"
        );
        assert_eq!(
            MYSQL.select_paging_tail(None, Some(10), false),
            format!(" LIMIT 10, {MYSQL_ALL_ROWS}")
        );
        assert_eq!(MYSQL.select_paging_tail(None, None, true), "");
    }

    #[test]
    fn mssql_top_only_without_offset() {
        assert_eq!(
            MSSQL.select_modifier(Some(20), None).as_deref(),
            Some("TOP (20) ")
        );
        assert_eq!(MSSQL.select_modifier(Some(20), Some(10)), None);
    }

    #[test]
    fn mssql_offset_synthesizes_order_by() {
        assert_eq!(
            MSSQL.select_paging_tail(Some(20), Some(10), false),
            " ORDER BY (SELECT NULL) OFFSET 10 ROWS FETCH NEXT 20 ROWS ONLY"
        );
        assert_eq!(
            MSSQL.select_paging_tail(None, Some(10), true),
            " OFFSET 10 ROWS"
        );
    }

    #[test]
    fn mssql_rejects_delete_offset() {
        assert!(MSSQL.check_delete_offset(Some(1)).is_err());
        assert!(MSSQL.check_delete_offset(None).is_ok());
        assert!(MYSQL.check_delete_offset(Some(1)).is_ok());
    }

    #[test]
    fn string_escaping_doubles_quotes() {
        assert_eq!(MYSQL.escape_string("it's"), "it''s");
        assert_eq!(MSSQL.escape_string("O'Neil"), "O''Neil");
    }
}
