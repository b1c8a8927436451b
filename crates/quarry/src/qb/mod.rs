//! The chainable query-builder facade.
//!
//! One [`QueryBuilder`] owns one in-flight query: mutator methods append
//! pre-rendered clause fragments to the internal accumulators and return
//! `&mut Self` for chaining; terminal methods compile the accumulated
//! state into dialect-specific SQL, dispatch it through a [`Connection`],
//! and reset the accumulators. The `get_compiled_*`/`compile_*` family
//! compiles without executing or resetting.
//!
//! # Usage
//!
//! ```ignore
//! use quarry::{QueryBuilder, Value};
//!
//! let mut qb = QueryBuilder::mysql();
//! let rows = qb
//!     .select("id, name")?
//!     .where_("class", "M")?
//!     .order_by("name ASC")?
//!     .limit(10)?
//!     .get(&conn, Some("galaxies"))
//!     .await?;
//!
//! qb.set("name", "Milky Way")?
//!     .insert(&conn, Some("galaxies"), &[])
//!     .await?;
//! ```

mod delete;
mod insert;
mod select;
mod update;

#[cfg(test)]
mod tests;

use crate::client::{Connection, QueryResponse, Row};
use crate::dialect::{Dialect, MSSQL, MYSQL};
use crate::error::{QbError, QbResult};
use crate::ident;
use crate::state::{QueryState, SetEntry};
use crate::value::{Value, escape_value};

/// Which side(s) of a LIKE pattern receive a `%` wildcard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeSide {
    /// `%match%`
    Both,
    /// `%match`
    Before,
    /// `match%`
    After,
    /// `match`
    None,
}

/// Boolean joiner prefixed onto condition fragments after the first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Joiner {
    And,
    Or,
}

impl Joiner {
    fn as_str(self) -> &'static str {
        match self {
            Joiner::And => "AND",
            Joiner::Or => "OR",
        }
    }

    fn from_word(word: Option<&str>) -> Self {
        match word {
            Some("OR") => Joiner::Or,
            _ => Joiner::And,
        }
    }
}

/// Join directions accepted by [`QueryBuilder::join`].
const JOIN_DIRECTIONS: [&str; 6] = ["LEFT", "RIGHT", "OUTER", "INNER", "LEFT OUTER", "RIGHT OUTER"];

/// A fluent SQL query builder bound to one dialect.
///
/// The builder holds exactly one logical query at a time; every executing
/// terminal wipes the accumulators, keeping only the compiled SQL for
/// [`QueryBuilder::last_query`].
#[derive(Debug)]
pub struct QueryBuilder {
    dialect: &'static dyn Dialect,
    state: QueryState,
    last_query: Option<String>,
    batch_size: usize,
}

impl QueryBuilder {
    /// Rows per generated statement in `insert_batch`/`update_batch`.
    pub const DEFAULT_BATCH_SIZE: usize = 100;

    /// Create a builder for the given dialect.
    pub fn new(dialect: &'static dyn Dialect) -> Self {
        Self {
            dialect,
            state: QueryState::default(),
            last_query: None,
            batch_size: Self::DEFAULT_BATCH_SIZE,
        }
    }

    /// Create a MySQL-flavored builder.
    pub fn mysql() -> Self {
        Self::new(MYSQL)
    }

    /// Create a SQL-Server-flavored builder.
    pub fn mssql() -> Self {
        Self::new(MSSQL)
    }

    /// Override the batch chunk size (rows per generated statement).
    pub fn batch_size(&mut self, rows: usize) -> QbResult<&mut Self> {
        if rows == 0 {
            return Err(QbError::invalid_argument("batch size must be at least 1"));
        }
        self.batch_size = rows;
        Ok(self)
    }

    // ==================== Introspection ====================

    /// The most recently compiled SQL. Batch terminals join their
    /// statements with `"; "`.
    pub fn last_query(&self) -> Option<&str> {
        self.last_query.as_deref()
    }

    /// Render a value as a dialect-correct SQL literal.
    pub fn escape(&self, value: &Value) -> QbResult<String> {
        escape_value(self.dialect, value)
    }

    /// Quote an identifier (or dotted path) for the dialect.
    pub fn escape_id(&self, identifier: &str) -> String {
        ident::escape_identifier(self.dialect, identifier)
    }

    /// Wipe the accumulated query state without compiling anything.
    pub fn reset_query(&mut self) -> &mut Self {
        self.state.reset();
        self
    }

    fn protect(&self, token: &str, escape: bool) -> String {
        ident::protect_identifiers(self.dialect, &self.state.aliased_tables, token, escape)
    }

    // ==================== FROM / JOIN ====================

    /// Register one or more (comma-delimited) FROM tables.
    ///
    /// Aliases (`"universe u"`, `"galaxies AS g"`) are tracked so that
    /// later `alias.column` references escape correctly. Blank tokens are
    /// dropped.
    pub fn from(&mut self, tables: &str) -> &mut Self {
        for piece in tables.split(',') {
            let piece = piece.trim();
            if piece.is_empty() {
                continue;
            }
            ident::track_aliases(self.dialect, &mut self.state.aliased_tables, piece);
            let sql = self.protect(piece, true);
            self.state.from.push(sql);
        }
        self
    }

    /// Register FROM tables from a slice.
    pub fn from_tables(&mut self, tables: &[&str]) -> &mut Self {
        for t in tables {
            self.from(t);
        }
        self
    }

    /// Add a JOIN clause with an escaped relation.
    ///
    /// `direction` may be blank or one of LEFT/RIGHT/OUTER/INNER/
    /// LEFT OUTER/RIGHT OUTER (case-insensitive). A relation without a
    /// comparison operator renders as `USING (<col>)`.
    pub fn join(&mut self, table: &str, relation: &str, direction: &str) -> QbResult<&mut Self> {
        self.add_join(table, relation, direction, true)
    }

    /// Add a JOIN clause with the relation passed through verbatim.
    pub fn join_raw(&mut self, table: &str, relation: &str, direction: &str) -> QbResult<&mut Self> {
        self.add_join(table, relation, direction, false)
    }

    fn add_join(
        &mut self,
        table: &str,
        relation: &str,
        direction: &str,
        escape: bool,
    ) -> QbResult<&mut Self> {
        let table = table.trim();
        if table.is_empty() {
            return Err(QbError::invalid_argument("join table cannot be blank"));
        }
        let direction = normalize_direction(direction)?;
        if direction.is_some() && relation.trim().is_empty() {
            return Err(QbError::invalid_argument(
                "a join relation is required when a direction is given",
            ));
        }

        ident::track_aliases(self.dialect, &mut self.state.aliased_tables, table);
        let table_sql = self.protect(table, true);
        let relation_sql = if escape {
            self.render_relation(relation)
        } else {
            let relation = relation.trim();
            if relation.is_empty() {
                String::new()
            } else {
                format!(" ON {relation}")
            }
        };

        let mut fragment = String::new();
        if let Some(dir) = direction {
            fragment.push_str(&dir);
            fragment.push(' ');
        }
        fragment.push_str("JOIN ");
        fragment.push_str(&table_sql);
        fragment.push_str(&relation_sql);
        self.state.join.push(fragment);
        Ok(self)
    }

    /// Render a join relation, escaping identifier-shaped operands.
    fn render_relation(&self, relation: &str) -> String {
        let relation = relation.trim();
        if relation.is_empty() {
            return String::new();
        }

        let parts = ident::split_boolean(relation);
        if parts.len() > 1 {
            let mut out = String::from(" ON ");
            for (joiner, piece) in parts {
                if let Some(j) = joiner {
                    out.push(' ');
                    out.push_str(&j);
                    out.push(' ');
                }
                let rendered = ident::escape_operands(
                    self.dialect,
                    &self.state.aliased_tables,
                    &piece,
                )
                .unwrap_or(piece);
                out.push_str(&rendered);
            }
            return out;
        }

        match ident::escape_operands(self.dialect, &self.state.aliased_tables, relation) {
            Some(rendered) => format!(" ON {rendered}"),
            None => format!(
                " USING ({})",
                ident::escape_identifier(self.dialect, relation)
            ),
        }
    }

    // ==================== SELECT ====================

    /// Add SELECT columns from a (comma-delimited) string.
    ///
    /// Function-call expressions cannot be escaped; pass them through
    /// [`QueryBuilder::select_raw`] instead.
    pub fn select(&mut self, fields: &str) -> QbResult<&mut Self> {
        let fields = fields.trim();
        if fields.is_empty() {
            return Err(QbError::invalid_argument("select fields cannot be empty"));
        }
        if ident::contains_function_call(fields) {
            return Err(QbError::invalid_argument(
                "function calls cannot be escaped; use select_raw() for expressions",
            ));
        }
        for piece in fields.split(',') {
            let piece = piece.trim();
            if piece.is_empty() {
                continue;
            }
            let sql = self.protect(piece, true);
            self.state.select.push(sql);
        }
        Ok(self)
    }

    /// Add one SELECT expression verbatim (subqueries, aggregates).
    pub fn select_raw(&mut self, expr: &str) -> QbResult<&mut Self> {
        let expr = expr.trim();
        if expr.is_empty() {
            return Err(QbError::invalid_argument("select expression cannot be empty"));
        }
        self.state.select.push(expr.to_string());
        Ok(self)
    }

    /// Add SELECT columns from a slice.
    pub fn select_cols(&mut self, cols: &[&str]) -> QbResult<&mut Self> {
        for col in cols {
            self.select(col)?;
        }
        Ok(self)
    }

    /// Add `MIN(column) AS alias`; the alias defaults to the column's last
    /// dot-segment.
    pub fn select_min(&mut self, column: &str, alias: Option<&str>) -> QbResult<&mut Self> {
        self.select_aggregate("MIN", column, alias)
    }

    /// Add `MAX(column) AS alias`.
    pub fn select_max(&mut self, column: &str, alias: Option<&str>) -> QbResult<&mut Self> {
        self.select_aggregate("MAX", column, alias)
    }

    /// Add `AVG(column) AS alias`.
    pub fn select_avg(&mut self, column: &str, alias: Option<&str>) -> QbResult<&mut Self> {
        self.select_aggregate("AVG", column, alias)
    }

    /// Add `SUM(column) AS alias`.
    pub fn select_sum(&mut self, column: &str, alias: Option<&str>) -> QbResult<&mut Self> {
        self.select_aggregate("SUM", column, alias)
    }

    fn select_aggregate(
        &mut self,
        func: &str,
        column: &str,
        alias: Option<&str>,
    ) -> QbResult<&mut Self> {
        let column = column.trim();
        if column.is_empty() {
            return Err(QbError::invalid_argument(format!(
                "{func} requires a column name"
            )));
        }
        let alias = alias
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .unwrap_or_else(|| column.rsplit('.').next().unwrap_or(column));
        let col_sql = self.protect(column, true);
        // The alias is emitted as a literal token, not re-escaped.
        self.state.select.push(format!("{func}({col_sql}) AS {alias}"));
        Ok(self)
    }

    /// Mark the query `SELECT DISTINCT`.
    pub fn distinct(&mut self) -> &mut Self {
        self.state.distinct = true;
        self
    }

    // ==================== WHERE ====================

    /// Add an AND-joined condition: `key [op] value`.
    ///
    /// The key may carry a trailing comparison operator (`"age >"`);
    /// without one, `=` is implied. A NULL value renders `IS NULL`
    /// (`IS NOT NULL` for `!=`/`<>`).
    pub fn where_(&mut self, key: &str, value: impl Into<Value>) -> QbResult<&mut Self> {
        self.add_where(key, value.into(), Joiner::And, true)?;
        Ok(self)
    }

    /// Add an OR-joined condition.
    pub fn or_where(&mut self, key: &str, value: impl Into<Value>) -> QbResult<&mut Self> {
        self.add_where(key, value.into(), Joiner::Or, true)?;
        Ok(self)
    }

    /// Add an AND-joined condition without escaping the key.
    pub fn where_no_escape(&mut self, key: &str, value: impl Into<Value>) -> QbResult<&mut Self> {
        self.add_where(key, value.into(), Joiner::And, false)?;
        Ok(self)
    }

    /// Add AND-joined conditions from an ordered mapping.
    pub fn where_map(&mut self, pairs: &[(&str, Value)]) -> QbResult<&mut Self> {
        self.add_where_map(pairs, Joiner::And)
    }

    /// Add OR-joined conditions from an ordered mapping.
    pub fn or_where_map(&mut self, pairs: &[(&str, Value)]) -> QbResult<&mut Self> {
        self.add_where_map(pairs, Joiner::Or)
    }

    fn add_where_map(&mut self, pairs: &[(&str, Value)], joiner: Joiner) -> QbResult<&mut Self> {
        if pairs.is_empty() {
            return Err(QbError::invalid_argument("where mapping cannot be empty"));
        }
        for (key, value) in pairs {
            self.add_where(key, value.clone(), joiner, true)?;
        }
        Ok(self)
    }

    fn add_where(&mut self, key: &str, value: Value, joiner: Joiner, escape: bool) -> QbResult<()> {
        let key = key.trim();
        if key.is_empty() {
            return Err(QbError::invalid_argument("where key cannot be empty"));
        }

        let cond = ident::parse_condition_key(key);
        let field_sql = if escape {
            self.protect(&cond.field, true)
        } else {
            cond.field.clone()
        };

        let fragment = if value.is_null() {
            match cond.op.as_deref() {
                None | Some("=") => format!("{field_sql} IS NULL"),
                Some("!=") | Some("<>") => format!("{field_sql} IS NOT NULL"),
                Some(op) => {
                    return Err(QbError::invalid_argument(format!(
                        "cannot compare NULL with '{op}'"
                    )));
                }
            }
        } else {
            let op = cond.op.as_deref().unwrap_or("=");
            let value_sql = escape_value(self.dialect, &value)?;
            format!("{field_sql} {op} {value_sql}")
        };

        self.state.push_where(fragment, joiner.as_str());
        Ok(())
    }

    /// Add a free-form condition string, AND-joined.
    ///
    /// A string carrying a comparison operator and no parenthesis is split
    /// on whole-word ` AND `/` OR ` boundaries and fanned out into
    /// independently escaped fragments.
    pub fn where_cond(&mut self, cond: &str) -> QbResult<&mut Self> {
        self.add_where_cond(cond, Joiner::And)
    }

    /// Add a free-form condition string, OR-joined.
    pub fn or_where_cond(&mut self, cond: &str) -> QbResult<&mut Self> {
        self.add_where_cond(cond, Joiner::Or)
    }

    fn add_where_cond(&mut self, cond: &str, joiner: Joiner) -> QbResult<&mut Self> {
        let cond = cond.trim();
        if cond.is_empty() {
            return Err(QbError::invalid_argument("where condition cannot be empty"));
        }

        if !cond.contains('(') && ident::has_condition(cond) {
            let parts = ident::split_boolean(cond);
            if parts.len() > 1 {
                for (word, piece) in parts {
                    let piece_joiner = match word.as_deref() {
                        None => joiner,
                        other => Joiner::from_word(other),
                    };
                    self.push_condition_piece(&piece, piece_joiner);
                }
                return Ok(self);
            }
        }
        self.push_condition_piece(cond, joiner);
        Ok(self)
    }

    fn push_condition_piece(&mut self, piece: &str, joiner: Joiner) {
        let rendered = ident::escape_operands(self.dialect, &self.state.aliased_tables, piece)
            .unwrap_or_else(|| piece.trim().to_string());
        self.state.push_where(rendered, joiner.as_str());
    }

    /// Add `key IN (values…)`, AND-joined. An empty list is a no-op.
    pub fn where_in<V: Into<Value>>(&mut self, key: &str, values: Vec<V>) -> QbResult<&mut Self> {
        self.add_where_in(key, values, false, Joiner::And)?;
        Ok(self)
    }

    /// Add `key IN (values…)`, OR-joined.
    pub fn or_where_in<V: Into<Value>>(&mut self, key: &str, values: Vec<V>) -> QbResult<&mut Self> {
        self.add_where_in(key, values, false, Joiner::Or)?;
        Ok(self)
    }

    /// Add `key NOT IN (values…)`, AND-joined.
    pub fn where_not_in<V: Into<Value>>(&mut self, key: &str, values: Vec<V>) -> QbResult<&mut Self> {
        self.add_where_in(key, values, true, Joiner::And)?;
        Ok(self)
    }

    /// Add `key NOT IN (values…)`, OR-joined.
    pub fn or_where_not_in<V: Into<Value>>(
        &mut self,
        key: &str,
        values: Vec<V>,
    ) -> QbResult<&mut Self> {
        self.add_where_in(key, values, true, Joiner::Or)?;
        Ok(self)
    }

    fn add_where_in<V: Into<Value>>(
        &mut self,
        key: &str,
        values: Vec<V>,
        negate: bool,
        joiner: Joiner,
    ) -> QbResult<()> {
        let key = key.trim();
        if key.is_empty() {
            return Err(QbError::invalid_argument("where_in key cannot be empty"));
        }
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        if values.is_empty() {
            // Kept for compatibility: an empty list is silently ignored.
            return Ok(());
        }
        let mut literals = Vec::with_capacity(values.len());
        for v in &values {
            literals.push(escape_value(self.dialect, v)?);
        }
        let field_sql = self.protect(key, true);
        let op = if negate { "NOT IN" } else { "IN" };
        self.state
            .push_where(format!("{field_sql} {op} ({})", literals.join(", ")), joiner.as_str());
        Ok(())
    }

    // ==================== LIKE ====================

    /// Add `field LIKE '<pattern>'`, AND-joined.
    pub fn like(&mut self, field: &str, pattern: &str, side: LikeSide) -> QbResult<&mut Self> {
        self.add_like(field, pattern, side, false, Joiner::And)?;
        Ok(self)
    }

    /// Add `field LIKE '<pattern>'`, OR-joined.
    pub fn or_like(&mut self, field: &str, pattern: &str, side: LikeSide) -> QbResult<&mut Self> {
        self.add_like(field, pattern, side, false, Joiner::Or)?;
        Ok(self)
    }

    /// Add `field NOT LIKE '<pattern>'`, AND-joined.
    pub fn not_like(&mut self, field: &str, pattern: &str, side: LikeSide) -> QbResult<&mut Self> {
        self.add_like(field, pattern, side, true, Joiner::And)?;
        Ok(self)
    }

    /// Add `field NOT LIKE '<pattern>'`, OR-joined.
    pub fn or_not_like(&mut self, field: &str, pattern: &str, side: LikeSide) -> QbResult<&mut Self> {
        self.add_like(field, pattern, side, true, Joiner::Or)?;
        Ok(self)
    }

    fn add_like(
        &mut self,
        field: &str,
        pattern: &str,
        side: LikeSide,
        negate: bool,
        joiner: Joiner,
    ) -> QbResult<()> {
        let field = field.trim();
        if field.is_empty() {
            return Err(QbError::invalid_argument("like field cannot be empty"));
        }
        let text = self.dialect.escape_string(pattern);
        let rendered = match side {
            LikeSide::Both => format!("%{text}%"),
            LikeSide::Before => format!("%{text}"),
            LikeSide::After => format!("{text}%"),
            LikeSide::None => text,
        };
        let field_sql = self.protect(field, true);
        let not = if negate { " NOT" } else { "" };
        // The fragment is fully rendered here; no further escaping applies.
        self.state
            .push_where(format!("{field_sql}{not} LIKE '{rendered}'"), joiner.as_str());
        Ok(())
    }

    // ==================== GROUP BY / HAVING ====================

    /// Add GROUP BY fields from a (comma-delimited) string.
    pub fn group_by(&mut self, fields: &str) -> QbResult<&mut Self> {
        if fields.trim().is_empty() {
            return Err(QbError::invalid_argument("group_by fields cannot be empty"));
        }
        for piece in fields.split(',') {
            let piece = piece.trim();
            if piece.is_empty() {
                continue;
            }
            let sql = self.protect(piece, true);
            self.state.group_by.push(sql);
        }
        Ok(self)
    }

    /// Add GROUP BY fields from a slice.
    pub fn group_by_cols(&mut self, fields: &[&str]) -> QbResult<&mut Self> {
        for f in fields {
            self.group_by(f)?;
        }
        Ok(self)
    }

    /// Add an AND-joined HAVING condition: `key [op] value`.
    pub fn having(&mut self, key: &str, value: impl Into<Value>) -> QbResult<&mut Self> {
        self.add_having(key, value.into(), Joiner::And)?;
        Ok(self)
    }

    /// Add an OR-joined HAVING condition.
    pub fn or_having(&mut self, key: &str, value: impl Into<Value>) -> QbResult<&mut Self> {
        self.add_having(key, value.into(), Joiner::Or)?;
        Ok(self)
    }

    /// Add AND-joined HAVING conditions from an ordered mapping.
    pub fn having_map(&mut self, pairs: &[(&str, Value)]) -> QbResult<&mut Self> {
        if pairs.is_empty() {
            return Err(QbError::invalid_argument("having mapping cannot be empty"));
        }
        for (key, value) in pairs {
            self.add_having(key, value.clone(), Joiner::And)?;
        }
        Ok(self)
    }

    fn add_having(&mut self, key: &str, value: Value, joiner: Joiner) -> QbResult<()> {
        let key = key.trim();
        if key.is_empty() {
            return Err(QbError::invalid_argument("having key cannot be empty"));
        }
        let cond = ident::parse_condition_key(key);
        let field_sql = self.protect(&cond.field, true);
        let fragment = if value.is_null() {
            match cond.op.as_deref() {
                None | Some("=") => format!("{field_sql} IS NULL"),
                Some("!=") | Some("<>") => format!("{field_sql} IS NOT NULL"),
                Some(op) => {
                    return Err(QbError::invalid_argument(format!(
                        "cannot compare NULL with '{op}'"
                    )));
                }
            }
        } else {
            let op = cond.op.as_deref().unwrap_or("=");
            let value_sql = escape_value(self.dialect, &value)?;
            format!("{field_sql} {op} {value_sql}")
        };
        self.state.push_having(fragment, joiner.as_str());
        Ok(())
    }

    /// Add one free-text HAVING condition, AND-joined.
    ///
    /// The right-hand side must be a quoted string, a number, or a
    /// boolean; comma-separated multi-condition strings are rejected
    /// (use [`QueryBuilder::having_map`]).
    pub fn having_cond(&mut self, cond: &str) -> QbResult<&mut Self> {
        self.add_having_cond(cond, Joiner::And)
    }

    /// Add one free-text HAVING condition, OR-joined.
    pub fn or_having_cond(&mut self, cond: &str) -> QbResult<&mut Self> {
        self.add_having_cond(cond, Joiner::Or)
    }

    fn add_having_cond(&mut self, cond: &str, joiner: Joiner) -> QbResult<&mut Self> {
        let cond = cond.trim();
        if cond.is_empty() {
            return Err(QbError::invalid_argument("having condition cannot be empty"));
        }
        let Some((field, op, rhs)) = ident::parse_having(cond) else {
            if cond.contains(',') {
                return Err(QbError::invalid_argument(
                    "multiple having conditions must use the mapping form",
                ));
            }
            return Err(QbError::invalid_argument(format!(
                "could not parse having condition: {cond}"
            )));
        };
        let field_sql = self.protect(&field, true);
        let op = op.unwrap_or_else(|| "=".to_string());
        self.state
            .push_having(format!("{field_sql} {op} {rhs}"), joiner.as_str());
        Ok(self)
    }

    // ==================== ORDER BY ====================

    /// Add ORDER BY items from a (comma-delimited) string.
    ///
    /// Each item is `field` or `field ASC|DESC`; a `random`/`rand`/`rand()`
    /// item short-circuits to the dialect's random-ordering token and
    /// supersedes every other field in the same call.
    pub fn order_by(&mut self, fields: &str) -> QbResult<&mut Self> {
        if fields.trim().is_empty() {
            return Err(QbError::invalid_argument("order_by fields cannot be empty"));
        }
        let mut items = Vec::new();
        for piece in fields.split(',') {
            let piece = piece.trim();
            if piece.is_empty() {
                continue;
            }
            if is_random(piece) {
                self.state.order_by.push(self.dialect.random_order_token().to_string());
                return Ok(self);
            }
            let item = match piece.rsplit_once(' ') {
                Some((field, last)) => {
                    let dir = parse_direction(last)?.ok_or_else(|| {
                        QbError::invalid_argument(format!("invalid order direction: {last}"))
                    })?;
                    format!("{} {dir}", self.protect(field.trim_end(), true))
                }
                None => self.protect(piece, true),
            };
            items.push(item);
        }
        self.state.order_by.append(&mut items);
        Ok(self)
    }

    /// Add ORDER BY items with a shared direction.
    ///
    /// A `random` direction (or field) short-circuits to the dialect's
    /// random-ordering token; otherwise the direction must be ASC or DESC.
    pub fn order_by_dir(&mut self, fields: &str, direction: &str) -> QbResult<&mut Self> {
        if is_random(direction) || is_random(fields) {
            self.state.order_by.push(self.dialect.random_order_token().to_string());
            return Ok(self);
        }
        let dir = parse_direction(direction)?;
        if fields.trim().is_empty() {
            return Err(QbError::invalid_argument("order_by fields cannot be empty"));
        }
        for piece in fields.split(',') {
            let piece = piece.trim();
            if piece.is_empty() {
                continue;
            }
            let field_sql = self.protect(piece, true);
            match dir {
                Some(d) => self.state.order_by.push(format!("{field_sql} {d}")),
                None => self.state.order_by.push(field_sql),
            }
        }
        Ok(self)
    }

    // ==================== LIMIT / OFFSET ====================

    /// Cap the row count. Accepts a positive integer or digit-only string;
    /// a fresh limit clears any previously stored offset.
    pub fn limit(&mut self, n: impl Into<Value>) -> QbResult<&mut Self> {
        let n = parse_bound(n.into(), "limit")?;
        if n == 0 {
            return Err(QbError::invalid_argument("limit of zero is not allowed"));
        }
        self.state.limit = Some(n);
        self.state.offset = None;
        Ok(self)
    }

    /// Set limit and offset together.
    pub fn limit_offset(
        &mut self,
        n: impl Into<Value>,
        offset: impl Into<Value>,
    ) -> QbResult<&mut Self> {
        self.limit(n)?;
        self.offset(offset)
    }

    /// Set the pagination offset. Accepts a non-negative integer or
    /// digit-only string.
    pub fn offset(&mut self, n: impl Into<Value>) -> QbResult<&mut Self> {
        self.state.offset = Some(parse_bound(n.into(), "offset")?);
        Ok(self)
    }

    // ==================== SET ====================

    /// Stage a column assignment for INSERT/UPDATE.
    ///
    /// A second call against the same logical column overwrites the stored
    /// entry in place, preserving its position.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> QbResult<&mut Self> {
        let key = key.trim();
        if key.is_empty() {
            return Err(QbError::invalid_argument("set key cannot be empty"));
        }
        let value = value.into();
        let value_sql = escape_value(self.dialect, &value)?;
        let key_sql = self.protect(key, true);
        self.state.push_set(SetEntry {
            column: key.to_string(),
            key_sql,
            value_sql,
        });
        Ok(self)
    }

    /// Stage a raw expression assignment (`set_raw("count", "count + 1")`).
    pub fn set_raw(&mut self, key: &str, expr: &str) -> QbResult<&mut Self> {
        let key = key.trim();
        if key.is_empty() {
            return Err(QbError::invalid_argument("set key cannot be empty"));
        }
        let expr = expr.trim();
        if expr.is_empty() {
            return Err(QbError::invalid_argument("set expression cannot be empty"));
        }
        self.state.push_set(SetEntry {
            column: key.to_string(),
            key_sql: key.to_string(),
            value_sql: expr.to_string(),
        });
        Ok(self)
    }

    /// Stage assignments from an ordered mapping.
    pub fn set_map(&mut self, pairs: &[(&str, Value)]) -> QbResult<&mut Self> {
        if pairs.is_empty() {
            return Err(QbError::invalid_argument("set mapping cannot be empty"));
        }
        for (key, value) in pairs {
            self.set(key, value.clone())?;
        }
        Ok(self)
    }

    // ==================== RETURNING ====================

    /// Name columns to surface from INSERT (rendered as
    /// `OUTPUT INSERTED.col` by the mssql dialect; inert under mysql).
    pub fn returning(&mut self, cols: &str) -> &mut Self {
        for piece in cols.split(',') {
            let piece = piece.trim();
            if !piece.is_empty() {
                self.state.returning.push(piece.to_string());
            }
        }
        self
    }

    // ==================== Compile-only ====================

    /// Compile the accumulated SELECT without executing or resetting.
    pub fn get_compiled_select(&mut self, table: Option<&str>) -> QbResult<String> {
        let sql = self.build_select(table)?;
        self.last_query = Some(sql.clone());
        Ok(sql)
    }

    /// Compile the accumulated INSERT without executing or resetting.
    pub fn get_compiled_insert(&mut self, table: Option<&str>) -> QbResult<String> {
        let sql = self.build_insert(table, &[], false, None)?;
        self.last_query = Some(sql.clone());
        Ok(sql)
    }

    /// Compile the accumulated UPDATE without executing or resetting.
    pub fn get_compiled_update(&mut self, table: Option<&str>) -> QbResult<String> {
        let sql = self.build_update(table, &[])?;
        self.last_query = Some(sql.clone());
        Ok(sql)
    }

    /// Compile the accumulated DELETE without executing or resetting.
    pub fn get_compiled_delete(&mut self, table: Option<&str>) -> QbResult<String> {
        let sql = self.build_delete(table)?;
        self.last_query = Some(sql.clone());
        Ok(sql)
    }

    /// Alias for [`QueryBuilder::get_compiled_select`].
    pub fn compile_select(&mut self, table: Option<&str>) -> QbResult<String> {
        self.get_compiled_select(table)
    }

    /// Alias for [`QueryBuilder::get_compiled_insert`].
    pub fn compile_insert(&mut self, table: Option<&str>) -> QbResult<String> {
        self.get_compiled_insert(table)
    }

    /// Alias for [`QueryBuilder::get_compiled_update`].
    pub fn compile_update(&mut self, table: Option<&str>) -> QbResult<String> {
        self.get_compiled_update(table)
    }

    /// Alias for [`QueryBuilder::get_compiled_delete`].
    pub fn compile_delete(&mut self, table: Option<&str>) -> QbResult<String> {
        self.get_compiled_delete(table)
    }

    // ==================== Terminals ====================

    /// Compile and execute a SELECT, returning the result rows.
    pub async fn get(&mut self, conn: &impl Connection, table: Option<&str>) -> QbResult<Vec<Row>> {
        let sql = self.build_select(table)?;
        self.finish(&sql);
        self.dispatch_rows(conn, &sql).await
    }

    /// Merge a where-mapping, then compile and execute a SELECT.
    ///
    /// An empty mapping adds no conditions.
    pub async fn get_where(
        &mut self,
        conn: &impl Connection,
        table: Option<&str>,
        pairs: &[(&str, Value)],
    ) -> QbResult<Vec<Row>> {
        if !pairs.is_empty() {
            self.where_map(pairs)?;
        }
        self.get(conn, table).await
    }

    /// Compile and execute `SELECT COUNT(*) AS numrows`.
    ///
    /// Consumes FROM/JOIN/WHERE only; grouping, ordering, and paging
    /// accumulators do not apply.
    pub async fn count(&mut self, conn: &impl Connection, table: Option<&str>) -> QbResult<u64> {
        if let Some(t) = table {
            self.from(t);
        }
        let sql = select::compile_count(&self.state)?;
        self.finish(&sql);
        let rows = self.dispatch_rows(conn, &sql).await?;
        rows.first()
            .and_then(|row| row.get("numrows"))
            .and_then(|v| {
                v.as_u64()
                    .or_else(|| v.as_str().and_then(|s| s.parse().ok()))
            })
            .ok_or_else(|| QbError::execution("COUNT query returned no numrows column"))
    }

    /// Merge a data mapping, then compile and execute an INSERT.
    pub async fn insert(
        &mut self,
        conn: &impl Connection,
        table: Option<&str>,
        data: &[(&str, Value)],
    ) -> QbResult<QueryResponse> {
        let sql = self.build_insert(table, data, false, None)?;
        self.finish(&sql);
        self.dispatch_mutation(conn, &sql).await
    }

    /// Compile and execute an ignore-duplicates INSERT, with an optional
    /// trailing suffix (e.g. `ON DUPLICATE KEY UPDATE …`).
    pub async fn insert_ignore(
        &mut self,
        conn: &impl Connection,
        table: Option<&str>,
        data: &[(&str, Value)],
        suffix: Option<&str>,
    ) -> QbResult<QueryResponse> {
        let sql = self.build_insert(table, data, true, suffix)?;
        self.finish(&sql);
        self.dispatch_mutation(conn, &sql).await
    }

    /// Compile and execute a multi-row INSERT, chunked at the batch size.
    ///
    /// Every row must carry exactly the first row's column set. Chunks run
    /// strictly in sequence and the first failure aborts the run.
    pub async fn insert_batch(
        &mut self,
        conn: &impl Connection,
        table: Option<&str>,
        rows: &[Vec<(&str, Value)>],
    ) -> QbResult<QueryResponse> {
        let stmts = self.build_insert_batch(table, rows, false, None)?;
        self.finish_batch(&stmts);
        self.dispatch_batch(conn, &stmts).await
    }

    /// Ignore-duplicates variant of [`QueryBuilder::insert_batch`].
    pub async fn insert_batch_ignore(
        &mut self,
        conn: &impl Connection,
        table: Option<&str>,
        rows: &[Vec<(&str, Value)>],
    ) -> QbResult<QueryResponse> {
        let stmts = self.build_insert_batch(table, rows, true, None)?;
        self.finish_batch(&stmts);
        self.dispatch_batch(conn, &stmts).await
    }

    /// Merge a data mapping, then compile and execute an UPDATE.
    pub async fn update(
        &mut self,
        conn: &impl Connection,
        table: Option<&str>,
        data: &[(&str, Value)],
    ) -> QbResult<QueryResponse> {
        let sql = self.build_update(table, data)?;
        self.finish(&sql);
        self.dispatch_mutation(conn, &sql).await
    }

    /// Compile and execute a batched multi-row UPDATE keyed on `index_col`.
    ///
    /// Rows are chunked at the batch size; each chunk renders one
    /// `CASE WHEN` statement guarded by `WHERE [conditions AND] index IN
    /// (…)`. Chunks run strictly in sequence and the first failure aborts
    /// the run.
    pub async fn update_batch(
        &mut self,
        conn: &impl Connection,
        table: Option<&str>,
        rows: &[Vec<(&str, Value)>],
        index_col: &str,
    ) -> QbResult<QueryResponse> {
        let stmts = self.build_update_batch(table, rows, index_col)?;
        self.finish_batch(&stmts);
        self.dispatch_batch(conn, &stmts).await
    }

    /// Compile and execute a DELETE over the accumulated conditions.
    pub async fn delete(
        &mut self,
        conn: &impl Connection,
        table: Option<&str>,
    ) -> QbResult<QueryResponse> {
        let sql = self.build_delete(table)?;
        self.finish(&sql);
        self.dispatch_mutation(conn, &sql).await
    }

    /// Compile and execute `DELETE FROM <table>`, ignoring all other
    /// accumulators.
    pub async fn empty_table(
        &mut self,
        conn: &impl Connection,
        table: Option<&str>,
    ) -> QbResult<QueryResponse> {
        let table_sql = self.resolve_single_table(table)?;
        let sql = delete::compile_empty_table(&table_sql);
        self.finish(&sql);
        self.dispatch_mutation(conn, &sql).await
    }

    /// Compile and execute a TRUNCATE, ignoring all other accumulators.
    pub async fn truncate(
        &mut self,
        conn: &impl Connection,
        table: Option<&str>,
    ) -> QbResult<QueryResponse> {
        let table_sql = self.resolve_single_table(table)?;
        let sql = delete::compile_truncate(self.dialect, &table_sql);
        self.finish(&sql);
        self.dispatch_mutation(conn, &sql).await
    }

    // ==================== Build helpers ====================

    fn build_select(&mut self, table: Option<&str>) -> QbResult<String> {
        if let Some(t) = table {
            self.from(t);
        }
        select::compile_select(self.dialect, &self.state)
    }

    fn build_insert(
        &mut self,
        table: Option<&str>,
        data: &[(&str, Value)],
        ignore: bool,
        suffix: Option<&str>,
    ) -> QbResult<String> {
        for (key, value) in data {
            self.set(key, value.clone())?;
        }
        let table_sql = self.resolve_write_table(table)?;
        insert::compile_insert(self.dialect, &self.state, &table_sql, ignore, suffix)
    }

    fn build_insert_batch(
        &mut self,
        table: Option<&str>,
        rows: &[Vec<(&str, Value)>],
        ignore: bool,
        suffix: Option<&str>,
    ) -> QbResult<Vec<String>> {
        let table_sql = self.resolve_write_table(table)?;
        insert::compile_insert_batch(
            self.dialect,
            &table_sql,
            rows,
            ignore,
            suffix,
            self.batch_size,
        )
    }

    fn build_update(&mut self, table: Option<&str>, data: &[(&str, Value)]) -> QbResult<String> {
        for (key, value) in data {
            self.set(key, value.clone())?;
        }
        let table_sql = self.resolve_write_table(table)?;
        update::compile_update(self.dialect, &self.state, &table_sql)
    }

    fn build_update_batch(
        &mut self,
        table: Option<&str>,
        rows: &[Vec<(&str, Value)>],
        index_col: &str,
    ) -> QbResult<Vec<String>> {
        let table_sql = self.resolve_write_table(table)?;
        update::compile_update_batch(
            self.dialect,
            &self.state,
            &table_sql,
            rows,
            index_col,
            self.batch_size,
        )
    }

    fn build_delete(&mut self, table: Option<&str>) -> QbResult<String> {
        let table_sql = self.resolve_single_table(table)?;
        delete::compile_delete(self.dialect, &self.state, &table_sql)
    }

    /// Resolve the write target for INSERT/UPDATE: an explicit table must
    /// match the allowed name pattern; otherwise exactly one FROM table
    /// must have been registered.
    fn resolve_write_table(&mut self, table: Option<&str>) -> QbResult<String> {
        match table {
            Some(t) => {
                let t = t.trim();
                if !ident::valid_table_name(t) {
                    return Err(QbError::invalid_argument(format!(
                        "invalid table name: {t}"
                    )));
                }
                Ok(self.protect(t, true))
            }
            None => match self.state.from.len() {
                0 => Err(QbError::compile(
                    "no table specified: call from() or pass a table",
                )),
                1 => Ok(self.state.from[0].clone()),
                _ => Err(QbError::compile(
                    "exactly one table is required for this statement",
                )),
            },
        }
    }

    /// Resolve the target for DELETE/TRUNCATE: the first registered FROM
    /// table wins even if several were registered.
    fn resolve_single_table(&mut self, table: Option<&str>) -> QbResult<String> {
        if let Some(t) = table {
            self.from(t);
        }
        self.state
            .from
            .first()
            .cloned()
            .ok_or_else(|| QbError::compile("no table specified: call from() or pass a table"))
    }

    // ==================== Dispatch ====================

    /// Record the compiled SQL and wipe the accumulators.
    fn finish(&mut self, sql: &str) {
        self.last_query = Some(sql.to_string());
        self.state.reset();
    }

    fn finish_batch(&mut self, stmts: &[String]) {
        self.last_query = Some(stmts.join("; "));
        self.state.reset();
    }

    async fn dispatch_rows(&self, conn: &impl Connection, sql: &str) -> QbResult<Vec<Row>> {
        tracing::debug!(sql = %sql, "executing query");
        conn.execute(sql).await?.into_rows()
    }

    async fn dispatch_mutation(
        &self,
        conn: &impl Connection,
        sql: &str,
    ) -> QbResult<QueryResponse> {
        tracing::debug!(sql = %sql, "executing query");
        conn.execute(sql).await?.into_response()
    }

    /// Run batch statements strictly in sequence, aggregating the totals;
    /// the first failure aborts the run.
    async fn dispatch_batch(
        &self,
        conn: &impl Connection,
        stmts: &[String],
    ) -> QbResult<QueryResponse> {
        let mut total = QueryResponse::default();
        for sql in stmts {
            let resp = self.dispatch_mutation(conn, sql).await?;
            total.affected_rows += resp.affected_rows;
            total.changed_rows += resp.changed_rows;
            total.insert_id = resp.insert_id.or(total.insert_id);
        }
        Ok(total)
    }
}

/// Normalize and validate a join direction.
fn normalize_direction(direction: &str) -> QbResult<Option<String>> {
    let dir = direction.trim().to_uppercase();
    if dir.is_empty() {
        return Ok(None);
    }
    let dir = dir.split_whitespace().collect::<Vec<_>>().join(" ");
    if JOIN_DIRECTIONS.contains(&dir.as_str()) {
        Ok(Some(dir))
    } else {
        Err(QbError::invalid_argument(format!(
            "invalid join direction: {direction}"
        )))
    }
}

/// Parse an order direction: blank means unspecified.
fn parse_direction(direction: &str) -> QbResult<Option<&'static str>> {
    match direction.trim().to_uppercase().as_str() {
        "" => Ok(None),
        "ASC" => Ok(Some("ASC")),
        "DESC" => Ok(Some("DESC")),
        other => Err(QbError::invalid_argument(format!(
            "invalid order direction: {other}"
        ))),
    }
}

/// Whether the token requests random ordering.
fn is_random(token: &str) -> bool {
    matches!(
        token.trim().to_lowercase().as_str(),
        "random" | "rand" | "rand()"
    )
}

/// Validate a limit/offset argument: a non-negative integer or a
/// digit-only string.
fn parse_bound(value: Value, what: &str) -> QbResult<u64> {
    match value {
        Value::Int(n) if n >= 0 => Ok(n as u64),
        Value::Str(s) => {
            let t = s.trim();
            if !t.is_empty() && t.bytes().all(|b| b.is_ascii_digit()) {
                t.parse().map_err(|_| {
                    QbError::invalid_argument(format!("{what} is out of range: {t}"))
                })
            } else {
                Err(QbError::invalid_argument(format!(
                    "{what} must be a non-negative integer, got '{s}'"
                )))
            }
        }
        other => Err(QbError::invalid_argument(format!(
            "{what} must be a non-negative integer, got {other:?}"
        ))),
    }
}
