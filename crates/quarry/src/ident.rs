//! Identifier escaping and alias-aware protection.
//!
//! This module owns the quoting rules shared by every clause accumulator:
//! per-segment identifier wrapping (idempotent: already-quoted input never
//! gains a second layer), alias tracking for `FROM`/`JOIN` expressions,
//! and the condition-key parser that decides once — at parse time — whether
//! a token carries a comparison operator.

use crate::dialect::Dialect;
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

/// Comparison operators and condition keywords that mark a token as a
/// rendered condition rather than a bare field or alias pair.
static CONDITION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(<=|>=|<>|!=|=|<|>|\bIS\s+(NOT\s+)?NULL\b|\bBETWEEN\b|\bLIKE\b|\bIN\s*\(|\bCASE\b|\bWHEN\b|\bTHEN\b)",
    )
    .expect("valid regex")
});

/// A trailing comparison operator on a where-key, e.g. `"age >"`.
static KEY_OP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<field>.+?)\s*(?P<op><=|>=|<>|!=|=|<|>)\s*$").expect("valid regex")
});

/// One `lhs op rhs` sub-condition with identifier-shaped operands.
static OPERAND_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?P<lhs>[^\s<>=!]+)\s*(?P<op><=|>=|<>|!=|=|<|>)\s*(?P<rhs>.+?)\s*$")
        .expect("valid regex")
});

/// Whole-word AND/OR boundaries inside a free-form condition string.
static BOOL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s+(AND|OR)\s+").expect("valid regex"));

/// An explicit `AS` alias suffix.
static AS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?P<main>.+?)\s+AS\s+(?P<alias>\S+)$").expect("valid regex")
});

/// Explicitly supplied table names for INSERT/UPDATE.
static TABLE_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9$_]+(\.[A-Za-z0-9$_]+)?$").expect("valid regex")
});

/// A function-call expression (`word(`).
static FUNC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)[a-z_][a-z0-9_]*\s*\(").expect("valid regex"));

/// A single-condition HAVING string: field, optional operator, and a
/// quoted-string / numeric / boolean right-hand side.
static HAVING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*(?P<field>[^\s<>=!,]+)\s*(?P<op><=|>=|<>|!=|=|<|>)?\s*(?P<rhs>'(?:[^']|'')*'|-?\d+(?:\.\d+)?|true|false)\s*$",
    )
    .expect("valid regex")
});

/// A where-key split into its field and (optional) trailing operator.
///
/// Produced once by [`parse_condition_key`]; downstream code never
/// re-sniffs the raw string for operators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ConditionKey {
    pub field: String,
    pub op: Option<String>,
}

/// Split a where-key such as `"age >"` into field and operator.
pub(crate) fn parse_condition_key(key: &str) -> ConditionKey {
    match KEY_OP_RE.captures(key.trim()) {
        Some(caps) => ConditionKey {
            field: caps["field"].to_string(),
            op: Some(caps["op"].to_string()),
        },
        None => ConditionKey {
            field: key.trim().to_string(),
            op: None,
        },
    }
}

/// Whether the token already reads as a rendered condition.
pub(crate) fn has_condition(token: &str) -> bool {
    CONDITION_RE.is_match(token)
}

/// Whether the expression contains a function call (`word(`).
pub(crate) fn contains_function_call(expr: &str) -> bool {
    FUNC_RE.is_match(expr)
}

/// Whether a caller-supplied table name is acceptable for INSERT/UPDATE.
pub(crate) fn valid_table_name(name: &str) -> bool {
    TABLE_NAME_RE.is_match(name)
}

/// Quote a single identifier or dotted path for the dialect.
///
/// `*` is preserved; function calls, string literals, and purely numeric
/// tokens pass through untouched. Each dot-segment is stripped of existing
/// quote characters and re-wrapped, so escaping is idempotent.
pub(crate) fn escape_identifier(dialect: &dyn Dialect, token: &str) -> String {
    let token = token.trim();
    if token.is_empty() || token == "*" {
        return token.to_string();
    }
    if token.contains('(') || token.starts_with('\'') {
        return token.to_string();
    }
    if token.bytes().all(|b| b.is_ascii_digit()) {
        return token.to_string();
    }

    let open = dialect.open_quote();
    let close = dialect.close_quote();
    token
        .split('.')
        .map(|seg| {
            let seg = seg.trim();
            if seg == "*" {
                return seg.to_string();
            }
            let bare: String = seg.chars().filter(|&c| c != open && c != close).collect();
            format!("{open}{bare}{close}")
        })
        .collect::<Vec<_>>()
        .join(".")
}

/// Strip dialect quote characters (and double quotes) from a token.
fn strip_quotes(dialect: &dyn Dialect, token: &str) -> String {
    let open = dialect.open_quote();
    let close = dialect.close_quote();
    token
        .chars()
        .filter(|&c| c != open && c != close && c != '"')
        .collect()
}

/// Record table aliases introduced by a `FROM`/`JOIN` expression.
///
/// Comma-delimited input recurses per piece; an `AS`-alias or a trailing
/// space-separated token is recorded (quote-stripped) if not yet present.
pub(crate) fn track_aliases(dialect: &dyn Dialect, aliases: &mut HashSet<String>, expr: &str) {
    if expr.contains(',') {
        for piece in expr.split(',') {
            track_aliases(dialect, aliases, piece);
        }
        return;
    }

    let expr = expr.trim();
    let normalized = match AS_RE.captures(expr) {
        Some(caps) => format!("{} {}", &caps["main"], &caps["alias"]),
        None => expr.to_string(),
    };
    if let Some(idx) = normalized.rfind(' ') {
        let alias = strip_quotes(dialect, normalized[idx + 1..].trim());
        if !alias.is_empty() {
            aliases.insert(alias);
        }
    }
}

/// Alias-aware identifier escaping for field and table expressions.
///
/// Opaque expressions (function calls, string literals) keep their text
/// and only a trailing alias is escaped. Otherwise an `AS`- or
/// space-separated alias is split off and escaped independently, and the
/// main token is escaped per dot-segment; a token that already reads as a
/// condition is left structurally alone.
pub(crate) fn protect_identifiers(
    dialect: &dyn Dialect,
    aliases: &HashSet<String>,
    token: &str,
    escape: bool,
) -> String {
    let token = token.trim();

    if token.contains('(') || token.contains('\'') {
        let Some(pos) = token.rfind(')') else {
            return token.to_string();
        };
        let (opaque, rest) = token.split_at(pos + 1);
        let rest = rest.trim();
        if rest.is_empty() {
            return token.to_string();
        }
        let alias = match rest.get(..3) {
            Some(prefix) if prefix.eq_ignore_ascii_case("as ") => rest[3..].trim(),
            _ => rest,
        };
        if !escape {
            return format!("{opaque} AS {alias}");
        }
        return format!("{opaque} AS {}", escape_identifier(dialect, alias));
    }

    let (main, alias, has_as) = split_alias(token);
    if alias.is_none() && has_condition(main) {
        // Already a rendered condition; leave it structurally alone.
        return main.to_string();
    }

    let main_sql = if !escape {
        main.to_string()
    } else if let Some((first, _)) = main.split_once('.') {
        if aliases.contains(&strip_quotes(dialect, first)) {
            // Alias-qualified path: each segment escaped on its own.
            main.split('.')
                .map(|seg| escape_identifier(dialect, seg))
                .collect::<Vec<_>>()
                .join(".")
        } else {
            escape_identifier(dialect, main)
        }
    } else {
        escape_identifier(dialect, main)
    };

    match alias {
        Some(a) => {
            let alias_sql = if escape {
                escape_identifier(dialect, a)
            } else {
                a.to_string()
            };
            let sep = if has_as { " AS " } else { " " };
            format!("{main_sql}{sep}{alias_sql}")
        }
        None => main_sql,
    }
}

/// Split a trailing alias off a token: returns (main, alias, had AS keyword).
///
/// Tokens that read as conditions are never treated as alias pairs.
fn split_alias(token: &str) -> (&str, Option<&str>, bool) {
    if let Some(caps) = AS_RE.captures(token) {
        let main = caps.name("main").expect("main group").as_str();
        let alias = caps.name("alias").expect("alias group").as_str();
        return (main, Some(alias), true);
    }
    if has_condition(token) {
        return (token, None, false);
    }
    match token.rfind(' ') {
        Some(idx) => (token[..idx].trim_end(), Some(token[idx + 1..].trim()), false),
        None => (token, None, false),
    }
}

/// Split a free-form condition on whole-word AND/OR boundaries.
///
/// Each piece is returned with the joiner that preceded it; the first
/// piece carries `None`.
pub(crate) fn split_boolean(cond: &str) -> Vec<(Option<String>, String)> {
    let mut parts = Vec::new();
    let mut last = 0;
    for m in BOOL_RE.find_iter(cond) {
        parts.push((&cond[last..m.start()], m.as_str().trim().to_uppercase()));
        last = m.end();
    }
    let tail = &cond[last..];

    let mut out = Vec::with_capacity(parts.len() + 1);
    let mut joiner = None;
    for (piece, next_joiner) in parts {
        out.push((joiner, piece.trim().to_string()));
        joiner = Some(next_joiner);
    }
    out.push((joiner, tail.trim().to_string()));
    out
}

/// Escape both operand sides of one `lhs op rhs` sub-condition.
///
/// The left side is always identifier-shaped; the right side passes
/// through when it is a numeric or string literal. Returns `None` when the
/// piece carries no comparison operator.
pub(crate) fn escape_operands(
    dialect: &dyn Dialect,
    aliases: &HashSet<String>,
    piece: &str,
) -> Option<String> {
    let caps = OPERAND_RE.captures(piece)?;
    let lhs = protect_identifiers(dialect, aliases, &caps["lhs"], true);
    let rhs = &caps["rhs"];
    let rhs_sql = if rhs.starts_with('\'') || crate::value::numeric_literal(rhs).is_some() {
        rhs.to_string()
    } else {
        protect_identifiers(dialect, aliases, rhs, true)
    };
    Some(format!("{lhs} {} {rhs_sql}", &caps["op"]))
}

/// Parse one HAVING condition with a literal right-hand side.
///
/// Returns (field, operator, rhs-literal); the operator defaults to `=`
/// upstream when absent.
pub(crate) fn parse_having(cond: &str) -> Option<(String, Option<String>, String)> {
    let caps = HAVING_RE.captures(cond)?;
    Some((
        caps["field"].to_string(),
        caps.name("op").map(|m| m.as_str().to_string()),
        caps["rhs"].to_string(),
    ))
}
