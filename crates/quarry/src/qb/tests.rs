//! Integration tests for the qb module.

use crate::client::{Connection, Payload, QueryResponse, Row};
use crate::error::{QbError, QbResult};
use crate::qb::{LikeSide, QueryBuilder};
use crate::value::Value;
use std::sync::Mutex;

/// Test double for the connection adapter: records every statement and
/// replays canned payloads.
struct MockConn {
    executed: Mutex<Vec<String>>,
    rows: Vec<Row>,
    row_mode: bool,
    fail_at: Option<usize>,
}

impl MockConn {
    fn mutations() -> Self {
        Self {
            executed: Mutex::new(Vec::new()),
            rows: Vec::new(),
            row_mode: false,
            fail_at: None,
        }
    }

    fn with_rows(rows: Vec<Row>) -> Self {
        Self {
            executed: Mutex::new(Vec::new()),
            rows,
            row_mode: true,
            fail_at: None,
        }
    }

    fn failing_at(index: usize) -> Self {
        Self {
            fail_at: Some(index),
            ..Self::mutations()
        }
    }

    fn log(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }
}

impl Connection for MockConn {
    async fn execute(&self, sql: &str) -> QbResult<Payload> {
        let index = {
            let mut log = self.executed.lock().unwrap();
            log.push(sql.to_string());
            log.len() - 1
        };
        if self.fail_at == Some(index) {
            return Err(QbError::execution("mock failure"));
        }
        if self.row_mode {
            Ok(Payload::Rows(self.rows.clone()))
        } else {
            Ok(Payload::Mutation(QueryResponse {
                insert_id: Some(1),
                affected_rows: 1,
                changed_rows: 1,
            }))
        }
    }
}

fn row(pairs: &[(&str, serde_json::Value)]) -> Row {
    let mut row = Row::new();
    for (k, v) in pairs {
        row.insert((*k).to_string(), v.clone());
    }
    row
}

// ==================== Escaping laws ====================

#[test]
fn test_escape_value_laws() {
    let qb = QueryBuilder::mysql();
    assert_eq!(qb.escape(&Value::Bool(true)).unwrap(), "1");
    assert_eq!(qb.escape(&Value::Bool(false)).unwrap(), "0");
    assert_eq!(qb.escape(&Value::from("3")).unwrap(), "3");
    assert_eq!(qb.escape(&Value::from("007")).unwrap(), "'007'");
}

#[test]
fn test_escape_id_idempotent() {
    let qb = QueryBuilder::mysql();
    let once = qb.escape_id("db.users");
    assert_eq!(once, "`db`.`users`");
    assert_eq!(qb.escape_id(&once), once);

    let qb = QueryBuilder::mssql();
    let once = qb.escape_id("db.users");
    assert_eq!(once, "[db].[users]");
    assert_eq!(qb.escape_id(&once), once);
}

// ==================== SELECT compilation ====================

#[test]
fn test_select_where_scenario() {
    let mut qb = QueryBuilder::mysql();
    let sql = qb
        .select_cols(&["id", "name"])
        .unwrap()
        .where_("class", "M")
        .unwrap()
        .get_compiled_select(Some("galaxies"))
        .unwrap();
    assert_eq!(sql, "SELECT `id`, `name` FROM `galaxies` WHERE `class` = 'M'");
}

#[test]
fn test_select_defaults_to_star() {
    let mut qb = QueryBuilder::mysql();
    let sql = qb.get_compiled_select(Some("planets")).unwrap();
    assert_eq!(sql, "SELECT * FROM `planets`");
}

#[test]
fn test_select_rejects_function_calls() {
    let mut qb = QueryBuilder::mysql();
    let err = qb.select("COUNT(id)").unwrap_err();
    assert!(err.is_invalid_argument());
    qb.select_raw("COUNT(id)").unwrap();
    let sql = qb.get_compiled_select(Some("planets")).unwrap();
    assert_eq!(sql, "SELECT COUNT(id) FROM `planets`");
}

#[test]
fn test_select_aggregates() {
    let mut qb = QueryBuilder::mysql();
    let sql = qb
        .select_max("planets.size", None)
        .unwrap()
        .select_avg("mass", Some("avg_mass"))
        .unwrap()
        .get_compiled_select(Some("planets"))
        .unwrap();
    assert_eq!(
        sql,
        "SELECT MAX(`planets`.`size`) AS size, AVG(`mass`) AS avg_mass FROM `planets`"
    );
}

#[test]
fn test_distinct() {
    let mut qb = QueryBuilder::mysql();
    let sql = qb
        .distinct()
        .select("class")
        .unwrap()
        .get_compiled_select(Some("galaxies"))
        .unwrap();
    assert_eq!(sql, "SELECT DISTINCT `class` FROM `galaxies`");
}

#[test]
fn test_missing_from_is_compile_error() {
    let mut qb = QueryBuilder::mysql();
    let err = qb.get_compiled_select(None).unwrap_err();
    assert!(err.is_compile());
}

// ==================== Alias tracking ====================

#[test]
fn test_alias_round_trip() {
    let mut qb = QueryBuilder::mysql();
    let sql = qb
        .from("universe u")
        .where_("u.name", "Earth")
        .unwrap()
        .get_compiled_select(None)
        .unwrap();
    assert_eq!(
        sql,
        "SELECT * FROM `universe` `u` WHERE `u`.`name` = 'Earth'"
    );
}

// ==================== WHERE ====================

#[test]
fn test_where_joiner_law() {
    let mut qb = QueryBuilder::mysql();
    let sql = qb
        .where_("a", 1)
        .unwrap()
        .or_where("b", 2)
        .unwrap()
        .where_("c", 3)
        .unwrap()
        .get_compiled_select(Some("t"))
        .unwrap();
    assert_eq!(sql, "SELECT * FROM `t` WHERE `a` = 1 OR `b` = 2 AND `c` = 3");
}

#[test]
fn test_where_key_carries_operator() {
    let mut qb = QueryBuilder::mysql();
    let sql = qb
        .where_("age >", 18)
        .unwrap()
        .where_("id !=", 7)
        .unwrap()
        .get_compiled_select(Some("users"))
        .unwrap();
    assert_eq!(sql, "SELECT * FROM `users` WHERE `age` > 18 AND `id` != 7");
}

#[test]
fn test_where_null_renders_is_null() {
    let mut qb = QueryBuilder::mysql();
    let sql = qb
        .where_("deleted_at", Value::Null)
        .unwrap()
        .where_("archived_at !=", Value::Null)
        .unwrap()
        .get_compiled_select(Some("users"))
        .unwrap();
    assert_eq!(
        sql,
        "SELECT * FROM `users` WHERE `deleted_at` IS NULL AND `archived_at` IS NOT NULL"
    );
}

#[test]
fn test_where_null_with_ordering_operator_is_error() {
    let mut qb = QueryBuilder::mysql();
    let err = qb.where_("age >", Value::Null).unwrap_err();
    assert!(err.is_invalid_argument());
}

#[test]
fn test_where_empty_key_is_error() {
    let mut qb = QueryBuilder::mysql();
    assert!(qb.where_("", 1).unwrap_err().is_invalid_argument());
    assert!(qb.where_map(&[]).unwrap_err().is_invalid_argument());
}

#[test]
fn test_where_map_preserves_order() {
    let mut qb = QueryBuilder::mysql();
    let sql = qb
        .where_map(&[("a", Value::from(1)), ("b", Value::from("x"))])
        .unwrap()
        .get_compiled_select(Some("t"))
        .unwrap();
    assert_eq!(sql, "SELECT * FROM `t` WHERE `a` = 1 AND `b` = 'x'");
}

#[test]
fn test_where_cond_fans_out() {
    let mut qb = QueryBuilder::mysql();
    let sql = qb
        .where_cond("a = 1 AND b = 2 OR c = 3")
        .unwrap()
        .get_compiled_select(Some("t"))
        .unwrap();
    assert_eq!(sql, "SELECT * FROM `t` WHERE `a` = 1 AND `b` = 2 OR `c` = 3");
}

#[test]
fn test_where_in_scenario() {
    let mut qb = QueryBuilder::mysql();
    let sql = qb
        .where_in("planet", vec!["Mercury", "Venus"])
        .unwrap()
        .get_compiled_select(Some("planets"))
        .unwrap();
    assert_eq!(
        sql,
        "SELECT * FROM `planets` WHERE `planet` IN ('Mercury', 'Venus')"
    );
}

#[test]
fn test_where_in_empty_is_noop() {
    let mut qb = QueryBuilder::mysql();
    let sql = qb
        .where_in::<i32>("x", vec![])
        .unwrap()
        .get_compiled_select(Some("t"))
        .unwrap();
    assert_eq!(sql, "SELECT * FROM `t`");
}

#[test]
fn test_where_not_in_and_joiners() {
    let mut qb = QueryBuilder::mysql();
    let sql = qb
        .where_("a", 1)
        .unwrap()
        .or_where_not_in("id", vec![5, 6])
        .unwrap()
        .get_compiled_select(Some("t"))
        .unwrap();
    assert_eq!(
        sql,
        "SELECT * FROM `t` WHERE `a` = 1 OR `id` NOT IN (5, 6)"
    );
}

// ==================== LIKE ====================

#[test]
fn test_like_sides() {
    let mut qb = QueryBuilder::mysql();
    let sql = qb
        .like("name", "way", LikeSide::Both)
        .unwrap()
        .or_like("name", "milky", LikeSide::After)
        .unwrap()
        .not_like("class", "M", LikeSide::None)
        .unwrap()
        .get_compiled_select(Some("galaxies"))
        .unwrap();
    assert_eq!(
        sql,
        "SELECT * FROM `galaxies` WHERE `name` LIKE '%way%' OR `name` LIKE 'milky%' AND `class` NOT LIKE 'M'"
    );
}

#[test]
fn test_like_doubles_quotes_in_match() {
    let mut qb = QueryBuilder::mysql();
    let sql = qb
        .like("name", "O'Neil", LikeSide::Before)
        .unwrap()
        .get_compiled_select(Some("people"))
        .unwrap();
    assert_eq!(sql, "SELECT * FROM `people` WHERE `name` LIKE '%O''Neil'");
}

// ==================== JOIN ====================

#[test]
fn test_join_escapes_operands() {
    let mut qb = QueryBuilder::mysql();
    let sql = qb
        .from("users u")
        .join("orders o", "u.id = o.user_id", "left")
        .unwrap()
        .get_compiled_select(None)
        .unwrap();
    assert_eq!(
        sql,
        "SELECT * FROM `users` `u` LEFT JOIN `orders` `o` ON `u`.`id` = `o`.`user_id`"
    );
}

#[test]
fn test_join_multi_condition_relation() {
    let mut qb = QueryBuilder::mysql();
    let sql = qb
        .from("users u")
        .join("orders o", "u.id = o.user_id AND o.open = 1", "inner")
        .unwrap()
        .get_compiled_select(None)
        .unwrap();
    assert_eq!(
        sql,
        "SELECT * FROM `users` `u` INNER JOIN `orders` `o` ON `u`.`id` = `o`.`user_id` AND `o`.`open` = 1"
    );
}

#[test]
fn test_join_without_operator_renders_using() {
    let mut qb = QueryBuilder::mysql();
    let sql = qb
        .from("users")
        .join("orders", "user_id", "")
        .unwrap()
        .get_compiled_select(None)
        .unwrap();
    assert_eq!(sql, "SELECT * FROM `users` JOIN `orders` USING (`user_id`)");
}

#[test]
fn test_join_validation() {
    let mut qb = QueryBuilder::mysql();
    assert!(qb.join("", "a = b", "left").unwrap_err().is_invalid_argument());
    assert!(qb.join("orders", "a = b", "sideways").unwrap_err().is_invalid_argument());
    assert!(qb.join("orders", "", "left").unwrap_err().is_invalid_argument());
    // Blank direction with a blank relation is a bare JOIN.
    qb.join("orders", "", "").unwrap();
}

#[test]
fn test_join_raw_passes_relation_verbatim() {
    let mut qb = QueryBuilder::mysql();
    let sql = qb
        .from("users")
        .join_raw("orders", "orders.user_id = users.id AND orders.total > 0", "left")
        .unwrap()
        .get_compiled_select(None)
        .unwrap();
    assert_eq!(
        sql,
        "SELECT * FROM `users` LEFT JOIN `orders` ON orders.user_id = users.id AND orders.total > 0"
    );
}

// ==================== GROUP BY / HAVING / ORDER BY ====================

#[test]
fn test_group_by_and_having() {
    let mut qb = QueryBuilder::mysql();
    let sql = qb
        .select_raw("class, COUNT(id) AS n")
        .unwrap()
        .group_by("class")
        .unwrap()
        .having("COUNT(id) >", 5)
        .unwrap()
        .get_compiled_select(Some("galaxies"))
        .unwrap();
    assert_eq!(
        sql,
        "SELECT class, COUNT(id) AS n FROM `galaxies` GROUP BY `class` HAVING COUNT(id) > 5"
    );
}

#[test]
fn test_having_cond_parse() {
    let mut qb = QueryBuilder::mysql();
    let sql = qb
        .having_cond("total >= 10")
        .unwrap()
        .or_having_cond("label = 'spiral'")
        .unwrap()
        .group_by("class")
        .unwrap()
        .get_compiled_select(Some("galaxies"))
        .unwrap();
    assert_eq!(
        sql,
        "SELECT * FROM `galaxies` GROUP BY `class` HAVING `total` >= 10 OR `label` = 'spiral'"
    );
}

#[test]
fn test_having_cond_rejects_multi_condition() {
    let mut qb = QueryBuilder::mysql();
    let err = qb.having_cond("a = 1, b = 2").unwrap_err();
    assert!(err.is_invalid_argument());
}

#[test]
fn test_or_having_and_mapping_form() {
    let mut qb = QueryBuilder::mysql();
    let sql = qb
        .having_map(&[("total >", Value::from(10)), ("kind", Value::from("gas"))])
        .unwrap()
        .or_having("moons >=", 2)
        .unwrap()
        .group_by_cols(&["kind"])
        .unwrap()
        .get_compiled_select(Some("planets"))
        .unwrap();
    assert_eq!(
        sql,
        "SELECT * FROM `planets` GROUP BY `kind` \
         HAVING `total` > 10 AND `kind` = 'gas' OR `moons` >= 2"
    );
}

#[test]
fn test_order_by_directions() {
    let mut qb = QueryBuilder::mysql();
    let sql = qb
        .order_by("name DESC, id")
        .unwrap()
        .order_by_dir("mass", "asc")
        .unwrap()
        .get_compiled_select(Some("planets"))
        .unwrap();
    assert_eq!(
        sql,
        "SELECT * FROM `planets` ORDER BY `name` DESC, `id`, `mass` ASC"
    );
}

#[test]
fn test_order_by_random_tokens() {
    let mut qb = QueryBuilder::mysql();
    let sql = qb
        .order_by("rand()")
        .unwrap()
        .get_compiled_select(Some("planets"))
        .unwrap();
    assert_eq!(sql, "SELECT * FROM `planets` ORDER BY RAND()");

    let mut qb = QueryBuilder::mssql();
    let sql = qb
        .order_by_dir("name", "random")
        .unwrap()
        .get_compiled_select(Some("planets"))
        .unwrap();
    assert_eq!(sql, "SELECT * FROM [planets] ORDER BY NEWID()");
}

#[test]
fn test_order_by_random_supersedes_call_siblings() {
    let mut qb = QueryBuilder::mysql();
    let sql = qb
        .order_by("name ASC, rand(), mass DESC")
        .unwrap()
        .get_compiled_select(Some("planets"))
        .unwrap();
    assert_eq!(sql, "SELECT * FROM `planets` ORDER BY RAND()");
}

#[test]
fn test_order_by_invalid_direction() {
    let mut qb = QueryBuilder::mysql();
    assert!(qb.order_by("name sideways").unwrap_err().is_invalid_argument());
    assert!(qb.order_by_dir("name", "up").unwrap_err().is_invalid_argument());
}

// ==================== LIMIT / OFFSET ====================

#[test]
fn test_limit_validation() {
    let mut qb = QueryBuilder::mysql();
    assert!(qb.limit(0).unwrap_err().is_invalid_argument());
    assert!(qb.limit(2.5).unwrap_err().is_invalid_argument());
    assert!(qb.limit(true).unwrap_err().is_invalid_argument());
    assert!(qb.limit("ten").unwrap_err().is_invalid_argument());
    qb.limit(" 10 ").unwrap();
    let sql = qb.get_compiled_select(Some("t")).unwrap();
    assert_eq!(sql, "SELECT * FROM `t` LIMIT 10");
}

#[test]
fn test_fresh_limit_clears_offset() {
    let mut qb = QueryBuilder::mysql();
    qb.offset(40).unwrap();
    qb.limit(10).unwrap();
    let sql = qb.get_compiled_select(Some("t")).unwrap();
    assert_eq!(sql, "SELECT * FROM `t` LIMIT 10");
}

#[test]
fn test_mysql_limit_offset() {
    let mut qb = QueryBuilder::mysql();
    let sql = qb
        .limit_offset(20, 10)
        .unwrap()
        .get_compiled_select(Some("galaxies"))
        .unwrap();
    assert_eq!(sql, "SELECT * FROM `galaxies` LIMIT 10, 20");
}

#[test]
fn test_mssql_paging_scenario() {
    let mut qb = QueryBuilder::mssql();
    let sql = qb
        .limit_offset(20, 10)
        .unwrap()
        .get_compiled_select(Some("galaxies"))
        .unwrap();
    assert_eq!(
        sql,
        "SELECT * FROM [galaxies] ORDER BY (SELECT NULL) OFFSET 10 ROWS FETCH NEXT 20 ROWS ONLY"
    );
}

#[test]
fn test_mssql_top_without_offset() {
    let mut qb = QueryBuilder::mssql();
    let sql = qb
        .limit(20)
        .unwrap()
        .get_compiled_select(Some("galaxies"))
        .unwrap();
    assert_eq!(sql, "SELECT TOP (20) * FROM [galaxies]");
}

#[test]
fn test_mssql_offset_respects_existing_order() {
    let mut qb = QueryBuilder::mssql();
    let sql = qb
        .order_by("name ASC")
        .unwrap()
        .limit_offset(20, 10)
        .unwrap()
        .get_compiled_select(Some("galaxies"))
        .unwrap();
    assert_eq!(
        sql,
        "SELECT * FROM [galaxies] ORDER BY [name] ASC OFFSET 10 ROWS FETCH NEXT 20 ROWS ONLY"
    );
}

// ==================== SET / INSERT / UPDATE ====================

#[test]
fn test_set_overwrites_in_place() {
    let mut qb = QueryBuilder::mysql();
    qb.set("a", 1).unwrap();
    qb.set("b", 2).unwrap();
    qb.set("a", 9).unwrap();
    let sql = qb.get_compiled_insert(Some("t")).unwrap();
    assert_eq!(sql, "INSERT INTO `t` (`a`, `b`) VALUES (9, 2)");
}

#[test]
fn test_set_raw_shares_the_logical_slot() {
    let mut qb = QueryBuilder::mysql();
    qb.set("count", 1).unwrap();
    qb.set_raw("count", "count + 1").unwrap();
    let sql = qb.get_compiled_update(Some("stats")).unwrap();
    assert_eq!(sql, "UPDATE `stats` SET count = count + 1");
}

#[test]
fn test_update_compile_with_tails() {
    let mut qb = QueryBuilder::mysql();
    let sql = qb
        .set("name", "x")
        .unwrap()
        .where_("id", 3)
        .unwrap()
        .order_by("id ASC")
        .unwrap()
        .limit(1)
        .unwrap()
        .get_compiled_update(Some("galaxies"))
        .unwrap();
    assert_eq!(
        sql,
        "UPDATE `galaxies` SET `name` = 'x' WHERE `id` = 3 ORDER BY `id` ASC LIMIT 1"
    );
}

#[test]
fn test_mssql_update_uses_top() {
    let mut qb = QueryBuilder::mssql();
    let sql = qb
        .set("name", "x")
        .unwrap()
        .where_("id", 3)
        .unwrap()
        .limit(1)
        .unwrap()
        .get_compiled_update(Some("galaxies"))
        .unwrap();
    assert_eq!(
        sql,
        "UPDATE TOP (1) [galaxies] SET [name] = 'x' WHERE [id] = 3"
    );
}

#[test]
fn test_update_without_set_is_compile_error() {
    let mut qb = QueryBuilder::mysql();
    let err = qb.get_compiled_update(Some("t")).unwrap_err();
    assert!(err.is_compile());
}

#[test]
fn test_insert_table_name_validation() {
    let mut qb = QueryBuilder::mysql();
    qb.set("a", 1).unwrap();
    let err = qb.get_compiled_insert(Some("bad name")).unwrap_err();
    assert!(err.is_invalid_argument());
    let sql = qb.get_compiled_insert(Some("db.t")).unwrap();
    assert_eq!(sql, "INSERT INTO `db`.`t` (`a`) VALUES (1)");
}

#[test]
fn test_mssql_insert_output() {
    let mut qb = QueryBuilder::mssql();
    let sql = qb
        .returning("id")
        .set("name", "Andromeda")
        .unwrap()
        .get_compiled_insert(Some("galaxies"))
        .unwrap();
    assert_eq!(
        sql,
        "INSERT INTO [galaxies] ([name]) OUTPUT INSERTED.id VALUES ('Andromeda')"
    );
}

#[test]
fn test_mysql_returning_is_inert() {
    let mut qb = QueryBuilder::mysql();
    let sql = qb
        .returning("id")
        .set("name", "Andromeda")
        .unwrap()
        .get_compiled_insert(Some("galaxies"))
        .unwrap();
    assert_eq!(sql, "INSERT INTO `galaxies` (`name`) VALUES ('Andromeda')");
}

#[test]
fn test_set_map_and_from_tables() {
    let mut qb = QueryBuilder::mysql();
    qb.from_tables(&["galaxies"]);
    let sql = qb
        .set_map(&[("id", Value::from(7)), ("name", Value::from("Sombrero"))])
        .unwrap()
        .get_compiled_insert(None)
        .unwrap();
    assert_eq!(
        sql,
        "INSERT INTO `galaxies` (`id`, `name`) VALUES (7, 'Sombrero')"
    );
}

#[test]
fn test_min_and_sum_aggregates() {
    let mut qb = QueryBuilder::mysql();
    let sql = qb
        .select_min("mass", None)
        .unwrap()
        .select_sum("moons", Some("moon_total"))
        .unwrap()
        .get_compiled_select(Some("planets"))
        .unwrap();
    assert_eq!(
        sql,
        "SELECT MIN(`mass`) AS mass, SUM(`moons`) AS moon_total FROM `planets`"
    );
}

#[test]
fn test_where_no_escape_and_or_variants() {
    let mut qb = QueryBuilder::mysql();
    let sql = qb
        .where_no_escape("YEAR(discovered)", 1923)
        .unwrap()
        .or_where_map(&[("kind", Value::from("spiral"))])
        .unwrap()
        .or_where_cond("mass > 100")
        .unwrap()
        .get_compiled_select(Some("galaxies"))
        .unwrap();
    assert_eq!(
        sql,
        "SELECT * FROM `galaxies` WHERE YEAR(discovered) = 1923 \
         OR `kind` = 'spiral' OR `mass` > 100"
    );
}

#[test]
fn test_compile_aliases_match() {
    let mut qb = QueryBuilder::mysql();
    qb.where_("id", 3).unwrap();
    let via_alias = qb.compile_select(Some("t")).unwrap();
    let via_long = qb.get_compiled_select(None).unwrap();
    assert_eq!(via_alias, via_long);

    qb.reset_query();
    qb.where_("id", 3).unwrap();
    let sql = qb.compile_delete(Some("t")).unwrap();
    assert_eq!(sql, "DELETE FROM `t` WHERE `id` = 3");
}

// ==================== Determinism / reset ====================

#[test]
fn test_compile_determinism() {
    let mut qb = QueryBuilder::mysql();
    let build = |qb: &mut QueryBuilder| -> String {
        qb.select("id, name")
            .unwrap()
            .where_("class", "M")
            .unwrap()
            .order_by("name ASC")
            .unwrap()
            .get_compiled_select(Some("galaxies"))
            .unwrap()
    };
    let first = build(&mut qb);
    qb.reset_query();
    let second = build(&mut qb);
    assert_eq!(first, second);
}

#[test]
fn test_compile_only_keeps_state() {
    let mut qb = QueryBuilder::mysql();
    qb.where_("a", 1).unwrap();
    let first = qb.get_compiled_select(Some("t")).unwrap();
    // State survives a compile-only call; compiling again reuses the
    // registered table and condition.
    let second = qb.get_compiled_select(None).unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_terminal_resets_state() {
    let conn = MockConn::with_rows(vec![]);
    let mut qb = QueryBuilder::mysql();
    qb.where_("a", 1).unwrap();
    qb.get(&conn, Some("t")).await.unwrap();
    assert_eq!(qb.last_query(), Some("SELECT * FROM `t` WHERE `a` = 1"));
    // A second compile sees a wiped builder.
    let err = qb.get_compiled_select(None).unwrap_err();
    assert!(err.is_compile());
}

// ==================== Execution ====================

#[tokio::test]
async fn test_get_returns_rows() {
    let conn = MockConn::with_rows(vec![row(&[("id", serde_json::json!(1))])]);
    let mut qb = QueryBuilder::mysql();
    let rows = qb.get(&conn, Some("planets")).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(conn.log(), vec!["SELECT * FROM `planets`".to_string()]);
}

#[tokio::test]
async fn test_get_where_merges_conditions() {
    let conn = MockConn::with_rows(vec![]);
    let mut qb = QueryBuilder::mysql();
    qb.get_where(&conn, Some("planets"), &[("class", Value::from("M"))])
        .await
        .unwrap();
    assert_eq!(
        conn.log(),
        vec!["SELECT * FROM `planets` WHERE `class` = 'M'".to_string()]
    );
}

#[tokio::test]
async fn test_count_reads_numrows() {
    let conn = MockConn::with_rows(vec![row(&[("numrows", serde_json::json!(42))])]);
    let mut qb = QueryBuilder::mysql();
    // Paging accumulators must not leak into COUNT.
    qb.limit(5).unwrap();
    let n = qb.count(&conn, Some("galaxies")).await.unwrap();
    assert_eq!(n, 42);
    assert_eq!(
        conn.log(),
        vec!["SELECT COUNT(*) AS numrows FROM `galaxies`".to_string()]
    );
}

#[tokio::test]
async fn test_insert_dispatches_mutation() {
    let conn = MockConn::mutations();
    let mut qb = QueryBuilder::mysql();
    let resp = qb
        .insert(&conn, Some("galaxies"), &[("name", Value::from("Milky Way"))])
        .await
        .unwrap();
    assert_eq!(resp.insert_id, Some(1));
    assert_eq!(
        conn.log(),
        vec!["INSERT INTO `galaxies` (`name`) VALUES ('Milky Way')".to_string()]
    );
}

#[tokio::test]
async fn test_insert_ignore_mysql_and_mssql() {
    let conn = MockConn::mutations();
    let mut qb = QueryBuilder::mysql();
    qb.insert_ignore(&conn, Some("t"), &[("a", Value::from(1))], None)
        .await
        .unwrap();
    assert_eq!(
        conn.log(),
        vec!["INSERT IGNORE INTO `t` (`a`) VALUES (1)".to_string()]
    );

    let mut qb = QueryBuilder::mssql();
    let err = qb
        .insert_ignore(&conn, Some("t"), &[("a", Value::from(1))], None)
        .await
        .unwrap_err();
    assert!(matches!(err, QbError::Unsupported(_)));
}

#[tokio::test]
async fn test_insert_suffix() {
    let conn = MockConn::mutations();
    let mut qb = QueryBuilder::mysql();
    qb.insert_ignore(
        &conn,
        Some("t"),
        &[("a", Value::from(1))],
        Some("ON DUPLICATE KEY UPDATE a = a + 1"),
    )
    .await
    .unwrap();
    assert_eq!(
        conn.log(),
        vec!["INSERT IGNORE INTO `t` (`a`) VALUES (1) ON DUPLICATE KEY UPDATE a = a + 1".to_string()]
    );
}

// ==================== Batch operations ====================

fn galaxy_rows(n: i64) -> Vec<Vec<(&'static str, Value)>> {
    (0..n)
        .map(|i| {
            vec![
                ("id", Value::from(i)),
                ("name", Value::from(format!("galaxy {i}"))),
            ]
        })
        .collect()
}

#[tokio::test]
async fn test_insert_batch_scenario() {
    let conn = MockConn::mutations();
    let mut qb = QueryBuilder::mysql();
    let rows = vec![
        vec![("id", Value::from(3)), ("name", Value::from("Milky Way"))],
        vec![("id", Value::from(4)), ("name", Value::from("Andromeda"))],
    ];
    qb.insert_batch(&conn, Some("galaxies"), &rows).await.unwrap();
    assert_eq!(
        conn.log(),
        vec![
            "INSERT INTO `galaxies` (`id`, `name`) VALUES (3, 'Milky Way'), (4, 'Andromeda')"
                .to_string()
        ]
    );
}

#[tokio::test]
async fn test_insert_batch_rejects_mismatched_rows() {
    let conn = MockConn::mutations();
    let mut qb = QueryBuilder::mysql();
    let rows = vec![
        vec![("id", Value::from(3)), ("name", Value::from("Milky Way"))],
        vec![("id", Value::from(4))],
    ];
    let err = qb
        .insert_batch(&conn, Some("galaxies"), &rows)
        .await
        .unwrap_err();
    assert!(err.is_invalid_argument());
    assert!(err.to_string().contains("row 1"));
    assert!(conn.log().is_empty());
}

#[tokio::test]
async fn test_insert_batch_ignore_keyword() {
    let conn = MockConn::mutations();
    let mut qb = QueryBuilder::mysql();
    qb.insert_batch_ignore(&conn, Some("t"), &galaxy_rows(2))
        .await
        .unwrap();
    assert!(conn.log()[0].starts_with("INSERT IGNORE INTO `t`"));
}

#[tokio::test]
async fn test_update_batch_chunks_at_100() {
    let conn = MockConn::mutations();
    let mut qb = QueryBuilder::mysql();
    let resp = qb
        .update_batch(&conn, Some("galaxies"), &galaxy_rows(150), "id")
        .await
        .unwrap();
    let log = conn.log();
    assert_eq!(log.len(), 2);
    assert!(log[0].starts_with("UPDATE `galaxies` SET `name` = CASE"));
    assert!(log[0].contains("WHEN `id` = 0 THEN 'galaxy 0'"));
    assert!(log[0].contains("ELSE `name` END"));
    assert!(log[0].contains("WHERE `id` IN (0, "));
    assert!(log[0].ends_with("99)"));
    assert!(log[1].contains("WHERE `id` IN (100, "));
    assert!(log[1].ends_with("149)"));
    assert_eq!(resp.affected_rows, 2);
}

#[tokio::test]
async fn test_update_batch_merges_accumulated_conditions() {
    let conn = MockConn::mutations();
    let mut qb = QueryBuilder::mysql();
    qb.where_("class", "M").unwrap();
    qb.update_batch(&conn, Some("galaxies"), &galaxy_rows(2), "id")
        .await
        .unwrap();
    let log = conn.log();
    assert!(log[0].contains("WHERE `class` = 'M' AND `id` IN (0, 1)"));
}

#[tokio::test]
async fn test_update_batch_requires_index_column() {
    let conn = MockConn::mutations();
    let mut qb = QueryBuilder::mysql();
    let rows = vec![vec![("name", Value::from("x"))]];
    let err = qb
        .update_batch(&conn, Some("galaxies"), &rows, "id")
        .await
        .unwrap_err();
    assert!(err.is_invalid_argument());
    assert!(err.to_string().contains("row 0"));
}

#[tokio::test]
async fn test_batch_stops_at_first_failure() {
    let conn = MockConn::failing_at(0);
    let mut qb = QueryBuilder::mysql();
    let err = qb
        .update_batch(&conn, Some("galaxies"), &galaxy_rows(150), "id")
        .await
        .unwrap_err();
    assert!(err.is_execution());
    // The second chunk is never dispatched.
    assert_eq!(conn.log().len(), 1);
}

#[tokio::test]
async fn test_batch_size_override() {
    let conn = MockConn::mutations();
    let mut qb = QueryBuilder::mysql();
    qb.batch_size(2).unwrap();
    qb.insert_batch(&conn, Some("galaxies"), &galaxy_rows(5))
        .await
        .unwrap();
    assert_eq!(conn.log().len(), 3);
}

// ==================== DELETE / TRUNCATE ====================

#[tokio::test]
async fn test_delete_uses_first_from_table() {
    let conn = MockConn::mutations();
    let mut qb = QueryBuilder::mysql();
    qb.from("galaxies, planets");
    qb.where_("id", 3).unwrap();
    qb.delete(&conn, None).await.unwrap();
    assert_eq!(
        conn.log(),
        vec!["DELETE FROM `galaxies` WHERE `id` = 3".to_string()]
    );
}

#[tokio::test]
async fn test_mysql_delete_with_limit() {
    let conn = MockConn::mutations();
    let mut qb = QueryBuilder::mysql();
    qb.where_("class", "M").unwrap();
    qb.limit(5).unwrap();
    qb.delete(&conn, Some("galaxies")).await.unwrap();
    assert_eq!(
        conn.log(),
        vec!["DELETE FROM `galaxies` WHERE `class` = 'M' LIMIT 5".to_string()]
    );
}

#[tokio::test]
async fn test_mssql_delete_top_and_offset_rules() {
    let conn = MockConn::mutations();
    let mut qb = QueryBuilder::mssql();
    qb.limit(5).unwrap();
    qb.delete(&conn, Some("galaxies")).await.unwrap();
    assert_eq!(
        conn.log(),
        vec!["DELETE TOP (5) FROM [galaxies]".to_string()]
    );

    let mut qb = QueryBuilder::mssql();
    qb.limit_offset(5, 10).unwrap();
    let err = qb.delete(&conn, Some("galaxies")).await.unwrap_err();
    assert!(err.is_invalid_argument());
}

#[tokio::test]
async fn test_empty_table_and_truncate() {
    let conn = MockConn::mutations();
    let mut qb = QueryBuilder::mysql();
    // Accumulated conditions are ignored by both.
    qb.where_("id", 3).unwrap();
    qb.empty_table(&conn, Some("galaxies")).await.unwrap();
    qb.truncate(&conn, Some("galaxies")).await.unwrap();
    assert_eq!(
        conn.log(),
        vec![
            "DELETE FROM `galaxies`".to_string(),
            "TRUNCATE `galaxies`".to_string()
        ]
    );

    let mut qb = QueryBuilder::mssql();
    qb.truncate(&conn, Some("galaxies")).await.unwrap();
    assert_eq!(conn.log()[2], "TRUNCATE TABLE [galaxies]");
}

// ==================== last_query ====================

#[tokio::test]
async fn test_last_query_for_batches() {
    let conn = MockConn::mutations();
    let mut qb = QueryBuilder::mysql();
    qb.batch_size(1).unwrap();
    qb.insert_batch(&conn, Some("t"), &galaxy_rows(2)).await.unwrap();
    let last = qb.last_query().unwrap();
    assert_eq!(last.matches("INSERT INTO").count(), 2);
    assert!(last.contains("; "));
}
