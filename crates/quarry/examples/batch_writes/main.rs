//! Example demonstrating batched INSERT/UPDATE execution through a
//! connection adapter.
//!
//! Run with:
//!   cargo run --example batch_writes -p quarry
//!
//! The adapter here just prints each dispatched statement; swap in a real
//! driver binding to run against a database.

use quarry::{Connection, Payload, QbResult, QueryBuilder, QueryResponse, Value};

struct PrintingConn;

impl Connection for PrintingConn {
    async fn execute(&self, sql: &str) -> QbResult<Payload> {
        println!("-> {sql}");
        Ok(Payload::Mutation(QueryResponse {
            insert_id: None,
            affected_rows: 1,
            changed_rows: 1,
        }))
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> QbResult<()> {
    let conn = PrintingConn;
    let mut qb = QueryBuilder::mysql();
    // A small chunk size so the chunking is visible in the output.
    qb.batch_size(2)?;

    let rows: Vec<Vec<(&str, Value)>> = (1..=5)
        .map(|i| {
            vec![
                ("id", Value::from(i)),
                ("name", Value::from(format!("galaxy {i}"))),
            ]
        })
        .collect();

    println!("insert_batch, 5 rows in chunks of 2:");
    let resp = qb.insert_batch(&conn, Some("galaxies"), &rows).await?;
    println!("   affected: {}", resp.affected_rows);

    println!("update_batch keyed on id:");
    qb.where_("class", "M")?;
    let resp = qb.update_batch(&conn, Some("galaxies"), &rows, "id").await?;
    println!("   affected: {}", resp.affected_rows);

    Ok(())
}
