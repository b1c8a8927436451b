//! Example demonstrating quarry's chainable builder and dialect output.
//!
//! Run with:
//!   cargo run --example query_builder -p quarry
//!
//! Everything here uses the compile-only family, so no database is needed.

use quarry::{LikeSide, QbResult, QueryBuilder, Value};

#[derive(Debug)]
struct Filters {
    class: Option<String>,
    search: Option<String>,
    ids_any_of: Vec<i64>,
    include_retired: bool,
    page: u32,
    per_page: u32,
}

fn build_list_galaxies_sql(qb: &mut QueryBuilder, filters: &Filters) -> QbResult<String> {
    qb.select("g.id, g.name, g.class")?
        .from("galaxies g")
        .join("planets p", "p.galaxy_id = g.id", "left")?;

    if let Some(class) = &filters.class {
        qb.where_("g.class", class.as_str())?;
    }
    if let Some(search) = &filters.search {
        qb.like("g.name", search, LikeSide::Both)?;
    }
    // An empty id list is silently ignored, so this call is unconditional.
    qb.where_in("g.id", filters.ids_any_of.clone())?;
    if !filters.include_retired {
        qb.where_("g.retired_at", Value::Null)?;
    }

    qb.order_by("g.name ASC")?
        .limit_offset(filters.per_page, filters.page.saturating_sub(1) * filters.per_page)?;

    qb.get_compiled_select(None)
}

fn main() -> QbResult<()> {
    let filters = Filters {
        class: Some("M".to_string()),
        search: Some("way".to_string()),
        ids_any_of: vec![3, 4, 7],
        include_retired: false,
        page: 2,
        per_page: 20,
    };

    let mut mysql = QueryBuilder::mysql();
    println!("mysql:  {}", build_list_galaxies_sql(&mut mysql, &filters)?);

    // The same chain compiles to SQL Server paging syntax.
    let mut mssql = QueryBuilder::mssql();
    println!("mssql:  {}", build_list_galaxies_sql(&mut mssql, &filters)?);

    // Staged writes compile without executing, too.
    let mut qb = QueryBuilder::mysql();
    qb.set("name", "Andromeda")?
        .set("mass", 1.5e12)?
        .set("discovered", "0964")?; // leading zero stays a quoted string
    println!("insert: {}", qb.get_compiled_insert(Some("galaxies"))?);

    qb.reset_query();
    qb.set_raw("visits", "visits + 1")?.where_("id", 7)?;
    println!("update: {}", qb.get_compiled_update(Some("galaxies"))?);

    Ok(())
}
