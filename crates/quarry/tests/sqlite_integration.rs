//! End-to-end checks against an in-memory SQLite database.

#![cfg(feature = "sqlite")]

use futures_util::StreamExt;
use quarry::{Connection, ConnectionConfig, DbError, DbResult, Direction, Record, Row, Value, raw};

async fn memory() -> Connection {
    Connection::connect(ConnectionConfig::sqlite_memory())
        .await
        .expect("open in-memory sqlite")
}

async fn with_products() -> Connection {
    let mut conn = memory().await;
    conn.schema()
        .create("products", |t| {
            t.id();
            t.string("sku", 32).unique();
            t.string("name", 0);
            t.integer("stock").default(0);
            t.decimal("price", 8, 2).nullable();
        })
        .await
        .expect("create products");

    let rows: Vec<Record> = [("a-1", "bolt", 10), ("a-2", "nut", 0), ("b-1", "washer", 25)]
        .into_iter()
        .map(|(sku, name, stock)| {
            Record::new()
                .set("sku", sku)
                .set("name", name)
                .set("stock", stock)
        })
        .collect();
    assert!(conn.table("products").insert(&mut conn, &rows).await.unwrap());
    conn
}

fn names(rows: impl IntoIterator<Item = Row>) -> Vec<String> {
    rows.into_iter()
        .map(|r| r.try_get::<String>("name").unwrap())
        .collect()
}

// ── reads ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn where_and_order() {
    let mut conn = with_products().await;
    let rows = conn
        .table("products")
        .where_op("stock", ">", 0)
        .order_by_desc("stock")
        .get(&mut conn)
        .await
        .unwrap();
    assert_eq!(names(rows), vec!["washer", "bolt"]);

    let rows = conn
        .table("products")
        .where_eq("sku", "a-2")
        .or_where_eq("sku", "b-1")
        .order_by("sku", Direction::Asc)
        .get(&mut conn)
        .await
        .unwrap();
    assert_eq!(names(rows), vec!["nut", "washer"]);
}

#[tokio::test]
async fn empty_in_list_matches_nothing() {
    let mut conn = with_products().await;
    let none = conn
        .table("products")
        .where_in("id", Vec::<i64>::new())
        .count(&mut conn)
        .await
        .unwrap();
    assert_eq!(none, 0);
    let all = conn
        .table("products")
        .where_not_in("id", Vec::<i64>::new())
        .count(&mut conn)
        .await
        .unwrap();
    assert_eq!(all, 3);
}

#[tokio::test]
async fn first_value_pluck_and_find() {
    let mut conn = with_products().await;
    let q = conn.table("products").where_eq("sku", "a-1");
    let row = q.first(&mut conn).await.unwrap().expect("bolt exists");
    assert_eq!(row.try_get::<i64>("stock").unwrap(), 10);

    let name = q.value(&mut conn, "name").await.unwrap();
    assert_eq!(name, Some(Value::Text("bolt".into())));

    let skus = conn
        .table("products")
        .order_by("sku", Direction::Asc)
        .pluck(&mut conn, "sku")
        .await
        .unwrap();
    assert_eq!(skus, vec![Value::from("a-1"), Value::from("a-2"), Value::from("b-1")]);

    let id = row.try_get::<i64>("id").unwrap();
    assert!(conn.table("products").find(&mut conn, id).await.unwrap().is_some());

    let missing = conn
        .table("products")
        .where_eq("sku", "zzz")
        .first_or_fail(&mut conn)
        .await
        .unwrap_err();
    assert!(missing.is_not_found());
}

#[tokio::test]
async fn aggregates() {
    let mut conn = with_products().await;
    let products = conn.table("products");
    assert_eq!(products.count(&mut conn).await.unwrap(), 3);
    assert_eq!(products.sum(&mut conn, "stock").await.unwrap(), 35.0);
    assert_eq!(products.max(&mut conn, "stock").await.unwrap(), Some(Value::Int(25)));
    assert_eq!(products.min(&mut conn, "stock").await.unwrap(), Some(Value::Int(0)));
    let avg = products.avg(&mut conn, "stock").await.unwrap().unwrap();
    assert!((avg - 35.0 / 3.0).abs() < 1e-9);

    assert!(products.clone().where_eq("sku", "a-1").exists(&mut conn).await.unwrap());
    assert!(products.where_eq("sku", "nope").doesnt_exist(&mut conn).await.unwrap());
}

#[tokio::test]
async fn grouped_pagination_counts_groups() {
    let mut conn = with_products().await;
    let page = conn
        .table("products")
        .select_raw("substr(sku, 1, 1) as family", Vec::new())
        .group_by(&["family"])
        .order_by("family", Direction::Asc)
        .paginate(&mut conn, 10, 1)
        .await
        .unwrap();
    assert_eq!(page.total, 2);
    assert_eq!(page.items.len(), 2);
}

#[tokio::test]
async fn paginate_reports_totals() {
    let mut conn = with_products().await;
    let page = conn
        .table("products")
        .order_by("id", Direction::Asc)
        .paginate(&mut conn, 2, 2)
        .await
        .unwrap();
    assert_eq!(page.total, 3);
    assert_eq!(page.last_page(), 2);
    assert!(!page.has_more_pages());
    assert_eq!(names(page.items), vec!["washer"]);
}

#[tokio::test]
async fn chunk_stops_when_callback_says_so() {
    let mut conn = with_products().await;
    let mut seen = Vec::new();
    let finished = conn
        .table("products")
        .order_by("id", Direction::Asc)
        .chunk(&mut conn, 2, |rows, page| {
            seen.push((page, rows.len()));
            false
        })
        .await
        .unwrap();
    assert!(!finished);
    assert_eq!(seen, vec![(1, 2)]);

    let unordered = conn
        .table("products")
        .chunk(&mut conn, 2, |_, _| true)
        .await
        .unwrap_err();
    assert!(matches!(unordered, DbError::Validation(_)));
}

#[tokio::test]
async fn cursor_streams_every_row_in_batches() {
    let mut conn = with_products().await;
    conn.enable_query_log();
    let rows: Vec<DbResult<Row>> = conn
        .table("products")
        .order_by("id", Direction::Asc)
        .cursor_with_batch(&mut conn, 2)
        .collect()
        .await;
    let rows: Vec<Row> = rows.into_iter().collect::<DbResult<_>>().unwrap();
    assert_eq!(names(rows), vec!["bolt", "nut", "washer"]);
    // 2 + 1 rows, then an empty page
    assert_eq!(conn.query_log().len(), 3);
}

#[tokio::test]
async fn join_with_alias() {
    let mut conn = with_products().await;
    conn.schema()
        .create("reviews", |t| {
            t.id();
            t.foreign_id("product_id");
            t.integer("stars");
            t.foreign(&["product_id"]).on("products").cascade_on_delete();
        })
        .await
        .unwrap();
    let review = Record::new().set("product_id", 1).set("stars", 4);
    conn.table("reviews").insert(&mut conn, &[review]).await.unwrap();

    let rows = conn
        .table("products as p")
        .join("reviews as r", "r.product_id", "=", "p.id")
        .select(&["p.name", "r.stars"])
        .get(&mut conn)
        .await
        .unwrap();
    assert_eq!(rows.row_count(), 1);
    let (name, stars): (String, i64) = rows.map().unwrap().remove(0);
    assert_eq!((name.as_str(), stars), ("bolt", 4));
}

// ── writes ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn insert_get_id_and_update() {
    let mut conn = with_products().await;
    let id = conn
        .table("products")
        .insert_get_id(
            &mut conn,
            &Record::new().set("sku", "c-1").set("name", "gear").set("stock", 3),
            None,
        )
        .await
        .unwrap();
    assert_eq!(id, 4);

    let changed = conn
        .table("products")
        .where_eq("id", id)
        .update(&mut conn, &Record::new().set("name", "cog").set("stock", raw("stock * 2")))
        .await
        .unwrap();
    assert_eq!(changed, 1);
    let row = conn.table("products").find(&mut conn, id).await.unwrap().unwrap();
    assert_eq!(row.try_get::<String>("name").unwrap(), "cog");
    assert_eq!(row.try_get::<i64>("stock").unwrap(), 6);
}

#[tokio::test]
async fn increment_and_decrement() {
    let mut conn = with_products().await;
    let bolt = conn.table("products").where_eq("sku", "a-1");
    bolt.increment(&mut conn, "stock", 5).await.unwrap();
    bolt.decrement_with(&mut conn, "stock", 2, Record::new().set("name", "big bolt"))
        .await
        .unwrap();
    let row = bolt.first(&mut conn).await.unwrap().unwrap();
    assert_eq!(row.try_get::<i64>("stock").unwrap(), 13);
    assert_eq!(row.try_get::<String>("name").unwrap(), "big bolt");

    let err = bolt.increment(&mut conn, "stock", "lots").await.unwrap_err();
    assert!(matches!(err, DbError::Validation(_)));
}

#[tokio::test]
async fn unique_violation_is_classified() {
    let mut conn = with_products().await;
    let dup = Record::new().set("sku", "a-1").set("name", "again");
    let err = conn.table("products").insert(&mut conn, &[dup.clone()]).await.unwrap_err();
    assert!(err.is_unique_violation(), "{err}");

    let ignored = conn
        .table("products")
        .insert_or_ignore(&mut conn, &[dup])
        .await
        .unwrap();
    assert_eq!(ignored, 0);
}

#[tokio::test]
async fn upsert_updates_existing_rows() {
    let mut conn = with_products().await;
    let rows = vec![
        Record::new().set("sku", "a-1").set("name", "bolt").set("stock", 99),
        Record::new().set("sku", "d-1").set("name", "spring").set("stock", 1),
    ];
    conn.table("products")
        .upsert(&mut conn, &rows, &["sku"], Some(&["stock"]))
        .await
        .unwrap();
    assert_eq!(conn.table("products").count(&mut conn).await.unwrap(), 4);
    let stock = conn
        .table("products")
        .where_eq("sku", "a-1")
        .value(&mut conn, "stock")
        .await
        .unwrap();
    assert_eq!(stock, Some(Value::Int(99)));
}

#[tokio::test]
async fn delete_and_truncate() {
    let mut conn = with_products().await;
    let gone = conn
        .table("products")
        .where_eq("stock", 0)
        .delete(&mut conn)
        .await
        .unwrap();
    assert_eq!(gone, 1);

    conn.table("products").truncate(&mut conn).await.unwrap();
    assert_eq!(conn.table("products").count(&mut conn).await.unwrap(), 0);

    let id = conn
        .table("products")
        .insert_get_id(&mut conn, &Record::new().set("sku", "x").set("name", "x"), None)
        .await
        .unwrap();
    assert_eq!(id, 1, "truncate resets the autoincrement sequence");
}

#[tokio::test]
async fn limited_writes_touch_only_the_selected_rows() {
    let mut conn = with_products().await;
    let gone = conn
        .table("products")
        .order_by_desc("stock")
        .limit(1)
        .delete(&mut conn)
        .await
        .unwrap();
    assert_eq!(gone, 1);
    assert_eq!(conn.table("products").count(&mut conn).await.unwrap(), 2);
    assert!(conn.table("products").where_eq("name", "washer").doesnt_exist(&mut conn).await.unwrap());

    let changed = conn
        .table("products")
        .order_by("id", Direction::Asc)
        .offset(1)
        .limit(1)
        .update(&mut conn, &Record::new().set("name", "second"))
        .await
        .unwrap();
    assert_eq!(changed, 1);
    let rows = conn
        .table("products")
        .order_by("id", Direction::Asc)
        .get(&mut conn)
        .await
        .unwrap();
    assert_eq!(names(rows), vec!["bolt", "second"]);
}

#[tokio::test]
async fn order_bindings_do_not_leak_into_unlimited_writes() {
    let mut conn = with_products().await;
    let changed = conn
        .table("products")
        .where_eq("stock", 0)
        .order_by_raw("abs(stock - ?)", vec![Value::Int(3)])
        .update(&mut conn, &Record::new().set("name", "empty"))
        .await
        .unwrap();
    assert_eq!(changed, 1);

    let gone = conn
        .table("products")
        .where_eq("name", "empty")
        .order_by_raw("abs(stock - ?)", vec![Value::Int(3)])
        .delete(&mut conn)
        .await
        .unwrap();
    assert_eq!(gone, 1);
}

#[tokio::test]
async fn aggregates_ignore_paging() {
    let mut conn = with_products().await;
    let paged = conn.table("products").order_by("name", Direction::Asc).limit(1).offset(5);
    assert_eq!(paged.count(&mut conn).await.unwrap(), 3);
    assert_eq!(paged.sum(&mut conn, "stock").await.unwrap(), 35.0);
}

#[tokio::test]
async fn unqualified_write_is_rejected() {
    let mut conn = with_products().await;
    let err = conn.query().delete(&mut conn).await.unwrap_err();
    assert!(matches!(err, DbError::Validation(_)));

    let err = conn
        .table("products")
        .update(&mut conn, &Record::new())
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Validation(_)));
}

// ── transactions ────────────────────────────────────────────────────────────

#[tokio::test]
async fn nested_commit_uses_one_savepoint() {
    let mut conn = memory().await;
    conn.enable_query_log();
    assert!(conn.begin_transaction().await);
    assert!(conn.begin_transaction().await);
    assert!(conn.commit().await);
    assert!(conn.in_transaction());
    assert!(conn.commit().await);
    assert!(!conn.in_transaction());

    let log: Vec<&str> = conn.query_log().iter().map(|q| q.sql.as_str()).collect();
    assert_eq!(
        log,
        vec!["BEGIN IMMEDIATE", "SAVEPOINT sp2", "RELEASE SAVEPOINT sp2", "COMMIT"]
    );
}

#[tokio::test]
async fn inner_rollback_keeps_outer_work() {
    let mut conn = memory().await;
    conn.schema()
        .create("counters", |t| {
            t.string("name", 16).primary();
            t.integer("n").default(0);
        })
        .await
        .unwrap();
    conn.table("counters")
        .insert(&mut conn, &[Record::new().set("name", "hits")])
        .await
        .unwrap();
    let hits = conn.table("counters").where_eq("name", "hits");

    assert!(conn.begin_transaction().await);
    hits.increment(&mut conn, "n", 1).await.unwrap();
    assert!(conn.begin_transaction().await);
    hits.increment(&mut conn, "n", 1).await.unwrap();
    assert!(conn.rollback().await);
    assert!(conn.commit().await);

    let n = hits.value(&mut conn, "n").await.unwrap();
    assert_eq!(n, Some(Value::Int(1)));
}

#[tokio::test]
async fn transaction_macro_rolls_back_on_error() {
    let mut conn = with_products().await;
    let conn = &mut conn;
    let result: DbResult<()> = quarry::transaction!(conn, {
        conn.table("products").where_eq("sku", "a-1").delete(conn).await?;
        Err::<(), DbError>(DbError::validation("abort"))
    });
    assert!(result.is_err());
    assert_eq!(conn.transaction_level(), 0);
    assert_eq!(conn.table("products").count(conn).await.unwrap(), 3);
}

// ── schema ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn introspection() {
    let mut conn = with_products().await;
    let mut schema = conn.schema();
    assert!(schema.has_table("products").await.unwrap());
    assert!(!schema.has_table("ghosts").await.unwrap());
    assert!(schema.has_column("products", "SKU").await.unwrap());
    assert!(schema.has_columns("products", &["id", "stock"]).await.unwrap());
    assert!(!schema.has_columns("products", &["id", "colour"]).await.unwrap());
    assert_eq!(
        schema.get_column_listing("products").await.unwrap(),
        vec!["id", "sku", "name", "stock", "price"]
    );
}

#[tokio::test]
async fn alter_rename_and_drop() {
    let mut conn = with_products().await;
    let mut schema = conn.schema();
    schema
        .table("products", |t| {
            t.text("notes").nullable();
            t.index(&["name"]);
        })
        .await
        .unwrap();
    assert!(schema.has_column("products", "notes").await.unwrap());

    schema.rename("products", "items").await.unwrap();
    assert!(schema.has_table("items").await.unwrap());
    assert!(!schema.has_table("products").await.unwrap());

    schema.drop("items").await.unwrap();
    assert!(!schema.has_table("items").await.unwrap());
}

#[tokio::test]
async fn drop_if_exists_on_missing_table() {
    let mut conn = memory().await;
    let mut schema = conn.schema();
    schema.drop_if_exists("never_created").await.unwrap();
    assert!(!schema.has_table("never_created").await.unwrap());
    assert!(schema.drop("never_created").await.is_err());
}

#[tokio::test]
async fn foreign_keys_toggle() {
    let mut conn = memory().await;
    let mut schema = conn.schema();
    assert!(schema.enable_foreign_key_constraints().await.unwrap());
    assert!(schema.disable_foreign_key_constraints().await.unwrap());
}

#[tokio::test]
async fn sqlite_rejects_column_change_at_runtime() {
    let mut conn = with_products().await;
    let err = conn
        .schema()
        .table("products", |t| {
            t.integer("stock").nullable().change();
        })
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Schema(_)));
}
