//! PostgreSQL round trips. Skipped unless `DATABASE_URL` points at a server
//! (a `.env` file is honored).

#![cfg(feature = "postgres")]

use quarry::{Connection, ConnectionConfig, DbError, Direction, Record, Value};

async fn connect() -> Option<Connection> {
    dotenvy::dotenv().ok();
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set; skipping");
        return None;
    };
    let config = ConnectionConfig::from_url(&url).expect("valid DATABASE_URL");
    Some(Connection::connect(config).await.expect("connect to postgres"))
}

fn table_name(prefix: &str) -> String {
    format!("{prefix}_{}", uuid::Uuid::new_v4().simple())
}

#[tokio::test]
async fn crud_round_trip() {
    let Some(mut conn) = connect().await else { return };
    let table = table_name("quarry_users");

    conn.schema()
        .create(&table, |t| {
            t.id();
            t.string("email", 0).unique();
            t.jsonb("meta").nullable();
            t.timestamps();
        })
        .await
        .unwrap();
    assert!(conn.schema().has_table(&table).await.unwrap());
    assert!(conn.schema().has_column(&table, "Email").await.unwrap());

    let id = conn
        .table(&table)
        .insert_get_id(
            &mut conn,
            &Record::new()
                .set("email", "ada@example.com")
                .set("meta", serde_json::json!({"role": "admin"})),
            None,
        )
        .await
        .unwrap();
    assert!(id > 0);

    let role = conn
        .table(&table)
        .where_eq("meta->role", "admin")
        .value(&mut conn, "email")
        .await
        .unwrap();
    assert_eq!(role, Some(Value::from("ada@example.com")));

    let dup = conn
        .table(&table)
        .insert(&mut conn, &[Record::new().set("email", "ada@example.com")])
        .await
        .unwrap_err();
    assert!(dup.is_unique_violation(), "{dup}");

    let changed = conn
        .table(&table)
        .where_eq("id", id)
        .update(&mut conn, &Record::new().set("email", "grace@example.com"))
        .await
        .unwrap();
    assert_eq!(changed, 1);

    conn.table(&table).truncate(&mut conn).await.unwrap();
    assert_eq!(conn.table(&table).count(&mut conn).await.unwrap(), 0);

    conn.schema().drop(&table).await.unwrap();
    assert!(!conn.schema().has_table(&table).await.unwrap());
}

#[tokio::test]
async fn upsert_and_locking_read() {
    let Some(mut conn) = connect().await else { return };
    let table = table_name("quarry_stock");

    conn.schema()
        .create(&table, |t| {
            t.string("sku", 32).primary();
            t.integer("stock").default(0);
        })
        .await
        .unwrap();

    let rows = [
        Record::new().set("sku", "a").set("stock", 3),
        Record::new().set("sku", "b").set("stock", 1),
    ];
    conn.table(&table).upsert(&mut conn, &rows, &["sku"], None).await.unwrap();
    conn.table(&table)
        .upsert(&mut conn, &[Record::new().set("sku", "a").set("stock", 5)], &["sku"], None)
        .await
        .unwrap();

    assert!(conn.begin_transaction().await);
    let row = conn
        .table(&table)
        .where_eq("sku", "a")
        .lock_for_update()
        .first(&mut conn)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.try_get::<i64>("stock").unwrap(), 5);
    conn.table(&table)
        .where_eq("sku", "a")
        .decrement(&mut conn, "stock", 2)
        .await
        .unwrap();
    assert!(conn.commit().await);

    let stocks = conn
        .table(&table)
        .order_by("sku", Direction::Asc)
        .pluck(&mut conn, "stock")
        .await
        .unwrap();
    assert_eq!(stocks, vec![Value::Int(3), Value::Int(1)]);

    conn.schema().drop_if_exists(&table).await.unwrap();
}

#[tokio::test]
async fn nested_rollback_keeps_outer_changes() {
    let Some(mut conn) = connect().await else { return };
    let table = table_name("quarry_counter");

    conn.schema()
        .create(&table, |t| {
            t.increments("id");
            t.integer("n").default(0);
        })
        .await
        .unwrap();
    conn.table(&table).insert(&mut conn, &[Record::new().set("n", 0)]).await.unwrap();

    assert!(conn.begin_transaction().await);
    conn.table(&table).increment(&mut conn, "n", 1).await.unwrap();
    assert!(conn.begin_transaction().await);
    conn.table(&table).increment(&mut conn, "n", 1).await.unwrap();
    assert!(conn.rollback().await);
    assert!(conn.commit().await);

    let n = conn.table(&table).value(&mut conn, "n").await.unwrap();
    assert_eq!(n, Some(Value::Int(1)));

    conn.schema().drop(&table).await.unwrap();
}

#[tokio::test]
async fn native_errors_carry_sql() {
    let Some(mut conn) = connect().await else { return };
    let err = conn.select("select * from quarry_missing_table", &[]).await.unwrap_err();
    match err {
        DbError::Query { sql, .. } => assert!(sql.contains("quarry_missing_table")),
        other => panic!("expected query error, got {other:?}"),
    }
}
