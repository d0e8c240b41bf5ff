//! Concurrent stock decrements through locking reads never oversell.
//!
//! Each worker thread owns one connection to a shared SQLite file and runs
//! its own single-threaded runtime.

#![cfg(feature = "sqlite")]

use std::path::Path;
use std::thread;

use quarry::{Connection, ConnectionConfig, DbResult, Dialect, Record};

const STOCK: i64 = 10;
const WORKERS: usize = 4;
const ATTEMPTS: usize = 5;

async fn open(path: &Path) -> Connection {
    let config = ConnectionConfig::new(Dialect::Sqlite, path.to_string_lossy());
    Connection::connect(config).await.expect("open sqlite file")
}

/// Take `qty` units of product `id`; `false` when there is not enough stock.
async fn decrease_stock(conn: &mut Connection, id: i64, qty: i64) -> DbResult<bool> {
    if !conn.begin_transaction().await {
        return Ok(false);
    }
    let product = conn.table("products").where_eq("id", id);
    let locked = product.clone().lock_for_update().first(conn).await;
    let available = match locked {
        Ok(Some(row)) => row.try_get::<i64>("stock")?,
        Ok(None) => 0,
        Err(e) => {
            conn.rollback().await;
            return Err(e);
        }
    };
    if available < qty {
        conn.rollback().await;
        return Ok(false);
    }
    if let Err(e) = product.decrement(conn, "stock", qty).await {
        conn.rollback().await;
        return Err(e);
    }
    Ok(conn.commit().await)
}

#[test]
fn locked_decrements_never_oversell() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("stock.db");

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let product_id = runtime.block_on(async {
        let mut conn = open(&path).await;
        conn.schema()
            .create("products", |t| {
                t.id();
                t.integer("stock");
            })
            .await
            .unwrap();
        conn.table("products")
            .insert_get_id(&mut conn, &Record::new().set("stock", STOCK), None)
            .await
            .unwrap()
    });

    let successes: usize = thread::scope(|scope| {
        let handles: Vec<_> = (0..WORKERS)
            .map(|_| {
                let path = path.clone();
                scope.spawn(move || {
                    let runtime = tokio::runtime::Builder::new_current_thread()
                        .enable_all()
                        .build()
                        .unwrap();
                    runtime.block_on(async {
                        let mut conn = open(&path).await;
                        let mut won = 0;
                        for _ in 0..ATTEMPTS {
                            if decrease_stock(&mut conn, product_id, 1).await.unwrap() {
                                won += 1;
                            }
                        }
                        won
                    })
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).sum()
    });

    assert_eq!(successes, STOCK as usize);

    let remaining = runtime.block_on(async {
        let mut conn = open(&path).await;
        conn.table("products")
            .where_eq("id", product_id)
            .value(&mut conn, "stock")
            .await
            .unwrap()
    });
    assert_eq!(remaining, Some(quarry::Value::Int(0)));
}
