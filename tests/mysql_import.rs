use sql_bulk_loader::error::ImportError;
use sql_bulk_loader::import::{ImportSettings, Importer, NoopProgress};
use sql_bulk_loader::test_support::{TestDatabase, TestDatabaseError};
use std::fs;
use std::sync::Arc;

async fn provision(test_name: &str) -> Option<TestDatabase> {
    match TestDatabase::new_from_env().await {
        Ok(db) => Some(db),
        Err(TestDatabaseError::MissingUrl) => {
            eprintln!("skipping {test_name}: TEST_DATABASE_URL not set");
            None
        }
        Err(err) => panic!("failed to provision test database: {err:?}"),
    }
}

fn settings() -> ImportSettings {
    ImportSettings {
        workers: 2,
        channel_buffer_size: 8,
        status_interval: None,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn imports_dump_directory_into_mysql() {
    let Some(test_db) = provision("mysql directory import").await else {
        return;
    };
    let pool = test_db.pool_clone();

    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(
        dir.path().join("shop.orders-definition.sql"),
        "/*!40101 SET NAMES binary*/;\nCREATE TABLE orders (id INT PRIMARY KEY, total INT NOT NULL);\n",
    )
    .expect("write schema");
    for thread in 1..=3 {
        let rows: String = (0..25)
            .map(|i| {
                let id = thread * 100 + i;
                format!("INSERT INTO orders VALUES ({id}, {i});\n")
            })
            .collect();
        fs::write(dir.path().join(format!("shop.orders-thread{thread}.sql")), rows)
            .expect("write data");
    }

    let stats = Importer::new(Arc::new(pool.clone()), settings())
        .with_progress(Arc::new(NoopProgress))
        .import_directory(dir.path(), "*-thread*.sql")
        .await
        .expect("import succeeds");

    assert_eq!(stats.files, 4);
    assert_eq!(stats.statements, 77);

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
        .fetch_one(&pool)
        .await
        .expect("count rows");
    assert_eq!(count, 75);

    test_db.close().await.expect("failed to drop test database");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn duplicate_key_fails_the_file() {
    let Some(test_db) = provision("mysql duplicate key").await else {
        return;
    };
    let pool = test_db.pool_clone();

    sqlx::query("CREATE TABLE items (id INT PRIMARY KEY)")
        .execute(&pool)
        .await
        .expect("create table");

    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("items.sql");
    fs::write(&path, "INSERT INTO items VALUES (1);\nINSERT INTO items VALUES (1);\n")
        .expect("write file");

    let err = Importer::new(Arc::new(pool.clone()), settings())
        .with_progress(Arc::new(NoopProgress))
        .import_file(&path)
        .await
        .expect_err("duplicate key");
    assert!(matches!(err, ImportError::Statement { .. }));

    // the successful insert is not rolled back
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM items")
        .fetch_one(&pool)
        .await
        .expect("count rows");
    assert_eq!(count, 1);

    test_db.close().await.expect("failed to drop test database");
}
