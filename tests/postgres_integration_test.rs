// ABOUTME: Integration tests for export and import against a real PostgreSQL server
// ABOUTME: Run with TEST_TARGET_URL set and `cargo test -- --ignored`

use chrono::{NaiveDate, TimeZone, Utc};
use rusqlite::Connection;
use schema_backup::backup::{ExportOptions, ImportOptions, NoProgress, Service};
use schema_backup::catalog::{Catalog, ColumnKind, ColumnSchema, TableSchema};
use schema_backup::db::Database;
use schema_backup::error::{kind_of, ErrorKind};
use schema_backup::filters::TableFilter;
use serde_json::json;
use tokio_postgres::Client;

async fn client() -> Client {
    let url = std::env::var("TEST_TARGET_URL")
        .expect("TEST_TARGET_URL must be set for integration tests");
    schema_backup::postgres::connect(&url)
        .await
        .expect("Failed to connect to TEST_TARGET_URL")
}

fn entries_table(name: &str) -> TableSchema {
    TableSchema::new(
        name,
        vec![
            ColumnSchema::new("id", ColumnKind::Int { bits: 64 })
                .not_null()
                .auto_increment(),
            ColumnSchema::new("small", ColumnKind::Int { bits: 16 }),
            ColumnSchema::new("flag", ColumnKind::Bool).not_null(),
            ColumnSchema::new("score", ColumnKind::Float { bits: 64 }),
            ColumnSchema::new("ratio", ColumnKind::Float { bits: 32 }),
            ColumnSchema::new("created_at", ColumnKind::Timestamp),
            ColumnSchema::new("local_at", ColumnKind::Timestamp),
            ColumnSchema::new("day", ColumnKind::Timestamp),
            ColumnSchema::new("doc", ColumnKind::Json),
            ColumnSchema::new("raw", ColumnKind::Bytes),
            ColumnSchema::new("label", ColumnKind::Text),
            ColumnSchema::new("ref_id", ColumnKind::Opaque("uuid".to_string())),
            ColumnSchema::new("amount", ColumnKind::Opaque("numeric".to_string())),
        ],
    )
    .with_primary_key(&["id"])
}

async fn create_entries(client: &Client, name: &str) {
    client
        .batch_execute(&format!(
            "
            DROP TABLE IF EXISTS {name};
            CREATE TABLE {name} (
                id BIGSERIAL PRIMARY KEY,
                small SMALLINT,
                flag BOOLEAN NOT NULL,
                score DOUBLE PRECISION,
                ratio REAL,
                created_at TIMESTAMPTZ,
                local_at TIMESTAMP,
                day DATE,
                doc JSONB,
                raw BYTEA,
                label TEXT NOT NULL,
                ref_id UUID,
                amount NUMERIC(10, 2)
            );
            ",
            name = name
        ))
        .await
        .unwrap();
}

async fn seed_entries(client: &Client, name: &str) {
    client
        .batch_execute(&format!(
            "
            INSERT INTO {name} VALUES
                (1, -32768, true, 0.0, 0.5, '2024-05-06T07:08:09.123456Z', '2024-05-06 07:08:09',
                 '2024-03-01', '{{\"tags\": [\"a\"]}}', '\\x00ff10', 'apple',
                 'a0eebc99-9c0b-4ef8-bb6d-6bb9bd380a11', 12.50),
                (2, 32767, false, NULL, NULL, NULL, NULL, NULL, NULL, NULL, '', NULL, NULL),
                (3, 0, false, -1.25, 2.0, '1999-12-31T23:59:59Z', NULL, NULL, '[]', '', 'pomme',
                 NULL, 0);
            ",
            name = name
        ))
        .await
        .unwrap();
}

async fn export_string(service: &mut Service) -> String {
    let mut buf = Vec::new();
    service
        .export(&mut buf, &ExportOptions::default(), &mut NoProgress)
        .await
        .unwrap();
    String::from_utf8(buf).unwrap()
}

fn row_lines(stream: &str) -> Vec<&str> {
    stream
        .lines()
        .filter(|line| !line.starts_with("{\"type\":\"meta\""))
        .collect()
}

async fn count(client: &Client, name: &str) -> i64 {
    client
        .query_one(&format!("SELECT COUNT(*) FROM {}", name), &[])
        .await
        .unwrap()
        .get(0)
}

#[tokio::test]
#[ignore]
async fn test_postgres_round_trip_and_sequence_sync() {
    let name = "backup_it_round_trip";
    let catalog = Catalog::new(vec![entries_table(name)]).unwrap();

    let setup = client().await;
    create_entries(&setup, name).await;
    seed_entries(&setup, name).await;

    let mut service = Service::new(catalog.clone(), Database::Postgres(client().await));
    let stream = export_string(&mut service).await;
    assert_eq!(row_lines(&stream).len(), 3);
    assert!(stream.contains("\"ref_id\":\"a0eebc99-9c0b-4ef8-bb6d-6bb9bd380a11\""));
    assert!(stream.contains("\"amount\":\"12.50\""));
    assert!(stream.contains("\"small\":-32768"));

    setup
        .batch_execute(&format!("TRUNCATE {}", name))
        .await
        .unwrap();
    let summary = service
        .import(stream.as_bytes(), &ImportOptions::default())
        .await
        .unwrap();
    assert_eq!(summary.rows.get(name), Some(&3));
    assert_eq!(summary.sequences_synced, 1);

    let restored = export_string(&mut service).await;
    assert_eq!(row_lines(&stream), row_lines(&restored));

    // Importing twice converges on the same rows
    service
        .import(stream.as_bytes(), &ImportOptions::default())
        .await
        .unwrap();
    assert_eq!(count(&setup, name).await, 3);

    let next_id: i64 = setup
        .query_one(
            &format!(
                "INSERT INTO {} (flag, label) VALUES (true, 'banana') RETURNING id",
                name
            ),
            &[],
        )
        .await
        .unwrap()
        .get(0);
    assert_eq!(next_id, 4);

    setup
        .batch_execute(&format!("DROP TABLE {}", name))
        .await
        .unwrap();
}

#[tokio::test]
#[ignore]
async fn test_postgres_failed_import_rolls_back() {
    let name = "backup_it_rollback";
    let catalog = Catalog::new(vec![entries_table(name)]).unwrap();

    let setup = client().await;
    create_entries(&setup, name).await;

    // label is nullable in the catalog but NOT NULL in the table
    let stream = format!(
        "{meta}\n{ok}\n{bad}\n",
        meta = format_args!(
            r#"{{"type":"meta","version":1,"exported_at":"2024-01-01T00:00:00Z","schema_hash":"x","tables":["{}"],"row_counts":{{}}}}"#,
            name
        ),
        ok = format_args!(
            r#"{{"type":"{}","payload":{{"id":1,"flag":true,"label":"kept?"}}}}"#,
            name
        ),
        bad = format_args!(
            r#"{{"type":"{}","payload":{{"id":2,"flag":true,"label":null}}}}"#,
            name
        ),
    );

    let mut service = Service::new(catalog, Database::Postgres(client().await));
    let err = service
        .import(stream.as_bytes(), &ImportOptions::default())
        .await
        .unwrap_err();
    assert_eq!(kind_of(&err), Some(ErrorKind::Insert));
    assert_eq!(count(&setup, name).await, 0);

    setup
        .batch_execute(&format!("DROP TABLE {}", name))
        .await
        .unwrap();
}

#[tokio::test]
#[ignore]
async fn test_postgres_export_respects_table_filter() {
    let first = "backup_it_filter_a";
    let second = "backup_it_filter_b";
    let catalog = Catalog::new(vec![entries_table(first), entries_table(second)]).unwrap();

    let setup = client().await;
    for name in [first, second] {
        create_entries(&setup, name).await;
        seed_entries(&setup, name).await;
    }

    let mut service = Service::new(catalog, Database::Postgres(client().await));
    let mut buf = Vec::new();
    let summary = service
        .export(
            &mut buf,
            &ExportOptions {
                tables: TableFilter::new(&[second]),
                batch_size: 2,
                ..ExportOptions::default()
            },
            &mut NoProgress,
        )
        .await
        .unwrap();
    assert_eq!(summary.tables, vec![second]);
    assert_eq!(summary.rows.get(second), Some(&3));
    assert!(!String::from_utf8(buf).unwrap().contains(first));

    for name in [first, second] {
        setup
            .batch_execute(&format!("DROP TABLE {}", name))
            .await
            .unwrap();
    }
}

fn cross_table(name: &str) -> TableSchema {
    TableSchema::new(
        name,
        vec![
            ColumnSchema::new("id", ColumnKind::Int { bits: 64 })
                .not_null()
                .auto_increment(),
            ColumnSchema::new("flag", ColumnKind::Bool).not_null(),
            ColumnSchema::new("created_at", ColumnKind::Timestamp),
            ColumnSchema::new("day", ColumnKind::Timestamp),
            ColumnSchema::new("doc", ColumnKind::Json),
            ColumnSchema::new("raw", ColumnKind::Bytes),
            ColumnSchema::new("label", ColumnKind::Text),
            ColumnSchema::new("small", ColumnKind::Int { bits: 16 }),
            ColumnSchema::new("score", ColumnKind::Float { bits: 64 }),
        ],
    )
    .with_primary_key(&["id"])
}

fn cross_sqlite(catalog: &Catalog, name: &str, seed: bool) -> Service {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(&format!(
        "CREATE TABLE {name} (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            flag INTEGER NOT NULL,
            created_at TEXT,
            day TEXT,
            doc TEXT,
            raw BLOB,
            label TEXT,
            small INTEGER,
            score REAL
        );",
        name = name
    ))
    .unwrap();
    if seed {
        conn.execute_batch(&format!(
            "INSERT INTO {name} VALUES
                (1, 1, '2024-05-06 07:08:09', '2024-03-01', '{{\"tags\": [\"a\"]}}', X'00FF10',
                 'apple', -32768, 0.0),
                (2, 0, NULL, NULL, NULL, NULL, NULL, NULL, NULL);",
            name = name
        ))
        .unwrap();
    }
    Service::new(catalog.clone(), Database::Sqlite(conn))
}

#[tokio::test]
#[ignore]
async fn test_sqlite_backup_restores_into_postgres_and_back() {
    let name = "backup_it_cross";
    let catalog = Catalog::new(vec![cross_table(name)]).unwrap();

    let mut sqlite_source = cross_sqlite(&catalog, name, true);
    let mut buf = Vec::new();
    sqlite_source
        .export(&mut buf, &ExportOptions::default(), &mut NoProgress)
        .await
        .unwrap();
    let stream = String::from_utf8(buf).unwrap();

    let setup = client().await;
    setup
        .batch_execute(&format!(
            "
            DROP TABLE IF EXISTS {name};
            CREATE TABLE {name} (
                id BIGSERIAL PRIMARY KEY,
                flag BOOLEAN NOT NULL,
                created_at TIMESTAMPTZ,
                day DATE,
                doc JSONB,
                raw BYTEA,
                label TEXT,
                small SMALLINT,
                score DOUBLE PRECISION
            );
            ",
            name = name
        ))
        .await
        .unwrap();

    let mut pg = Service::new(catalog.clone(), Database::Postgres(client().await));
    let summary = pg
        .import(stream.as_bytes(), &ImportOptions::default())
        .await
        .unwrap();
    assert_eq!(summary.rows.get(name), Some(&2));
    assert_eq!(summary.sequences_synced, 1);

    let row = setup
        .query_one(&format!("SELECT * FROM {} WHERE id = 1", name), &[])
        .await
        .unwrap();
    assert!(row.get::<_, bool>("flag"));
    assert_eq!(
        row.get::<_, chrono::DateTime<Utc>>("created_at"),
        Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap()
    );
    assert_eq!(
        row.get::<_, NaiveDate>("day"),
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    );
    assert_eq!(row.get::<_, serde_json::Value>("doc"), json!({"tags": ["a"]}));
    assert_eq!(row.get::<_, Vec<u8>>("raw"), vec![0x00, 0xFF, 0x10]);
    assert_eq!(row.get::<_, String>("label"), "apple");
    assert_eq!(row.get::<_, i16>("small"), -32768);
    assert_eq!(row.get::<_, f64>("score"), 0.0);

    let empty = setup
        .query_one(&format!("SELECT * FROM {} WHERE id = 2", name), &[])
        .await
        .unwrap();
    assert!(!empty.get::<_, bool>("flag"));
    assert_eq!(empty.get::<_, Option<chrono::DateTime<Utc>>>("created_at"), None);
    assert_eq!(empty.get::<_, Option<serde_json::Value>>("doc"), None);
    assert_eq!(empty.get::<_, Option<f64>>("score"), None);

    // And back: PostgreSQL export restored into a fresh SQLite database
    let from_pg = export_string(&mut pg).await;
    assert_eq!(row_lines(&from_pg), row_lines(&stream));

    let mut sqlite_target = cross_sqlite(&catalog, name, false);
    sqlite_target
        .import(from_pg.as_bytes(), &ImportOptions::default())
        .await
        .unwrap();
    let restored = export_string(&mut sqlite_target).await;
    assert_eq!(row_lines(&restored), row_lines(&stream));

    setup
        .batch_execute(&format!("DROP TABLE {}", name))
        .await
        .unwrap();
}
