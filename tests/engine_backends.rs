//! Engine backend tests
//!
//! The same row workload runs on every backend and yields the same rows.

use relkv::config::{EngineKind, StoreConfig};
use relkv::engine::{Engine, EngineTxn};
use relkv::mvcc::KeyRange;
use relkv::types::{ColumnKey, ColumnType, TableDef, Value};
use tempfile::TempDir;

fn metrics_table() -> TableDef {
    TableDef::new(
        "samples",
        21,
        vec![
            ("host".to_string(), ColumnType::String),
            ("ts".to_string(), ColumnType::Int64),
            ("value".to_string(), ColumnType::Float64),
            ("raw".to_string(), ColumnType::Bytes),
        ],
        vec![ColumnKey::asc(0), ColumnKey::desc(1)],
    )
    .unwrap()
}

fn sample(host: &str, ts: i64, value: f64) -> Vec<Value> {
    vec![
        Value::from(host),
        Value::Int64(ts),
        Value::Float64(value),
        Value::Bytes(vec![0x00, 0x01, ts as u8]),
    ]
}

fn load(tx: &mut EngineTxn, def: &TableDef) {
    for host in ["db-2", "db-1"] {
        for ts in [100, 300, 200] {
            tx.insert(def, sample(host, ts, ts as f64 / 10.0)).unwrap();
        }
    }
}

fn workload(engine: &Engine) -> Vec<Vec<Value>> {
    let def = metrics_table();
    let mut tx = engine.begin().unwrap();
    load(&mut tx, &def);
    tx.commit().unwrap();

    let mut tx = engine.begin().unwrap();
    assert!(tx
        .delete(&def, &[Value::from("db-1"), Value::Int64(200)])
        .unwrap());
    assert!(tx.update(&def, sample("db-2", 300, -1.0)).unwrap());
    tx.commit().unwrap();

    let mut tx = engine.begin().unwrap();
    let rows = tx.scan(&def, KeyRange::all()).unwrap();
    let db2 = tx
        .scan(&def, KeyRange::prefix(vec![Value::from("db-2")]))
        .unwrap();
    assert_eq!(db2.len(), 3);
    let recent = tx
        .scan(
            &def,
            KeyRange::between(
                vec![Value::from("db-2"), Value::Int64(300)],
                vec![Value::from("db-2"), Value::Int64(100)],
            ),
        )
        .unwrap();
    assert_eq!(recent, vec![sample("db-2", 300, -1.0), sample("db-2", 200, 20.0)]);
    tx.rollback();
    rows
}

#[test]
fn test_backends_agree() {
    let mvcc = Engine::open(&StoreConfig::in_memory()).unwrap();
    let memory =
        Engine::open(&StoreConfig::in_memory().with_engine(EngineKind::Memory)).unwrap();

    let expected = vec![
        sample("db-1", 300, 30.0),
        sample("db-1", 100, 10.0),
        sample("db-2", 300, -1.0),
        sample("db-2", 200, 20.0),
        sample("db-2", 100, 10.0),
    ];
    assert_eq!(workload(&mvcc), expected);
    assert_eq!(workload(&memory), expected);
}

#[test]
fn test_durable_engine_reopens() {
    let dir = TempDir::new().unwrap();
    let config = StoreConfig::durable(dir.path()).with_sync_on_commit(false);
    let rows = workload(&Engine::open(&config).unwrap());

    let engine = Engine::open(&config).unwrap();
    let mut tx = engine.begin().unwrap();
    assert_eq!(tx.scan(&metrics_table(), KeyRange::all()).unwrap(), rows);
}

#[test]
fn test_memory_engine_rejects_wal_config() {
    let dir = TempDir::new().unwrap();
    let config = StoreConfig::durable(dir.path()).with_engine(EngineKind::Memory);
    let err = Engine::open(&config).unwrap_err();
    assert_eq!(err.code(), "RELKV_CONFIG");
}
