//! WAL recovery tests
//!
//! - Committed rows survive a restart
//! - Record N replays as version N
//! - Deletes replay as tombstones that still conflict
//! - A torn trailing record is dropped and truncated; corruption halts open

use std::fs::{self, OpenOptions};
use std::io::Write;

use relkv::config::StoreConfig;
use relkv::mvcc::{CommitId, KeyRange, TxnError, VersionedStore};
use relkv::types::{ColumnKey, ColumnType, TableDef, Value};
use relkv::wal::{wal_path, WalReader, WAL_HEADER_LEN};
use tempfile::TempDir;

fn orders() -> TableDef {
    TableDef::new(
        "orders",
        11,
        vec![
            ("note".to_string(), ColumnType::String),
            ("customer".to_string(), ColumnType::String),
            ("id".to_string(), ColumnType::Int64),
            ("amount".to_string(), ColumnType::Float64),
        ],
        vec![ColumnKey::asc(1), ColumnKey::desc(2)],
    )
    .unwrap()
}

fn order(customer: &str, id: i64, amount: f64, note: Option<&str>) -> Vec<Value> {
    vec![
        note.map_or(Value::Null, Value::from),
        Value::from(customer),
        Value::Int64(id),
        Value::Float64(amount),
    ]
}

fn config(dir: &TempDir) -> StoreConfig {
    StoreConfig::durable(dir.path())
}

// =============================================================================
// Replay
// =============================================================================

#[test]
fn test_rows_survive_restart() {
    let dir = TempDir::new().unwrap();
    let def = orders();
    {
        let store = VersionedStore::open(&config(&dir)).unwrap();
        let mut tx = store.begin();
        let mut t = tx.table(&def);
        t.insert(order("ann", 1, 9.5, Some("first"))).unwrap();
        t.insert(order("ann", 2, 1.0, None)).unwrap();
        t.insert(order("bob", 1, -3.25, Some("refund"))).unwrap();
        tx.commit().unwrap();

        let mut tx = store.begin();
        tx.table(&def).update(order("ann", 1, 10.0, Some("edited"))).unwrap();
        tx.commit().unwrap();
    }

    let store = VersionedStore::open(&config(&dir)).unwrap();
    assert_eq!(store.version(), CommitId::new(2));
    assert_eq!(store.metrics().snapshot().wal_records_replayed, 2);

    let mut tx = store.begin();
    let rows = tx.table(&def).scan(KeyRange::all()).unwrap();
    assert_eq!(
        rows,
        vec![
            order("ann", 2, 1.0, None),
            order("ann", 1, 10.0, Some("edited")),
            order("bob", 1, -3.25, Some("refund")),
        ]
    );
}

#[test]
fn test_versions_continue_after_restart() {
    let dir = TempDir::new().unwrap();
    let def = orders();
    for i in 0..3 {
        let store = VersionedStore::open(&config(&dir)).unwrap();
        assert_eq!(store.version(), CommitId::new(i));
        let mut tx = store.begin();
        tx.table(&def).insert(order("c", i as i64, 0.0, None)).unwrap();
        assert_eq!(tx.commit().unwrap(), CommitId::new(i + 1));
    }
    let mut reader = WalReader::open(&wal_path(dir.path())).unwrap();
    assert_eq!(reader.read_all().unwrap().len(), 3);
}

#[test]
fn test_no_op_commit_writes_no_record() {
    let dir = TempDir::new().unwrap();
    let def = orders();
    let store = VersionedStore::open(&config(&dir)).unwrap();
    let mut tx = store.begin();
    tx.table(&def).insert(order("x", 1, 0.0, None)).unwrap();
    tx.table(&def)
        .delete(&[Value::from("x"), Value::Int64(1)])
        .unwrap();
    tx.commit().unwrap();
    drop(store);

    let len = fs::metadata(wal_path(dir.path())).unwrap().len();
    assert_eq!(len, WAL_HEADER_LEN as u64);
}

#[test]
fn test_replayed_tombstone_still_conflicts() {
    let dir = TempDir::new().unwrap();
    let def = orders();
    let key = [Value::from("ann"), Value::Int64(7)];
    {
        let store = VersionedStore::open(&config(&dir)).unwrap();
        let mut tx = store.begin();
        tx.table(&def).insert(order("ann", 7, 1.0, None)).unwrap();
        tx.commit().unwrap();
    }

    let store = VersionedStore::open(&config(&dir)).unwrap();
    let mut stale = store.begin();
    assert!(stale.table(&def).update(order("ann", 7, 2.0, None)).unwrap());

    let mut deleter = store.begin();
    assert!(deleter.table(&def).delete(&key).unwrap());
    deleter.commit().unwrap();
    drop(stale);
    drop(store);

    // After a second restart the delete is a replayed tombstone at v2.
    let store = VersionedStore::open(&config(&dir)).unwrap();
    assert_eq!(store.version(), CommitId::new(2));
    assert_eq!(store.live_rows(), 0);
    assert_eq!(store.committed_len(), 1);

    let mut before = store.begin();
    let mut racer = store.begin();
    racer.table(&def).insert(order("ann", 7, 5.0, None)).unwrap();
    before.table(&def).insert(order("ann", 7, 6.0, None)).unwrap();
    racer.commit().unwrap();
    assert!(matches!(before.commit(), Err(TxnError::Conflict { .. })));

    let mut tx = store.begin();
    assert_eq!(
        tx.table(&def).get(&key).unwrap(),
        Some(order("ann", 7, 5.0, None))
    );
}

// =============================================================================
// Torn Tails and Corruption
// =============================================================================

#[test]
fn test_torn_tail_is_truncated_on_open() {
    let dir = TempDir::new().unwrap();
    let def = orders();
    {
        let store = VersionedStore::open(&config(&dir)).unwrap();
        let mut tx = store.begin();
        tx.table(&def).insert(order("ann", 1, 1.0, None)).unwrap();
        tx.commit().unwrap();
    }
    let path = wal_path(dir.path());
    let good_len = fs::metadata(&path).unwrap().len();

    // Half of a SET entry, as left by a crash mid-append.
    let mut file = OpenOptions::new().append(true).open(&path).unwrap();
    file.write_all(&[0x01, 0x0B, 0x00]).unwrap();
    drop(file);

    let store = VersionedStore::open(&config(&dir)).unwrap();
    assert_eq!(store.version(), CommitId::new(1));
    assert_eq!(fs::metadata(&path).unwrap().len(), good_len);

    // New commits append after the last complete record.
    let mut tx = store.begin();
    tx.table(&def).insert(order("bob", 1, 1.0, None)).unwrap();
    tx.commit().unwrap();
    drop(store);

    let store = VersionedStore::open(&config(&dir)).unwrap();
    assert_eq!(store.version(), CommitId::new(2));
    assert_eq!(store.live_rows(), 2);
}

#[test]
fn test_corrupt_record_halts_open() {
    let dir = TempDir::new().unwrap();
    let def = orders();
    {
        let store = VersionedStore::open(&config(&dir)).unwrap();
        let mut tx = store.begin();
        tx.table(&def).insert(order("ann", 1, 1.0, None)).unwrap();
        tx.commit().unwrap();
    }
    let path = wal_path(dir.path());
    let mut bytes = fs::read(&path).unwrap();
    // First byte of the first record is the entry type.
    bytes[WAL_HEADER_LEN] = 0x7F;
    fs::write(&path, &bytes).unwrap();

    match VersionedStore::open(&config(&dir)) {
        Err(TxnError::Wal(e)) => assert_eq!(e.code(), "RELKV_WAL_CORRUPTION"),
        Err(other) => panic!("unexpected error {other}"),
        Ok(_) => panic!("corrupt WAL opened"),
    }
}

#[test]
fn test_damaged_length_mid_file_halts_open() {
    let dir = TempDir::new().unwrap();
    let def = orders();
    {
        let store = VersionedStore::open(&config(&dir)).unwrap();
        for i in 0..3 {
            let mut tx = store.begin();
            tx.table(&def).insert(order("a", i, 0.0, None)).unwrap();
            tx.commit().unwrap();
        }
    }
    let path = wal_path(dir.path());
    let mut bytes = fs::read(&path).unwrap();
    // SET, table 11, mask 0b10, 2 key columns, then the payload length.
    let at = WAL_HEADER_LEN + 4;
    assert_eq!(&bytes[WAL_HEADER_LEN..at], &[0x01, 0x0B, 0x02, 0x02]);
    assert!(bytes[at] < 0x7F);
    // Now reaches past the end of the file.
    bytes[at] = 0x7F;
    fs::write(&path, &bytes).unwrap();

    match VersionedStore::open(&config(&dir)) {
        Err(TxnError::Wal(e)) => assert_eq!(e.code(), "RELKV_WAL_CORRUPTION"),
        Err(other) => panic!("unexpected error {other}"),
        Ok(_) => panic!("damaged WAL opened"),
    }
    assert_eq!(fs::read(&path).unwrap(), bytes);
}

#[test]
fn test_wal_enabled_without_data_dir_is_rejected() {
    let config = StoreConfig::default();
    assert!(config.wal_enabled);
    assert!(matches!(
        VersionedStore::open(&config),
        Err(TxnError::Config(_))
    ));
}

#[test]
fn test_bad_header_halts_open() {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("wal")).unwrap();
    fs::write(wal_path(dir.path()), b"NOTAWAL!\x01\0\0\0\0\0\0\0").unwrap();
    assert!(matches!(
        VersionedStore::open(&config(&dir)),
        Err(TxnError::Wal(_))
    ));
}

#[test]
fn test_in_memory_config_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let def = orders();
    let mut config = StoreConfig::durable(dir.path());
    config.wal_enabled = false;
    let store = VersionedStore::open(&config).unwrap();
    let mut tx = store.begin();
    tx.table(&def).insert(order("a", 1, 1.0, None)).unwrap();
    tx.commit().unwrap();
    assert!(!wal_path(dir.path()).exists());
}
