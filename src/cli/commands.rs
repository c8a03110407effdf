//! CLI command implementations
//!
//! Commands operate on the WAL under a data directory. `verify` replays
//! with the store's own recovery path but never writes: a torn tail is
//! reported and left for the next open to truncate.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde_json::{json, Value as Json};
use tracing::info;

use crate::config::StoreConfig;
use crate::mvcc::VersionedStore;
use crate::wal::{wal_path, CommitRecord, WalEntry, WalReader, WalWriter};

use super::args::{Command, StoreArgs};
use super::errors::{CliError, CliResult};
use super::io::{stdout, write_line, write_response};

/// Parse arguments and run the selected command.
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command, &mut stdout())
}

/// Run the appropriate command, writing results to `out`.
pub fn run_command<W: Write>(cmd: Command, out: &mut W) -> CliResult<()> {
    match cmd {
        Command::Init { store } => init(&resolve(&store)?, out),
        Command::WalDump { store } => wal_dump(&resolve(&store)?, out),
        Command::Verify { store } => verify(&resolve(&store)?, out),
    }
}

/// Builds the store configuration from `--config` and `--data-dir`.
fn resolve(args: &StoreArgs) -> CliResult<StoreConfig> {
    let mut config = match &args.config {
        Some(path) => StoreConfig::read(path)?,
        None => StoreConfig::default(),
    };
    if let Some(dir) = &args.data_dir {
        config.data_dir = Some(dir.clone());
    }
    if config.data_dir.is_none() {
        return Err(CliError::config_error(
            "no data directory: pass --data-dir or set data_dir in the config",
        ));
    }
    config.validate()?;
    Ok(config)
}

fn data_dir(config: &StoreConfig) -> CliResult<&Path> {
    config
        .data_dir
        .as_deref()
        .ok_or_else(|| CliError::config_error("no data directory"))
}

fn existing_wal(config: &StoreConfig) -> CliResult<PathBuf> {
    let path = wal_path(data_dir(config)?);
    match fs::metadata(&path) {
        Ok(m) if m.len() > 0 => Ok(path),
        Ok(_) => Err(CliError::not_initialized()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(CliError::not_initialized()),
        Err(e) => Err(e.into()),
    }
}

/// Creates `<data_dir>/wal/relkv.wal` holding only the header.
pub fn init<W: Write>(config: &StoreConfig, out: &mut W) -> CliResult<()> {
    let dir = data_dir(config)?;
    if existing_wal(config).is_ok() {
        return Err(CliError::already_initialized());
    }
    let writer = WalWriter::open(dir, config.sync_on_commit)?;
    info!(path = %writer.path().display(), "initialized data directory");
    write_response(out, json!({ "wal": writer.path().display().to_string() }))
}

/// Prints one JSON line per record, then a summary response.
pub fn wal_dump<W: Write>(config: &StoreConfig, out: &mut W) -> CliResult<()> {
    let path = existing_wal(config)?;
    let mut reader = WalReader::open(&path)?;
    let mut version = 0u64;
    while let Some(record) = reader.read_next()? {
        version += 1;
        write_line(out, &record_json(version, &record))?;
    }
    write_response(
        out,
        json!({
            "records": reader.records_read(),
            "valid_bytes": reader.valid_len(),
            "torn_bytes": reader.torn_bytes(),
        }),
    )
}

/// Replays the WAL into a detached store and reports what was recovered.
pub fn verify<W: Write>(config: &StoreConfig, out: &mut W) -> CliResult<()> {
    if config.wal_dir().is_none() {
        return Err(CliError::config_error(
            "verify needs the mvcc engine with wal_enabled",
        ));
    }
    let path = existing_wal(config)?;
    let (store, torn_bytes) = VersionedStore::replay_detached(&path)?;
    let metrics = store.metrics().snapshot();
    write_response(
        out,
        json!({
            "version": store.version().value(),
            "records_replayed": metrics.wal_records_replayed,
            "rows": store.live_rows(),
            "tombstones": store.committed_len() - store.live_rows(),
            "torn_bytes": torn_bytes,
        }),
    )
}

fn record_json(version: u64, record: &CommitRecord) -> Json {
    let entries: Vec<Json> = record
        .entries
        .iter()
        .map(|entry| match entry {
            WalEntry::Set {
                table_id,
                reverse_mask,
                key_count,
                row,
            } => json!({
                "op": "set",
                "table_id": table_id,
                "reverse_mask": reverse_mask,
                "key_count": key_count,
                "row": row,
            }),
            WalEntry::Delete {
                table_id,
                reverse_mask,
                key,
            } => json!({
                "op": "delete",
                "table_id": table_id,
                "reverse_mask": reverse_mask,
                "key": key,
            }),
        })
        .collect();
    json!({ "version": version, "entries": entries })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ColumnKey, ColumnType, TableDef, Value};
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> StoreConfig {
        StoreConfig::durable(dir.path()).with_sync_on_commit(false)
    }

    fn lines(out: &[u8]) -> Vec<Json> {
        String::from_utf8(out.to_vec())
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    fn seed(config: &StoreConfig) {
        let def = TableDef::new(
            "t",
            1,
            vec![
                ("k".to_string(), ColumnType::Int64),
                ("v".to_string(), ColumnType::String),
            ],
            vec![ColumnKey::asc(0)],
        )
        .unwrap();
        let store = VersionedStore::open(config).unwrap();
        let mut tx = store.begin();
        tx.table(&def)
            .insert(vec![Value::Int64(1), Value::from("a")])
            .unwrap();
        tx.table(&def)
            .insert(vec![Value::Int64(2), Value::from("b")])
            .unwrap();
        tx.commit().unwrap();
        let mut tx = store.begin();
        assert!(tx.table(&def).delete(&[Value::Int64(1)]).unwrap());
        tx.commit().unwrap();
    }

    #[test]
    fn test_init_creates_wal_once() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        let mut out = Vec::new();
        init(&config, &mut out).unwrap();
        assert!(wal_path(dir.path()).exists());
        assert_eq!(lines(&out)[0]["status"], "ok");

        let err = init(&config, &mut Vec::new()).unwrap_err();
        assert_eq!(err.code_str(), "RELKV_CLI_ALREADY_INITIALIZED");
    }

    #[test]
    fn test_dump_without_wal_is_not_initialized() {
        let dir = TempDir::new().unwrap();
        let err = wal_dump(&config(&dir), &mut Vec::new()).unwrap_err();
        assert_eq!(err.code_str(), "RELKV_CLI_NOT_INITIALIZED");
    }

    #[test]
    fn test_wal_dump_lists_records() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        seed(&config);

        let mut out = Vec::new();
        wal_dump(&config, &mut out).unwrap();
        let lines = lines(&out);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0]["version"], 1);
        assert_eq!(lines[0]["entries"].as_array().unwrap().len(), 2);
        assert_eq!(lines[1]["entries"][0]["op"], "delete");
        assert_eq!(lines[2]["data"]["records"], 2);
        assert_eq!(lines[2]["data"]["torn_bytes"], 0);
    }

    #[test]
    fn test_verify_reports_recovered_state() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        seed(&config);

        let mut out = Vec::new();
        verify(&config, &mut out).unwrap();
        let lines = lines(&out);
        let data = &lines[0]["data"];
        assert_eq!(data["version"], 2);
        assert_eq!(data["rows"], 1);
        assert_eq!(data["tombstones"], 1);
        assert_eq!(data["records_replayed"], 2);
    }

    #[test]
    fn test_verify_leaves_torn_tail_in_place() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        seed(&config);
        let path = wal_path(dir.path());
        let mut bytes = fs::read(&path).unwrap();
        bytes.extend_from_slice(&[0x02, 0x01]);
        fs::write(&path, &bytes).unwrap();

        let mut out = Vec::new();
        verify(&config, &mut out).unwrap();
        let data = &lines(&out)[0]["data"];
        assert_eq!(data["version"], 2);
        assert_eq!(data["torn_bytes"], 2);
        assert_eq!(fs::read(&path).unwrap(), bytes);
    }

    #[test]
    fn test_verify_rejects_config_without_wal() {
        let dir = TempDir::new().unwrap();
        seed(&config(&dir));
        let memory = config(&dir).with_engine(crate::config::EngineKind::Memory);
        let err = verify(&memory, &mut Vec::new()).unwrap_err();
        assert_eq!(err.code_str(), "RELKV_CLI_CONFIG_ERROR");
    }

    #[test]
    fn test_resolve_applies_data_dir_over_config_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("relkv.json");
        fs::write(&path, r#"{"sync_on_commit": false}"#).unwrap();
        let config = resolve(&StoreArgs {
            data_dir: Some(dir.path().to_path_buf()),
            config: Some(path),
        })
        .unwrap();
        assert_eq!(config.wal_dir(), Some(dir.path()));
        assert!(!config.sync_on_commit);
    }

    #[test]
    fn test_resolve_requires_data_dir() {
        let err = resolve(&StoreArgs::default()).unwrap_err();
        assert_eq!(err.code_str(), "RELKV_CLI_CONFIG_ERROR");
        let config = resolve(&StoreArgs {
            data_dir: Some(PathBuf::from("/srv/relkv")),
            config: None,
        })
        .unwrap();
        assert_eq!(config.wal_dir(), Some(Path::new("/srv/relkv")));
    }
}
