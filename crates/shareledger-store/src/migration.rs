//! Database schema migrations for SQLite.
//!
//! A simple versioned migration system. Each migration transforms the schema
//! from version N to N+1 inside one transaction.

use rusqlite::Connection;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the database schema. Idempotent.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    if current > CURRENT_VERSION {
        return Err(StoreError::Migration(format!(
            "database schema version {} is newer than supported version {}",
            current, CURRENT_VERSION
        )));
    }

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, now_millis()],
            )?;
        }

        tx.commit()?;
        tracing::debug!(from = current, to = CURRENT_VERSION, "applied schema migrations");
    }

    Ok(())
}

fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: Initial schema.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- One row per co-signed transfer. Each row sits in two chains.
        CREATE TABLE share_records (
            id BLOB PRIMARY KEY,                  -- 32 bytes, blake3 of signable bytes
            sender BLOB NOT NULL,                 -- 32 bytes, Ed25519 public key
            receiver BLOB NOT NULL,
            prev_sender BLOB NOT NULL,            -- zero id for index 1
            prev_receiver BLOB NOT NULL,
            sender_record_index INTEGER NOT NULL,
            receiver_record_index INTEGER NOT NULL,
            sender_sent INTEGER NOT NULL DEFAULT 0,
            sender_received INTEGER NOT NULL DEFAULT 0,
            receiver_sent INTEGER NOT NULL DEFAULT 0,
            receiver_received INTEGER NOT NULL DEFAULT 0,
            request_hash BLOB NOT NULL,
            file_hash BLOB NOT NULL,
            chunk_hashes BLOB NOT NULL,           -- concatenated 32-byte hashes
            bytes_total INTEGER NOT NULL,
            visibility INTEGER NOT NULL DEFAULT 0,
            timestamp INTEGER NOT NULL,           -- Unix ms
            sender_sig BLOB NOT NULL,
            receiver_sig BLOB NOT NULL,
            ingested_at INTEGER NOT NULL
        );

        CREATE INDEX idx_records_sender ON share_records(sender, sender_record_index);
        CREATE INDEX idx_records_receiver ON share_records(receiver, receiver_record_index);
        CREATE INDEX idx_records_timestamp ON share_records(timestamp);

        -- Cached, non-authoritative view of remote devices.
        CREATE TABLE peers (
            pubkey BLOB PRIMARY KEY,
            chain_head BLOB NOT NULL,
            chain_index INTEGER NOT NULL DEFAULT 0,
            total_sent INTEGER,
            total_received INTEGER,
            last_seen INTEGER NOT NULL,
            has_fork_evidence INTEGER NOT NULL DEFAULT 0,
            transport_type TEXT NOT NULL DEFAULT ''
        );

        CREATE INDEX idx_peers_last_seen ON peers(last_seen);

        CREATE TABLE files (
            file_hash BLOB PRIMARY KEY,
            file_name TEXT NOT NULL,
            file_size INTEGER NOT NULL,
            chunk_size INTEGER NOT NULL,
            chunk_hashes BLOB NOT NULL,
            origin BLOB NOT NULL,
            origin_sig BLOB NOT NULL,
            created_at INTEGER NOT NULL
        );

        CREATE INDEX idx_files_created ON files(created_at);

        CREATE TABLE transfer_requests (
            request_hash BLOB PRIMARY KEY,
            requester BLOB NOT NULL,
            file_hash BLOB NOT NULL,
            chunk_indices BLOB NOT NULL,          -- CBOR array of u32
            nonce BLOB NOT NULL,
            timestamp INTEGER NOT NULL,
            signature BLOB NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending'
        );

        CREATE INDEX idx_requests_status ON transfer_requests(status, timestamp);

        CREATE TABLE checkpoints (
            device BLOB NOT NULL,
            chain_head BLOB NOT NULL,
            chain_index INTEGER NOT NULL,
            total_sent INTEGER NOT NULL,
            total_received INTEGER NOT NULL,
            raw_balance INTEGER NOT NULL,
            confidence_bps INTEGER NOT NULL,
            created_at INTEGER NOT NULL,
            device_sig BLOB NOT NULL,
            witnesses BLOB NOT NULL,              -- CBOR array of witness signatures
            PRIMARY KEY (device, chain_index, created_at)
        );

        CREATE TABLE fork_evidence (
            device BLOB NOT NULL,
            record_a BLOB NOT NULL,
            record_b BLOB NOT NULL,
            reporter BLOB NOT NULL,
            reporter_sig BLOB NOT NULL,
            detected_at INTEGER NOT NULL,
            PRIMARY KEY (device, record_a, record_b)
        );
        "#,
    )?;

    Ok(())
}

fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_creates_tables() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        for table in [
            "share_records",
            "peers",
            "files",
            "transfer_requests",
            "checkpoints",
            "fork_evidence",
            "schema_migrations",
        ] {
            assert!(tables.contains(&table.to_string()), "missing table {}", table);
        }
    }

    #[test]
    fn test_migration_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        migrate(&mut conn).unwrap();
        migrate(&mut conn).unwrap();

        let version: u32 = conn
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[test]
    fn test_newer_schema_rejected() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        conn.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, 0)",
            [CURRENT_VERSION + 1],
        )
        .unwrap();

        assert!(matches!(migrate(&mut conn), Err(StoreError::Migration(_))));
    }
}
