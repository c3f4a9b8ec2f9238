//! Global hash ledger — the uniqueness authority for prescription content.
//!
//! The ledger is content-addressed and system-wide: it deliberately does NOT
//! filter by user, so the same prescription uploaded by two different
//! patients is caught. `check_exists` is only a fast path to avoid wasted
//! uploads; two concurrent uploads can both see "not found". The write-path
//! constraint (primary key on `hash`) is the real correctness guarantee.

use chrono::NaiveDateTime;
use rusqlite::{params, Connection};
use thiserror::Error;

use crate::models::{HashRecord, UserId};

const DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Ledger backend error: {0}")]
    Backend(String),
}

impl From<rusqlite::Error> for LedgerError {
    fn from(e: rusqlite::Error) -> Self {
        LedgerError::Backend(e.to_string())
    }
}

/// Outcome of a registration attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    Registered,
    /// The hash was already present — either a duplicate upload or this
    /// upload losing the race against a concurrent one. Same treatment
    /// either way, which also makes `register` safe to retry.
    AlreadyRegistered,
}

/// The external deduplication ledger.
///
/// Both operations take the authenticated caller explicitly; the identity is
/// recorded for audit but never participates in uniqueness.
pub trait HashLedger {
    fn check_exists(&self, caller: &UserId, hash: &str) -> Result<bool, LedgerError>;

    fn register(&self, caller: &UserId, hash: &str) -> Result<RegisterOutcome, LedgerError>;
}

/// SQLite-backed ledger. `hash` is the primary key, so uniqueness is
/// enforced by the database no matter what the client-side check saw.
pub struct SqliteLedger {
    conn: Connection,
}

impl SqliteLedger {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    /// Fetch the full record for a hash, if registered.
    pub fn get_record(&self, hash: &str) -> Result<Option<HashRecord>, LedgerError> {
        let result = self.conn.query_row(
            "SELECT hash, registered_at, registered_by FROM hash_records WHERE hash = ?1",
            params![hash],
            |row| {
                Ok(HashRecord {
                    hash: row.get(0)?,
                    registered_at: NaiveDateTime::parse_from_str(
                        &row.get::<_, String>(1)?,
                        DATETIME_FMT,
                    )
                    .unwrap_or_default(),
                    registered_by: row.get::<_, Option<String>>(2)?.map(UserId),
                })
            },
        );
        match result {
            Ok(record) => Ok(Some(record)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl HashLedger for SqliteLedger {
    fn check_exists(&self, _caller: &UserId, hash: &str) -> Result<bool, LedgerError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM hash_records WHERE hash = ?1",
            params![hash],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn register(&self, caller: &UserId, hash: &str) -> Result<RegisterOutcome, LedgerError> {
        let inserted = self.conn.execute(
            "INSERT INTO hash_records (hash, registered_at, registered_by)
             VALUES (?1, datetime('now'), ?2)
             ON CONFLICT(hash) DO NOTHING",
            params![hash, caller.as_str()],
        )?;

        if inserted == 0 {
            tracing::debug!(hash, "Hash already registered");
            Ok(RegisterOutcome::AlreadyRegistered)
        } else {
            tracing::info!(hash, "Hash registered");
            Ok(RegisterOutcome::Registered)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;

    fn ledger() -> SqliteLedger {
        SqliteLedger::new(open_memory_database().unwrap())
    }

    fn alice() -> UserId {
        UserId("alice".to_string())
    }

    fn bob() -> UserId {
        UserId("bob".to_string())
    }

    #[test]
    fn unknown_hash_does_not_exist() {
        let ledger = ledger();
        assert!(!ledger.check_exists(&alice(), "h1").unwrap());
    }

    #[test]
    fn register_then_exists() {
        let ledger = ledger();
        assert_eq!(
            ledger.register(&alice(), "h1").unwrap(),
            RegisterOutcome::Registered
        );
        assert!(ledger.check_exists(&alice(), "h1").unwrap());
    }

    #[test]
    fn uniqueness_is_cross_user() {
        let ledger = ledger();
        ledger.register(&alice(), "h1").unwrap();

        // A different caller sees the same hash and cannot re-register it.
        assert!(ledger.check_exists(&bob(), "h1").unwrap());
        assert_eq!(
            ledger.register(&bob(), "h1").unwrap(),
            RegisterOutcome::AlreadyRegistered
        );
    }

    #[test]
    fn register_is_retry_safe() {
        let ledger = ledger();
        ledger.register(&alice(), "h1").unwrap();
        assert_eq!(
            ledger.register(&alice(), "h1").unwrap(),
            RegisterOutcome::AlreadyRegistered
        );
    }

    #[test]
    fn record_keeps_registrant_informationally() {
        let ledger = ledger();
        ledger.register(&alice(), "h1").unwrap();

        let record = ledger.get_record("h1").unwrap().unwrap();
        assert_eq!(record.hash, "h1");
        assert_eq!(record.registered_by, Some(alice()));
        assert!(ledger.get_record("h2").unwrap().is_none());
    }
}
