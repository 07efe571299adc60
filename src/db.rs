// 🗄️ Store - SQLite schema, connection setup and the atomic unit of work
//
// Every financial workflow runs inside `atomically`, which opens an
// IMMEDIATE transaction: the write lock is held from the first read to the
// commit, so a balance check can never be stale by the time the debit lands.

use crate::error::EconomyResult;
use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, TransactionBehavior};
use std::path::Path;
use std::time::Duration;

/// Tolerance for float quantities and balances treated as zero
pub const EPSILON: f64 = 1e-9;

/// Open (or create) the economy database at `path` and make sure the schema exists
pub fn open_database(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open database at {:?}", path))?;
    conn.busy_timeout(Duration::from_secs(5))?;
    setup_database(&conn).context("Failed to initialize schema")?;
    Ok(conn)
}

/// In-memory store, used by tests and dry runs
pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    setup_database(&conn)?;
    Ok(conn)
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    // ==========================================================================
    // Classrooms & Students
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS classrooms (
            teacher_id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            join_code TEXT UNIQUE NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students (
            id TEXT PRIMARY KEY,
            teacher_id TEXT NOT NULL REFERENCES classrooms(teacher_id),
            name TEXT NOT NULL,
            credit_score INTEGER NOT NULL,
            active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Ledger: student accounts and macro entities (balances never negative)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS accounts (
            student_id TEXT NOT NULL REFERENCES students(id),
            kind TEXT NOT NULL CHECK (kind IN ('checking', 'savings', 'investment')),
            balance REAL NOT NULL DEFAULT 0 CHECK (balance >= 0),
            updated_at TEXT NOT NULL,
            PRIMARY KEY (student_id, kind)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS macro_entities (
            teacher_id TEXT NOT NULL REFERENCES classrooms(teacher_id),
            kind TEXT NOT NULL CHECK (kind IN ('government', 'bank', 'securities')),
            balance REAL NOT NULL DEFAULT 0 CHECK (balance >= 0),
            updated_at TEXT NOT NULL,
            PRIMARY KEY (teacher_id, kind)
        )",
        [],
    )?;

    // ==========================================================================
    // Assets & Holdings
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS assets (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            symbol TEXT UNIQUE NOT NULL,
            name TEXT NOT NULL,
            category TEXT NOT NULL,
            currency TEXT NOT NULL,
            min_quantity REAL NOT NULL CHECK (min_quantity > 0),
            current_price REAL NOT NULL CHECK (current_price >= 0),
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS holdings (
            student_id TEXT NOT NULL REFERENCES students(id),
            asset_id INTEGER NOT NULL REFERENCES assets(id),
            quantity REAL NOT NULL CHECK (quantity > 0),
            average_price REAL NOT NULL CHECK (average_price >= 0),
            total_invested REAL NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (student_id, asset_id)
        )",
        [],
    )?;

    // ==========================================================================
    // Transaction Log (append-only, enforced by triggers below)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS transactions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            tx_uuid TEXT UNIQUE NOT NULL,
            teacher_id TEXT NOT NULL,
            from_student TEXT,
            to_student TEXT,
            entity TEXT,
            account_kind TEXT,
            amount REAL NOT NULL,
            fee REAL NOT NULL DEFAULT 0,
            tx_type TEXT NOT NULL,
            description TEXT NOT NULL,
            status TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TRIGGER IF NOT EXISTS transactions_no_update
         BEFORE UPDATE ON transactions
         BEGIN
            SELECT RAISE(ABORT, 'transaction log is append-only');
         END",
        [],
    )?;

    conn.execute(
        "CREATE TRIGGER IF NOT EXISTS transactions_no_delete
         BEFORE DELETE ON transactions
         BEGIN
            SELECT RAISE(ABORT, 'transaction log is append-only');
         END",
        [],
    )?;

    // ==========================================================================
    // Loans & Seats
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS loans (
            id TEXT PRIMARY KEY,
            teacher_id TEXT NOT NULL,
            student_id TEXT NOT NULL REFERENCES students(id),
            principal REAL NOT NULL,
            annual_rate REAL NOT NULL,
            duration_weeks INTEGER NOT NULL,
            weekly_payment REAL NOT NULL,
            total_payment REAL NOT NULL,
            remaining_balance REAL NOT NULL CHECK (remaining_balance >= 0),
            remaining_weeks INTEGER NOT NULL,
            status TEXT NOT NULL CHECK (status IN ('active', 'completed', 'overdue')),
            next_payment_due TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS seats (
            teacher_id TEXT NOT NULL REFERENCES classrooms(teacher_id),
            seat_number INTEGER NOT NULL,
            owner_id TEXT REFERENCES students(id),
            purchase_price REAL,
            purchase_date TEXT,
            current_price REAL NOT NULL DEFAULT 0,
            PRIMARY KEY (teacher_id, seat_number)
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_teacher ON students(teacher_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_tx_from ON transactions(from_student)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_tx_to ON transactions(to_student)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_tx_teacher_type ON transactions(teacher_id, tx_type)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_loans_student ON loans(student_id, status)",
        [],
    )?;

    Ok(())
}

/// Run `op` as one all-or-nothing unit.
///
/// Commits when `op` returns Ok; any error drops the transaction, which
/// rolls back every write `op` made.
pub fn atomically<T, F>(conn: &mut Connection, op: F) -> EconomyResult<T>
where
    F: FnOnce(&rusqlite::Transaction<'_>) -> EconomyResult<T>,
{
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let value = op(&tx)?;
    tx.commit()?;
    Ok(value)
}

// ============================================================================
// TIME HELPERS
// ============================================================================

/// Fixed-width RFC 3339 (millisecond precision, `Z` suffix) so text order is time order
pub fn timestamp(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_timestamp(column: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                column,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })
}

/// Whether a failed statement violated the UNIQUE constraint on `column` (`table.column`)
pub fn is_unique_violation(err: &rusqlite::Error, column: &str) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, Some(msg))
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            msg.contains("UNIQUE") && msg.contains(column)
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EconomyError;
    use rusqlite::params;

    #[test]
    fn test_setup_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        setup_database(&conn).unwrap();

        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'
                 AND name IN ('classrooms', 'students', 'accounts', 'macro_entities',
                              'assets', 'holdings', 'transactions', 'loans', 'seats')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 9);
    }

    #[test]
    fn test_transaction_log_is_append_only() {
        let conn = open_in_memory().unwrap();
        conn.execute(
            "INSERT INTO transactions (tx_uuid, teacher_id, amount, tx_type, description, status, created_at)
             VALUES ('u-1', 't-1', 10.0, 'transfer', 'test', 'completed', ?1)",
            params![timestamp(Utc::now())],
        )
        .unwrap();

        let update = conn.execute("UPDATE transactions SET amount = 99 WHERE tx_uuid = 'u-1'", []);
        assert!(update.is_err());

        let delete = conn.execute("DELETE FROM transactions WHERE tx_uuid = 'u-1'", []);
        assert!(delete.is_err());

        let amount: f64 = conn
            .query_row(
                "SELECT amount FROM transactions WHERE tx_uuid = 'u-1'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(amount, 10.0);
    }

    #[test]
    fn test_atomically_rolls_back_on_error() {
        let mut conn = open_in_memory().unwrap();
        conn.execute(
            "INSERT INTO classrooms (teacher_id, name, join_code, created_at) VALUES ('t-1', 'A', 'CODE1', 'now')",
            [],
        )
        .unwrap();

        let result: EconomyResult<()> = atomically(&mut conn, |tx| {
            tx.execute("UPDATE classrooms SET name = 'B' WHERE teacher_id = 't-1'", [])?;
            Err(EconomyError::validation("abort after write"))
        });
        assert!(result.is_err());

        let name: String = conn
            .query_row("SELECT name FROM classrooms WHERE teacher_id = 't-1'", [], |row| row.get(0))
            .unwrap();
        assert_eq!(name, "A", "write before the failure must be rolled back");
    }

    #[test]
    fn test_timestamp_round_trip_and_ordering() {
        let earlier = Utc::now();
        let later = earlier + chrono::Duration::milliseconds(1500);

        let a = timestamp(earlier);
        let b = timestamp(later);
        assert_eq!(a.len(), b.len());
        assert!(a < b);

        let parsed = parse_timestamp(0, &b).unwrap();
        assert_eq!(parsed.timestamp_millis(), later.timestamp_millis());
    }

    #[test]
    fn test_unique_violation_detection() {
        let conn = open_in_memory().unwrap();
        conn.execute(
            "INSERT INTO classrooms (teacher_id, name, join_code, created_at) VALUES ('t-1', 'A', 'SAME', 'now')",
            [],
        )
        .unwrap();

        let err = conn
            .execute(
                "INSERT INTO classrooms (teacher_id, name, join_code, created_at) VALUES ('t-2', 'B', 'SAME', 'now')",
                [],
            )
            .unwrap_err();
        assert!(is_unique_violation(&err, "classrooms.join_code"));
        assert!(!is_unique_violation(&err, "classrooms.teacher_id"));
    }
}
