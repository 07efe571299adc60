// 🔤 Unique Codes - Short human-typable codes backed by a UNIQUE column
//
// Candidates are inserted directly; the store's UNIQUE constraint decides
// whether a code is free. No read-then-write window exists.

use crate::db::is_unique_violation;
use crate::error::{EconomyError, EconomyResult};
use rusqlite::Connection;
use sha2::{Digest, Sha256};
use tracing::debug;

/// Upper-case letters and digits without look-alikes (0/O, 1/I)
const ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

pub const MAX_ATTEMPTS: usize = 10;

/// Deterministic code for a seed; at most 32 characters (one SHA-256 digest)
pub fn code_from_seed(seed: &[u8], len: usize) -> String {
    Sha256::digest(seed)
        .iter()
        .take(len)
        .map(|b| ALPHABET[*b as usize % ALPHABET.len()] as char)
        .collect()
}

pub fn random_code(len: usize) -> String {
    code_from_seed(uuid::Uuid::new_v4().as_bytes(), len)
}

/// Insert a fresh random code via `insert`, retrying on collisions in `column`
/// (`table.column`, as SQLite names it in constraint errors)
pub fn generate_unique_code<F>(
    conn: &Connection,
    len: usize,
    column: &str,
    insert: F,
) -> EconomyResult<String>
where
    F: FnMut(&Connection, &str) -> rusqlite::Result<usize>,
{
    insert_first_free(
        conn,
        column,
        (0..MAX_ATTEMPTS).map(|_| random_code(len)),
        insert,
    )
}

/// Try each candidate in turn until one inserts without a UNIQUE violation
pub fn insert_first_free<I, F>(
    conn: &Connection,
    column: &str,
    candidates: I,
    mut insert: F,
) -> EconomyResult<String>
where
    I: IntoIterator<Item = String>,
    F: FnMut(&Connection, &str) -> rusqlite::Result<usize>,
{
    for code in candidates {
        match insert(conn, &code) {
            Ok(_) => return Ok(code),
            Err(e) if is_unique_violation(&e, column) => {
                debug!(code = %code, column, "code collision, retrying");
            }
            Err(e) => return Err(e.into()),
        }
    }

    Err(EconomyError::Conflict(format!(
        "could not allocate a unique value for {}",
        column
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::params;

    fn codes_table() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute("CREATE TABLE codes (code TEXT UNIQUE NOT NULL)", [])
            .unwrap();
        conn
    }

    fn insert_code(conn: &Connection, code: &str) -> rusqlite::Result<usize> {
        conn.execute("INSERT INTO codes (code) VALUES (?1)", params![code])
    }

    #[test]
    fn test_code_shape() {
        let code = random_code(6);
        assert_eq!(code.len(), 6);
        assert!(code.bytes().all(|b| ALPHABET.contains(&b)));

        assert_eq!(code_from_seed(b"seed", 8), code_from_seed(b"seed", 8));
        assert_ne!(code_from_seed(b"seed", 8), code_from_seed(b"other", 8));
    }

    #[test]
    fn test_collision_retries_next_candidate() {
        let conn = codes_table();
        insert_code(&conn, "TAKEN1").unwrap();

        let code = insert_first_free(
            &conn,
            "codes.code",
            vec!["TAKEN1".to_string(), "FREE22".to_string()],
            insert_code,
        )
        .unwrap();
        assert_eq!(code, "FREE22");
    }

    #[test]
    fn test_gives_up_after_candidates_exhausted() {
        let conn = codes_table();
        insert_code(&conn, "AAAA").unwrap();

        let err = insert_first_free(
            &conn,
            "codes.code",
            vec!["AAAA".to_string(), "AAAA".to_string()],
            insert_code,
        )
        .unwrap_err();
        assert!(matches!(err, EconomyError::Conflict(_)));
    }

    #[test]
    fn test_generate_unique_code_inserts() {
        let conn = codes_table();
        let code = generate_unique_code(&conn, 6, "codes.code", insert_code).unwrap();

        let stored: String = conn
            .query_row("SELECT code FROM codes", [], |row| row.get(0))
            .unwrap();
        assert_eq!(stored, code);
    }
}
