// 💰 Ledger Store - Student account balances and macro-entity reserves
//
// Balances never go negative. Debits are a single conditional UPDATE, so the
// sufficiency check and the decrement can't be split by another writer, and
// macro entities only ever change by atomic increment.

use crate::config::{OpeningBalances, Treasury};
use crate::db::{parse_timestamp, timestamp, EPSILON};
use crate::entities::{AccountBalances, AccountKind, MacroEntity, MacroKind};
use crate::error::{ensure_positive, EconomyError, EconomyResult};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use tracing::debug;

// ============================================================================
// STUDENT ACCOUNTS
// ============================================================================

pub fn get_balance(conn: &Connection, student_id: &str, kind: AccountKind) -> EconomyResult<f64> {
    conn.query_row(
        "SELECT balance FROM accounts WHERE student_id = ?1 AND kind = ?2",
        params![student_id, kind],
        |row| row.get(0),
    )
    .optional()?
    .ok_or_else(|| {
        EconomyError::not_found(format!("{} account of student {}", kind, student_id))
    })
}

pub fn balances(conn: &Connection, student_id: &str) -> EconomyResult<AccountBalances> {
    let mut stmt =
        conn.prepare("SELECT kind, balance FROM accounts WHERE student_id = ?1")?;
    let rows = stmt
        .query_map([student_id], |row| {
            Ok((row.get::<_, AccountKind>(0)?, row.get::<_, f64>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    if rows.is_empty() {
        return Err(EconomyError::not_found(format!("accounts of student {}", student_id)));
    }

    let mut balances = AccountBalances {
        student_id: student_id.to_string(),
        ..Default::default()
    };
    for (kind, balance) in rows {
        match kind {
            AccountKind::Checking => balances.checking = balance,
            AccountKind::Savings => balances.savings = balance,
            AccountKind::Investment => balances.investment = balance,
        }
    }

    Ok(balances)
}

/// Add `amount` to the account; returns the new balance
pub fn credit(
    conn: &Connection,
    student_id: &str,
    kind: AccountKind,
    amount: f64,
) -> EconomyResult<f64> {
    ensure_positive("amount", amount)?;

    let changed = conn.execute(
        "UPDATE accounts SET balance = balance + ?1, updated_at = ?2
         WHERE student_id = ?3 AND kind = ?4",
        params![amount, timestamp(Utc::now()), student_id, kind],
    )?;
    if changed == 0 {
        return Err(EconomyError::not_found(format!(
            "{} account of student {}",
            kind, student_id
        )));
    }

    debug!(student_id, account = %kind, amount, "credited");
    get_balance(conn, student_id, kind)
}

/// Take `amount` from the account; fails with InsufficientFunds and leaves
/// the balance untouched when it doesn't cover the amount
pub fn debit(
    conn: &Connection,
    student_id: &str,
    kind: AccountKind,
    amount: f64,
) -> EconomyResult<f64> {
    ensure_positive("amount", amount)?;

    // MAX(..., 0) absorbs float dust when the debit empties the account
    let changed = conn.execute(
        "UPDATE accounts SET balance = MAX(balance - ?1, 0), updated_at = ?2
         WHERE student_id = ?3 AND kind = ?4 AND balance + ?5 >= ?1",
        params![amount, timestamp(Utc::now()), student_id, kind, EPSILON],
    )?;
    if changed == 0 {
        let available = get_balance(conn, student_id, kind)?;
        return Err(EconomyError::InsufficientFunds {
            account: kind.to_string(),
            required: amount,
            available,
        });
    }

    debug!(student_id, account = %kind, amount, "debited");
    get_balance(conn, student_id, kind)
}

/// Create the three accounts of a newly enrolled student
pub(crate) fn open_accounts(
    conn: &Connection,
    student_id: &str,
    opening: &OpeningBalances,
) -> EconomyResult<()> {
    let now = timestamp(Utc::now());
    for kind in AccountKind::ALL {
        let balance = match kind {
            AccountKind::Checking => opening.checking,
            AccountKind::Savings => opening.savings,
            AccountKind::Investment => opening.investment,
        };
        if !balance.is_finite() || balance < 0.0 {
            return Err(EconomyError::validation(format!(
                "opening {} balance must be non-negative",
                kind
            )));
        }
        conn.execute(
            "INSERT INTO accounts (student_id, kind, balance, updated_at) VALUES (?1, ?2, ?3, ?4)",
            params![student_id, kind, balance, now],
        )?;
    }
    Ok(())
}

// ============================================================================
// MACRO ENTITIES
// ============================================================================

pub fn macro_balance(conn: &Connection, teacher_id: &str, kind: MacroKind) -> EconomyResult<f64> {
    conn.query_row(
        "SELECT balance FROM macro_entities WHERE teacher_id = ?1 AND kind = ?2",
        params![teacher_id, kind],
        |row| row.get(0),
    )
    .optional()?
    .ok_or_else(|| EconomyError::not_found(format!("{} of classroom {}", kind, teacher_id)))
}

pub fn macro_entities(conn: &Connection, teacher_id: &str) -> EconomyResult<Vec<MacroEntity>> {
    let mut stmt = conn.prepare(
        "SELECT teacher_id, kind, balance, updated_at FROM macro_entities
         WHERE teacher_id = ?1 ORDER BY kind",
    )?;
    let entities = stmt
        .query_map([teacher_id], |row| {
            let updated_at: String = row.get(3)?;
            Ok(MacroEntity {
                teacher_id: row.get(0)?,
                kind: row.get(1)?,
                balance: row.get(2)?,
                updated_at: parse_timestamp(3, &updated_at)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(entities)
}

/// Atomic increment; a missing entity is an error, never silently skipped
pub fn credit_macro(
    conn: &Connection,
    teacher_id: &str,
    kind: MacroKind,
    amount: f64,
) -> EconomyResult<()> {
    ensure_positive("amount", amount)?;

    let changed = conn.execute(
        "UPDATE macro_entities SET balance = balance + ?1, updated_at = ?2
         WHERE teacher_id = ?3 AND kind = ?4",
        params![amount, timestamp(Utc::now()), teacher_id, kind],
    )?;
    if changed == 0 {
        return Err(EconomyError::not_found(format!(
            "{} of classroom {}",
            kind, teacher_id
        )));
    }

    debug!(teacher_id, entity = %kind, amount, "macro entity credited");
    Ok(())
}

pub fn debit_macro(
    conn: &Connection,
    teacher_id: &str,
    kind: MacroKind,
    amount: f64,
) -> EconomyResult<()> {
    ensure_positive("amount", amount)?;

    let changed = conn.execute(
        "UPDATE macro_entities SET balance = MAX(balance - ?1, 0), updated_at = ?2
         WHERE teacher_id = ?3 AND kind = ?4 AND balance + ?5 >= ?1",
        params![amount, timestamp(Utc::now()), teacher_id, kind, EPSILON],
    )?;
    if changed == 0 {
        let available = macro_balance(conn, teacher_id, kind)?;
        return Err(EconomyError::InsufficientFunds {
            account: kind.to_string(),
            required: amount,
            available,
        });
    }

    debug!(teacher_id, entity = %kind, amount, "macro entity debited");
    Ok(())
}

pub(crate) fn open_macro_entities(
    conn: &Connection,
    teacher_id: &str,
    treasury: &Treasury,
) -> EconomyResult<()> {
    let now = timestamp(Utc::now());
    for kind in MacroKind::ALL {
        let balance = match kind {
            MacroKind::Government => treasury.government,
            MacroKind::Bank => treasury.bank,
            MacroKind::Securities => treasury.securities,
        };
        conn.execute(
            "INSERT INTO macro_entities (teacher_id, kind, balance, updated_at) VALUES (?1, ?2, ?3, ?4)",
            params![teacher_id, kind, balance, now],
        )?;
    }
    Ok(())
}

// ============================================================================
// MONEY SUPPLY
// ============================================================================

/// Where the classroom's money currently sits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoneySupply {
    pub student_cash: f64,
    pub government: f64,
    pub bank: f64,
    pub securities: f64,

    /// Principal still owed on open loans
    pub outstanding_loans: f64,
}

impl MoneySupply {
    pub fn macro_total(&self) -> f64 {
        self.government + self.bank + self.securities
    }

    /// Cash held by students and macro entities together
    pub fn circulating(&self) -> f64 {
        self.student_cash + self.macro_total()
    }
}

pub fn money_supply(conn: &Connection, teacher_id: &str) -> EconomyResult<MoneySupply> {
    let student_cash: f64 = conn.query_row(
        "SELECT COALESCE(SUM(a.balance), 0) FROM accounts a
         JOIN students s ON s.id = a.student_id
         WHERE s.teacher_id = ?1",
        [teacher_id],
        |row| row.get(0),
    )?;

    let outstanding_loans: f64 = conn.query_row(
        "SELECT COALESCE(SUM(remaining_balance), 0) FROM loans
         WHERE teacher_id = ?1 AND status != 'completed'",
        [teacher_id],
        |row| row.get(0),
    )?;

    let mut supply = MoneySupply {
        student_cash,
        government: 0.0,
        bank: 0.0,
        securities: 0.0,
        outstanding_loans,
    };
    for entity in macro_entities(conn, teacher_id)? {
        match entity.kind {
            MacroKind::Government => supply.government = entity.balance,
            MacroKind::Bank => supply.bank = entity.balance,
            MacroKind::Securities => supply.securities = entity.balance,
        }
    }

    Ok(supply)
}
