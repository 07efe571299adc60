// 📜 Transaction Log - Append-only record of every value movement
//
// Entries are written in the same store transaction as the movement they
// describe and are never updated or deleted afterwards (triggers in the
// schema reject both). Statements and statistics read from here.

use crate::db::{parse_timestamp, timestamp};
use crate::entities::sql_text_enum;
use crate::entities::{AccountKind, MacroKind};
use crate::error::{EconomyError, EconomyResult};
use anyhow::Context;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::io;
use std::str::FromStr;

// ============================================================================
// TYPES & STATUS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Transfer,
    Allowance,
    Tax,
    BrokerageFee,
    TradingTax,
    LoanDisbursement,
    LoanRepayment,
    InvestmentBuy,
    InvestmentSell,
    RealEstatePurchase,
    RealEstateSale,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Transfer => "transfer",
            TransactionType::Allowance => "allowance",
            TransactionType::Tax => "tax",
            TransactionType::BrokerageFee => "brokerage_fee",
            TransactionType::TradingTax => "trading_tax",
            TransactionType::LoanDisbursement => "loan_disbursement",
            TransactionType::LoanRepayment => "loan_repayment",
            TransactionType::InvestmentBuy => "investment_buy",
            TransactionType::InvestmentSell => "investment_sell",
            TransactionType::RealEstatePurchase => "real_estate_purchase",
            TransactionType::RealEstateSale => "real_estate_sale",
        }
    }
}

impl FromStr for TransactionType {
    type Err = EconomyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tx_type = match s {
            "transfer" => TransactionType::Transfer,
            "allowance" => TransactionType::Allowance,
            "tax" => TransactionType::Tax,
            "brokerage_fee" => TransactionType::BrokerageFee,
            "trading_tax" => TransactionType::TradingTax,
            "loan_disbursement" => TransactionType::LoanDisbursement,
            "loan_repayment" => TransactionType::LoanRepayment,
            "investment_buy" => TransactionType::InvestmentBuy,
            "investment_sell" => TransactionType::InvestmentSell,
            "real_estate_purchase" => TransactionType::RealEstatePurchase,
            "real_estate_sale" => TransactionType::RealEstateSale,
            other => {
                return Err(EconomyError::Validation(format!(
                    "unknown transaction type: {}",
                    other
                )))
            }
        };
        Ok(tx_type)
    }
}

sql_text_enum!(TransactionType);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Completed,

    /// Attempted but rejected; no value moved
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
        }
    }
}

impl FromStr for TransactionStatus {
    type Err = EconomyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "completed" => Ok(TransactionStatus::Completed),
            "failed" => Ok(TransactionStatus::Failed),
            other => Err(EconomyError::Validation(format!(
                "unknown transaction status: {}",
                other
            ))),
        }
    }
}

sql_text_enum!(TransactionStatus);

// ============================================================================
// TRANSACTION RECORD
// ============================================================================

/// One immutable log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: String,
    pub teacher_id: String,

    /// Student the value left (None for issuance)
    pub from_student: Option<String>,

    /// Student the value reached (None for fees and payments to entities)
    pub to_student: Option<String>,

    /// Macro entity on the other side, if any
    pub entity: Option<MacroKind>,

    /// Student account that was touched
    pub account_kind: Option<AccountKind>,

    pub amount: f64,
    pub fee: f64,
    pub tx_type: TransactionType,
    pub description: String,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
}

impl TransactionRecord {
    pub fn new(
        teacher_id: &str,
        tx_type: TransactionType,
        amount: f64,
        description: impl Into<String>,
    ) -> Self {
        TransactionRecord {
            id: uuid::Uuid::new_v4().to_string(),
            teacher_id: teacher_id.to_string(),
            from_student: None,
            to_student: None,
            entity: None,
            account_kind: None,
            amount,
            fee: 0.0,
            tx_type,
            description: description.into(),
            status: TransactionStatus::Completed,
            created_at: Utc::now(),
        }
    }

    pub fn from_student(mut self, student_id: &str) -> Self {
        self.from_student = Some(student_id.to_string());
        self
    }

    pub fn to_student(mut self, student_id: &str) -> Self {
        self.to_student = Some(student_id.to_string());
        self
    }

    pub fn entity(mut self, kind: MacroKind) -> Self {
        self.entity = Some(kind);
        self
    }

    pub fn account(mut self, kind: AccountKind) -> Self {
        self.account_kind = Some(kind);
        self
    }

    pub fn fee(mut self, fee: f64) -> Self {
        self.fee = fee;
        self
    }

    pub fn failed(mut self) -> Self {
        self.status = TransactionStatus::Failed;
        self
    }

    pub fn involves(&self, student_id: &str) -> bool {
        self.from_student.as_deref() == Some(student_id)
            || self.to_student.as_deref() == Some(student_id)
    }

    const COLUMNS: &'static str = "tx_uuid, teacher_id, from_student, to_student, entity,
         account_kind, amount, fee, tx_type, description, status, created_at";

    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        let created_at: String = row.get(11)?;
        Ok(TransactionRecord {
            id: row.get(0)?,
            teacher_id: row.get(1)?,
            from_student: row.get(2)?,
            to_student: row.get(3)?,
            entity: row.get(4)?,
            account_kind: row.get(5)?,
            amount: row.get(6)?,
            fee: row.get(7)?,
            tx_type: row.get(8)?,
            description: row.get(9)?,
            status: row.get(10)?,
            created_at: parse_timestamp(11, &created_at)?,
        })
    }
}

// ============================================================================
// APPEND & QUERY
// ============================================================================

pub fn append(conn: &Connection, record: &TransactionRecord) -> EconomyResult<()> {
    conn.execute(
        "INSERT INTO transactions (
            tx_uuid, teacher_id, from_student, to_student, entity, account_kind,
            amount, fee, tx_type, description, status, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            record.id,
            record.teacher_id,
            record.from_student,
            record.to_student,
            record.entity,
            record.account_kind,
            record.amount,
            record.fee,
            record.tx_type,
            record.description,
            record.status,
            timestamp(record.created_at),
        ],
    )?;

    Ok(())
}

pub fn find(conn: &Connection, teacher_id: &str, id: &str) -> EconomyResult<TransactionRecord> {
    let sql = format!(
        "SELECT {} FROM transactions WHERE teacher_id = ?1 AND tx_uuid = ?2",
        TransactionRecord::COLUMNS
    );
    conn.query_row(&sql, params![teacher_id, id], TransactionRecord::from_row)
        .optional()?
        .ok_or_else(|| EconomyError::not_found(format!("transaction {}", id)))
}

/// Newest first; entries where the student is on either side
pub fn entries_for_student(
    conn: &Connection,
    student_id: &str,
    limit: usize,
) -> EconomyResult<Vec<TransactionRecord>> {
    let sql = format!(
        "SELECT {} FROM transactions
         WHERE from_student = ?1 OR to_student = ?1
         ORDER BY id DESC LIMIT ?2",
        TransactionRecord::COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let entries = stmt
        .query_map(params![student_id, limit as i64], TransactionRecord::from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(entries)
}

pub fn entries_for_classroom(
    conn: &Connection,
    teacher_id: &str,
    limit: usize,
) -> EconomyResult<Vec<TransactionRecord>> {
    let sql = format!(
        "SELECT {} FROM transactions WHERE teacher_id = ?1 ORDER BY id DESC LIMIT ?2",
        TransactionRecord::COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let entries = stmt
        .query_map(params![teacher_id, limit as i64], TransactionRecord::from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(entries)
}

// ============================================================================
// STATISTICS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeTotal {
    pub tx_type: TransactionType,
    pub count: i64,
    pub total_amount: f64,
    pub total_fees: f64,
}

/// Completed entries grouped by type
pub fn classroom_stats(conn: &Connection, teacher_id: &str) -> EconomyResult<Vec<TypeTotal>> {
    let mut stmt = conn.prepare(
        "SELECT tx_type, COUNT(*), SUM(amount), SUM(fee)
         FROM transactions
         WHERE teacher_id = ?1 AND status = 'completed'
         GROUP BY tx_type
         ORDER BY tx_type",
    )?;

    let totals = stmt
        .query_map([teacher_id], |row| {
            Ok(TypeTotal {
                tx_type: row.get(0)?,
                count: row.get(1)?,
                total_amount: row.get(2)?,
                total_fees: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(totals)
}

// ============================================================================
// STATEMENT EXPORT
// ============================================================================

#[derive(Serialize)]
struct StatementRow<'a> {
    date: String,
    #[serde(rename = "type")]
    tx_type: &'a str,
    description: &'a str,
    from: &'a str,
    to: &'a str,
    account: &'a str,
    amount: f64,
    fee: f64,
    status: &'a str,
    id: &'a str,
}

/// Write entries as CSV; returns the number of rows written
pub fn export_statement_csv<W: io::Write>(
    writer: W,
    entries: &[TransactionRecord],
) -> anyhow::Result<usize> {
    let mut wtr = csv::Writer::from_writer(writer);

    for entry in entries {
        let counterparty = entry.entity.map(|e| e.as_str()).unwrap_or("");
        wtr.serialize(StatementRow {
            date: timestamp(entry.created_at),
            tx_type: entry.tx_type.as_str(),
            description: &entry.description,
            from: entry.from_student.as_deref().unwrap_or(counterparty),
            to: entry.to_student.as_deref().unwrap_or(counterparty),
            account: entry.account_kind.map(|k| k.as_str()).unwrap_or(""),
            amount: entry.amount,
            fee: entry.fee,
            status: entry.status.as_str(),
            id: &entry.id,
        })
        .context("Failed to write statement row")?;
    }

    wtr.flush().context("Failed to flush statement")?;
    Ok(entries.len())
}
