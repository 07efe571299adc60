// 🏦 Loan - Bank credit extended to a student

use super::sql_text_enum;
use crate::db::parse_timestamp;
use crate::error::EconomyError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    Active,
    Completed,

    /// Payment date passed without a repayment
    Overdue,
}

impl LoanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Active => "active",
            LoanStatus::Completed => "completed",
            LoanStatus::Overdue => "overdue",
        }
    }

    /// Still owes money (counts toward the concurrency cap)
    pub fn is_open(&self) -> bool {
        !matches!(self, LoanStatus::Completed)
    }
}

impl FromStr for LoanStatus {
    type Err = EconomyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(LoanStatus::Active),
            "completed" => Ok(LoanStatus::Completed),
            "overdue" => Ok(LoanStatus::Overdue),
            other => Err(EconomyError::Validation(format!(
                "unknown loan status: {}",
                other
            ))),
        }
    }
}

sql_text_enum!(LoanStatus);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loan {
    pub id: String,
    pub teacher_id: String,
    pub student_id: String,
    pub principal: f64,

    /// Percent per year, as quoted by the credit tier
    pub annual_rate: f64,

    pub duration_weeks: u32,

    /// Suggested installment from the amortization formula
    pub weekly_payment: f64,

    pub total_payment: f64,
    pub remaining_balance: f64,
    pub remaining_weeks: u32,
    pub status: LoanStatus,
    pub next_payment_due: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Loan {
    pub(crate) const COLUMNS: &'static str =
        "id, teacher_id, student_id, principal, annual_rate, duration_weeks, weekly_payment,
         total_payment, remaining_balance, remaining_weeks, status, next_payment_due,
         created_at, updated_at";

    pub(crate) fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        let next_payment_due: String = row.get(11)?;
        let created_at: String = row.get(12)?;
        let updated_at: String = row.get(13)?;

        Ok(Loan {
            id: row.get(0)?,
            teacher_id: row.get(1)?,
            student_id: row.get(2)?,
            principal: row.get(3)?,
            annual_rate: row.get(4)?,
            duration_weeks: row.get(5)?,
            weekly_payment: row.get(6)?,
            total_payment: row.get(7)?,
            remaining_balance: row.get(8)?,
            remaining_weeks: row.get(9)?,
            status: row.get(10)?,
            next_payment_due: parse_timestamp(11, &next_payment_due)?,
            created_at: parse_timestamp(12, &created_at)?,
            updated_at: parse_timestamp(13, &updated_at)?,
        })
    }

    pub fn is_past_due(&self, now: DateTime<Utc>) -> bool {
        self.status == LoanStatus::Active && self.next_payment_due < now
    }
}
