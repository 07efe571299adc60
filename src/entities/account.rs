// 💳 Accounts - Student cash accounts and classroom macro entities

use super::sql_text_enum;
use crate::error::EconomyError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

// ============================================================================
// ACCOUNT KIND
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    /// Everyday money: allowance, transfers, loans, seats
    Checking,

    Savings,

    /// Funds buy/sell orders by default
    Investment,
}

impl AccountKind {
    pub const ALL: [AccountKind; 3] = [
        AccountKind::Checking,
        AccountKind::Savings,
        AccountKind::Investment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AccountKind::Checking => "checking",
            AccountKind::Savings => "savings",
            AccountKind::Investment => "investment",
        }
    }
}

impl FromStr for AccountKind {
    type Err = EconomyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "checking" => Ok(AccountKind::Checking),
            "savings" => Ok(AccountKind::Savings),
            "investment" => Ok(AccountKind::Investment),
            other => Err(EconomyError::Validation(format!(
                "unsupported account type: {}",
                other
            ))),
        }
    }
}

sql_text_enum!(AccountKind);

/// All three balances of one student
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountBalances {
    pub student_id: String,
    pub checking: f64,
    pub savings: f64,
    pub investment: f64,
}

impl AccountBalances {
    pub fn get(&self, kind: AccountKind) -> f64 {
        match kind {
            AccountKind::Checking => self.checking,
            AccountKind::Savings => self.savings,
            AccountKind::Investment => self.investment,
        }
    }

    pub fn total(&self) -> f64 {
        self.checking + self.savings + self.investment
    }
}

// ============================================================================
// MACRO ENTITIES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MacroKind {
    /// Collects taxes, pays allowance, settles seat trades
    Government,

    /// Funds loan disbursements, receives repayments
    Bank,

    /// Collects brokerage fees
    Securities,
}

impl MacroKind {
    pub const ALL: [MacroKind; 3] = [MacroKind::Government, MacroKind::Bank, MacroKind::Securities];

    pub fn as_str(&self) -> &'static str {
        match self {
            MacroKind::Government => "government",
            MacroKind::Bank => "bank",
            MacroKind::Securities => "securities",
        }
    }
}

impl FromStr for MacroKind {
    type Err = EconomyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "government" => Ok(MacroKind::Government),
            "bank" => Ok(MacroKind::Bank),
            "securities" => Ok(MacroKind::Securities),
            other => Err(EconomyError::Validation(format!(
                "unknown macro entity: {}",
                other
            ))),
        }
    }
}

sql_text_enum!(MacroKind);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacroEntity {
    pub teacher_id: String,
    pub kind: MacroKind,
    pub balance: f64,
    pub updated_at: DateTime<Utc>,
}
