// 🚨 Economy Errors - One taxonomy for every financial workflow
//
// Business-rule failures carry a reason the caller can show to a student.
// Store failures are folded into Persistence (or Conflict when SQLite
// reports that another writer holds the lock).

use rusqlite::ErrorCode;

#[derive(Debug, thiserror::Error)]
pub enum EconomyError {
    /// Malformed or out-of-range input
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Insufficient funds in {account}: required {required:.2}, available {available:.2}")]
    InsufficientFunds {
        account: String,
        required: f64,
        available: f64,
    },

    #[error("Insufficient holdings of {symbol}: requested {requested}, held {held}")]
    InsufficientHoldings {
        symbol: String,
        requested: f64,
        held: f64,
    },

    #[error("Selling would leave {remaining} {symbol}, below the minimum holding of {minimum}")]
    BelowMinimumHolding {
        symbol: String,
        remaining: f64,
        minimum: f64,
    },

    /// Loan eligibility or credit-tier failure
    #[error("Not eligible: {0}")]
    NotEligible(String),

    /// Loan amount or duration above the tier cap
    #[error("Limit exceeded: {0}")]
    LimitExceeded(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// The session lacks the role the operation needs
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Persistence error: {0}")]
    Persistence(#[source] rusqlite::Error),
}

impl EconomyError {
    pub fn validation(msg: impl Into<String>) -> Self {
        EconomyError::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        EconomyError::NotFound(msg.into())
    }

    /// Short machine-readable name, used in API payloads and batch results
    pub fn kind(&self) -> &'static str {
        match self {
            EconomyError::Validation(_) => "validation_error",
            EconomyError::InsufficientFunds { .. } => "insufficient_funds",
            EconomyError::InsufficientHoldings { .. } => "insufficient_holdings",
            EconomyError::BelowMinimumHolding { .. } => "below_minimum_holding",
            EconomyError::NotEligible(_) => "not_eligible",
            EconomyError::LimitExceeded(_) => "limit_exceeded",
            EconomyError::NotFound(_) => "not_found",
            EconomyError::Forbidden(_) => "forbidden",
            EconomyError::Conflict(_) => "conflict",
            EconomyError::Persistence(_) => "persistence_error",
        }
    }
}

impl From<rusqlite::Error> for EconomyError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _)
                if e.code == ErrorCode::DatabaseBusy || e.code == ErrorCode::DatabaseLocked =>
            {
                EconomyError::Conflict(format!("store is busy, retry the operation ({})", err))
            }
            _ => EconomyError::Persistence(err),
        }
    }
}

pub type EconomyResult<T> = Result<T, EconomyError>;

/// Reject NaN, infinities, zero and negative amounts
pub fn ensure_positive(field: &str, amount: f64) -> EconomyResult<()> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(EconomyError::Validation(format!(
            "{} must be a positive amount, got {}",
            field, amount
        )));
    }
    Ok(())
}
