// 💸 Payments - Transfers, allowance and tax collection
//
// Transfers move cash between students or between a student's own accounts.
// Allowance and tax are teacher batches against the government entity;
// each student is settled in its own transaction so one failure doesn't
// hold back the rest of the class.

use crate::classroom;
use crate::db::atomically;
use crate::entities::{AccountKind, MacroKind};
use crate::error::{ensure_positive, EconomyError, EconomyResult};
use crate::ledger;
use crate::session::Session;
use crate::transaction_log::{self, TransactionRecord, TransactionType};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

// ============================================================================
// TRANSFERS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRequest {
    pub to_student: String,
    pub amount: f64,

    /// Same kind on both sides; checking when omitted
    #[serde(default)]
    pub account_type: Option<AccountKind>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferReceipt {
    pub transaction: TransactionRecord,
    pub remaining_balance: f64,
}

/// Student to student within one classroom
pub fn transfer(
    conn: &mut Connection,
    session: &Session,
    request: &TransferRequest,
) -> EconomyResult<TransferReceipt> {
    let from = session.require_student()?.to_string();
    let teacher_id = session.teacher_id.clone();
    let account = request.account_type.unwrap_or(AccountKind::Checking);
    ensure_positive("amount", request.amount)?;
    if request.to_student == from {
        return Err(EconomyError::validation("cannot transfer to yourself"));
    }

    let result = atomically(conn, |tx| {
        let sender = classroom::find_student(tx, &teacher_id, &from)?;
        let recipient = classroom::find_student(tx, &teacher_id, &request.to_student)?;

        let remaining_balance = ledger::debit(tx, &sender.id, account, request.amount)?;
        ledger::credit(tx, &recipient.id, account, request.amount)?;

        let record = TransactionRecord::new(
            &teacher_id,
            TransactionType::Transfer,
            request.amount,
            format!("Transfer from {} to {}", sender.name, recipient.name),
        )
        .from_student(&sender.id)
        .to_student(&recipient.id)
        .account(account);
        transaction_log::append(tx, &record)?;

        Ok(TransferReceipt {
            transaction: record,
            remaining_balance,
        })
    });

    match &result {
        Ok(_) => info!(
            from = %from,
            to = %request.to_student,
            amount = request.amount,
            "transfer completed"
        ),
        Err(e) => warn!(from = %from, to = %request.to_student, error = %e, "transfer rejected"),
    }
    result
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveFundsRequest {
    pub from_account: AccountKind,
    pub to_account: AccountKind,
    pub amount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveFundsReceipt {
    pub transaction: TransactionRecord,
    pub from_balance: f64,
    pub to_balance: f64,
}

/// Between the session student's own accounts, e.g. funding investment
pub fn move_funds(
    conn: &mut Connection,
    session: &Session,
    request: &MoveFundsRequest,
) -> EconomyResult<MoveFundsReceipt> {
    let student_id = session.require_student()?.to_string();
    let teacher_id = session.teacher_id.clone();
    ensure_positive("amount", request.amount)?;
    if request.from_account == request.to_account {
        return Err(EconomyError::validation("source and destination accounts are the same"));
    }

    let receipt = atomically(conn, |tx| {
        classroom::find_student(tx, &teacher_id, &student_id)?;
        let from_balance = ledger::debit(tx, &student_id, request.from_account, request.amount)?;
        let to_balance = ledger::credit(tx, &student_id, request.to_account, request.amount)?;

        let record = TransactionRecord::new(
            &teacher_id,
            TransactionType::Transfer,
            request.amount,
            format!("Move {} to {}", request.from_account, request.to_account),
        )
        .from_student(&student_id)
        .to_student(&student_id)
        .account(request.from_account);
        transaction_log::append(tx, &record)?;

        Ok(MoveFundsReceipt {
            transaction: record,
            from_balance,
            to_balance,
        })
    })?;

    info!(
        student_id = %student_id,
        from = %request.from_account,
        to = %request.to_account,
        amount = request.amount,
        "funds moved"
    );
    Ok(receipt)
}

// ============================================================================
// BATCHES
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub student_id: String,
    pub success: bool,
    pub amount: f64,
    pub transaction_id: Option<String>,
    pub error: Option<String>,
    pub error_kind: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchReport {
    pub succeeded: usize,
    pub failed: usize,
    pub total_amount: f64,
    pub outcomes: Vec<BatchOutcome>,
}

impl BatchReport {
    fn record_success(&mut self, student_id: &str, amount: f64, transaction_id: Option<String>) {
        self.succeeded += 1;
        self.total_amount += amount;
        self.outcomes.push(BatchOutcome {
            student_id: student_id.to_string(),
            success: true,
            amount,
            transaction_id,
            error: None,
            error_kind: None,
        });
    }

    fn record_failure(&mut self, student_id: &str, amount: f64, error: &EconomyError) {
        self.failed += 1;
        self.outcomes.push(BatchOutcome {
            student_id: student_id.to_string(),
            success: false,
            amount,
            transaction_id: None,
            error: Some(error.to_string()),
            error_kind: Some(error.kind().to_string()),
        });
    }
}

/// Explicit ids, or every active student when none are given
fn batch_targets(
    conn: &Connection,
    teacher_id: &str,
    ids: &[String],
) -> EconomyResult<Vec<String>> {
    if ids.is_empty() {
        classroom::active_student_ids(conn, teacher_id)
    } else {
        Ok(ids.to_vec())
    }
}

/// Keep a `failed` entry for an attempt that moved no money
fn log_failed_attempt(conn: &Connection, record: TransactionRecord) {
    let record = record.failed();
    if let Err(e) = transaction_log::append(conn, &record) {
        let student_id = record.from_student.as_ref().or(record.to_student.as_ref());
        warn!(student_id = ?student_id, error = %e, "could not log failed attempt");
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllowanceRequest {
    pub amount: f64,

    #[serde(default)]
    pub student_ids: Vec<String>,

    #[serde(default)]
    pub account_type: Option<AccountKind>,
}

/// Teacher action: government pays each student `amount`
pub fn pay_allowance(
    conn: &mut Connection,
    session: &Session,
    request: &AllowanceRequest,
) -> EconomyResult<BatchReport> {
    let teacher_id = session.require_teacher()?.to_string();
    ensure_positive("amount", request.amount)?;
    let account = request.account_type.unwrap_or(AccountKind::Checking);
    let amount = request.amount;

    let mut report = BatchReport::default();
    for student_id in batch_targets(conn, &teacher_id, &request.student_ids)? {
        let entry = TransactionRecord::new(
            &teacher_id,
            TransactionType::Allowance,
            amount,
            "Weekly allowance",
        )
        .to_student(&student_id)
        .entity(MacroKind::Government)
        .account(account);

        let paid = atomically(conn, |tx| {
            classroom::find_student(tx, &teacher_id, &student_id)?;
            ledger::debit_macro(tx, &teacher_id, MacroKind::Government, amount)?;
            ledger::credit(tx, &student_id, account, amount)?;
            transaction_log::append(tx, &entry)?;
            Ok(())
        });

        match paid {
            Ok(()) => report.record_success(&student_id, amount, Some(entry.id)),
            Err(e) => {
                warn!(student_id = %student_id, error = %e, "allowance not paid");
                if !matches!(e, EconomyError::NotFound(_)) {
                    log_failed_attempt(conn, entry);
                }
                report.record_failure(&student_id, amount, &e);
            }
        }
    }

    info!(
        teacher_id = %teacher_id,
        paid = report.succeeded,
        failed = report.failed,
        total = report.total_amount,
        "allowance batch finished"
    );
    Ok(report)
}

/// Percentage of the current balance, or a fixed amount
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaxLevy {
    Rate(f64),
    Amount(f64),
}

impl TaxLevy {
    fn validate(&self) -> EconomyResult<()> {
        match *self {
            TaxLevy::Rate(rate) if !(rate > 0.0 && rate <= 100.0) => Err(EconomyError::validation(
                format!("tax rate must be within (0, 100], got {}", rate),
            )),
            TaxLevy::Amount(amount) => ensure_positive("tax amount", amount),
            TaxLevy::Rate(_) => Ok(()),
        }
    }

    pub fn due(&self, balance: f64) -> f64 {
        match *self {
            TaxLevy::Rate(rate) => balance * rate / 100.0,
            TaxLevy::Amount(amount) => amount,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxCollectionRequest {
    /// `"rate": 5` or `"amount": 1000` at the top level of the request
    #[serde(flatten)]
    pub levy: TaxLevy,

    #[serde(default)]
    pub account_type: Option<AccountKind>,

    #[serde(default)]
    pub student_ids: Vec<String>,
}

/// Teacher action: each student pays the levy to the government
pub fn collect_tax(
    conn: &mut Connection,
    session: &Session,
    request: &TaxCollectionRequest,
) -> EconomyResult<BatchReport> {
    let teacher_id = session.require_teacher()?.to_string();
    request.levy.validate()?;
    let account = request.account_type.unwrap_or(AccountKind::Checking);

    let mut report = BatchReport::default();
    for student_id in batch_targets(conn, &teacher_id, &request.student_ids)? {
        let collected = atomically(conn, |tx| {
            classroom::find_student(tx, &teacher_id, &student_id)?;
            let due = request.levy.due(ledger::get_balance(tx, &student_id, account)?);
            if due <= 0.0 {
                return Ok(None);
            }

            ledger::debit(tx, &student_id, account, due)?;
            ledger::credit_macro(tx, &teacher_id, MacroKind::Government, due)?;
            let entry =
                TransactionRecord::new(&teacher_id, TransactionType::Tax, due, "Tax collection")
                    .from_student(&student_id)
                    .entity(MacroKind::Government)
                    .account(account);
            transaction_log::append(tx, &entry)?;
            Ok(Some(entry))
        });

        match collected {
            Ok(Some(entry)) => report.record_success(&student_id, entry.amount, Some(entry.id)),
            Ok(None) => report.record_success(&student_id, 0.0, None),
            Err(e) => {
                warn!(student_id = %student_id, error = %e, "tax not collected");
                let attempted = match &e {
                    EconomyError::InsufficientFunds { required, .. } => *required,
                    _ => request.levy.due(0.0),
                };
                if !matches!(e, EconomyError::NotFound(_)) {
                    let entry = TransactionRecord::new(
                        &teacher_id,
                        TransactionType::Tax,
                        attempted,
                        format!("Tax collection failed: {}", e.kind()),
                    )
                    .from_student(&student_id)
                    .entity(MacroKind::Government)
                    .account(account);
                    log_failed_attempt(conn, entry);
                }
                report.record_failure(&student_id, attempted, &e);
            }
        }
    }

    info!(
        teacher_id = %teacher_id,
        collected = report.succeeded,
        failed = report.failed,
        total = report.total_amount,
        "tax batch finished"
    );
    Ok(report)
}
