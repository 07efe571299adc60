// 🏦 Loan Engine - Credit tiers, amortization, origination and repayment
//
// The weekly rate is `annual_rate / 100 / 12`: a monthly-equivalent rate
// applied per week. Existing schedules depend on that exact figure, so it
// is kept as is. Repayments reduce `remaining_balance` directly; the
// schedule only suggests the weekly amount.

use crate::classroom;
use crate::config::{CreditTier, EconomyConfig, LoanPolicy};
use crate::db::{atomically, timestamp, EPSILON};
use crate::entities::{AccountKind, Loan, LoanStatus, MacroKind, Student};
use crate::error::{ensure_positive, EconomyError, EconomyResult};
use crate::ledger;
use crate::session::Session;
use crate::transaction_log::{self, TransactionRecord, TransactionType};
use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

const PAYMENT_INTERVAL_DAYS: i64 = 7;

/// Longest term any loan or schedule may run (ten years of weekly payments)
pub const MAX_DURATION_WEEKS: u32 = 520;

// ============================================================================
// AMORTIZATION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Amortization {
    pub weekly_rate: f64,
    pub weekly_payment: f64,
    pub total_payment: f64,
}

/// Annuity payment for `principal` over `weeks` at `annual_rate` percent
pub fn amortize(principal: f64, annual_rate: f64, weeks: u32) -> EconomyResult<Amortization> {
    ensure_positive("principal", principal)?;
    if weeks == 0 || weeks > MAX_DURATION_WEEKS {
        return Err(EconomyError::validation(format!(
            "duration must be between 1 and {} weeks, got {}",
            MAX_DURATION_WEEKS, weeks
        )));
    }
    if !annual_rate.is_finite() || annual_rate < 0.0 {
        return Err(EconomyError::validation("interest rate must be non-negative"));
    }

    let n = weeks as f64;
    // Monthly-equivalent rate compounded weekly; existing loan amounts depend on it
    let weekly_rate = annual_rate / 100.0 / 12.0;
    let weekly_payment = if weekly_rate == 0.0 {
        principal / n
    } else {
        let growth = (1.0 + weekly_rate).powi(weeks as i32);
        principal * weekly_rate * growth / (growth - 1.0)
    };

    let total_payment = weekly_payment * n;
    if !weekly_payment.is_finite() || !total_payment.is_finite() {
        return Err(EconomyError::validation(format!(
            "no finite payment for {} at {}% over {} weeks",
            principal, annual_rate, weeks
        )));
    }

    Ok(Amortization {
        weekly_rate,
        weekly_payment,
        total_payment,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScheduleRow {
    pub week: u32,
    pub payment: f64,
    pub interest: f64,
    pub principal: f64,
    pub balance: f64,
}

/// Suggested week-by-week split of each payment
pub fn amortization_schedule(
    principal: f64,
    annual_rate: f64,
    weeks: u32,
) -> EconomyResult<Vec<ScheduleRow>> {
    let terms = amortize(principal, annual_rate, weeks)?;

    let mut balance = principal;
    let mut rows = Vec::with_capacity(weeks as usize);
    for week in 1..=weeks {
        let interest = balance * terms.weekly_rate;
        // Last row absorbs rounding so the balance lands on zero
        let principal_part = if week == weeks {
            balance
        } else {
            terms.weekly_payment - interest
        };
        balance = (balance - principal_part).max(0.0);

        rows.push(ScheduleRow {
            week,
            payment: interest + principal_part,
            interest,
            principal: principal_part,
            balance,
        });
    }

    Ok(rows)
}

// ============================================================================
// ELIGIBILITY & QUOTES
// ============================================================================

fn open_loan_count(conn: &Connection, student: &Student) -> EconomyResult<usize> {
    let loans = loans_for_student(conn, &student.teacher_id, &student.id)?;
    Ok(loans.iter().filter(|loan| loan.status.is_open()).count())
}

/// Tier the student may borrow under for this amount and duration
fn check_eligibility(
    conn: &Connection,
    policy: &LoanPolicy,
    student: &Student,
    amount: f64,
    weeks: u32,
) -> EconomyResult<CreditTier> {
    ensure_positive("loan_amount", amount)?;
    if weeks == 0 {
        return Err(EconomyError::validation("duration must be at least one week"));
    }

    let open = open_loan_count(conn, student)?;
    if open >= policy.max_active_loans as usize {
        return Err(EconomyError::NotEligible(format!(
            "{} open loan(s), the limit is {}",
            open, policy.max_active_loans
        )));
    }

    let tier = policy.tier_for(student.credit_score).ok_or_else(|| {
        EconomyError::NotEligible(format!(
            "credit score {} is below the minimum of {}",
            student.credit_score,
            policy.minimum_score().unwrap_or_default()
        ))
    })?;

    if amount > tier.max_amount {
        return Err(EconomyError::LimitExceeded(format!(
            "amount {} exceeds the limit of {} for credit score {}",
            amount, tier.max_amount, student.credit_score
        )));
    }
    if weeks > tier.max_weeks {
        return Err(EconomyError::LimitExceeded(format!(
            "{} weeks exceeds the limit of {} for credit score {}",
            weeks, tier.max_weeks, student.credit_score
        )));
    }

    Ok(tier.clone())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanApplication {
    pub loan_amount: f64,
    pub duration_weeks: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanQuote {
    pub principal: f64,
    pub annual_rate: f64,
    pub duration_weeks: u32,
    pub weekly_payment: f64,
    pub total_payment: f64,
    pub total_interest: f64,
}

/// Terms the session student would get, without borrowing
pub fn quote_loan(
    conn: &Connection,
    config: &EconomyConfig,
    session: &Session,
    application: &LoanApplication,
) -> EconomyResult<LoanQuote> {
    let student_id = session.require_student()?;
    let student = classroom::find_student(conn, &session.teacher_id, student_id)?;
    let tier = check_eligibility(
        conn,
        &config.loans,
        &student,
        application.loan_amount,
        application.duration_weeks,
    )?;
    let terms = amortize(application.loan_amount, tier.annual_rate, application.duration_weeks)?;

    Ok(LoanQuote {
        principal: application.loan_amount,
        annual_rate: tier.annual_rate,
        duration_weeks: application.duration_weeks,
        weekly_payment: terms.weekly_payment,
        total_payment: terms.total_payment,
        total_interest: terms.total_payment - application.loan_amount,
    })
}

// ============================================================================
// ORIGINATION
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanReceipt {
    pub loan: Loan,
    pub weekly_payment: f64,
    pub total_payment: f64,
    pub transaction: TransactionRecord,
}

/// Bank lends to the student: checking +P, bank -P
pub fn apply_for_loan(
    conn: &mut Connection,
    config: &EconomyConfig,
    session: &Session,
    application: &LoanApplication,
) -> EconomyResult<LoanReceipt> {
    let student_id = session.require_student()?.to_string();
    let teacher_id = session.teacher_id.clone();
    let principal = application.loan_amount;
    let weeks = application.duration_weeks;

    let result = atomically(conn, |tx| {
        let student = classroom::find_student(tx, &teacher_id, &student_id)?;
        let tier = check_eligibility(tx, &config.loans, &student, principal, weeks)?;
        let terms = amortize(principal, tier.annual_rate, weeks)?;

        let now = Utc::now();
        let loan = Loan {
            id: uuid::Uuid::new_v4().to_string(),
            teacher_id: teacher_id.clone(),
            student_id: student_id.clone(),
            principal,
            annual_rate: tier.annual_rate,
            duration_weeks: weeks,
            weekly_payment: terms.weekly_payment,
            total_payment: terms.total_payment,
            remaining_balance: principal,
            remaining_weeks: weeks,
            status: LoanStatus::Active,
            next_payment_due: now + Duration::days(PAYMENT_INTERVAL_DAYS),
            created_at: now,
            updated_at: now,
        };
        tx.execute(
            "INSERT INTO loans (
                id, teacher_id, student_id, principal, annual_rate, duration_weeks,
                weekly_payment, total_payment, remaining_balance, remaining_weeks,
                status, next_payment_due, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                loan.id,
                loan.teacher_id,
                loan.student_id,
                loan.principal,
                loan.annual_rate,
                loan.duration_weeks,
                loan.weekly_payment,
                loan.total_payment,
                loan.remaining_balance,
                loan.remaining_weeks,
                loan.status,
                timestamp(loan.next_payment_due),
                timestamp(loan.created_at),
                timestamp(loan.updated_at),
            ],
        )?;

        ledger::debit_macro(tx, &teacher_id, MacroKind::Bank, principal)?;
        ledger::credit(tx, &student_id, AccountKind::Checking, principal)?;

        let record = TransactionRecord::new(
            &teacher_id,
            TransactionType::LoanDisbursement,
            principal,
            format!("Loan {} over {} weeks at {}%", principal, weeks, tier.annual_rate),
        )
        .to_student(&student_id)
        .entity(MacroKind::Bank)
        .account(AccountKind::Checking);
        transaction_log::append(tx, &record)?;

        Ok(LoanReceipt {
            weekly_payment: loan.weekly_payment,
            total_payment: loan.total_payment,
            loan,
            transaction: record,
        })
    });

    match &result {
        Ok(receipt) => info!(
            student_id = %student_id,
            loan_id = %receipt.loan.id,
            principal,
            annual_rate = receipt.loan.annual_rate,
            weeks,
            "loan disbursed"
        ),
        Err(e) => warn!(
            student_id = %student_id,
            principal,
            weeks,
            error = %e,
            "loan application rejected"
        ),
    }
    result
}

// ============================================================================
// REPAYMENT
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepaymentRequest {
    pub loan_id: String,
    pub payment_amount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepaymentReceipt {
    pub loan_id: String,
    pub status: LoanStatus,
    pub remaining_balance: f64,
    pub remaining_weeks: u32,

    /// What was actually charged; never more than the balance owed
    pub amount_paid: f64,

    pub transaction: TransactionRecord,
}

/// Student pays from checking to the bank
pub fn repay_loan(
    conn: &mut Connection,
    session: &Session,
    request: &RepaymentRequest,
) -> EconomyResult<RepaymentReceipt> {
    let student_id = session.require_student()?.to_string();
    let teacher_id = session.teacher_id.clone();
    ensure_positive("payment_amount", request.payment_amount)?;

    let result = atomically(conn, |tx| {
        let loan = find_loan(tx, &teacher_id, &request.loan_id)?;
        if loan.student_id != student_id {
            return Err(EconomyError::Forbidden(format!(
                "loan {} belongs to another student",
                loan.id
            )));
        }
        if loan.status == LoanStatus::Completed {
            return Err(EconomyError::validation(format!(
                "loan {} is already repaid",
                loan.id
            )));
        }

        let amount_paid = request.payment_amount.min(loan.remaining_balance);
        ledger::debit(tx, &student_id, AccountKind::Checking, amount_paid)?;
        ledger::credit_macro(tx, &teacher_id, MacroKind::Bank, amount_paid)?;

        let mut remaining_balance = loan.remaining_balance - amount_paid;
        let status = if remaining_balance <= EPSILON {
            remaining_balance = 0.0;
            LoanStatus::Completed
        } else {
            LoanStatus::Active
        };
        let remaining_weeks = loan.remaining_weeks.saturating_sub(1);
        let next_payment_due = match status {
            LoanStatus::Completed => loan.next_payment_due,
            _ => loan.next_payment_due + Duration::days(PAYMENT_INTERVAL_DAYS),
        };

        tx.execute(
            "UPDATE loans SET remaining_balance = ?1, remaining_weeks = ?2, status = ?3,
                next_payment_due = ?4, updated_at = ?5
             WHERE id = ?6",
            params![
                remaining_balance,
                remaining_weeks,
                status,
                timestamp(next_payment_due),
                timestamp(Utc::now()),
                loan.id,
            ],
        )?;

        let record = TransactionRecord::new(
            &teacher_id,
            TransactionType::LoanRepayment,
            amount_paid,
            format!("Loan repayment ({} weeks left)", remaining_weeks),
        )
        .from_student(&student_id)
        .entity(MacroKind::Bank)
        .account(AccountKind::Checking);
        transaction_log::append(tx, &record)?;

        Ok(RepaymentReceipt {
            loan_id: loan.id,
            status,
            remaining_balance,
            remaining_weeks,
            amount_paid,
            transaction: record,
        })
    });

    match &result {
        Ok(receipt) => info!(
            student_id = %student_id,
            loan_id = %receipt.loan_id,
            amount = receipt.amount_paid,
            remaining = receipt.remaining_balance,
            status = %receipt.status,
            "loan repayment applied"
        ),
        Err(e) => warn!(
            student_id = %student_id,
            loan_id = %request.loan_id,
            error = %e,
            "loan repayment rejected"
        ),
    }
    result
}

// ============================================================================
// QUERIES & SWEEPS
// ============================================================================

pub fn find_loan(conn: &Connection, teacher_id: &str, loan_id: &str) -> EconomyResult<Loan> {
    let sql = format!(
        "SELECT {} FROM loans WHERE id = ?1 AND teacher_id = ?2",
        Loan::COLUMNS
    );
    conn.query_row(&sql, params![loan_id, teacher_id], Loan::from_row)
        .optional()?
        .ok_or_else(|| EconomyError::not_found(format!("loan {}", loan_id)))
}

pub fn loans_for_student(
    conn: &Connection,
    teacher_id: &str,
    student_id: &str,
) -> EconomyResult<Vec<Loan>> {
    let sql = format!(
        "SELECT {} FROM loans WHERE teacher_id = ?1 AND student_id = ?2 ORDER BY created_at DESC",
        Loan::COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let loans = stmt
        .query_map(params![teacher_id, student_id], Loan::from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(loans)
}

/// Teacher sweep: active loans whose payment date passed become overdue
pub fn mark_overdue_loans(
    conn: &Connection,
    session: &Session,
    now: DateTime<Utc>,
) -> EconomyResult<usize> {
    let teacher_id = session.require_teacher()?;
    let now = timestamp(now);

    let marked = conn.execute(
        "UPDATE loans SET status = 'overdue', updated_at = ?1
         WHERE teacher_id = ?2 AND status = 'active' AND next_payment_due < ?1",
        params![now, teacher_id],
    )?;

    if marked > 0 {
        info!(teacher_id, marked, "loans marked overdue");
    }
    Ok(marked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{seed_classroom, seed_student_with, TEACHER};

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-6,
            "expected {}, got {}",
            expected,
            actual
        );
    }

    fn borrower(score: i64, checking: f64) -> (Connection, Session) {
        let mut conn = crate::db::open_in_memory().unwrap();
        seed_classroom(&mut conn);
        let id = seed_student_with(&mut conn, "Ana", score, checking, 0.0);
        (conn, Session::student(TEACHER, id))
    }

    fn application(amount: f64, weeks: u32) -> LoanApplication {
        LoanApplication {
            loan_amount: amount,
            duration_weeks: weeks,
        }
    }

    fn repayment(loan_id: &str, amount: f64) -> RepaymentRequest {
        RepaymentRequest {
            loan_id: loan_id.to_string(),
            payment_amount: amount,
        }
    }

    #[test]
    fn test_annuity_payment() {
        let terms = amortize(1_200_000.0, 12.0, 12).unwrap();
        assert_close(terms.weekly_rate, 0.01);
        assert_close(terms.total_payment, terms.weekly_payment * 12.0);
        assert!(terms.total_payment > 1_200_000.0);
        assert!((terms.weekly_payment - 106_618.55).abs() < 0.01);

        let interest_free = amortize(1_200.0, 0.0, 12).unwrap();
        assert_eq!(interest_free.weekly_payment, 100.0);
        assert_eq!(interest_free.total_payment, 1_200.0);

        assert!(amortize(1_000.0, 5.0, 0).is_err());
        assert!(amortize(0.0, 5.0, 4).is_err());
    }

    #[test]
    fn test_duration_is_bounded() {
        let longest = amortize(1_000.0, 12.0, MAX_DURATION_WEEKS).unwrap();
        assert!(longest.weekly_payment.is_finite());
        assert!(longest.weekly_payment > 0.0);

        for weeks in [MAX_DURATION_WEEKS + 1, 100_000, 3_000_000_000] {
            assert!(matches!(
                amortize(1_000.0, 12.0, weeks),
                Err(EconomyError::Validation(_))
            ));
            assert!(matches!(
                amortization_schedule(1_000.0, 12.0, weeks),
                Err(EconomyError::Validation(_))
            ));
        }

        // Overflowing inputs never yield NaN or infinite payments
        assert!(matches!(
            amortize(f64::MAX, 12.0, 52),
            Err(EconomyError::Validation(_))
        ));
        assert!(matches!(
            amortize(1_000.0, f64::MAX, 52),
            Err(EconomyError::Validation(_))
        ));
    }

    #[test]
    fn test_schedule_retires_principal() {
        let rows = amortization_schedule(1_200_000.0, 12.0, 12).unwrap();
        assert_eq!(rows.len(), 12);
        assert_eq!(rows.last().unwrap().balance, 0.0);

        let repaid: f64 = rows.iter().map(|r| r.principal).sum();
        assert_close(repaid, 1_200_000.0);
        assert!(rows[0].interest > rows[11].interest);
    }

    #[test]
    fn test_loan_lifecycle_scenario() {
        let (mut conn, session) = borrower(850, 10_000.0);
        let config = EconomyConfig::default();
        let student_id = session.student_id.clone().unwrap();
        let bank_before = ledger::macro_balance(&conn, TEACHER, MacroKind::Bank).unwrap();

        let receipt =
            apply_for_loan(&mut conn, &config, &session, &application(500_000.0, 4)).unwrap();
        assert_eq!(receipt.loan.annual_rate, 6.0);
        assert_eq!(receipt.loan.status, LoanStatus::Active);
        assert_eq!(
            ledger::get_balance(&conn, &student_id, AccountKind::Checking).unwrap(),
            510_000.0
        );
        assert_eq!(
            ledger::macro_balance(&conn, TEACHER, MacroKind::Bank).unwrap(),
            bank_before - 500_000.0
        );

        let payment = receipt.weekly_payment;
        for week in 1..=4 {
            let repaid =
                repay_loan(&mut conn, &session, &repayment(&receipt.loan.id, payment)).unwrap();
            assert_eq!(repaid.remaining_weeks, 4 - week);
            if week < 4 {
                assert_eq!(repaid.status, LoanStatus::Active);
                assert!(repaid.remaining_balance > 0.0);
            } else {
                assert_eq!(repaid.status, LoanStatus::Completed);
                assert_eq!(repaid.remaining_balance, 0.0);
            }
        }

        let loan = find_loan(&conn, TEACHER, &receipt.loan.id).unwrap();
        assert_eq!(loan.status, LoanStatus::Completed);

        // Principal went back to the bank; nothing more was charged
        assert_close(
            ledger::macro_balance(&conn, TEACHER, MacroKind::Bank).unwrap(),
            bank_before,
        );
        assert_close(
            ledger::get_balance(&conn, &student_id, AccountKind::Checking).unwrap(),
            10_000.0,
        );
    }

    #[test]
    fn test_eligibility_rules() {
        let config = EconomyConfig::default();

        let (mut conn, low) = borrower(550, 0.0);
        assert!(matches!(
            apply_for_loan(&mut conn, &config, &low, &application(1_000.0, 4)),
            Err(EconomyError::NotEligible(_))
        ));

        let (mut conn, good) = borrower(850, 0.0);
        assert!(matches!(
            apply_for_loan(&mut conn, &config, &good, &application(4_000_000.0, 4)),
            Err(EconomyError::LimitExceeded(_))
        ));
        assert!(matches!(
            apply_for_loan(&mut conn, &config, &good, &application(1_000.0, 40)),
            Err(EconomyError::LimitExceeded(_))
        ));
        assert!(matches!(
            apply_for_loan(&mut conn, &config, &good, &application(-1.0, 4)),
            Err(EconomyError::Validation(_))
        ));

        apply_for_loan(&mut conn, &config, &good, &application(1_000.0, 4)).unwrap();
        assert!(matches!(
            apply_for_loan(&mut conn, &config, &good, &application(1_000.0, 4)),
            Err(EconomyError::NotEligible(_))
        ));
    }

    #[test]
    fn test_quote_has_no_side_effects() {
        let (conn, session) = borrower(950, 0.0);
        let config = EconomyConfig::default();

        let quote = quote_loan(&conn, &config, &session, &application(100_000.0, 10)).unwrap();
        assert_eq!(quote.annual_rate, 4.0);
        assert!(quote.total_interest > 0.0);

        let student_id = session.student_id.clone().unwrap();
        assert!(loans_for_student(&conn, TEACHER, &student_id).unwrap().is_empty());
    }

    #[test]
    fn test_repayment_rules() {
        let (mut conn, session) = borrower(850, 0.0);
        let config = EconomyConfig::default();
        let receipt =
            apply_for_loan(&mut conn, &config, &session, &application(1_000.0, 4)).unwrap();
        let loan_id = receipt.loan.id.clone();

        let ben_id = seed_student_with(&mut conn, "Ben", 850, 5_000.0, 0.0);
        let ben = Session::student(TEACHER, ben_id);
        assert!(matches!(
            repay_loan(&mut conn, &ben, &repayment(&loan_id, 10.0)),
            Err(EconomyError::Forbidden(_))
        ));
        assert!(matches!(
            repay_loan(&mut conn, &session, &repayment("missing", 10.0)),
            Err(EconomyError::NotFound(_))
        ));

        let paid = repay_loan(&mut conn, &session, &repayment(&loan_id, 5_000.0));
        assert!(matches!(paid, Err(EconomyError::InsufficientFunds { .. })));

        // Overpaying only charges what is owed
        let student_id = session.student_id.clone().unwrap();
        ledger::credit(&conn, &student_id, AccountKind::Checking, 4_000.0).unwrap();
        let paid = repay_loan(&mut conn, &session, &repayment(&loan_id, 5_000.0)).unwrap();
        assert_eq!(paid.amount_paid, 1_000.0);
        assert_eq!(paid.status, LoanStatus::Completed);
        assert_eq!(
            ledger::get_balance(&conn, &student_id, AccountKind::Checking).unwrap(),
            4_000.0
        );

        assert!(matches!(
            repay_loan(&mut conn, &session, &repayment(&loan_id, 1.0)),
            Err(EconomyError::Validation(_))
        ));

        // A completed loan no longer counts against the open-loan cap
        apply_for_loan(&mut conn, &config, &session, &application(500.0, 4)).unwrap();
    }

    #[test]
    fn test_overdue_sweep_and_reactivation() {
        let (mut conn, session) = borrower(850, 1_000.0);
        let config = EconomyConfig::default();
        let receipt =
            apply_for_loan(&mut conn, &config, &session, &application(2_000.0, 8)).unwrap();
        let teacher = Session::teacher(TEACHER);

        assert_eq!(mark_overdue_loans(&conn, &teacher, Utc::now()).unwrap(), 0);
        let later = Utc::now() + Duration::days(8);
        assert_eq!(mark_overdue_loans(&conn, &teacher, later).unwrap(), 1);
        assert_eq!(
            find_loan(&conn, TEACHER, &receipt.loan.id).unwrap().status,
            LoanStatus::Overdue
        );

        // Overdue loans still count against the open-loan cap
        assert!(matches!(
            apply_for_loan(&mut conn, &config, &session, &application(100.0, 4)),
            Err(EconomyError::NotEligible(_))
        ));

        let repaid =
            repay_loan(&mut conn, &session, &repayment(&receipt.loan.id, 300.0)).unwrap();
        assert_eq!(repaid.status, LoanStatus::Active);

        let loan = find_loan(&conn, TEACHER, &receipt.loan.id).unwrap();
        let expected_due = receipt.loan.next_payment_due + Duration::days(PAYMENT_INTERVAL_DAYS);
        assert_eq!(
            loan.next_payment_due.timestamp_millis(),
            expected_due.timestamp_millis()
        );

        assert!(matches!(
            mark_overdue_loans(&conn, &session, later),
            Err(EconomyError::Forbidden(_))
        ));
    }
}
