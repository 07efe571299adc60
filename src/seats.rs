// 🪑 Seat Market - Money-supply pricing and seat ownership trades
//
// One price applies to every seat in a classroom. It is recomputed on demand
// from every student's total balance divided over the active students;
// trades settle at the last computed price against the government entity.

use crate::classroom;
use crate::config::EconomyConfig;
use crate::db::{atomically, timestamp};
use crate::entities::{AccountKind, MacroKind, Seat};
use crate::error::{EconomyError, EconomyResult};
use crate::ledger;
use crate::session::Session;
use crate::transaction_log::{self, TransactionRecord, TransactionType};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

// ============================================================================
// PRICING
// ============================================================================

/// `round(total_balance * ratio / active_students)`
pub fn compute_seat_price(
    total_balance: f64,
    active_students: usize,
    price_ratio: f64,
) -> EconomyResult<f64> {
    if active_students == 0 {
        return Err(EconomyError::validation(
            "seat price needs at least one active student",
        ));
    }
    Ok((total_balance * price_ratio / active_students as f64).round())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeatRepricing {
    pub price: f64,
    pub total_balance: f64,
    pub active_students: usize,
    pub seats_updated: usize,
}

/// Teacher action: recompute the classroom-wide seat price
pub fn recompute_seat_prices(
    conn: &mut Connection,
    config: &EconomyConfig,
    session: &Session,
) -> EconomyResult<SeatRepricing> {
    let teacher_id = session.require_teacher()?.to_string();

    let repricing = atomically(conn, |tx| {
        let (total_balance, active_students): (f64, i64) = tx.query_row(
            "SELECT
                COALESCE((SELECT SUM(a.balance) FROM accounts a
                          JOIN students s ON s.id = a.student_id
                          WHERE s.teacher_id = ?1), 0),
                (SELECT COUNT(*) FROM students WHERE teacher_id = ?1 AND active = 1)",
            [&teacher_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        let active_students = active_students as usize;
        let price = compute_seat_price(total_balance, active_students, config.seats.price_ratio)?;

        let seats_updated = tx.execute(
            "UPDATE seats SET current_price = ?1 WHERE teacher_id = ?2",
            params![price, teacher_id],
        )?;

        Ok(SeatRepricing {
            price,
            total_balance,
            active_students,
            seats_updated,
        })
    })?;

    info!(
        teacher_id = %teacher_id,
        price = repricing.price,
        total_balance = repricing.total_balance,
        active_students = repricing.active_students,
        "seat prices recomputed"
    );
    Ok(repricing)
}

// ============================================================================
// QUERIES
// ============================================================================

pub fn list_seats(conn: &Connection, teacher_id: &str) -> EconomyResult<Vec<Seat>> {
    let sql = format!(
        "SELECT {} FROM seats WHERE teacher_id = ?1 ORDER BY seat_number",
        Seat::COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let seats = stmt
        .query_map([teacher_id], Seat::from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(seats)
}

pub fn find_seat(conn: &Connection, teacher_id: &str, seat_number: u32) -> EconomyResult<Seat> {
    let sql = format!(
        "SELECT {} FROM seats WHERE teacher_id = ?1 AND seat_number = ?2",
        Seat::COLUMNS
    );
    conn.query_row(&sql, params![teacher_id, seat_number], Seat::from_row)
        .optional()?
        .ok_or_else(|| EconomyError::not_found(format!("seat {}", seat_number)))
}

/// Unowned seats numbered 1..=count
pub(crate) fn create_seats(conn: &Connection, teacher_id: &str, count: u32) -> EconomyResult<()> {
    let mut stmt = conn.prepare(
        "INSERT INTO seats (teacher_id, seat_number, current_price) VALUES (?1, ?2, 0)",
    )?;
    for seat_number in 1..=count {
        stmt.execute(params![teacher_id, seat_number])?;
    }
    Ok(())
}

// ============================================================================
// TRADES
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeatTradeRequest {
    pub seat_number: u32,

    /// Account paying or receiving; checking when omitted
    #[serde(default)]
    pub account_type: Option<AccountKind>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeatPurchase {
    pub seat: Seat,
    pub price: f64,
    pub remaining_balance: f64,
    pub transaction: TransactionRecord,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeatSale {
    pub seat: Seat,
    pub sale_price: f64,
    pub purchase_price: Option<f64>,
    pub new_balance: f64,
    pub transaction: TransactionRecord,
}

pub fn buy_seat(
    conn: &mut Connection,
    session: &Session,
    request: &SeatTradeRequest,
) -> EconomyResult<SeatPurchase> {
    let student_id = session.require_student()?.to_string();
    let teacher_id = session.teacher_id.clone();
    let account = request.account_type.unwrap_or(AccountKind::Checking);
    let seat_number = request.seat_number;

    let result = atomically(conn, |tx| {
        classroom::find_student(tx, &teacher_id, &student_id)?;
        let seat = find_seat(tx, &teacher_id, seat_number)?;
        if !seat.is_available() {
            return Err(EconomyError::Conflict(format!(
                "seat {} is already owned",
                seat_number
            )));
        }
        let price = seat.current_price;
        if price <= 0.0 {
            return Err(EconomyError::validation(format!(
                "seat {} has not been priced yet",
                seat_number
            )));
        }

        let remaining_balance = ledger::debit(tx, &student_id, account, price)?;
        ledger::credit_macro(tx, &teacher_id, MacroKind::Government, price)?;

        let now = Utc::now();
        let claimed = tx.execute(
            "UPDATE seats SET owner_id = ?1, purchase_price = ?2, purchase_date = ?3
             WHERE teacher_id = ?4 AND seat_number = ?5 AND owner_id IS NULL",
            params![student_id, price, timestamp(now), teacher_id, seat_number],
        )?;
        if claimed == 0 {
            return Err(EconomyError::Conflict(format!(
                "seat {} was taken concurrently",
                seat_number
            )));
        }

        let record = TransactionRecord::new(
            &teacher_id,
            TransactionType::RealEstatePurchase,
            price,
            format!("Seat {} purchase", seat_number),
        )
        .from_student(&student_id)
        .entity(MacroKind::Government)
        .account(account);
        transaction_log::append(tx, &record)?;

        Ok(SeatPurchase {
            seat: find_seat(tx, &teacher_id, seat_number)?,
            price,
            remaining_balance,
            transaction: record,
        })
    });

    match &result {
        Ok(purchase) => info!(
            student_id = %student_id,
            seat = seat_number,
            price = purchase.price,
            "seat purchased"
        ),
        Err(e) => warn!(
            student_id = %student_id,
            seat = seat_number,
            error = %e,
            "seat purchase rejected"
        ),
    }
    result
}

/// Sells at the current classroom price, not the original purchase price
pub fn sell_seat(
    conn: &mut Connection,
    session: &Session,
    request: &SeatTradeRequest,
) -> EconomyResult<SeatSale> {
    let student_id = session.require_student()?.to_string();
    let teacher_id = session.teacher_id.clone();
    let account = request.account_type.unwrap_or(AccountKind::Checking);
    let seat_number = request.seat_number;

    let result = atomically(conn, |tx| {
        classroom::find_student(tx, &teacher_id, &student_id)?;
        let seat = find_seat(tx, &teacher_id, seat_number)?;
        if !seat.is_owned_by(&student_id) {
            return Err(EconomyError::Forbidden(format!(
                "seat {} is not owned by the seller",
                seat_number
            )));
        }
        let sale_price = seat.current_price;
        if sale_price <= 0.0 {
            return Err(EconomyError::validation(format!(
                "seat {} has no current price",
                seat_number
            )));
        }

        ledger::debit_macro(tx, &teacher_id, MacroKind::Government, sale_price)?;
        let new_balance = ledger::credit(tx, &student_id, account, sale_price)?;

        tx.execute(
            "UPDATE seats SET owner_id = NULL, purchase_price = NULL, purchase_date = NULL
             WHERE teacher_id = ?1 AND seat_number = ?2 AND owner_id = ?3",
            params![teacher_id, seat_number, student_id],
        )?;

        let record = TransactionRecord::new(
            &teacher_id,
            TransactionType::RealEstateSale,
            sale_price,
            format!("Seat {} sale", seat_number),
        )
        .to_student(&student_id)
        .entity(MacroKind::Government)
        .account(account);
        transaction_log::append(tx, &record)?;

        Ok(SeatSale {
            seat: find_seat(tx, &teacher_id, seat_number)?,
            sale_price,
            purchase_price: seat.purchase_price,
            new_balance,
            transaction: record,
        })
    });

    match &result {
        Ok(sale) => info!(
            student_id = %student_id,
            seat = seat_number,
            sale_price = sale.sale_price,
            "seat sold"
        ),
        Err(e) => warn!(
            student_id = %student_id,
            seat = seat_number,
            error = %e,
            "seat sale rejected"
        ),
    }
    result
}
