// 📊 Portfolio Accounting - Weighted-average cost basis per (student, asset)
//
// A holding exists only while its quantity is positive. Buys move the
// average price toward the fill price; sells never touch it.

use crate::db::{parse_timestamp, timestamp, EPSILON};
use crate::entities::Asset;
use crate::error::{EconomyError, EconomyResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub student_id: String,
    pub asset_id: i64,
    pub quantity: f64,
    pub average_price: f64,
    pub total_invested: f64,
    pub updated_at: DateTime<Utc>,
}

impl Holding {
    const COLUMNS: &'static str =
        "student_id, asset_id, quantity, average_price, total_invested, updated_at";

    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        let updated_at: String = row.get(5)?;
        Ok(Holding {
            student_id: row.get(0)?,
            asset_id: row.get(1)?,
            quantity: row.get(2)?,
            average_price: row.get(3)?,
            total_invested: row.get(4)?,
            updated_at: parse_timestamp(5, &updated_at)?,
        })
    }
}

pub fn find_holding(
    conn: &Connection,
    student_id: &str,
    asset_id: i64,
) -> EconomyResult<Option<Holding>> {
    let sql = format!(
        "SELECT {} FROM holdings WHERE student_id = ?1 AND asset_id = ?2",
        Holding::COLUMNS
    );
    let holding = conn
        .query_row(&sql, params![student_id, asset_id], Holding::from_row)
        .optional()?;
    Ok(holding)
}

pub fn holdings_for_student(conn: &Connection, student_id: &str) -> EconomyResult<Vec<Holding>> {
    let sql = format!(
        "SELECT {} FROM holdings WHERE student_id = ?1 ORDER BY asset_id",
        Holding::COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let holdings = stmt
        .query_map([student_id], Holding::from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(holdings)
}

// ============================================================================
// BUY / SELL
// ============================================================================

/// Add a fill to the holding, creating it on the first buy
pub fn apply_buy(
    conn: &Connection,
    student_id: &str,
    asset_id: i64,
    quantity: f64,
    price: f64,
) -> EconomyResult<Holding> {
    let cost = quantity * price;
    let now = timestamp(Utc::now());

    match find_holding(conn, student_id, asset_id)? {
        None => {
            conn.execute(
                "INSERT INTO holdings
                    (student_id, asset_id, quantity, average_price, total_invested, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![student_id, asset_id, quantity, price, cost, now],
            )?;
        }
        Some(existing) => {
            let new_quantity = existing.quantity + quantity;
            let new_total = existing.total_invested + cost;
            let average_price = new_total / new_quantity;
            conn.execute(
                "UPDATE holdings SET quantity = ?1, average_price = ?2, total_invested = ?3,
                    updated_at = ?4
                 WHERE student_id = ?5 AND asset_id = ?6",
                params![new_quantity, average_price, new_total, now, student_id, asset_id],
            )?;
        }
    }

    find_holding(conn, student_id, asset_id)?
        .ok_or_else(|| EconomyError::not_found(format!("holding of asset {}", asset_id)))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SellOutcome {
    /// `quantity * (price - average_price)`
    pub realized_profit: f64,

    /// Realized profit relative to the cost basis of the sold units
    pub realized_percent: f64,

    pub average_price: f64,

    /// None when the position was closed
    pub remaining: Option<Holding>,
}

/// Remove `quantity` at `price` from the holding
pub fn apply_sell(
    conn: &Connection,
    student_id: &str,
    asset: &Asset,
    quantity: f64,
    price: f64,
) -> EconomyResult<SellOutcome> {
    let holding = find_holding(conn, student_id, asset.id)?.ok_or_else(|| {
        EconomyError::InsufficientHoldings {
            symbol: asset.symbol.clone(),
            requested: quantity,
            held: 0.0,
        }
    })?;

    if quantity > holding.quantity + EPSILON {
        return Err(EconomyError::InsufficientHoldings {
            symbol: asset.symbol.clone(),
            requested: quantity,
            held: holding.quantity,
        });
    }

    let remaining = holding.quantity - quantity;
    let closes_position = remaining <= EPSILON;
    if !closes_position && remaining + EPSILON < asset.min_quantity {
        return Err(EconomyError::BelowMinimumHolding {
            symbol: asset.symbol.clone(),
            remaining,
            minimum: asset.min_quantity,
        });
    }

    let cost_basis = holding.average_price * quantity;
    let realized_profit = quantity * (price - holding.average_price);
    let realized_percent = if cost_basis > 0.0 {
        realized_profit / cost_basis * 100.0
    } else {
        0.0
    };

    if closes_position {
        conn.execute(
            "DELETE FROM holdings WHERE student_id = ?1 AND asset_id = ?2",
            params![student_id, asset.id],
        )?;
    } else {
        conn.execute(
            "UPDATE holdings SET quantity = ?1, total_invested = total_invested - ?2,
                updated_at = ?3
             WHERE student_id = ?4 AND asset_id = ?5",
            params![remaining, cost_basis, timestamp(Utc::now()), student_id, asset.id],
        )?;
    }

    Ok(SellOutcome {
        realized_profit,
        realized_percent,
        average_price: holding.average_price,
        remaining: find_holding(conn, student_id, asset.id)?,
    })
}

// ============================================================================
// VALUATION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Valuation {
    pub asset_id: i64,
    pub symbol: String,
    pub quantity: f64,
    pub average_price: f64,
    pub current_price: f64,
    pub total_invested: f64,
    pub current_value: f64,
    pub profit_loss: f64,
    pub profit_loss_percent: f64,
}

impl Valuation {
    pub fn of(holding: &Holding, asset: &Asset) -> Self {
        let current_value = holding.quantity * asset.current_price;
        let profit_loss = current_value - holding.total_invested;
        let profit_loss_percent = if holding.total_invested == 0.0 {
            0.0
        } else {
            profit_loss / holding.total_invested * 100.0
        };

        Valuation {
            asset_id: asset.id,
            symbol: asset.symbol.clone(),
            quantity: holding.quantity,
            average_price: holding.average_price,
            current_price: asset.current_price,
            total_invested: holding.total_invested,
            current_value,
            profit_loss,
            profit_loss_percent,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSummary {
    pub student_id: String,
    pub positions: Vec<Valuation>,
    pub total_invested: f64,
    pub current_value: f64,
    pub profit_loss: f64,
    pub profit_loss_percent: f64,
}

/// Every holding valued at the asset's current price
pub fn portfolio_summary(conn: &Connection, student_id: &str) -> EconomyResult<PortfolioSummary> {
    let mut positions = Vec::new();
    for holding in holdings_for_student(conn, student_id)? {
        let asset = crate::assets::find_asset(conn, holding.asset_id)?;
        positions.push(Valuation::of(&holding, &asset));
    }

    let total_invested: f64 = positions.iter().map(|p| p.total_invested).sum();
    let current_value: f64 = positions.iter().map(|p| p.current_value).sum();
    let profit_loss = current_value - total_invested;
    let profit_loss_percent = if total_invested == 0.0 {
        0.0
    } else {
        profit_loss / total_invested * 100.0
    };

    Ok(PortfolioSummary {
        student_id: student_id.to_string(),
        positions,
        total_invested,
        current_value,
        profit_loss,
        profit_loss_percent,
    })
}
