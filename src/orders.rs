// 🛒 Order Execution - Market buy/sell orders with fee distribution
//
// Each order walks Validated → FundsReserved → Recorded → FeesDistributed →
// Completed inside a single store transaction. A failure at any stage
// drops the transaction, so the earlier stages are rolled back with it.

use crate::assets;
use crate::classroom;
use crate::config::{EconomyConfig, FeeSchedule};
use crate::db::{atomically, EPSILON};
use crate::entities::{AccountKind, Asset, MacroKind};
use crate::error::{EconomyError, EconomyResult};
use crate::ledger;
use crate::portfolio::{self, Holding};
use crate::session::Session;
use crate::transaction_log::{self, TransactionRecord, TransactionType};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

// ============================================================================
// ORDER STAGES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => f.write_str("buy"),
            OrderSide::Sell => f.write_str("sell"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStage {
    Validated,
    FundsReserved,
    Recorded,
    FeesDistributed,
    Completed,
}

/// Follows one order through its stages for the log
struct OrderTracker<'a> {
    side: OrderSide,
    student_id: &'a str,
    reached: Option<OrderStage>,
}

impl<'a> OrderTracker<'a> {
    fn new(side: OrderSide, student_id: &'a str) -> Self {
        OrderTracker {
            side,
            student_id,
            reached: None,
        }
    }

    fn advance(&mut self, stage: OrderStage) {
        debug_assert!(self.reached.map_or(true, |s| s < stage));
        debug!(side = %self.side, student_id = self.student_id, ?stage, "order stage");
        self.reached = Some(stage);
    }
}

// ============================================================================
// REQUESTS & PRICING
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    pub asset_id: i64,
    pub quantity: f64,

    /// Price the caller saw; must still match the current price
    #[serde(default)]
    pub price: Option<f64>,

    /// Investment account when omitted
    #[serde(default)]
    pub account_type: Option<AccountKind>,
}

impl OrderRequest {
    pub fn market(asset_id: i64, quantity: f64) -> Self {
        OrderRequest {
            asset_id,
            quantity,
            price: None,
            account_type: None,
        }
    }

    fn account(&self) -> AccountKind {
        self.account_type.unwrap_or(AccountKind::Investment)
    }
}

/// Whole units for everything but crypto; crypto down to `min_quantity`
pub fn validate_quantity(asset: &Asset, quantity: f64) -> EconomyResult<()> {
    if !quantity.is_finite() || quantity <= 0.0 {
        return Err(EconomyError::validation(format!(
            "quantity must be positive, got {}",
            quantity
        )));
    }

    if asset.category.allows_fractional() {
        if quantity + EPSILON < asset.min_quantity {
            return Err(EconomyError::validation(format!(
                "minimum order for {} is {}",
                asset.symbol, asset.min_quantity
            )));
        }
    } else if quantity < 1.0 || quantity.fract() != 0.0 {
        return Err(EconomyError::validation(format!(
            "{} trades in whole units, got {}",
            asset.symbol, quantity
        )));
    }

    Ok(())
}

/// Execution price: always the asset's current price
fn execution_price(asset: &Asset, quoted: Option<f64>) -> EconomyResult<f64> {
    if asset.current_price <= 0.0 {
        return Err(EconomyError::validation(format!(
            "{} has no market price",
            asset.symbol
        )));
    }
    if let Some(quoted) = quoted {
        if (quoted - asset.current_price).abs() > EPSILON {
            return Err(EconomyError::Conflict(format!(
                "{} is now priced at {}, not {}",
                asset.symbol, asset.current_price, quoted
            )));
        }
    }
    Ok(asset.current_price)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BuyCosts {
    pub total: f64,
    pub fee: f64,
    pub total_cost: f64,
}

pub fn buy_costs(quantity: f64, price: f64, fees: &FeeSchedule) -> BuyCosts {
    let total = quantity * price;
    let fee = total * fees.brokerage_rate;
    BuyCosts {
        total,
        fee,
        total_cost: total + fee,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SellProceeds {
    pub total: f64,
    pub brokerage_fee: f64,
    pub tax_fee: f64,
    pub net: f64,
}

pub fn sell_proceeds(quantity: f64, price: f64, fees: &FeeSchedule) -> SellProceeds {
    let total = quantity * price;
    let brokerage_fee = total * fees.brokerage_rate;
    let tax_fee = total * fees.trading_tax_rate;
    SellProceeds {
        total,
        brokerage_fee,
        tax_fee,
        net: total - brokerage_fee - tax_fee,
    }
}

// ============================================================================
// BUY
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuyReceipt {
    pub transaction: TransactionRecord,
    pub fee: f64,
    pub remaining_balance: f64,
    pub holding: Holding,
}

pub fn buy(
    conn: &mut Connection,
    config: &EconomyConfig,
    session: &Session,
    request: &OrderRequest,
) -> EconomyResult<BuyReceipt> {
    let student_id = session.require_student()?.to_string();
    let teacher_id = session.teacher_id.clone();
    let account = request.account();
    let mut tracker = OrderTracker::new(OrderSide::Buy, &student_id);

    let result = atomically(conn, |tx| {
        classroom::find_student(tx, &teacher_id, &student_id)?;
        let asset = assets::find_asset(tx, request.asset_id)?;
        validate_quantity(&asset, request.quantity)?;
        let price = execution_price(&asset, request.price)?;
        let costs = buy_costs(request.quantity, price, &config.fees);
        tracker.advance(OrderStage::Validated);

        let remaining_balance = ledger::debit(tx, &student_id, account, costs.total_cost)?;
        tracker.advance(OrderStage::FundsReserved);

        let holding = portfolio::apply_buy(tx, &student_id, asset.id, request.quantity, price)?;
        let record = TransactionRecord::new(
            &teacher_id,
            TransactionType::InvestmentBuy,
            costs.total,
            format!("Buy {} {} @ {}", request.quantity, asset.symbol, price),
        )
        .from_student(&student_id)
        .entity(MacroKind::Securities)
        .account(account)
        .fee(costs.fee);
        transaction_log::append(tx, &record)?;
        tracker.advance(OrderStage::Recorded);

        if costs.fee > 0.0 {
            ledger::credit_macro(tx, &teacher_id, MacroKind::Securities, costs.fee)?;
        }
        tracker.advance(OrderStage::FeesDistributed);

        Ok(BuyReceipt {
            transaction: record,
            fee: costs.fee,
            remaining_balance,
            holding,
        })
    });

    match &result {
        Ok(receipt) => {
            tracker.advance(OrderStage::Completed);
            info!(
                student_id = %student_id,
                asset_id = request.asset_id,
                quantity = request.quantity,
                amount = receipt.transaction.amount,
                fee = receipt.fee,
                "buy order completed"
            );
        }
        Err(e) => warn!(
            student_id = %student_id,
            asset_id = request.asset_id,
            stage = ?tracker.reached,
            error = %e,
            "buy order rolled back"
        ),
    }
    result
}

// ============================================================================
// SELL
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SellFees {
    pub brokerage: f64,
    pub tax: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RealizedProfit {
    pub amount: f64,
    pub percent: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SellReceipt {
    pub transaction: TransactionRecord,
    pub fees: SellFees,
    pub net_amount: f64,
    pub profit: RealizedProfit,
    pub remaining_balance: f64,

    /// None once the position is closed
    pub holding: Option<Holding>,
}

pub fn sell(
    conn: &mut Connection,
    config: &EconomyConfig,
    session: &Session,
    request: &OrderRequest,
) -> EconomyResult<SellReceipt> {
    let student_id = session.require_student()?.to_string();
    let teacher_id = session.teacher_id.clone();
    let account = request.account();
    let mut tracker = OrderTracker::new(OrderSide::Sell, &student_id);

    let result = atomically(conn, |tx| {
        classroom::find_student(tx, &teacher_id, &student_id)?;
        let asset = assets::find_asset(tx, request.asset_id)?;
        validate_quantity(&asset, request.quantity)?;
        let price = execution_price(&asset, request.price)?;
        let proceeds = sell_proceeds(request.quantity, price, &config.fees);
        tracker.advance(OrderStage::Validated);

        // Units leave the holding before any money moves
        let outcome = portfolio::apply_sell(tx, &student_id, &asset, request.quantity, price)?;
        let remaining_balance = ledger::credit(tx, &student_id, account, proceeds.net)?;
        tracker.advance(OrderStage::FundsReserved);

        let record = TransactionRecord::new(
            &teacher_id,
            TransactionType::InvestmentSell,
            proceeds.total,
            format!("Sell {} {} @ {}", request.quantity, asset.symbol, price),
        )
        .to_student(&student_id)
        .entity(MacroKind::Securities)
        .account(account)
        .fee(proceeds.brokerage_fee + proceeds.tax_fee);
        transaction_log::append(tx, &record)?;
        tracker.advance(OrderStage::Recorded);

        let fee_flows = [
            (
                proceeds.brokerage_fee,
                MacroKind::Securities,
                TransactionType::BrokerageFee,
                "Brokerage fee",
            ),
            (
                proceeds.tax_fee,
                MacroKind::Government,
                TransactionType::TradingTax,
                "Trading tax",
            ),
        ];
        for (amount, entity, tx_type, label) in fee_flows {
            if amount <= 0.0 {
                continue;
            }
            ledger::credit_macro(tx, &teacher_id, entity, amount)?;
            let fee_record = TransactionRecord::new(
                &teacher_id,
                tx_type,
                amount,
                format!("{} on {} sale", label, asset.symbol),
            )
            .from_student(&student_id)
            .entity(entity);
            transaction_log::append(tx, &fee_record)?;
        }
        tracker.advance(OrderStage::FeesDistributed);

        Ok(SellReceipt {
            transaction: record,
            fees: SellFees {
                brokerage: proceeds.brokerage_fee,
                tax: proceeds.tax_fee,
            },
            net_amount: proceeds.net,
            profit: RealizedProfit {
                amount: outcome.realized_profit,
                percent: outcome.realized_percent,
            },
            remaining_balance,
            holding: outcome.remaining,
        })
    });

    match &result {
        Ok(receipt) => {
            tracker.advance(OrderStage::Completed);
            info!(
                student_id = %student_id,
                asset_id = request.asset_id,
                quantity = request.quantity,
                net_amount = receipt.net_amount,
                profit = receipt.profit.amount,
                "sell order completed"
            );
        }
        Err(e) => warn!(
            student_id = %student_id,
            asset_id = request.asset_id,
            stage = ?tracker.reached,
            error = %e,
            "sell order rolled back"
        ),
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{register_asset, update_price, NewAsset};
    use crate::entities::AssetCategory;
    use crate::testutil::{
        seed_classroom, seed_classroom_for, seed_student_with, OTHER_TEACHER, TEACHER,
    };
    use std::sync::{Arc, Barrier};
    use std::thread;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-6,
            "expected {}, got {}",
            expected,
            actual
        );
    }

    fn listed(
        conn: &Connection,
        symbol: &str,
        category: AssetCategory,
        min: f64,
        price: f64,
    ) -> Asset {
        register_asset(
            conn,
            &NewAsset {
                symbol: symbol.to_string(),
                name: symbol.to_string(),
                category,
                currency: "KRW".to_string(),
                min_quantity: min,
                price,
            },
        )
        .unwrap()
    }

    fn setup(checking: f64, investment: f64) -> (Connection, Session) {
        let mut conn = crate::db::open_in_memory().unwrap();
        seed_classroom(&mut conn);
        let id = seed_student_with(&mut conn, "Ana", 700, checking, investment);
        (conn, Session::student(TEACHER, id))
    }

    fn in_checking(asset_id: i64, quantity: f64) -> OrderRequest {
        OrderRequest {
            account_type: Some(AccountKind::Checking),
            ..OrderRequest::market(asset_id, quantity)
        }
    }

    #[test]
    fn test_buy_then_sell_scenario() {
        let (mut conn, session) = setup(100_000.0, 0.0);
        let config = EconomyConfig::default();
        let asset = listed(&conn, "ACME", AssetCategory::Stock, 1.0, 50_000.0);
        let securities = ledger::macro_balance(&conn, TEACHER, MacroKind::Securities).unwrap();
        let government = ledger::macro_balance(&conn, TEACHER, MacroKind::Government).unwrap();

        let receipt = buy(&mut conn, &config, &session, &in_checking(asset.id, 1.0)).unwrap();
        assert_close(receipt.fee, 50.0);
        assert_close(receipt.remaining_balance, 49_950.0);
        assert_eq!(receipt.holding.quantity, 1.0);
        assert_eq!(receipt.holding.average_price, 50_000.0);
        assert_eq!(receipt.transaction.amount, 50_000.0);

        update_price(&conn, "ACME", 60_000.0).unwrap();
        let receipt = sell(&mut conn, &config, &session, &in_checking(asset.id, 1.0)).unwrap();
        assert_close(receipt.fees.brokerage, 60.0);
        assert_close(receipt.fees.tax, 120.0);
        assert_close(receipt.net_amount, 59_820.0);
        assert_close(receipt.remaining_balance, 109_770.0);
        assert_close(receipt.profit.amount, 10_000.0);
        assert_close(receipt.profit.percent, 20.0);
        assert!(receipt.holding.is_none());

        let student_id = session.student_id.clone().unwrap();
        assert!(portfolio::find_holding(&conn, &student_id, asset.id).unwrap().is_none());
        assert_close(
            ledger::macro_balance(&conn, TEACHER, MacroKind::Securities).unwrap(),
            securities + 110.0,
        );
        assert_close(
            ledger::macro_balance(&conn, TEACHER, MacroKind::Government).unwrap(),
            government + 120.0,
        );

        let log = transaction_log::entries_for_student(&conn, &student_id, 10).unwrap();
        let types: Vec<_> = log.iter().map(|e| e.tx_type).collect();
        assert_eq!(
            types,
            vec![
                TransactionType::TradingTax,
                TransactionType::BrokerageFee,
                TransactionType::InvestmentSell,
                TransactionType::InvestmentBuy,
            ]
        );
    }

    #[test]
    fn test_round_trip_costs_only_fees() {
        let (mut conn, session) = setup(0.0, 1_000_000.0);
        let config = EconomyConfig::default();
        let asset = listed(&conn, "FLAT", AssetCategory::Stock, 1.0, 1_000.0);

        let order = OrderRequest::market(asset.id, 10.0);
        let bought = buy(&mut conn, &config, &session, &order).unwrap();
        let sold = sell(&mut conn, &config, &session, &order).unwrap();

        let fees = bought.fee + sold.fees.brokerage + sold.fees.tax;
        assert_close(sold.remaining_balance, 1_000_000.0 - fees);
        assert_close(fees, 10.0 + 10.0 + 20.0);
        assert_close(sold.profit.amount, 0.0);
    }

    #[test]
    fn test_insufficient_funds_leaves_no_trace() {
        let (mut conn, session) = setup(0.0, 50_000.0);
        let config = EconomyConfig::default();
        let asset = listed(&conn, "ACME", AssetCategory::Stock, 1.0, 50_000.0);
        let student_id = session.student_id.clone().unwrap();

        // 50,000 + 50 fee is more than the 50,000 available
        let order = OrderRequest::market(asset.id, 1.0);
        let err = buy(&mut conn, &config, &session, &order).unwrap_err();
        assert!(matches!(err, EconomyError::InsufficientFunds { .. }));

        assert_eq!(
            ledger::get_balance(&conn, &student_id, AccountKind::Investment).unwrap(),
            50_000.0
        );
        assert!(portfolio::find_holding(&conn, &student_id, asset.id).unwrap().is_none());
        assert!(transaction_log::entries_for_student(&conn, &student_id, 10)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_fee_sink_failure_rolls_back_order() {
        let (mut conn, session) = setup(0.0, 100_000.0);
        let config = EconomyConfig::default();
        let asset = listed(&conn, "ACME", AssetCategory::Stock, 1.0, 1_000.0);
        let student_id = session.student_id.clone().unwrap();

        conn.execute(
            "DELETE FROM macro_entities WHERE teacher_id = ?1 AND kind = 'securities'",
            [TEACHER],
        )
        .unwrap();

        let order = OrderRequest::market(asset.id, 5.0);
        let err = buy(&mut conn, &config, &session, &order).unwrap_err();
        assert!(matches!(err, EconomyError::NotFound(_)));

        assert_eq!(
            ledger::get_balance(&conn, &student_id, AccountKind::Investment).unwrap(),
            100_000.0
        );
        assert!(portfolio::find_holding(&conn, &student_id, asset.id).unwrap().is_none());
        assert!(transaction_log::entries_for_student(&conn, &student_id, 10)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_quantity_rules() {
        let (mut conn, session) = setup(0.0, 1_000_000.0);
        let config = EconomyConfig::default();
        let stock = listed(&conn, "ACME", AssetCategory::Stock, 1.0, 100.0);
        let coin = listed(&conn, "COIN", AssetCategory::Cryptocurrency, 0.001, 10_000.0);

        for quantity in [0.0, -1.0, 1.5, 0.5, f64::NAN] {
            let err = buy(&mut conn, &config, &session, &OrderRequest::market(stock.id, quantity))
                .unwrap_err();
            assert!(matches!(err, EconomyError::Validation(_)), "quantity {}", quantity);
        }

        assert!(matches!(
            buy(&mut conn, &config, &session, &OrderRequest::market(coin.id, 0.0005)),
            Err(EconomyError::Validation(_))
        ));
        let order = OrderRequest::market(coin.id, 0.25);
        let receipt = buy(&mut conn, &config, &session, &order).unwrap();
        assert_eq!(receipt.holding.quantity, 0.25);
    }

    #[test]
    fn test_stale_quote_rejected() {
        let (mut conn, session) = setup(0.0, 1_000_000.0);
        let config = EconomyConfig::default();
        let asset = listed(&conn, "ACME", AssetCategory::Stock, 1.0, 100.0);

        let stale = OrderRequest {
            price: Some(90.0),
            ..OrderRequest::market(asset.id, 1.0)
        };
        assert!(matches!(
            buy(&mut conn, &config, &session, &stale),
            Err(EconomyError::Conflict(_))
        ));

        let current = OrderRequest {
            price: Some(100.0),
            ..OrderRequest::market(asset.id, 1.0)
        };
        assert!(buy(&mut conn, &config, &session, &current).is_ok());
    }

    #[test]
    fn test_sell_rules() {
        let (mut conn, session) = setup(0.0, 1_000_000.0);
        let config = EconomyConfig::default();
        let coin = listed(&conn, "COIN", AssetCategory::Cryptocurrency, 0.5, 1_000.0);

        assert!(matches!(
            sell(&mut conn, &config, &session, &OrderRequest::market(coin.id, 1.0)),
            Err(EconomyError::InsufficientHoldings { .. })
        ));

        buy(&mut conn, &config, &session, &OrderRequest::market(coin.id, 2.0)).unwrap();
        assert!(matches!(
            sell(&mut conn, &config, &session, &OrderRequest::market(coin.id, 1.75)),
            Err(EconomyError::BelowMinimumHolding { .. })
        ));

        // Two sells of the whole position: the second finds nothing left
        sell(&mut conn, &config, &session, &OrderRequest::market(coin.id, 2.0)).unwrap();
        assert!(matches!(
            sell(&mut conn, &config, &session, &OrderRequest::market(coin.id, 2.0)),
            Err(EconomyError::InsufficientHoldings { .. })
        ));
    }

    #[test]
    fn test_teacher_cannot_trade() {
        let (mut conn, _) = setup(0.0, 1_000.0);
        let asset = listed(&conn, "ACME", AssetCategory::Stock, 1.0, 100.0);

        assert!(matches!(
            buy(
                &mut conn,
                &EconomyConfig::default(),
                &Session::teacher(TEACHER),
                &OrderRequest::market(asset.id, 1.0)
            ),
            Err(EconomyError::Forbidden(_))
        ));
    }

    #[test]
    fn test_orders_stay_inside_the_session_classroom() {
        let (mut conn, session) = setup(100_000.0, 0.0);
        seed_classroom_for(&mut conn, OTHER_TEACHER);
        let config = EconomyConfig::default();
        let asset = listed(&conn, "ACME", AssetCategory::Stock, 1.0, 1_000.0);
        let student_id = session.student_id.clone().unwrap();
        let foreign = Session::student(OTHER_TEACHER, student_id.as_str());
        let other_securities =
            ledger::macro_balance(&conn, OTHER_TEACHER, MacroKind::Securities).unwrap();

        assert!(matches!(
            buy(&mut conn, &config, &foreign, &in_checking(asset.id, 1.0)),
            Err(EconomyError::NotFound(_))
        ));
        assert_eq!(
            ledger::get_balance(&conn, &student_id, AccountKind::Checking).unwrap(),
            100_000.0
        );

        buy(&mut conn, &config, &session, &in_checking(asset.id, 2.0)).unwrap();
        assert!(matches!(
            sell(&mut conn, &config, &foreign, &in_checking(asset.id, 1.0)),
            Err(EconomyError::NotFound(_))
        ));
        let holding = portfolio::find_holding(&conn, &student_id, asset.id)
            .unwrap()
            .unwrap();
        assert_eq!(holding.quantity, 2.0);

        assert_eq!(
            ledger::macro_balance(&conn, OTHER_TEACHER, MacroKind::Securities).unwrap(),
            other_securities
        );
        assert!(transaction_log::entries_for_classroom(&conn, OTHER_TEACHER, 10)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_concurrent_buys_for_one_student_serialize() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("economy.db");

        let mut conn = crate::db::open_database(&path).unwrap();
        seed_classroom(&mut conn);
        // Covers exactly one unit plus its fee
        let student_id = seed_student_with(&mut conn, "Ana", 700, 1_001.0, 0.0);
        let asset = listed(&conn, "ACME", AssetCategory::Stock, 1.0, 1_000.0);
        let session = Session::student(TEACHER, student_id.as_str());

        const WORKERS: usize = 8;
        let barrier = Arc::new(Barrier::new(WORKERS));
        let handles: Vec<_> = (0..WORKERS)
            .map(|_| {
                let mut worker = crate::db::open_database(&path).unwrap();
                let barrier = Arc::clone(&barrier);
                let session = session.clone();
                let request = in_checking(asset.id, 1.0);
                thread::spawn(move || {
                    barrier.wait();
                    buy(&mut worker, &EconomyConfig::default(), &session, &request)
                })
            })
            .collect();

        let results: Vec<EconomyResult<BuyReceipt>> =
            handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(
                e,
                EconomyError::InsufficientFunds { .. } | EconomyError::Conflict(_)
            )));

        let balance = ledger::get_balance(&conn, &student_id, AccountKind::Checking).unwrap();
        assert!(balance >= 0.0);
        assert_close(balance, 0.0);

        let holding = portfolio::find_holding(&conn, &student_id, asset.id)
            .unwrap()
            .unwrap();
        assert_eq!(holding.quantity, 1.0);

        let buys = transaction_log::entries_for_student(&conn, &student_id, 50)
            .unwrap()
            .into_iter()
            .filter(|e| e.tx_type == TransactionType::InvestmentBuy)
            .count();
        assert_eq!(buys, 1);
    }

    #[test]
    fn test_cost_helpers() {
        let fees = FeeSchedule::default();
        let costs = buy_costs(3.0, 1_000.0, &fees);
        assert_close(costs.total_cost, 3_003.0);

        let proceeds = sell_proceeds(3.0, 1_000.0, &fees);
        assert_close(proceeds.net, 2_991.0);
    }
}
