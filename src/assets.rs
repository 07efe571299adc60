// 📈 Asset Catalog - Tradable instruments and the market price feed
//
// Prices come from outside the engine. A `PriceSource` answers quotes by
// symbol and `refresh_prices` copies them into the catalog; orders always
// execute at whatever price is stored here.

use crate::db::{is_unique_violation, timestamp};
use crate::entities::{Asset, AssetCategory};
use crate::error::{ensure_positive, EconomyError, EconomyResult};
use anyhow::Context;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io;
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAsset {
    pub symbol: String,
    pub name: String,
    pub category: AssetCategory,
    pub currency: String,
    pub min_quantity: f64,
    pub price: f64,
}

pub fn register_asset(conn: &Connection, new: &NewAsset) -> EconomyResult<Asset> {
    let symbol = new.symbol.trim().to_uppercase();
    if symbol.is_empty() {
        return Err(EconomyError::validation("asset symbol must not be empty"));
    }
    ensure_positive("min_quantity", new.min_quantity)?;
    if !new.category.allows_fractional() && new.min_quantity.fract() != 0.0 {
        return Err(EconomyError::validation(format!(
            "{} assets trade in whole units",
            new.category
        )));
    }
    ensure_positive("price", new.price)?;

    let inserted = conn.execute(
        "INSERT INTO assets (symbol, name, category, currency, min_quantity, current_price, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            symbol,
            new.name.trim(),
            new.category,
            new.currency.trim().to_uppercase(),
            new.min_quantity,
            new.price,
            timestamp(Utc::now()),
        ],
    );
    match inserted {
        Ok(_) => {}
        Err(e) if is_unique_violation(&e, "assets.symbol") => {
            return Err(EconomyError::Conflict(format!(
                "asset {} is already registered",
                symbol
            )));
        }
        Err(e) => return Err(e.into()),
    }

    info!(symbol = %symbol, category = %new.category, price = new.price, "asset registered");
    find_by_symbol(conn, &symbol)
}

pub fn find_asset(conn: &Connection, asset_id: i64) -> EconomyResult<Asset> {
    let sql = format!("SELECT {} FROM assets WHERE id = ?1", Asset::COLUMNS);
    conn.query_row(&sql, [asset_id], Asset::from_row)
        .optional()?
        .ok_or_else(|| EconomyError::not_found(format!("asset {}", asset_id)))
}

pub fn find_by_symbol(conn: &Connection, symbol: &str) -> EconomyResult<Asset> {
    let symbol = symbol.trim().to_uppercase();
    let sql = format!("SELECT {} FROM assets WHERE symbol = ?1", Asset::COLUMNS);
    conn.query_row(&sql, [&symbol], Asset::from_row)
        .optional()?
        .ok_or_else(|| EconomyError::not_found(format!("asset {}", symbol)))
}

pub fn list_assets(conn: &Connection) -> EconomyResult<Vec<Asset>> {
    let sql = format!("SELECT {} FROM assets ORDER BY symbol", Asset::COLUMNS);
    let mut stmt = conn.prepare(&sql)?;
    let assets = stmt
        .query_map([], Asset::from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(assets)
}

pub fn update_price(conn: &Connection, symbol: &str, price: f64) -> EconomyResult<Asset> {
    ensure_positive("price", price)?;
    let symbol = symbol.trim().to_uppercase();

    let changed = conn.execute(
        "UPDATE assets SET current_price = ?1, updated_at = ?2 WHERE symbol = ?3",
        params![price, timestamp(Utc::now()), symbol],
    )?;
    if changed == 0 {
        return Err(EconomyError::not_found(format!("asset {}", symbol)));
    }

    find_by_symbol(conn, &symbol)
}

// ============================================================================
// PRICE FEED
// ============================================================================

/// Market-data collaborator
pub trait PriceSource {
    fn quote(&self, symbol: &str) -> Option<f64>;
}

impl PriceSource for HashMap<String, f64> {
    fn quote(&self, symbol: &str) -> Option<f64> {
        self.get(symbol).copied()
    }
}

/// Prices loaded from a `symbol,price` CSV
#[derive(Debug, Clone, Default)]
pub struct PriceSheet {
    prices: HashMap<String, f64>,
}

#[derive(Debug, Deserialize)]
struct PriceRow {
    symbol: String,
    price: f64,
}

impl PriceSheet {
    pub fn from_reader<R: io::Read>(reader: R) -> anyhow::Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut prices = HashMap::new();
        for (idx, result) in rdr.deserialize::<PriceRow>().enumerate() {
            let row = result.with_context(|| format!("Failed to parse price line {}", idx + 2))?;
            prices.insert(row.symbol.to_uppercase(), row.price);
        }

        Ok(PriceSheet { prices })
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

impl PriceSource for PriceSheet {
    fn quote(&self, symbol: &str) -> Option<f64> {
        self.prices.get(&symbol.to_uppercase()).copied()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceRefresh {
    pub updated: Vec<String>,

    /// No quote, or a quote that isn't a positive price
    pub skipped: Vec<String>,
}

/// Copy every available quote into the catalog
pub fn refresh_prices<S: PriceSource + ?Sized>(
    conn: &Connection,
    source: &S,
) -> EconomyResult<PriceRefresh> {
    let mut refresh = PriceRefresh::default();

    for asset in list_assets(conn)? {
        match source.quote(&asset.symbol) {
            Some(price) if price.is_finite() && price > 0.0 => {
                update_price(conn, &asset.symbol, price)?;
                refresh.updated.push(asset.symbol);
            }
            Some(price) => {
                warn!(symbol = %asset.symbol, price, "ignoring invalid quote");
                refresh.skipped.push(asset.symbol);
            }
            None => refresh.skipped.push(asset.symbol),
        }
    }

    info!(
        updated = refresh.updated.len(),
        skipped = refresh.skipped.len(),
        "prices refreshed"
    );
    Ok(refresh)
}
