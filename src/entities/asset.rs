// 📈 Asset - Tradable instrument with an externally fed market price

use super::sql_text_enum;
use crate::db::parse_timestamp;
use crate::error::EconomyError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetCategory {
    Stock,
    Etf,
    Bond,
    Commodity,
    Cryptocurrency,
}

impl AssetCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetCategory::Stock => "stock",
            AssetCategory::Etf => "etf",
            AssetCategory::Bond => "bond",
            AssetCategory::Commodity => "commodity",
            AssetCategory::Cryptocurrency => "cryptocurrency",
        }
    }

    /// Only crypto trades in fractions; everything else in whole units
    pub fn allows_fractional(&self) -> bool {
        matches!(self, AssetCategory::Cryptocurrency)
    }
}

impl FromStr for AssetCategory {
    type Err = EconomyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "stock" => Ok(AssetCategory::Stock),
            "etf" => Ok(AssetCategory::Etf),
            "bond" => Ok(AssetCategory::Bond),
            "commodity" => Ok(AssetCategory::Commodity),
            "cryptocurrency" | "crypto" => Ok(AssetCategory::Cryptocurrency),
            other => Err(EconomyError::Validation(format!(
                "unknown asset category: {}",
                other
            ))),
        }
    }
}

sql_text_enum!(AssetCategory);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub id: i64,
    pub symbol: String,
    pub name: String,
    pub category: AssetCategory,
    pub currency: String,

    /// Smallest tradable and holdable unit
    pub min_quantity: f64,

    /// Last price delivered by the market-data feed
    pub current_price: f64,

    pub updated_at: DateTime<Utc>,
}

impl Asset {
    pub(crate) const COLUMNS: &'static str =
        "id, symbol, name, category, currency, min_quantity, current_price, updated_at";

    pub(crate) fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        let updated_at: String = row.get(7)?;
        Ok(Asset {
            id: row.get(0)?,
            symbol: row.get(1)?,
            name: row.get(2)?,
            category: row.get(3)?,
            currency: row.get(4)?,
            min_quantity: row.get(5)?,
            current_price: row.get(6)?,
            updated_at: parse_timestamp(7, &updated_at)?,
        })
    }
}
