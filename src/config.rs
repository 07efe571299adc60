// ⚙️ Economy Configuration - Rules as data
// Fee rates, loan tiers, seat policy and treasury balances live here so a
// teacher can tune the economy without touching code.

use crate::loans::MAX_DURATION_WEEKS;
use anyhow::{anyhow, Context as AnyhowContext, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

// ============================================================================
// FEES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeeSchedule {
    /// Charged on both buys and sells, credited to the securities house
    pub brokerage_rate: f64,

    /// Charged on sells only, credited to the government
    pub trading_tax_rate: f64,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        FeeSchedule {
            brokerage_rate: 0.001,
            trading_tax_rate: 0.002,
        }
    }
}

// ============================================================================
// LOANS
// ============================================================================

/// One step of the credit-score → terms function
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditTier {
    pub min_credit_score: i64,
    pub annual_rate: f64,
    pub max_amount: f64,
    pub max_weeks: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoanPolicy {
    /// Non-completed loans a student may hold at once
    pub max_active_loans: u32,
    pub tiers: Vec<CreditTier>,
}

impl Default for LoanPolicy {
    fn default() -> Self {
        LoanPolicy {
            max_active_loans: 1,
            tiers: vec![
                CreditTier {
                    min_credit_score: 900,
                    annual_rate: 4.0,
                    max_amount: 5_000_000.0,
                    max_weeks: 52,
                },
                CreditTier {
                    min_credit_score: 800,
                    annual_rate: 6.0,
                    max_amount: 3_000_000.0,
                    max_weeks: 36,
                },
                CreditTier {
                    min_credit_score: 700,
                    annual_rate: 9.0,
                    max_amount: 2_000_000.0,
                    max_weeks: 24,
                },
                CreditTier {
                    min_credit_score: 600,
                    annual_rate: 12.0,
                    max_amount: 1_200_000.0,
                    max_weeks: 12,
                },
            ],
        }
    }
}

impl LoanPolicy {
    /// Best tier the score qualifies for (tiers may be listed in any order)
    pub fn tier_for(&self, credit_score: i64) -> Option<&CreditTier> {
        self.tiers
            .iter()
            .filter(|t| credit_score >= t.min_credit_score)
            .max_by_key(|t| t.min_credit_score)
    }

    pub fn minimum_score(&self) -> Option<i64> {
        self.tiers.iter().map(|t| t.min_credit_score).min()
    }
}

// ============================================================================
// SEATS & TREASURY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeatPolicy {
    pub seat_count: u32,

    /// Share of the average student wealth a seat is worth
    pub price_ratio: f64,
}

impl Default for SeatPolicy {
    fn default() -> Self {
        SeatPolicy {
            seat_count: 30,
            price_ratio: 0.6,
        }
    }
}

/// Opening balances of the macro entities at classroom creation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Treasury {
    pub government: f64,
    pub bank: f64,
    pub securities: f64,
}

impl Default for Treasury {
    fn default() -> Self {
        Treasury {
            government: 100_000_000.0,
            bank: 500_000_000.0,
            securities: 0.0,
        }
    }
}

/// Endowment every newly enrolled student starts with
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpeningBalances {
    pub checking: f64,
    pub savings: f64,
    pub investment: f64,
}

// ============================================================================
// ECONOMY CONFIG
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EconomyConfig {
    pub fees: FeeSchedule,
    pub loans: LoanPolicy,
    pub seats: SeatPolicy,
    pub treasury: Treasury,
    pub opening_balances: OpeningBalances,

    /// Score given to students who join without one
    pub default_credit_score: i64,

    pub join_code_length: usize,
}

impl Default for EconomyConfig {
    fn default() -> Self {
        EconomyConfig {
            fees: FeeSchedule::default(),
            loans: LoanPolicy::default(),
            seats: SeatPolicy::default(),
            treasury: Treasury::default(),
            opening_balances: OpeningBalances::default(),
            default_credit_score: 700,
            join_code_length: 6,
        }
    }
}

impl EconomyConfig {
    /// Load config from JSON file; missing sections fall back to defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let config: EconomyConfig =
            serde_json::from_str(&content).context("Failed to parse config JSON")?;
        config.validate()?;

        Ok(config)
    }

    /// Load from `ECONOMY_CONFIG` if set, defaults otherwise
    pub fn from_env() -> Result<Self> {
        match std::env::var("ECONOMY_CONFIG") {
            Ok(path) if !path.is_empty() => Self::from_file(path),
            _ => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let rates = [self.fees.brokerage_rate, self.fees.trading_tax_rate];
        if rates.iter().any(|r| !r.is_finite() || *r < 0.0 || *r >= 1.0) {
            return Err(anyhow!("fee rates must be within [0, 1)"));
        }
        if self.loans.tiers.is_empty() {
            return Err(anyhow!("at least one credit tier is required"));
        }
        for tier in &self.loans.tiers {
            if tier.annual_rate < 0.0
                || tier.max_amount <= 0.0
                || tier.max_weeks == 0
                || tier.max_weeks > MAX_DURATION_WEEKS
            {
                return Err(anyhow!(
                    "invalid credit tier starting at score {}",
                    tier.min_credit_score
                ));
            }
        }

        // Higher score must never mean worse terms
        let mut tiers = self.loans.tiers.clone();
        tiers.sort_by_key(|t| t.min_credit_score);
        for pair in tiers.windows(2) {
            let (lower, higher) = (&pair[0], &pair[1]);
            if lower.min_credit_score == higher.min_credit_score {
                return Err(anyhow!(
                    "duplicate credit tier for score {}",
                    lower.min_credit_score
                ));
            }
            if higher.annual_rate > lower.annual_rate
                || higher.max_amount < lower.max_amount
                || higher.max_weeks < lower.max_weeks
            {
                return Err(anyhow!(
                    "credit tiers are not monotone between scores {} and {}",
                    lower.min_credit_score,
                    higher.min_credit_score
                ));
            }
        }

        if !(self.seats.price_ratio > 0.0 && self.seats.price_ratio.is_finite()) {
            return Err(anyhow!("seat price ratio must be positive"));
        }
        if !(0..=1000).contains(&self.default_credit_score) {
            return Err(anyhow!("default credit score must be between 0 and 1000"));
        }
        let opening = &self.opening_balances;
        if [opening.checking, opening.savings, opening.investment]
            .iter()
            .any(|b| !b.is_finite() || *b < 0.0)
        {
            return Err(anyhow!("opening balances must be non-negative"));
        }
        if !(4..=16).contains(&self.join_code_length) {
            return Err(anyhow!("join code length must be between 4 and 16"));
        }

        Ok(())
    }
}
