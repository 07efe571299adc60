// Classroom Economy - Core Library
// Financial consistency engine shared by the CLI, the API server and tests

pub mod error;
pub mod config;
pub mod session;
pub mod db;
pub mod entities;
pub mod codes;
pub mod ledger;          // Student accounts + macro entities
pub mod transaction_log; // Append-only movement log
pub mod classroom;       // Classrooms, join codes, roster
pub mod assets;          // Asset catalog + price feed
pub mod portfolio;       // Weighted-average holdings
pub mod orders;          // Buy/sell execution
pub mod loans;           // Credit tiers, amortization, repayment
pub mod seats;           // Money-supply seat market
pub mod payments;        // Transfers, allowance, tax

#[cfg(test)]
mod testutil;

// Re-export commonly used types
pub use error::{EconomyError, EconomyResult};
pub use config::{CreditTier, EconomyConfig, FeeSchedule, LoanPolicy, SeatPolicy, Treasury};
pub use session::Session;
pub use db::{atomically, open_database, open_in_memory, setup_database};
pub use entities::{
    AccountBalances, AccountKind, Asset, AssetCategory, Classroom, Loan, LoanStatus,
    MacroEntity, MacroKind, Seat, Student,
};
pub use ledger::MoneySupply;
pub use transaction_log::{TransactionRecord, TransactionStatus, TransactionType};
pub use classroom::NewStudent;
pub use assets::{NewAsset, PriceSheet, PriceSource};
pub use portfolio::{Holding, PortfolioSummary, Valuation};
pub use orders::{BuyReceipt, OrderRequest, SellReceipt};
pub use loans::{LoanApplication, LoanQuote, LoanReceipt, RepaymentReceipt, RepaymentRequest};
pub use seats::{SeatPurchase, SeatSale, SeatTradeRequest};
pub use payments::{
    AllowanceRequest, BatchReport, MoveFundsRequest, TaxCollectionRequest, TaxLevy,
    TransferRequest,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
