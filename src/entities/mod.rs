// Entity Models
//
// Plain data carried between the store and the workflows. Each entity knows
// how to read itself from a row; the workflows own every mutation.

/// Stores a unit-variant enum as its lowercase text name.
///
/// The enum must provide `as_str()` and a `FromStr` impl whose error is
/// `EconomyError`.
macro_rules! sql_text_enum {
    ($ty:ty) => {
        impl rusqlite::types::ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
                Ok(self.as_str().into())
            }
        }

        impl rusqlite::types::FromSql for $ty {
            fn column_result(
                value: rusqlite::types::ValueRef<'_>,
            ) -> rusqlite::types::FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|e| rusqlite::types::FromSqlError::Other(Box::new(e)))
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.pad(self.as_str())
            }
        }
    };
}

pub(crate) use sql_text_enum;

pub mod account;
pub mod asset;
pub mod loan;
pub mod seat;
pub mod student;

pub use account::{AccountBalances, AccountKind, MacroEntity, MacroKind};
pub use asset::{Asset, AssetCategory};
pub use loan::{Loan, LoanStatus};
pub use seat::Seat;
pub use student::{Classroom, Student};
