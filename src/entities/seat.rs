// 🪑 Seat - Scarce classroom slot traded like real estate

use crate::db::parse_timestamp;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Seat {
    pub teacher_id: String,
    pub seat_number: u32,
    pub owner_id: Option<String>,
    pub purchase_price: Option<f64>,
    pub purchase_date: Option<DateTime<Utc>>,

    /// Classroom-wide price from the last repricing
    pub current_price: f64,
}

impl Seat {
    pub(crate) const COLUMNS: &'static str =
        "teacher_id, seat_number, owner_id, purchase_price, purchase_date, current_price";

    pub(crate) fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        let purchase_date: Option<String> = row.get(4)?;
        let purchase_date = match purchase_date {
            Some(s) => Some(parse_timestamp(4, &s)?),
            None => None,
        };

        Ok(Seat {
            teacher_id: row.get(0)?,
            seat_number: row.get(1)?,
            owner_id: row.get(2)?,
            purchase_price: row.get(3)?,
            purchase_date,
            current_price: row.get(5)?,
        })
    }

    pub fn is_available(&self) -> bool {
        self.owner_id.is_none()
    }

    pub fn is_owned_by(&self, student_id: &str) -> bool {
        self.owner_id.as_deref() == Some(student_id)
    }
}
