// 🎓 Classroom & Student

use crate::db::parse_timestamp;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One teacher's economy; every other record is scoped to it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classroom {
    pub teacher_id: String,
    pub name: String,

    /// Short code students type to join
    pub join_code: String,

    pub created_at: DateTime<Utc>,
}

impl Classroom {
    pub(crate) const COLUMNS: &'static str = "teacher_id, name, join_code, created_at";

    pub(crate) fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        let created_at: String = row.get(3)?;
        Ok(Classroom {
            teacher_id: row.get(0)?,
            name: row.get(1)?,
            join_code: row.get(2)?,
            created_at: parse_timestamp(3, &created_at)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub id: String,
    pub teacher_id: String,
    pub name: String,
    pub credit_score: i64,

    /// Inactive students are left out of seat pricing
    pub active: bool,

    pub created_at: DateTime<Utc>,
}

impl Student {
    pub(crate) const COLUMNS: &'static str =
        "id, teacher_id, name, credit_score, active, created_at";

    pub(crate) fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        let created_at: String = row.get(5)?;
        Ok(Student {
            id: row.get(0)?,
            teacher_id: row.get(1)?,
            name: row.get(2)?,
            credit_score: row.get(3)?,
            active: row.get(4)?,
            created_at: parse_timestamp(5, &created_at)?,
        })
    }
}
