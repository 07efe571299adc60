// 🏫 Classroom Registry - Classrooms, join codes and the student roster
//
// A classroom is created once per teacher together with its macro entities
// and seat pool. Students enter either through the teacher (enroll, roster
// import) or by typing the join code.

use crate::codes;
use crate::config::{EconomyConfig, OpeningBalances};
use crate::db::{atomically, timestamp};
use crate::entities::{Classroom, Student};
use crate::error::{EconomyError, EconomyResult};
use crate::ledger;
use crate::seats;
use crate::session::Session;
use anyhow::{anyhow, Context};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::io;
use tracing::info;

// ============================================================================
// CLASSROOMS
// ============================================================================

/// Create the session teacher's classroom with its macro entities and seats
pub fn create_classroom(
    conn: &mut Connection,
    config: &EconomyConfig,
    session: &Session,
    name: &str,
) -> EconomyResult<Classroom> {
    let teacher_id = session.require_teacher()?.to_string();
    let name = name.trim();
    if name.is_empty() {
        return Err(EconomyError::validation("classroom name must not be empty"));
    }

    let classroom = atomically(conn, |tx| {
        let exists: Option<String> = tx
            .query_row(
                "SELECT teacher_id FROM classrooms WHERE teacher_id = ?1",
                [&teacher_id],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_some() {
            return Err(EconomyError::Conflict(format!(
                "teacher {} already has a classroom",
                teacher_id
            )));
        }

        let created_at = Utc::now();
        let join_code = codes::generate_unique_code(
            tx,
            config.join_code_length,
            "classrooms.join_code",
            |conn, code| {
                conn.execute(
                    "INSERT INTO classrooms (teacher_id, name, join_code, created_at)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![teacher_id, name, code, timestamp(created_at)],
                )
            },
        )?;

        ledger::open_macro_entities(tx, &teacher_id, &config.treasury)?;
        seats::create_seats(tx, &teacher_id, config.seats.seat_count)?;

        Ok(Classroom {
            teacher_id: teacher_id.clone(),
            name: name.to_string(),
            join_code,
            created_at,
        })
    })?;

    info!(
        teacher_id = %classroom.teacher_id,
        join_code = %classroom.join_code,
        seats = config.seats.seat_count,
        "classroom created"
    );
    Ok(classroom)
}

pub fn find_classroom(conn: &Connection, teacher_id: &str) -> EconomyResult<Classroom> {
    let sql = format!(
        "SELECT {} FROM classrooms WHERE teacher_id = ?1",
        Classroom::COLUMNS
    );
    conn.query_row(&sql, [teacher_id], Classroom::from_row)
        .optional()?
        .ok_or_else(|| EconomyError::not_found(format!("classroom of teacher {}", teacher_id)))
}

/// Codes are matched case-insensitively
pub fn find_by_join_code(conn: &Connection, code: &str) -> EconomyResult<Classroom> {
    let code = code.trim().to_uppercase();
    let sql = format!(
        "SELECT {} FROM classrooms WHERE join_code = ?1",
        Classroom::COLUMNS
    );
    conn.query_row(&sql, [&code], Classroom::from_row)
        .optional()?
        .ok_or_else(|| EconomyError::not_found(format!("classroom with join code {}", code)))
}

// ============================================================================
// STUDENTS
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewStudent {
    pub name: String,

    /// Falls back to the configured default score
    #[serde(default)]
    pub credit_score: Option<i64>,

    /// Falls back to the configured endowment
    #[serde(default)]
    pub opening: Option<OpeningBalances>,
}

impl NewStudent {
    pub fn named(name: impl Into<String>) -> Self {
        NewStudent {
            name: name.into(),
            ..Default::default()
        }
    }
}

fn validate_credit_score(score: i64) -> EconomyResult<()> {
    if !(0..=1000).contains(&score) {
        return Err(EconomyError::validation(format!(
            "credit score must be between 0 and 1000, got {}",
            score
        )));
    }
    Ok(())
}

/// Student row plus its three accounts, inside the caller's transaction
fn insert_student(
    conn: &Connection,
    config: &EconomyConfig,
    teacher_id: &str,
    new: &NewStudent,
) -> EconomyResult<Student> {
    let name = new.name.trim();
    if name.is_empty() {
        return Err(EconomyError::validation("student name must not be empty"));
    }
    let credit_score = new.credit_score.unwrap_or(config.default_credit_score);
    validate_credit_score(credit_score)?;

    // Makes sure the classroom exists before anything is written
    find_classroom(conn, teacher_id)?;

    let student = Student {
        id: uuid::Uuid::new_v4().to_string(),
        teacher_id: teacher_id.to_string(),
        name: name.to_string(),
        credit_score,
        active: true,
        created_at: Utc::now(),
    };
    conn.execute(
        "INSERT INTO students (id, teacher_id, name, credit_score, active, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            student.id,
            student.teacher_id,
            student.name,
            student.credit_score,
            student.active,
            timestamp(student.created_at),
        ],
    )?;

    let opening = new.opening.as_ref().unwrap_or(&config.opening_balances);
    ledger::open_accounts(conn, &student.id, opening)?;

    Ok(student)
}

/// Teacher adds one student to the classroom
pub fn enroll_student(
    conn: &mut Connection,
    config: &EconomyConfig,
    session: &Session,
    new: &NewStudent,
) -> EconomyResult<Student> {
    let teacher_id = session.require_teacher()?.to_string();
    let student = atomically(conn, |tx| insert_student(tx, config, &teacher_id, new))?;

    info!(teacher_id = %teacher_id, student_id = %student.id, "student enrolled");
    Ok(student)
}

/// Student self-registration through a join code
pub fn join_classroom(
    conn: &mut Connection,
    config: &EconomyConfig,
    join_code: &str,
    name: &str,
) -> EconomyResult<Student> {
    let classroom = find_by_join_code(conn, join_code)?;
    let new = NewStudent::named(name);
    let student = atomically(conn, |tx| {
        insert_student(tx, config, &classroom.teacher_id, &new)
    })?;

    info!(
        teacher_id = %classroom.teacher_id,
        student_id = %student.id,
        "student joined with code"
    );
    Ok(student)
}

#[derive(Debug, Deserialize)]
struct RosterRow {
    name: String,
    #[serde(default)]
    credit_score: Option<i64>,
    #[serde(default)]
    checking: Option<f64>,
    #[serde(default)]
    savings: Option<f64>,
    #[serde(default)]
    investment: Option<f64>,
}

/// Import a roster CSV (`name,credit_score,checking,savings,investment`).
/// Every row is enrolled in one transaction; a bad row imports nothing.
pub fn import_roster<R: io::Read>(
    conn: &mut Connection,
    config: &EconomyConfig,
    session: &Session,
    reader: R,
) -> anyhow::Result<Vec<Student>> {
    let teacher_id = session.require_teacher()?.to_string();

    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut rows = Vec::new();
    for (idx, result) in rdr.deserialize::<RosterRow>().enumerate() {
        // Line 1 is the header
        let row = result.with_context(|| format!("Failed to parse roster line {}", idx + 2))?;
        let defaults = &config.opening_balances;
        rows.push(NewStudent {
            name: row.name,
            credit_score: row.credit_score,
            opening: Some(OpeningBalances {
                checking: row.checking.unwrap_or(defaults.checking),
                savings: row.savings.unwrap_or(defaults.savings),
                investment: row.investment.unwrap_or(defaults.investment),
            }),
        });
    }
    if rows.is_empty() {
        return Err(anyhow!("Roster contains no students"));
    }

    let students = atomically(conn, |tx| {
        rows.iter()
            .map(|new| insert_student(tx, config, &teacher_id, new))
            .collect::<EconomyResult<Vec<_>>>()
    })
    .context("Failed to import roster")?;

    info!(teacher_id = %teacher_id, count = students.len(), "roster imported");
    Ok(students)
}

pub fn find_student(
    conn: &Connection,
    teacher_id: &str,
    student_id: &str,
) -> EconomyResult<Student> {
    let sql = format!(
        "SELECT {} FROM students WHERE id = ?1 AND teacher_id = ?2",
        Student::COLUMNS
    );
    conn.query_row(&sql, params![student_id, teacher_id], Student::from_row)
        .optional()?
        .ok_or_else(|| EconomyError::not_found(format!("student {}", student_id)))
}

pub fn list_students(conn: &Connection, teacher_id: &str) -> EconomyResult<Vec<Student>> {
    let sql = format!(
        "SELECT {} FROM students WHERE teacher_id = ?1 ORDER BY name, id",
        Student::COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let students = stmt
        .query_map([teacher_id], Student::from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(students)
}

pub fn active_student_ids(conn: &Connection, teacher_id: &str) -> EconomyResult<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT id FROM students WHERE teacher_id = ?1 AND active = 1 ORDER BY name, id",
    )?;
    let ids = stmt
        .query_map([teacher_id], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;

    Ok(ids)
}

pub fn set_credit_score(
    conn: &Connection,
    session: &Session,
    student_id: &str,
    credit_score: i64,
) -> EconomyResult<Student> {
    let teacher_id = session.require_teacher()?;
    validate_credit_score(credit_score)?;

    let changed = conn.execute(
        "UPDATE students SET credit_score = ?1 WHERE id = ?2 AND teacher_id = ?3",
        params![credit_score, student_id, teacher_id],
    )?;
    if changed == 0 {
        return Err(EconomyError::not_found(format!("student {}", student_id)));
    }

    info!(student_id, credit_score, "credit score updated");
    find_student(conn, teacher_id, student_id)
}

/// Inactive students keep their money but no longer count as seat buyers or batch targets
pub fn set_active(
    conn: &Connection,
    session: &Session,
    student_id: &str,
    active: bool,
) -> EconomyResult<Student> {
    let teacher_id = session.require_teacher()?;

    let changed = conn.execute(
        "UPDATE students SET active = ?1 WHERE id = ?2 AND teacher_id = ?3",
        params![active, student_id, teacher_id],
    )?;
    if changed == 0 {
        return Err(EconomyError::not_found(format!("student {}", student_id)));
    }

    info!(student_id, active, "student activity changed");
    find_student(conn, teacher_id, student_id)
}
