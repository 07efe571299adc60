// Shared fixtures for the in-module tests

use crate::classroom::{self, NewStudent};
use crate::config::{EconomyConfig, OpeningBalances};
use crate::session::Session;
use rusqlite::Connection;

pub const TEACHER: &str = "teacher-1";

/// A second classroom, for checks that records never cross classrooms
pub const OTHER_TEACHER: &str = "teacher-2";

pub fn seed_classroom(conn: &mut Connection) {
    seed_classroom_for(conn, TEACHER);
}

pub fn seed_classroom_for(conn: &mut Connection, teacher_id: &str) {
    classroom::create_classroom(
        conn,
        &EconomyConfig::default(),
        &Session::teacher(teacher_id),
        "Test Class",
    )
    .unwrap();
}

/// Enroll a student with `checking` in the checking account; returns its id
pub fn seed_student(conn: &mut Connection, name: &str, checking: f64) -> String {
    seed_student_with(conn, name, 700, checking, 0.0)
}

pub fn seed_student_with(
    conn: &mut Connection,
    name: &str,
    credit_score: i64,
    checking: f64,
    investment: f64,
) -> String {
    let new = NewStudent {
        name: name.to_string(),
        credit_score: Some(credit_score),
        opening: Some(OpeningBalances {
            checking,
            savings: 0.0,
            investment,
        }),
    };
    classroom::enroll_student(conn, &EconomyConfig::default(), &Session::teacher(TEACHER), &new)
        .unwrap()
        .id
}
