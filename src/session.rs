// 🔑 Session - Request-scoped identity
//
// Authentication happens upstream. Every operation receives the resulting
// identity explicitly instead of reading it from ambient state.

use crate::error::{EconomyError, EconomyResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Classroom scope; every record belongs to exactly one teacher
    pub teacher_id: String,

    /// Present when a student is acting, absent for the teacher
    pub student_id: Option<String>,
}

impl Session {
    pub fn teacher(teacher_id: impl Into<String>) -> Self {
        Session {
            teacher_id: teacher_id.into(),
            student_id: None,
        }
    }

    pub fn student(teacher_id: impl Into<String>, student_id: impl Into<String>) -> Self {
        Session {
            teacher_id: teacher_id.into(),
            student_id: Some(student_id.into()),
        }
    }

    pub fn is_teacher(&self) -> bool {
        self.student_id.is_none()
    }

    /// Acting student, or Forbidden for a teacher session
    pub fn require_student(&self) -> EconomyResult<&str> {
        self.student_id
            .as_deref()
            .ok_or_else(|| EconomyError::Forbidden("a student session is required".to_string()))
    }

    pub fn require_teacher(&self) -> EconomyResult<&str> {
        if self.is_teacher() {
            Ok(&self.teacher_id)
        } else {
            Err(EconomyError::Forbidden(
                "only the teacher may perform this action".to_string(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roles() {
        let teacher = Session::teacher("t-1");
        assert!(teacher.is_teacher());
        assert_eq!(teacher.require_teacher().unwrap(), "t-1");
        assert!(matches!(
            teacher.require_student(),
            Err(EconomyError::Forbidden(_))
        ));

        let student = Session::student("t-1", "s-1");
        assert_eq!(student.require_student().unwrap(), "s-1");
        assert!(matches!(
            student.require_teacher(),
            Err(EconomyError::Forbidden(_))
        ));
    }
}
