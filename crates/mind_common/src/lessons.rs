//! Lesson content lookup and import.

use crate::db;
use crate::error::{MindError, MindResult};
use crate::types::Lesson;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use tracing::info;

/// Reject lessons the client could not grade
pub fn validate_lesson(lesson: &Lesson) -> MindResult<()> {
    let at = format!("{}:{}", lesson.course, lesson.level);

    if lesson.course.trim().is_empty() {
        return Err(MindError::invalid("lesson course is required"));
    }
    if lesson.level < 1 {
        return Err(MindError::invalid(format!("{}: levels start at 1", at)));
    }
    if lesson.exercises.is_empty() {
        return Err(MindError::invalid(format!("{}: lesson has no exercises", at)));
    }

    for (index, exercise) in lesson.exercises.iter().enumerate() {
        let correct = exercise.options.iter().filter(|o| o.is_correct).count();
        if correct != 1 {
            return Err(MindError::invalid(format!(
                "{} exercise {}: expected exactly one correct option, found {}",
                at,
                index + 1,
                correct
            )));
        }
    }
    Ok(())
}

pub fn get_lesson(conn: &Connection, course: &str, level: u32) -> MindResult<Lesson> {
    db::get_lesson(conn, course, level)?
        .ok_or_else(|| MindError::not_found(format!("lesson {}:{}", course, level)))
}

/// Validate every lesson, then upsert them all in one transaction
pub fn import_lessons(conn: &Connection, lessons: &[Lesson]) -> MindResult<usize> {
    for lesson in lessons {
        validate_lesson(lesson)?;
    }

    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    for lesson in lessons {
        db::upsert_lesson(&tx, lesson)?;
    }
    tx.commit()?;

    info!("Imported {} lesson(s)", lessons.len());
    Ok(lessons.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Exercise, ExerciseOption};

    fn option(id: &str, is_correct: bool) -> ExerciseOption {
        ExerciseOption {
            id: id.to_string(),
            text: format!("option {}", id),
            is_correct,
        }
    }

    fn lesson(options: Vec<ExerciseOption>) -> Lesson {
        Lesson {
            course: "js".to_string(),
            level: 2,
            title: "Loops".to_string(),
            exercises: vec![Exercise {
                question: "Which loop?".to_string(),
                kind: "multiple_choice".to_string(),
                options,
            }],
        }
    }

    #[test]
    fn test_exactly_one_correct_option() {
        assert!(validate_lesson(&lesson(vec![option("a", true), option("b", false)])).is_ok());

        let none = validate_lesson(&lesson(vec![option("a", false)])).unwrap_err();
        assert!(none.to_string().contains("found 0"));

        let two = validate_lesson(&lesson(vec![option("a", true), option("b", true)])).unwrap_err();
        assert!(two.to_string().contains("found 2"));
    }

    #[test]
    fn test_empty_lesson_rejected() {
        let mut empty = lesson(vec![]);
        empty.exercises.clear();
        assert_eq!(validate_lesson(&empty).unwrap_err().kind(), "invalid_request");
    }
}
