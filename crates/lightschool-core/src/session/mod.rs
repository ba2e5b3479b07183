//! Per-learner state for the lesson viewer, quiz and tutor.
//!
//! Each front end owns its own session values; nothing here is global.

pub mod lesson;
pub mod quiz;
pub mod tutor;

pub use lesson::{quiz_path, render_card, Controls, LessonSession};
pub use quiz::{grade_quiz, Explanation, QuizResult};
pub use tutor::{ChatMessage, Sender, TutorContext, TutorSession, FALLBACK_REPLY};
