//! Data exchanged with the lightschool server.
//!
//! - `LessonPack`, `Unit`, `Card`, `QuizQuestion`: lesson content
//! - `ProgressUpdate`: quiz completion records
//! - `TutorRequest`, `TutorReply`: tutor chat

pub mod lesson;
pub mod progress;
pub mod tutor;

pub use lesson::{Card, LessonPack, PackProblem, QuestionId, QuizQuestion, Unit};
pub use progress::{ProgressStatus, ProgressUpdate};
pub use tutor::{ReplySource, ServerError, TutorReply, TutorRequest};
