use std::collections::HashMap;

use crate::models::{ProgressStatus, ProgressUpdate, QuestionId, Unit};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Explanation {
    pub prompt: String,
    pub explanation: String,
    pub correct: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizResult {
    pub unit_id: String,
    pub correct: usize,
    pub total: usize,
    /// Percentage, rounded half up.
    pub score: u32,
    pub explanations: Vec<Explanation>,
}

impl QuizResult {
    /// Progress record marking the unit completed with this score.
    pub fn progress_update(&self, subject: &str, grade: u32) -> ProgressUpdate {
        ProgressUpdate {
            subject: subject.to_string(),
            grade,
            unit_id: self.unit_id.clone(),
            status: ProgressStatus::Completed,
            score: Some(self.score),
        }
    }
}

/// Grade `answers` (question id → chosen choice index) against `unit`'s quiz.
/// Unanswered questions count as wrong.
pub fn grade_quiz(unit: &Unit, answers: &HashMap<QuestionId, usize>) -> QuizResult {
    let mut correct = 0;
    let explanations = unit
        .quiz
        .iter()
        .map(|q| {
            let right = answers.get(&q.id) == Some(&q.answer_index);
            if right {
                correct += 1;
            }
            Explanation {
                prompt: q.prompt.clone(),
                explanation: q.explanation.clone(),
                correct: right,
            }
        })
        .collect();

    let total = unit.quiz.len();
    let score = if total == 0 {
        0
    } else {
        (correct as f64 / total as f64 * 100.0 + 0.5).floor() as u32
    };

    QuizResult {
        unit_id: unit.id.clone(),
        correct,
        total,
        score,
        explanations,
    }
}
