//! Lesson pack JSON as served to the client.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// All units of one subject and grade, in one locale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LessonPack {
    pub subject: String,
    pub grade: u32,
    pub locale: String,
    pub units: Vec<Unit>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Unit {
    pub id: String,
    pub title: String,
    pub cards: Vec<Card>,
    #[serde(default)]
    pub quiz: Vec<QuizQuestion>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Card {
    Text {
        #[serde(default)]
        title: Option<String>,
        body: String,
    },
    Image {
        #[serde(default)]
        title: Option<String>,
        src: String,
        #[serde(default)]
        caption: String,
    },
    Example {
        #[serde(default)]
        title: Option<String>,
        body: String,
    },
    #[serde(other)]
    Unknown,
}

impl Card {
    pub fn title(&self) -> Option<&str> {
        match self {
            Card::Text { title, .. } | Card::Image { title, .. } | Card::Example { title, .. } => {
                title.as_deref()
            }
            Card::Unknown => None,
        }
    }
}

/// Question ids appear as both numbers and strings in lesson packs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QuestionId {
    Number(i64),
    Text(String),
}

impl fmt::Display for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuestionId::Number(n) => write!(f, "{}", n),
            QuestionId::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub id: QuestionId,
    pub prompt: String,
    #[serde(default)]
    pub choices: Vec<String>,
    #[serde(rename = "answerIndex")]
    pub answer_index: usize,
    #[serde(default)]
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackProblem {
    NoUnits,
    DuplicateUnit(String),
    AnswerOutOfRange { unit: String, question: QuestionId },
}

impl fmt::Display for PackProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackProblem::NoUnits => write!(f, "lesson pack has no units"),
            PackProblem::DuplicateUnit(id) => write!(f, "duplicate unit id {}", id),
            PackProblem::AnswerOutOfRange { unit, question } => {
                write!(f, "unit {} question {}: answer index out of range", unit, question)
            }
        }
    }
}

impl LessonPack {
    pub fn unit(&self, id: &str) -> Option<&Unit> {
        self.units.iter().find(|u| u.id == id)
    }

    /// Structural checks beyond what deserialization enforces.
    pub fn validate(&self) -> Result<(), PackProblem> {
        if self.units.is_empty() {
            return Err(PackProblem::NoUnits);
        }
        let mut seen = HashSet::new();
        for unit in &self.units {
            if !seen.insert(unit.id.as_str()) {
                return Err(PackProblem::DuplicateUnit(unit.id.clone()));
            }
            for q in &unit.quiz {
                if !q.choices.is_empty() && q.answer_index >= q.choices.len() {
                    return Err(PackProblem::AnswerOutOfRange {
                        unit: unit.id.clone(),
                        question: q.id.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}
