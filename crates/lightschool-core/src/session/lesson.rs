use crate::models::{Card, Unit};

/// Which navigation controls the viewer should offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Controls {
    pub prev_enabled: bool,
    pub show_next: bool,
    pub show_quiz: bool,
}

/// Card-by-card walk through one unit.
#[derive(Debug, Clone)]
pub struct LessonSession {
    unit_id: String,
    title: String,
    cards: Vec<Card>,
    index: usize,
}

impl LessonSession {
    /// Start at the first card. Returns `None` for a unit without cards.
    pub fn new(unit: &Unit) -> Option<Self> {
        if unit.cards.is_empty() {
            return None;
        }
        Some(Self {
            unit_id: unit.id.clone(),
            title: unit.title.clone(),
            cards: unit.cards.clone(),
            index: 0,
        })
    }

    pub fn unit_id(&self) -> &str {
        &self.unit_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn current(&self) -> &Card {
        &self.cards[self.index]
    }

    pub fn is_last(&self) -> bool {
        self.index + 1 == self.cards.len()
    }

    /// Advance one card. Returns false at the last card.
    pub fn next(&mut self) -> bool {
        if self.index + 1 < self.cards.len() {
            self.index += 1;
            true
        } else {
            false
        }
    }

    /// Go back one card. Returns false at the first card.
    pub fn prev(&mut self) -> bool {
        if self.index > 0 {
            self.index -= 1;
            true
        } else {
            false
        }
    }

    pub fn progress_percent(&self) -> f64 {
        (self.index + 1) as f64 / self.cards.len() as f64 * 100.0
    }

    pub fn controls(&self) -> Controls {
        Controls {
            prev_enabled: self.index > 0,
            show_next: !self.is_last(),
            show_quiz: self.is_last(),
        }
    }
}

/// Plain-text rendering of a card for terminal display.
pub fn render_card(card: &Card) -> String {
    let mut out = String::new();
    if let Some(title) = card.title() {
        out.push_str(title);
        out.push('\n');
        out.push_str(&"=".repeat(title.chars().count()));
        out.push('\n');
    }
    match card {
        Card::Text { body, .. } => out.push_str(body),
        Card::Image { src, caption, .. } => {
            out.push_str(&format!("[image: {}]\n{}", src, caption));
        }
        Card::Example { body, .. } => {
            out.push_str("  ");
            out.push_str(body);
        }
        Card::Unknown => {}
    }
    out
}

/// Quiz page for the lesson at `lesson_path`.
pub fn quiz_path(lesson_path: &str) -> String {
    lesson_path.replacen("/lesson/", "/quiz/", 1)
}
