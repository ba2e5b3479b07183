use crate::models::{ReplySource, TutorReply, TutorRequest};

const DEFAULT_SUBJECT: &str = "math";
const DEFAULT_GRADE: u32 = 1;
const DEFAULT_LOCALE: &str = "en";

/// Shown when the tutor request fails without a usable server message.
pub const FALLBACK_REPLY: &str = "Sorry, I'm having trouble right now. Try again later!";

/// Subject, grade and locale the tutor answers for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TutorContext {
    pub subject: String,
    pub grade: u32,
    pub locale: String,
}

impl Default for TutorContext {
    fn default() -> Self {
        Self {
            subject: DEFAULT_SUBJECT.to_string(),
            grade: DEFAULT_GRADE,
            locale: DEFAULT_LOCALE.to_string(),
        }
    }
}

impl TutorContext {
    /// Infer the context from the page's subject and grade labels
    /// (e.g. `["Math", "Grade 2"]`).
    pub fn from_labels(labels: &[&str], locale: Option<&str>) -> Self {
        let mut ctx = Self::default();
        if let [subject, grade, ..] = labels {
            ctx.subject = if subject.to_lowercase().contains("math") {
                "math".to_string()
            } else {
                "english".to_string()
            };
            ctx.grade = first_number(grade).unwrap_or(DEFAULT_GRADE);
        }
        if let Some(locale) = locale.filter(|l| !l.is_empty()) {
            ctx.locale = locale.to_string();
        }
        ctx
    }
}

fn first_number(s: &str) -> Option<u32> {
    let digits: String = s
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    User,
    Tutor,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub sender: Sender,
    pub text: String,
}

/// One learner's conversation with the tutor.
#[derive(Debug, Clone, Default)]
pub struct TutorSession {
    context: TutorContext,
    messages: Vec<ChatMessage>,
    rules_badge: bool,
}

impl TutorSession {
    pub fn new(context: TutorContext) -> Self {
        Self {
            context,
            messages: Vec::new(),
            rules_badge: false,
        }
    }

    pub fn context(&self) -> &TutorContext {
        &self.context
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// True once any reply came from the rule table rather than the model.
    pub fn rules_badge(&self) -> bool {
        self.rules_badge
    }

    /// Record the learner's message and build the request for it.
    /// Blank input yields nothing.
    pub fn compose(&mut self, input: &str) -> Option<TutorRequest> {
        let message = input.trim();
        if message.is_empty() {
            return None;
        }
        self.push(Sender::User, message);
        Some(TutorRequest {
            message: message.to_string(),
            subject: self.context.subject.clone(),
            grade: self.context.grade,
            locale: self.context.locale.clone(),
        })
    }

    pub fn receive(&mut self, reply: &TutorReply) {
        self.push(Sender::Tutor, &reply.reply);
        if reply.source == ReplySource::Rules {
            self.rules_badge = true;
        }
    }

    /// Record a failed request, with the server's message if it sent one.
    pub fn fail(&mut self, server_error: Option<&str>) {
        match server_error {
            Some(msg) => self.push(Sender::Tutor, &format!("Error: {}", msg)),
            None => self.push(Sender::Tutor, FALLBACK_REPLY),
        }
    }

    fn push(&mut self, sender: Sender, text: &str) {
        self.messages.push(ChatMessage {
            sender,
            text: text.to_string(),
        });
    }
}
