use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::model::QuestionId;

//
// ─── TYPES ─────────────────────────────────────────────────────────────────────
//

/// One labeled answer option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alternative {
    pub label: String,
    pub text: String,
}

/// A single exam question, immutable once constructed.
///
/// The constructor guarantees the correct label names one of the
/// alternatives, so answering is a plain label comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    id: QuestionId,
    subject: String,
    topic: Option<String>,
    prompt: String,
    alternatives: Vec<Alternative>,
    correct_label: String,
    comment: Option<String>,
    board: Option<String>,
    organization: Option<String>,
    role: Option<String>,
    year: Option<i32>,
    prompt_images: Vec<Url>,
    comment_images: Vec<Url>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question prompt is empty")]
    EmptyPrompt,

    #[error("question has no alternatives")]
    NoAlternatives,

    #[error("correct label {label:?} is not among the alternatives")]
    UnknownCorrectLabel { label: String },

    #[error("alternatives payload could not be decoded: {0}")]
    BadAlternatives(String),
}

impl Question {
    /// Build a validated question.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` when the prompt is empty, no alternatives are
    /// given, or the correct label does not name an alternative.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: QuestionId,
        subject: impl Into<String>,
        topic: Option<String>,
        prompt: impl Into<String>,
        alternatives: Vec<Alternative>,
        correct_label: impl Into<String>,
        comment: Option<String>,
        board: Option<String>,
        organization: Option<String>,
        role: Option<String>,
        year: Option<i32>,
        prompt_images: Vec<Url>,
        comment_images: Vec<Url>,
    ) -> Result<Self, QuestionError> {
        let prompt = prompt.into();
        if prompt.trim().is_empty() {
            return Err(QuestionError::EmptyPrompt);
        }
        if alternatives.is_empty() {
            return Err(QuestionError::NoAlternatives);
        }
        let correct_label = correct_label.into();
        if !alternatives.iter().any(|a| a.label == correct_label) {
            return Err(QuestionError::UnknownCorrectLabel {
                label: correct_label,
            });
        }

        Ok(Self {
            id,
            subject: subject.into(),
            topic,
            prompt,
            alternatives,
            correct_label,
            comment,
            board,
            organization,
            role,
            year,
            prompt_images,
            comment_images,
        })
    }

    #[must_use]
    pub fn id(&self) -> QuestionId {
        self.id
    }

    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    #[must_use]
    pub fn topic(&self) -> Option<&str> {
        self.topic.as_deref()
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn alternatives(&self) -> &[Alternative] {
        &self.alternatives
    }

    #[must_use]
    pub fn correct_label(&self) -> &str {
        &self.correct_label
    }

    #[must_use]
    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    #[must_use]
    pub fn board(&self) -> Option<&str> {
        self.board.as_deref()
    }

    #[must_use]
    pub fn organization(&self) -> Option<&str> {
        self.organization.as_deref()
    }

    #[must_use]
    pub fn role(&self) -> Option<&str> {
        self.role.as_deref()
    }

    #[must_use]
    pub fn year(&self) -> Option<i32> {
        self.year
    }

    #[must_use]
    pub fn prompt_images(&self) -> &[Url] {
        &self.prompt_images
    }

    #[must_use]
    pub fn comment_images(&self) -> &[Url] {
        &self.comment_images
    }

    /// True when `label` matches this question's correct alternative.
    #[must_use]
    pub fn is_correct(&self, label: &str) -> bool {
        self.correct_label == label
    }
}

//
// ─── ALTERNATIVES CODEC ────────────────────────────────────────────────────────
//

/// Decode an alternatives payload from the bank.
///
/// The bank stores either a JSON array of `{label, text}` objects or that
/// same array serialized a second time into a JSON string; both forms are
/// accepted.
///
/// # Errors
///
/// Returns `QuestionError::BadAlternatives` for any other shape.
pub fn parse_alternatives(raw: &str) -> Result<Vec<Alternative>, QuestionError> {
    if let Ok(list) = serde_json::from_str::<Vec<Alternative>>(raw) {
        return Ok(list);
    }
    if let Ok(inner) = serde_json::from_str::<String>(raw) {
        if let Ok(list) = serde_json::from_str::<Vec<Alternative>>(&inner) {
            return Ok(list);
        }
    }
    Err(QuestionError::BadAlternatives(truncate_for_error(raw)))
}

fn truncate_for_error(raw: &str) -> String {
    const MAX: usize = 80;
    if raw.len() <= MAX {
        raw.to_string()
    } else {
        let mut end = MAX;
        while !raw.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &raw[..end])
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    fn alternatives() -> Vec<Alternative> {
        vec![
            Alternative {
                label: "A".into(),
                text: "first".into(),
            },
            Alternative {
                label: "B".into(),
                text: "second".into(),
            },
        ]
    }

    #[test]
    fn question_validates_correct_label() {
        let err = Question::new(
            QuestionId::new(1),
            "Português",
            None,
            "Assinale a correta.",
            alternatives(),
            "E",
            None,
            None,
            None,
            None,
            None,
            Vec::new(),
            Vec::new(),
        )
        .unwrap_err();

        assert!(matches!(err, QuestionError::UnknownCorrectLabel { .. }));
    }

    #[test]
    fn question_rejects_empty_prompt() {
        let err = Question::new(
            QuestionId::new(1),
            "Português",
            None,
            "   ",
            alternatives(),
            "A",
            None,
            None,
            None,
            None,
            None,
            Vec::new(),
            Vec::new(),
        )
        .unwrap_err();

        assert!(matches!(err, QuestionError::EmptyPrompt));
    }

    #[test]
    fn question_answers_by_label_equality() {
        let question = Question::new(
            QuestionId::new(7),
            "Direito Constitucional",
            Some("Direitos Fundamentais".into()),
            "Assinale a correta.",
            alternatives(),
            "B",
            Some("Ver art. 5º.".into()),
            Some("FGV".into()),
            None,
            None,
            Some(2023),
            Vec::new(),
            Vec::new(),
        )
        .unwrap();

        assert!(question.is_correct("B"));
        assert!(!question.is_correct("A"));
    }

    #[test]
    fn parse_alternatives_accepts_plain_array() {
        let raw = r#"[{"label":"A","text":"um"},{"label":"B","text":"dois"}]"#;
        let parsed = parse_alternatives(raw).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].label, "A");
    }

    #[test]
    fn parse_alternatives_accepts_double_encoded_array() {
        let raw = r#""[{\"label\":\"A\",\"text\":\"um\"}]""#;
        let parsed = parse_alternatives(raw).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].text, "um");
    }

    #[test]
    fn parse_alternatives_rejects_garbage() {
        let err = parse_alternatives("not json at all").unwrap_err();
        assert!(matches!(err, QuestionError::BadAlternatives(_)));
    }
}
