use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Per-user difficulty rating attached to a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DifficultyLabel {
    Easy,
    Medium,
    Hard,
}

impl DifficultyLabel {
    /// Stable wire code used by the ratings store.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            DifficultyLabel::Easy => "easy",
            DifficultyLabel::Medium => "medium",
            DifficultyLabel::Hard => "hard",
        }
    }
}

impl fmt::Display for DifficultyLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseDifficultyError(String);

impl fmt::Display for ParseDifficultyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown difficulty label: {}", self.0)
    }
}

impl std::error::Error for ParseDifficultyError {}

impl FromStr for DifficultyLabel {
    type Err = ParseDifficultyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "easy" => Ok(DifficultyLabel::Easy),
            "medium" => Ok(DifficultyLabel::Medium),
            "hard" => Ok(DifficultyLabel::Hard),
            other => Err(ParseDifficultyError(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_roundtrip() {
        for label in [
            DifficultyLabel::Easy,
            DifficultyLabel::Medium,
            DifficultyLabel::Hard,
        ] {
            let parsed: DifficultyLabel = label.as_str().parse().unwrap();
            assert_eq!(parsed, label);
        }
    }

    #[test]
    fn unknown_label_fails() {
        assert!("impossible".parse::<DifficultyLabel>().is_err());
    }
}
