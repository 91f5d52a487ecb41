/// Aggregated view of session progress, useful for UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionProgress {
    pub total: usize,
    pub answered: usize,
    pub correct: usize,
    pub remaining: usize,
    pub is_complete: bool,
}

impl SessionProgress {
    /// Rounded percentage of answered questions that were correct.
    #[must_use]
    pub fn accuracy_percent(&self) -> u32 {
        if self.answered == 0 {
            return 0;
        }
        ((self.correct as f64 / self.answered as f64) * 100.0).round() as u32
    }
}
