pub mod difficulty;
pub mod filters;
pub mod ids;
pub mod notebook;
pub mod question;
pub mod rewards;
pub mod session;

pub use difficulty::DifficultyLabel;
pub use filters::{Facet, FilterSet, ToggleSet};
pub use ids::{NotebookId, ProgramId, QuestionId, UserId};
pub use notebook::{Notebook, NotebookError, NotebookSettings};
pub use question::{parse_alternatives, Alternative, Question, QuestionError};
pub use rewards::{Reward, RewardCoefficients};
pub use session::{
    PracticeContext, SessionSummary, SessionSummaryError, StudyMode,
};
