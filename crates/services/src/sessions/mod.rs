mod engine;
mod fallback;
mod progress;
mod state;

// Public API of the session subsystem.
pub use crate::error::SessionError;
pub use engine::{
    AdvanceOutcome, AnswerReport, PracticeEngine, SessionResults, StartNotice, StartReport,
    StartRequest,
};
pub use progress::SessionProgress;
pub use state::{AnswerOutcome, PracticeSession, RecordedAnswer};
