#![forbid(unsafe_code)]

pub mod allowance;
pub mod count;
pub mod error;
pub mod gamification;
pub mod questions;
pub mod sessions;

pub use prep_core::Clock;
pub use sessions as session;

pub use allowance::{
    ActionKind, AllowanceErrorKind, AllowanceService, ConsumeOutcome, HttpAccessClient,
    HttpAllowanceClient, StaticAccess, StaticAllowance, UnlimitedAccessSource,
};
pub use count::CountEstimator;
pub use error::{AccessError, CoefficientsError, MergeError, SessionError, SourceError, StartError};
pub use gamification::{CoefficientsSource, HttpCoefficientsSource, StaticCoefficients};
pub use questions::{reweight_by_difficulty, NotebookMerger, QuestionSource};
pub use sessions::{
    AdvanceOutcome, AnswerReport, PracticeEngine, PracticeSession, SessionResults, StartNotice,
    StartReport, StartRequest,
};
