use thiserror::Error;

use crate::model::notebook::NotebookError;
use crate::model::question::QuestionError;
use crate::model::session::SessionSummaryError;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Question(#[from] QuestionError),
    #[error(transparent)]
    Notebook(#[from] NotebookError),
    #[error(transparent)]
    Summary(#[from] SessionSummaryError),
}
