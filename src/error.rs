use thiserror::Error;

use crate::service::ServiceError;
use crate::session::state::SessionStatus;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("cannot {operation} while the session is {status}")]
    InvalidState {
        operation: &'static str,
        status: SessionStatus,
    },

    #[error("index {index} is out of range (0..{len})")]
    OutOfRange { index: usize, len: usize },

    #[error("session has already been submitted")]
    AlreadySubmitted,

    #[error("quiz has no questions")]
    EmptyQuiz,

    #[error("answer for question {0} is locked after evaluation")]
    AnswerLocked(usize),

    #[error("submission failed: {0}")]
    Submission(#[source] ServiceError),
}

pub type SessionResult<T> = Result<T, SessionError>;
