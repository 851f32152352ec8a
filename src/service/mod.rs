#[cfg(feature = "network")]
pub mod http;
pub mod local;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::session::identity::SessionId;
use crate::session::quiz::{QuizDefinition, QuizIssue};
use crate::session::result::ResultRecord;

pub type AttemptId = String;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("quiz not found: {0}")]
    NotFound(String),

    #[error("quiz {id} is invalid: {issue}")]
    InvalidQuiz { id: String, issue: QuizIssue },

    #[error("request failed ({status}): {message}")]
    Status { status: u16, message: String },

    #[error("received invalid json data")]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "network")]
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// One submitted attempt as reported back for analytics.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AttemptSummary {
    pub id: String,
    #[serde(default)]
    pub student_name: String,
    #[serde(default)]
    pub student_email: String,
    pub score: usize,
    pub total_questions: usize,
    pub percentage: f64,
    pub time_taken: u64,
    #[serde(default)]
    pub submitted_at: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuizSummary {
    pub id: String,
    pub title: String,
    pub question_count: usize,
}

/// The remote side of a quiz session: where definitions come from and where
/// finished attempts go.
pub trait QuizService {
    fn get_quiz(&self, id: &str) -> Result<QuizDefinition, ServiceError>;

    fn submit_attempt(
        &self,
        session: &SessionId,
        record: &ResultRecord,
    ) -> Result<AttemptId, ServiceError>;

    fn attempts(&self, quiz_id: &str) -> Result<Vec<AttemptSummary>, ServiceError>;
}

/// Fetch a quiz and reject definitions a session cannot run.
pub fn fetch_valid_quiz(service: &dyn QuizService, id: &str) -> Result<QuizDefinition, ServiceError> {
    let quiz = service.get_quiz(id)?;
    quiz.validate().map_err(|issue| ServiceError::InvalidQuiz {
        id: id.to_string(),
        issue,
    })?;
    Ok(quiz)
}
