use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::service::{AttemptId, AttemptSummary, QuizService, ServiceError};
use crate::session::identity::SessionId;
use crate::session::quiz::QuizDefinition;
use crate::session::result::ResultRecord;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Deserialize)]
struct PublicQuizResponse {
    quiz: QuizDefinition,
}

#[derive(Debug, PartialEq, Serialize)]
struct QuizSubmission {
    quiz_id: String,
    student_name: String,
    student_email: String,
    answers: BTreeMap<String, Vec<usize>>,
    time_taken: u64,
}

impl QuizSubmission {
    fn from_record(record: &ResultRecord) -> Self {
        Self {
            quiz_id: record.quiz_id.clone(),
            student_name: record.learner.name.clone(),
            student_email: record.learner.email.clone(),
            answers: record.answers_by_question(),
            time_taken: record.time_taken_whole_secs(),
        }
    }
}

#[derive(Deserialize)]
struct SubmitResponse {
    attempt_id: String,
    #[serde(default)]
    score: Option<usize>,
}

#[derive(Deserialize)]
struct AttemptsResponse {
    #[serde(default)]
    attempts: Vec<AttemptSummary>,
}

#[derive(Deserialize)]
struct ErrorBody {
    detail: String,
}

/// Client for the quiz backend's public endpoints. Listing attempts needs a
/// bearer token; fetching and submitting do not.
pub struct HttpQuizService {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpQuizService {
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self, ServiceError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn read<T: DeserializeOwned>(response: Response) -> Result<T, ServiceError> {
        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&body)
                .map(|e| e.detail)
                .unwrap_or(body);
            if status.as_u16() == 404 {
                return Err(ServiceError::NotFound(message));
            }
            return Err(ServiceError::Status {
                status: status.as_u16(),
                message,
            });
        }
        Ok(serde_json::from_str(&body)?)
    }
}

impl QuizService for HttpQuizService {
    fn get_quiz(&self, id: &str) -> Result<QuizDefinition, ServiceError> {
        let url = self.url(&format!("/public/quiz/{id}"));
        debug!(%url, "fetching quiz");
        let response = self.client.get(&url).send()?;
        let mut quiz = Self::read::<PublicQuizResponse>(response)?.quiz;
        if quiz.id.is_empty() {
            quiz.id = id.to_string();
        }
        Ok(quiz)
    }

    fn submit_attempt(
        &self,
        session: &SessionId,
        record: &ResultRecord,
    ) -> Result<AttemptId, ServiceError> {
        let body = QuizSubmission::from_record(record);
        debug!(session = %session, "submitting attempt");
        let response = self
            .client
            .post(self.url("/public/quiz/submit"))
            .json(&body)
            .send()?;
        let submitted: SubmitResponse = Self::read(response)?;
        info!(
            attempt = %submitted.attempt_id,
            server_score = ?submitted.score,
            local_score = record.score,
            "attempt accepted"
        );
        Ok(submitted.attempt_id)
    }

    fn attempts(&self, quiz_id: &str) -> Result<Vec<AttemptSummary>, ServiceError> {
        let request = self.client.get(self.url(&format!("/quizzes/{quiz_id}/attempts")));
        let response = self.authorized(request).send()?;
        Ok(Self::read::<AttemptsResponse>(response)?.attempts)
    }
}
