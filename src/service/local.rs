use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use rust_embed::Embed;
use tracing::{debug, info, warn};

use crate::service::{AttemptId, AttemptSummary, QuizService, QuizSummary, ServiceError};
use crate::session::identity::{SessionId, sanitize_key};
use crate::session::quiz::QuizDefinition;
use crate::session::result::ResultRecord;
use crate::store::json_store::JsonStore;
use crate::store::schema::{AttemptEntry, AttemptHistoryData};

#[derive(Embed)]
#[folder = "assets/quizzes/"]
struct QuizAssets;

/// Offline quiz service: definitions from a quiz directory (falling back to
/// the bundled quizzes), attempts recorded in the local attempt history.
pub struct LocalQuizService {
    quiz_dir: Option<PathBuf>,
    store: JsonStore,
}

impl LocalQuizService {
    pub fn new(quiz_dir: Option<PathBuf>, store: JsonStore) -> Self {
        Self { quiz_dir, store }
    }

    pub fn store(&self) -> &JsonStore {
        &self.store
    }

    fn parse(id: &str, content: &str) -> Result<QuizDefinition, ServiceError> {
        let mut quiz: QuizDefinition = serde_json::from_str(content)?;
        if quiz.id.is_empty() {
            quiz.id = id.to_string();
        }
        Ok(quiz)
    }

    fn load_from_dir(&self, id: &str) -> Option<Result<QuizDefinition, ServiceError>> {
        let dir = self.quiz_dir.as_ref()?;
        let path = dir.join(format!("{}.json", sanitize_key(id)));
        let content = fs::read_to_string(&path).ok()?;
        debug!(path = %path.display(), "loading quiz from directory");
        Some(Self::parse(id, &content))
    }

    fn load_bundled(id: &str) -> Option<Result<QuizDefinition, ServiceError>> {
        let file = QuizAssets::get(&format!("{id}.json"))?;
        let content = String::from_utf8_lossy(file.data.as_ref()).into_owned();
        Some(Self::parse(id, &content))
    }

    /// Every quiz this service can serve, directory quizzes shadowing bundled
    /// ones with the same id.
    pub fn list_quizzes(&self) -> Vec<QuizSummary> {
        let mut found: BTreeMap<String, QuizSummary> = BTreeMap::new();

        for name in QuizAssets::iter() {
            if let Some(id) = name.strip_suffix(".json")
                && let Some(Ok(quiz)) = Self::load_bundled(id)
            {
                found.insert(id.to_string(), summary(id, &quiz));
            }
        }

        if let Some(dir) = &self.quiz_dir
            && let Ok(entries) = fs::read_dir(dir)
        {
            for entry in entries.filter_map(|e| e.ok()) {
                let name = entry.file_name().to_string_lossy().to_string();
                let Some(id) = name.strip_suffix(".json") else {
                    continue;
                };
                match fs::read_to_string(entry.path()).map(|c| Self::parse(id, &c)) {
                    Ok(Ok(quiz)) => {
                        found.insert(id.to_string(), summary(id, &quiz));
                    }
                    _ => warn!(file = %name, "skipping unreadable quiz file"),
                }
            }
        }

        found.into_values().collect()
    }

    fn history(&self) -> AttemptHistoryData {
        let history = self.store.load_attempt_history();
        if history.needs_reset() {
            warn!(
                version = history.schema_version,
                "attempt history has a stale schema, starting over"
            );
            return AttemptHistoryData::default();
        }
        history
    }

    /// All recorded attempts, newest first, optionally narrowed to one quiz.
    pub fn history_entries(&self, quiz_id: Option<&str>) -> Vec<AttemptEntry> {
        let mut entries: Vec<AttemptEntry> = self
            .history()
            .attempts
            .into_iter()
            .filter(|e| quiz_id.is_none_or(|id| e.record.quiz_id == id))
            .collect();
        entries.sort_by(|a, b| b.record.submitted_at.cmp(&a.record.submitted_at));
        entries
    }
}

fn summary(id: &str, quiz: &QuizDefinition) -> QuizSummary {
    QuizSummary {
        id: id.to_string(),
        title: quiz.title.clone(),
        question_count: quiz.len(),
    }
}

impl QuizService for LocalQuizService {
    fn get_quiz(&self, id: &str) -> Result<QuizDefinition, ServiceError> {
        self.load_from_dir(id)
            .or_else(|| Self::load_bundled(id))
            .unwrap_or_else(|| Err(ServiceError::NotFound(id.to_string())))
    }

    fn submit_attempt(
        &self,
        session: &SessionId,
        record: &ResultRecord,
    ) -> Result<AttemptId, ServiceError> {
        let mut history = self.history();
        let attempt_id = format!(
            "{}-{}",
            sanitize_key(&record.quiz_id),
            record.submitted_at.timestamp_millis()
        );
        history.attempts.push(AttemptEntry {
            attempt_id: attempt_id.clone(),
            session: session.to_string(),
            record: record.clone(),
        });
        self.store.save_attempt_history(&history)?;
        info!(attempt = %attempt_id, score = record.score, total = record.total, "attempt recorded");
        Ok(attempt_id)
    }

    fn attempts(&self, quiz_id: &str) -> Result<Vec<AttemptSummary>, ServiceError> {
        Ok(self
            .history_entries(Some(quiz_id))
            .into_iter()
            .map(|entry| AttemptSummary {
                id: entry.attempt_id,
                student_name: entry.record.learner.name.clone(),
                student_email: entry.record.learner.email.clone(),
                score: entry.record.score,
                total_questions: entry.record.total,
                percentage: entry.record.percentage as f64,
                time_taken: entry.record.time_taken_whole_secs(),
                submitted_at: Some(entry.record.submitted_at.to_rfc3339()),
            })
            .collect())
    }
}
