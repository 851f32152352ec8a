use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::difficulty::DifficultyState;
use crate::session::identity::LearnerInfo;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuestionOutcome {
    pub question_index: usize,
    pub answered: bool,
    pub correct: bool,
    pub selected: Vec<usize>,
    pub correct_options: Vec<usize>,
    pub elapsed_secs: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub quiz_id: String,
    pub quiz_title: String,
    pub learner: LearnerInfo,
    pub score: usize,
    pub total: usize,
    pub percentage: u32,
    pub questions: Vec<QuestionOutcome>,
    pub correct_answers: Vec<usize>,
    pub incorrect_answers: Vec<usize>,
    pub unanswered: Vec<usize>,
    pub time_taken_secs: f64,
    pub started_at: DateTime<Utc>,
    pub submitted_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<DifficultyState>,
}

impl ResultRecord {
    /// Answered questions only, keyed by original question index.
    pub fn answers_by_question(&self) -> BTreeMap<String, Vec<usize>> {
        self.questions
            .iter()
            .filter(|q| q.answered)
            .map(|q| (q.question_index.to_string(), q.selected.clone()))
            .collect()
    }

    pub fn time_taken_whole_secs(&self) -> u64 {
        self.time_taken_secs.round().max(0.0) as u64
    }
}
