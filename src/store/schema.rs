use serde::{Deserialize, Serialize};

use crate::session::result::ResultRecord;

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AttemptEntry {
    pub attempt_id: String,
    pub session: String,
    pub record: ResultRecord,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AttemptHistoryData {
    pub schema_version: u32,
    pub attempts: Vec<AttemptEntry>,
}

impl Default for AttemptHistoryData {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            attempts: Vec::new(),
        }
    }
}

impl AttemptHistoryData {
    /// Check if loaded data has a stale schema version and needs reset.
    pub fn needs_reset(&self) -> bool {
        self.schema_version != SCHEMA_VERSION
    }
}

#[cfg(test)]
impl AttemptEntry {
    pub fn sample(attempt_id: &str) -> Self {
        use chrono::Utc;

        use crate::session::identity::LearnerInfo;

        Self {
            attempt_id: attempt_id.to_string(),
            session: "sample/ada@example.com".to_string(),
            record: ResultRecord {
                quiz_id: "sample".to_string(),
                quiz_title: "Sample".to_string(),
                learner: LearnerInfo::new("Ada", "ada@example.com"),
                score: 1,
                total: 2,
                percentage: 50,
                questions: Vec::new(),
                correct_answers: vec![0],
                incorrect_answers: vec![1],
                unanswered: Vec::new(),
                time_taken_secs: 42.0,
                started_at: Utc::now(),
                submitted_at: Utc::now(),
                difficulty: None,
            },
        }
    }
}
