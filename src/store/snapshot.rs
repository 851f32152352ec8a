use std::collections::{BTreeMap, BTreeSet};

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::engine::difficulty::DifficultyState;
use crate::session::identity::{LearnerInfo, SessionId};
use crate::session::quiz::QuizDefinition;
use crate::session::state::Progress;
use crate::store::PersistentStore;

/// Resumable session progress. The first seven fields are the long-standing
/// wire shape; the rest are optional so older blobs still load.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default)]
    pub student_info: LearnerInfo,
    #[serde(default)]
    pub answers: BTreeMap<usize, Vec<usize>>,
    #[serde(default)]
    pub current_question: usize,
    #[serde(default)]
    pub has_started: bool,
    #[serde(default)]
    pub time_left: Option<u32>,
    #[serde(default)]
    pub question_time_left: Option<u32>,
    #[serde(default)]
    pub timestamp: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_order: Option<Vec<usize>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub option_order: Option<Vec<Vec<usize>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elapsed_per_question: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<DifficultyState>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub evaluated: Vec<usize>,
}

impl Snapshot {
    pub fn capture(
        learner: &LearnerInfo,
        progress: &Progress,
        time_left: Option<u32>,
        question_time_left: Option<u32>,
    ) -> Self {
        let answers = progress
            .answers
            .iter()
            .enumerate()
            .filter(|(_, set)| !set.is_empty())
            .map(|(q, set)| (q, set.iter().copied().collect()))
            .collect();
        Self {
            student_info: learner.clone(),
            answers,
            current_question: progress.position,
            has_started: true,
            time_left,
            question_time_left,
            timestamp: Utc::now().timestamp_millis(),
            question_order: Some(progress.question_order.clone()),
            option_order: Some(progress.option_order.clone()),
            elapsed_per_question: Some(progress.elapsed.clone()),
            started_at: None,
            difficulty: None,
            evaluated: Vec::new(),
        }
    }

    /// Rebuild progress for `quiz`, or `None` if the snapshot was taken
    /// against a quiz of a different shape.
    pub fn to_progress(&self, quiz: &QuizDefinition) -> Option<Progress> {
        let mut progress = Progress::identity(quiz);
        if let Some(order) = &self.question_order {
            progress.question_order = order.clone();
        }
        if let Some(order) = &self.option_order {
            progress.option_order = order.clone();
        }
        if let Some(elapsed) = &self.elapsed_per_question {
            progress.elapsed = elapsed.clone();
        }
        for (&q, selected) in &self.answers {
            let slot = progress.answers.get_mut(q)?;
            *slot = selected.iter().copied().collect::<BTreeSet<usize>>();
        }
        progress.position = self.current_question;
        progress.fits(quiz).then_some(progress)
    }
}

#[derive(Debug, Error)]
enum SnapshotError {
    #[error("corrupt snapshot: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Saves and restores snapshots keyed by session. Reads never fail: a
/// missing, unreadable or corrupt snapshot is reported as absent.
pub struct SnapshotStore<S: PersistentStore> {
    store: S,
}

impl<S: PersistentStore> SnapshotStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn save(&self, id: &SessionId, snapshot: &Snapshot) -> Result<()> {
        let blob = serde_json::to_string(snapshot)?;
        self.store.save(&id.storage_key(), &blob)
    }

    pub fn load(&self, id: &SessionId) -> Option<Snapshot> {
        match self.read(id) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(session = %id, %err, "discarding unusable snapshot");
                None
            }
        }
    }

    fn read(&self, id: &SessionId) -> Result<Option<Snapshot>, SnapshotError> {
        let Some(blob) = self.store.load(&id.storage_key())? else {
            return Ok(None);
        };
        let snapshot = serde_json::from_str(&blob)?;
        Ok(Some(snapshot))
    }

    pub fn clear(&self, id: &SessionId) -> Result<()> {
        debug!(session = %id, "clearing snapshot");
        self.store.clear(&id.storage_key())
    }

    /// Remove whatever is stored for `id`, readable or not. Returns whether
    /// there was anything to remove.
    pub fn discard(&self, id: &SessionId) -> Result<bool> {
        let key = id.storage_key();
        if self.store.load(&key)?.is_none() {
            return Ok(false);
        }
        self.clear(id)?;
        Ok(true)
    }
}
