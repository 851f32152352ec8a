use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearnerInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
}

impl LearnerInfo {
    pub fn new(name: &str, email: &str) -> Self {
        Self {
            name: name.trim().to_string(),
            email: email.trim().to_string(),
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.name.is_empty() && !self.email.is_empty()
    }

    /// Stable identity for storage keys. Email wins over name since it is
    /// unique per learner.
    fn key(&self) -> &str {
        if !self.email.is_empty() {
            &self.email
        } else if !self.name.is_empty() {
            &self.name
        } else {
            "anonymous"
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SessionId {
    quiz_id: String,
    learner_key: String,
}

impl SessionId {
    pub fn new(quiz_id: &str, learner: &LearnerInfo) -> Self {
        Self {
            quiz_id: quiz_id.to_string(),
            learner_key: learner.key().to_ascii_lowercase(),
        }
    }

    /// `quiz_<quiz>.<learner>_progress`, with both parts escaped so that
    /// distinct sessions never share a key.
    pub fn storage_key(&self) -> String {
        format!(
            "quiz_{}.{}_progress",
            escape_key_part(&self.quiz_id),
            escape_key_part(&self.learner_key)
        )
    }
}

/// Keeps ASCII letters, digits and `-`; every other byte becomes `_xx`.
/// The output never contains `.` and is left unchanged by `sanitize_key`.
fn escape_key_part(part: &str) -> String {
    let mut out = String::with_capacity(part.len());
    for byte in part.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' {
            out.push(char::from(byte));
        } else {
            out.push_str(&format!("_{byte:02x}"));
        }
    }
    out
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.quiz_id, self.learner_key)
    }
}

pub(crate) fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
