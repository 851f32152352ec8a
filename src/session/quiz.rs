use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::engine::difficulty::Difficulty;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuizOption {
    pub text: String,
    #[serde(default)]
    pub is_correct: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Question {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "question")]
    pub prompt: String,
    pub options: Vec<QuizOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<Difficulty>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl Question {
    pub fn correct_indices(&self) -> BTreeSet<usize> {
        self.options
            .iter()
            .enumerate()
            .filter(|(_, opt)| opt.is_correct)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn is_multi_select(&self) -> bool {
        self.options.iter().filter(|opt| opt.is_correct).count() > 1
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerType {
    #[default]
    Global,
    PerQuestion,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuizTimerSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub timer_type: TimerType,
    #[serde(default = "default_global_duration")]
    pub global_duration: u32,
    #[serde(default = "default_per_question_duration")]
    pub per_question_duration: u32,
    #[serde(default = "default_true")]
    pub auto_submit: bool,
    #[serde(default = "default_true")]
    pub show_timer: bool,
}

fn default_global_duration() -> u32 {
    1800
}

fn default_per_question_duration() -> u32 {
    30
}

fn default_true() -> bool {
    true
}

impl Default for QuizTimerSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            timer_type: TimerType::default(),
            global_duration: default_global_duration(),
            per_question_duration: default_per_question_duration(),
            auto_submit: true,
            show_timer: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuizDefinition {
    #[serde(default)]
    pub id: String,
    pub title: String,
    pub questions: Vec<Question>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timer_settings: Option<QuizTimerSettings>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QuizIssue {
    NoQuestions,
    EmptyPrompt { question: usize },
    TooFewOptions { question: usize, count: usize },
    NoCorrectOption { question: usize },
}

impl std::fmt::Display for QuizIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuizIssue::NoQuestions => write!(f, "at least one question is required"),
            QuizIssue::EmptyPrompt { question } => {
                write!(f, "question {}: question text is required", question + 1)
            }
            QuizIssue::TooFewOptions { question, count } => write!(
                f,
                "question {}: at least 2 options are required (found {count})",
                question + 1
            ),
            QuizIssue::NoCorrectOption { question } => {
                write!(f, "question {}: no option is marked correct", question + 1)
            }
        }
    }
}

impl QuizDefinition {
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn validate(&self) -> Result<(), QuizIssue> {
        if self.questions.is_empty() {
            return Err(QuizIssue::NoQuestions);
        }
        for (i, q) in self.questions.iter().enumerate() {
            if q.prompt.trim().is_empty() {
                return Err(QuizIssue::EmptyPrompt { question: i });
            }
            if q.options.len() < 2 {
                return Err(QuizIssue::TooFewOptions {
                    question: i,
                    count: q.options.len(),
                });
            }
            if !q.options.iter().any(|opt| opt.is_correct) {
                return Err(QuizIssue::NoCorrectOption { question: i });
            }
        }
        Ok(())
    }
}
