use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::engine::difficulty::{DEFAULT_CORRECT_THRESHOLD, DEFAULT_WRONG_THRESHOLD, Difficulty};
use crate::engine::timer::{DEFAULT_WARNING_THRESHOLD, TimerMode};
use crate::session::identity::LearnerInfo;
use crate::session::orchestrator::{AdaptiveSettings, SessionConfig};
use crate::session::quiz::{QuizDefinition, TimerType};

pub const PER_QUESTION_RANGE: (u32, u32) = (10, 300);
pub const MIN_GLOBAL_DURATION: u32 = 60;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerPreference {
    #[default]
    Off,
    Global,
    PerQuestion,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_theme")]
    pub theme: String,
    #[serde(default)]
    pub learner_name: String,
    #[serde(default)]
    pub learner_email: String,
    #[serde(default = "default_quiz_dir")]
    pub quiz_dir: String,
    #[serde(default)]
    pub api_base_url: Option<String>,
    #[serde(default)]
    pub api_token: Option<String>,
    #[serde(default)]
    pub shuffle_questions: bool,
    #[serde(default)]
    pub shuffle_options: bool,
    #[serde(default)]
    pub timer_mode: TimerPreference,
    #[serde(default = "default_global_duration")]
    pub global_duration: u32,
    #[serde(default = "default_per_question_duration")]
    pub per_question_duration: u32,
    #[serde(default = "default_auto_submit")]
    pub auto_submit: bool,
    #[serde(default = "default_warning_threshold")]
    pub warning_threshold: u32,
    #[serde(default)]
    pub adaptive: bool,
    #[serde(default)]
    pub starting_difficulty: Difficulty,
    #[serde(default = "default_correct_threshold")]
    pub correct_threshold: u32,
    #[serde(default = "default_wrong_threshold")]
    pub wrong_threshold: u32,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_theme() -> String {
    "terminal-default".to_string()
}
fn default_quiz_dir() -> String {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("quizline")
        .join("quizzes")
        .to_string_lossy()
        .to_string()
}
fn default_global_duration() -> u32 {
    1800
}
fn default_per_question_duration() -> u32 {
    30
}
fn default_auto_submit() -> bool {
    true
}
fn default_warning_threshold() -> u32 {
    DEFAULT_WARNING_THRESHOLD
}
fn default_correct_threshold() -> u32 {
    DEFAULT_CORRECT_THRESHOLD
}
fn default_wrong_threshold() -> u32 {
    DEFAULT_WRONG_THRESHOLD
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            theme: default_theme(),
            learner_name: String::new(),
            learner_email: String::new(),
            quiz_dir: default_quiz_dir(),
            api_base_url: None,
            api_token: None,
            shuffle_questions: false,
            shuffle_options: false,
            timer_mode: TimerPreference::default(),
            global_duration: default_global_duration(),
            per_question_duration: default_per_question_duration(),
            auto_submit: default_auto_submit(),
            warning_threshold: default_warning_threshold(),
            adaptive: false,
            starting_difficulty: Difficulty::default(),
            correct_threshold: default_correct_threshold(),
            wrong_threshold: default_wrong_threshold(),
            log_level: default_log_level(),
        }
    }
}

/// Per-run values from the command line. `None` defers to the quiz and then
/// to the config file.
#[derive(Clone, Debug, Default)]
pub struct SessionOverrides {
    pub timer: Option<TimerMode>,
    pub auto_submit: Option<bool>,
    pub shuffle_questions: Option<bool>,
    pub shuffle_options: Option<bool>,
    pub adaptive: Option<bool>,
    pub starting_difficulty: Option<Difficulty>,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = fs::read_to_string(path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("quizline")
            .join("config.toml")
    }

    /// Clamp durations and thresholds into their supported ranges and reset
    /// an unknown theme. Call after deserialization.
    pub fn validate(&mut self, known_themes: &[&str]) {
        let (lo, hi) = PER_QUESTION_RANGE;
        self.per_question_duration = self.per_question_duration.clamp(lo, hi);
        self.global_duration = self.global_duration.max(MIN_GLOBAL_DURATION);
        self.correct_threshold = self.correct_threshold.max(1);
        self.wrong_threshold = self.wrong_threshold.max(1);
        if !known_themes.contains(&self.theme.as_str()) {
            self.theme = default_theme();
        }
    }

    pub fn learner(&self) -> LearnerInfo {
        LearnerInfo::new(&self.learner_name, &self.learner_email)
    }

    pub fn quiz_dir(&self) -> PathBuf {
        PathBuf::from(&self.quiz_dir)
    }

    fn timer(&self) -> TimerMode {
        match self.timer_mode {
            TimerPreference::Off => TimerMode::Untimed,
            TimerPreference::Global => TimerMode::Global {
                duration: self.global_duration,
            },
            TimerPreference::PerQuestion => TimerMode::PerQuestion {
                duration: self.per_question_duration,
            },
        }
    }

    /// Resolve the session settings for `quiz`: command line first, then the
    /// quiz's own timer settings, then this config.
    pub fn session_config(&self, quiz: &QuizDefinition, overrides: &SessionOverrides) -> SessionConfig {
        let (quiz_timer, quiz_auto_submit) = match &quiz.timer_settings {
            Some(settings) if settings.enabled => {
                let mode = match settings.timer_type {
                    TimerType::Global => TimerMode::Global {
                        duration: settings.global_duration.max(1),
                    },
                    TimerType::PerQuestion => TimerMode::PerQuestion {
                        duration: settings.per_question_duration.max(1),
                    },
                };
                (Some(mode), Some(settings.auto_submit))
            }
            Some(settings) => (Some(TimerMode::Untimed), Some(settings.auto_submit)),
            None => (None, None),
        };

        let adaptive = overrides.adaptive.unwrap_or(self.adaptive).then(|| AdaptiveSettings {
            initial: overrides
                .starting_difficulty
                .unwrap_or(self.starting_difficulty),
            correct_threshold: self.correct_threshold,
            wrong_threshold: self.wrong_threshold,
        });

        SessionConfig {
            shuffle_questions: overrides.shuffle_questions.unwrap_or(self.shuffle_questions),
            shuffle_options: overrides.shuffle_options.unwrap_or(self.shuffle_options),
            timer: overrides.timer.or(quiz_timer).unwrap_or_else(|| self.timer()),
            auto_submit: overrides
                .auto_submit
                .or(quiz_auto_submit)
                .unwrap_or(self.auto_submit),
            warning_threshold: self.warning_threshold,
            adaptive,
        }
    }
}
