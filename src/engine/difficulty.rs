use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CORRECT_THRESHOLD: u32 = 3;
pub const DEFAULT_WRONG_THRESHOLD: u32 = 2;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

    pub fn label(self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Medium => "Medium",
            Difficulty::Hard => "Hard",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Difficulty::Easy => "Basic concepts and straightforward questions",
            Difficulty::Medium => "Moderate complexity with some analysis required",
            Difficulty::Hard => "Advanced concepts requiring deep understanding",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "easy" => Some(Difficulty::Easy),
            "medium" => Some(Difficulty::Medium),
            "hard" => Some(Difficulty::Hard),
            _ => None,
        }
    }

    fn harder(self) -> Self {
        match self {
            Difficulty::Easy => Difficulty::Medium,
            Difficulty::Medium | Difficulty::Hard => Difficulty::Hard,
        }
    }

    fn easier(self) -> Self {
        match self {
            Difficulty::Hard => Difficulty::Medium,
            Difficulty::Medium | Difficulty::Easy => Difficulty::Easy,
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub question_id: Option<String>,
    pub is_correct: bool,
    pub difficulty: Difficulty,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DifficultyState {
    pub level: Difficulty,
    pub consecutive_correct: u32,
    pub consecutive_wrong: u32,
    pub correct_threshold: u32,
    pub wrong_threshold: u32,
    pub level_history: Vec<Difficulty>,
    pub answer_history: Vec<AnswerRecord>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AdjustmentEvent {
    pub previous: Difficulty,
    pub new: Difficulty,
    pub was_adjusted: bool,
    pub consecutive_correct: u32,
    pub consecutive_wrong: u32,
    pub reason: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressKind {
    Advance,
    Maintain,
    Recover,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProgressToNext {
    pub kind: ProgressKind,
    pub current: u32,
    pub target: u32,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DifficultyInfo {
    pub level: Difficulty,
    pub consecutive_correct: u32,
    pub consecutive_wrong: u32,
    pub progress_to_next: ProgressToNext,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelBreakdown {
    pub total: usize,
    pub correct: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DifficultyStatistics {
    pub total_questions: usize,
    pub correct_answers: usize,
    pub accuracy: f64,
    pub breakdown: Vec<(Difficulty, LevelBreakdown)>,
    pub current_streak: u32,
    pub difficulty_changes: usize,
}

/// Streak-driven difficulty ladder. Three correct answers in a row move one
/// level up, two wrong answers in a row move one level down.
#[derive(Clone, Debug)]
pub struct DifficultyController {
    state: DifficultyState,
}

impl Default for DifficultyController {
    fn default() -> Self {
        Self::new(Difficulty::Medium)
    }
}

impl DifficultyController {
    pub fn new(initial: Difficulty) -> Self {
        Self::with_thresholds(initial, DEFAULT_CORRECT_THRESHOLD, DEFAULT_WRONG_THRESHOLD)
    }

    pub fn with_thresholds(initial: Difficulty, correct_threshold: u32, wrong_threshold: u32) -> Self {
        Self {
            state: DifficultyState {
                level: initial,
                consecutive_correct: 0,
                consecutive_wrong: 0,
                correct_threshold: correct_threshold.max(1),
                wrong_threshold: wrong_threshold.max(1),
                level_history: vec![initial],
                answer_history: Vec::new(),
            },
        }
    }

    pub fn from_state(state: DifficultyState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &DifficultyState {
        &self.state
    }

    pub fn level(&self) -> Difficulty {
        self.state.level
    }

    pub fn record_answer(&mut self, is_correct: bool, question_id: Option<&str>) -> AdjustmentEvent {
        let previous = self.state.level;
        self.state.answer_history.push(AnswerRecord {
            question_id: question_id.map(str::to_string),
            is_correct,
            difficulty: previous,
            timestamp: Utc::now(),
        });

        if is_correct {
            self.state.consecutive_correct += 1;
            self.state.consecutive_wrong = 0;
            if self.state.consecutive_correct >= self.state.correct_threshold {
                self.move_to(previous.harder());
                self.state.consecutive_correct = 0;
            }
        } else {
            self.state.consecutive_wrong += 1;
            self.state.consecutive_correct = 0;
            if self.state.consecutive_wrong >= self.state.wrong_threshold {
                self.move_to(previous.easier());
                self.state.consecutive_wrong = 0;
            }
        }

        let new = self.state.level;
        AdjustmentEvent {
            previous,
            new,
            was_adjusted: previous != new,
            consecutive_correct: self.state.consecutive_correct,
            consecutive_wrong: self.state.consecutive_wrong,
            reason: self.adjustment_reason(is_correct, previous),
        }
    }

    fn move_to(&mut self, level: Difficulty) {
        if level != self.state.level {
            self.state.level = level;
            self.state.level_history.push(level);
        }
    }

    fn adjustment_reason(&self, is_correct: bool, previous: Difficulty) -> Option<String> {
        let current = self.state.level;
        if current == previous {
            return None;
        }
        if is_correct {
            Some(format!(
                "Great job! {} correct answers in a row - moving to {}",
                self.state.correct_threshold, current
            ))
        } else {
            Some(format!(
                "Don't worry! Let's try some {current} questions to build confidence"
            ))
        }
    }

    pub fn current_info(&self) -> DifficultyInfo {
        DifficultyInfo {
            level: self.state.level,
            consecutive_correct: self.state.consecutive_correct,
            consecutive_wrong: self.state.consecutive_wrong,
            progress_to_next: self.progress_to_next(),
        }
    }

    /// At the floor this reports how close the learner is to climbing back
    /// out, not how close they are to dropping further. Intentional.
    fn progress_to_next(&self) -> ProgressToNext {
        let current = self.state.consecutive_correct;
        let target = self.state.correct_threshold;
        let remaining = target.saturating_sub(current);
        match self.state.level {
            Difficulty::Hard => ProgressToNext {
                kind: ProgressKind::Maintain,
                current,
                target,
                message: "Keep up the excellent work!".to_string(),
            },
            Difficulty::Easy => ProgressToNext {
                kind: ProgressKind::Recover,
                current,
                target,
                message: format!("{remaining} more correct to advance"),
            },
            level => ProgressToNext {
                kind: ProgressKind::Advance,
                current,
                target,
                message: format!("{remaining} more correct to advance to {}", level.harder()),
            },
        }
    }

    pub fn statistics(&self) -> DifficultyStatistics {
        let history = &self.state.answer_history;
        let total_questions = history.len();
        let correct_answers = history.iter().filter(|a| a.is_correct).count();
        let accuracy = if total_questions > 0 {
            let raw = correct_answers as f64 / total_questions as f64 * 100.0;
            (raw * 100.0).round() / 100.0
        } else {
            0.0
        };

        let breakdown = Difficulty::ALL
            .iter()
            .map(|&level| {
                let at_level = history.iter().filter(|a| a.difficulty == level);
                let (total, correct) = at_level.fold((0, 0), |(t, c), a| {
                    (t + 1, c + usize::from(a.is_correct))
                });
                (level, LevelBreakdown { total, correct })
            })
            .collect();

        DifficultyStatistics {
            total_questions,
            correct_answers,
            accuracy,
            breakdown,
            current_streak: self.state.consecutive_correct,
            difficulty_changes: self.state.level_history.len().saturating_sub(1),
        }
    }
}
