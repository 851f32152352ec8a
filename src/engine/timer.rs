use serde::{Deserialize, Serialize};

pub const DEFAULT_WARNING_THRESHOLD: u32 = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TimerMode {
    Untimed,
    Global { duration: u32 },
    PerQuestion { duration: u32 },
}

impl TimerMode {
    pub fn duration(self) -> Option<u32> {
        match self {
            TimerMode::Untimed => None,
            TimerMode::Global { duration } | TimerMode::PerQuestion { duration } => Some(duration),
        }
    }

    pub fn is_global(self) -> bool {
        matches!(self, TimerMode::Global { .. })
    }

    pub fn is_per_question(self) -> bool {
        matches!(self, TimerMode::PerQuestion { .. })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerEvent {
    /// Nothing counted: untimed, or the deadline already fired.
    Idle,
    Running { remaining: u32 },
    Expired,
}

/// One-second countdown. Each deadline fires `Expired` exactly once; the
/// per-question deadline only comes back after an explicit `rearm`.
#[derive(Clone, Debug)]
pub struct TimerEngine {
    mode: TimerMode,
    remaining: u32,
    expired: bool,
    warning_threshold: u32,
}

impl TimerEngine {
    pub fn new(mode: TimerMode) -> Self {
        Self {
            mode,
            remaining: mode.duration().unwrap_or(0),
            expired: false,
            warning_threshold: DEFAULT_WARNING_THRESHOLD,
        }
    }

    pub fn with_warning_threshold(mut self, seconds: u32) -> Self {
        self.warning_threshold = seconds;
        self
    }

    pub fn mode(&self) -> TimerMode {
        self.mode
    }

    pub fn remaining(&self) -> Option<u32> {
        self.mode.duration().map(|_| self.remaining)
    }

    pub fn global_remaining(&self) -> Option<u32> {
        self.mode.is_global().then_some(self.remaining)
    }

    pub fn question_remaining(&self) -> Option<u32> {
        self.mode.is_per_question().then_some(self.remaining)
    }

    pub fn tick(&mut self) -> TimerEvent {
        if self.mode == TimerMode::Untimed || self.expired {
            return TimerEvent::Idle;
        }
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            self.expired = true;
            TimerEvent::Expired
        } else {
            TimerEvent::Running {
                remaining: self.remaining,
            }
        }
    }

    pub fn rearm(&mut self) {
        if let TimerMode::PerQuestion { duration } = self.mode {
            self.remaining = duration;
            self.expired = false;
        }
    }

    /// Resume with the remaining time exactly as it was saved. Time spent
    /// while the session was closed is not charged.
    pub fn restore(&mut self, remaining: u32) {
        if let Some(duration) = self.mode.duration() {
            self.remaining = remaining.min(duration);
            self.expired = false;
        }
    }

    pub fn is_warning(&self) -> bool {
        self.mode.duration().is_some() && !self.expired && self.remaining <= self.warning_threshold
    }

    pub fn elapsed_ratio(&self) -> f64 {
        match self.mode.duration() {
            Some(duration) if duration > 0 => {
                (duration - self.remaining.min(duration)) as f64 / duration as f64
            }
            _ => 0.0,
        }
    }

    /// Seconds consumed from the whole-session budget; `None` unless global.
    pub fn consumed(&self) -> Option<u32> {
        match self.mode {
            TimerMode::Global { duration } => Some(duration.saturating_sub(self.remaining)),
            _ => None,
        }
    }
}

pub fn format_clock(seconds: u32) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}
