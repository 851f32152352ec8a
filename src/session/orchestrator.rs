use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use rand::Rng;
use tracing::{debug, info, warn};

use crate::engine::difficulty::{
    AdjustmentEvent, DEFAULT_CORRECT_THRESHOLD, DEFAULT_WRONG_THRESHOLD, Difficulty,
    DifficultyController, DifficultyInfo, DifficultyStatistics,
};
use crate::engine::scoring::{self, ScoreContext};
use crate::engine::timer::{DEFAULT_WARNING_THRESHOLD, TimerEngine, TimerEvent, TimerMode};
use crate::error::{SessionError, SessionResult};
use crate::service::{AttemptId, QuizService};
use crate::session::clock::Clock;
use crate::session::identity::{LearnerInfo, SessionId};
use crate::session::quiz::{Question, QuizDefinition, QuizOption};
use crate::session::result::ResultRecord;
use crate::session::state::{SessionStateMachine, SessionStatus};
use crate::store::PersistentStore;
use crate::store::snapshot::{Snapshot, SnapshotStore};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AdaptiveSettings {
    pub initial: Difficulty,
    pub correct_threshold: u32,
    pub wrong_threshold: u32,
}

impl Default for AdaptiveSettings {
    fn default() -> Self {
        Self {
            initial: Difficulty::Medium,
            correct_threshold: DEFAULT_CORRECT_THRESHOLD,
            wrong_threshold: DEFAULT_WRONG_THRESHOLD,
        }
    }
}

/// Per-session behaviour, resolved from CLI, quiz and config before start.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionConfig {
    pub shuffle_questions: bool,
    pub shuffle_options: bool,
    pub timer: TimerMode,
    pub auto_submit: bool,
    pub warning_threshold: u32,
    pub adaptive: Option<AdaptiveSettings>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            shuffle_questions: false,
            shuffle_options: false,
            timer: TimerMode::Untimed,
            auto_submit: true,
            warning_threshold: DEFAULT_WARNING_THRESHOLD,
            adaptive: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StartKind {
    Fresh,
    Resumed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// No timer running, or nothing left to count.
    Idle,
    Counting { remaining: u32 },
    /// The question deadline passed and the session moved on.
    AutoAdvanced { position: usize },
    /// A deadline passed and the session should be submitted now.
    SubmitDue,
    /// A deadline passed but auto-submit is off; the learner decides.
    Holding,
}

/// Read-only view of the question on screen.
pub struct QuestionView<'a> {
    pub position: usize,
    pub total: usize,
    pub question: &'a Question,
    pub options: Vec<(usize, &'a QuizOption)>,
    pub selected: &'a BTreeSet<usize>,
    pub multi_select: bool,
    pub locked: bool,
}

pub struct SessionOrchestrator<S: PersistentStore> {
    id: SessionId,
    learner: LearnerInfo,
    config: SessionConfig,
    machine: SessionStateMachine,
    timer: TimerEngine,
    snapshots: SnapshotStore<S>,
    difficulty: Option<DifficultyController>,
    evaluated: BTreeSet<usize>,
    last_adjustment: Option<AdjustmentEvent>,
    started_at: DateTime<Utc>,
    result: Option<ResultRecord>,
    attempt_id: Option<AttemptId>,
}

impl<S: PersistentStore> SessionOrchestrator<S> {
    pub fn new(
        quiz: QuizDefinition,
        learner: LearnerInfo,
        config: SessionConfig,
        store: S,
        clock: Box<dyn Clock>,
    ) -> Self {
        let id = SessionId::new(&quiz.id, &learner);
        let timer = TimerEngine::new(config.timer).with_warning_threshold(config.warning_threshold);
        let difficulty = config.adaptive.map(|a| {
            DifficultyController::with_thresholds(a.initial, a.correct_threshold, a.wrong_threshold)
        });
        Self {
            id,
            learner,
            config,
            machine: SessionStateMachine::new(quiz, clock),
            timer,
            snapshots: SnapshotStore::new(store),
            difficulty,
            evaluated: BTreeSet::new(),
            last_adjustment: None,
            started_at: Utc::now(),
            result: None,
            attempt_id: None,
        }
    }

    /// Resume from a stored snapshot when one fits the quiz, otherwise start
    /// fresh with the configured shuffling.
    pub fn start_session<R: Rng + ?Sized>(&mut self, rng: &mut R) -> SessionResult<StartKind> {
        if self.machine.is_empty() {
            return Err(SessionError::EmptyQuiz);
        }

        let kind = match self.snapshots.load(&self.id) {
            Some(snapshot) if snapshot.has_started => self.try_resume(snapshot),
            _ => None,
        };

        let kind = match kind {
            Some(kind) => kind,
            None => {
                self.machine.start(
                    self.config.shuffle_questions,
                    self.config.shuffle_options,
                    rng,
                )?;
                info!(session = %self.id, questions = self.machine.len(), "session started");
                StartKind::Fresh
            }
        };

        self.persist();
        Ok(kind)
    }

    fn try_resume(&mut self, snapshot: Snapshot) -> Option<StartKind> {
        let Some(progress) = snapshot.to_progress(self.machine.quiz()) else {
            warn!(session = %self.id, "snapshot does not match quiz, starting fresh");
            return None;
        };
        if let Err(err) = self.machine.resume(progress) {
            warn!(session = %self.id, %err, "could not resume snapshot, starting fresh");
            return None;
        }

        let saved_remaining = match self.timer.mode() {
            TimerMode::Global { .. } => snapshot.time_left,
            TimerMode::PerQuestion { .. } => snapshot.question_time_left,
            TimerMode::Untimed => None,
        };
        if let Some(remaining) = saved_remaining {
            self.timer.restore(remaining);
        }
        if let Some(started_at) = snapshot.started_at {
            self.started_at = started_at;
        }
        if self.difficulty.is_some()
            && let Some(state) = snapshot.difficulty
        {
            self.difficulty = Some(DifficultyController::from_state(state));
        }
        self.evaluated = snapshot
            .evaluated
            .into_iter()
            .filter(|&q| q < self.machine.len())
            .collect();

        info!(
            session = %self.id,
            position = self.machine.position(),
            remaining = ?self.timer.remaining(),
            "session resumed"
        );
        Some(StartKind::Resumed)
    }

    pub fn select_answer(&mut self, display_option: usize, selected: bool) -> SessionResult<()> {
        let q = self.current_index_checked("answer")?;
        if self.is_locked(q) {
            return Err(SessionError::AnswerLocked(q));
        }
        self.machine.set_answer(display_option, selected)?;

        let single = !self.machine.current_question().is_multi_select();
        if single && !self.machine.current_answer().is_empty() {
            self.evaluate_answer(q);
        }
        self.persist();
        Ok(())
    }

    pub fn toggle_answer(&mut self, display_option: usize) -> SessionResult<()> {
        self.current_index_checked("answer")?;
        let selected = self.machine.is_selected(display_option);
        self.select_answer(display_option, !selected)
    }

    pub fn go_next(&mut self) -> SessionResult<bool> {
        self.navigate("advance", |m| m.advance())
    }

    pub fn go_previous(&mut self) -> SessionResult<bool> {
        self.navigate("retreat", |m| m.retreat())
    }

    pub fn jump_to(&mut self, position: usize) -> SessionResult<bool> {
        self.navigate("jump", |m| m.jump_to(position))
    }

    fn navigate(
        &mut self,
        operation: &'static str,
        step: impl FnOnce(&mut SessionStateMachine) -> SessionResult<bool>,
    ) -> SessionResult<bool> {
        let q = self.current_index_checked(operation)?;
        let moved = step(&mut self.machine)?;
        if moved {
            self.leave_question(q);
            self.timer.rearm();
        }
        self.persist();
        Ok(moved)
    }

    /// A multi-select answer is final once the learner moves away from it.
    fn leave_question(&mut self, q: usize) {
        let answered = self.machine.answer(q).is_some_and(|a| !a.is_empty());
        if answered {
            self.evaluate_answer(q);
        }
    }

    /// Advance the countdown by one second.
    pub fn on_tick(&mut self) -> TickOutcome {
        if self.machine.status() != SessionStatus::InProgress {
            return TickOutcome::Idle;
        }
        match self.timer.tick() {
            TimerEvent::Idle => TickOutcome::Idle,
            TimerEvent::Running { remaining } => {
                self.persist();
                TickOutcome::Counting { remaining }
            }
            TimerEvent::Expired => self.on_expired(),
        }
    }

    fn on_expired(&mut self) -> TickOutcome {
        let q = self.machine.current_index();
        info!(
            session = %self.id,
            position = self.machine.position(),
            mode = ?self.timer.mode(),
            "timer expired"
        );

        if self.timer.mode().is_per_question() {
            let answered = !self.machine.current_answer().is_empty();
            if answered {
                self.evaluate_answer(q);
            } else {
                self.evaluate(q, false);
            }

            if !self.machine.is_last() {
                // in progress and not last, so advancing cannot fail
                let moved = self.machine.advance().unwrap_or(false);
                if moved {
                    self.timer.rearm();
                    self.persist();
                    return TickOutcome::AutoAdvanced {
                        position: self.machine.position(),
                    };
                }
            }
        }

        self.persist();
        if self.config.auto_submit {
            TickOutcome::SubmitDue
        } else {
            TickOutcome::Holding
        }
    }

    /// Score the session and hand the record to `service`. A transport
    /// failure leaves the session in progress with its snapshot intact.
    pub fn submit_session(&mut self, service: &dyn QuizService) -> SessionResult<&ResultRecord> {
        match self.machine.status() {
            SessionStatus::InProgress => {}
            SessionStatus::Submitted => return Err(SessionError::AlreadySubmitted),
            status => {
                return Err(SessionError::InvalidState {
                    operation: "submit",
                    status,
                });
            }
        }

        // Pending evaluations only stick once the service accepts the attempt.
        let rollback = (
            self.difficulty.clone(),
            self.evaluated.clone(),
            self.last_adjustment.clone(),
        );
        let pending: Vec<usize> = (0..self.machine.len())
            .filter(|q| self.machine.answer(*q).is_some_and(|a| !a.is_empty()))
            .collect();
        for q in pending {
            self.evaluate_answer(q);
        }

        self.machine.flush_elapsed();
        let record = scoring::score(
            self.machine.progress(),
            self.machine.quiz(),
            ScoreContext {
                learner: self.learner.clone(),
                global_consumed: self.timer.consumed(),
                started_at: self.started_at,
                submitted_at: Utc::now(),
                difficulty: self.difficulty.as_ref().map(|d| d.state().clone()),
            },
        );

        let attempt_id = match service.submit_attempt(&self.id, &record) {
            Ok(id) => id,
            Err(err) => {
                warn!(session = %self.id, %err, "submission failed, session kept open");
                (self.difficulty, self.evaluated, self.last_adjustment) = rollback;
                self.persist();
                return Err(SessionError::Submission(err));
            }
        };

        self.machine.submit()?;
        if let Err(err) = self.snapshots.clear(&self.id) {
            warn!(session = %self.id, %err, "failed to clear snapshot");
        }
        info!(
            session = %self.id,
            attempt = %attempt_id,
            score = record.score,
            total = record.total,
            "session submitted"
        );
        self.attempt_id = Some(attempt_id);
        Ok(self.result.insert(record))
    }

    fn evaluate_answer(&mut self, q: usize) {
        let expected = self.machine.quiz().questions[q].correct_indices();
        let correct = self
            .machine
            .answer(q)
            .is_some_and(|a| scoring::is_correct(a, &expected));
        self.evaluate(q, correct);
    }

    /// Feed one question to the difficulty controller, at most once.
    fn evaluate(&mut self, q: usize, correct: bool) {
        let Some(controller) = self.difficulty.as_mut() else {
            return;
        };
        if !self.evaluated.insert(q) {
            return;
        }
        let question_id = self.machine.quiz().questions[q]
            .id
            .clone()
            .unwrap_or_else(|| q.to_string());
        let event = controller.record_answer(correct, Some(&question_id));
        if event.was_adjusted {
            info!(
                session = %self.id,
                from = %event.previous,
                to = %event.new,
                "difficulty adjusted"
            );
        } else {
            debug!(question = q, correct, level = %event.new, "answer evaluated");
        }
        self.last_adjustment = Some(event);
    }

    fn persist(&mut self) {
        if self.machine.status() != SessionStatus::InProgress {
            return;
        }
        self.machine.flush_elapsed();
        let mut snapshot = Snapshot::capture(
            &self.learner,
            self.machine.progress(),
            self.timer.global_remaining(),
            self.timer.question_remaining(),
        );
        snapshot.started_at = Some(self.started_at);
        snapshot.difficulty = self.difficulty.as_ref().map(|d| d.state().clone());
        snapshot.evaluated = self.evaluated.iter().copied().collect();
        if let Err(err) = self.snapshots.save(&self.id, &snapshot) {
            warn!(session = %self.id, %err, "failed to save snapshot");
        }
    }

    fn current_index_checked(&self, operation: &'static str) -> SessionResult<usize> {
        match self.machine.status() {
            SessionStatus::InProgress => Ok(self.machine.current_index()),
            status => Err(SessionError::InvalidState { operation, status }),
        }
    }

    /// Answers are frozen once the difficulty controller has seen them.
    pub fn is_locked(&self, question_index: usize) -> bool {
        self.difficulty.is_some() && self.evaluated.contains(&question_index)
    }

    pub fn session_id(&self) -> &SessionId {
        &self.id
    }

    pub fn learner(&self) -> &LearnerInfo {
        &self.learner
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn status(&self) -> SessionStatus {
        self.machine.status()
    }

    pub fn quiz(&self) -> &QuizDefinition {
        self.machine.quiz()
    }

    pub fn machine(&self) -> &SessionStateMachine {
        &self.machine
    }

    pub fn timer(&self) -> &TimerEngine {
        &self.timer
    }

    pub fn remaining(&self) -> Option<u32> {
        self.timer.remaining()
    }

    pub fn current_view(&self) -> QuestionView<'_> {
        let question = self.machine.current_question();
        QuestionView {
            position: self.machine.position(),
            total: self.machine.len(),
            question,
            options: self.machine.displayed_options(),
            selected: self.machine.current_answer(),
            multi_select: question.is_multi_select(),
            locked: self.is_locked(self.machine.current_index()),
        }
    }

    pub fn difficulty_info(&self) -> Option<DifficultyInfo> {
        self.difficulty.as_ref().map(|d| d.current_info())
    }

    pub fn difficulty_statistics(&self) -> Option<DifficultyStatistics> {
        self.difficulty.as_ref().map(|d| d.statistics())
    }

    pub fn last_adjustment(&self) -> Option<&AdjustmentEvent> {
        self.last_adjustment.as_ref()
    }

    pub fn result(&self) -> Option<&ResultRecord> {
        self.result.as_ref()
    }

    pub fn attempt_id(&self) -> Option<&str> {
        self.attempt_id.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};

    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use super::*;
    use crate::service::{AttemptSummary, ServiceError};
    use crate::session::clock::ManualClock;
    use crate::session::quiz::fixtures::{question, sample_quiz};
    use crate::store::memory::MemoryStore;

    #[derive(Default)]
    struct StubService {
        fail: Cell<bool>,
        submitted: RefCell<Vec<ResultRecord>>,
    }

    impl QuizService for StubService {
        fn get_quiz(&self, id: &str) -> Result<QuizDefinition, ServiceError> {
            Err(ServiceError::NotFound(id.to_string()))
        }

        fn submit_attempt(
            &self,
            _session: &SessionId,
            record: &ResultRecord,
        ) -> Result<AttemptId, ServiceError> {
            if self.fail.get() {
                return Err(ServiceError::Status {
                    status: 503,
                    message: "unavailable".to_string(),
                });
            }
            self.submitted.borrow_mut().push(record.clone());
            Ok(format!("attempt-{}", self.submitted.borrow().len()))
        }

        fn attempts(&self, _quiz_id: &str) -> Result<Vec<AttemptSummary>, ServiceError> {
            Ok(Vec::new())
        }
    }

    fn learner() -> LearnerInfo {
        LearnerInfo::new("Ada", "ada@example.com")
    }

    /// `n` single-select questions, option 0 correct.
    fn uniform_quiz(n: usize) -> QuizDefinition {
        QuizDefinition {
            id: "uniform".to_string(),
            title: "Uniform".to_string(),
            questions: (0..n)
                .map(|i| question(&format!("Q{i}"), &[("right", true), ("wrong", false)]))
                .collect(),
            timer_settings: None,
        }
    }

    fn orchestrator<'a>(
        quiz: QuizDefinition,
        config: SessionConfig,
        store: &'a MemoryStore,
        clock: &ManualClock,
    ) -> SessionOrchestrator<&'a MemoryStore> {
        SessionOrchestrator::new(quiz, learner(), config, store, Box::new(clock.clone()))
    }

    fn rng() -> SmallRng {
        SmallRng::seed_from_u64(3)
    }

    #[test]
    fn test_per_question_scenario_elapsed_and_score() {
        let store = MemoryStore::new();
        let clock = ManualClock::new();
        let mut quiz = sample_quiz();
        quiz.questions.truncate(3);
        let config = SessionConfig {
            timer: TimerMode::PerQuestion { duration: 30 },
            auto_submit: false,
            ..SessionConfig::default()
        };
        let mut session = orchestrator(quiz, config, &store, &clock);
        assert_eq!(session.start_session(&mut rng()).unwrap(), StartKind::Fresh);

        clock.advance_secs(5);
        session.select_answer(1, true).unwrap();
        session.go_next().unwrap();

        clock.advance_secs(35);
        session.select_answer(1, true).unwrap();
        session.go_next().unwrap();
        assert_eq!(session.remaining(), Some(30));

        let mut outcome = TickOutcome::Idle;
        for _ in 0..30 {
            clock.advance_secs(1);
            outcome = session.on_tick();
        }
        assert_eq!(outcome, TickOutcome::Holding);
        assert_eq!(session.status(), SessionStatus::InProgress);

        let service = StubService::default();
        let record = session.submit_session(&service).unwrap();
        assert_eq!(record.score, 1);
        assert_eq!(record.total, 3);
        assert_eq!(record.percentage, 33);
        let elapsed: Vec<f64> = record.questions.iter().map(|q| q.elapsed_secs).collect();
        assert_eq!(elapsed, vec![5.0, 35.0, 30.0]);
        assert_eq!(record.unanswered, vec![2]);
        assert!(store.is_empty());
    }

    #[test]
    fn test_per_question_expiry_auto_advances() {
        let store = MemoryStore::new();
        let clock = ManualClock::new();
        let config = SessionConfig {
            timer: TimerMode::PerQuestion { duration: 2 },
            ..SessionConfig::default()
        };
        let mut session = orchestrator(uniform_quiz(2), config, &store, &clock);
        session.start_session(&mut rng()).unwrap();

        assert_eq!(session.on_tick(), TickOutcome::Counting { remaining: 1 });
        assert_eq!(session.on_tick(), TickOutcome::AutoAdvanced { position: 1 });
        assert_eq!(session.remaining(), Some(2));
        session.on_tick();
        assert_eq!(session.on_tick(), TickOutcome::SubmitDue);
        assert_eq!(session.on_tick(), TickOutcome::Idle);
    }

    #[test]
    fn test_global_expiry_submits_with_consumed_time() {
        let store = MemoryStore::new();
        let clock = ManualClock::new();
        let config = SessionConfig {
            timer: TimerMode::Global { duration: 3 },
            ..SessionConfig::default()
        };
        let mut session = orchestrator(uniform_quiz(3), config, &store, &clock);
        session.start_session(&mut rng()).unwrap();
        session.select_answer(0, true).unwrap();

        session.on_tick();
        session.on_tick();
        assert_eq!(session.on_tick(), TickOutcome::SubmitDue);

        let record = session.submit_session(&StubService::default()).unwrap();
        assert_eq!(record.time_taken_secs, 3.0);
        assert_eq!(record.score, 1);
    }

    #[test]
    fn test_resume_restores_position_answers_and_time() {
        let store = MemoryStore::new();
        let clock = ManualClock::new();
        let config = SessionConfig {
            timer: TimerMode::Global { duration: 600 },
            shuffle_questions: true,
            shuffle_options: true,
            ..SessionConfig::default()
        };

        let mut first = orchestrator(sample_quiz(), config.clone(), &store, &clock);
        first.start_session(&mut rng()).unwrap();
        first.go_next().unwrap();
        first.select_answer(0, true).unwrap();
        for _ in 0..10 {
            first.on_tick();
        }
        let order = first.machine().progress().question_order.clone();
        let answered = first.machine().current_answer().clone();
        let position = first.machine().position();
        drop(first);

        let mut second = orchestrator(sample_quiz(), config, &store, &clock);
        let mut other_rng = SmallRng::seed_from_u64(99);
        assert_eq!(second.start_session(&mut other_rng).unwrap(), StartKind::Resumed);
        assert_eq!(second.machine().progress().question_order, order);
        assert_eq!(second.machine().position(), position);
        assert_eq!(second.machine().current_answer(), &answered);
        assert_eq!(second.remaining(), Some(590));
    }

    #[test]
    fn test_corrupt_snapshot_starts_fresh() {
        let store = MemoryStore::new();
        let clock = ManualClock::new();
        let id = SessionId::new("uniform", &learner());
        store.save(&id.storage_key(), "{\"answers\": 12").unwrap();

        let mut session = orchestrator(uniform_quiz(2), SessionConfig::default(), &store, &clock);
        assert_eq!(session.start_session(&mut rng()).unwrap(), StartKind::Fresh);
        assert_eq!(session.machine().position(), 0);
        assert!(store.get(&id.storage_key()).unwrap().contains("studentInfo"));
    }

    #[test]
    fn test_failed_submission_keeps_session_open() {
        let store = MemoryStore::new();
        let clock = ManualClock::new();
        let mut session = orchestrator(uniform_quiz(2), SessionConfig::default(), &store, &clock);
        session.start_session(&mut rng()).unwrap();
        session.select_answer(0, true).unwrap();

        let service = StubService::default();
        service.fail.set(true);
        assert!(matches!(
            session.submit_session(&service),
            Err(SessionError::Submission(ServiceError::Status { status: 503, .. }))
        ));
        assert_eq!(session.status(), SessionStatus::InProgress);
        assert_eq!(store.len(), 1);
        assert!(session.result().is_none());

        service.fail.set(false);
        let score = session.submit_session(&service).unwrap().score;
        assert_eq!(score, 1);
        assert_eq!(session.status(), SessionStatus::Submitted);
        assert_eq!(session.attempt_id(), Some("attempt-1"));
        assert!(store.is_empty());

        assert!(matches!(
            session.submit_session(&service),
            Err(SessionError::AlreadySubmitted)
        ));
        assert_eq!(service.submitted.borrow().len(), 1);
    }

    #[test]
    fn test_failed_submission_leaves_adaptive_answers_editable() {
        let store = MemoryStore::new();
        let clock = ManualClock::new();
        let config = SessionConfig {
            adaptive: Some(AdaptiveSettings::default()),
            ..SessionConfig::default()
        };
        let mut session = orchestrator(sample_quiz(), config, &store, &clock);
        session.start_session(&mut rng()).unwrap();
        session.jump_to(3).unwrap();
        session.select_answer(0, true).unwrap();

        let service = StubService::default();
        service.fail.set(true);
        assert!(matches!(
            session.submit_session(&service),
            Err(SessionError::Submission(_))
        ));
        assert!(!session.is_locked(3));
        assert_eq!(session.difficulty_statistics().unwrap().total_questions, 0);
        assert!(session.last_adjustment().is_none());

        session.select_answer(2, true).unwrap();
        service.fail.set(false);
        let record = session.submit_session(&service).unwrap();
        assert_eq!(record.correct_answers, vec![3]);
        let stats = session.difficulty_statistics().unwrap();
        assert_eq!(stats.total_questions, 1);
        assert_eq!(session.difficulty_info().unwrap().consecutive_correct, 1);
    }

    #[test]
    fn test_submit_before_start_is_invalid() {
        let store = MemoryStore::new();
        let clock = ManualClock::new();
        let mut session = orchestrator(uniform_quiz(1), SessionConfig::default(), &store, &clock);
        assert!(matches!(
            session.submit_session(&StubService::default()),
            Err(SessionError::InvalidState { .. })
        ));
        assert!(matches!(session.go_next(), Err(SessionError::InvalidState { .. })));
    }

    #[test]
    fn test_adaptive_escalates_then_recovers() {
        let store = MemoryStore::new();
        let clock = ManualClock::new();
        let config = SessionConfig {
            adaptive: Some(AdaptiveSettings::default()),
            ..SessionConfig::default()
        };
        let mut session = orchestrator(uniform_quiz(5), config, &store, &clock);
        session.start_session(&mut rng()).unwrap();

        for _ in 0..3 {
            session.select_answer(0, true).unwrap();
            session.go_next().unwrap();
        }
        let event = session.last_adjustment().unwrap();
        assert!(event.was_adjusted);
        assert_eq!(event.new, Difficulty::Hard);

        session.select_answer(1, true).unwrap();
        session.go_next().unwrap();
        session.select_answer(1, true).unwrap();
        let event = session.last_adjustment().unwrap();
        assert!(event.was_adjusted);
        assert_eq!(event.previous, Difficulty::Hard);
        assert_eq!(event.new, Difficulty::Medium);

        let stats = session.difficulty_statistics().unwrap();
        assert_eq!(stats.total_questions, 5);
        assert_eq!(stats.difficulty_changes, 2);
    }

    #[test]
    fn test_adaptive_single_select_locks_after_answer() {
        let store = MemoryStore::new();
        let clock = ManualClock::new();
        let config = SessionConfig {
            adaptive: Some(AdaptiveSettings::default()),
            ..SessionConfig::default()
        };
        let mut session = orchestrator(uniform_quiz(2), config, &store, &clock);
        session.start_session(&mut rng()).unwrap();
        session.select_answer(1, true).unwrap();
        assert!(session.current_view().locked);
        assert!(matches!(
            session.select_answer(0, true),
            Err(SessionError::AnswerLocked(0))
        ));
        session.go_next().unwrap();
        session.go_previous().unwrap();
        assert!(matches!(session.toggle_answer(0), Err(SessionError::AnswerLocked(0))));
        assert_eq!(session.difficulty_statistics().unwrap().total_questions, 1);
    }

    #[test]
    fn test_adaptive_multi_select_evaluated_on_leave() {
        let store = MemoryStore::new();
        let clock = ManualClock::new();
        let config = SessionConfig {
            adaptive: Some(AdaptiveSettings::default()),
            ..SessionConfig::default()
        };
        let mut session = orchestrator(sample_quiz(), config, &store, &clock);
        session.start_session(&mut rng()).unwrap();
        session.jump_to(3).unwrap();
        session.select_answer(0, true).unwrap();
        session.select_answer(2, true).unwrap();
        assert!(!session.current_view().locked);
        session.go_previous().unwrap();

        assert!(session.is_locked(3));
        let info = session.difficulty_info().unwrap();
        assert_eq!(info.consecutive_correct, 1);
    }

    #[test]
    fn test_adaptive_expiry_counts_as_wrong() {
        let store = MemoryStore::new();
        let clock = ManualClock::new();
        let config = SessionConfig {
            timer: TimerMode::PerQuestion { duration: 1 },
            adaptive: Some(AdaptiveSettings::default()),
            ..SessionConfig::default()
        };
        let mut session = orchestrator(uniform_quiz(3), config, &store, &clock);
        session.start_session(&mut rng()).unwrap();

        assert_eq!(session.on_tick(), TickOutcome::AutoAdvanced { position: 1 });
        let info = session.difficulty_info().unwrap();
        assert_eq!(info.consecutive_wrong, 1);
        assert!(session.is_locked(0));

        assert_eq!(session.on_tick(), TickOutcome::AutoAdvanced { position: 2 });
        assert_eq!(session.difficulty_info().unwrap().level, Difficulty::Easy);
    }

    #[test]
    fn test_snapshot_carries_difficulty_across_resume() {
        let store = MemoryStore::new();
        let clock = ManualClock::new();
        let config = SessionConfig {
            adaptive: Some(AdaptiveSettings::default()),
            ..SessionConfig::default()
        };
        let mut first = orchestrator(uniform_quiz(4), config.clone(), &store, &clock);
        first.start_session(&mut rng()).unwrap();
        first.select_answer(0, true).unwrap();
        first.go_next().unwrap();
        drop(first);

        let mut second = orchestrator(uniform_quiz(4), config, &store, &clock);
        second.start_session(&mut rng()).unwrap();
        assert_eq!(second.difficulty_info().unwrap().consecutive_correct, 1);
        assert!(second.is_locked(0));
        second.go_previous().unwrap();
        assert!(matches!(second.select_answer(1, true), Err(SessionError::AnswerLocked(0))));
    }
}
