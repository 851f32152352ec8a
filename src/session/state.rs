use std::collections::BTreeSet;
use std::fmt;
use std::time::Instant;

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::error::{SessionError, SessionResult};
use crate::session::clock::Clock;
use crate::session::quiz::{Question, QuizDefinition, QuizOption};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    NotStarted,
    InProgress,
    Submitted,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SessionStatus::NotStarted => "not started",
            SessionStatus::InProgress => "in progress",
            SessionStatus::Submitted => "submitted",
        })
    }
}

/// The learner's progress through a quiz, independent of quiz content.
/// Question and option indices always refer to the original definition.
#[derive(Clone, Debug, PartialEq)]
pub struct Progress {
    pub question_order: Vec<usize>,
    pub option_order: Vec<Vec<usize>>,
    pub position: usize,
    pub answers: Vec<BTreeSet<usize>>,
    pub elapsed: Vec<f64>,
}

impl Progress {
    pub fn identity(quiz: &QuizDefinition) -> Self {
        Self {
            question_order: (0..quiz.len()).collect(),
            option_order: quiz
                .questions
                .iter()
                .map(|q| (0..q.options.len()).collect())
                .collect(),
            position: 0,
            answers: vec![BTreeSet::new(); quiz.len()],
            elapsed: vec![0.0; quiz.len()],
        }
    }

    /// Whether this progress can drive `quiz`: same question count, same
    /// option counts, every stored index in range.
    pub fn fits(&self, quiz: &QuizDefinition) -> bool {
        let n = quiz.len();
        n > 0
            && self.position < n
            && is_permutation(&self.question_order, n)
            && self.option_order.len() == n
            && self.answers.len() == n
            && self.elapsed.len() == n
            && quiz
                .questions
                .iter()
                .zip(&self.option_order)
                .all(|(q, order)| is_permutation(order, q.options.len()))
            && quiz.questions.iter().zip(&self.answers).all(|(q, set)| {
                set.iter().all(|&i| i < q.options.len()) && (q.is_multi_select() || set.len() <= 1)
            })
            && self.elapsed.iter().all(|e| e.is_finite() && *e >= 0.0)
    }
}

fn is_permutation(order: &[usize], n: usize) -> bool {
    if order.len() != n {
        return false;
    }
    let mut seen = vec![false; n];
    for &i in order {
        if i >= n || seen[i] {
            return false;
        }
        seen[i] = true;
    }
    true
}

pub struct SessionStateMachine {
    quiz: QuizDefinition,
    status: SessionStatus,
    progress: Progress,
    shown_since: Option<Instant>,
    clock: Box<dyn Clock>,
}

impl SessionStateMachine {
    pub fn new(quiz: QuizDefinition, clock: Box<dyn Clock>) -> Self {
        let progress = Progress::identity(&quiz);
        Self {
            quiz,
            status: SessionStatus::NotStarted,
            progress,
            shown_since: None,
            clock,
        }
    }

    pub fn start<R: Rng + ?Sized>(
        &mut self,
        shuffle_questions: bool,
        shuffle_options: bool,
        rng: &mut R,
    ) -> SessionResult<()> {
        self.ensure_not_started("start")?;
        if self.quiz.is_empty() {
            return Err(SessionError::EmptyQuiz);
        }

        let mut progress = Progress::identity(&self.quiz);
        if shuffle_options {
            for order in &mut progress.option_order {
                order.shuffle(rng);
            }
        }
        if shuffle_questions {
            progress.question_order.shuffle(rng);
        }
        self.begin(progress);
        Ok(())
    }

    /// Continue from saved progress. Progress that does not fit the quiz is
    /// rejected with `OutOfRange` so the caller can start fresh instead.
    pub fn resume(&mut self, progress: Progress) -> SessionResult<()> {
        self.ensure_not_started("resume")?;
        if self.quiz.is_empty() {
            return Err(SessionError::EmptyQuiz);
        }
        if !progress.fits(&self.quiz) {
            return Err(SessionError::OutOfRange {
                index: progress.position,
                len: self.quiz.len(),
            });
        }
        self.begin(progress);
        Ok(())
    }

    fn begin(&mut self, progress: Progress) {
        self.progress = progress;
        self.status = SessionStatus::InProgress;
        self.shown_since = Some(self.clock.now());
    }

    fn ensure_not_started(&self, operation: &'static str) -> SessionResult<()> {
        match self.status {
            SessionStatus::NotStarted => Ok(()),
            SessionStatus::Submitted => Err(SessionError::AlreadySubmitted),
            status => Err(SessionError::InvalidState { operation, status }),
        }
    }

    fn ensure_in_progress(&self, operation: &'static str) -> SessionResult<()> {
        match self.status {
            SessionStatus::InProgress => Ok(()),
            status => Err(SessionError::InvalidState { operation, status }),
        }
    }

    pub fn quiz(&self) -> &QuizDefinition {
        &self.quiz
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn progress(&self) -> &Progress {
        &self.progress
    }

    pub fn len(&self) -> usize {
        self.quiz.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quiz.is_empty()
    }

    pub fn position(&self) -> usize {
        self.progress.position
    }

    pub fn is_last(&self) -> bool {
        self.progress.position + 1 >= self.len()
    }

    /// Original index of the question currently displayed.
    pub fn current_index(&self) -> usize {
        self.progress.question_order[self.progress.position]
    }

    pub fn current_question(&self) -> &Question {
        &self.quiz.questions[self.current_index()]
    }

    /// Options of the current question in display order, paired with their
    /// original indices.
    pub fn displayed_options(&self) -> Vec<(usize, &QuizOption)> {
        let question = self.current_question();
        self.progress.option_order[self.current_index()]
            .iter()
            .map(|&i| (i, &question.options[i]))
            .collect()
    }

    pub fn answer(&self, question_index: usize) -> Option<&BTreeSet<usize>> {
        self.progress.answers.get(question_index)
    }

    pub fn current_answer(&self) -> &BTreeSet<usize> {
        &self.progress.answers[self.current_index()]
    }

    pub fn answered_count(&self) -> usize {
        self.progress.answers.iter().filter(|a| !a.is_empty()).count()
    }

    pub fn set_answer(&mut self, display_option: usize, selected: bool) -> SessionResult<()> {
        self.ensure_in_progress("answer")?;
        let q = self.current_index();
        let order = &self.progress.option_order[q];
        let Some(&option) = order.get(display_option) else {
            return Err(SessionError::OutOfRange {
                index: display_option,
                len: order.len(),
            });
        };

        let multi = self.quiz.questions[q].is_multi_select();
        let set = &mut self.progress.answers[q];
        match (multi, selected) {
            (true, true) => {
                set.insert(option);
            }
            (true, false) => {
                set.remove(&option);
            }
            (false, true) => {
                set.clear();
                set.insert(option);
            }
            (false, false) => {
                set.remove(&option);
            }
        }
        Ok(())
    }

    /// Whether the option at a display position on the current question is
    /// part of the answer. Out-of-range positions are never selected.
    pub fn is_selected(&self, display_option: usize) -> bool {
        let q = self.current_index();
        self.progress.option_order[q]
            .get(display_option)
            .is_some_and(|opt| self.progress.answers[q].contains(opt))
    }

    pub fn advance(&mut self) -> SessionResult<bool> {
        self.ensure_in_progress("advance")?;
        if self.is_last() {
            return Ok(false);
        }
        self.move_to(self.progress.position + 1);
        Ok(true)
    }

    pub fn retreat(&mut self) -> SessionResult<bool> {
        self.ensure_in_progress("retreat")?;
        if self.progress.position == 0 {
            return Ok(false);
        }
        self.move_to(self.progress.position - 1);
        Ok(true)
    }

    pub fn jump_to(&mut self, position: usize) -> SessionResult<bool> {
        self.ensure_in_progress("jump")?;
        if position >= self.len() {
            return Err(SessionError::OutOfRange {
                index: position,
                len: self.len(),
            });
        }
        if position == self.progress.position {
            return Ok(false);
        }
        self.move_to(position);
        Ok(true)
    }

    fn move_to(&mut self, position: usize) {
        self.flush_elapsed();
        self.progress.position = position;
    }

    /// Charge time since the current question was shown to that question.
    pub fn flush_elapsed(&mut self) {
        if self.status != SessionStatus::InProgress {
            return;
        }
        if let Some(since) = self.shown_since {
            let now = self.clock.now();
            let q = self.current_index();
            self.progress.elapsed[q] += now.saturating_duration_since(since).as_secs_f64();
            self.shown_since = Some(now);
        }
    }

    pub fn submit(&mut self) -> SessionResult<()> {
        match self.status {
            SessionStatus::InProgress => {
                self.flush_elapsed();
                self.shown_since = None;
                self.status = SessionStatus::Submitted;
                Ok(())
            }
            SessionStatus::Submitted => Err(SessionError::AlreadySubmitted),
            status => Err(SessionError::InvalidState {
                operation: "submit",
                status,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use super::*;
    use crate::session::clock::ManualClock;
    use crate::session::quiz::fixtures::sample_quiz;

    fn started(clock: &ManualClock) -> SessionStateMachine {
        let mut machine = SessionStateMachine::new(sample_quiz(), Box::new(clock.clone()));
        let mut rng = SmallRng::seed_from_u64(7);
        machine.start(false, false, &mut rng).unwrap();
        machine
    }

    #[test]
    fn test_start_transitions_to_in_progress() {
        let clock = ManualClock::new();
        let machine = started(&clock);
        assert_eq!(machine.status(), SessionStatus::InProgress);
        assert_eq!(machine.position(), 0);
        assert_eq!(machine.progress().question_order, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_operations_before_start_are_invalid() {
        let mut machine = SessionStateMachine::new(sample_quiz(), Box::new(ManualClock::new()));
        assert!(matches!(
            machine.set_answer(0, true),
            Err(SessionError::InvalidState { status: SessionStatus::NotStarted, .. })
        ));
        assert!(matches!(machine.advance(), Err(SessionError::InvalidState { .. })));
        assert!(matches!(machine.submit(), Err(SessionError::InvalidState { .. })));
    }

    #[test]
    fn test_empty_quiz_rejected() {
        let mut quiz = sample_quiz();
        quiz.questions.clear();
        let mut machine = SessionStateMachine::new(quiz, Box::new(ManualClock::new()));
        let mut rng = SmallRng::seed_from_u64(1);
        assert!(matches!(
            machine.start(false, false, &mut rng),
            Err(SessionError::EmptyQuiz)
        ));
    }

    #[test]
    fn test_shuffle_produces_permutations() {
        let mut machine = SessionStateMachine::new(sample_quiz(), Box::new(ManualClock::new()));
        let mut rng = SmallRng::seed_from_u64(42);
        machine.start(true, true, &mut rng).unwrap();
        let progress = machine.progress();
        let mut order = progress.question_order.clone();
        order.sort_unstable();
        assert_eq!(order, vec![0, 1, 2, 3]);
        for (q, opts) in progress.option_order.iter().enumerate() {
            let mut sorted = opts.clone();
            sorted.sort_unstable();
            assert_eq!(sorted, (0..sample_quiz().questions[q].options.len()).collect::<Vec<_>>());
        }
        assert!(progress.fits(machine.quiz()));
    }

    #[test]
    fn test_single_select_replaces_selection() {
        let clock = ManualClock::new();
        let mut machine = started(&clock);
        machine.set_answer(0, true).unwrap();
        machine.set_answer(2, true).unwrap();
        assert_eq!(machine.current_answer(), &BTreeSet::from([2]));
        machine.set_answer(2, false).unwrap();
        assert!(machine.current_answer().is_empty());
    }

    #[test]
    fn test_multi_select_toggles_membership() {
        let clock = ManualClock::new();
        let mut machine = started(&clock);
        machine.jump_to(3).unwrap();
        machine.set_answer(0, true).unwrap();
        machine.set_answer(2, true).unwrap();
        machine.set_answer(3, true).unwrap();
        assert_eq!(machine.current_answer(), &BTreeSet::from([0, 2, 3]));
        assert!(machine.is_selected(3));
        machine.set_answer(3, false).unwrap();
        assert_eq!(machine.current_answer(), &BTreeSet::from([0, 2]));
        assert!(!machine.is_selected(3));
        assert!(!machine.is_selected(9));
    }

    #[test]
    fn test_answer_maps_display_position_to_original_index() {
        let clock = ManualClock::new();
        let mut machine = started(&clock);
        machine.progress.option_order[0] = vec![2, 0, 1];
        machine.set_answer(0, true).unwrap();
        assert_eq!(machine.current_answer(), &BTreeSet::from([2]));
        let displayed: Vec<usize> = machine.displayed_options().iter().map(|(i, _)| *i).collect();
        assert_eq!(displayed, vec![2, 0, 1]);
    }

    #[test]
    fn test_option_out_of_range() {
        let clock = ManualClock::new();
        let mut machine = started(&clock);
        assert!(matches!(
            machine.set_answer(9, true),
            Err(SessionError::OutOfRange { index: 9, len: 3 })
        ));
    }

    #[test]
    fn test_navigation_stays_in_bounds() {
        let clock = ManualClock::new();
        let mut machine = started(&clock);
        assert!(!machine.retreat().unwrap());
        for _ in 0..10 {
            machine.advance().unwrap();
            assert!(machine.position() < machine.len());
        }
        assert_eq!(machine.position(), 3);
        assert!(!machine.advance().unwrap());
        assert!(machine.retreat().unwrap());
        assert_eq!(machine.position(), 2);
        assert!(matches!(
            machine.jump_to(4),
            Err(SessionError::OutOfRange { index: 4, len: 4 })
        ));
        assert_eq!(machine.position(), 2);
    }

    #[test]
    fn test_navigation_flushes_elapsed_time() {
        let clock = ManualClock::new();
        let mut machine = started(&clock);
        clock.advance_secs(5);
        machine.advance().unwrap();
        clock.advance_secs(7);
        machine.retreat().unwrap();
        clock.advance_secs(2);
        machine.submit().unwrap();
        let elapsed = &machine.progress().elapsed;
        assert!((elapsed[0] - 7.0).abs() < 1e-9);
        assert!((elapsed[1] - 7.0).abs() < 1e-9);
        assert_eq!(elapsed[2], 0.0);
    }

    #[test]
    fn test_submit_twice_fails_and_freezes_state() {
        let clock = ManualClock::new();
        let mut machine = started(&clock);
        machine.set_answer(1, true).unwrap();
        machine.submit().unwrap();
        assert_eq!(machine.status(), SessionStatus::Submitted);
        assert!(matches!(machine.submit(), Err(SessionError::AlreadySubmitted)));
        assert!(matches!(
            machine.set_answer(0, true),
            Err(SessionError::InvalidState { status: SessionStatus::Submitted, .. })
        ));
        assert!(matches!(machine.advance(), Err(SessionError::InvalidState { .. })));
        assert_eq!(machine.current_answer(), &BTreeSet::from([1]));
    }

    #[test]
    fn test_resume_rejects_progress_that_does_not_fit() {
        let mut machine = SessionStateMachine::new(sample_quiz(), Box::new(ManualClock::new()));
        let mut progress = Progress::identity(machine.quiz());
        progress.question_order = vec![0, 1, 2];
        assert!(machine.resume(progress).is_err());
        assert_eq!(machine.status(), SessionStatus::NotStarted);

        let mut progress = Progress::identity(machine.quiz());
        progress.answers[0] = BTreeSet::from([0, 1]);
        assert!(!progress.fits(machine.quiz()));

        let mut progress = Progress::identity(machine.quiz());
        progress.position = 2;
        progress.answers[3] = BTreeSet::from([0, 2]);
        machine.resume(progress).unwrap();
        assert_eq!(machine.position(), 2);
        assert_eq!(machine.answered_count(), 1);
    }
}
