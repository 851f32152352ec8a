use tracing::warn;

use quizline::error::SessionError;
use quizline::service::QuizService;
use quizline::session::orchestrator::{SessionOrchestrator, StartKind, TickOutcome};
use quizline::store::PersistentStore;

use crate::ui::theme::Theme;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AppScreen {
    Quiz,
    Result,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notice {
    Info(String),
    Warning(String),
    Error(String),
}

pub struct App<S: PersistentStore> {
    pub screen: AppScreen,
    pub session: SessionOrchestrator<S>,
    service: Box<dyn QuizService>,
    pub theme: &'static Theme,
    pub show_timer: bool,
    pub cursor: usize,
    pub notice: Option<Notice>,
    pub confirm_submit: bool,
    pub review_scroll: u16,
    pub should_quit: bool,
}

impl<S: PersistentStore> App<S> {
    pub fn new(
        session: SessionOrchestrator<S>,
        service: Box<dyn QuizService>,
        theme: &'static Theme,
        start: StartKind,
        show_timer: bool,
    ) -> Self {
        let notice = match start {
            StartKind::Resumed => Some(Notice::Info("Resumed your saved progress".to_string())),
            StartKind::Fresh => None,
        };
        Self {
            screen: AppScreen::Quiz,
            session,
            service,
            theme,
            show_timer,
            cursor: 0,
            notice,
            confirm_submit: false,
            review_scroll: 0,
            should_quit: false,
        }
    }

    fn option_count(&self) -> usize {
        self.session.machine().current_question().options.len()
    }

    pub fn cursor_up(&mut self) {
        let count = self.option_count();
        if count > 0 {
            self.cursor = (self.cursor + count - 1) % count;
        }
    }

    pub fn cursor_down(&mut self) {
        let count = self.option_count();
        if count > 0 {
            self.cursor = (self.cursor + 1) % count;
        }
    }

    /// Toggle the option at a display position (cursor or digit key).
    pub fn choose(&mut self, display: usize) {
        if display >= self.option_count() {
            return;
        }
        self.cursor = display;
        let result = self.session.toggle_answer(display);
        self.report(result);
    }

    pub fn choose_cursor(&mut self) {
        self.choose(self.cursor);
    }

    pub fn next_question(&mut self) {
        let result = self.session.go_next();
        self.after_navigation(result);
    }

    pub fn previous_question(&mut self) {
        let result = self.session.go_previous();
        self.after_navigation(result);
    }

    fn after_navigation(&mut self, result: Result<bool, SessionError>) {
        match result {
            Ok(true) => {
                self.cursor = 0;
                self.notice = None;
            }
            Ok(false) => {}
            Err(err) => self.report::<()>(Err(err)),
        }
    }

    /// First press with open questions asks for confirmation.
    pub fn request_submit(&mut self) {
        let machine = self.session.machine();
        let open = machine.len() - machine.answered_count();
        if open > 0 && !self.confirm_submit {
            self.confirm_submit = true;
            self.notice = Some(Notice::Warning(format!(
                "{open} question(s) unanswered. Press s again to submit."
            )));
            return;
        }
        self.submit();
    }

    pub fn cancel_confirm(&mut self) {
        if self.confirm_submit {
            self.confirm_submit = false;
            self.notice = None;
        }
    }

    pub fn submit(&mut self) {
        self.confirm_submit = false;
        match self.session.submit_session(self.service.as_ref()) {
            Ok(_) => {
                self.screen = AppScreen::Result;
                self.notice = None;
                self.review_scroll = 0;
            }
            Err(SessionError::Submission(err)) => {
                self.notice = Some(Notice::Error(format!(
                    "Submission failed: {err}. Progress is saved, press s to retry."
                )));
            }
            Err(err) => self.report::<()>(Err(err)),
        }
    }

    pub fn on_tick(&mut self) {
        if self.screen != AppScreen::Quiz {
            return;
        }
        match self.session.on_tick() {
            TickOutcome::AutoAdvanced { position } => {
                self.cursor = 0;
                self.confirm_submit = false;
                self.notice = Some(Notice::Warning(format!(
                    "Time's up! Moved on to question {}",
                    position + 1
                )));
            }
            TickOutcome::SubmitDue => {
                self.notice = Some(Notice::Warning("Time's up!".to_string()));
                self.submit();
            }
            TickOutcome::Holding => {
                self.notice = Some(Notice::Warning(
                    "Time's up. Press s to submit when ready.".to_string(),
                ));
            }
            TickOutcome::Idle | TickOutcome::Counting { .. } => {}
        }
    }

    pub fn scroll_review(&mut self, down: bool) {
        self.review_scroll = if down {
            self.review_scroll.saturating_add(1)
        } else {
            self.review_scroll.saturating_sub(1)
        };
    }

    fn report<T>(&mut self, result: Result<T, SessionError>) {
        if let Err(err) = result {
            warn!(%err, "session operation rejected");
            self.notice = Some(match err {
                SessionError::AnswerLocked(_) => {
                    Notice::Info("This answer is locked in.".to_string())
                }
                other => Notice::Error(other.to_string()),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::SmallRng;
    use tempfile::TempDir;

    use quizline::engine::timer::TimerMode;
    use quizline::service::local::LocalQuizService;
    use quizline::session::clock::ManualClock;
    use quizline::session::identity::LearnerInfo;
    use quizline::session::orchestrator::SessionConfig;
    use quizline::session::state::SessionStatus;
    use quizline::store::json_store::JsonStore;
    use quizline::store::memory::MemoryStore;

    use super::*;

    fn make_app(dir: &TempDir, config: SessionConfig) -> App<MemoryStore> {
        let store = JsonStore::with_base_dir(dir.path().to_path_buf()).unwrap();
        let service = LocalQuizService::new(None, store);
        let quiz = service.get_quiz("science-sprint").unwrap();
        let mut session = SessionOrchestrator::new(
            quiz,
            LearnerInfo::new("Ada", "ada@example.com"),
            config,
            MemoryStore::new(),
            Box::new(ManualClock::new()),
        );
        let start = session
            .start_session(&mut SmallRng::seed_from_u64(1))
            .unwrap();
        let theme: &'static Theme = Box::leak(Box::new(Theme::default()));
        App::new(session, Box::new(service), theme, start, true)
    }

    #[test]
    fn test_cursor_wraps() {
        let dir = TempDir::new().unwrap();
        let mut app = make_app(&dir, SessionConfig::default());
        app.cursor_up();
        assert_eq!(app.cursor, 2);
        app.cursor_down();
        assert_eq!(app.cursor, 0);
    }

    #[test]
    fn test_submit_requires_confirmation_when_unanswered() {
        let dir = TempDir::new().unwrap();
        let mut app = make_app(&dir, SessionConfig::default());
        app.choose(1);
        app.request_submit();
        assert!(app.confirm_submit);
        assert_eq!(app.screen, AppScreen::Quiz);
        app.request_submit();
        assert_eq!(app.screen, AppScreen::Result);
        assert_eq!(app.session.result().unwrap().score, 1);
    }

    #[test]
    fn test_global_expiry_submits() {
        let dir = TempDir::new().unwrap();
        let config = SessionConfig {
            timer: TimerMode::Global { duration: 2 },
            ..SessionConfig::default()
        };
        let mut app = make_app(&dir, config);
        app.on_tick();
        assert_eq!(app.screen, AppScreen::Quiz);
        app.on_tick();
        assert_eq!(app.screen, AppScreen::Result);
        assert_eq!(app.session.status(), SessionStatus::Submitted);
    }

    #[test]
    fn test_choose_out_of_range_is_ignored() {
        let dir = TempDir::new().unwrap();
        let mut app = make_app(&dir, SessionConfig::default());
        app.choose(8);
        assert!(app.notice.is_none());
        assert_eq!(app.session.machine().answered_count(), 0);
    }
}
