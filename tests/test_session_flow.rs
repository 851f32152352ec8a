use std::fs;
use std::path::Path;

use rand::SeedableRng;
use rand::rngs::SmallRng;
use tempfile::TempDir;

use quizline::engine::timer::TimerMode;
use quizline::service::local::LocalQuizService;
use quizline::service::{ServiceError, fetch_valid_quiz};
use quizline::session::clock::ManualClock;
use quizline::session::identity::{LearnerInfo, SessionId};
use quizline::session::orchestrator::{SessionConfig, SessionOrchestrator, StartKind, TickOutcome};
use quizline::session::quiz::QuizDefinition;
use quizline::session::state::SessionStatus;
use quizline::store::json_store::JsonStore;
use quizline::store::snapshot::SnapshotStore;

const ORBITS: &str = r#"{
  "title": "Orbits",
  "questions": [
    {
      "question": "Closest planet to the Sun?",
      "options": [
        {"text": "Mercury", "is_correct": true},
        {"text": "Venus", "is_correct": false}
      ]
    },
    {
      "question": "Which are gas giants?",
      "options": [
        {"text": "Jupiter", "is_correct": true},
        {"text": "Mars", "is_correct": false},
        {"text": "Saturn", "is_correct": true}
      ]
    },
    {
      "question": "Moons of Mars?",
      "options": [
        {"text": "None", "is_correct": false},
        {"text": "Two", "is_correct": true},
        {"text": "Four", "is_correct": false}
      ]
    }
  ]
}"#;

struct Workspace {
    _dir: TempDir,
    store: JsonStore,
    service: LocalQuizService,
}

fn workspace() -> Workspace {
    let dir = TempDir::new().unwrap();
    let quiz_dir = dir.path().join("quizzes");
    fs::create_dir_all(&quiz_dir).unwrap();
    fs::write(quiz_dir.join("orbits.json"), ORBITS).unwrap();
    let data_dir = dir.path().join("data");
    let store = JsonStore::with_base_dir(data_dir.clone()).unwrap();
    let service = LocalQuizService::new(Some(quiz_dir), JsonStore::with_base_dir(data_dir).unwrap());
    Workspace {
        _dir: dir,
        store,
        service,
    }
}

fn learner() -> LearnerInfo {
    LearnerInfo::new("Grace", "grace@example.com")
}

fn open<'a>(
    ws: &'a Workspace,
    quiz: QuizDefinition,
    config: SessionConfig,
    clock: &ManualClock,
) -> SessionOrchestrator<&'a JsonStore> {
    SessionOrchestrator::new(quiz, learner(), config, &ws.store, Box::new(clock.clone()))
}

/// Display position of the option with the given original index.
fn display_of(session: &SessionOrchestrator<&JsonStore>, original: usize) -> usize {
    session
        .current_view()
        .options
        .iter()
        .position(|(index, _)| *index == original)
        .unwrap()
}

fn write_quiz(dir: &Path, id: &str, json: &str) {
    fs::write(dir.join(format!("{id}.json")), json).unwrap();
}

#[test]
fn test_quiz_from_directory_gets_id_from_filename() {
    let ws = workspace();
    let quiz = fetch_valid_quiz(&ws.service, "orbits").unwrap();
    assert_eq!(quiz.id, "orbits");
    assert_eq!(quiz.len(), 3);
    assert!(ws.service.list_quizzes().iter().any(|q| q.id == "orbits"));
}

#[test]
fn test_invalid_quiz_is_rejected_before_a_session_starts() {
    let dir = TempDir::new().unwrap();
    write_quiz(dir.path(), "empty", r#"{"title": "Empty", "questions": []}"#);
    let service = LocalQuizService::new(
        Some(dir.path().to_path_buf()),
        JsonStore::with_base_dir(dir.path().join("data")).unwrap(),
    );
    let err = fetch_valid_quiz(&service, "empty").unwrap_err();
    assert!(matches!(err, ServiceError::InvalidQuiz { .. }));
}

#[test]
fn test_complete_attempt_is_recorded_and_snapshot_cleared() {
    let ws = workspace();
    let quiz = fetch_valid_quiz(&ws.service, "orbits").unwrap();
    let clock = ManualClock::new();
    let mut session = open(&ws, quiz, SessionConfig::default(), &clock);
    assert_eq!(
        session.start_session(&mut SmallRng::seed_from_u64(3)).unwrap(),
        StartKind::Fresh
    );

    session.select_answer(0, true).unwrap();
    clock.advance_secs(4);
    session.go_next().unwrap();
    session.select_answer(0, true).unwrap();
    session.select_answer(2, true).unwrap();
    clock.advance_secs(6);
    session.go_next().unwrap();
    session.select_answer(0, true).unwrap();
    clock.advance_secs(2);

    let record = session.submit_session(&ws.service).unwrap().clone();
    assert_eq!(record.score, 2);
    assert_eq!(record.total, 3);
    assert_eq!(record.percentage, 67);
    assert_eq!(record.incorrect_answers, vec![2]);
    assert_eq!(record.time_taken_whole_secs(), 12);
    assert_eq!(session.status(), SessionStatus::Submitted);

    let id = SessionId::new("orbits", &learner());
    assert!(SnapshotStore::new(&ws.store).load(&id).is_none());

    let history = ws.service.history_entries(Some("orbits"));
    assert_eq!(history.len(), 1);
    assert_eq!(Some(history[0].attempt_id.as_str()), session.attempt_id());
    assert_eq!(history[0].record.score, 2);
}

#[test]
fn test_shuffled_session_resumes_in_a_new_process() {
    let ws = workspace();
    let config = SessionConfig {
        shuffle_questions: true,
        shuffle_options: true,
        timer: TimerMode::Global { duration: 300 },
        ..SessionConfig::default()
    };
    let clock = ManualClock::new();

    let (order, first_question, first_answer, remaining) = {
        let quiz = fetch_valid_quiz(&ws.service, "orbits").unwrap();
        let mut session = open(&ws, quiz, config.clone(), &clock);
        session.start_session(&mut SmallRng::seed_from_u64(11)).unwrap();
        for _ in 0..5 {
            session.on_tick();
        }
        session.select_answer(0, true).unwrap();
        let first_question = session.machine().current_index();
        let first_answer = session.machine().current_answer().clone();
        session.go_next().unwrap();
        (
            session.machine().progress().question_order.clone(),
            first_question,
            first_answer,
            session.remaining(),
        )
    };
    assert_eq!(remaining, Some(295));

    let quiz = fetch_valid_quiz(&ws.service, "orbits").unwrap();
    let mut session = open(&ws, quiz, config, &clock);
    assert_eq!(
        session.start_session(&mut SmallRng::seed_from_u64(99)).unwrap(),
        StartKind::Resumed
    );
    assert_eq!(session.machine().progress().question_order, order);
    assert_eq!(session.machine().position(), 1);
    assert_eq!(session.machine().answer(first_question), Some(&first_answer));
    assert_eq!(session.remaining(), Some(295));
}

#[test]
fn test_per_question_expiry_walks_to_submission() {
    let ws = workspace();
    let quiz = fetch_valid_quiz(&ws.service, "orbits").unwrap();
    let config = SessionConfig {
        timer: TimerMode::PerQuestion { duration: 2 },
        ..SessionConfig::default()
    };
    let clock = ManualClock::new();
    let mut session = open(&ws, quiz, config, &clock);
    session.start_session(&mut SmallRng::seed_from_u64(0)).unwrap();

    let correct = display_of(&session, 0);
    session.select_answer(correct, true).unwrap();

    let mut outcomes = Vec::new();
    for _ in 0..6 {
        clock.advance_secs(1);
        outcomes.push(session.on_tick());
    }
    assert_eq!(outcomes[1], TickOutcome::AutoAdvanced { position: 1 });
    assert_eq!(outcomes[3], TickOutcome::AutoAdvanced { position: 2 });
    assert_eq!(outcomes[5], TickOutcome::SubmitDue);

    let record = session.submit_session(&ws.service).unwrap();
    assert_eq!(record.score, 1);
    assert_eq!(record.unanswered, vec![1, 2]);
}
