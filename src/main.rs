mod app;
mod event;
mod logging;
mod ui;

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Paragraph};
use tracing::{info, warn};

use quizline::config::{Config, SessionOverrides};
use quizline::engine::difficulty::Difficulty;
use quizline::engine::timer::{TimerMode, format_clock};
use quizline::service::local::LocalQuizService;
use quizline::service::{QuizService, fetch_valid_quiz};
use quizline::session::clock::SystemClock;
use quizline::session::identity::{LearnerInfo, SessionId};
use quizline::session::orchestrator::SessionOrchestrator;
use quizline::store::json_store::JsonStore;
use quizline::store::snapshot::SnapshotStore;

use app::{App, AppScreen, Notice};
use event::{AppEvent, EventHandler};
use ui::components::dashboard::Dashboard;
use ui::components::progress_bar::ProgressBar;
use ui::components::question_panel::QuestionPanel;
use ui::components::session_sidebar::SessionSidebar;
use ui::layout::{AppLayout, LayoutTier, centered_rect, pack_hint_lines};
use ui::theme::Theme;

#[derive(Parser)]
#[command(
    name = "quizline",
    version,
    about = "Terminal quiz runner with timed, resumable and adaptive sessions"
)]
struct Cli {
    #[arg(short, long, global = true, help = "Theme name")]
    theme: Option<String>,

    #[arg(long, global = true, help = "Directory of quiz JSON files")]
    quiz_dir: Option<PathBuf>,

    #[arg(long, global = true, help = "Quiz service base URL (local quizzes when unset)")]
    api: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Take a quiz, resuming saved progress if there is any
    Take(TakeArgs),
    /// List available quizzes
    List,
    /// Show submitted attempts
    History {
        /// Only attempts for this quiz
        quiz: Option<String>,
    },
    /// Throw away saved progress for a quiz
    Discard {
        quiz: String,
        #[command(flatten)]
        learner: LearnerArgs,
    },
}

#[derive(Args)]
struct LearnerArgs {
    #[arg(long, help = "Learner name")]
    name: Option<String>,

    #[arg(long, help = "Learner email")]
    email: Option<String>,
}

impl LearnerArgs {
    fn resolve(&self, config: &Config) -> LearnerInfo {
        LearnerInfo::new(
            self.name.as_deref().unwrap_or(&config.learner_name),
            self.email.as_deref().unwrap_or(&config.learner_email),
        )
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum TimerArg {
    Off,
    Global,
    PerQuestion,
}

#[derive(Args)]
struct TakeArgs {
    quiz: String,

    #[command(flatten)]
    learner: LearnerArgs,

    #[arg(long, value_enum, help = "Timer mode")]
    timer: Option<TimerArg>,

    #[arg(long, help = "Timer duration in seconds")]
    duration: Option<u32>,

    #[arg(long, help = "Shuffle questions and options")]
    shuffle: bool,

    #[arg(long, help = "Adjust difficulty to the learner's streaks")]
    adaptive: bool,

    #[arg(long, value_parser = parse_difficulty, help = "Starting difficulty (easy, medium, hard)")]
    difficulty: Option<Difficulty>,

    #[arg(long, help = "Wait for the learner when time runs out")]
    no_auto_submit: bool,
}

fn parse_difficulty(s: &str) -> Result<Difficulty, String> {
    Difficulty::from_name(s).ok_or_else(|| format!("unknown difficulty: {s}"))
}

impl TakeArgs {
    fn overrides(&self, config: &Config) -> SessionOverrides {
        let timer = self.timer.map(|t| match t {
            TimerArg::Off => TimerMode::Untimed,
            TimerArg::Global => TimerMode::Global {
                duration: self.duration.unwrap_or(config.global_duration),
            },
            TimerArg::PerQuestion => TimerMode::PerQuestion {
                duration: self.duration.unwrap_or(config.per_question_duration),
            },
        });
        SessionOverrides {
            timer,
            auto_submit: self.no_auto_submit.then_some(false),
            shuffle_questions: self.shuffle.then_some(true),
            shuffle_options: self.shuffle.then_some(true),
            adaptive: (self.adaptive || self.difficulty.is_some()).then_some(true),
            starting_difficulty: self.difficulty,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load().unwrap_or_else(|err| {
        eprintln!("warning: ignoring unreadable config ({err})");
        Config::default()
    });
    if !Config::config_path().exists()
        && let Err(err) = config.save()
    {
        eprintln!("warning: could not write default config ({err})");
    }
    if let Some(theme) = &cli.theme {
        config.theme = theme.clone();
    }
    if let Some(dir) = &cli.quiz_dir {
        config.quiz_dir = dir.to_string_lossy().to_string();
    }
    if let Some(api) = &cli.api {
        config.api_base_url = Some(api.clone());
    }
    let mut known_themes = Theme::available_themes();
    if Theme::load(&config.theme).is_some() {
        known_themes.push(config.theme.clone());
    }
    let known: Vec<&str> = known_themes.iter().map(String::as_str).collect();
    config.validate(&known);

    if let Err(err) = logging::init(&config.log_level) {
        eprintln!("warning: logging disabled ({err})");
    }

    match cli.command {
        Command::Take(args) => run_take(&config, &args),
        Command::List => run_list(&config),
        Command::History { quiz } => run_history(&config, quiz.as_deref()),
        Command::Discard { quiz, learner } => run_discard(&config, &quiz, &learner),
    }
}

fn local_service(config: &Config) -> Result<LocalQuizService> {
    Ok(LocalQuizService::new(Some(config.quiz_dir()), JsonStore::new()?))
}

fn build_service(config: &Config) -> Result<Box<dyn QuizService>> {
    match &config.api_base_url {
        #[cfg(feature = "network")]
        Some(url) => {
            let service = quizline::service::http::HttpQuizService::new(url, config.api_token.clone())?;
            Ok(Box::new(service))
        }
        #[cfg(not(feature = "network"))]
        Some(_) => bail!("this build has no network support; unset api_base_url"),
        None => Ok(Box::new(local_service(config)?)),
    }
}

fn run_take(config: &Config, args: &TakeArgs) -> Result<()> {
    let learner = args.learner.resolve(config);
    if config.api_base_url.is_some() && !learner.is_complete() {
        bail!("--name and --email are required when submitting to a quiz service");
    }

    let service = build_service(config)?;
    let quiz = fetch_valid_quiz(service.as_ref(), &args.quiz)?;
    let session_config = config.session_config(&quiz, &args.overrides(config));
    let show_timer = quiz.timer_settings.as_ref().is_none_or(|t| t.show_timer);
    let quiz_id = quiz.id.clone();

    let mut session = SessionOrchestrator::new(
        quiz,
        learner,
        session_config,
        JsonStore::new()?,
        Box::new(SystemClock),
    );
    let start = session.start_session(&mut SmallRng::from_entropy())?;
    info!(quiz = %quiz_id, ?start, "opening quiz");

    let theme: &'static Theme = Box::leak(Box::new(Theme::load(&config.theme).unwrap_or_default()));
    let mut app = App::new(session, service, theme, start, show_timer);

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let events = EventHandler::new(Duration::from_secs(1));
    let result = run_app(&mut terminal, &mut app, &events);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = result {
        eprintln!("Error: {err:?}");
    }

    match app.session.result() {
        Some(record) => println!(
            "{}: {}/{} ({}%) in {}",
            record.quiz_title,
            record.score,
            record.total,
            record.percentage,
            format_clock(record.time_taken_whole_secs() as u32)
        ),
        None => println!("Progress saved. Run `quizline take {quiz_id}` to continue."),
    }
    Ok(())
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App<JsonStore>,
    events: &EventHandler,
) -> Result<()> {
    loop {
        terminal.draw(|frame| render(frame, app))?;

        match events.next()? {
            AppEvent::Key(key) => handle_key(app, key),
            AppEvent::Tick => app.on_tick(),
            AppEvent::Resize => {}
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

fn handle_key(app: &mut App<JsonStore>, key: KeyEvent) {
    if key.kind != KeyEventKind::Press {
        return;
    }

    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        app.should_quit = true;
        return;
    }

    match app.screen {
        AppScreen::Quiz => handle_quiz_key(app, key),
        AppScreen::Result => handle_result_key(app, key),
    }
}

fn handle_quiz_key(app: &mut App<JsonStore>, key: KeyEvent) {
    if key.code != KeyCode::Char('s') {
        app.cancel_confirm();
    }
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => app.should_quit = true,
        KeyCode::Up | KeyCode::Char('k') => app.cursor_up(),
        KeyCode::Down | KeyCode::Char('j') => app.cursor_down(),
        KeyCode::Enter | KeyCode::Char(' ') => app.choose_cursor(),
        KeyCode::Char(ch @ '1'..='9') => app.choose(ch as usize - '1' as usize),
        KeyCode::Right | KeyCode::Char('n') | KeyCode::Char('l') => app.next_question(),
        KeyCode::Left | KeyCode::Char('p') | KeyCode::Char('h') => app.previous_question(),
        KeyCode::Char('s') => app.request_submit(),
        _ => {}
    }
}

fn handle_result_key(app: &mut App<JsonStore>, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc | KeyCode::Enter => app.should_quit = true,
        KeyCode::Down | KeyCode::Char('j') => app.scroll_review(true),
        KeyCode::Up | KeyCode::Char('k') => app.scroll_review(false),
        _ => {}
    }
}

fn render(frame: &mut ratatui::Frame, app: &App<JsonStore>) {
    let area = frame.area();
    let colors = &app.theme.colors;

    let bg = Block::default().style(Style::default().bg(colors.bg()));
    frame.render_widget(bg, area);

    match app.screen {
        AppScreen::Quiz => render_quiz(frame, app),
        AppScreen::Result => render_result(frame, app),
    }
}

fn render_quiz(frame: &mut ratatui::Frame, app: &App<JsonStore>) {
    let area = frame.area();
    let colors = &app.theme.colors;
    let session = &app.session;
    let layout = AppLayout::new(area);

    let learner = session.learner();
    let who = if learner.name.is_empty() {
        learner.email.as_str()
    } else {
        learner.name.as_str()
    };
    let header_info = format!(" {} | {}", session.quiz().title, who);
    let header = Paragraph::new(Line::from(vec![
        Span::styled(
            " quizline ",
            Style::default()
                .fg(colors.header_fg())
                .bg(colors.header_bg())
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            &*header_info,
            Style::default().fg(colors.muted()).bg(colors.header_bg()),
        ),
    ]))
    .style(Style::default().bg(colors.header_bg()));
    frame.render_widget(header, layout.header);

    let machine = session.machine();
    let timer = session.timer();
    let bar = match timer.remaining() {
        Some(remaining) if app.show_timer => {
            let label = if timer.mode().is_global() {
                "Time left"
            } else {
                "Question time"
            };
            ProgressBar::new(label, 1.0 - timer.elapsed_ratio(), app.theme)
                .text(format_clock(remaining))
                .warning(timer.is_warning())
        }
        _ => {
            let answered = machine.answered_count();
            let total = machine.len();
            ProgressBar::new("Progress", answered as f64 / total.max(1) as f64, app.theme)
                .text(format!("{answered}/{total} answered"))
        }
    };
    frame.render_widget(bar, layout.timer);

    let view = session.current_view();
    frame.render_widget(QuestionPanel::new(&view, app.cursor, app.theme), layout.main);

    if let Some(sidebar) = layout.sidebar {
        frame.render_widget(
            SessionSidebar::new(
                machine.answered_count(),
                machine.len(),
                timer.mode(),
                session.difficulty_info(),
                session.last_adjustment(),
                app.theme,
            ),
            sidebar,
        );
    }

    let notice = match &app.notice {
        Some(Notice::Info(text)) => Span::styled(format!("  {text}"), Style::default().fg(colors.accent())),
        Some(Notice::Warning(text)) => Span::styled(format!("  {text}"), Style::default().fg(colors.warning())),
        Some(Notice::Error(text)) => Span::styled(format!("  {text}"), Style::default().fg(colors.error())),
        None => Span::raw(""),
    };
    let hints: &[&str] = match layout.tier {
        LayoutTier::Wide => &[
            "[1-9/Space] Select",
            "[\u{2191}\u{2193}] Move",
            "[n/\u{2192}] Next",
            "[p/\u{2190}] Prev",
            "[s] Submit",
            "[q] Save & quit",
        ],
        LayoutTier::Narrow => &["[1-9] Select", "[n/p] Nav", "[s] Submit", "[q] Quit"],
    };
    let hint_line = pack_hint_lines(hints, layout.footer.width as usize)
        .into_iter()
        .next()
        .unwrap_or_default();
    let footer = Paragraph::new(vec![
        Line::from(notice),
        Line::from(Span::styled(hint_line, Style::default().fg(colors.muted()))),
    ]);
    frame.render_widget(footer, layout.footer);
}

fn render_result(frame: &mut ratatui::Frame, app: &App<JsonStore>) {
    let Some(result) = app.session.result() else {
        return;
    };
    let area = centered_rect(80, 90, frame.area());
    let stats = app.session.difficulty_statistics();
    let dashboard = Dashboard::new(
        result,
        app.session.quiz(),
        stats.as_ref(),
        app.session.attempt_id(),
        app.review_scroll,
        app.theme,
    );
    frame.render_widget(dashboard, area);
}

fn run_list(config: &Config) -> Result<()> {
    let service = local_service(config)?;
    let learner = config.learner();
    let saved = service.store().snapshot_keys()?;

    let quizzes = service.list_quizzes();
    if quizzes.is_empty() {
        println!("No quizzes found in {}", config.quiz_dir);
        return Ok(());
    }
    for quiz in quizzes {
        let key = SessionId::new(&quiz.id, &learner).storage_key();
        let marker = if saved.contains(&key) { "  (in progress)" } else { "" };
        println!(
            "{:<24} {} ({} questions){marker}",
            quiz.id, quiz.title, quiz.question_count
        );
    }
    Ok(())
}

fn run_history(config: &Config, quiz: Option<&str>) -> Result<()> {
    if let Some(quiz_id) = quiz {
        let attempts = build_service(config)?.attempts(quiz_id)?;
        if attempts.is_empty() {
            println!("No attempts for {quiz_id}");
        }
        for attempt in attempts {
            let when = attempt
                .submitted_at
                .as_deref()
                .map(|s| s.replace('T', " ").chars().take(16).collect::<String>())
                .unwrap_or_default();
            println!(
                "{when:<16}  {:<20} {:>3}/{:<3} {:>5.1}%  {}",
                attempt.student_name,
                attempt.score,
                attempt.total_questions,
                attempt.percentage,
                format_clock(attempt.time_taken.min(u32::MAX as u64) as u32)
            );
        }
        return Ok(());
    }

    if config.api_base_url.is_some() {
        bail!("pass a quiz id to list attempts from a quiz service");
    }
    let entries = local_service(config)?.history_entries(None);
    if entries.is_empty() {
        println!("No attempts recorded yet");
    }
    for entry in entries {
        let record = &entry.record;
        println!(
            "{}  {:<20} {:<16} {:>3}/{:<3} {:>3}%  {}",
            record
                .submitted_at
                .with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M"),
            record.quiz_id,
            record.learner.name,
            record.score,
            record.total,
            record.percentage,
            format_clock(record.time_taken_whole_secs() as u32)
        );
    }
    Ok(())
}

fn run_discard(config: &Config, quiz: &str, learner: &LearnerArgs) -> Result<()> {
    let learner = learner.resolve(config);
    let id = SessionId::new(quiz, &learner);
    let snapshots = SnapshotStore::new(JsonStore::new()?);
    if !snapshots.discard(&id)? {
        println!("No saved progress for {id}");
        return Ok(());
    }
    warn!(session = %id, "saved progress discarded");
    println!("Discarded saved progress for {id}");
    Ok(())
}
