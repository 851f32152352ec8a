use ratatui::buffer::Buffer;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Paragraph, Widget, Wrap};

use quizline::engine::difficulty::{AdjustmentEvent, Difficulty, DifficultyInfo};
use quizline::engine::timer::TimerMode;

use crate::ui::theme::Theme;

pub struct SessionSidebar<'a> {
    answered: usize,
    total: usize,
    timer: TimerMode,
    difficulty: Option<DifficultyInfo>,
    last_adjustment: Option<&'a AdjustmentEvent>,
    theme: &'a Theme,
}

impl<'a> SessionSidebar<'a> {
    pub fn new(
        answered: usize,
        total: usize,
        timer: TimerMode,
        difficulty: Option<DifficultyInfo>,
        last_adjustment: Option<&'a AdjustmentEvent>,
        theme: &'a Theme,
    ) -> Self {
        Self {
            answered,
            total,
            timer,
            difficulty,
            last_adjustment,
            theme,
        }
    }
}

fn timer_label(mode: TimerMode) -> String {
    match mode {
        TimerMode::Untimed => "Untimed".to_string(),
        TimerMode::Global { duration } => format!("{} min total", duration / 60),
        TimerMode::PerQuestion { duration } => format!("{duration}s per question"),
    }
}

impl Widget for SessionSidebar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let colors = &self.theme.colors;

        let sections = Layout::default()
            .direction(Direction::Vertical)
            .constraints(if self.difficulty.is_some() {
                [Constraint::Length(7), Constraint::Min(8)]
            } else {
                [Constraint::Min(7), Constraint::Length(0)]
            })
            .split(area);

        let remaining = self.total - self.answered.min(self.total);
        let lines = vec![
            Line::from(vec![
                Span::styled("Answered: ", Style::default().fg(colors.fg())),
                Span::styled(
                    format!("{}/{}", self.answered, self.total),
                    Style::default().fg(colors.accent()),
                ),
            ]),
            Line::from(vec![
                Span::styled("Open:     ", Style::default().fg(colors.fg())),
                Span::styled(
                    remaining.to_string(),
                    Style::default().fg(if remaining == 0 {
                        colors.success()
                    } else {
                        colors.warning()
                    }),
                ),
            ]),
            Line::from(""),
            Line::from(vec![
                Span::styled("Timer: ", Style::default().fg(colors.fg())),
                Span::styled(timer_label(self.timer), Style::default().fg(colors.muted())),
            ]),
        ];
        Paragraph::new(lines)
            .block(
                Block::bordered()
                    .title(" Session ")
                    .border_style(Style::default().fg(colors.border())),
            )
            .render(sections[0], buf);

        let Some(info) = self.difficulty else {
            return;
        };

        let level_color = match info.level {
            Difficulty::Easy => colors.success(),
            Difficulty::Medium => colors.warning(),
            Difficulty::Hard => colors.error(),
        };
        let mut lines = vec![
            Line::from(vec![
                Span::styled("Level: ", Style::default().fg(colors.fg())),
                Span::styled(
                    info.level.label(),
                    Style::default().fg(level_color).add_modifier(Modifier::BOLD),
                ),
            ]),
            Line::from(Span::styled(
                info.level.description(),
                Style::default().fg(colors.muted()),
            )),
            Line::from(""),
            Line::from(vec![
                Span::styled("Streak: ", Style::default().fg(colors.fg())),
                Span::styled(
                    format!("{} \u{2713}  {} \u{2717}", info.consecutive_correct, info.consecutive_wrong),
                    Style::default().fg(colors.accent()),
                ),
            ]),
            Line::from(Span::styled(
                info.progress_to_next.message.clone(),
                Style::default().fg(colors.muted()),
            )),
        ];

        if let Some(reason) = self.last_adjustment.and_then(|e| e.reason.as_deref()) {
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled(
                reason.to_string(),
                Style::default().fg(colors.accent()).add_modifier(Modifier::ITALIC),
            )));
        }

        Paragraph::new(lines)
            .wrap(Wrap { trim: true })
            .block(
                Block::bordered()
                    .title(" Difficulty ")
                    .border_style(Style::default().fg(colors.border())),
            )
            .render(sections[1], buf);
    }
}
