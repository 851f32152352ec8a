use ratatui::buffer::Buffer;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Paragraph, Widget, Wrap};

use quizline::engine::difficulty::DifficultyStatistics;
use quizline::engine::timer::format_clock;
use quizline::session::quiz::QuizDefinition;
use quizline::session::result::{QuestionOutcome, ResultRecord};

use crate::ui::theme::Theme;

pub struct Dashboard<'a> {
    pub result: &'a ResultRecord,
    pub quiz: &'a QuizDefinition,
    pub difficulty: Option<&'a DifficultyStatistics>,
    pub attempt_id: Option<&'a str>,
    pub scroll: u16,
    pub theme: &'a Theme,
}

impl<'a> Dashboard<'a> {
    pub fn new(
        result: &'a ResultRecord,
        quiz: &'a QuizDefinition,
        difficulty: Option<&'a DifficultyStatistics>,
        attempt_id: Option<&'a str>,
        scroll: u16,
        theme: &'a Theme,
    ) -> Self {
        Self {
            result,
            quiz,
            difficulty,
            attempt_id,
            scroll,
            theme,
        }
    }

    fn option_texts(&self, question: usize, options: &[usize]) -> String {
        let Some(q) = self.quiz.questions.get(question) else {
            return String::new();
        };
        options
            .iter()
            .filter_map(|&i| q.options.get(i).map(|o| o.text.as_str()))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn review_lines(&self, outcome: &QuestionOutcome) -> Vec<Line<'static>> {
        let colors = &self.theme.colors;
        let (mark, color) = if outcome.correct {
            ("\u{2713}", colors.success())
        } else if outcome.answered {
            ("\u{2717}", colors.error())
        } else {
            ("\u{2013}", colors.warning())
        };
        let Some(question) = self.quiz.questions.get(outcome.question_index) else {
            return Vec::new();
        };

        let mut lines = vec![Line::from(vec![
            Span::styled(format!(" {mark} "), Style::default().fg(color).add_modifier(Modifier::BOLD)),
            Span::styled(
                format!("{}. {}", outcome.question_index + 1, question.prompt),
                Style::default().fg(colors.fg()),
            ),
            Span::styled(
                format!("  ({:.0}s)", outcome.elapsed_secs),
                Style::default().fg(colors.muted()),
            ),
        ])];

        let yours = if outcome.answered {
            self.option_texts(outcome.question_index, &outcome.selected)
        } else {
            "no answer".to_string()
        };
        lines.push(Line::from(vec![
            Span::styled("     Your answer: ", Style::default().fg(colors.muted())),
            Span::styled(yours, Style::default().fg(color)),
        ]));
        if !outcome.correct {
            lines.push(Line::from(vec![
                Span::styled("     Correct:     ", Style::default().fg(colors.muted())),
                Span::styled(
                    self.option_texts(outcome.question_index, &outcome.correct_options),
                    Style::default().fg(colors.success()),
                ),
            ]));
        }
        if let Some(explanation) = &question.explanation {
            lines.push(Line::from(Span::styled(
                format!("     {explanation}"),
                Style::default().fg(colors.muted()).add_modifier(Modifier::ITALIC),
            )));
        }
        lines
    }
}

impl Widget for Dashboard<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let colors = &self.theme.colors;
        let result = self.result;

        let block = Block::bordered()
            .title(format!(" {} ", result.quiz_title))
            .border_style(Style::default().fg(colors.accent()))
            .style(Style::default().bg(colors.bg()));
        let inner = block.inner(area);
        block.render(area, buf);

        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(2),
                Constraint::Length(1),
                Constraint::Length(1),
                Constraint::Length(1),
                Constraint::Length(if self.difficulty.is_some() { 2 } else { 0 }),
                Constraint::Length(1),
                Constraint::Min(0),
                Constraint::Length(1),
            ])
            .split(inner);

        let title = Paragraph::new(Line::from(Span::styled(
            "Quiz Submitted",
            Style::default()
                .fg(colors.accent())
                .add_modifier(Modifier::BOLD),
        )))
        .alignment(Alignment::Center);
        title.render(layout[0], buf);

        let pct_color = if result.percentage >= 80 {
            colors.success()
        } else if result.percentage >= 50 {
            colors.warning()
        } else {
            colors.error()
        };
        let score_text = format!("{}/{}", result.score, result.total);
        let pct_text = format!("  ({}%)", result.percentage);
        Paragraph::new(Line::from(vec![
            Span::styled("  Score:    ", Style::default().fg(colors.fg())),
            Span::styled(
                &*score_text,
                Style::default().fg(pct_color).add_modifier(Modifier::BOLD),
            ),
            Span::styled(&*pct_text, Style::default().fg(colors.muted())),
        ]))
        .render(layout[1], buf);

        let time_text = format_clock(result.time_taken_whole_secs().min(u32::MAX as u64) as u32);
        Paragraph::new(Line::from(vec![
            Span::styled("  Time:     ", Style::default().fg(colors.fg())),
            Span::styled(&*time_text, Style::default().fg(colors.fg())),
        ]))
        .render(layout[2], buf);

        let breakdown = format!(
            "{} correct, {} incorrect, {} unanswered",
            result.correct_answers.len(),
            result.incorrect_answers.len(),
            result.unanswered.len()
        );
        Paragraph::new(Line::from(vec![
            Span::styled("  Answers:  ", Style::default().fg(colors.fg())),
            Span::styled(&*breakdown, Style::default().fg(colors.muted())),
        ]))
        .render(layout[3], buf);

        if let Some(stats) = self.difficulty {
            let per_level = stats
                .breakdown
                .iter()
                .filter(|(_, b)| b.total > 0)
                .map(|(level, b)| format!("{}: {}/{}", level.label(), b.correct, b.total))
                .collect::<Vec<_>>()
                .join("  ");
            Paragraph::new(vec![
                Line::from(vec![
                    Span::styled("  Adaptive: ", Style::default().fg(colors.fg())),
                    Span::styled(
                        format!(
                            "{:.2}% accuracy, {} level changes",
                            stats.accuracy, stats.difficulty_changes
                        ),
                        Style::default().fg(colors.accent()),
                    ),
                ]),
                Line::from(Span::styled(
                    format!("            {per_level}"),
                    Style::default().fg(colors.muted()),
                )),
            ])
            .render(layout[4], buf);
        }

        let review: Vec<Line> = result
            .questions
            .iter()
            .flat_map(|outcome| self.review_lines(outcome))
            .collect();
        Paragraph::new(review)
            .wrap(Wrap { trim: false })
            .scroll((self.scroll, 0))
            .block(
                Block::bordered()
                    .title(" Review ")
                    .border_style(Style::default().fg(colors.border())),
            )
            .render(layout[6], buf);

        let mut help = vec![Span::styled(
            "  [j/k] Scroll  [q/Enter] Quit",
            Style::default().fg(colors.accent()),
        )];
        if let Some(id) = self.attempt_id {
            help.push(Span::styled(
                format!("    attempt {id}"),
                Style::default().fg(colors.muted()),
            ));
        }
        Paragraph::new(Line::from(help)).render(layout[7], buf);
    }
}
