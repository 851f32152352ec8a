use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Paragraph, Widget, Wrap};

use quizline::session::orchestrator::QuestionView;

use crate::ui::theme::Theme;

pub struct QuestionPanel<'a> {
    view: &'a QuestionView<'a>,
    cursor: usize,
    theme: &'a Theme,
}

impl<'a> QuestionPanel<'a> {
    pub fn new(view: &'a QuestionView<'a>, cursor: usize, theme: &'a Theme) -> Self {
        Self {
            view,
            cursor,
            theme,
        }
    }
}

/// Selection marker: checkboxes for multi-select, radio buttons otherwise.
fn marker(multi_select: bool, selected: bool) -> &'static str {
    match (multi_select, selected) {
        (true, true) => "[x]",
        (true, false) => "[ ]",
        (false, true) => "(\u{2022})",
        (false, false) => "( )",
    }
}

impl Widget for QuestionPanel<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let colors = &self.theme.colors;
        let view = self.view;

        let mut title = format!(" Question {}/{} ", view.position + 1, view.total);
        if view.multi_select {
            title.push_str("(select all that apply) ");
        }
        let block = Block::bordered()
            .title(title)
            .border_style(Style::default().fg(colors.border_focused()));
        let inner = block.inner(area);
        block.render(area, buf);

        let mut lines = Vec::new();

        let mut tags = Vec::new();
        if let Some(difficulty) = view.question.difficulty {
            tags.push(difficulty.label().to_string());
        }
        if let Some(topic) = &view.question.topic {
            tags.push(topic.clone());
        }
        if !tags.is_empty() {
            lines.push(Line::from(Span::styled(
                tags.join(" \u{00b7} "),
                Style::default().fg(colors.accent_dim()),
            )));
        }

        lines.push(Line::from(Span::styled(
            view.question.prompt.clone(),
            Style::default().fg(colors.fg()).add_modifier(Modifier::BOLD),
        )));
        lines.push(Line::from(""));

        for (display, (original, option)) in view.options.iter().enumerate() {
            let selected = view.selected.contains(original);
            let focused = display == self.cursor;

            let mut style = if selected {
                Style::default().fg(colors.selected())
            } else {
                Style::default().fg(colors.fg())
            };
            if focused {
                style = style
                    .fg(colors.cursor_fg())
                    .bg(colors.cursor_bg())
                    .add_modifier(Modifier::BOLD);
            }

            lines.push(Line::from(vec![
                Span::styled(
                    format!(" {} {}. ", marker(view.multi_select, selected), display + 1),
                    style,
                ),
                Span::styled(option.text.clone(), style),
            ]));
        }

        if view.locked {
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled(
                " Answer locked",
                Style::default().fg(colors.muted()).add_modifier(Modifier::ITALIC),
            )));
        }

        Paragraph::new(lines)
            .wrap(Wrap { trim: false })
            .render(inner, buf);
    }
}
