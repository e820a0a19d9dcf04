//! Message thread display component

use crate::controller::SUGGESTIONS;
use crate::events::Backend;
use crate::format::format_clock;
use crate::model::{Author, DisplayMessage};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Scrollbar, ScrollbarOrientation, ScrollbarState, StatefulWidget, Widget},
};

/// Scroll position of the thread, counted in lines up from the bottom
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadScroll {
    offset_from_bottom: usize,
    max_offset: usize,
}

impl ThreadScroll {
    pub fn scroll_up(&mut self, lines: usize) {
        self.offset_from_bottom = (self.offset_from_bottom + lines).min(self.max_offset);
    }

    pub fn scroll_down(&mut self, lines: usize) {
        self.offset_from_bottom = self.offset_from_bottom.saturating_sub(lines);
    }

    pub fn scroll_to_bottom(&mut self) {
        self.offset_from_bottom = 0;
    }

    pub fn offset(&self) -> usize {
        self.offset_from_bottom
    }

    /// Clamp to what the last render could show.
    fn update_bounds(&mut self, total_lines: usize, height: usize) {
        self.max_offset = total_lines.saturating_sub(height);
        self.offset_from_bottom = self.offset_from_bottom.min(self.max_offset);
    }
}

/// Renders the open thread, or the welcome screen when it is empty
pub struct ThreadView<'a> {
    pub backend: Backend,
    pub messages: &'a [DisplayMessage],
    pub sending: bool,
    pub title: String,
}

impl StatefulWidget for ThreadView<'_> {
    type State = ThreadScroll;

    fn render(self, area: Rect, buf: &mut Buffer, scroll: &mut ThreadScroll) {
        let block = Block::default()
            .borders(Borders::ALL)
            .title(self.title.clone());

        let inner_area = block.inner(area);
        block.render(area, buf);

        if self.messages.is_empty() && !self.sending {
            for (i, line) in self.welcome_lines().iter().enumerate() {
                if i < inner_area.height as usize {
                    buf.set_line(inner_area.x, inner_area.y + i as u16, line, inner_area.width);
                }
            }
            return;
        }

        let width = inner_area.width.saturating_sub(1);
        let mut all_lines: Vec<Line> = Vec::new();
        for message in self.messages {
            all_lines.append(&mut render_message(message, width));
            // spacing between messages
            all_lines.push(Line::from(vec![Span::raw("")]));
        }
        if self.sending {
            all_lines.push(thinking_line(self.backend));
        }

        let height = inner_area.height as usize;
        let total = all_lines.len();
        scroll.update_bounds(total, height);

        let end = total - scroll.offset();
        let start = end.saturating_sub(height);
        for (i, line) in all_lines[start..end].iter().enumerate() {
            buf.set_line(inner_area.x, inner_area.y + i as u16, line, width);
        }

        if total > height {
            let mut state = ScrollbarState::new(total.saturating_sub(height)).position(start);
            Scrollbar::default()
                .orientation(ScrollbarOrientation::VerticalRight)
                .begin_symbol(Some("↑"))
                .end_symbol(Some("↓"))
                .render(inner_area, buf, &mut state);
        }
    }
}

impl ThreadView<'_> {
    fn welcome_lines(&self) -> Vec<Line<'static>> {
        let mut lines = vec![
            Line::from(vec![Span::styled(
                format!("{} Welcome to {}!", self.backend.icon(), self.backend.display_name()),
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
            )]),
            Line::from(vec![Span::raw("")]),
            Line::from(vec![Span::styled(
                "Type a message below, or start from a suggestion:",
                Style::default().fg(Color::Gray),
            )]),
            Line::from(vec![Span::raw("")]),
        ];

        for (i, suggestion) in SUGGESTIONS.iter().enumerate() {
            lines.push(Line::from(vec![
                Span::styled(format!("  /suggest {}  ", i + 1), Style::default().fg(Color::Cyan)),
                Span::raw(format!("{} {}", suggestion.icon, suggestion.label)),
            ]));
        }

        lines.push(Line::from(vec![Span::raw("")]));
        lines.push(Line::from(vec![Span::styled(
            "Press Enter to send, Shift+Enter for new line, /help for commands.",
            Style::default().fg(Color::DarkGray),
        )]));
        lines
    }
}

/// Render a single message into lines
fn render_message(message: &DisplayMessage, width: u16) -> Vec<Line<'static>> {
    let mut lines = Vec::new();

    let role_icon = match message.author {
        Author::User => "👤",
        Author::Assistant => "🤖",
    };
    let reference = message
        .conversation_id
        .map(|id| format!(" #{}", id))
        .unwrap_or_default();
    let header = format!(
        "{} {}{} {}",
        role_icon,
        format_clock(&message.timestamp),
        reference,
        "─".repeat(20)
    );

    lines.push(Line::from(vec![Span::styled(
        header,
        Style::default().fg(Color::DarkGray),
    )]));

    for content_line in wrap_text(&message.content, width.saturating_sub(2) as usize) {
        lines.push(Line::from(vec![
            Span::raw("  "),
            Span::styled(content_line, content_style(message.author)),
        ]));
    }

    lines
}

fn thinking_line(backend: Backend) -> Line<'static> {
    let dots = match (std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
        / 300)
        % 4
    {
        0 => ".",
        1 => "..",
        2 => "...",
        _ => "   ",
    };

    Line::from(vec![
        Span::styled(format!("{} ", backend.icon()), Style::default().fg(Color::Green)),
        Span::styled(
            format!("{} is thinking", backend.display_name()),
            Style::default().fg(Color::Green),
        ),
        Span::styled(dots, Style::default().fg(Color::Yellow)),
    ])
}

fn content_style(author: Author) -> Style {
    match author {
        Author::User => Style::default().fg(Color::Blue),
        Author::Assistant => Style::default().fg(Color::Green),
    }
}

/// Wrap text to fit within the given width, keeping explicit line breaks
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return vec![text.to_string()];
    }

    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let mut current_line = String::new();
        let mut current_len = 0;

        for word in paragraph.split_whitespace() {
            let word_len = word.chars().count();
            if current_len > 0 && current_len + word_len + 1 > width {
                lines.push(std::mem::take(&mut current_line));
                current_len = 0;
            }
            if current_len > 0 {
                current_line.push(' ');
                current_len += 1;
            }
            current_line.push_str(word);
            current_len += word_len;
        }

        lines.push(current_line);
    }

    lines
}
