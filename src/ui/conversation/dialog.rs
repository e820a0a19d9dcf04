//! Modal dialogs and notification toasts

use crate::controller::{Dialog, Notification, NotificationLevel};
use crate::format::preview_line;
use crate::model::ConversationRecord;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Paragraph, Widget, Wrap},
};

/// Centered rectangle taking `percent_x` of the width and `height` rows
pub fn centered_rect(percent_x: u16, height: u16, area: Rect) -> Rect {
    let width = (area.width as u32 * percent_x.min(100) as u32 / 100) as u16;
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

pub struct DialogView<'a> {
    pub dialog: &'a Dialog,
    /// Record the dialog refers to, when it is in the visible history
    pub record: Option<&'a ConversationRecord>,
}

impl DialogView<'_> {
    fn title(&self) -> &'static str {
        match self.dialog {
            Dialog::ConfirmDelete { .. } => "🗑️ Delete conversation?",
            Dialog::ConfirmPurge { .. } => "⚠️ Permanently delete conversation?",
            Dialog::RetryDelete { .. } => "❌ Could not delete",
            Dialog::EditQuestion { .. } => "✏️ Edit message",
        }
    }

    fn accent(&self) -> Color {
        match self.dialog {
            Dialog::EditQuestion { .. } => Color::Blue,
            _ => Color::Red,
        }
    }

    fn body(&self) -> Text<'static> {
        let dim = Style::default().fg(Color::Gray);
        let keys = Style::default().fg(Color::DarkGray);
        let subject = self
            .record
            .map(|r| format!("\"{}\"", preview_line(&r.message, 40)))
            .unwrap_or_default();

        let mut lines = match self.dialog {
            Dialog::ConfirmDelete { id } => vec![
                Line::from(format!("Conversation #{} {}", id, subject)),
                Line::from(Span::styled(
                    "It will no longer appear in your history.",
                    dim,
                )),
                Line::from(""),
                Line::from(Span::styled("[y] Delete   [n/Esc] Keep", keys)),
            ],
            Dialog::ConfirmPurge { id } => vec![
                Line::from(format!("Conversation #{} {}", id, subject)),
                Line::from(Span::styled(
                    "This cannot be undone.",
                    Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
                )),
                Line::from(""),
                Line::from(Span::styled("[y] Delete forever   [n/Esc] Keep", keys)),
            ],
            Dialog::RetryDelete { id, reason } => vec![
                Line::from(format!("Conversation #{} could not be deleted.", id)),
                Line::from(Span::styled(reason.clone(), dim)),
                Line::from(""),
                Line::from(Span::styled("[y] Try again   [n/Esc] Cancel", keys)),
            ],
            Dialog::EditQuestion {
                input, validation, ..
            } => {
                let mut lines: Vec<Line> = input
                    .split('\n')
                    .map(|l| Line::from(l.to_string()))
                    .collect();
                if let Some(last) = lines.last_mut() {
                    last.spans.push(Span::styled("▌", Style::default().fg(Color::Green)));
                }
                lines.push(Line::from(""));
                if let Some(message) = validation {
                    lines.push(Line::from(Span::styled(
                        message.clone(),
                        Style::default().fg(Color::Red),
                    )));
                }
                lines.push(Line::from(Span::styled(
                    "[Enter] Save   [Shift+Enter] New line   [Esc] Cancel",
                    keys,
                )));
                lines
            }
        };

        lines.insert(0, Line::from(""));
        Text::from(lines)
    }
}

impl Widget for DialogView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let body = self.body();
        let height = body.lines.len() as u16 + 2;
        let rect = centered_rect(60, height.max(7), area);

        Clear.render(rect, buf);
        Paragraph::new(body)
            .wrap(Wrap { trim: false })
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(self.title())
                    .border_style(Style::default().fg(self.accent())),
            )
            .render(rect, buf);
    }
}

/// Most recent notification, pinned to the top right corner
pub struct ToastView<'a> {
    pub notification: &'a Notification,
}

impl Widget for ToastView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let (icon, color) = match self.notification.level {
            NotificationLevel::Success => ("✅", Color::Green),
            NotificationLevel::Info => ("ℹ️", Color::Cyan),
            NotificationLevel::Error => ("❌", Color::Red),
        };

        let width = area.width.min(48);
        let rect = Rect {
            x: area.x + area.width - width,
            y: area.y,
            width,
            height: area.height.min(4),
        };

        let hint = if self.notification.is_sticky() {
            " (Esc to dismiss)"
        } else {
            ""
        };

        Clear.render(rect, buf);
        Paragraph::new(self.notification.message.clone())
            .wrap(Wrap { trim: true })
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(format!("{} {}{}", icon, self.notification.title, hint))
                    .border_style(Style::default().fg(color)),
            )
            .render(rect, buf);
    }
}

/// Help overlay listing commands and keys
pub struct HelpView<'a> {
    pub text: &'a str,
}

impl Widget for HelpView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let height = self.text.lines().count() as u16 + 4;
        let rect = centered_rect(80, height, area);

        Clear.render(rect, buf);
        Paragraph::new(self.text.to_string())
            .wrap(Wrap { trim: false })
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title("Help (Esc to close)")
                    .border_style(Style::default().fg(Color::Yellow)),
            )
            .render(rect, buf);
    }
}
