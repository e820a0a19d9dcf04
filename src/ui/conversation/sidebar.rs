//! Backend menu and conversation history list

use crate::events::Backend;
use crate::format::{preview_line, time_ago};
use crate::model::ConversationRecord;
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, StatefulWidget, Widget},
};
use strum::IntoEnumIterator;

/// Cursor over the visible history
#[derive(Debug, Default)]
pub struct HistoryCursor {
    list_state: ListState,
}

impl HistoryCursor {
    pub fn selected(&self) -> Option<usize> {
        self.list_state.selected()
    }

    /// Keep the cursor inside a list of `len` entries.
    pub fn clamp(&mut self, len: usize) {
        match (self.list_state.selected(), len) {
            (_, 0) => self.list_state.select(None),
            (Some(i), _) if i >= len => self.list_state.select(Some(len - 1)),
            _ => {}
        }
    }

    pub fn move_by(&mut self, delta: isize, len: usize) {
        if len == 0 {
            self.list_state.select(None);
            return;
        }
        let next = match self.list_state.selected() {
            Some(i) => (i as isize + delta).clamp(0, len as isize - 1) as usize,
            None if delta < 0 => len - 1,
            None => 0,
        };
        self.list_state.select(Some(next));
    }

    pub fn select_last(&mut self, len: usize) {
        self.list_state.select(len.checked_sub(1));
    }

    pub fn select_index(&mut self, index: Option<usize>) {
        self.list_state.select(index);
    }
}

pub struct SidebarView<'a> {
    pub backend: Backend,
    pub conversations: &'a [ConversationRecord],
    pub open_id: Option<i64>,
    pub focused: bool,
    pub preview_chars: usize,
}

impl StatefulWidget for SidebarView<'_> {
    type State = HistoryCursor;

    fn render(self, area: Rect, buf: &mut Buffer, cursor: &mut HistoryCursor) {
        let backend_count = Backend::iter().count() as u16;
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(backend_count + 2), Constraint::Min(3)])
            .split(area);

        self.render_menu(chunks[0], buf);
        self.render_history(chunks[1], buf, cursor);
    }
}

impl SidebarView<'_> {
    fn render_menu(&self, area: Rect, buf: &mut Buffer) {
        let block = Block::default().borders(Borders::ALL).title("Backends");
        let inner = block.inner(area);
        block.render(area, buf);

        for (i, backend) in Backend::iter().enumerate() {
            if i >= inner.height as usize {
                break;
            }
            let active = backend == self.backend;
            let style = if active {
                Style::default().fg(Color::Black).bg(Color::Green).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::Gray)
            };
            let line = Line::from(vec![Span::styled(
                format!(" {} {} ", backend.icon(), backend.display_name()),
                style,
            )]);
            buf.set_line(inner.x, inner.y + i as u16, &line, inner.width);
        }
    }

    fn render_history(&self, area: Rect, buf: &mut Buffer, cursor: &mut HistoryCursor) {
        let border_style = if self.focused {
            Style::default().fg(Color::Green)
        } else {
            Style::default()
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(border_style)
            .title(format!("History ({})", self.conversations.len()));

        if self.conversations.is_empty() {
            let inner = block.inner(area);
            block.render(area, buf);
            let line = Line::from(vec![Span::styled(
                "No conversations yet",
                Style::default().fg(Color::DarkGray),
            )]);
            buf.set_line(inner.x, inner.y, &line, inner.width);
            return;
        }

        let budget = self.preview_chars.min(area.width.saturating_sub(4) as usize);
        let items: Vec<ListItem> = self
            .conversations
            .iter()
            .map(|record| self.history_item(record, budget))
            .collect();

        cursor.clamp(items.len());
        let list = List::new(items)
            .block(block)
            .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
            .highlight_symbol(if self.focused { "▶ " } else { "  " });

        StatefulWidget::render(list, area, buf, &mut cursor.list_state);
    }

    fn history_item(&self, record: &ConversationRecord, budget: usize) -> ListItem<'static> {
        let is_open = self.open_id == Some(record.id);
        let title_style = if is_open {
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };

        ListItem::new(vec![
            Line::from(vec![Span::styled(preview_line(&record.message, budget), title_style)]),
            Line::from(vec![Span::styled(
                format!("#{} · {}", record.id, time_ago(&record.created_at)),
                Style::default().fg(Color::DarkGray),
            )]),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_movement_is_bounded() {
        let mut cursor = HistoryCursor::default();
        cursor.move_by(1, 3);
        assert_eq!(cursor.selected(), Some(0));
        cursor.move_by(5, 3);
        assert_eq!(cursor.selected(), Some(2));
        cursor.move_by(-10, 3);
        assert_eq!(cursor.selected(), Some(0));

        cursor.select_last(3);
        cursor.clamp(2);
        assert_eq!(cursor.selected(), Some(1));
        cursor.clamp(0);
        assert_eq!(cursor.selected(), None);
    }

    #[test]
    fn test_cursor_from_nothing_upwards_picks_last() {
        let mut cursor = HistoryCursor::default();
        cursor.move_by(-1, 4);
        assert_eq!(cursor.selected(), Some(3));
        cursor.move_by(1, 0);
        assert_eq!(cursor.selected(), None);
    }
}
