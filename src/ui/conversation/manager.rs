use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::controller::{ConversationController, Dialog};
use crate::events::Backend;
use crate::format::preview_line;
use crate::gateway::{ConversationApi, HttpGateway};
use crate::ui::conversation::dialog::{DialogView, HelpView, ToastView};
use crate::ui::conversation::{
    get_help_text, ComposerResult, ConversationComposer, HistoryCursor, ParsedCommand,
    SidebarView, SlashCommand, ThreadScroll, ThreadView,
};
use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    layout::{Constraint, Direction, Layout},
    Frame,
};
use tracing::info;

const SIDEBAR_WIDTH: u16 = 34;
const NOTIFICATION_TTL: Duration = Duration::from_millis(2500);
const PAGE_LINES: usize = 10;

/// Actions the screen asks the event loop to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenAction {
    None,
    Exit,
    SwitchBackend(Backend),
}

/// Which pane receives keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Focus {
    #[default]
    Composer,
    History,
}

/// One backend's chat screen: sidebar, thread and composer
pub struct ConversationScreen {
    controller: ConversationController,
    composer: ConversationComposer,
    scroll: ThreadScroll,
    cursor: HistoryCursor,
    focus: Focus,
    show_help: bool,
    help_text: String,
    preview_chars: usize,
}

impl ConversationScreen {
    /// Screen talking to the backend's configured base URL. Starts loading the
    /// history right away.
    pub fn new(config: &Config, backend: Backend) -> Result<Self> {
        let gateway = HttpGateway::new(config.base_url(backend), config.request_timeout())?;
        info!(backend = backend.route(), base_url = gateway.base_url(), "opening conversation screen");
        Ok(Self::with_gateway(backend, Arc::new(gateway), config.ui.preview_chars))
    }

    pub fn with_gateway(
        backend: Backend,
        gateway: Arc<dyn ConversationApi>,
        preview_chars: usize,
    ) -> Self {
        let mut controller = ConversationController::new(backend, gateway);
        controller.load_history();

        Self {
            controller,
            composer: ConversationComposer::new(backend),
            scroll: ThreadScroll::default(),
            cursor: HistoryCursor::default(),
            focus: Focus::Composer,
            show_help: false,
            help_text: get_help_text(),
            preview_chars,
        }
    }

    pub fn backend(&self) -> Backend {
        self.controller.backend()
    }

    pub fn focus(&self) -> Focus {
        self.focus
    }

    pub fn controller(&self) -> &ConversationController {
        &self.controller
    }

    /// Rebuild the screen for `backend`. Replies still in flight for the old
    /// backend are dropped.
    pub fn switch_backend(&mut self, config: &Config, backend: Backend) -> Result<()> {
        if backend == self.backend() {
            return Ok(());
        }
        let next = Self::new(config, backend)?;
        // dropping the old screen tears its controller down
        *self = next;
        Ok(())
    }

    /// Apply arrived replies and sync widgets with the controller.
    pub fn tick(&mut self) {
        self.controller.process_replies();
        self.controller.prune_notifications(NOTIFICATION_TTL);

        if self.controller.take_scroll_request() {
            self.scroll.scroll_to_bottom();
        }
        self.cursor.clamp(self.controller.conversations().len());
        self.composer
            .set_status(self.controller.is_loading(), self.controller.error());
    }

    pub fn handle_paste(&mut self, text: &str) {
        if let Some(input) = self.controller.edit_input_mut() {
            input.push_str(&text.replace('\r', ""));
        } else if self.focus == Focus::Composer {
            self.composer.paste(text);
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> ScreenAction {
        if key.kind != KeyEventKind::Press {
            return ScreenAction::None;
        }

        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return ScreenAction::Exit;
        }

        if self.show_help {
            if matches!(key.code, KeyCode::Esc | KeyCode::Enter | KeyCode::Char('q')) {
                self.show_help = false;
            }
            return ScreenAction::None;
        }

        if self.controller.dialog().is_some() {
            self.handle_dialog_key(key);
            return ScreenAction::None;
        }

        match key.code {
            KeyCode::Esc if !self.composer.is_palette_open() => {
                if self.controller.dismiss_notification().is_none() {
                    self.set_focus(Focus::Composer);
                }
                return ScreenAction::None;
            }
            KeyCode::Tab if !self.composer.is_palette_open() => {
                let next = match self.focus {
                    Focus::Composer => Focus::History,
                    Focus::History => Focus::Composer,
                };
                self.set_focus(next);
                return ScreenAction::None;
            }
            KeyCode::PageUp => {
                self.scroll.scroll_up(PAGE_LINES);
                return ScreenAction::None;
            }
            KeyCode::PageDown => {
                self.scroll.scroll_down(PAGE_LINES);
                return ScreenAction::None;
            }
            _ => {}
        }

        match self.focus {
            Focus::History => self.handle_history_key(key),
            Focus::Composer => match self.composer.handle_key(key) {
                ComposerResult::Submitted(text) => {
                    self.submit(text);
                    ScreenAction::None
                }
                ComposerResult::Command(command) => self.handle_slash_command(command),
                ComposerResult::None => ScreenAction::None,
            },
        }
    }

    fn set_focus(&mut self, focus: Focus) {
        self.focus = focus;
        self.composer.set_focus(focus == Focus::Composer);
        if focus == Focus::History && self.cursor.selected().is_none() {
            self.cursor.select_last(self.controller.conversations().len());
        }
    }

    fn submit(&mut self, text: String) {
        self.controller.set_draft(text);
        if self.controller.send_message() {
            self.composer.clear();
            self.scroll.scroll_to_bottom();
        } else if self.controller.is_loading() {
            self.controller
                .inform("Please wait", "The previous message is still being answered");
        }
    }

    fn handle_dialog_key(&mut self, key: KeyEvent) {
        if matches!(self.controller.dialog(), Some(Dialog::EditQuestion { .. })) {
            match key.code {
                KeyCode::Enter if !key.modifiers.contains(KeyModifiers::SHIFT) => {
                    self.controller.confirm_dialog()
                }
                KeyCode::Esc => self.controller.cancel_dialog(),
                code => {
                    if let Some(input) = self.controller.edit_input_mut() {
                        match code {
                            KeyCode::Enter => input.push('\n'),
                            KeyCode::Backspace => {
                                input.pop();
                            }
                            KeyCode::Char(c) => input.push(c),
                            _ => {}
                        }
                    }
                }
            }
            return;
        }

        match key.code {
            KeyCode::Enter | KeyCode::Char('y') | KeyCode::Char('Y') => {
                self.controller.confirm_dialog()
            }
            KeyCode::Esc | KeyCode::Char('n') | KeyCode::Char('N') => {
                self.controller.cancel_dialog()
            }
            _ => {}
        }
    }

    fn highlighted_id(&self) -> Option<i64> {
        self.cursor
            .selected()
            .and_then(|index| self.controller.conversations().get(index))
            .map(|record| record.id)
    }

    fn handle_history_key(&mut self, key: KeyEvent) -> ScreenAction {
        let len = self.controller.conversations().len();

        match key.code {
            KeyCode::Up | KeyCode::Char('k') => self.cursor.move_by(-1, len),
            KeyCode::Down | KeyCode::Char('j') => self.cursor.move_by(1, len),
            KeyCode::Enter => {
                if let Some(id) = self.highlighted_id() {
                    self.controller.select_conversation(id);
                    self.set_focus(Focus::Composer);
                }
            }
            KeyCode::Char('d') | KeyCode::Delete => {
                if let Some(id) = self.highlighted_id() {
                    self.controller.request_delete(id);
                }
            }
            KeyCode::Char('e') => {
                if let Some(id) = self.highlighted_id() {
                    self.controller.request_edit(id);
                }
            }
            KeyCode::Char('g') => {
                if let Some(id) = self.highlighted_id() {
                    self.controller.regenerate(id);
                }
            }
            KeyCode::Char('n') => {
                self.start_new_conversation();
                self.set_focus(Focus::Composer);
            }
            KeyCode::Char('b') => return ScreenAction::SwitchBackend(self.backend().next()),
            _ => {}
        }

        ScreenAction::None
    }

    fn start_new_conversation(&mut self) {
        self.controller.start_new_conversation();
        self.composer.clear();
        self.cursor.select_index(None);
        self.scroll.scroll_to_bottom();
    }

    /// Id given to a command, or the open conversation when it has none.
    fn target_id(&self, command: &ParsedCommand) -> Option<i64> {
        command.id_argument().or(self.controller.selected_id())
    }

    fn handle_slash_command(&mut self, command: ParsedCommand) -> ScreenAction {
        match command.command {
            SlashCommand::New => self.start_new_conversation(),
            SlashCommand::Open => match command.id_argument() {
                Some(id) => {
                    if !self.controller.select_conversation(id) {
                        self.controller.find_conversation(id);
                    }
                }
                None => self.usage(SlashCommand::Open),
            },
            SlashCommand::Edit => match self.target_id(&command) {
                Some(id) => {
                    if !self.controller.request_edit(id) {
                        self.not_in_history(id);
                    } else if let Some(text) = command.text_after_id() {
                        if let Some(input) = self.controller.edit_input_mut() {
                            *input = text.to_string();
                        }
                    }
                }
                None => self.usage(SlashCommand::Edit),
            },
            SlashCommand::Delete => match self.target_id(&command) {
                Some(id) => {
                    if !self.controller.request_delete(id) {
                        self.not_in_history(id);
                    }
                }
                None => self.usage(SlashCommand::Delete),
            },
            SlashCommand::Purge => match command.id_argument() {
                Some(id) => self.controller.request_purge(id),
                None => self.usage(SlashCommand::Purge),
            },
            SlashCommand::Restore => match command.id_argument() {
                Some(id) => self.controller.restore_conversation(id),
                None => self.usage(SlashCommand::Restore),
            },
            SlashCommand::Regenerate => match self.target_id(&command) {
                Some(id) => {
                    if !self.controller.regenerate(id) {
                        self.not_in_history(id);
                    }
                }
                None => self.usage(SlashCommand::Regenerate),
            },
            SlashCommand::Refresh => self.controller.load_history(),
            SlashCommand::Backend => {
                let target = command
                    .backend_target()
                    .unwrap_or_else(|| self.backend().next());
                if target != self.backend() {
                    return ScreenAction::SwitchBackend(target);
                }
            }
            SlashCommand::Suggest => {
                match command.suggestion_index() {
                    Some(index) if self.controller.use_suggestion(index) => {
                        let draft = self.controller.draft().to_string();
                        self.composer.set_content(&draft);
                    }
                    _ => self.usage(SlashCommand::Suggest),
                }
            }
            SlashCommand::Help => self.show_help = true,
            SlashCommand::Bye => return ScreenAction::Exit,
        }

        ScreenAction::None
    }

    fn usage(&mut self, command: SlashCommand) {
        self.controller.inform("Usage", command.description());
    }

    fn not_in_history(&mut self, id: i64) {
        self.controller
            .inform("Not found", format!("Conversation #{} is not in the history", id));
    }

    fn thread_title(&self) -> String {
        match self.controller.selected_record() {
            Some(record) => format!("#{} {}", record.id, preview_line(&record.message, 40)),
            None => "New conversation".to_string(),
        }
    }

    pub fn render(&mut self, frame: &mut Frame) {
        let area = frame.size();
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(SIDEBAR_WIDTH), Constraint::Min(20)])
            .split(area);

        let sidebar = SidebarView {
            backend: self.controller.backend(),
            conversations: self.controller.conversations(),
            open_id: self.controller.selected_id(),
            focused: self.focus == Focus::History,
            preview_chars: self.preview_chars,
        };
        frame.render_stateful_widget(sidebar, columns[0], &mut self.cursor);

        let composer_height = self.composer.desired_height(columns[1].height / 3);
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(5), Constraint::Length(composer_height)])
            .split(columns[1]);

        let thread = ThreadView {
            backend: self.controller.backend(),
            messages: self.controller.messages(),
            sending: self.controller.is_loading(),
            title: self.thread_title(),
        };
        frame.render_stateful_widget(thread, rows[0], &mut self.scroll);
        frame.render_widget(&self.composer, rows[1]);

        if let Some(notification) = self.controller.notifications().last() {
            frame.render_widget(ToastView { notification }, columns[1]);
        }

        if let Some(dialog) = self.controller.dialog() {
            let record = self.controller.record(dialog.id());
            frame.render_widget(DialogView { dialog, record }, area);
        }

        if self.show_help {
            frame.render_widget(HelpView { text: &self.help_text }, area);
        }
    }

    /// Open dialog, if any
    pub fn dialog(&self) -> Option<&Dialog> {
        self.controller.dialog()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::GatewayError;
    use crate::model::ConversationRecord;
    use async_trait::async_trait;

    struct StubApi;

    fn stored(id: i64, message: &str) -> ConversationRecord {
        ConversationRecord {
            id,
            message: message.to_string(),
            response: format!("answer to {}", message),
            status: "A".to_string(),
            created_at: format!("2024-05-0{} 10:00:00", id),
        }
    }

    #[async_trait]
    impl ConversationApi for StubApi {
        async fn ask(&self, message: &str) -> Result<String, GatewayError> {
            Ok(format!("echo: {}", message))
        }

        async fn list(&self) -> Result<Vec<ConversationRecord>, GatewayError> {
            Ok(vec![stored(1, "first"), stored(2, "second")])
        }

        async fn find_by_id(&self, id: i64) -> Result<ConversationRecord, GatewayError> {
            Ok(stored(id, "found"))
        }

        async fn delete_physical(&self, _id: i64) -> Result<(), GatewayError> {
            Ok(())
        }

        async fn delete_logical(&self, _id: i64) -> Result<(), GatewayError> {
            Ok(())
        }

        async fn restore(&self, _id: i64) -> Result<(), GatewayError> {
            Ok(())
        }

        async fn update_question(&self, _id: i64, message: &str) -> Result<String, GatewayError> {
            Ok(format!("new answer to {}", message))
        }
    }

    async fn screen() -> ConversationScreen {
        let mut screen = ConversationScreen::with_gateway(Backend::Gemini, Arc::new(StubApi), 50);
        screen.controller.wait_idle().await;
        screen
    }

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_text(screen: &mut ConversationScreen, text: &str) -> ScreenAction {
        let mut action = ScreenAction::None;
        for c in text.chars() {
            action = screen.handle_key(press(KeyCode::Char(c)));
        }
        action
    }

    #[tokio::test]
    async fn test_submitting_sends_and_clears_composer() {
        let mut screen = screen().await;
        assert_eq!(screen.controller.conversations().len(), 2);

        type_text(&mut screen, "hello");
        screen.handle_key(press(KeyCode::Enter));
        assert!(screen.composer.content().is_empty());
        assert!(screen.controller.is_loading());

        screen.controller.wait_idle().await;
        let messages = screen.controller.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].content, "echo: hello");
    }

    #[tokio::test]
    async fn test_history_focus_opens_and_switches() {
        let mut screen = screen().await;
        screen.handle_key(press(KeyCode::Tab));
        assert_eq!(screen.focus(), Focus::History);

        // cursor starts on the newest entry
        screen.handle_key(press(KeyCode::Enter));
        assert_eq!(screen.controller.selected_id(), Some(2));
        assert_eq!(screen.focus(), Focus::Composer);

        screen.handle_key(press(KeyCode::Tab));
        assert_eq!(
            screen.handle_key(press(KeyCode::Char('b'))),
            ScreenAction::SwitchBackend(Backend::ChatGpt)
        );
    }

    #[tokio::test]
    async fn test_delete_goes_through_dialog() {
        let mut screen = screen().await;
        screen.handle_key(press(KeyCode::Tab));
        screen.handle_key(press(KeyCode::Up));
        screen.handle_key(press(KeyCode::Char('d')));
        assert_eq!(screen.dialog(), Some(&Dialog::ConfirmDelete { id: 1 }));

        screen.handle_key(press(KeyCode::Char('n')));
        assert!(screen.dialog().is_none());

        screen.handle_key(press(KeyCode::Char('d')));
        screen.handle_key(press(KeyCode::Char('y')));
        assert!(screen.dialog().is_none());
        screen.controller.wait_idle().await;
        assert!(screen.controller.notifications().any(|n| n.title == "Deleted"));
    }

    #[tokio::test]
    async fn test_edit_command_prefills_dialog() {
        let mut screen = screen().await;
        type_text(&mut screen, "/edit 2 a sharper question");
        screen.handle_key(press(KeyCode::Enter));

        match screen.dialog() {
            Some(Dialog::EditQuestion { id, input, .. }) => {
                assert_eq!(*id, 2);
                assert_eq!(input, "a sharper question");
            }
            other => panic!("unexpected dialog: {:?}", other),
        }

        screen.handle_key(press(KeyCode::Enter));
        screen.controller.wait_idle().await;
        assert!(screen.controller.notifications().any(|n| n.title == "Updated"));
    }

    #[tokio::test]
    async fn test_commands_map_to_actions() {
        let mut screen = screen().await;

        type_text(&mut screen, "/suggest 2");
        screen.handle_key(press(KeyCode::Enter));
        assert_eq!(screen.composer.content(), "I need help with this code:");

        screen.composer.clear();
        type_text(&mut screen, "/backend chatgpt");
        assert_eq!(
            screen.handle_key(press(KeyCode::Enter)),
            ScreenAction::SwitchBackend(Backend::ChatGpt)
        );

        type_text(&mut screen, "/delete 99");
        screen.handle_key(press(KeyCode::Enter));
        assert!(screen.dialog().is_none());
        assert!(screen.controller.notifications().any(|n| n.title == "Not found"));

        // first Enter completes the palette entry, second submits it
        type_text(&mut screen, "/bye");
        assert_eq!(screen.handle_key(press(KeyCode::Enter)), ScreenAction::None);
        assert_eq!(screen.handle_key(press(KeyCode::Enter)), ScreenAction::Exit);
    }

    #[tokio::test]
    async fn test_ctrl_c_always_exits() {
        let mut screen = screen().await;
        screen.handle_key(press(KeyCode::Tab));
        screen.handle_key(press(KeyCode::Char('d')));
        assert!(screen.dialog().is_some());

        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(screen.handle_key(ctrl_c), ScreenAction::Exit);
    }
}
