//! View-state owner for one backend's conversation screen.
//!
//! Gateway calls run in spawned tasks and report back as [`GatewayReply`]s on a
//! channel the UI loop drains with [`ConversationController::process_replies`].
//! Until a reply arrives the view shows optimistic state: the user's message is
//! appended as soon as it is sent.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::events::{Backend, GatewayReply};
use crate::gateway::{ConversationApi, GatewayError};
use crate::model::{visible_history, ConversationRecord, DisplayMessage};

/// Assistant message shown in place of a reply that never came.
pub const APOLOGY_MESSAGE: &str =
    "Sorry, there was an error processing your message. Please try again.";

/// Canned prompts offered on the welcome screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Suggestion {
    pub icon: &'static str,
    pub label: &'static str,
    pub prompt: &'static str,
}

pub const SUGGESTIONS: [Suggestion; 4] = [
    Suggestion {
        icon: "🧠",
        label: "Explain a concept",
        prompt: "Could you explain how ... works?",
    },
    Suggestion {
        icon: "💻",
        label: "Help with code",
        prompt: "I need help with this code:",
    },
    Suggestion {
        icon: "✍️",
        label: "Creative writing",
        prompt: "Help me write a story about...",
    },
    Suggestion {
        icon: "🔍",
        label: "Data analysis",
        prompt: "Analyze this data and tell me what patterns you find",
    },
];

/// Lifecycle of the most recent send
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SendState {
    #[default]
    Idle,
    Sending,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Success,
    Info,
    Error,
}

/// Dismissible message surfaced to the user
#[derive(Debug, Clone)]
pub struct Notification {
    pub level: NotificationLevel,
    pub title: String,
    pub message: String,
    pub created: Instant,
}

impl Notification {
    fn new(level: NotificationLevel, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            title: title.into(),
            message: message.into(),
            created: Instant::now(),
        }
    }

    /// Errors stay until dismissed; everything else fades.
    pub fn is_sticky(&self) -> bool {
        self.level == NotificationLevel::Error
    }
}

/// Modal prompt waiting on the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dialog {
    /// Logical delete awaiting confirmation
    ConfirmDelete { id: i64 },
    /// Physical delete awaiting confirmation
    ConfirmPurge { id: i64 },
    /// A logical delete failed; confirming retries it
    RetryDelete { id: i64, reason: String },
    /// Editing the question of a stored conversation
    EditQuestion {
        id: i64,
        original: String,
        input: String,
        validation: Option<String>,
    },
}

impl Dialog {
    /// Conversation the dialog acts on
    pub fn id(&self) -> i64 {
        match self {
            Dialog::ConfirmDelete { id }
            | Dialog::ConfirmPurge { id }
            | Dialog::RetryDelete { id, .. }
            | Dialog::EditQuestion { id, .. } => *id,
        }
    }
}

/// Why an edit was not submitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EditRejection {
    #[error("The message cannot be empty")]
    Empty,
    #[error("The message has not changed")]
    Unchanged,
}

/// Check an edited question against the original; returns the text to send.
pub fn validate_edit(original: &str, edited: &str) -> Result<String, EditRejection> {
    let edited = edited.trim();
    if edited.is_empty() {
        return Err(EditRejection::Empty);
    }
    if edited == original {
        return Err(EditRejection::Unchanged);
    }
    Ok(edited.to_string())
}

pub struct ConversationController {
    backend: Backend,
    gateway: Arc<dyn ConversationApi>,
    reply_tx: mpsc::UnboundedSender<GatewayReply>,
    reply_rx: mpsc::UnboundedReceiver<GatewayReply>,
    conversations: Vec<ConversationRecord>,
    messages: Vec<DisplayMessage>,
    draft: String,
    send_state: SendState,
    selected_id: Option<i64>,
    error: Option<String>,
    notifications: VecDeque<Notification>,
    dialog: Option<Dialog>,
    scroll_requested: bool,
    pending: usize,
    list_seq: u64,
    applied_list_seq: u64,
    /// Bumped whenever the open thread is replaced
    thread_generation: u64,
    torn_down: bool,
}

impl ConversationController {
    pub fn new(backend: Backend, gateway: Arc<dyn ConversationApi>) -> Self {
        let (reply_tx, reply_rx) = mpsc::unbounded_channel();

        Self {
            backend,
            gateway,
            reply_tx,
            reply_rx,
            conversations: Vec::new(),
            messages: Vec::new(),
            draft: String::new(),
            send_state: SendState::Idle,
            selected_id: None,
            error: None,
            notifications: VecDeque::new(),
            dialog: None,
            scroll_requested: false,
            pending: 0,
            list_seq: 0,
            applied_list_seq: 0,
            thread_generation: 0,
            torn_down: false,
        }
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    /// Visible history: active records, oldest first.
    pub fn conversations(&self) -> &[ConversationRecord] {
        &self.conversations
    }

    pub fn messages(&self) -> &[DisplayMessage] {
        &self.messages
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn set_draft(&mut self, draft: impl Into<String>) {
        self.draft = draft.into();
    }

    pub fn send_state(&self) -> SendState {
        self.send_state
    }

    pub fn is_loading(&self) -> bool {
        self.send_state == SendState::Sending
    }

    pub fn selected_id(&self) -> Option<i64> {
        self.selected_id
    }

    pub fn selected_record(&self) -> Option<&ConversationRecord> {
        self.selected_id.and_then(|id| self.record(id))
    }

    pub fn record(&self, id: i64) -> Option<&ConversationRecord> {
        self.conversations.iter().find(|record| record.id == id)
    }

    /// Inline error of the last failed operation.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    pub fn notifications(&self) -> impl Iterator<Item = &Notification> {
        self.notifications.iter()
    }

    pub fn dismiss_notification(&mut self) -> Option<Notification> {
        self.notifications.pop_front()
    }

    /// Surface a hint that does not come from a gateway call.
    pub fn inform(&mut self, title: &str, message: impl Into<String>) {
        self.notify(NotificationLevel::Info, title, message);
    }

    /// Drop non-error notifications older than `ttl`.
    pub fn prune_notifications(&mut self, ttl: Duration) {
        self.notifications
            .retain(|n| n.is_sticky() || n.created.elapsed() < ttl);
    }

    pub fn dialog(&self) -> Option<&Dialog> {
        self.dialog.as_ref()
    }

    /// Text being edited in an open edit dialog.
    pub fn edit_input_mut(&mut self) -> Option<&mut String> {
        match self.dialog.as_mut() {
            Some(Dialog::EditQuestion { input, .. }) => Some(input),
            _ => None,
        }
    }

    /// Whether the thread should be scrolled to the bottom; clears the request.
    pub fn take_scroll_request(&mut self) -> bool {
        std::mem::take(&mut self.scroll_requested)
    }

    /// Gateway calls issued but not yet applied.
    pub fn pending_requests(&self) -> usize {
        self.pending
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Reload the history from the server.
    pub fn load_history(&mut self) {
        self.list_seq += 1;
        let seq = self.list_seq;
        let gateway = Arc::clone(&self.gateway);
        self.dispatch(async move {
            GatewayReply::Listed {
                seq,
                result: gateway.list().await,
            }
        });
    }

    /// Open a conversation from the visible history.
    pub fn select_conversation(&mut self, id: i64) -> bool {
        match self.record(id).cloned() {
            Some(record) => {
                self.open_record(&record);
                true
            }
            None => false,
        }
    }

    /// Fetch one conversation by id and open it.
    pub fn find_conversation(&mut self, id: i64) {
        let gateway = Arc::clone(&self.gateway);
        self.dispatch(async move {
            GatewayReply::Found {
                id,
                result: gateway.find_by_id(id).await,
            }
        });
    }

    pub fn start_new_conversation(&mut self) {
        self.thread_generation += 1;
        self.selected_id = None;
        self.messages.clear();
        self.draft.clear();
        if !self.is_loading() {
            self.send_state = SendState::Idle;
        }
    }

    /// Fill the draft with one of the welcome-screen prompts.
    pub fn use_suggestion(&mut self, index: usize) -> bool {
        match SUGGESTIONS.get(index) {
            Some(suggestion) => {
                self.draft = suggestion.prompt.to_string();
                true
            }
            None => false,
        }
    }

    /// Send the draft. Returns false without touching the network when the draft
    /// is blank or a send is already in flight.
    pub fn send_message(&mut self) -> bool {
        let text = self.draft.trim().to_string();
        if text.is_empty() || self.is_loading() || self.torn_down {
            return false;
        }

        self.draft.clear();
        self.error = None;
        self.messages.push(DisplayMessage::user(text.clone()));
        self.send_state = SendState::Sending;
        self.scroll_requested = true;
        info!(backend = self.backend.route(), chars = text.chars().count(), "sending message");

        let thread = self.thread_generation;
        let gateway = Arc::clone(&self.gateway);
        self.dispatch(async move {
            GatewayReply::Asked {
                thread,
                result: gateway.ask(&text).await,
            }
        });
        true
    }

    /// Ask for confirmation before logically deleting `id`.
    pub fn request_delete(&mut self, id: i64) -> bool {
        if self.record(id).is_none() {
            return false;
        }
        self.dialog = Some(Dialog::ConfirmDelete { id });
        true
    }

    /// Ask for confirmation before physically deleting `id`. The id need not be
    /// visible: logically deleted records can be purged too.
    pub fn request_purge(&mut self, id: i64) {
        self.dialog = Some(Dialog::ConfirmPurge { id });
    }

    /// Open the edit dialog for `id`, pre-filled with its current question.
    pub fn request_edit(&mut self, id: i64) -> bool {
        let Some(record) = self.record(id) else {
            return false;
        };
        let original = record.message.clone();
        self.dialog = Some(Dialog::EditQuestion {
            id,
            input: original.clone(),
            original,
            validation: None,
        });
        true
    }

    /// Accept the open dialog. An edit that fails validation keeps the dialog open.
    pub fn confirm_dialog(&mut self) {
        let Some(dialog) = self.dialog.take() else {
            return;
        };

        match dialog {
            Dialog::ConfirmDelete { id } | Dialog::RetryDelete { id, .. } => {
                self.delete_conversation(id)
            }
            Dialog::ConfirmPurge { id } => self.purge_conversation(id),
            Dialog::EditQuestion {
                id,
                original,
                input,
                ..
            } => match validate_edit(&original, &input) {
                Ok(question) => self.update_question(id, question),
                Err(rejection) => {
                    self.dialog = Some(Dialog::EditQuestion {
                        id,
                        original,
                        input,
                        validation: Some(rejection.to_string()),
                    });
                }
            },
        }
    }

    pub fn cancel_dialog(&mut self) {
        self.dialog = None;
    }

    /// Logical delete, without confirmation.
    pub fn delete_conversation(&mut self, id: i64) {
        let gateway = Arc::clone(&self.gateway);
        self.dispatch(async move {
            GatewayReply::Deleted {
                id,
                physical: false,
                result: gateway.delete_logical(id).await,
            }
        });
    }

    /// Physical delete, without confirmation.
    pub fn purge_conversation(&mut self, id: i64) {
        let gateway = Arc::clone(&self.gateway);
        self.dispatch(async move {
            GatewayReply::Deleted {
                id,
                physical: true,
                result: gateway.delete_physical(id).await,
            }
        });
    }

    pub fn restore_conversation(&mut self, id: i64) {
        let gateway = Arc::clone(&self.gateway);
        self.dispatch(async move {
            GatewayReply::Restored {
                id,
                result: gateway.restore(id).await,
            }
        });
    }

    /// Replace the question of `id` with already validated text.
    pub fn update_question(&mut self, id: i64, question: String) {
        let gateway = Arc::clone(&self.gateway);
        self.dispatch(async move {
            let result = gateway.update_question(id, &question).await;
            GatewayReply::Updated {
                id,
                question,
                result,
            }
        });
    }

    /// Ask the backend again with the stored question unchanged. Works on the
    /// open thread too when its record is not in the visible history.
    pub fn regenerate(&mut self, id: i64) -> bool {
        let question = self
            .record(id)
            .map(|record| record.message.clone())
            .or_else(|| self.open_question(id));
        let Some(question) = question else {
            return false;
        };
        self.update_question(id, question);
        true
    }

    /// Stop routing replies into this controller. Calls still in flight complete
    /// but their results are dropped.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        debug!(backend = self.backend.route(), pending = self.pending, "tearing down controller");
        self.torn_down = true;
        self.reply_rx.close();
        self.pending = 0;
    }

    /// Apply every reply that has arrived. Never blocks.
    pub fn process_replies(&mut self) -> usize {
        if self.torn_down {
            return 0;
        }

        let mut applied = 0;
        while let Ok(reply) = self.reply_rx.try_recv() {
            self.apply_reply(reply);
            applied += 1;
        }
        applied
    }

    /// Wait until every issued call, including the reloads they trigger, has
    /// been applied.
    pub async fn wait_idle(&mut self) {
        while self.pending > 0 && !self.torn_down {
            match self.reply_rx.recv().await {
                Some(reply) => self.apply_reply(reply),
                None => break,
            }
        }
    }

    fn dispatch<F>(&mut self, call: F)
    where
        F: Future<Output = GatewayReply> + Send + 'static,
    {
        if self.torn_down {
            return;
        }

        self.pending += 1;
        let tx = self.reply_tx.clone();
        tokio::spawn(async move {
            // Receiver is gone once the controller is torn down.
            let _ = tx.send(call.await);
        });
    }

    /// User message of the open thread, when that thread is `id`.
    fn open_question(&self, id: i64) -> Option<String> {
        if self.selected_id != Some(id) {
            return None;
        }
        self.messages
            .iter()
            .find(|m| m.is_user() && m.conversation_id == Some(id))
            .map(|m| m.content.clone())
    }

    fn open_record(&mut self, record: &ConversationRecord) {
        self.thread_generation += 1;
        self.selected_id = Some(record.id);
        self.messages = DisplayMessage::pair_from_record(record).to_vec();
        self.scroll_requested = true;
    }

    fn notify(&mut self, level: NotificationLevel, title: &str, message: impl Into<String>) {
        self.notifications
            .push_back(Notification::new(level, title, message));
    }

    fn report(&mut self, title: &str, err: &GatewayError) {
        warn!(backend = self.backend.route(), status = ?err.status, error = %err, "{}", title);
        self.error = Some(title.to_string());
        self.notify(NotificationLevel::Error, title, err.describe());
    }

    fn apply_reply(&mut self, reply: GatewayReply) {
        self.pending = self.pending.saturating_sub(1);

        match reply {
            GatewayReply::Asked { thread, result } => {
                // The user may have opened another thread meanwhile.
                let same_thread = thread == self.thread_generation;
                if !same_thread {
                    debug!(thread, current = self.thread_generation, "reply for a closed thread");
                }
                match result {
                    Ok(answer) => {
                        if same_thread {
                            self.messages.push(DisplayMessage::assistant(answer));
                            self.scroll_requested = true;
                        }
                        self.send_state = SendState::Succeeded;
                        self.load_history();
                    }
                    Err(err) => {
                        if same_thread {
                            self.messages.push(DisplayMessage::assistant(APOLOGY_MESSAGE));
                            self.scroll_requested = true;
                        }
                        self.send_state = SendState::Failed;
                        self.report("Could not send the message", &err);
                    }
                }
            }
            GatewayReply::Listed { seq, result } => {
                if seq <= self.applied_list_seq {
                    debug!(seq, latest = self.applied_list_seq, "dropping stale history reply");
                    return;
                }
                self.applied_list_seq = seq;
                match result {
                    Ok(records) => {
                        self.conversations = visible_history(records);
                        self.scroll_requested = true;
                        debug!(count = self.conversations.len(), "history reloaded");
                    }
                    Err(err) => self.report("Could not load conversations", &err),
                }
            }
            GatewayReply::Found { id, result } => match result {
                Ok(record) => self.open_record(&record),
                Err(err) => self.report(&format!("Could not find conversation #{}", id), &err),
            },
            GatewayReply::Deleted {
                id,
                physical,
                result,
            } => match result {
                Ok(()) => {
                    info!(backend = self.backend.route(), id, physical, "conversation deleted");
                    self.conversations.retain(|record| record.id != id);
                    if self.selected_id == Some(id) {
                        self.start_new_conversation();
                    }
                    let message = if physical {
                        "The conversation was permanently deleted"
                    } else {
                        "The conversation no longer appears in your history"
                    };
                    self.notify(NotificationLevel::Success, "Deleted", message);
                    self.load_history();
                }
                Err(err) => {
                    self.report("Could not delete the conversation", &err);
                    if !physical && self.dialog.is_none() {
                        self.dialog = Some(Dialog::RetryDelete {
                            id,
                            reason: err.describe(),
                        });
                    }
                }
            },
            GatewayReply::Restored { id, result } => match result {
                Ok(()) => {
                    info!(backend = self.backend.route(), id, "conversation restored");
                    self.notify(
                        NotificationLevel::Success,
                        "Restored",
                        format!("Conversation #{} is back in your history", id),
                    );
                    self.load_history();
                }
                Err(err) => self.report("Could not restore the conversation", &err),
            },
            GatewayReply::Updated {
                id,
                question,
                result,
            } => match result {
                Ok(answer) => {
                    self.apply_update(id, &question, &answer);
                    self.notify(
                        NotificationLevel::Success,
                        "Updated",
                        "The message was updated",
                    );
                    self.load_history();
                }
                Err(err) => self.report("Could not update the message", &err),
            },
        }
    }

    fn apply_update(&mut self, id: i64, question: &str, answer: &str) {
        if let Some(record) = self.conversations.iter_mut().find(|r| r.id == id) {
            record.message = question.to_string();
            record.response = answer.to_string();
        }

        if self.selected_id != Some(id) {
            return;
        }

        let Some(index) = self
            .messages
            .iter()
            .position(|m| m.is_user() && m.conversation_id == Some(id))
        else {
            return;
        };

        self.messages[index].content = question.to_string();
        if let Some(reply) = self.messages.get_mut(index + 1).filter(|m| !m.is_user()) {
            reply.content = answer.to_string();
        }
    }
}

impl Drop for ConversationController {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ACTIVE_STATUS;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// In-memory backend that records every call.
    #[derive(Default)]
    struct FakeApi {
        records: Mutex<Vec<ConversationRecord>>,
        calls: Mutex<Vec<String>>,
        fail_ask: AtomicBool,
        fail_delete: AtomicBool,
        fail_list: AtomicBool,
    }

    impl FakeApi {
        fn with_records(records: Vec<ConversationRecord>) -> Arc<Self> {
            Arc::new(Self {
                records: Mutex::new(records),
                ..Default::default()
            })
        }

        fn log(&self, call: impl Into<String>) {
            self.calls.lock().unwrap().push(call.into());
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn count(&self, prefix: &str) -> usize {
            self.calls().iter().filter(|c| c.starts_with(prefix)).count()
        }

        fn failure() -> GatewayError {
            GatewayError::new(Some(500), "Internal Server Error")
        }
    }

    #[async_trait]
    impl ConversationApi for FakeApi {
        async fn ask(&self, message: &str) -> Result<String, GatewayError> {
            self.log(format!("ask:{}", message));
            if self.fail_ask.load(Ordering::SeqCst) {
                return Err(GatewayError::new(None, "connection refused"));
            }
            let mut records = self.records.lock().unwrap();
            let id = records.iter().map(|r| r.id).max().unwrap_or(0) + 1;
            records.push(record(id, ACTIVE_STATUS, "2024-06-01 12:00:00"));
            Ok(format!("echo: {}", message))
        }

        async fn list(&self) -> Result<Vec<ConversationRecord>, GatewayError> {
            self.log("list");
            if self.fail_list.load(Ordering::SeqCst) {
                return Err(Self::failure());
            }
            Ok(self.records.lock().unwrap().clone())
        }

        async fn find_by_id(&self, id: i64) -> Result<ConversationRecord, GatewayError> {
            self.log(format!("find:{}", id));
            self.records
                .lock()
                .unwrap()
                .iter()
                .find(|r| r.id == id)
                .cloned()
                .ok_or_else(|| GatewayError::new(Some(404), "Not Found"))
        }

        async fn delete_physical(&self, id: i64) -> Result<(), GatewayError> {
            self.log(format!("purge:{}", id));
            self.records.lock().unwrap().retain(|r| r.id != id);
            Ok(())
        }

        async fn delete_logical(&self, id: i64) -> Result<(), GatewayError> {
            self.log(format!("delete:{}", id));
            if self.fail_delete.load(Ordering::SeqCst) {
                return Err(Self::failure());
            }
            for r in self.records.lock().unwrap().iter_mut().filter(|r| r.id == id) {
                r.status = "I".to_string();
            }
            Ok(())
        }

        async fn restore(&self, id: i64) -> Result<(), GatewayError> {
            self.log(format!("restore:{}", id));
            for r in self.records.lock().unwrap().iter_mut().filter(|r| r.id == id) {
                r.status = ACTIVE_STATUS.to_string();
            }
            Ok(())
        }

        async fn update_question(&self, id: i64, message: &str) -> Result<String, GatewayError> {
            self.log(format!("update:{}:{}", id, message));
            let answer = format!("new answer to {}", message);
            for r in self.records.lock().unwrap().iter_mut().filter(|r| r.id == id) {
                r.message = message.to_string();
                r.response = answer.clone();
            }
            Ok(answer)
        }
    }

    fn record(id: i64, status: &str, created_at: &str) -> ConversationRecord {
        ConversationRecord {
            id,
            message: format!("question {}", id),
            response: format!("answer {}", id),
            status: status.to_string(),
            created_at: created_at.to_string(),
        }
    }

    fn seeded() -> Arc<FakeApi> {
        FakeApi::with_records(vec![
            record(1, "A", "2024-05-03 09:00:00"),
            record(2, "A", "2024-05-01 09:00:00"),
            record(3, "I", "2024-05-02 09:00:00"),
            record(4, "A", "2024-05-02 09:00:00"),
        ])
    }

    async fn loaded(api: &Arc<FakeApi>) -> ConversationController {
        let mut controller = ConversationController::new(Backend::Gemini, api.clone());
        controller.load_history();
        controller.wait_idle().await;
        controller
    }

    fn ids(controller: &ConversationController) -> Vec<i64> {
        controller.conversations().iter().map(|r| r.id).collect()
    }

    #[tokio::test]
    async fn test_load_history_hides_deleted_and_sorts() {
        let api = seeded();
        let controller = loaded(&api).await;

        assert_eq!(ids(&controller), vec![2, 4, 1]);
        assert!(controller.conversations().iter().all(|r| r.is_active()));
    }

    #[tokio::test]
    async fn test_failed_reload_keeps_previous_history() {
        let api = seeded();
        let mut controller = loaded(&api).await;

        api.fail_list.store(true, Ordering::SeqCst);
        controller.load_history();
        controller.wait_idle().await;

        assert_eq!(ids(&controller), vec![2, 4, 1]);
        assert_eq!(controller.error(), Some("Could not load conversations"));
        let notification = controller.notifications().next().unwrap();
        assert_eq!(notification.level, NotificationLevel::Error);
        assert_eq!(notification.message, "HTTP 500: Internal Server Error");
    }

    #[tokio::test]
    async fn test_blank_draft_is_not_sent() {
        let api = seeded();
        let mut controller = ConversationController::new(Backend::Gemini, api.clone());

        controller.set_draft("   \n\t ");
        assert!(!controller.send_message());
        controller.set_draft("");
        assert!(!controller.send_message());
        controller.wait_idle().await;

        assert!(api.calls().is_empty());
        assert!(controller.messages().is_empty());
        assert_eq!(controller.send_state(), SendState::Idle);
    }

    #[tokio::test]
    async fn test_second_send_while_in_flight_is_ignored() {
        let api = seeded();
        let mut controller = ConversationController::new(Backend::ChatGpt, api.clone());

        controller.set_draft("first");
        assert!(controller.send_message());
        assert!(controller.is_loading());

        controller.set_draft("second");
        assert!(!controller.send_message());
        assert_eq!(controller.draft(), "second");

        controller.wait_idle().await;
        assert_eq!(api.count("ask:"), 1);
        assert_eq!(api.calls()[0], "ask:first");
    }

    #[tokio::test]
    async fn test_send_success_appends_reply_and_reloads() {
        let api = seeded();
        let mut controller = loaded(&api).await;

        controller.set_draft("  hello there  ");
        assert!(controller.send_message());
        assert_eq!(controller.draft(), "");
        assert_eq!(controller.messages().len(), 1);
        assert!(controller.messages()[0].is_user());
        assert_eq!(controller.messages()[0].content, "hello there");

        controller.wait_idle().await;

        let contents: Vec<&str> = controller.messages().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["hello there", "echo: hello there"]);
        assert_eq!(controller.send_state(), SendState::Succeeded);
        assert_eq!(api.count("list"), 2);
        assert_eq!(ids(&controller), vec![2, 4, 1, 5]);
        assert!(controller.take_scroll_request());
        assert!(!controller.take_scroll_request());
    }

    #[tokio::test]
    async fn test_send_failure_keeps_user_message_and_apologizes() {
        let api = seeded();
        api.fail_ask.store(true, Ordering::SeqCst);
        let mut controller = ConversationController::new(Backend::Gemini, api.clone());

        controller.set_draft("will fail");
        controller.send_message();
        controller.wait_idle().await;

        assert_eq!(controller.messages().len(), 2);
        assert_eq!(controller.messages()[0].content, "will fail");
        assert_eq!(controller.messages()[1].content, APOLOGY_MESSAGE);
        assert_eq!(controller.send_state(), SendState::Failed);
        assert_eq!(controller.error(), Some("Could not send the message"));
        assert_eq!(api.count("list"), 0);

        // Failure is recoverable: the next send goes out.
        api.fail_ask.store(false, Ordering::SeqCst);
        controller.set_draft("retry");
        assert!(controller.send_message());
        controller.wait_idle().await;
        assert_eq!(controller.send_state(), SendState::Succeeded);
        assert_eq!(controller.error(), None);
    }

    #[tokio::test]
    async fn test_delete_selected_conversation() {
        let api = seeded();
        let mut controller = loaded(&api).await;
        assert!(controller.select_conversation(4));
        assert_eq!(controller.messages().len(), 2);

        assert!(controller.request_delete(4));
        assert_eq!(controller.dialog(), Some(&Dialog::ConfirmDelete { id: 4 }));
        controller.confirm_dialog();
        assert!(controller.dialog().is_none());
        controller.wait_idle().await;

        assert_eq!(ids(&controller), vec![2, 1]);
        assert_eq!(controller.selected_id(), None);
        assert!(controller.messages().is_empty());
        assert_eq!(api.count("delete:4"), 1);
        assert_eq!(
            controller.notifications().last().map(|n| n.level),
            Some(NotificationLevel::Success)
        );
    }

    #[tokio::test]
    async fn test_delete_other_conversation_keeps_selection() {
        let api = seeded();
        let mut controller = loaded(&api).await;
        controller.select_conversation(1);

        controller.request_delete(2);
        controller.confirm_dialog();
        controller.wait_idle().await;

        assert_eq!(ids(&controller), vec![4, 1]);
        assert_eq!(controller.selected_id(), Some(1));
        assert_eq!(controller.messages().len(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_delete_sends_nothing() {
        let api = seeded();
        let mut controller = loaded(&api).await;

        controller.request_delete(2);
        controller.cancel_dialog();
        controller.wait_idle().await;

        assert_eq!(api.count("delete:"), 0);
        assert_eq!(ids(&controller), vec![2, 4, 1]);
        assert!(!controller.request_delete(3));
    }

    #[tokio::test]
    async fn test_failed_delete_leaves_state_and_offers_retry() {
        let api = seeded();
        api.fail_delete.store(true, Ordering::SeqCst);
        let mut controller = loaded(&api).await;
        controller.select_conversation(2);

        controller.request_delete(2);
        controller.confirm_dialog();
        controller.wait_idle().await;

        assert_eq!(ids(&controller), vec![2, 4, 1]);
        assert_eq!(controller.selected_id(), Some(2));
        assert_eq!(controller.error(), Some("Could not delete the conversation"));
        assert!(matches!(controller.dialog(), Some(Dialog::RetryDelete { id: 2, .. })));

        api.fail_delete.store(false, Ordering::SeqCst);
        controller.confirm_dialog();
        controller.wait_idle().await;

        assert_eq!(ids(&controller), vec![4, 1]);
        assert_eq!(controller.selected_id(), None);
    }

    #[tokio::test]
    async fn test_purge_and_restore() {
        let api = seeded();
        let mut controller = loaded(&api).await;

        controller.restore_conversation(3);
        controller.wait_idle().await;
        assert_eq!(ids(&controller), vec![2, 3, 4, 1]);

        controller.request_purge(3);
        controller.confirm_dialog();
        controller.wait_idle().await;
        assert_eq!(ids(&controller), vec![2, 4, 1]);
        assert_eq!(api.count("purge:3"), 1);
        assert!(api.records.lock().unwrap().iter().all(|r| r.id != 3));
    }

    #[test]
    fn test_validate_edit() {
        assert_eq!(validate_edit("old", ""), Err(EditRejection::Empty));
        assert_eq!(validate_edit("old", "  \n"), Err(EditRejection::Empty));
        assert_eq!(validate_edit("old", " old "), Err(EditRejection::Unchanged));
        assert_eq!(validate_edit("old", " new "), Ok("new".to_string()));
    }

    #[tokio::test]
    async fn test_edit_rejects_invalid_text() {
        let api = seeded();
        let mut controller = loaded(&api).await;

        assert!(controller.request_edit(2));
        controller.confirm_dialog();
        match controller.dialog() {
            Some(Dialog::EditQuestion { validation, .. }) => {
                assert_eq!(validation.as_deref(), Some("The message has not changed"));
            }
            other => panic!("expected edit dialog, got {:?}", other),
        }

        controller.edit_input_mut().unwrap().clear();
        controller.confirm_dialog();
        match controller.dialog() {
            Some(Dialog::EditQuestion { validation, .. }) => {
                assert_eq!(validation.as_deref(), Some("The message cannot be empty"));
            }
            other => panic!("expected edit dialog, got {:?}", other),
        }

        controller.wait_idle().await;
        assert_eq!(api.count("update:"), 0);
    }

    #[tokio::test]
    async fn test_edit_updates_open_thread_in_place() {
        let api = seeded();
        let mut controller = loaded(&api).await;
        controller.select_conversation(2);

        controller.request_edit(2);
        *controller.edit_input_mut().unwrap() = "reworded".to_string();
        controller.confirm_dialog();
        assert!(controller.dialog().is_none());
        controller.wait_idle().await;

        assert_eq!(api.count("update:2:reworded"), 1);
        assert_eq!(controller.messages()[0].content, "reworded");
        assert_eq!(controller.messages()[1].content, "new answer to reworded");
        assert_eq!(controller.record(2).unwrap().message, "reworded");
    }

    #[tokio::test]
    async fn test_regenerate_resends_unchanged_question() {
        let api = seeded();
        let mut controller = loaded(&api).await;

        assert!(controller.regenerate(1));
        assert!(!controller.regenerate(99));
        controller.wait_idle().await;

        assert_eq!(api.count("update:1:question 1"), 1);
    }

    #[tokio::test]
    async fn test_regenerate_open_thread_outside_history() {
        let api = seeded();
        let mut controller = loaded(&api).await;

        // #3 is logically deleted, so only reachable by id
        controller.find_conversation(3);
        controller.wait_idle().await;
        assert!(controller.record(3).is_none());

        assert!(controller.regenerate(3));
        controller.wait_idle().await;

        assert_eq!(api.count("update:3:question 3"), 1);
        assert_eq!(controller.messages()[1].content, "new answer to question 3");

        controller.start_new_conversation();
        assert!(!controller.regenerate(3));
    }

    #[tokio::test]
    async fn test_reply_after_navigation_stays_out_of_new_thread() {
        let api = seeded();
        let mut controller = loaded(&api).await;

        controller.set_draft("new question");
        assert!(controller.send_message());
        assert!(controller.select_conversation(2));
        controller.wait_idle().await;

        let contents: Vec<&str> = controller.messages().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["question 2", "answer 2"]);
        assert_eq!(controller.selected_id(), Some(2));
        assert_eq!(controller.send_state(), SendState::Succeeded);
        assert_eq!(ids(&controller), vec![2, 4, 1, 5]);

        api.fail_ask.store(true, Ordering::SeqCst);
        controller.set_draft("lost");
        assert!(controller.send_message());
        controller.start_new_conversation();
        controller.wait_idle().await;

        assert!(controller.messages().is_empty());
        assert_eq!(controller.send_state(), SendState::Failed);
        assert_eq!(controller.error(), Some("Could not send the message"));
    }

    #[tokio::test]
    async fn test_find_conversation_opens_thread() {
        let api = seeded();
        let mut controller = ConversationController::new(Backend::Gemini, api.clone());

        controller.find_conversation(3);
        controller.wait_idle().await;
        assert_eq!(controller.selected_id(), Some(3));
        assert_eq!(controller.messages()[0].conversation_id, Some(3));

        controller.find_conversation(42);
        controller.wait_idle().await;
        assert_eq!(controller.selected_id(), Some(3));
        assert_eq!(controller.error(), Some("Could not find conversation #42"));
    }

    #[tokio::test]
    async fn test_stale_history_reply_is_dropped() {
        let api = seeded();
        let mut controller = ConversationController::new(Backend::Gemini, api.clone());

        controller.apply_reply(GatewayReply::Listed {
            seq: 2,
            result: Ok(vec![record(7, "A", "2024-05-01 09:00:00")]),
        });
        controller.apply_reply(GatewayReply::Listed {
            seq: 1,
            result: Ok(vec![record(8, "A", "2024-05-01 09:00:00")]),
        });

        assert_eq!(ids(&controller), vec![7]);
    }

    #[tokio::test]
    async fn test_teardown_drops_late_replies() {
        let api = seeded();
        let mut controller = ConversationController::new(Backend::Gemini, api.clone());

        controller.set_draft("hello");
        controller.send_message();
        controller.teardown();

        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        assert_eq!(controller.process_replies(), 0);
        assert_eq!(controller.messages().len(), 1);
        assert!(controller.is_torn_down());

        controller.set_draft("after");
        assert!(!controller.send_message());
    }

    #[tokio::test]
    async fn test_suggestions_fill_draft() {
        let api = seeded();
        let mut controller = ConversationController::new(Backend::Gemini, api);

        assert!(controller.use_suggestion(1));
        assert_eq!(controller.draft(), SUGGESTIONS[1].prompt);
        assert!(!controller.use_suggestion(SUGGESTIONS.len()));
    }

    #[tokio::test]
    async fn test_notifications_expire_except_errors() {
        let api = seeded();
        let mut controller = ConversationController::new(Backend::Gemini, api);

        controller.notify(NotificationLevel::Success, "Deleted", "gone");
        controller.notify(NotificationLevel::Error, "Oops", "bad");
        controller.prune_notifications(Duration::ZERO);

        let left: Vec<NotificationLevel> = controller.notifications().map(|n| n.level).collect();
        assert_eq!(left, vec![NotificationLevel::Error]);
        assert!(controller.dismiss_notification().is_some());
        assert!(controller.dismiss_notification().is_none());
    }
}
