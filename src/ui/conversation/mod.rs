//! Conversation screen: history sidebar, message thread and composer

pub mod commands;
pub mod composer;
pub mod dialog;
pub mod history;
pub mod manager;
pub mod sidebar;

pub use commands::{SlashCommand, ParsedCommand, get_help_text};
pub use composer::{ComposerResult, ConversationComposer};
pub use history::{ThreadScroll, ThreadView};
pub use manager::{ConversationScreen, Focus, ScreenAction};
pub use sidebar::{HistoryCursor, SidebarView};
