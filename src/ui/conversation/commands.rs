use std::str::FromStr;

use crate::events::Backend;

use strum::{AsRefStr, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

/// Commands that can be invoked by starting a message with a leading slash.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, EnumIter, AsRefStr, IntoStaticStr,
)]
#[strum(serialize_all = "kebab-case")]
pub enum SlashCommand {
    /// Start a fresh conversation
    New,
    /// Open a conversation by id
    Open,
    /// Edit the question of a conversation
    Edit,
    /// Hide a conversation from the history
    Delete,
    /// Permanently remove a conversation
    Purge,
    /// Bring back a deleted conversation
    Restore,
    /// Ask again with the same question
    Regenerate,
    /// Reload the history
    Refresh,
    /// Switch between Gemini and ChatGPT
    Backend,
    /// Use one of the welcome suggestions
    Suggest,
    /// Show help
    Help,
    /// Exit the application
    Bye,
}

pub fn command_entries() -> Vec<CommandEntry> {
    SlashCommand::iter()
        .map(|command| CommandEntry {
            command,
            keyword: command.command(),
            description: command.description(),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub command: SlashCommand,
    pub argument: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandEntry {
    pub command: SlashCommand,
    pub keyword: &'static str,
    pub description: &'static str,
}

impl ParsedCommand {
    pub fn argument(&self) -> Option<&str> {
        self.argument.as_deref()
    }

    /// Leading conversation id, if the argument starts with one (`#12` or `12`).
    pub fn id_argument(&self) -> Option<i64> {
        let first = self.argument()?.split_whitespace().next()?;
        first.trim_start_matches('#').parse().ok()
    }

    /// Argument text after the leading id, or the whole argument when it has none.
    pub fn text_after_id(&self) -> Option<&str> {
        let arg = self.argument()?.trim();
        let rest = if self.id_argument().is_some() {
            arg.split_once(char::is_whitespace).map(|(_, rest)| rest.trim())?
        } else {
            arg
        };
        (!rest.is_empty()).then_some(rest)
    }

    pub fn backend_target(&self) -> Option<Backend> {
        if self.command != SlashCommand::Backend {
            return None;
        }
        let arg = self.argument()?.trim();
        Some(Backend::from_route(arg))
    }

    /// 1-based suggestion number turned into an index.
    pub fn suggestion_index(&self) -> Option<usize> {
        if self.command != SlashCommand::Suggest {
            return None;
        }
        let n: usize = self.argument()?.trim().parse().ok()?;
        n.checked_sub(1)
    }
}

impl SlashCommand {
    /// User-visible description shown in help.
    pub fn description(self) -> &'static str {
        match self {
            SlashCommand::New => "start a new conversation",
            SlashCommand::Open => "open a conversation: /open <id>",
            SlashCommand::Edit => "edit a question: /edit [id] [new text]",
            SlashCommand::Delete => "remove a conversation from the history: /delete [id]",
            SlashCommand::Purge => "permanently delete a conversation: /purge <id>",
            SlashCommand::Restore => "restore a deleted conversation: /restore <id>",
            SlashCommand::Regenerate => "regenerate the answer: /regenerate [id]",
            SlashCommand::Refresh => "reload the conversation history",
            SlashCommand::Backend => "switch backend: /backend <gemini|chatgpt>",
            SlashCommand::Suggest => "use a suggestion: /suggest <1-4>",
            SlashCommand::Help => "show available commands",
            SlashCommand::Bye => "exit the application",
        }
    }

    /// Command string without the leading '/'.
    pub fn command(self) -> &'static str {
        self.into()
    }
}

/// Return all built-in commands in a Vec paired with their command string.
pub fn built_in_slash_commands() -> Vec<(&'static str, SlashCommand)> {
    SlashCommand::iter().map(|c| (c.command(), c)).collect()
}

/// Parse a slash command from user input
pub fn parse_slash_command(input: &str) -> Option<ParsedCommand> {
    let input = input.trim_start();
    if !input.starts_with('/') {
        return None;
    }

    let mut parts = input[1..].split_whitespace();
    let head = parts.next()?;
    let rest: Vec<String> = parts.map(|s| s.to_string()).collect();

    let command = SlashCommand::from_str(head)
        .ok()
        .or_else(|| match head.to_lowercase().as_str() {
            "q" | "quit" | "exit" => Some(SlashCommand::Bye),
            "n" | "clear" => Some(SlashCommand::New),
            "o" | "show" => Some(SlashCommand::Open),
            "rm" | "del" => Some(SlashCommand::Delete),
            "b" | "switch" => Some(SlashCommand::Backend),
            "r" | "reload" => Some(SlashCommand::Refresh),
            _ => None,
        })?;

    let argument = if rest.is_empty() {
        None
    } else {
        Some(rest.join(" "))
    };

    Some(ParsedCommand { command, argument })
}

/// Get help text for all available commands
pub fn get_help_text() -> String {
    let mut help = String::from("Available commands:\n\n");
    for (command_str, command) in built_in_slash_commands() {
        help.push_str(&format!("/{} - {}\n", command_str, command.description()));
    }

    help.push_str("\nAliases: /q for /bye, /n for /new, /o for /open, /rm for /delete, /b for /backend, /r for /refresh");
    help.push_str("\nKeys: Tab switches between composer and history. In the history: Enter opens, d deletes, e edits, g regenerates, n starts a new conversation, b switches backend.");
    help.push_str("\nPageUp/PageDown scroll the thread, Esc closes dialogs, Ctrl+C quits.");

    help
}
