//! One-shot command line handlers

use anyhow::{anyhow, Context, Result};
use std::io::{self, Write};

use crate::controller::validate_edit;
use crate::events::Backend;
use crate::format::{format_date, format_time, preview_line, time_ago};
use crate::gateway::{ConversationApi, GatewayError};
use crate::model::{sort_by_creation, visible_history, ConversationRecord};

fn gateway_failure(err: GatewayError) -> anyhow::Error {
    anyhow!(err.describe())
}

/// One line of `yenni list`
pub fn history_line(record: &ConversationRecord, preview_chars: usize) -> String {
    let marker = if record.is_active() { "" } else { " [deleted]" };
    format!(
        "  #{:<5} {} {}  {}{}",
        record.id,
        format_date(&record.created_at),
        format_time(&record.created_at),
        preview_line(&record.message, preview_chars),
        marker
    )
}

/// Full question and answer of one conversation
pub fn conversation_details(record: &ConversationRecord) -> String {
    let status = if record.is_active() { "active" } else { "deleted" };
    format!(
        "💬 Conversation #{} ({}, {})\n🕒 {} {}\n\n👤 {}\n\n🤖 {}",
        record.id,
        status,
        time_ago(&record.created_at),
        format_date(&record.created_at),
        format_time(&record.created_at),
        record.message,
        record.response
    )
}

pub async fn ask(gateway: &dyn ConversationApi, backend: Backend, message: &str) -> Result<()> {
    let message = message.trim();
    if message.is_empty() {
        println!("❌ Nothing to send.");
        return Ok(());
    }

    let reply = gateway
        .ask(message)
        .await
        .map_err(gateway_failure)
        .with_context(|| format!("{} could not answer", backend.display_name()))?;

    println!("{} {}", backend.icon(), reply);
    Ok(())
}

pub async fn list(
    gateway: &dyn ConversationApi,
    backend: Backend,
    all: bool,
    preview_chars: usize,
) -> Result<()> {
    let records = gateway
        .list()
        .await
        .map_err(gateway_failure)
        .context("Failed to load conversations")?;

    let records = if all {
        let mut records = records;
        sort_by_creation(&mut records);
        records
    } else {
        visible_history(records)
    };

    if records.is_empty() {
        println!("📭 No conversations yet. Run 'yenni' to start one!");
        return Ok(());
    }

    println!("{} {} conversations ({}):", backend.icon(), backend.display_name(), records.len());
    println!("{}", "=".repeat(50));
    for record in &records {
        println!("{}", history_line(record, preview_chars));
    }

    Ok(())
}

pub async fn show(gateway: &dyn ConversationApi, id: i64) -> Result<()> {
    let record = gateway
        .find_by_id(id)
        .await
        .map_err(gateway_failure)
        .with_context(|| format!("Could not find conversation #{}", id))?;

    println!("{}", conversation_details(&record));
    Ok(())
}

pub async fn delete(gateway: &dyn ConversationApi, id: i64) -> Result<()> {
    gateway
        .delete_logical(id)
        .await
        .map_err(gateway_failure)
        .with_context(|| format!("Could not delete conversation #{}", id))?;

    println!("🗑️ Conversation #{} no longer appears in your history.", id);
    println!("Run 'yenni restore {}' to bring it back.", id);
    Ok(())
}

pub async fn purge(gateway: &dyn ConversationApi, id: i64, yes: bool) -> Result<()> {
    if !yes && !confirm(&format!("⚠️ Permanently delete conversation #{}? This cannot be undone. [y/N] ", id))? {
        println!("👋 Nothing was deleted.");
        return Ok(());
    }

    gateway
        .delete_physical(id)
        .await
        .map_err(gateway_failure)
        .with_context(|| format!("Could not delete conversation #{}", id))?;

    println!("✅ Conversation #{} was permanently deleted.", id);
    Ok(())
}

pub async fn restore(gateway: &dyn ConversationApi, id: i64) -> Result<()> {
    gateway
        .restore(id)
        .await
        .map_err(gateway_failure)
        .with_context(|| format!("Could not restore conversation #{}", id))?;

    println!("✅ Conversation #{} is back in your history.", id);
    Ok(())
}

pub async fn edit(
    gateway: &dyn ConversationApi,
    backend: Backend,
    id: i64,
    message: &str,
) -> Result<()> {
    let record = gateway
        .find_by_id(id)
        .await
        .map_err(gateway_failure)
        .with_context(|| format!("Could not find conversation #{}", id))?;

    let question = validate_edit(&record.message, message)
        .with_context(|| format!("Conversation #{} was not updated", id))?;

    let reply = gateway
        .update_question(id, &question)
        .await
        .map_err(gateway_failure)
        .with_context(|| format!("Could not update conversation #{}", id))?;

    println!("✏️ Updated conversation #{}", id);
    println!();
    println!("👤 {}", question);
    println!();
    println!("{} {}", backend.icon(), reply);
    Ok(())
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{}", prompt);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin()
        .read_line(&mut input)
        .context("Failed to read confirmation")?;

    Ok(matches!(input.trim().to_lowercase().as_str(), "y" | "yes"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(status: &str) -> ConversationRecord {
        ConversationRecord {
            id: 12,
            message: "How do lifetimes work in practice?\nWith examples please".to_string(),
            response: "They describe how long references stay valid.".to_string(),
            status: status.to_string(),
            created_at: "2024-05-01 10:30:00".to_string(),
        }
    }

    #[test]
    fn test_history_line_previews_whole_message() {
        let line = history_line(&record("A"), 10);
        assert!(line.contains("#12"));
        assert!(line.contains("01/05/2024 10:30"));
        assert!(line.contains("How do lif..."));
        assert!(!line.contains("[deleted]"));

        // first line fits the budget, the rest of the message does not
        let mut long = record("A");
        long.message = format!("I need help with this code:\n{}", "x".repeat(200));
        let line = history_line(&long, 50);
        assert!(line.ends_with(&format!("I need help with this code: {}...", "x".repeat(22))));
        assert!(!line.contains('\n'));
    }

    #[test]
    fn test_history_line_marks_deleted() {
        assert!(history_line(&record("I"), 50).ends_with("[deleted]"));
    }

    #[test]
    fn test_conversation_details() {
        let details = conversation_details(&record("I"));
        assert!(details.starts_with("💬 Conversation #12 (deleted, "));
        assert!(details.contains("With examples please"));
        assert!(details.contains("🤖 They describe"));
    }
}
