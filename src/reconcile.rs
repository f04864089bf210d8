//! Turns the flat request/response log into ordered conversation threads.
//!
//! Everything in this module is synchronous and pure: the caller owns the
//! entry list and the active id, fetches and persists them elsewhere, and
//! rebuilds the derived state through these functions whenever either
//! changes. Threads are always rebuilt in full, never patched in place.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

use crate::models::{ActiveSelection, Conversation, LogEntry, Message, MessageRole};

/// Max chars of the first user input used as a thread title.
const TITLE_MAX_CHARS: usize = 50;

/// Derives a thread title from the first user input of the conversation:
/// the first 50 characters, with `"..."` appended when truncated.
pub fn conversation_title(input: &str) -> String {
    let mut chars = input.chars();
    let head: String = chars.by_ref().take(TITLE_MAX_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

/// Groups a flat, unordered entry list into conversation threads.
///
/// - Entries sharing an id are deduplicated: the later occurrence in input
///   order wins, both for content and for its position in the grouping.
/// - Entries without a `conversation_id` cannot be grouped and are dropped.
/// - Within a thread, entries keep the order the store emitted them in; each
///   entry contributes its user message immediately followed by its model
///   message.
/// - The result is sorted by last-activity time descending. The sort is
///   stable, so threads with equal timestamps keep first-seen order.
///
/// Malformed input degrades by exclusion; this function never fails.
pub fn reconcile(entries: &[LogEntry]) -> Vec<Conversation> {
    let mut seen = HashSet::new();
    let mut deduped: Vec<&LogEntry> = entries
        .iter()
        .rev()
        .filter(|e| seen.insert(e.id))
        .collect();
    deduped.reverse();

    let mut order: Vec<&str> = Vec::new();
    let mut groups: HashMap<&str, Conversation> = HashMap::new();

    for entry in deduped {
        let Some(conversation_id) = entry.conversation_id.as_deref() else {
            continue;
        };

        let conversation = groups.entry(conversation_id).or_insert_with(|| {
            order.push(conversation_id);
            Conversation {
                id: conversation_id.to_string(),
                title: conversation_title(&entry.input),
                messages: Vec::new(),
                timestamp: entry.timestamp,
                source_ids: Vec::new(),
            }
        });

        conversation
            .messages
            .push(Message::new(MessageRole::User, &entry.input, entry.timestamp));
        conversation
            .messages
            .push(Message::new(MessageRole::Model, &entry.response, entry.timestamp));
        conversation.source_ids.push(entry.id);
        if entry.timestamp > conversation.timestamp {
            conversation.timestamp = entry.timestamp;
        }
    }

    let mut conversations: Vec<Conversation> = order
        .into_iter()
        .filter_map(|id| groups.remove(id))
        .collect();
    conversations.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    conversations
}

/// Resolves which conversation to present given the id remembered by the
/// session cache. A stale or missing id falls back to the most recently
/// active thread, and an empty set to the empty selection.
pub fn select_active(
    conversations: &[Conversation],
    last_active_id: Option<&str>,
) -> ActiveSelection {
    if let Some(id) = last_active_id {
        if let Some(index) = conversations.iter().position(|c| c.id == id) {
            return ActiveSelection::Selected { id: id.to_string(), index };
        }
    }
    match conversations.first() {
        Some(first) => ActiveSelection::Selected { id: first.id.clone(), index: 0 },
        None => ActiveSelection::Empty,
    }
}

/// Appends a pending user message before the server has confirmed the turn.
///
/// The targeted conversation is the active one; when no conversation with
/// that id exists (no active conversation, or an id that has not produced a
/// persisted entry yet), a new thread is synthesized — under the active id
/// if one was set, otherwise under `minted_id`. Either way the receiving
/// thread is promoted to the front, keeping the descending order intact.
///
/// The returned [`Message`] is the pending message itself; its id is the
/// correlation id for the in-flight request, so the eventual confirmation
/// or rollback targets exactly this message and not whatever happens to sit
/// last in some list. This function does not roll back on failure — the
/// caller undoes the append by rebuilding from the last known-good entries.
pub fn append_optimistic(
    mut conversations: Vec<Conversation>,
    active_id: Option<&str>,
    minted_id: &str,
    user_text: &str,
    now: DateTime<Utc>,
) -> (Vec<Conversation>, String, Message) {
    let pending = Message::new(MessageRole::User, user_text, now);
    let target_id = active_id.unwrap_or(minted_id);

    match conversations.iter().position(|c| c.id == target_id) {
        Some(index) => {
            let mut conversation = conversations.remove(index);
            conversation.messages.push(pending.clone());
            conversation.timestamp = now;
            conversations.insert(0, conversation);
        }
        None => {
            conversations.insert(
                0,
                Conversation {
                    id: target_id.to_string(),
                    title: conversation_title(user_text),
                    messages: vec![pending.clone()],
                    timestamp: now,
                    source_ids: Vec::new(),
                },
            );
        }
    }

    (conversations, target_id.to_string(), pending)
}

/// Drops a conversation from the set, re-selecting the active id.
///
/// Only called after every entry of the conversation was confirmed deleted
/// against the store; partial deletion never reaches this function. If the
/// removed conversation was active, the new first element of the remaining
/// set becomes active (or none when the set is empty). Removing a
/// non-active conversation leaves the active id alone.
pub fn remove_conversation(
    mut conversations: Vec<Conversation>,
    active_id: Option<&str>,
    id_to_remove: &str,
) -> (Vec<Conversation>, Option<String>) {
    conversations.retain(|c| c.id != id_to_remove);
    let new_active_id = match active_id {
        Some(id) if id == id_to_remove => conversations.first().map(|c| c.id.clone()),
        other => other.map(str::to_string),
    };
    (conversations, new_active_id)
}
