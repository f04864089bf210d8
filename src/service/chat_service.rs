use chrono::Utc;
use uuid::Uuid;

use crate::api::HistoryStore;
use crate::errors::AppError;
use crate::models::{ChatOutcome, Conversation, LogEntry, Message, MessageRole};
use crate::reconcile;
use crate::session::SessionCache;

const MAX_MESSAGE_LENGTH: usize = 8000;

/// Owns the client-side chat state: the last known-good entry list, the
/// conversation threads derived from it, and the active conversation id.
///
/// All mutation goes through `&mut self`, which is also the concurrency
/// discipline for sends: a second send cannot start while one is in flight,
/// and each reply is paired with the request whose future produced it, so
/// response arrival order never matters.
pub struct ChatService<H, S> {
    history: H,
    session: S,
    entries: Vec<LogEntry>,
    conversations: Vec<Conversation>,
    active_id: Option<String>,
}

impl<H: HistoryStore, S: SessionCache> ChatService<H, S> {
    pub fn new(history: H, session: S) -> Self {
        Self {
            history,
            session,
            entries: Vec::new(),
            conversations: Vec::new(),
            active_id: None,
        }
    }

    /// Fetches the full history, rebuilds the threads, and restores the
    /// active conversation from the session cache. A remembered id that no
    /// longer matches any thread falls back to the most recent one, and the
    /// resolved id is written back so the cache never stays stale.
    pub async fn load(&mut self) -> Result<(), AppError> {
        let remembered = self.session.active_conversation_id()?;
        self.entries = self.history.fetch_entries().await?;
        self.conversations = reconcile::reconcile(&self.entries);
        self.active_id = reconcile::select_active(&self.conversations, remembered.as_deref())
            .id()
            .map(str::to_string);
        self.persist_active_id()
    }

    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn active_id(&self) -> Option<&str> {
        self.active_id.as_deref()
    }

    pub fn active_conversation(&self) -> Option<&Conversation> {
        let id = self.active_id.as_deref()?;
        self.conversations.iter().find(|c| c.id == id)
    }

    pub fn active_messages(&self) -> &[Message] {
        self.active_conversation()
            .map(|c| c.messages.as_slice())
            .unwrap_or_default()
    }

    /// Activates an existing conversation and remembers it.
    pub fn select(&mut self, id: &str) -> Result<(), AppError> {
        if !self.conversations.iter().any(|c| c.id == id) {
            return Err(AppError::ConversationNotFound { id: id.to_string() });
        }
        self.active_id = Some(id.to_string());
        self.persist_active_id()
    }

    /// Forces the no-conversation state unconditionally and clears the
    /// remembered id. The next send will mint a fresh conversation.
    pub fn new_chat(&mut self) -> Result<(), AppError> {
        self.active_id = None;
        self.persist_active_id()
    }

    /// Sends one user message: optimistic append, server call, then either
    /// confirmation into the entry list or rollback to the last known-good
    /// state. The pending message stays visible while the request runs.
    pub async fn send(&mut self, text: &str) -> Result<ChatOutcome, AppError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AppError::EmptyField { field_name: "message".to_string() });
        }
        if text.len() > MAX_MESSAGE_LENGTH {
            return Err(AppError::FieldTooLong {
                field_name: "message".to_string(),
                max_length: MAX_MESSAGE_LENGTH,
                actual_length: text.len(),
            });
        }

        let minted_id = Uuid::new_v4().to_string();
        let (conversations, active_id, _pending) = reconcile::append_optimistic(
            std::mem::take(&mut self.conversations),
            self.active_id.as_deref(),
            &minted_id,
            text,
            Utc::now(),
        );
        self.conversations = conversations;
        self.active_id = Some(active_id.clone());
        self.persist_active_id()?;

        let outgoing = self
            .conversations
            .first()
            .map(|c| c.messages.clone())
            .unwrap_or_default();

        match self.history.send_chat(&active_id, &outgoing).await {
            Ok(turn) => {
                let reply = Message::new(MessageRole::Model, turn.reply.clone(), Utc::now());
                match turn.entry_id {
                    Some(entry_id) => {
                        // Merge the confirmed turn into the historical record
                        // and rebuild. This is keyed by conversation id, so a
                        // reply landing after the user moved on still ends up
                        // in its own thread, not the currently active one.
                        self.entries.push(LogEntry {
                            id: entry_id,
                            conversation_id: Some(active_id.clone()),
                            input: text.to_string(),
                            response: turn.reply,
                            timestamp: reply.timestamp,
                        });
                        self.conversations = reconcile::reconcile(&self.entries);
                    }
                    None => {
                        // The backend did not say which entry it persisted;
                        // trust the store over a guess.
                        self.entries = self.history.fetch_entries().await?;
                        self.conversations = reconcile::reconcile(&self.entries);
                    }
                }
                self.reselect_active()?;
                Ok(ChatOutcome { conversation_id: active_id, reply })
            }
            Err(e) => {
                // Undo the optimistic append by rebuilding from the last
                // known-good entries, then re-resolve the active id (a
                // conversation minted for this send no longer exists).
                self.conversations = reconcile::reconcile(&self.entries);
                self.reselect_active()?;
                Err(e)
            }
        }
    }

    /// Deletes a conversation: every backing entry is deleted against the
    /// store first, and local state changes only once all of them succeeded.
    /// A failure partway through surfaces as [`AppError::PartialDelete`]
    /// with the ids still to retry, leaving local state untouched.
    pub async fn delete_conversation(&mut self, id: &str) -> Result<(), AppError> {
        let source_ids = self
            .conversations
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.source_ids.clone())
            .ok_or_else(|| AppError::ConversationNotFound { id: id.to_string() })?;

        for (deleted, entry_id) in source_ids.iter().enumerate() {
            if let Err(e) = self.history.delete_entry(*entry_id).await {
                return Err(AppError::PartialDelete {
                    conversation_id: id.to_string(),
                    deleted,
                    remaining: source_ids[deleted..].to_vec(),
                    source: Box::new(e),
                });
            }
        }

        self.entries.retain(|e| !source_ids.contains(&e.id));
        let (conversations, new_active_id) = reconcile::remove_conversation(
            std::mem::take(&mut self.conversations),
            self.active_id.as_deref(),
            id,
        );
        self.conversations = conversations;
        self.active_id = new_active_id;
        self.persist_active_id()
    }

    fn reselect_active(&mut self) -> Result<(), AppError> {
        self.active_id = reconcile::select_active(&self.conversations, self.active_id.as_deref())
            .id()
            .map(str::to_string);
        self.persist_active_id()
    }

    fn persist_active_id(&mut self) -> Result<(), AppError> {
        self.session.set_active_conversation_id(self.active_id.as_deref())
    }
}
