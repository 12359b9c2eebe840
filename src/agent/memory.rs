//! Per-conversation message history, cached in memory and backed by the store.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::warn;

use crate::error::DatabaseError;
use crate::llm::{ChatMessage, Role, ToolCall};
use crate::store::{ConversationMessage, Database, NewConversationMessage};

/// Messages sent to the model per turn, counted from the end of the history.
pub const DEFAULT_HISTORY_WINDOW: usize = 40;

/// Conversation histories keyed by conversation id.
pub struct ConversationMemory {
    store: Arc<dyn Database>,
    cache: RwLock<HashMap<i64, Vec<ChatMessage>>>,
    window: usize,
}

impl ConversationMemory {
    pub fn new(store: Arc<dyn Database>) -> Self {
        Self {
            store,
            cache: RwLock::new(HashMap::new()),
            window: DEFAULT_HISTORY_WINDOW,
        }
    }

    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window.max(1);
        self
    }

    /// Full history of a conversation, loading it from the store on first use.
    pub async fn history(&self, conversation_id: i64) -> Result<Vec<ChatMessage>, DatabaseError> {
        if let Some(messages) = self.cache.read().await.get(&conversation_id) {
            return Ok(messages.clone());
        }

        self.store.ensure_conversation(conversation_id).await?;
        let rows = self.store.list_conversation_messages(conversation_id).await?;
        let messages = hydrate(rows);
        tracing::debug!(
            conversation_id,
            messages = messages.len(),
            "Conversation hydrated"
        );

        let mut cache = self.cache.write().await;
        let entry = cache.entry(conversation_id).or_insert(messages);
        Ok(entry.clone())
    }

    /// The tail of the history that fits the window.
    ///
    /// The window never starts on a tool result, whose matching tool call
    /// would otherwise be cut off.
    pub async fn recent(&self, conversation_id: i64) -> Result<Vec<ChatMessage>, DatabaseError> {
        let history = self.history(conversation_id).await?;
        let mut start = history.len().saturating_sub(self.window);
        while start < history.len() && history[start].role == Role::Tool {
            start += 1;
        }
        Ok(history[start..].to_vec())
    }

    /// Append a message to the cache and persist it.
    pub async fn append(&self, conversation_id: i64, message: ChatMessage) {
        if !self.cache.read().await.contains_key(&conversation_id)
            && let Err(e) = self.history(conversation_id).await
        {
            warn!(conversation_id, "Failed to load conversation before append: {e}");
        }

        let row = NewConversationMessage {
            role: message.role.as_str().to_string(),
            content: message.content.clone(),
            tool_call_id: message.tool_call_id.clone(),
            tool_calls: message
                .tool_calls
                .as_ref()
                .and_then(|calls| serde_json::to_string(calls).ok()),
        };

        self.cache
            .write()
            .await
            .entry(conversation_id)
            .or_default()
            .push(message);

        if let Err(e) = self
            .store
            .add_conversation_message(conversation_id, &row)
            .await
        {
            warn!(conversation_id, "Failed to persist conversation message: {e}");
        }
    }
}

/// Rebuild chat messages from stored rows. Tool names are not stored, so they
/// are recovered from the assistant message that made the call.
fn hydrate(rows: Vec<ConversationMessage>) -> Vec<ChatMessage> {
    let mut names_by_call: HashMap<String, String> = HashMap::new();
    let mut messages = Vec::with_capacity(rows.len());

    for row in rows {
        let Some(role) = Role::parse(&row.role) else {
            warn!(id = row.id, role = %row.role, "Skipping stored message with unknown role");
            continue;
        };
        let message = match role {
            Role::Assistant => {
                let calls: Option<Vec<ToolCall>> = row
                    .tool_calls
                    .as_deref()
                    .and_then(|raw| serde_json::from_str(raw).ok());
                match calls {
                    Some(calls) if !calls.is_empty() => {
                        for call in &calls {
                            names_by_call.insert(call.id.clone(), call.name.clone());
                        }
                        ChatMessage::assistant_with_tool_calls(Some(row.content), calls)
                    }
                    _ => ChatMessage::assistant(row.content),
                }
            }
            Role::Tool => {
                let call_id = row.tool_call_id.unwrap_or_default();
                let name = names_by_call.get(&call_id).cloned().unwrap_or_default();
                ChatMessage::tool_result(call_id, name, row.content)
            }
            Role::User => ChatMessage::user(row.content),
            Role::System => ChatMessage::system(row.content),
        };
        messages.push(message);
    }
    messages
}
