//! Per-turn context handed to tools.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Conversation id used by the single-session CLI and the HTTP API.
pub const DEFAULT_CONVERSATION_ID: i64 = 1;

/// Context for one agent turn.
#[derive(Debug, Clone, Serialize)]
pub struct ToolContext {
    /// Unique id of the turn, used to correlate logs.
    pub turn_id: Uuid,
    /// Conversation the turn belongs to.
    pub conversation_id: i64,
    /// When the turn started.
    pub started_at: DateTime<Utc>,
}

impl ToolContext {
    pub fn new(conversation_id: i64) -> Self {
        Self {
            turn_id: Uuid::new_v4(),
            conversation_id,
            started_at: Utc::now(),
        }
    }
}

impl Default for ToolContext {
    fn default() -> Self {
        Self::new(DEFAULT_CONVERSATION_ID)
    }
}
