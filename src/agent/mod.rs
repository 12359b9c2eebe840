//! Agent module: the tool-calling loop, conversation memory and turn events.

pub mod actions;
pub mod agent_loop;
pub mod events;
pub mod memory;

pub use actions::ActionHook;
pub use agent_loop::{Agent, AgentDeps, AgentEventStream};
pub use events::{AgentEvent, EventPayload};
pub use memory::ConversationMemory;
