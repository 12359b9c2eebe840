//! Events streamed to clients while the agent works on a turn.

use serde::Serialize;

/// One step of an agent turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentEvent {
    /// Text produced by the model.
    Agent(String),
    /// Output of a tool call.
    Tools { name: String, output: String },
    /// The turn failed; the message already carries the `Error: ` prefix.
    Error(String),
    /// End of the turn.
    Completed,
}

/// Wire form of an event: `{"event", "data", "functions"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventPayload {
    pub event: &'static str,
    pub data: String,
    pub functions: Vec<String>,
}

impl AgentEvent {
    pub fn error(message: impl std::fmt::Display) -> Self {
        Self::Error(format!("Error: {message}"))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Agent(_) => "agent",
            Self::Tools { .. } => "tools",
            Self::Error(_) => "error",
            Self::Completed => "completed",
        }
    }

    pub fn payload(&self) -> EventPayload {
        let (data, functions) = match self {
            Self::Agent(text) | Self::Error(text) => (text.clone(), Vec::new()),
            Self::Tools { name, output } => (output.clone(), vec![name.clone()]),
            Self::Completed => (String::new(), Vec::new()),
        };
        EventPayload {
            event: self.kind(),
            data,
            functions,
        }
    }

    /// JSON body of the SSE `data:` line.
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.payload()).unwrap_or_else(|_| {
            format!(r#"{{"event":"{}","data":"","functions":[]}}"#, self.kind())
        })
    }

    /// Full SSE frame: `data: {...}` followed by a blank line.
    pub fn to_sse_frame(&self) -> String {
        format!("data: {}\n\n", self.to_json())
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_event_payload() {
        let json: serde_json::Value =
            serde_json::from_str(&AgentEvent::Agent("hello".into()).to_json()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"event": "agent", "data": "hello", "functions": []})
        );
    }

    #[test]
    fn tools_event_lists_function() {
        let event = AgentEvent::Tools {
            name: "get_latest_block".into(),
            output: "{\"number\": 1}".into(),
        };
        let payload = event.payload();
        assert_eq!(payload.event, "tools");
        assert_eq!(payload.functions, vec!["get_latest_block"]);
        assert_eq!(payload.data, "{\"number\": 1}");
    }

    #[test]
    fn error_event_is_prefixed() {
        let event = AgentEvent::error("rate limited");
        assert_eq!(event, AgentEvent::Error("Error: rate limited".into()));
        assert_eq!(event.kind(), "error");
    }

    #[test]
    fn sse_frame_format() {
        let frame = AgentEvent::Completed.to_sse_frame();
        assert_eq!(
            frame,
            "data: {\"event\":\"completed\",\"data\":\"\",\"functions\":[]}\n\n"
        );
        assert!(AgentEvent::Completed.is_terminal());
    }
}
