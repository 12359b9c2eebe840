//! Chat mode: stdin/stdout REPL over a single conversation.

use std::sync::Arc;

use futures::StreamExt;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::agent::{Agent, AgentEvent};
use crate::context::DEFAULT_CONVERSATION_ID;

const QUIT_COMMANDS: &[&str] = &["/quit", "/exit"];

/// Render one event for the terminal, or `None` when nothing is shown.
pub fn render_event(event: &AgentEvent) -> Option<String> {
    match event {
        AgentEvent::Agent(text) => Some(format!("{text}\n-------------------")),
        AgentEvent::Tools { name, output } => {
            Some(format!("[{name}]\n{output}\n-------------------"))
        }
        AgentEvent::Error(message) => Some(message.clone()),
        AgentEvent::Completed => None,
    }
}

/// Run the REPL on stdin/stdout until `/quit` or EOF.
pub async fn run_chat(agent: Arc<Agent>) -> std::io::Result<()> {
    let stdin = BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();
    run_chat_with(agent, stdin, stdout).await
}

/// Run the REPL over arbitrary streams.
pub async fn run_chat_with<R, W>(agent: Arc<Agent>, input: R, mut output: W) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    eprint!("> ");

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            eprint!("> ");
            continue;
        }
        if QUIT_COMMANDS.contains(&line) {
            break;
        }

        let mut events = agent.run(line.to_string(), DEFAULT_CONVERSATION_ID);
        while let Some(event) = events.next().await {
            if let Some(text) = render_event(&event) {
                output.write_all(text.as_bytes()).await?;
                output.write_all(b"\n").await?;
                output.flush().await?;
            }
        }
        eprint!("> ");
    }

    tracing::info!("Chat session ended");
    Ok(())
}
