//! Main agent loop.
//!
//! One user turn: append the message to the conversation, then alternate
//! between the LLM and tool execution until the model answers in text or the
//! iteration limit is hit. Every step is emitted as an [`AgentEvent`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{Mutex, mpsc};
use tokio_stream::wrappers::ReceiverStream;

use crate::agent::actions::ActionHook;
use crate::agent::events::AgentEvent;
use crate::agent::memory::ConversationMemory;
use crate::config::AgentConfig;
use crate::context::ToolContext;
use crate::llm::{
    ChatMessage, LlmProvider, Reasoning, ReasoningContext, RespondResult, TokenUsage, ToolCall,
};
use crate::safety::SafetyLayer;
use crate::tools::{ToolError, ToolRegistry};

/// Buffered events per turn before the producer waits on the consumer.
const EVENT_BUFFER: usize = 64;

/// Stream of events for one turn; ends after [`AgentEvent::Completed`].
pub type AgentEventStream = ReceiverStream<AgentEvent>;

/// Core dependencies for the agent.
pub struct AgentDeps {
    pub llm: Arc<dyn LlmProvider>,
    pub safety: Arc<SafetyLayer>,
    pub tools: Arc<ToolRegistry>,
    pub memory: Arc<ConversationMemory>,
    pub actions: ActionHook,
}

/// The chat agent.
pub struct Agent {
    config: AgentConfig,
    deps: AgentDeps,
    reasoning: Reasoning,
    /// Serializes turns within one conversation.
    turn_locks: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl Agent {
    pub fn new(config: AgentConfig, deps: AgentDeps) -> Self {
        let reasoning =
            Reasoning::new(deps.llm.clone()).with_system_prompt(config.system_prompt.clone());
        Self {
            config,
            deps,
            reasoning,
            turn_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn safety(&self) -> &Arc<SafetyLayer> {
        &self.deps.safety
    }

    pub fn memory(&self) -> &Arc<ConversationMemory> {
        &self.deps.memory
    }

    /// Start a turn in the background and stream its events.
    pub fn run(self: &Arc<Self>, input: String, conversation_id: i64) -> AgentEventStream {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let agent = Arc::clone(self);
        tokio::spawn(async move {
            agent.run_turn(&input, conversation_id, &tx).await;
            let _ = tx.send(AgentEvent::Completed).await;
        });
        ReceiverStream::new(rx)
    }

    async fn turn_lock(&self, conversation_id: i64) -> Arc<Mutex<()>> {
        self.turn_locks
            .lock()
            .await
            .entry(conversation_id)
            .or_default()
            .clone()
    }

    /// Drop the conversation's lock entry once no other turn holds or waits on it.
    async fn release_turn_lock(&self, conversation_id: i64, lock: Arc<Mutex<()>>) {
        let mut locks = self.turn_locks.lock().await;
        drop(lock);
        if locks
            .get(&conversation_id)
            .is_some_and(|l| Arc::strong_count(l) == 1)
        {
            locks.remove(&conversation_id);
        }
    }

    /// Run one turn, sending every event except the final `Completed`.
    ///
    /// Events are sent even when the receiver is gone: a trade that already
    /// started still has to finish and be recorded.
    pub async fn run_turn(&self, input: &str, conversation_id: i64, tx: &mpsc::Sender<AgentEvent>) {
        if let Err(e) = self.deps.safety.validate_input(input) {
            let _ = tx.send(AgentEvent::error(e)).await;
            return;
        }

        let lock = self.turn_lock(conversation_id).await;
        {
            let _guard = lock.lock().await;
            self.run_locked_turn(input, conversation_id, tx).await;
        }
        self.release_turn_lock(conversation_id, lock).await;
    }

    async fn run_locked_turn(
        &self,
        input: &str,
        conversation_id: i64,
        tx: &mpsc::Sender<AgentEvent>,
    ) {
        let ctx = ToolContext::new(conversation_id);
        tracing::info!(conversation_id, turn = %ctx.turn_id, "Agent turn started");
        let memory = &self.deps.memory;
        memory.append(conversation_id, ChatMessage::user(input)).await;

        let tool_defs = self.deps.tools.tool_definitions().await;
        let mut usage = TokenUsage::default();

        for iteration in 1..=self.config.max_iterations {
            let messages = match memory.recent(conversation_id).await {
                Ok(messages) => messages,
                Err(e) => {
                    let _ = tx.send(AgentEvent::error(e)).await;
                    return;
                }
            };
            let context = ReasoningContext::new()
                .with_messages(messages)
                .with_tools(tool_defs.clone());

            let output = match self.reasoning.respond_with_tools(&context).await {
                Ok(output) => output,
                Err(e) => {
                    tracing::error!(conversation_id, iteration, "LLM call failed: {e}");
                    let _ = tx.send(AgentEvent::error(e)).await;
                    return;
                }
            };
            usage.add(output.usage);

            match output.result {
                RespondResult::Text(text) => {
                    memory
                        .append(conversation_id, ChatMessage::assistant(text.clone()))
                        .await;
                    let _ = tx.send(AgentEvent::Agent(text)).await;
                    tracing::info!(
                        conversation_id,
                        iterations = iteration,
                        input_tokens = usage.input_tokens,
                        output_tokens = usage.output_tokens,
                        cost_usd = %self.reasoning.cost(usage),
                        "Agent turn finished"
                    );
                    return;
                }
                RespondResult::ToolCalls {
                    tool_calls,
                    content,
                } => {
                    let content = content.filter(|c| !c.trim().is_empty());
                    if let Some(ref text) = content {
                        let _ = tx.send(AgentEvent::Agent(text.clone())).await;
                    }
                    memory
                        .append(
                            conversation_id,
                            ChatMessage::assistant_with_tool_calls(content, tool_calls.clone()),
                        )
                        .await;

                    for call in tool_calls {
                        let result = self.execute_tool(&call, &ctx).await;
                        memory
                            .append(
                                conversation_id,
                                ChatMessage::tool_result(&call.id, &call.name, &result),
                            )
                            .await;
                        self.deps.actions.handle(&call.name, &result).await;
                        let _ = tx
                            .send(AgentEvent::Tools {
                                name: call.name,
                                output: result,
                            })
                            .await;
                    }
                }
            }
        }

        tracing::warn!(
            conversation_id,
            max_iterations = self.config.max_iterations,
            "Agent turn hit the iteration limit"
        );
        let _ = tx
            .send(AgentEvent::error(format!(
                "Stopped after {} tool rounds without a final answer",
                self.config.max_iterations
            )))
            .await;
    }

    /// Execute one tool call and render its result for the model. Failures
    /// are returned as `Error: ...` text so the model can react to them.
    ///
    /// The call runs in its own task. When the wait runs out the task keeps
    /// running and its outcome is only logged.
    async fn execute_tool(&self, call: &ToolCall, ctx: &ToolContext) -> String {
        let Some(tool) = self.deps.tools.get(&call.name).await else {
            return format!("Error: {}", ToolError::NotFound(call.name.clone()));
        };

        tracing::debug!(
            tool = %call.name,
            params = %call.arguments,
            turn = %ctx.turn_id,
            "Tool call started"
        );

        let wait = tool
            .execution_timeout()
            .unwrap_or(self.config.tool_timeout);
        let params = call.arguments.clone();
        let task_ctx = ctx.clone();
        let mut task = tokio::spawn(async move { tool.execute(params, &task_ctx).await });

        let start = Instant::now();
        let result = tokio::time::timeout(wait, &mut task).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(Ok(Ok(output))) => {
                tracing::debug!(tool = %call.name, elapsed_ms, "Tool call succeeded");
                let text = match &output.result {
                    serde_json::Value::String(s) => s.clone(),
                    other => serde_json::to_string_pretty(other)
                        .unwrap_or_else(|_| other.to_string()),
                };
                self.deps
                    .safety
                    .sanitize_tool_output(&call.name, &text)
                    .content
            }
            Ok(Ok(Err(e))) => {
                tracing::debug!(tool = %call.name, elapsed_ms, error = %e, "Tool call failed");
                format!("Error: {e}")
            }
            Ok(Err(join_err)) => {
                tracing::error!(tool = %call.name, "Tool task aborted: {join_err}");
                format!(
                    "Error: {}",
                    ToolError::ExecutionFailed(format!("{} stopped unexpectedly", call.name))
                )
            }
            Err(_) => {
                tracing::warn!(tool = %call.name, elapsed_ms, "Tool call still running after timeout");
                let name = call.name.clone();
                tokio::spawn(async move {
                    match task.await {
                        Ok(Ok(_)) => tracing::info!(tool = %name, "Background tool call finished"),
                        Ok(Err(e)) => {
                            tracing::warn!(tool = %name, "Background tool call failed: {e}")
                        }
                        Err(e) => tracing::error!(tool = %name, "Background tool task aborted: {e}"),
                    }
                });
                format!(
                    "Error: {}. {} is still running in the background; use get_recent_trades or check_trade_status to see its outcome before retrying.",
                    ToolError::Timeout(wait),
                    call.name
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use futures::StreamExt;
    use rust_decimal::Decimal;

    use super::*;
    use crate::chain::mock::MockChain;
    use crate::error::LlmError;
    use crate::llm::{
        CompletionRequest, CompletionResponse, FinishReason, Role, ToolCompletionRequest,
        ToolCompletionResponse,
    };
    use crate::store::{Database, LibSqlBackend};
    use crate::tools::builtin::register_trading_tools;
    use crate::tools::{Tool, ToolOutput};
    use crate::trading::test_support::service;

    /// Plays back scripted responses, then answers "done".
    struct ScriptedLlm {
        script: StdMutex<VecDeque<Result<ToolCompletionResponse, LlmError>>>,
        requests: StdMutex<Vec<Vec<ChatMessage>>>,
    }

    impl ScriptedLlm {
        fn new(script: Vec<Result<ToolCompletionResponse, LlmError>>) -> Arc<Self> {
            Arc::new(Self {
                script: StdMutex::new(script.into()),
                requests: StdMutex::new(Vec::new()),
            })
        }
    }

    fn text(content: &str) -> Result<ToolCompletionResponse, LlmError> {
        Ok(ToolCompletionResponse {
            content: Some(content.to_string()),
            tool_calls: Vec::new(),
            input_tokens: 10,
            output_tokens: 5,
            finish_reason: FinishReason::Stop,
        })
    }

    fn calls(calls: &[(&str, &str, serde_json::Value)]) -> Result<ToolCompletionResponse, LlmError> {
        Ok(ToolCompletionResponse {
            content: None,
            tool_calls: calls
                .iter()
                .map(|(id, name, args)| ToolCall {
                    id: id.to_string(),
                    name: name.to_string(),
                    arguments: args.clone(),
                })
                .collect(),
            input_tokens: 10,
            output_tokens: 5,
            finish_reason: FinishReason::ToolUse,
        })
    }

    #[async_trait]
    impl LlmProvider for ScriptedLlm {
        fn model_name(&self) -> &str {
            "scripted"
        }

        fn cost_per_token(&self) -> (Decimal, Decimal) {
            (Decimal::ZERO, Decimal::ZERO)
        }

        async fn complete(
            &self,
            _request: CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            Ok(CompletionResponse {
                content: "done".into(),
                input_tokens: 0,
                output_tokens: 0,
                finish_reason: FinishReason::Stop,
                response_id: None,
            })
        }

        async fn complete_with_tools(
            &self,
            request: ToolCompletionRequest,
        ) -> Result<ToolCompletionResponse, LlmError> {
            self.requests.lock().unwrap().push(request.messages);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| text("done"))
        }
    }

    /// Sleeps, then flips `done`.
    struct SlowTool {
        name: &'static str,
        delay: Duration,
        timeout: Option<Duration>,
        done: Arc<AtomicBool>,
    }

    impl SlowTool {
        fn new(name: &'static str, delay: Duration) -> Self {
            Self {
                name,
                delay,
                timeout: None,
                done: Arc::new(AtomicBool::new(false)),
            }
        }
    }

    #[async_trait]
    impl Tool for SlowTool {
        fn name(&self) -> &str {
            self.name
        }
        fn description(&self) -> &str {
            "sleeps"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object", "properties": {}})
        }
        async fn execute(
            &self,
            _params: serde_json::Value,
            _ctx: &ToolContext,
        ) -> Result<ToolOutput, ToolError> {
            tokio::time::sleep(self.delay).await;
            self.done.store(true, Ordering::SeqCst);
            Ok(ToolOutput::text("late", self.delay))
        }
        fn execution_timeout(&self) -> Option<Duration> {
            self.timeout
        }
    }

    async fn agent(llm: Arc<ScriptedLlm>, config: AgentConfig) -> (Arc<Agent>, Arc<LibSqlBackend>) {
        let (trading, _, store) = service(MockChain::new()).await;
        let tools = Arc::new(ToolRegistry::new());
        register_trading_tools(&tools, Arc::new(trading));
        tools.register_sync(Arc::new(SlowTool::new("slow", Duration::from_secs(5))));

        let deps = AgentDeps {
            llm,
            safety: Arc::new(SafetyLayer::new(Decimal::from(5))),
            tools,
            memory: Arc::new(ConversationMemory::new(store.clone())),
            actions: ActionHook::new(store.clone()),
        };
        (Arc::new(Agent::new(config, deps)), store)
    }

    async fn collect(agent: &Arc<Agent>, input: &str, conversation_id: i64) -> Vec<AgentEvent> {
        tokio::time::timeout(
            Duration::from_secs(10),
            agent.run(input.to_string(), conversation_id).collect::<Vec<_>>(),
        )
        .await
        .expect("turn timed out")
    }

    #[tokio::test]
    async fn text_answer_streams_agent_then_completed() {
        let llm = ScriptedLlm::new(vec![text("Hello, I'm Smart Ape")]);
        let (agent, store) = agent(llm.clone(), AgentConfig::default()).await;

        let events = collect(&agent, "hi", 3).await;
        assert_eq!(
            events,
            vec![
                AgentEvent::Agent("Hello, I'm Smart Ape".into()),
                AgentEvent::Completed
            ]
        );

        let first_request = &llm.requests.lock().unwrap()[0];
        assert_eq!(first_request[0].role, Role::System);
        assert_eq!(first_request.last().unwrap(), &ChatMessage::user("hi"));

        let stored = store.list_conversation_messages(3).await.unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[1].role, "assistant");
    }

    #[tokio::test]
    async fn tool_results_are_fed_back_to_the_model() {
        let llm = ScriptedLlm::new(vec![
            calls(&[("c1", "get_latest_block", serde_json::json!({}))]),
            text("Block 1234567"),
        ]);
        let (agent, _) = agent(llm.clone(), AgentConfig::default()).await;

        let events = collect(&agent, "latest block?", 1).await;
        assert_eq!(events.len(), 3);
        match &events[0] {
            AgentEvent::Tools { name, output } => {
                assert_eq!(name, "get_latest_block");
                assert!(output.contains("1234567"));
            }
            other => panic!("expected tools event, got {other:?}"),
        }
        assert_eq!(events[1], AgentEvent::Agent("Block 1234567".into()));
        assert_eq!(events[2], AgentEvent::Completed);

        let requests = llm.requests.lock().unwrap();
        let second = &requests[1];
        let tool_msg = second.last().unwrap();
        assert_eq!(tool_msg.role, Role::Tool);
        assert_eq!(tool_msg.tool_call_id.as_deref(), Some("c1"));
        assert!(second[second.len() - 2].tool_calls.is_some());
    }

    #[tokio::test]
    async fn history_carries_across_turns() {
        let llm = ScriptedLlm::new(vec![text("first"), text("second")]);
        let (agent, _) = agent(llm.clone(), AgentConfig::default()).await;

        collect(&agent, "one", 9).await;
        collect(&agent, "two", 9).await;

        let requests = llm.requests.lock().unwrap();
        let second: Vec<&str> = requests[1].iter().map(|m| m.content.as_str()).collect();
        assert_eq!(&second[1..], &["one", "first", "two"]);
    }

    #[tokio::test]
    async fn tool_failures_become_error_text() {
        let llm = ScriptedLlm::new(vec![calls(&[
            ("c1", "does_not_exist", serde_json::json!({})),
            ("c2", "get_token_price", serde_json::json!({})),
        ])]);
        let (agent, _) = agent(llm, AgentConfig::default()).await;

        let events = collect(&agent, "go", 1).await;
        let outputs: Vec<&str> = events
            .iter()
            .filter_map(|e| match e {
                AgentEvent::Tools { output, .. } => Some(output.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(outputs[0], "Error: Tool does_not_exist not found");
        assert!(outputs[1].starts_with("Error: Invalid parameters"));
        assert_eq!(events.last(), Some(&AgentEvent::Completed));
    }

    #[tokio::test]
    async fn slow_tool_times_out() {
        let llm = ScriptedLlm::new(vec![calls(&[("c1", "slow", serde_json::json!({}))])]);
        let config = AgentConfig {
            tool_timeout: Duration::from_millis(50),
            ..AgentConfig::default()
        };
        let (agent, _) = agent(llm, config).await;

        let events = collect(&agent, "go", 1).await;
        match &events[0] {
            AgentEvent::Tools { output, .. } => {
                assert!(output.starts_with("Error: Timed out after"));
                assert!(output.contains("still running in the background"));
            }
            other => panic!("expected tools event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn timed_out_tool_finishes_in_background() {
        let llm = ScriptedLlm::new(vec![calls(&[("c1", "settle", serde_json::json!({}))])]);
        let config = AgentConfig {
            tool_timeout: Duration::from_millis(20),
            ..AgentConfig::default()
        };
        let (agent, _) = agent(llm, config).await;
        let tool = SlowTool::new("settle", Duration::from_millis(200));
        let done = tool.done.clone();
        agent.deps.tools.register_sync(Arc::new(tool));

        let events = collect(&agent, "go", 1).await;
        assert!(matches!(
            &events[0],
            AgentEvent::Tools { output, .. } if output.contains("still running")
        ));
        assert!(!done.load(Ordering::SeqCst));

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(done.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn tool_declared_timeout_outlasts_agent_default() {
        let llm = ScriptedLlm::new(vec![calls(&[("c1", "patient", serde_json::json!({}))])]);
        let config = AgentConfig {
            tool_timeout: Duration::from_millis(20),
            ..AgentConfig::default()
        };
        let (agent, _) = agent(llm, config).await;
        let mut tool = SlowTool::new("patient", Duration::from_millis(100));
        tool.timeout = Some(Duration::from_secs(5));
        let done = tool.done.clone();
        agent.deps.tools.register_sync(Arc::new(tool));

        let events = collect(&agent, "go", 1).await;
        assert_eq!(
            events[0],
            AgentEvent::Tools {
                name: "patient".into(),
                output: "late".into(),
            }
        );
        assert!(done.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn turn_locks_are_released_after_turns() {
        let llm = ScriptedLlm::new(vec![text("one"), text("two")]);
        let (agent, _) = agent(llm, AgentConfig::default()).await;

        collect(&agent, "a", 11).await;
        collect(&agent, "b", 12).await;
        assert!(agent.turn_locks.lock().await.is_empty());
    }

    #[tokio::test]
    async fn iteration_limit_ends_with_error() {
        let looping: Vec<_> = (0..5)
            .map(|i| calls(&[(&format!("c{i}"), "get_latest_block", serde_json::json!({}))]))
            .collect();
        let llm = ScriptedLlm::new(looping);
        let config = AgentConfig {
            max_iterations: 2,
            ..AgentConfig::default()
        };
        let (agent, _) = agent(llm.clone(), config).await;

        let events = collect(&agent, "loop", 1).await;
        assert_eq!(llm.requests.lock().unwrap().len(), 2);
        assert!(matches!(
            &events[events.len() - 2],
            AgentEvent::Error(msg) if msg.starts_with("Error: Stopped after 2 tool rounds")
        ));
    }

    #[tokio::test]
    async fn llm_failure_is_reported() {
        let llm = ScriptedLlm::new(vec![Err(LlmError::AuthFailed {
            provider: "openai".into(),
        })]);
        let (agent, _) = agent(llm, AgentConfig::default()).await;

        let events = collect(&agent, "hi", 1).await;
        assert_eq!(
            events,
            vec![
                AgentEvent::Error("Error: Authentication failed for provider openai".into()),
                AgentEvent::Completed
            ]
        );
    }

    #[tokio::test]
    async fn blank_input_is_rejected_without_llm_call() {
        let llm = ScriptedLlm::new(vec![]);
        let (agent, _) = agent(llm.clone(), AgentConfig::default()).await;

        let events = collect(&agent, "   ", 1).await;
        assert!(matches!(&events[0], AgentEvent::Error(msg) if msg.starts_with("Error: Input rejected")));
        assert!(llm.requests.lock().unwrap().is_empty());
    }
}
