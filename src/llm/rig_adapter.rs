//! Bridges rig's `CompletionModel` to [`LlmProvider`].

use async_trait::async_trait;
use rig::OneOrMany;
use rig::completion::{self as rig_completion, CompletionModel};
use rig::message::{AssistantContent, Message, ToolResultContent, UserContent};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::error::LlmError;
use crate::llm::provider::{
    ChatMessage, CompletionRequest, CompletionResponse, FinishReason, LlmProvider, Role, ToolCall,
    ToolCompletionRequest, ToolCompletionResponse, ToolDefinition,
};

const PROVIDER: &str = "openai";

/// Wraps any rig completion model.
pub struct RigAdapter<M: CompletionModel> {
    model: M,
    model_name: String,
}

impl<M: CompletionModel> RigAdapter<M> {
    pub fn new(model: M, model_name: &str) -> Self {
        Self {
            model,
            model_name: model_name.to_string(),
        }
    }

    async fn send(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
        max_tokens: Option<u32>,
        temperature: Option<f32>,
    ) -> Result<(Vec<AssistantContent>, u32, u32), LlmError> {
        let (preamble, mut history) = to_rig_messages(messages);
        let prompt = history.pop().ok_or_else(|| LlmError::RequestFailed {
            provider: PROVIDER.to_string(),
            reason: "no messages to send".to_string(),
        })?;

        let mut builder = self.model.completion_request(prompt).messages(history);
        if let Some(preamble) = preamble {
            builder = builder.preamble(preamble);
        }
        if !tools.is_empty() {
            builder = builder.tools(tools.iter().map(to_rig_tool).collect());
        }
        if let Some(max_tokens) = max_tokens {
            builder = builder.max_tokens(u64::from(max_tokens));
        }
        if let Some(temperature) = temperature {
            builder = builder.temperature(f64::from(temperature));
        }

        let response = builder.send().await.map_err(|e| map_error(&e.to_string()))?;
        let input_tokens = u32::try_from(response.usage.input_tokens).unwrap_or(u32::MAX);
        let output_tokens = u32::try_from(response.usage.output_tokens).unwrap_or(u32::MAX);
        Ok((
            response.choice.into_iter().collect(),
            input_tokens,
            output_tokens,
        ))
    }
}

/// Split system messages into a preamble and convert the rest.
fn to_rig_messages(messages: &[ChatMessage]) -> (Option<String>, Vec<Message>) {
    let mut system = Vec::new();
    let mut converted = Vec::with_capacity(messages.len());

    for message in messages {
        match message.role {
            Role::System => system.push(message.content.clone()),
            Role::User => converted.push(Message::user(message.content.clone())),
            Role::Tool => {
                let id = message.tool_call_id.clone().unwrap_or_default();
                converted.push(Message::User {
                    content: OneOrMany::one(UserContent::tool_result(
                        id,
                        OneOrMany::one(ToolResultContent::text(message.content.clone())),
                    )),
                });
            }
            Role::Assistant => {
                let mut content = Vec::new();
                if !message.content.is_empty() {
                    content.push(AssistantContent::text(message.content.clone()));
                }
                for call in message.tool_calls.iter().flatten() {
                    content.push(AssistantContent::tool_call(
                        call.id.clone(),
                        call.name.clone(),
                        call.arguments.clone(),
                    ));
                }
                if let Ok(content) = OneOrMany::many(content) {
                    converted.push(Message::Assistant { id: None, content });
                }
            }
        }
    }

    let preamble = (!system.is_empty()).then(|| system.join("\n\n"));
    (preamble, converted)
}

fn to_rig_tool(tool: &ToolDefinition) -> rig_completion::ToolDefinition {
    rig_completion::ToolDefinition {
        name: tool.name.clone(),
        description: tool.description.clone(),
        parameters: tool.parameters.clone(),
    }
}

/// Text and tool calls out of the model's reply.
fn from_rig_choice(choice: Vec<AssistantContent>) -> (Option<String>, Vec<ToolCall>) {
    let mut text = Vec::new();
    let mut tool_calls = Vec::new();
    for content in choice {
        match content {
            AssistantContent::Text(t) => text.push(t.text),
            AssistantContent::ToolCall(call) => tool_calls.push(ToolCall {
                id: call.call_id.unwrap_or(call.id),
                name: call.function.name,
                arguments: call.function.arguments,
            }),
            _ => {}
        }
    }
    let text = text.join("");
    ((!text.is_empty()).then_some(text), tool_calls)
}

/// Classify a rig error message.
fn map_error(message: &str) -> LlmError {
    let lower = message.to_ascii_lowercase();
    if lower.contains("401") || lower.contains("invalid_api_key") || lower.contains("incorrect api key")
    {
        LlmError::AuthFailed {
            provider: PROVIDER.to_string(),
        }
    } else if lower.contains("429") || lower.contains("rate limit") {
        LlmError::RateLimited {
            provider: PROVIDER.to_string(),
            retry_after: None,
        }
    } else {
        LlmError::RequestFailed {
            provider: PROVIDER.to_string(),
            reason: message.to_string(),
        }
    }
}

#[async_trait]
impl<M> LlmProvider for RigAdapter<M>
where
    M: CompletionModel + Send + Sync + 'static,
{
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn cost_per_token(&self) -> (Decimal, Decimal) {
        // gpt-4o list price: $2.50 / $10.00 per million tokens.
        (dec!(0.0000025), dec!(0.00001))
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let (choice, input_tokens, output_tokens) = self
            .send(
                &request.messages,
                &[],
                request.max_tokens,
                request.temperature,
            )
            .await?;
        let (content, _) = from_rig_choice(choice);
        Ok(CompletionResponse {
            content: content.unwrap_or_default(),
            input_tokens,
            output_tokens,
            finish_reason: FinishReason::Stop,
            response_id: None,
        })
    }

    async fn complete_with_tools(
        &self,
        request: ToolCompletionRequest,
    ) -> Result<ToolCompletionResponse, LlmError> {
        let (choice, input_tokens, output_tokens) = self
            .send(
                &request.messages,
                &request.tools,
                request.max_tokens,
                request.temperature,
            )
            .await?;
        let (content, tool_calls) = from_rig_choice(choice);

        tracing::debug!(
            model = %self.model_name,
            tool_calls = tool_calls.len(),
            input_tokens,
            output_tokens,
            "Completion finished"
        );

        let finish_reason = if tool_calls.is_empty() {
            FinishReason::Stop
        } else {
            FinishReason::ToolUse
        };
        Ok(ToolCompletionResponse {
            content,
            tool_calls,
            input_tokens,
            output_tokens,
            finish_reason,
        })
    }
}
