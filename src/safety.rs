//! Safety layer: input validation, slippage guard and tool-output limits.

use rust_decimal::Decimal;

use crate::error::SafetyError;

/// Longest user message accepted, in characters.
pub const MAX_INPUT_CHARS: usize = 10_000;

/// Tool output beyond this many characters is cut before reaching the LLM.
pub const MAX_TOOL_OUTPUT_CHARS: usize = 8_000;

/// Result of output sanitization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizedOutput {
    pub content: String,
    pub was_modified: bool,
}

/// Validates what goes into the agent and what comes back out of tools.
#[derive(Debug, Clone)]
pub struct SafetyLayer {
    max_slippage: Decimal,
}

impl SafetyLayer {
    pub fn new(max_slippage: Decimal) -> Self {
        Self { max_slippage }
    }

    pub fn max_slippage(&self) -> Decimal {
        self.max_slippage
    }

    /// Validate user input before sending it to the LLM.
    pub fn validate_input(&self, input: &str) -> Result<(), SafetyError> {
        if input.trim().is_empty() {
            return Err(SafetyError::InvalidInput {
                reason: "input is empty".to_string(),
            });
        }
        let chars = input.chars().count();
        if chars > MAX_INPUT_CHARS {
            return Err(SafetyError::InvalidInput {
                reason: format!("input is {chars} characters, limit is {MAX_INPUT_CHARS}"),
            });
        }
        Ok(())
    }

    /// Check a requested slippage tolerance (percent).
    pub fn check_slippage(&self, slippage: Decimal) -> Result<Decimal, SafetyError> {
        if slippage.is_sign_negative() {
            return Err(SafetyError::PolicyViolation {
                rule: format!("slippage must not be negative (got {slippage}%)"),
            });
        }
        if slippage > self.max_slippage {
            return Err(SafetyError::SlippageTooHigh {
                requested: slippage.to_string(),
                max: self.max_slippage.to_string(),
            });
        }
        Ok(slippage)
    }

    /// Cut oversized tool output before it is fed back to the LLM.
    pub fn sanitize_tool_output(&self, tool_name: &str, output: &str) -> SanitizedOutput {
        let chars = output.chars().count();
        if chars <= MAX_TOOL_OUTPUT_CHARS {
            return SanitizedOutput {
                content: output.to_string(),
                was_modified: false,
            };
        }
        tracing::debug!(tool = tool_name, chars, "Truncating tool output");
        let kept: String = output.chars().take(MAX_TOOL_OUTPUT_CHARS).collect();
        SanitizedOutput {
            content: format!(
                "{kept}\n... [output truncated, {} more characters]",
                chars - MAX_TOOL_OUTPUT_CHARS
            ),
            was_modified: true,
        }
    }
}
