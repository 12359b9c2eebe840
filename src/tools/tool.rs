//! Tool trait and parameter helpers.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::context::ToolContext;
use crate::error::TradeError;

/// Errors returned by a tool.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Tool {0} not found")]
    NotFound(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Not authorized: {0}")]
    NotAuthorized(String),
}

impl From<TradeError> for ToolError {
    fn from(err: TradeError) -> Self {
        match err {
            TradeError::NonPositiveAmount
            | TradeError::InvalidAmount { .. }
            | TradeError::InvalidPath(_)
            | TradeError::UnknownToken(_) => Self::InvalidParameters(err.to_string()),
            TradeError::Safety(_) => Self::NotAuthorized(err.to_string()),
            _ => Self::ExecutionFailed(err.to_string()),
        }
    }
}

/// Output of a successful tool call.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub result: serde_json::Value,
    pub duration: Duration,
}

impl ToolOutput {
    pub fn success(result: serde_json::Value, duration: Duration) -> Self {
        Self { result, duration }
    }

    pub fn text(text: impl Into<String>, duration: Duration) -> Self {
        Self {
            result: serde_json::Value::String(text.into()),
            duration,
        }
    }

    /// Serialize any value as the result.
    pub fn json<T: Serialize>(value: &T, duration: Duration) -> Result<Self, ToolError> {
        serde_json::to_value(value)
            .map(|result| Self::success(result, duration))
            .map_err(|e| ToolError::ExecutionFailed(format!("Failed to serialize output: {e}")))
    }
}

/// A capability the LLM can call.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema of the parameters object.
    fn parameters_schema(&self) -> serde_json::Value;

    async fn execute(
        &self,
        params: serde_json::Value,
        ctx: &ToolContext,
    ) -> Result<ToolOutput, ToolError>;

    /// How long the agent waits for this tool before replying without it.
    /// `None` uses the agent's configured tool timeout.
    fn execution_timeout(&self) -> Option<Duration> {
        None
    }
}

/// Extract a required string parameter.
pub fn require_str<'a>(params: &'a serde_json::Value, name: &str) -> Result<&'a str, ToolError> {
    params
        .get(name)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ToolError::InvalidParameters(format!("missing '{name}' parameter")))
}

/// Extract an optional string parameter; blank strings count as absent.
pub fn optional_str<'a>(params: &'a serde_json::Value, name: &str) -> Option<&'a str> {
    params
        .get(name)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Extract an optional decimal given either as a JSON number or a string.
pub fn optional_decimal(
    params: &serde_json::Value,
    name: &str,
) -> Result<Option<Decimal>, ToolError> {
    let invalid = |v: &serde_json::Value| {
        ToolError::InvalidParameters(format!("'{name}' must be a decimal number, got {v}"))
    };
    match params.get(name) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(serde_json::Value::String(s)) => Decimal::from_str(s.trim())
            .map(Some)
            .map_err(|_| invalid(&params[name])),
        Some(v @ serde_json::Value::Number(n)) => Decimal::from_str(&n.to_string())
            .or_else(|_| Decimal::from_scientific(&n.to_string()))
            .map(Some)
            .map_err(|_| invalid(v)),
        Some(v) => Err(invalid(v)),
    }
}

/// Extract a required decimal parameter.
pub fn require_decimal(params: &serde_json::Value, name: &str) -> Result<Decimal, ToolError> {
    optional_decimal(params, name)?
        .ok_or_else(|| ToolError::InvalidParameters(format!("missing '{name}' parameter")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn string_params() {
        let params = json!({"token": " USDC ", "blank": "  ", "num": 3});
        assert_eq!(require_str(&params, "token").unwrap(), "USDC");
        assert!(require_str(&params, "blank").is_err());
        assert!(require_str(&params, "num").is_err());
        assert!(require_str(&params, "missing").is_err());
        assert_eq!(optional_str(&params, "blank"), None);
    }

    #[test]
    fn decimal_params_accept_numbers_and_strings() {
        let params = json!({"a": 1.5, "b": "0.25", "c": 10, "d": "abc", "e": null, "f": true});
        assert_eq!(require_decimal(&params, "a").unwrap(), dec!(1.5));
        assert_eq!(require_decimal(&params, "b").unwrap(), dec!(0.25));
        assert_eq!(require_decimal(&params, "c").unwrap(), dec!(10));
        assert!(matches!(
            require_decimal(&params, "d"),
            Err(ToolError::InvalidParameters(_))
        ));
        assert_eq!(optional_decimal(&params, "e").unwrap(), None);
        assert!(optional_decimal(&params, "f").is_err());
        assert!(require_decimal(&params, "missing").is_err());
    }

    #[test]
    fn trade_errors_map_to_tool_errors() {
        assert!(matches!(
            ToolError::from(TradeError::NonPositiveAmount),
            ToolError::InvalidParameters(_)
        ));
        assert!(matches!(
            ToolError::from(TradeError::Quote("no pool".into())),
            ToolError::ExecutionFailed(_)
        ));
        let err = ToolError::from(TradeError::InsufficientBalance {
            have: "1 USDC".into(),
            need: "2 USDC".into(),
        });
        assert_eq!(
            err.to_string(),
            "Execution failed: Insufficient balance. Have 1 USDC, need 2 USDC"
        );
    }
}
