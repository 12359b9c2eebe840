//! Price, arbitrage and gas tools.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;

use crate::context::ToolContext;
use crate::tools::tool::{Tool, ToolError, ToolOutput, require_decimal, require_str};
use crate::trading::TradingService;

/// Price of one token in WETH.
pub struct TokenPriceTool {
    trading: Arc<TradingService>,
}

impl TokenPriceTool {
    pub fn new(trading: Arc<TradingService>) -> Self {
        Self { trading }
    }
}

#[async_trait]
impl Tool for TokenPriceTool {
    fn name(&self) -> &str {
        "get_token_price"
    }

    fn description(&self) -> &str {
        "Get the current price of one whole token in WETH from the Uniswap V3 quoter."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "token_address": {
                    "type": "string",
                    "description": "Token contract address or symbol"
                }
            },
            "required": ["token_address"]
        })
    }

    async fn execute(
        &self,
        params: serde_json::Value,
        _ctx: &ToolContext,
    ) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();
        let token = require_str(&params, "token_address")?;
        let price = self.trading.token_price(token).await?;
        ToolOutput::json(&price, start.elapsed())
    }
}

/// Records a price observation and reports the change since the last one.
pub struct MonitorPriceTool {
    trading: Arc<TradingService>,
}

impl MonitorPriceTool {
    pub fn new(trading: Arc<TradingService>) -> Self {
        Self { trading }
    }
}

#[async_trait]
impl Tool for MonitorPriceTool {
    fn name(&self) -> &str {
        "monitor_price"
    }

    fn description(&self) -> &str {
        "Record the current price of a token and compare it with the previous \
         recorded price."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "token": {
                    "type": "string",
                    "description": "Token contract address or symbol"
                }
            },
            "required": ["token"]
        })
    }

    async fn execute(
        &self,
        params: serde_json::Value,
        _ctx: &ToolContext,
    ) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();
        let token = require_str(&params, "token")?;
        let movement = self.trading.monitor_price(token).await?;
        ToolOutput::json(&movement, start.elapsed())
    }
}

/// Quotes a circular swap path.
pub struct CheckArbitrageTool {
    trading: Arc<TradingService>,
}

impl CheckArbitrageTool {
    pub fn new(trading: Arc<TradingService>) -> Self {
        Self { trading }
    }
}

#[async_trait]
impl Tool for CheckArbitrageTool {
    fn name(&self) -> &str {
        "check_arbitrage"
    }

    fn description(&self) -> &str {
        "Check a circular swap path (for example USDC -> WETH -> USDC) for an \
         arbitrage opportunity. Profitable paths are saved."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "token_path": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "Token addresses or symbols; first and last must match"
                },
                "amount_in": {
                    "type": "string",
                    "description": "Amount of the first token in whole units"
                }
            },
            "required": ["token_path", "amount_in"]
        })
    }

    async fn execute(
        &self,
        params: serde_json::Value,
        _ctx: &ToolContext,
    ) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();
        let path = params
            .get("token_path")
            .and_then(|v| v.as_array())
            .ok_or_else(|| ToolError::InvalidParameters("missing 'token_path' array".into()))?
            .iter()
            .map(|v| {
                v.as_str().map(str::to_string).ok_or_else(|| {
                    ToolError::InvalidParameters("token_path entries must be strings".into())
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let amount_in = require_decimal(&params, "amount_in")?;
        let check = self.trading.check_arbitrage(&path, amount_in).await?;
        ToolOutput::json(&check, start.elapsed())
    }
}

/// Gas estimate for a swap.
pub struct EstimateGasTool {
    trading: Arc<TradingService>,
}

impl EstimateGasTool {
    pub fn new(trading: Arc<TradingService>) -> Self {
        Self { trading }
    }
}

#[async_trait]
impl Tool for EstimateGasTool {
    fn name(&self) -> &str {
        "estimate_gas"
    }

    fn description(&self) -> &str {
        "Estimate gas units and ETH cost of a Uniswap V3 swap."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "token_in": {"type": "string", "description": "Token to sell (address or symbol)"},
                "token_out": {"type": "string", "description": "Token to buy (address or symbol)"},
                "amount_in": {"type": "string", "description": "Amount to sell in whole units"}
            },
            "required": ["token_in", "token_out", "amount_in"]
        })
    }

    async fn execute(
        &self,
        params: serde_json::Value,
        _ctx: &ToolContext,
    ) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();
        let estimate = self
            .trading
            .estimate_gas(
                require_str(&params, "token_in")?,
                require_str(&params, "token_out")?,
                require_decimal(&params, "amount_in")?,
            )
            .await?;
        ToolOutput::json(&estimate, start.elapsed())
    }
}
