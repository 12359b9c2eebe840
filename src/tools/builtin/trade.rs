//! Swap tools.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::chain::{self, tokens};
use crate::context::ToolContext;
use crate::tools::tool::{
    Tool, ToolError, ToolOutput, optional_decimal, optional_str, require_decimal, require_str,
};
use crate::trading::{SwapRequest, TradingService};

/// Swaps wait for a receipt, so they get more time than the default.
const SWAP_TIMEOUT: Duration = Duration::from_secs(180);

/// Generic Uniswap V3 exact-input swap.
pub struct UniswapSwapTool {
    trading: Arc<TradingService>,
}

impl UniswapSwapTool {
    pub fn new(trading: Arc<TradingService>) -> Self {
        Self { trading }
    }
}

#[async_trait]
impl Tool for UniswapSwapTool {
    fn name(&self) -> &str {
        "uniswap_swap"
    }

    fn description(&self) -> &str {
        "Swap tokens on Uniswap V3 (Base Sepolia) from the agent wallet. Approves the \
         router when needed, quotes the trade and protects the output with a slippage \
         tolerance. Tokens may be given as contract addresses or as USDC / WETH / ETH."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "token_in_address": {
                    "type": "string",
                    "description": "Address (or symbol) of the token to sell"
                },
                "token_out_address": {
                    "type": "string",
                    "description": "Address (or symbol) of the token to buy"
                },
                "amount_in": {
                    "type": "string",
                    "description": "Amount of the input token in whole units, e.g. \"1.5\""
                },
                "recipient": {
                    "type": "string",
                    "description": "Address receiving the output (default: agent wallet)"
                },
                "slippage": {
                    "type": "number",
                    "description": "Slippage tolerance in percent (default: 0.5)"
                }
            },
            "required": ["token_in_address", "token_out_address", "amount_in"]
        })
    }

    async fn execute(
        &self,
        params: serde_json::Value,
        _ctx: &ToolContext,
    ) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();
        let recipient = optional_str(&params, "recipient")
            .map(chain::parse_address)
            .transpose()
            .map_err(|e| ToolError::InvalidParameters(e.to_string()))?;
        let request = SwapRequest {
            token_in: require_str(&params, "token_in_address")?.to_string(),
            token_out: require_str(&params, "token_out_address")?.to_string(),
            amount_in: require_decimal(&params, "amount_in")?,
            slippage: optional_decimal(&params, "slippage")?,
            recipient,
        };
        let receipt = self.trading.swap(request).await?;
        ToolOutput::json(&receipt, start.elapsed())
    }

    fn execution_timeout(&self) -> Option<Duration> {
        Some(SWAP_TIMEOUT)
    }
}

/// Shortcut for the most common trade: USDC into WETH.
pub struct TradeUsdcForEthTool {
    trading: Arc<TradingService>,
}

impl TradeUsdcForEthTool {
    pub fn new(trading: Arc<TradingService>) -> Self {
        Self { trading }
    }
}

#[async_trait]
impl Tool for TradeUsdcForEthTool {
    fn name(&self) -> &str {
        "trade_usdc_for_eth"
    }

    fn description(&self) -> &str {
        "Trade USDC for ETH (WETH) on Uniswap V3 using the default slippage tolerance."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "amount": {
                    "type": "string",
                    "description": "Amount of USDC to sell in whole units"
                }
            },
            "required": ["amount"]
        })
    }

    async fn execute(
        &self,
        params: serde_json::Value,
        _ctx: &ToolContext,
    ) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();
        let request = SwapRequest {
            token_in: tokens::USDC.address.to_string(),
            token_out: tokens::WETH.address.to_string(),
            amount_in: require_decimal(&params, "amount")?,
            slippage: None,
            recipient: None,
        };
        let receipt = self.trading.swap(request).await?;
        ToolOutput::json(&receipt, start.elapsed())
    }

    fn execution_timeout(&self) -> Option<Duration> {
        Some(SWAP_TIMEOUT)
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::U256;
    use serde_json::json;

    use super::*;
    use crate::chain::mock::MockChain;
    use crate::chain::{USDC, WETH};
    use crate::trading::test_support::service;

    async fn trading() -> Arc<TradingService> {
        let chain = MockChain::new()
            .with_balance(USDC.address, U256::from(5_000_000u64))
            .with_rate(USDC.address, WETH.address, 400_000_000, 1);
        Arc::new(service(chain).await.0)
    }

    #[tokio::test]
    async fn swap_tool_returns_receipt() {
        let tool = UniswapSwapTool::new(trading().await);
        let output = tool
            .execute(
                json!({
                    "token_in_address": USDC.address.to_string(),
                    "token_out_address": "WETH",
                    "amount_in": "2",
                    "slippage": 1
                }),
                &ToolContext::default(),
            )
            .await
            .unwrap();
        assert_eq!(output.result["status"], "CONFIRMED");
        assert_eq!(output.result["min_amount_out"], "0.000792");
        assert!(
            output.result["message"]
                .as_str()
                .unwrap()
                .starts_with("Successfully swapped 2 USDC")
        );
    }

    #[tokio::test]
    async fn swap_tool_requires_amount() {
        let tool = UniswapSwapTool::new(trading().await);
        let result = tool
            .execute(
                json!({"token_in_address": "USDC", "token_out_address": "WETH"}),
                &ToolContext::default(),
            )
            .await;
        assert!(matches!(result, Err(ToolError::InvalidParameters(_))));
    }

    #[tokio::test]
    async fn swap_tool_rejects_bad_recipient() {
        let tool = UniswapSwapTool::new(trading().await);
        let result = tool
            .execute(
                json!({
                    "token_in_address": "USDC",
                    "token_out_address": "WETH",
                    "amount_in": 1,
                    "recipient": "0xnot-an-address"
                }),
                &ToolContext::default(),
            )
            .await;
        assert!(matches!(result, Err(ToolError::InvalidParameters(_))));
    }

    #[tokio::test]
    async fn usdc_for_eth_shortcut() {
        let tool = TradeUsdcForEthTool::new(trading().await);
        let output = tool
            .execute(json!({"amount": 1}), &ToolContext::default())
            .await
            .unwrap();
        assert_eq!(output.result["token_in"], "USDC");
        assert_eq!(output.result["token_out"], "WETH");
        assert_eq!(output.result["slippage"], "0.5");
    }

    #[tokio::test]
    async fn usdc_for_eth_over_balance_fails() {
        let tool = TradeUsdcForEthTool::new(trading().await);
        let err = tool
            .execute(json!({"amount": "6"}), &ToolContext::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Insufficient balance"));
    }
}
