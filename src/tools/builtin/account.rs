//! Wallet, chain and trade history tools.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;

use crate::context::ToolContext;
use crate::tools::tool::{Tool, ToolError, ToolOutput, require_str};
use crate::trading::TradingService;

const DEFAULT_TRADE_LIMIT: usize = 10;
const MAX_TRADE_LIMIT: usize = 100;

fn no_params() -> serde_json::Value {
    serde_json::json!({"type": "object", "properties": {}})
}

/// Latest Base Sepolia block.
pub struct LatestBlockTool {
    trading: Arc<TradingService>,
}

impl LatestBlockTool {
    pub fn new(trading: Arc<TradingService>) -> Self {
        Self { trading }
    }
}

#[async_trait]
impl Tool for LatestBlockTool {
    fn name(&self) -> &str {
        "get_latest_block"
    }

    fn description(&self) -> &str {
        "Get number, hash, timestamp and gas usage of the latest block."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        no_params()
    }

    async fn execute(
        &self,
        _params: serde_json::Value,
        _ctx: &ToolContext,
    ) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();
        let block = self.trading.latest_block().await?;
        ToolOutput::json(&block, start.elapsed())
    }
}

/// Receipt status of a trade transaction.
pub struct TradeStatusTool {
    trading: Arc<TradingService>,
}

impl TradeStatusTool {
    pub fn new(trading: Arc<TradingService>) -> Self {
        Self { trading }
    }
}

#[async_trait]
impl Tool for TradeStatusTool {
    fn name(&self) -> &str {
        "check_trade_status"
    }

    fn description(&self) -> &str {
        "Check whether a trade transaction is pending, confirmed or failed, and \
         update the stored trade accordingly."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "tx_hash": {"type": "string", "description": "Transaction hash (0x...)"}
            },
            "required": ["tx_hash"]
        })
    }

    async fn execute(
        &self,
        params: serde_json::Value,
        _ctx: &ToolContext,
    ) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();
        let report = self
            .trading
            .trade_status(require_str(&params, "tx_hash")?)
            .await?;
        ToolOutput::json(&report, start.elapsed())
    }
}

/// Most recent trades of the agent wallet.
pub struct RecentTradesTool {
    trading: Arc<TradingService>,
}

impl RecentTradesTool {
    pub fn new(trading: Arc<TradingService>) -> Self {
        Self { trading }
    }
}

#[async_trait]
impl Tool for RecentTradesTool {
    fn name(&self) -> &str {
        "get_recent_trades"
    }

    fn description(&self) -> &str {
        "List the most recent trades made by the agent wallet, newest first."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "limit": {
                    "type": "integer",
                    "description": "Maximum number of trades (default: 10, max: 100)"
                }
            }
        })
    }

    async fn execute(
        &self,
        params: serde_json::Value,
        _ctx: &ToolContext,
    ) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();
        let limit = params
            .get("limit")
            .and_then(|v| v.as_u64())
            .map(|n| (n as usize).clamp(1, MAX_TRADE_LIMIT))
            .unwrap_or(DEFAULT_TRADE_LIMIT);
        let trades = self.trading.recent_trades(limit).await?;
        Ok(ToolOutput::success(
            serde_json::json!({"count": trades.len(), "trades": trades}),
            start.elapsed(),
        ))
    }
}

/// Arbitrage opportunities still marked as detected.
pub struct ArbitrageOpportunitiesTool {
    trading: Arc<TradingService>,
}

impl ArbitrageOpportunitiesTool {
    pub fn new(trading: Arc<TradingService>) -> Self {
        Self { trading }
    }
}

#[async_trait]
impl Tool for ArbitrageOpportunitiesTool {
    fn name(&self) -> &str {
        "get_arbitrage_opportunities"
    }

    fn description(&self) -> &str {
        "List detected arbitrage opportunities, most profitable first."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        no_params()
    }

    async fn execute(
        &self,
        _params: serde_json::Value,
        _ctx: &ToolContext,
    ) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();
        let opportunities = self.trading.active_opportunities().await?;
        Ok(ToolOutput::success(
            serde_json::json!({"count": opportunities.len(), "opportunities": opportunities}),
            start.elapsed(),
        ))
    }
}

/// Address, network and balances of the agent wallet.
pub struct WalletDetailsTool {
    trading: Arc<TradingService>,
}

impl WalletDetailsTool {
    pub fn new(trading: Arc<TradingService>) -> Self {
        Self { trading }
    }
}

#[async_trait]
impl Tool for WalletDetailsTool {
    fn name(&self) -> &str {
        "get_wallet_details"
    }

    fn description(&self) -> &str {
        "Get the agent wallet address, network, and its ETH and USDC balances."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        no_params()
    }

    async fn execute(
        &self,
        _params: serde_json::Value,
        _ctx: &ToolContext,
    ) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();
        let summary = self.trading.wallet_summary().await?;
        ToolOutput::json(&summary, start.elapsed())
    }
}
