//! Built-in trading tools.

pub mod account;
pub mod market;
pub mod trade;

use std::sync::Arc;

use crate::tools::ToolRegistry;
use crate::trading::TradingService;

/// Names of the tools whose output may mention token contracts the agent
/// should start tracking.
pub const TRADE_TOOL_NAMES: &[&str] = &["uniswap_swap", "trade_usdc_for_eth"];

/// Register every trading tool on `registry`.
pub fn register_trading_tools(registry: &ToolRegistry, trading: Arc<TradingService>) {
    registry.register_sync(Arc::new(trade::UniswapSwapTool::new(trading.clone())));
    registry.register_sync(Arc::new(trade::TradeUsdcForEthTool::new(trading.clone())));
    registry.register_sync(Arc::new(market::TokenPriceTool::new(trading.clone())));
    registry.register_sync(Arc::new(market::MonitorPriceTool::new(trading.clone())));
    registry.register_sync(Arc::new(market::CheckArbitrageTool::new(trading.clone())));
    registry.register_sync(Arc::new(market::EstimateGasTool::new(trading.clone())));
    registry.register_sync(Arc::new(account::LatestBlockTool::new(trading.clone())));
    registry.register_sync(Arc::new(account::TradeStatusTool::new(trading.clone())));
    registry.register_sync(Arc::new(account::RecentTradesTool::new(trading.clone())));
    registry.register_sync(Arc::new(account::ArbitrageOpportunitiesTool::new(
        trading.clone(),
    )));
    registry.register_sync(Arc::new(account::WalletDetailsTool::new(trading)));
    tracing::debug!(count = registry.count(), "Trading tools registered");
}
