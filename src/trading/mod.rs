//! Trading workflows on Uniswap V3: swaps, prices, arbitrage checks and
//! bookkeeping of the resulting trades.

mod market;
mod swap;

pub use market::{ArbitrageCheck, GasEstimate, PriceMovement, TokenPrice};
pub use swap::{SwapReceipt, SwapRequest};

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;
use serde::Serialize;

use crate::chain::{self, BlockInfo, ChainClient, TokenMetadata, TxStatus, tokens, units};
use crate::config::TradingConfig;
use crate::error::TradeError;
use crate::safety::SafetyLayer;
use crate::store::{ArbitrageOpportunity, Database, PricePoint, TradeRecord, TradeStatus};
use crate::wallet::WALLET_ROW_ID;

/// How long a swap waits for its receipt before reporting it as pending.
const DEFAULT_RECEIPT_TIMEOUT: Duration = Duration::from_secs(60);

/// Balances of the agent wallet.
#[derive(Debug, Clone, Serialize)]
pub struct WalletSummary {
    pub address: String,
    pub network: String,
    pub chain_id: u64,
    pub eth_balance: String,
    pub usdc_balance: String,
}

/// Result of a trade status lookup.
#[derive(Debug, Clone, Serialize)]
pub struct TradeStatusReport {
    pub tx_hash: String,
    pub status: TradeStatus,
    pub explorer_url: String,
    /// Whether the hash belongs to a trade this agent recorded.
    pub recorded: bool,
}

/// Trading operations for the agent wallet.
pub struct TradingService {
    chain: Arc<dyn ChainClient>,
    store: Arc<dyn Database>,
    safety: SafetyLayer,
    config: TradingConfig,
    receipt_timeout: Duration,
}

impl TradingService {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        store: Arc<dyn Database>,
        safety: SafetyLayer,
        config: TradingConfig,
    ) -> Self {
        Self {
            chain,
            store,
            safety,
            config,
            receipt_timeout: DEFAULT_RECEIPT_TIMEOUT,
        }
    }

    pub fn with_receipt_timeout(mut self, timeout: Duration) -> Self {
        self.receipt_timeout = timeout;
        self
    }

    pub fn config(&self) -> &TradingConfig {
        &self.config
    }

    pub fn wallet_address(&self) -> Address {
        self.chain.wallet_address()
    }

    async fn metadata(&self, token: Address) -> Result<TokenMetadata, TradeError> {
        self.chain
            .token_metadata(token)
            .await
            .map_err(|e| TradeError::UnknownToken(format!("{token}: {e}")))
    }

    /// Register a token contract, logging instead of failing.
    pub async fn register_token(&self, contract: Address) {
        if let Err(e) = self.store.add_erc20(&contract.to_string()).await {
            tracing::warn!(%contract, "Failed to register ERC-20: {e}");
        }
    }

    pub async fn latest_block(&self) -> Result<BlockInfo, TradeError> {
        Ok(self.chain.latest_block().await?)
    }

    pub async fn wallet_summary(&self) -> Result<WalletSummary, TradeError> {
        let address = self.chain.wallet_address();
        let eth = self.chain.native_balance(address).await?;
        let usdc = self
            .chain
            .token_balance(tokens::USDC.address, address)
            .await?;
        Ok(WalletSummary {
            address: address.to_string(),
            network: self.chain.network().to_string(),
            chain_id: self.chain.chain_id(),
            eth_balance: units::from_atomic(eth, 18),
            usdc_balance: units::from_atomic(usdc, tokens::USDC.decimals),
        })
    }

    /// Look up a transaction receipt and persist the resulting status.
    pub async fn trade_status(&self, tx_hash: &str) -> Result<TradeStatusReport, TradeError> {
        let hash = chain::parse_tx_hash(tx_hash)?;
        let status = match self.chain.transaction_status(hash).await? {
            TxStatus::Pending => TradeStatus::Pending,
            TxStatus::Success => TradeStatus::Confirmed,
            TxStatus::Reverted => TradeStatus::Failed,
        };
        let hash_str = hash.to_string();
        let recorded = if status == TradeStatus::Pending {
            self.store.get_trade_by_hash(&hash_str).await?.is_some()
        } else {
            self.store.update_trade_status(&hash_str, status).await?
        };
        Ok(TradeStatusReport {
            explorer_url: chain::explorer_tx_link(&hash_str),
            tx_hash: hash_str,
            status,
            recorded,
        })
    }

    pub async fn recent_trades(&self, limit: usize) -> Result<Vec<TradeRecord>, TradeError> {
        Ok(self.store.get_recent_trades(WALLET_ROW_ID, limit).await?)
    }

    pub async fn active_opportunities(&self) -> Result<Vec<ArbitrageOpportunity>, TradeError> {
        Ok(self.store.get_active_arbitrage_opportunities().await?)
    }

    pub async fn price_history(
        &self,
        token: &str,
        limit: usize,
    ) -> Result<Vec<PricePoint>, TradeError> {
        let address = tokens::resolve(token)?;
        Ok(self
            .store
            .get_price_history(&address.to_string(), limit)
            .await?)
    }
}
