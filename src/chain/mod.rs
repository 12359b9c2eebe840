//! On-chain access for Base Sepolia.
//!
//! [`ChainClient`] is the seam between the trading logic and the network.
//! [`AlloyChain`] is the real implementation; tests use an in-memory mock.

pub mod alloy_client;
#[cfg(test)]
pub mod mock;
pub mod tokens;
pub mod units;

pub use alloy_client::AlloyChain;
pub use tokens::{KnownToken, USDC, WETH};

use std::time::Duration;

use alloy::primitives::{Address, B256, U256};
use async_trait::async_trait;
use serde::Serialize;

use crate::error::ChainError;

/// Chain id of Base Sepolia.
pub const BASE_SEPOLIA_CHAIN_ID: u64 = 84532;

/// Network identifier used in logs and tool output.
pub const BASE_SEPOLIA_NETWORK: &str = "base-sepolia";

const EXPLORER_TX_URL: &str = "https://sepolia.basescan.org/tx/";

/// Block explorer link for a transaction.
pub fn explorer_tx_link(tx_hash: &str) -> String {
    format!("{EXPLORER_TX_URL}{tx_hash}")
}

/// Parse a hex address, accepting mixed case.
pub fn parse_address(s: &str) -> Result<Address, ChainError> {
    s.trim()
        .parse::<Address>()
        .map_err(|_| ChainError::InvalidAddress(s.to_string()))
}

/// Parse a 32-byte transaction hash.
pub fn parse_tx_hash(s: &str) -> Result<B256, ChainError> {
    s.trim()
        .parse::<B256>()
        .map_err(|_| ChainError::InvalidTxHash(s.to_string()))
}

/// Summary of a block header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockInfo {
    pub number: u64,
    pub hash: String,
    pub timestamp: u64,
    pub gas_used: u64,
    pub gas_limit: u64,
    pub base_fee_per_gas: Option<u64>,
    pub transaction_count: usize,
}

/// ERC-20 metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenMetadata {
    pub address: Address,
    pub symbol: String,
    pub decimals: u8,
}

/// Receipt state of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    /// No receipt yet.
    Pending,
    Success,
    Reverted,
}

/// Arguments of a single-pool exact-input swap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapParams {
    pub token_in: Address,
    pub token_out: Address,
    /// Pool fee in hundredths of a bip.
    pub fee: u32,
    pub recipient: Address,
    pub amount_in: U256,
    pub amount_out_minimum: U256,
    /// Unix timestamp after which the router rejects the swap.
    pub deadline: u64,
}

/// Read and write access to the chain for the agent wallet.
#[async_trait]
pub trait ChainClient: Send + Sync {
    fn chain_id(&self) -> u64;

    fn network(&self) -> &str;

    /// Address of the signing wallet.
    fn wallet_address(&self) -> Address;

    async fn latest_block(&self) -> Result<BlockInfo, ChainError>;

    /// Current gas price in wei.
    async fn gas_price(&self) -> Result<u128, ChainError>;

    /// Native ETH balance in wei.
    async fn native_balance(&self, owner: Address) -> Result<U256, ChainError>;

    async fn token_metadata(&self, token: Address) -> Result<TokenMetadata, ChainError>;

    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256, ChainError>;

    async fn allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, ChainError>;

    /// Approve `spender` for `amount` and wait for the receipt.
    async fn approve(
        &self,
        token: Address,
        spender: Address,
        amount: U256,
    ) -> Result<B256, ChainError>;

    /// Expected output of a single-pool exact-input swap.
    async fn quote_exact_input_single(
        &self,
        token_in: Address,
        token_out: Address,
        fee: u32,
        amount_in: U256,
    ) -> Result<U256, ChainError>;

    /// Gas units the swap would consume.
    async fn estimate_swap_gas(&self, params: &SwapParams) -> Result<u64, ChainError>;

    /// Broadcast the swap and return its hash without waiting for inclusion.
    async fn submit_swap(&self, params: &SwapParams) -> Result<B256, ChainError>;

    async fn transaction_status(&self, tx_hash: B256) -> Result<TxStatus, ChainError>;

    /// Poll until the transaction has a receipt or `timeout` elapses.
    async fn wait_for_transaction(
        &self,
        tx_hash: B256,
        timeout: Duration,
    ) -> Result<TxStatus, ChainError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let status = self.transaction_status(tx_hash).await?;
            if status != TxStatus::Pending || tokio::time::Instant::now() >= deadline {
                return Ok(status);
            }
            tokio::time::sleep(Duration::from_secs(2)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explorer_link_format() {
        assert_eq!(
            explorer_tx_link("0xabc"),
            "https://sepolia.basescan.org/tx/0xabc"
        );
    }

    #[test]
    fn address_parsing() {
        assert_eq!(
            parse_address(" 0x4200000000000000000000000000000000000006 ").unwrap(),
            WETH.address
        );
        assert!(matches!(
            parse_address("0x1234"),
            Err(ChainError::InvalidAddress(_))
        ));
    }

    #[test]
    fn tx_hash_parsing() {
        let hash = format!("0x{}", "ab".repeat(32));
        assert!(parse_tx_hash(&hash).is_ok());
        assert!(matches!(
            parse_tx_hash("0xdead"),
            Err(ChainError::InvalidTxHash(_))
        ));
    }
}
