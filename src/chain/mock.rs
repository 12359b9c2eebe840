//! In-memory `ChainClient` for unit tests.

use std::collections::HashMap;
use std::sync::Mutex;

use alloy::primitives::{Address, B256, U256};
use async_trait::async_trait;

use crate::chain::{BlockInfo, ChainClient, SwapParams, TokenMetadata, TxStatus, tokens};
use crate::error::ChainError;

/// Scriptable chain: balances, quote rates and receipt outcomes are set by
/// the test, and every write is recorded.
pub struct MockChain {
    pub address: Address,
    pub block_number: u64,
    pub gas_price: u128,
    pub swap_gas: u64,
    pub native_balance: U256,
    pub balances: Mutex<HashMap<Address, U256>>,
    pub allowances: Mutex<HashMap<Address, U256>>,
    /// Output per input unit, as (numerator, denominator) per pair.
    pub rates: Mutex<HashMap<(Address, Address), (U256, U256)>>,
    pub metadata: Mutex<HashMap<Address, TokenMetadata>>,
    pub approvals: Mutex<Vec<(Address, Address, U256)>>,
    pub swaps: Mutex<Vec<SwapParams>>,
    pub receipts: Mutex<HashMap<B256, TxStatus>>,
    /// Status given to newly submitted swaps.
    pub swap_outcome: Mutex<TxStatus>,
    pub fail_submit: Mutex<Option<String>>,
}

impl MockChain {
    pub fn new() -> Self {
        Self {
            address: Address::repeat_byte(0xaa),
            block_number: 1_234_567,
            gas_price: 1_000_000_000,
            swap_gas: 150_000,
            native_balance: U256::from(10u64).pow(U256::from(18u64)),
            balances: Mutex::new(HashMap::new()),
            allowances: Mutex::new(HashMap::new()),
            rates: Mutex::new(HashMap::new()),
            metadata: Mutex::new(HashMap::new()),
            approvals: Mutex::new(Vec::new()),
            swaps: Mutex::new(Vec::new()),
            receipts: Mutex::new(HashMap::new()),
            swap_outcome: Mutex::new(TxStatus::Success),
            fail_submit: Mutex::new(None),
        }
    }

    pub fn with_balance(self, token: Address, amount: U256) -> Self {
        self.balances.lock().unwrap().insert(token, amount);
        self
    }

    pub fn with_allowance(self, token: Address, amount: U256) -> Self {
        self.allowances.lock().unwrap().insert(token, amount);
        self
    }

    /// Quote `token_in -> token_out` at `num / den` atomic out per atomic in.
    pub fn with_rate(self, token_in: Address, token_out: Address, num: u64, den: u64) -> Self {
        self.rates
            .lock()
            .unwrap()
            .insert((token_in, token_out), (U256::from(num), U256::from(den)));
        self
    }

    pub fn with_token(self, address: Address, symbol: &str, decimals: u8) -> Self {
        self.metadata.lock().unwrap().insert(
            address,
            TokenMetadata {
                address,
                symbol: symbol.to_string(),
                decimals,
            },
        );
        self
    }
}

impl Default for MockChain {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChainClient for MockChain {
    fn chain_id(&self) -> u64 {
        crate::chain::BASE_SEPOLIA_CHAIN_ID
    }

    fn network(&self) -> &str {
        crate::chain::BASE_SEPOLIA_NETWORK
    }

    fn wallet_address(&self) -> Address {
        self.address
    }

    async fn latest_block(&self) -> Result<BlockInfo, ChainError> {
        Ok(BlockInfo {
            number: self.block_number,
            hash: B256::repeat_byte(0x01).to_string(),
            timestamp: 1_700_000_000,
            gas_used: 1_000_000,
            gas_limit: 30_000_000,
            base_fee_per_gas: Some(1_000_000),
            transaction_count: 12,
        })
    }

    async fn gas_price(&self) -> Result<u128, ChainError> {
        Ok(self.gas_price)
    }

    async fn native_balance(&self, _owner: Address) -> Result<U256, ChainError> {
        Ok(self.native_balance)
    }

    async fn token_metadata(&self, token: Address) -> Result<TokenMetadata, ChainError> {
        if let Some(meta) = self.metadata.lock().unwrap().get(&token) {
            return Ok(meta.clone());
        }
        tokens::by_address(token)
            .map(|known| TokenMetadata {
                address: token,
                symbol: known.symbol.to_string(),
                decimals: known.decimals,
            })
            .ok_or_else(|| ChainError::rpc("decimals", "execution reverted"))
    }

    async fn token_balance(&self, token: Address, _owner: Address) -> Result<U256, ChainError> {
        Ok(self
            .balances
            .lock()
            .unwrap()
            .get(&token)
            .copied()
            .unwrap_or(U256::ZERO))
    }

    async fn allowance(
        &self,
        token: Address,
        _owner: Address,
        _spender: Address,
    ) -> Result<U256, ChainError> {
        Ok(self
            .allowances
            .lock()
            .unwrap()
            .get(&token)
            .copied()
            .unwrap_or(U256::ZERO))
    }

    async fn approve(
        &self,
        token: Address,
        spender: Address,
        amount: U256,
    ) -> Result<B256, ChainError> {
        self.approvals.lock().unwrap().push((token, spender, amount));
        self.allowances.lock().unwrap().insert(token, amount);
        Ok(B256::repeat_byte(0xa1))
    }

    async fn quote_exact_input_single(
        &self,
        token_in: Address,
        token_out: Address,
        _fee: u32,
        amount_in: U256,
    ) -> Result<U256, ChainError> {
        let rates = self.rates.lock().unwrap();
        let (num, den) = rates
            .get(&(token_in, token_out))
            .ok_or_else(|| ChainError::Quote {
                token_in: token_in.to_string(),
                token_out: token_out.to_string(),
                reason: "no pool".to_string(),
            })?;
        Ok(amount_in * *num / *den)
    }

    async fn estimate_swap_gas(&self, _params: &SwapParams) -> Result<u64, ChainError> {
        Ok(self.swap_gas)
    }

    async fn submit_swap(&self, params: &SwapParams) -> Result<B256, ChainError> {
        if let Some(reason) = self.fail_submit.lock().unwrap().clone() {
            return Err(ChainError::rpc("eth_sendRawTransaction", reason));
        }
        let mut swaps = self.swaps.lock().unwrap();
        swaps.push(params.clone());
        let hash = B256::repeat_byte(swaps.len() as u8);
        let outcome = *self.swap_outcome.lock().unwrap();
        self.receipts.lock().unwrap().insert(hash, outcome);
        Ok(hash)
    }

    async fn transaction_status(&self, tx_hash: B256) -> Result<TxStatus, ChainError> {
        Ok(self
            .receipts
            .lock()
            .unwrap()
            .get(&tx_hash)
            .copied()
            .unwrap_or(TxStatus::Pending))
    }
}
