//! `ChainClient` over an alloy HTTP provider with a local signer.

use std::time::Duration;

use alloy::eips::BlockNumberOrTag;
use alloy::network::{EthereumWallet, ReceiptResponse};
use alloy::primitives::{Address, B256, Bytes, U256, aliases::U24, aliases::U160};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::signers::local::PrivateKeySigner;
use alloy::sol;
use alloy::sol_types::SolCall;
use async_trait::async_trait;
use tracing::{debug, info};

use crate::chain::{
    BASE_SEPOLIA_CHAIN_ID, BASE_SEPOLIA_NETWORK, BlockInfo, ChainClient, SwapParams,
    TokenMetadata, TxStatus, tokens,
};
use crate::config::TradingConfig;
use crate::error::ChainError;

sol! {
    #[sol(rpc)]
    interface IERC20 {
        function balanceOf(address owner) external view returns (uint256);
        function allowance(address owner, address spender) external view returns (uint256);
        function approve(address spender, uint256 amount) external returns (bool);
        function decimals() external view returns (uint8);
        function symbol() external view returns (string);
    }

    #[sol(rpc)]
    interface IQuoterV2 {
        struct QuoteExactInputSingleParams {
            address tokenIn;
            address tokenOut;
            uint256 amountIn;
            uint24 fee;
            uint160 sqrtPriceLimitX96;
        }

        function quoteExactInputSingle(QuoteExactInputSingleParams memory params)
            external
            returns (
                uint256 amountOut,
                uint160 sqrtPriceX96After,
                uint32 initializedTicksCrossed,
                uint256 gasEstimate
            );
    }

    #[sol(rpc)]
    interface ISwapRouter02 {
        struct ExactInputSingleParams {
            address tokenIn;
            address tokenOut;
            uint24 fee;
            address recipient;
            uint256 amountIn;
            uint256 amountOutMinimum;
            uint160 sqrtPriceLimitX96;
        }

        function exactInputSingle(ExactInputSingleParams calldata params)
            external
            payable
            returns (uint256 amountOut);

        function multicall(uint256 deadline, bytes[] calldata data)
            external
            payable
            returns (bytes[] memory results);
    }
}

/// Upper bound on waiting for an approval to be mined.
pub const APPROVAL_RECEIPT_TIMEOUT: Duration = Duration::from_secs(60);

/// Base Sepolia client signing with the agent wallet.
pub struct AlloyChain {
    provider: DynProvider,
    address: Address,
    router: Address,
    quoter: Address,
}

impl AlloyChain {
    pub fn new(
        rpc_url: &str,
        signer: PrivateKeySigner,
        trading: &TradingConfig,
    ) -> Result<Self, ChainError> {
        let url: url::Url = rpc_url
            .parse()
            .map_err(|e| ChainError::InvalidUrl(format!("{rpc_url}: {e}")))?;

        let address = signer.address();
        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer))
            .connect_http(url)
            .erased();

        info!(
            wallet = %address,
            router = %trading.router,
            quoter = %trading.quoter,
            "Chain client ready"
        );

        Ok(Self {
            provider,
            address,
            router: trading.router,
            quoter: trading.quoter,
        })
    }

    /// Router multicall wrapping a single `exactInputSingle`.
    fn swap_call_data(params: &SwapParams) -> Result<(U256, Vec<Bytes>), ChainError> {
        let inner = ISwapRouter02::exactInputSingleCall {
            params: ISwapRouter02::ExactInputSingleParams {
                tokenIn: params.token_in,
                tokenOut: params.token_out,
                fee: fee_tier(params.fee)?,
                recipient: params.recipient,
                amountIn: params.amount_in,
                amountOutMinimum: params.amount_out_minimum,
                sqrtPriceLimitX96: U160::ZERO,
            },
        }
        .abi_encode();
        Ok((U256::from(params.deadline), vec![Bytes::from(inner)]))
    }
}

fn fee_tier(fee: u32) -> Result<U24, ChainError> {
    U24::try_from(fee).map_err(|_| ChainError::InvalidFee(fee))
}

#[async_trait]
impl ChainClient for AlloyChain {
    fn chain_id(&self) -> u64 {
        BASE_SEPOLIA_CHAIN_ID
    }

    fn network(&self) -> &str {
        BASE_SEPOLIA_NETWORK
    }

    fn wallet_address(&self) -> Address {
        self.address
    }

    async fn latest_block(&self) -> Result<BlockInfo, ChainError> {
        let block = self
            .provider
            .get_block_by_number(BlockNumberOrTag::Latest)
            .await
            .map_err(|e| ChainError::rpc("eth_getBlockByNumber", e))?
            .ok_or_else(|| ChainError::rpc("eth_getBlockByNumber", "latest block not found"))?;

        Ok(BlockInfo {
            number: block.header.number,
            hash: block.header.hash.to_string(),
            timestamp: block.header.timestamp,
            gas_used: block.header.gas_used,
            gas_limit: block.header.gas_limit,
            base_fee_per_gas: block.header.base_fee_per_gas,
            transaction_count: block.transactions.len(),
        })
    }

    async fn gas_price(&self) -> Result<u128, ChainError> {
        self.provider
            .get_gas_price()
            .await
            .map_err(|e| ChainError::rpc("eth_gasPrice", e))
    }

    async fn native_balance(&self, owner: Address) -> Result<U256, ChainError> {
        self.provider
            .get_balance(owner)
            .await
            .map_err(|e| ChainError::rpc("eth_getBalance", e))
    }

    async fn token_metadata(&self, token: Address) -> Result<TokenMetadata, ChainError> {
        if let Some(known) = tokens::by_address(token) {
            return Ok(TokenMetadata {
                address: token,
                symbol: known.symbol.to_string(),
                decimals: known.decimals,
            });
        }

        let erc20 = IERC20::new(token, self.provider.clone());
        let decimals = erc20
            .decimals()
            .call()
            .await
            .map_err(|e| ChainError::rpc("decimals", e))?;
        let symbol = erc20
            .symbol()
            .call()
            .await
            .map_err(|e| ChainError::rpc("symbol", e))?;
        debug!(%token, %symbol, decimals, "Fetched token metadata");

        Ok(TokenMetadata {
            address: token,
            symbol,
            decimals,
        })
    }

    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256, ChainError> {
        IERC20::new(token, self.provider.clone())
            .balanceOf(owner)
            .call()
            .await
            .map_err(|e| ChainError::rpc("balanceOf", e))
    }

    async fn allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, ChainError> {
        IERC20::new(token, self.provider.clone())
            .allowance(owner, spender)
            .call()
            .await
            .map_err(|e| ChainError::rpc("allowance", e))
    }

    async fn approve(
        &self,
        token: Address,
        spender: Address,
        amount: U256,
    ) -> Result<B256, ChainError> {
        let receipt = IERC20::new(token, self.provider.clone())
            .approve(spender, amount)
            .from(self.address)
            .send()
            .await
            .map_err(|e| ChainError::rpc("approve", e))?
            .with_timeout(Some(APPROVAL_RECEIPT_TIMEOUT))
            .get_receipt()
            .await
            .map_err(|e| ChainError::rpc("approve receipt", e))?;

        let tx_hash = receipt.transaction_hash();
        if !receipt.status() {
            return Err(ChainError::Reverted {
                tx_hash: tx_hash.to_string(),
            });
        }
        info!(%token, %spender, %amount, %tx_hash, "Approval confirmed");
        Ok(tx_hash)
    }

    async fn quote_exact_input_single(
        &self,
        token_in: Address,
        token_out: Address,
        fee: u32,
        amount_in: U256,
    ) -> Result<U256, ChainError> {
        let quoter = IQuoterV2::new(self.quoter, self.provider.clone());
        let quote = quoter
            .quoteExactInputSingle(IQuoterV2::QuoteExactInputSingleParams {
                tokenIn: token_in,
                tokenOut: token_out,
                amountIn: amount_in,
                fee: fee_tier(fee)?,
                sqrtPriceLimitX96: U160::ZERO,
            })
            .call()
            .await
            .map_err(|e| ChainError::Quote {
                token_in: token_in.to_string(),
                token_out: token_out.to_string(),
                reason: e.to_string(),
            })?;
        Ok(quote.amountOut)
    }

    async fn estimate_swap_gas(&self, params: &SwapParams) -> Result<u64, ChainError> {
        let (deadline, data) = Self::swap_call_data(params)?;
        ISwapRouter02::new(self.router, self.provider.clone())
            .multicall(deadline, data)
            .from(self.address)
            .estimate_gas()
            .await
            .map_err(|e| ChainError::rpc("eth_estimateGas", e))
    }

    async fn submit_swap(&self, params: &SwapParams) -> Result<B256, ChainError> {
        let (deadline, data) = Self::swap_call_data(params)?;
        let pending = ISwapRouter02::new(self.router, self.provider.clone())
            .multicall(deadline, data)
            .from(self.address)
            .send()
            .await
            .map_err(|e| ChainError::rpc("eth_sendRawTransaction", e))?;
        let tx_hash = *pending.tx_hash();
        info!(%tx_hash, amount_in = %params.amount_in, "Swap submitted");
        Ok(tx_hash)
    }

    async fn transaction_status(&self, tx_hash: B256) -> Result<TxStatus, ChainError> {
        let receipt = self
            .provider
            .get_transaction_receipt(tx_hash)
            .await
            .map_err(|e| ChainError::rpc("eth_getTransactionReceipt", e))?;
        Ok(match receipt {
            None => TxStatus::Pending,
            Some(r) if r.status() => TxStatus::Success,
            Some(_) => TxStatus::Reverted,
        })
    }
}
