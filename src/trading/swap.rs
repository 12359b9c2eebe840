//! Single-pool exact-input swaps through SwapRouter02.

use alloy::primitives::Address;
use rust_decimal::Decimal;
use serde::Serialize;

use super::TradingService;
use crate::chain::{self, SwapParams, TxStatus, tokens, units};
use crate::error::TradeError;
use crate::store::{NewTrade, TradeStatus};
use crate::wallet::WALLET_ROW_ID;

/// A swap as requested by the agent. Tokens are symbols or addresses.
#[derive(Debug, Clone)]
pub struct SwapRequest {
    pub token_in: String,
    pub token_out: String,
    /// Whole units of `token_in`.
    pub amount_in: Decimal,
    /// Slippage tolerance in percent; the configured default when absent.
    pub slippage: Option<Decimal>,
    /// Receiver of the output; the agent wallet when absent.
    pub recipient: Option<Address>,
}

/// Outcome of a submitted swap.
#[derive(Debug, Clone, Serialize)]
pub struct SwapReceipt {
    pub tx_hash: String,
    pub explorer_url: String,
    pub token_in: String,
    pub token_out: String,
    pub token_in_address: String,
    pub token_out_address: String,
    pub amount_in: String,
    pub min_amount_out: String,
    pub expected_amount_out: String,
    pub slippage: Decimal,
    pub status: TradeStatus,
    pub trade_id: i64,
    pub message: String,
}

impl TradingService {
    /// Swap `amount_in` of one token for another on the configured fee tier.
    ///
    /// The trade is recorded as `PENDING` once broadcast and moved to
    /// `CONFIRMED` or `FAILED` when the receipt arrives in time. A swap that
    /// never gets a hash is recorded as `FAILED`.
    pub async fn swap(&self, request: SwapRequest) -> Result<SwapReceipt, TradeError> {
        if request.amount_in <= Decimal::ZERO {
            return Err(TradeError::NonPositiveAmount);
        }
        let slippage = self
            .safety
            .check_slippage(request.slippage.unwrap_or(self.config.default_slippage))?;

        let token_in = tokens::resolve(&request.token_in)?;
        let token_out = tokens::resolve(&request.token_out)?;
        if token_in == token_out {
            return Err(TradeError::InvalidPath(
                "input and output token are the same".to_string(),
            ));
        }
        let meta_in = self.metadata(token_in).await?;
        let meta_out = self.metadata(token_out).await?;
        let amount_in = units::to_atomic(request.amount_in, meta_in.decimals)?;

        let owner = self.chain.wallet_address();
        let balance = self.chain.token_balance(token_in, owner).await?;
        if balance < amount_in {
            return Err(TradeError::InsufficientBalance {
                have: format!("{} {}", units::from_atomic(balance, meta_in.decimals), meta_in.symbol),
                need: format!("{} {}", request.amount_in.normalize(), meta_in.symbol),
            });
        }

        let allowance = self
            .chain
            .allowance(token_in, owner, self.config.router)
            .await?;
        if allowance < amount_in {
            tracing::info!(token = %meta_in.symbol, "Approving router for swap amount");
            self.chain
                .approve(token_in, self.config.router, amount_in)
                .await
                .map_err(|e| TradeError::Approval(e.to_string()))?;
        }

        let quote = self
            .chain
            .quote_exact_input_single(token_in, token_out, self.config.pool_fee, amount_in)
            .await
            .map_err(|e| TradeError::Quote(e.to_string()))?;
        if quote.is_zero() {
            return Err(TradeError::Quote(format!(
                "no liquidity for {} -> {}",
                meta_in.symbol, meta_out.symbol
            )));
        }
        let min_out = units::min_amount_out(quote, slippage);

        let params = SwapParams {
            token_in,
            token_out,
            fee: self.config.pool_fee,
            recipient: request.recipient.unwrap_or(owner),
            amount_in,
            amount_out_minimum: min_out,
            deadline: self.swap_deadline(),
        };
        self.chain
            .estimate_swap_gas(&params)
            .await
            .map_err(|e| TradeError::GasEstimate(e.to_string()))?;
        let gas_price = match self.chain.gas_price().await {
            Ok(price) => Some(price.to_string()),
            Err(e) => {
                tracing::warn!("Could not read gas price for trade record: {e}");
                None
            }
        };

        let min_out_decimal = units::to_decimal(min_out, meta_out.decimals)?;
        let mut trade = NewTrade {
            wallet_id: Some(WALLET_ROW_ID),
            token_in: token_in.to_string(),
            token_out: token_out.to_string(),
            amount_in: request.amount_in,
            min_amount_out: min_out_decimal,
            tx_hash: None,
            gas_price,
        };

        let tx_hash = match self.chain.submit_swap(&params).await {
            Ok(hash) => hash,
            Err(e) => {
                if let Err(db_err) = self.store.record_trade(&trade).await {
                    tracing::warn!("Failed to record failed trade: {db_err}");
                }
                return Err(TradeError::Execution(e.to_string()));
            }
        };
        let hash_str = tx_hash.to_string();
        trade.tx_hash = Some(hash_str.clone());
        let trade_id = self.store.record_trade(&trade).await?;
        tracing::info!(tx_hash = %hash_str, trade_id, "Swap submitted");

        let status = match self
            .chain
            .wait_for_transaction(tx_hash, self.receipt_timeout)
            .await
        {
            Ok(TxStatus::Success) => TradeStatus::Confirmed,
            Ok(TxStatus::Reverted) => TradeStatus::Failed,
            Ok(TxStatus::Pending) => TradeStatus::Pending,
            Err(e) => {
                tracing::warn!(tx_hash = %hash_str, "Receipt lookup failed: {e}");
                TradeStatus::Pending
            }
        };
        if status != TradeStatus::Pending {
            self.store.update_trade_status(&hash_str, status).await?;
        }

        let explorer_url = chain::explorer_tx_link(&hash_str);
        if status == TradeStatus::Failed {
            return Err(TradeError::Execution(format!(
                "transaction reverted: {explorer_url}"
            )));
        }

        self.register_token(token_in).await;
        self.register_token(token_out).await;

        let amount_in_str = request.amount_in.normalize().to_string();
        let min_out_str = units::from_atomic(min_out, meta_out.decimals);
        let mut message = format!(
            "Successfully swapped {amount_in_str} {} for at least {min_out_str} {}\nTransaction hash: {hash_str}\nTransaction link: {explorer_url}",
            meta_in.symbol, meta_out.symbol
        );
        if status == TradeStatus::Pending {
            message.push_str("\nThe transaction is still pending confirmation.");
        }

        Ok(SwapReceipt {
            tx_hash: hash_str,
            explorer_url,
            token_in: meta_in.symbol,
            token_out: meta_out.symbol,
            token_in_address: token_in.to_string(),
            token_out_address: token_out.to_string(),
            amount_in: amount_in_str,
            min_amount_out: min_out_str,
            expected_amount_out: units::from_atomic(quote, meta_out.decimals),
            slippage,
            status,
            trade_id,
            message,
        })
    }

    pub(super) fn swap_deadline(&self) -> u64 {
        (chrono::Utc::now().timestamp().max(0) as u64) + self.config.deadline.as_secs()
    }
}
