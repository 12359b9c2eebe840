//! Read-only market queries: prices, arbitrage paths and gas estimates.

use alloy::primitives::U256;
use rust_decimal::Decimal;
use serde::Serialize;

use super::TradingService;
use crate::chain::{SwapParams, tokens, units};
use crate::error::TradeError;

/// Price of one whole token, denominated in WETH.
#[derive(Debug, Clone, Serialize)]
pub struct TokenPrice {
    pub token: String,
    pub symbol: String,
    pub quote_symbol: String,
    pub price: Decimal,
}

/// Current price compared to the last recorded one.
#[derive(Debug, Clone, Serialize)]
pub struct PriceMovement {
    #[serde(flatten)]
    pub current: TokenPrice,
    pub previous: Option<Decimal>,
    pub change_percent: Option<Decimal>,
}

/// Result of walking a circular swap path with quotes.
#[derive(Debug, Clone, Serialize)]
pub struct ArbitrageCheck {
    pub path: Vec<String>,
    pub symbols: Vec<String>,
    pub amount_in: String,
    /// Quoted amount after each hop, in whole units of that hop's token.
    pub amounts: Vec<String>,
    pub amount_out: String,
    pub profit_percentage: Decimal,
    pub profitable: bool,
    /// Input to use when acting on the opportunity; zero when unprofitable.
    pub optimal_input: Decimal,
    pub opportunity_id: Option<i64>,
}

/// Estimated cost of a swap.
#[derive(Debug, Clone, Serialize)]
pub struct GasEstimate {
    pub token_in: String,
    pub token_out: String,
    pub amount_in: String,
    pub gas_units: u64,
    pub gas_price_wei: String,
    pub cost_eth: String,
}

impl TradingService {
    /// Quote one whole token against WETH and record the observation.
    pub async fn token_price(&self, token: &str) -> Result<TokenPrice, TradeError> {
        let address = tokens::resolve(token)?;
        let meta = self.metadata(address).await?;
        let weth = tokens::WETH;

        let price = if address == weth.address {
            Decimal::ONE
        } else {
            let one = U256::from(10u64).pow(U256::from(meta.decimals));
            let out = self
                .chain
                .quote_exact_input_single(address, weth.address, self.config.pool_fee, one)
                .await
                .map_err(|e| TradeError::Quote(e.to_string()))?;
            units::to_decimal(out, weth.decimals)?
        };

        self.store.record_price(&address.to_string(), price).await?;
        tracing::debug!(token = %meta.symbol, %price, "Price recorded");

        Ok(TokenPrice {
            token: address.to_string(),
            symbol: meta.symbol,
            quote_symbol: weth.symbol.to_string(),
            price,
        })
    }

    /// Price a token and compare it against the previous observation.
    pub async fn monitor_price(&self, token: &str) -> Result<PriceMovement, TradeError> {
        let address = tokens::resolve(token)?;
        let previous = self
            .store
            .get_price_history(&address.to_string(), 1)
            .await?
            .first()
            .and_then(|point| point.price.parse::<Decimal>().ok());

        let current = self.token_price(token).await?;
        let change_percent = previous
            .filter(|p| !p.is_zero())
            .map(|p| ((current.price - p) / p * Decimal::ONE_HUNDRED).round_dp(4));

        Ok(PriceMovement {
            current,
            previous,
            change_percent,
        })
    }

    /// Quote `amount_in` through a circular path such as `[USDC, WETH, USDC]`.
    ///
    /// Profitable paths are stored as `DETECTED` opportunities.
    pub async fn check_arbitrage(
        &self,
        path: &[String],
        amount_in: Decimal,
    ) -> Result<ArbitrageCheck, TradeError> {
        if path.len() < 3 {
            return Err(TradeError::InvalidPath(
                "path needs at least two hops".to_string(),
            ));
        }
        let addresses = path
            .iter()
            .map(|t| tokens::resolve(t))
            .collect::<Result<Vec<_>, _>>()?;
        if addresses.first() != addresses.last() {
            return Err(TradeError::InvalidPath(
                "path must start and end with the same token".to_string(),
            ));
        }
        if addresses.windows(2).any(|pair| pair[0] == pair[1]) {
            return Err(TradeError::InvalidPath(
                "consecutive tokens must differ".to_string(),
            ));
        }

        let mut metas = Vec::with_capacity(addresses.len());
        for address in &addresses {
            metas.push(self.metadata(*address).await?);
        }

        let start = units::to_atomic(amount_in, metas[0].decimals)?;
        let mut current = start;
        let mut amounts = Vec::with_capacity(addresses.len() - 1);
        for (i, pair) in addresses.windows(2).enumerate() {
            current = self
                .chain
                .quote_exact_input_single(pair[0], pair[1], self.config.pool_fee, current)
                .await
                .map_err(|e| TradeError::Quote(e.to_string()))?;
            if current.is_zero() {
                return Err(TradeError::Quote(format!(
                    "no output for {} -> {}",
                    metas[i].symbol,
                    metas[i + 1].symbol
                )));
            }
            amounts.push(units::from_atomic(current, metas[i + 1].decimals));
        }

        let decimals = metas[0].decimals;
        let input = units::to_decimal(start, decimals)?;
        let output = units::to_decimal(current, decimals)?;
        let profit_percentage = ((output - input) / input * Decimal::ONE_HUNDRED).round_dp(6);
        let profitable = current > start;
        let optimal_input = if profitable { input } else { Decimal::ZERO };

        let path_strings: Vec<String> = addresses.iter().map(|a| a.to_string()).collect();
        let opportunity_id = if profitable {
            let id = self
                .store
                .record_arbitrage_opportunity(&path_strings, profit_percentage, optimal_input)
                .await?;
            tracing::info!(opportunity_id = id, %profit_percentage, "Arbitrage opportunity detected");
            Some(id)
        } else {
            None
        };

        Ok(ArbitrageCheck {
            path: path_strings,
            symbols: metas.into_iter().map(|m| m.symbol).collect(),
            amount_in: units::from_atomic(start, decimals),
            amounts,
            amount_out: units::from_atomic(current, decimals),
            profit_percentage,
            profitable,
            optimal_input,
            opportunity_id,
        })
    }

    /// Estimate gas and cost in ETH for swapping `amount_in`.
    pub async fn estimate_gas(
        &self,
        token_in: &str,
        token_out: &str,
        amount_in: Decimal,
    ) -> Result<GasEstimate, TradeError> {
        let token_in = tokens::resolve(token_in)?;
        let token_out = tokens::resolve(token_out)?;
        let meta_in = self.metadata(token_in).await?;
        let meta_out = self.metadata(token_out).await?;
        let atomic_in = units::to_atomic(amount_in, meta_in.decimals)?;

        let quote = self
            .chain
            .quote_exact_input_single(token_in, token_out, self.config.pool_fee, atomic_in)
            .await
            .map_err(|e| TradeError::Quote(e.to_string()))?;
        let params = SwapParams {
            token_in,
            token_out,
            fee: self.config.pool_fee,
            recipient: self.chain.wallet_address(),
            amount_in: atomic_in,
            amount_out_minimum: units::min_amount_out(quote, self.config.default_slippage),
            deadline: self.swap_deadline(),
        };
        let gas_units = self
            .chain
            .estimate_swap_gas(&params)
            .await
            .map_err(|e| TradeError::GasEstimate(e.to_string()))?;
        let gas_price = self
            .chain
            .gas_price()
            .await
            .map_err(|e| TradeError::GasEstimate(e.to_string()))?;
        let cost = U256::from(gas_units) * U256::from(gas_price);

        Ok(GasEstimate {
            token_in: meta_in.symbol,
            token_out: meta_out.symbol,
            amount_in: units::from_atomic(atomic_in, meta_in.decimals),
            gas_units,
            gas_price_wei: gas_price.to_string(),
            cost_eth: units::from_atomic(cost, 18),
        })
    }
}
