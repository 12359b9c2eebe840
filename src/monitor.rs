//! Background price and arbitrage monitor driven by a cron schedule.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::chain::tokens::{self, KNOWN_TOKENS};
use crate::config::MonitorConfig;
use crate::error::ConfigError;
use crate::trading::TradingService;

/// Counters for one monitoring pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MonitorReport {
    pub prices_recorded: usize,
    pub opportunities_found: usize,
    pub failures: usize,
}

/// Prices the known tokens and quotes their WETH round trips.
pub struct PriceMonitor {
    trading: Arc<TradingService>,
    config: MonitorConfig,
}

impl PriceMonitor {
    pub fn new(trading: Arc<TradingService>, config: MonitorConfig) -> Self {
        Self { trading, config }
    }

    /// One pass over every known token except WETH. Failures are logged and
    /// counted; they never abort the pass.
    pub async fn run_once(&self) -> MonitorReport {
        let mut report = MonitorReport::default();
        let weth = tokens::WETH.address.to_string();

        for token in KNOWN_TOKENS
            .iter()
            .filter(|t| t.address != tokens::WETH.address)
        {
            let address = token.address.to_string();
            match self.trading.token_price(&address).await {
                Ok(price) => {
                    report.prices_recorded += 1;
                    tracing::debug!(token = token.symbol, price = %price.price, "Monitor price");
                }
                Err(e) => {
                    report.failures += 1;
                    tracing::warn!(token = token.symbol, "Monitor price check failed: {e}");
                }
            }

            let path = [address.clone(), weth.clone(), address];
            match self
                .trading
                .check_arbitrage(&path, self.config.probe_amount)
                .await
            {
                Ok(check) if check.profitable => {
                    report.opportunities_found += 1;
                    tracing::info!(
                        token = token.symbol,
                        profit_percentage = %check.profit_percentage,
                        "Monitor found arbitrage opportunity"
                    );
                }
                Ok(_) => {}
                Err(e) => {
                    report.failures += 1;
                    tracing::warn!(token = token.symbol, "Monitor arbitrage check failed: {e}");
                }
            }
        }

        tracing::info!(
            prices = report.prices_recorded,
            opportunities = report.opportunities_found,
            failures = report.failures,
            "Monitor pass complete"
        );
        report
    }
}

/// Next fire time of a cron expression.
pub fn next_fire(schedule: &cron::Schedule) -> Option<DateTime<Utc>> {
    schedule.upcoming(Utc).next()
}

/// Parse a cron expression (seconds field included).
pub fn parse_schedule(expr: &str) -> Result<cron::Schedule, ConfigError> {
    cron::Schedule::from_str(expr).map_err(|e| ConfigError::InvalidValue {
        key: "MONITOR_SCHEDULE".to_string(),
        message: format!("invalid cron: {e}"),
    })
}

/// Spawn the monitor loop. Each pass runs at the next cron fire time.
pub fn spawn_monitor(
    monitor: Arc<PriceMonitor>,
) -> Result<tokio::task::JoinHandle<()>, ConfigError> {
    let schedule = parse_schedule(&monitor.config.schedule)?;
    Ok(tokio::spawn(async move {
        loop {
            let Some(next) = next_fire(&schedule) else {
                tracing::warn!("Monitor schedule has no upcoming fire time, stopping");
                break;
            };
            let wait = (next - Utc::now()).to_std().unwrap_or(Duration::ZERO);
            tokio::time::sleep(wait).await;
            monitor.run_once().await;
        }
    }))
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;
    use crate::chain::mock::MockChain;
    use crate::chain::{USDC, WETH};
    use crate::store::Database;
    use crate::trading::test_support::service;

    fn config() -> MonitorConfig {
        MonitorConfig {
            enabled: true,
            schedule: "0 */5 * * * *".to_string(),
            probe_amount: dec!(1),
        }
    }

    #[tokio::test]
    async fn pass_records_prices_and_opportunities() {
        let chain = MockChain::new()
            .with_rate(USDC.address, WETH.address, 400_000_000, 1)
            .with_rate(WETH.address, USDC.address, 102, 40_000_000_000);
        let (trading, _, store) = service(chain).await;
        let monitor = PriceMonitor::new(Arc::new(trading), config());

        let report = monitor.run_once().await;
        assert_eq!(
            report,
            MonitorReport {
                prices_recorded: 1,
                opportunities_found: 1,
                failures: 0
            }
        );
        assert_eq!(
            store
                .get_price_history(&USDC.address.to_string(), 10)
                .await
                .unwrap()
                .len(),
            1
        );
        assert_eq!(
            store.get_active_arbitrage_opportunities().await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn failures_are_counted_not_fatal() {
        let (trading, _, _) = service(MockChain::new()).await;
        let monitor = PriceMonitor::new(Arc::new(trading), config());

        let report = monitor.run_once().await;
        assert_eq!(report.prices_recorded, 0);
        assert_eq!(report.failures, 2);
    }

    #[test]
    fn schedule_parsing() {
        let schedule = parse_schedule("0 */5 * * * *").unwrap();
        let next = next_fire(&schedule).unwrap();
        assert!(next > Utc::now());
        assert!(parse_schedule("every five minutes").is_err());
    }
}
