//! Configuration types.
//!
//! Everything is read from environment variables (a `.env` file is loaded
//! first by `main`). Parsing goes through [`AppConfig::from_lookup`] so tests
//! can feed a map instead of touching the process environment.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use alloy::primitives::{Address, address};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use secrecy::SecretString;

use crate::error::ConfigError;

/// Default system prompt for the trading agent.
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are a helpful on-chain financial advisor. You help build personalized DeFi strategies, automate yield optimization, and manage risk, so users don't have to. You trade on the Base Sepolia network through Uniswap V3 with the agent's own wallet.

When a user requests a trade:
1. Parse the trade request to extract the amount and the tokens involved.
2. For USDC to ETH trades use the trade_usdc_for_eth tool; for anything else use uniswap_swap with token addresses.
3. Monitor the trade with check_trade_status and report back.
4. Give clear feedback about execution, transaction status and any errors.

Example requests:
- "trade 1 usdc for eth": amount 1 USDC, use trade_usdc_for_eth.
- "buy eth with 0.5 usdc": amount 0.5 USDC, use trade_usdc_for_eth.

Before trading, check prices (get_token_price) and gas costs (estimate_gas). Look for arbitrage opportunities with check_arbitrage when asked. Recent trades are available through get_recent_trades.

Token addresses on Base Sepolia:
- USDC: 0x036CbD53842c5426634e7929541eC2318f3dCF7e
- ETH (WETH): 0x4200000000000000000000000000000000000006

Remember to:
1. Always validate the trade amount.
2. Use appropriate slippage protection (default 1%).
3. Monitor trade status.
4. Handle errors gracefully."#;

/// How the binary runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// HTTP API server.
    Server,
    /// Interactive stdin/stdout chat.
    Chat,
}

impl FromStr for RunMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "server" => Ok(Self::Server),
            "chat" => Ok(Self::Chat),
            other => Err(format!("unknown run mode '{other}' (expected server or chat)")),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    /// Socket address to bind.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| ConfigError::InvalidValue {
                key: "HOST".to_string(),
                message: format!("{e}"),
            })
    }
}

/// Agent loop settings.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Model identifier sent to the LLM provider.
    pub model: String,
    /// System prompt prepended to every conversation.
    pub system_prompt: String,
    /// Maximum LLM round-trips per user turn.
    pub max_iterations: usize,
    /// Wait for a tool call that does not declare its own timeout.
    pub tool_timeout: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o".to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_iterations: 10,
            tool_timeout: Duration::from_secs(120),
        }
    }
}

/// On-chain connection settings.
#[derive(Debug, Clone)]
pub struct ChainConfig {
    pub rpc_url: String,
    /// Hex private key for the agent wallet, if supplied.
    pub wallet_private_key: Option<SecretString>,
}

/// Swap and quoting settings.
#[derive(Debug, Clone)]
pub struct TradingConfig {
    pub router: Address,
    pub quoter: Address,
    /// Pool fee tier in hundredths of a bip (3000 = 0.3%).
    pub pool_fee: u32,
    pub default_slippage: Decimal,
    pub max_slippage: Decimal,
    pub deadline: Duration,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            router: address!("94cC0AaC535CCDB3C01d6787D6413C739ae12bc4"),
            quoter: address!("C5290058841028F1614F3A6F0F5816cAd0df5E27"),
            pool_fee: 3000,
            default_slippage: dec!(0.5),
            max_slippage: dec!(5.0),
            deadline: Duration::from_secs(1800),
        }
    }
}

/// Background price monitor settings.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub enabled: bool,
    /// Cron expression (seconds field included).
    pub schedule: String,
    /// Whole-unit amount quoted around each arbitrage path.
    pub probe_amount: Decimal,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            schedule: "0 */5 * * * *".to_string(),
            probe_amount: Decimal::ONE,
        }
    }
}

/// Fee tiers (hundredths of a bip) with pools deployed by the Uniswap V3 factory.
pub const UNISWAP_FEE_TIERS: [u32; 4] = [100, 500, 3000, 10000];

/// Full application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub run_mode: RunMode,
    pub server: ServerConfig,
    pub database_path: String,
    pub openai_api_key: SecretString,
    pub agent: AgentConfig,
    pub chain: ChainConfig,
    pub trading: TradingConfig,
    pub monitor: MonitorConfig,
    pub log_dir: Option<String>,
}

impl AppConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let run_mode = match get("RUN_MODE") {
            Some(v) => v.parse().map_err(|message| ConfigError::InvalidValue {
                key: "RUN_MODE".to_string(),
                message,
            })?,
            None => RunMode::Server,
        };

        let openai_api_key = get("OPENAI_API_KEY")
            .map(SecretString::from)
            .ok_or_else(|| ConfigError::MissingEnvVar("OPENAI_API_KEY".to_string()))?;

        let agent_defaults = AgentConfig::default();
        let agent = AgentConfig {
            model: get("AGENT_MODEL").unwrap_or(agent_defaults.model),
            system_prompt: get("AGENT_SYSTEM_PROMPT").unwrap_or(agent_defaults.system_prompt),
            max_iterations: parse_or(&get, "AGENT_MAX_ITERATIONS", agent_defaults.max_iterations)?,
            tool_timeout: Duration::from_secs(parse_or(
                &get,
                "AGENT_TOOL_TIMEOUT_SECS",
                agent_defaults.tool_timeout.as_secs(),
            )?),
        };

        let trading_defaults = TradingConfig::default();
        let trading = TradingConfig {
            router: parse_or(&get, "UNISWAP_ROUTER_ADDRESS", trading_defaults.router)?,
            quoter: parse_or(&get, "UNISWAP_QUOTER_ADDRESS", trading_defaults.quoter)?,
            pool_fee: parse_or(&get, "POOL_FEE", trading_defaults.pool_fee)?,
            default_slippage: parse_or(
                &get,
                "DEFAULT_SLIPPAGE_PERCENT",
                trading_defaults.default_slippage,
            )?,
            max_slippage: parse_or(&get, "MAX_SLIPPAGE_PERCENT", trading_defaults.max_slippage)?,
            deadline: Duration::from_secs(parse_or(
                &get,
                "SWAP_DEADLINE_SECS",
                trading_defaults.deadline.as_secs(),
            )?),
        };
        if !UNISWAP_FEE_TIERS.contains(&trading.pool_fee) {
            return Err(ConfigError::InvalidValue {
                key: "POOL_FEE".to_string(),
                message: format!(
                    "{} is not a Uniswap V3 fee tier (expected one of {:?})",
                    trading.pool_fee, UNISWAP_FEE_TIERS
                ),
            });
        }
        if trading.default_slippage > trading.max_slippage {
            return Err(ConfigError::InvalidValue {
                key: "DEFAULT_SLIPPAGE_PERCENT".to_string(),
                message: format!(
                    "{} is above MAX_SLIPPAGE_PERCENT ({})",
                    trading.default_slippage, trading.max_slippage
                ),
            });
        }

        let monitor_defaults = MonitorConfig::default();
        let monitor = MonitorConfig {
            enabled: parse_bool_or(&get, "MONITOR_ENABLED", monitor_defaults.enabled)?,
            schedule: get("MONITOR_SCHEDULE").unwrap_or(monitor_defaults.schedule),
            probe_amount: parse_or(&get, "MONITOR_PROBE_AMOUNT", monitor_defaults.probe_amount)?,
        };
        if monitor.probe_amount <= Decimal::ZERO {
            return Err(ConfigError::InvalidValue {
                key: "MONITOR_PROBE_AMOUNT".to_string(),
                message: format!("{} must be positive", monitor.probe_amount),
            });
        }
        if monitor.enabled {
            crate::monitor::parse_schedule(&monitor.schedule)?;
        }

        Ok(Self {
            run_mode,
            server: ServerConfig {
                host: get("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: parse_or(&get, "PORT", 8000)?,
            },
            database_path: get("DATABASE_PATH").unwrap_or_else(|| "data/agent.db".to_string()),
            openai_api_key,
            agent,
            chain: ChainConfig {
                rpc_url: get("BASE_SEPOLIA_RPC_URL")
                    .unwrap_or_else(|| "https://sepolia.base.org".to_string()),
                wallet_private_key: get("WALLET_PRIVATE_KEY").map(SecretString::from),
            },
            trading,
            monitor,
            log_dir: get("LOG_DIR"),
        })
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        }),
        None => Ok(default),
    }
}

fn parse_bool_or<G>(get: &G, key: &str, default: bool) -> Result<bool, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    match get(key).map(|v| v.trim().to_ascii_lowercase()) {
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => Ok(true),
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => Ok(false),
        Some(v) => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("'{v}' is not a boolean"),
        }),
        None => Ok(default),
    }
}
