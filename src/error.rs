//! Error types for Smart Ape.

use std::time::Duration;

/// Top-level error type for the service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Chain error: {0}")]
    Chain(#[from] ChainError),

    #[error("Trade error: {0}")]
    Trade(#[from] TradeError),

    #[error("Safety error: {0}")]
    Safety(#[from] SafetyError),

    #[error("Wallet error: {0}")]
    Wallet(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} rate limited, retry after {retry_after:?}")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// RPC / on-chain errors.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("Invalid RPC URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid transaction hash: {0}")]
    InvalidTxHash(String),

    #[error("RPC call {method} failed: {reason}")]
    Rpc { method: String, reason: String },

    #[error("Transaction {tx_hash} reverted")]
    Reverted { tx_hash: String },

    #[error("Pool fee {0} does not fit in uint24")]
    InvalidFee(u32),

    #[error("Quote failed for {token_in} -> {token_out}: {reason}")]
    Quote {
        token_in: String,
        token_out: String,
        reason: String,
    },
}

impl ChainError {
    /// Build an RPC error from any displayable transport error.
    pub fn rpc(method: &str, err: impl std::fmt::Display) -> Self {
        Self::Rpc {
            method: method.to_string(),
            reason: err.to_string(),
        }
    }
}

/// Trade workflow errors (swap, quote, arbitrage).
#[derive(Debug, thiserror::Error)]
pub enum TradeError {
    #[error("Input amount must be greater than 0")]
    NonPositiveAmount,

    #[error("Invalid amount {amount}: {reason}")]
    InvalidAmount { amount: String, reason: String },

    #[error("Insufficient balance. Have {have}, need {need}")]
    InsufficientBalance { have: String, need: String },

    #[error("Error approving Uniswap Router as spender: {0}")]
    Approval(String),

    #[error("Error getting quote: {0}")]
    Quote(String),

    #[error("Error estimating gas: {0}")]
    GasEstimate(String),

    #[error("Error executing swap: {0}")]
    Execution(String),

    #[error("Invalid token path: {0}")]
    InvalidPath(String),

    #[error("Unknown token: {0}")]
    UnknownToken(String),

    #[error("Chain error: {0}")]
    Chain(#[from] ChainError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Safety(#[from] SafetyError),
}

/// Safety/validation errors.
#[derive(Debug, thiserror::Error)]
pub enum SafetyError {
    #[error("Input rejected: {reason}")]
    InvalidInput { reason: String },

    #[error("Slippage {requested}% exceeds the maximum of {max}%")]
    SlippageTooHigh { requested: String, max: String },

    #[error("Policy violation: {rule}")]
    PolicyViolation { rule: String },
}

/// Result type alias for the service.
pub type Result<T> = std::result::Result<T, Error>;
