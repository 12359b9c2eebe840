//! Unified `Database` trait: single async interface for all persistence.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::DatabaseError;

/// Lifecycle of a recorded trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeStatus {
    /// Submitted, waiting for a receipt.
    Pending,
    /// Mined with a success status.
    Confirmed,
    /// Never submitted, or reverted.
    Failed,
}

impl TradeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Confirmed => "CONFIRMED",
            Self::Failed => "FAILED",
        }
    }

    /// Parse a DB value; unknown strings are treated as pending.
    pub fn parse(s: &str) -> Self {
        match s {
            "CONFIRMED" => Self::Confirmed,
            "FAILED" => Self::Failed,
            _ => Self::Pending,
        }
    }
}

impl fmt::Display for TradeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a detected arbitrage opportunity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArbitrageStatus {
    Detected,
    Executed,
    Expired,
}

impl ArbitrageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Detected => "DETECTED",
            Self::Executed => "EXECUTED",
            Self::Expired => "EXPIRED",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "EXECUTED" => Self::Executed,
            "EXPIRED" => Self::Expired,
            _ => Self::Detected,
        }
    }
}

/// A trade about to be recorded.
#[derive(Debug, Clone)]
pub struct NewTrade {
    pub wallet_id: Option<i64>,
    pub token_in: String,
    pub token_out: String,
    /// Whole units of `token_in`.
    pub amount_in: Decimal,
    /// Whole units of `token_out`.
    pub min_amount_out: Decimal,
    pub tx_hash: Option<String>,
    /// Gas price in wei.
    pub gas_price: Option<String>,
}

impl NewTrade {
    /// Status the row starts with: pending when submitted, failed otherwise.
    pub fn initial_status(&self) -> TradeStatus {
        if self.tx_hash.is_some() {
            TradeStatus::Pending
        } else {
            TradeStatus::Failed
        }
    }
}

/// A persisted trade.
#[derive(Debug, Clone, Serialize)]
pub struct TradeRecord {
    pub id: i64,
    pub wallet_id: Option<i64>,
    pub token_in: String,
    pub token_out: String,
    pub amount_in: String,
    pub min_amount_out: String,
    pub status: TradeStatus,
    pub tx_hash: Option<String>,
    pub gas_price: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// One price observation.
#[derive(Debug, Clone, Serialize)]
pub struct PricePoint {
    pub id: i64,
    pub token_address: String,
    pub price: String,
    pub timestamp: DateTime<Utc>,
}

/// A persisted arbitrage opportunity.
#[derive(Debug, Clone, Serialize)]
pub struct ArbitrageOpportunity {
    pub id: i64,
    pub token_path: Vec<String>,
    pub profit_percentage: String,
    pub min_input_amount: String,
    pub status: ArbitrageStatus,
    pub timestamp: DateTime<Utc>,
}

/// A conversation message from the database.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationMessage {
    pub id: i64,
    pub role: String,
    pub content: String,
    pub tool_call_id: Option<String>,
    /// JSON-encoded tool calls made by an assistant message.
    pub tool_calls: Option<String>,
}

/// A conversation message about to be stored.
#[derive(Debug, Clone, Default)]
pub struct NewConversationMessage {
    pub role: String,
    pub content: String,
    pub tool_call_id: Option<String>,
    pub tool_calls: Option<String>,
}

/// Backend-agnostic database trait covering wallet, trades, market data and
/// conversations.
#[async_trait]
pub trait Database: Send + Sync {
    /// Run all pending schema migrations.
    async fn run_migrations(&self) -> Result<(), DatabaseError>;

    // ── Wallet ──────────────────────────────────────────────────────

    /// Exported wallet data (row id 1), if any.
    async fn get_wallet_info(&self) -> Result<Option<String>, DatabaseError>;

    /// Store the exported wallet data as row id 1.
    async fn save_wallet_info(&self, info: &str) -> Result<(), DatabaseError>;

    /// Register an ERC-20 contract. Returns true if it was new.
    async fn add_erc20(&self, contract: &str) -> Result<bool, DatabaseError>;

    /// All registered ERC-20 contracts in insertion order.
    async fn list_erc20s(&self) -> Result<Vec<String>, DatabaseError>;

    // ── Trades ──────────────────────────────────────────────────────

    /// Insert a trade and return its row id.
    async fn record_trade(&self, trade: &NewTrade) -> Result<i64, DatabaseError>;

    /// Set the status of the trade with the given hash. Returns true if a row changed.
    async fn update_trade_status(
        &self,
        tx_hash: &str,
        status: TradeStatus,
    ) -> Result<bool, DatabaseError>;

    async fn get_trade_by_hash(&self, tx_hash: &str) -> Result<Option<TradeRecord>, DatabaseError>;

    /// Most recent trades for a wallet, newest first.
    async fn get_recent_trades(
        &self,
        wallet_id: i64,
        limit: usize,
    ) -> Result<Vec<TradeRecord>, DatabaseError>;

    // ── Market data ─────────────────────────────────────────────────

    async fn record_price(&self, token_address: &str, price: Decimal) -> Result<(), DatabaseError>;

    /// Price observations for a token, newest first.
    async fn get_price_history(
        &self,
        token_address: &str,
        limit: usize,
    ) -> Result<Vec<PricePoint>, DatabaseError>;

    /// Record a detected opportunity and return its row id.
    async fn record_arbitrage_opportunity(
        &self,
        token_path: &[String],
        profit_percentage: Decimal,
        min_input_amount: Decimal,
    ) -> Result<i64, DatabaseError>;

    /// Opportunities still marked detected, most profitable first.
    async fn get_active_arbitrage_opportunities(
        &self,
    ) -> Result<Vec<ArbitrageOpportunity>, DatabaseError>;

    async fn update_arbitrage_status(
        &self,
        id: i64,
        status: ArbitrageStatus,
    ) -> Result<bool, DatabaseError>;

    // ── Conversations ───────────────────────────────────────────────

    /// Create the conversation if missing and bump its last activity.
    async fn ensure_conversation(&self, conversation_id: i64) -> Result<(), DatabaseError>;

    async fn add_conversation_message(
        &self,
        conversation_id: i64,
        message: &NewConversationMessage,
    ) -> Result<i64, DatabaseError>;

    /// All messages of a conversation, oldest first.
    async fn list_conversation_messages(
        &self,
        conversation_id: i64,
    ) -> Result<Vec<ConversationMessage>, DatabaseError>;
}
