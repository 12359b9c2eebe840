//! Persistence layer: SQLite-backed storage for the wallet, trades, market
//! data and conversation memory.

pub mod libsql_backend;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use traits::{
    ArbitrageOpportunity, ArbitrageStatus, ConversationMessage, Database, NewConversationMessage,
    NewTrade, PricePoint, TradeRecord, TradeStatus,
};
