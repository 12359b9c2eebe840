//! libSQL backend: async `Database` trait implementation.
//!
//! Supports local file and in-memory databases.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::error::DatabaseError;
use crate::store::migrations;
use crate::store::traits::{
    ArbitrageOpportunity, ArbitrageStatus, ConversationMessage, Database, NewConversationMessage,
    NewTrade, PricePoint, TradeRecord, TradeStatus,
};

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.run_migrations().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.run_migrations().await?;
        Ok(backend)
    }

    /// Get the connection.
    fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Run an `INSERT ... RETURNING id` statement.
    async fn insert_returning_id(
        &self,
        op: &str,
        sql: &str,
        params: impl libsql::params::IntoParams,
    ) -> Result<i64, DatabaseError> {
        let mut rows = self
            .conn()
            .query(sql, params)
            .await
            .map_err(|e| DatabaseError::Query(format!("{op}: {e}")))?;
        match rows.next().await {
            Ok(Some(row)) => row
                .get::<i64>(0)
                .map_err(|e| DatabaseError::Query(format!("{op} row parse: {e}"))),
            Ok(None) => Err(DatabaseError::Query(format!("{op}: no id returned"))),
            Err(e) => Err(DatabaseError::Query(format!("{op}: {e}"))),
        }
    }
}

// ── Helper functions ────────────────────────────────────────────────

fn now_str() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    // SQLite CURRENT_TIMESTAMP, with or without fractional seconds
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

/// Convert `Option<&str>` to libsql Value.
fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

fn opt_int(v: Option<i64>) -> libsql::Value {
    match v {
        Some(v) => libsql::Value::Integer(v),
        None => libsql::Value::Null,
    }
}

const TRADE_COLUMNS: &str = "id, wallet_id, token_in, token_out, amount_in, min_amount_out, status, tx_hash, gas_price, timestamp";

/// Map a libsql Row to a TradeRecord (column order matches TRADE_COLUMNS).
fn row_to_trade(row: &libsql::Row) -> Result<TradeRecord, libsql::Error> {
    let status: String = row.get(6)?;
    let timestamp: String = row.get(9)?;
    Ok(TradeRecord {
        id: row.get(0)?,
        wallet_id: row.get::<i64>(1).ok(),
        token_in: row.get(2)?,
        token_out: row.get(3)?,
        amount_in: row.get(4)?,
        min_amount_out: row.get(5)?,
        status: TradeStatus::parse(&status),
        tx_hash: row.get::<String>(7).ok(),
        gas_price: row.get::<String>(8).ok(),
        timestamp: parse_datetime(&timestamp),
    })
}

/// The path column holds a JSON array; older rows may hold a comma list.
fn parse_token_path(raw: &str) -> Vec<String> {
    serde_json::from_str(raw).unwrap_or_else(|_| {
        raw.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    })
}

fn row_to_opportunity(row: &libsql::Row) -> Result<ArbitrageOpportunity, libsql::Error> {
    let path: String = row.get(1)?;
    let status: String = row.get(4)?;
    let timestamp: String = row.get(5)?;
    Ok(ArbitrageOpportunity {
        id: row.get(0)?,
        token_path: parse_token_path(&path),
        profit_percentage: row.get(2)?,
        min_input_amount: row.get(3)?,
        status: ArbitrageStatus::parse(&status),
        timestamp: parse_datetime(&timestamp),
    })
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl Database for LibSqlBackend {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    // ── Wallet ──────────────────────────────────────────────────────

    async fn get_wallet_info(&self) -> Result<Option<String>, DatabaseError> {
        let mut rows = self
            .conn()
            .query("SELECT info FROM wallet WHERE id = 1", ())
            .await
            .map_err(|e| DatabaseError::Query(format!("get_wallet_info: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(row.get::<String>(0).ok()),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_wallet_info: {e}"))),
        }
    }

    async fn save_wallet_info(&self, info: &str) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "INSERT INTO wallet (id, info) VALUES (1, ?1)
                 ON CONFLICT(id) DO UPDATE SET info = excluded.info",
                params![info],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("save_wallet_info: {e}")))?;
        debug!("Wallet info saved");
        Ok(())
    }

    async fn add_erc20(&self, contract: &str) -> Result<bool, DatabaseError> {
        let changed = self
            .conn()
            .execute(
                "INSERT OR IGNORE INTO erc20s (contract) VALUES (?1)",
                params![contract],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("add_erc20: {e}")))?;
        if changed > 0 {
            debug!(contract, "ERC-20 contract registered");
        }
        Ok(changed > 0)
    }

    async fn list_erc20s(&self) -> Result<Vec<String>, DatabaseError> {
        let mut rows = self
            .conn()
            .query("SELECT contract FROM erc20s ORDER BY id", ())
            .await
            .map_err(|e| DatabaseError::Query(format!("list_erc20s: {e}")))?;

        let mut contracts = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            if let Ok(contract) = row.get::<String>(0) {
                contracts.push(contract);
            }
        }
        Ok(contracts)
    }

    // ── Trades ──────────────────────────────────────────────────────

    async fn record_trade(&self, trade: &NewTrade) -> Result<i64, DatabaseError> {
        let status = trade.initial_status();
        let id = self
            .insert_returning_id(
                "record_trade",
                "INSERT INTO trades (wallet_id, token_in, token_out, amount_in, min_amount_out, status, tx_hash, gas_price, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9) RETURNING id",
                params![
                    opt_int(trade.wallet_id),
                    trade.token_in.as_str(),
                    trade.token_out.as_str(),
                    trade.amount_in.normalize().to_string(),
                    trade.min_amount_out.normalize().to_string(),
                    status.as_str(),
                    opt_text(trade.tx_hash.as_deref()),
                    opt_text(trade.gas_price.as_deref()),
                    now_str(),
                ],
            )
            .await?;
        debug!(trade_id = id, status = %status, tx_hash = ?trade.tx_hash, "Trade recorded");
        Ok(id)
    }

    async fn update_trade_status(
        &self,
        tx_hash: &str,
        status: TradeStatus,
    ) -> Result<bool, DatabaseError> {
        let changed = self
            .conn()
            .execute(
                "UPDATE trades SET status = ?1 WHERE tx_hash = ?2",
                params![status.as_str(), tx_hash],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("update_trade_status: {e}")))?;
        debug!(tx_hash, status = %status, changed, "Trade status updated");
        Ok(changed > 0)
    }

    async fn get_trade_by_hash(&self, tx_hash: &str) -> Result<Option<TradeRecord>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {TRADE_COLUMNS} FROM trades WHERE tx_hash = ?1"),
                params![tx_hash],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_trade_by_hash: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => row_to_trade(&row)
                .map(Some)
                .map_err(|e| DatabaseError::Query(format!("get_trade_by_hash row parse: {e}"))),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_trade_by_hash: {e}"))),
        }
    }

    async fn get_recent_trades(
        &self,
        wallet_id: i64,
        limit: usize,
    ) -> Result<Vec<TradeRecord>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {TRADE_COLUMNS} FROM trades WHERE wallet_id = ?1 ORDER BY id DESC LIMIT ?2"
                ),
                params![wallet_id, limit as i64],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_recent_trades: {e}")))?;

        let mut trades = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            match row_to_trade(&row) {
                Ok(trade) => trades.push(trade),
                Err(e) => tracing::warn!("Skipping malformed trade row: {e}"),
            }
        }
        Ok(trades)
    }

    // ── Market data ─────────────────────────────────────────────────

    async fn record_price(&self, token_address: &str, price: Decimal) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "INSERT INTO price_monitoring (token_address, price_usd, timestamp) VALUES (?1, ?2, ?3)",
                params![token_address, price.normalize().to_string(), now_str()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("record_price: {e}")))?;
        Ok(())
    }

    async fn get_price_history(
        &self,
        token_address: &str,
        limit: usize,
    ) -> Result<Vec<PricePoint>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT id, token_address, price_usd, timestamp FROM price_monitoring
                 WHERE token_address = ?1 COLLATE NOCASE ORDER BY id DESC LIMIT ?2",
                params![token_address, limit as i64],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_price_history: {e}")))?;

        let mut points = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            let timestamp: String = row.get(3).unwrap_or_default();
            points.push(PricePoint {
                id: row.get(0).unwrap_or_default(),
                token_address: row.get(1).unwrap_or_default(),
                price: row.get(2).unwrap_or_default(),
                timestamp: parse_datetime(&timestamp),
            });
        }
        Ok(points)
    }

    async fn record_arbitrage_opportunity(
        &self,
        token_path: &[String],
        profit_percentage: Decimal,
        min_input_amount: Decimal,
    ) -> Result<i64, DatabaseError> {
        let path_json = serde_json::to_string(token_path)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
        let id = self
            .insert_returning_id(
                "record_arbitrage_opportunity",
                "INSERT INTO arbitrage_opportunities (token_path, profit_percentage, min_input_amount, status, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5) RETURNING id",
                params![
                    path_json,
                    profit_percentage.normalize().to_string(),
                    min_input_amount.normalize().to_string(),
                    ArbitrageStatus::Detected.as_str(),
                    now_str(),
                ],
            )
            .await?;
        info!(id, profit = %profit_percentage, path = ?token_path, "Arbitrage opportunity recorded");
        Ok(id)
    }

    async fn get_active_arbitrage_opportunities(
        &self,
    ) -> Result<Vec<ArbitrageOpportunity>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT id, token_path, profit_percentage, min_input_amount, status, timestamp
                 FROM arbitrage_opportunities
                 WHERE status = ?1
                 ORDER BY CAST(profit_percentage AS REAL) DESC, id DESC",
                params![ArbitrageStatus::Detected.as_str()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_active_arbitrage_opportunities: {e}")))?;

        let mut opportunities = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            match row_to_opportunity(&row) {
                Ok(opp) => opportunities.push(opp),
                Err(e) => tracing::warn!("Skipping malformed arbitrage row: {e}"),
            }
        }
        Ok(opportunities)
    }

    async fn update_arbitrage_status(
        &self,
        id: i64,
        status: ArbitrageStatus,
    ) -> Result<bool, DatabaseError> {
        let changed = self
            .conn()
            .execute(
                "UPDATE arbitrage_opportunities SET status = ?1 WHERE id = ?2",
                params![status.as_str(), id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("update_arbitrage_status: {e}")))?;
        Ok(changed > 0)
    }

    // ── Conversations ───────────────────────────────────────────────

    async fn ensure_conversation(&self, conversation_id: i64) -> Result<(), DatabaseError> {
        let now = now_str();
        self.conn()
            .execute(
                "INSERT INTO conversations (id, started_at, last_activity) VALUES (?1, ?2, ?2)
                 ON CONFLICT(id) DO UPDATE SET last_activity = excluded.last_activity",
                params![conversation_id, now],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("ensure_conversation: {e}")))?;
        Ok(())
    }

    async fn add_conversation_message(
        &self,
        conversation_id: i64,
        message: &NewConversationMessage,
    ) -> Result<i64, DatabaseError> {
        self.insert_returning_id(
            "add_conversation_message",
            "INSERT INTO conversation_messages (conversation_id, role, content, tool_call_id, tool_calls, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6) RETURNING id",
            params![
                conversation_id,
                message.role.as_str(),
                message.content.as_str(),
                opt_text(message.tool_call_id.as_deref()),
                opt_text(message.tool_calls.as_deref()),
                now_str(),
            ],
        )
        .await
    }

    async fn list_conversation_messages(
        &self,
        conversation_id: i64,
    ) -> Result<Vec<ConversationMessage>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT id, role, content, tool_call_id, tool_calls FROM conversation_messages
                 WHERE conversation_id = ?1 ORDER BY id ASC",
                params![conversation_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_conversation_messages: {e}")))?;

        let mut messages = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            messages.push(ConversationMessage {
                id: row.get(0).unwrap_or_default(),
                role: row.get(1).unwrap_or_default(),
                content: row.get(2).unwrap_or_default(),
                tool_call_id: row.get::<String>(3).ok(),
                tool_calls: row.get::<String>(4).ok(),
            });
        }
        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    /// In-memory database with the agent wallet row in place, as startup
    /// leaves it.
    async fn test_db() -> LibSqlBackend {
        let db = LibSqlBackend::new_memory().await.unwrap();
        db.save_wallet_info("{}").await.unwrap();
        db
    }

    fn make_trade(tx_hash: Option<&str>) -> NewTrade {
        NewTrade {
            wallet_id: Some(1),
            token_in: "0x036CbD53842c5426634e7929541eC2318f3dCF7e".into(),
            token_out: "0x4200000000000000000000000000000000000006".into(),
            amount_in: dec!(1.50),
            min_amount_out: dec!(0.00049),
            tx_hash: tx_hash.map(str::to_string),
            gas_price: Some("1000000".into()),
        }
    }

    // ── Wallet ──────────────────────────────────────────────────────

    #[tokio::test]
    async fn wallet_info_upserts_single_row() {
        let db = LibSqlBackend::new_memory().await.unwrap();
        assert!(db.get_wallet_info().await.unwrap().is_none());

        db.save_wallet_info(r#"{"address":"0x1"}"#).await.unwrap();
        db.save_wallet_info(r#"{"address":"0x2"}"#).await.unwrap();

        assert_eq!(
            db.get_wallet_info().await.unwrap().as_deref(),
            Some(r#"{"address":"0x2"}"#)
        );
    }

    #[tokio::test]
    async fn erc20_registration_is_idempotent() {
        let db = test_db().await;
        assert!(db.add_erc20("0xaaa").await.unwrap());
        assert!(!db.add_erc20("0xaaa").await.unwrap());
        assert!(db.add_erc20("0xbbb").await.unwrap());
        assert_eq!(db.list_erc20s().await.unwrap(), vec!["0xaaa", "0xbbb"]);
    }

    // ── Trades ──────────────────────────────────────────────────────

    #[tokio::test]
    async fn trade_with_hash_starts_pending() {
        let db = test_db().await;
        db.record_trade(&make_trade(Some("0xabc"))).await.unwrap();

        let trade = db.get_trade_by_hash("0xabc").await.unwrap().unwrap();
        assert_eq!(trade.status, TradeStatus::Pending);
        assert_eq!(trade.amount_in, "1.5");
        assert_eq!(trade.min_amount_out, "0.00049");
        assert_eq!(trade.gas_price.as_deref(), Some("1000000"));
        assert_eq!(trade.wallet_id, Some(1));
    }

    #[tokio::test]
    async fn trade_without_hash_is_failed() {
        let db = test_db().await;
        let id = db.record_trade(&make_trade(None)).await.unwrap();

        let trades = db.get_recent_trades(1, 10).await.unwrap();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].id, id);
        assert_eq!(trades[0].status, TradeStatus::Failed);
        assert!(trades[0].tx_hash.is_none());
    }

    #[tokio::test]
    async fn update_trade_status_reports_changes() {
        let db = test_db().await;
        db.record_trade(&make_trade(Some("0xabc"))).await.unwrap();

        assert!(
            db.update_trade_status("0xabc", TradeStatus::Confirmed)
                .await
                .unwrap()
        );
        assert!(
            !db.update_trade_status("0xmissing", TradeStatus::Confirmed)
                .await
                .unwrap()
        );
        let trade = db.get_trade_by_hash("0xabc").await.unwrap().unwrap();
        assert_eq!(trade.status, TradeStatus::Confirmed);
    }

    #[tokio::test]
    async fn recent_trades_newest_first_with_limit() {
        let db = test_db().await;
        for hash in ["0x1", "0x2", "0x3"] {
            db.record_trade(&make_trade(Some(hash))).await.unwrap();
        }
        db.conn()
            .execute("INSERT INTO wallet (id, info) VALUES (2, '{}')", ())
            .await
            .unwrap();
        let mut other_wallet = make_trade(Some("0x4"));
        other_wallet.wallet_id = Some(2);
        db.record_trade(&other_wallet).await.unwrap();

        let trades = db.get_recent_trades(1, 2).await.unwrap();
        let hashes: Vec<_> = trades.iter().filter_map(|t| t.tx_hash.clone()).collect();
        assert_eq!(hashes, vec!["0x3", "0x2"]);
    }

    #[tokio::test]
    async fn trade_for_unknown_wallet_is_rejected() {
        let db = LibSqlBackend::new_memory().await.unwrap();
        let err = db.record_trade(&make_trade(Some("0xabc"))).await;
        assert!(matches!(err, Err(DatabaseError::Query(_))));

        let mut unowned = make_trade(Some("0xdef"));
        unowned.wallet_id = None;
        db.record_trade(&unowned).await.unwrap();
    }

    #[tokio::test]
    async fn duplicate_tx_hash_is_rejected() {
        let db = test_db().await;
        db.record_trade(&make_trade(Some("0xdup"))).await.unwrap();
        let err = db.record_trade(&make_trade(Some("0xdup"))).await;
        assert!(matches!(err, Err(DatabaseError::Query(_))));
    }

    // ── Market data ─────────────────────────────────────────────────

    #[tokio::test]
    async fn price_history_newest_first() {
        let db = test_db().await;
        db.record_price("0xToken", dec!(0.0003)).await.unwrap();
        db.record_price("0xToken", dec!(0.0004)).await.unwrap();
        db.record_price("0xOther", dec!(1)).await.unwrap();

        let history = db.get_price_history("0xtoken", 10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].price, "0.0004");
        assert_eq!(history[1].price, "0.0003");
        assert!(history[0].timestamp > DateTime::<Utc>::MIN_UTC);
    }

    #[tokio::test]
    async fn active_opportunities_sorted_by_numeric_profit() {
        let db = test_db().await;
        let path = vec!["0xa".to_string(), "0xb".to_string(), "0xa".to_string()];
        // As text "9.5" > "10.2"; numerically it is not.
        db.record_arbitrage_opportunity(&path, dec!(9.5), dec!(1))
            .await
            .unwrap();
        let best = db
            .record_arbitrage_opportunity(&path, dec!(10.2), dec!(1))
            .await
            .unwrap();
        let stale = db
            .record_arbitrage_opportunity(&path, dec!(50), dec!(1))
            .await
            .unwrap();
        assert!(
            db.update_arbitrage_status(stale, ArbitrageStatus::Expired)
                .await
                .unwrap()
        );

        let active = db.get_active_arbitrage_opportunities().await.unwrap();
        assert_eq!(active.len(), 2);
        assert_eq!(active[0].id, best);
        assert_eq!(active[0].token_path, path);
        assert_eq!(active[1].profit_percentage, "9.5");
        assert!(active.iter().all(|o| o.status == ArbitrageStatus::Detected));
    }

    #[test]
    fn token_path_accepts_comma_list() {
        assert_eq!(parse_token_path("0xa, 0xb,0xa"), vec!["0xa", "0xb", "0xa"]);
        assert_eq!(parse_token_path(r#"["0xa","0xb"]"#), vec!["0xa", "0xb"]);
    }

    #[test]
    fn parses_sqlite_timestamps() {
        let dt = parse_datetime("2025-01-02 03:04:05");
        assert_eq!(dt.to_rfc3339(), "2025-01-02T03:04:05+00:00");
        assert_eq!(parse_datetime("garbage"), DateTime::<Utc>::MIN_UTC);
    }

    // ── Conversations ───────────────────────────────────────────────

    #[tokio::test]
    async fn conversation_messages_round_trip_in_order() {
        let db = test_db().await;
        db.ensure_conversation(7).await.unwrap();
        db.ensure_conversation(7).await.unwrap();

        db.add_conversation_message(
            7,
            &NewConversationMessage {
                role: "user".into(),
                content: "trade 1 usdc for eth".into(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        db.add_conversation_message(
            7,
            &NewConversationMessage {
                role: "tool".into(),
                content: "ok".into(),
                tool_call_id: Some("call_1".into()),
                tool_calls: None,
            },
        )
        .await
        .unwrap();

        let messages = db.list_conversation_messages(7).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "user");
        assert_eq!(messages[1].tool_call_id.as_deref(), Some("call_1"));
        assert!(db.list_conversation_messages(8).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn local_file_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("agent.db");
        let db = LibSqlBackend::new_local(&path).await.unwrap();
        db.add_erc20("0xaaa").await.unwrap();
        assert!(path.exists());
    }
}
