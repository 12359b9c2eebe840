//! HTTP API: SSE chat plus read-only trading endpoints.

mod chat;

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use tower_http::cors::CorsLayer;

use crate::agent::Agent;
use crate::error::TradeError;
use crate::trading::TradingService;

const DEFAULT_TRADES_LIMIT: usize = 10;
const DEFAULT_PRICES_LIMIT: usize = 20;
const MAX_LIMIT: usize = 100;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub agent: Arc<Agent>,
    pub trading: Arc<TradingService>,
}

/// Build the Axum router with every API route and permissive CORS.
pub fn api_routes(agent: Arc<Agent>, trading: Arc<TradingService>) -> Router {
    let state = AppState { agent, trading };

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/api/chat", post(chat::chat))
        .route("/api/trades", get(list_trades))
        .route("/api/arbitrage", get(list_arbitrage))
        .route("/api/prices/{token}", get(price_history))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

fn error_response(status: StatusCode, message: impl std::fmt::Display) -> Response {
    (
        status,
        Json(serde_json::json!({"error": message.to_string()})),
    )
        .into_response()
}

fn trade_error_response(err: TradeError) -> Response {
    match err {
        TradeError::Chain(_) | TradeError::UnknownToken(_) | TradeError::InvalidPath(_) => {
            error_response(StatusCode::BAD_REQUEST, err)
        }
        other => {
            tracing::error!("API request failed: {other}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, other)
        }
    }
}

#[derive(Debug, Deserialize)]
struct LimitQuery {
    limit: Option<usize>,
}

impl LimitQuery {
    fn resolve(&self, default: usize) -> usize {
        self.limit.unwrap_or(default).clamp(1, MAX_LIMIT)
    }
}

// ── Status ──────────────────────────────────────────────────────────────

async fn root() -> impl IntoResponse {
    Json(serde_json::json!({"message": "Smart Ape API is running"}))
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "smart-ape"
    }))
}

// ── Trading data ────────────────────────────────────────────────────────

async fn list_trades(State(state): State<AppState>, Query(query): Query<LimitQuery>) -> Response {
    match state
        .trading
        .recent_trades(query.resolve(DEFAULT_TRADES_LIMIT))
        .await
    {
        Ok(trades) => Json(trades).into_response(),
        Err(e) => trade_error_response(e),
    }
}

async fn list_arbitrage(State(state): State<AppState>) -> Response {
    match state.trading.active_opportunities().await {
        Ok(opportunities) => Json(opportunities).into_response(),
        Err(e) => trade_error_response(e),
    }
}

async fn price_history(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Query(query): Query<LimitQuery>,
) -> Response {
    match state
        .trading
        .price_history(&token, query.resolve(DEFAULT_PRICES_LIMIT))
        .await
    {
        Ok(points) => Json(points).into_response(),
        Err(e) => trade_error_response(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_is_clamped() {
        assert_eq!(LimitQuery { limit: None }.resolve(10), 10);
        assert_eq!(LimitQuery { limit: Some(0) }.resolve(10), 1);
        assert_eq!(LimitQuery { limit: Some(500) }.resolve(10), MAX_LIMIT);
        assert_eq!(LimitQuery { limit: Some(3) }.resolve(10), 3);
    }
}
