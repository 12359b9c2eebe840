use std::sync::Arc;

use smart_ape::agent::{ActionHook, Agent, AgentDeps, ConversationMemory};
use smart_ape::api::api_routes;
use smart_ape::chain::{AlloyChain, ChainClient};
use smart_ape::cli;
use smart_ape::config::{AppConfig, RunMode};
use smart_ape::llm::{LlmConfig, create_provider};
use smart_ape::monitor::{self, PriceMonitor};
use smart_ape::safety::SafetyLayer;
use smart_ape::store::{Database, LibSqlBackend};
use smart_ape::tools::ToolRegistry;
use smart_ape::tools::builtin::register_trading_tools;
use smart_ape::trading::TradingService;
use smart_ape::wallet::AgentWallet;
use tracing_appender::non_blocking::WorkerGuard;

fn init_tracing(log_dir: Option<&str>) -> Option<WorkerGuard> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match log_dir {
        Some(dir) => {
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, "smart-ape.log"));
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_target(false))
                .with(
                    fmt::layer()
                        .with_target(false)
                        .with_ansi(false)
                        .with_writer(writer),
                )
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .init();
            None
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Install rustls crypto provider before any TLS usage
    let _ = rustls::crypto::ring::default_provider().install_default();

    dotenvy::dotenv().ok();

    let config = AppConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        eprintln!("  export OPENAI_API_KEY=sk-...");
        std::process::exit(1);
    });

    let _log_guard = init_tracing(config.log_dir.as_deref());

    eprintln!("🦍 Smart Ape v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {}", config.agent.model);
    eprintln!("   Mode: {:?}", config.run_mode);
    eprintln!("   RPC: {}", config.chain.rpc_url);

    // ── Database ─────────────────────────────────────────────────────────
    let db_path = std::path::Path::new(&config.database_path);
    let db: Arc<dyn Database> = Arc::new(LibSqlBackend::new_local(db_path).await.unwrap_or_else(
        |e| {
            eprintln!(
                "Error: Failed to open database at {}: {}",
                config.database_path, e
            );
            std::process::exit(1);
        },
    ));
    eprintln!("   Database: {}", config.database_path);

    // ── Wallet + chain ──────────────────────────────────────────────────
    let (wallet, source) =
        AgentWallet::resolve(db.as_ref(), config.chain.wallet_private_key.as_ref()).await?;
    eprintln!("   Wallet: {} ({:?})", wallet.address(), source);

    let chain: Arc<dyn ChainClient> = Arc::new(AlloyChain::new(
        &config.chain.rpc_url,
        wallet.signer(),
        &config.trading,
    )?);

    let safety = SafetyLayer::new(config.trading.max_slippage);
    let trading = Arc::new(TradingService::new(
        chain,
        Arc::clone(&db),
        safety.clone(),
        config.trading.clone(),
    ));

    // ── Tools ────────────────────────────────────────────────────────────
    let tools = Arc::new(ToolRegistry::new());
    register_trading_tools(&tools, Arc::clone(&trading));
    eprintln!("   Tools: {} registered", tools.count());

    // ── Agent ───────────────────────────────────────────────────────────
    let llm = create_provider(&LlmConfig {
        api_key: config.openai_api_key.clone(),
        model: config.agent.model.clone(),
    })?;

    let deps = AgentDeps {
        llm,
        safety: Arc::new(safety),
        tools,
        memory: Arc::new(ConversationMemory::new(Arc::clone(&db))),
        actions: ActionHook::new(Arc::clone(&db)),
    };
    let agent = Arc::new(Agent::new(config.agent.clone(), deps));

    match config.run_mode {
        RunMode::Server => {
            if config.monitor.enabled {
                let price_monitor =
                    Arc::new(PriceMonitor::new(Arc::clone(&trading), config.monitor.clone()));
                let _monitor_handle = monitor::spawn_monitor(price_monitor)?;
                eprintln!("   Monitor: enabled ({})", config.monitor.schedule);
            } else {
                eprintln!("   Monitor: disabled");
            }

            let addr = config.server.bind_addr()?;
            eprintln!("   Chat API: http://{addr}/api/chat\n");

            let listener = tokio::net::TcpListener::bind(addr).await?;
            tracing::info!(%addr, "API server started");
            axum::serve(listener, api_routes(agent, trading)).await?;
        }
        RunMode::Chat => {
            eprintln!("   Type a message and press Enter. /quit to exit.\n");
            cli::run_chat(agent).await?;
        }
    }

    Ok(())
}
