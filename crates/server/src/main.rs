//! Copytrade server — leaderboard and agent-wallet API for the Aptos copy-trading dashboard
//!
//! Usage:
//!   copytrade-server serve --port 3001       — Launch the API server
//!   copytrade-server leaderboard --top-n 10  — Print the top traders from CLI

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, patch, post},
    Router,
};
use clap::{Parser, Subcommand};
use engine::{
    build_leaderboard, execute_swaps, exit_octas, plan_swaps, AgentClient, AgentError, AgentSdk,
    FetchConfig, HasuraClient, PositionEventSource, TraderSummary, APTOS_COIN_TYPE,
    TOP_TRADERS_LIMIT,
};
use persistence::repository::{DepositRepository, TradeRepository, UserRepository};
use persistence::DbError;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "copytrade-server")]
#[command(about = "Leaderboard and agent-wallet API for the Aptos copy-trading dashboard", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch the API server
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
        /// Port to listen on
        #[arg(short, long, default_value_t = 3001)]
        port: u16,
    },
    /// Build the leaderboard once and print it (no web server)
    Leaderboard {
        /// Number of traders to print
        #[arg(long, default_value_t = TOP_TRADERS_LIMIT)]
        top_n: usize,
    },
}

type ApiResponse = (StatusCode, Json<Value>);

#[derive(Clone)]
struct AppState {
    events: Option<Arc<dyn PositionEventSource>>,
    fetch_config: FetchConfig,
    agent: Option<Arc<dyn AgentSdk>>,
    db: Arc<persistence::Database>,
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("debug,engine=debug,persistence=debug,copytrade_server=debug")
    } else {
        EnvFilter::new("info,engine=info,persistence=info,copytrade_server=info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).compact())
        .with(filter)
        .init();
}

fn db_path() -> String {
    std::env::var("COPYTRADE_DB_PATH").unwrap_or_else(|_| "data/copytrade.db".to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    dotenvy::dotenv().ok();

    match cli.command {
        Commands::Serve { host, port } => {
            cmd_serve(&host, port).await?;
        }
        Commands::Leaderboard { top_n } => {
            cmd_leaderboard(top_n).await?;
        }
    }

    Ok(())
}

// ============================================================================
// Serve command — Axum web server
// ============================================================================

fn api_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(api_health))
        .route("/top-traders", get(api_top_traders))
        .route("/take-exit", post(api_take_exit))
        .route("/buy-multiple-tokens", post(api_buy_multiple_tokens))
        .route("/users/:wallet", get(api_get_user))
        .route("/users/:wallet/investments", post(api_record_investment))
        .route("/users/:wallet/trades", get(api_user_trades))
        .route("/trades/:id/profit", patch(api_update_trade_profit))
        .with_state(state)
}

async fn cmd_serve(host: &str, port: u16) -> anyhow::Result<()> {
    info!("Copytrade server v{} starting...", APP_VERSION);

    let db_path = db_path();
    let db = persistence::Database::new(&db_path).await.map_err(|e| {
        error!("Failed to initialize database: {}", e);
        anyhow::anyhow!("Database initialization failed: {}", e)
    })?;
    info!("Database initialized: {}", db_path);

    let events: Option<Arc<dyn PositionEventSource>> = match HasuraClient::from_env() {
        Ok(client) => {
            info!(endpoint = client.endpoint(), "Hasura client configured");
            Some(Arc::new(client))
        }
        Err(e) => {
            warn!("{}; /api/top-traders will fail until it is set", e);
            None
        }
    };

    let agent: Option<Arc<dyn AgentSdk>> = match AgentClient::from_env() {
        Some(client) => Some(Arc::new(client)),
        None => {
            warn!("AGENT_SERVICE_URL is not set, exit and buy routes are disabled");
            None
        }
    };

    let fetch_config = FetchConfig::from_env();
    info!(page_size = fetch_config.page_size, "Leaderboard fetch configured");

    let state = AppState {
        events,
        fetch_config,
        agent,
        db: Arc::new(db),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new().nest("/api", api_router(state)).layer(cors);

    let addr: std::net::SocketAddr = format!("{}:{}", host, port).parse()?;
    println!("\n=== Copytrade server v{} ===", APP_VERSION);
    println!("Listening on http://{}", addr);
    println!("\nEndpoints:");
    println!("  GET   /api/health                       - Health check");
    println!("  GET   /api/top-traders                  - Top traders by net P&L");
    println!("  POST  /api/take-exit                    - Pay out from the agent wallet");
    println!("  POST  /api/buy-multiple-tokens          - Split a buy over the token basket");
    println!("  GET   /api/users/:wallet                - User record");
    println!("  POST  /api/users/:wallet/investments    - Record a deposit");
    println!("  GET   /api/users/:wallet/trades         - Deposits and total profit");
    println!("  PATCH /api/trades/:id/profit            - Update a trade's profit");
    println!("\n  Database: {}", db_path);
    println!("\nPress Ctrl+C to stop\n");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// Leaderboard command — CLI mode (no web server)
// ============================================================================

async fn cmd_leaderboard(top_n: usize) -> anyhow::Result<()> {
    println!("\n=== Copytrade leaderboard v{} ===", APP_VERSION);

    let client = HasuraClient::from_env()?;
    let config = FetchConfig::from_env();
    println!("Endpoint: {} | Page size: {}", client.endpoint(), config.page_size);

    let report = build_leaderboard(&client, &config, top_n).await?;

    print_traders(&report.top_traders);
    println!(
        "\n  {} records processed in {:.2}s",
        report.meta.total_records_processed, report.meta.processing_time_seconds
    );

    Ok(())
}

fn print_traders(traders: &[TraderSummary]) {
    println!("\nTop {} Traders:", traders.len());
    println!(
        "  {:>3}  {:<68} {:>12} {:>10} {:>7} {:>7} {:>14}",
        "#", "Wallet", "Net PnL", "Fees", "Trades", "WR%", "Volume"
    );
    println!("  {}", "-".repeat(128));
    for (i, t) in traders.iter().enumerate() {
        println!(
            "  {:>3}  {:<68} {:>12} {:>10} {:>7} {:>7} {:>14}",
            i + 1,
            t.wallet_address,
            t.net_pnl,
            t.total_fees,
            t.trade_count,
            t.win_rate,
            t.total_volume,
        );
    }
}

// ============================================================================
// API Handlers — Leaderboard
// ============================================================================

/// GET /api/health
async fn api_health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "copytrade-server",
        "version": APP_VERSION,
    }))
}

/// GET /api/top-traders — fetch every position event and rank wallets by net P&L
async fn api_top_traders(State(state): State<AppState>) -> ApiResponse {
    let result = match &state.events {
        Some(source) => {
            build_leaderboard(source.as_ref(), &state.fetch_config, TOP_TRADERS_LIMIT).await
        }
        None => Err(anyhow::anyhow!("HASURA_ENDPOINT is not configured")),
    };

    match result {
        Ok(report) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": report,
            })),
        ),
        Err(e) => {
            let message = format!("{:#}", e);
            error!(error = %message, "Top traders request failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "success": false,
                    "error": "Failed to fetch and process trading data",
                    "message": message,
                })),
            )
        }
    }
}

// ============================================================================
// API Handlers — Agent wallet
// ============================================================================

type JsonBody = Result<Json<Value>, JsonRejection>;

fn error_response(status: StatusCode, message: impl Into<String>) -> ApiResponse {
    (status, Json(json!({ "error": message.into() })))
}

fn agent_failure(context: &str, e: AgentError) -> ApiResponse {
    error!(error = %e, "{} failed", context);
    error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

/// Parsed request body, or `Value::Null` when it is missing or not JSON
fn body_value(body: JsonBody) -> Value {
    match body {
        Ok(Json(value)) => value,
        Err(rejection) => {
            warn!(error = %rejection, "Unreadable request body");
            Value::Null
        }
    }
}

/// A JSON number field
fn number_field(body: &Value, key: &str) -> Option<f64> {
    body.get(key)?.as_f64()
}

/// A JSON number field that also accepts a numeric string such as `"1.5"`
fn numeric_field(body: &Value, key: &str) -> Option<f64> {
    match body.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// POST /api/take-exit — transfer APT from the agent wallet back to the user
async fn api_take_exit(State(state): State<AppState>, body: JsonBody) -> ApiResponse {
    let body = body_value(body);
    let wallet = body
        .get("walletAddress")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let amount = numeric_field(&body, "amount").unwrap_or(0.0);

    let octas = match exit_octas(&wallet, amount) {
        Ok(octas) => octas,
        Err(e) => {
            warn!(error = %e, "Rejected exit request");
            return error_response(StatusCode::BAD_REQUEST, "Invalid parameters");
        }
    };

    let Some(agent) = &state.agent else {
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Server misconfiguration");
    };

    info!(wallet = %wallet, octas, "Processing exit");
    match agent.transfer(&wallet, octas, APTOS_COIN_TYPE).await {
        Ok(tx_hash) => {
            info!(wallet = %wallet, tx_hash = %tx_hash, "Exit transfer submitted");
            (StatusCode::OK, Json(json!({ "txHash": tx_hash })))
        }
        Err(e) => agent_failure("Take exit", e),
    }
}

/// POST /api/buy-multiple-tokens — swap APT into the fixed token basket
async fn api_buy_multiple_tokens(State(state): State<AppState>, body: JsonBody) -> ApiResponse {
    let amount = number_field(&body_value(body), "amount").unwrap_or(0.0);
    let plan = match plan_swaps(amount) {
        Ok(plan) => plan,
        Err(e) => {
            warn!(error = %e, "Rejected buy request");
            return error_response(StatusCode::BAD_REQUEST, "Invalid amount");
        }
    };

    let Some(agent) = &state.agent else {
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Server misconfiguration");
    };

    match execute_swaps(agent.as_ref(), &plan).await {
        Ok(swaps) => (
            StatusCode::OK,
            Json(json!({ "success": true, "swaps": swaps })),
        ),
        Err(e) => agent_failure("Buy multiple tokens", e),
    }
}

// ============================================================================
// API Handlers — Users and trades
// ============================================================================

fn db_failure(e: DbError) -> ApiResponse {
    match e {
        DbError::NotFound(what) => error_response(StatusCode::NOT_FOUND, format!("{} not found", what)),
        other => {
            error!(error = %other, "Database request failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
        }
    }
}

/// GET /api/users/:wallet
async fn api_get_user(State(state): State<AppState>, Path(wallet): Path<String>) -> ApiResponse {
    match UserRepository::new(state.db.pool()).get_by_wallet(&wallet).await {
        Ok(Some(user)) => (StatusCode::OK, Json(json!(user))),
        Ok(None) => db_failure(DbError::NotFound(format!("user {}", wallet))),
        Err(e) => db_failure(e),
    }
}

/// POST /api/users/:wallet/investments — record a deposit into the agent wallet
async fn api_record_investment(
    State(state): State<AppState>,
    Path(wallet): Path<String>,
    body: JsonBody,
) -> ApiResponse {
    let amount = match number_field(&body_value(body), "amount") {
        Some(a) if a.is_finite() && a > 0.0 => a,
        _ => return error_response(StatusCode::BAD_REQUEST, "Invalid amount"),
    };

    match DepositRepository::new(state.db.pool()).record(&wallet, amount).await {
        Ok((user, trade)) => {
            info!(wallet = %wallet, amount, trade_id = trade.id, "Investment recorded");
            (StatusCode::OK, Json(json!({ "user": user, "trade": trade })))
        }
        Err(e) => db_failure(e),
    }
}

/// GET /api/users/:wallet/trades — deposits newest first, with summed profit
async fn api_user_trades(State(state): State<AppState>, Path(wallet): Path<String>) -> ApiResponse {
    match TradeRepository::new(state.db.pool()).list_for_wallet(&wallet).await {
        Ok(trades) => {
            let total_profit: f64 = trades.iter().map(|t| t.profit).sum();
            (
                StatusCode::OK,
                Json(json!({ "trades": trades, "totalProfit": total_profit })),
            )
        }
        Err(e) => db_failure(e),
    }
}

/// PATCH /api/trades/:id/profit
async fn api_update_trade_profit(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    body: JsonBody,
) -> ApiResponse {
    let profit = match number_field(&body_value(body), "profit") {
        Some(p) if p.is_finite() => p,
        _ => return error_response(StatusCode::BAD_REQUEST, "Invalid profit"),
    };
    match TradeRepository::new(state.db.pool())
        .update_profit(id, profit)
        .await
    {
        Ok(trade) => (StatusCode::OK, Json(json!(trade))),
        Err(e) => db_failure(e),
    }
}
