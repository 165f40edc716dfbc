//! Wires the HTTP/WebSocket transport (§6) on top of the three engines:
//! the multi-agent workflow engine, the live trading supervisor, and the
//! shared broker connection both of them submit orders through.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use agents::OracleClient;
use api_client::{ApiClient, BinanceClient};
use configuration::{ApiConfig, Config};
use database::DbRepository;
use executor::{Broker, LiveBroker};
use live_engine::LiveEngine;
use sentiment::{HttpSentimentProvider, RollingWindowLimiter, SourceStrictRouter};
use workflow::{MarketDataSource, WorkflowEngine};

pub mod error;
pub mod handlers;

/// The shared application state every handler is given through `State`.
#[derive(Clone)]
pub struct AppState {
    pub workflow: Arc<WorkflowEngine>,
    pub repo: DbRepository,
    pub broker: Arc<dyn Broker>,
    pub market_data: Arc<MarketDataSource>,
}

fn oracle_client_from_env() -> OracleClient {
    let base_url = std::env::var("ORACLE_BASE_URL").unwrap_or_else(|_| "http://localhost:8008".to_string());
    let api_key = std::env::var("ORACLE_API_KEY").ok();
    OracleClient::new(base_url, api_key.as_deref())
}

fn sentiment_router(config: &configuration::SentimentProvidersConfig, repo: Arc<DbRepository>) -> SourceStrictRouter {
    let mut router = SourceStrictRouter::new(repo as Arc<dyn sentiment::DatasetCacheStore>);

    let base_url = |name: &str| std::env::var(name).unwrap_or_else(|_| "http://localhost:8080".to_string());
    let key = |name: &str| std::env::var(name).ok();

    router.register(
        Arc::new(HttpSentimentProvider::new(
            core_types::SentimentSource::Reddit,
            base_url("REDDIT_PROVIDER_URL"),
            key("REDDIT_API_KEY"),
        )),
        Arc::new(RollingWindowLimiter::new(
            std::time::Duration::from_secs(60),
            config.reddit_requests_per_minute,
        )),
    );
    router.register(
        Arc::new(HttpSentimentProvider::new(
            core_types::SentimentSource::Twitter,
            base_url("TWITTER_PROVIDER_URL"),
            key("TWITTER_API_KEY"),
        )),
        Arc::new(RollingWindowLimiter::new(
            std::time::Duration::from_secs(60),
            config.twitter_requests_per_minute,
        )),
    );
    router.register(
        Arc::new(HttpSentimentProvider::new(
            core_types::SentimentSource::News,
            base_url("NEWS_PROVIDER_URL"),
            key("NEWS_API_KEY"),
        )),
        Arc::new(RollingWindowLimiter::new(
            std::time::Duration::from_secs(60),
            config.news_requests_per_minute,
        )),
    );

    router
}

/// Assembles every engine the handlers depend on from a loaded `Config`
/// and a live database pool, without binding a listener. Split out from
/// `run_server` so tests (and alternate entry points) can build the same
/// `AppState` without going through a TCP bind.
pub async fn build_state(config: &Config, repo: DbRepository) -> anyhow::Result<Arc<AppState>> {
    let repo_arc = Arc::new(repo.clone());

    let api_config = ApiConfig::from_env()?;
    let binance_client: Arc<dyn ApiClient> = Arc::new(BinanceClient::new(!config.broker.paper_trading, &api_config));

    let broker: Arc<dyn Broker> = Arc::new(LiveBroker::new(binance_client.clone()));

    let router = sentiment_router(&config.sentiment_providers, repo_arc.clone());
    let market_data = Arc::new(MarketDataSource::new(binance_client, repo_arc.clone(), Arc::new(router)));

    let oracle = Arc::new(oracle_client_from_env());
    let workflow = WorkflowEngine::new(oracle, market_data.clone(), repo_arc.clone(), config.workflow.clone());

    let live_engine = LiveEngine::new(repo_arc, broker.clone(), config.live_engine.clone());
    live_engine.start();

    Ok(Arc::new(AppState {
        workflow,
        repo,
        broker,
        market_data,
    }))
}

fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(|| async { "OK" }))
        .route("/api/sessions", post(handlers::create_session))
        .route("/api/sessions/:session_id/start", post(handlers::start_workflow))
        .route("/api/sessions/:session_id/events", get(handlers::poll_events))
        .route("/api/sessions/:session_id/result", get(handlers::fetch_result))
        .route("/api/sessions/:session_id/stream", get(handlers::progress_stream))
        .route("/api/deployments", get(handlers::list_deployments).post(handlers::create_deployment))
        .route("/api/deployments/:id", get(handlers::get_deployment))
        .route("/api/deployments/:id/activate", post(handlers::activate_deployment))
        .route("/api/deployments/:id/pause", post(handlers::pause_deployment))
        .route("/api/deployments/:id/resume", post(handlers::resume_deployment))
        .route("/api/deployments/:id/stop", post(handlers::stop_deployment))
        .route("/api/deployments/:id/trades", get(handlers::list_deployment_trades))
        .route("/api/deployments/:id/metrics", get(handlers::list_deployment_metrics))
        .route("/api/deployments/:id/positions", get(handlers::list_deployment_positions))
        .route("/api/backtest", post(handlers::run_backtest))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(1024 * 1024 * 50))
}

/// Loads configuration, connects the database, assembles the engines and
/// serves the HTTP/WebSocket API on `addr`.
pub async fn run_server(addr: SocketAddr) -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = configuration::load_config(None)?;
    let _guard = configuration::init_tracing(&config.logging)?;

    let db_pool = database::connect().await?;
    database::run_migrations(&db_pool).await?;
    let repo = DbRepository::new(db_pool);

    let state = build_state(&config, repo).await?;
    let app = router(state);

    tracing::info!(%addr, "web server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
