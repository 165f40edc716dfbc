//! Request/response mapping for §6's external interfaces. No business logic
//! lives here: every handler validates its input shape, then calls straight
//! into `workflow`, `live-engine`, `backtester`, or `database`.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    response::IntoResponse,
    Json,
};
use core_types::{Deployment, DeploymentStatus, ExecutionFrequency, StrategySpec};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{error::AppError, AppState};

// ---------------------------------------------------------------------
// Session + workflow endpoints (§6)
// ---------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub user_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct CreateSessionResponse {
    pub session_id: Uuid,
}

/// # POST /api/sessions
pub async fn create_session(
    State(state): State<Arc<AppState>>,
    Json(_req): Json<CreateSessionRequest>,
) -> Result<Json<CreateSessionResponse>, AppError> {
    let session_id = state.workflow.create_session().await;
    Ok(Json(CreateSessionResponse { session_id }))
}

#[derive(Debug, Deserialize)]
pub struct StartWorkflowRequest {
    pub user_id: Uuid,
    pub strategy_description: String,
    #[serde(default)]
    pub fast_mode: bool,
}

/// # POST /api/sessions/:session_id/start
pub async fn start_workflow(
    Path(session_id): Path<Uuid>,
    State(state): State<Arc<AppState>>,
    Json(req): Json<StartWorkflowRequest>,
) -> Result<impl IntoResponse, AppError> {
    state
        .workflow
        .start(session_id, req.user_id, req.strategy_description, req.fast_mode)?;
    Ok(axum::http::StatusCode::ACCEPTED)
}

#[derive(Debug, Deserialize)]
pub struct PollQuery {
    #[serde(default)]
    pub from: usize,
}

#[derive(Debug, Serialize)]
pub struct PollResponse {
    pub events: Vec<events::ProgressEvent>,
    pub total: usize,
}

/// # GET /api/sessions/:session_id/events?from=N
/// Polling fallback (§6, step 4) for clients that cannot hold a WebSocket.
pub async fn poll_events(
    Path(session_id): Path<Uuid>,
    Query(query): Query<PollQuery>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<PollResponse>, AppError> {
    let (events, total) = state.workflow.poll_events(session_id, query.from).await?;
    Ok(Json(PollResponse { events, total }))
}

/// # GET /api/sessions/:session_id/result
pub async fn fetch_result(
    Path(session_id): Path<Uuid>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<workflow::WorkflowResult>, AppError> {
    state
        .workflow
        .result(session_id)
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("no result for session {session_id}")))
}

/// # GET /api/sessions/:session_id/stream
/// Replays buffered history, emits `ready`, then forwards live events until
/// a terminal event closes the stream (§6, step 2).
pub async fn progress_stream(
    Path(session_id): Path<Uuid>,
    State(state): State<Arc<AppState>>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, AppError> {
    let (history, rx) = state.workflow.open_stream(session_id).await?;
    let heartbeat_interval = state.workflow.heartbeat_interval();
    Ok(ws.on_upgrade(move |socket| stream_session(socket, history, rx, heartbeat_interval)))
}

async fn stream_session(
    mut socket: WebSocket,
    history: Vec<events::ProgressEvent>,
    mut rx: tokio::sync::mpsc::Receiver<events::ProgressEvent>,
    heartbeat_interval: std::time::Duration,
) {
    for event in history {
        if send_event(&mut socket, &event).await.is_err() {
            return;
        }
    }
    if send_event(&mut socket, &events::ProgressEvent::Ready).await.is_err() {
        return;
    }

    loop {
        match workflow::next_event_or_heartbeat(&mut rx, heartbeat_interval).await {
            Some(event) => {
                let terminal = event.is_terminal();
                if send_event(&mut socket, &event).await.is_err() {
                    return;
                }
                if terminal {
                    return;
                }
            }
            None => return,
        }
    }
}

async fn send_event(socket: &mut WebSocket, event: &events::ProgressEvent) -> Result<(), axum::Error> {
    let text = serde_json::to_string(event).unwrap_or_else(|_| "{}".to_string());
    socket.send(Message::Text(text)).await
}

// ---------------------------------------------------------------------
// Deployment endpoints (§6 "Deployment endpoints")
// ---------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreateDeploymentRequest {
    pub user_id: Uuid,
    pub bot_id: Uuid,
    pub initial_capital: Decimal,
    pub execution_frequency: ExecutionFrequency,
    pub max_position_size: Option<Decimal>,
    pub daily_loss_limit: Option<Decimal>,
}

/// # POST /api/deployments
/// Creates a deployment in `Paused` status; the client activates it
/// separately once ready, via `activate`.
pub async fn create_deployment(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateDeploymentRequest>,
) -> Result<Json<Deployment>, AppError> {
    let now = chrono::Utc::now();
    let deployment = Deployment {
        id: Uuid::new_v4(),
        user_id: req.user_id,
        bot_id: req.bot_id,
        status: DeploymentStatus::Paused,
        initial_capital: req.initial_capital,
        current_capital: req.initial_capital,
        execution_frequency: req.execution_frequency,
        max_position_size: req.max_position_size,
        daily_loss_limit: req.daily_loss_limit,
        alpaca_account_id: None,
        deployed_at: now,
        stopped_at: None,
        total_pnl: Decimal::ZERO,
        total_return_pct: Decimal::ZERO,
        last_execution_at: None,
    };
    state.repo.create_deployment(&deployment).await?;
    Ok(Json(deployment))
}

#[derive(Debug, Deserialize)]
pub struct ListDeploymentsQuery {
    pub user_id: Uuid,
}

/// # GET /api/deployments?user_id=...
pub async fn list_deployments(
    Query(query): Query<ListDeploymentsQuery>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Deployment>>, AppError> {
    Ok(Json(state.repo.list_deployments_for_user(query.user_id).await?))
}

/// # GET /api/deployments/:id
pub async fn get_deployment(
    Path(id): Path<Uuid>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Deployment>, AppError> {
    Ok(Json(state.repo.get_deployment(id).await?))
}

/// # POST /api/deployments/:id/activate
pub async fn activate_deployment(
    Path(id): Path<Uuid>,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    live_engine::ops::activate(&state.repo, id).await?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

/// # POST /api/deployments/:id/pause
pub async fn pause_deployment(
    Path(id): Path<Uuid>,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    live_engine::ops::pause(&state.repo, id).await?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

/// # POST /api/deployments/:id/resume
pub async fn resume_deployment(
    Path(id): Path<Uuid>,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    live_engine::ops::resume(&state.repo, id).await?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize, Default)]
pub struct StopDeploymentRequest {
    #[serde(default)]
    pub close_positions: bool,
}

/// # POST /api/deployments/:id/stop
pub async fn stop_deployment(
    Path(id): Path<Uuid>,
    State(state): State<Arc<AppState>>,
    body: Option<Json<StopDeploymentRequest>>,
) -> Result<impl IntoResponse, AppError> {
    let close_positions = body.map(|Json(b)| b.close_positions).unwrap_or(false);
    live_engine::ops::stop(&state.repo, state.broker.as_ref(), id, close_positions).await?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

/// # GET /api/deployments/:id/trades
pub async fn list_deployment_trades(
    Path(id): Path<Uuid>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<core_types::DeploymentTrade>>, AppError> {
    Ok(Json(state.repo.list_deployment_trades(id).await?))
}

/// # GET /api/deployments/:id/metrics
pub async fn list_deployment_metrics(
    Path(id): Path<Uuid>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<core_types::DeploymentMetricsSnapshot>>, AppError> {
    Ok(Json(state.repo.list_deployment_metrics(id).await?))
}

/// # GET /api/deployments/:id/positions
pub async fn list_deployment_positions(
    Path(id): Path<Uuid>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<core_types::DeploymentPosition>>, AppError> {
    Ok(Json(state.repo.list_deployment_positions(id).await?))
}

// ---------------------------------------------------------------------
// Backtest endpoint (§6 "Backtest endpoint")
// ---------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct RunBacktestRequest {
    pub strategy: StrategySpec,
    pub days: u32,
    pub initial_capital: Decimal,
    pub take_profit_override: Option<Decimal>,
    pub stop_loss_override: Option<Decimal>,
    /// When set, the result is auto-saved into this user's bot history
    /// (non-fatal on failure, per §6).
    pub user_id: Option<Uuid>,
}

/// # POST /api/backtest
pub async fn run_backtest(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RunBacktestRequest>,
) -> Result<Json<backtester::BacktestResult>, AppError> {
    let mut strategy = req.strategy;
    if let Some(tp) = req.take_profit_override {
        strategy.exit.take_profit = Some(strategies::normalize_pct(tp));
    }
    if let Some(sl) = req.stop_loss_override {
        strategy.exit.stop_loss = Some(strategies::normalize_pct(sl));
    }

    let result = workflow::backtest_runner::run_backtest(
        &state.market_data,
        strategy.clone(),
        req.days,
        req.initial_capital,
    )
    .await?;

    if let Some(user_id) = req.user_id {
        let repo = state.repo.clone();
        let bot = core_types::TradingBot {
            id: Uuid::new_v4(),
            user_id,
            session_id: None,
            name: strategy.name.clone(),
            strategy_spec: strategy,
            insights: None,
            backtest_summary: serde_json::to_value(&result.summary).ok(),
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        if let Err(e) = repo.save_trading_bot(&bot).await {
            tracing::warn!(error = %e, "auto-save of backtest result failed; response already computed");
        }
    }

    Ok(Json(result))
}
