//! The bounded iteration loop (§4.7): generate -> backtest -> analyze ->
//! (refine), driven to completion by `WorkflowEngine::start` in a spawned
//! task so the caller that triggered *start workflow* (§6, step 3) returns
//! immediately. Grounded in
//! `original_source/backend/agents/supervisor.py`'s `SupervisorAgent.process()`
//! for the exact step ordering and termination bounds.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use configuration::WorkflowConfig;
use core_types::{StrategySpec, TradingBot};
use database::DbRepository;
use events::ProgressEvent;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sentiment::DatasetCacheStore;
use serde_json::Value as JsonValue;
use tokio::sync::mpsc;
use uuid::Uuid;

use agents::{analyst, generator, insights, recommender, DataInsights, OracleClient};

use crate::backtest_runner;
use crate::error::WorkflowError;
use crate::market_data::MarketDataSource;
use crate::protected_params;
use crate::result::WorkflowResult;
use crate::session::SessionRegistry;

/// Initial capital every workflow-driven backtest is seeded with; the
/// backtest endpoint (§6) accepts its own initial capital directly, but the
/// interactive workflow always starts from this baseline.
const DEFAULT_INITIAL_CAPITAL: Decimal = dec!(10000);

/// Lookback window in `fast_mode` (a quick look before committing to a full
/// run) versus the default full backtest window.
const FAST_MODE_DAYS: u32 = 90;
const DEFAULT_DAYS: u32 = 365;

pub struct WorkflowEngine {
    pub registry: Arc<SessionRegistry>,
    oracle: Arc<OracleClient>,
    market_data: Arc<MarketDataSource>,
    repo: Arc<DbRepository>,
    config: WorkflowConfig,
}

impl WorkflowEngine {
    pub fn new(
        oracle: Arc<OracleClient>,
        market_data: Arc<MarketDataSource>,
        repo: Arc<DbRepository>,
        config: WorkflowConfig,
    ) -> Arc<Self> {
        let registry = Arc::new(SessionRegistry::new(Duration::from_secs(
            config.result_ttl_hours * 3600,
        )));
        Arc::clone(&registry).spawn_result_sweeper();
        Arc::new(Self {
            registry,
            oracle,
            market_data,
            repo,
            config,
        })
    }

    pub async fn create_session(&self) -> Uuid {
        self.registry.create_session().await
    }

    pub async fn open_stream(
        &self,
        session_id: Uuid,
    ) -> Result<(Vec<ProgressEvent>, mpsc::Receiver<ProgressEvent>), WorkflowError> {
        self.registry.open_stream(session_id).await
    }

    pub async fn poll_events(&self, session_id: Uuid, from: usize) -> Result<(Vec<ProgressEvent>, usize), WorkflowError> {
        self.registry.poll(session_id, from).await
    }

    pub async fn result(&self, session_id: Uuid) -> Option<WorkflowResult> {
        self.registry.result(session_id).await
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.config.heartbeat_interval_secs)
    }

    /// *Start workflow* (§6, step 3): marks the session started and spawns
    /// the iteration loop, returning as soon as it is scheduled.
    pub fn start(
        self: &Arc<Self>,
        session_id: Uuid,
        user_id: Uuid,
        user_query: String,
        fast_mode: bool,
    ) -> Result<(), WorkflowError> {
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = engine.registry.mark_started(session_id).await {
                tracing::warn!(session_id = %session_id, error = %e, "workflow start rejected");
                return;
            }
            engine.run_loop(session_id, user_id, user_query, fast_mode).await;
        });
        Ok(())
    }

    async fn run_loop(&self, session_id: Uuid, user_id: Uuid, user_query: String, fast_mode: bool) {
        let wall_clock_start = Instant::now();
        self.registry
            .emit(
                session_id,
                ProgressEvent::SupervisorStart {
                    ts: Utc::now(),
                    user_query: user_query.clone(),
                },
            )
            .await;

        let protected = protected_params::extract(&user_query);
        let days = if fast_mode { FAST_MODE_DAYS } else { DEFAULT_DAYS };

        let mut strategy: Option<StrategySpec> = None;
        let mut feedback: Option<analyst::AnalystOutput> = None;
        let mut data_insights: Option<DataInsights> = None;
        let mut insights_config: Option<insights::InsightsConfig> = None;
        let mut last_backtest: Option<backtester::BacktestResult> = None;
        let mut iterations_run = 0u32;

        'iterations: for iteration in 1..=self.config.max_iterations {
            iterations_run = iteration;
            self.registry
                .emit(session_id, ProgressEvent::IterationStart { ts: Utc::now(), iteration })
                .await;

            self.registry
                .emit(session_id, ProgressEvent::CodeGenerationStart { ts: Utc::now(), iteration })
                .await;

            let generated = match &strategy {
                None => generator::generate_initial(&self.oracle, &user_query).await,
                Some(previous) => {
                    generator::refine(
                        &self.oracle,
                        &user_query,
                        previous,
                        feedback.as_ref().expect("feedback is set before every refinement"),
                        data_insights.as_ref(),
                        &protected,
                    )
                    .await
                }
            };
            let generated = match generated {
                Ok(g) => g,
                Err(e) => {
                    self.emit_error(session_id, format!("code generation failed: {e}")).await;
                    return;
                }
            };
            strategy = Some(generated.strategy.clone());
            self.registry
                .emit(
                    session_id,
                    ProgressEvent::CodeGenerationComplete {
                        ts: Utc::now(),
                        iteration,
                        changes_made: generated.changes_made,
                    },
                )
                .await;

            let spec = generated.strategy;

            // Step 4: on iteration 1 only, the insights call runs in
            // parallel with the backtest, bounded by its own timeout so a
            // slow/failed LLM call never blocks the workflow.
            let insights_handle = if iteration == 1 {
                self.registry
                    .emit(session_id, ProgressEvent::InsightsGeneration { ts: Utc::now(), iteration })
                    .await;
                let oracle = Arc::clone(&self.oracle);
                let spec_for_insights = spec.clone();
                let query_for_insights = user_query.clone();
                let timeout = Duration::from_secs(self.config.insights_timeout_secs);
                Some(tokio::spawn(async move {
                    tokio::time::timeout(
                        timeout,
                        insights::analyze_query_for_insights(&oracle, &query_for_insights, &spec_for_insights),
                    )
                    .await
                }))
            } else {
                None
            };

            self.registry
                .emit(session_id, ProgressEvent::BacktestStart { ts: Utc::now(), iteration })
                .await;
            let backtest_result =
                match backtest_runner::run_backtest(&self.market_data, spec.clone(), days, DEFAULT_INITIAL_CAPITAL).await {
                    Ok(r) => r,
                    Err(e) => {
                        self.emit_error(session_id, format!("backtest failed: {e}")).await;
                        return;
                    }
                };
            self.registry
                .emit(
                    session_id,
                    ProgressEvent::BacktestComplete {
                        ts: Utc::now(),
                        iteration,
                        total_trades: backtest_result.summary.total_trades,
                        total_return_pct: backtest_result.summary.total_return_pct,
                    },
                )
                .await;

            if let Some(handle) = insights_handle {
                let resolved = match handle.await {
                    Ok(Ok(Ok(cfg))) => cfg,
                    _ => insights::InsightsConfig::default(),
                };
                let payload = serde_json::to_value(&resolved).unwrap_or(JsonValue::Null);
                self.registry
                    .emit(
                        session_id,
                        ProgressEvent::InsightsComplete { ts: Utc::now(), iteration, insights: payload },
                    )
                    .await;
                insights_config = Some(resolved);
            }

            data_insights = if backtest_result.summary.total_trades < 10 {
                Some(recommender::recommend(&backtest_result, &spec))
            } else {
                None
            };

            self.registry
                .emit(session_id, ProgressEvent::AnalysisStart { ts: Utc::now(), iteration })
                .await;
            let analysis = match analyst::analyze(&self.oracle, &backtest_result, &spec, &user_query, iteration).await {
                Ok(a) => a,
                Err(e) => {
                    self.emit_error(session_id, format!("analysis failed: {e}")).await;
                    return;
                }
            };
            self.registry
                .emit(
                    session_id,
                    ProgressEvent::AnalysisComplete {
                        ts: Utc::now(),
                        iteration,
                        needs_refinement: analysis.needs_refinement,
                        issues: analysis.issues.clone(),
                    },
                )
                .await;

            let needs_refinement = analysis.needs_refinement;
            let should_continue = analysis.should_continue;
            strategy = Some(spec);
            last_backtest = Some(backtest_result);
            feedback = Some(analysis);

            let elapsed = wall_clock_start.elapsed();
            let max_wall_time = Duration::from_secs(self.config.max_wall_time_secs);
            if !needs_refinement || !should_continue || iteration == self.config.max_iterations || elapsed > max_wall_time {
                break 'iterations;
            }

            self.registry
                .emit(
                    session_id,
                    ProgressEvent::Refinement {
                        ts: Utc::now(),
                        iteration,
                        message: format!("refining strategy for iteration {}", iteration + 1),
                    },
                )
                .await;
        }

        let final_strategy = strategy.expect("the loop always runs at least one iteration");
        let final_backtest = last_backtest.expect("the loop always runs at least one iteration");
        let final_analysis = feedback.expect("the loop always runs at least one iteration");

        let result = WorkflowResult {
            session_id,
            strategy: final_strategy,
            backtest: final_backtest,
            insights: insights_config,
            final_analysis,
            iterations: iterations_run,
        };

        // "Complete before save": the result is authoritative the instant
        // this returns, strictly before the terminal event goes out, and the
        // persistent save runs afterward in the background.
        self.registry.store_result(result.clone()).await;
        let final_analysis_payload = serde_json::to_value(&result.final_analysis).unwrap_or(JsonValue::Null);
        self.registry
            .emit(
                session_id,
                ProgressEvent::Complete {
                    ts: Utc::now(),
                    session_id,
                    final_analysis: final_analysis_payload,
                },
            )
            .await;

        self.spawn_background_save(user_id, result);
        self.registry
            .close_after_grace(session_id, Duration::from_millis(self.config.terminal_event_grace_ms))
            .await;
    }

    async fn emit_error(&self, session_id: Uuid, message: String) {
        tracing::warn!(session_id = %session_id, %message, "workflow session failed");
        self.registry
            .emit(session_id, ProgressEvent::Error { ts: Utc::now(), session_id, message })
            .await;
        self.registry
            .close_after_grace(session_id, Duration::from_millis(self.config.terminal_event_grace_ms))
            .await;
    }

    /// Persists the finished bot. Runs after `complete` has already gone out;
    /// a failure here is logged, never retracts the result the client
    /// already received. Also links every dataset-cache row created under
    /// this session to the resulting bot (§4.6), so sentiment retrieved
    /// while the workflow was iterating stays associated with the bot it
    /// produced, not just the now-expired session.
    fn spawn_background_save(&self, user_id: Uuid, result: WorkflowResult) {
        let repo = Arc::clone(&self.repo);
        tokio::spawn(async move {
            let now = Utc::now();
            let session_id = result.session_id;
            let bot = TradingBot {
                id: Uuid::new_v4(),
                user_id,
                session_id: Some(session_id),
                name: result.strategy.name.clone(),
                strategy_spec: result.strategy,
                insights: result.insights.and_then(|i| serde_json::to_value(i).ok()),
                backtest_summary: serde_json::to_value(&result.backtest.summary).ok(),
                created_at: now,
                updated_at: now,
            };
            let bot_id = bot.id;
            if let Err(e) = repo.save_trading_bot(&bot).await {
                tracing::error!(
                    session_id = %session_id,
                    error = %e,
                    "background save of trading bot failed after workflow completed"
                );
                return;
            }
            if let Err(e) = repo.associate_with_bot(session_id, bot_id).await {
                tracing::error!(
                    session_id = %session_id,
                    bot_id = %bot_id,
                    error = %e,
                    "failed to associate dataset cache rows with saved bot"
                );
            }
        });
    }
}
