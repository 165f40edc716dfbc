//! The cron-like supervisor atop the deployment table (§4.8). One cluster-
//! wide sync task loads `status = running`/`paused` deployments every
//! `sync_interval_secs` and keeps an in-memory active set of per-deployment
//! tick loops current with it; each tick loop is an independent spawned
//! task so one deployment's failure never touches another's. Grounded in
//! `engine::reconciler::StateReconciler::start`'s periodic-interval-task
//! idiom (the overwrite-from-broker-aggregate behavior it implements is
//! deliberately not carried over — see `virtual_portfolio`).

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use configuration::LiveEngineConfig;
use core_types::{Deployment, DeploymentStatus};
use database::DbRepository;
use executor::Broker;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

use crate::market_hours::is_market_open;
use crate::strategy_runtime;
use crate::tick;
use crate::virtual_portfolio::VirtualPortfolio;

/// Consecutive broker-originated tick failures tolerated before a
/// deployment is transitioned to `Error`. Distinguishes a single transient
/// broker hiccup (§7: "BrokerError ... live engine: single-tick failure")
/// from sustained unavailability ("repeated failures transition the
/// deployment to error").
const CONSECUTIVE_BROKER_FAILURE_LIMIT: u32 = 3;

pub struct LiveEngine {
    repo: Arc<DbRepository>,
    broker: Arc<dyn Broker>,
    config: LiveEngineConfig,
    active: Mutex<HashMap<Uuid, JoinHandle<()>>>,
}

impl LiveEngine {
    pub fn new(repo: Arc<DbRepository>, broker: Arc<dyn Broker>, config: LiveEngineConfig) -> Arc<Self> {
        Arc::new(Self {
            repo,
            broker,
            config,
            active: Mutex::new(HashMap::new()),
        })
    }

    /// Starts the cluster-wide sync loop as a background task and returns
    /// immediately.
    pub fn start(self: &Arc<Self>) {
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(engine.config.sync_interval_secs));
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                if let Err(e) = engine.sync_once().await {
                    tracing::error!(error = %e, "live engine sync loop failed");
                }
            }
        });
    }

    pub fn is_market_open(&self) -> bool {
        is_market_open(Utc::now())
    }

    /// One pass of the synchronization loop (§4.8): adds newly-running
    /// deployments to the active set (scheduling their tick loop) and
    /// removes any whose stored status is no longer `running`.
    async fn sync_once(self: &Arc<Self>) -> Result<(), database::DbError> {
        let deployments = self.repo.list_active_deployments().await?;
        let running: HashMap<Uuid, Deployment> = deployments
            .into_iter()
            .filter(|d| d.status == DeploymentStatus::Running)
            .map(|d| (d.id, d))
            .collect();

        let mut active = self.active.lock().await;
        let stale: Vec<Uuid> = active
            .keys()
            .copied()
            .filter(|id| !running.contains_key(id))
            .collect();
        for id in stale {
            if let Some(handle) = active.remove(&id) {
                handle.abort();
                tracing::info!(deployment_id = %id, "deployment no longer running; tick loop stopped");
            }
        }

        let to_add: Vec<Deployment> = running
            .into_values()
            .filter(|d| !active.contains_key(&d.id))
            .collect();
        for deployment in to_add {
            let id = deployment.id;
            let handle = self.spawn_deployment_loop(deployment);
            active.insert(id, handle);
        }

        Ok(())
    }

    fn spawn_deployment_loop(self: &Arc<Self>, deployment: Deployment) -> JoinHandle<()> {
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            engine.run_deployment(deployment).await;
        })
    }

    async fn run_deployment(self: Arc<Self>, deployment: Deployment) {
        let deployment_id = deployment.id;
        let bot = match self.repo.get_trading_bot(deployment.bot_id).await {
            Ok(bot) => bot,
            Err(e) => {
                tracing::error!(deployment_id = %deployment_id, error = %e, "failed to load bot for deployment");
                self.mark_error(deployment_id).await;
                return;
            }
        };

        let mut strategy = match strategy_runtime::warm_up(
            deployment_id,
            bot.strategy_spec,
            self.broker.as_ref(),
            &self.repo,
        )
        .await
        {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(deployment_id = %deployment_id, error = %e, "warm-up failed");
                self.mark_error(deployment_id).await;
                return;
            }
        };

        let trades = match self.repo.list_deployment_trades(deployment_id).await {
            Ok(t) => t,
            Err(e) => {
                tracing::error!(deployment_id = %deployment_id, error = %e, "failed to load trade ledger");
                self.mark_error(deployment_id).await;
                return;
            }
        };
        let mut portfolio = VirtualPortfolio::reconstruct(deployment_id, deployment.initial_capital, &trades);

        let mut interval = tokio::time::interval(deployment.execution_frequency.as_duration());
        // Non-overlapping ticks (§5): a missed tick is skipped rather than
        // queued, so a slow tick can never build up a backlog.
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut consecutive_broker_failures = 0u32;
        loop {
            interval.tick().await;

            if self.config.enforce_market_hours && !is_market_open(Utc::now()) {
                continue;
            }

            match tick::run_tick(&self.repo, self.broker.as_ref(), &deployment, &mut strategy, &mut portfolio, &self.config).await {
                Ok(()) => {
                    consecutive_broker_failures = 0;
                }
                Err(crate::error::LiveEngineError::Broker(e)) => {
                    consecutive_broker_failures += 1;
                    tracing::warn!(
                        deployment_id = %deployment_id,
                        error = %e,
                        consecutive_broker_failures,
                        "tick failed with a broker error"
                    );
                    if consecutive_broker_failures >= CONSECUTIVE_BROKER_FAILURE_LIMIT {
                        tracing::error!(deployment_id = %deployment_id, "broker failure limit reached; stopping deployment");
                        self.mark_error(deployment_id).await;
                        return;
                    }
                }
                Err(e) => {
                    tracing::error!(deployment_id = %deployment_id, error = %e, "tick failed");
                    self.mark_error(deployment_id).await;
                    return;
                }
            }
        }
    }

    async fn mark_error(&self, deployment_id: Uuid) {
        if let Err(e) = self.repo.update_deployment_status(deployment_id, DeploymentStatus::Error).await {
            tracing::error!(deployment_id = %deployment_id, error = %e, "failed to persist error status after tick failure");
        }
        self.active.lock().await.remove(&deployment_id);
    }
}
