//! Builds and warms up the per-deployment `DeclarativeStrategy` instance a
//! tick loop keeps alive in memory for as long as the deployment is active.
//! Warm-up replays recent history through the same `generate_signals` entry
//! point a live tick uses, so indicator state (moving averages, RSI, MACD)
//! is primed before the first live decision rather than starting cold.

use std::collections::HashMap;

use chrono::{Duration, Utc};
use core_types::{OrderSide, StrategySpec};
use database::DbRepository;
use executor::Broker;
use strategies::{DeclarativeStrategy, MultiAssetStrategy, NoFeeds};
use uuid::Uuid;

use crate::error::LiveEngineError;

/// Bars of daily history to replay before a deployment starts ticking live.
/// Matches the indicator engine's own rolling window (see
/// `indicators::IndicatorEngine::new(250)` in `DeclarativeStrategy::new`).
const WARMUP_LOOKBACK_DAYS: i64 = 250;

/// Builds a fresh strategy for `spec`, replays `WARMUP_LOOKBACK_DAYS` of
/// history through it per asset, then seeds its internal per-symbol
/// position bookkeeping from this deployment's own persisted virtual
/// positions (never from the broker's aggregate) so a process restart picks
/// up exit evaluation exactly where it left off.
pub async fn warm_up(
    deployment_id: Uuid,
    spec: StrategySpec,
    broker: &dyn Broker,
    repo: &DbRepository,
) -> Result<DeclarativeStrategy, LiveEngineError> {
    let mut strategy = DeclarativeStrategy::new(spec.clone(), Box::new(NoFeeds));
    strategy.initialize();

    let end = Utc::now();
    let start = end - Duration::days(WARMUP_LOOKBACK_DAYS);
    for symbol in &spec.assets {
        let bars = broker.get_bars(symbol, start, end, "1d").await?;
        for bar in bars {
            let mut one = HashMap::with_capacity(1);
            one.insert(symbol.clone(), bar);
            // Warm-up never places orders: the returned signals are
            // intentionally discarded, and `on_execution` is never called
            // from here, so no position is created by this loop.
            let _ = strategy.generate_signals(&one)?;
        }
    }

    for symbol in &spec.assets {
        if let Some(position) = repo.get_deployment_position(deployment_id, symbol).await? {
            if position.quantity > rust_decimal::Decimal::ZERO {
                strategy.on_execution(symbol, OrderSide::Buy, position.quantity, position.avg_entry_price);
            }
        }
    }

    Ok(strategy)
}
