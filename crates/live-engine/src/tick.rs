//! The per-deployment tick (§4.8 steps 1-7): load the current strategy spec,
//! evaluate entry/exit conditions through the warmed-up `DeclarativeStrategy`,
//! size and submit any resulting order, then fold the fill into the
//! deployment's virtual portfolio and persist a snapshot.

use std::collections::HashMap;

use chrono::Utc;
use core_types::{Bar, Deployment, OrderSide, OrderStatus, ExecutionFrequency};
use core_types::{DeploymentMetricsSnapshot, DeploymentTrade};
use database::DbRepository;
use executor::Broker;
use rust_decimal::Decimal;
use strategies::{DeclarativeStrategy, MultiAssetStrategy};
use uuid::Uuid;

use crate::error::LiveEngineError;
use crate::sizing::shares_for_entry;
use crate::strategy_runtime;
use crate::virtual_portfolio::VirtualPortfolio;
use configuration::LiveEngineConfig;

fn frequency_label(freq: ExecutionFrequency) -> &'static str {
    match freq {
        ExecutionFrequency::OneMinute => "1m",
        ExecutionFrequency::FiveMinutes => "5m",
        ExecutionFrequency::FifteenMinutes => "15m",
        ExecutionFrequency::ThirtyMinutes => "30m",
        ExecutionFrequency::OneHour => "1h",
    }
}

/// Runs exactly one tick for `deployment`. Reloads the bot's strategy spec
/// and rebuilds+rewarms `strategy` in place if it changed since the last
/// tick; otherwise reuses the live indicator/position state already primed
/// in memory.
pub async fn run_tick(
    repo: &DbRepository,
    broker: &dyn Broker,
    deployment: &Deployment,
    strategy: &mut DeclarativeStrategy,
    portfolio: &mut VirtualPortfolio,
    config: &LiveEngineConfig,
) -> Result<(), LiveEngineError> {
    let bot = repo.get_trading_bot(deployment.bot_id).await?;
    if &bot.strategy_spec != strategy.spec() {
        tracing::info!(deployment_id = %deployment.id, "strategy spec changed; rewarming");
        *strategy = strategy_runtime::warm_up(deployment.id, bot.strategy_spec, broker, repo).await?;
    }

    let mut current_prices: HashMap<String, Decimal> = HashMap::new();
    let mut bars: HashMap<String, Bar> = HashMap::new();
    let now = Utc::now();
    let interval_label = frequency_label(deployment.execution_frequency);
    for symbol in &strategy.spec().assets {
        let price = broker
            .get_current_price(symbol)
            .await
            .map_err(LiveEngineError::Broker)?;
        current_prices.insert(symbol.clone(), price);
        bars.insert(
            symbol.clone(),
            Bar {
                open_time: now,
                open: price,
                high: price,
                low: price,
                close: price,
                volume: Decimal::ZERO,
                close_time: now,
                interval: interval_label.to_string(),
            },
        );
    }

    let signals = strategy.generate_signals(&bars)?;

    for signal in signals {
        let symbol = signal.order_request.symbol.clone();
        let price = *current_prices
            .get(&symbol)
            .ok_or_else(|| LiveEngineError::NoPrice(symbol.clone()))?;

        let mut order_request = signal.order_request;
        if order_request.side == OrderSide::Buy && order_request.quantity.is_zero() {
            let shares = shares_for_entry(
                portfolio.cash,
                deployment.max_position_size,
                config.fallback_position_cash_fraction,
                price,
            );
            if shares <= Decimal::ZERO {
                tracing::debug!(deployment_id = %deployment.id, %symbol, "entry sized to zero shares; skipping");
                continue;
            }
            order_request.quantity = shares;
        }
        if order_request.quantity.is_zero() {
            continue;
        }

        let order = broker.submit_order(&order_request).await.map_err(LiveEngineError::Broker)?;
        if !matches!(order.status, OrderStatus::Filled | OrderStatus::PartiallyFilled) {
            tracing::warn!(
                deployment_id = %deployment.id,
                %symbol,
                status = ?order.status,
                "order not filled; skipping portfolio update for this signal"
            );
            continue;
        }
        let filled_qty = order.filled_qty;
        let filled_price = order.filled_avg_price.unwrap_or(price);
        let filled_at = order.filled_at.unwrap_or(now);

        let trade = DeploymentTrade {
            id: Uuid::new_v4(),
            deployment_id: deployment.id,
            symbol: symbol.clone(),
            side: order_request.side,
            quantity: filled_qty,
            price: filled_price,
            vendor_order_id: Some(order.id.to_string()),
            filled_at,
        };
        repo.insert_deployment_trade(&trade).await?;
        portfolio.apply_trade(&trade);
        strategy.on_execution(&symbol, order_request.side, filled_qty, filled_price);

        match portfolio.positions.get(&symbol) {
            Some(position) => repo.upsert_deployment_position(position).await?,
            None => repo.delete_deployment_position(deployment.id, &symbol).await?,
        }
    }

    let portfolio_value = portfolio.portfolio_value(&current_prices);
    let unrealized = portfolio.unrealized_pnl(&current_prices);
    let total_pnl = portfolio.total_pnl(deployment.initial_capital, &current_prices);
    let total_return_pct = portfolio.total_return_pct(deployment.initial_capital, &current_prices);

    repo.update_deployment_capital(deployment.id, portfolio_value, total_pnl, total_return_pct, now)
        .await?;
    repo.insert_deployment_metrics(&DeploymentMetricsSnapshot {
        deployment_id: deployment.id,
        timestamp: now,
        virtual_cash: portfolio.cash,
        virtual_portfolio_value: portfolio_value,
        unrealized_pnl: unrealized,
        realized_pnl: portfolio.realized_pnl,
    })
    .await?;

    Ok(())
}
