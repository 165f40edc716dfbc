//! Wraps the backtest core (§4.5) behind the `(strategy, days, initial_capital)`
//! call shape the iteration loop's step 5 expects: fetch bars, prefetch
//! sentiment/news, then run `BacktestEngine` to completion.

use core_types::StrategySpec;
use backtester::{BacktestEngine, BacktestResult};
use rust_decimal::Decimal;

use crate::error::WorkflowError;
use crate::market_data::MarketDataSource;

pub async fn run_backtest(
    market_data: &MarketDataSource,
    strategy: StrategySpec,
    days: u32,
    initial_capital: Decimal,
) -> Result<BacktestResult, WorkflowError> {
    let bars = market_data.bars_for_strategy(&strategy, days).await?;
    let feeds = market_data.feeds_for_strategy(&strategy, &bars).await?;
    let engine = BacktestEngine::new(strategy, bars, Box::new(feeds), initial_capital);
    Ok(engine.run().await?)
}
