use crate::enums::{OrderSide, OrderType, PositionSide};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// One OHLCV observation for a symbol at a timeframe boundary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Kline {
    pub open_time: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    pub close_time: DateTime<Utc>,
    pub interval: String,
}

/// Alias kept for code that reads more naturally against the general "bar" vocabulary
/// used by the strategy runtime and backtest core; identical shape to `Kline`.
pub type Bar = Kline;

/// An open position for one symbol. Created on first buy, mutated on subsequent
/// buys (weighted-average entry) and sells, destroyed when quantity reaches 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub position_id: Uuid,
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: Decimal,
    pub entry_price: Decimal,
    pub unrealized_pnl: Decimal,
    pub last_updated: DateTime<Utc>,
}

impl Position {
    pub fn position_side(&self) -> PositionSide {
        PositionSide::from_order_side(self.side)
    }

    pub fn market_value(&self, current_price: Decimal) -> Decimal {
        self.quantity * current_price
    }

    pub fn cost_basis(&self) -> Decimal {
        self.quantity * self.entry_price
    }

    pub fn unrealized_pl_pct(&self, current_price: Decimal) -> Decimal {
        if self.entry_price.is_zero() {
            return Decimal::ZERO;
        }
        match self.side {
            OrderSide::Buy => (current_price - self.entry_price) / self.entry_price,
            OrderSide::Sell => (self.entry_price - current_price) / self.entry_price,
        }
    }
}

/// A request to place an order, before any broker has accepted or filled it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub client_order_id: Uuid,
    pub symbol: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub quantity: Decimal,
    pub price: Option<Decimal>,
    pub position_side: Option<PositionSide>,
}

/// Status of a broker order. Terminal states (`Filled`, `Cancelled`, `Rejected`)
/// never change once reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Filled,
    PartiallyFilled,
    Cancelled,
    Rejected,
}

/// Time-in-force for an order. Only `Market`-style immediacy is exercised by the
/// backtest core; `LiveBroker` maps this onto the vendor's own TIF enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeInForce {
    Day,
    Gtc,
    Ioc,
    Fok,
}

/// A broker order, tracked through its full lifecycle: pending -> {filled |
/// partially_filled -> filled | cancelled | rejected}.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub symbol: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub tif: TimeInForce,
    pub quantity: Decimal,
    pub limit_price: Option<Decimal>,
    pub stop_price: Option<Decimal>,
    pub status: OrderStatus,
    pub filled_qty: Decimal,
    pub filled_avg_price: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub filled_at: Option<DateTime<Utc>>,
}

/// A broker or portfolio account summary. `portfolio_value` is expected to equal
/// `cash + positions_value` within float tolerance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub equity: Decimal,
    pub cash: Decimal,
    pub buying_power: Decimal,
    pub portfolio_value: Decimal,
    pub positions_value: Decimal,
}

/// A trading signal produced by a strategy for a single symbol/bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub signal_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub confidence: Decimal,
    pub order_request: OrderRequest,
}

/// A fill receipt returned by a broker after an order is executed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Execution {
    pub execution_id: Uuid,
    pub client_order_id: Uuid,
    pub symbol: String,
    pub price: Decimal,
    pub quantity: Decimal,
    pub fee: Decimal,
    pub fee_asset: String,
    pub timestamp: DateTime<Utc>,
    pub side: OrderSide,
}

/// A closed round-trip trade: one entry execution matched with one exit
/// execution. `total_trades` in a backtest summary counts these, not the raw
/// count of buy+sell executions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub trade_id: Uuid,
    pub symbol: String,
    pub entry_execution: Execution,
    pub exit_execution: Execution,
}

impl Trade {
    pub fn pnl(&self) -> Decimal {
        let sign = match self.entry_execution.side {
            OrderSide::Buy => Decimal::ONE,
            OrderSide::Sell => -Decimal::ONE,
        };
        sign * (self.exit_execution.price - self.entry_execution.price) * self.exit_execution.quantity
            - self.entry_execution.fee
            - self.exit_execution.fee
    }

    pub fn pnl_pct(&self) -> Decimal {
        let basis = self.entry_execution.price * self.exit_execution.quantity;
        if basis.is_zero() {
            return Decimal::ZERO;
        }
        self.pnl() / basis
    }
}

/// A closed round-trip trade expressed at the vocabulary level the backtest
/// summary and analytics layer read from, carrying the entry/exit reasons and
/// a classification of why the position was exited (`exit_reason`) used for
/// the exit-reason histogram.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub symbol: String,
    pub entry_date: DateTime<Utc>,
    pub exit_date: DateTime<Utc>,
    pub entry_price: Decimal,
    pub exit_price: Decimal,
    pub shares: Decimal,
    pub pnl: Decimal,
    pub pnl_pct: Decimal,
    pub entry_reason: String,
    pub exit_reason: ExitReason,
}

/// Why a position (or a fraction of it) was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    PartialExit,
    TrailingStop,
    CustomExit,
    EndOfPeriod,
    SignalExit,
}

/// A declarative rule evaluated each bar/tick to decide whether to enter or
/// exit a position. Replaces a long if/elif ladder with a dispatchable
/// tagged union; unknown/custom kinds never produce a silent match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConditionSpec {
    Rsi {
        period: usize,
        threshold: Decimal,
        comparison: Comparison,
    },
    Macd {
        fast_period: usize,
        slow_period: usize,
        signal_period: usize,
        crossover: CrossoverDirection,
    },
    Sma {
        fast_period: usize,
        slow_period: usize,
    },
    Sentiment {
        source: SentimentSource,
        threshold: Decimal,
    },
    News,
    Price {
        trigger: PriceTrigger,
    },
    Custom {
        label: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    Below,
    Above,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrossoverDirection {
    Bullish,
    Bearish,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceTrigger {
    Any,
    Breakout,
}

/// A named external sentiment provider. Consumed strictly per-name; never
/// substituted with another source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentSource {
    Reddit,
    Twitter,
    News,
}

/// How capital is allocated across the symbols a strategy trades.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationMode {
    Equal,
    SignalWeighted,
    DynamicTrending,
    MarketCapWeighted,
}

/// Exit configuration for a strategy spec, including the two-phase
/// (partial-exit + trailing-stop) policy described in the data model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExitSpec {
    pub take_profit: Option<Decimal>,
    pub stop_loss: Option<Decimal>,
    pub take_profit_pct_shares: Decimal,
    pub stop_loss_pct_shares: Decimal,
    pub custom_exit: Option<ConditionSpec>,
}

impl ExitSpec {
    /// `has_trailing_stop := stop_loss > 0 AND take_profit_pct_shares < 1`.
    pub fn has_trailing_stop(&self) -> bool {
        self.stop_loss.map(|sl| sl > Decimal::ZERO).unwrap_or(false)
            && self.take_profit_pct_shares < Decimal::ONE
    }

    pub fn is_two_phase_exit(&self) -> bool {
        self.take_profit_pct_shares < Decimal::ONE
    }
}

/// Risk sizing configuration for a strategy spec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskSpec {
    pub position_size: Decimal,
    pub max_positions: u32,
    pub allocation: AllocationMode,
}

/// A validated description of what to trade and when — the single source of
/// truth every downstream component (backtester, live engine) reads from.
/// Produced by normalizing an untrusted `serde_json::Value` (see
/// `strategies::normalize`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategySpec {
    pub name: String,
    pub assets: Vec<String>,
    pub entry_conditions: Vec<ConditionSpec>,
    pub exit: ExitSpec,
    pub risk: RiskSpec,
    pub data_sources: Vec<SentimentSource>,
}

/// The status of a live deployment. `Stopped` and `Error` are terminal with
/// respect to execution; `Paused` <-> `Running` is reversible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStatus {
    Running,
    Paused,
    Stopped,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionFrequency {
    #[serde(rename = "1m")]
    OneMinute,
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "30m")]
    ThirtyMinutes,
    #[serde(rename = "1h")]
    OneHour,
}

impl ExecutionFrequency {
    pub fn as_duration(&self) -> std::time::Duration {
        use std::time::Duration;
        match self {
            ExecutionFrequency::OneMinute => Duration::from_secs(60),
            ExecutionFrequency::FiveMinutes => Duration::from_secs(5 * 60),
            ExecutionFrequency::FifteenMinutes => Duration::from_secs(15 * 60),
            ExecutionFrequency::ThirtyMinutes => Duration::from_secs(30 * 60),
            ExecutionFrequency::OneHour => Duration::from_secs(60 * 60),
        }
    }
}

/// A bot instance bound to a broker account, executing on a fixed cadence
/// until paused, stopped, or errored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deployment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub bot_id: Uuid,
    pub status: DeploymentStatus,
    pub initial_capital: Decimal,
    pub current_capital: Decimal,
    pub execution_frequency: ExecutionFrequency,
    pub max_position_size: Option<Decimal>,
    pub daily_loss_limit: Option<Decimal>,
    pub alpaca_account_id: Option<String>,
    pub deployed_at: DateTime<Utc>,
    pub stopped_at: Option<DateTime<Utc>>,
    pub total_pnl: Decimal,
    pub total_return_pct: Decimal,
    pub last_execution_at: Option<DateTime<Utc>>,
}

/// One fill recorded against a deployment's own ledger. The ownership key
/// (`deployment_id`) for the virtual portfolio reconstruction in the live
/// trading engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentTrade {
    pub id: Uuid,
    pub deployment_id: Uuid,
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: Decimal,
    pub price: Decimal,
    pub vendor_order_id: Option<String>,
    pub filled_at: DateTime<Utc>,
}

/// A deployment's own virtual position, keyed by `(deployment_id, symbol)`.
/// Reconstructed strictly from `DeploymentTrade` rows, never read from a
/// shared broker aggregate position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentPosition {
    pub deployment_id: Uuid,
    pub symbol: String,
    pub quantity: Decimal,
    pub avg_entry_price: Decimal,
    pub realized_pnl: Decimal,
}

/// A point-in-time snapshot of a deployment's virtual portfolio, persisted
/// after each tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentMetricsSnapshot {
    pub deployment_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub virtual_cash: Decimal,
    pub virtual_portfolio_value: Decimal,
    pub unrealized_pnl: Decimal,
    pub realized_pnl: Decimal,
}

/// A row in the sentiment/news dataset cache. Lookups match rows whose
/// `[start_date, end_date]` covers the requested date; `data` maps an ISO
/// date string to a per-date entry (sentiment scalar plus any metadata the
/// provider returned).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetCacheRow {
    pub ticker: String,
    pub data_source: SentimentSource,
    pub start_date: chrono::NaiveDate,
    pub end_date: chrono::NaiveDate,
    pub data: HashMap<String, serde_json::Value>,
    pub metadata: serde_json::Value,
    pub session_id: Option<Uuid>,
    pub bot_id: Option<Uuid>,
}

/// Minimal user row; authentication itself is out of scope, but downstream
/// repository contracts need a row type to satisfy `user_id` foreign keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

/// A saved strategy artifact: the normalized spec, the analyst's insights,
/// and a summary of the backtest that produced it. `session_id` links a bot
/// back to the workflow session that generated it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradingBot {
    pub id: Uuid,
    pub user_id: Uuid,
    pub session_id: Option<Uuid>,
    pub name: String,
    pub strategy_spec: StrategySpec,
    pub insights: Option<serde_json::Value>,
    pub backtest_summary: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
