pub mod enums;
pub mod error;
pub mod structs;

// Re-export the core types to provide a clean public API.
pub use enums::{OrderSide, OrderType, PositionSide};
pub use error::{CoreError, FieldValidationError};
pub use structs::{
    Account, AllocationMode, Bar, Comparison, ConditionSpec, CrossoverDirection, DatasetCacheRow,
    Deployment, DeploymentMetricsSnapshot, DeploymentPosition, DeploymentStatus, DeploymentTrade,
    Execution, ExecutionFrequency, ExitReason, ExitSpec, Kline, Order, OrderRequest, OrderStatus,
    Position, PriceTrigger, RiskSpec, SentimentSource, Signal, StrategySpec, TimeInForce, Trade,
    TradeRecord, TradingBot, User,
};