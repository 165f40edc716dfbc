//! The live trading engine (§4.8/§4.9): a cron-like supervisor that ticks
//! every active deployment at its configured frequency, evaluating the same
//! declarative condition semantics the backtest core uses, and reconstructs
//! each deployment's portfolio strictly from its own trade ledger rather
//! than a shared broker aggregate.

pub mod engine;
pub mod error;
pub mod market_hours;
pub mod ops;
pub mod sizing;
pub mod strategy_runtime;
pub mod tick;
pub mod virtual_portfolio;

pub use engine::LiveEngine;
pub use error::LiveEngineError;
pub use market_hours::is_market_open;
pub use virtual_portfolio::VirtualPortfolio;
