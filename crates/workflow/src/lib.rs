//! The multi-agent workflow engine (§4.7): a bounded generate -> backtest ->
//! analyze -> refine loop, driven by `WorkflowEngine` and exposed to callers
//! through a session registry that replays buffered progress events before
//! streaming new ones.

pub mod backtest_runner;
pub mod error;
pub mod market_data;
pub mod protected_params;
pub mod result;
pub mod session;
pub mod supervisor;

pub use error::WorkflowError;
pub use market_data::MarketDataSource;
pub use result::WorkflowResult;
pub use session::{next_event_or_heartbeat, SessionRegistry};
pub use supervisor::WorkflowEngine;
