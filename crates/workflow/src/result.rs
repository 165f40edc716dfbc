use backtester::BacktestResult;
use core_types::StrategySpec;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use agents::{AnalystOutput, InsightsConfig};

/// The final, stored value a session's `results` entry holds once the
/// iteration loop terminates — the authoritative answer a `complete` event
/// points at, independent of whether the background save has run yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowResult {
    pub session_id: Uuid,
    pub strategy: StrategySpec,
    pub backtest: BacktestResult,
    pub insights: Option<InsightsConfig>,
    pub final_analysis: AnalystOutput,
    pub iterations: u32,
}
