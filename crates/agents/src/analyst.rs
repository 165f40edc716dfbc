//! Analyst agent: judges a backtest result against the user's original
//! request and decides whether the workflow should keep refining.

use std::time::Duration;

use backtester::BacktestResult;
use core_types::StrategySpec;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::AgentError;
use crate::oracle::OracleClient;

const ANALYSIS_TIMEOUT: Duration = Duration::from_secs(20);

const SYSTEM_PROMPT: &str = "You are a trading strategy analyst. Given a backtest summary and the user's original request, judge whether the strategy satisfies the request. Respond with JSON only: {analysis, issues: [string], suggestions: [string], needs_refinement: bool, should_continue: bool}.";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalystOutput {
    pub analysis: String,
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
    pub needs_refinement: bool,
    #[serde(default = "default_true")]
    pub should_continue: bool,
}

fn default_true() -> bool {
    true
}

pub async fn analyze(
    oracle: &OracleClient,
    backtest_result: &BacktestResult,
    strategy: &StrategySpec,
    user_query: &str,
    iteration: u32,
) -> Result<AnalystOutput, AgentError> {
    let prompt = json!({
        "user_query": user_query,
        "strategy": strategy,
        "backtest_summary": backtest_result.summary,
        "iteration": iteration,
    })
    .to_string();

    oracle
        .complete_json(SYSTEM_PROMPT, &prompt, ANALYSIS_TIMEOUT)
        .await
}
