//! Insights agent: analyzes the user's query (and the generated strategy)
//! once, at the start of iteration 1, to propose which visualizations and
//! narrative insights the frontend should render alongside the backtest.
//! Run with a 30s timeout; a timeout yields an empty config rather than
//! failing the workflow.

use std::time::Duration;

use core_types::StrategySpec;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::AgentError;
use crate::oracle::OracleClient;

pub const INSIGHTS_TIMEOUT: Duration = Duration::from_secs(30);

const SYSTEM_PROMPT: &str = "You decide which charts and narrative insights would help a trader understand a backtest of the given strategy. Respond with JSON only: {visualizations: [{kind, title}], insights: [string]}.";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InsightsConfig {
    #[serde(default)]
    pub visualizations: Vec<VisualizationSpec>,
    #[serde(default)]
    pub insights: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisualizationSpec {
    pub kind: String,
    pub title: String,
}

pub async fn analyze_query_for_insights(
    oracle: &OracleClient,
    user_query: &str,
    strategy: &StrategySpec,
) -> Result<InsightsConfig, AgentError> {
    let prompt = json!({
        "user_query": user_query,
        "strategy": strategy,
    })
    .to_string();

    oracle
        .complete_json(SYSTEM_PROMPT, &prompt, INSIGHTS_TIMEOUT)
        .await
}
