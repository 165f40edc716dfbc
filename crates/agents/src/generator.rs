//! Generator agent: turns a natural-language strategy description into a
//! normalized `StrategySpec`, and refines a previous spec against analyst
//! feedback and (from iteration 2 on) data-driven threshold insights.

use std::time::Duration;

use core_types::StrategySpec;
use serde_json::{json, Value};
use strategies::normalize;

use crate::analyst::AnalystOutput;
use crate::error::AgentError;
use crate::oracle::OracleClient;
use crate::protected::{self, ProtectedParams};
use crate::recommender::DataInsights;

const REFINE_TIMEOUT: Duration = Duration::from_secs(20);

pub struct GeneratorOutput {
    pub strategy: StrategySpec,
    pub changes_made: Vec<String>,
}

const SYSTEM_PROMPT: &str = "You translate a trader's natural-language strategy description into a JSON strategy specification. Respond with JSON only, matching: {name, assets/asset, entry_conditions: [...], exit: {take_profit, stop_loss, take_profit_pct_shares, stop_loss_pct_shares, custom_exit}, risk: {position_size, max_positions, allocation}, data_sources}.";

/// First iteration: parse the query with no prior strategy to anchor to.
pub async fn generate_initial(
    oracle: &OracleClient,
    user_query: &str,
) -> Result<GeneratorOutput, AgentError> {
    let raw: Value = oracle
        .complete_value(SYSTEM_PROMPT, user_query, REFINE_TIMEOUT)
        .await?;
    let strategy = normalize::normalize(&raw)?;
    Ok(GeneratorOutput {
        strategy,
        changes_made: vec!["Generated initial strategy from description".to_string()],
    })
}

/// Subsequent iterations: refine `previous` against the analyst's feedback
/// and, if available, the recommender's data-driven thresholds. Any
/// protected parameter the refinement would have touched is reverted and
/// the touch is logged as a recommendation instead of applied.
pub async fn refine(
    oracle: &OracleClient,
    user_query: &str,
    previous: &StrategySpec,
    feedback: &AnalystOutput,
    data_insights: Option<&DataInsights>,
    protected_params: &ProtectedParams,
) -> Result<GeneratorOutput, AgentError> {
    let prompt = json!({
        "user_query": user_query,
        "previous_strategy": previous,
        "issues": feedback.issues,
        "suggestions": feedback.suggestions,
        "data_insights": data_insights,
    })
    .to_string();

    let raw: Value = oracle
        .complete_value(SYSTEM_PROMPT, &prompt, REFINE_TIMEOUT)
        .await?;
    let mut strategy = normalize::normalize(&raw)?;

    let mut changes_made = diff_summary(previous, &strategy);
    protected::enforce(&mut strategy, protected_params, &mut changes_made);

    Ok(GeneratorOutput {
        strategy,
        changes_made,
    })
}

/// A coarse, field-level diff between the previous and refined spec, used
/// only to populate `changes_made` for the progress stream — not a source
/// of truth for anything downstream.
fn diff_summary(previous: &StrategySpec, refined: &StrategySpec) -> Vec<String> {
    let mut changes = Vec::new();
    if previous.entry_conditions.len() != refined.entry_conditions.len() {
        changes.push(format!(
            "entry conditions changed from {} to {}",
            previous.entry_conditions.len(),
            refined.entry_conditions.len()
        ));
    }
    if previous.exit.take_profit != refined.exit.take_profit {
        changes.push("take_profit adjusted".to_string());
    }
    if previous.exit.stop_loss != refined.exit.stop_loss {
        changes.push("stop_loss adjusted".to_string());
    }
    if previous.risk.position_size != refined.risk.position_size {
        changes.push("position size adjusted".to_string());
    }
    if changes.is_empty() {
        changes.push("strategy refined, no structural changes detected".to_string());
    }
    changes
}
