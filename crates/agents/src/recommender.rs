//! Data-driven threshold recommender (§4.7 step 5): when a backtest
//! produces too few trades to be a useful signal (`total_trades < 10`),
//! compute distribution statistics (min/max/mean/std/percentiles) over the
//! indicator readings the strategy actually saw, and propose a looser
//! threshold for the next iteration's refinement.

use backtester::BacktestResult;
use core_types::{Comparison, ConditionSpec, StrategySpec};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub condition: String,
    pub recommended_value: Decimal,
    pub confidence: Decimal,
    pub reasoning: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataInsights {
    pub primary_issue: String,
    pub recommendations: Vec<Recommendation>,
}

/// Sorted-vector percentile, matching numpy's linear interpolation for the
/// common case closely enough for a threshold recommendation (not used for
/// anything that needs numerical precision).
fn percentile(sorted: &[f64], pct: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    if sorted.len() == 1 {
        return sorted[0];
    }
    let rank = (pct / 100.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        sorted[lower]
    } else {
        let weight = rank - lower as f64;
        sorted[lower] * (1.0 - weight) + sorted[upper] * weight
    }
}

fn decimal_from_f64(value: f64) -> Decimal {
    Decimal::try_from(value).unwrap_or(Decimal::ZERO)
}

pub fn recommend(result: &BacktestResult, strategy: &StrategySpec) -> DataInsights {
    let mut recommendations = Vec::new();

    for condition in &strategy.entry_conditions {
        let ConditionSpec::Rsi { comparison, threshold, period } = condition else {
            continue;
        };

        // `additional_info` keys its RSI reading by period (§4.5), since a
        // strategy could in principle track more than one RSI window.
        let key = format!("rsi_{period}");
        let mut values: Vec<f64> = result
            .additional_info
            .iter()
            .filter_map(|row| row.indicators.get(&key))
            .filter_map(|d| d.to_f64())
            .collect();
        if values.len() < 5 {
            continue;
        }
        values.sort_by(|a, b| a.partial_cmp(b).unwrap());

        // Looking for oversold (below threshold): loosen toward the 30th
        // percentile of observed readings; looking for overbought (above):
        // loosen toward the 70th percentile.
        let target_pct = match comparison {
            Comparison::Below => 30.0,
            Comparison::Above => 70.0,
        };
        let recommended = decimal_from_f64(percentile(&values, target_pct));
        if recommended == *threshold {
            continue;
        }

        let confidence = decimal_from_f64((values.len() as f64 / 100.0).min(1.0));
        recommendations.push(Recommendation {
            condition: "rsi".to_string(),
            recommended_value: recommended,
            confidence,
            reasoning: format!(
                "observed RSI readings ({} samples) put the {}th percentile at {recommended}, vs the current threshold of {threshold}",
                values.len(),
                target_pct as i32,
            ),
        });
    }

    for condition in &strategy.entry_conditions {
        let ConditionSpec::Sentiment { threshold, .. } = condition else {
            continue;
        };
        let mut values: Vec<f64> = result
            .additional_info
            .iter()
            .flat_map(|row| row.sentiment.values())
            .filter_map(|d| d.to_f64())
            .collect();
        if values.len() < 5 {
            continue;
        }
        values.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let recommended = decimal_from_f64(percentile(&values, 50.0));
        if recommended == *threshold {
            continue;
        }
        let confidence = decimal_from_f64((values.len() as f64 / 100.0).min(1.0));
        recommendations.push(Recommendation {
            condition: "sentiment".to_string(),
            recommended_value: recommended,
            confidence,
            reasoning: format!(
                "observed sentiment scores ({} samples) median at {recommended}, vs the current threshold of {threshold}",
                values.len(),
            ),
        });
    }

    recommendations.sort_by(|a, b| b.confidence.cmp(&a.confidence));

    let primary_issue = if result.summary.total_trades == 0 {
        "no trades were triggered; entry conditions may be too strict".to_string()
    } else {
        format!(
            "only {} trades were triggered over the backtest window",
            result.summary.total_trades
        )
    };

    DataInsights {
        primary_issue,
        recommendations,
    }
}
