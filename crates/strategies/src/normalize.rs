//! Strategy spec normalization and validation.
//!
//! Input is an untrusted map (from an LLM or from disk). This module is the
//! single source of truth: every downstream component (backtester, live
//! engine) reads only the normalized `StrategySpec`, never the raw value.

use core_types::{
    AllocationMode, Comparison, ConditionSpec, CrossoverDirection, ExitSpec, PriceTrigger,
    RiskSpec, SentimentSource, StrategySpec,
};
use core_types::FieldValidationError;
use rust_decimal::Decimal;
use serde_json::Value;

use crate::error::StrategyError;

/// Normalizes and validates an untrusted JSON strategy description into a
/// `StrategySpec`. Collects every field error rather than failing on the
/// first one, so a caller (the workflow engine) can report them all at once.
pub fn normalize(raw: &Value) -> Result<StrategySpec, StrategyError> {
    let mut errors: Vec<FieldValidationError> = Vec::new();

    let name = raw
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or("unnamed-strategy")
        .to_string();

    let assets = extract_assets(raw, &mut errors);
    let entry_conditions = extract_entry_conditions(raw, &mut errors);
    let exit = extract_exit(raw, &mut errors);
    let risk = extract_risk(raw, &mut errors);
    let data_sources = extract_data_sources(raw);

    if !errors.is_empty() {
        return Err(StrategyError::Validation(errors));
    }

    Ok(StrategySpec {
        name,
        assets,
        entry_conditions,
        exit,
        risk,
        data_sources,
    })
}

fn extract_assets(raw: &Value, errors: &mut Vec<FieldValidationError>) -> Vec<String> {
    if let Some(arr) = raw.get("assets").and_then(Value::as_array) {
        let assets: Vec<String> = arr
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect();
        if !assets.is_empty() {
            return assets;
        }
    }
    if let Some(asset) = raw.get("asset").and_then(Value::as_str) {
        return vec![asset.to_string()];
    }
    errors.push(FieldValidationError {
        field: "asset".to_string(),
        message: "missing `asset` or `assets`".to_string(),
    });
    Vec::new()
}

/// Structural rewrite: if the raw input places parameters at the top level
/// of a condition object rather than under a nested `parameters` key, fold
/// them in before dispatching on `kind`.
fn fold_top_level_params(condition: &Value) -> Value {
    let obj = match condition.as_object() {
        Some(o) => o,
        None => return condition.clone(),
    };
    if obj.contains_key("parameters") {
        return condition.clone();
    }
    let mut params = serde_json::Map::new();
    for (k, v) in obj {
        if k != "kind" && k != "type" {
            params.insert(k.clone(), v.clone());
        }
    }
    let mut rewritten = obj.clone();
    rewritten.insert("parameters".to_string(), Value::Object(params));
    Value::Object(rewritten)
}

fn extract_entry_conditions(
    raw: &Value,
    errors: &mut Vec<FieldValidationError>,
) -> Vec<ConditionSpec> {
    let arr = match raw.get("entry_conditions").and_then(Value::as_array) {
        Some(a) => a,
        None => return Vec::new(),
    };
    arr.iter()
        .enumerate()
        .map(|(i, raw_cond)| {
            let folded = fold_top_level_params(raw_cond);
            coerce_condition(&folded).unwrap_or_else(|| {
                errors.push(FieldValidationError {
                    field: format!("entry_conditions[{i}].kind"),
                    message: "unknown condition kind; falling through to custom".to_string(),
                });
                ConditionSpec::Custom {
                    label: raw_cond
                        .get("kind")
                        .and_then(Value::as_str)
                        .unwrap_or("unknown")
                        .to_string(),
                }
            })
        })
        .collect()
}

/// Attempts to coerce a folded condition object into a typed `ConditionSpec`.
/// Returns `None` only if the `kind` tag itself is unrecognized; individual
/// missing parameters fall back to conservative defaults rather than
/// rejecting the whole condition, matching the "conservative default, never
/// a silent match" rule for unknowns while still being permissive about
/// partially-specified known kinds.
fn coerce_condition(condition: &Value) -> Option<ConditionSpec> {
    let kind = condition
        .get("kind")
        .or_else(|| condition.get("type"))
        .and_then(Value::as_str)?;
    let params = condition.get("parameters").cloned().unwrap_or(Value::Null);
    let p_num = |key: &str, default: i64| -> Decimal {
        params
            .get(key)
            .and_then(Value::as_f64)
            .and_then(|f| Decimal::try_from(f).ok())
            .unwrap_or(Decimal::from(default))
    };
    let p_usize = |key: &str, default: usize| -> usize {
        params
            .get(key)
            .and_then(Value::as_u64)
            .map(|u| u as usize)
            .unwrap_or(default)
    };

    Some(match kind {
        "rsi" => ConditionSpec::Rsi {
            period: p_usize("period", 14),
            threshold: p_num("threshold", 30),
            comparison: match params.get("comparison").and_then(Value::as_str) {
                Some("above") => Comparison::Above,
                _ => Comparison::Below,
            },
        },
        "macd" => ConditionSpec::Macd {
            fast_period: p_usize("fast_period", 12),
            slow_period: p_usize("slow_period", 26),
            signal_period: p_usize("signal_period", 9),
            crossover: match params.get("crossover").and_then(Value::as_str) {
                Some("bearish") => CrossoverDirection::Bearish,
                _ => CrossoverDirection::Bullish,
            },
        },
        "sma" => ConditionSpec::Sma {
            fast_period: p_usize("fast_period", 10),
            slow_period: p_usize("slow_period", 50),
        },
        "sentiment" => ConditionSpec::Sentiment {
            source: match params.get("source").and_then(Value::as_str) {
                Some("twitter") => SentimentSource::Twitter,
                Some("news") => SentimentSource::News,
                _ => SentimentSource::Reddit,
            },
            threshold: p_num("threshold", 0),
        },
        "news" => ConditionSpec::News,
        "price" => ConditionSpec::Price {
            trigger: match params.get("trigger").and_then(Value::as_str) {
                Some("breakout") => PriceTrigger::Breakout,
                _ => PriceTrigger::Any,
            },
        },
        "custom" => ConditionSpec::Custom {
            label: params
                .get("label")
                .and_then(Value::as_str)
                .unwrap_or("custom")
                .to_string(),
        },
        _ => return None,
    })
}

/// Normalizes a percentage-ish field: a magnitude `> 1` is assumed to be a
/// whole-number percent (e.g. `5` meaning 5%) and divided by 100; the sign is
/// discarded so stop-loss is always stored as a positive magnitude. Public so
/// callers that accept a raw override for an already-normalized `StrategySpec`
/// (e.g. the backtest endpoint's `take_profit_override`) can route it through
/// the same rule rather than assigning it in raw.
pub fn normalize_pct(raw: Decimal) -> Decimal {
    let magnitude = raw.abs();
    if magnitude > Decimal::ONE {
        magnitude / Decimal::from(100)
    } else {
        magnitude
    }
}

fn extract_exit(raw: &Value, errors: &mut Vec<FieldValidationError>) -> ExitSpec {
    let exit = raw.get("exit").cloned().unwrap_or(Value::Null);
    let take_profit = exit
        .get("take_profit")
        .and_then(Value::as_f64)
        .and_then(|f| Decimal::try_from(f).ok())
        .map(normalize_pct);
    let stop_loss = exit
        .get("stop_loss")
        .and_then(Value::as_f64)
        .and_then(|f| Decimal::try_from(f).ok())
        .map(normalize_pct);
    let take_profit_pct_shares = exit
        .get("take_profit_pct_shares")
        .and_then(Value::as_f64)
        .and_then(|f| Decimal::try_from(f).ok())
        .unwrap_or(Decimal::ONE);
    let stop_loss_pct_shares = exit
        .get("stop_loss_pct_shares")
        .and_then(Value::as_f64)
        .and_then(|f| Decimal::try_from(f).ok())
        .unwrap_or(Decimal::ONE);

    if !(Decimal::ZERO..=Decimal::ONE).contains(&take_profit_pct_shares) {
        errors.push(FieldValidationError {
            field: "exit.take_profit_pct_shares".to_string(),
            message: "must be within [0, 1]".to_string(),
        });
    }

    let custom_exit = exit
        .get("custom_exit")
        .filter(|v| !v.is_null())
        .map(fold_top_level_params)
        .and_then(|v| coerce_condition(&v));

    ExitSpec {
        take_profit,
        stop_loss,
        take_profit_pct_shares,
        stop_loss_pct_shares,
        custom_exit,
    }
}

fn extract_risk(raw: &Value, errors: &mut Vec<FieldValidationError>) -> RiskSpec {
    let risk = raw.get("risk").cloned().unwrap_or(Value::Null);
    let position_size = risk
        .get("position_size")
        .and_then(Value::as_f64)
        .and_then(|f| Decimal::try_from(f).ok())
        .map(normalize_pct)
        .unwrap_or(Decimal::new(1, 1)); // default 0.1
    let max_positions = risk
        .get("max_positions")
        .and_then(Value::as_u64)
        .map(|u| u as u32)
        .unwrap_or(1);
    if max_positions < 1 {
        errors.push(FieldValidationError {
            field: "risk.max_positions".to_string(),
            message: "must be >= 1".to_string(),
        });
    }
    let allocation = match risk.get("allocation").and_then(Value::as_str) {
        Some("signal_weighted") => AllocationMode::SignalWeighted,
        Some("dynamic_trending") => AllocationMode::DynamicTrending,
        Some("market_cap_weighted") => AllocationMode::MarketCapWeighted,
        _ => AllocationMode::Equal,
    };
    RiskSpec {
        position_size,
        max_positions: max_positions.max(1),
        allocation,
    }
}

fn extract_data_sources(raw: &Value) -> Vec<SentimentSource> {
    raw.get("data_sources")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(Value::as_str)
                .filter_map(|s| match s {
                    "reddit" => Some(SentimentSource::Reddit),
                    "twitter" => Some(SentimentSource::Twitter),
                    "news" => Some(SentimentSource::News),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn negative_stop_loss_normalizes_to_positive_fraction() {
        let raw = json!({
            "name": "rsi-reversion",
            "asset": "AAPL",
            "entry_conditions": [{"kind": "rsi", "period": 14, "threshold": 40, "comparison": "below"}],
            "exit": {"stop_loss": -10, "take_profit": 5},
            "risk": {"position_size": 10, "max_positions": 1},
        });
        let spec = normalize(&raw).expect("valid spec");
        assert_eq!(spec.exit.stop_loss, Some(Decimal::new(10, 2)));
        assert_eq!(spec.exit.take_profit, Some(Decimal::new(5, 2)));
        assert!(spec.risk.position_size <= Decimal::ONE);
    }

    #[test]
    fn top_level_entry_params_are_folded_into_parameters() {
        let raw = json!({
            "name": "sma-cross",
            "asset": "MSFT",
            "entry_conditions": [{"kind": "sma", "fast_period": 10, "slow_period": 50}],
            "exit": {},
            "risk": {"position_size": 0.1, "max_positions": 1},
        });
        let spec = normalize(&raw).expect("valid spec");
        assert_eq!(
            spec.entry_conditions[0],
            ConditionSpec::Sma {
                fast_period: 10,
                slow_period: 50
            }
        );
    }

    #[test]
    fn unknown_condition_kind_becomes_custom_not_silent_match() {
        let raw = json!({
            "name": "mystery",
            "asset": "TSLA",
            "entry_conditions": [{"kind": "moon_phase", "full": true}],
            "exit": {},
            "risk": {"position_size": 0.1, "max_positions": 1},
        });
        let spec = normalize(&raw).expect("valid spec");
        assert!(matches!(spec.entry_conditions[0], ConditionSpec::Custom { .. }));
    }

    #[test]
    fn two_phase_exit_detected_when_partial_shares_below_one() {
        let raw = json!({
            "name": "partial",
            "asset": "AAPL",
            "entry_conditions": [],
            "exit": {"take_profit": 0.05, "take_profit_pct_shares": 0.5, "stop_loss": 0.02},
            "risk": {"position_size": 0.1, "max_positions": 1},
        });
        let spec = normalize(&raw).expect("valid spec");
        assert!(spec.exit.is_two_phase_exit());
        assert!(spec.exit.has_trailing_stop());
    }
}
