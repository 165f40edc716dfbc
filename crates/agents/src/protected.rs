//! Protected-parameter enforcement (§4.7): numeric values the user
//! literally specified in their natural-language query may not be altered
//! by a later refinement. Extraction of these values from the raw query
//! text lives in the `workflow` crate (a keyword/regex scanner, since no
//! NLP crate exists in the pack); this module only applies the resulting
//! map against a refined `StrategySpec`.

use std::collections::HashMap;

use core_types::{ConditionSpec, StrategySpec};
use rust_decimal::Decimal;

/// Literal values the user specified, keyed by a small fixed vocabulary:
/// `rsi_threshold`, `take_profit`, `stop_loss`, `sentiment_threshold`.
pub type ProtectedParams = HashMap<String, Decimal>;

/// Reverts any field a refinement changed that the user had pinned,
/// recording a recommendation note in `changes_made` instead of silently
/// dropping the suggestion.
pub fn enforce(spec: &mut StrategySpec, protected: &ProtectedParams, changes_made: &mut Vec<String>) {
    if let Some(&protected_tp) = protected.get("take_profit") {
        if spec.exit.take_profit != Some(protected_tp) {
            changes_made.push(format!(
                "take_profit is user-protected at {protected_tp}; refinement suggestion recorded but not applied"
            ));
            spec.exit.take_profit = Some(protected_tp);
        }
    }

    if let Some(&protected_sl) = protected.get("stop_loss") {
        if spec.exit.stop_loss != Some(protected_sl) {
            changes_made.push(format!(
                "stop_loss is user-protected at {protected_sl}; refinement suggestion recorded but not applied"
            ));
            spec.exit.stop_loss = Some(protected_sl);
        }
    }

    if let Some(&protected_rsi) = protected.get("rsi_threshold") {
        for condition in spec.entry_conditions.iter_mut().chain(
            spec.exit
                .custom_exit
                .as_mut()
                .into_iter(),
        ) {
            if let ConditionSpec::Rsi { threshold, .. } = condition {
                if *threshold != protected_rsi {
                    changes_made.push(format!(
                        "RSI threshold is user-protected at {protected_rsi}; refinement suggestion recorded but not applied"
                    ));
                    *threshold = protected_rsi;
                }
            }
        }
    }

    if let Some(&protected_sentiment) = protected.get("sentiment_threshold") {
        for condition in spec.entry_conditions.iter_mut() {
            if let ConditionSpec::Sentiment { threshold, .. } = condition {
                if *threshold != protected_sentiment {
                    changes_made.push(format!(
                        "sentiment threshold is user-protected at {protected_sentiment}; refinement suggestion recorded but not applied"
                    ));
                    *threshold = protected_sentiment;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::{AllocationMode, Comparison, ExitSpec, RiskSpec};
    use rust_decimal_macros::dec;

    fn spec_with_rsi(threshold: Decimal) -> StrategySpec {
        StrategySpec {
            name: "test".to_string(),
            assets: vec!["AAPL".to_string()],
            entry_conditions: vec![ConditionSpec::Rsi {
                period: 14,
                threshold,
                comparison: Comparison::Below,
            }],
            exit: ExitSpec {
                take_profit: Some(dec!(0.05)),
                stop_loss: Some(dec!(0.02)),
                take_profit_pct_shares: dec!(1),
                stop_loss_pct_shares: dec!(1),
                custom_exit: None,
            },
            risk: RiskSpec {
                position_size: dec!(0.1),
                max_positions: 1,
                allocation: AllocationMode::Equal,
            },
            data_sources: vec![],
        }
    }

    #[test]
    fn refinement_cannot_move_a_protected_rsi_threshold() {
        let mut spec = spec_with_rsi(dec!(40));
        let mut protected = ProtectedParams::new();
        protected.insert("rsi_threshold".to_string(), dec!(28));
        let mut changes = Vec::new();

        enforce(&mut spec, &protected, &mut changes);

        let ConditionSpec::Rsi { threshold, .. } = &spec.entry_conditions[0] else {
            panic!("expected an RSI condition");
        };
        assert_eq!(*threshold, dec!(28));
        assert_eq!(changes.len(), 1);
    }

    #[test]
    fn unprotected_refinement_passes_through_untouched() {
        let mut spec = spec_with_rsi(dec!(35));
        let protected = ProtectedParams::new();
        let mut changes = Vec::new();

        enforce(&mut spec, &protected, &mut changes);

        let ConditionSpec::Rsi { threshold, .. } = &spec.entry_conditions[0] else {
            panic!("expected an RSI condition");
        };
        assert_eq!(*threshold, dec!(35));
        assert!(changes.is_empty());
    }
}
