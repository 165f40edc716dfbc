//! The condition evaluator dispatch table.
//!
//! Replaces a long if/elif ladder over condition kinds (as the source did)
//! with a tagged union (`core_types::ConditionSpec`) and a dispatcher from
//! kind to evaluator function. Each evaluator is a pure function of its
//! inputs; unknown/custom kinds never produce a silent match.

use core_types::{Bar, Comparison, ConditionSpec, CrossoverDirection, PriceTrigger};
use indicators::{MacdReading, Reading, SymbolIndicators};
use rust_decimal::Decimal;

/// Everything a condition evaluator needs, gathered by the caller
/// (backtester or live engine tick) before dispatch. `prev_*` fields hold the
/// indicator values computed *before* the current bar was pushed, which
/// crossover-style conditions (`macd`, `sma`) need to detect a cross rather
/// than a static relationship.
pub struct ConditionContext<'a> {
    pub bar: &'a Bar,
    pub bar_history: &'a [Bar],
    pub indicators: &'a SymbolIndicators,
    pub prev_sma: Option<(Decimal, Decimal)>,
    pub prev_macd: Option<MacdReading>,
    /// Resolved sentiment scalar for this condition's configured source and
    /// the bar's date; `None` means no data was found (source-strict lookup
    /// already applied upstream — never a cross-source substitution).
    pub sentiment: Option<Decimal>,
    /// `Some(true)` = positive news label, `Some(false)` = negative, `None` =
    /// no news bundle for this day.
    pub news_positive: Option<bool>,
}

/// Evaluates one condition against the current context. Returns
/// `(matched, reason)`, matching the contract's pure-function signature.
pub fn evaluate(condition: &ConditionSpec, ctx: &ConditionContext) -> (bool, String) {
    match condition {
        ConditionSpec::Rsi {
            period,
            threshold,
            comparison,
        } => evaluate_rsi(*period, *threshold, *comparison, ctx),
        ConditionSpec::Macd { crossover, .. } => evaluate_macd(*crossover, ctx),
        ConditionSpec::Sma {
            fast_period,
            slow_period,
        } => evaluate_sma(*fast_period, *slow_period, ctx),
        ConditionSpec::Sentiment { threshold, .. } => evaluate_sentiment(*threshold, ctx),
        ConditionSpec::News => evaluate_news(ctx),
        ConditionSpec::Price { trigger } => evaluate_price(*trigger, ctx),
        ConditionSpec::Custom { label } => {
            tracing::warn!(condition = %label, "unrecognized condition kind; defaulting to no match");
            (false, format!("custom condition '{label}' has no built-in evaluator"))
        }
    }
}

fn evaluate_rsi(
    period: usize,
    threshold: Decimal,
    comparison: Comparison,
    ctx: &ConditionContext,
) -> (bool, String) {
    match ctx.indicators.rsi(period) {
        Reading::Unavailable => (false, "rsi unavailable: insufficient history".to_string()),
        Reading::Value(rsi) => {
            let matched = match comparison {
                Comparison::Below => rsi < threshold,
                Comparison::Above => rsi > threshold,
            };
            (
                matched,
                format!("rsi({period})={rsi} {comparison:?} threshold {threshold}"),
            )
        }
    }
}

fn evaluate_macd(crossover: CrossoverDirection, ctx: &ConditionContext) -> (bool, String) {
    let current = match ctx.indicators.macd(12, 26, 9) {
        Some(m) => m,
        None => return (false, "macd unavailable: insufficient history".to_string()),
    };
    let prev = match ctx.prev_macd {
        Some(p) => p,
        None => return (false, "macd unavailable: no prior bar for crossover".to_string()),
    };
    let matched = match crossover {
        CrossoverDirection::Bullish => prev.macd <= prev.signal && current.macd > current.signal,
        CrossoverDirection::Bearish => prev.macd >= prev.signal && current.macd < current.signal,
    };
    (matched, format!("macd crossover {crossover:?}: {prev:?} -> {current:?}"))
}

fn evaluate_sma(fast_period: usize, slow_period: usize, ctx: &ConditionContext) -> (bool, String) {
    let (fast, slow) = match (
        ctx.indicators.sma(fast_period),
        ctx.indicators.sma(slow_period),
    ) {
        (Reading::Value(f), Reading::Value(s)) => (f, s),
        _ => return (false, "sma unavailable: insufficient history".to_string()),
    };
    let matched = match ctx.prev_sma {
        Some((prev_fast, prev_slow)) => prev_fast <= prev_slow && fast > slow,
        None => false,
    };
    (matched, format!("sma({fast_period})={fast} crossed above sma({slow_period})={slow}"))
}

fn evaluate_sentiment(threshold: Decimal, ctx: &ConditionContext) -> (bool, String) {
    match ctx.sentiment {
        Some(score) => (score >= threshold, format!("sentiment={score} >= threshold {threshold}")),
        None => (false, "sentiment unavailable for this (symbol, source, date)".to_string()),
    }
}

fn evaluate_news(ctx: &ConditionContext) -> (bool, String) {
    match ctx.news_positive {
        Some(label) => (label, format!("news label positive={label}")),
        None => (false, "no news bundle for this day".to_string()),
    }
}

fn evaluate_price(trigger: PriceTrigger, ctx: &ConditionContext) -> (bool, String) {
    match trigger {
        PriceTrigger::Any => (true, "price trigger=any always matches".to_string()),
        PriceTrigger::Breakout => match ctx.indicators.highest_high(20) {
            Some(high) => {
                let matched = ctx.bar.close > high;
                (matched, format!("close {} vs 20-bar high {}", ctx.bar.close, high))
            }
            None => (false, "breakout unavailable: fewer than 20 bars".to_string()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn bar(close: Decimal) -> Bar {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Bar {
            open_time: ts,
            open: close,
            high: close,
            low: close,
            close,
            volume: dec!(1000),
            close_time: ts,
            interval: "1d".to_string(),
        }
    }

    #[test]
    fn missing_sentiment_never_synthesizes_a_match() {
        let mut ind = SymbolIndicators::new(50);
        ind.push(bar(dec!(100)));
        let b = bar(dec!(100));
        let ctx = ConditionContext {
            bar: &b,
            bar_history: &[],
            indicators: &ind,
            prev_sma: None,
            prev_macd: None,
            sentiment: None,
            news_positive: None,
        };
        let (matched, _) = evaluate(
            &ConditionSpec::Sentiment {
                source: core_types::SentimentSource::Reddit,
                threshold: dec!(0.2),
            },
            &ctx,
        );
        assert!(!matched);
    }

    #[test]
    fn price_any_trigger_always_matches() {
        let ind = SymbolIndicators::new(50);
        let b = bar(dec!(100));
        let ctx = ConditionContext {
            bar: &b,
            bar_history: &[],
            indicators: &ind,
            prev_sma: None,
            prev_macd: None,
            sentiment: None,
            news_positive: None,
        };
        let (matched, _) = evaluate(&ConditionSpec::Price { trigger: PriceTrigger::Any }, &ctx);
        assert!(matched);
    }

    #[test]
    fn unknown_custom_condition_never_silently_matches() {
        let ind = SymbolIndicators::new(50);
        let b = bar(dec!(100));
        let ctx = ConditionContext {
            bar: &b,
            bar_history: &[],
            indicators: &ind,
            prev_sma: None,
            prev_macd: None,
            sentiment: None,
            news_positive: None,
        };
        let (matched, _) = evaluate(&ConditionSpec::Custom { label: "mystery".to_string() }, &ctx);
        assert!(!matched);
    }
}
