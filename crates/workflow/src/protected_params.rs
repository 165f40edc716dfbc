//! User-specified parameter protection (§4.7): a query like "buy when RSI
//! drops below 25 with a 3% stop loss" pins `rsi_threshold` and `stop_loss`
//! so later refinements can only recommend changing them, never apply a
//! change silently. Grounded in
//! `original_source/backend/agents/code_generator.py`'s
//! `_extract_user_specified_params`, translated from Python's `re` module to
//! `regex` (no NLP crate exists in the pack, and the spec only calls for
//! literal-number extraction).

use agents::ProtectedParams;
use regex::Regex;
use rust_decimal::Decimal;
use std::sync::OnceLock;

fn rsi_below_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"rsi\s*(?:drops?|falls?|goes?|is)?\s*(?:below|under|<)\s*(\d+(?:\.\d+)?)").unwrap()
    })
}

fn sentiment_threshold_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"sentiment\s*(?:above|over|below|under|>|<)?\s*(\d+(?:\.\d+)?)").unwrap()
    })
}

fn take_profit_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?:[+]?(\d+(?:\.\d+)?)%\s*(?:profit|take\s*profit|tp))|(?:(?:take\s*profit|tp)\s*(?:at\s+)?[+]?(\d+(?:\.\d+)?)%)").unwrap()
    })
}

fn stop_loss_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?:[-]?(\d+(?:\.\d+)?)%\s*(?:stop\s*loss|sl))|(?:(?:stop\s*loss|sl)\s*(?:at\s+)?[-]?(\d+(?:\.\d+)?)%)").unwrap()
    })
}

fn first_capture(re: &Regex, text: &str) -> Option<Decimal> {
    let caps = re.captures(text)?;
    caps.iter()
        .skip(1)
        .flatten()
        .next()
        .and_then(|m| m.as_str().parse::<Decimal>().ok())
}

/// Scans `user_query` for literal thresholds the user pinned. Percentages
/// (`take_profit`, `stop_loss`) are normalized to fractions (`5%` -> `0.05`)
/// to match `StrategySpec`'s own representation.
pub fn extract(user_query: &str) -> ProtectedParams {
    let query = user_query.to_lowercase();
    let mut protected = ProtectedParams::new();

    if let Some(threshold) = first_capture(rsi_below_re(), &query) {
        protected.insert("rsi_threshold".to_string(), threshold);
    }
    if let Some(threshold) = first_capture(sentiment_threshold_re(), &query) {
        protected.insert("sentiment_threshold".to_string(), threshold);
    }
    if let Some(pct) = first_capture(take_profit_re(), &query) {
        protected.insert("take_profit".to_string(), pct / Decimal::ONE_HUNDRED);
    }
    if let Some(pct) = first_capture(stop_loss_re(), &query) {
        protected.insert("stop_loss".to_string(), pct / Decimal::ONE_HUNDRED);
    }

    protected
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn extracts_rsi_take_profit_and_stop_loss() {
        let protected = extract("buy AAPL when RSI drops below 25, take profit at 8%, stop loss 3%");
        assert_eq!(protected.get("rsi_threshold"), Some(&dec!(25)));
        assert_eq!(protected.get("take_profit"), Some(&dec!(0.08)));
        assert_eq!(protected.get("stop_loss"), Some(&dec!(0.03)));
    }

    #[test]
    fn empty_query_yields_no_protected_params() {
        let protected = extract("trade momentum on tech stocks");
        assert!(protected.is_empty());
    }
}
