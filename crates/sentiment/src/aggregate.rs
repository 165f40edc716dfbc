//! Score-weighted aggregation of individual posts/articles into a single
//! per-day sentiment scalar in `[-1, 1]`, plus a default lexicon-style
//! ("VADER-like") text-sentiment scorer. The weighting and scorer are kept
//! as plain functions so a caller can swap in a different scorer without
//! touching the provider/router plumbing.

use rust_decimal::Decimal;

/// One unit of retrieved content: its raw text and the host platform's own
/// engagement score (upvotes, likes, ...), which may be zero or negative.
#[derive(Debug, Clone)]
pub struct Post {
    pub text: String,
    pub score: i64,
}

pub type TextSentimentFn = fn(&str) -> Decimal;

const POSITIVE_WORDS: &[&str] = &[
    "bullish", "beat", "beats", "surge", "surged", "growth", "upgrade", "upgraded", "strong",
    "record", "profit", "gain", "gains", "rally", "outperform", "positive", "buy", "good",
    "great", "soar", "soared", "win", "wins", "optimistic",
];

const NEGATIVE_WORDS: &[&str] = &[
    "bearish", "miss", "missed", "plunge", "plunged", "decline", "downgrade", "downgraded",
    "weak", "loss", "losses", "selloff", "underperform", "negative", "sell", "bad", "crash",
    "crashed", "lose", "loses", "pessimistic", "recall", "lawsuit",
];

/// A classic lexicon compound-score approximation: count positive/negative
/// token hits and normalize to `[-1, 1]`. Neutral (no hits, or empty text)
/// scores exactly 0.
pub fn default_text_sentiment(text: &str) -> Decimal {
    let lowered = text.to_lowercase();
    let tokens: Vec<&str> = lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect();
    if tokens.is_empty() {
        return Decimal::ZERO;
    }
    let pos = tokens.iter().filter(|t| POSITIVE_WORDS.contains(t)).count() as f64;
    let neg = tokens.iter().filter(|t| NEGATIVE_WORDS.contains(t)).count() as f64;
    if pos + neg == 0.0 {
        return Decimal::ZERO;
    }
    let compound = (pos - neg) / (pos + neg + 1.0).sqrt();
    Decimal::from_f64_retain(compound.clamp(-1.0, 1.0)).unwrap_or(Decimal::ZERO)
}

/// Aggregates posts into a single weighted sentiment scalar. Weight per post
/// is `log10(score + 10)`, guarded against a non-positive argument (a score
/// of `-10` or lower would otherwise make the logarithm undefined). Returns
/// `None` when there are no posts to aggregate — missing data must never be
/// synthesized as a zero.
pub fn aggregate_weighted(posts: &[Post], scorer: TextSentimentFn) -> Option<Decimal> {
    if posts.is_empty() {
        return None;
    }
    let mut weighted_sum = 0.0_f64;
    let mut weight_total = 0.0_f64;
    for post in posts {
        let raw = (post.score as f64) + 10.0;
        let guarded = if raw <= 0.0 { 1e-6 } else { raw };
        let weight = guarded.log10();
        let weight = if weight.is_finite() { weight.max(0.0) } else { 0.0 };
        let s = scorer(&post.text);
        let s_f64 = s
            .to_string()
            .parse::<f64>()
            .unwrap_or(0.0);
        weighted_sum += weight * s_f64;
        weight_total += weight;
    }
    if weight_total == 0.0 {
        return None;
    }
    Decimal::from_f64_retain((weighted_sum / weight_total).clamp(-1.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positive_words_score_above_zero() {
        let s = default_text_sentiment("Strong earnings beat, bullish rally expected");
        assert!(s > Decimal::ZERO);
    }

    #[test]
    fn negative_words_score_below_zero() {
        let s = default_text_sentiment("Guidance miss triggers selloff, bearish outlook");
        assert!(s < Decimal::ZERO);
    }

    #[test]
    fn empty_post_list_aggregates_to_none() {
        assert!(aggregate_weighted(&[], default_text_sentiment).is_none());
    }

    #[test]
    fn very_negative_score_does_not_panic_on_log() {
        let posts = vec![Post { text: "bullish".to_string(), score: -1000 }];
        let agg = aggregate_weighted(&posts, default_text_sentiment);
        assert!(agg.is_some());
    }
}
