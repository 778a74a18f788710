//! Headline sentiment scoring
//!
//! An ordered chain of scorers, each of which may abstain. The provider's
//! own label wins when present; otherwise a financial word-list scorer
//! produces a compound score. If every scorer abstains the engine falls
//! back to neutral with source `unknown`.

use crate::types::{Sentiment, SentimentScore};

/// A single scorer in the fallback chain; `None` means abstain
pub trait SentimentScorer: Send + Sync {
    fn name(&self) -> &'static str;
    fn score(&self, headline: &str, provider_hint: Option<&str>) -> Option<SentimentScore>;
}

/// Ordered scorer chain
pub struct SentimentEngine {
    scorers: Vec<Box<dyn SentimentScorer>>,
}

impl Default for SentimentEngine {
    fn default() -> Self {
        Self {
            scorers: vec![
                Box::new(ProviderLabelScorer),
                Box::new(LexiconScorer::default()),
            ],
        }
    }
}

impl SentimentEngine {
    pub fn new(scorers: Vec<Box<dyn SentimentScorer>>) -> Self {
        Self { scorers }
    }

    /// First non-abstaining result wins
    pub fn score(&self, headline: &str, provider_hint: Option<&str>) -> SentimentScore {
        for scorer in &self.scorers {
            if let Some(score) = scorer.score(headline, provider_hint) {
                return score;
            }
        }
        SentimentScore {
            label: Sentiment::Neutral,
            score: 0.0,
            source: "unknown".to_string(),
        }
    }
}

/// Normalizes the label the news provider attached to the article
pub struct ProviderLabelScorer;

impl SentimentScorer for ProviderLabelScorer {
    fn name(&self) -> &'static str {
        "benzinga"
    }

    fn score(&self, _headline: &str, provider_hint: Option<&str>) -> Option<SentimentScore> {
        let label = provider_hint?.trim().to_lowercase();
        let (label, score) = match label.as_str() {
            "bullish" | "positive" | "very bullish" => (Sentiment::Bullish, 0.8),
            "bearish" | "negative" | "very bearish" => (Sentiment::Bearish, -0.8),
            "neutral" => (Sentiment::Neutral, 0.0),
            _ => return None,
        };
        Some(SentimentScore {
            label,
            score,
            source: self.name().to_string(),
        })
    }
}

const BULLISH_TERMS: &[&str] = &[
    "beat", "beats", "tops", "surge", "surges", "soar", "soars", "jump", "jumps", "rally",
    "rallies", "record", "upgrade", "upgraded", "raises", "growth", "profit", "strong", "wins",
    "win", "approval", "approved", "breakthrough", "exceeds", "outperform", "buyback",
    "dividend", "expands", "bullish",
];

const BEARISH_TERMS: &[&str] = &[
    "miss", "misses", "fall", "falls", "plunge", "plunges", "drop", "drops", "cut", "cuts",
    "downgrade", "downgraded", "lawsuit", "probe", "investigation", "recall", "bankruptcy",
    "layoffs", "warning", "warns", "weak", "loss", "losses", "fraud", "halt", "delay",
    "delays", "underperform", "bearish",
];

/// Word-list scorer with the usual `x / sqrt(x^2 + alpha)` compound
/// normalization into [-1, 1]
pub struct LexiconScorer {
    alpha: f64,
    threshold: f64,
}

impl Default for LexiconScorer {
    fn default() -> Self {
        Self {
            alpha: 15.0,
            threshold: 0.1,
        }
    }
}

impl LexiconScorer {
    fn compound(&self, headline: &str) -> f64 {
        let mut raw = 0.0f64;
        for token in headline
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            if BULLISH_TERMS.contains(&token) {
                raw += 1.0;
            } else if BEARISH_TERMS.contains(&token) {
                raw -= 1.0;
            }
        }
        if raw == 0.0 {
            0.0
        } else {
            raw / (raw * raw + self.alpha).sqrt()
        }
    }
}

impl SentimentScorer for LexiconScorer {
    fn name(&self) -> &'static str {
        "lexicon"
    }

    fn score(&self, headline: &str, _provider_hint: Option<&str>) -> Option<SentimentScore> {
        let score = (self.compound(headline) * 10_000.0).round() / 10_000.0;
        let label = if score > self.threshold {
            Sentiment::Bullish
        } else if score < -self.threshold {
            Sentiment::Bearish
        } else {
            Sentiment::Neutral
        };
        Some(SentimentScore {
            label,
            score,
            source: self.name().to_string(),
        })
    }
}
