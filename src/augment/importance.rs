//! Importance scoring.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use std::sync::{Arc, LazyLock};
use tracing::debug;

use crate::error::Result;
use crate::llm::{GenerateOptions, GenerationClient};
use crate::memory::{MemoryKind, MemoryRecord};

/// Score used when a model reply carries no number.
pub const FALLBACK_IMPORTANCE: f64 = 0.5;

/// Days over which the heuristic recency factor falls by a factor of e.
const RECENCY_SCALE_DAYS: f64 = 30.0;

/// Content longer than this (in characters) earns a bonus.
const LONG_CONTENT_CHARS: usize = 200;

const BONUS: f64 = 0.1;

static LEADING_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?(\d+\.?\d*|\.\d+)([eE][+-]?\d+)?").expect("valid number pattern")
});

/// Produces an importance score in [0, 1] for a record.
#[async_trait]
pub trait ImportanceScorer: Send + Sync {
    async fn score(&self, record: &MemoryRecord, now: DateTime<Utc>) -> Result<f64>;
}

/// Kind weight times recency, plus bonuses for long content and metadata.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicImportanceScorer;

impl HeuristicImportanceScorer {
    pub fn kind_weight(kind: MemoryKind) -> f64 {
        match kind {
            MemoryKind::Preference => 0.8,
            MemoryKind::Fact => 0.6,
            MemoryKind::Event => 0.5,
            MemoryKind::Summary => 0.9,
            MemoryKind::Todo => 0.7,
        }
    }

    pub fn score_at(record: &MemoryRecord, now: DateTime<Utc>) -> f64 {
        let days = record.age_days(now);
        let mut score = Self::kind_weight(record.kind) * (-days / RECENCY_SCALE_DAYS).exp();

        if record.content.chars().count() > LONG_CONTENT_CHARS {
            score += BONUS;
        }
        if !record.metadata.is_empty() {
            score += BONUS;
        }

        score.clamp(0.0, 1.0)
    }
}

#[async_trait]
impl ImportanceScorer for HeuristicImportanceScorer {
    async fn score(&self, record: &MemoryRecord, now: DateTime<Utc>) -> Result<f64> {
        Ok(Self::score_at(record, now))
    }
}

/// Asks the generation client to rate the record.
pub struct ModelImportanceScorer {
    generator: Arc<dyn GenerationClient>,
}

impl ModelImportanceScorer {
    pub fn new(generator: Arc<dyn GenerationClient>) -> Self {
        Self { generator }
    }

    fn prompt(record: &MemoryRecord) -> String {
        format!(
            "Rate the importance of this memory on a scale of 0-1:\n\n\
             Memory: {}\n\
             Type: {}\n\n\
             Consider:\n\
             - Uniqueness (unique events > routine events)\n\
             - Emotional significance\n\
             - Long-term relevance\n\
             - Actionability\n\n\
             Return ONLY a number between 0 and 1.",
            record.content, record.kind
        )
    }
}

/// Parse the leading number of a model reply, clamped to [0, 1].
///
/// Replies without a leading number yield [`FALLBACK_IMPORTANCE`].
pub fn parse_importance(response: &str) -> f64 {
    LEADING_NUMBER
        .find(response.trim())
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .map(|v| v.clamp(0.0, 1.0))
        .unwrap_or(FALLBACK_IMPORTANCE)
}

#[async_trait]
impl ImportanceScorer for ModelImportanceScorer {
    async fn score(&self, record: &MemoryRecord, _now: DateTime<Utc>) -> Result<f64> {
        let response = self
            .generator
            .generate(&Self::prompt(record), &GenerateOptions::default())
            .await?;
        let score = parse_importance(&response);
        debug!(id = %record.id, score, "Model importance score");
        Ok(score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockGenerator;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_fresh_record_uses_kind_weight() {
        let record = MemoryRecord::new(MemoryKind::Preference, "Likes tea", now());
        let score = HeuristicImportanceScorer::score_at(&record, now());
        assert!((score - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_recency_decay() {
        let record = MemoryRecord::new(MemoryKind::Fact, "x", now() - Duration::days(30));
        let score = HeuristicImportanceScorer::score_at(&record, now());
        assert!((score - 0.6 * (-1.0f64).exp()).abs() < 1e-9);
    }

    #[test]
    fn test_bonuses_and_clamp() {
        let long = "x".repeat(201);
        let record = MemoryRecord::new(MemoryKind::Summary, long, now()).with_metadata("topic", "t");
        assert_eq!(HeuristicImportanceScorer::score_at(&record, now()), 1.0);

        let record = MemoryRecord::new(MemoryKind::Event, "short", now()).with_metadata("k", 1);
        assert!((HeuristicImportanceScorer::score_at(&record, now()) - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_parse_importance() {
        assert_eq!(parse_importance("0.73"), 0.73);
        assert_eq!(parse_importance("  0.9 because it matters"), 0.9);
        assert_eq!(parse_importance("1.5"), 1.0);
        assert_eq!(parse_importance("-0.3"), 0.0);
        assert_eq!(parse_importance(".5"), 0.5);
        assert_eq!(parse_importance("very important"), FALLBACK_IMPORTANCE);
        assert_eq!(parse_importance(""), FALLBACK_IMPORTANCE);
    }

    #[tokio::test]
    async fn test_model_scorer() {
        let generator = Arc::new(MockGenerator::new().with_default("0.25"));
        let scorer = ModelImportanceScorer::new(generator.clone());
        let record = MemoryRecord::new(MemoryKind::Todo, "File taxes", now());

        assert_eq!(scorer.score(&record, now()).await.unwrap(), 0.25);
        assert_eq!(generator.calls_containing("Memory: File taxes"), 1);
        assert_eq!(generator.calls_containing("Type: todo"), 1);
    }

    #[tokio::test]
    async fn test_model_scorer_garbage_defaults() {
        let scorer = ModelImportanceScorer::new(Arc::new(MockGenerator::new().with_default("n/a")));
        let record = MemoryRecord::new(MemoryKind::Fact, "x", now());
        assert_eq!(scorer.score(&record, now()).await.unwrap(), FALLBACK_IMPORTANCE);
    }
}
