//! Time-windowed consolidation of records into summaries.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::Result;
use crate::llm::{GenerateOptions, GenerationClient};
use crate::memory::{MemoryId, MemoryKind, MemoryRecord, Metadata};

/// Source tag on summaries produced here.
pub const CONSOLIDATION_SOURCE: &str = "consolidation";

/// Folds a busy trailing window into one summary record.
///
/// Records already listed in some summary's `consolidatedFrom`, and the
/// summaries themselves, are never counted or folded again.
pub struct TemporalConsolidation {
    generator: Arc<dyn GenerationClient>,
    min_memories: usize,
    window: Duration,
}

impl TemporalConsolidation {
    pub fn new(generator: Arc<dyn GenerationClient>, min_memories: usize, window: Duration) -> Self {
        Self {
            generator,
            min_memories,
            window,
        }
    }

    /// Records still eligible for consolidation, in corpus order.
    pub fn eligible<'a>(&self, corpus: &'a [MemoryRecord]) -> Vec<&'a MemoryRecord> {
        let folded: HashSet<MemoryId> = corpus
            .iter()
            .flat_map(|r| r.metadata.consolidated_from())
            .collect();

        corpus
            .iter()
            .filter(|r| !is_consolidation_summary(r) && !folded.contains(&r.id))
            .collect()
    }

    /// Whether enough eligible records were created inside the window.
    pub fn should_consolidate(&self, corpus: &[MemoryRecord], now: DateTime<Utc>) -> bool {
        // A window reaching past the earliest representable instant covers everything.
        let cutoff = now.checked_sub_signed(self.window);
        let recent = self
            .eligible(corpus)
            .into_iter()
            .filter(|r| cutoff.map_or(true, |cutoff| r.created_at > cutoff))
            .count();
        debug!(recent, min = self.min_memories, "Consolidation window check");
        recent >= self.min_memories
    }

    /// Summarize `records` into a new, unsaved summary record.
    pub async fn consolidate(&self, records: &[&MemoryRecord], now: DateTime<Utc>) -> Result<MemoryRecord> {
        let texts: Vec<&str> = records.iter().map(|r| r.content.as_str()).collect();
        let prompt = format!(
            "Consolidate these related memories into a single, comprehensive summary:\n\n\
             {}\n\n\
             Extract:\n\
             1. Key facts and patterns\n\
             2. Preferences and tendencies\n\
             3. Important relationships\n\
             4. Notable events\n\n\
             Format as a concise but complete summary.",
            texts.join("\n")
        );
        let summary = self
            .generator
            .generate(&prompt, &GenerateOptions::default())
            .await?;

        let ids: Vec<String> = records.iter().map(|r| r.id.to_string()).collect();
        let record = MemoryRecord::new(MemoryKind::Summary, summary.trim(), now)
            .with_metadata(Metadata::CONSOLIDATED_FROM, ids)
            .with_metadata(Metadata::CONSOLIDATED_COUNT, records.len())
            .with_source(CONSOLIDATION_SOURCE);

        info!(id = %record.id, count = records.len(), "Consolidated records");
        Ok(record)
    }
}

fn is_consolidation_summary(record: &MemoryRecord) -> bool {
    record.kind == MemoryKind::Summary && record.metadata.get(Metadata::CONSOLIDATED_FROM).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockGenerator;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 10, 2, 12, 0, 0).unwrap()
    }

    fn consolidation(generator: Arc<MockGenerator>) -> TemporalConsolidation {
        TemporalConsolidation::new(generator, 3, Duration::hours(24))
    }

    fn fact(content: &str, hours_ago: i64) -> MemoryRecord {
        MemoryRecord::new(MemoryKind::Fact, content, now() - Duration::hours(hours_ago))
    }

    #[test]
    fn test_window_threshold() {
        let c = consolidation(Arc::new(MockGenerator::new()));
        let corpus = vec![fact("a", 1), fact("b", 2), fact("old", 48)];
        assert!(!c.should_consolidate(&corpus, now()));

        let mut corpus = corpus;
        corpus.push(fact("c", 3));
        assert!(c.should_consolidate(&corpus, now()));
    }

    #[test]
    fn test_oversized_window_covers_whole_corpus() {
        let c = TemporalConsolidation::new(Arc::new(MockGenerator::new()), 3, Duration::MAX);
        let corpus = vec![fact("a", 1), fact("b", 24 * 365 * 50), fact("c", 24 * 365 * 500)];
        assert!(c.should_consolidate(&corpus, now()));
    }

    #[tokio::test]
    async fn test_summary_carries_provenance() {
        let generator = Arc::new(MockGenerator::new().with_default("  User had a busy day.  "));
        let c = consolidation(generator.clone());
        let corpus = vec![fact("a", 1), fact("b", 2)];
        let inputs: Vec<&MemoryRecord> = corpus.iter().collect();

        let summary = c.consolidate(&inputs, now()).await.unwrap();
        assert_eq!(summary.kind, MemoryKind::Summary);
        assert_eq!(summary.content, "User had a busy day.");
        assert_eq!(
            summary.metadata.consolidated_from(),
            vec![corpus[0].id.clone(), corpus[1].id.clone()]
        );
        assert_eq!(summary.metadata.get(Metadata::CONSOLIDATED_COUNT).unwrap(), 2);
        assert_eq!(summary.source.as_deref(), Some(CONSOLIDATION_SOURCE));
        assert_eq!(generator.calls_containing("a\nb"), 1);
    }

    #[tokio::test]
    async fn test_folded_records_not_counted_again() {
        let generator = Arc::new(MockGenerator::new().with_default("summary"));
        let c = consolidation(generator);
        let mut corpus = vec![fact("a", 1), fact("b", 1), fact("c", 1)];
        assert!(c.should_consolidate(&corpus, now()));

        let inputs: Vec<&MemoryRecord> = c.eligible(&corpus);
        let summary = c.consolidate(&inputs, now()).await.unwrap();
        corpus.push(summary);

        assert!(c.eligible(&corpus).is_empty());
        assert!(!c.should_consolidate(&corpus, now()));

        corpus.push(fact("d", 0));
        assert_eq!(c.eligible(&corpus).len(), 1);
    }
}
