//! Keyword-overlap ranking.

use async_trait::async_trait;
use regex::Regex;
use std::sync::LazyLock;

use crate::error::Result;
use crate::memory::MemoryRecord;

use super::similarity::sort_by_score_desc;
use super::{RetrievalStrategy, DEFAULT_LIMIT};

static NON_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\W+").expect("valid non-word pattern"));

/// Lower-cased query tokens longer than two characters.
pub fn extract_keywords(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    NON_WORD
        .split(&lowered)
        .filter(|token| token.chars().count() > 2)
        .map(str::to_string)
        .collect()
}

/// Number of keywords found anywhere in the record's content or metadata.
pub fn keyword_score(keywords: &[String], record: &MemoryRecord) -> usize {
    let haystack = format!("{} {}", record.content, record.metadata_text()).to_lowercase();
    keywords
        .iter()
        .filter(|kw| haystack.contains(kw.as_str()))
        .count()
}

/// Ranks candidates by how many query keywords they contain.
///
/// Candidates with no matching keyword are dropped. Equal scores keep their
/// input order.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordStrategy;

impl KeywordStrategy {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RetrievalStrategy for KeywordStrategy {
    fn name(&self) -> &'static str {
        "keyword"
    }

    async fn retrieve(
        &self,
        query: &str,
        candidates: Vec<MemoryRecord>,
        limit: Option<usize>,
    ) -> Result<Vec<MemoryRecord>> {
        let keywords = extract_keywords(query);

        let mut scored: Vec<(f64, MemoryRecord)> = candidates
            .into_iter()
            .filter_map(|record| {
                let score = keyword_score(&keywords, &record);
                (score > 0).then_some((score as f64, record))
            })
            .collect();
        sort_by_score_desc(&mut scored);

        Ok(scored
            .into_iter()
            .take(limit.unwrap_or(DEFAULT_LIMIT))
            .map(|(_, record)| record)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryKind;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn fact(content: &str) -> MemoryRecord {
        MemoryRecord::new(MemoryKind::Fact, content, Utc::now())
    }

    fn contents(records: &[MemoryRecord]) -> Vec<&str> {
        records.iter().map(|r| r.content.as_str()).collect()
    }

    #[test]
    fn test_extract_keywords() {
        assert_eq!(
            extract_keywords("What is the user's favorite IDE?"),
            vec!["what", "the", "user", "favorite", "ide"]
        );
        assert!(extract_keywords("a b to").is_empty());
    }

    #[tokio::test]
    async fn test_single_match() {
        let candidates = vec![
            fact("JavaScript is great"),
            fact("Python rocks"),
            fact("Coffee beats tea"),
        ];

        let hits = KeywordStrategy
            .retrieve("JavaScript", candidates.clone(), None)
            .await
            .unwrap();
        assert_eq!(contents(&hits), vec!["JavaScript is great"]);

        let none = KeywordStrategy
            .retrieve("quantum", candidates, None)
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_ranking_and_ties() {
        let candidates = vec![
            fact("rust compiler"),
            fact("rust borrow checker and compiler"),
            fact("another rust note"),
        ];

        let hits = KeywordStrategy
            .retrieve("rust compiler", candidates, None)
            .await
            .unwrap();
        assert_eq!(
            contents(&hits),
            vec!["rust compiler", "rust borrow checker and compiler", "another rust note"]
        );
    }

    #[tokio::test]
    async fn test_metadata_is_searched() {
        let tagged = fact("Meeting notes").with_metadata("topic", "budget");
        let hits = KeywordStrategy
            .retrieve("budget", vec![fact("Lunch"), tagged], None)
            .await
            .unwrap();
        assert_eq!(contents(&hits), vec!["Meeting notes"]);
    }

    #[tokio::test]
    async fn test_limit() {
        let candidates = (0..20).map(|i| fact(&format!("note {}", i))).collect();
        let hits = KeywordStrategy
            .retrieve("note", candidates, Some(3))
            .await
            .unwrap();
        assert_eq!(hits.len(), 3);
    }
}
