//! Corpus statistics and usage insights.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::memory::{MemoryKind, MemoryRecord};

/// Number of categories reported in [`MemoryAnalytics::top_categories`].
pub const TOP_CATEGORY_COUNT: usize = 10;

const HIGH_GROWTH_PER_DAY: f64 = 10.0;
const OLD_AGE_DAYS: f64 = 90.0;
const LARGE_STORAGE_BYTES: usize = 1_000_000;
const MIN_PREFERENCE_RATIO: f64 = 0.1;

/// A category with the number of records filed under it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCount {
    pub category: String,
    pub count: usize,
}

/// Statistics over a set of records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryAnalytics {
    pub total: usize,
    pub by_kind: HashMap<MemoryKind, usize>,
    /// Mean record age in days
    pub average_age_days: f64,
    pub most_recent: Option<DateTime<Utc>>,
    pub oldest: Option<DateTime<Utc>>,
    /// Approximate size of the corpus serialized as JSON, in bytes
    pub storage_size: usize,
    /// Most used categories, most frequent first
    pub top_categories: Vec<CategoryCount>,
    /// Records per day since the oldest record, over at least one day
    pub growth_rate: f64,
}

impl MemoryAnalytics {
    pub fn from_records(records: &[MemoryRecord], now: DateTime<Utc>) -> Self {
        let mut by_kind = HashMap::new();
        for record in records {
            *by_kind.entry(record.kind).or_insert(0) += 1;
        }

        let average_age_days = if records.is_empty() {
            0.0
        } else {
            records.iter().map(|r| r.age_days(now)).sum::<f64>() / records.len() as f64
        };

        let most_recent = records.iter().map(|r| r.created_at).max();
        let oldest = records.iter().map(|r| r.created_at).min();

        let storage_size = records
            .iter()
            .map(|r| serde_json::to_string(r).map(|s| s.len()).unwrap_or(0))
            .sum();

        let growth_rate = match oldest {
            Some(oldest) => {
                let days = (now - oldest).num_milliseconds() as f64 / 86_400_000.0;
                records.len() as f64 / days.max(1.0)
            }
            None => 0.0,
        };

        Self {
            total: records.len(),
            by_kind,
            average_age_days,
            most_recent,
            oldest,
            storage_size,
            top_categories: top_categories(records),
            growth_rate,
        }
    }

    pub fn count(&self, kind: MemoryKind) -> usize {
        self.by_kind.get(&kind).copied().unwrap_or(0)
    }

    /// Human-readable warnings about the corpus.
    pub fn insights(&self) -> Vec<String> {
        let mut insights = Vec::new();

        if self.growth_rate > HIGH_GROWTH_PER_DAY {
            insights.push(format!(
                "High memory growth: {:.1} memories/day. Consider enabling consolidation.",
                self.growth_rate
            ));
        }

        if self.average_age_days > OLD_AGE_DAYS {
            insights.push(format!(
                "Old memories detected (avg {:.0} days). Consider archiving or compression.",
                self.average_age_days
            ));
        }

        if self.storage_size > LARGE_STORAGE_BYTES {
            insights.push(format!(
                "Storage size: {:.1}MB. Consider optimization.",
                self.storage_size as f64 / 1024.0 / 1024.0
            ));
        }

        if self.total > 0 {
            let ratio = self.count(MemoryKind::Preference) as f64 / self.total as f64;
            if ratio < MIN_PREFERENCE_RATIO {
                insights.push(
                    "Few preference memories detected. Consider tracking user preferences more explicitly."
                        .to_string(),
                );
            }
        }

        insights
    }
}

/// Category counts, most frequent first. Ties keep first-seen order.
fn top_categories(records: &[MemoryRecord]) -> Vec<CategoryCount> {
    let mut counts: Vec<CategoryCount> = Vec::new();
    for category in records.iter().flat_map(|r| r.metadata.categories()) {
        match counts.iter_mut().find(|c| c.category == category) {
            Some(existing) => existing.count += 1,
            None => counts.push(CategoryCount { category, count: 1 }),
        }
    }

    counts.sort_by(|a, b| b.count.cmp(&a.count));
    counts.truncate(TOP_CATEGORY_COUNT);
    counts
}
