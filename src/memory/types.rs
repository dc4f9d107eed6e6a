//! Core types for stored memory records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier for a memory record.
///
/// Newly created records get a random UUID; ids read back from an external
/// store are accepted verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemoryId(String);

impl MemoryId {
    /// Generate a new random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for MemoryId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MemoryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for MemoryId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for MemoryId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Kind of memory record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryKind {
    /// A statement about the world or the user
    Fact,
    /// A stated like or dislike
    Preference,
    /// Something that happened
    Event,
    /// Synthesized from other records
    Summary,
    /// An open action item
    Todo,
}

impl MemoryKind {
    pub const ALL: [MemoryKind; 5] = [
        Self::Fact,
        Self::Preference,
        Self::Event,
        Self::Summary,
        Self::Todo,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fact => "fact",
            Self::Preference => "preference",
            Self::Event => "event",
            Self::Summary => "summary",
            Self::Todo => "todo",
        }
    }
}

impl std::fmt::Display for MemoryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MemoryKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fact" => Ok(Self::Fact),
            "preference" => Ok(Self::Preference),
            "event" => Ok(Self::Event),
            "summary" => Ok(Self::Summary),
            "todo" => Ok(Self::Todo),
            other => Err(format!("unknown memory kind: {}", other)),
        }
    }
}

/// Open key-value metadata attached to a record.
///
/// Arbitrary JSON values are allowed; the keys the pipeline itself writes have
/// typed accessors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(Map<String, Value>);

impl Metadata {
    pub const IMPORTANCE: &'static str = "importance";
    pub const CATEGORIES: &'static str = "categories";
    pub const TOPIC: &'static str = "topic";
    pub const LAST_ACCESSED: &'static str = "lastAccessed";
    pub const CONSOLIDATED_FROM: &'static str = "consolidatedFrom";
    pub const CONSOLIDATED_COUNT: &'static str = "consolidatedCount";
    pub const SUPERSEDES: &'static str = "supersedes";
    pub const CONTRADICTS: &'static str = "contradicts";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn importance(&self) -> Option<f64> {
        self.get(Self::IMPORTANCE).and_then(Value::as_f64)
    }

    pub fn set_importance(&mut self, importance: f64) {
        self.insert(Self::IMPORTANCE, importance);
    }

    pub fn categories(&self) -> Vec<String> {
        string_list(self.get(Self::CATEGORIES))
    }

    pub fn set_categories(&mut self, categories: &[String]) {
        self.insert(Self::CATEGORIES, categories.to_vec());
    }

    pub fn topic(&self) -> Option<&str> {
        self.get(Self::TOPIC).and_then(Value::as_str)
    }

    pub fn last_accessed(&self) -> Option<DateTime<Utc>> {
        self.get(Self::LAST_ACCESSED)
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }

    pub fn set_last_accessed(&mut self, at: DateTime<Utc>) {
        self.insert(Self::LAST_ACCESSED, at.to_rfc3339());
    }

    /// Ids of the records a consolidation summary was built from.
    pub fn consolidated_from(&self) -> Vec<MemoryId> {
        string_list(self.get(Self::CONSOLIDATED_FROM))
            .into_iter()
            .map(MemoryId::from)
            .collect()
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

impl From<Map<String, Value>> for Metadata {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// A stored memory record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryRecord {
    /// Unique identifier
    pub id: MemoryId,
    /// Record kind
    pub kind: MemoryKind,
    /// Text content
    pub content: String,
    /// Embedding vector, once computed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    /// Open metadata
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub metadata: Metadata,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last content update
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    /// Provenance tag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Recall-time score; never persisted
    #[serde(skip)]
    pub relevance: Option<f64>,
}

impl MemoryRecord {
    /// Create a record with a fresh id.
    pub fn new(kind: MemoryKind, content: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: MemoryId::new(),
            kind,
            content: content.into(),
            embedding: None,
            metadata: Metadata::new(),
            created_at,
            updated_at: None,
            source: None,
            relevance: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<MemoryId>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key, value);
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Age in fractional days relative to `now`.
    pub fn age_days(&self, now: DateTime<Utc>) -> f64 {
        (now - self.created_at).num_milliseconds() as f64 / 86_400_000.0
    }

    /// Serialized metadata, as matched by keyword ranking.
    pub fn metadata_text(&self) -> String {
        serde_json::to_string(&self.metadata).unwrap_or_default()
    }
}

/// Caller-supplied fields for a new record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryInput {
    pub kind: MemoryKind,
    pub content: String,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub source: Option<String>,
}

impl MemoryInput {
    pub fn new(kind: MemoryKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
            metadata: Metadata::new(),
            source: None,
        }
    }

    pub fn fact(content: impl Into<String>) -> Self {
        Self::new(MemoryKind::Fact, content)
    }

    pub fn preference(content: impl Into<String>) -> Self {
        Self::new(MemoryKind::Preference, content)
    }

    pub fn event(content: impl Into<String>) -> Self {
        Self::new(MemoryKind::Event, content)
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key, value);
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// Filter for [`summarize`](crate::MemoryManager::summarize).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SummaryScope {
    pub kind: Option<MemoryKind>,
    pub limit: Option<usize>,
}

impl SummaryScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kind(mut self, kind: MemoryKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}
