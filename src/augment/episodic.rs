//! Episodic log and the semantic facts derived from it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::Result;
use crate::llm::{GenerateOptions, GenerationClient};
use crate::memory::{MemoryId, MemoryKind, MemoryRecord, Metadata};

use super::json::parse_model_json;

/// Share of a re-observed fact's confidence added to the stored value.
pub const REINFORCEMENT_RATE: f64 = 0.1;

/// Something that happened, with its context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    pub when: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub who: Vec<String>,
    pub what: String,
    #[serde(default)]
    pub context: Metadata,
}

impl Episode {
    pub fn new(what: impl Into<String>, when: DateTime<Utc>) -> Self {
        Self {
            when,
            location: None,
            who: Vec::new(),
            what: what.into(),
            context: Metadata::new(),
        }
    }

    pub fn at(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_participant(mut self, who: impl Into<String>) -> Self {
        self.who.push(who.into());
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.context.insert(key, value);
        self
    }

    /// The `event` record that stores this episode.
    pub fn into_record(self) -> MemoryRecord {
        let mut metadata = self.context;
        if let Some(location) = self.location {
            metadata.insert("where", location);
        }
        if !self.who.is_empty() {
            metadata.insert("who", self.who);
        }

        let mut record = MemoryRecord::new(MemoryKind::Event, self.what, self.when);
        record.metadata = metadata;
        record
    }
}

/// A general fact distilled from one or more episodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticFact {
    pub fact: String,
    pub confidence: f64,
    /// Episodes supporting this fact
    pub sources: Vec<MemoryId>,
    pub last_updated: DateTime<Utc>,
}

/// Fact candidate as returned by the model.
#[derive(Debug, Clone, Deserialize)]
struct ExtractedFact {
    fact: String,
    #[serde(default = "default_confidence")]
    confidence: f64,
}

fn default_confidence() -> f64 {
    0.5
}

/// Result of a knowledge query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KnowledgeRecall {
    /// Matching facts, most confident first
    pub semantic: Vec<SemanticFact>,
    /// Matching episodes, oldest first
    pub episodic: Vec<MemoryRecord>,
}

#[derive(Default)]
struct DualState {
    episodes: Vec<MemoryRecord>,
    facts: HashMap<String, SemanticFact>,
}

/// Keeps an episodic log and folds extracted facts into a semantic table.
pub struct DualMemory {
    generator: Arc<dyn GenerationClient>,
    state: RwLock<DualState>,
}

impl DualMemory {
    pub fn new(generator: Arc<dyn GenerationClient>) -> Self {
        Self {
            generator,
            state: RwLock::new(DualState::default()),
        }
    }

    /// Log an event record and fold the facts the model derives from it.
    /// Returns the facts touched, in extraction order.
    pub async fn observe(&self, episode: &MemoryRecord, now: DateTime<Utc>) -> Result<Vec<SemanticFact>> {
        self.state.write().await.episodes.push(episode.clone());

        let prompt = format!(
            "From this event, extract general knowledge or patterns:\n\n\
             Event: {}\n\n\
             What general facts, preferences, or patterns can we learn?\n\
             Format as a JSON array of facts with confidence (0-1):\n\
             [{{\"fact\": \"...\", \"confidence\": 0.9}}, ...]",
            episode.content
        );
        let response = self
            .generator
            .generate(&prompt, &GenerateOptions::default())
            .await?;
        let extracted: Vec<ExtractedFact> = parse_model_json("episodic", &response)?;

        let mut state = self.state.write().await;
        let touched: Vec<SemanticFact> = extracted
            .into_iter()
            .filter(|e| !e.fact.trim().is_empty())
            .map(|e| fold(&mut state.facts, e.fact, e.confidence, &episode.id, now))
            .collect();
        debug!(id = %episode.id, facts = touched.len(), "Semantic facts extracted");

        Ok(touched)
    }

    /// Facts and episodes whose text contains `query`, case-insensitively.
    pub async fn recall(&self, query: &str, include_episodic: bool) -> KnowledgeRecall {
        let needle = query.to_lowercase();
        let state = self.state.read().await;

        let mut semantic: Vec<SemanticFact> = state
            .facts
            .values()
            .filter(|f| f.fact.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        semantic.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.fact.cmp(&b.fact))
        });

        let episodic = if include_episodic {
            state
                .episodes
                .iter()
                .filter(|e| e.content.to_lowercase().contains(&needle))
                .cloned()
                .collect()
        } else {
            Vec::new()
        };

        KnowledgeRecall { semantic, episodic }
    }

    pub async fn fact(&self, fact: &str) -> Option<SemanticFact> {
        self.state.read().await.facts.get(fact).cloned()
    }

    pub async fn clear(&self) {
        *self.state.write().await = DualState::default();
    }
}

/// Insert a new fact or reinforce an existing one.
fn fold(
    facts: &mut HashMap<String, SemanticFact>,
    fact: String,
    confidence: f64,
    source: &MemoryId,
    now: DateTime<Utc>,
) -> SemanticFact {
    let confidence = if confidence.is_finite() {
        confidence.clamp(0.0, 1.0)
    } else {
        default_confidence()
    };

    let entry = facts
        .entry(fact.clone())
        .and_modify(|existing| {
            existing.confidence = (existing.confidence + confidence * REINFORCEMENT_RATE).min(1.0);
            existing.sources.push(source.clone());
            existing.last_updated = now;
        })
        .or_insert_with(|| SemanticFact {
            fact,
            confidence,
            sources: vec![source.clone()],
            last_updated: now,
        });
    entry.clone()
}
