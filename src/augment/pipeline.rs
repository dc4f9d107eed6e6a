//! The augmentation pipeline wrapped around the core insertion path.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::analytics::MemoryAnalytics;
use crate::config::{FeatureFlags, ImportanceScorerKind, MemoryConfig, PipelineSettings};
use crate::error::{Error, Result};
use crate::graph::{MemoryGraph, Relation, RelationKind};
use crate::llm::GenerationClient;
use crate::memory::{
    MemoryId, MemoryInput, MemoryKind, MemoryManager, MemoryRecord, Metadata, SummaryScope,
};
use crate::working::WorkingMemory;

use super::consolidation::TemporalConsolidation;
use super::contradiction::{ContradictionDetector, Resolution};
use super::episodic::{DualMemory, Episode, KnowledgeRecall};
use super::hierarchy::{CategoryTree, HierarchyOrganizer};
use super::importance::{HeuristicImportanceScorer, ImportanceScorer, ModelImportanceScorer};
use super::reasoning::{Inference, MemoryReasoning};
use super::versioning::{VersionHistory, VersionSnapshot, INITIAL_REASON};

/// Records recalled before graph expansion in `recall_with_graph`.
const GRAPH_SEED_COUNT: usize = 3;

/// [`MemoryManager`] plus the optional augmentation stages.
///
/// `remember` runs, strictly in order: persist, initial version, importance,
/// contradiction, graph insertion, categorization, cache activation, episodic
/// extraction, consolidation check. Each stage runs only when its flag is set
/// and the clients it needs are configured.
///
/// Derived state (graph, category tree, versions, cache, semantic facts) is
/// held in process memory only.
pub struct AdvancedMemoryManager {
    core: MemoryManager,
    settings: PipelineSettings,
    versions: Option<RwLock<VersionHistory>>,
    importance: Option<Box<dyn ImportanceScorer>>,
    contradiction: Option<ContradictionDetector>,
    graph: Option<RwLock<MemoryGraph>>,
    hierarchy: Option<HierarchyOrganizer>,
    working: Option<WorkingMemory>,
    dual: Option<DualMemory>,
    consolidation: Option<TemporalConsolidation>,
    reasoning: Option<MemoryReasoning>,
}

fn disabled(stage: &str, missing: &str) {
    debug!(stage, missing, "Pipeline stage disabled: client not configured");
}

impl AdvancedMemoryManager {
    /// Build the pipeline around `core`.
    ///
    /// The config's core options replace the manager's; stages are wired from
    /// its feature flags and whatever clients `core` carries.
    pub fn new(core: MemoryManager, config: &MemoryConfig) -> Result<Self> {
        config.validate()?;
        let core = core.with_options(config.options.clone())?;
        let features: FeatureFlags = config.features;
        let settings = config.pipeline.clone();

        let embedder = core.embedder().cloned();
        let generator = core.generator().cloned();

        let versions = features.versioning.then(|| RwLock::new(VersionHistory::new()));

        let importance: Option<Box<dyn ImportanceScorer>> = if !features.importance_scoring {
            None
        } else {
            match (settings.importance_scorer, &generator) {
                (ImportanceScorerKind::Heuristic, _) => Some(Box::new(HeuristicImportanceScorer)),
                (ImportanceScorerKind::Model, Some(g)) => {
                    Some(Box::new(ModelImportanceScorer::new(g.clone())))
                }
                (ImportanceScorerKind::Model, None) => {
                    disabled("importance", "generation");
                    None
                }
            }
        };

        let contradiction = if !features.contradiction_detection {
            None
        } else {
            match (&generator, &embedder) {
                (Some(g), Some(e)) => Some(ContradictionDetector::new(
                    g.clone(),
                    e.clone(),
                    settings.contradiction_threshold,
                )),
                _ => {
                    disabled("contradiction", "generation and embedding");
                    None
                }
            }
        };

        let graph = if features.graph && embedder.is_none() {
            disabled("graph", "embedding");
            None
        } else {
            features.graph.then(|| RwLock::new(MemoryGraph::new()))
        };

        let with_generator = |enabled: bool, stage: &str| -> Option<Arc<dyn GenerationClient>> {
            if !enabled {
                return None;
            }
            if generator.is_none() {
                disabled(stage, "generation");
            }
            generator.clone()
        };

        let hierarchy = with_generator(features.hierarchy, "hierarchy").map(HierarchyOrganizer::new);
        let dual = with_generator(features.dual_memory, "dual_memory").map(DualMemory::new);
        let consolidation = with_generator(features.consolidation, "consolidation").map(|g| {
            TemporalConsolidation::new(
                g,
                settings.consolidation_min_memories,
                Duration::hours(settings.consolidation_window_hours),
            )
        });
        let reasoning = with_generator(features.reasoning, "reasoning").map(MemoryReasoning::new);

        let working = features.working_memory.then(|| {
            WorkingMemory::new(
                settings.working_memory_capacity,
                core.storage().clone(),
                core.clock().clone(),
            )
        });

        Ok(Self {
            core,
            settings,
            versions,
            importance,
            contradiction,
            graph,
            hierarchy,
            working,
            dual,
            consolidation,
            reasoning,
        })
    }

    /// The wrapped core manager.
    pub fn core(&self) -> &MemoryManager {
        &self.core
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Store a record and run every enabled stage over it.
    ///
    /// When a contradiction is resolved in favor of an existing record, the
    /// new record is deleted and the existing one is returned.
    #[instrument(skip(self, input), fields(kind = %input.kind))]
    pub async fn remember(&self, input: MemoryInput) -> Result<MemoryRecord> {
        let mut record = self.core.remember(input).await?;
        let mut dirty = false;

        if let Some(versions) = &self.versions {
            versions.write().await.record(
                &record.id,
                record.content.clone(),
                record.created_at,
                Some(INITIAL_REASON.to_string()),
            );
        }

        if let Some(scorer) = &self.importance {
            let score = scorer.score(&record, self.core.now()).await?;
            record.metadata.set_importance(score);
            dirty = true;
        }

        let needs_snapshot =
            self.contradiction.is_some() || self.graph.is_some() || self.consolidation.is_some();
        let snapshot: Vec<MemoryRecord> = if needs_snapshot {
            self.core
                .storage()
                .get_all()
                .await?
                .into_iter()
                .filter(|r| r.id != record.id)
                .collect()
        } else {
            Vec::new()
        };

        if let Some(detector) = &self.contradiction {
            if record.embedding.is_none() && detector.ensure_embedding(&mut record).await {
                dirty = true;
            }
            if let Some(found) = detector.find_first(&record, &snapshot).await? {
                match detector.resolve(&record, &found.existing).await? {
                    Resolution::KeepOld => {
                        info!(new = %record.id, kept = %found.existing.id, "Discarding contradicted record");
                        self.core.storage().delete(&record.id).await?;
                        if let Some(versions) = &self.versions {
                            versions.write().await.remove(&record.id);
                        }
                        return Ok(found.existing);
                    }
                    resolution => {
                        let key = if resolution == Resolution::KeepNew {
                            Metadata::SUPERSEDES
                        } else {
                            Metadata::CONTRADICTS
                        };
                        record.metadata.insert(key, found.existing.id.to_string());
                        dirty = true;
                        if let Some(graph) = &self.graph {
                            graph.write().await.add_relation(Relation::new(
                                record.id.clone(),
                                found.existing.id.clone(),
                                RelationKind::Contradicts,
                                found.similarity,
                            ));
                        }
                    }
                }
            }
        }

        if let Some(graph) = &self.graph {
            graph
                .write()
                .await
                .add_memory(&record, &snapshot, self.settings.relation_threshold);
        }

        if let Some(organizer) = &self.hierarchy {
            let categories = organizer.organize(&record).await?;
            record.metadata.set_categories(&categories);
            dirty = true;
        }

        if dirty {
            self.core.storage().save(&record).await?;
        }

        if let Some(working) = &self.working {
            working.activate(record.clone()).await?;
        }

        if let Some(dual) = &self.dual {
            if record.kind == MemoryKind::Event {
                dual.observe(&record, self.core.now()).await?;
            }
        }

        if let Some(consolidation) = &self.consolidation {
            let mut corpus = snapshot;
            corpus.push(record.clone());
            self.run_consolidation(consolidation, &corpus).await?;
        }

        Ok(record)
    }

    async fn run_consolidation(
        &self,
        consolidation: &TemporalConsolidation,
        corpus: &[MemoryRecord],
    ) -> Result<Option<MemoryRecord>> {
        let now = self.core.now();
        if !consolidation.should_consolidate(corpus, now) {
            return Ok(None);
        }

        let inputs = consolidation.eligible(corpus);
        let mut summary = consolidation.consolidate(&inputs, now).await?;
        if self.core.options().auto_embed {
            summary.embedding = self.core.try_embed(&summary.content).await;
        }
        self.core.storage().save(&summary).await?;

        if self.settings.retire_consolidated {
            for source in &inputs {
                self.core.storage().delete(&source.id).await?;
                if let Some(working) = &self.working {
                    working.remove(&source.id).await;
                }
            }
            info!(count = inputs.len(), "Retired consolidated records");
        }

        Ok(Some(summary))
    }

    pub async fn recall(&self, query: &str, limit: Option<usize>) -> Result<Vec<MemoryRecord>> {
        self.core.recall(query, limit).await
    }

    /// Recall the top few records and widen the result through the graph.
    ///
    /// Returns the seeds and everything within `depth` hops, in storage
    /// order. Without a graph this is a plain `recall`.
    pub async fn recall_with_graph(&self, query: &str, depth: usize) -> Result<Vec<MemoryRecord>> {
        let Some(graph) = &self.graph else {
            return self.core.recall(query, None).await;
        };

        let seeds = self.core.recall(query, Some(GRAPH_SEED_COUNT)).await?;
        let mut wanted: HashSet<MemoryId> = seeds.iter().map(|r| r.id.clone()).collect();
        {
            let graph = graph.read().await;
            for seed in &seeds {
                wanted.extend(graph.related(&seed.id, depth));
            }
        }

        let expanded: Vec<MemoryRecord> = self
            .core
            .storage()
            .get_all()
            .await?
            .into_iter()
            .filter(|r| wanted.contains(&r.id))
            .collect();
        debug!(seeds = seeds.len(), expanded = expanded.len(), "Graph-expanded recall");
        Ok(expanded)
    }

    /// Ids related to `id` within `max_depth` hops; empty without a graph.
    pub async fn related(&self, id: &MemoryId, max_depth: usize) -> Vec<MemoryId> {
        match &self.graph {
            Some(graph) => graph.read().await.related(id, max_depth),
            None => Vec::new(),
        }
    }

    /// Edges touching `id`; empty without a graph.
    pub async fn relations_of(&self, id: &MemoryId) -> Vec<Relation> {
        match &self.graph {
            Some(graph) => graph
                .read()
                .await
                .relations_of(id)
                .into_iter()
                .cloned()
                .collect(),
            None => Vec::new(),
        }
    }

    /// Substring recall that checks the working cache before storage.
    pub async fn recall_cached(&self, query: &str) -> Result<Vec<MemoryRecord>> {
        if let Some(working) = &self.working {
            return working.recall(query).await;
        }
        let needle = query.to_lowercase();
        Ok(self
            .core
            .storage()
            .get_all()
            .await?
            .into_iter()
            .filter(|r| r.content.to_lowercase().contains(&needle))
            .collect())
    }

    /// Working cache contents, most recent first.
    pub async fn working_context(&self) -> Vec<MemoryRecord> {
        match &self.working {
            Some(working) => working.context().await,
            None => Vec::new(),
        }
    }

    /// Copy of the category tree; `None` when categorization is off.
    pub async fn category_tree(&self) -> Option<CategoryTree> {
        match &self.hierarchy {
            Some(organizer) => Some(organizer.snapshot().await),
            None => None,
        }
    }

    /// Ids filed under `path` or below it.
    pub async fn memories_in_category(&self, path: &str) -> Vec<MemoryId> {
        match &self.hierarchy {
            Some(organizer) => organizer.by_category(path).await,
            None => Vec::new(),
        }
    }

    /// Replace a record's content, recording a new version when versioning
    /// is on. Returns `None` for unknown ids.
    pub async fn update_content(
        &self,
        id: &MemoryId,
        content: impl Into<String>,
        reason: Option<String>,
    ) -> Result<Option<MemoryRecord>> {
        let Some(mut record) = self.core.inspect(id).await? else {
            return Ok(None);
        };
        let content = content.into();
        let now = self.core.now();

        if let Some(versions) = &self.versions {
            versions.write().await.record(id, content.clone(), now, reason);
        }
        self.rewrite_content(&mut record, content, now).await?;
        Ok(Some(record))
    }

    async fn rewrite_content(&self, record: &mut MemoryRecord, content: String, now: DateTime<Utc>) -> Result<()> {
        record.content = content;
        record.updated_at = Some(now);
        if self.core.options().auto_embed && self.core.embedder().is_some() {
            record.embedding = self.core.try_embed(&record.content).await;
        }
        self.core.storage().save(record).await?;
        debug!(id = %record.id, "Record content rewritten");
        Ok(())
    }

    pub async fn history(&self, id: &MemoryId) -> Vec<VersionSnapshot> {
        match &self.versions {
            Some(versions) => versions.read().await.history(id),
            None => Vec::new(),
        }
    }

    /// Version current at `at`.
    pub async fn version_at(&self, id: &MemoryId, at: DateTime<Utc>) -> Option<VersionSnapshot> {
        self.versions.as_ref()?.read().await.at_time(id, at)
    }

    /// Truncate history to `version` and restore that content in storage.
    pub async fn rollback(&self, id: &MemoryId, version: u32) -> Result<Option<VersionSnapshot>> {
        let Some(versions) = &self.versions else {
            return Ok(None);
        };
        let Some(kept) = versions.write().await.rollback(id, version) else {
            return Ok(None);
        };

        if let Some(mut record) = self.core.inspect(id).await? {
            if record.content != kept.content {
                self.rewrite_content(&mut record, kept.content.clone(), self.core.now())
                    .await?;
            }
        }
        Ok(Some(kept))
    }

    /// Store an episode as an `event` record and extract facts from it.
    pub async fn add_episode(&self, episode: Episode) -> Result<MemoryRecord> {
        let mut record = episode.into_record();
        if self.core.options().auto_embed {
            record.embedding = self.core.try_embed(&record.content).await;
        }
        self.core.storage().save(&record).await?;
        info!(id = %record.id, "Episode stored");

        if let Some(dual) = &self.dual {
            dual.observe(&record, self.core.now()).await?;
        }
        Ok(record)
    }

    /// Semantic facts and episodes matching `query`.
    pub async fn recall_knowledge(&self, query: &str, include_episodic: bool) -> KnowledgeRecall {
        match &self.dual {
            Some(dual) => dual.recall(query, include_episodic).await,
            None => KnowledgeRecall::default(),
        }
    }

    fn reasoning(&self) -> Result<&MemoryReasoning> {
        self.reasoning
            .as_ref()
            .ok_or_else(|| Error::config("Reasoning is disabled or no generation client is configured"))
    }

    /// Answer `question` from the records recalled for it.
    pub async fn infer(&self, question: &str) -> Result<Inference> {
        let reasoning = self.reasoning()?;
        let records = self.core.recall(question, None).await?;
        reasoning.infer(question, &records).await
    }

    /// Knowledge gaps across the whole corpus.
    pub async fn find_gaps(&self) -> Result<Vec<String>> {
        let reasoning = self.reasoning()?;
        let records = self.core.storage().get_all().await?;
        reasoning.find_gaps(&records).await
    }

    /// Patterns across the whole corpus.
    pub async fn detect_patterns(&self) -> Result<Vec<String>> {
        let reasoning = self.reasoning()?;
        let records = self.core.storage().get_all().await?;
        reasoning.detect_patterns(&records).await
    }

    /// Corpus statistics as of now.
    pub async fn analytics(&self) -> Result<MemoryAnalytics> {
        let records = self.core.storage().get_all().await?;
        Ok(MemoryAnalytics::from_records(&records, self.core.now()))
    }

    pub async fn summarize(&self, scope: &SummaryScope) -> Result<String> {
        self.core.summarize(scope).await
    }

    pub async fn inspect(&self, id: &MemoryId) -> Result<Option<MemoryRecord>> {
        self.core.inspect(id).await
    }

    /// Delete a record. The working cache drops it too so eviction cannot
    /// write it back.
    pub async fn forget(&self, id: &MemoryId) -> Result<bool> {
        let deleted = self.core.forget(id).await?;
        if let Some(working) = &self.working {
            working.remove(id).await;
        }
        Ok(deleted)
    }

    /// Delete every record and reset all derived state.
    pub async fn clear(&self) -> Result<()> {
        self.core.clear().await?;

        if let Some(versions) = &self.versions {
            versions.write().await.clear();
        }
        if let Some(graph) = &self.graph {
            *graph.write().await = MemoryGraph::new();
        }
        if let Some(organizer) = &self.hierarchy {
            organizer.clear().await;
        }
        if let Some(working) = &self.working {
            working.clear().await;
        }
        if let Some(dual) = &self.dual {
            dual.clear().await;
        }
        warn!("Derived memory state reset");
        Ok(())
    }
}
