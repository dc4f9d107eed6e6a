//! Configuration for the memory core and the augmentation pipeline.
//!
//! Every section deserializes with defaults, so a partial JSON document is
//! enough:
//!
//! ```rust,ignore
//! use mnemo_core::MemoryConfig;
//!
//! let config = MemoryConfig::from_json_str(r#"{
//!     "options": { "enable_decay": true, "decay_factor": 0.9 },
//!     "features": { "graph": true, "working_memory": true }
//! }"#)?;
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Options for the store/recall core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryOptions {
    /// Compute an embedding on insert when an embedder is configured
    pub auto_embed: bool,
    /// Result count for `recall` without an explicit limit
    pub default_retrieval_limit: usize,
    /// Decorate recalled records with time-decayed relevance
    pub enable_decay: bool,
    /// Per-day decay base, in (0, 1)
    pub decay_factor: f64,
}

impl Default for MemoryOptions {
    fn default() -> Self {
        Self {
            auto_embed: true,
            default_retrieval_limit: 10,
            enable_decay: false,
            decay_factor: 0.95,
        }
    }
}

impl MemoryOptions {
    pub fn with_auto_embed(mut self, enabled: bool) -> Self {
        self.auto_embed = enabled;
        self
    }

    pub fn with_default_limit(mut self, limit: usize) -> Self {
        self.default_retrieval_limit = limit;
        self
    }

    /// Enable decay with the given factor.
    pub fn with_decay(mut self, factor: f64) -> Self {
        self.enable_decay = true;
        self.decay_factor = factor;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.decay_factor > 0.0 && self.decay_factor < 1.0) {
            return Err(Error::config(format!(
                "decay_factor must be in (0, 1), got {}",
                self.decay_factor
            )));
        }
        if self.default_retrieval_limit == 0 {
            return Err(Error::config("default_retrieval_limit must be positive"));
        }
        Ok(())
    }
}

/// Per-stage switches for the augmentation pipeline.
///
/// All stages are off unless enabled. A stage whose required client is
/// missing stays off even when its flag is set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureFlags {
    pub graph: bool,
    pub dual_memory: bool,
    pub working_memory: bool,
    pub importance_scoring: bool,
    pub contradiction_detection: bool,
    pub hierarchy: bool,
    pub versioning: bool,
    pub consolidation: bool,
    pub reasoning: bool,
}

impl FeatureFlags {
    /// Every stage enabled.
    pub fn all() -> Self {
        Self {
            graph: true,
            dual_memory: true,
            working_memory: true,
            importance_scoring: true,
            contradiction_detection: true,
            hierarchy: true,
            versioning: true,
            consolidation: true,
            reasoning: true,
        }
    }

    pub fn with_graph(mut self) -> Self {
        self.graph = true;
        self
    }

    pub fn with_dual_memory(mut self) -> Self {
        self.dual_memory = true;
        self
    }

    pub fn with_working_memory(mut self) -> Self {
        self.working_memory = true;
        self
    }

    pub fn with_importance_scoring(mut self) -> Self {
        self.importance_scoring = true;
        self
    }

    pub fn with_contradiction_detection(mut self) -> Self {
        self.contradiction_detection = true;
        self
    }

    pub fn with_hierarchy(mut self) -> Self {
        self.hierarchy = true;
        self
    }

    pub fn with_versioning(mut self) -> Self {
        self.versioning = true;
        self
    }

    pub fn with_consolidation(mut self) -> Self {
        self.consolidation = true;
        self
    }

    pub fn with_reasoning(mut self) -> Self {
        self.reasoning = true;
        self
    }
}

/// Which importance scorer the pipeline uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportanceScorerKind {
    /// Kind weight, recency and content bonuses
    #[default]
    Heuristic,
    /// Ask the generation client for a score
    Model,
}

/// Thresholds and sizes used by pipeline stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Minimum cosine similarity before a contradiction judgment is requested
    pub contradiction_threshold: f32,
    /// Minimum cosine similarity for a `relates_to` edge
    pub relation_threshold: f32,
    /// Working cache capacity
    pub working_memory_capacity: usize,
    /// Records within the window needed to trigger consolidation
    pub consolidation_min_memories: usize,
    /// Trailing consolidation window
    pub consolidation_window_hours: i64,
    pub importance_scorer: ImportanceScorerKind,
    /// Delete source records once they are consolidated
    pub retire_consolidated: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            contradiction_threshold: 0.7,
            relation_threshold: 0.85,
            working_memory_capacity: crate::working::DEFAULT_CAPACITY,
            consolidation_min_memories: 10,
            consolidation_window_hours: 24,
            importance_scorer: ImportanceScorerKind::Heuristic,
            retire_consolidated: false,
        }
    }
}

/// Upper bound on `consolidation_window_hours`, one hundred years.
pub const MAX_CONSOLIDATION_WINDOW_HOURS: i64 = 24 * 365 * 100;

impl PipelineSettings {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("contradiction_threshold", self.contradiction_threshold),
            ("relation_threshold", self.relation_threshold),
        ] {
            if !(-1.0..=1.0).contains(&value) {
                return Err(Error::config(format!(
                    "{} must be a cosine similarity in [-1, 1], got {}",
                    name, value
                )));
            }
        }
        if self.working_memory_capacity == 0 {
            return Err(Error::config("working_memory_capacity must be positive"));
        }
        if self.consolidation_min_memories == 0 {
            return Err(Error::config("consolidation_min_memories must be positive"));
        }
        if !(1..=MAX_CONSOLIDATION_WINDOW_HOURS).contains(&self.consolidation_window_hours) {
            return Err(Error::config(format!(
                "consolidation_window_hours must be in [1, {}], got {}",
                MAX_CONSOLIDATION_WINDOW_HOURS, self.consolidation_window_hours
            )));
        }
        Ok(())
    }
}

/// Full configuration surface.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    pub options: MemoryOptions,
    pub features: FeatureFlags,
    pub pipeline: PipelineSettings,
}

impl MemoryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_options(mut self, options: MemoryOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_features(mut self, features: FeatureFlags) -> Self {
        self.features = features;
        self
    }

    pub fn with_pipeline(mut self, pipeline: PipelineSettings) -> Self {
        self.pipeline = pipeline;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.options.validate()?;
        self.pipeline.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = MemoryConfig::default();
        assert!(config.options.auto_embed);
        assert_eq!(config.options.default_retrieval_limit, 10);
        assert!(!config.options.enable_decay);
        assert_eq!(config.options.decay_factor, 0.95);
        assert_eq!(config.features, FeatureFlags::default());
        assert!(!config.features.reasoning);
        assert_eq!(config.pipeline.importance_scorer, ImportanceScorerKind::Heuristic);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json() {
        let config = MemoryConfig::from_json_str(
            r#"{
                "options": { "enable_decay": true, "decay_factor": 0.9 },
                "features": { "graph": true },
                "pipeline": { "importance_scorer": "model" }
            }"#,
        )
        .unwrap();

        assert!(config.options.enable_decay);
        assert_eq!(config.options.decay_factor, 0.9);
        assert!(config.options.auto_embed);
        assert!(config.features.graph);
        assert!(!config.features.hierarchy);
        assert_eq!(config.pipeline.importance_scorer, ImportanceScorerKind::Model);
        assert_eq!(config.pipeline.working_memory_capacity, 10);
    }

    #[test]
    fn test_rejects_bad_decay() {
        for factor in [0.0, 1.0, 1.5, -0.2] {
            let options = MemoryOptions::default().with_decay(factor);
            assert!(matches!(options.validate(), Err(Error::Config(_))));
        }
        assert!(MemoryConfig::from_json_str(r#"{"options":{"decay_factor":2.0}}"#).is_err());
    }

    #[test]
    fn test_rejects_zero_sizes() {
        let options = MemoryOptions::default().with_default_limit(0);
        assert!(options.validate().is_err());

        let pipeline = PipelineSettings {
            working_memory_capacity: 0,
            ..Default::default()
        };
        assert!(pipeline.validate().is_err());
    }

    #[test]
    fn test_consolidation_window_bounds() {
        for hours in [0, -5, MAX_CONSOLIDATION_WINDOW_HOURS + 1, i64::MAX] {
            let pipeline = PipelineSettings {
                consolidation_window_hours: hours,
                ..Default::default()
            };
            assert!(matches!(pipeline.validate(), Err(Error::Config(_))));
        }

        let json = r#"{"features":{"consolidation":true},"pipeline":{"consolidation_window_hours":10000000000}}"#;
        assert!(matches!(MemoryConfig::from_json_str(json), Err(Error::Config(_))));

        let pipeline = PipelineSettings {
            consolidation_window_hours: MAX_CONSOLIDATION_WINDOW_HOURS,
            ..Default::default()
        };
        assert!(pipeline.validate().is_ok());
    }

    #[test]
    fn test_all_flags() {
        let flags = FeatureFlags::all();
        assert!(flags.graph && flags.reasoning && flags.consolidation);
        assert_eq!(
            FeatureFlags::default().with_graph().with_versioning(),
            FeatureFlags {
                graph: true,
                versioning: true,
                ..Default::default()
            }
        );
    }
}
