//! Similarity-derived relation graph between records.
//!
//! Edges are directed but traversal treats them as undirected. The graph lives
//! in process memory only and is not internally synchronized; the pipeline
//! wraps it in a lock.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::debug;

use crate::memory::{MemoryId, MemoryRecord};
use crate::retrieval::cosine_similarity;

/// Kind of relation between two records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    RelatesTo,
    Causes,
    Contradicts,
    Elaborates,
    Follows,
}

impl RelationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RelatesTo => "relates_to",
            Self::Causes => "causes",
            Self::Contradicts => "contradicts",
            Self::Elaborates => "elaborates",
            Self::Follows => "follows",
        }
    }
}

impl std::fmt::Display for RelationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A directed edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    pub from: MemoryId,
    pub to: MemoryId,
    pub kind: RelationKind,
    /// Always within [0, 1]
    pub strength: f32,
}

impl Relation {
    /// Create an edge; `strength` is clamped to [0, 1] and NaN becomes 0.
    pub fn new(from: MemoryId, to: MemoryId, kind: RelationKind, strength: f32) -> Self {
        let strength = if strength.is_nan() {
            0.0
        } else {
            strength.clamp(0.0, 1.0)
        };
        Self {
            from,
            to,
            kind,
            strength,
        }
    }

    fn other_end(&self, id: &MemoryId) -> &MemoryId {
        if &self.from == id {
            &self.to
        } else {
            &self.from
        }
    }
}

/// In-memory relation graph.
#[derive(Debug, Default)]
pub struct MemoryGraph {
    relations: Vec<Relation>,
    /// Record id -> indices into `relations` touching that record.
    adjacency: HashMap<MemoryId, Vec<usize>>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.relations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relations.is_empty()
    }

    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }

    /// Edges touching `id` in either direction.
    pub fn relations_of(&self, id: &MemoryId) -> Vec<&Relation> {
        self.adjacency
            .get(id)
            .map(|idx| idx.iter().map(|&i| &self.relations[i]).collect())
            .unwrap_or_default()
    }

    /// Insert an edge.
    pub fn add_relation(&mut self, relation: Relation) {
        let index = self.relations.len();
        self.adjacency
            .entry(relation.from.clone())
            .or_default()
            .push(index);
        if relation.to != relation.from {
            self.adjacency
                .entry(relation.to.clone())
                .or_default()
                .push(index);
        }
        self.relations.push(relation);
    }

    /// Link `record` to every existing record whose embedding similarity
    /// exceeds `threshold`, returning the edges created.
    ///
    /// Records without embeddings, and `record` itself, are skipped.
    pub fn add_memory(
        &mut self,
        record: &MemoryRecord,
        existing: &[MemoryRecord],
        threshold: f32,
    ) -> Vec<Relation> {
        let Some(embedding) = record.embedding.as_deref() else {
            debug!(id = %record.id, "Record has no embedding; graph unchanged");
            return Vec::new();
        };

        let mut added = Vec::new();
        for other in existing.iter().filter(|o| o.id != record.id) {
            let Some(other_embedding) = other.embedding.as_deref() else {
                continue;
            };
            let similarity = cosine_similarity(embedding, other_embedding);
            if similarity > threshold {
                let relation = Relation::new(
                    record.id.clone(),
                    other.id.clone(),
                    RelationKind::RelatesTo,
                    similarity,
                );
                self.add_relation(relation.clone());
                added.push(relation);
            }
        }

        debug!(id = %record.id, edges = added.len(), "Graph insertion");
        added
    }

    /// Ids reachable from `id` within `max_depth` hops, in breadth-first
    /// order, excluding `id` itself.
    pub fn related(&self, id: &MemoryId, max_depth: usize) -> Vec<MemoryId> {
        let mut visited: HashSet<&MemoryId> = HashSet::new();
        let mut queue: VecDeque<(&MemoryId, usize)> = VecDeque::new();
        let mut related = Vec::new();

        visited.insert(id);
        queue.push_back((id, 0));

        while let Some((current, depth)) = queue.pop_front() {
            if depth == max_depth {
                continue;
            }
            for relation in self.relations_of(current) {
                let next = relation.other_end(current);
                if visited.insert(next) {
                    related.push(next.clone());
                    queue.push_back((next, depth + 1));
                }
            }
        }

        related
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryKind;
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn id(s: &str) -> MemoryId {
        MemoryId::from(s)
    }

    fn edge(from: &str, to: &str) -> Relation {
        Relation::new(id(from), id(to), RelationKind::RelatesTo, 0.9)
    }

    fn chain() -> MemoryGraph {
        // a -> b <- c -> d
        let mut graph = MemoryGraph::new();
        graph.add_relation(edge("a", "b"));
        graph.add_relation(edge("c", "b"));
        graph.add_relation(edge("c", "d"));
        graph
    }

    #[test]
    fn test_strength_clamped() {
        assert_eq!(Relation::new(id("a"), id("b"), RelationKind::Causes, 1.7).strength, 1.0);
        assert_eq!(Relation::new(id("a"), id("b"), RelationKind::Causes, -0.2).strength, 0.0);
        assert_eq!(Relation::new(id("a"), id("b"), RelationKind::Causes, f32::NAN).strength, 0.0);
    }

    #[test]
    fn test_depth_zero_is_empty() {
        assert!(chain().related(&id("a"), 0).is_empty());
    }

    #[test]
    fn test_traversal_is_bidirectional_and_bounded() {
        let graph = chain();
        assert_eq!(graph.related(&id("a"), 1), vec![id("b")]);
        assert_eq!(graph.related(&id("a"), 2), vec![id("b"), id("c")]);
        assert_eq!(graph.related(&id("a"), 3), vec![id("b"), id("c"), id("d")]);
        assert_eq!(graph.related(&id("d"), 10), vec![id("c"), id("b"), id("a")]);
        assert!(graph.related(&id("unknown"), 3).is_empty());
    }

    #[test]
    fn test_cycles_terminate() {
        let mut graph = chain();
        graph.add_relation(edge("d", "a"));
        let related = graph.related(&id("a"), 50);
        assert_eq!(related.len(), 3);
        assert!(!related.contains(&id("a")));
    }

    #[test]
    fn test_add_memory_thresholds() {
        let now = Utc::now();
        let new = MemoryRecord::new(MemoryKind::Fact, "new", now).with_embedding(vec![1.0, 0.0]);
        let close = MemoryRecord::new(MemoryKind::Fact, "close", now).with_embedding(vec![1.0, 0.1]);
        let far = MemoryRecord::new(MemoryKind::Fact, "far", now).with_embedding(vec![0.0, 1.0]);
        let bare = MemoryRecord::new(MemoryKind::Fact, "bare", now);

        let mut graph = MemoryGraph::new();
        let added = graph.add_memory(
            &new,
            &[close.clone(), far, bare, new.clone()],
            0.85,
        );

        assert_eq!(added.len(), 1);
        assert_eq!(added[0].from, new.id);
        assert_eq!(added[0].to, close.id);
        assert_eq!(added[0].kind, RelationKind::RelatesTo);
        assert!(added[0].strength > 0.85 && added[0].strength <= 1.0);
        assert_eq!(graph.related(&close.id, 1), vec![new.id.clone()]);
    }

    #[test]
    fn test_unembedded_record_adds_nothing() {
        let now = Utc::now();
        let new = MemoryRecord::new(MemoryKind::Fact, "new", now);
        let other = MemoryRecord::new(MemoryKind::Fact, "o", now).with_embedding(vec![1.0]);
        let mut graph = MemoryGraph::new();
        assert!(graph.add_memory(&new, &[other], 0.0).is_empty());
        assert!(graph.is_empty());
    }

    fn edges() -> impl Strategy<Value = Vec<(u8, u8)>> {
        prop::collection::vec((0u8..12, 0u8..12), 0..40)
    }

    proptest! {
        /// A shallower traversal never reaches anything a deeper one misses.
        #[test]
        fn shallow_reach_is_subset_of_deep(
            pairs in edges(),
            seed in 0u8..12,
            d1 in 0usize..5,
            extra in 0usize..5,
        ) {
            let mut graph = MemoryGraph::new();
            for (a, b) in &pairs {
                graph.add_relation(edge(&a.to_string(), &b.to_string()));
            }
            let seed = id(&seed.to_string());

            let shallow: HashSet<MemoryId> = graph.related(&seed, d1).into_iter().collect();
            let deep: HashSet<MemoryId> = graph.related(&seed, d1 + extra).into_iter().collect();

            prop_assert!(shallow.is_subset(&deep));
            prop_assert!(!deep.contains(&seed));
        }
    }
}
