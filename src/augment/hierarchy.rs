//! Hierarchical categorization of records.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::Result;
use crate::llm::{GenerateOptions, GenerationClient};
use crate::memory::{MemoryId, MemoryRecord};

use super::json::parse_model_json;

/// One node of the category tree.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HierarchyNode {
    pub category: String,
    pub children: BTreeMap<String, HierarchyNode>,
    /// Records filed directly at this node
    pub memories: Vec<MemoryId>,
}

impl HierarchyNode {
    fn named(category: &str) -> Self {
        Self {
            category: category.to_string(),
            ..Self::default()
        }
    }

    fn collect<'a>(&'a self, seen: &mut HashSet<&'a MemoryId>, out: &mut Vec<MemoryId>) {
        for id in &self.memories {
            if seen.insert(id) {
                out.push(id.clone());
            }
        }
        for child in self.children.values() {
            child.collect(seen, out);
        }
    }
}

/// Split a `a/b/c` path into trimmed, non-empty segments.
pub fn split_path(path: &str) -> Vec<&str> {
    path.split('/')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Category tree rooted at `root`.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryTree {
    root: HierarchyNode,
}

impl Default for CategoryTree {
    fn default() -> Self {
        Self {
            root: HierarchyNode::named("root"),
        }
    }
}

impl CategoryTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(&self) -> &HierarchyNode {
        &self.root
    }

    /// File `id` at the leaf of `path`, creating nodes as needed.
    ///
    /// Re-inserting the same path and id changes nothing.
    pub fn insert(&mut self, path: &str, id: &MemoryId) {
        let segments = split_path(path);
        if segments.is_empty() {
            return;
        }

        let mut node = &mut self.root;
        for segment in segments {
            node = node
                .children
                .entry(segment.to_string())
                .or_insert_with(|| HierarchyNode::named(segment));
        }
        if !node.memories.contains(id) {
            node.memories.push(id.clone());
        }
    }

    /// Ids filed at `path` or any of its descendants. Unknown paths yield
    /// nothing.
    pub fn by_category(&self, path: &str) -> Vec<MemoryId> {
        let mut node = &self.root;
        for segment in split_path(path) {
            match node.children.get(segment) {
                Some(next) => node = next,
                None => return Vec::new(),
            }
        }

        let mut seen = HashSet::new();
        let mut out = Vec::new();
        node.collect(&mut seen, &mut out);
        out
    }
}

/// Asks the generation client for category paths and files records under them.
pub struct HierarchyOrganizer {
    generator: Arc<dyn GenerationClient>,
    tree: RwLock<CategoryTree>,
}

impl HierarchyOrganizer {
    pub fn new(generator: Arc<dyn GenerationClient>) -> Self {
        Self {
            generator,
            tree: RwLock::new(CategoryTree::new()),
        }
    }

    /// Categorize `record`, returning the category paths it was filed under.
    pub async fn organize(&self, record: &MemoryRecord) -> Result<Vec<String>> {
        let prompt = format!(
            "Classify this memory into categories (2-3 levels deep):\n\n\
             Memory: {}\n\n\
             Return a JSON array of category paths, like:\n\
             [\"personal/preferences/food\", \"personal/lifestyle\"]\n\n\
             Be specific but not overly granular.",
            record.content
        );
        let response = self
            .generator
            .generate(&prompt, &GenerateOptions::default())
            .await?;
        let categories: Vec<String> = parse_model_json("hierarchy", &response)?;

        let mut tree = self.tree.write().await;
        for path in &categories {
            tree.insert(path, &record.id);
        }
        debug!(id = %record.id, count = categories.len(), "Record categorized");

        Ok(categories)
    }

    pub async fn by_category(&self, path: &str) -> Vec<MemoryId> {
        self.tree.read().await.by_category(path)
    }

    pub async fn clear(&self) {
        *self.tree.write().await = CategoryTree::new();
    }

    /// Copy of the current tree.
    pub async fn snapshot(&self) -> CategoryTree {
        self.tree.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::memory::MemoryKind;
    use crate::test_support::MockGenerator;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn id(s: &str) -> MemoryId {
        MemoryId::from(s)
    }

    #[test]
    fn test_insert_and_collect() {
        let mut tree = CategoryTree::new();
        tree.insert("personal/preferences/food", &id("a"));
        tree.insert("personal/lifestyle", &id("b"));
        tree.insert("work", &id("c"));

        assert_eq!(tree.by_category("personal"), vec![id("b"), id("a")]);
        assert_eq!(tree.by_category("personal/preferences"), vec![id("a")]);
        assert_eq!(tree.by_category("work"), vec![id("c")]);
        assert!(tree.by_category("personal/missing").is_empty());
    }

    #[test]
    fn test_insert_is_idempotent() {
        let mut tree = CategoryTree::new();
        tree.insert("a/b", &id("x"));
        let once = tree.clone();
        tree.insert("a/b", &id("x"));
        tree.insert(" a / b ", &id("x"));

        assert_eq!(tree, once);
        assert_eq!(tree.root().children.len(), 1);
    }

    #[test]
    fn test_record_in_parent_and_child_listed_once() {
        let mut tree = CategoryTree::new();
        tree.insert("a", &id("x"));
        tree.insert("a/b", &id("x"));
        assert_eq!(tree.by_category("a"), vec![id("x")]);
    }

    #[tokio::test]
    async fn test_organize() {
        let generator = Arc::new(
            MockGenerator::new().with_default(r#"["personal/preferences/food", "personal/lifestyle"]"#),
        );
        let organizer = HierarchyOrganizer::new(generator.clone());
        let record = MemoryRecord::new(MemoryKind::Preference, "Loves sushi", Utc::now());

        let categories = organizer.organize(&record).await.unwrap();
        assert_eq!(categories, vec!["personal/preferences/food", "personal/lifestyle"]);
        assert_eq!(organizer.by_category("personal").await, vec![record.id.clone()]);
        assert_eq!(generator.calls_containing("Memory: Loves sushi"), 1);
    }

    #[tokio::test]
    async fn test_organize_malformed() {
        let organizer =
            HierarchyOrganizer::new(Arc::new(MockGenerator::new().with_default("food, lifestyle")));
        let record = MemoryRecord::new(MemoryKind::Fact, "x", Utc::now());

        let err = organizer.organize(&record).await.unwrap_err();
        assert!(matches!(err, Error::MalformedOutput { .. }));
        assert!(organizer.snapshot().await.root().children.is_empty());
    }
}
