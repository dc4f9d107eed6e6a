//! Per-record content version history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::memory::MemoryId;

/// Reason recorded for the snapshot taken when a record is first stored.
pub const INITIAL_REASON: &str = "initial";

/// One version of a record's content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionSnapshot {
    /// 1-based, contiguous per record
    pub version: u32,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Append-only (until rollback) version lists keyed by record id.
#[derive(Debug, Clone, Default)]
pub struct VersionHistory {
    versions: HashMap<MemoryId, Vec<VersionSnapshot>>,
}

impl VersionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a version for `id` and return it.
    pub fn record(
        &mut self,
        id: &MemoryId,
        content: impl Into<String>,
        at: DateTime<Utc>,
        reason: Option<String>,
    ) -> VersionSnapshot {
        let versions = self.versions.entry(id.clone()).or_default();
        let snapshot = VersionSnapshot {
            version: versions.len() as u32 + 1,
            content: content.into(),
            timestamp: at,
            reason,
        };
        versions.push(snapshot.clone());
        snapshot
    }

    /// All versions of `id`, oldest first.
    pub fn history(&self, id: &MemoryId) -> Vec<VersionSnapshot> {
        self.versions.get(id).cloned().unwrap_or_default()
    }

    /// Latest version whose timestamp is at or before `at`.
    pub fn at_time(&self, id: &MemoryId, at: DateTime<Utc>) -> Option<VersionSnapshot> {
        self.versions
            .get(id)?
            .iter()
            .rev()
            .find(|v| v.timestamp <= at)
            .cloned()
    }

    /// Drop every version after `version` and return the one kept on top.
    ///
    /// Out-of-range versions leave the history untouched and return `None`.
    pub fn rollback(&mut self, id: &MemoryId, version: u32) -> Option<VersionSnapshot> {
        let versions = self.versions.get_mut(id)?;
        if version < 1 || version as usize > versions.len() {
            return None;
        }
        versions.truncate(version as usize);
        versions.last().cloned()
    }

    pub fn remove(&mut self, id: &MemoryId) -> bool {
        self.versions.remove(id).is_some()
    }

    pub fn clear(&mut self) {
        self.versions.clear();
    }
}
