//! Model-backed reasoning over a set of records.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::error::Result;
use crate::llm::{GenerateOptions, GenerationClient};
use crate::memory::{MemoryId, MemoryRecord};

use super::json::parse_model_json;

/// An answer drawn from records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inference {
    pub answer: String,
    #[serde(default)]
    pub confidence: f64,
    /// Ids of the records that support the answer
    #[serde(default)]
    pub sources: Vec<MemoryId>,
}

pub struct MemoryReasoning {
    generator: Arc<dyn GenerationClient>,
}

impl MemoryReasoning {
    pub fn new(generator: Arc<dyn GenerationClient>) -> Self {
        Self { generator }
    }

    async fn ask(&self, prompt: &str) -> Result<String> {
        self.generator
            .generate(prompt, &GenerateOptions::default())
            .await
    }

    /// Answer `question` from `records`.
    pub async fn infer(&self, question: &str, records: &[MemoryRecord]) -> Result<Inference> {
        let context: Vec<String> = records
            .iter()
            .map(|r| format!("[{}] {}", r.id, r.content))
            .collect();
        let prompt = format!(
            "Based on these memories, answer the question:\n\n\
             MEMORIES:\n{}\n\n\
             QUESTION: {}\n\n\
             Provide:\n\
             1. Your answer\n\
             2. Confidence (0-1)\n\
             3. Memory IDs that support your answer\n\n\
             Format as JSON: {{\"answer\": \"...\", \"confidence\": 0.8, \"sources\": [\"id1\", \"id2\"]}}",
            context.join("\n"),
            question
        );

        let mut inference: Inference = parse_model_json("reasoning", &self.ask(&prompt).await?)?;
        inference.confidence = if inference.confidence.is_finite() {
            inference.confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        debug!(confidence = inference.confidence, sources = inference.sources.len(), "Inference");
        Ok(inference)
    }

    /// Questions whose answers would fill gaps in `records`.
    pub async fn find_gaps(&self, records: &[MemoryRecord]) -> Result<Vec<String>> {
        let prompt = format!(
            "Given these memories, what important information is missing?\n\n\
             {}\n\n\
             List 3-5 key questions that would fill knowledge gaps.\n\
             Return as JSON array: [\"question1\", \"question2\", ...]",
            joined_content(records)
        );
        parse_model_json("knowledge gaps", &self.ask(&prompt).await?)
    }

    /// Patterns, habits or trends visible across `records`.
    pub async fn detect_patterns(&self, records: &[MemoryRecord]) -> Result<Vec<String>> {
        let prompt = format!(
            "Analyze these memories and identify patterns, habits, or trends:\n\n\
             {}\n\n\
             Return insights as JSON array: [\"pattern1\", \"pattern2\", ...]",
            joined_content(records)
        );
        parse_model_json("patterns", &self.ask(&prompt).await?)
    }
}

fn joined_content(records: &[MemoryRecord]) -> String {
    records
        .iter()
        .map(|r| r.content.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}
