use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    pub id: String,
    pub text: String,
    pub page: u32,
}

/// A chunk together with its embedding, as written to a vector store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedRecord {
    pub chunk: Chunk,
    pub embedding: Vec<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievalHit {
    pub text: String,
    pub distance: Option<f32>,
    pub page: Option<u32>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    pub at: DateTime<Utc>,
}

impl Turn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            at: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceSnippet {
    pub excerpt: String,
    pub distance: Option<f32>,
    pub page: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub answer: String,
    pub sources: Vec<SourceSnippet>,
    /// Number of retrieved chunks placed in the prompt.
    pub context_used: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct IndexingReport {
    pub chunks_indexed: usize,
    pub pages_read: usize,
    pub batches_flushed: usize,
    pub already_indexed: bool,
}

#[derive(Debug, Clone)]
pub struct RagOptions {
    pub chunk_max_chars: usize,
    pub batch_size: usize,
    pub max_context_chunks: usize,
    pub history_cap: usize,
    pub history_window: usize,
    pub source_excerpt_chars: usize,
}

impl Default for RagOptions {
    fn default() -> Self {
        Self {
            chunk_max_chars: 1_000,
            batch_size: 50,
            max_context_chunks: 5,
            history_cap: 20,
            history_window: 6,
            source_excerpt_chars: 200,
        }
    }
}
