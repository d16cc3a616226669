use crate::error::StoreError;
use crate::models::IndexedRecord;
use crate::store::StoreMatch;
use async_trait::async_trait;

/// Persistent vector storage keyed by chunk id.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Writes a batch of records. Writing an existing id replaces it.
    async fn upsert(&self, records: &[IndexedRecord]) -> Result<(), StoreError>;

    /// Nearest records to `vector`, nearest first, at most `k` of them.
    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<StoreMatch>, StoreError>;

    async fn count(&self) -> Result<usize, StoreError>;

    async fn clear(&self) -> Result<(), StoreError>;

    fn name(&self) -> &str;
}
