use crate::embeddings::{embed_one, Embedder};
use crate::error::RetrievalError;
use crate::models::RetrievalHit;
use crate::traits::VectorStore;
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::debug;

pub struct Retriever<E: ?Sized, S: ?Sized> {
    embedder: Arc<E>,
    store: Arc<S>,
    default_k: usize,
}

impl<E, S> Retriever<E, S>
where
    E: Embedder + ?Sized,
    S: VectorStore + ?Sized,
{
    pub fn new(embedder: Arc<E>, store: Arc<S>, default_k: usize) -> Self {
        Self {
            embedder,
            store,
            default_k: default_k.max(1),
        }
    }

    pub fn default_k(&self) -> usize {
        self.default_k
    }

    /// Returns up to `k` chunks nearest to `query`, nearest first. A `k` of
    /// zero falls back to the configured default.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievalHit>, RetrievalError> {
        let k = if k == 0 { self.default_k } else { k };

        let vector = embed_one(self.embedder.as_ref(), query).await?;
        let matches = self.store.query(&vector, k).await?;

        let mut hits = matches
            .into_iter()
            .map(|found| found.into_hit())
            .collect::<Vec<_>>();
        hits.sort_by(|left, right| compare_distance(left.distance, right.distance));
        hits.truncate(k);

        debug!(k, returned = hits.len(), "retrieved chunks");
        Ok(hits)
    }
}

// Missing distances sort after known ones.
fn compare_distance(left: Option<f32>, right: Option<f32>) -> Ordering {
    match (left, right) {
        (Some(left), Some(right)) => left.total_cmp(&right),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
