//! Brute-force vector store kept in process memory, optionally backed by
//! an append-only JSON-lines log so it survives restarts.
//!
//! Each upsert appends one line per record. Reopening replays the log with
//! the last line for an id winning, and rewrites it once when it holds
//! superseded lines. `clear` truncates the log.

use crate::error::StoreError;
use crate::models::IndexedRecord;
use crate::store::StoreMatch;
use crate::traits::VectorStore;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

pub struct LocalStore {
    name: String,
    log: Option<PathBuf>,
    records: RwLock<BTreeMap<String, IndexedRecord>>,
}

impl LocalStore {
    pub fn in_memory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            log: None,
            records: RwLock::new(BTreeMap::new()),
        }
    }

    /// Opens a log-backed store, replaying existing records when the file exists.
    pub async fn open(path: impl AsRef<Path>, name: impl Into<String>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let mut records = BTreeMap::new();

        if tokio::fs::try_exists(&path).await? {
            let lines_read = replay(&path, &mut records).await?;
            info!(path = %path.display(), records = records.len(), "loaded local store log");
            if lines_read > records.len() {
                compact(&path, &records).await?;
                debug!(
                    path = %path.display(),
                    dropped = lines_read - records.len(),
                    "compacted local store log"
                );
            }
        }

        Ok(Self {
            name: name.into(),
            log: Some(path),
            records: RwLock::new(records),
        })
    }

    async fn append(&self, records: &[IndexedRecord]) -> Result<(), StoreError> {
        let Some(path) = &self.log else {
            return Ok(());
        };
        ensure_parent(path).await?;

        let mut file = OpenOptions::new().create(true).append(true).open(path).await?;
        file.write_all(&encode_lines(records.iter())?).await?;
        file.flush().await?;
        Ok(())
    }

    async fn truncate(&self) -> Result<(), StoreError> {
        let Some(path) = &self.log else {
            return Ok(());
        };
        ensure_parent(path).await?;
        tokio::fs::File::create(path).await?;
        Ok(())
    }
}

/// Reads every line of the log into `records` and returns how many lines held
/// a record. A torn final line from an interrupted append is skipped.
async fn replay(path: &Path, records: &mut BTreeMap<String, IndexedRecord>) -> Result<usize, StoreError> {
    let file = tokio::fs::File::open(path).await?;
    let mut lines = BufReader::new(file).lines();
    let mut lines_read = 0;
    let mut pending_error = None;

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        if let Some(error) = pending_error.take() {
            return Err(StoreError::Serialization(error));
        }
        match serde_json::from_str::<IndexedRecord>(&line) {
            Ok(record) => {
                lines_read += 1;
                records.insert(record.chunk.id.clone(), record);
            }
            Err(error) => pending_error = Some(error),
        }
    }

    if let Some(error) = pending_error {
        warn!(path = %path.display(), error = %error, "skipping torn last line of local store log");
        lines_read += 1;
    }
    Ok(lines_read)
}

async fn compact(path: &Path, records: &BTreeMap<String, IndexedRecord>) -> Result<(), StoreError> {
    let staging = path.with_extension("jsonl.tmp");
    tokio::fs::write(&staging, encode_lines(records.values())?).await?;
    tokio::fs::rename(&staging, path).await?;
    Ok(())
}

fn encode_lines<'a>(records: impl Iterator<Item = &'a IndexedRecord>) -> Result<Vec<u8>, StoreError> {
    let mut bytes = Vec::new();
    for record in records {
        serde_json::to_writer(&mut bytes, record)?;
        bytes.push(b'\n');
    }
    Ok(bytes)
}

async fn ensure_parent(path: &Path) -> Result<(), StoreError> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    Ok(())
}

#[async_trait]
impl VectorStore for LocalStore {
    async fn upsert(&self, records: &[IndexedRecord]) -> Result<(), StoreError> {
        if records.is_empty() {
            return Ok(());
        }

        let mut guard = self.records.write().await;
        self.append(records).await?;
        for record in records {
            guard.insert(record.chunk.id.clone(), record.clone());
        }

        debug!(store = %self.name, written = records.len(), total = guard.len(), "upserted records");
        Ok(())
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<StoreMatch>, StoreError> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let guard = self.records.read().await;
        let mut scored = guard
            .values()
            .map(|record| (cosine_distance(vector, &record.embedding), record))
            .collect::<Vec<_>>();

        scored.sort_by(|left, right| left.0.total_cmp(&right.0));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(distance, record)| StoreMatch {
                id: record.chunk.id.clone(),
                text: Some(record.chunk.text.clone()),
                distance: Some(distance),
                page: Some(record.chunk.page),
            })
            .collect())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.records.read().await.len())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        let mut guard = self.records.write().await;
        self.truncate().await?;
        guard.clear();
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// `1 - cosine similarity`; zero vectors are treated as maximally distant.
pub fn cosine_distance(left: &[f32], right: &[f32]) -> f32 {
    let len = left.len().min(right.len());
    let dot = (0..len).map(|index| left[index] * right[index]).sum::<f32>();
    let left_norm = left.iter().map(|value| value * value).sum::<f32>().sqrt();
    let right_norm = right.iter().map(|value| value * value).sum::<f32>().sqrt();

    if left_norm == 0.0 || right_norm == 0.0 {
        return 1.0;
    }
    1.0 - dot / (left_norm * right_norm)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Chunk;

    fn record(id: &str, page: u32, embedding: Vec<f32>) -> IndexedRecord {
        IndexedRecord {
            chunk: Chunk {
                id: id.to_string(),
                text: format!("text of {id}"),
                page,
            },
            embedding,
        }
    }

    #[test]
    fn cosine_distance_bounds() {
        assert!(cosine_distance(&[1.0, 0.0], &[1.0, 0.0]).abs() < 1e-6);
        assert!((cosine_distance(&[1.0, 0.0], &[0.0, 1.0]) - 1.0).abs() < 1e-6);
        assert_eq!(cosine_distance(&[0.0, 0.0], &[1.0, 0.0]), 1.0);
    }

    #[tokio::test]
    async fn query_orders_by_ascending_distance() -> Result<(), StoreError> {
        let store = LocalStore::in_memory("test");
        store
            .upsert(&[
                record("far", 1, vec![0.0, 1.0]),
                record("near", 2, vec![1.0, 0.1]),
                record("mid", 3, vec![1.0, 1.0]),
            ])
            .await?;

        let hits = store.query(&[1.0, 0.0], 2).await?;
        let ids = hits.iter().map(|hit| hit.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["near", "mid"]);
        assert_eq!(hits[0].page, Some(2));
        Ok(())
    }

    #[tokio::test]
    async fn upsert_replaces_existing_ids() -> Result<(), StoreError> {
        let store = LocalStore::in_memory("test");
        store.upsert(&[record("a", 1, vec![1.0])]).await?;
        store.upsert(&[record("a", 1, vec![1.0])]).await?;
        assert_eq!(store.count().await?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn log_survives_reopen_and_clear() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("store").join("chunks.jsonl");

        let store = LocalStore::open(&path, "docs").await?;
        store
            .upsert(&[record("a", 1, vec![1.0, 0.0]), record("b", 1, vec![0.0, 1.0])])
            .await?;
        drop(store);

        let reopened = LocalStore::open(&path, "docs").await?;
        assert_eq!(reopened.count().await?, 2);

        reopened.clear().await?;
        let cleared = LocalStore::open(&path, "docs").await?;
        assert_eq!(cleared.count().await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn upserts_append_only_the_new_batch() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("chunks.jsonl");
        let store = LocalStore::open(&path, "docs").await?;

        store.upsert(&[record("a", 1, vec![1.0, 0.0])]).await?;
        let after_first = tokio::fs::read(&path).await?;
        store
            .upsert(&[record("b", 2, vec![0.0, 1.0]), record("c", 2, vec![1.0, 1.0])])
            .await?;
        let after_second = tokio::fs::read(&path).await?;

        assert!(after_second.starts_with(&after_first));
        let batch = [record("b", 2, vec![0.0, 1.0]), record("c", 2, vec![1.0, 1.0])];
        assert_eq!(after_second[after_first.len()..], encode_lines(batch.iter())?[..]);
        assert_eq!(String::from_utf8(after_second)?.lines().count(), 3);
        Ok(())
    }

    #[tokio::test]
    async fn reopen_keeps_latest_line_and_compacts() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("chunks.jsonl");

        let store = LocalStore::open(&path, "docs").await?;
        store.upsert(&[record("a", 1, vec![1.0, 0.0])]).await?;
        store.upsert(&[record("a", 7, vec![0.0, 1.0])]).await?;
        drop(store);

        let reopened = LocalStore::open(&path, "docs").await?;
        assert_eq!(reopened.count().await?, 1);
        let hits = reopened.query(&[0.0, 1.0], 1).await?;
        assert_eq!(hits[0].page, Some(7));
        assert_eq!(tokio::fs::read_to_string(&path).await?.lines().count(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn torn_last_line_is_skipped() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("chunks.jsonl");
        let mut bytes = encode_lines([record("a", 1, vec![1.0])].iter())?;
        bytes.extend_from_slice(b"{\"chunk\":{\"id\":\"b\"");
        tokio::fs::write(&path, bytes).await?;

        let store = LocalStore::open(&path, "docs").await?;
        assert_eq!(store.count().await?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn corrupt_line_in_the_middle_is_an_error() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("chunks.jsonl");
        let mut bytes = b"not json\n".to_vec();
        bytes.extend(encode_lines([record("a", 1, vec![1.0])].iter())?);
        tokio::fs::write(&path, bytes).await?;

        let result = LocalStore::open(&path, "docs").await;
        assert!(matches!(result, Err(StoreError::Serialization(_))));
        Ok(())
    }
}
