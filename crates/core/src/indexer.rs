use crate::chunking::{chunk_page, ChunkingConfig};
use crate::embeddings::Embedder;
use crate::error::{EmbeddingError, IngestError};
use crate::extractor::{PageIter, PageSource, PageText};
use crate::models::{Chunk, IndexedRecord, IndexingReport, RagOptions};
use crate::traits::VectorStore;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Drives page extraction, chunking, batched embedding and batched store
/// writes. Only one indexing run per indexer proceeds at a time.
pub struct DocumentIndexer<E: ?Sized, S: ?Sized> {
    embedder: Arc<E>,
    store: Arc<S>,
    chunking: ChunkingConfig,
    batch_size: usize,
    in_flight: Mutex<()>,
}

impl<E, S> DocumentIndexer<E, S>
where
    E: Embedder + ?Sized,
    S: VectorStore + ?Sized,
{
    pub fn new(embedder: Arc<E>, store: Arc<S>, options: &RagOptions) -> Result<Self, IngestError> {
        if options.batch_size == 0 {
            return Err(IngestError::InvalidChunkConfig(
                "batch_size must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            embedder,
            store,
            chunking: ChunkingConfig::try_from(options)?,
            batch_size: options.batch_size,
            in_flight: Mutex::new(()),
        })
    }

    pub async fn indexed_count(&self) -> Result<usize, IngestError> {
        Ok(self.store.count().await?)
    }

    /// Indexes `source` unless the store already holds records, in which
    /// case the existing count is reported and the source is not read.
    pub async fn index_corpus(&self, source: &dyn PageSource) -> Result<IndexingReport, IngestError> {
        let _guard = self.in_flight.lock().await;

        let existing = self.store.count().await?;
        if existing > 0 {
            info!(
                store = %self.store.name(),
                existing,
                "documents already indexed, skipping"
            );
            return Ok(IndexingReport {
                chunks_indexed: existing,
                already_indexed: true,
                ..IndexingReport::default()
            });
        }

        self.index_pages(source).await
    }

    /// Drops everything in the store and indexes `source` from scratch.
    pub async fn reindex(&self, source: &dyn PageSource) -> Result<IndexingReport, IngestError> {
        let _guard = self.in_flight.lock().await;

        self.store.clear().await?;
        info!(store = %self.store.name(), "store cleared for reindex");
        self.index_pages(source).await
    }

    async fn index_pages(&self, source: &dyn PageSource) -> Result<IndexingReport, IngestError> {
        let mut pages = source.pages()?;
        info!(source = %source.describe(), batch_size = self.batch_size, "indexing source");

        let mut report = IndexingReport::default();
        let mut buffer: Vec<Chunk> = Vec::with_capacity(self.batch_size);

        while let Some(page) = next_page(&mut pages).await? {
            report.pages_read += 1;
            buffer.extend(chunk_page(&page.text, page.number, self.chunking));

            while buffer.len() >= self.batch_size {
                let batch = buffer.drain(..self.batch_size).collect::<Vec<_>>();
                report.chunks_indexed += self.flush(batch).await?;
                report.batches_flushed += 1;
                info!(indexed = report.chunks_indexed, "indexed batch");
            }
        }

        if !buffer.is_empty() {
            report.chunks_indexed += self.flush(std::mem::take(&mut buffer)).await?;
            report.batches_flushed += 1;
        }

        info!(
            source = %source.describe(),
            pages = report.pages_read,
            chunks = report.chunks_indexed,
            batches = report.batches_flushed,
            "indexing complete"
        );
        Ok(report)
    }

    async fn flush(&self, chunks: Vec<Chunk>) -> Result<usize, IngestError> {
        let texts = chunks.iter().map(|chunk| chunk.text.clone()).collect::<Vec<_>>();

        let embeddings = self.embedder.embed(&texts).await?;
        if embeddings.len() != chunks.len() {
            return Err(IngestError::Embedding(EmbeddingError::CountMismatch {
                expected: chunks.len(),
                actual: embeddings.len(),
            }));
        }

        let records = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| IndexedRecord { chunk, embedding })
            .collect::<Vec<_>>();

        self.store.upsert(&records).await?;
        debug!(records = records.len(), "flushed batch");
        Ok(records.len())
    }
}

/// Pulls one page on the blocking pool. Opening and decoding a PDF are
/// synchronous, and must not hold up the async workers.
async fn next_page(pages: &mut PageIter) -> Result<Option<PageText>, IngestError> {
    let mut iter = std::mem::replace(pages, Box::new(std::iter::empty()));
    let (iter, item) = tokio::task::spawn_blocking(move || {
        let item = iter.next();
        (iter, item)
    })
    .await?;
    *pages = iter;
    item.transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::CharacterNgramEmbedder;
    use crate::error::StoreError;
    use crate::extractor::{MemorySource, PdfSource};
    use crate::store::StoreMatch;
    use crate::stores::LocalStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct CountingEmbedder {
        calls: AtomicUsize,
        largest_batch: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for CountingEmbedder {
        fn dimensions(&self) -> usize {
            8
        }

        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.largest_batch.fetch_max(texts.len(), Ordering::SeqCst);
            CharacterNgramEmbedder { dimensions: 8 }.embed(texts).await
        }
    }

    struct FailingStore {
        inner: LocalStore,
        fail_after_batches: usize,
        batches: AtomicUsize,
    }

    #[async_trait]
    impl VectorStore for FailingStore {
        async fn upsert(&self, records: &[IndexedRecord]) -> Result<(), StoreError> {
            if self.batches.fetch_add(1, Ordering::SeqCst) >= self.fail_after_batches {
                return Err(StoreError::Request("disk full".to_string()));
            }
            self.inner.upsert(records).await
        }

        async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<StoreMatch>, StoreError> {
            self.inner.query(vector, k).await
        }

        async fn count(&self) -> Result<usize, StoreError> {
            self.inner.count().await
        }

        async fn clear(&self) -> Result<(), StoreError> {
            self.inner.clear().await
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    fn options(chunk_max_chars: usize, batch_size: usize) -> RagOptions {
        RagOptions {
            chunk_max_chars,
            batch_size,
            ..RagOptions::default()
        }
    }

    fn paragraph_pages(pages: usize, paragraphs_per_page: usize) -> MemorySource {
        MemorySource::from_texts((0..pages).map(|page| {
            (0..paragraphs_per_page)
                .map(|index| format!("page {page} paragraph {index} {}", "text ".repeat(10)))
                .collect::<Vec<_>>()
                .join("\n\n")
        }))
    }

    #[tokio::test]
    async fn indexes_in_bounded_batches() -> Result<(), IngestError> {
        let embedder = Arc::new(CountingEmbedder::default());
        let store = Arc::new(LocalStore::in_memory("test"));
        let indexer = DocumentIndexer::new(embedder.clone(), store.clone(), &options(60, 4))?;

        // 7 pages x 3 paragraphs, one chunk per paragraph at this threshold.
        let report = indexer.index_corpus(&paragraph_pages(7, 3)).await?;

        assert_eq!(report.chunks_indexed, 21);
        assert_eq!(report.pages_read, 7);
        assert!(!report.already_indexed);
        assert_eq!(store.count().await?, 21);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), report.batches_flushed);
        assert_eq!(report.batches_flushed, 6);
        assert_eq!(embedder.largest_batch.load(Ordering::SeqCst), 4);
        Ok(())
    }

    #[tokio::test]
    async fn large_page_is_split_into_full_batches() -> Result<(), IngestError> {
        let embedder = Arc::new(CountingEmbedder::default());
        let store = Arc::new(LocalStore::in_memory("test"));
        let indexer = DocumentIndexer::new(embedder.clone(), store.clone(), &options(60, 3))?;

        let report = indexer.index_corpus(&paragraph_pages(1, 10)).await?;

        assert_eq!(report.chunks_indexed, 10);
        assert_eq!(report.batches_flushed, 4);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 4);
        assert_eq!(embedder.largest_batch.load(Ordering::SeqCst), 3);
        assert_eq!(store.count().await?, 10);
        Ok(())
    }

    /// Pages that take a while to produce, like a slow PDF decode.
    struct SlowSource {
        pages: usize,
        delay: Duration,
    }

    impl PageSource for SlowSource {
        fn describe(&self) -> String {
            "slow".to_string()
        }

        fn pages(&self) -> Result<PageIter, IngestError> {
            let delay = self.delay;
            Ok(Box::new((1..=self.pages as u32).map(move |number| {
                std::thread::sleep(delay);
                Ok(PageText {
                    number,
                    text: format!("slow page {number}"),
                })
            })))
        }
    }

    #[tokio::test]
    async fn page_extraction_does_not_stall_the_runtime() -> Result<(), IngestError> {
        let indexer = DocumentIndexer::new(
            Arc::new(CharacterNgramEmbedder { dimensions: 8 }),
            Arc::new(LocalStore::in_memory("test")),
            &RagOptions::default(),
        )?;
        let source = SlowSource {
            pages: 5,
            delay: Duration::from_millis(40),
        };

        let indexing = indexer.index_corpus(&source);
        tokio::pin!(indexing);
        let mut ticks = 0usize;
        let report = loop {
            tokio::select! {
                report = &mut indexing => break report?,
                _ = tokio::time::sleep(Duration::from_millis(5)) => ticks += 1,
            }
        };

        assert_eq!(report.pages_read, 5);
        // 200ms of page work leaves room for dozens of 5ms ticks; a blocked
        // runtime would only see a handful.
        assert!(ticks >= 10, "runtime stalled during extraction: {ticks} ticks");
        Ok(())
    }

    #[tokio::test]
    async fn second_run_is_a_no_op() -> Result<(), IngestError> {
        let embedder = Arc::new(CountingEmbedder::default());
        let store = Arc::new(LocalStore::in_memory("test"));
        let indexer = DocumentIndexer::new(embedder.clone(), store.clone(), &options(60, 50))?;
        let source = paragraph_pages(3, 2);

        let first = indexer.index_corpus(&source).await?;
        let calls_after_first = embedder.calls.load(Ordering::SeqCst);
        let second = indexer.index_corpus(&source).await?;

        assert_eq!(first.chunks_indexed, second.chunks_indexed);
        assert!(second.already_indexed);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), calls_after_first);
        assert_eq!(store.count().await?, first.chunks_indexed);
        Ok(())
    }

    #[tokio::test]
    async fn already_indexed_store_does_not_touch_missing_source() -> Result<(), IngestError> {
        let embedder = Arc::new(CharacterNgramEmbedder { dimensions: 8 });
        let store = Arc::new(LocalStore::in_memory("test"));
        let indexer = DocumentIndexer::new(embedder, store, &RagOptions::default())?;
        indexer.index_corpus(&paragraph_pages(1, 1)).await?;

        let report = indexer
            .index_corpus(&PdfSource::new("/missing/corpus.pdf"))
            .await?;
        assert!(report.already_indexed);
        assert_eq!(report.chunks_indexed, 1);
        Ok(())
    }

    #[tokio::test]
    async fn concurrent_runs_index_once() -> Result<(), IngestError> {
        let embedder = Arc::new(CountingEmbedder::default());
        let store = Arc::new(LocalStore::in_memory("test"));
        let indexer = DocumentIndexer::new(embedder.clone(), store.clone(), &options(60, 50))?;
        let source = paragraph_pages(2, 2);

        let (first, second) = tokio::join!(indexer.index_corpus(&source), indexer.index_corpus(&source));
        let (first, second) = (first?, second?);

        assert_eq!(first.chunks_indexed, 4);
        assert_eq!(second.chunks_indexed, 4);
        assert!(first.already_indexed != second.already_indexed);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[tokio::test]
    async fn two_page_document_scenario() -> Result<(), IngestError> {
        let store = Arc::new(LocalStore::in_memory("test"));
        let indexer = DocumentIndexer::new(
            Arc::new(CharacterNgramEmbedder { dimensions: 8 }),
            store.clone(),
            &options(40, 50),
        )?;
        let long_paragraph = "Cloud Run scales containers automatically. ".repeat(3);
        let source = MemorySource::from_texts([
            "Short one.\n\nShort two.\n\nShort three, a bit longer.".to_string(),
            long_paragraph.clone(),
        ]);

        let report = indexer.index_corpus(&source).await?;
        let all = store.query(&[1.0; 8], 100).await?;
        let page_one = all.iter().filter(|hit| hit.page == Some(1)).collect::<Vec<_>>();
        let page_two = all.iter().filter(|hit| hit.page == Some(2)).collect::<Vec<_>>();

        assert_eq!(report.chunks_indexed, all.len());
        assert_eq!(page_one.len(), 2);
        assert!(page_one
            .iter()
            .all(|hit| hit.text.as_deref().map_or(0, |text| text.chars().count()) <= 40));
        assert_eq!(page_two.len(), 1);
        assert_eq!(page_two[0].text.as_deref(), Some(long_paragraph.trim()));
        Ok(())
    }

    #[tokio::test]
    async fn empty_source_indexes_nothing() -> Result<(), IngestError> {
        let embedder = Arc::new(CountingEmbedder::default());
        let indexer = DocumentIndexer::new(
            embedder.clone(),
            Arc::new(LocalStore::in_memory("test")),
            &RagOptions::default(),
        )?;

        let report = indexer.index_corpus(&MemorySource::default()).await?;
        assert_eq!(report.chunks_indexed, 0);
        assert_eq!(report.batches_flushed, 0);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
        Ok(())
    }

    #[tokio::test]
    async fn missing_source_fails_before_indexing() -> Result<(), IngestError> {
        let embedder = Arc::new(CountingEmbedder::default());
        let indexer = DocumentIndexer::new(
            embedder.clone(),
            Arc::new(LocalStore::in_memory("test")),
            &RagOptions::default(),
        )?;

        let result = indexer.index_corpus(&PdfSource::new("/missing/corpus.pdf")).await;
        assert!(matches!(result, Err(IngestError::SourceMissing(_))));
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
        Ok(())
    }

    #[tokio::test]
    async fn failed_batch_keeps_earlier_batches() -> Result<(), IngestError> {
        let store = Arc::new(FailingStore {
            inner: LocalStore::in_memory("inner"),
            fail_after_batches: 1,
            batches: AtomicUsize::new(0),
        });
        let indexer = DocumentIndexer::new(
            Arc::new(CharacterNgramEmbedder { dimensions: 8 }),
            store.clone(),
            &options(60, 2),
        )?;

        let result = indexer.index_corpus(&paragraph_pages(4, 1)).await;
        assert!(matches!(result, Err(IngestError::Store(_))));
        assert_eq!(store.count().await?, 2);
        Ok(())
    }

    #[tokio::test]
    async fn reindex_replaces_previous_corpus() -> Result<(), IngestError> {
        let store = Arc::new(LocalStore::in_memory("test"));
        let indexer = DocumentIndexer::new(
            Arc::new(CharacterNgramEmbedder { dimensions: 8 }),
            store.clone(),
            &options(60, 50),
        )?;

        indexer.index_corpus(&paragraph_pages(3, 2)).await?;
        let report = indexer.reindex(&paragraph_pages(1, 1)).await?;

        assert_eq!(report.chunks_indexed, 1);
        assert!(!report.already_indexed);
        assert_eq!(indexer.indexed_count().await?, 1);
        Ok(())
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let result = DocumentIndexer::new(
            Arc::new(CharacterNgramEmbedder::default()),
            Arc::new(LocalStore::in_memory("test")),
            &options(100, 0),
        );
        assert!(result.is_err());
    }
}
