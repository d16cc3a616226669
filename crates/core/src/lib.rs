pub mod chunking;
pub mod completion;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod indexer;
pub mod models;
pub mod orchestrator;
pub mod retriever;
pub mod session;
pub mod store;
pub mod stores;
pub mod traits;

pub use chunking::{chunk_id, chunk_page, split_paragraphs, ChunkingConfig};
pub use completion::{AnthropicClient, CompletionModel};
pub use embeddings::{
    embed_one, CharacterNgramEmbedder, Embedder, HttpEmbedder, DEFAULT_EMBEDDING_DIMENSIONS,
};
pub use error::{
    AnswerError, CompletionError, EmbeddingError, IngestError, RetrievalError, StoreError,
};
pub use extractor::{MemorySource, PageIter, PageSource, PageText, PdfSource};
pub use indexer::DocumentIndexer;
pub use models::{
    Answer, Chunk, IndexedRecord, IndexingReport, RagOptions, RetrievalHit, Role, SourceSnippet,
    Turn,
};
pub use orchestrator::{AnswerOrchestrator, DEFAULT_SYSTEM_PROMPT, NO_CONTEXT_MARKER};
pub use retriever::Retriever;
pub use session::{new_session_id, SessionStore, DEFAULT_SESSION_ID};
pub use store::StoreMatch;
pub use stores::{LocalStore, QdrantStore};
pub use traits::VectorStore;
