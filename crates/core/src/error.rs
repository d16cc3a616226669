use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("source document not found: {}", .0.display())]
    SourceMissing(PathBuf),

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),

    #[error("page extraction task failed: {0}")]
    Extraction(#[from] tokio::task::JoinError),

    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("vector store failed: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store request failed: {0}")]
    Request(String),
}

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("invalid response from embedding endpoint: {0}")]
    BackendResponse(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("embedding count {actual} doesn't match input count {expected}")]
    CountMismatch { expected: usize, actual: usize },

    #[error("invalid embedder config: {0}")]
    Config(String),
}

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("completion endpoint returned {status}: {body}")]
    BackendResponse { status: u16, body: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("completion response had no text content")]
    EmptyResponse,

    #[error("invalid completion config: {0}")]
    Config(String),
}

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("query embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("vector store query failed: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum AnswerError {
    #[error("question cannot be empty")]
    EmptyQuestion,

    #[error("retrieval failed: {0}")]
    Retrieval(#[from] RetrievalError),

    #[error("completion failed: {0}")]
    Completion(#[from] CompletionError),
}
