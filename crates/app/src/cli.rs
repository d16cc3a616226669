use clap::{Parser, Subcommand, ValueEnum};
use pdf_qa_core::DEFAULT_EMBEDDING_DIMENSIONS;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pdf-qa", version, about = "Ask questions about a PDF using retrieval-augmented generation")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Vector store backend
    #[arg(long, env = "PDF_QA_STORE", value_enum, default_value_t = StoreBackend::Local)]
    pub store: StoreBackend,

    /// JSON-lines log file for the local store
    #[arg(long, env = "PDF_QA_STORE_PATH", default_value = "./vector_store/chunks.jsonl")]
    pub store_path: PathBuf,

    /// Qdrant base URL
    #[arg(long, env = "QDRANT_URL", default_value = "http://localhost:6333")]
    pub qdrant_url: String,

    /// Collection name (Qdrant collection, or label for the local store)
    #[arg(long, env = "PDF_QA_COLLECTION", default_value = "pdf_documents")]
    pub collection: String,

    /// Embedding backend
    #[arg(long, env = "PDF_QA_EMBEDDER", value_enum, default_value_t = EmbedderKind::Ngram)]
    pub embedder: EmbedderKind,

    /// Base URL of an OpenAI-compatible embeddings API
    #[arg(long, env = "PDF_QA_EMBEDDING_URL", default_value = "https://api.openai.com/v1")]
    pub embedding_url: String,

    /// API key for the embeddings API
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub embedding_api_key: Option<String>,

    /// Embedding model identifier
    #[arg(long, env = "PDF_QA_EMBEDDING_MODEL", default_value = "text-embedding-3-small")]
    pub embedding_model: String,

    /// Embedding vector length
    #[arg(long, env = "PDF_QA_EMBEDDING_DIMENSIONS", default_value_t = DEFAULT_EMBEDDING_DIMENSIONS)]
    pub embedding_dimensions: usize,

    /// Seconds before embedding requests time out
    #[arg(long, default_value_t = 30)]
    pub embedding_timeout_secs: u64,

    /// Anthropic API key used for answers
    #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    pub anthropic_api_key: Option<String>,

    /// Claude model name
    #[arg(long, env = "CLAUDE_MODEL", default_value = "claude-sonnet-4-20250514")]
    pub claude_model: String,

    /// Maximum tokens per answer
    #[arg(long, default_value_t = 2048)]
    pub max_tokens: usize,

    /// Seconds before completion requests time out
    #[arg(long, default_value_t = 120)]
    pub completion_timeout_secs: u64,

    /// File with a system prompt replacing the built-in one
    #[arg(long, env = "PDF_QA_SYSTEM_PROMPT_FILE")]
    pub system_prompt_file: Option<PathBuf>,

    /// Soft upper bound on chunk length, in characters
    #[arg(long, env = "CHUNK_SIZE", default_value_t = 1000)]
    pub chunk_size: usize,

    /// Chunks embedded and stored per batch
    #[arg(long, env = "PDF_QA_BATCH_SIZE", default_value_t = 50)]
    pub batch_size: usize,

    /// Chunks retrieved as context per question
    #[arg(long, env = "MAX_CONTEXT_CHUNKS", default_value_t = 5)]
    pub max_context_chunks: usize,

    /// Turns kept per conversation session
    #[arg(long, default_value_t = 20)]
    pub history_cap: usize,
}

#[derive(Subcommand)]
pub enum Command {
    /// Index a PDF into the vector store.
    Index {
        /// PDF to index.
        #[arg(long, env = "PDF_PATH")]
        pdf: PathBuf,
        /// Drop existing records and index again.
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    /// Answer one question from the indexed documents. Each call starts
    /// with an empty history; use `serve` for multi-turn sessions.
    Ask {
        /// Question text
        #[arg(long)]
        question: String,
    },
    /// Serve the chat API over HTTP.
    Serve {
        /// Address to bind (host:port).
        #[arg(long, env = "PDF_QA_BIND", default_value = "0.0.0.0:8000")]
        bind: String,
        /// PDF indexed in the background at startup.
        #[arg(long, env = "PDF_PATH")]
        pdf: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StoreBackend {
    Local,
    Qdrant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EmbedderKind {
    Ngram,
    Http,
}
