use crate::cli::{Cli, EmbedderKind, StoreBackend};
use anyhow::{Context, Result};
use pdf_qa_core::{
    AnswerOrchestrator, AnthropicClient, CharacterNgramEmbedder, CompletionModel, DocumentIndexer,
    Embedder, HttpEmbedder, LocalStore, QdrantStore, RagOptions, Retriever, SessionStore,
    VectorStore,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub type Indexer = DocumentIndexer<dyn Embedder, dyn VectorStore>;
pub type Orchestrator = AnswerOrchestrator<dyn Embedder, dyn VectorStore, dyn CompletionModel>;

/// Capabilities shared by every command; built once per process.
pub struct Capabilities {
    pub options: RagOptions,
    pub embedder: Arc<dyn Embedder>,
    pub store: Arc<dyn VectorStore>,
}

impl Capabilities {
    pub fn indexer(&self) -> Result<Indexer> {
        DocumentIndexer::new(self.embedder.clone(), self.store.clone(), &self.options)
            .context("invalid indexing options")
    }

    pub fn orchestrator(
        &self,
        completion: Arc<dyn CompletionModel>,
        system_prompt: Option<String>,
    ) -> Orchestrator {
        let retriever = Retriever::new(
            self.embedder.clone(),
            self.store.clone(),
            self.options.max_context_chunks,
        );
        let orchestrator = AnswerOrchestrator::new(
            retriever,
            completion,
            Arc::new(SessionStore::new(self.options.history_cap)),
            &self.options,
        );
        match system_prompt {
            Some(prompt) => orchestrator.with_system_prompt(prompt),
            None => orchestrator,
        }
    }
}

pub fn rag_options(cli: &Cli) -> RagOptions {
    RagOptions {
        chunk_max_chars: cli.chunk_size,
        batch_size: cli.batch_size,
        max_context_chunks: cli.max_context_chunks,
        history_cap: cli.history_cap,
        ..RagOptions::default()
    }
}

pub async fn build_capabilities(cli: &Cli) -> Result<Capabilities> {
    let embedder: Arc<dyn Embedder> = match cli.embedder {
        EmbedderKind::Ngram => Arc::new(CharacterNgramEmbedder {
            dimensions: cli.embedding_dimensions,
        }),
        EmbedderKind::Http => Arc::new(
            HttpEmbedder::new(
                &cli.embedding_url,
                cli.embedding_api_key.clone(),
                cli.embedding_model.clone(),
                cli.embedding_dimensions,
                Duration::from_secs(cli.embedding_timeout_secs.max(1)),
            )
            .context("failed to configure embedding endpoint")?,
        ),
    };

    let store: Arc<dyn VectorStore> = match cli.store {
        StoreBackend::Local => Arc::new(
            LocalStore::open(&cli.store_path, &cli.collection)
                .await
                .with_context(|| format!("failed to open local store {}", cli.store_path.display()))?,
        ),
        StoreBackend::Qdrant => {
            let store = QdrantStore::new(&cli.qdrant_url, &cli.collection, embedder.dimensions())
                .context("invalid qdrant url")?;
            store
                .ensure_collection()
                .await
                .with_context(|| format!("failed to prepare qdrant collection {}", cli.collection))?;
            Arc::new(store)
        }
    };

    info!(
        store = ?cli.store,
        collection = %cli.collection,
        embedder = ?cli.embedder,
        dimensions = embedder.dimensions(),
        "capabilities ready"
    );

    Ok(Capabilities {
        options: rag_options(cli),
        embedder,
        store,
    })
}

pub fn build_completion(cli: &Cli) -> Result<Arc<dyn CompletionModel>> {
    let api_key = cli
        .anthropic_api_key
        .as_deref()
        .context("ANTHROPIC_API_KEY is required to answer questions")?;
    let client = AnthropicClient::new(
        api_key,
        cli.claude_model.clone(),
        Duration::from_secs(cli.completion_timeout_secs.max(1)),
    )?
    .with_max_tokens(cli.max_tokens);
    Ok(Arc::new(client))
}

pub async fn load_system_prompt(cli: &Cli) -> Result<Option<String>> {
    match &cli.system_prompt_file {
        Some(path) => {
            let prompt = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("failed to read system prompt {}", path.display()))?;
            Ok(Some(prompt.trim().to_string()))
        }
        None => Ok(None),
    }
}
