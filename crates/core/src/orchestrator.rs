use crate::completion::CompletionModel;
use crate::embeddings::Embedder;
use crate::error::AnswerError;
use crate::models::{Answer, RagOptions, RetrievalHit, Role, SourceSnippet, Turn};
use crate::retriever::Retriever;
use crate::session::SessionStore;
use crate::traits::VectorStore;
use std::sync::Arc;
use tracing::{debug, info};

pub const NO_CONTEXT_MARKER: &str = "No relevant context found in the documentation.";

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a knowledgeable documentation assistant. \
Your role is to help users understand the services, concepts and practices described in the provided documentation.

Guidelines:
1. Answer questions accurately based on the context provided from the documentation.
2. When asked about a specific product or feature, explain what it is, its key capabilities, and basic usage steps when relevant.
3. Keep answers concise but comprehensive. For technical topics, include practical examples.
4. If the context doesn't contain enough information to answer the question, say so honestly.
5. Format responses using markdown (headers, bullet points, code blocks when appropriate).
6. When explaining deployment steps, be specific and actionable.";

/// Composes retrieval, session history and the completion model into one
/// answer per question.
pub struct AnswerOrchestrator<E: ?Sized, S: ?Sized, C: ?Sized> {
    retriever: Retriever<E, S>,
    completion: Arc<C>,
    sessions: Arc<SessionStore>,
    system_prompt: String,
    max_context_chunks: usize,
    history_window: usize,
    excerpt_chars: usize,
}

impl<E, S, C> AnswerOrchestrator<E, S, C>
where
    E: Embedder + ?Sized,
    S: VectorStore + ?Sized,
    C: CompletionModel + ?Sized,
{
    pub fn new(
        retriever: Retriever<E, S>,
        completion: Arc<C>,
        sessions: Arc<SessionStore>,
        options: &RagOptions,
    ) -> Self {
        Self {
            retriever,
            completion,
            sessions,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_context_chunks: options.max_context_chunks.max(1),
            history_window: options.history_window,
            excerpt_chars: options.source_excerpt_chars,
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub fn retriever(&self) -> &Retriever<E, S> {
        &self.retriever
    }

    pub async fn answer(&self, session_id: &str, question: &str) -> Result<Answer, AnswerError> {
        if question.trim().is_empty() {
            return Err(AnswerError::EmptyQuestion);
        }

        let mut session = self.sessions.lock(session_id).await;

        let hits = self
            .retriever
            .retrieve(question, self.max_context_chunks)
            .await?;
        let context = build_context_block(&hits);

        let mut messages = session.recent(self.history_window);
        messages.push(Turn::user(build_user_message(&context, question)));

        let answer = self
            .completion
            .complete(&self.system_prompt, &messages)
            .await?;

        session.append(Role::User, question);
        session.append(Role::Assistant, answer.clone());
        drop(session);

        info!(session_id, context_used = hits.len(), "answered question");

        Ok(Answer {
            answer,
            sources: hits
                .iter()
                .map(|hit| SourceSnippet {
                    excerpt: excerpt(&hit.text, self.excerpt_chars),
                    distance: hit.distance,
                    page: hit.page,
                })
                .collect(),
            context_used: hits.len(),
        })
    }

    pub async fn history(&self, session_id: &str) -> Vec<Turn> {
        self.sessions.history(session_id).await
    }

    pub async fn clear_history(&self, session_id: &str) -> bool {
        let existed = self.sessions.clear(session_id).await;
        debug!(session_id, existed, "history cleared");
        existed
    }
}

pub fn build_context_block(hits: &[RetrievalHit]) -> String {
    if hits.is_empty() {
        return NO_CONTEXT_MARKER.to_string();
    }

    hits.iter()
        .enumerate()
        .map(|(index, hit)| format!("[Context {}]\n{}", index + 1, hit.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn build_user_message(context: &str, question: &str) -> String {
    format!(
        "Based on the following context from the documentation, please answer my question.\n\n\
         CONTEXT:\n{context}\n\n\
         QUESTION: {question}\n\n\
         Please provide a helpful and accurate answer based on the context above. \
         If you need to explain how to deploy or use something, include practical steps."
    )
}

fn excerpt(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut cut = text.chars().take(max_chars).collect::<String>();
    cut.push_str("...");
    cut
}
