// Search module
// Turns a question into the top-k most similar chunks and formats them as an answer


use std::sync::Arc;

use tracing::{debug, error, info};

use crate::config::QueryConfig;
use crate::database::SearchResult;
use crate::embeddings::Embedder;
use crate::indexer::StoreState;

pub const NO_RESULTS_MESSAGE: &str = "No relevant information found in the travel guide.";

const ANSWER_MARKER: &str = "📍 ";
const ELLIPSIS: &str = "...";
const CHUNK_SEPARATOR: &str = "\n\n";

/// Outcome of a single query
#[derive(Debug, Clone)]
pub enum QueryOutcome {
    /// Matching chunks, most similar first
    Found(Vec<SearchResult>),
    /// The store is empty or unavailable
    NoResults,
    /// The query could not be answered
    Failed(String),
}

/// Answers questions against the store chosen at startup
pub struct Retriever {
    state: StoreState,
    embedder: Arc<dyn Embedder>,
    config: QueryConfig,
}

impl Retriever {
    #[inline]
    pub fn new(state: StoreState, embedder: Arc<dyn Embedder>, config: QueryConfig) -> Self {
        Self {
            state,
            embedder,
            config,
        }
    }

    #[inline]
    pub fn state(&self) -> &StoreState {
        &self.state
    }

    #[inline]
    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    /// Effective result count: `default_k` when unset, never more than `max_k`
    #[inline]
    pub fn resolve_k(&self, k: Option<usize>) -> usize {
        k.unwrap_or(self.config.default_k).min(self.config.max_k)
    }

    /// Retrieve the chunks most similar to `question`.
    ///
    /// Never returns an error; failures are reported as [`QueryOutcome::Failed`].
    #[inline]
    pub async fn query(&self, question: &str, k: Option<usize>) -> QueryOutcome {
        if question.trim().is_empty() {
            return QueryOutcome::Failed("Query must not be empty".to_string());
        }

        let Some(store) = self.state.store() else {
            debug!("Query against {} store", self.state.label());
            return QueryOutcome::NoResults;
        };

        let k = self.resolve_k(k);
        debug!("Searching top {} chunks for query ({} chars)", k, question.len());

        let embedding = match self.embedder.embed_query(question).await {
            Ok(embedding) => embedding,
            Err(e) => {
                error!("Failed to embed query: {:#}", e);
                return QueryOutcome::Failed(format!("Failed to embed query: {}", e));
            }
        };

        match store.search_similar(&embedding, k).await {
            Ok(results) if results.is_empty() => QueryOutcome::NoResults,
            Ok(results) => {
                info!(
                    "Query matched {} chunks (best similarity {:.3})",
                    results.len(),
                    results[0].similarity_score
                );
                QueryOutcome::Found(results)
            }
            Err(e) => {
                error!("Vector search failed: {}", e);
                QueryOutcome::Failed(e.to_string())
            }
        }
    }

    /// Run a query and render the answer text
    #[inline]
    pub async fn answer(&self, question: &str, k: Option<usize>) -> String {
        let outcome = self.query(question, k).await;
        format_answer(&outcome, self.config.max_display_chars)
    }
}

/// Render an outcome as the answer text shown to the user
#[inline]
pub fn format_answer(outcome: &QueryOutcome, max_display_chars: usize) -> String {
    match outcome {
        QueryOutcome::Found(results) => results
            .iter()
            .map(|result| {
                format!(
                    "{}{}",
                    ANSWER_MARKER,
                    truncate_chars(&result.chunk_metadata.content, max_display_chars)
                )
            })
            .collect::<Vec<_>>()
            .join(CHUNK_SEPARATOR),
        QueryOutcome::NoResults => NO_RESULTS_MESSAGE.to_string(),
        QueryOutcome::Failed(message) => format!("Error: {}", message),
    }
}

/// Keep the first `max_chars` characters, appending "..." when anything was cut
#[inline]
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_offset, _)) => format!("{}{}", &text[..byte_offset], ELLIPSIS),
        None => text.to_string(),
    }
}
