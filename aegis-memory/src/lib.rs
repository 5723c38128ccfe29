//! Aegis Memory - incident retrieval
//!
//! An in-memory set of [`IncidentRecord`]s loaded once at startup and
//! searched by cosine similarity. The set is read-only after loading.

use aegis_core::{
    cosine_similarity, validate_vector, AegisResult, ActionRequest, IncidentRecord, StorageError,
};
use aegis_llm::EmbeddingProvider;
use std::path::Path;

/// Number of incidents added to a request's context by [`enrich_request`].
pub const DEFAULT_MEMORY_K: usize = 3;

/// A retrieved incident with its similarity to the query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredIncident<'a> {
    pub score: f32,
    pub record: &'a IncidentRecord,
}

/// Read-only collection of historical incidents.
#[derive(Debug, Clone, Default)]
pub struct IncidentStore {
    records: Vec<IncidentRecord>,
}

impl IncidentStore {
    pub fn new(records: Vec<IncidentRecord>) -> Self {
        Self { records }
    }

    /// Load incidents from a JSON array file. A missing file yields an
    /// empty store.
    pub fn load(path: &Path) -> AegisResult<Self> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "No incident file, starting with empty memory");
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path).map_err(|e| StorageError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let records: Vec<IncidentRecord> =
            serde_json::from_str(&contents).map_err(|e| StorageError::Serialization {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

        if let Some(first) = records.first() {
            let expected = first.dimensions();
            let mismatched = records.iter().filter(|r| r.dimensions() != expected).count();
            if mismatched > 0 {
                tracing::warn!(
                    expected_dimensions = expected,
                    mismatched,
                    "Some incidents have a different embedding length and will never match"
                );
            }
        }
        tracing::info!(count = records.len(), path = %path.display(), "Loaded incident memory");
        Ok(Self::new(records))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[IncidentRecord] {
        &self.records
    }

    /// Top `k` incidents by similarity to `query`, most similar first.
    ///
    /// Equal scores keep insertion order. A record whose embedding length
    /// differs from the query scores 0 instead of failing the search, and so
    /// does a NaN similarity.
    pub fn retrieve_scored(&self, query: &[f32], k: usize) -> Vec<ScoredIncident<'_>> {
        let mut scored: Vec<ScoredIncident<'_>> = self
            .records
            .iter()
            .map(|record| {
                let score = match cosine_similarity(query, &record.embedding) {
                    Ok(s) if s.is_nan() => 0.0,
                    Ok(s) => s,
                    Err(e) => {
                        tracing::debug!(incident = %record.id, error = %e, "Scoring incident as 0");
                        0.0
                    }
                };
                ScoredIncident { score, record }
            })
            .collect();

        // sort_by is stable
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(k);
        scored
    }

    /// Top `k` incidents by similarity to `query`.
    pub fn retrieve(&self, query: &[f32], k: usize) -> Vec<&IncidentRecord> {
        self.retrieve_scored(query, k)
            .into_iter()
            .map(|s| s.record)
            .collect()
    }
}

/// Format incidents as memory lines for a request context.
pub fn render_context(records: &[&IncidentRecord]) -> String {
    records
        .iter()
        .map(|r| {
            format!(
                "MEMORY: {} - {} | Suggestion: {}",
                r.title, r.summary, r.suggested_solution
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Add the incidents most similar to the request's prompt to its context.
///
/// Embedding failures and unusable query vectors are logged and the request
/// is returned unchanged.
pub async fn enrich_request(
    store: &IncidentStore,
    embedder: &dyn EmbeddingProvider,
    mut request: ActionRequest,
    k: usize,
) -> ActionRequest {
    if store.is_empty() || k == 0 {
        return request;
    }

    let query = match embedder.embed(&request.user_prompt).await {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, "Incident retrieval skipped");
            return request;
        }
    };
    if let Err(e) = validate_vector(&query) {
        tracing::warn!(error = %e, model = embedder.model_id(), "Incident retrieval skipped");
        return request;
    }

    let hits = store.retrieve(&query, k);
    if hits.is_empty() {
        return request;
    }
    let memory = render_context(&hits);
    request.context = if request.context.is_empty() {
        memory
    } else {
        format!("{}\n{}", request.context, memory)
    };
    request
}

// ============================================================================
// TESTS
// ============================================================================
