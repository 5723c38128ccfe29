//! Historical incident records used for retrieval.

use serde::{Deserialize, Serialize};

/// A past incident with its embedding.
///
/// The JSON form uses camelCase keys (`suggestedSolution`); snake_case is
/// accepted on input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentRecord {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default, alias = "suggested_solution")]
    pub suggested_solution: String,
    pub embedding: Vec<f32>,
}

impl IncidentRecord {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        summary: impl Into<String>,
        suggested_solution: impl Into<String>,
        embedding: Vec<f32>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            summary: summary.into(),
            suggested_solution: suggested_solution.into(),
            embedding,
        }
    }

    pub fn dimensions(&self) -> usize {
        self.embedding.len()
    }
}
