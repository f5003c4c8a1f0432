//! Test catalog collaborator models.
//!
//! The question catalog itself lives outside this subsystem; these are
//! the definitions it serves through the [`TestCatalog`] port, carrying
//! exactly what scoring and answer validation need.
//!
//! [`TestCatalog`]: crate::domain::ports::TestCatalog

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One question of a test, as served by the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionDefinition {
    pub id: String,
    /// 1-based position within the test.
    pub ordinal: u32,
    /// Dimension (sub-scale) this question feeds.
    pub dimension: String,
    /// Whether completion requires an answer (unless forced).
    pub required: bool,
    /// Inclusive Likert scale bounds, typically 1..=5.
    pub scale_min: i32,
    pub scale_max: i32,
}

/// A test definition with its questions and dimension weights.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestDefinition {
    pub id: String,
    pub name: String,
    /// Category used for archive layout and per-type statistics.
    pub test_type: String,
    pub questions: Vec<QuestionDefinition>,
    /// Dimension -> weight for the overall score. Missing dimensions
    /// weigh 1.0.
    #[serde(default)]
    pub dimension_weights: BTreeMap<String, f64>,
}

impl TestDefinition {
    pub fn question(&self, question_id: &str) -> Option<&QuestionDefinition> {
        self.questions.iter().find(|q| q.id == question_id)
    }

    pub fn total_questions(&self) -> u32 {
        self.questions.len() as u32
    }

    pub fn required_question_ids(&self) -> Vec<&str> {
        self.questions
            .iter()
            .filter(|q| q.required)
            .map(|q| q.id.as_str())
            .collect()
    }

    pub fn weight_for(&self, dimension: &str) -> f64 {
        self.dimension_weights.get(dimension).copied().unwrap_or(1.0)
    }
}
