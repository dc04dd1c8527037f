use serde::{Deserialize, Serialize};

use crate::error::{FinbertError, Result};

/// Request body for the text-classification task.
#[derive(Debug, Clone, Serialize)]
pub struct ClassifyRequest<'a> {
    pub inputs: &'a [String],
    pub parameters: ClassifyParameters,
    pub options: InferenceOptions,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassifyParameters {
    /// Ask for every label, not just the argmax.
    pub top_k: u32,
    pub truncation: bool,
    pub max_length: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct InferenceOptions {
    pub wait_for_model: bool,
    pub use_cache: bool,
}

/// One label/probability pair from the classifier.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LabelScore {
    pub label: String,
    pub score: f64,
}

/// The API nests results per input for batches but may flatten a single-input batch.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum ClassifyResponse {
    Batch(Vec<Vec<LabelScore>>),
    Single(Vec<LabelScore>),
}

impl ClassifyResponse {
    pub(crate) fn into_batch(self) -> Vec<Vec<LabelScore>> {
        match self {
            ClassifyResponse::Batch(rows) => rows,
            ClassifyResponse::Single(row) => vec![row],
        }
    }
}

/// Error body returned while a model is cold.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub error: String,
    #[serde(default)]
    pub estimated_time: Option<f64>,
}

/// Probabilities over FinBERT's three classes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Distribution {
    pub negative: f64,
    pub neutral: f64,
    pub positive: f64,
}

impl Distribution {
    /// Map classifier labels onto the three classes. Label names are matched
    /// case-insensitively; any class the model omitted is treated as 0.
    pub fn from_label_scores(scores: &[LabelScore]) -> Result<Self> {
        let mut dist = Distribution {
            negative: 0.0,
            neutral: 0.0,
            positive: 0.0,
        };
        for s in scores {
            match s.label.to_ascii_lowercase().as_str() {
                "negative" => dist.negative = s.score,
                "neutral" => dist.neutral = s.score,
                "positive" => dist.positive = s.score,
                other => return Err(FinbertError::UnknownLabel(other.to_string())),
            }
        }
        Ok(dist)
    }
}
