use thiserror::Error;

pub type Result<T> = std::result::Result<T, FinbertError>;

#[derive(Debug, Error)]
pub enum FinbertError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Model {model} is still loading")]
    ModelLoading { model: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Unknown sentiment label: {0}")]
    UnknownLabel(String),

    #[error("Expected {expected} classifications, got {got}")]
    CountMismatch { expected: usize, got: usize },
}

impl FinbertError {
    /// True when the request was rejected because of its inputs rather than
    /// because the endpoint or model is unusable.
    pub fn is_input_error(&self) -> bool {
        matches!(self, FinbertError::Api { status, .. } if *status == 400 || *status == 413 || *status == 422)
    }
}

impl From<reqwest::Error> for FinbertError {
    fn from(err: reqwest::Error) -> Self {
        FinbertError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for FinbertError {
    fn from(err: serde_json::Error) -> Self {
        FinbertError::Parse(err.to_string())
    }
}
