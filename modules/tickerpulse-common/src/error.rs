use thiserror::Error;

/// Failure of the fetch capability for one query. Always recoverable at the
/// orchestrator level: logged, then the next query or entity runs.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Upstream error: {0}")]
    Upstream(String),
}

/// Failure of the scoring capability.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScoringError {
    /// The model cannot score anything (load failure, endpoint down). Fatal
    /// for the current entity's enrichment.
    #[error("Scorer unavailable: {0}")]
    Unavailable(String),

    /// The model rejected a specific input. Only that record is skipped.
    #[error("Scoring failed for record: {0}")]
    Record(String),
}

impl ScoringError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, ScoringError::Unavailable(_))
    }
}
