use std::fmt;

use thiserror::Error;

use tickerpulse_common::{FetchError, ScoringError};
use tickerpulse_store::StoreError;

/// Why one entity's step failed. Isolated to that entity: the run continues
/// with the next one.
#[derive(Debug, Error)]
pub enum EntityError {
    #[error("all {attempts} fetches failed, last: {last}")]
    Fetch {
        attempts: usize,
        #[source]
        last: FetchError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Scoring(ScoringError),
}

/// Result of one entity's step within a run.
#[derive(Debug)]
pub struct EntityOutcome<T> {
    pub entity: String,
    pub result: Result<T, EntityError>,
}

/// Per-entity outcomes of one orchestrator run, in processing order.
#[derive(Debug)]
pub struct RunSummary<T> {
    pub outcomes: Vec<EntityOutcome<T>>,
}

impl<T> RunSummary<T> {
    pub fn new() -> Self {
        Self {
            outcomes: Vec::new(),
        }
    }

    pub fn push(&mut self, entity: &str, result: Result<T, EntityError>) {
        self.outcomes.push(EntityOutcome {
            entity: entity.to_string(),
            result,
        });
    }

    pub fn succeeded(&self) -> impl Iterator<Item = (&str, &T)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok().map(|t| (o.entity.as_str(), t)))
    }

    pub fn failed(&self) -> impl Iterator<Item = (&str, &EntityError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.entity.as_str(), e)))
    }

    pub fn has_failures(&self) -> bool {
        self.failed().next().is_some()
    }

    pub fn get(&self, entity: &str) -> Option<&Result<T, EntityError>> {
        self.outcomes
            .iter()
            .find(|o| o.entity == entity)
            .map(|o| &o.result)
    }
}

impl<T> Default for RunSummary<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Display for RunSummary<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let failed = self.failed().count();
        write!(
            f,
            "{} entities, {} ok, {} failed",
            self.outcomes.len(),
            self.outcomes.len() - failed,
            failed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_counts_outcomes() {
        let mut summary: RunSummary<u32> = RunSummary::new();
        summary.push("Apple", Ok(3));
        summary.push(
            "Tesla",
            Err(EntityError::Scoring(ScoringError::Unavailable("down".into()))),
        );

        assert!(summary.has_failures());
        assert_eq!(summary.succeeded().collect::<Vec<_>>(), vec![("Apple", &3)]);
        assert_eq!(summary.failed().map(|(e, _)| e).collect::<Vec<_>>(), vec!["Tesla"]);
        assert!(matches!(summary.get("Apple"), Some(Ok(3))));
        assert_eq!(summary.to_string(), "2 entities, 1 ok, 1 failed");
    }

    #[test]
    fn fetch_error_reports_attempts() {
        let err = EntityError::Fetch {
            attempts: 2,
            last: FetchError::RateLimited("429".into()),
        };
        assert_eq!(err.to_string(), "all 2 fetches failed, last: Rate limited: 429");
    }
}
